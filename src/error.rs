use rootcause::Report;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ErrorKind {
    #[error("Parse error at offset 0x{offset:X}: {detail}")]
    ParseError { offset: usize, detail: String },
    #[error("Not an H3D file (bad magic)")]
    BadMagic,
    #[error("Unsupported H3D version: {0}")]
    UnsupportedVersion(u8),
    #[error("Mesh '{mesh}': triangle {triangle} references loop {index}, but the mesh has {count} loops")]
    LoopOutOfRange {
        mesh: String,
        triangle: usize,
        index: u32,
        count: usize,
    },
    #[error("Mesh '{mesh}': loop {loop_index} references vertex {index}, but the mesh has {count} vertices")]
    VertexOutOfRange {
        mesh: String,
        loop_index: usize,
        index: u32,
        count: usize,
    },
    #[error("Mesh '{mesh}': shape key '{key}' has {actual} loops, base mesh has {expected}")]
    ShapeKeyMismatch {
        mesh: String,
        key: String,
        expected: usize,
        actual: usize,
    },
    #[error("Mesh '{mesh}': shape key '{key}' has {actual} vertex positions, base mesh has {expected}")]
    ShapeKeyVertexCount {
        mesh: String,
        key: String,
        expected: usize,
        actual: usize,
    },
    #[error("Bones per vertex must be between 1 and 4, got {0}")]
    InvalidBonesPerVertex(u8),
    #[error("Invalid frame range: start {start} is after end {end}")]
    InvalidFrameRange { start: i32, end: i32 },
    #[cfg(feature = "json")]
    #[error("Error serializing or deserializing json: {err}")]
    SerdeJson {
        #[from]
        err: serde_json::Error,
    },
    #[error("IO error")]
    IoError(#[from] std::io::Error),
}

impl ErrorKind {
    pub(crate) fn parse(offset: usize, e: winnow::error::ErrMode<winnow::error::ContextError>) -> Self {
        ErrorKind::ParseError {
            offset,
            detail: format!("{e}"),
        }
    }
}

pub type H3dResult<T> = Result<T, Report<ErrorKind>>;
