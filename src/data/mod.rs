/// Shared winnow parsers for both H3D encodings
pub mod parser_utils;
/// Binary and text H3D readers
pub mod reader;

use std::path::Path;

use rootcause::Report;

use crate::error::{ErrorKind, H3dResult};
use crate::models::H3dAsset;
use crate::models::vertex::BonesPerVertex;

/// Read and parse an H3D file of either encoding.
pub fn read_asset(path: &Path, slots: BonesPerVertex) -> H3dResult<H3dAsset> {
    let data = std::fs::read(path).map_err(|e| Report::new(ErrorKind::from(e)))?;
    reader::parse_asset(&data, slots)
}
