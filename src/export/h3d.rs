//! H3D encoders.
//!
//! [`encode`] is the only place that knows the field order. It drives an
//! [`Encoder`], so the binary and text encodings can never disagree on layout:
//!
//! ```text
//! header
//! groupCount
//!   name, materialIndex
//!   triCount, (i32, i32, i32)*
//!   vertCount, (pos 3f, normal 3f, uv 2f, bonesPerVertex * (joint i32, weight f32))*
//!   animated, [armatureName]
//!   shapeKeyCount, (name, vertCount, (pos 3f, normal 3f)*)*
//! materialCount
//!   texture, ambient, diffuse 3f, specular 3f, emissive 3f, shininess, transparency
//! armatureCount
//!   name, jointCount
//!     name, position 3f, rotation 3f, parentIndex, keyframeCount, (frame, pos 3f, rot 3f)*
//! ```

use std::io::{self, Write};

use itertools::Itertools;

use crate::models::H3dAsset;
use crate::models::vertex::{BonesPerVertex, Vertex};

pub const MAGIC: &[u8; 3] = b"H3D";
pub const VERSION: u8 = 1;
pub const TEXT_HEADER: &str = "H3D V1";

/// Longest string the 1-byte length prefix can describe.
pub const MAX_STRING_LEN: usize = 255;

/// A numeric value inside a record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Field {
    Int(i32),
    Float(f32),
}

/// One output encoding.
pub trait Encoder {
    fn header(&mut self) -> io::Result<()>;
    /// A count or index.
    fn int(&mut self, value: i32) -> io::Result<()>;
    fn flag(&mut self, value: bool) -> io::Result<()>;
    /// A string already passed through [`wire_string`].
    fn string(&mut self, value: &str) -> io::Result<()>;
    /// A fixed group of numbers. `tag` labels the line in the text encoding.
    fn record(&mut self, tag: &str, fields: &[Field]) -> io::Result<()>;
}

/// The string as it is stored on the wire: ASCII only, control characters
/// and non-ASCII replaced by `_`, cut to [`MAX_STRING_LEN`] bytes.
pub fn wire_string(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() {
                c
            } else {
                '_'
            }
        })
        .take(MAX_STRING_LEN)
        .collect()
}

pub struct BinaryEncoder<W> {
    out: W,
}

impl<W: Write> BinaryEncoder<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> Encoder for BinaryEncoder<W> {
    fn header(&mut self) -> io::Result<()> {
        self.out.write_all(MAGIC)?;
        self.out.write_all(&[VERSION])
    }

    fn int(&mut self, value: i32) -> io::Result<()> {
        self.out.write_all(&value.to_le_bytes())
    }

    fn flag(&mut self, value: bool) -> io::Result<()> {
        self.out.write_all(&[value as u8])
    }

    fn string(&mut self, value: &str) -> io::Result<()> {
        let bytes = &value.as_bytes()[..value.len().min(MAX_STRING_LEN)];
        self.out.write_all(&[bytes.len() as u8])?;
        self.out.write_all(bytes)
    }

    fn record(&mut self, _tag: &str, fields: &[Field]) -> io::Result<()> {
        for field in fields {
            match field {
                Field::Int(v) => self.out.write_all(&v.to_le_bytes())?,
                Field::Float(v) => self.out.write_all(&v.to_le_bytes())?,
            }
        }
        Ok(())
    }
}

pub struct TextEncoder<W> {
    out: W,
}

impl<W: Write> TextEncoder<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> Encoder for TextEncoder<W> {
    fn header(&mut self) -> io::Result<()> {
        writeln!(self.out, "{TEXT_HEADER}")
    }

    fn int(&mut self, value: i32) -> io::Result<()> {
        writeln!(self.out, "{value}")
    }

    fn flag(&mut self, value: bool) -> io::Result<()> {
        writeln!(self.out, "{}", value as u8)
    }

    fn string(&mut self, value: &str) -> io::Result<()> {
        writeln!(self.out, "{value}")
    }

    fn record(&mut self, tag: &str, fields: &[Field]) -> io::Result<()> {
        let values = fields
            .iter()
            .map(|field| match field {
                Field::Int(v) => v.to_string(),
                Field::Float(v) => v.to_string(),
            })
            .join(" ");
        writeln!(self.out, "{tag} {values}")
    }
}

fn count<E: Encoder + ?Sized>(enc: &mut E, len: usize) -> io::Result<()> {
    let len = i32::try_from(len)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, format!("count {len} exceeds i32")))?;
    enc.int(len)
}

fn floats<const N: usize>(values: [f32; N]) -> [Field; N] {
    values.map(Field::Float)
}

/// Emit `asset` field by field in wire order.
pub fn encode<E: Encoder + ?Sized>(asset: &H3dAsset, enc: &mut E) -> io::Result<()> {
    enc.header()?;

    count(enc, asset.groups.len())?;
    for group in &asset.groups {
        enc.string(&wire_string(&group.name))?;
        enc.int(group.material_index)?;

        count(enc, group.triangles.len())?;
        for tri in &group.triangles {
            enc.record("tri", &tri.0.map(|i| Field::Int(i as i32)))?;
        }

        count(enc, group.vertices.len())?;
        for vertex in &group.vertices {
            write_vertex(enc, vertex, asset.bones_per_vertex)?;
        }

        enc.flag(group.animated())?;
        if let Some(armature) = &group.armature {
            enc.string(&wire_string(armature))?;
        }

        count(enc, group.shape_keys.len())?;
        for key in &group.shape_keys {
            enc.string(&wire_string(&key.name))?;
            count(enc, key.vertices.len())?;
            for morph in &key.vertices {
                enc.record("v", &floats(morph.position))?;
                enc.record("n", &floats(morph.normal))?;
            }
        }
    }

    count(enc, asset.materials.len())?;
    for material in &asset.materials {
        enc.string(&wire_string(&material.texture))?;
        enc.record("ambient", &[Field::Float(material.ambient)])?;
        enc.record("diffuse", &floats(material.diffuse))?;
        enc.record("specular", &floats(material.specular))?;
        enc.record("emissive", &floats(material.emissive))?;
        enc.record("shininess", &[Field::Float(material.shininess)])?;
        enc.record("transparency", &[Field::Float(material.transparency)])?;
    }

    count(enc, asset.armatures.len())?;
    for armature in &asset.armatures {
        enc.string(&wire_string(&armature.name))?;
        count(enc, armature.joints.len())?;
        for joint in &armature.joints {
            enc.string(&wire_string(&joint.name))?;
            enc.record("p", &floats(joint.position))?;
            enc.record("r", &floats(joint.rotation))?;
            enc.int(joint.parent_index)?;
            count(enc, joint.keyframes.len())?;
            for key in &joint.keyframes {
                let [px, py, pz] = key.position;
                let [rx, ry, rz] = key.rotation;
                enc.record(
                    "k",
                    &[
                        Field::Int(key.frame),
                        Field::Float(px),
                        Field::Float(py),
                        Field::Float(pz),
                        Field::Float(rx),
                        Field::Float(ry),
                        Field::Float(rz),
                    ],
                )?;
            }
        }
    }

    Ok(())
}

fn write_vertex<E: Encoder + ?Sized>(
    enc: &mut E,
    vertex: &Vertex,
    slots: BonesPerVertex,
) -> io::Result<()> {
    enc.record("v", &floats(vertex.position))?;
    enc.record("n", &floats(vertex.normal))?;
    enc.record("t", &floats(vertex.uv))?;
    for influence in vertex.influence_slots(slots) {
        enc.record("b", &[Field::Int(influence.joint), Field::Float(influence.weight)])?;
    }
    Ok(())
}

/// Write `asset` in the chosen encoding.
pub fn write_asset<W: Write>(asset: &H3dAsset, textual: bool, out: W) -> io::Result<()> {
    if textual {
        encode(asset, &mut TextEncoder::new(out))
    } else {
        encode(asset, &mut BinaryEncoder::new(out))
    }
}
