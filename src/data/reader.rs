//! H3D readers.
//!
//! Both encodings decode through [`Decoder`], mirroring the encoder side, so
//! the field order lives in one place per direction. The file does not record
//! how many influence slots each vertex carries; callers pass the value the
//! file was written with.

use rootcause::Report;
use tracing::debug;
use winnow::Parser;
use winnow::ascii::line_ending;
use winnow::binary::{le_i32, le_u8};
use winnow::combinator::eof;
use winnow::error::StrContext;
use winnow::token::{one_of, take};

use super::parser_utils::{
    FieldKind, WResult, invalid, parse_binary_field, parse_int_line, parse_line, parse_line_end,
    parse_short_string, parse_tag, parse_text_field,
};
use crate::error::{ErrorKind, H3dResult};
use crate::export::h3d::{Field, MAGIC, TEXT_HEADER, VERSION};
use crate::models::H3dAsset;
use crate::models::animation::Keyframe;
use crate::models::group::MeshGroup;
use crate::models::material::MaterialDescriptor;
use crate::models::shape_key::{MorphVertex, ShapeKey};
use crate::models::skeleton::{Armature, Joint};
use crate::models::vertex::{BoneInfluence, BonesPerVertex, Triangle, Vertex};

trait Decoder {
    /// Bytes consumed so far.
    fn offset(&self) -> usize;
    fn int(&mut self) -> WResult<i32>;
    fn flag(&mut self) -> WResult<bool>;
    fn string(&mut self) -> WResult<String>;
    fn record<const N: usize>(&mut self, tag: &'static str, layout: [FieldKind; N]) -> WResult<[Field; N]>;
    /// Succeeds only at the end of input.
    fn finish(&mut self) -> WResult<()>;
}

struct BinaryDecoder<'a> {
    len: usize,
    input: &'a [u8],
}

impl Decoder for BinaryDecoder<'_> {
    fn offset(&self) -> usize {
        self.len - self.input.len()
    }

    fn int(&mut self) -> WResult<i32> {
        le_i32.parse_next(&mut self.input)
    }

    fn flag(&mut self) -> WResult<bool> {
        le_u8.map(|b| b != 0).parse_next(&mut self.input)
    }

    fn string(&mut self) -> WResult<String> {
        parse_short_string(&mut self.input)
    }

    fn record<const N: usize>(&mut self, tag: &'static str, layout: [FieldKind; N]) -> WResult<[Field; N]> {
        let mut fields = [Field::Int(0); N];
        for (field, kind) in fields.iter_mut().zip(layout) {
            *field = parse_binary_field(kind, &mut self.input).map_err(|e| e.map(|e| labelled(e, tag)))?;
        }
        Ok(fields)
    }

    fn finish(&mut self) -> WResult<()> {
        eof.void()
            .context(StrContext::Label("end of file"))
            .parse_next(&mut self.input)
    }
}

struct TextDecoder<'a> {
    len: usize,
    input: &'a str,
}

impl Decoder for TextDecoder<'_> {
    fn offset(&self) -> usize {
        self.len - self.input.len()
    }

    fn int(&mut self) -> WResult<i32> {
        parse_int_line(&mut self.input)
    }

    fn flag(&mut self) -> WResult<bool> {
        (one_of(['0', '1']), line_ending)
            .map(|(c, _)| c == '1')
            .context(StrContext::Label("flag"))
            .parse_next(&mut self.input)
    }

    fn string(&mut self) -> WResult<String> {
        parse_line.map(str::to_string).parse_next(&mut self.input)
    }

    fn record<const N: usize>(&mut self, tag: &'static str, layout: [FieldKind; N]) -> WResult<[Field; N]> {
        text_record(tag, layout, &mut self.input).map_err(|e| e.map(|e| labelled(e, tag)))
    }

    fn finish(&mut self) -> WResult<()> {
        eof.void()
            .context(StrContext::Label("end of file"))
            .parse_next(&mut self.input)
    }
}

fn text_record<const N: usize>(tag: &'static str, layout: [FieldKind; N], input: &mut &str) -> WResult<[Field; N]> {
    parse_tag(tag, input)?;
    let mut fields = [Field::Int(0); N];
    for (field, kind) in fields.iter_mut().zip(layout) {
        *field = parse_text_field(kind, input)?;
    }
    parse_line_end(input)?;
    Ok(fields)
}

fn labelled(mut err: winnow::error::ContextError, tag: &'static str) -> winnow::error::ContextError {
    err.push(StrContext::Label(tag));
    err
}

fn count<D: Decoder>(dec: &mut D) -> WResult<usize> {
    let value = dec.int()?;
    usize::try_from(value).map_err(|_| invalid("non-negative count"))
}

fn index(value: i32) -> WResult<u32> {
    u32::try_from(value).map_err(|_| invalid("non-negative index"))
}

fn float_of(field: Field) -> f32 {
    match field {
        Field::Float(v) => v,
        Field::Int(v) => v as f32,
    }
}

fn int_of(field: Field) -> i32 {
    match field {
        Field::Int(v) => v,
        Field::Float(v) => v as i32,
    }
}

fn floats<D: Decoder, const N: usize>(dec: &mut D, tag: &'static str) -> WResult<[f32; N]> {
    Ok(dec.record(tag, [FieldKind::Float; N])?.map(float_of))
}

/// Capacity hint for a count read from the file.
fn bounded(count: usize) -> usize {
    count.min(1024)
}

fn decode_group<D: Decoder>(dec: &mut D, slots: BonesPerVertex) -> WResult<MeshGroup> {
    let name = dec.string()?;
    let material_index = dec.int()?;

    let tri_count = count(dec)?;
    let mut triangles = Vec::with_capacity(bounded(tri_count));
    for _ in 0..tri_count {
        let [a, b, c] = dec.record("tri", [FieldKind::Int; 3])?.map(int_of);
        triangles.push(Triangle([index(a)?, index(b)?, index(c)?]));
    }

    let vert_count = count(dec)?;
    let mut vertices = Vec::with_capacity(bounded(vert_count));
    for slot in 0..vert_count {
        let position = floats(dec, "v")?;
        let normal = floats(dec, "n")?;
        let uv = floats(dec, "t")?;
        let mut vertex = Vertex::new(position, normal, uv, slot as u32);
        vertex.canonical_index = Some(slot as u32);
        for _ in 0..slots.get() {
            let [joint, weight] = dec.record("b", [FieldKind::Int, FieldKind::Float])?;
            let influence = BoneInfluence {
                joint: int_of(joint),
                weight: float_of(weight),
            };
            if influence.joint >= 0 {
                vertex.influences.push(influence);
            }
        }
        vertices.push(vertex);
    }

    let armature = if dec.flag()? { Some(dec.string()?) } else { None };

    let key_count = count(dec)?;
    let mut shape_keys = Vec::with_capacity(bounded(key_count));
    for _ in 0..key_count {
        let name = dec.string()?;
        let morph_count = count(dec)?;
        let mut morphs = Vec::with_capacity(bounded(morph_count));
        for _ in 0..morph_count {
            morphs.push(MorphVertex {
                position: floats(dec, "v")?,
                normal: floats(dec, "n")?,
            });
        }
        shape_keys.push(ShapeKey {
            name,
            vertices: morphs,
        });
    }

    Ok(MeshGroup {
        name,
        material_index,
        triangles,
        vertices,
        armature,
        shape_keys,
    })
}

fn decode_material<D: Decoder>(dec: &mut D) -> WResult<MaterialDescriptor> {
    Ok(MaterialDescriptor {
        texture: dec.string()?,
        ambient: floats::<_, 1>(dec, "ambient")?[0],
        diffuse: floats(dec, "diffuse")?,
        specular: floats(dec, "specular")?,
        emissive: floats(dec, "emissive")?,
        shininess: floats::<_, 1>(dec, "shininess")?[0],
        transparency: floats::<_, 1>(dec, "transparency")?[0],
    })
}

fn decode_armature<D: Decoder>(dec: &mut D) -> WResult<Armature> {
    let name = dec.string()?;
    let joint_count = count(dec)?;
    let mut joints = Vec::with_capacity(bounded(joint_count));
    for index in 0..joint_count {
        let name = dec.string()?;
        let position = floats(dec, "p")?;
        let rotation = floats(dec, "r")?;
        let parent_index = dec.int()?;
        let key_count = count(dec)?;
        let mut keyframes = Vec::with_capacity(bounded(key_count));
        for _ in 0..key_count {
            let [frame, px, py, pz, rx, ry, rz] = dec.record(
                "k",
                [
                    FieldKind::Int,
                    FieldKind::Float,
                    FieldKind::Float,
                    FieldKind::Float,
                    FieldKind::Float,
                    FieldKind::Float,
                    FieldKind::Float,
                ],
            )?;
            keyframes.push(Keyframe {
                frame: int_of(frame),
                position: [px, py, pz].map(float_of),
                rotation: [rx, ry, rz].map(float_of),
            });
        }
        joints.push(Joint {
            name,
            parent_name: None,
            parent_index,
            index: index as u32,
            position,
            rotation,
            keyframes,
        });
    }

    let names: Vec<String> = joints.iter().map(|j| j.name.clone()).collect();
    for joint in &mut joints {
        joint.parent_name = usize::try_from(joint.parent_index)
            .ok()
            .and_then(|p| names.get(p))
            .cloned();
    }

    Ok(Armature { name, joints })
}

fn decode<D: Decoder>(dec: &mut D, slots: BonesPerVertex) -> WResult<H3dAsset> {
    let group_count = count(dec)?;
    let mut groups = Vec::with_capacity(bounded(group_count));
    for _ in 0..group_count {
        groups.push(decode_group(dec, slots)?);
    }

    let material_count = count(dec)?;
    let mut materials = Vec::with_capacity(bounded(material_count));
    for _ in 0..material_count {
        materials.push(decode_material(dec)?);
    }

    let armature_count = count(dec)?;
    let mut armatures = Vec::with_capacity(bounded(armature_count));
    for _ in 0..armature_count {
        armatures.push(decode_armature(dec)?);
    }

    dec.finish()?;

    Ok(H3dAsset {
        groups,
        materials,
        armatures,
        bones_per_vertex: slots,
    })
}

fn run<D: Decoder>(mut dec: D, slots: BonesPerVertex) -> H3dResult<H3dAsset> {
    let asset = decode(&mut dec, slots).map_err(|e| Report::new(ErrorKind::parse(dec.offset(), e)))?;
    debug!(
        groups = asset.groups.len(),
        materials = asset.materials.len(),
        armatures = asset.armatures.len(),
        "parsed asset"
    );
    Ok(asset)
}

/// Parse the binary encoding.
pub fn parse_binary(data: &[u8], slots: BonesPerVertex) -> H3dResult<H3dAsset> {
    let mut input = data;
    let magic: WResult<&[u8]> = take(MAGIC.len()).parse_next(&mut input);
    if magic.ok() != Some(&MAGIC[..]) {
        return Err(Report::new(ErrorKind::BadMagic));
    }
    let version: WResult<u8> = le_u8.parse_next(&mut input);
    match version {
        Ok(VERSION) => {}
        Ok(other) => return Err(Report::new(ErrorKind::UnsupportedVersion(other))),
        Err(e) => return Err(Report::new(ErrorKind::parse(MAGIC.len(), e))),
    }

    run(
        BinaryDecoder {
            len: data.len(),
            input,
        },
        slots,
    )
}

/// Parse the text encoding.
pub fn parse_text(text: &str, slots: BonesPerVertex) -> H3dResult<H3dAsset> {
    let mut input = text;
    let header = parse_line(&mut input).map_err(|_| Report::new(ErrorKind::BadMagic))?;
    if header != TEXT_HEADER {
        let version = header
            .strip_prefix("H3D V")
            .ok_or_else(|| Report::new(ErrorKind::BadMagic))?;
        return match version.parse::<u8>() {
            Ok(version) => Err(Report::new(ErrorKind::UnsupportedVersion(version))),
            Err(_) => Err(Report::new(ErrorKind::BadMagic)),
        };
    }

    run(TextDecoder { len: text.len(), input }, slots)
}

/// Parse either encoding, telling them apart by the byte after the magic.
pub fn parse_asset(data: &[u8], slots: BonesPerVertex) -> H3dResult<H3dAsset> {
    if data.get(..4) == Some(b"H3D ") {
        let text = std::str::from_utf8(data).map_err(|e| {
            Report::new(ErrorKind::ParseError {
                offset: e.valid_up_to(),
                detail: "text encoding is not valid UTF-8".to_string(),
            })
        })?;
        parse_text(text, slots)
    } else {
        parse_binary(data, slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::h3d::write_asset;
    use crate::export::{ExportOptions, compile_scene};
    use crate::scene::{
        ArmatureAnimation, ArmatureObject, Bone, BoneChannels, GroupWeight, IDENTITY, MaterialId, MeshObject, Scene,
        SceneObject, ShapeKeyBlock, SourceLoop, SourceMaterial, SourceVertex,
    };

    fn scene() -> Scene {
        let corners = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
        let mut vertices: Vec<SourceVertex> = corners
            .iter()
            .map(|&position| SourceVertex {
                position,
                groups: Vec::new(),
            })
            .collect();
        vertices[1].groups = vec![
            GroupWeight { group: 0, weight: 0.25 },
            GroupWeight { group: 1, weight: 0.75 },
        ];
        let mesh = MeshObject {
            name: "Body".to_string(),
            world_transform: IDENTITY,
            vertices,
            loops: [0u32, 1, 2, 0, 2, 3]
                .iter()
                .map(|&vertex| SourceLoop {
                    vertex,
                    normal: [0.0, 0.0, 1.0],
                    uv: [corners[vertex as usize][0], corners[vertex as usize][1]],
                })
                .collect(),
            triangles: vec![[0, 1, 2], [3, 4, 5]],
            vertex_groups: vec!["Hip".to_string(), "Knee".to_string()],
            material: Some(MaterialId(1)),
            armature: Some("Rig".to_string()),
            shape_keys: vec![ShapeKeyBlock {
                name: "Bulge".to_string(),
                value: 0.0,
                positions: corners.iter().map(|p| [p[0], p[1], 0.5]).collect(),
                normals: None,
            }],
        };
        let rig = ArmatureObject {
            name: "Rig".to_string(),
            world_transform: IDENTITY,
            bones: vec![
                Bone {
                    name: "Hip".to_string(),
                    parent: None,
                    matrix_local: IDENTITY,
                },
                Bone {
                    name: "Knee".to_string(),
                    parent: Some("Hip".to_string()),
                    matrix_local: glam::Mat4::from_translation(glam::Vec3::Z).to_cols_array_2d(),
                },
            ],
        };
        let mut anim = ArmatureAnimation::default();
        anim.channels.insert(
            "Knee".to_string(),
            BoneChannels {
                location: vec![4],
                rotation: vec![],
            },
        );
        Scene {
            objects: vec![SceneObject::Mesh(mesh), SceneObject::Armature(rig)],
            materials: vec![SourceMaterial {
                id: MaterialId(1),
                textures: vec!["maps/skin.png".to_string()],
                ..Default::default()
            }],
            animations: std::collections::HashMap::from([("Rig".to_string(), anim)]),
            ..Default::default()
        }
    }

    fn encoded(asset: &H3dAsset, textual: bool) -> Vec<u8> {
        let mut out = Vec::new();
        write_asset(asset, textual, &mut out).unwrap();
        out
    }

    #[test]
    fn binary_and_text_agree() {
        let asset = compile_scene(&scene(), &ExportOptions::default()).unwrap();
        let slots = asset.bones_per_vertex;

        let from_binary = parse_binary(&encoded(&asset, false), slots).unwrap();
        assert_eq!(encoded(&from_binary, true), encoded(&asset, true));

        let text = String::from_utf8(encoded(&asset, true)).unwrap();
        let from_text = parse_text(&text, slots).unwrap();
        assert_eq!(encoded(&from_text, false), encoded(&asset, false));
    }

    #[test]
    fn decoded_model_matches() {
        let asset = compile_scene(&scene(), &ExportOptions::default()).unwrap();
        let parsed = parse_binary(&encoded(&asset, false), asset.bones_per_vertex).unwrap();

        assert_eq!(parsed.groups[0].triangles, asset.groups[0].triangles);
        assert_eq!(parsed.groups[0].armature.as_deref(), Some("Rig"));
        assert_eq!(parsed.groups[0].shape_keys, asset.groups[0].shape_keys);
        assert_eq!(parsed.materials, asset.materials);
        assert_eq!(parsed.materials[0].texture, "skin.png");

        let knee = &parsed.armatures[0].joints[1];
        assert_eq!(knee.parent_name.as_deref(), Some("Hip"));
        assert_eq!(knee.keyframes.len(), 1);
        assert_eq!(knee.keyframes[0].frame, 4);

        for (read, written) in parsed.groups[0].vertices.iter().zip(&asset.groups[0].vertices) {
            assert_eq!(read.position, written.position);
            assert_eq!(read.influences, written.influences);
        }
    }

    #[test]
    fn auto_detects_encoding() {
        let asset = compile_scene(&scene(), &ExportOptions::default()).unwrap();
        let slots = asset.bones_per_vertex;
        let text = parse_asset(&encoded(&asset, true), slots).unwrap();
        let binary = parse_asset(&encoded(&asset, false), slots).unwrap();
        assert_eq!(encoded(&text, true), encoded(&binary, true));
    }

    #[test]
    fn bad_magic() {
        let err = parse_binary(b"GLB\x01", BonesPerVertex::default()).unwrap_err();
        assert!(err.to_string().contains("magic"));
        assert!(parse_text("OBJ\n", BonesPerVertex::default()).is_err());
    }

    #[test]
    fn unsupported_version() {
        let err = parse_binary(b"H3D\x02\0\0\0\0", BonesPerVertex::default()).unwrap_err();
        assert!(err.to_string().contains('2'));
        let err = parse_text("H3D V9\n0\n0\n0\n", BonesPerVertex::default()).unwrap_err();
        assert!(err.to_string().contains('9'));
    }

    #[test]
    fn truncated_binary_reports_offset() {
        let asset = compile_scene(&scene(), &ExportOptions::default()).unwrap();
        let bytes = encoded(&asset, false);
        let err = parse_binary(&bytes[..bytes.len() - 3], asset.bones_per_vertex).unwrap_err();
        assert!(err.to_string().contains("offset"));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = encoded(&H3dAsset::default(), false);
        bytes.push(0);
        assert!(parse_binary(&bytes, BonesPerVertex::default()).is_err());
    }

    #[test]
    fn wrong_slot_count_fails() {
        let asset = compile_scene(&scene(), &ExportOptions::default()).unwrap();
        let text = String::from_utf8(encoded(&asset, true)).unwrap();
        assert!(parse_text(&text, BonesPerVertex::new(1).unwrap()).is_err());
    }

    #[test]
    fn text_with_wrong_tag_fails() {
        let text = "H3D V1\n1\nG\n-1\n1\ntri 0 0 0\n1\nv 0 0 0\nx 0 0 1\n";
        assert!(parse_text(text, BonesPerVertex::new(1).unwrap()).is_err());
    }

    #[test]
    fn empty_text_asset() {
        let asset = parse_text("H3D V1\n0\n0\n0\n", BonesPerVertex::default()).unwrap();
        assert_eq!(asset, H3dAsset::default());
    }

    #[test]
    fn negative_count_is_rejected() {
        assert!(parse_text("H3D V1\n-1\n0\n0\n", BonesPerVertex::default()).is_err());
    }
}
