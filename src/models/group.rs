//! Mesh groups: one per source mesh object.
//!
//! Extraction turns every loop into a [`Vertex`] in world space, resolves
//! vertex groups to joints, then hands the loop buffer to deduplication. Shape
//! keys are extracted with the same loop layout and correlated through the
//! resulting canonical mapping.

use std::collections::HashMap;

use glam::{Mat3, Mat4, Vec3};
use rootcause::Report;
use tracing::debug;

use super::dedup::{self, DedupPolicy};
use super::shape_key::{self, MorphVertex, ShapeKey, ShapeKeyMode};
use super::vertex::{BoneInfluence, BonesPerVertex, Triangle, Vertex, limit_influences};
use crate::error::{ErrorKind, H3dResult};
use crate::scene::{MeshObject, to_mat4};

#[derive(Debug, Clone, PartialEq)]
pub struct MeshGroup {
    pub name: String,
    /// Index into the asset's material list, or -1.
    pub material_index: i32,
    pub triangles: Vec<Triangle>,
    pub vertices: Vec<Vertex>,
    /// Armature deforming this group; written as the `animated` flag.
    pub armature: Option<String>,
    pub shape_keys: Vec<ShapeKey>,
}

impl MeshGroup {
    pub fn animated(&self) -> bool {
        self.armature.is_some()
    }
}

/// Per-export settings that shape group extraction.
#[derive(Debug, Clone, Copy)]
pub struct GroupSettings {
    /// `None` keeps every loop as its own vertex.
    pub dedup: Option<DedupPolicy>,
    pub bones_per_vertex: BonesPerVertex,
    pub shape_keys: ShapeKeyMode,
}

/// Skinning target of a mesh: the armature name and its joint lookup.
pub struct Skin<'a> {
    pub armature: &'a str,
    pub joints: &'a HashMap<&'a str, i32>,
}

struct Space {
    points: Mat4,
    normals: Mat3,
}

impl Space {
    fn new(world: Mat4) -> Self {
        Self {
            points: world,
            normals: Mat3::from_mat4(world).inverse().transpose(),
        }
    }

    fn point(&self, p: [f32; 3]) -> [f32; 3] {
        self.points.transform_point3(Vec3::from(p)).to_array()
    }

    fn normal(&self, n: [f32; 3]) -> [f32; 3] {
        (self.normals * Vec3::from(n)).normalize_or_zero().to_array()
    }
}

fn validate(mesh: &MeshObject) -> H3dResult<()> {
    for (loop_index, lp) in mesh.loops.iter().enumerate() {
        if lp.vertex as usize >= mesh.vertices.len() {
            return Err(Report::new(ErrorKind::VertexOutOfRange {
                mesh: mesh.name.clone(),
                loop_index,
                index: lp.vertex,
                count: mesh.vertices.len(),
            }));
        }
    }
    for (triangle, tri) in mesh.triangles.iter().enumerate() {
        if let Some(&index) = tri.iter().find(|&&i| i as usize >= mesh.loops.len()) {
            return Err(Report::new(ErrorKind::LoopOutOfRange {
                mesh: mesh.name.clone(),
                triangle,
                index,
                count: mesh.loops.len(),
            }));
        }
    }
    Ok(())
}

fn check_key_length(mesh: &MeshObject, key: &str, actual: usize) -> H3dResult<()> {
    if actual != mesh.vertices.len() {
        return Err(Report::new(ErrorKind::ShapeKeyVertexCount {
            mesh: mesh.name.clone(),
            key: key.to_string(),
            expected: mesh.vertices.len(),
            actual,
        }));
    }
    Ok(())
}

/// Source vertex positions with every shape key blended in at its current
/// value.
fn blended_positions(mesh: &MeshObject) -> H3dResult<Vec<[f32; 3]>> {
    let mut positions: Vec<[f32; 3]> = mesh.vertices.iter().map(|v| v.position).collect();
    for block in &mesh.shape_keys {
        check_key_length(mesh, &block.name, block.positions.len())?;
        if block.value == 0.0 {
            continue;
        }
        for ((out, base), key) in positions.iter_mut().zip(&mesh.vertices).zip(&block.positions) {
            for axis in 0..3 {
                out[axis] += block.value * (key[axis] - base.position[axis]);
            }
        }
    }
    Ok(positions)
}

fn influences(
    mesh: &MeshObject,
    vertex: u32,
    skin: &Skin<'_>,
    bones: BonesPerVertex,
    dropped: &mut usize,
) -> Vec<BoneInfluence> {
    let mut found = Vec::new();
    for gw in &mesh.vertices[vertex as usize].groups {
        let joint = mesh
            .vertex_groups
            .get(gw.group as usize)
            .and_then(|name| skin.joints.get(name.as_str()));
        match joint {
            Some(&joint) => found.push(BoneInfluence {
                joint,
                weight: gw.weight,
            }),
            None => *dropped += 1,
        }
    }
    limit_influences(found, bones)
}

/// Extract, deduplicate and correlate one mesh object.
pub fn build_group(
    mesh: &MeshObject,
    settings: &GroupSettings,
    skin: Option<&Skin<'_>>,
    material_index: i32,
) -> H3dResult<MeshGroup> {
    validate(mesh)?;

    let positions = match settings.shape_keys {
        ShapeKeyMode::ApplyToBase => blended_positions(mesh)?,
        ShapeKeyMode::Export | ShapeKeyMode::Ignore => {
            mesh.vertices.iter().map(|v| v.position).collect()
        }
    };

    let space = Space::new(to_mat4(&mesh.world_transform));
    let mut dropped = 0usize;
    let loops: Vec<Vertex> = mesh
        .loops
        .iter()
        .enumerate()
        .map(|(i, lp)| {
            let mut vertex = Vertex::new(
                space.point(positions[lp.vertex as usize]),
                space.normal(lp.normal),
                lp.uv,
                i as u32,
            );
            if let Some(skin) = skin {
                vertex.influences =
                    influences(mesh, lp.vertex, skin, settings.bones_per_vertex, &mut dropped);
            }
            vertex
        })
        .collect();
    if dropped > 0 {
        debug!(
            mesh = %mesh.name,
            dropped,
            "vertex group weights without a matching joint were dropped"
        );
    }

    let merged = match settings.dedup {
        Some(policy) => dedup::deduplicate(&loops, &mesh.triangles, policy),
        None => dedup::keep_all(&loops, &mesh.triangles),
    };

    let mut shape_keys = Vec::new();
    if settings.shape_keys == ShapeKeyMode::Export {
        for block in &mesh.shape_keys {
            check_key_length(mesh, &block.name, block.positions.len())?;
            if let Some(normals) = &block.normals {
                if normals.len() != mesh.loops.len() {
                    return Err(Report::new(ErrorKind::ShapeKeyMismatch {
                        mesh: mesh.name.clone(),
                        key: block.name.clone(),
                        expected: mesh.loops.len(),
                        actual: normals.len(),
                    }));
                }
            }
            let morph_loops: Vec<MorphVertex> = mesh
                .loops
                .iter()
                .enumerate()
                .map(|(i, lp)| {
                    let normal = block
                        .normals
                        .as_ref()
                        .map_or(lp.normal, |normals| normals[i]);
                    MorphVertex {
                        position: space.point(block.positions[lp.vertex as usize]),
                        normal: space.normal(normal),
                    }
                })
                .collect();
            shape_keys.push(shape_key::correlate(
                &mesh.name,
                &block.name,
                &merged.vertices,
                loops.len(),
                &morph_loops,
            )?);
        }
    }

    debug!(
        mesh = %mesh.name,
        triangles = merged.triangles.len(),
        vertices = merged.vertices.len(),
        shape_keys = shape_keys.len(),
        "built mesh group"
    );

    Ok(MeshGroup {
        name: mesh.name.clone(),
        material_index,
        triangles: merged.triangles,
        vertices: merged.vertices,
        armature: skin.map(|s| s.armature.to_string()),
        shape_keys,
    })
}
