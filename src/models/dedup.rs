//! Vertex canonicalization.
//!
//! Every policy produces the same three things: the reduced vertex list, the
//! triangle list rewritten against it, and the loop → canonical mapping that
//! shape keys are later correlated through.

use std::collections::HashMap;

use tracing::debug;

use super::kdtree::KdTree;
use super::vertex::{Triangle, Vertex};

/// Decimal digits kept by [`DedupPolicy::ExactKey`].
pub const KEY_PRECISION: f32 = 1000.0;

/// Per-attribute tolerance of [`DedupPolicy::Spatial`].
pub const SPATIAL_EPSILON: f32 = 0.01;

/// How two loops are judged to be the same vertex.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DedupPolicy {
    /// Equal position, normal and UV after rounding to three decimals.
    #[default]
    ExactKey,
    /// Within [`SPATIAL_EPSILON`] on every position, normal and UV component.
    Spatial,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Deduplicated {
    pub vertices: Vec<Vertex>,
    pub triangles: Vec<Triangle>,
    /// Canonical index of every input vertex.
    pub canonical: Vec<u32>,
}

/// Merge equivalent vertices and rewrite `triangles` against the result.
///
/// `triangles` index into `vertices`; callers validate them beforehand.
/// Canonical vertices appear in first-seen order and keep their attribute
/// values untouched.
pub fn deduplicate(vertices: &[Vertex], triangles: &[[u32; 3]], policy: DedupPolicy) -> Deduplicated {
    let canonical = match policy {
        DedupPolicy::ExactKey => exact_key_mapping(vertices),
        DedupPolicy::Spatial => spatial_mapping(vertices),
    };
    let result = assemble(vertices, triangles, canonical);
    debug!(
        ?policy,
        loops = vertices.len(),
        vertices = result.vertices.len(),
        "deduplicated vertices"
    );
    result
}

/// Identity mapping: every input vertex stays its own canonical vertex.
pub fn keep_all(vertices: &[Vertex], triangles: &[[u32; 3]]) -> Deduplicated {
    let canonical = (0..vertices.len() as u32).collect();
    assemble(vertices, triangles, canonical)
}

type VertexKey = [i64; 8];

fn rounded(value: f32) -> i64 {
    (value * KEY_PRECISION).round() as i64
}

fn vertex_key(v: &Vertex) -> VertexKey {
    [
        rounded(v.position[0]),
        rounded(v.position[1]),
        rounded(v.position[2]),
        rounded(v.normal[0]),
        rounded(v.normal[1]),
        rounded(v.normal[2]),
        rounded(v.uv[0]),
        rounded(v.uv[1]),
    ]
}

fn exact_key_mapping(vertices: &[Vertex]) -> Vec<u32> {
    let mut seen: HashMap<VertexKey, u32> = HashMap::with_capacity(vertices.len());
    let mut next = 0u32;
    vertices
        .iter()
        .map(|v| {
            *seen.entry(vertex_key(v)).or_insert_with(|| {
                next += 1;
                next - 1
            })
        })
        .collect()
}

fn attributes_match(a: &Vertex, b: &Vertex) -> bool {
    let close = |x: f32, y: f32| (x - y).abs() <= SPATIAL_EPSILON;
    a.normal.iter().zip(&b.normal).all(|(x, y)| close(*x, *y))
        && a.uv.iter().zip(&b.uv).all(|(x, y)| close(*x, *y))
}

fn spatial_mapping(vertices: &[Vertex]) -> Vec<u32> {
    let positions: Vec<[f32; 3]> = vertices.iter().map(|v| v.position).collect();
    let tree = KdTree::build(&positions);

    let mut canonical: Vec<Option<u32>> = vec![None; vertices.len()];
    let mut next = 0u32;
    for (i, query) in vertices.iter().enumerate() {
        if canonical[i].is_some() {
            continue;
        }
        let id = next;
        next += 1;
        canonical[i] = Some(id);

        // The tree matches on position; normal and UV are checked per hit.
        tree.within(query.position, SPATIAL_EPSILON, |j| {
            if canonical[j].is_none() && attributes_match(query, &vertices[j]) {
                canonical[j] = Some(id);
            }
        });
    }
    canonical.into_iter().map(|c| c.unwrap_or_default()).collect()
}

fn assemble(vertices: &[Vertex], triangles: &[[u32; 3]], canonical: Vec<u32>) -> Deduplicated {
    let mut out: Vec<Vertex> = Vec::new();
    for (v, &id) in vertices.iter().zip(&canonical) {
        if id as usize == out.len() {
            let mut kept = v.clone();
            kept.canonical_index = Some(id);
            out.push(kept);
        }
    }

    let triangles = triangles
        .iter()
        .map(|tri| Triangle(tri.map(|loop_index| canonical[loop_index as usize])))
        .collect();

    Deduplicated {
        vertices: out,
        triangles,
        canonical,
    }
}
