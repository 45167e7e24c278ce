//! Morph targets aligned with a deduplicated base mesh.
//!
//! Shape keys share the base mesh's loop topology, so slot `i` of a morph
//! buffer is simply the morph loop that base canonical vertex `i` was taken
//! from. Deduplicating the morph buffer on its own would group loops
//! differently and break that correspondence.

use rootcause::Report;

use super::vertex::Vertex;
use crate::error::{ErrorKind, H3dResult};

/// What to do with a mesh's shape key blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ShapeKeyMode {
    /// Write every block as a morph target, evaluated at full strength.
    #[default]
    Export,
    /// Blend every block into the base mesh at its current value.
    ApplyToBase,
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MorphVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShapeKey {
    pub name: String,
    /// One entry per canonical base vertex.
    pub vertices: Vec<MorphVertex>,
}

/// Re-index `morph_loops` (one entry per base loop) into base canonical order.
pub fn correlate(
    mesh: &str,
    name: &str,
    base: &[Vertex],
    base_loop_count: usize,
    morph_loops: &[MorphVertex],
) -> H3dResult<ShapeKey> {
    if morph_loops.len() != base_loop_count {
        return Err(Report::new(ErrorKind::ShapeKeyMismatch {
            mesh: mesh.to_string(),
            key: name.to_string(),
            expected: base_loop_count,
            actual: morph_loops.len(),
        }));
    }

    let mut vertices = Vec::with_capacity(base.len());
    for vertex in base {
        let Some(morph) = morph_loops.get(vertex.original_index as usize) else {
            return Err(Report::new(ErrorKind::ShapeKeyMismatch {
                mesh: mesh.to_string(),
                key: name.to_string(),
                expected: vertex.original_index as usize + 1,
                actual: morph_loops.len(),
            }));
        };
        vertices.push(*morph);
    }

    Ok(ShapeKey {
        name: name.to_string(),
        vertices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::dedup::{DedupPolicy, deduplicate};

    fn morph(x: f32) -> MorphVertex {
        MorphVertex {
            position: [x, 0.0, 0.0],
            normal: [0.0, 0.0, 1.0],
        }
    }

    #[test]
    fn slots_follow_original_loops() {
        // Loops 0 and 2 coincide in the base mesh but move apart in the key.
        let base_loops = vec![
            Vertex::new([0.0; 3], [0.0, 0.0, 1.0], [0.0; 2], 0),
            Vertex::new([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0; 2], 1),
            Vertex::new([0.0; 3], [0.0, 0.0, 1.0], [0.0; 2], 2),
            Vertex::new([2.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0; 2], 3),
        ];
        let base = deduplicate(&base_loops, &[[0, 1, 3], [2, 3, 1]], DedupPolicy::ExactKey);
        assert_eq!(base.vertices.len(), 3);

        let key_loops = vec![morph(10.0), morph(11.0), morph(12.0), morph(13.0)];
        let key = correlate("m", "smile", &base.vertices, base_loops.len(), &key_loops).unwrap();

        assert_eq!(key.vertices.len(), base.vertices.len());
        for (slot, vertex) in base.vertices.iter().enumerate() {
            assert_eq!(key.vertices[slot], key_loops[vertex.original_index as usize]);
        }
        assert_eq!(key.vertices[0].position[0], 10.0);
        assert_eq!(key.vertices[2].position[0], 13.0);
    }

    #[test]
    fn loop_count_mismatch_is_rejected() {
        let base = vec![Vertex::new([0.0; 3], [0.0, 0.0, 1.0], [0.0; 2], 0)];
        let err = correlate("Body", "blink", &base, 3, &[morph(0.0), morph(1.0)]).unwrap_err();
        assert!(err.to_string().contains("blink"));
    }

    #[test]
    fn empty_base_yields_empty_key() {
        let key = correlate("m", "k", &[], 0, &[]).unwrap();
        assert!(key.vertices.is_empty());
    }
}
