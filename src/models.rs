//! The compiled asset model and the algorithms that produce it.

/// Sparse keyframe extraction
pub mod animation;
/// Exact-key and spatial vertex deduplication
pub mod dedup;
/// Mesh groups, the per-object unit of geometry
pub mod group;
/// 3-d tree over vertex positions used by spatial deduplication
pub mod kdtree;
/// Material descriptors and the scene-wide material table
pub mod material;
/// Morph target re-indexing against a deduplicated base mesh
pub mod shape_key;
/// Bone hierarchy flattening
pub mod skeleton;
/// Plain vertex, triangle and bone influence data
pub mod vertex;

use self::group::MeshGroup;
use self::material::MaterialDescriptor;
use self::skeleton::Armature;
use self::vertex::BonesPerVertex;

/// Everything written to one H3D file, in wire order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct H3dAsset {
    pub groups: Vec<MeshGroup>,
    pub materials: Vec<MaterialDescriptor>,
    pub armatures: Vec<Armature>,
    /// Influence slots written per vertex. Not stored in the file itself.
    pub bones_per_vertex: BonesPerVertex,
}
