use crate::error::ErrorKind;

/// Upper bound on influence slots per vertex.
pub const MAX_BONES_PER_VERTEX: u8 = 4;

/// Number of `(joint, weight)` slots written for every vertex, 1 through 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8", into = "u8"))]
pub struct BonesPerVertex(u8);

impl BonesPerVertex {
    pub fn new(count: u8) -> Option<Self> {
        (1..=MAX_BONES_PER_VERTEX)
            .contains(&count)
            .then_some(Self(count))
    }

    pub fn get(self) -> usize {
        self.0 as usize
    }
}

impl Default for BonesPerVertex {
    fn default() -> Self {
        Self(MAX_BONES_PER_VERTEX)
    }
}

impl TryFrom<u8> for BonesPerVertex {
    type Error = ErrorKind;

    fn try_from(count: u8) -> Result<Self, Self::Error> {
        Self::new(count).ok_or(ErrorKind::InvalidBonesPerVertex(count))
    }
}

impl From<BonesPerVertex> for u8 {
    fn from(value: BonesPerVertex) -> Self {
        value.0
    }
}

/// A joint and how strongly it pulls on a vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneInfluence {
    pub joint: i32,
    pub weight: f32,
}

impl BoneInfluence {
    /// Wire value of an unused slot.
    pub const EMPTY: BoneInfluence = BoneInfluence {
        joint: -1,
        weight: 0.0,
    };
}

/// One mesh corner after extraction. Before deduplication there is one per
/// loop; afterwards one per canonical vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    /// At most `bones_per_vertex` entries, heaviest first.
    pub influences: Vec<BoneInfluence>,
    /// Loop index this vertex was extracted from.
    pub original_index: u32,
    pub canonical_index: Option<u32>,
}

impl Vertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2], original_index: u32) -> Self {
        Self {
            position,
            normal,
            uv,
            influences: Vec::new(),
            original_index,
            canonical_index: None,
        }
    }

    /// Influences padded with [`BoneInfluence::EMPTY`] to exactly `slots`
    /// entries.
    pub fn influence_slots(&self, slots: BonesPerVertex) -> impl Iterator<Item = BoneInfluence> + '_ {
        self.influences
            .iter()
            .copied()
            .chain(std::iter::repeat(BoneInfluence::EMPTY))
            .take(slots.get())
    }
}

/// Three indices into a group's canonical vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Triangle(pub [u32; 3]);

/// Keep the `max` heaviest influences and rescale them to sum to one.
///
/// Entries without a joint or with a non-positive weight are dropped first.
/// Ties keep their input order.
pub fn limit_influences(mut influences: Vec<BoneInfluence>, max: BonesPerVertex) -> Vec<BoneInfluence> {
    influences.retain(|inf| inf.joint >= 0 && inf.weight > 0.0);
    influences.sort_by(|a, b| b.weight.total_cmp(&a.weight));
    influences.truncate(max.get());

    let total: f32 = influences.iter().map(|inf| inf.weight).sum();
    if total > 0.0 {
        for inf in &mut influences {
            inf.weight /= total;
        }
    }
    influences
}
