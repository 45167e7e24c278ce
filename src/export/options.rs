use std::ops::RangeInclusive;

use bon::Builder;
use rootcause::Report;

use crate::error::{ErrorKind, H3dResult};
use crate::models::dedup::DedupPolicy;
use crate::models::group::GroupSettings;
use crate::models::shape_key::ShapeKeyMode;
use crate::models::vertex::BonesPerVertex;

/// Options controlling one export. Held fixed for the whole export.
#[derive(Debug, Clone, PartialEq, Builder)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ExportOptions {
    /// Write the text encoding instead of binary. Default: false.
    #[builder(default)]
    pub textual: bool,
    /// Merge equivalent loops into shared vertices. Default: true.
    #[builder(default = true)]
    pub remove_duplicate_vertices: bool,
    #[builder(default)]
    pub dedup_policy: DedupPolicy,
    /// Influence slots per vertex, 1 through 4. Default: 4.
    #[builder(default)]
    pub bones_per_vertex: BonesPerVertex,
    /// Write armatures and skin meshes against them. Default: true.
    #[builder(default = true)]
    pub export_armatures: bool,
    /// Bake authored keys into joint keyframes. Default: true.
    #[builder(default = true)]
    pub export_keyframes: bool,
    #[builder(default)]
    pub shape_keys: ShapeKeyMode,
    /// First frame to sample. `None` uses the scene's start frame.
    pub frame_start: Option<i32>,
    /// Last frame to sample, inclusive. `None` uses the scene's end frame.
    pub frame_end: Option<i32>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ExportOptions {
    /// Closed frame range to bake, falling back to the scene's own range.
    pub fn frame_range(&self, scene_range: (i32, i32)) -> H3dResult<RangeInclusive<i32>> {
        let start = self.frame_start.unwrap_or(scene_range.0);
        let end = self.frame_end.unwrap_or(scene_range.1);
        if start > end {
            return Err(Report::new(ErrorKind::InvalidFrameRange { start, end }));
        }
        Ok(start..=end)
    }

    pub fn group_settings(&self) -> GroupSettings {
        GroupSettings {
            dedup: self
                .remove_duplicate_vertices
                .then_some(self.dedup_policy),
            bones_per_vertex: self.bones_per_vertex,
            shape_keys: self.shape_keys,
        }
    }
}
