//! JSON scene descriptions.
//!
//! ```json
//! {
//!   "frame_start": 1,
//!   "frame_end": 24,
//!   "materials": [{ "id": 7, "diffuse_color": [1, 0, 0], "textures": ["//tex/skin.png"] }],
//!   "objects": [
//!     { "type": "mesh", "name": "Body", "material": 7, "armature": "Rig",
//!       "vertices": [{ "position": [0, 0, 0], "groups": [{ "group": 0, "weight": 1 }] }],
//!       "loops": [{ "vertex": 0, "normal": [0, 0, 1], "uv": [0, 0] }],
//!       "triangles": [[0, 0, 0]], "vertex_groups": ["Hip"] },
//!     { "type": "armature", "name": "Rig", "bones": [{ "name": "Hip" }] }
//!   ],
//!   "animations": { "Rig": { "channels": { "Hip": { "rotation": [10] } } } }
//! }
//! ```

use std::path::Path;

use rootcause::Report;

use crate::error::{ErrorKind, H3dResult};
use crate::scene::Scene;

pub fn scene_from_str(text: &str) -> H3dResult<Scene> {
    serde_json::from_str(text).map_err(|err| Report::new(ErrorKind::from(err)))
}

pub fn load_scene(path: &Path) -> H3dResult<Scene> {
    let text = std::fs::read_to_string(path).map_err(|err| Report::new(ErrorKind::from(err)))?;
    scene_from_str(&text)
}
