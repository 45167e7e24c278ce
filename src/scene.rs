//! The Scene Provider contract: everything the compiler reads from an
//! authoring tool, already triangulated and resolved into plain data.
//!
//! [`Scene`] is an in-memory provider. With the `json` feature it can be
//! loaded from a JSON scene description (see [`json`]).

#[cfg(feature = "json")]
pub mod json;

use std::collections::{BTreeMap, HashMap};

use glam::Mat4;

/// Column-major 4x4 matrix as stored in scene descriptions.
pub type Matrix = [[f32; 4]; 4];

pub const IDENTITY: Matrix = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

#[cfg(feature = "serde")]
fn identity() -> Matrix {
    IDENTITY
}

pub fn to_mat4(m: &Matrix) -> Mat4 {
    Mat4::from_cols_array_2d(m)
}

/// Opaque material handle assigned by the provider. Two references with the
/// same id are the same material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct MaterialId(pub u32);

/// Render attributes of one authored material, before normalization.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SourceMaterial {
    pub id: MaterialId,
    pub name: String,
    pub diffuse_color: [f32; 3],
    pub diffuse_intensity: f32,
    pub specular_color: [f32; 3],
    pub specular_intensity: f32,
    pub ambient: f32,
    /// Emission strength, scaled by the diffuse color.
    pub emit: f32,
    pub hardness: f32,
    pub alpha: f32,
    /// Image paths of the texture slots, in slot order.
    pub textures: Vec<String>,
}

impl Default for SourceMaterial {
    fn default() -> Self {
        Self {
            id: MaterialId(0),
            name: String::new(),
            diffuse_color: [0.8, 0.8, 0.8],
            diffuse_intensity: 0.8,
            specular_color: [1.0, 1.0, 1.0],
            specular_intensity: 0.5,
            ambient: 1.0,
            emit: 0.0,
            hardness: 50.0,
            alpha: 1.0,
            textures: Vec::new(),
        }
    }
}

/// A vertex-group membership of a source vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroupWeight {
    pub group: u32,
    pub weight: f32,
}

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SourceVertex {
    pub position: [f32; 3],
    #[cfg_attr(feature = "serde", serde(default))]
    pub groups: Vec<GroupWeight>,
}

/// One face corner.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SourceLoop {
    pub vertex: u32,
    pub normal: [f32; 3],
    #[cfg_attr(feature = "serde", serde(default))]
    pub uv: [f32; 2],
}

/// A shape key block. `positions` are absolute, one per source vertex.
/// `normals`, when present, hold one normal per loop.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShapeKeyBlock {
    pub name: String,
    /// Current blend value, used when shape keys are applied to the base.
    #[cfg_attr(feature = "serde", serde(default))]
    pub value: f32,
    pub positions: Vec<[f32; 3]>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub normals: Option<Vec<[f32; 3]>>,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MeshObject {
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default = "identity"))]
    pub world_transform: Matrix,
    pub vertices: Vec<SourceVertex>,
    pub loops: Vec<SourceLoop>,
    /// Loop indices, three per triangle.
    pub triangles: Vec<[u32; 3]>,
    /// Vertex group names, indexed by [`GroupWeight::group`].
    #[cfg_attr(feature = "serde", serde(default))]
    pub vertex_groups: Vec<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub material: Option<MaterialId>,
    /// Name of the armature deforming this mesh.
    #[cfg_attr(feature = "serde", serde(default))]
    pub armature: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub shape_keys: Vec<ShapeKeyBlock>,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bone {
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub parent: Option<String>,
    /// Rest matrix in armature space.
    #[cfg_attr(feature = "serde", serde(default = "identity"))]
    pub matrix_local: Matrix,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArmatureObject {
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default = "identity"))]
    pub world_transform: Matrix,
    pub bones: Vec<Bone>,
}

impl ArmatureObject {
    pub fn bone(&self, name: &str) -> Option<&Bone> {
        self.bones.iter().find(|b| b.name == name)
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum SceneObject {
    Mesh(MeshObject),
    Armature(ArmatureObject),
}

/// Animation channels an authored key can live on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Location,
    RotationAxisAngle,
}

/// Armature-space bone matrices at one frame. Bones missing from the map are
/// at rest.
#[derive(Debug, Clone, Default)]
pub struct Pose {
    pub bones: HashMap<String, Mat4>,
}

impl Pose {
    pub fn matrix(&self, bone: &Bone) -> Mat4 {
        self.bones
            .get(&bone.name)
            .copied()
            .unwrap_or_else(|| to_mat4(&bone.matrix_local))
    }
}

/// Pose evaluation capability handed to the animation baker.
pub trait PoseSource {
    /// Frames holding an authored key on `channel` of `bone`.
    fn authored_frames(&self, armature: &str, bone: &str, channel: Channel) -> &[i32];
    fn evaluate_pose_at(&self, armature: &str, frame: i32) -> Pose;
}

pub trait SceneProvider: PoseSource {
    fn objects(&self) -> &[SceneObject];
    fn materials(&self) -> &[SourceMaterial];
    /// The scene's closed frame range.
    fn frame_range(&self) -> (i32, i32);
}

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BoneChannels {
    pub location: Vec<i32>,
    pub rotation: Vec<i32>,
}

/// Authored keys and sampled poses for one armature.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ArmatureAnimation {
    pub channels: HashMap<String, BoneChannels>,
    /// Armature-space bone matrices keyed by frame.
    pub poses: BTreeMap<i32, HashMap<String, Matrix>>,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Scene {
    #[cfg_attr(feature = "serde", serde(default))]
    pub objects: Vec<SceneObject>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub materials: Vec<SourceMaterial>,
    #[cfg_attr(feature = "serde", serde(default = "default_frame_start"))]
    pub frame_start: i32,
    #[cfg_attr(feature = "serde", serde(default = "default_frame_end"))]
    pub frame_end: i32,
    /// Animation data keyed by armature name.
    #[cfg_attr(feature = "serde", serde(default))]
    pub animations: HashMap<String, ArmatureAnimation>,
}

#[cfg(feature = "serde")]
fn default_frame_start() -> i32 {
    1
}

#[cfg(feature = "serde")]
fn default_frame_end() -> i32 {
    250
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            objects: Vec::new(),
            materials: Vec::new(),
            frame_start: 1,
            frame_end: 250,
            animations: HashMap::new(),
        }
    }
}

impl Scene {
    fn armature(&self, name: &str) -> Option<&ArmatureObject> {
        self.objects.iter().find_map(|obj| match obj {
            SceneObject::Armature(a) if a.name == name => Some(a),
            _ => None,
        })
    }
}

impl PoseSource for Scene {
    fn authored_frames(&self, armature: &str, bone: &str, channel: Channel) -> &[i32] {
        let Some(channels) = self
            .animations
            .get(armature)
            .and_then(|anim| anim.channels.get(bone))
        else {
            return &[];
        };
        match channel {
            Channel::Location => &channels.location,
            Channel::RotationAxisAngle => &channels.rotation,
        }
    }

    /// Holds the most recent sampled pose at or before `frame`; bones that
    /// were never sampled stay at rest.
    fn evaluate_pose_at(&self, armature: &str, frame: i32) -> Pose {
        let mut pose = Pose::default();
        let Some(arm) = self.armature(armature) else {
            return pose;
        };
        for bone in &arm.bones {
            pose.bones.insert(bone.name.clone(), to_mat4(&bone.matrix_local));
        }
        if let Some((_, sampled)) = self
            .animations
            .get(armature)
            .and_then(|anim| anim.poses.range(..=frame).next_back())
        {
            for (name, matrix) in sampled {
                pose.bones.insert(name.clone(), to_mat4(matrix));
            }
        }
        pose
    }
}

impl SceneProvider for Scene {
    fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    fn materials(&self) -> &[SourceMaterial] {
        &self.materials
    }

    fn frame_range(&self) -> (i32, i32) {
        (self.frame_start, self.frame_end)
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;

    fn two_bone_scene() -> Scene {
        let root = Bone {
            name: "root".to_string(),
            parent: None,
            matrix_local: IDENTITY,
        };
        let child = Bone {
            name: "child".to_string(),
            parent: Some("root".to_string()),
            matrix_local: Mat4::from_translation(Vec3::Y).to_cols_array_2d(),
        };
        let mut anim = ArmatureAnimation::default();
        anim.poses.insert(
            5,
            HashMap::from([(
                "child".to_string(),
                Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0)).to_cols_array_2d(),
            )]),
        );
        Scene {
            objects: vec![SceneObject::Armature(ArmatureObject {
                name: "rig".to_string(),
                world_transform: IDENTITY,
                bones: vec![root, child],
            })],
            animations: HashMap::from([("rig".to_string(), anim)]),
            ..Default::default()
        }
    }

    #[test]
    fn pose_before_first_sample_is_rest() {
        let scene = two_bone_scene();
        let pose = scene.evaluate_pose_at("rig", 1);
        assert_eq!(pose.bones["child"].w_axis.y, 1.0);
        assert_eq!(pose.bones["root"], Mat4::IDENTITY);
    }

    #[test]
    fn pose_holds_last_sample() {
        let scene = two_bone_scene();
        let pose = scene.evaluate_pose_at("rig", 9);
        assert_eq!(pose.bones["child"].w_axis.y, 2.0);
    }

    #[test]
    fn unknown_armature_has_no_keys() {
        let scene = two_bone_scene();
        assert!(scene.authored_frames("nope", "child", Channel::Location).is_empty());
        assert!(scene.evaluate_pose_at("nope", 1).bones.is_empty());
    }
}
