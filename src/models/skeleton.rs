//! Bone hierarchy → flat joint array.
//!
//! Joints keep the provider's bone order. Parents are resolved by name after
//! every joint exists, so a child may appear before its parent.

use std::collections::HashMap;
use std::f32::consts::FRAC_PI_2;

use glam::{EulerRot, Mat4};
use tracing::warn;

use super::animation::Keyframe;
use crate::scene::{ArmatureObject, to_mat4};

/// Rotates the authoring tool's Z-up space into the engine's Y-up space.
pub fn axis_correction() -> Mat4 {
    Mat4::from_rotation_x(-FRAC_PI_2)
}

/// Translation and Euler XYZ angles (radians) of a transform. Scale is
/// discarded.
///
/// The angles follow the `R = Rz * Ry * Rx` convention: X is applied first.
pub fn decompose(m: Mat4) -> ([f32; 3], [f32; 3]) {
    let (_scale, rotation, translation) = m.to_scale_rotation_translation();
    let (z, y, x) = rotation.to_euler(EulerRot::ZYX);
    (translation.to_array(), [x, y, z])
}

#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    pub name: String,
    pub parent_name: Option<String>,
    /// Index of the parent in the same armature, or -1.
    pub parent_index: i32,
    /// Position of this joint in its armature's array.
    pub index: u32,
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    /// Ascending by frame.
    pub keyframes: Vec<Keyframe>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Armature {
    pub name: String,
    pub joints: Vec<Joint>,
}

impl Armature {
    /// Joint indices by name. On name collisions the last joint wins.
    pub fn joint_indices(&self) -> HashMap<&str, i32> {
        self.joints
            .iter()
            .map(|joint| (joint.name.as_str(), joint.index as i32))
            .collect()
    }
}

/// Flatten an armature's bones into joints carrying corrected rest
/// transforms and resolved parent indices.
pub fn flatten(armature: &ArmatureObject) -> Armature {
    let base = axis_correction() * to_mat4(&armature.world_transform);

    let mut joints: Vec<Joint> = armature
        .bones
        .iter()
        .map(|bone| {
            let (position, rotation) = decompose(base * to_mat4(&bone.matrix_local));
            Joint {
                name: bone.name.clone(),
                parent_name: bone.parent.clone(),
                parent_index: -1,
                index: 0,
                position,
                rotation,
                keyframes: Vec::new(),
            }
        })
        .collect();

    let mut by_name: HashMap<String, i32> = HashMap::with_capacity(joints.len());
    for (i, joint) in joints.iter_mut().enumerate() {
        joint.index = i as u32;
        by_name.insert(joint.name.clone(), i as i32);
    }

    for joint in &mut joints {
        let Some(parent) = &joint.parent_name else {
            continue;
        };
        match by_name.get(parent) {
            Some(&index) => joint.parent_index = index,
            None => warn!(
                armature = %armature.name,
                joint = %joint.name,
                parent = %parent,
                "parent bone not found, treating joint as a root"
            ),
        }
    }

    Armature {
        name: armature.name.clone(),
        joints,
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::scene::{Bone, IDENTITY};

    fn bone(name: &str, parent: Option<&str>, matrix: Mat4) -> Bone {
        Bone {
            name: name.to_string(),
            parent: parent.map(str::to_string),
            matrix_local: matrix.to_cols_array_2d(),
        }
    }

    fn armature(bones: Vec<Bone>) -> ArmatureObject {
        ArmatureObject {
            name: "rig".to_string(),
            world_transform: IDENTITY,
            bones,
        }
    }

    fn assert_close(actual: [f32; 3], expected: [f32; 3]) {
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-5, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn decompose_round_trips_euler() {
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0))
            * Mat4::from_rotation_z(0.3)
            * Mat4::from_rotation_y(-0.2)
            * Mat4::from_rotation_x(0.7);
        let (position, rotation) = decompose(m);
        assert_close(position, [1.0, 2.0, 3.0]);
        assert_close(rotation, [0.7, -0.2, 0.3]);
    }

    #[test]
    fn rest_transform_is_axis_corrected() {
        let rig = armature(vec![bone(
            "root",
            None,
            Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)),
        )]);
        let flat = flatten(&rig);
        assert_close(flat.joints[0].position, [1.0, 3.0, -2.0]);
        assert_close(flat.joints[0].rotation, [-FRAC_PI_2, 0.0, 0.0]);
    }

    #[test]
    fn armature_world_transform_applies() {
        let mut rig = armature(vec![bone("root", None, Mat4::IDENTITY)]);
        rig.world_transform = Mat4::from_translation(Vec3::new(0.0, 0.0, 5.0)).to_cols_array_2d();
        let flat = flatten(&rig);
        assert_close(flat.joints[0].position, [0.0, 5.0, 0.0]);
    }

    #[test]
    fn parents_resolve_regardless_of_order() {
        let rig = armature(vec![
            bone("hand", Some("arm"), Mat4::IDENTITY),
            bone("root", None, Mat4::IDENTITY),
            bone("arm", Some("root"), Mat4::IDENTITY),
        ]);
        let flat = flatten(&rig);
        let parents: Vec<i32> = flat.joints.iter().map(|j| j.parent_index).collect();
        assert_eq!(parents, vec![2, -1, 1]);

        for joint in &flat.joints {
            assert!(joint.parent_index == -1 || (joint.parent_index as usize) < flat.joints.len());
            if joint.parent_index >= 0 {
                let parent = &flat.joints[joint.parent_index as usize];
                assert_eq!(Some(&parent.name), joint.parent_name.as_ref());
            }
        }
        let indices: Vec<u32> = flat.joints.iter().map(|j| j.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn missing_parent_becomes_root() {
        let rig = armature(vec![bone("orphan", Some("ghost"), Mat4::IDENTITY)]);
        let flat = flatten(&rig);
        assert_eq!(flat.joints[0].parent_index, -1);
        assert_eq!(flat.joints[0].parent_name.as_deref(), Some("ghost"));
    }

    #[test]
    fn duplicate_names_resolve_to_last() {
        let rig = armature(vec![
            bone("a", None, Mat4::IDENTITY),
            bone("a", None, Mat4::IDENTITY),
            bone("b", Some("a"), Mat4::IDENTITY),
        ]);
        let flat = flatten(&rig);
        assert_eq!(flat.joints[2].parent_index, 1);
        assert_eq!(flat.joint_indices()["a"], 1);
    }
}
