//! Sparse keyframe extraction.
//!
//! A joint receives a keyframe only on frames where the provider reports an
//! authored key on its location or axis-angle rotation channel. Everything in
//! between is left to the consumer.

use std::ops::RangeInclusive;

use glam::Mat4;
use tracing::debug;

use super::skeleton::{Armature, decompose};
use crate::scene::{ArmatureObject, Channel, PoseSource, to_mat4};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    pub frame: i32,
    pub position: [f32; 3],
    /// Euler XYZ, radians.
    pub rotation: [f32; 3],
}

/// A bone's pose relative to its own rest pose, in its parent's space.
///
/// All inputs are armature-space matrices.
pub fn local_pose(rest: Mat4, pose: Mat4, parent: Option<(Mat4, Mat4)>) -> Mat4 {
    match parent {
        Some((parent_rest, parent_pose)) => {
            (parent_rest.inverse() * rest).inverse() * (parent_pose.inverse() * pose)
        }
        None => rest.inverse() * pose,
    }
}

/// Append keyframes to `armature`'s joints for every authored key within
/// `frames`. Returns the number of keyframes added.
///
/// `armature` must be the flattened form of `rig`; joints and bones are
/// matched by position.
pub fn bake<P: PoseSource + ?Sized>(
    source: &P,
    rig: &ArmatureObject,
    armature: &mut Armature,
    frames: RangeInclusive<i32>,
) -> usize {
    let keyed: Vec<(&[i32], &[i32])> = rig
        .bones
        .iter()
        .map(|bone| {
            (
                source.authored_frames(&rig.name, &bone.name, Channel::Location),
                source.authored_frames(&rig.name, &bone.name, Channel::RotationAxisAngle),
            )
        })
        .collect();

    let mut added = 0;
    for frame in frames {
        let due: Vec<usize> = keyed
            .iter()
            .enumerate()
            .filter(|(_, (location, rotation))| location.contains(&frame) || rotation.contains(&frame))
            .map(|(i, _)| i)
            .collect();
        if due.is_empty() {
            continue;
        }

        let pose = source.evaluate_pose_at(&rig.name, frame);
        for i in due {
            let bone = &rig.bones[i];
            let joint = &mut armature.joints[i];
            let parent = usize::try_from(joint.parent_index)
                .ok()
                .map(|p| &rig.bones[p])
                .map(|parent| (to_mat4(&parent.matrix_local), pose.matrix(parent)));

            let local = local_pose(to_mat4(&bone.matrix_local), pose.matrix(bone), parent);
            let (position, rotation) = decompose(local);
            joint.keyframes.push(Keyframe {
                frame,
                position,
                rotation,
            });
            added += 1;
        }
    }

    debug!(armature = %rig.name, keyframes = added, "baked animation");
    added
}
