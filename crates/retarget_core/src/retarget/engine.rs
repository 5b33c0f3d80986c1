use crate::common::pose::{MotionTrack, Pose};
use crate::common::skeleton::Skeleton;
use crate::retarget::mapping::{map_skeletons, normalize_bone_name};
use log::debug;
use nalgebra as na;
use retarget_utils::Vector3f;

/// How the source root's translation transfers onto the target
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RootTranslationMode {
    /// Full displacement from the source bind position is applied
    #[default]
    Full,
    /// Only the vertical displacement transfers; x/z stay at the target's
    /// bind position. For rigs with incompatible horizontal proportions
    /// driven by a stationary performer.
    VerticalOnly,
}

/// Static per-pair data resolved once at construction
#[derive(Clone, Copy, Debug)]
struct MappedJoint {
    src: usize,
    tgt: usize,
    src_bind_rot: na::UnitQuaternion<f32>,
    src_parent_rot: na::UnitQuaternion<f32>,
    tgt_parent_rot: na::UnitQuaternion<f32>,
    /// Bind-pose offset between the rigs for this joint,
    /// `conjugate(src_bind_world) * tgt_bind_world`
    convert: na::UnitQuaternion<f32>,
}

/// All static data needed to retarget poses from one skeleton onto another:
/// resolved bind poses, the name correspondence and the root joint. Built
/// once per (source, target) pair and immutable afterwards; per-frame
/// retargeting is stateless, so frames can be processed in any order.
pub struct RetargetingContext {
    mapped: Vec<MappedJoint>,
    src_num_joints: usize,
    src_root: usize,
    src_root_bind_position: Vector3f,
    /// Target joint the source root maps to, with its bind world position
    tgt_root: Option<(usize, Vector3f)>,
    tgt_rest_rotations: Vec<na::UnitQuaternion<f32>>,
    tgt_rest_root_translation: Vector3f,
    mode: RootTranslationMode,
}

impl RetargetingContext {
    /// Resolve both bind poses, build the joint correspondence and locate the
    /// root. `root_bone` names the skeletal root (e.g. "Hips"), compared with
    /// the same normalization as the joint mapping: an exact normalized match
    /// wins, otherwise the first joint whose normalized name ends with the
    /// root name is taken so prefixed rigs ("mixamorig_Hips") still resolve
    /// a plain "Hips".
    ///
    /// # Panics
    /// Will panic if no joints match between the two skeletons or if
    /// `root_bone` does not name a source joint; both indicate a setup bug
    /// that would otherwise corrupt every retargeted frame silently.
    pub fn new(source: &Skeleton, target: &Skeleton, root_bone: &str, mode: RootTranslationMode) -> Self {
        let src_bind = source.resolve_bind_pose();
        let tgt_bind = target.resolve_bind_pose();

        let pairs = map_skeletons(source, target);
        assert!(
            !pairs.is_empty(),
            "No joints of skeleton '{}' matched skeleton '{}'",
            source.name,
            target.name
        );
        debug!(
            "retargeting '{}' -> '{}': {} of {} joints mapped",
            source.name,
            target.name,
            pairs.len(),
            source.num_joints()
        );

        let root_normalized = normalize_bone_name(root_bone);
        let src_root = source
            .joints
            .iter()
            .position(|j| normalize_bone_name(&j.name) == root_normalized)
            .or_else(|| {
                source
                    .joints
                    .iter()
                    .position(|j| normalize_bone_name(&j.name).ends_with(&root_normalized))
            })
            .unwrap_or_else(|| panic!("Root bone '{root_bone}' not found in source skeleton '{}'", source.name));

        let mapped: Vec<MappedJoint> = pairs
            .iter()
            .map(|&(src, tgt)| {
                let src_bind_rot = src_bind.world_rotations[src];
                // a joint with no parent references its own bind rotation
                let src_parent_rot = source.joints[src]
                    .parent
                    .map_or(src_bind_rot, |p| src_bind.world_rotations[p]);
                let tgt_bind_rot = tgt_bind.world_rotations[tgt];
                let tgt_parent_rot = target.joints[tgt]
                    .parent
                    .map_or(tgt_bind_rot, |p| tgt_bind.world_rotations[p]);
                MappedJoint {
                    src,
                    tgt,
                    src_bind_rot,
                    src_parent_rot,
                    tgt_parent_rot,
                    convert: src_bind_rot.conjugate() * tgt_bind_rot,
                }
            })
            .collect();

        let tgt_root = pairs
            .iter()
            .copied()
            .find(|pair| pair.0 == src_root)
            .map(|pair| (pair.1, tgt_bind.world_positions[pair.1]));

        let tgt_rest_root_translation = target
            .joints
            .iter()
            .position(|j| j.parent.is_none())
            .map_or_else(Vector3f::zeros, |idx| target.joints[idx].local_position);

        Self {
            mapped,
            src_num_joints: source.num_joints(),
            src_root,
            src_root_bind_position: src_bind.world_positions[src_root],
            tgt_root,
            tgt_rest_rotations: target.joints.iter().map(|j| j.local_rotation).collect(),
            tgt_rest_root_translation,
            mode,
        }
    }

    /// Re-express one source pose on the target skeleton. Unmapped target
    /// joints keep their bind-local rotation. Stateless: depends only on the
    /// context and the given pose.
    ///
    /// # Panics
    /// Will panic if the pose does not cover the source skeleton's joints,
    /// which indicates a missed initialization step rather than bad frame
    /// data.
    pub fn retarget_pose(&self, source_pose: &Pose) -> Pose {
        assert_eq!(
            source_pose.num_joints(),
            self.src_num_joints,
            "Source pose covers {} joints but the context was built for {}",
            source_pose.num_joints(),
            self.src_num_joints
        );

        let mut out = Pose::new(self.tgt_rest_rotations.clone(), self.tgt_rest_root_translation);
        for m in &self.mapped {
            let src_local = source_pose.joint_rotations[m.src];
            // the source rotation anchored on the parent's bind world
            // rotation, a stable per-joint reference frame that avoids
            // compounding the animated parent chain
            let diff = m.src_parent_rot * src_local;
            // resolve the quaternion double cover so composition takes the
            // shorter path
            let convert = if diff.quaternion().coords.dot(&m.src_bind_rot.quaternion().coords) < 0.0 {
                na::UnitQuaternion::new_unchecked(-m.convert.into_inner())
            } else {
                m.convert
            };
            let tgt_local = m.tgt_parent_rot.conjugate() * (diff * convert);
            out.joint_rotations[m.tgt] = na::UnitQuaternion::new_normalize(tgt_local.into_inner());

            if m.src == self.src_root {
                if let Some((_, tgt_bind_position)) = self.tgt_root {
                    let displacement = source_pose.root_translation - self.src_root_bind_position;
                    let mut position = tgt_bind_position + displacement;
                    if self.mode == RootTranslationMode::VerticalOnly {
                        position.x = tgt_bind_position.x;
                        position.z = tgt_bind_position.z;
                    }
                    out.root_translation = position;
                }
            }
        }
        out
    }

    /// Retarget a whole track frame by frame. Frames are independent, order
    /// does not matter for correctness.
    pub fn retarget_track(&self, track: &MotionTrack) -> MotionTrack {
        let poses = track.poses.iter().map(|p| self.retarget_pose(p)).collect();
        MotionTrack::new(track.timestamps.clone(), poses)
    }

    /// Number of (source, target) joint pairs the context will retarget
    pub fn num_mapped_joints(&self) -> usize {
        self.mapped.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::skeleton::Joint;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    fn quat_z(angle: f32) -> na::UnitQuaternion<f32> {
        na::UnitQuaternion::from_axis_angle(&Vector3f::z_axis(), angle)
    }

    fn chain(name: &str, joint_names: &[&str]) -> Skeleton {
        let joints = joint_names
            .iter()
            .enumerate()
            .map(|(idx, n)| {
                Joint::new(
                    *n,
                    if idx == 0 { None } else { Some(idx - 1) },
                    if idx == 0 { Vector3f::new(0.0, 1.0, 0.0) } else { Vector3f::new(0.0, 0.2, 0.0) },
                )
            })
            .collect();
        Skeleton::new(name, joints)
    }

    #[test]
    fn identity_retarget_reproduces_local_rotations() {
        let names = ["Hips", "Spine", "LeftArm"];
        let source = chain("src", &names);
        let target = chain("tgt", &names);
        let context = RetargetingContext::new(&source, &target, "Hips", RootTranslationMode::Full);

        let mut pose = Pose::new_empty(source.num_joints());
        pose.joint_rotations[2] = quat_z(0.7);
        // an angle past PI exercises the double-cover branch
        pose.joint_rotations[1] = quat_z(3.5);
        pose.root_translation = Vector3f::new(0.3, 1.2, -0.1);

        let out = context.retarget_pose(&pose);
        for idx in 0..names.len() {
            assert!(
                out.joint_rotations[idx].angle_to(&pose.joint_rotations[idx]) < 1e-5,
                "joint {idx} should be reproduced exactly"
            );
        }
        assert_relative_eq!(out.root_translation, pose.root_translation, epsilon = 1e-5);
    }

    #[test]
    fn mixamorig_prefix_maps_and_transfers_rotation() {
        let source = chain("src", &["Hips", "Spine", "LeftArm"]);
        let target = chain("tgt", &["mixamorig_Hips", "mixamorig_Spine", "mixamorig_LeftArm"]);
        let context = RetargetingContext::new(&source, &target, "Hips", RootTranslationMode::Full);
        assert_eq!(context.num_mapped_joints(), 3);

        let mut pose = Pose::new_empty(3);
        pose.joint_rotations[2] = quat_z(FRAC_PI_2);
        pose.root_translation = Vector3f::new(0.0, 1.0, 0.0);

        let out = context.retarget_pose(&pose);
        assert!(out.joint_rotations[2].angle_to(&quat_z(FRAC_PI_2)) < 1e-5);
        assert!(out.joint_rotations[0].angle() < 1e-5);
        assert!(out.joint_rotations[1].angle() < 1e-5);
    }

    #[test]
    fn rotated_target_bind_pose_is_compensated() {
        // same topology, but the target's spine rest orientation differs
        let source = chain("src", &["Hips", "Spine", "Head"]);
        let mut target = chain("tgt", &["Hips", "Spine", "Head"]);
        target.joints[1].local_rotation = quat_z(0.4);
        let context = RetargetingContext::new(&source, &target, "Hips", RootTranslationMode::Full);

        let mut pose = Pose::new_empty(3);
        pose.joint_rotations[1] = quat_z(0.9);
        pose.root_translation = Vector3f::new(0.0, 1.0, 0.0);
        let out = context.retarget_pose(&pose);

        // all outputs stay unit quaternions
        for q in &out.joint_rotations {
            assert_relative_eq!(q.into_inner().norm(), 1.0, epsilon = 1e-4);
        }
        // the target spine's world orientation should match the source's
        // animated world orientation for this frame
        let src_world = source.resolve_bind_pose().world_rotations[0] * pose.joint_rotations[1];
        let tgt_parent_world = target.resolve_bind_pose().world_rotations[0];
        let tgt_world = tgt_parent_world * out.joint_rotations[1];
        let expected = src_world * (source.resolve_bind_pose().world_rotations[1].conjugate() * target.resolve_bind_pose().world_rotations[1]);
        assert!(tgt_world.angle_to(&expected) < 1e-4);
    }

    #[test]
    fn vertical_only_keeps_target_horizontal_position() {
        let source = chain("src", &["Hips", "Spine"]);
        let mut target = chain("tgt", &["Hips", "Spine"]);
        target.joints[0].local_position = Vector3f::new(2.0, 1.0, 3.0);
        let context = RetargetingContext::new(&source, &target, "Hips", RootTranslationMode::VerticalOnly);

        let mut pose = Pose::new_empty(2);
        // source root moved by (0.5, 0.4, -0.2) from its bind position (0,1,0)
        pose.root_translation = Vector3f::new(0.5, 1.4, -0.2);
        let out = context.retarget_pose(&pose);
        assert_relative_eq!(out.root_translation.x, 2.0, epsilon = 1e-6);
        assert_relative_eq!(out.root_translation.z, 3.0, epsilon = 1e-6);
        // y is additive displacement, not a scaled ratio
        assert_relative_eq!(out.root_translation.y, 1.4, epsilon = 1e-6);
    }

    #[test]
    fn full_mode_transfers_whole_displacement() {
        let source = chain("src", &["Hips"]);
        let mut target = chain("tgt", &["Hips"]);
        target.joints[0].local_position = Vector3f::new(2.0, 1.0, 3.0);
        let context = RetargetingContext::new(&source, &target, "Hips", RootTranslationMode::Full);

        let mut pose = Pose::new_empty(1);
        pose.root_translation = Vector3f::new(0.5, 1.4, -0.2);
        let out = context.retarget_pose(&pose);
        assert_relative_eq!(out.root_translation, Vector3f::new(2.5, 1.4, 2.8), epsilon = 1e-6);
    }

    #[test]
    fn unmapped_joints_keep_bind_rotation_without_panicking() {
        let source = chain("src", &["Hips", "Tail"]);
        let mut target = chain("tgt", &["Hips", "Spine"]);
        target.joints[1].local_rotation = quat_z(0.25);
        let context = RetargetingContext::new(&source, &target, "Hips", RootTranslationMode::Full);
        assert_eq!(context.num_mapped_joints(), 1);

        let mut pose = Pose::new_empty(2);
        pose.joint_rotations[1] = quat_z(1.0);
        pose.root_translation = Vector3f::new(0.0, 1.0, 0.0);
        let out = context.retarget_pose(&pose);
        // the unmapped target spine keeps its bind-local rotation
        assert!(out.joint_rotations[1].angle_to(&quat_z(0.25)) < 1e-6);
    }

    #[test]
    fn retarget_track_maps_every_frame() {
        let names = ["Hips", "Spine"];
        let source = chain("src", &names);
        let target = chain("tgt", &names);
        let context = RetargetingContext::new(&source, &target, "Hips", RootTranslationMode::Full);

        let mut moving = Pose::new_empty(2);
        moving.joint_rotations[1] = quat_z(0.5);
        moving.root_translation = Vector3f::new(0.0, 1.1, 0.0);
        let mut rest = Pose::new_empty(2);
        rest.root_translation = Vector3f::new(0.0, 1.0, 0.0);

        let track = MotionTrack::new(vec![0.0, 0.5], vec![rest, moving]);
        let out = context.retarget_track(&track);
        assert_eq!(out.num_frames(), 2);
        assert_eq!(out.timestamps, track.timestamps);
        assert!(out.poses[1].joint_rotations[1].angle_to(&quat_z(0.5)) < 1e-5);
    }

    #[test]
    fn exact_root_name_wins_over_suffix_matches() {
        // "LHips" also ends in "Hips" and sits first in the joint list
        let source = chain("src", &["LHips", "Hips"]);
        let mut target = chain("tgt", &["LHips", "Hips"]);
        target.joints[0].local_position = Vector3f::new(1.0, 1.0, 0.0);
        target.joints[1].local_position = Vector3f::new(0.0, 0.5, 0.0);
        let context = RetargetingContext::new(&source, &target, "Hips", RootTranslationMode::Full);

        let mut pose = Pose::new_empty(2);
        // the root moved up 0.3 from its bind world position (0, 1.2, 0)
        pose.root_translation = Vector3f::new(0.0, 1.5, 0.0);
        let out = context.retarget_pose(&pose);
        // anchored on the exact-named target joint at world (1, 1.5, 0)
        assert_relative_eq!(out.root_translation, Vector3f::new(1.0, 1.8, 0.0), epsilon = 1e-5);
    }

    #[test]
    #[should_panic(expected = "No joints")]
    fn disjoint_skeletons_panic_at_construction() {
        let source = chain("src", &["A", "B"]);
        let target = chain("tgt", &["C", "D"]);
        RetargetingContext::new(&source, &target, "A", RootTranslationMode::Full);
    }

    #[test]
    #[should_panic(expected = "Root bone")]
    fn unknown_root_bone_panics() {
        let source = chain("src", &["Hips"]);
        let target = chain("tgt", &["Hips"]);
        RetargetingContext::new(&source, &target, "Pelvis", RootTranslationMode::Full);
    }

    #[test]
    #[should_panic(expected = "Source pose covers")]
    fn wrong_pose_length_panics() {
        let source = chain("src", &["Hips", "Spine"]);
        let target = chain("tgt", &["Hips", "Spine"]);
        let context = RetargetingContext::new(&source, &target, "Hips", RootTranslationMode::Full);
        context.retarget_pose(&Pose::new_empty(5));
    }
}
