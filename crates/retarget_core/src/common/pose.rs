use log::warn;
use nalgebra as na;
use retarget_utils::{
    numerical::{map, slerp_quat},
    Vector3f,
};

/// One frame of local transforms, parallel to a skeleton's joint list. Only
/// the root carries an animated position, every other joint animates rotation
/// only.
#[derive(Clone, Debug)]
pub struct Pose {
    pub joint_rotations: Vec<na::UnitQuaternion<f32>>,
    pub root_translation: Vector3f,
}

impl Pose {
    pub fn new(joint_rotations: Vec<na::UnitQuaternion<f32>>, root_translation: Vector3f) -> Self {
        Self {
            joint_rotations,
            root_translation,
        }
    }

    /// Identity rotations for every joint, zero root translation
    pub fn new_empty(num_joints: usize) -> Self {
        Self {
            joint_rotations: vec![na::UnitQuaternion::identity(); num_joints],
            root_translation: Vector3f::zeros(),
        }
    }

    pub fn num_joints(&self) -> usize {
        self.joint_rotations.len()
    }

    /// Interpolate between 2 poses
    /// # Panics
    /// Will panic if the poses cover a different number of joints
    #[must_use]
    pub fn interpolate(&self, other_pose: &Self, other_weight: f32) -> Pose {
        if !(0.0..=1.0).contains(&other_weight) {
            warn!("pose interpolation weight is outside the [0,1] range, will clamp. Weight is {other_weight}");
        }
        let other_weight = other_weight.clamp(0.0, 1.0);
        assert_eq!(
            self.num_joints(),
            other_pose.num_joints(),
            "We can only interpolate between poses with the same number of joints. Origin: {}. Dest: {}",
            self.num_joints(),
            other_pose.num_joints()
        );

        let cur_w = 1.0 - other_weight;
        let new_root = cur_w * self.root_translation + other_weight * other_pose.root_translation;
        let new_rotations = self
            .joint_rotations
            .iter()
            .zip(other_pose.joint_rotations.iter())
            .map(|(cur_q, other_q)| slerp_quat(cur_q, other_q, other_weight))
            .collect();
        Pose::new(new_rotations, new_root)
    }
}

/// An ordered sequence of (timestamp, pose) samples for one skeleton.
/// Timestamps are in seconds, strictly increasing, starting at 0.
#[derive(Clone, Debug)]
pub struct MotionTrack {
    pub timestamps: Vec<f32>,
    pub poses: Vec<Pose>,
}

impl MotionTrack {
    /// # Panics
    /// Will panic if the timestamps do not pair up with the poses or are not
    /// strictly increasing from 0
    pub fn new(timestamps: Vec<f32>, poses: Vec<Pose>) -> Self {
        assert_eq!(timestamps.len(), poses.len(), "One timestamp per pose is required");
        if let Some(first) = timestamps.first() {
            assert!(*first == 0.0, "Motion track timestamps should start at 0, got {first}");
        }
        assert!(
            timestamps.windows(2).all(|w| w[0] < w[1]),
            "Motion track timestamps should be strictly increasing"
        );
        Self { timestamps, poses }
    }

    pub fn num_frames(&self) -> usize {
        self.poses.len()
    }

    pub fn duration(&self) -> f32 {
        self.timestamps.last().copied().unwrap_or(0.0)
    }

    /// Bracketing frame indices and the interpolation weight of the later one
    /// for a given time, clamped to the track's range
    pub fn smooth_time_indices(&self, time_sec: f32) -> (usize, usize, f32) {
        if self.poses.len() < 2 {
            return (0, 0, 0.0);
        }
        let upper = self.timestamps.partition_point(|t| *t <= time_sec).min(self.timestamps.len() - 1);
        if upper == 0 {
            return (0, 0, 0.0);
        }
        let lower = upper - 1;
        let w_upper = map(time_sec, self.timestamps[lower], self.timestamps[upper], 0.0, 1.0);
        (lower, upper, w_upper)
    }

    /// Pose at an arbitrary time, interpolating between the bracketing frames
    /// # Panics
    /// Will panic if the track is empty
    pub fn sample(&self, time_sec: f32) -> Pose {
        assert!(!self.poses.is_empty(), "Cannot sample an empty motion track");
        let (lower, upper, w_upper) = self.smooth_time_indices(time_sec);
        self.poses[lower].interpolate(&self.poses[upper], w_upper)
    }
}
