use nalgebra as na;
use retarget_utils::{numerical::snap_zero, Vector3f};

/// Position components closer to zero than this are snapped to exact zero
/// when locals are recovered from inverse bind matrices, so inversion noise
/// does not propagate down the hierarchy
pub const POSITION_SNAP_TOLERANCE: f32 = 1e-4;

/// One joint of a skeleton arena. Parents are plain indices into the owning
/// [`Skeleton`], there are no live references into any scene graph.
#[derive(Clone, Debug)]
pub struct Joint {
    pub name: String,
    pub parent: Option<usize>,
    pub local_position: Vector3f,
    pub local_rotation: na::UnitQuaternion<f32>,
    pub local_scale: Vector3f,
}

impl Joint {
    pub fn new(name: impl Into<String>, parent: Option<usize>, local_position: Vector3f) -> Self {
        Self {
            name: name.into(),
            parent,
            local_position,
            local_rotation: na::UnitQuaternion::identity(),
            local_scale: Vector3f::new(1.0, 1.0, 1.0),
        }
    }
}

/// Bind-pose world transforms of a skeleton, one entry per joint, parallel to
/// [`Skeleton::joints`]
#[derive(Clone, Debug)]
pub struct BindPose {
    pub world_positions: Vec<Vector3f>,
    pub world_rotations: Vec<na::UnitQuaternion<f32>>,
    pub world_scales: Vec<Vector3f>,
}

/// A named, ordered list of joints. Joint order is arbitrary: a parent index
/// may be larger than its child's, traversal goes through
/// [`Skeleton::topological_order`].
#[derive(Clone, Debug)]
pub struct Skeleton {
    pub name: String,
    pub joints: Vec<Joint>,
}

impl Skeleton {
    /// # Panics
    /// Will panic if a parent index is out of range or a joint is its own
    /// parent
    pub fn new(name: impl Into<String>, joints: Vec<Joint>) -> Self {
        let name = name.into();
        for (idx, joint) in joints.iter().enumerate() {
            if let Some(parent) = joint.parent {
                assert!(
                    parent < joints.len(),
                    "Joint '{}' of skeleton '{name}' has out-of-range parent {parent}",
                    joint.name
                );
                assert!(parent != idx, "Joint '{}' of skeleton '{name}' is its own parent", joint.name);
            }
        }
        Self { name, joints }
    }

    /// Build a skeleton from per-joint inverse bind matrices, the shape
    /// supplied by rigged mesh formats. Each joint's local matrix is
    /// `inverse_bind(parent) * inverse_bind(joint)^-1` (just the inverted
    /// bind for roots), decomposed into position/rotation/scale.
    ///
    /// # Panics
    /// Will panic if the inputs have mismatched lengths or an inverse bind
    /// matrix is singular
    pub fn new_from_inverse_binds(
        name: impl Into<String>,
        joint_names: Vec<String>,
        parents: Vec<Option<usize>>,
        inverse_binds: &[na::Matrix4<f32>],
    ) -> Self {
        let name = name.into();
        assert_eq!(
            joint_names.len(),
            parents.len(),
            "Skeleton '{name}': names and parents should have the same length"
        );
        assert_eq!(
            joint_names.len(),
            inverse_binds.len(),
            "Skeleton '{name}': one inverse bind matrix per joint is required"
        );

        let binds: Vec<na::Matrix4<f32>> = inverse_binds
            .iter()
            .zip(joint_names.iter())
            .map(|(m, joint_name)| {
                m.try_inverse()
                    .unwrap_or_else(|| panic!("Inverse bind matrix of joint '{joint_name}' is singular"))
            })
            .collect();

        let joints = joint_names
            .into_iter()
            .zip(parents)
            .enumerate()
            .map(|(idx, (joint_name, parent))| {
                let local_matrix = match parent {
                    Some(p) => inverse_binds[p] * binds[idx],
                    None => binds[idx],
                };
                let (mut position, rotation, scale) = decompose_trs(&local_matrix);
                snap_zero(&mut position, POSITION_SNAP_TOLERANCE);
                Joint {
                    name: joint_name,
                    parent,
                    local_position: position,
                    local_rotation: rotation,
                    local_scale: scale,
                }
            })
            .collect();
        Self::new(name, joints)
    }

    pub fn num_joints(&self) -> usize {
        self.joints.len()
    }

    /// Index of the first joint with this exact name
    pub fn find_joint(&self, name: &str) -> Option<usize> {
        self.joints.iter().position(|j| j.name == name)
    }

    /// Joint indices in parent-before-child order
    /// # Panics
    /// Will panic if the parent links contain a cycle
    pub fn topological_order(&self) -> Vec<usize> {
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); self.joints.len()];
        let mut stack: Vec<usize> = Vec::new();
        for (idx, joint) in self.joints.iter().enumerate() {
            match joint.parent {
                None => stack.push(idx),
                Some(parent) => children[parent].push(idx),
            }
        }
        let mut order = Vec::with_capacity(self.joints.len());
        while let Some(idx) = stack.pop() {
            order.push(idx);
            stack.extend(children[idx].iter().rev());
        }
        assert_eq!(
            order.len(),
            self.joints.len(),
            "Skeleton '{}' contains a parent cycle",
            self.name
        );
        order
    }

    /// Compose world transforms from root to leaf for the rest pose. Pure:
    /// repeated calls on an unchanged skeleton yield identical results.
    pub fn resolve_bind_pose(&self) -> BindPose {
        let num_joints = self.joints.len();
        let mut world_positions = vec![Vector3f::zeros(); num_joints];
        let mut world_rotations = vec![na::UnitQuaternion::identity(); num_joints];
        let mut world_scales = vec![Vector3f::new(1.0, 1.0, 1.0); num_joints];

        for idx in self.topological_order() {
            let joint = &self.joints[idx];
            match joint.parent {
                None => {
                    world_positions[idx] = joint.local_position;
                    world_rotations[idx] = joint.local_rotation;
                    world_scales[idx] = joint.local_scale;
                }
                Some(parent) => {
                    let scaled_offset = world_scales[parent].component_mul(&joint.local_position);
                    world_positions[idx] = world_positions[parent] + world_rotations[parent] * scaled_offset;
                    world_rotations[idx] = world_rotations[parent] * joint.local_rotation;
                    world_scales[idx] = world_scales[parent].component_mul(&joint.local_scale);
                }
            }
        }

        BindPose {
            world_positions,
            world_rotations,
            world_scales,
        }
    }
}

/// Split an affine matrix into translation, rotation and per-axis scale. The
/// rotation is re-extracted from the scale-normalized basis, which also
/// counteracts floating point drift accumulated in the matrix.
fn decompose_trs(m: &na::Matrix4<f32>) -> (Vector3f, na::UnitQuaternion<f32>, Vector3f) {
    let translation = Vector3f::new(m[(0, 3)], m[(1, 3)], m[(2, 3)]);
    let mut basis = m.fixed_view::<3, 3>(0, 0).into_owned();
    let mut scale = Vector3f::new(basis.column(0).norm(), basis.column(1).norm(), basis.column(2).norm());
    // a negative determinant means one axis is mirrored
    if basis.determinant() < 0.0 {
        scale.x = -scale.x;
    }
    for c in 0..3 {
        let s = scale[c];
        if s.abs() > 1e-8 {
            for r in 0..3 {
                basis[(r, c)] /= s;
            }
        }
    }
    let rotation = na::UnitQuaternion::from_matrix(&basis);
    (translation, rotation, scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    fn three_joint_chain() -> Skeleton {
        let mut spine = Joint::new("Spine", Some(0), Vector3f::new(0.0, 1.0, 0.0));
        spine.local_rotation = na::UnitQuaternion::from_axis_angle(&Vector3f::z_axis(), FRAC_PI_2);
        Skeleton::new(
            "test",
            vec![
                Joint::new("Hips", None, Vector3f::new(0.0, 1.0, 0.0)),
                spine,
                Joint::new("Head", Some(1), Vector3f::new(0.0, 1.0, 0.0)),
            ],
        )
    }

    #[test]
    fn bind_pose_composes_up_the_hierarchy() {
        let skeleton = three_joint_chain();
        let bind = skeleton.resolve_bind_pose();
        assert_relative_eq!(bind.world_positions[0], Vector3f::new(0.0, 1.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(bind.world_positions[1], Vector3f::new(0.0, 2.0, 0.0), epsilon = 1e-6);
        // the spine is rotated 90 deg about z, so the head offset (0,1,0)
        // lands along -x
        assert_relative_eq!(bind.world_positions[2], Vector3f::new(-1.0, 2.0, 0.0), epsilon = 1e-5);
        assert_relative_eq!(bind.world_rotations[2].angle(), FRAC_PI_2, epsilon = 1e-5);
    }

    #[test]
    fn bind_pose_is_idempotent() {
        let skeleton = three_joint_chain();
        let a = skeleton.resolve_bind_pose();
        let b = skeleton.resolve_bind_pose();
        for idx in 0..skeleton.num_joints() {
            assert_eq!(a.world_positions[idx], b.world_positions[idx]);
            assert_eq!(a.world_rotations[idx], b.world_rotations[idx]);
            assert_eq!(a.world_scales[idx], b.world_scales[idx]);
        }
    }

    #[test]
    fn topological_order_handles_child_listed_before_parent() {
        // the child sits at index 0, its parent at index 1
        let skeleton = Skeleton::new(
            "reversed",
            vec![
                Joint::new("Child", Some(1), Vector3f::new(0.0, 1.0, 0.0)),
                Joint::new("Root", None, Vector3f::zeros()),
            ],
        );
        let order = skeleton.topological_order();
        assert_eq!(order, vec![1, 0]);
        let bind = skeleton.resolve_bind_pose();
        assert_relative_eq!(bind.world_positions[0], Vector3f::new(0.0, 1.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn inverse_binds_round_trip_to_locals() {
        let skeleton = three_joint_chain();
        let bind = skeleton.resolve_bind_pose();
        let inverse_binds: Vec<na::Matrix4<f32>> = (0..skeleton.num_joints())
            .map(|idx| {
                let world = na::Matrix4::new_translation(&bind.world_positions[idx])
                    * bind.world_rotations[idx].to_homogeneous()
                    * na::Matrix4::new_nonuniform_scaling(&bind.world_scales[idx]);
                world.try_inverse().unwrap()
            })
            .collect();

        let rebuilt = Skeleton::new_from_inverse_binds(
            "rebuilt",
            skeleton.joints.iter().map(|j| j.name.clone()).collect(),
            skeleton.joints.iter().map(|j| j.parent).collect(),
            &inverse_binds,
        );

        for (original, recovered) in skeleton.joints.iter().zip(rebuilt.joints.iter()) {
            assert_relative_eq!(original.local_position, recovered.local_position, epsilon = 1e-4);
            assert!(original.local_rotation.angle_to(&recovered.local_rotation) < 1e-4);
            assert_relative_eq!(original.local_scale, recovered.local_scale, epsilon = 1e-4);
        }
    }

    #[test]
    fn recovered_rotations_are_unit() {
        let skeleton = three_joint_chain();
        let bind = skeleton.resolve_bind_pose();
        let inverse_binds: Vec<na::Matrix4<f32>> = (0..skeleton.num_joints())
            .map(|idx| {
                let world = na::Matrix4::new_translation(&bind.world_positions[idx]) * bind.world_rotations[idx].to_homogeneous();
                world.try_inverse().unwrap()
            })
            .collect();
        let rebuilt = Skeleton::new_from_inverse_binds(
            "rebuilt",
            skeleton.joints.iter().map(|j| j.name.clone()).collect(),
            skeleton.joints.iter().map(|j| j.parent).collect(),
            &inverse_binds,
        );
        for joint in &rebuilt.joints {
            assert_relative_eq!(joint.local_rotation.into_inner().norm(), 1.0, epsilon = 1e-4);
        }
    }

    #[test]
    #[should_panic(expected = "singular")]
    fn singular_inverse_bind_panics() {
        Skeleton::new_from_inverse_binds("bad", vec!["Root".to_string()], vec![None], &[na::Matrix4::zeros()]);
    }
}
