use crate::common::landmarks::SemanticJoint;
use enum_map::EnumMap;
use nalgebra as na;
use retarget_utils::{
    numerical::{angle_between, any_orthogonal},
    Vector3f,
};

/// Directions shorter than this are treated as degenerate and map to the
/// identity rotation
pub const DEGENERATE_DIRECTION_EPS: f32 = 1e-6;

/// Bone segments point along -y in the canonical rest direction
pub fn canonical_down() -> Vector3f {
    Vector3f::new(0.0, -1.0, 0.0)
}

/// The two rotations produced for one bone segment in one frame
#[derive(Clone, Copy, Debug)]
pub struct SegmentRotation {
    /// Maps the canonical down vector onto the segment direction
    pub absolute: na::UnitQuaternion<f32>,
    /// `absolute` re-expressed against the previous accumulated rotation;
    /// this is what gets stored as the bone-local animation value
    pub relative: na::UnitQuaternion<f32>,
}

/// Shortest-arc rotation taking `from` onto `to`. Robust where the naive
/// dot-product-acos version is not: the dot is clamped to [-1,1] and the
/// angle comes from `atan2` of the cross norm. Degenerate inputs (zero-length
/// vectors) give the identity; antiparallel vectors rotate PI about a stable
/// perpendicular axis.
pub fn shortest_arc(from: &Vector3f, to: &Vector3f) -> na::UnitQuaternion<f32> {
    if from.norm() < DEGENERATE_DIRECTION_EPS || to.norm() < DEGENERATE_DIRECTION_EPS {
        return na::UnitQuaternion::identity();
    }
    let angle = angle_between(from, to);
    let cross = from.cross(to);
    if cross.norm() < DEGENERATE_DIRECTION_EPS {
        if from.dot(to) >= 0.0 {
            return na::UnitQuaternion::identity();
        }
        let axis = na::Unit::new_normalize(any_orthogonal(from));
        return na::UnitQuaternion::from_axis_angle(&axis, std::f32::consts::PI);
    }
    na::UnitQuaternion::from_axis_angle(&na::Unit::new_normalize(cross), angle)
}

/// Compute the segment rotations for the bone running from `p_from` to
/// `p_to`, given the previous accumulated rotation of the parent segment.
///
/// The upstream estimator's camera-space depth sign flips the segment when
/// the proximal landmark sits at non-negative z, so in that case the
/// shortest arc is taken from the direction onto the canonical down vector
/// instead of the other way around. This mirrors the observed capture
/// behavior, it is not a verified camera model.
pub fn rotation_between(p_from: &Vector3f, p_to: &Vector3f, previous: &na::UnitQuaternion<f32>) -> SegmentRotation {
    let direction = p_to - p_from;
    let down = canonical_down();
    let absolute = if p_from.z >= 0.0 {
        shortest_arc(&direction, &down)
    } else {
        shortest_arc(&down, &direction)
    };
    let relative = na::UnitQuaternion::new_normalize((previous.conjugate() * absolute).into_inner());
    SegmentRotation { absolute, relative }
}

/// Per-joint previous-rotation state of one capture session.
///
/// Frames must be fed in increasing timestamp order: each joint's relative
/// rotation is computed against the accumulated rotation its parent segment
/// had in the previous frame. Different joints are independent of each
/// other, only the frame order per joint is a strict sequential dependency.
#[derive(Clone, Debug)]
pub struct RotationAccumulator {
    previous: EnumMap<SemanticJoint, na::UnitQuaternion<f32>>,
}

impl Default for RotationAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl RotationAccumulator {
    pub fn new() -> Self {
        Self {
            previous: EnumMap::from_fn(|_| na::UnitQuaternion::identity()),
        }
    }

    /// Accumulated rotation a joint's segment reached in the last processed
    /// frame (identity before the first frame)
    pub fn previous(&self, joint: SemanticJoint) -> na::UnitQuaternion<f32> {
        self.previous[joint]
    }

    /// Compute one frame's relative rotations from per-joint world positions.
    /// Joints without a parent entry (the root) stay at identity. All
    /// absolutes of the frame are computed against the previous frame's
    /// state before any of them replace it.
    pub fn process_frame(
        &mut self,
        positions: &EnumMap<SemanticJoint, Vector3f>,
        parents: &EnumMap<SemanticJoint, Option<SemanticJoint>>,
    ) -> EnumMap<SemanticJoint, na::UnitQuaternion<f32>> {
        let mut absolutes = self.previous.clone();
        let mut relatives = EnumMap::from_fn(|_| na::UnitQuaternion::identity());
        for (joint, parent) in parents {
            let Some(parent) = *parent else { continue };
            let segment = rotation_between(&positions[parent], &positions[joint], &self.previous[parent]);
            absolutes[joint] = segment.absolute;
            relatives[joint] = segment.relative;
        }
        self.previous = absolutes;
        relatives
    }
}
