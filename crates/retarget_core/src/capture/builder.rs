use crate::capture::rotation::RotationAccumulator;
use crate::common::landmarks::{JointDescriptor, LandmarkClip, LandmarkFrame, PoseLandmark, SemanticJoint, DEFAULT_VISIBILITY_THRESHOLD};
use crate::common::pose::{MotionTrack, Pose};
use crate::common::skeleton::{Joint, Skeleton};
use enum_map::EnumMap;
use log::warn;
use retarget_utils::{lerpv3f, midv3f, Vector3f};

/// Fractional positions of the synthesized spine joints between the hip
/// midpoint and the shoulder midpoint
const SPINE_FRACTIONS: [(SemanticJoint, f32); 3] = [
    (SemanticJoint::Spine, 0.25),
    (SemanticJoint::Spine1, 0.5),
    (SemanticJoint::Spine2, 0.75),
];

/// Semantic joints in depth-first order from the root, children visited in
/// declaration order
/// # Panics
/// Will panic if the descriptor table does not form a tree with one root
pub fn depth_first_order(descriptors: &EnumMap<SemanticJoint, JointDescriptor>) -> Vec<SemanticJoint> {
    let mut children: EnumMap<SemanticJoint, Vec<SemanticJoint>> = EnumMap::from_fn(|_| Vec::new());
    let mut roots = Vec::new();
    for (joint, descriptor) in descriptors {
        match descriptor.parent {
            None => roots.push(joint),
            Some(parent) => children[parent].push(joint),
        }
    }
    assert_eq!(roots.len(), 1, "Descriptor table should have exactly one root, found {}", roots.len());

    let mut order = Vec::with_capacity(descriptors.len());
    let mut stack = roots;
    while let Some(joint) = stack.pop() {
        order.push(joint);
        stack.extend(children[joint].iter().rev());
    }
    assert_eq!(
        order.len(),
        descriptors.len(),
        "Descriptor table contains joints unreachable from the root"
    );
    order
}

/// Midpoint of a landmark pair, skipping members below the visibility
/// threshold. `None` when the whole pair is hidden.
fn visible_midpoint(frame: &LandmarkFrame, left: PoseLandmark, right: PoseLandmark) -> Option<Vector3f> {
    let left_ok = frame.is_visible(left, DEFAULT_VISIBILITY_THRESHOLD);
    let right_ok = frame.is_visible(right, DEFAULT_VISIBILITY_THRESHOLD);
    match (left_ok, right_ok) {
        (true, true) => Some(midv3f(&frame.point(left), &frame.point(right))),
        (true, false) => {
            warn!("landmark {right} is below the visibility threshold, taking the midpoint from {left} alone");
            Some(frame.point(left))
        }
        (false, true) => {
            warn!("landmark {left} is below the visibility threshold, taking the midpoint from {right} alone");
            Some(frame.point(right))
        }
        (false, false) => None,
    }
}

/// World positions for every semantic joint of one frame. Joints backed by a
/// landmark take its position; the pelvis, spine chain and neck are
/// synthesized at fixed interpolation constants; landmarks below the
/// visibility threshold fall back to the descriptor's rest offset from the
/// parent. When a whole landmark pair behind a synthesized joint is hidden,
/// that joint holds its position from `previous` (the last processed frame);
/// with no previous frame available the raw points are used as-is.
pub fn joint_world_positions(
    frame: &LandmarkFrame,
    descriptors: &EnumMap<SemanticJoint, JointDescriptor>,
    previous: Option<&EnumMap<SemanticJoint, Vector3f>>,
) -> EnumMap<SemanticJoint, Vector3f> {
    use PoseLandmark as L;
    use SemanticJoint as J;

    let raw_mid = |a: L, b: L| midv3f(&frame.point(a), &frame.point(b));
    let hold = |joint: J, raw: Vector3f| previous.map_or(raw, |prev| prev[joint]);

    let shoulder_mid = visible_midpoint(frame, L::LeftShoulder, L::RightShoulder);
    let mouth_mid = visible_midpoint(frame, L::MouthLeft, L::MouthRight);

    let mut positions: EnumMap<SemanticJoint, Vector3f> = EnumMap::from_fn(|_| Vector3f::zeros());
    let hips_mid = match visible_midpoint(frame, L::LeftHip, L::RightHip) {
        Some(mid) => mid,
        None => {
            warn!("both hip landmarks are below the visibility threshold, holding the pelvis in place");
            hold(J::Hips, raw_mid(L::LeftHip, L::RightHip))
        }
    };
    positions[J::Hips] = hips_mid;

    match shoulder_mid {
        Some(mid) => {
            for (joint, fraction) in SPINE_FRACTIONS {
                positions[joint] = lerpv3f(&hips_mid, &mid, fraction);
            }
        }
        None => {
            warn!("both shoulder landmarks are below the visibility threshold, holding the spine chain in place");
            for (joint, fraction) in SPINE_FRACTIONS {
                positions[joint] = hold(joint, lerpv3f(&hips_mid, &raw_mid(L::LeftShoulder, L::RightShoulder), fraction));
            }
        }
    }
    match (shoulder_mid, mouth_mid) {
        (Some(shoulders), Some(mouth)) => positions[J::Neck] = midv3f(&shoulders, &mouth),
        _ => {
            warn!("the landmarks behind the neck are below the visibility threshold, holding the neck in place");
            positions[J::Neck] = hold(
                J::Neck,
                midv3f(&raw_mid(L::LeftShoulder, L::RightShoulder), &raw_mid(L::MouthLeft, L::MouthRight)),
            );
        }
    }

    // landmark-driven joints, walked parent-before-child so the rest-offset
    // fallback can anchor on an already computed parent
    for joint in depth_first_order(descriptors) {
        let descriptor = &descriptors[joint];
        let Some(landmark) = descriptor.landmark else { continue };
        if frame.is_visible(landmark, DEFAULT_VISIBILITY_THRESHOLD) {
            positions[joint] = frame.point(landmark);
        } else {
            warn!("landmark {landmark} is below the visibility threshold, resting {joint} at its offset from the parent");
            let parent_position = descriptor.parent.map_or_else(Vector3f::zeros, |p| positions[p]);
            positions[joint] = parent_position + descriptor.rest_offset;
        }
    }
    positions
}

/// Build the source skeleton for one captured frame: joints in depth-first
/// order from the root, local positions relative to the parent, identity
/// rest rotations. Pure function of its inputs, repeated calls on the same
/// frame and table give the same skeleton.
pub fn build_source_skeleton(
    name: impl Into<String>,
    frame: &LandmarkFrame,
    descriptors: &EnumMap<SemanticJoint, JointDescriptor>,
) -> Skeleton {
    let order = depth_first_order(descriptors);
    let positions = joint_world_positions(frame, descriptors, None);

    let mut index_of: EnumMap<SemanticJoint, usize> = EnumMap::from_fn(|_| 0);
    for (idx, joint) in order.iter().enumerate() {
        index_of[*joint] = idx;
    }

    let joints = order
        .iter()
        .map(|joint| {
            let descriptor = &descriptors[*joint];
            let (parent, local_position) = match descriptor.parent {
                None => (None, positions[*joint]),
                Some(parent) => (Some(index_of[parent]), positions[*joint] - positions[parent]),
            };
            Joint::new(descriptor.bone_name, parent, local_position)
        })
        .collect();
    Skeleton::new(name, joints)
}

/// Convert a landmark clip into a source skeleton (from the first frame) and
/// a motion track of bone-local rotations, one pose per frame. Frames are
/// consumed in order; the accumulator carries the previous frame's rotations
/// per joint, and synthesized joints whose landmarks drop out hold their
/// previous frame's position.
/// # Panics
/// Will panic if the clip has no frames
pub fn convert_clip(
    name: impl Into<String>,
    clip: &LandmarkClip,
    descriptors: &EnumMap<SemanticJoint, JointDescriptor>,
) -> (Skeleton, MotionTrack) {
    assert!(!clip.frames.is_empty(), "Cannot convert an empty landmark clip");

    let skeleton = build_source_skeleton(name, &clip.frames[0], descriptors);
    let order = depth_first_order(descriptors);
    let parents: EnumMap<SemanticJoint, Option<SemanticJoint>> = EnumMap::from_fn(|joint| descriptors[joint].parent);

    let mut accumulator = RotationAccumulator::new();
    let mut previous_positions: Option<EnumMap<SemanticJoint, Vector3f>> = None;
    let mut poses = Vec::with_capacity(clip.frames.len());
    for frame in &clip.frames {
        let positions = joint_world_positions(frame, descriptors, previous_positions.as_ref());
        let relatives = accumulator.process_frame(&positions, &parents);
        let joint_rotations = order.iter().map(|joint| relatives[*joint]).collect();
        poses.push(Pose::new(joint_rotations, positions[SemanticJoint::Hips]));
        previous_positions = Some(positions);
    }

    (skeleton, MotionTrack::new(clip.timestamps(), poses))
}
