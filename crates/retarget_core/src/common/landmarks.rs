use enum_map::{enum_map, Enum, EnumMap};
use ndarray as nd;
use num_derive::FromPrimitive;
use retarget_utils::Vector3f;
use serde_json::Value;
use strum_macros::Display;

/// Number of body points produced per frame by the upstream pose estimator.
/// The [`PoseLandmark`] numbering is keyed to this fixed scheme and has to be
/// revised together with it.
pub const NUM_POSE_LANDMARKS: usize = 33;

/// Default visibility under which a landmark is treated as missing
pub const DEFAULT_VISIBILITY_THRESHOLD: f32 = 0.5;

/// Raw landmark indices of the external pose estimation library
#[derive(Clone, Copy, Debug, Enum, FromPrimitive, PartialEq, Eq, Display)]
pub enum PoseLandmark {
    Nose = 0,
    LeftEyeInner,
    LeftEye,
    LeftEyeOuter,
    RightEyeInner,
    RightEye,
    RightEyeOuter,
    LeftEar,
    RightEar,
    MouthLeft,
    MouthRight,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftPinky,
    RightPinky,
    LeftIndex,
    RightIndex,
    LeftThumb,
    RightThumb,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
    LeftHeel,
    RightHeel,
    LeftFootIndex,
    RightFootIndex,
}

/// Stable semantic identifiers for the joints of the synthesized source
/// skeleton. Declaration order matters: children are visited in this order
/// when the skeleton is laid out depth-first.
#[derive(Clone, Copy, Debug, Enum, PartialEq, Eq, Display)]
pub enum SemanticJoint {
    Hips,
    Spine,
    Spine1,
    Spine2,
    Neck,
    Head,
    LeftArm,
    LeftForeArm,
    LeftHand,
    RightArm,
    RightForeArm,
    RightHand,
    LeftUpLeg,
    LeftLeg,
    LeftFoot,
    LeftToeBase,
    RightUpLeg,
    RightLeg,
    RightFoot,
    RightToeBase,
}

/// Static description of one semantic joint: which raw landmark it derives
/// from (`None` for synthesized joints), the bone name expected on a rig, its
/// parent and a rest-pose offset used when a landmark is missing
#[derive(Clone, Debug)]
pub struct JointDescriptor {
    pub landmark: Option<PoseLandmark>,
    pub bone_name: &'static str,
    pub parent: Option<SemanticJoint>,
    pub rest_offset: Vector3f,
}

/// The hand-authored bone correspondence table. Forms a tree: exactly one
/// root (`Hips`) and every other joint's parent is in the table.
#[allow(clippy::too_many_lines)]
pub fn joint_descriptors() -> EnumMap<SemanticJoint, JointDescriptor> {
    use PoseLandmark as L;
    use SemanticJoint as J;
    let desc = |landmark: Option<L>, bone_name: &'static str, parent: Option<J>, off: [f32; 3]| JointDescriptor {
        landmark,
        bone_name,
        parent,
        rest_offset: Vector3f::new(off[0], off[1], off[2]),
    };
    enum_map! {
        J::Hips => desc(None, "mixamorig_Hips", None, [0.0, 0.0, 0.0]),
        J::Spine => desc(None, "mixamorig_Spine", Some(J::Hips), [0.0, 0.11, 0.0]),
        J::Spine1 => desc(None, "mixamorig_Spine1", Some(J::Spine), [0.0, 0.11, 0.0]),
        J::Spine2 => desc(None, "mixamorig_Spine2", Some(J::Spine1), [0.0, 0.11, 0.0]),
        J::Neck => desc(None, "mixamorig_Neck", Some(J::Spine2), [0.0, 0.12, 0.0]),
        J::Head => desc(Some(L::Nose), "mixamorig_Head", Some(J::Neck), [0.0, 0.10, 0.0]),
        J::LeftArm => desc(Some(L::LeftShoulder), "mixamorig_LeftArm", Some(J::Spine2), [0.18, 0.08, 0.0]),
        J::LeftForeArm => desc(Some(L::LeftElbow), "mixamorig_LeftForeArm", Some(J::LeftArm), [0.27, 0.0, 0.0]),
        J::LeftHand => desc(Some(L::LeftWrist), "mixamorig_LeftHand", Some(J::LeftForeArm), [0.26, 0.0, 0.0]),
        J::RightArm => desc(Some(L::RightShoulder), "mixamorig_RightArm", Some(J::Spine2), [-0.18, 0.08, 0.0]),
        J::RightForeArm => desc(Some(L::RightElbow), "mixamorig_RightForeArm", Some(J::RightArm), [-0.27, 0.0, 0.0]),
        J::RightHand => desc(Some(L::RightWrist), "mixamorig_RightHand", Some(J::RightForeArm), [-0.26, 0.0, 0.0]),
        J::LeftUpLeg => desc(Some(L::LeftHip), "mixamorig_LeftUpLeg", Some(J::Hips), [0.09, -0.05, 0.0]),
        J::LeftLeg => desc(Some(L::LeftKnee), "mixamorig_LeftLeg", Some(J::LeftUpLeg), [0.0, -0.42, 0.0]),
        J::LeftFoot => desc(Some(L::LeftAnkle), "mixamorig_LeftFoot", Some(J::LeftLeg), [0.0, -0.40, 0.0]),
        J::LeftToeBase => desc(Some(L::LeftFootIndex), "mixamorig_LeftToeBase", Some(J::LeftFoot), [0.0, -0.07, 0.13]),
        J::RightUpLeg => desc(Some(L::RightHip), "mixamorig_RightUpLeg", Some(J::Hips), [-0.09, -0.05, 0.0]),
        J::RightLeg => desc(Some(L::RightKnee), "mixamorig_RightLeg", Some(J::RightUpLeg), [0.0, -0.42, 0.0]),
        J::RightFoot => desc(Some(L::RightAnkle), "mixamorig_RightFoot", Some(J::RightLeg), [0.0, -0.40, 0.0]),
        J::RightToeBase => desc(Some(L::RightFootIndex), "mixamorig_RightToeBase", Some(J::RightFoot), [0.0, -0.07, 0.13]),
    }
}

/// One captured frame of the landmark stream
#[derive(Clone, Debug)]
pub struct LandmarkFrame {
    pub points: nd::Array2<f32>,             // (NUM_POSE_LANDMARKS, 3)
    pub visibility: Option<nd::Array1<f32>>, // (NUM_POSE_LANDMARKS)
    pub dt_ms: f32,
}

impl LandmarkFrame {
    /// # Panics
    /// Will panic if `points` does not have shape (``NUM_POSE_LANDMARKS``, 3)
    pub fn new(points: nd::Array2<f32>, visibility: Option<nd::Array1<f32>>, dt_ms: f32) -> Self {
        assert_eq!(
            points.dim(),
            (NUM_POSE_LANDMARKS, 3),
            "Landmark frame should have shape ({NUM_POSE_LANDMARKS}, 3), got {:?}",
            points.dim()
        );
        if let Some(ref vis) = visibility {
            assert_eq!(
                vis.len(),
                NUM_POSE_LANDMARKS,
                "Visibility should have one entry per landmark, got {}",
                vis.len()
            );
        }
        Self { points, visibility, dt_ms }
    }

    pub fn point(&self, landmark: PoseLandmark) -> Vector3f {
        let row = self.points.row(landmark as usize);
        Vector3f::new(row[0], row[1], row[2])
    }

    /// A landmark with no visibility data counts as visible
    pub fn is_visible(&self, landmark: PoseLandmark, threshold: f32) -> bool {
        self.visibility.as_ref().map_or(true, |vis| vis[landmark as usize] >= threshold)
    }
}

/// An ordered sequence of landmark frames, the raw input of a capture session
#[derive(Clone, Debug, Default)]
pub struct LandmarkClip {
    pub frames: Vec<LandmarkFrame>,
}

impl LandmarkClip {
    pub fn new(frames: Vec<LandmarkFrame>) -> Self {
        Self { frames }
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    /// Timestamps in seconds, strictly increasing, starting at 0
    pub fn timestamps(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.frames.len());
        let mut t = 0.0;
        for (idx, frame) in self.frames.iter().enumerate() {
            if idx > 0 {
                t += frame.dt_ms / 1000.0;
            }
            out.push(t);
        }
        out
    }

    /// Parse a clip from `{"fps": f, "frames": [[[x,y,z]; 33]; n]}` json
    /// # Panics
    /// Will panic if the json does not follow the layout above
    #[allow(clippy::cast_possible_truncation)]
    pub fn new_from_json_str(json: &str) -> Self {
        let v: Value = serde_json::from_str(json).expect("Landmark clip is not valid json");
        let fps = v["fps"].as_f64().expect("Landmark clip json needs a numeric `fps` field") as f32;
        let dt_ms = 1000.0 / fps;
        let frames_json = v["frames"].as_array().expect("Landmark clip json needs a `frames` array");
        let mut frames = Vec::with_capacity(frames_json.len());
        for frame_json in frames_json {
            let points_json = frame_json.as_array().expect("Each frame should be an array of landmarks");
            let mut points = nd::Array2::<f32>::zeros((NUM_POSE_LANDMARKS, 3));
            for (idx, point_json) in points_json.iter().enumerate() {
                let coords: Vec<f32> = point_json
                    .as_array()
                    .expect("Each landmark should be an [x,y,z] array")
                    .iter()
                    .map(|c| c.as_f64().expect("Landmark coordinates should be numbers") as f32)
                    .collect();
                points.row_mut(idx).assign(&nd::arr1(&coords));
            }
            frames.push(LandmarkFrame::new(points, None, dt_ms));
        }
        Self::new(frames)
    }

    /// # Panics
    /// Will panic if the path cannot be opened or does not contain a valid
    /// landmark clip
    pub fn new_from_json(path: &str) -> Self {
        let json = std::fs::read_to_string(path).unwrap_or_else(|_| panic!("Could not find/open file: {path}"));
        Self::new_from_json_str(&json)
    }
}
