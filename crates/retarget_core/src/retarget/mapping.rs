use crate::common::skeleton::Skeleton;
use log::debug;

/// Normalize a bone name for cross-rig comparison: strip the separator
/// characters rig exporters disagree on and uppercase the rest, so
/// "mixamorig_LeftArm", "mixamorig:LeftArm" and "LEFT.ARM" style variants
/// can meet in the middle
pub fn normalize_bone_name(name: &str) -> String {
    name.chars()
        .filter(|&c| !matches!(c, '-' | '_' | '.' | ':'))
        .flat_map(char::to_uppercase)
        .collect()
}

/// Match joints between two skeletons by normalized name equality. For every
/// source joint the first matching target joint wins; source joints with no
/// match are left out, which is not an error. Output pairs are in
/// source-joint order.
pub fn map_skeletons(source: &Skeleton, target: &Skeleton) -> Vec<(usize, usize)> {
    let target_normalized: Vec<String> = target.joints.iter().map(|j| normalize_bone_name(&j.name)).collect();

    let mut pairs = Vec::new();
    for (src_idx, src_joint) in source.joints.iter().enumerate() {
        let src_name = normalize_bone_name(&src_joint.name);
        if let Some(tgt_idx) = target_normalized.iter().position(|n| *n == src_name) {
            pairs.push((src_idx, tgt_idx));
        } else {
            debug!(
                "joint '{}' of skeleton '{}' has no counterpart in skeleton '{}'",
                src_joint.name, source.name, target.name
            );
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::skeleton::Joint;
    use retarget_utils::Vector3f;

    fn skeleton_with(name: &str, joint_names: &[&str]) -> Skeleton {
        let joints = joint_names
            .iter()
            .enumerate()
            .map(|(idx, n)| Joint::new(*n, if idx == 0 { None } else { Some(idx - 1) }, Vector3f::zeros()))
            .collect();
        Skeleton::new(name, joints)
    }

    #[test]
    fn separators_and_case_are_ignored() {
        assert_eq!(normalize_bone_name("mixamorig_LeftArm"), "MIXAMORIGLEFTARM");
        assert_eq!(normalize_bone_name("mixamorig:Left.Arm"), "MIXAMORIGLEFTARM");
        assert_eq!(normalize_bone_name("MIXAMORIG-LEFTARM"), "MIXAMORIGLEFTARM");
    }

    #[test]
    fn maps_joints_across_naming_conventions() {
        let source = skeleton_with("src", &["mixamorig_Hips", "mixamorig_Spine", "mixamorig_LeftArm"]);
        let target = skeleton_with("tgt", &["mixamorig:Hips", "mixamorig:LeftArm", "mixamorig:Spine"]);
        let pairs = map_skeletons(&source, &target);
        assert_eq!(pairs, vec![(0, 0), (1, 2), (2, 1)]);
    }

    #[test]
    fn unmatched_source_joints_are_skipped() {
        let source = skeleton_with("src", &["Hips", "Tail"]);
        let target = skeleton_with("tgt", &["Hips"]);
        let pairs = map_skeletons(&source, &target);
        assert_eq!(pairs, vec![(0, 0)]);
    }

    #[test]
    fn mapping_is_symmetric() {
        let a = skeleton_with("a", &["Hips", "Spine", "LeftArm", "OnlyInA"]);
        let b = skeleton_with("b", &["left_arm", "hips", "spine", "OnlyInB"]);
        let ab: Vec<(usize, usize)> = map_skeletons(&a, &b);
        let ba: Vec<(usize, usize)> = map_skeletons(&b, &a);
        let mut ab_set: Vec<(usize, usize)> = ab.iter().map(|(s, t)| (*s, *t)).collect();
        let mut ba_flipped: Vec<(usize, usize)> = ba.iter().map(|(s, t)| (*t, *s)).collect();
        ab_set.sort_unstable();
        ba_flipped.sort_unstable();
        assert_eq!(ab_set, ba_flipped);
    }

    #[test]
    fn first_match_wins() {
        let source = skeleton_with("src", &["Arm"]);
        let target = skeleton_with("tgt", &["arm", "A_R_M"]);
        let pairs = map_skeletons(&source, &target);
        assert_eq!(pairs, vec![(0, 0)]);
    }
}
