//! Skeleton and blendshape naming conventions.
//!
//! Auto-assignment matches a candidate skeleton against these tables: every
//! convention is a positionally-aligned list, one entry per bone role, so
//! slot `i` of any convention names the same role as `BONE_ROLES[i]`.

/// Number of bone roles a character skeleton can map.
pub const BONE_ROLE_COUNT: usize = 52;

/// Number of face blendshape roles, `Basis` included.
pub const BLENDSHAPE_ROLE_COUNT: usize = 91;

/// Canonical bone role keys, in metadata order. `Hips` is the only role that
/// must be assigned for a character to pass the Requirement stage.
pub const BONE_ROLES: [&str; BONE_ROLE_COUNT] = [
    "Hips",
    "LeftUpLeg",
    "RightUpLeg",
    "Spine",
    "LeftLeg",
    "RightLeg",
    "Spine1",
    "LeftFoot",
    "RightFoot",
    "Spine2",
    "LeftToeBase",
    "RightToeBase",
    "Neck",
    "LeftShoulder",
    "RightShoulder",
    "Head",
    "LeftArm",
    "RightArm",
    "LeftForeArm",
    "RightForeArm",
    "LeftHand",
    "RightHand",
    "LeftHandIndex1",
    "LeftHandIndex2",
    "LeftHandIndex3",
    "LeftHandMiddle1",
    "LeftHandMiddle2",
    "LeftHandMiddle3",
    "LeftHandPinky1",
    "LeftHandPinky2",
    "LeftHandPinky3",
    "LeftHandRing1",
    "LeftHandRing2",
    "LeftHandRing3",
    "LeftHandThumb1",
    "LeftHandThumb2",
    "LeftHandThumb3",
    "RightHandIndex1",
    "RightHandIndex2",
    "RightHandIndex3",
    "RightHandMiddle1",
    "RightHandMiddle2",
    "RightHandMiddle3",
    "RightHandPinky1",
    "RightHandPinky2",
    "RightHandPinky3",
    "RightHandRing1",
    "RightHandRing2",
    "RightHandRing3",
    "RightHandThumb1",
    "RightHandThumb2",
    "RightHandThumb3",
];

/// The four limb chains checked by the IK-continuity warning, as
/// `(root role, end-effector role)` pairs.
pub const IK_CHAIN_PAIRS: [(&str, &str); 4] = [
    ("LeftArm", "LeftHand"),
    ("RightArm", "RightHand"),
    ("LeftUpLeg", "LeftFoot"),
    ("RightUpLeg", "RightFoot"),
];

/// A known external skeleton naming convention.
///
/// `names` is aligned with [`BONE_ROLES`]; an empty entry means the
/// convention has no bone for that role.
pub struct BoneConvention {
    pub label: &'static str,
    pub names: [&'static str; BONE_ROLE_COUNT],
}

impl BoneConvention {
    /// Signature bone used for detection: the convention's name for `Hips`.
    pub fn signature(&self) -> &'static str {
        self.names[0]
    }
}

const QUICK_RIG_BONE_NAMES: [&str; BONE_ROLE_COUNT] = [
    "QuickRigCharacter_Hips",
    "QuickRigCharacter_LeftUpLeg",
    "QuickRigCharacter_RightUpLeg",
    "QuickRigCharacter_Spine",
    "QuickRigCharacter_LeftLeg",
    "QuickRigCharacter_RightLeg",
    "QuickRigCharacter_Spine1",
    "QuickRigCharacter_LeftFoot",
    "QuickRigCharacter_RightFoot",
    "QuickRigCharacter_Spine2",
    "QuickRigCharacter_LeftToeBase",
    "QuickRigCharacter_RightToeBase",
    "QuickRigCharacter_Neck",
    "QuickRigCharacter_LeftShoulder",
    "QuickRigCharacter_RightShoulder",
    "QuickRigCharacter_Head",
    "QuickRigCharacter_LeftArm",
    "QuickRigCharacter_RightArm",
    "QuickRigCharacter_LeftForeArm",
    "QuickRigCharacter_RightForeArm",
    "QuickRigCharacter_LeftHand",
    "QuickRigCharacter_RightHand",
    "QuickRigCharacter_LeftHandIndex1",
    "QuickRigCharacter_LeftHandIndex2",
    "QuickRigCharacter_LeftHandIndex3",
    "QuickRigCharacter_LeftHandMiddle1",
    "QuickRigCharacter_LeftHandMiddle2",
    "QuickRigCharacter_LeftHandMiddle3",
    "QuickRigCharacter_LeftHandPinky1",
    "QuickRigCharacter_LeftHandPinky2",
    "QuickRigCharacter_LeftHandPinky3",
    "QuickRigCharacter_LeftHandRing1",
    "QuickRigCharacter_LeftHandRing2",
    "QuickRigCharacter_LeftHandRing3",
    "QuickRigCharacter_LeftHandThumb1",
    "QuickRigCharacter_LeftHandThumb2",
    "QuickRigCharacter_LeftHandThumb3",
    "QuickRigCharacter_RightHandIndex1",
    "QuickRigCharacter_RightHandIndex2",
    "QuickRigCharacter_RightHandIndex3",
    "QuickRigCharacter_RightHandMiddle1",
    "QuickRigCharacter_RightHandMiddle2",
    "QuickRigCharacter_RightHandMiddle3",
    "QuickRigCharacter_RightHandPinky1",
    "QuickRigCharacter_RightHandPinky2",
    "QuickRigCharacter_RightHandPinky3",
    "QuickRigCharacter_RightHandRing1",
    "QuickRigCharacter_RightHandRing2",
    "QuickRigCharacter_RightHandRing3",
    "QuickRigCharacter_RightHandThumb1",
    "QuickRigCharacter_RightHandThumb2",
    "QuickRigCharacter_RightHandThumb3",
];

const CHARACTER_CREATOR_4_BONE_NAMES: [&str; BONE_ROLE_COUNT] = [
    "CC_Base_Hip",
    "CC_Base_L_Thigh",
    "CC_Base_R_Thigh",
    "CC_Base_Waist",
    "CC_Base_L_Calf",
    "CC_Base_R_Calf",
    "CC_Base_Spine01",
    "CC_Base_L_Foot",
    "CC_Base_R_Foot",
    "CC_Base_Spine02",
    "CC_Base_L_ToeBase",
    "CC_Base_R_ToeBase",
    "CC_Base_NeckTwist01",
    "CC_Base_L_Clavicle",
    "CC_Base_R_Clavicle",
    "CC_Base_Head",
    "CC_Base_L_Upperarm",
    "CC_Base_R_Upperarm",
    "CC_Base_L_Forearm",
    "CC_Base_R_Forearm",
    "CC_Base_L_Hand",
    "CC_Base_R_Hand",
    "CC_Base_L_Index1",
    "CC_Base_L_Index2",
    "CC_Base_L_Index3",
    "CC_Base_L_Mid1",
    "CC_Base_L_Mid2",
    "CC_Base_L_Mid3",
    "CC_Base_L_Pinky1",
    "CC_Base_L_Pinky2",
    "CC_Base_L_Pinky3",
    "CC_Base_L_Ring1",
    "CC_Base_L_Ring2",
    "CC_Base_L_Ring3",
    "CC_Base_L_Thumb1",
    "CC_Base_L_Thumb2",
    "CC_Base_L_Thumb3",
    "CC_Base_R_Index1",
    "CC_Base_R_Index2",
    "CC_Base_R_Index3",
    "CC_Base_R_Mid1",
    "CC_Base_R_Mid2",
    "CC_Base_R_Mid3",
    "CC_Base_R_Pinky1",
    "CC_Base_R_Pinky2",
    "CC_Base_R_Pinky3",
    "CC_Base_R_Ring1",
    "CC_Base_R_Ring2",
    "CC_Base_R_Ring3",
    "CC_Base_R_Thumb1",
    "CC_Base_R_Thumb2",
    "CC_Base_R_Thumb3",
];

const DAZ_3D_BONE_NAMES: [&str; BONE_ROLE_COUNT] = [
    "hip",
    "lThigh",
    "rThigh",
    "abdomen",
    "lShin",
    "rShin",
    "abdomen2",
    "lFoot",
    "rFoot",
    "chest",
    "lToe",
    "rToe",
    "neck",
    "lCollar",
    "rCollar",
    "head",
    "lShldr",
    "rShldr",
    "lForeArm",
    "rForeArm",
    "lHand",
    "rHand",
    "lIndex1",
    "lIndex2",
    "lIndex3",
    "lMid1",
    "lMid2",
    "lMid3",
    "lPinky1",
    "lPinky2",
    "lPinky3",
    "lRing1",
    "lRing2",
    "lRing3",
    "lThumb1",
    "lThumb2",
    "lThumb3",
    "rIndex1",
    "rIndex2",
    "rIndex3",
    "rMid1",
    "rMid2",
    "rMid3",
    "rPinky1",
    "rPinky2",
    "rPinky3",
    "rRing1",
    "rRing2",
    "rRing3",
    "rThumb1",
    "rThumb2",
    "rThumb3",
];

const UNREAL_ENGINE_BONE_NAMES: [&str; BONE_ROLE_COUNT] = [
    "pelvis",
    "thigh_l",
    "thigh_r",
    "spine_03",
    "calf_l",
    "calf_r",
    "spine_04",
    "foot_l",
    "foot_r",
    "spine_05",
    "ball_l",
    "ball_r",
    "neck_01",
    "clavicle_l",
    "clavicle_r",
    "head",
    "upperarm_l",
    "upperarm_r",
    "lowerarm_l",
    "lowerarm_r",
    "hand_l",
    "hand_r",
    "index_01_l",
    "index_02_l",
    "index_03_l",
    "middle_01_l",
    "middle_02_l",
    "middle_03_l",
    "pinky_01_l",
    "pinky_02_l",
    "pinky_03_l",
    "ring_01_l",
    "ring_02_l",
    "ring_03_l",
    "thumb_01_l",
    "thumb_02_l",
    "thumb_03_l",
    "index_01_r",
    "index_02_r",
    "index_03_r",
    "middle_01_r",
    "middle_02_r",
    "middle_03_r",
    "pinky_01_r",
    "pinky_02_r",
    "pinky_03_r",
    "ring_01_r",
    "ring_02_r",
    "ring_03_r",
    "thumb_01_r",
    "thumb_02_r",
    "thumb_03_r",
];

const BLENRIG_BONE_NAMES: [&str; BONE_ROLE_COUNT] = [
    "master_torso",
    "thigh_fk_L",
    "thigh_fk_R",
    "spine_1_fk",
    "shin_fk_L",
    "shin_fk_R",
    "spine_2_fk",
    "foot_fk_L",
    "foot_fk_R",
    "spine_3_fk",
    "foot_toe_1_fk_L",
    "foot_toe_1_fk_R",
    "neck_fk_ctrl",
    "shoulder_L",
    "shoulder_R",
    "head_fk",
    "arm_fk_L",
    "arm_fk_R",
    "forearm_fk_L",
    "forearm_fk_R",
    "hand_fk_L",
    "hand_fk_R",
    "fing_ind_2_L",
    "fing_ind_3_L",
    "fing_ind_4_L",
    "fing_mid_2_L",
    "fing_mid_3_L",
    "fing_mid_4_L",
    "fing_lit_2_L",
    "fing_lit_3_L",
    "fing_lit_4_L",
    "fing_ring_2_L",
    "fing_ring_3_L",
    "fing_ring_4_L",
    "fing_thumb_1_L",
    "fing_thumb_2_L",
    "fing_thumb_3_L",
    "fing_ind_2_R",
    "fing_ind_3_R",
    "fing_ind_4_R",
    "fing_mid_2_R",
    "fing_mid_3_R",
    "fing_mid_4_R",
    "fing_lit_2_R",
    "fing_lit_3_R",
    "fing_lit_4_R",
    "fing_ring_2_R",
    "fing_ring_3_R",
    "fing_ring_4_R",
    "fing_thumb_1_R",
    "fing_thumb_2_R",
    "fing_thumb_3_R",
];

const RIGIFY_BONE_NAMES: [&str; BONE_ROLE_COUNT] = [
    "torso",
    "thigh_fk.L",
    "thigh_fk.R",
    "",
    "shin_fk.L",
    "shin_fk.R",
    "spine_fk.002",
    "foot_fk.L",
    "foot_fk.R",
    "spine_fk.003",
    "toe_fk.L",
    "toe_fk.R",
    "neck",
    "shoulder.L",
    "shoulder.R",
    "head",
    "upper_arm_fk.L",
    "upper_arm_fk.R",
    "forearm_fk.L",
    "forearm_fk.R",
    "hand_fk.L",
    "hand_fk.R",
    "f_index.01.L",
    "f_index.02.L",
    "f_index.03.L",
    "f_middle.01.L",
    "f_middle.02.L",
    "f_middle.03.L",
    "f_pinky.01.L",
    "f_pinky.02.L",
    "f_pinky.03.L",
    "f_ring.01.L",
    "f_ring.02.L",
    "f_ring.03.L",
    "thumb.01.L",
    "thumb.02.L",
    "thumb.03.L",
    "f_index.01.R",
    "f_index.02.R",
    "f_index.03.R",
    "f_middle.01.R",
    "f_middle.02.R",
    "f_middle.03.R",
    "f_pinky.01.R",
    "f_pinky.02.R",
    "f_pinky.03.R",
    "f_ring.01.R",
    "f_ring.02.R",
    "f_ring.03.R",
    "thumb.01.R",
    "thumb.02.R",
    "thumb.03.R",
];

const AUTO_RIG_PRO_BONE_NAMES: [&str; BONE_ROLE_COUNT] = [
    "c_root_master.x",
    "c_thigh_fk.l",
    "c_thigh_fk.r",
    "c_spine_01.x",
    "c_leg_fk.l",
    "c_leg_fk.r",
    "c_spine_02.x",
    "c_foot_fk.l",
    "c_foot_fk.r",
    "c_spine_03.x",
    "c_toes_fk.l",
    "c_toes_fk.r",
    "c_neck_master.x",
    "c_shoulder.l",
    "c_shoulder.r",
    "c_head.x",
    "c_arm_fk.l",
    "c_arm_fk.r",
    "c_forearm_fk.l",
    "c_forearm_fk.r",
    "c_hand_fk.l",
    "c_hand_fk.r",
    "c_index1.l",
    "c_index2.l",
    "c_index3.l",
    "c_middle1.l",
    "c_middle2.l",
    "c_middle3.l",
    "c_pinky1.l",
    "c_pinky2.l",
    "c_pinky3.l",
    "c_ring1.l",
    "c_ring2.l",
    "c_ring3.l",
    "c_thumb1.l",
    "c_thumb2.l",
    "c_thumb3.l",
    "c_index1.r",
    "c_index2.r",
    "c_index3.r",
    "c_middle1.r",
    "c_middle2.r",
    "c_middle3.r",
    "c_pinky1.r",
    "c_pinky2.r",
    "c_pinky3.r",
    "c_ring1.r",
    "c_ring2.r",
    "c_ring3.r",
    "c_thumb1.r",
    "c_thumb2.r",
    "c_thumb3.r",
];

/// All known skeleton conventions, in detection priority order. The first
/// convention whose signature bone matches the candidate skeleton wins.
pub static BONE_CONVENTIONS: [BoneConvention; 8] = [
    BoneConvention {
        label: "Mixamo, Human IK",
        names: BONE_ROLES,
    },
    BoneConvention {
        label: "Quick Rig",
        names: QUICK_RIG_BONE_NAMES,
    },
    BoneConvention {
        label: "Character Creator 4",
        names: CHARACTER_CREATOR_4_BONE_NAMES,
    },
    BoneConvention {
        label: "Daz 3D",
        names: DAZ_3D_BONE_NAMES,
    },
    BoneConvention {
        label: "Unreal Engine",
        names: UNREAL_ENGINE_BONE_NAMES,
    },
    BoneConvention {
        label: "BlenRig",
        names: BLENRIG_BONE_NAMES,
    },
    BoneConvention {
        label: "Rigify",
        names: RIGIFY_BONE_NAMES,
    },
    BoneConvention {
        label: "Auto-Rig Pro",
        names: AUTO_RIG_PRO_BONE_NAMES,
    },
];

/// Canonical face blendshape role keys, in metadata order. `Basis` is the
/// rest shape; everything after it is an expression target.
pub const BLENDSHAPE_ROLES: [&str; BLENDSHAPE_ROLE_COUNT] = [
    "Basis",
    "browInnerDnL",
    "browInnerDnR",
    "browInnerUpL",
    "browInnerUpR",
    "browOuterDnL",
    "browOuterDnR",
    "browOuterUpL",
    "browOuterUpR",
    "browSqueezeL",
    "browSqueezeR",
    "cheekBlowL",
    "cheekBlowR",
    "cheekUpL",
    "cheekUpR",
    "eyeBlinkL",
    "eyeBlinkR",
    "eyeCompressL",
    "eyeCompressR",
    "eyeDn",
    "eyeL",
    "eyeR",
    "eyeSquintL",
    "eyeSquintR",
    "eyeUp",
    "eyeWidenLowerL",
    "eyeWidenLowerR",
    "eyeWidenUpperL",
    "eyeWidenUpperR",
    "jawClenchL",
    "jawClenchR",
    "jawIn",
    "jawL",
    "jawOpen",
    "jawOut",
    "jawR",
    "lipChinRaiserL",
    "lipChinRaiserR",
    "lipCloseLower",
    "lipCloseUpper",
    "lipCornerDnL",
    "lipCornerDnR",
    "lipCornerUpL",
    "lipCornerUpR",
    "lipDimplerL",
    "lipDimplerR",
    "lipFunnelerLower",
    "lipFunnelerUpper",
    "lipLowerDnL",
    "lipLowerDnR",
    "lipLowerPullDnL",
    "lipLowerPullDnR",
    "lipLowerUpL",
    "lipLowerUpR",
    "lipNarrowL",
    "lipNarrowR",
    "lipPoutLower",
    "lipPoutUpper",
    "lipPresserL",
    "lipPresserR",
    "lipPucker",
    "lipPullL",
    "lipPullR",
    "lipPushLower",
    "lipPushUpper",
    "lipSmileClosedL",
    "lipSmileClosedR",
    "lipSmileOpenL",
    "lipSmileOpenR",
    "lipSneerL",
    "lipSneerR",
    "lipStickyL",
    "lipStickyR",
    "lipSuckLower",
    "lipSuckUpper",
    "lipSwingL",
    "lipSwingR",
    "lipTightnerL",
    "lipTightnerR",
    "lipUpperDnL",
    "lipUpperDnR",
    "lipUpperUpL",
    "lipUpperUpR",
    "lipWidenL",
    "lipWidenR",
    "noseCompress",
    "noseFlare",
    "noseSneerL",
    "noseSneerR",
    "noseWrinklerL",
    "noseWrinklerR",
];

/// Blendshapes that drive the gaze; checked against eye rigs by the
/// missing-eye-controls warning.
pub const GAZE_BLENDSHAPES: [&str; 4] = ["eyeDn", "eyeL", "eyeR", "eyeUp"];

/// A known blendshape naming convention, role-aligned like
/// [`BoneConvention`].
pub struct ShapeKeyConvention {
    pub label: &'static str,
    pub names: [&'static str; BLENDSHAPE_ROLE_COUNT],
}

/// All known blendshape conventions. Currently only the standard set, which
/// names shape keys exactly after the roles.
pub static SHAPE_KEY_CONVENTIONS: [ShapeKeyConvention; 1] = [ShapeKeyConvention {
    label: "Standard",
    names: BLENDSHAPE_ROLES,
}];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bone_conventions_are_role_aligned() {
        for convention in &BONE_CONVENTIONS {
            assert_eq!(convention.names.len(), BONE_ROLES.len());
        }
    }

    #[test]
    fn signature_is_hips_slot() {
        assert_eq!(BONE_CONVENTIONS[0].signature(), "Hips");
        assert_eq!(BONE_CONVENTIONS[4].signature(), "pelvis");
    }

    #[test]
    fn gaze_blendshapes_are_known_roles() {
        for gaze in GAZE_BLENDSHAPES {
            assert!(BLENDSHAPE_ROLES.contains(&gaze));
        }
    }

    #[test]
    fn ik_pairs_are_known_roles() {
        for (root, target) in IK_CHAIN_PAIRS {
            assert!(BONE_ROLES.contains(&root));
            assert!(BONE_ROLES.contains(&target));
        }
    }
}
