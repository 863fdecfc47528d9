//! Build-gated overrides of field encoding parameters.
//!
//! Older game builds announce some fields with ambiguous float encodings; the
//! patches below rewrite the encoder hint or range by variable name before a
//! field's model and decoder are resolved.

use crate::field::Field;

/// Encoding parameter rewrite applied to a matching field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rewrite {
    /// Replace the encoder hint.
    Encoder(&'static str),
    /// Replace the encoder hint depending on the field's parent serializer.
    EncoderForParent {
        parent: &'static str,
        matched: &'static str,
        otherwise: &'static str,
    },
    /// Replace the quantization range.
    Range { low: Option<f32>, high: Option<f32> },
}

impl Rewrite {
    fn apply(self, field: &mut Field) {
        match self {
            Self::Encoder(encoder) => field.encoder = encoder.to_string(),
            Self::EncoderForParent {
                parent,
                matched,
                otherwise,
            } => {
                let encoder = if field.parent_name == parent {
                    matched
                } else {
                    otherwise
                };
                field.encoder = encoder.to_string();
            }
            Self::Range { low, high } => {
                field.low_value = low;
                field.high_value = high;
            }
        }
    }
}

/// A rewrite applied to every field whose variable name is listed.
#[derive(Debug, Clone, Copy)]
pub struct PatchRule {
    pub var_names: &'static [&'static str],
    pub rewrite: Rewrite,
}

/// A set of rules gated on an inclusive build range.
///
/// The range `(0, 0)` applies to every build.
#[derive(Debug, Clone, Copy)]
pub struct FieldPatch {
    pub min_build: u32,
    pub max_build: u32,
    pub rules: &'static [PatchRule],
}

impl FieldPatch {
    #[must_use]
    pub const fn applies_to(&self, build: u32) -> bool {
        if self.min_build == 0 && self.max_build == 0 {
            return true;
        }
        build >= self.min_build && build <= self.max_build
    }

    /// Applies the first rule naming the field, if any.
    pub fn apply(&self, field: &mut Field) {
        if let Some(rule) = self
            .rules
            .iter()
            .find(|rule| rule.var_names.contains(&field.var_name.as_str()))
        {
            rule.rewrite.apply(field);
        }
    }
}

const ANGLE_NAMES: &[&str] = &[
    "angExtraLocalAngles",
    "angLocalAngles",
    "m_angInitialAngles",
    "m_angRotation",
    "m_ragAngles",
    "m_vLightDirection",
];

const COORD_NAMES: &[&str] = &[
    "dirPrimary",
    "localSound",
    "m_flElasticity",
    "m_location",
    "m_poolOrigin",
    "m_ragPos",
    "m_vecEndPos",
    "m_vecLadderDir",
    "m_vecPlayerMountPositionBottom",
    "m_vecPlayerMountPositionTop",
    "m_viewtarget",
    "m_WorldMaxs",
    "m_WorldMins",
    "origin",
    "vecLocalOrigin",
];

const FIXED64_NAMES: &[&str] = &[
    "m_bItemWhiteList",
    "m_bWorldTreeState",
    "m_iPlayerIDsInControl",
    "m_iPlayerSteamID",
    "m_ulTeamBannerLogo",
    "m_ulTeamBaseLogo",
    "m_ulTeamLogo",
];

/// Patches in application order.
pub static FIELD_PATCHES: &[FieldPatch] = &[
    FieldPatch {
        min_build: 0,
        max_build: 990,
        rules: &[
            PatchRule {
                var_names: ANGLE_NAMES,
                rewrite: Rewrite::EncoderForParent {
                    parent: "CBodyComponentBaseAnimatingOverlay",
                    matched: "qangle_pitch_yaw",
                    otherwise: "QAngle",
                },
            },
            PatchRule {
                var_names: COORD_NAMES,
                rewrite: Rewrite::Encoder("coord"),
            },
            PatchRule {
                var_names: &["m_vecLadderNormal"],
                rewrite: Rewrite::Encoder("normal"),
            },
        ],
    },
    FieldPatch {
        min_build: 0,
        max_build: 954,
        rules: &[PatchRule {
            var_names: &["m_flMana", "m_flMaxMana"],
            rewrite: Rewrite::Range {
                low: None,
                high: Some(8192.0),
            },
        }],
    },
    FieldPatch {
        min_build: 1016,
        max_build: 1027,
        rules: &[PatchRule {
            var_names: FIXED64_NAMES,
            rewrite: Rewrite::Encoder("fixed64"),
        }],
    },
    FieldPatch {
        min_build: 0,
        max_build: 0,
        rules: &[
            PatchRule {
                var_names: &["m_flSimulationTime", "m_flAnimTime"],
                rewrite: Rewrite::Encoder("simtime"),
            },
            PatchRule {
                var_names: &["m_flRuneTime"],
                rewrite: Rewrite::Encoder("runetime"),
            },
        ],
    },
];

/// Patches that apply to `build`, in order.
pub fn patches_for_build(build: u32) -> impl Iterator<Item = &'static FieldPatch> {
    FIELD_PATCHES.iter().filter(move |p| p.applies_to(build))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_type::FieldType;

    fn field(var_name: &str, var_type: &str) -> Field {
        Field::new(var_name, var_type, FieldType::parse(var_type).unwrap())
    }

    fn patch_all(field: &mut Field, build: u32) {
        for patch in patches_for_build(build) {
            patch.apply(field);
        }
    }

    #[test]
    fn unconditional_patches_apply_to_any_build() {
        let mut f = field("m_flSimulationTime", "float32");
        patch_all(&mut f, 7000);
        assert_eq!(f.encoder, "simtime");

        let mut f = field("m_flRuneTime", "float32");
        patch_all(&mut f, 7000);
        assert_eq!(f.encoder, "runetime");
    }

    #[test]
    fn build_range_is_inclusive() {
        let patch = &FIELD_PATCHES[2];
        assert!(!patch.applies_to(1015));
        assert!(patch.applies_to(1016));
        assert!(patch.applies_to(1027));
        assert!(!patch.applies_to(1028));
    }

    #[test]
    fn angle_patch_depends_on_parent() {
        let mut f = field("m_angRotation", "QAngle");
        f.parent_name = "CBodyComponentBaseAnimatingOverlay".to_string();
        patch_all(&mut f, 900);
        assert_eq!(f.encoder, "qangle_pitch_yaw");

        let mut f = field("m_angRotation", "QAngle");
        f.parent_name = "CBodyComponentPoint".to_string();
        patch_all(&mut f, 900);
        assert_eq!(f.encoder, "QAngle");

        let mut f = field("m_angRotation", "QAngle");
        patch_all(&mut f, 991);
        assert!(f.encoder.is_empty());
    }

    #[test]
    fn mana_range_override() {
        let mut f = field("m_flMana", "CNetworkedQuantizedFloat");
        f.low_value = Some(0.0);
        f.high_value = Some(4096.0);
        patch_all(&mut f, 954);
        assert_eq!(f.low_value, None);
        assert_eq!(f.high_value, Some(8192.0));
    }

    #[test]
    fn unrelated_fields_untouched() {
        let mut f = field("m_iHealth", "int32");
        patch_all(&mut f, 500);
        assert!(f.encoder.is_empty());
    }
}
