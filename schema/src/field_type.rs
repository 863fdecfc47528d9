//! Parsed declared type strings.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{SchemaError, SchemaResult};

/// Array length assumed when the bracket contents cannot be resolved.
pub const UNRESOLVED_ARRAY_COUNT: u32 = 1024;

/// Engine constants that appear as array lengths in type strings.
const NAMED_COUNTS: &[(&str, u32)] = &[
    ("MAX_ITEM_STOCKS", 8),
    ("MAX_ABILITY_DRAFT_ABILITIES", 48),
];

/// A declared field type such as `CNetworkUtlVectorBase< CHandle< CBaseEntity > >`
/// or `uint32[MAX_ITEM_STOCKS]`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldType {
    pub base: String,
    pub generic: Option<Box<FieldType>>,
    pub pointer: bool,
    /// Fixed array length, zero when the type is not an array.
    pub count: u32,
}

fn type_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([^<\[*]+)(<\s*(.*?)\s*>)?(\*)?(\[(.*?)\])?")
            .expect("field type pattern is valid")
    })
}

impl FieldType {
    /// Parses a declared type string.
    pub fn parse(name: &str) -> SchemaResult<Self> {
        let caps = type_regex()
            .captures(name)
            .ok_or_else(|| SchemaError::InvalidTypeName {
                type_name: name.to_string(),
            })?;

        let base = caps
            .get(1)
            .map(|m| m.as_str().trim())
            .filter(|base| !base.is_empty())
            .ok_or_else(|| SchemaError::InvalidTypeName {
                type_name: name.to_string(),
            })?;

        let generic = match caps.get(3).map(|m| m.as_str()) {
            Some(inner) if !inner.is_empty() => Some(Box::new(Self::parse(inner)?)),
            _ => None,
        };

        let count = caps.get(6).map_or(0, |m| resolve_count(m.as_str()));

        Ok(Self {
            base: base.to_string(),
            generic,
            pointer: caps.get(4).is_some(),
            count,
        })
    }

    /// Base type of the generic element, if any.
    #[must_use]
    pub fn element_base(&self) -> Option<&str> {
        self.generic.as_deref().map(|g| g.base.as_str())
    }
}

fn resolve_count(raw: &str) -> u32 {
    if let Some((_, count)) = NAMED_COUNTS.iter().find(|(name, _)| *name == raw) {
        return *count;
    }
    match raw.trim().parse::<i64>() {
        Ok(count) if count > 0 => u32::try_from(count).unwrap_or(UNRESOLVED_ARRAY_COUNT),
        _ => UNRESOLVED_ARRAY_COUNT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_type() {
        let ty = FieldType::parse("uint32").unwrap();
        assert_eq!(ty.base, "uint32");
        assert!(ty.generic.is_none());
        assert!(!ty.pointer);
        assert_eq!(ty.count, 0);
    }

    #[test]
    fn parse_pointer() {
        let ty = FieldType::parse("CBodyComponent*").unwrap();
        assert_eq!(ty.base, "CBodyComponent");
        assert!(ty.pointer);
    }

    #[test]
    fn parse_literal_array() {
        let ty = FieldType::parse("char[64]").unwrap();
        assert_eq!(ty.base, "char");
        assert_eq!(ty.count, 64);
    }

    #[test]
    fn parse_named_count() {
        let ty = FieldType::parse("item_definition_index_t[MAX_ITEM_STOCKS]").unwrap();
        assert_eq!(ty.count, 8);
        let ty = FieldType::parse("int32[MAX_ABILITY_DRAFT_ABILITIES]").unwrap();
        assert_eq!(ty.count, 48);
    }

    #[test]
    fn unresolvable_count_defaults() {
        let ty = FieldType::parse("uint16[MAX_SOMETHING_UNKNOWN]").unwrap();
        assert_eq!(ty.count, UNRESOLVED_ARRAY_COUNT);
        let ty = FieldType::parse("uint16[0]").unwrap();
        assert_eq!(ty.count, UNRESOLVED_ARRAY_COUNT);
    }

    #[test]
    fn parse_generic_vector() {
        let ty = FieldType::parse("CNetworkUtlVectorBase< CHandle< CBaseEntity > >").unwrap();
        assert_eq!(ty.base, "CNetworkUtlVectorBase");
        assert_eq!(ty.element_base(), Some("CHandle"));
    }

    #[test]
    fn parse_generic_pointer_element() {
        let ty = FieldType::parse("CUtlVector< CEconItemAttribute >").unwrap();
        assert_eq!(ty.base, "CUtlVector");
        assert_eq!(ty.element_base(), Some("CEconItemAttribute"));
    }

    #[test]
    fn parse_empty_fails() {
        assert!(matches!(
            FieldType::parse(""),
            Err(SchemaError::InvalidTypeName { .. })
        ));
    }
}
