//! Decoded field values.

use std::fmt;

/// A single decoded field value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FieldValue {
    Bool(bool),
    /// Unsigned varints, fixed 64-bit values, handles and tokens.
    Unsigned(u64),
    Signed(i32),
    Float(f32),
    Vector2([f32; 2]),
    Vector3([f32; 3]),
    Vector4([f32; 4]),
    String(String),
}

impl FieldValue {
    /// Short name of the variant, used in diagnostics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Unsigned(_) => "unsigned",
            Self::Signed(_) => "signed",
            Self::Float(_) => "float",
            Self::Vector2(_) => "vector2",
            Self::Vector3(_) => "vector3",
            Self::Vector4(_) => "vector4",
            Self::String(_) => "string",
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as `u64` if it is a non-negative integer.
    #[must_use]
    pub const fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Unsigned(v) => Some(*v),
            Self::Signed(v) if *v >= 0 => Some(*v as u64),
            _ => None,
        }
    }

    /// Returns the value as `i64` if it is an integer.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Signed(v) => Some(*v as i64),
            Self::Unsigned(v) if *v <= i64::MAX as u64 => Some(*v as i64),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_f32(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_vec3(&self) -> Option<[f32; 3]> {
        match self {
            Self::Vector3(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Unsigned(v) => write!(f, "{v}"),
            Self::Signed(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Vector2([x, y]) => write!(f, "[{x}, {y}]"),
            Self::Vector3([x, y, z]) => write!(f, "[{x}, {y}, {z}]"),
            Self::Vector4([x, y, z, w]) => write!(f, "[{x}, {y}, {z}, {w}]"),
            Self::String(v) => write!(f, "{v:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_accessors_cross_signedness() {
        assert_eq!(FieldValue::Signed(5).as_u64(), Some(5));
        assert_eq!(FieldValue::Signed(-5).as_u64(), None);
        assert_eq!(FieldValue::Unsigned(7).as_i64(), Some(7));
        assert_eq!(FieldValue::Unsigned(u64::MAX).as_i64(), None);
    }

    #[test]
    fn display_vectors() {
        assert_eq!(FieldValue::Vector2([1.0, 2.5]).to_string(), "[1, 2.5]");
        assert_eq!(FieldValue::String("x".into()).to_string(), "\"x\"");
    }
}
