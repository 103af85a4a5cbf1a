//! Special floating-point literal handling.
//!
//! The remote end encodes non-finite numbers and signed zero as quoted
//! strings rather than bare JSON numbers: `"NaN"`, `"Infinity"`,
//! `"-Infinity"`, and `"-0"`. Payload types carrying such numbers opt in
//! with `#[serde(with = "special_float")]` or use [`JsFloat`] directly.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ============================================================================
// special_float
// ============================================================================

/// Serde adapter for `f64` fields using the wire's special literals.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct NumberValue {
///     #[serde(with = "special_float")]
///     value: f64,
/// }
/// ```
pub mod special_float {
    use super::*;

    pub fn serialize<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if *value == f64::INFINITY {
            serializer.serialize_str("Infinity")
        } else if *value == f64::NEG_INFINITY {
            serializer.serialize_str("-Infinity")
        } else if *value == 0.0 && value.is_sign_negative() {
            serializer.serialize_str("-0")
        } else {
            serializer.serialize_f64(*value)
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(SpecialFloatVisitor)
    }
}

struct SpecialFloatVisitor;

impl serde::de::Visitor<'_> for SpecialFloatVisitor {
    type Value = f64;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a number or one of \"NaN\", \"Infinity\", \"-Infinity\", \"-0\"")
    }

    fn visit_f64<E>(self, value: f64) -> Result<f64, E> {
        Ok(value)
    }

    fn visit_i64<E>(self, value: i64) -> Result<f64, E> {
        Ok(value as f64)
    }

    fn visit_u64<E>(self, value: u64) -> Result<f64, E> {
        Ok(value as f64)
    }

    fn visit_str<E>(self, value: &str) -> Result<f64, E>
    where
        E: serde::de::Error,
    {
        match value {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            "-0" => Ok(-0.0),
            other => Err(E::invalid_value(
                serde::de::Unexpected::Str(other),
                &self,
            )),
        }
    }
}

// ============================================================================
// JsFloat
// ============================================================================

/// An `f64` that round-trips the wire's special literals.
///
/// Equivalent to a plain `f64` field annotated with
/// `#[serde(with = "special_float")]`, packaged as a type for payload
/// shapes built outside this crate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JsFloat(pub f64);

impl JsFloat {
    /// Returns the wrapped value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }
}

impl From<f64> for JsFloat {
    #[inline]
    fn from(value: f64) -> Self {
        Self(value)
    }
}

impl From<JsFloat> for f64 {
    #[inline]
    fn from(value: JsFloat) -> Self {
        value.0
    }
}

impl Serialize for JsFloat {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        special_float::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for JsFloat {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        special_float::deserialize(deserializer).map(Self)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_nan_string() {
        let value: JsFloat = serde_json::from_str("\"NaN\"").expect("parse");
        assert!(value.0.is_nan());
    }

    #[test]
    fn test_decodes_infinities() {
        let pos: JsFloat = serde_json::from_str("\"Infinity\"").expect("parse");
        let neg: JsFloat = serde_json::from_str("\"-Infinity\"").expect("parse");

        assert_eq!(pos.0, f64::INFINITY);
        assert_eq!(neg.0, f64::NEG_INFINITY);
    }

    #[test]
    fn test_decodes_negative_zero() {
        let value: JsFloat = serde_json::from_str("\"-0\"").expect("parse");
        assert_eq!(value.0, 0.0);
        assert!(value.0.is_sign_negative());
    }

    #[test]
    fn test_decodes_plain_numbers() {
        let float: JsFloat = serde_json::from_str("1.5").expect("parse");
        let int: JsFloat = serde_json::from_str("42").expect("parse");

        assert_eq!(float.0, 1.5);
        assert_eq!(int.0, 42.0);
    }

    #[test]
    fn test_rejects_other_strings() {
        assert!(serde_json::from_str::<JsFloat>("\"fast\"").is_err());
    }

    #[test]
    fn test_encodes_special_values_as_strings() {
        assert_eq!(serde_json::to_string(&JsFloat(f64::NAN)).expect("nan"), "\"NaN\"");
        assert_eq!(
            serde_json::to_string(&JsFloat(f64::INFINITY)).expect("inf"),
            "\"Infinity\""
        );
        assert_eq!(
            serde_json::to_string(&JsFloat(f64::NEG_INFINITY)).expect("-inf"),
            "\"-Infinity\""
        );
        assert_eq!(serde_json::to_string(&JsFloat(-0.0)).expect("-0"), "\"-0\"");
    }

    #[test]
    fn test_encodes_ordinary_values_as_numbers() {
        assert_eq!(serde_json::to_string(&JsFloat(2.5)).expect("2.5"), "2.5");
        assert_eq!(serde_json::to_string(&JsFloat(0.0)).expect("0"), "0.0");
    }

    #[test]
    fn test_with_attribute_field() {
        #[derive(Serialize, Deserialize)]
        struct NumberValue {
            #[serde(with = "special_float")]
            value: f64,
        }

        let parsed: NumberValue = serde_json::from_str(r#"{"value":"-Infinity"}"#).expect("parse");
        assert_eq!(parsed.value, f64::NEG_INFINITY);

        let encoded = serde_json::to_string(&NumberValue { value: f64::NAN }).expect("encode");
        assert_eq!(encoded, r#"{"value":"NaN"}"#);
    }
}
