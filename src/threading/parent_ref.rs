//! Parent reference normalization
//!
//! Reply pointers reach us from several write paths (platform webhooks, the
//! compose box, older imports) and arrive as integers, numeric strings, `0`,
//! `null`, or not at all. Everything downstream works on [`ParentRef`], which
//! is produced by exactly one total function: [`ParentRef::normalize`].
//!
//! ## Rules
//!
//! - absent or `null` → [`ParentRef::Root`]
//! - anything that coerces to `0` (`0`, `"0"`, `" 0 "`, `0.0`) → [`ParentRef::Root`]
//! - a finite, integral, non-zero number or numeric string → [`ParentRef::Reply`]
//! - everything else (`"abc"`, booleans, arrays, objects, `1.5`, `NaN`) → [`ParentRef::Root`]
//!
//! `0` is never a valid message id, so treating it as "no parent" is safe. This
//! is not a general "falsy means root" rule: `-1` stays `Reply(-1)` and is later
//! handled like any other reference that points outside the thread.

use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Normalized reply pointer of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParentRef {
    /// The message starts a new top-level branch.
    #[default]
    Root,
    /// The message replies to the message with this id.
    Reply(i64),
}

impl ParentRef {
    /// Canonicalize a raw, as-received parent pointer.
    ///
    /// `None` stands for a field that was missing altogether. Never fails.
    pub fn normalize(raw: Option<&Value>) -> ParentRef {
        let coerced = match raw {
            None | Some(Value::Null) => None,
            Some(Value::Number(number)) => coerce_number(number),
            Some(Value::String(text)) => coerce_str(text),
            Some(_) => None,
        };

        match coerced {
            Some(0) | None => ParentRef::Root,
            Some(id) => ParentRef::Reply(id),
        }
    }

    /// The referenced id, if any.
    pub fn id(self) -> Option<i64> {
        match self {
            ParentRef::Root => None,
            ParentRef::Reply(id) => Some(id),
        }
    }

    pub fn is_root(self) -> bool {
        matches!(self, ParentRef::Root)
    }
}

fn coerce_number(number: &serde_json::Number) -> Option<i64> {
    if let Some(value) = number.as_i64() {
        return Some(value);
    }
    // u64 beyond i64::MAX is not a representable id
    if number.is_u64() {
        return None;
    }
    number.as_f64().and_then(integral_f64)
}

fn coerce_str(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = trimmed.parse::<i64>() {
        return Some(value);
    }
    trimmed.parse::<f64>().ok().and_then(integral_f64)
}

fn integral_f64(value: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, hence the strict upper bound
    if value.is_finite()
        && value.fract() == 0.0
        && value >= i64::MIN as f64
        && value < i64::MAX as f64
    {
        Some(value as i64)
    } else {
        None
    }
}

/// Stored `parent_id` columns: `NULL` and `0` both mean root.
impl From<Option<i64>> for ParentRef {
    fn from(value: Option<i64>) -> Self {
        match value {
            None | Some(0) => ParentRef::Root,
            Some(id) => ParentRef::Reply(id),
        }
    }
}

impl From<ParentRef> for Option<i64> {
    fn from(value: ParentRef) -> Self {
        value.id()
    }
}

impl Serialize for ParentRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.id().serialize(serializer)
    }
}

/// Accepts any JSON value and normalizes it, so request bodies are
/// canonicalized at ingestion. Pair with `#[serde(default)]` to cover a
/// missing field.
impl<'de> Deserialize<'de> for ParentRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Ok(ParentRef::normalize(Some(&raw)))
    }
}

impl JsonSchema for ParentRef {
    fn schema_name() -> String {
        "ParentRef".to_string()
    }

    fn json_schema(generator: &mut schemars::r#gen::SchemaGenerator) -> schemars::schema::Schema {
        <Option<i64>>::json_schema(generator)
    }

    fn is_referenceable() -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_and_null_are_root() {
        assert_eq!(ParentRef::normalize(None), ParentRef::Root);
        assert_eq!(ParentRef::normalize(Some(&Value::Null)), ParentRef::Root);
    }

    #[test]
    fn test_zero_is_root_in_every_spelling() {
        for raw in [json!(0), json!("0"), json!(" 0 "), json!(0.0), json!("-0")] {
            assert_eq!(ParentRef::normalize(Some(&raw)), ParentRef::Root, "{raw}");
        }
    }

    #[test]
    fn test_numbers_and_numeric_strings() {
        assert_eq!(ParentRef::normalize(Some(&json!(5))), ParentRef::Reply(5));
        assert_eq!(ParentRef::normalize(Some(&json!("5"))), ParentRef::Reply(5));
        assert_eq!(ParentRef::normalize(Some(&json!(" 42\n"))), ParentRef::Reply(42));
        assert_eq!(ParentRef::normalize(Some(&json!("7.0"))), ParentRef::Reply(7));
        assert_eq!(ParentRef::normalize(Some(&json!(3.0))), ParentRef::Reply(3));
    }

    #[test]
    fn test_negative_ids_are_kept() {
        assert_eq!(ParentRef::normalize(Some(&json!(-1))), ParentRef::Reply(-1));
        assert_eq!(ParentRef::normalize(Some(&json!("-1"))), ParentRef::Reply(-1));
    }

    #[test]
    fn test_garbage_is_root() {
        let inputs = [
            json!("abc"),
            json!(""),
            json!("   "),
            json!("NaN"),
            json!("inf"),
            json!("12abc"),
            json!(1.5),
            json!(true),
            json!([1]),
            json!({}),
            json!({"id": 3}),
            json!(u64::MAX),
            json!("1e30"),
        ];
        for raw in inputs {
            assert_eq!(ParentRef::normalize(Some(&raw)), ParentRef::Root, "{raw}");
        }
    }

    #[test]
    fn test_stored_column_conversion() {
        assert_eq!(ParentRef::from(None), ParentRef::Root);
        assert_eq!(ParentRef::from(Some(0)), ParentRef::Root);
        assert_eq!(ParentRef::from(Some(9)), ParentRef::Reply(9));
        assert_eq!(Option::<i64>::from(ParentRef::Reply(9)), Some(9));
        assert_eq!(Option::<i64>::from(ParentRef::Root), None);
    }

    #[derive(Deserialize)]
    struct Body {
        #[serde(default, rename = "parentRef")]
        parent_ref: ParentRef,
    }

    #[test]
    fn test_deserialize_normalizes_request_bodies() {
        let parse = |body: &str| serde_json::from_str::<Body>(body).unwrap().parent_ref;

        assert_eq!(parse("{}"), ParentRef::Root);
        assert_eq!(parse(r#"{"parentRef": null}"#), ParentRef::Root);
        assert_eq!(parse(r#"{"parentRef": 0}"#), ParentRef::Root);
        assert_eq!(parse(r#"{"parentRef": "12"}"#), ParentRef::Reply(12));
        assert_eq!(parse(r#"{"parentRef": {"nested": true}}"#), ParentRef::Root);
    }

    #[test]
    fn test_serializes_as_nullable_integer() {
        assert_eq!(serde_json::to_string(&ParentRef::Root).unwrap(), "null");
        assert_eq!(serde_json::to_string(&ParentRef::Reply(4)).unwrap(), "4");
    }
}
