//! Payload decoding.
//!
//! Claude Code pipes a JSON object to the statusline on every draw. Only nine
//! keys matter, and they may sit at any depth (`workspace.current_dir`,
//! `cost.total_cost_usd`, `vim.mode`, ...). The decoder walks the document
//! once with a serde visitor, captures those keys wherever they appear, and
//! skips everything else without building a value tree.
//!
//! Decoding never fails. A value of the wrong type is ignored, and if the
//! document is truncated the keys seen before the break are kept.

use std::fmt;

use serde::de::{
    DeserializeSeed, Deserializer, Error as DeError, IgnoredAny, MapAccess, SeqAccess, Visitor,
};

/// Fields extracted from one payload. `None` means the key was absent or
/// unusable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    pub current_dir: Option<String>,
    pub display_name: Option<String>,
    pub mode: Option<String>,
    pub total_cost_usd: Option<f64>,
    pub total_lines_added: Option<i64>,
    pub total_lines_removed: Option<i64>,
    pub total_duration_ms: Option<i64>,
    pub used_percentage: Option<i64>,
    pub context_window_size: Option<i64>,
}

impl Payload {
    pub fn decode(bytes: &[u8]) -> Payload {
        let mut payload = Payload::default();
        let mut deserializer = serde_json::Deserializer::from_slice(bytes);
        if let Err(err) = FieldScan(&mut payload).deserialize(&mut deserializer) {
            tracing::debug!(error = %err, "Payload JSON incomplete; keeping decoded fields");
        }
        payload
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    CurrentDir,
    DisplayName,
    Mode,
    TotalCostUsd,
    TotalLinesAdded,
    TotalLinesRemoved,
    TotalDurationMs,
    UsedPercentage,
    ContextWindowSize,
}

impl Field {
    fn from_key(key: &str) -> Option<Field> {
        Some(match key {
            "current_dir" => Field::CurrentDir,
            "display_name" => Field::DisplayName,
            "mode" => Field::Mode,
            "total_cost_usd" => Field::TotalCostUsd,
            "total_lines_added" => Field::TotalLinesAdded,
            "total_lines_removed" => Field::TotalLinesRemoved,
            "total_duration_ms" => Field::TotalDurationMs,
            "used_percentage" => Field::UsedPercentage,
            "context_window_size" => Field::ContextWindowSize,
            _ => return None,
        })
    }
}

/// Walks any value, recording known keys into the payload.
struct FieldScan<'p>(&'p mut Payload);

impl<'de> DeserializeSeed<'de> for FieldScan<'_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for FieldScan<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_bool<E: DeError>(self, _: bool) -> Result<(), E> {
        Ok(())
    }

    fn visit_i64<E: DeError>(self, _: i64) -> Result<(), E> {
        Ok(())
    }

    fn visit_u64<E: DeError>(self, _: u64) -> Result<(), E> {
        Ok(())
    }

    fn visit_f64<E: DeError>(self, _: f64) -> Result<(), E> {
        Ok(())
    }

    fn visit_str<E: DeError>(self, _: &str) -> Result<(), E> {
        Ok(())
    }

    fn visit_unit<E: DeError>(self) -> Result<(), E> {
        Ok(())
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<(), A::Error> {
        while seq.next_element_seed(FieldScan(&mut *self.0))?.is_some() {}
        Ok(())
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        let payload = self.0;
        while let Some(field) = map.next_key_seed(FieldKey)? {
            match field {
                Some(Field::CurrentDir) => set(&mut payload.current_dir, map.next_value_seed(Text)?),
                Some(Field::DisplayName) => {
                    set(&mut payload.display_name, map.next_value_seed(Text)?)
                }
                Some(Field::Mode) => set(&mut payload.mode, map.next_value_seed(Text)?),
                Some(Field::TotalCostUsd) => {
                    set(&mut payload.total_cost_usd, map.next_value_seed(Number)?)
                }
                Some(Field::TotalLinesAdded) => set(
                    &mut payload.total_lines_added,
                    map.next_value_seed(Number)?.map(to_int),
                ),
                Some(Field::TotalLinesRemoved) => set(
                    &mut payload.total_lines_removed,
                    map.next_value_seed(Number)?.map(to_int),
                ),
                Some(Field::TotalDurationMs) => set(
                    &mut payload.total_duration_ms,
                    map.next_value_seed(Number)?.map(to_int),
                ),
                Some(Field::UsedPercentage) => set(
                    &mut payload.used_percentage,
                    map.next_value_seed(Number)?.map(to_int),
                ),
                Some(Field::ContextWindowSize) => set(
                    &mut payload.context_window_size,
                    map.next_value_seed(Number)?.map(to_int),
                ),
                None => map.next_value_seed(FieldScan(&mut *payload))?,
            }
        }
        Ok(())
    }
}

fn set<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

/// Fractional values for integer keys are truncated toward zero.
fn to_int(value: f64) -> i64 {
    value as i64
}

/// Classifies a map key without allocating.
struct FieldKey;

impl<'de> DeserializeSeed<'de> for FieldKey {
    type Value = Option<Field>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_str(self)
    }
}

impl<'de> Visitor<'de> for FieldKey {
    type Value = Option<Field>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an object key")
    }

    fn visit_str<E: DeError>(self, key: &str) -> Result<Self::Value, E> {
        Ok(Field::from_key(key))
    }
}

/// A string value; anything else yields `None`.
struct Text;

impl<'de> DeserializeSeed<'de> for Text {
    type Value = Option<String>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for Text {
    type Value = Option<String>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a string")
    }

    fn visit_str<E: DeError>(self, value: &str) -> Result<Self::Value, E> {
        Ok(Some(value.to_owned()))
    }

    fn visit_bool<E: DeError>(self, _: bool) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_i64<E: DeError>(self, _: i64) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_u64<E: DeError>(self, _: u64) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_f64<E: DeError>(self, _: f64) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_unit<E: DeError>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(None)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
        Ok(None)
    }
}

/// A numeric value; anything else yields `None`.
struct Number;

impl<'de> DeserializeSeed<'de> for Number {
    type Value = Option<f64>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for Number {
    type Value = Option<f64>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a number")
    }

    fn visit_i64<E: DeError>(self, value: i64) -> Result<Self::Value, E> {
        Ok(Some(value as f64))
    }

    fn visit_u64<E: DeError>(self, value: u64) -> Result<Self::Value, E> {
        Ok(Some(value as f64))
    }

    fn visit_f64<E: DeError>(self, value: f64) -> Result<Self::Value, E> {
        Ok(Some(value))
    }

    fn visit_str<E: DeError>(self, _: &str) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_bool<E: DeError>(self, _: bool) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_unit<E: DeError>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(None)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
        Ok(None)
    }
}
