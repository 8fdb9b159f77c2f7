// Appliance API data types
//
// The API wraps every payload in a `{ "data": ... }` envelope. Values arrive
// as strings, numbers or booleans depending on the key; we normalize them to
// strings so consumers see one shape regardless of the appliance type.

use serde::{Deserialize, Deserializer, Serialize};

// ── Envelopes ────────────────────────────────────────────────────────

/// Standard `{ "data": ... }` response envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct DataEnvelope<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApplianceList {
    #[serde(default)]
    pub homeappliances: Vec<HomeAppliance>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusList {
    #[serde(default)]
    pub status: Vec<Data>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SettingList {
    #[serde(default)]
    pub settings: Vec<Data>,
}

/// Payload of a single event-stream frame. Items stay raw so one malformed
/// entry does not cost the rest of the batch.
#[derive(Debug, Deserialize)]
pub(crate) struct EventItems {
    #[serde(default)]
    pub items: Vec<serde_json::Value>,
}

// ── Appliance ────────────────────────────────────────────────────────

/// One paired appliance as returned by `GET /api/homeappliances`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeAppliance {
    #[serde(rename = "haId")]
    pub ha_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub vib: String,
    #[serde(default)]
    pub connected: bool,
    #[serde(rename = "type", default)]
    pub appliance_type: String,
    #[serde(default)]
    pub enumber: String,
}

// ── Data ─────────────────────────────────────────────────────────────

/// A named setting, status, or streamed event value.
///
/// `value` being `None` is meaningful: the appliance reported the key
/// without a value, which is different from `"false"` or `"0"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Data {
    #[serde(default)]
    pub key: String,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// Events on the stream carry the same shape as settings and status values.
pub type Event = Data;

impl Data {
    pub fn new(key: impl Into<String>, value: Option<String>, unit: Option<String>) -> Self {
        Self {
            key: key.into(),
            value,
            unit,
        }
    }

    /// Interpret the value as a boolean (`"true"` / `"false"`).
    pub fn value_as_bool(&self) -> Option<bool> {
        self.value.as_deref().and_then(|v| v.parse().ok())
    }

    pub fn value_as_i64(&self) -> Option<i64> {
        self.value.as_deref().and_then(|v| v.parse().ok())
    }

    pub fn value_as_f64(&self) -> Option<f64> {
        self.value.as_deref().and_then(|v| v.parse().ok())
    }
}

/// Accept any JSON scalar for `value` and keep it as a string.
fn scalar_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match raw {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

// ── Program ──────────────────────────────────────────────────────────

/// An active or selected program with its options, in API order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub key: String,
    #[serde(default)]
    pub options: Vec<Data>,
}

impl Program {
    /// Look up an option by key.
    pub fn option(&self, key: &str) -> Option<&Data> {
        self.options.iter().find(|o| o.key == key)
    }
}

// ── Requests ─────────────────────────────────────────────────────────

/// Body of `PUT .../settings/{key}`: `{ "data": { "key": ..., "value": ... } }`.
#[derive(Debug, Serialize)]
pub(crate) struct SettingUpdate<'a> {
    pub data: SettingValue<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SettingValue<'a> {
    pub key: &'a str,
    pub value: &'a serde_json::Value,
}
