use pm_common::CurrencyMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A single transaction record as the panel reports it.
///
/// The named fields are the ones the sync pipeline maps into storage. Everything else the panel sends is
/// collected into `extra` and carried along verbatim for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTransaction {
    /// The identifier assigned by the panel. Unique within a cabinet, not globally. The panel has been observed
    /// sending this both as a JSON number and as a string, so both are accepted.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub wallet: String,
    #[serde(default)]
    pub amount: CurrencyMap,
    #[serde(default)]
    pub total: CurrencyMap,
    /// Small integer status enum defined by the panel (pending/approved/rejected/...).
    #[serde(default)]
    pub status: i32,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub approved_at: Option<String>,
    #[serde(default)]
    pub expired_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where D: Deserializer<'de> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(serde_json::Number),
    }
    match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => Ok(s),
        StringOrNumber::Number(n) => Ok(n.to_string()),
    }
}
