use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Number;

/// A structured money value as reported by an external panel: a mapping from currency code to amount.
///
/// Amounts are kept as raw JSON numbers and passed through verbatim. No arithmetic is ever performed on them;
/// they exist so that ingested records can be audited against the panel's own figures. Keys are ordered, so two
/// maps with the same entries always compare and serialize identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyMap(BTreeMap<String, Number>);

impl CurrencyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly useful in tests and fixtures.
    pub fn with_amount<S: Into<String>, N: Into<Number>>(mut self, currency: S, amount: N) -> Self {
        self.0.insert(currency.into(), amount.into());
        self
    }

    pub fn get(&self, currency: &str) -> Option<&Number> {
        self.0.get(currency)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}
