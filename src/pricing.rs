//! Missing-price resolution
//!
//! Production feeds routinely lack a price for some outcomes. Rather than
//! stopping to ask an operator, the engine consults a resolver handed in by
//! the caller; an unresolved price makes the outcome a data-quality skip.

use crate::error::Result;
use crate::types::{Event, Participant};
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

/// Supplies a decimal price when the table has none
#[cfg_attr(test, automock)]
pub trait MissingPriceResolver: Send + Sync {
    fn resolve(&self, event: &Event, participant: &Participant) -> Option<f64>;

    /// Digest of what the resolver can supply; `None` when it supplies nothing.
    ///
    /// Part of the processed-table key, so cached features are rebuilt when
    /// the resolver changes.
    fn fingerprint(&self) -> Option<String> {
        None
    }
}

/// Never resolves anything; missing prices stay missing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPriceResolver;

impl MissingPriceResolver for NoPriceResolver {
    fn resolve(&self, _event: &Event, _participant: &Participant) -> Option<f64> {
        None
    }
}

/// Operator-supplied prices keyed by event id, then participant name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceOverrides {
    #[serde(flatten)]
    prices: BTreeMap<String, BTreeMap<String, f64>>,
}

impl PriceOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, event_id: impl Into<String>, participant: impl Into<String>, price: f64) {
        self.prices
            .entry(event_id.into())
            .or_default()
            .insert(participant.into(), price);
    }

    pub fn len(&self) -> usize {
        self.prices.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read `{"<event id>": {"<participant>": price}}` from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

impl MissingPriceResolver for PriceOverrides {
    fn resolve(&self, event: &Event, participant: &Participant) -> Option<f64> {
        self.prices
            .get(&event.id)
            .and_then(|by_name| by_name.get(&participant.name))
            .copied()
    }

    fn fingerprint(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        // ordered maps give a stable encoding
        let encoded = serde_json::to_vec(&self.prices).ok()?;
        Some(hex::encode(Sha256::digest(&encoded)))
    }
}

/// Price of `participant`, falling back to the resolver
pub fn price_for(resolver: &dyn MissingPriceResolver, event: &Event, participant: &Participant) -> Option<f64> {
    participant
        .known_price()
        .or_else(|| resolver.resolve(event, participant).filter(|o| o.is_finite() && *o > 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn event() -> Event {
        Event {
            id: "g1".to_string(),
            league: "nhl".to_string(),
            datetime: Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap(),
            participants: vec![
                Participant { name: "home".to_string(), points: None, price: Some(1.8), probability: Some(0.6) },
                Participant { name: "away".to_string(), points: None, price: None, probability: Some(0.4) },
            ],
        }
    }

    #[test]
    fn test_no_resolver_keeps_missing() {
        let e = event();
        assert_eq!(price_for(&NoPriceResolver, &e, &e.participants[1]), None);
        assert_eq!(price_for(&NoPriceResolver, &e, &e.participants[0]), Some(1.8));
    }

    #[test]
    fn test_overrides_fill_missing_price() {
        let e = event();
        let mut overrides = PriceOverrides::new();
        overrides.insert("g1", "away", 2.3);
        assert_eq!(overrides.len(), 1);
        assert_eq!(price_for(&overrides, &e, &e.participants[1]), Some(2.3));
    }

    #[test]
    fn test_table_price_wins_over_resolver() {
        let e = event();
        let mut mock = MockMissingPriceResolver::new();
        mock.expect_resolve().never();
        assert_eq!(price_for(&mock, &e, &e.participants[0]), Some(1.8));
    }

    #[test]
    fn test_unusable_resolved_price_is_ignored() {
        let e = event();
        let mut mock = MockMissingPriceResolver::new();
        mock.expect_resolve().times(1).returning(|_, _| Some(0.9));
        assert_eq!(price_for(&mock, &e, &e.participants[1]), None);
    }

    #[test]
    fn test_fingerprint_follows_contents() {
        assert_eq!(NoPriceResolver.fingerprint(), None);
        assert_eq!(PriceOverrides::new().fingerprint(), None);

        let mut a = PriceOverrides::new();
        a.insert("g1", "away", 2.3);
        a.insert("g2", "home", 1.7);
        let mut b = PriceOverrides::new();
        b.insert("g2", "home", 1.7);
        b.insert("g1", "away", 2.3);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().unwrap().len(), 64);

        b.insert("g1", "away", 2.4);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_load_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.json");
        std::fs::write(&path, r#"{"g1": {"away": 2.05}, "g2": {"x": 3.0, "y": 1.4}}"#).unwrap();
        let overrides = PriceOverrides::load(&path).unwrap();
        assert_eq!(overrides.len(), 3);
        let e = event();
        assert_eq!(overrides.resolve(&e, &e.participants[1]), Some(2.05));
    }
}
