//! Tests for strategy state

use super::*;
use crate::pricing::{NoPriceResolver, PriceOverrides};
use crate::search::SearchConfig;
use crate::testing::SyntheticTable;
use chrono::TimeZone;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap()
}

fn search() -> KellyRatioSearch {
    KellyRatioSearch::new(SearchConfig {
        trials: 10,
        ..Default::default()
    })
}

fn fitted(root: &Path) -> Strategy {
    let mut strategy = Strategy::create(root, "nba", 1).unwrap();
    strategy.set_table(SyntheticTable::new(21).generate());
    strategy.fit(now(), &search(), &NoPriceResolver).unwrap();
    strategy
}

#[test]
fn test_create_rejects_zero_place() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(Strategy::create(dir.path(), "nba", 0), Err(Error::InvalidPlace)));
}

#[test]
fn test_fit_without_table() {
    let dir = tempfile::tempdir().unwrap();
    let mut strategy = Strategy::create(dir.path(), "nba", 1).unwrap();
    let err = strategy.fit(now(), &search(), &NoPriceResolver).unwrap_err();
    assert!(matches!(err, Error::MissingTable { .. }));
}

#[test]
fn test_unfitted_accessors() {
    let dir = tempfile::tempdir().unwrap();
    let strategy = Strategy::create(dir.path(), "nba", 1).unwrap();
    assert!(matches!(strategy.returns(), Err(Error::NotFitted { .. })));
    assert!(matches!(strategy.kelly_ratio(), Err(Error::NotFitted { .. })));
    assert!(!strategy.is_fitted());
}

#[test]
fn test_fit_sets_ratio_and_returns() {
    let dir = tempfile::tempdir().unwrap();
    let strategy = fitted(dir.path());
    let k = strategy.kelly_ratio().unwrap();
    assert!(k > 0.0 && k <= 1.0);
    assert!(!strategy.returns().unwrap().is_empty());
    assert_eq!(strategy.kelly().unwrap().study.trials.len(), 10);
}

#[test]
fn test_fit_does_not_write() {
    let dir = tempfile::tempdir().unwrap();
    let strategy = fitted(dir.path());
    assert!(!strategy.dir().exists());
}

#[test]
fn test_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let mut strategy = fitted(dir.path());
    strategy.save().unwrap();

    for file in ["strategy.json", "table.json", "features.json", "kelly.json", "returns.json"] {
        assert!(strategy.dir().join(file).exists(), "{} missing", file);
    }

    let loaded = Strategy::load(dir.path(), "nba").unwrap();
    assert_eq!(loaded.place(), 1);
    assert_eq!(loaded.kelly_ratio().unwrap(), strategy.kelly_ratio().unwrap());
    assert_eq!(loaded.returns().unwrap(), strategy.returns().unwrap());
    assert_eq!(loaded.table().unwrap(), strategy.table().unwrap());
}

#[test]
fn test_refit_after_load_uses_caches() {
    let dir = tempfile::tempdir().unwrap();
    let mut strategy = fitted(dir.path());
    strategy.save().unwrap();

    let mut loaded = Strategy::load(dir.path(), "nba").unwrap();
    let outcome = loaded.fit(now(), &search(), &NoPriceResolver).unwrap();
    assert!(outcome.feature_cache_hit);
    assert_eq!(outcome.trials_evaluated, 0);
    assert_eq!(outcome.trials_reused, 10);
    assert_eq!(outcome.kelly_ratio, strategy.kelly_ratio().unwrap());
}

#[test]
fn test_price_overrides_rebuild_features() {
    let dir = tempfile::tempdir().unwrap();
    let mut table = SyntheticTable::new(21).generate();
    let mut overrides = PriceOverrides::new();
    for event in &mut table.events {
        event.participants[1].price = None;
        overrides.insert(event.id.clone(), "away", 2.0);
    }
    let on_away = |s: &Strategy| s.features().unwrap().bets.iter().filter(|b| b.participant == "away").count();

    let mut strategy = Strategy::create(dir.path(), "nba", 1).unwrap();
    strategy.set_table(table);
    strategy.fit(now(), &search(), &NoPriceResolver).unwrap();
    assert_eq!(on_away(&strategy), 0);
    strategy.save().unwrap();

    let mut loaded = Strategy::load(dir.path(), "nba").unwrap();
    let outcome = loaded.fit(now(), &search(), &overrides).unwrap();
    assert!(!outcome.feature_cache_hit);
    assert_eq!(outcome.trials_evaluated, 10);
    assert!(on_away(&loaded) > 0);
    loaded.save().unwrap();

    let mut reloaded = Strategy::load(dir.path(), "nba").unwrap();
    let outcome = reloaded.fit(now(), &search(), &overrides).unwrap();
    assert!(outcome.feature_cache_hit);
    assert_eq!(outcome.trials_evaluated, 0);
    assert!(on_away(&reloaded) > 0);
}

#[test]
fn test_corrupt_feature_cache_is_recomputed() {
    let dir = tempfile::tempdir().unwrap();
    let mut strategy = fitted(dir.path());
    strategy.save().unwrap();
    std::fs::write(strategy.dir().join("features.json"), "garbage").unwrap();

    let mut loaded = Strategy::load(dir.path(), "nba").unwrap();
    let outcome = loaded.fit(now(), &search(), &NoPriceResolver).unwrap();
    assert!(!outcome.feature_cache_hit);

    loaded.save().unwrap();
    let mut reloaded = Strategy::load(dir.path(), "nba").unwrap();
    assert!(reloaded.compute_features(&NoPriceResolver).unwrap());
}

#[test]
fn test_set_table_invalidates() {
    let dir = tempfile::tempdir().unwrap();
    let mut strategy = fitted(dir.path());
    assert!(strategy.features().is_some());

    strategy.set_table(SyntheticTable::new(22).generate());
    assert!(strategy.features().is_none());
    assert!(matches!(strategy.returns(), Err(Error::NotFitted { .. })));

    let outcome = strategy.fit(now(), &search(), &NoPriceResolver).unwrap();
    assert!(!outcome.feature_cache_hit);
    // the study was built from the old table
    assert_eq!(outcome.trials_evaluated, 10);
}

#[test]
fn test_set_place_invalidates() {
    let dir = tempfile::tempdir().unwrap();
    let mut strategy = fitted(dir.path());
    assert!(matches!(strategy.set_place(0), Err(Error::InvalidPlace)));
    strategy.set_place(1).unwrap();
    assert!(strategy.returns().is_ok());
    strategy.set_place(2).unwrap();
    assert!(strategy.returns().is_err());
}

#[test]
fn test_place_above_participants_fails_fit() {
    let dir = tempfile::tempdir().unwrap();
    let mut strategy = Strategy::create(dir.path(), "nba", 3).unwrap();
    strategy.set_table(SyntheticTable::new(1).generate());
    let err = strategy.fit(now(), &search(), &NoPriceResolver).unwrap_err();
    assert!(matches!(err, Error::PlaceExceedsParticipants { place: 3, .. }));
}

#[test]
fn test_load_unknown_strategy() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(Strategy::load(dir.path(), "ghost"), Err(Error::Io(_))));
}
