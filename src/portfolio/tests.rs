//! Tests for portfolio state

use super::*;
use crate::pricing::NoPriceResolver;
use crate::search::{KellyRatioSearch, SearchConfig};
use crate::testing::SyntheticTable;
use chrono::{Duration, TimeZone};

fn fitted(root: &Path, name: &str, seed: u64) -> Strategy {
    let mut strategy = Strategy::create(root, name, 1).unwrap();
    strategy.set_table(SyntheticTable::new(seed).with_league(name).generate());
    let search = KellyRatioSearch::new(SearchConfig {
        trials: 10,
        ..Default::default()
    });
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    strategy.fit(now, &search, &NoPriceResolver).unwrap();
    strategy
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_create_requires_strategies() {
    let dir = tempfile::tempdir().unwrap();
    let err = Portfolio::create(dir.path(), "main", &[]).unwrap_err();
    assert!(matches!(err, Error::EmptyPortfolio { .. }));
}

#[test]
fn test_new_members_equally_weighted() {
    let dir = tempfile::tempdir().unwrap();
    let portfolio = Portfolio::create(dir.path(), "main", &names(&["nba", "nhl", "mlb", "nba"])).unwrap();
    assert_eq!(portfolio.weights().len(), 3);
    assert!(portfolio.weights().values().all(|w| (*w - 1.0 / 3.0).abs() < 1e-12));
    assert_eq!(portfolio.strategies().collect::<Vec<_>>(), vec!["mlb", "nba", "nhl"]);
}

#[test]
fn test_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let portfolio = Portfolio::create(dir.path(), "main", &names(&["nba", "nhl"])).unwrap();
    portfolio.save().unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("main").join("portfolio.json")).unwrap())
            .unwrap();
    assert_eq!(raw["strategies"]["nba"], 0.5);

    let loaded = Portfolio::load(dir.path(), "main").unwrap();
    assert_eq!(loaded.weights(), portfolio.weights());
}

#[test]
fn test_fit_requires_fitted_members() {
    let dir = tempfile::tempdir().unwrap();
    let nba = fitted(dir.path(), "nba", 1);
    let nhl = Strategy::create(dir.path(), "nhl", 1).unwrap();

    let mut portfolio = Portfolio::create(dir.path(), "main", &names(&["nba", "nhl"])).unwrap();
    let err = portfolio.fit(&[nba.clone()], &WalkforwardConfig::default()).unwrap_err();
    assert!(matches!(err, Error::NotFitted { ref strategy } if strategy == "nhl"));

    let err = portfolio.fit(&[nba.clone(), nhl.clone()], &WalkforwardConfig::default()).unwrap_err();
    assert!(matches!(err, Error::NotFitted { ref strategy } if strategy == "nhl"));

    let err = portfolio
        .next_bets(&[nba, nhl], &NextBetSelector::default(), Utc::now())
        .unwrap_err();
    assert!(matches!(err, Error::NotFitted { ref strategy } if strategy == "nhl"));
}

#[test]
fn test_fit_updates_weights() {
    let dir = tempfile::tempdir().unwrap();
    let strategies = vec![fitted(dir.path(), "nba", 1), fitted(dir.path(), "nhl", 2)];
    let mut portfolio = Portfolio::create(dir.path(), "main", &names(&["nba", "nhl"])).unwrap();

    let result = portfolio.fit(&strategies, &WalkforwardConfig::default()).unwrap();
    let total: f64 = portfolio.weights().values().sum();
    assert!((total - 1.0).abs() < 1e-9);
    assert!(portfolio.weights().values().all(|w| *w >= 0.0));
    assert_eq!(result.names, names(&["nba", "nhl"]));
    assert_eq!(portfolio.returns().unwrap().name(), "main");

    portfolio.save().unwrap();
    let loaded = Portfolio::load(dir.path(), "main").unwrap();
    assert_eq!(loaded.weights(), portfolio.weights());
}

#[test]
fn test_next_bets_per_member() {
    let dir = tempfile::tempdir().unwrap();
    let strategies = vec![fitted(dir.path(), "nba", 1), fitted(dir.path(), "nhl", 2)];
    let mut portfolio = Portfolio::create(dir.path(), "main", &names(&["nba", "nhl"])).unwrap();
    portfolio.fit(&strategies, &WalkforwardConfig::default()).unwrap();

    // synthetic upcoming events start on March 1 at noon
    let now = Utc.with_ymd_and_hms(2024, 2, 29, 23, 0, 0).unwrap();
    let bets = portfolio
        .next_bets(&strategies, &NextBetSelector::new(Duration::hours(24)), now)
        .unwrap();

    assert_eq!(bets.len(), 6);
    for bet in &bets.bets {
        assert_eq!(bet.weight, portfolio.weight(&bet.strategy).unwrap());
        assert_eq!(bet.league, bet.strategy);
        assert_eq!(bet.participants.len(), 2);
    }
    assert!(bets.bets.windows(2).all(|w| w[0].datetime <= w[1].datetime));
}
