//! Tests for next-bet selection

use super::*;
use crate::types::Participant;
use chrono::TimeZone;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn event(id: &str, offset: Duration, probs: &[Option<f64>]) -> Event {
    Event {
        id: id.to_string(),
        league: "nfl".to_string(),
        datetime: now() + offset,
        participants: probs
            .iter()
            .enumerate()
            .map(|(i, p)| Participant {
                name: format!("{}-p{}", id, i),
                points: None,
                price: Some(2.0),
                probability: *p,
            })
            .collect(),
    }
}

fn source<'a>(strategy: &'a str, table: &'a EventTable, weight: Option<f64>) -> BetSource<'a> {
    BetSource {
        strategy,
        table,
        kelly: 0.4,
        weight,
    }
}

#[test]
fn test_horizon_bounds() {
    let selector = NextBetSelector::default();
    let probs = [Some(0.6), Some(0.4)];
    assert!(!selector.in_horizon(&event("a", Duration::zero(), &probs), now()));
    assert!(selector.in_horizon(&event("b", Duration::seconds(1), &probs), now()));
    assert!(selector.in_horizon(&event("c", Duration::hours(24), &probs), now()));
    assert!(!selector.in_horizon(&event("d", Duration::hours(24) + Duration::seconds(1), &probs), now()));
    assert!(!selector.in_horizon(&event("e", Duration::hours(-3), &probs), now()));
}

#[test]
fn test_select_only_horizon_events() {
    let table = EventTable::new(vec![
        event("past", Duration::hours(-1), &[Some(0.5), Some(0.5)]),
        event("soon", Duration::hours(2), &[Some(0.7), Some(0.3)]),
        event("later", Duration::hours(30), &[Some(0.7), Some(0.3)]),
    ]);
    let bets = NextBetSelector::default().select(&[source("s", &table, Some(0.5))], now());
    assert_eq!(bets.len(), 1);
    let bet = &bets.bets[0];
    assert_eq!(bet.strategy, "s");
    assert_eq!(bet.league, "nfl");
    assert_eq!(bet.kelly, 0.4);
    assert_eq!(bet.weight, 0.5);
    assert_eq!(bet.datetime, now() + Duration::hours(2));
    assert_eq!(bet.participants[0], BetParticipant { name: "soon-p0".to_string(), probability: 0.7 });
}

#[test]
fn test_missing_probabilities_omitted() {
    let table = EventTable::new(vec![
        event("none", Duration::hours(1), &[None, Some(f64::NAN)]),
        event("partial", Duration::hours(1), &[Some(0.55), None, Some(0.2)]),
    ]);
    let bets = NextBetSelector::default().select(&[source("s", &table, Some(1.0))], now());
    assert_eq!(bets.len(), 1);
    let names: Vec<&str> = bets.bets[0].participants.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["partial-p0", "partial-p2"]);
}

#[test]
fn test_one_record_per_strategy_and_ordering() {
    let first = EventTable::new(vec![
        event("z", Duration::hours(5), &[Some(0.5), Some(0.5)]),
        event("a", Duration::hours(5), &[Some(0.5), Some(0.5)]),
    ]);
    let second = EventTable::new(vec![event("m", Duration::hours(1), &[Some(0.5), Some(0.5)])]);
    let shared = EventTable::new(vec![event("a", Duration::hours(5), &[Some(0.5), Some(0.5)])]);

    let bets = NextBetSelector::default().select(
        &[
            source("zeta", &first, Some(0.2)),
            source("beta", &second, Some(0.3)),
            source("alpha", &shared, Some(0.5)),
        ],
        now(),
    );
    let order: Vec<(&str, &str)> = bets
        .bets
        .iter()
        .map(|b| (b.strategy.as_str(), b.participants[0].name.as_str()))
        .collect();
    assert_eq!(
        order,
        vec![("beta", "m-p0"), ("alpha", "a-p0"), ("zeta", "a-p0"), ("zeta", "z-p0")]
    );
}

#[test]
fn test_missing_weight_is_zero() {
    let table = EventTable::new(vec![event("g", Duration::hours(3), &[Some(0.6), Some(0.4)])]);
    let bets = NextBetSelector::default().select(&[source("s", &table, None)], now());
    assert_eq!(bets.bets[0].weight, 0.0);
}

#[test]
fn test_custom_lookahead() {
    let table = EventTable::new(vec![event("g", Duration::hours(40), &[Some(0.6), Some(0.4)])]);
    assert!(NextBetSelector::default().select(&[source("s", &table, Some(1.0))], now()).is_empty());
    let wide = NextBetSelector::new(Duration::hours(48));
    assert_eq!(wide.select(&[source("s", &table, Some(1.0))], now()).len(), 1);
}

#[test]
fn test_output_json_shape() {
    let table = EventTable::new(vec![event("g", Duration::hours(3), &[Some(0.6), Some(0.4)])]);
    let bets = NextBetSelector::default().select(&[source("s", &table, Some(0.25))], now());
    let json: serde_json::Value = serde_json::to_value(&bets).unwrap();
    let record = &json["bets"][0];
    assert_eq!(record["strategy"], "s");
    assert_eq!(record["weight"], 0.25);
    assert_eq!(record["participants"][1]["probability"], 0.4);
    assert!(record.get("event_id").is_none());
    assert!(record["datetime"].is_string());
}

#[test]
fn test_save_writes_printed_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("next.json");
    let table = EventTable::new(vec![event("g", Duration::hours(3), &[Some(0.6), Some(0.4)])]);
    let bets = NextBetSelector::default().select(&[source("s", &table, Some(0.25))], now());

    bets.save(&path).unwrap();
    let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written, serde_json::to_value(&bets).unwrap());
}
