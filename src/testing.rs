//! Synthetic event tables for tests and dry runs
//!
//! Generates two-participant events whose realized results follow a hidden
//! "true" probability. The model probability is the true one plus noise and
//! the offered price carries a bookmaker margin around a noisier estimate,
//! so some outcomes show an edge and most do not. Same seed, same table.

use crate::types::{Event, EventTable, Participant};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Generator settings
#[derive(Debug, Clone)]
pub struct SyntheticTable {
    pub seed: u64,
    pub league: String,
    pub start: DateTime<Utc>,
    /// Days with settled events
    pub days: u32,
    /// Days after the settled ones with unplayed events
    pub upcoming_days: u32,
    pub events_per_day: u32,
    /// Noise on the model probability
    pub model_noise: f64,
    /// Bookmaker margin baked into prices
    pub margin: f64,
}

impl Default for SyntheticTable {
    fn default() -> Self {
        Self {
            seed: 7,
            league: "synthetic".to_string(),
            start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default(),
            days: 60,
            upcoming_days: 2,
            events_per_day: 3,
            model_noise: 0.05,
            margin: 0.04,
        }
    }
}

impl SyntheticTable {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            ..Default::default()
        }
    }

    pub fn with_league(mut self, league: impl Into<String>) -> Self {
        self.league = league.into();
        self
    }

    pub fn with_days(mut self, days: u32, upcoming_days: u32) -> Self {
        self.days = days;
        self.upcoming_days = upcoming_days;
        self
    }

    pub fn generate(&self) -> EventTable {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut events = Vec::new();

        for day in 0..self.days + self.upcoming_days {
            let settled = day < self.days;
            for slot in 0..self.events_per_day {
                let datetime = self.start + Duration::days(day as i64) + Duration::hours(12 + slot as i64);
                let id = format!("{}-{}-{}", self.league, day, slot);
                events.push(self.event(&mut rng, id, datetime, settled));
            }
        }

        EventTable::new(events)
    }

    fn event(&self, rng: &mut StdRng, id: String, datetime: DateTime<Utc>, settled: bool) -> Event {
        let true_home: f64 = rng.random_range(0.25..0.75);
        let model_home = (true_home + rng.random_range(-self.model_noise..=self.model_noise)).clamp(0.01, 0.99);
        let market_home = (true_home + rng.random_range(-0.08..0.08)).clamp(0.05, 0.95);
        let home_won = rng.random::<f64>() < true_home;

        let price = |p: f64| 1.0 / (p * (1.0 + self.margin));
        let points = |won: bool| if won { Some(1.0) } else { Some(0.0) };

        Event {
            id,
            league: self.league.clone(),
            datetime,
            participants: vec![
                Participant {
                    name: "home".to_string(),
                    points: if settled { points(home_won) } else { None },
                    price: Some(price(market_home)),
                    probability: Some(model_home),
                },
                Participant {
                    name: "away".to_string(),
                    points: if settled { points(!home_won) } else { None },
                    price: Some(price(1.0 - market_home)),
                    probability: Some(1.0 - model_home),
                },
            ],
        }
    }
}
