//! Shared fixture generators for the integration tests

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Noisy credit-score samples where the event probability falls linearly
/// with the score, from 0.9 at 300 to 0.1 at 850.
#[allow(dead_code)]
pub fn scorecard_samples(n: usize, seed: u64) -> (Vec<f64>, Vec<u8>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut x = Vec::with_capacity(n);
    let mut y = Vec::with_capacity(n);
    for _ in 0..n {
        let score: f64 = rng.gen_range(300.0..850.0);
        let p_event = 0.9 - 0.8 * (score - 300.0) / 550.0;
        x.push(score);
        y.push(u8::from(rng.gen_bool(p_event)));
    }
    (x, y)
}

/// Four repeated values with exact event rates 0.1, 0.3, 0.5 and 0.7.
/// The only admissible split points are 10, 20 and 30, so the optimal
/// partition is fully determined.
#[allow(dead_code)]
pub fn plateau_samples() -> (Vec<f64>, Vec<u8>) {
    let mut x = Vec::new();
    let mut y = Vec::new();
    for (value, events_per_ten) in [(5.0, 1), (15.0, 3), (25.0, 5), (35.0, 7)] {
        for i in 0..50 {
            x.push(value);
            y.push(u8::from(i % 10 < events_per_ten));
        }
    }
    (x, y)
}

/// Three repeated values whose middle rate is the highest: 0.2, 0.6, 0.3.
#[allow(dead_code)]
pub fn peaked_samples() -> (Vec<f64>, Vec<u8>) {
    let mut x = Vec::new();
    let mut y = Vec::new();
    for (value, events_per_ten) in [(5.0, 2), (15.0, 6), (25.0, 3)] {
        for i in 0..50 {
            x.push(value);
            y.push(u8::from(i % 10 < events_per_ten));
        }
    }
    (x, y)
}

/// Housing-status levels with well-separated event rates:
/// own 0.05, mortgage 0.20, rent 0.40, free 0.55.
#[allow(dead_code)]
pub fn housing_samples() -> (Vec<Option<&'static str>>, Vec<u8>) {
    let mut x = Vec::new();
    let mut y = Vec::new();
    for (level, events) in [("rent", 40), ("own", 5), ("free", 55), ("mortgage", 20)] {
        for i in 0..100 {
            x.push(Some(level));
            y.push(u8::from(i < events));
        }
    }
    (x, y)
}
