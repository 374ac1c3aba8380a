//! Solver behaviour through the public fit surface: trends, structural
//! bounds, backend agreement and time limits

use woebin::{
    BinningConfig, FitStatus, MipSolverKind, MonotonicTrend, OptimalBinning, SolverKind,
};

#[path = "common/mod.rs"]
mod common;

fn fit_with(config: BinningConfig, x: &[f64], y: &[u8]) -> OptimalBinning {
    let mut binning = OptimalBinning::new(config).unwrap();
    binning.fit(x, y).unwrap();
    binning
}

#[test]
fn test_auto_trend_follows_the_data() {
    let (x, y) = common::scorecard_samples(2000, 3);
    let binning = fit_with(BinningConfig::default(), &x, &y);
    assert_eq!(binning.status(), Some(FitStatus::Optimal));

    let rates = binning.binning_table().unwrap().event_rates();
    assert!(rates.len() >= 2);
    assert!(
        rates.windows(2).all(|w| w[1] <= w[0] + 1e-12),
        "auto trend on falling risk must produce descending rates: {rates:?}"
    );
}

#[test]
fn test_opposing_trend_collapses_to_one_bin() {
    // Event rates rise with x, so a descending constraint leaves no
    // multi-bin partition.
    let (x, y) = common::plateau_samples();
    let config = BinningConfig {
        monotonic_trend: MonotonicTrend::Descending,
        ..BinningConfig::default()
    };
    let binning = fit_with(config, &x, &y);
    assert_eq!(binning.status(), Some(FitStatus::Optimal));
    assert_eq!(binning.binning_table().unwrap().n_bins(), 1);
}

#[test]
fn test_free_trend_keeps_finest_partition() {
    let (x, y) = common::plateau_samples();
    let config = BinningConfig {
        monotonic_trend: MonotonicTrend::None,
        ..BinningConfig::default()
    };
    let binning = fit_with(config, &x, &y);
    assert_eq!(binning.splits().unwrap(), &[10.0, 20.0, 30.0]);
}

#[test]
fn test_peak_trend_allows_a_single_change_point() {
    let (x, y) = common::peaked_samples();
    let config = BinningConfig {
        monotonic_trend: MonotonicTrend::Peak,
        ..BinningConfig::default()
    };
    let binning = fit_with(config, &x, &y);
    let rates = binning.binning_table().unwrap().event_rates();
    assert_eq!(rates.len(), 3);
    assert!(rates[0] < rates[1] && rates[1] > rates[2]);
}

#[test]
fn test_valley_trend_mirrors_peak() {
    let mut x = Vec::new();
    let mut y = Vec::new();
    for (value, events_per_ten) in [(5.0, 6), (15.0, 2), (25.0, 5)] {
        for i in 0..50 {
            x.push(value);
            y.push(u8::from(i % 10 < events_per_ten));
        }
    }
    let config = BinningConfig {
        monotonic_trend: MonotonicTrend::Valley,
        ..BinningConfig::default()
    };
    let binning = fit_with(config, &x, &y);
    let rates = binning.binning_table().unwrap().event_rates();
    assert_eq!(rates.len(), 3);
    assert!(rates[0] > rates[1] && rates[1] < rates[2]);
}

#[test]
fn test_convex_trend_merges_a_peak() {
    let (x, y) = common::peaked_samples();
    // The 0.2/0.6/0.3 rates break convexity as three bins.
    let config = BinningConfig {
        monotonic_trend: MonotonicTrend::Convex,
        ..BinningConfig::default()
    };
    let binning = fit_with(config, &x, &y);
    assert_eq!(binning.status(), Some(FitStatus::Optimal));
    assert_eq!(binning.binning_table().unwrap().n_bins(), 2);

    let config = BinningConfig {
        monotonic_trend: MonotonicTrend::Convex,
        solver: SolverKind::Mip,
        ..BinningConfig::default()
    };
    let via_mip = fit_with(config, &x, &y);
    assert_eq!(via_mip.binning_table().unwrap().n_bins(), 2);
}

#[test]
fn test_min_event_rate_diff_enforces_gaps() {
    let (x, y) = common::plateau_samples();
    let config = BinningConfig {
        min_event_rate_diff: 0.25,
        ..BinningConfig::default()
    };
    let binning = fit_with(config, &x, &y);
    let rates = binning.binning_table().unwrap().event_rates();
    assert_eq!(rates.len(), 3);
    assert!(rates
        .windows(2)
        .all(|w| (w[1] - w[0]).abs() >= 0.25 - 1e-9));
}

#[test]
fn test_min_bin_size_forces_merges() {
    let (x, y) = common::plateau_samples();
    let config = BinningConfig {
        min_bin_size: Some(0.3),
        ..BinningConfig::default()
    };
    let binning = fit_with(config, &x, &y);
    let table = binning.binning_table().unwrap();
    assert_eq!(table.n_bins(), 2);
    assert!(table.bins.iter().all(|b| b.count >= 60.0 - 1e-9));
    assert_eq!(binning.splits().unwrap(), &[20.0]);
}

#[test]
fn test_max_n_bins_picks_the_best_coarse_partition() {
    let (x, y) = common::plateau_samples();
    let config = BinningConfig {
        max_n_bins: Some(2),
        ..BinningConfig::default()
    };
    let binning = fit_with(config, &x, &y);
    assert_eq!(binning.status(), Some(FitStatus::Optimal));
    assert_eq!(binning.splits().unwrap(), &[20.0]);
}

#[test]
fn test_min_n_bins_floor_holds_on_both_backends() {
    let mut x = Vec::new();
    let mut y = Vec::new();
    // Two adjacent plateaus with nearly equal rates; the floor must still
    // be met without tipping the fit into infeasibility.
    for (value, events) in [(5.0, 15), (15.0, 17), (25.0, 35)] {
        for i in 0..50 {
            x.push(value);
            y.push(u8::from(i < events));
        }
    }
    let config = BinningConfig {
        min_n_bins: Some(3),
        ..BinningConfig::default()
    };
    let binning = fit_with(config, &x, &y);
    assert_eq!(binning.status(), Some(FitStatus::Optimal));
    assert_eq!(binning.binning_table().unwrap().n_bins(), 3);

    let config = BinningConfig {
        min_n_bins: Some(3),
        solver: SolverKind::Mip,
        ..BinningConfig::default()
    };
    let via_mip = fit_with(config, &x, &y);
    assert_eq!(via_mip.status(), Some(FitStatus::Optimal));
    assert_eq!(via_mip.binning_table().unwrap().n_bins(), 3);
}

#[test]
fn test_cp_and_mip_agree_on_real_data() {
    let (x, y) = common::scorecard_samples(1500, 11);
    let cp = fit_with(BinningConfig::default(), &x, &y);
    let config = BinningConfig {
        solver: SolverKind::Mip,
        ..BinningConfig::default()
    };
    let mip = fit_with(config, &x, &y);

    assert_eq!(cp.status(), Some(FitStatus::Optimal));
    assert_eq!(mip.status(), Some(FitStatus::Optimal));
    let cp_iv = cp.binning_table().unwrap().iv;
    let mip_iv = mip.binning_table().unwrap().iv;
    assert!(
        (cp_iv - mip_iv).abs() < 1e-6,
        "backends disagree: cp {cp_iv} vs mip {mip_iv}"
    );
    assert_eq!(cp.splits().unwrap(), mip.splits().unwrap());
}

#[test]
fn test_microlp_backend_solves_small_models() {
    let (x, y) = common::plateau_samples();
    let config = BinningConfig {
        solver: SolverKind::Mip,
        mip_solver: MipSolverKind::Microlp,
        ..BinningConfig::default()
    };
    let binning = fit_with(config, &x, &y);
    assert_eq!(binning.status(), Some(FitStatus::Optimal));
    assert_eq!(binning.splits().unwrap(), &[10.0, 20.0, 30.0]);
}

#[test]
fn test_mip_time_limit_reports_status_with_fallback() {
    let (x, y) = common::scorecard_samples(1500, 5);
    let config = BinningConfig {
        solver: SolverKind::Mip,
        time_limit: 1e-9,
        ..BinningConfig::default()
    };
    let binning = fit_with(config, &x, &y);
    assert_eq!(binning.status(), Some(FitStatus::TimeLimit));
    assert_eq!(binning.binning_table().unwrap().n_bins(), 1);
}

#[test]
fn test_zero_time_limit_disables_the_deadline() {
    let (x, y) = common::scorecard_samples(1500, 5);
    let config = BinningConfig {
        time_limit: 0.0,
        ..BinningConfig::default()
    };
    let binning = fit_with(config, &x, &y);
    assert_eq!(binning.status(), Some(FitStatus::Optimal));
}

#[test]
fn test_cp_is_deterministic() {
    let (x, y) = common::scorecard_samples(3000, 42);
    let first = fit_with(BinningConfig::default(), &x, &y);
    let second = fit_with(BinningConfig::default(), &x, &y);
    assert_eq!(first.splits().unwrap(), second.splits().unwrap());
    assert_eq!(
        first.binning_table().unwrap().iv,
        second.binning_table().unwrap().iv
    );
}
