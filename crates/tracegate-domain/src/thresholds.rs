//! Threshold engine: adaptive bounds derived from the baseline sample.
//!
//! Fixed floors protect fast operations where relative thresholds collapse
//! into the noise; relative floors keep slow operations from being gated too
//! strictly. max() makes the stricter regime active. No CV multiplier is
//! applied here: variance is handled upstream by the quality gate.

use tracegate_types::{GateConfig, ThresholdSet};

pub fn compute_thresholds(
    baseline_median: f64,
    baseline_tail: f64,
    cfg: &GateConfig,
) -> ThresholdSet {
    ThresholdSet {
        median_threshold_ms: cfg.ms_floor.max(cfg.pct_floor * baseline_median),
        tail_threshold_ms: cfg.tail_ms_floor.max(cfg.tail_pct_floor * baseline_tail),
        practical_threshold_ms: (baseline_median * cfg.practical_pct)
            .clamp(cfg.practical_min_ms, cfg.practical_max_ms),
        tail_practical_threshold_ms: (baseline_tail * cfg.practical_pct)
            .clamp(cfg.practical_min_ms, cfg.practical_max_ms),
    }
}
