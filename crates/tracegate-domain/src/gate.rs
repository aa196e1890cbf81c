//! Detector cascade and verdict reducer.
//!
//! One gate invocation: quality screen, then (if admitted) median, tail,
//! directionality and Mann-Whitney detectors plus the bootstrap CI, reduced
//! under the practical-significance override into a single `GateResult`.
//! In release mode the cascade is replaced by an equivalence (TOST) check on
//! the bootstrap CI.
//!
//! Detector order is fixed and observable through `details`. Improvements
//! never fail: every detector fires only on a positive delta or on "target
//! stochastically greater".

use crate::{
    assess_sample, compute_thresholds, median, median_diff_ci, rank_sum_u, screen_quality, tail_k,
    tail_stat, DomainError,
};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use tracegate_types::{
    DetectorOutcome, GateConfig, GateDetails, GateMode, GateResult, GateStatus, QualityIssue,
    QualityReport, REASON_PRACTICAL_OVERRIDE,
};

/// Run the full gate over an independent (baseline, target) pair.
///
/// Errors are reserved for unexpected numeric failures; data-quality
/// problems come back as an INCONCLUSIVE result, never as an error.
pub fn gate(baseline: &[f64], target: &[f64], cfg: &GateConfig) -> Result<GateResult, DomainError> {
    let quality_baseline = assess_sample(baseline, cfg)?;
    let quality_target = assess_sample(target, cfg)?;

    if let Some((issue, why)) = screen_quality(&quality_baseline, &quality_target, cfg) {
        let reason = format!("{}: {}", issue_token(issue), why);
        let details = empty_details(quality_baseline, quality_target, cfg);
        return Ok(GateResult {
            status: GateStatus::Inconclusive,
            reason,
            inconclusive: true,
            details,
        });
    }

    // Admitted: both sides have at least min_n finite, non-negative samples.
    let baseline_median = median(baseline)?;
    let target_median = median(target)?;
    let median_delta = target_median - baseline_median;

    // The smaller side fixes k so both tails trim the same rank depth.
    let k = tail_k(
        baseline.len().min(target.len()),
        cfg.tail_k_pct,
        cfg.tail_k_min,
        cfg.tail_k_max,
    );
    let baseline_tail = tail_stat(baseline, k)?;
    let target_tail = tail_stat(target, k)?;
    let tail_delta = target_tail - baseline_tail;

    let thresholds = compute_thresholds(baseline_median, baseline_tail, cfg);

    // Informational only; never gates.
    let dir_frac =
        target.iter().filter(|&&v| v > baseline_median).count() as f64 / target.len() as f64;

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(cfg.seed);
    let ci = median_diff_ci(
        baseline,
        target,
        cfg.bootstrap_b,
        cfg.bootstrap_confidence,
        &mut rng,
    )?;

    let mw = if cfg.use_mann_whitney {
        Some(rank_sum_u(baseline, target)?)
    } else {
        None
    };

    let mut details = empty_details(quality_baseline, quality_target, cfg);
    details.baseline_median_ms = Some(baseline_median);
    details.target_median_ms = Some(target_median);
    details.median_delta_ms = Some(median_delta);
    details.median_threshold_ms = Some(thresholds.median_threshold_ms);
    details.baseline_tail_ms = Some(baseline_tail);
    details.target_tail_ms = Some(target_tail);
    details.tail_delta_ms = Some(tail_delta);
    details.tail_threshold_ms = Some(thresholds.tail_threshold_ms);
    details.tail_k = Some(k);
    details.directionality_frac = Some(dir_frac);
    details.directionality_threshold = Some(cfg.directionality);
    details.bootstrap_ci_low_ms = Some(ci.low);
    details.bootstrap_ci_high_ms = Some(ci.high);
    details.bootstrap_point_ms = Some(ci.point);
    details.practical_threshold_ms = Some(thresholds.practical_threshold_ms);
    details.tail_practical_threshold_ms = Some(thresholds.tail_practical_threshold_ms);
    if let Some(ref mw) = mw {
        details.mann_whitney_u = Some(mw.u_target);
        details.mann_whitney_p = Some(mw.p_greater);
        details.prob_target_gt_baseline = Some(mw.prob_t_gt_b);
    }

    if cfg.mode == GateMode::Release {
        return Ok(reduce_equivalence(ci.low, ci.high, cfg, details));
    }

    // --- PR-mode cascade ---

    let median_outcome = if median_delta > thresholds.median_threshold_ms {
        DetectorOutcome::Fail {
            reason: format!(
                "median delta {:.2}ms exceeds threshold {:.2}ms",
                median_delta, thresholds.median_threshold_ms
            ),
            magnitude: median_delta,
        }
    } else {
        DetectorOutcome::Pass
    };

    let tail_outcome = if tail_delta > thresholds.tail_threshold_ms {
        DetectorOutcome::Fail {
            reason: format!(
                "tail delta {:.2}ms exceeds threshold {:.2}ms",
                tail_delta, thresholds.tail_threshold_ms
            ),
            magnitude: tail_delta,
        }
    } else {
        DetectorOutcome::Pass
    };

    // Effect-size floor keeps tiny-but-significant stochastic differences
    // from firing. No median-delta clause: tail-only shifts must still fire.
    let mw_outcome = mw.as_ref().map(|mw| {
        if mw.p_greater < cfg.mann_whitney_alpha && mw.prob_t_gt_b >= cfg.effect_floor_prob {
            DetectorOutcome::Fail {
                reason: format!(
                    "Mann-Whitney significant (p={:.4} < {}, P(T>B)={:.3})",
                    mw.p_greater, cfg.mann_whitney_alpha, mw.prob_t_gt_b
                ),
                magnitude: mw.prob_t_gt_b,
            }
        } else {
            DetectorOutcome::Pass
        }
    });

    details.median_detector = Some(median_outcome.clone());
    details.tail_detector = Some(tail_outcome.clone());
    details.mann_whitney_detector = mw_outcome.clone();

    let failures: Vec<String> = [
        Some(&median_outcome),
        Some(&tail_outcome),
        mw_outcome.as_ref(),
    ]
    .into_iter()
    .flatten()
    .filter_map(|outcome| match outcome {
        DetectorOutcome::Fail { reason, .. } => Some(reason.clone()),
        DetectorOutcome::Pass => None,
    })
    .collect();

    let (status, reason) = if !failures.is_empty() {
        let within_practical = median_delta.abs() <= thresholds.practical_threshold_ms
            && tail_delta.abs() <= thresholds.tail_practical_threshold_ms;

        if within_practical {
            details.overrides.push(REASON_PRACTICAL_OVERRIDE.to_string());
            (
                GateStatus::Pass,
                format!(
                    "{}: delta {:.2}ms below practical threshold {:.1}ms; statistical failures: {}",
                    REASON_PRACTICAL_OVERRIDE,
                    median_delta,
                    thresholds.practical_threshold_ms,
                    failures.join("; ")
                ),
            )
        } else {
            let token = if median_outcome.is_fail() {
                "MEDIAN_REGRESSION"
            } else if tail_outcome.is_fail() {
                "TAIL_REGRESSION"
            } else {
                "MW_SIGNIFICANT"
            };
            (GateStatus::Fail, format!("{}: {}", token, failures.join("; ")))
        }
    } else if median_delta.abs() < thresholds.practical_threshold_ms
        && tail_delta.abs() < thresholds.tail_practical_threshold_ms
    {
        (
            GateStatus::NoChange,
            format!(
                "NO_CHANGE: median delta {:.2}ms and tail delta {:.2}ms within practical thresholds ({:.1}ms, {:.1}ms)",
                median_delta,
                tail_delta,
                thresholds.practical_threshold_ms,
                thresholds.tail_practical_threshold_ms
            ),
        )
    } else {
        (
            GateStatus::Pass,
            format!(
                "PASS: median delta {:.2}ms within threshold {:.2}ms",
                median_delta, thresholds.median_threshold_ms
            ),
        )
    };

    Ok(GateResult {
        status,
        reason,
        inconclusive: false,
        details,
    })
}

/// Release-mode reducer: PASS iff the CI sits strictly inside the margin.
fn reduce_equivalence(
    ci_low: f64,
    ci_high: f64,
    cfg: &GateConfig,
    details: GateDetails,
) -> GateResult {
    let margin = cfg.equivalence_margin_ms;
    let equivalent = ci_low > -margin && ci_high < margin;

    let (status, reason) = if equivalent {
        (
            GateStatus::Pass,
            format!(
                "EQUIVALENT: bootstrap CI [{:.2}, {:.2}]ms within ±{:.1}ms margin",
                ci_low, ci_high, margin
            ),
        )
    } else {
        (
            GateStatus::Fail,
            format!(
                "NOT_EQUIVALENT: bootstrap CI [{:.2}, {:.2}]ms extends beyond ±{:.1}ms margin",
                ci_low, ci_high, margin
            ),
        )
    };

    GateResult {
        status,
        reason,
        inconclusive: false,
        details,
    }
}

fn issue_token(issue: QualityIssue) -> &'static str {
    match issue {
        QualityIssue::TooFewSamples => "TOO_FEW_SAMPLES",
        QualityIssue::HighCv => "HIGH_CV",
        QualityIssue::ManyOutliers => "MANY_OUTLIERS",
    }
}

fn empty_details(
    quality_baseline: QualityReport,
    quality_target: QualityReport,
    cfg: &GateConfig,
) -> GateDetails {
    GateDetails {
        n_baseline: quality_baseline.n,
        n_target: quality_target.n,
        baseline_median_ms: None,
        target_median_ms: None,
        median_delta_ms: None,
        median_threshold_ms: None,
        baseline_tail_ms: None,
        target_tail_ms: None,
        tail_delta_ms: None,
        tail_threshold_ms: None,
        tail_k: None,
        directionality_frac: None,
        directionality_threshold: None,
        mann_whitney_u: None,
        mann_whitney_p: None,
        prob_target_gt_baseline: None,
        bootstrap_ci_low_ms: None,
        bootstrap_ci_high_ms: None,
        bootstrap_point_ms: None,
        practical_threshold_ms: None,
        tail_practical_threshold_ms: None,
        quality_baseline,
        quality_target,
        mode: cfg.mode,
        median_detector: None,
        tail_detector: None,
        mann_whitney_detector: None,
        overrides: Vec::new(),
    }
}
