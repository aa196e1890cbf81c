//! Data-quality gate.
//!
//! Screens sample size and coefficient of variation before any detector
//! runs; outliers are recorded but never block. The quality score is
//! informational only and never participates in the verdict.

use crate::stats::{cv_pct, iqr_outlier_count, mean};
use crate::DomainError;
use tracegate_types::{GateConfig, QualityIssue, QualityReport};

const MIN_SAMPLE_CRITICAL: usize = 5;

const CV_HIGH_PCT: f64 = 20.0;
const CV_MODERATE_PCT: f64 = 10.0;
const CV_MINOR_PCT: f64 = 5.0;

const OUTLIER_ISSUE_FRACTION: f64 = 0.20;

const PENALTY_SAMPLE_CRITICAL: i32 = 30;
const PENALTY_SAMPLE_SMALL: i32 = 10;
const PENALTY_CV_HIGH: i32 = 25;
const PENALTY_CV_MODERATE: i32 = 10;
const PENALTY_CV_MINOR: i32 = 5;
const PENALTY_OUTLIER_ISSUE: i32 = 20;
const PENALTY_OUTLIER_ANY: i32 = 5;

/// Assess one sample. Rejects NaN/infinite/negative measurements; anything
/// else produces a report, even for empty or tiny samples.
pub fn assess_sample(values: &[f64], cfg: &GateConfig) -> Result<QualityReport, DomainError> {
    if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return Err(DomainError::InvalidInput);
    }

    let n = values.len();

    let sample_mean = if n > 0 { Some(mean(values)?) } else { None };

    // Sample CV needs n >= 2; an all-zero sample has no defined CV either.
    let cv = match (n >= 2, sample_mean) {
        (true, Some(m)) if m != 0.0 => Some(cv_pct(values)?),
        _ => None,
    };

    let outlier_count = if n > 0 { iqr_outlier_count(values)? } else { 0 };
    let outlier_fraction = if n > 0 {
        outlier_count as f64 / n as f64
    } else {
        0.0
    };

    let mut issues = Vec::new();
    if n < cfg.min_n {
        issues.push(QualityIssue::TooFewSamples);
    }
    if cv.is_some_and(|c| c > cfg.cv_max_pct) {
        issues.push(QualityIssue::HighCv);
    }
    if outlier_fraction > OUTLIER_ISSUE_FRACTION {
        issues.push(QualityIssue::ManyOutliers);
    }

    let mut score: i32 = 100;
    if n < MIN_SAMPLE_CRITICAL {
        score -= PENALTY_SAMPLE_CRITICAL;
    } else if n < cfg.min_n {
        score -= PENALTY_SAMPLE_SMALL;
    }
    if let Some(c) = cv {
        if c > CV_HIGH_PCT {
            score -= PENALTY_CV_HIGH;
        } else if c > CV_MODERATE_PCT {
            score -= PENALTY_CV_MODERATE;
        } else if c > CV_MINOR_PCT {
            score -= PENALTY_CV_MINOR;
        }
    }
    if outlier_fraction > OUTLIER_ISSUE_FRACTION {
        score -= PENALTY_OUTLIER_ISSUE;
    } else if outlier_count > 0 {
        score -= PENALTY_OUTLIER_ANY;
    }

    Ok(QualityReport {
        n,
        mean: sample_mean,
        cv_pct: cv,
        outlier_count,
        quality_score: score.clamp(0, 100) as u8,
        issues,
    })
}

/// Decide admission for a pair of assessed samples. Returns the blocking
/// issue and a human reason, or None when the pair is admitted.
///
/// Sample-size screens run before the CV screen; outliers never block.
pub fn screen_quality(
    baseline: &QualityReport,
    target: &QualityReport,
    cfg: &GateConfig,
) -> Option<(QualityIssue, String)> {
    if baseline.n < cfg.min_n {
        return Some((
            QualityIssue::TooFewSamples,
            format!(
                "baseline has {} samples (minimum {} required)",
                baseline.n, cfg.min_n
            ),
        ));
    }
    if target.n < cfg.min_n {
        return Some((
            QualityIssue::TooFewSamples,
            format!(
                "target has {} samples (minimum {} required)",
                target.n, cfg.min_n
            ),
        ));
    }

    let max_cv = match (baseline.cv_pct, target.cv_pct) {
        (Some(b), Some(t)) => b.max(t),
        (Some(b), None) => b,
        (None, Some(t)) => t,
        (None, None) => return None,
    };
    if max_cv > cfg.cv_max_pct {
        return Some((
            QualityIssue::HighCv,
            format!(
                "coefficient of variation {:.1}% exceeds {:.1}% (baseline {:.1}%, target {:.1}%); measurements too noisy for reliable detection",
                max_cv,
                cfg.cv_max_pct,
                baseline.cv_pct.unwrap_or(0.0),
                target.cv_pct.unwrap_or(0.0),
            ),
        ));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> GateConfig {
        GateConfig::default()
    }

    #[test]
    fn clean_sample_scores_100() {
        let x: Vec<f64> = (0..20).map(|i| 100.0 + (i % 3) as f64).collect();
        let report = assess_sample(&x, &cfg()).unwrap();
        assert_eq!(report.quality_score, 100);
        assert!(report.issues.is_empty());
        assert_eq!(report.n, 20);
    }

    #[test]
    fn small_sample_flagged_and_penalized() {
        let x = [100.0, 101.0, 102.0, 99.0, 98.0, 100.0, 101.0];
        let report = assess_sample(&x, &cfg()).unwrap();
        assert!(report.issues.contains(&QualityIssue::TooFewSamples));
        assert_eq!(report.quality_score, 90);
    }

    #[test]
    fn critical_sample_size_penalized_harder() {
        let x = [100.0, 101.0, 99.0];
        let report = assess_sample(&x, &cfg()).unwrap();
        assert!(report.issues.contains(&QualityIssue::TooFewSamples));
        assert_eq!(report.quality_score, 70);
    }

    #[test]
    fn empty_sample_produces_report_not_error() {
        let report = assess_sample(&[], &cfg()).unwrap();
        assert_eq!(report.n, 0);
        assert!(report.mean.is_none());
        assert!(report.cv_pct.is_none());
        assert!(report.issues.contains(&QualityIssue::TooFewSamples));
    }

    #[test]
    fn negative_measurement_is_invalid() {
        assert!(matches!(
            assess_sample(&[1.0, -2.0], &cfg()),
            Err(DomainError::InvalidInput)
        ));
    }

    #[test]
    fn high_cv_flagged() {
        let x = [100.0, 95.0, 180.0, 90.0, 85.0, 100.0, 95.0, 180.0, 90.0, 85.0];
        let report = assess_sample(&x, &cfg()).unwrap();
        assert!(report.cv_pct.unwrap() > 15.0);
        assert!(report.issues.contains(&QualityIssue::HighCv));
    }

    #[test]
    fn screen_blocks_small_baseline_first() {
        let small = assess_sample(&[1.0, 2.0, 3.0], &cfg()).unwrap();
        let ok =
            assess_sample(&(0..20).map(|i| 100.0 + i as f64 * 0.1).collect::<Vec<_>>(), &cfg())
                .unwrap();
        let (issue, reason) = screen_quality(&small, &ok, &cfg()).unwrap();
        assert_eq!(issue, QualityIssue::TooFewSamples);
        assert!(reason.contains("baseline"));
    }

    #[test]
    fn screen_blocks_high_cv() {
        let noisy = assess_sample(
            &[100.0, 95.0, 180.0, 90.0, 85.0, 100.0, 95.0, 180.0, 90.0, 85.0],
            &cfg(),
        )
        .unwrap();
        let (issue, reason) = screen_quality(&noisy.clone(), &noisy, &cfg()).unwrap();
        assert_eq!(issue, QualityIssue::HighCv);
        assert!(reason.contains("coefficient of variation"));
    }

    #[test]
    fn screen_admits_clean_pair() {
        let clean = assess_sample(
            &(0..20).map(|i| 100.0 + (i % 4) as f64).collect::<Vec<_>>(),
            &cfg(),
        )
        .unwrap();
        assert!(screen_quality(&clean.clone(), &clean, &cfg()).is_none());
    }

    #[test]
    fn outliers_recorded_but_never_block() {
        // 3 of 12 points far out: MANY_OUTLIERS recorded, still admitted.
        let mut x = vec![100.0, 100.5, 101.0, 100.2, 100.8, 100.1, 100.9, 100.3, 100.6];
        x.extend([130.0, 130.0, 130.0]);
        let report = assess_sample(&x, &cfg()).unwrap();
        assert!(report.outlier_count >= 3);
        assert!(report.issues.contains(&QualityIssue::ManyOutliers));

        let clean = assess_sample(
            &(0..20).map(|i| 100.0 + (i % 4) as f64).collect::<Vec<_>>(),
            &cfg(),
        )
        .unwrap();
        // Outliers alone do not block admission.
        if report.cv_pct.unwrap() <= cfg().cv_max_pct {
            assert!(screen_quality(&report, &clean, &cfg()).is_none());
        }
    }
}
