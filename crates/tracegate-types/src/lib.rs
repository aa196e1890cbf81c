//! Shared types for tracegate.
//!
//! Design goal: versioned, explicit, boring.
//! These structs are used for trace inputs, per-trace verdicts, and run summaries.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const TRACES_SCHEMA_V1: &str = "tracegate.traces.v1";
pub const RESULT_SCHEMA_V1: &str = "tracegate.result.v1";
pub const SUMMARY_SCHEMA_V1: &str = "tracegate.summary.v1";

// ----------------------------
// Default gate constants
// ----------------------------

/// Absolute floor for the median threshold (ms).
pub const MS_FLOOR: f64 = 5.0;
/// Relative floor for the median threshold, as a fraction of the baseline median.
pub const PCT_FLOOR: f64 = 0.03;
/// Absolute floor for the tail threshold (ms).
pub const TAIL_MS_FLOOR: f64 = 75.0;
/// Relative floor for the tail threshold, as a fraction of the baseline tail statistic.
pub const TAIL_PCT_FLOOR: f64 = 0.05;
/// Minimum sample size admitted by the quality gate.
pub const MIN_N: usize = 10;
/// Maximum coefficient of variation (percent) admitted by the quality gate.
pub const CV_MAX_PCT: f64 = 15.0;
/// One-sided significance level for the Mann-Whitney detector.
pub const ALPHA: f64 = 0.05;
/// Effect-size floor on P(T>B) for the Mann-Whitney detector.
pub const EFFECT_FLOOR_PROB: f64 = 0.55;
/// Informational directionality threshold surfaced in details.
pub const DIRECTIONALITY: f64 = 0.70;
/// Fraction of the sample counted into the tail statistic.
pub const TAIL_METRIC_K_PCT: f64 = 0.10;
pub const TAIL_METRIC_K_MIN: usize = 2;
pub const TAIL_METRIC_K_MAX: usize = 5;
/// Practical-significance threshold: fraction of the baseline median.
pub const PRACTICAL_PCT: f64 = 0.01;
pub const PRACTICAL_MIN_MS: f64 = 2.0;
pub const PRACTICAL_MAX_MS: f64 = 20.0;
/// Release-mode equivalence margin (ms).
pub const EQUIVALENCE_MARGIN_MS: f64 = 30.0;
/// Bootstrap resample count.
pub const BOOTSTRAP_B: u32 = 5000;
/// Bootstrap CI confidence level.
pub const BOOTSTRAP_CONFIDENCE: f64 = 0.95;
/// Default PRNG seed.
pub const SEED: u64 = 0;

/// Machine token prefixed to verdicts downgraded by the practical override.
pub const REASON_PRACTICAL_OVERRIDE: &str = "PRACTICAL_OVERRIDE";
/// Machine token for traces that hit an unexpected computation error.
pub const REASON_INTERNAL_ERROR: &str = "INTERNAL_ERROR";

// ----------------------------
// Input documents
// ----------------------------

/// One named trace: a multiset of latency measurements in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct TraceRecord {
    pub name: String,

    pub values: Vec<f64>,

    /// Unknown per-trace fields are preserved opaquely but unused.
    #[serde(flatten, default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A trace collection document (baseline and target are structurally identical).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
pub struct TraceDoc {
    pub traces: Vec<TraceRecord>,
}

// ----------------------------
// Gate configuration
// ----------------------------

#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GateMode {
    /// Commit-to-commit regression cascade.
    Pr,
    /// Equivalence (TOST) check on the bootstrap CI.
    Release,
}

/// All gate constants as value parameters, threaded through every gate call.
/// No process-wide mutable configuration exists.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct GateConfig {
    pub mode: GateMode,

    pub ms_floor: f64,
    pub pct_floor: f64,
    pub tail_ms_floor: f64,
    pub tail_pct_floor: f64,

    pub min_n: usize,
    pub cv_max_pct: f64,

    pub use_mann_whitney: bool,
    pub mann_whitney_alpha: f64,
    pub effect_floor_prob: f64,

    /// Informational only; surfaced in details, never gates.
    pub directionality: f64,

    pub tail_k_pct: f64,
    pub tail_k_min: usize,
    pub tail_k_max: usize,

    pub practical_pct: f64,
    pub practical_min_ms: f64,
    pub practical_max_ms: f64,

    pub equivalence_margin_ms: f64,

    pub bootstrap_b: u32,
    pub bootstrap_confidence: f64,
    pub seed: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            mode: GateMode::Pr,
            ms_floor: MS_FLOOR,
            pct_floor: PCT_FLOOR,
            tail_ms_floor: TAIL_MS_FLOOR,
            tail_pct_floor: TAIL_PCT_FLOOR,
            min_n: MIN_N,
            cv_max_pct: CV_MAX_PCT,
            use_mann_whitney: true,
            mann_whitney_alpha: ALPHA,
            effect_floor_prob: EFFECT_FLOOR_PROB,
            directionality: DIRECTIONALITY,
            tail_k_pct: TAIL_METRIC_K_PCT,
            tail_k_min: TAIL_METRIC_K_MIN,
            tail_k_max: TAIL_METRIC_K_MAX,
            practical_pct: PRACTICAL_PCT,
            practical_min_ms: PRACTICAL_MIN_MS,
            practical_max_ms: PRACTICAL_MAX_MS,
            equivalence_margin_ms: EQUIVALENCE_MARGIN_MS,
            bootstrap_b: BOOTSTRAP_B,
            bootstrap_confidence: BOOTSTRAP_CONFIDENCE,
            seed: SEED,
        }
    }
}

// ----------------------------
// Derived values
// ----------------------------

/// Thresholds derived from the baseline sample. Immutable once computed.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ThresholdSet {
    pub median_threshold_ms: f64,
    pub tail_threshold_ms: f64,
    pub practical_threshold_ms: f64,
    pub tail_practical_threshold_ms: f64,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityIssue {
    TooFewSamples,
    HighCv,
    ManyOutliers,
}

/// Per-sample data-quality record. The score is informational only.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct QualityReport {
    pub n: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cv_pct: Option<f64>,

    pub outlier_count: usize,

    /// 0-100; base 100 minus weighted penalties for triggered issues.
    pub quality_score: u8,

    pub issues: Vec<QualityIssue>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DetectorOutcome {
    Pass,
    Fail { reason: String, magnitude: f64 },
}

impl DetectorOutcome {
    pub fn is_fail(&self) -> bool {
        matches!(self, DetectorOutcome::Fail { .. })
    }
}

// ----------------------------
// Verdicts
// ----------------------------

#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateStatus {
    Pass,
    Fail,
    NoChange,
    Inconclusive,
}

impl GateStatus {
    /// Only FAIL blocks a run; NO_CHANGE and INCONCLUSIVE count as passing
    /// for exit-code purposes.
    pub fn is_blocking(self) -> bool {
        matches!(self, GateStatus::Fail)
    }
}

/// Every intermediate metric behind a verdict, so the outcome is auditable.
/// Fields are absent when the corresponding stage did not run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct GateDetails {
    pub n_baseline: usize,
    pub n_target: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_median_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_median_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median_delta_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median_threshold_ms: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_tail_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_tail_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tail_delta_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tail_threshold_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tail_k: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub directionality_frac: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directionality_threshold: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mann_whitney_u: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mann_whitney_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prob_target_gt_baseline: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootstrap_ci_low_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootstrap_ci_high_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootstrap_point_ms: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub practical_threshold_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tail_practical_threshold_ms: Option<f64>,

    pub quality_baseline: QualityReport,
    pub quality_target: QualityReport,

    pub mode: GateMode,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub median_detector: Option<DetectorOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tail_detector: Option<DetectorOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mann_whitney_detector: Option<DetectorOutcome>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<String>,
}

/// The terminal entity of one gate invocation. Immutable once returned.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct GateResult {
    pub status: GateStatus,

    /// Short machine token plus human string.
    pub reason: String,

    pub inconclusive: bool,

    pub details: GateDetails,
}

/// A per-trace gate result as written to the result stream.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct TraceVerdict {
    pub schema: String,

    pub name: String,

    #[serde(flatten)]
    pub gate: GateResult,
}

// ----------------------------
// Run summary
// ----------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub struct SummaryCounts {
    pub total: u32,
    pub pass: u32,
    pub fail: u32,
    pub no_change: u32,
    pub inconclusive: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct TraceLine {
    pub name: String,
    pub status: GateStatus,
    pub reason: String,
}

/// One run over two trace collections, reduced for reporting.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct RunSummary {
    pub schema: String,

    pub generated_at: String,

    pub baseline_file: String,
    pub target_file: String,

    pub mode: GateMode,
    pub seed: u64,

    pub counts: SummaryCounts,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    pub traces: Vec<TraceLine>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_status_serializes_screaming_snake_case() {
        assert_eq!(
            serde_json::to_string(&GateStatus::NoChange).unwrap(),
            "\"NO_CHANGE\""
        );
        assert_eq!(
            serde_json::to_string(&GateStatus::Inconclusive).unwrap(),
            "\"INCONCLUSIVE\""
        );
    }

    #[test]
    fn quality_issue_serializes_screaming_snake_case() {
        assert_eq!(
            serde_json::to_string(&QualityIssue::TooFewSamples).unwrap(),
            "\"TOO_FEW_SAMPLES\""
        );
        assert_eq!(
            serde_json::to_string(&QualityIssue::HighCv).unwrap(),
            "\"HIGH_CV\""
        );
    }

    #[test]
    fn mode_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&GateMode::Pr).unwrap(), "\"pr\"");
        assert_eq!(
            serde_json::to_string(&GateMode::Release).unwrap(),
            "\"release\""
        );
    }

    #[test]
    fn trace_record_preserves_unknown_fields() {
        let json = r#"{"name":"api_login","values":[1.0,2.0],"commit":"abc123"}"#;
        let rec: TraceRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.name, "api_login");
        assert_eq!(rec.values, vec![1.0, 2.0]);
        assert_eq!(
            rec.extra.get("commit"),
            Some(&serde_json::Value::String("abc123".to_string()))
        );

        let round = serde_json::to_string(&rec).unwrap();
        assert!(round.contains("\"commit\""));
    }

    #[test]
    fn trace_doc_ignores_unknown_top_level_fields() {
        let json = r#"{"commit":"abc","timestamp":"now","traces":[]}"#;
        let doc: TraceDoc = serde_json::from_str(json).unwrap();
        assert!(doc.traces.is_empty());
    }

    #[test]
    fn detector_outcome_is_tagged() {
        let fail = DetectorOutcome::Fail {
            reason: "median delta 20.00ms exceeds threshold 5.00ms".to_string(),
            magnitude: 20.0,
        };
        let json = serde_json::to_string(&fail).unwrap();
        assert!(json.contains("\"outcome\":\"fail\""));
        assert!(json.contains("\"magnitude\":20.0"));

        let pass = serde_json::to_string(&DetectorOutcome::Pass).unwrap();
        assert!(pass.contains("\"outcome\":\"pass\""));
    }

    #[test]
    fn default_config_matches_documented_constants() {
        let cfg = GateConfig::default();
        assert_eq!(cfg.ms_floor, 5.0);
        assert_eq!(cfg.pct_floor, 0.03);
        assert_eq!(cfg.tail_ms_floor, 75.0);
        assert_eq!(cfg.tail_pct_floor, 0.05);
        assert_eq!(cfg.min_n, 10);
        assert_eq!(cfg.cv_max_pct, 15.0);
        assert_eq!(cfg.mann_whitney_alpha, 0.05);
        assert_eq!(cfg.effect_floor_prob, 0.55);
        assert_eq!(cfg.bootstrap_b, 5000);
        assert_eq!(cfg.seed, 0);
        assert_eq!(cfg.mode, GateMode::Pr);
    }

    #[test]
    fn trace_verdict_flattens_gate_result() {
        let verdict = TraceVerdict {
            schema: RESULT_SCHEMA_V1.to_string(),
            name: "checkout".to_string(),
            gate: GateResult {
                status: GateStatus::Pass,
                reason: "PASS: median delta 0.00ms within threshold 5.00ms".to_string(),
                inconclusive: false,
                details: GateDetails {
                    n_baseline: 10,
                    n_target: 10,
                    baseline_median_ms: Some(100.0),
                    target_median_ms: Some(100.0),
                    median_delta_ms: Some(0.0),
                    median_threshold_ms: Some(5.0),
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
                    quality_baseline: QualityReport {
                        n: 10,
                        mean: Some(100.0),
                        cv_pct: Some(0.0),
                        outlier_count: 0,
                        quality_score: 100,
                        issues: vec![],
                    },
                    quality_target: QualityReport {
                        n: 10,
                        mean: Some(100.0),
                        cv_pct: Some(0.0),
                        outlier_count: 0,
                        quality_score: 100,
                        issues: vec![],
                    },
                    mode: GateMode::Pr,
                    median_detector: None,
                    tail_detector: None,
                    mann_whitney_detector: None,
                    overrides: vec![],
                },
            },
        };

        let json = serde_json::to_string(&verdict).unwrap();
        // Flattened: status sits next to name, not under a "gate" key.
        assert!(json.contains("\"name\":\"checkout\""));
        assert!(json.contains("\"status\":\"PASS\""));
        assert!(!json.contains("\"gate\""));

        let back: TraceVerdict = serde_json::from_str(&json).unwrap();
        assert_eq!(back, verdict);
    }
}
