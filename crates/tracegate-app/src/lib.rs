//! Application layer for tracegate.
//!
//! The app layer pairs traces by name and coordinates the domain gate.
//! It does not parse CLI flags and it does not do filesystem I/O.

use anyhow::bail;
use std::collections::BTreeMap;
use tracegate_domain::gate;
use tracegate_types::{
    GateConfig, GateDetails, GateResult, GateStatus, QualityReport, RunSummary, SummaryCounts,
    TraceDoc, TraceLine, TraceVerdict, REASON_INTERNAL_ERROR, RESULT_SCHEMA_V1, SUMMARY_SCHEMA_V1,
};

pub trait Clock: Send + Sync {
    fn now_rfc3339(&self) -> String;
}

#[derive(Debug, Default, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_rfc3339(&self) -> String {
        use time::format_description::well_known::Rfc3339;
        time::OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
    }
}

/// Per-trace seed: splitmix64 finalizer over the master seed and an FNV-1a
/// hash of the trace name. Stable across platforms and releases, so a rerun
/// with the same master seed reproduces every bootstrap exactly.
pub fn derive_seed(master: u64, name: &str) -> u64 {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in name.as_bytes() {
        h ^= u64::from(*byte);
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
    }
    let mut z = master.wrapping_add(h).wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[derive(Debug, Clone)]
pub struct CompareRequest {
    pub baseline: TraceDoc,
    pub target: TraceDoc,

    /// Display labels for the summary (typically the input file paths).
    pub baseline_label: String,
    pub target_label: String,

    pub config: GateConfig,
}

#[derive(Debug, Clone)]
pub struct CompareOutcome {
    /// One verdict per intersected trace, sorted by name.
    pub verdicts: Vec<TraceVerdict>,

    pub summary: RunSummary,

    /// True if any intersected trace is FAIL.
    pub failed: bool,

    /// 0 when all traces pass (NO_CHANGE and INCONCLUSIVE included), 1 on
    /// any FAIL. Parse errors never reach here; the CLI maps them to 2.
    pub exit_code: i32,
}

pub struct CompareUseCase<C: Clock> {
    clock: C,
}

impl<C: Clock> CompareUseCase<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    pub fn execute(&self, req: CompareRequest) -> anyhow::Result<CompareOutcome> {
        let baseline_map = build_trace_map(&req.baseline, "baseline")?;
        let target_map = build_trace_map(&req.target, "target")?;

        let mut warnings = Vec::new();
        push_missing_warning(&mut warnings, &baseline_map, &target_map, "baseline");
        push_missing_warning(&mut warnings, &target_map, &baseline_map, "target");

        // BTreeMap iteration gives the stable name order the report relies on.
        let mut verdicts = Vec::new();
        let mut counts = SummaryCounts::default();

        for (name, baseline_values) in &baseline_map {
            let Some(target_values) = target_map.get(name) else {
                continue;
            };

            let trace_cfg = GateConfig {
                seed: derive_seed(req.config.seed, name),
                ..req.config.clone()
            };

            let result = match gate(baseline_values, target_values, &trace_cfg) {
                Ok(result) => result,
                // A broken trace must not abort its siblings.
                Err(err) => internal_error_result(
                    baseline_values.len(),
                    target_values.len(),
                    &trace_cfg,
                    &err,
                ),
            };

            counts.total += 1;
            match result.status {
                GateStatus::Pass => counts.pass += 1,
                GateStatus::Fail => counts.fail += 1,
                GateStatus::NoChange => counts.no_change += 1,
                GateStatus::Inconclusive => counts.inconclusive += 1,
            }

            verdicts.push(TraceVerdict {
                schema: RESULT_SCHEMA_V1.to_string(),
                name: name.clone(),
                gate: result,
            });
        }

        let failed = counts.fail > 0;

        let summary = RunSummary {
            schema: SUMMARY_SCHEMA_V1.to_string(),
            generated_at: self.clock.now_rfc3339(),
            baseline_file: req.baseline_label,
            target_file: req.target_label,
            mode: req.config.mode,
            seed: req.config.seed,
            counts,
            warnings,
            traces: verdicts
                .iter()
                .map(|v| TraceLine {
                    name: v.name.clone(),
                    status: v.gate.status,
                    reason: v.gate.reason.clone(),
                })
                .collect(),
        };

        Ok(CompareOutcome {
            verdicts,
            summary,
            failed,
            exit_code: if failed { 1 } else { 0 },
        })
    }
}

/// Validate one document and index its traces by name.
///
/// Schema violations (empty or duplicate names, negative or non-finite
/// values) are fatal for the whole run.
fn build_trace_map(doc: &TraceDoc, side: &str) -> anyhow::Result<BTreeMap<String, Vec<f64>>> {
    let mut map = BTreeMap::new();

    for trace in &doc.traces {
        if trace.name.is_empty() {
            bail!("{side} document contains a trace with an empty name");
        }
        for &value in &trace.values {
            if !value.is_finite() || value < 0.0 {
                bail!(
                    "trace '{}' in {side} document contains invalid measurement {value}",
                    trace.name
                );
            }
        }
        if map.insert(trace.name.clone(), trace.values.clone()).is_some() {
            bail!("duplicate trace name '{}' in {side} document", trace.name);
        }
    }

    Ok(map)
}

fn push_missing_warning(
    warnings: &mut Vec<String>,
    present: &BTreeMap<String, Vec<f64>>,
    other: &BTreeMap<String, Vec<f64>>,
    side: &str,
) {
    let only: Vec<&str> = present
        .keys()
        .filter(|name| !other.contains_key(*name))
        .map(String::as_str)
        .collect();
    if !only.is_empty() {
        warnings.push(format!(
            "{} trace(s) only in {side}: {}",
            only.len(),
            only.join(", ")
        ));
    }
}

fn internal_error_result(
    n_baseline: usize,
    n_target: usize,
    cfg: &GateConfig,
    err: &tracegate_domain::DomainError,
) -> GateResult {
    let stub = |n: usize| QualityReport {
        n,
        mean: None,
        cv_pct: None,
        outlier_count: 0,
        quality_score: 0,
        issues: Vec::new(),
    };

    GateResult {
        status: GateStatus::Inconclusive,
        reason: format!("{REASON_INTERNAL_ERROR}: {err}"),
        inconclusive: true,
        details: GateDetails {
            n_baseline,
            n_target,
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
            quality_baseline: stub(n_baseline),
            quality_target: stub(n_target),
            mode: cfg.mode,
            median_detector: None,
            tail_detector: None,
            mann_whitney_detector: None,
            overrides: Vec::new(),
        },
    }
}

// ----------------------------
// Rendering helpers
// ----------------------------

pub fn render_markdown(outcome: &CompareOutcome) -> String {
    let mut out = String::new();

    let header = if outcome.failed {
        "❌ tracegate: fail"
    } else if outcome.summary.counts.inconclusive > 0 {
        "⚠️ tracegate: pass (with inconclusive traces)"
    } else {
        "✅ tracegate: pass"
    };

    out.push_str(header);
    out.push_str("\n\n");

    let c = &outcome.summary.counts;
    out.push_str(&format!(
        "**Traces:** {} total: {} pass, {} fail, {} no change, {} inconclusive\n\n",
        c.total, c.pass, c.fail, c.no_change, c.inconclusive
    ));

    out.push_str("| trace | baseline (median) | target (median) | delta | tail delta | p | status |\n");
    out.push_str("|---|---:|---:|---:|---:|---:|---|\n");

    for verdict in &outcome.verdicts {
        let d = &verdict.gate.details;
        out.push_str(&format!(
            "| `{name}` | {b} | {t} | {delta} | {tail} | {p} | {status} |\n",
            name = verdict.name,
            b = fmt_ms(d.baseline_median_ms),
            t = fmt_ms(d.target_median_ms),
            delta = fmt_delta(d.median_delta_ms),
            tail = fmt_delta(d.tail_delta_ms),
            p = fmt_p(d.mann_whitney_p),
            status = status_icon(verdict.gate.status),
        ));
    }

    if !outcome.summary.warnings.is_empty() {
        out.push_str("\n**Warnings:**\n");
        for warning in &outcome.summary.warnings {
            out.push_str(&format!("- {}\n", warning));
        }
    }

    out
}

pub fn github_annotations(outcome: &CompareOutcome) -> Vec<String> {
    let mut lines = Vec::new();

    for verdict in &outcome.verdicts {
        let prefix = match verdict.gate.status {
            GateStatus::Fail => "::error",
            GateStatus::Inconclusive => "::warning",
            GateStatus::Pass | GateStatus::NoChange => continue,
        };

        lines.push(format!(
            "{prefix}::tracegate {name}: {reason}",
            name = verdict.name,
            reason = verdict.gate.reason
        ));
    }

    lines
}

fn status_icon(status: GateStatus) -> &'static str {
    match status {
        GateStatus::Pass => "✅",
        GateStatus::NoChange => "✅ (no change)",
        GateStatus::Fail => "❌",
        GateStatus::Inconclusive => "⚠️",
    }
}

fn fmt_ms(v: Option<f64>) -> String {
    match v {
        Some(v) => format!("{:.1} ms", v),
        None => "–".to_string(),
    }
}

fn fmt_delta(v: Option<f64>) -> String {
    match v {
        Some(v) => {
            let sign = if v > 0.0 { "+" } else { "" };
            format!("{sign}{:.2} ms", v)
        }
        None => "–".to_string(),
    }
}

fn fmt_p(v: Option<f64>) -> String {
    match v {
        Some(v) => format!("{:.4}", v),
        None => "–".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracegate_types::TraceRecord;

    #[derive(Debug, Clone)]
    struct FixedClock;

    impl Clock for FixedClock {
        fn now_rfc3339(&self) -> String {
            "2026-01-01T00:00:00Z".to_string()
        }
    }

    fn doc(traces: &[(&str, Vec<f64>)]) -> TraceDoc {
        TraceDoc {
            traces: traces
                .iter()
                .map(|(name, values)| TraceRecord {
                    name: name.to_string(),
                    values: values.clone(),
                    extra: Default::default(),
                })
                .collect(),
        }
    }

    fn quiet(center: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| center + (i % 5) as f64).collect()
    }

    fn run(baseline: TraceDoc, target: TraceDoc) -> CompareOutcome {
        CompareUseCase::new(FixedClock)
            .execute(CompareRequest {
                baseline,
                target,
                baseline_label: "baseline.json".to_string(),
                target_label: "target.json".to_string(),
                config: GateConfig::default(),
            })
            .unwrap()
    }

    #[test]
    fn matches_traces_by_name_in_sorted_order() {
        let baseline = doc(&[
            ("zeta", quiet(100.0, 20)),
            ("alpha", quiet(100.0, 20)),
            ("mu", quiet(100.0, 20)),
        ]);
        let target = doc(&[
            ("mu", quiet(100.0, 20)),
            ("zeta", quiet(100.0, 20)),
            ("alpha", quiet(100.0, 20)),
        ]);

        let outcome = run(baseline, target);
        let names: Vec<&str> = outcome.verdicts.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "mu", "zeta"]);
        assert_eq!(outcome.summary.counts.total, 3);
        assert_eq!(outcome.exit_code, 0);
    }

    #[test]
    fn missing_traces_warn_but_do_not_gate() {
        let baseline = doc(&[
            ("shared", quiet(100.0, 20)),
            ("baseline_only", quiet(100.0, 20)),
        ]);
        let target = doc(&[
            ("shared", quiet(100.0, 20)),
            ("target_only", quiet(100.0, 20)),
        ]);

        let outcome = run(baseline, target);
        assert_eq!(outcome.verdicts.len(), 1);
        assert_eq!(outcome.summary.warnings.len(), 2);
        assert!(outcome.summary.warnings[0].contains("baseline_only"));
        assert!(outcome.summary.warnings[1].contains("target_only"));
        assert_eq!(outcome.exit_code, 0);
    }

    #[test]
    fn one_failing_trace_sets_exit_code() {
        let baseline = doc(&[
            ("steady", quiet(100.0, 20)),
            ("regressed", quiet(100.0, 20)),
        ]);
        let regressed: Vec<f64> = quiet(100.0, 20).iter().map(|v| v + 50.0).collect();
        let target = doc(&[("steady", quiet(100.0, 20)), ("regressed", regressed)]);

        let outcome = run(baseline, target);
        assert!(outcome.failed);
        assert_eq!(outcome.exit_code, 1);
        assert_eq!(outcome.summary.counts.fail, 1);

        let regressed_verdict = outcome
            .verdicts
            .iter()
            .find(|v| v.name == "regressed")
            .unwrap();
        assert_eq!(regressed_verdict.gate.status, GateStatus::Fail);
    }

    #[test]
    fn inconclusive_traces_do_not_fail_the_run() {
        let baseline = doc(&[("tiny", quiet(100.0, 3))]);
        let target = doc(&[("tiny", quiet(100.0, 3))]);

        let outcome = run(baseline, target);
        assert_eq!(outcome.summary.counts.inconclusive, 1);
        assert_eq!(outcome.exit_code, 0);
        assert!(!outcome.failed);
    }

    #[test]
    fn duplicate_name_is_fatal() {
        let baseline = doc(&[("dup", quiet(100.0, 20)), ("dup", quiet(100.0, 20))]);
        let target = doc(&[("dup", quiet(100.0, 20))]);

        let err = CompareUseCase::new(FixedClock)
            .execute(CompareRequest {
                baseline,
                target,
                baseline_label: "b".to_string(),
                target_label: "t".to_string(),
                config: GateConfig::default(),
            })
            .unwrap_err();
        assert!(err.to_string().contains("duplicate trace name"));
    }

    #[test]
    fn empty_name_is_fatal() {
        let baseline = doc(&[("", quiet(100.0, 20))]);
        let target = doc(&[]);

        let err = CompareUseCase::new(FixedClock)
            .execute(CompareRequest {
                baseline,
                target,
                baseline_label: "b".to_string(),
                target_label: "t".to_string(),
                config: GateConfig::default(),
            })
            .unwrap_err();
        assert!(err.to_string().contains("empty name"));
    }

    #[test]
    fn negative_measurement_is_fatal() {
        let baseline = doc(&[("bad", vec![1.0, -3.0])]);
        let target = doc(&[("bad", quiet(100.0, 20))]);

        let err = CompareUseCase::new(FixedClock)
            .execute(CompareRequest {
                baseline,
                target,
                baseline_label: "b".to_string(),
                target_label: "t".to_string(),
                config: GateConfig::default(),
            })
            .unwrap_err();
        assert!(err.to_string().contains("invalid measurement"));
    }

    #[test]
    fn per_trace_seeds_differ_but_are_stable() {
        assert_ne!(derive_seed(0, "api_login"), derive_seed(0, "ui_render"));
        assert_ne!(derive_seed(0, "api_login"), derive_seed(1, "api_login"));
        assert_eq!(derive_seed(7, "checkout"), derive_seed(7, "checkout"));
    }

    #[test]
    fn rerun_reproduces_bootstrap_bitwise() {
        let baseline = doc(&[("t", quiet(100.0, 20))]);
        let target = doc(&[("t", quiet(104.0, 20))]);

        let a = run(baseline.clone(), target.clone());
        let b = run(baseline, target);
        assert_eq!(
            a.verdicts[0].gate.details.bootstrap_ci_low_ms,
            b.verdicts[0].gate.details.bootstrap_ci_low_ms
        );
        assert_eq!(
            a.verdicts[0].gate.details.bootstrap_ci_high_ms,
            b.verdicts[0].gate.details.bootstrap_ci_high_ms
        );
    }

    #[test]
    fn markdown_renders_table_and_warnings() {
        let baseline = doc(&[("only_here", quiet(100.0, 20)), ("both", quiet(100.0, 20))]);
        let target = doc(&[("both", quiet(100.0, 20))]);

        let outcome = run(baseline, target);
        let md = render_markdown(&outcome);
        assert!(md.contains("tracegate: pass"));
        assert!(md.contains("| trace | baseline"));
        assert!(md.contains("`both`"));
        assert!(md.contains("only_here"));
    }

    #[test]
    fn annotations_cover_fail_and_inconclusive() {
        let baseline = doc(&[("tiny", quiet(100.0, 3)), ("slow", quiet(100.0, 20))]);
        let slow: Vec<f64> = quiet(100.0, 20).iter().map(|v| v + 50.0).collect();
        let target = doc(&[("tiny", quiet(100.0, 3)), ("slow", slow)]);

        let outcome = run(baseline, target);
        let annotations = github_annotations(&outcome);
        assert_eq!(annotations.len(), 2);
        assert!(annotations.iter().any(|a| a.starts_with("::error") && a.contains("slow")));
        assert!(annotations.iter().any(|a| a.starts_with("::warning") && a.contains("tiny")));
    }
}
