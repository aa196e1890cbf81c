//! Fuzz target for the multi-trace pipeline: orchestration plus markdown
//! and annotation rendering must never panic on structurally valid but
//! adversarial documents.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tracegate_app::{github_annotations, render_markdown, CompareRequest, CompareUseCase, SystemClock};
use tracegate_types::{GateConfig, TraceDoc, TraceRecord};

#[derive(Arbitrary, Debug)]
struct FuzzTrace {
    name: String,
    values: Vec<f64>,
}

#[derive(Arbitrary, Debug)]
struct CompareInput {
    baseline: Vec<FuzzTrace>,
    target: Vec<FuzzTrace>,
    seed: u64,
}

fn doc(traces: Vec<FuzzTrace>) -> TraceDoc {
    TraceDoc {
        traces: traces
            .into_iter()
            .take(8)
            .map(|t| TraceRecord {
                name: t.name,
                values: t.values.into_iter().take(64).collect(),
                extra: Default::default(),
            })
            .collect(),
    }
}

fuzz_target!(|input: CompareInput| {
    let config = GateConfig {
        seed: input.seed,
        bootstrap_b: 25,
        ..GateConfig::default()
    };

    let usecase = CompareUseCase::new(SystemClock);
    // Schema violations come back as Err; that path must not panic either.
    if let Ok(outcome) = usecase.execute(CompareRequest {
        baseline: doc(input.baseline),
        target: doc(input.target),
        baseline_label: "baseline".to_string(),
        target_label: "target".to_string(),
        config,
    }) {
        let _ = render_markdown(&outcome);
        let _ = github_annotations(&outcome);
    }
});
