//! Fuzz target for the gate function in tracegate-domain.
//!
//! Verifies that a single gate invocation never panics, whatever the sample
//! contents: NaN/negative values must come back as errors, not aborts.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tracegate_domain::gate;
use tracegate_types::{GateConfig, GateMode};

#[derive(Arbitrary, Debug)]
struct GateInput {
    baseline: Vec<f64>,
    target: Vec<f64>,
    seed: u64,
    release_mode: bool,
    use_mann_whitney: bool,
    ms_floor: f64,
    pct_floor: f64,
}

fn finite_nonneg(v: f64, fallback: f64) -> f64 {
    if v.is_finite() && v >= 0.0 {
        v
    } else {
        fallback
    }
}

fuzz_target!(|input: GateInput| {
    let mut baseline = input.baseline;
    baseline.truncate(256);
    let mut target = input.target;
    target.truncate(256);

    let cfg = GateConfig {
        mode: if input.release_mode {
            GateMode::Release
        } else {
            GateMode::Pr
        },
        seed: input.seed,
        use_mann_whitney: input.use_mann_whitney,
        ms_floor: finite_nonneg(input.ms_floor, 5.0),
        pct_floor: finite_nonneg(input.pct_floor, 0.03).min(1.0),
        // Keep iterations cheap under the fuzzer.
        bootstrap_b: 50,
        ..GateConfig::default()
    };

    // May return Err on invalid samples; it must never panic.
    let _ = gate(&baseline, &target, &cfg);
});
