//! Domain logic for tracegate.
//!
//! This crate is intentionally I/O-free: it does math and policy.
//! Everything here is pure over its inputs; each gate call owns its PRNG.

mod bootstrap;
mod gate;
mod mann_whitney;
mod quality;
mod stats;
mod tail;
mod thresholds;

pub use bootstrap::{median_diff_ci, BootstrapCi};
pub use gate::gate;
pub use mann_whitney::{rank_sum_u, MannWhitney};
pub use quality::{assess_sample, screen_quality};
pub use stats::{cv_pct, iqr_outlier_count, mad, mean, median, percentile, std_dev};
pub use tail::{tail_k, tail_stat};
pub use thresholds::compute_thresholds;

#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("empty sample")]
    EmptySample,

    #[error("sample contains NaN or infinite values")]
    InvalidInput,

    #[error("need at least two samples for a sample standard deviation")]
    InsufficientSamples,

    #[error("coefficient of variation undefined for zero mean")]
    UndefinedCv,

    #[error("quantile rank {0} outside [0, 1]")]
    InvalidQuantile(f64),

    #[error("confidence level {0} outside (0, 1)")]
    InvalidConfidence(f64),

    #[error("bootstrap resample count must be positive")]
    InvalidResampleCount,
}
