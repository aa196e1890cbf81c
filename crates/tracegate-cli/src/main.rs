use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracegate_app::{github_annotations, render_markdown, CompareRequest, CompareUseCase, SystemClock};
use tracegate_types::{GateConfig, GateMode, TraceDoc};

#[derive(Debug, Parser)]
#[command(
    name = "tracegate",
    version,
    about = "Statistical regression gate for multi-trace latency runs in CI"
)]
struct Cli {
    /// Baseline trace collection (JSON)
    baseline: PathBuf,

    /// Target trace collection (JSON)
    target: PathBuf,

    /// Directory for result artifacts (per-trace JSON, summary, comment)
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,

    /// Gate mode: pr (regression cascade) or release (equivalence check)
    #[arg(long, value_enum, default_value = "pr")]
    mode: ModeArg,

    /// Absolute floor for the median threshold (ms)
    #[arg(long, default_value_t = tracegate_types::MS_FLOOR)]
    ms_floor: f64,

    /// Relative floor for the median threshold (fraction of baseline median)
    #[arg(long, default_value_t = tracegate_types::PCT_FLOOR)]
    pct_floor: f64,

    /// Absolute floor for the tail threshold (ms)
    #[arg(long, default_value_t = tracegate_types::TAIL_MS_FLOOR)]
    tail_ms_floor: f64,

    /// Relative floor for the tail threshold (fraction of baseline tail)
    #[arg(long, default_value_t = tracegate_types::TAIL_PCT_FLOOR)]
    tail_pct_floor: f64,

    /// Informational directionality threshold surfaced in details
    #[arg(long, default_value_t = tracegate_types::DIRECTIONALITY)]
    directionality: f64,

    /// One-sided significance level for the Mann-Whitney detector
    #[arg(long, default_value_t = tracegate_types::ALPHA)]
    mann_whitney_alpha: f64,

    /// Disable the Mann-Whitney detector
    #[arg(long, default_value_t = false)]
    no_mann_whitney: bool,

    /// Equivalence margin for release mode (ms)
    #[arg(long, default_value_t = tracegate_types::EQUIVALENCE_MARGIN_MS)]
    equivalence_margin_ms: f64,

    /// Master seed; per-trace bootstrap seeds are derived from it
    #[arg(long, default_value_t = tracegate_types::SEED)]
    seed: u64,

    /// Pretty-print JSON artifacts
    #[arg(long, default_value_t = false)]
    pretty: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Pr,
    Release,
}

fn main() -> ExitCode {
    match real_main() {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("{err:#}");
            // Input, schema, and I/O problems are all "could not evaluate",
            // distinct from a gate failure (exit 1).
            ExitCode::from(2)
        }
    }
}

fn real_main() -> anyhow::Result<u8> {
    let cli = Cli::parse();

    let baseline: TraceDoc = read_json(&cli.baseline)?;
    let target: TraceDoc = read_json(&cli.target)?;

    let config = GateConfig {
        mode: match cli.mode {
            ModeArg::Pr => GateMode::Pr,
            ModeArg::Release => GateMode::Release,
        },
        ms_floor: cli.ms_floor,
        pct_floor: cli.pct_floor,
        tail_ms_floor: cli.tail_ms_floor,
        tail_pct_floor: cli.tail_pct_floor,
        directionality: cli.directionality,
        mann_whitney_alpha: cli.mann_whitney_alpha,
        use_mann_whitney: !cli.no_mann_whitney,
        equivalence_margin_ms: cli.equivalence_margin_ms,
        seed: cli.seed,
        ..GateConfig::default()
    };

    let usecase = CompareUseCase::new(SystemClock);
    let outcome = usecase.execute(CompareRequest {
        baseline,
        target,
        baseline_label: cli.baseline.display().to_string(),
        target_label: cli.target.display().to_string(),
        config,
    })?;

    fs::create_dir_all(&cli.output_dir)
        .with_context(|| format!("create dir {}", cli.output_dir.display()))?;

    for verdict in &outcome.verdicts {
        let path = cli
            .output_dir
            .join(format!("{}.json", sanitize_file_stem(&verdict.name)));
        write_json(&path, verdict, cli.pretty)?;
    }

    write_json(&cli.output_dir.join("summary.json"), &outcome.summary, cli.pretty)?;

    let markdown = render_markdown(&outcome);
    atomic_write(&cli.output_dir.join("comment.md"), markdown.as_bytes())?;

    let c = &outcome.summary.counts;
    println!(
        "tracegate: {} trace(s): {} pass, {} fail, {} no change, {} inconclusive",
        c.total, c.pass, c.fail, c.no_change, c.inconclusive
    );
    for warning in &outcome.summary.warnings {
        println!("warning: {warning}");
    }
    for line in github_annotations(&outcome) {
        println!("{line}");
    }

    Ok(if outcome.failed { 1 } else { 0 })
}

/// Trace names become file stems; anything outside [A-Za-z0-9._-] is
/// replaced so names cannot escape the output directory.
fn sanitize_file_stem(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let v =
        serde_json::from_slice(&bytes).with_context(|| format!("parse json {}", path.display()))?;
    Ok(v)
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T, pretty: bool) -> anyhow::Result<()> {
    let bytes = if pretty {
        serde_json::to_vec_pretty(value)?
    } else {
        serde_json::to_vec(value)?
    };

    atomic_write(path, &bytes)
}

fn atomic_write(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    use std::io::Write;

    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = parent.to_path_buf();
    tmp.push(format!(".{}.tmp", uuid::Uuid::new_v4()));

    {
        let mut f =
            fs::File::create(&tmp).with_context(|| format!("create temp {}", tmp.display()))?;
        f.write_all(bytes)
            .with_context(|| format!("write temp {}", tmp.display()))?;
        f.sync_all().ok();
    }

    fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}
