use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};

use specinit::spectral::ScaleFit;
use specinit::verify::{CorrelationCheck, ScaleFitCheck};
use specinit::{
    CVector, EstimateWriter, InitConfig, Problem, ProblemLoader, SpectralInitializer,
    SyntheticConfig, SyntheticProblem,
};

const CORRELATION_THRESHOLD: f64 = 0.9;

fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}

enum Command {
    Solve {
        problem: PathBuf,
        output: Option<PathBuf>,
    },
    Synthetic {
        measurements: usize,
        dim: usize,
        seed: u64,
    },
}

fn usage() -> &'static str {
    "usage: specinit <problem.json> [estimate.json]\n       specinit --synthetic <m> <n> [seed]"
}

fn parse_args() -> Result<Command> {
    let mut args = env::args().skip(1);
    let first = args
        .next()
        .with_context(|| format!("missing arguments\n{}", usage()))?;

    if first == "--synthetic" {
        let measurements = args
            .next()
            .context("missing measurement count")?
            .parse()
            .context("parse measurement count")?;
        let dim = args
            .next()
            .context("missing signal dimension")?
            .parse()
            .context("parse signal dimension")?;
        let seed = match args.next() {
            Some(seed) => seed.parse().context("parse seed")?,
            None => 42,
        };
        if let Some(extra) = args.next() {
            anyhow::bail!("Unexpected extra argument: {extra}");
        }
        return Ok(Command::Synthetic {
            measurements,
            dim,
            seed,
        });
    }

    let output = args.next().map(PathBuf::from);
    if let Some(extra) = args.next() {
        anyhow::bail!("Unexpected extra argument: {extra}");
    }
    Ok(Command::Solve {
        problem: PathBuf::from(first),
        output,
    })
}

fn main() -> Result<()> {
    init_logging();
    match parse_args()? {
        Command::Solve { problem, output } => solve(&problem, output.as_deref()),
        Command::Synthetic {
            measurements,
            dim,
            seed,
        } => synthetic(measurements, dim, seed),
    }
}

fn solve(path: &Path, output: Option<&Path>) -> Result<()> {
    let problem = ProblemLoader::from_path(path)?;
    info!(
        "Problem {:?}: {} measurements, signal dimension {}",
        path,
        problem.matrix.nrows(),
        problem.matrix.ncols()
    );

    let config = problem.config.clone().unwrap_or_default();
    let initializer = SpectralInitializer::new(config);
    let outcome = initializer
        .initialize(&problem.operator(), &problem.measurements)
        .with_context(|| format!("spectral initialization for {:?}", path))?;

    info!(
        "Eigenvalue {:.6e} ({} applications, residual {:.3e}), excluded {} measurements",
        outcome.eigenvalue,
        outcome.iterations,
        outcome.residual,
        outcome.mask.excluded_count()
    );

    let correlation = report_correlation(&problem, &outcome.estimate);

    if let Some(output) = output {
        EstimateWriter::write_to_path(&outcome, correlation, output)
            .with_context(|| format!("write estimate to {:?}", output))?;
        info!("Wrote estimate to {:?}", output);
    }
    Ok(())
}

fn report_correlation(problem: &Problem, estimate: &CVector) -> Option<f64> {
    let reference = problem.signal.as_ref()?;
    let report = CorrelationCheck::assess(estimate, reference, CORRELATION_THRESHOLD);
    if report.passes {
        info!("Correlation with reference {:.6}", report.correlation);
    } else {
        warn!(
            "Correlation with reference below threshold:\n{}",
            report.explanation.trim_end()
        );
    }
    Some(report.correlation)
}

fn synthetic(measurements: usize, dim: usize, seed: u64) -> Result<()> {
    let problem = SyntheticProblem::generate(&SyntheticConfig {
        measurements,
        dim,
        seed: Some(seed),
        ..SyntheticConfig::default()
    })?;
    let operator = problem.operator();

    for truncated in [false, true] {
        let config = InitConfig {
            truncated,
            verbose: false,
            ..InitConfig::default()
        };
        let initializer = SpectralInitializer::new(config);
        let outcome = initializer
            .initialize(&operator, &problem.measurements)
            .with_context(|| format!("spectral initialization (truncated={truncated})"))?;
        let report =
            CorrelationCheck::assess(&outcome.estimate, &problem.signal, CORRELATION_THRESHOLD);
        info!(
            "m={} n={} truncated={}: correlation {:.6}, scale {:.6}, kept {}/{}, {:?}",
            measurements,
            dim,
            truncated,
            report.correlation,
            outcome.scale.unwrap_or(1.0),
            outcome.mask.included_count(),
            outcome.mask.len(),
            outcome.elapsed
        );
        if let Ok(fit) = ScaleFit::fit(
            &magnitudes(&problem, &outcome.estimate),
            &problem.measurements,
            &outcome.mask,
        ) {
            let scale_report =
                ScaleFitCheck::assess(&fit, &ScaleFitCheck::default_probes(&fit), 1e-9);
            if !scale_report.optimal {
                warn!("Scale fit check failed:\n{}", scale_report.explanation.trim_end());
            }
        }
    }
    Ok(())
}

fn magnitudes(problem: &SyntheticProblem, estimate: &CVector) -> Vec<f64> {
    (&problem.matrix * estimate).iter().map(|v| v.norm()).collect()
}
