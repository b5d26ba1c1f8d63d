use restartlr::{
    get_schedulers_with, load_states, parse_arguments, read_snapshots, run_schedule, save_states,
    synthetic_metrics, write_snapshots, ParamGroups, Result, RunOptions, SchedulerConfig,
    SchedulerError,
};
use std::time::Instant;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log to stderr so the rate table on stdout stays machine-readable
fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn load_metrics(options: &RunOptions) -> Result<Vec<f64>> {
    match &options.metrics {
        Some(path) => std::fs::read_to_string(path)?
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| {
                line.parse::<f64>().map_err(|e| {
                    SchedulerError::Configuration(format!("bad metric value {line:?}: {e}"))
                })
            })
            .collect(),
        None => synthetic_metrics(options.steps, 0.02, options.seed),
    }
}

fn run(options: &RunOptions) -> Result<()> {
    let config = SchedulerConfig::from_json_file(&options.config)?;
    let mut optimizers = vec![ParamGroups::new(options.base_rates.clone()); options.optimizers];

    let root = tracing::info_span!("run", scheme = %config.effective_scheme());
    let mut schedulers = get_schedulers_with(&optimizers, &config, &root)?;

    if let Some(path) = &options.resume {
        load_states(&mut schedulers, &read_snapshots(path)?)?;
        tracing::info!(path = %path.display(), "resumed scheduler state");
    }

    let metrics = if schedulers.iter().any(|s| s.is_reactive()) {
        Some(load_metrics(options)?)
    } else {
        None
    };

    let records = run_schedule(
        &mut schedulers,
        &mut optimizers,
        options.steps,
        metrics.as_deref(),
    )?;

    let mut header = vec!["step".to_string()];
    for (optimizer, rates) in schedulers.iter().map(|s| s.current_rates()).enumerate() {
        header.extend((0..rates.len()).map(|group| format!("opt{optimizer}_group{group}")));
    }
    println!("{}", header.join(","));

    for record in records.iter().filter(|r| r.step as usize % options.every == 0) {
        let rates: Vec<String> = record
            .rates
            .iter()
            .flatten()
            .map(|lr| format!("{lr:.6e}"))
            .collect();
        println!("{},{}", record.step, rates.join(","));
    }

    if let Some(path) = &options.save_state {
        write_snapshots(path, &save_states(&schedulers))?;
        tracing::info!(path = %path.display(), "saved scheduler state");
    }

    Ok(())
}

fn main() {
    let start = Instant::now();
    init_logging();

    let options = match parse_arguments() {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&options) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }

    tracing::info!(elapsed = ?start.elapsed(), "done");
}
