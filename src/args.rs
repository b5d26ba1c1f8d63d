use clap::{error::ErrorKind, Parser};
use std::path::PathBuf;

/// Prints the learning rate schedule described by a training options file.
#[derive(Parser, Debug)]
#[command(name = "restartlr")]
struct Args {
    /// Path to the JSON options file holding the scheduler configuration
    #[arg(long, value_parser = validate_json_file)]
    config: PathBuf,

    /// Number of scheduler steps to run
    #[arg(long)]
    steps: usize,

    /// Base learning rate of each parameter group of an optimizer
    #[arg(long = "base-lr", num_args = 1.., default_values_t = vec![1e-4])]
    base_lr: Vec<f64>,

    /// Number of optimizers sharing the schedule, e.g. 2 for generator and discriminator
    #[arg(long, default_value_t = 1)]
    optimizers: usize,

    /// Text file with one monitored metric per line, for ReduceLROnPlateau
    #[arg(long, value_parser = validate_file)]
    metrics: Option<PathBuf>,

    /// Scheduler state to resume from
    #[arg(long, value_parser = validate_json_file)]
    resume: Option<PathBuf>,

    /// Where to write the scheduler state after the last step
    #[arg(long)]
    save_state: Option<PathBuf>,

    /// Seed of the synthetic metric stream used when no metrics file is given
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Print every n-th step only
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    every: u64,
}

#[derive(Debug)]
pub struct RunOptions {
    pub config: PathBuf,
    pub steps: usize,
    pub base_rates: Vec<f64>,
    pub optimizers: usize,
    pub metrics: Option<PathBuf>,
    pub resume: Option<PathBuf>,
    pub save_state: Option<PathBuf>,
    pub seed: u64,
    pub every: usize,
}

/// Validates that a path points to an existing file
fn validate_file(path: &str) -> Result<PathBuf, clap::Error> {
    let path = PathBuf::from(path);
    if !path.exists() {
        return Err(clap::Error::raw(
            ErrorKind::InvalidValue,
            format!("File not found: {}", path.display()),
        ));
    }
    if !path.is_file() {
        return Err(clap::Error::raw(
            ErrorKind::InvalidValue,
            format!("Not a file: {}", path.display()),
        ));
    }
    Ok(path)
}

/// Validates that a path points to an existing JSON file
fn validate_json_file(path: &str) -> Result<PathBuf, clap::Error> {
    let path = validate_file(path)?;
    if path.extension().and_then(|s| s.to_str()) != Some("json") {
        return Err(clap::Error::raw(
            ErrorKind::InvalidValue,
            format!("File must be a JSON file: {}", path.display()),
        ));
    }
    Ok(path)
}

/// Parses and validates command line arguments
pub fn parse_arguments() -> Result<RunOptions, clap::Error> {
    let args = Args::parse();

    if args.optimizers == 0 {
        return Err(clap::Error::raw(
            ErrorKind::InvalidValue,
            "At least one optimizer is required",
        ));
    }
    if let Some(rate) = args.base_lr.iter().find(|r| !r.is_finite() || **r < 0.0) {
        return Err(clap::Error::raw(
            ErrorKind::InvalidValue,
            format!("Base learning rates must be non-negative: {rate}"),
        ));
    }

    Ok(RunOptions {
        config: args.config,
        steps: args.steps,
        base_rates: args.base_lr,
        optimizers: args.optimizers,
        metrics: args.metrics,
        resume: args.resume,
        save_state: args.save_state,
        seed: args.seed,
        every: args.every as usize,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_validate_json_file_rejects_missing() {
        assert!(validate_json_file("/nonexistent/options.json").is_err());
    }

    #[test]
    fn test_validate_json_file_rejects_other_extensions() {
        let path = std::env::temp_dir().join(format!("restartlr-args-{}.yml", std::process::id()));
        std::fs::write(&path, "lr_scheme: Linear").unwrap();

        let result = validate_json_file(path.to_str().unwrap());
        std::fs::remove_file(&path).unwrap();

        assert!(result.is_err());
    }
}
