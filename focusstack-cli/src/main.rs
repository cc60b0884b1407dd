//! Command-line front end for the focus stacking pipeline.

use clap::Parser;
use focusstack::pipeline::{run_stack, StackOptions};
use focusstack::worker::ErrorPolicy;
use focusstack::{Logger, TracingLogger};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

/// Combine photos focused at different depths into one sharp image.
#[derive(Parser, Debug)]
#[command(name = "focusstack", version, about)]
struct Cli {
    /// Input images, in stacking order.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output file; ":memory:" composes without writing anything.
    #[arg(long, default_value = "output.jpg")]
    output: String,

    /// JPEG output quality, 0-100.
    #[arg(long, default_value_t = 95, value_parser = clap::value_parser!(u8).range(0..=100))]
    jpgquality: u8,

    /// Keep the full frame instead of cropping to the common content area.
    #[arg(long)]
    nocrop: bool,

    /// Seconds to wait for input files that do not exist yet.
    #[arg(long, default_value_t = 0)]
    wait_images: u64,

    /// Worker threads; 0 uses the machine's parallelism.
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// Maximum concurrent tasks on the GPU-accelerated path.
    #[arg(long, default_value_t = 1)]
    opencl_max: usize,

    /// Mark dependents of a failed task as failed instead of running them.
    #[arg(long)]
    skip_dependents: bool,

    /// Also write the log to this file, truncated at startup.
    #[arg(long)]
    logfile: Option<PathBuf>,

    /// Verbose per-task diagnostics.
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(cli: &Cli) -> Result<focusstack::logging::LogGuard, std::io::Error> {
    let level = if cli.verbose { "debug" } else { "info" };
    match &cli.logfile {
        None => Ok(focusstack::logging::init_console(level)),
        Some(path) => {
            let dir = match path.parent() {
                Some(p) if !p.as_os_str().is_empty() => p,
                _ => std::path::Path::new("."),
            };
            let file = path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_else(|| "focusstack.log".to_string());
            focusstack::logging::init_with_file(level, dir, &file)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = match init_logging(&cli) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("could not open log file: {err}");
            return ExitCode::FAILURE;
        }
    };

    let options = StackOptions {
        inputs: cli.inputs,
        output: cli.output,
        jpgquality: cli.jpgquality,
        nocrop: cli.nocrop,
        wait_images: Duration::from_secs(cli.wait_images),
        threads: cli.threads,
        opencl_cap: cli.opencl_max,
        error_policy: if cli.skip_dependents {
            ErrorPolicy::SkipDependents
        } else {
            ErrorPolicy::ContinueOnError
        },
    };

    let logger: Arc<dyn Logger> = Arc::new(TracingLogger);
    match run_stack(&options, &logger) {
        Ok(report) => {
            tracing::info!(output = %report.output, tasks = report.tasks, "stack complete");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(%err, "stacking failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_minimal_invocation() {
        let cli = Cli::parse_from(["focusstack", "a.jpg", "b.jpg"]);
        assert_eq!(cli.inputs.len(), 2);
        assert_eq!(cli.output, "output.jpg");
        assert_eq!(cli.jpgquality, 95);
        assert!(!cli.nocrop);
        assert_eq!(cli.opencl_max, 1);
    }

    #[test]
    fn test_cli_requires_inputs() {
        assert!(Cli::try_parse_from(["focusstack"]).is_err());
    }

    #[test]
    fn test_logfile_option_initializes_file_logging() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");
        let cli = Cli::parse_from([
            "focusstack",
            "a.jpg",
            "--logfile",
            path.to_str().unwrap(),
        ]);

        assert_eq!(cli.logfile.as_deref(), Some(path.as_path()));
        let _guard = init_logging(&cli).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_cli_rejects_out_of_range_quality() {
        assert!(Cli::try_parse_from(["focusstack", "a.jpg", "--jpgquality", "150"]).is_err());
    }
}
