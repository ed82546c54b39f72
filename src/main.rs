use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

const MIN_BUFFER_MB: u32 = 1;
const MAX_BUFFER_MB: u32 = 1024;
const MIN_THREADS: usize = 1;
const MAX_THREADS: usize = 1024;
const DEFAULT_BUFFER_MB: u32 = 128;

/// Sort a text file of signed 32-bit integers (one per line) in place,
/// spilling to disk when the file is larger than the memory budget.
#[derive(Parser, Debug)]
#[command(name = "filesort", version, about)]
struct Cli {
    /// Path to the text file to sort in place
    filename: PathBuf,

    /// Memory budget for the shared chunk buffer, in mebibytes (1-1024)
    #[arg(short = 'b', long = "buffer-size", default_value_t = DEFAULT_BUFFER_MB, value_parser = parse_buffer_mb)]
    buffer_size: u32,

    /// Worker threads used to sort each in-memory chunk (1-1024).
    /// Defaults to the number of online CPUs.
    #[arg(short = 't', long = "threads", value_parser = parse_threads)]
    threads: Option<usize>,

    /// Increase log verbosity (-v for info, -vv for debug)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_buffer_mb(s: &str) -> Result<u32, String> {
    let value: u32 = s.parse().map_err(|_| format!("not a valid integer: {s}"))?;
    if (MIN_BUFFER_MB..=MAX_BUFFER_MB).contains(&value) {
        Ok(value)
    } else {
        Err(format!(
            "buffer size must be between {MIN_BUFFER_MB} and {MAX_BUFFER_MB} MiB, got {value}"
        ))
    }
}

fn parse_threads(s: &str) -> Result<usize, String> {
    let value: usize = s.parse().map_err(|_| format!("not a valid integer: {s}"))?;
    if (MIN_THREADS..=MAX_THREADS).contains(&value) {
        Ok(value)
    } else {
        Err(format!(
            "thread count must be between {MIN_THREADS} and {MAX_THREADS}, got {value}"
        ))
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let threads = cli.threads.unwrap_or_else(|| {
        let n = num_cpus::get();
        if n == 0 {
            1
        } else {
            n.min(MAX_THREADS)
        }
    });

    let buffer_bytes = cli.buffer_size.saturating_mul(1024 * 1024);

    let result = run(&cli.filename, buffer_bytes, threads);
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("filesort: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(path: &PathBuf, buffer_bytes: u32, threads: usize) -> anyhow::Result<()> {
    if !path.is_file() {
        anyhow::bail!("{}: no such file", path.display());
    }
    filesort::sort(path, buffer_bytes, threads)
        .with_context(|| format!("sorting {}", path.display()))
}
