use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use legal::{run, Config};
use tracing::debug;

/// Runs a program written in the legal language. Every program opens with
/// BEGIN_LICENSE_AGREEMENT and closes with END_LICENSE_AGREEMENT.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Source file to execute. `.lspl` is tried when the path does not exist.
    path: PathBuf,

    /// Passes a legal loophole may make before it is cut off.
    #[arg(long, default_value_t = 10_000)]
    max_iterations: usize,

    /// How deeply statutes may invoke one another.
    #[arg(long, default_value_t = 256)]
    max_depth: usize,

    /// Print the token stream instead of running.
    #[arg(long, conflicts_with = "ast")]
    tokens: bool,

    /// Print the parsed statement tree instead of running.
    #[arg(long)]
    ast: bool,

    /// Log interpreter activity to standard error.
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let fallback = if verbose { "legal=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_level(true),
        )
        .with(filter)
        .init();
}

fn execute(args: &Args) -> anyhow::Result<()> {
    if args.tokens || args.ast {
        let (_, source) = run::read_source(&args.path)?;
        let dump = if args.tokens {
            run::dump_tokens(&source)?
        } else {
            run::dump_ast(&source)?
        };
        let mut stdout = io::stdout().lock();
        stdout
            .write_all(dump.as_bytes())
            .and_then(|()| stdout.flush())
            .context("failed to write to standard output")?;
        return Ok(());
    }

    let config = Config {
        max_loop_iterations: args.max_iterations,
        max_call_depth: args.max_depth,
        ..Config::default()
    };
    let flow = run::run_file(&args.path, config)?;
    io::stdout()
        .flush()
        .context("failed to flush standard output")?;
    debug!(?flow, path = %args.path.display(), "court adjourned");
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match execute(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{}", error);
            let code = error
                .downcast_ref::<legal::Error>()
                .map_or(1, legal::Error::exit_code);
            ExitCode::from(code)
        }
    }
}
