use std::io::{stdin, IsTerminal};
use std::panic;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use kv::config::Config;
use kv::engine::Engine;
use kvcli::{repl, trace};
use tracing::info;

#[derive(Debug, Parser)]
#[command(version, author, about)]
struct Args {
    /// Configuration file path; defaults to the engine's built-in tunables.
    #[clap(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Force non-interactive mode: read commands from stdin (or `--query`)
    /// and exit instead of starting the REPL.
    #[clap(short = 'n', long, default_value_t = false)]
    non_interactive: bool,

    /// A single query to run non-interactively, then exit.
    #[clap(long)]
    query: Option<String>,

    #[clap(short = 'l', long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    setup_panic_hook();

    eprintln!();
    eprintln!("██  ██  █        █");
    eprintln!("██ ██   ██      ██");
    eprintln!("███      ██    ██");
    eprintln!("██ ██     ██  ██");
    eprintln!("██  ██     ████  KV Storage CLI");
    eprintln!();

    let args = Args::parse();

    let log_dir = format!("{}/.kvcli", std::env::var("HOME").unwrap_or_else(|_| ".".to_string()));
    let _guard = trace::init_logging(&log_dir, &args.log_level)?;

    let cfg = Config::load(args.config.as_deref())?;
    info!(?cfg, "kvcli starting");

    let engine = Engine::open(&cfg)?;

    let shutdown_engine = engine.clone();
    ctrlc::set_handler(move || {
        let _ = shutdown_engine.close();
        std::process::exit(130);
    })
    .expect("failed to install the Ctrl-C handler");

    let is_repl = stdin().is_terminal() && !args.non_interactive && args.query.is_none();

    let result = if is_repl {
        repl::run(engine.clone());
        Ok(())
    } else {
        match &args.query {
            Some(query) => repl::run_reader(engine.clone(), std::io::Cursor::new(query.clone())),
            None => repl::run_reader(engine.clone(), stdin().lock()),
        }
    };

    engine.close()?;
    result?;
    Ok(())
}

fn setup_panic_hook() {
    let meta = human_panic::Metadata {
        version: env!("CARGO_PKG_VERSION").into(),
        name: env!("CARGO_PKG_NAME").into(),
        authors: env!("CARGO_PKG_AUTHORS").replace(':', ", ").into(),
        homepage: "".into(),
    };

    let default_hook = panic::take_hook();
    if std::env::var("RUST_BACKTRACE").is_err() {
        panic::set_hook(Box::new(move |info: &panic::PanicInfo| {
            default_hook(info);
            let file_path = human_panic::handle_dump(&meta, info);
            let _ = human_panic::print_msg(file_path, &meta);
        }));
    }
}
