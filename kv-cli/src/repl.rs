//! The interactive read-eval-print loop: reads one line at a time with
//! history and keyword completion, hands it to the [`Facade`], and prints
//! the result or a `(error)`-prefixed message.

use std::sync::Arc;

use colored::Colorize;
use kv::engine::Engine;
use rustyline::config::Builder;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{CompletionType, Editor};

use crate::facade::Facade;
use crate::rusty::CliHelper;

const DEFAULT_PROMPT: &str = "kvcli";

const KEYWORDS: &[&str] = &["BEGIN", "COMMIT", "ABORT", "GET", "SET", "DELETE", "VACUUM"];

fn history_path() -> String {
    format!("{}/.kvcli_history", std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
}

pub fn run(engine: Arc<Engine>) {
    let mut facade = Facade::new(engine);

    let config = Builder::new().completion_prompt_limit(5).completion_type(CompletionType::Circular).build();
    let mut rl = Editor::<CliHelper, DefaultHistory>::with_config(config).expect("failed to initialize the line editor");

    let keywords = Arc::new(KEYWORDS.iter().map(|s| s.to_string()).collect::<Vec<_>>());
    rl.set_helper(Some(CliHelper::with_keywords(keywords)));
    let _ = rl.load_history(&history_path());

    println!("Welcome to kvcli.");
    println!();

    loop {
        let prompt = if facade.has_open_transaction() { format!("{DEFAULT_PROMPT} (tx) > ") } else { format!("{DEFAULT_PROMPT} > ") };
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);
                if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
                    break;
                }
                match facade.execute(line) {
                    Ok(output) => println!("{}", output.green()),
                    Err(e) => eprintln!("{}", format!("(error) {e}").red()),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("io err: {e}");
                break;
            }
        }
    }

    println!("Bye~");
    let _ = rl.save_history(&history_path());
}

/// Runs every line from `reader` non-interactively, printing each result (or
/// error) as it goes. Returns an error only if the reader itself failed.
pub fn run_reader<R: std::io::BufRead>(engine: Arc<Engine>, reader: R) -> std::io::Result<()> {
    let mut facade = Facade::new(engine);
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match facade.execute(line) {
            Ok(output) => println!("{output}"),
            Err(e) => eprintln!("(error) {e}"),
        }
    }
    Ok(())
}
