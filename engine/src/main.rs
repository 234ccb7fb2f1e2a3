//! `ink`: session lifecycle for git-backed book writing.
//!
//! Every command prints exactly one JSON document on stdout. Diagnostics and
//! error chains go to stderr.

use std::io::{BufRead, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;

use ink_engine::advance::advance_chapter;
use ink_engine::close::{CloseRequest, close_session};
use ink_engine::complete::complete_book;
use ink_engine::error::{EngineError, find_engine_error};
use ink_engine::open::open_session;
use ink_engine::rollback::rollback;
use ink_engine::status::book_status;
use ink_engine::{exit_codes, logging};

#[derive(Parser)]
#[command(
    name = "ink",
    version,
    about = "Session lifecycle engine for git-backed book writing"
)]
struct Cli {
    /// Book repository root.
    #[arg(long, global = true, default_value = ".")]
    repo: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sync, take the session lock, snapshot and print the session context.
    Open,
    /// Persist generated content (read from stdin) and release the lock.
    Close {
        /// One-paragraph session summary for the narrative log.
        #[arg(long)]
        summary: Option<String>,
        /// File edited outside the engine during the session (repeatable).
        #[arg(long = "external-edit", value_name = "PATH")]
        external_edits: Vec<String>,
    },
    /// Seal the book once no author directives remain.
    Complete,
    /// Move to the next chapter when its outline exists.
    Advance,
    /// Reset both branches to the latest session snapshot (destructive).
    Rollback {
        /// Skip the interactive confirmation.
        #[arg(short, long)]
        yes: bool,
    },
    /// Print progress, lock and completion state without touching git.
    Status,
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    let code = match run(&cli) {
        Ok(code) => code,
        Err(err) => report_error(&err),
    };
    std::process::exit(code);
}

fn run(cli: &Cli) -> Result<i32> {
    let root = cli.repo.as_path();
    let now = Utc::now();
    match &cli.command {
        Command::Open => {
            let payload = open_session(root, now)?;
            let code = if payload.kill_requested {
                exit_codes::KILLED
            } else if payload.session_already_run {
                exit_codes::LOCKED
            } else {
                exit_codes::OK
            };
            print_json(&payload)?;
            Ok(code)
        }
        Command::Close {
            summary,
            external_edits,
        } => {
            let request = CloseRequest {
                content: read_stdin()?,
                summary: summary.clone(),
                external_edits: external_edits.clone(),
            };
            print_json(&close_session(root, &request, now)?)?;
            Ok(exit_codes::OK)
        }
        Command::Complete => {
            print_json(&complete_book(root, now)?)?;
            Ok(exit_codes::OK)
        }
        Command::Advance => {
            print_json(&advance_chapter(root)?)?;
            Ok(exit_codes::OK)
        }
        Command::Rollback { yes } => {
            let confirmed = *yes || confirm_rollback(root)?;
            print_json(&rollback(root, confirmed, now)?)?;
            Ok(exit_codes::OK)
        }
        Command::Status => {
            print_json(&book_status(root, now)?)?;
            Ok(exit_codes::OK)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value).context("serialize payload")?;
    println!("{payload}");
    Ok(())
}

fn read_stdin() -> Result<String> {
    let mut content = String::new();
    std::io::stdin()
        .read_to_string(&mut content)
        .context("read session content from stdin")?;
    Ok(content)
}

/// Ask on the terminal; anything but `y`/`yes` declines. Without a terminal
/// there is nobody to ask.
fn confirm_rollback(root: &Path) -> Result<bool> {
    let stdin = std::io::stdin();
    if !stdin.is_terminal() {
        return Ok(false);
    }
    let mut stderr = std::io::stderr();
    write!(
        stderr,
        "Roll back {} to the latest snapshot? Later commits are discarded on the remote too. [y/N] ",
        root.display()
    )
    .context("write prompt")?;
    stderr.flush().context("flush prompt")?;

    let mut answer = String::new();
    stdin
        .lock()
        .read_line(&mut answer)
        .context("read confirmation")?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn report_error(err: &anyhow::Error) -> i32 {
    eprintln!("{err:#}");
    let engine_err = find_engine_error(err);
    let kind = engine_err.map_or("internal", EngineError::kind);
    let message = engine_err.map_or_else(|| err.to_string(), ToString::to_string);
    println!(
        "{}",
        json!({ "status": "error", "kind": kind, "error": message })
    );
    match engine_err {
        Some(EngineError::LockConflict { .. }) => exit_codes::LOCKED,
        _ => exit_codes::FAILED,
    }
}
