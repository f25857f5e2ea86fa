//! textai: terminal front end for the text AI relay.
//! Reads config, builds the relay for this process's mode, then submits either
//! the question given on the command line or each line read from stdin, and
//! prints the transcript to stdout.

use clap::Parser;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use textai_client::config::{self, ProviderSettings, RelayMode};
use textai_client::transcript::{Message, Submission, SubmitOutcome, PROCESSING_TEXT};
use textai_client::{build_relay, TranscriptController};
use tokio::io::{AsyncBufReadExt, BufReader};

const HEADER: &str = "Minimalist Text AI Interface [CLI v1.0]";

#[derive(Parser, Debug)]
#[command(name = "textai", version, about = "Chat with a hosted model from the terminal")]
struct Args {
    /// Config file (default: $TEXTAI_CONFIG, then ~/.textai/config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Relay mode: `direct` (needs API_KEY) or `proxied`
    #[arg(short, long)]
    mode: Option<RelayMode>,

    /// Intermediary endpoint for proxied mode
    #[arg(long)]
    endpoint: Option<String>,

    /// Ask a single question and exit
    question: Vec<String>,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    let mut cfg = match config::load_or_default(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(endpoint) = args.endpoint {
        cfg.relay.endpoint = Some(endpoint);
    }
    let mode = args.mode.or(cfg.relay.mode).unwrap_or_default();
    let settings = ProviderSettings::from_env(&cfg);
    tracing::debug!(%mode, ?settings, "starting relay");

    let relay = match build_relay(mode, &cfg, &settings) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Single-threaded: the relay call is the only suspension point.
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let controller = TranscriptController::new(relay);
    let question = args.question.join(" ");
    let failed = if question.is_empty() {
        rt.block_on(run_session(controller))
    } else {
        rt.block_on(run_once(controller, &question))
    };

    match failed {
        Ok(false) => ExitCode::SUCCESS,
        Ok(true) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn print_message(message: &Message) -> io::Result<()> {
    let mut out = io::stdout().lock();
    writeln!(out, "{message}")?;
    out.flush()
}

/// Submit one prompt, printing entries as they are appended.
/// Returns whether the reply was an error.
async fn submit(
    controller: &mut TranscriptController,
    prompt: &str,
    echo_prompt: bool,
) -> io::Result<Option<bool>> {
    let pending = match controller.begin(prompt) {
        Submission::Accepted(pending) => pending,
        Submission::Empty | Submission::Busy => return Ok(None),
    };
    if echo_prompt {
        if let Some(user) = controller.transcript().last() {
            print_message(user)?;
        }
    }

    let indicator = io::stderr().is_terminal();
    if indicator {
        eprint!("{PROCESSING_TEXT}");
    }
    let result = controller.dispatch(&pending).await;
    if indicator {
        eprint!("\r\x1b[2K");
    }

    let outcome = controller.complete(pending, result);
    if let Some(reply) = controller.transcript().last() {
        print_message(reply)?;
    }
    Ok(Some(matches!(outcome, SubmitOutcome::Failed(_))))
}

async fn run_once(mut controller: TranscriptController, question: &str) -> io::Result<bool> {
    match submit(&mut controller, question, true).await? {
        Some(failed) => Ok(failed),
        None => {
            eprintln!("Error: no question provided");
            Ok(true)
        }
    }
}

async fn run_session(mut controller: TranscriptController) -> io::Result<bool> {
    let interactive = io::stdin().is_terminal();
    if interactive {
        println!("{HEADER}");
    }
    if let Some(banner) = controller.transcript().last() {
        print_message(banner)?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut any_failed = false;
    loop {
        if interactive {
            print!("> ");
            io::stdout().flush()?;
        }
        let Some(line) = lines.next_line().await? else {
            break;
        };
        // Interactive users already see what they typed.
        if let Some(failed) = submit(&mut controller, &line, !interactive).await? {
            any_failed |= failed;
        }
    }
    Ok(any_failed)
}
