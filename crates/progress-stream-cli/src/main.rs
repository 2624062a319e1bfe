//! Command-line front end: evaluate, polish, or ingest with live progress.
//!
//! Usage:
//!   progress-stream evaluate --jd-id 3 resume.pdf
//!   progress-stream polish --text "负责后端开发"
//!   progress-stream --json ingest resume.docx

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use progress_stream::prelude::*;
use serde::Serialize;

/// Exit status for a call cancelled with Ctrl-C.
const EXIT_CANCELLED: u8 = 130;

#[derive(Parser)]
#[command(
    name = "progress-stream",
    about = "Stream resume evaluation, text polishing, and resume ingest progress."
)]
struct Cli {
    /// Server root (default: $PROGRESS_STREAM_BASE_URL, then http://localhost:8000).
    #[arg(long, value_name = "URL", global = true)]
    base_url: Option<String>,

    /// Print events and the final value as JSON lines.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate a resume against a job description.
    Evaluate {
        #[arg(long, value_name = "ID")]
        jd_id: u64,
        file: PathBuf,
    },
    /// Polish a piece of text, given inline or read from a file.
    Polish {
        #[arg(long, conflicts_with = "file")]
        text: Option<String>,
        file: Option<PathBuf>,
    },
    /// Upload a PDF or DOCX resume and follow its parsing.
    Ingest { file: PathBuf },
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    progress_stream::init_observability();
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = cli.base_url {
        config = config.base_url(base_url);
    }
    let client = StreamClient::new(config)?;
    let printer = Printer { json: cli.json };

    let code = match cli.command {
        Command::Evaluate { jd_id, file } => {
            let document = read_document(&file).await?;
            let call = client.evaluate(jd_id, document, printer)?;
            settle(call, cli.json, render_evaluation).await?
        }
        Command::Polish { text, file } => {
            let text = match (text, file) {
                (Some(text), _) => text,
                (None, Some(file)) => tokio::fs::read_to_string(&file).await?,
                (None, None) => return Err("provide --text or a FILE to polish".into()),
            };
            let call = client.polish(text, printer)?;
            settle(call, cli.json, String::clone).await?
        }
        Command::Ingest { file } => {
            let document = read_document(&file).await?;
            let call = client.ingest(document, printer)?;
            settle(call, cli.json, render_ingest).await?
        }
    };
    Ok(code)
}

async fn read_document(path: &Path) -> Result<Document, std::io::Error> {
    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Document::new(file_name, bytes))
}

/// Waits for the call, turning Ctrl-C into cancellation.
async fn settle<T: Serialize>(
    call: StreamCall<T>,
    json: bool,
    render: impl FnOnce(&T) -> String,
) -> Result<ExitCode, ClientError> {
    let session_id = call.session_id();
    tracing::debug!(%session_id, "waiting for stream call");
    let abort = call.abort_handle();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            abort.abort();
        }
    });
    let result = call.finish().await;
    ctrl_c.abort();

    match result? {
        StreamOutcome::Completed(value) => {
            if json {
                println!("{}", serde_json::json!({ "result": value }));
            } else {
                println!("{}", render(&value));
            }
            Ok(ExitCode::SUCCESS)
        }
        StreamOutcome::Cancelled => {
            eprintln!("cancelled (session {session_id})");
            Ok(ExitCode::from(EXIT_CANCELLED))
        }
    }
}

fn render_evaluation(evaluation: &Evaluation) -> String {
    let mut out = String::new();
    for step in &evaluation.steps {
        let score = step
            .score
            .map(|s| format!("{s:.1}"))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!("{:>2}. {:<16} {score:>6}\n", step.step, step.name));
    }
    out.push_str(&format!("total: {:.1}", evaluation.total_score()));
    out
}

fn render_ingest(summary: &IngestSummary) -> String {
    match summary.resume_id {
        Some(id) => format!("resume saved (id {id})"),
        None => format!(
            "ingest finished at stage {}",
            summary.last_stage().unwrap_or("unknown")
        ),
    }
}

/// Prints each event as it arrives.
struct Printer {
    json: bool,
}

impl EventSink for Printer {
    fn on_event(&mut self, event: &DomainEvent) {
        if self.json {
            match serde_json::to_string(event) {
                Ok(line) => println!("{line}"),
                Err(err) => tracing::warn!(error = %err, "failed to encode event"),
            }
            return;
        }
        match event {
            DomainEvent::TaskBreakdown(plan) => {
                eprintln!("plan: {} steps", plan.total_steps);
                for step in &plan.steps {
                    eprintln!("  {}. {}", step.id, step.name);
                }
            }
            DomainEvent::StepResult(step) if step.is_complete() => {
                eprintln!("step {} done: {}", step.step, step.reason.as_deref().unwrap_or(""));
            }
            DomainEvent::StepResult(step) => eprintln!("step {} started: {}", step.step, step.name),
            DomainEvent::Progress(notice) => match notice.percent {
                Some(percent) => eprintln!("[{percent:>3.0}%] {}", notice.message),
                None => eprintln!("{}", notice.message),
            },
            DomainEvent::Completion(_) | DomainEvent::StreamError { .. } => {}
        }
    }

    fn on_error(&mut self, message: &str) {
        if self.json {
            println!("{}", serde_json::json!({ "error": message }));
        }
    }
}
