//! Default command - answers one question and exits

use std::fmt::Write as _;
use std::process::ExitCode;

use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::AppConfig;
use crate::domain::workflow::{RunFailure, RunOutcome, RunResult};

const DETAIL_PREVIEW_ROWS: usize = 20;

#[derive(Debug, Args)]
pub struct AskArgs {
    /// Print the SQL, the rows and the step trace along with the answer
    #[arg(long)]
    pub details: bool,

    /// Print the whole run result as JSON
    #[arg(long, conflicts_with = "details")]
    pub json: bool,

    /// The question, e.g. "Which artist has the most albums?"
    #[arg(required = true, num_args = 1..)]
    pub words: Vec<String>,
}

impl AskArgs {
    pub fn question(&self) -> String {
        self.words.join(" ")
    }
}

/// Answer the question; Ctrl+C cancels the run
pub async fn run(args: AskArgs, config: &AppConfig) -> anyhow::Result<ExitCode> {
    let agent = crate::build_agent(config).await?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, cancelling run");
            on_interrupt.cancel();
        }
    });

    let result = agent.orchestrator.run(&args.question(), cancel, None).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", render(&result, args.details));
    }

    Ok(ExitCode::from(exit_code(&result)))
}

/// 0 answered/rejected/clarification, 2 retries exhausted, 1 collaborator down, 130 cancelled
pub fn exit_code(result: &RunResult) -> u8 {
    match result.outcome {
        RunOutcome::Answered | RunOutcome::Rejected | RunOutcome::Clarification => 0,
        RunOutcome::Cancelled => 130,
        RunOutcome::Failed => match result.failure {
            Some(RunFailure::RetryExhausted { .. }) => 2,
            _ => 1,
        },
    }
}

fn render(result: &RunResult, details: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", result.final_answer);

    if !details {
        return out;
    }

    if let Some(sql) = &result.sql {
        let _ = writeln!(out, "\nSQL ({} attempt(s)):\n{}", result.attempt_count, sql);
    }

    if let Some(rows) = &result.rows {
        let _ = writeln!(
            out,
            "\nRows ({}{}):\n{}",
            rows.row_count,
            if rows.truncated { ", truncated" } else { "" },
            rows.preview(DETAIL_PREVIEW_ROWS)
        );
    }

    if let Some(chart) = &result.chart {
        let _ = writeln!(
            out,
            "\nChart: {:?} of {} by {}",
            chart.kind,
            chart.y.join(", "),
            chart.x
        );
    }

    let _ = writeln!(out, "\nTrace:");
    for (i, entry) in result.trace.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>3}. [{}] {} -> {}",
            i + 1,
            entry.step.name(),
            entry.input_summary,
            entry.output_summary
        );
    }

    out
}
