//! Research command implementation
//!
//! Drives a run from the terminal. In interactive mode each clarification
//! question is read from `input`; an empty line leaves it unanswered.

use super::output::Output;
use crate::research::ResearchHost;
use crate::types::{AppError, Result, RunEvent, RunResult, RunStage, StartOptions};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::broadcast::error::RecvError;

pub struct ResearchOptions {
    pub interactive: bool,
    pub generate_artifact: bool,
}

pub async fn run<R>(
    host: &ResearchHost,
    run_id: &str,
    query: &str,
    options: ResearchOptions,
    input: R,
    output: &Output,
) -> Result<RunResult>
where
    R: AsyncBufRead + Unpin,
{
    let progress = spawn_progress(host, run_id, output.colored);
    let result = drive(host, run_id, query, &options, input, output).await;
    progress.abort();
    result
}

async fn drive<R>(
    host: &ResearchHost,
    run_id: &str,
    query: &str,
    options: &ResearchOptions,
    input: R,
    output: &Output,
) -> Result<RunResult>
where
    R: AsyncBufRead + Unpin,
{
    if !options.interactive {
        output.info("Researching without clarifications");
        return host
            .run_direct(run_id, query, options.generate_artifact)
            .await;
    }

    output.info("Checking whether the query needs clarification");
    let status = host
        .start_research(
            run_id,
            query,
            StartOptions {
                use_clarifications: true,
                generate_artifact: options.generate_artifact,
            },
        )
        .await?;

    if status.stage != RunStage::AwaitingClarifications {
        return host.wait_for_result(run_id).await;
    }

    output.header("A few questions first");
    let total = status.clarification_questions.len();
    let mut lines = input.lines();
    for (index, question) in status.clarification_questions.iter().enumerate() {
        output.question(index + 1, total, question);
        let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to read answer: {}", e)))?
        else {
            output.newline();
            output.warning("No more input, continuing with the answers given");
            break;
        };

        let answer = line.trim();
        if answer.is_empty() {
            continue;
        }
        host.provide_single_clarification(run_id, index, answer)
            .await?;
    }

    output.newline();
    output.info("Researching");
    host.complete_clarifications(run_id).await
}

/// Print search progress for `run_id` until aborted
fn spawn_progress(host: &ResearchHost, run_id: &str, colored: bool) -> tokio::task::JoinHandle<()> {
    let mut events = host.subscribe();
    let run_id = run_id.to_string();
    let output = if colored {
        Output::new()
    } else {
        Output::no_color()
    };

    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(RunEvent::SearchProgress {
                    run_id: id,
                    completed,
                    total,
                }) if id == run_id => output.progress(completed, total, "searches completed"),
                Ok(RunEvent::StageChanged { run_id: id, stage }) if id == run_id => {
                    tracing::debug!(run_id = %id, stage = %stage, "Stage changed")
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Print a finished run
pub fn print_result(result: &RunResult, output: &Output) {
    output.header("Summary");
    output.block(&result.report.short_summary);

    output.header("Report");
    output.block(&result.report.markdown_report);

    if !result.report.follow_up_questions.is_empty() {
        output.header("Follow-up questions");
        for question in &result.report.follow_up_questions {
            output.list_item(question);
        }
    }

    if let Some(artifact) = &result.artifact {
        output.newline();
        match (&artifact.file_path, &artifact.error_message) {
            (Some(path), _) if artifact.success => output.success(&format!("Artifact written to {}", path)),
            (_, Some(message)) => output.warning(&format!("Artifact not generated: {}", message)),
            _ => output.warning("Artifact not generated"),
        }
    }
}
