//! CLI reviewer: prints each pending request and reads decisions from stdin.

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

use crate::agent::submission::{Submission, SubmissionParser};
use crate::approval::{format_request, ApprovalDecision, ApprovalRequest};
use crate::channels::Reviewer;
use crate::error::ApprovalError;

const HELP: &str = "\
  approve | yes | 1     execute the action as proposed
  edit | 2              then enter replacement arguments as a JSON object
  edit {json}           edit in one line
  reject | no | 3       skip the action; the task continues without it
  quit                  stop and checkpoint the session";

/// Reads decisions line by line from any async reader. Stdin by default.
pub struct CliReviewer<R = BufReader<Stdin>> {
    lines: Mutex<Lines<R>>,
}

impl CliReviewer {
    pub fn new() -> Self {
        Self::from_reader(BufReader::new(tokio::io::stdin()))
    }
}

impl Default for CliReviewer {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: AsyncBufRead + Unpin + Send> CliReviewer<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            lines: Mutex::new(reader.lines()),
        }
    }

    /// Next non-empty line, or `None` at EOF.
    async fn read_line(&self, prompt: &str) -> Option<String> {
        let mut lines = self.lines.lock().await;
        loop {
            eprint!("{prompt}");
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim().to_string();
                    if !line.is_empty() {
                        return Some(line);
                    }
                }
                Ok(None) => return None,
                Err(e) => {
                    tracing::error!("Error reading stdin: {}", e);
                    return None;
                }
            }
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> Reviewer for CliReviewer<R> {
    async fn review(&self, request: &ApprovalRequest) -> Option<ApprovalDecision> {
        println!("\n{}", format_request(request));

        loop {
            let line = self.read_line("decision> ").await?;
            match SubmissionParser::parse(&line) {
                Submission::Decision(decision) => return Some(decision),
                Submission::Addressed {
                    request_id,
                    decision,
                } => {
                    if request_id == request.id {
                        return Some(decision);
                    }
                    eprintln!(
                        "Decision is for request {}, but {} is pending",
                        request_id, request.id
                    );
                }
                Submission::EditRequested => {
                    let args = self.read_line("edited arguments (JSON)> ").await?;
                    return Some(SubmissionParser::parse_edited_args(&args));
                }
                Submission::Quit => return None,
                Submission::Help => eprintln!("{HELP}"),
                Submission::Unrecognized { content } => {
                    eprintln!("Unrecognized input {:?}. Type 'help' for options.", content);
                }
            }
        }
    }

    async fn decision_refused(&self, request: &ApprovalRequest, error: &ApprovalError) {
        eprintln!("⚠️  Decision on {} not applied: {}", request.id, error);
    }
}
