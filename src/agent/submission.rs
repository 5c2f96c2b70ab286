//! Reviewer input parsing.
//!
//! Reviewers answer a pending request with free text (`approve`, `no`,
//! `edit {"path": "..."}`), a menu number, or a structured JSON decision
//! `{"requestId": ..., "decision": "approve|reject|edit", "editedArgs": {...}}`.

use serde::Deserialize;
use uuid::Uuid;

use crate::approval::{ApprovalDecision, DecisionKind};

/// Parses reviewer input into a [`Submission`].
pub struct SubmissionParser;

impl SubmissionParser {
    /// Parse one line of reviewer input.
    pub fn parse(content: &str) -> Submission {
        let trimmed = content.trim();
        let lower = trimmed.to_lowercase();

        match lower.as_str() {
            "yes" | "y" | "approve" | "ok" | "1" => Submission::Decision(ApprovalDecision::Approve),
            "no" | "n" | "reject" | "deny" | "3" => Submission::Decision(ApprovalDecision::Reject),
            "edit" | "e" | "2" => Submission::EditRequested,
            "/quit" | "/exit" | "quit" | "q" => Submission::Quit,
            "/help" | "help" | "?" => Submission::Help,
            _ => parse_edit_inline(trimmed, &lower)
                .or_else(|| parse_json_decision(trimmed))
                .unwrap_or_else(|| Submission::Unrecognized {
                    content: trimmed.to_string(),
                }),
        }
    }

    /// Parse replacement arguments typed after an `edit` prompt.
    ///
    /// Arguments that are not a JSON object fall back to approving the
    /// original action unchanged.
    pub fn parse_edited_args(content: &str) -> ApprovalDecision {
        match serde_json::from_str::<serde_json::Value>(content.trim()) {
            Ok(args) if args.is_object() => ApprovalDecision::Edit { edited_args: args },
            _ => {
                tracing::warn!("Edited arguments are not a JSON object; using original arguments");
                ApprovalDecision::Approve
            }
        }
    }
}

/// `edit {json}` on one line.
fn parse_edit_inline(trimmed: &str, lower: &str) -> Option<Submission> {
    if !lower.starts_with("edit ") {
        return None;
    }
    let args = trimmed.get(5..).unwrap_or_default().trim();
    Some(Submission::Decision(SubmissionParser::parse_edited_args(args)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DecisionMessage {
    request_id: Uuid,
    decision: DecisionKind,
    #[serde(default)]
    edited_args: Option<serde_json::Value>,
}

/// Structured JSON decision addressed to a specific request.
fn parse_json_decision(trimmed: &str) -> Option<Submission> {
    if !trimmed.starts_with('{') {
        return None;
    }
    let message: DecisionMessage = serde_json::from_str(trimmed).ok()?;
    let decision = match (message.decision, message.edited_args) {
        (DecisionKind::Approve, _) => ApprovalDecision::Approve,
        (DecisionKind::Reject, _) => ApprovalDecision::Reject,
        (DecisionKind::Edit, Some(edited_args)) => ApprovalDecision::Edit { edited_args },
        (DecisionKind::Edit, None) => return None,
    };
    Some(Submission::Addressed {
        request_id: message.request_id,
        decision,
    })
}

/// A parsed line of reviewer input.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// A decision on the request currently shown.
    Decision(ApprovalDecision),
    /// A decision naming its request explicitly.
    Addressed {
        request_id: Uuid,
        decision: ApprovalDecision,
    },
    /// The reviewer wants to edit; replacement arguments follow.
    EditRequested,
    /// Stop reviewing and leave the session suspended.
    Quit,
    Help,
    Unrecognized { content: String },
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn approval_keywords() {
        for input in ["yes", "Y", "approve", " ok ", "1"] {
            assert_eq!(
                SubmissionParser::parse(input),
                Submission::Decision(ApprovalDecision::Approve),
                "input {input:?}"
            );
        }
        for input in ["no", "N", "reject", "deny", "3"] {
            assert_eq!(
                SubmissionParser::parse(input),
                Submission::Decision(ApprovalDecision::Reject),
                "input {input:?}"
            );
        }
    }

    #[test]
    fn edit_inline_and_deferred() {
        assert_eq!(SubmissionParser::parse("edit"), Submission::EditRequested);
        assert_eq!(
            SubmissionParser::parse(r#"edit {"url": "https://b.example"}"#),
            Submission::Decision(ApprovalDecision::Edit {
                edited_args: json!({"url": "https://b.example"})
            })
        );
    }

    #[test]
    fn invalid_edit_json_falls_back_to_approve() {
        assert_eq!(
            SubmissionParser::parse("edit {not json"),
            Submission::Decision(ApprovalDecision::Approve)
        );
        assert_eq!(
            SubmissionParser::parse_edited_args("[1, 2]"),
            ApprovalDecision::Approve
        );
    }

    #[test]
    fn structured_decisions() {
        let id = Uuid::new_v4();
        let input = json!({
            "requestId": id,
            "decision": "edit",
            "editedArgs": {"path": "final.md", "content": "x"}
        })
        .to_string();
        assert_eq!(
            SubmissionParser::parse(&input),
            Submission::Addressed {
                request_id: id,
                decision: ApprovalDecision::Edit {
                    edited_args: json!({"path": "final.md", "content": "x"})
                }
            }
        );

        let reject = json!({"requestId": id, "decision": "reject"}).to_string();
        assert_eq!(
            SubmissionParser::parse(&reject),
            Submission::Addressed {
                request_id: id,
                decision: ApprovalDecision::Reject
            }
        );

        // Edit without arguments is not a decision.
        let bare = json!({"requestId": id, "decision": "edit"}).to_string();
        assert!(matches!(
            SubmissionParser::parse(&bare),
            Submission::Unrecognized { .. }
        ));
    }

    #[test]
    fn control_and_unknown_input() {
        assert_eq!(SubmissionParser::parse("/quit"), Submission::Quit);
        assert_eq!(SubmissionParser::parse("help"), Submission::Help);
        assert_eq!(
            SubmissionParser::parse("maybe"),
            Submission::Unrecognized {
                content: "maybe".into()
            }
        );
    }
}
