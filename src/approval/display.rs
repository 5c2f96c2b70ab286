//! Plain-text rendering of a pending request for a reviewer.

use crate::approval::model::ApprovalRequest;
use crate::tools::ActionKind;

/// Longest argument value shown before truncation.
const MAX_ARG_DISPLAY: usize = 200;

const RULE_WIDTH: usize = 70;

/// Render a pending request as a reviewer-facing block.
pub fn format_request(request: &ApprovalRequest) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let kind = request.action.kind();

    let mut lines = vec![
        rule.clone(),
        format!("PENDING ACTION: {}", kind),
        rule,
        format!("Request: {}", request.id),
        format!("Task: {} ({})", request.task_id, request.role),
        String::new(),
    ];

    if let serde_json::Value::Object(args) = request.action.args() {
        if !args.is_empty() {
            lines.push("Arguments:".to_string());
            for (key, value) in &args {
                let rendered = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                lines.push(format!("  {}: {}", key, truncate(&rendered, MAX_ARG_DISPLAY)));
            }
            lines.push(String::new());
        }
    }

    lines.push("Allowed Decisions:".to_string());
    for decision in request.allowed_decisions() {
        lines.push(format!("  - {}", decision));
    }
    lines.push(String::new());

    if let Some(guidance) = guidance(kind) {
        lines.extend(guidance.iter().map(|s| s.to_string()));
        lines.push(String::new());
    }

    lines.join("\n")
}

fn guidance(kind: ActionKind) -> Option<&'static [&'static str]> {
    match kind {
        ActionKind::LookupPageSummary => Some(&[
            "This will retrieve page-by-page summaries for the specified documents.",
            "Review the document IDs and consider if you want to add or remove any.",
        ]),
        ActionKind::WebFetch => Some(&[
            "This will fetch the complete content of this web page.",
            "Verify this is an authoritative source worth retrieving.",
        ]),
        ActionKind::WriteFile | ActionKind::EditFile => Some(&[
            "This will save analysis findings to the filesystem.",
            "Review the content to ensure it meets quality standards.",
        ]),
        _ => None,
    }
}

/// Truncate on a char boundary, marking the cut with "...".
fn truncate(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &value[..idx]),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::task::TaskRole;
    use crate::tools::GatedAction;

    #[test]
    fn renders_header_args_and_guidance() {
        let request = ApprovalRequest::new(
            Uuid::new_v4(),
            TaskRole::AnalysisSpecialist,
            GatedAction::WebFetch {
                url: "https://registry.example/filing".into(),
            },
        );
        let text = format_request(&request);

        assert!(text.starts_with(&"=".repeat(70)));
        assert!(text.contains("PENDING ACTION: web_fetch"));
        assert!(text.contains("  url: https://registry.example/filing"));
        assert!(text.contains("  - approve\n  - edit\n  - reject"));
        assert!(text.contains("authoritative source"));
    }

    #[test]
    fn long_values_are_truncated() {
        let request = ApprovalRequest::new(
            Uuid::new_v4(),
            TaskRole::ReportFormatter,
            GatedAction::WriteFile {
                path: "report.md".into(),
                content: "x".repeat(500),
            },
        );
        let text = format_request(&request);
        let line = text
            .lines()
            .find(|l| l.starts_with("  content: "))
            .unwrap();
        assert_eq!(line.len(), "  content: ".len() + 200 + 3);
        assert!(line.ends_with("..."));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("ééé", 2), "éé...");
        assert_eq!(truncate("short", 200), "short");
    }
}
