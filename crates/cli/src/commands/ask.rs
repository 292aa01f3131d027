use spfoundry_agent::session::{DEFAULT_AGENT_NAME, DEFAULT_INSTRUCTIONS};
use spfoundry_core::{ErrorKind, QueryResult, ThreadId};

use crate::commands::{connect, prepare, runtime, CommandContext, CommandResult};

pub fn run(context: &CommandContext, question: &str, thread: Option<&str>, json: bool) -> CommandResult {
    let question = question.trim();
    if question.is_empty() {
        return CommandResult::kind_failure(
            "ask",
            ErrorKind::Unclassified,
            "question must not be empty".to_string(),
            json,
        );
    }

    let config = match prepare(context, "ask", json) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match runtime("ask", json) {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    runtime.block_on(async {
        let agent = match connect(&config, DEFAULT_AGENT_NAME, DEFAULT_INSTRUCTIONS).await {
            Ok(agent) => agent,
            Err((kind, message)) => return CommandResult::kind_failure("ask", kind, message, json),
        };

        let thread_id = thread.map(ThreadId::from);
        let result = agent.query(question, thread_id.as_ref()).await;
        agent.cleanup().await;

        render(&result, json)
    })
}

fn render(result: &QueryResult, json: bool) -> CommandResult {
    let exit_code = if result.success {
        0
    } else {
        result.error_kind.unwrap_or(ErrorKind::Unclassified).exit_code()
    };

    if json {
        let output = serde_json::to_string_pretty(result).unwrap_or_else(|error| {
            format!("{{\"success\":false,\"error_message\":\"result serialization failed: {error}\"}}")
        });
        return CommandResult::text(exit_code, output);
    }

    let mut lines = Vec::new();
    if result.success {
        lines.push(result.content.clone());
        lines.push(String::new());
        lines.push(format!("Response time: {:.2}s", result.execution_time));
    } else {
        lines.push(format!("Error: {}", result.display_text()));
    }
    if let Some(thread_id) = &result.thread_id {
        lines.push(format!("Thread: {thread_id}"));
    }
    CommandResult::text(exit_code, lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use spfoundry_core::{ErrorKind, QueryOutcome, QueryResult, RunId, ThreadId};

    use super::render;

    #[test]
    fn successful_answer_prints_content_time_and_thread() {
        let result = QueryResult::from_outcome(
            QueryOutcome::Answered {
                run_id: RunId::new("run_1"),
                content: "Budget planning lives in Finance/2024.".to_string(),
            },
            ThreadId::new("thread_1"),
            Duration::from_millis(1500),
        );

        let rendered = render(&result, false);

        assert_eq!(rendered.exit_code, 0);
        assert!(rendered.output.starts_with("Budget planning lives in Finance/2024."));
        assert!(rendered.output.contains("Response time: 1.50s"));
        assert!(rendered.output.ends_with("Thread: thread_1"));
    }

    #[test]
    fn failed_answer_uses_kind_exit_code_in_json() {
        let result = QueryResult::failure(
            "Query execution failed: authentication failed: expired",
            ErrorKind::Authentication,
            None,
            Duration::ZERO,
        );

        let rendered = render(&result, true);
        let payload: serde_json::Value = serde_json::from_str(&rendered.output).expect("json");

        assert_eq!(rendered.exit_code, 3);
        assert_eq!(payload["success"], false);
        assert_eq!(payload["error_kind"], "authentication");
    }
}
