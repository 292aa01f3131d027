use spfoundry_core::{Message, QueryOutcome, RunResult, RunStatus, NO_RESPONSE_CONTENT};

/// Turns a terminal run plus the thread's messages (newest first) into a
/// query outcome. Messages are ignored unless the run completed.
pub fn normalize(run: &RunResult, messages: &[Message]) -> QueryOutcome {
    let run_id = run.id.clone();

    match &run.status {
        RunStatus::Completed => {
            let content = messages
                .iter()
                .filter(|message| message.is_assistant())
                .find_map(Message::last_text)
                .unwrap_or(NO_RESPONSE_CONTENT)
                .to_string();
            QueryOutcome::Answered { run_id, content }
        }
        RunStatus::Failed => {
            let detail = run.last_error.clone().unwrap_or_default();
            QueryOutcome::RunFailed { run_id, error_message: format!("Agent run failed: {detail}") }
        }
        RunStatus::Unexpected(status) => {
            QueryOutcome::UnexpectedStatus { run_id, status: status.clone() }
        }
    }
}
