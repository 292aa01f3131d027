use std::io::Write;

use spfoundry_agent::session::{CHAT_AGENT_NAME, CHAT_INSTRUCTIONS};
use spfoundry_agent::{FoundryClient, ReadyAgent};
use spfoundry_core::{QueryResult, ThreadId};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::commands::{connect, prepare, runtime, CommandContext, CommandResult};

const QUERY_PREVIEW_CHARS: usize = 80;
const RESPONSE_PREVIEW_CHARS: usize = 100;

const HELP_TEXT: &str = "\
Available commands:
  - Ask any question about your SharePoint content
  - /help or /h     - Show this help message
  - /history or /hi - Show conversation history
  - /clear or /c    - Clear conversation history
  - /quit or /q     - Exit the application

Example queries:
  - \"Summarize the latest project documents\"
  - \"What are the key points in the quarterly report?\"
  - \"Show me documents related to budget planning\"
  - \"Find information about team policies\"

Tips:
  - Be specific in your queries for better results
  - Reference document names or types when possible
  - Ask follow-up questions to dive deeper into topics";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    Empty,
    Help,
    History,
    Clear,
    Quit,
    Query(String),
}

pub fn parse_input(line: &str) -> ChatInput {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ChatInput::Empty;
    }

    match trimmed.to_lowercase().as_str() {
        "/help" | "/h" => ChatInput::Help,
        "/history" | "/hi" => ChatInput::History,
        "/clear" | "/c" => ChatInput::Clear,
        "/quit" | "/q" => ChatInput::Quit,
        _ => ChatInput::Query(trimmed.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub query: String,
    pub response: String,
    pub success: bool,
    pub execution_time: f64,
}

/// Conversation state for one REPL session. The thread id carries context
/// between questions; clearing history keeps the thread.
#[derive(Debug, Default)]
pub struct ChatState {
    pub thread_id: Option<ThreadId>,
    pub history: Vec<HistoryEntry>,
}

impl ChatState {
    pub fn record(&mut self, query: &str, result: &QueryResult) {
        if let Some(thread_id) = &result.thread_id {
            self.thread_id = Some(thread_id.clone());
        }
        self.history.push(HistoryEntry {
            query: query.to_string(),
            response: result.display_text().to_string(),
            success: result.success,
            execution_time: result.execution_time,
        });
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    pub fn render_history(&self) -> String {
        if self.history.is_empty() {
            return "No conversation history yet.".to_string();
        }

        let mut lines = vec![
            format!("Conversation History ({} items):", self.history.len()),
            "=".repeat(60),
        ];
        for (index, entry) in self.history.iter().enumerate() {
            let status = if entry.success { "ok" } else { "error" };
            lines.push(String::new());
            lines.push(format!(
                "{}. [{status}] Query: {}",
                index + 1,
                truncate(&entry.query, QUERY_PREVIEW_CHARS)
            ));
            lines.push(format!("   Response: {}", truncate(&entry.response, RESPONSE_PREVIEW_CHARS)));
            if entry.execution_time > 0.0 {
                lines.push(format!("   Time: {:.2}s", entry.execution_time));
            }
        }
        lines.join("\n")
    }
}

/// First `limit` characters, with `...` appended when anything was cut.
pub fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

pub fn render_result(result: &QueryResult) -> String {
    if result.success {
        format!("\nAssistant: {}\nResponse time: {:.2}s", result.content, result.execution_time)
    } else {
        format!("\nError: {}", result.display_text())
    }
}

pub fn run(context: &CommandContext) -> CommandResult {
    let config = match prepare(context, "chat", false) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match runtime("chat", false) {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    println!("SharePoint Tool Foundry - Interactive CLI");
    println!("{}", "=".repeat(50));
    println!("Welcome! Ask me anything about your SharePoint content.");
    println!("Type '/help' for available commands or '/quit' to exit.\n");

    runtime.block_on(async {
        println!("Initializing SharePoint agent...");
        let agent = match connect(&config, CHAT_AGENT_NAME, CHAT_INSTRUCTIONS).await {
            Ok(agent) => agent,
            Err((kind, message)) => return CommandResult::kind_failure("chat", kind, message, false),
        };
        println!("SharePoint agent ready!");

        let outcome = repl(&agent).await;

        println!("\nCleaning up...");
        agent.cleanup().await;

        match outcome {
            Ok(()) => CommandResult::text(0, ""),
            Err(error) => CommandResult::text(1, format!("Failed to read input: {error}")),
        }
    })
}

async fn repl(agent: &ReadyAgent<FoundryClient>) -> std::io::Result<()> {
    let mut state = ChatState::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("\nYou: ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!("\n\nInterrupted. Type '/quit' to exit properly.");
                continue;
            }
        };

        let Some(line) = line else {
            println!("\n\nGoodbye!");
            return Ok(());
        };

        match parse_input(&line) {
            ChatInput::Empty => {}
            ChatInput::Quit => {
                println!("\nGoodbye! Thanks for using SharePoint Tool Foundry.");
                return Ok(());
            }
            ChatInput::Help => println!("\n{HELP_TEXT}"),
            ChatInput::History => println!("\n{}", state.render_history()),
            ChatInput::Clear => {
                state.clear();
                println!("\nConversation history cleared.");
            }
            ChatInput::Query(query) => {
                println!("Processing your query...");
                let result = agent.query(&query, state.thread_id.as_ref()).await;
                println!("{}", render_result(&result));
                state.record(&query, &result);
            }
        }
    }
}
