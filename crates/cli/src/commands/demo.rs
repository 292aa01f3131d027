use spfoundry_agent::session::{DEFAULT_AGENT_NAME, DEFAULT_INSTRUCTIONS};
use spfoundry_agent::{FoundryClient, ReadyAgent};
use spfoundry_core::QueryResult;

use crate::commands::catalog::{self, UseCase, USE_CASES};
use crate::commands::chat::truncate;
use crate::commands::{connect, prepare, runtime, CommandContext, CommandResult};

const RESPONSE_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct QueryStat {
    pub query: String,
    pub success: bool,
    pub execution_time: f64,
    pub content_length: usize,
}

impl QueryStat {
    pub fn from_result(query: &str, result: &QueryResult) -> Self {
        Self {
            query: query.to_string(),
            success: result.success,
            execution_time: result.execution_time,
            content_length: if result.success { result.content.chars().count() } else { 0 },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UseCaseReport {
    pub name: String,
    pub queries: Vec<QueryStat>,
}

impl UseCaseReport {
    pub fn success_count(&self) -> usize {
        self.queries.iter().filter(|stat| stat.success).count()
    }

    pub fn total_time(&self) -> f64 {
        self.queries.iter().map(|stat| stat.execution_time).sum()
    }

    pub fn success_rate(&self) -> f64 {
        percentage(self.success_count(), self.queries.len())
    }

    pub fn average_time(&self) -> f64 {
        average(self.total_time(), self.queries.len())
    }

    pub fn render_summary(&self) -> String {
        [
            "\nUse Case Summary:".to_string(),
            format!("   Success Rate: {:.1}%", self.success_rate()),
            format!("   Total Time: {:.2}s", self.total_time()),
            format!("   Average Time: {:.2}s", self.average_time()),
        ]
        .join("\n")
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct DemoSummary {
    pub reports: Vec<UseCaseReport>,
}

impl DemoSummary {
    pub fn total_queries(&self) -> usize {
        self.reports.iter().map(|report| report.queries.len()).sum()
    }

    pub fn total_successes(&self) -> usize {
        self.reports.iter().map(UseCaseReport::success_count).sum()
    }

    pub fn total_time(&self) -> f64 {
        self.reports.iter().map(UseCaseReport::total_time).sum()
    }

    pub fn success_rate(&self) -> f64 {
        percentage(self.total_successes(), self.total_queries())
    }

    pub fn average_time(&self) -> f64 {
        average(self.total_time(), self.total_queries())
    }

    pub fn render(&self) -> String {
        [
            format!("\n{}", "=".repeat(60)),
            "FINAL SUMMARY".to_string(),
            "=".repeat(60),
            format!("Use Cases Demonstrated: {}", self.reports.len()),
            format!("Total Queries Processed: {}", self.total_queries()),
            format!("Successful Responses: {}", self.total_successes()),
            format!("Overall Success Rate: {:.1}%", self.success_rate()),
            format!("Total Execution Time: {:.2}s", self.total_time()),
            format!("Average Response Time: {:.2}s", self.average_time()),
        ]
        .join("\n")
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn average(total: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

/// Resolves the requested use cases; several words form one name.
pub fn select(words: &[String]) -> Result<Vec<&'static UseCase>, String> {
    if words.is_empty() {
        return Ok(USE_CASES.iter().collect());
    }

    let name = words.join(" ");
    catalog::find(&name)
        .map(|use_case| vec![use_case])
        .ok_or_else(|| format!("Use case '{name}' not found.\n{}", catalog::render_available()))
}

pub fn run(context: &CommandContext, words: &[String]) -> CommandResult {
    let selected = match select(words) {
        Ok(selected) => selected,
        Err(message) => return CommandResult::text(1, message),
    };

    let config = match prepare(context, "demo", false) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match runtime("demo", false) {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let run_all = selected.len() > 1;
    if run_all {
        println!("SharePoint Tool Foundry - Use Case Demonstrations");
        println!("{}", "=".repeat(60));
        println!("This demo showcases various ways to leverage the SharePoint agent");
        println!("for different business scenarios and use cases.\n");
    }

    runtime.block_on(async {
        let agent = match connect(&config, DEFAULT_AGENT_NAME, DEFAULT_INSTRUCTIONS).await {
            Ok(agent) => agent,
            Err((kind, message)) => return CommandResult::kind_failure("demo", kind, message, false),
        };

        let mut summary = DemoSummary::default();
        for use_case in selected {
            summary.reports.push(demonstrate(&agent, use_case).await);
        }
        agent.cleanup().await;

        if run_all {
            println!("{}", summary.render());
            println!("\nDemo completed.");
        }
        let exit_code = if summary.total_successes() == summary.total_queries() { 0 } else { 1 };
        CommandResult::text(exit_code, "")
    })
}

async fn demonstrate(agent: &ReadyAgent<FoundryClient>, use_case: &UseCase) -> UseCaseReport {
    println!("\n{}", "=".repeat(60));
    println!("Use Case: {}", use_case.name);
    println!("Description: {}", use_case.description);
    println!("{}", "=".repeat(60));

    let mut report = UseCaseReport { name: use_case.name.to_string(), queries: Vec::new() };
    for (index, query) in use_case.queries.iter().enumerate() {
        println!("\nQuery {}: {query}", index + 1);
        println!("{}", "-".repeat(40));

        let result = agent.query(query, None).await;
        if result.success {
            println!("Response: {}", truncate(&result.content, RESPONSE_PREVIEW_CHARS));
            println!("Time: {:.2}s", result.execution_time);
        } else {
            println!("Error: {}", result.display_text());
        }
        report.queries.push(QueryStat::from_result(query, &result));
    }

    println!("{}", report.render_summary());
    report
}
