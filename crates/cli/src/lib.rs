pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use spfoundry_core::config::DotenvSource;

use crate::commands::CommandContext;

#[derive(Debug, Parser)]
#[command(
    name = "spfoundry",
    about = "SharePoint-grounded agent CLI for Azure AI Foundry",
    long_about = "Ask questions grounded in SharePoint content through an Azure AI Foundry agent, run the use-case demo, and diagnose authentication.",
    after_help = "Examples:\n  spfoundry chat\n  spfoundry ask \"Summarize the onboarding guide\"\n  spfoundry demo Content Discovery\n  spfoundry doctor --json"
)]
pub struct Cli {
    #[arg(long, global = true, value_name = "PATH", help = "Read settings from this TOML file")]
    config: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH", help = "Load variables from this env file instead of ./.env")]
    env_file: Option<PathBuf>,
    #[arg(long, global = true, help = "Enable debug logging (same as DEBUG_LOGGING=true)")]
    debug: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Start an interactive session that keeps conversation context")]
    Chat,
    #[command(about = "Run the SharePoint use-case demonstrations and print statistics")]
    Demo {
        #[arg(value_name = "USE CASE", help = "Run only this use case (case-insensitive)")]
        use_case: Vec<String>,
    },
    #[command(about = "Ask a single question")]
    Ask {
        question: String,
        #[arg(long, value_name = "ID", help = "Continue an existing thread")]
        thread: Option<String>,
        #[arg(long, help = "Emit the query result as JSON")]
        json: bool,
    },
    #[command(about = "Check configuration, credentials and SharePoint connection access")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let context = CommandContext {
        config_path: cli.config,
        dotenv: cli.env_file.map(DotenvSource::Path).unwrap_or_default(),
        debug: cli.debug,
    };

    let result = match cli.command {
        Command::Chat => commands::chat::run(&context),
        Command::Demo { use_case } => commands::demo::run(&context, &use_case),
        Command::Ask { question, thread, json } => {
            commands::ask::run(&context, &question, thread.as_deref(), json)
        }
        Command::Doctor { json } => commands::doctor::run(&context, json),
        Command::Config => commands::config::run(&context),
    };

    if !result.output.is_empty() {
        println!("{}", result.output);
    }
    ExitCode::from(result.exit_code)
}
