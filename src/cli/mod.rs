use crate::{
    AgentConfig, Agent, AgentError, InMemoryToolRegistry, OpenAIClient, WorkflowMode,
};
use clap::{Arg, ArgAction, Command};
use std::{env, sync::Arc, time::Duration};
use tracing::{error, info};

fn command() -> Command {
    Command::new("workflow-agent")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Plan a task into a workflow and execute it step by step with an LLM")
        .arg(
            Arg::new("task")
                .help("The problem to solve")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("mode")
                .long("mode")
                .value_name("MODE")
                .help("Workflow mode: manual (fixed template) or automatic (model-generated)"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Agent config JSON (name, description, prompts, manual_workflow)"),
        )
        .arg(
            Arg::new("model")
                .short('m')
                .long("model")
                .value_name("MODEL")
                .help("The model to use")
                .default_value(crate::services::openai_client::DEFAULT_MODEL),
        )
        .arg(
            Arg::new("api-key")
                .short('k')
                .long("api-key")
                .value_name("KEY")
                .help("API key (or set OPENAI_API_KEY env var)"),
        )
        .arg(
            Arg::new("base-url")
                .short('u')
                .long("base-url")
                .value_name("URL")
                .help("API base URL (or set OPENAI_BASE_URL / OPENROUTER_BASE_URL env vars)"),
        )
        .arg(
            Arg::new("timeout")
                .short('t')
                .long("timeout")
                .value_name("SECONDS")
                .help("Request timeout in seconds")
                .value_parser(clap::value_parser!(u64))
                .default_value("120"),
        )
        .arg(
            Arg::new("plan-max-fail-times")
                .long("plan-max-fail-times")
                .value_name("COUNT")
                .help("Attempts allowed for automatic plan generation")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print the full run result as JSON")
                .action(ArgAction::SetTrue),
        )
}

/// CLI entry point for the workflow-agent tool
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let matches = command().get_matches();

    let mut config = match matches.get_one::<String>("config") {
        Some(path) => AgentConfig::from_path(path)?,
        None => AgentConfig::default(),
    };
    if let Some(mode) = matches.get_one::<String>("mode") {
        config.workflow_mode = mode.parse::<WorkflowMode>()?;
    }
    if let Some(attempts) = matches.get_one::<usize>("plan-max-fail-times") {
        config.plan_max_fail_times = *attempts;
    }
    config.validate()?;

    let api_key = matches
        .get_one::<String>("api-key")
        .cloned()
        .or_else(|| env::var("OPENAI_API_KEY").ok())
        .ok_or_else(|| {
            AgentError::Config(
                "API key is required. Set OPENAI_API_KEY environment variable or use --api-key"
                    .to_string(),
            )
        })?;

    let base_url = matches
        .get_one::<String>("base-url")
        .cloned()
        .or_else(|| env::var("OPENAI_BASE_URL").ok())
        .or_else(|| env::var("OPENROUTER_BASE_URL").ok())
        .unwrap_or_else(|| crate::services::openai_client::DEFAULT_BASE_URL.to_string());

    let model = matches
        .get_one::<String>("model")
        .cloned()
        .unwrap_or_else(|| crate::services::openai_client::DEFAULT_MODEL.to_string());
    let timeout_seconds = matches.get_one::<u64>("timeout").copied().unwrap_or(120);

    let client = OpenAIClient::new(api_key)
        .with_model(model.as_str())
        .with_base_url(base_url.as_str())
        .with_timeout(Duration::from_secs(timeout_seconds));

    let task = matches
        .get_one::<String>("task")
        .cloned()
        .unwrap_or_default();

    info!("Running agent `{}` on task: {}", config.name, task);
    info!("Using model: {} ({} mode)", model, config.workflow_mode);
    info!("Base URL: {}", base_url);

    let agent = Agent::new(task, config, Arc::new(client))
        .with_tool_registry(Arc::new(InMemoryToolRegistry::with_defaults()));
    let outcome = agent.run().await;

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("\nAgent Result:\n{}", outcome.result);
    }

    if !outcome.is_success() {
        error!(
            "Agent run ended with status `{}` after {} rounds",
            outcome.status, outcome.rounds
        );
        return Err(format!("agent run ended with status `{}`", outcome.status).into());
    }

    info!(
        "Agent execution completed in {} rounds",
        outcome.rounds
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parses_flags() {
        let matches = command()
            .try_get_matches_from([
                "workflow-agent",
                "Solve x^2 - 4 = 0",
                "--mode",
                "automatic",
                "--plan-max-fail-times",
                "5",
                "--json",
            ])
            .unwrap();

        assert_eq!(
            matches.get_one::<String>("task").map(String::as_str),
            Some("Solve x^2 - 4 = 0")
        );
        assert_eq!(matches.get_one::<usize>("plan-max-fail-times"), Some(&5));
        assert_eq!(matches.get_one::<u64>("timeout"), Some(&120));
        assert!(matches.get_flag("json"));
    }

    #[test]
    fn test_command_requires_task() {
        assert!(command().try_get_matches_from(["workflow-agent"]).is_err());
    }
}
