//! codeloom - CLI entry point.
//!
//! Runs one query through the orchestrator and prints the final response.
//! Progress events go to stderr so stdout stays clean for the answer.

use std::sync::Arc;

use codeloom::config::Config;
use codeloom::llm::OpenRouterClient;
use codeloom::orchestrator::Scheduler;
use codeloom::tools::ToolRegistry;
use codeloom::workspace::Workspace;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "codeloom=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let query: String = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if query.trim().is_empty() {
        anyhow::bail!("Usage: codeloom <query>");
    }

    // Configuration errors (missing API key) surface before any network call
    let config = Config::from_env()?;
    tracing::info!(
        "Using model {} in workspace {}",
        config.default_model,
        config.workspace_path.display()
    );

    let workspace = Arc::new(Workspace::new(config.workspace_path.clone()));
    let registry = Arc::new(ToolRegistry::new(workspace));
    let llm = Arc::new(OpenRouterClient::new(config.api_key.clone()));

    let scheduler = Scheduler::new(llm, registry, config.default_model.clone())
        .with_max_tool_rounds(config.max_tool_rounds);

    let mut progress = scheduler.subscribe();
    let progress_printer = tokio::spawn(async move {
        while let Ok(event) = progress.recv().await {
            eprintln!("{}", event);
        }
    });

    let outcome = scheduler.execute(&query).await;
    progress_printer.abort();

    match outcome.response {
        Some(response) => println!("{}", response),
        None => println!("(no result)"),
    }

    if let Some(error) = outcome.error {
        tracing::error!("Run finished with error: {}", error);
        std::process::exit(1);
    }

    Ok(())
}
