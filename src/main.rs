use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use scout::config::AppConfig;
use scout::error::Result;
use scout::llm::AnthropicClient;
use scout::normalize::ContentNormalizer;
use scout::session::Session;
use scout::shell::{Mode, Shell};
use scout::storage::ArticleStore;
use scout::tools::article_toolkit;

#[derive(Debug, Parser)]
#[command(name = "scout", about = "Research agent over a remote tool provider")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "scout.toml")]
    config: PathBuf,

    /// Tool provider endpoint, overriding the configuration.
    #[arg(long)]
    endpoint: Option<String>,

    /// Step budget per run, overriding the configuration.
    #[arg(long)]
    max_steps: Option<usize>,

    /// Read prompts from stdin instead of running once.
    #[arg(long, short)]
    interactive: bool,

    /// Prompt to run. Without one, the default mission runs headless.
    prompt: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("scout=info")),
        )
        .init();

    if let Err(err) = run(Cli::parse()).await {
        tracing::error!(error = %err, "fatal");
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut cfg = AppConfig::from_env_or_file(&cli.config)?;
    if let Some(endpoint) = cli.endpoint {
        cfg.provider.endpoint = endpoint;
    }
    if let Some(max_steps) = cli.max_steps {
        cfg.agent.max_steps = max_steps.max(1);
    }

    // Credentials are checked before anything touches the network.
    let model = Arc::new(AnthropicClient::from_config(&cfg.model)?);

    let store = Arc::new(ArticleStore::connect(&cfg.storage.database_url).await?);
    let session = Session::connect(&cfg.provider.endpoint)
        .await?
        .with_capture_normalizer(
            cfg.provider.capture_tool.clone(),
            ContentNormalizer::new(model.clone()),
        );

    let shell = Shell::new(session, model)
        .with_local_tools(article_toolkit(store))
        .with_system_prompt(cfg.agent.system_prompt.clone())
        .with_max_steps(cfg.agent.max_steps);

    let mode = if cli.interactive {
        Mode::Interactive
    } else if let Some(prompt) = cli.prompt {
        Mode::Once(prompt)
    } else {
        Mode::Headless
    };

    shell.run(mode).await
}
