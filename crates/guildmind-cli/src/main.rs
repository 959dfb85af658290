use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use guildmind_agents::{
    AnthropicProvider, ImageGenerator, LlmProvider, OpenAiImageClient, OpenAiProvider,
    Orchestrator, ToolRegistry, TurnConfig,
};
use guildmind_config::{AppConfig, ProviderKind};
use guildmind_discord::{BotContext, GuildmindHandler, build_toolset, commands};
use guildmind_store::DataStore;
use serenity::all::GatewayIntents;
use serenity::http::Http;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "guildmind", version, about = "LLM-powered Discord management assistant")]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, short, default_value = "guildmind.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the bot (default).
    Run,
    /// List the registered tools and exit.
    Tools,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Tools => list_tools(&config),
        Command::Run => run(config).await,
    }
}

fn list_tools(config: &AppConfig) -> anyhow::Result<()> {
    let http = Arc::new(Http::new(&config.discord.bot_token));
    let registry = ToolRegistry::from_tools(build_toolset(http))?;

    let mut definitions = registry.definitions();
    definitions.sort_by(|a, b| a.name.cmp(&b.name));
    for def in definitions {
        println!("{:28} {}", def.name, def.description);
    }
    Ok(())
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    let store = Arc::new(DataStore::open(Path::new(&config.chat.data_path))?);

    let provider: Arc<dyn LlmProvider> = match config.llm.provider {
        ProviderKind::Anthropic => {
            let key = config
                .llm
                .anthropic_api_key
                .clone()
                .context("anthropic_api_key not set")?;
            Arc::new(AnthropicProvider::new(key))
        }
        ProviderKind::OpenAi => {
            let key = config
                .llm
                .openai_api_key
                .clone()
                .context("openai_api_key not set")?;
            Arc::new(OpenAiProvider::new(key, None))
        }
    };

    let image_generator: Option<Arc<dyn ImageGenerator>> = config
        .llm
        .openai_api_key
        .clone()
        .map(|key| Arc::new(OpenAiImageClient::new(key, None)) as Arc<dyn ImageGenerator>);
    if image_generator.is_none() {
        info!("no openai_api_key configured; image generation disabled");
    }

    let http = Arc::new(Http::new(&config.discord.bot_token));
    let registry = Arc::new(ToolRegistry::from_tools(build_toolset(http))?);
    info!("{} tools registered", registry.len());

    let orchestrator = Arc::new(Orchestrator::new(
        provider,
        registry,
        image_generator,
        TurnConfig {
            model: config.llm.model.clone(),
            max_tokens: config.llm.max_tokens,
            temperature: Some(config.llm.temperature),
            max_tool_rounds: config.chat.max_tool_rounds,
        },
    ));

    let bot = Arc::new(BotContext {
        store: store.clone(),
        orchestrator,
        chat: config.chat.clone(),
        owner_ids: config.discord.owner_ids.clone(),
    });

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let framework = commands::build_framework(store, config.discord.guild_ids.clone());

    let mut client = serenity::Client::builder(&config.discord.bot_token, intents)
        .framework(framework)
        .event_handler(GuildmindHandler::new(bot))
        .await
        .context("failed to build discord client")?;

    info!("starting discord gateway");
    client.start().await.context("discord client stopped")?;
    Ok(())
}
