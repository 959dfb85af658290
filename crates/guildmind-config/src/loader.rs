use std::path::Path;

use guildmind_common::{Error, Result};
use tracing::info;

use crate::model::AppConfig;

impl AppConfig {
    /// Load configuration from a TOML file, then apply environment
    /// overrides. A `.env` file in the working directory is honored if
    /// present.
    pub fn load(path: &Path) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        let mut config: AppConfig =
            toml::from_str(&raw).map_err(|e| Error::Config(format!("invalid config: {e}")))?;

        config.apply_env();
        config.validate()?;

        info!("loaded configuration from {}", path.display());
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(token) = std::env::var("DISCORD_BOT_TOKEN") {
            if !token.trim().is_empty() {
                self.discord.bot_token = token;
            }
        }
        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            if !key.trim().is_empty() {
                self.llm.anthropic_api_key = Some(key);
            }
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.trim().is_empty() {
                self.llm.openai_api_key = Some(key);
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.discord.bot_token.trim().is_empty() {
            return Err(Error::Config(
                "discord bot token not set (config or DISCORD_BOT_TOKEN)".into(),
            ));
        }
        if self.llm.model.trim().is_empty() {
            return Err(Error::Config("llm model must not be empty".into()));
        }
        if self.chat.max_tool_rounds == 0 {
            return Err(Error::Config("chat.max_tool_rounds must be at least 1".into()));
        }
        Ok(())
    }
}
