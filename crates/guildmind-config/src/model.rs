use serde::Deserialize;

/// Top-level application configuration, loaded from `guildmind.toml` plus
/// environment overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub discord: DiscordConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

/// Discord connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    /// Bot token. May be left empty in the file and supplied via
    /// `DISCORD_BOT_TOKEN`.
    #[serde(default)]
    pub bot_token: String,

    /// User ids that always pass the admin check.
    #[serde(default)]
    pub owner_ids: Vec<u64>,

    /// Guild ids for guild-scoped slash command registration. Empty means
    /// global commands.
    #[serde(default)]
    pub guild_ids: Vec<u64>,
}

/// Which LLM backend drives the conversation loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Anthropic,
    OpenAi,
}

/// LLM provider settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub provider: ProviderKind,
    pub model: String,

    /// May be supplied via `ANTHROPIC_API_KEY`.
    #[serde(default)]
    pub anthropic_api_key: Option<String>,

    /// May be supplied via `OPENAI_API_KEY`. Also used for image generation.
    #[serde(default)]
    pub openai_api_key: Option<String>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

/// Conversation-loop tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// How many prior channel messages are replayed into a turn. The store
    /// setting `history_num` overrides this per deployment.
    pub history_depth: usize,

    /// Upper bound on LLM round-trips within one turn.
    pub max_tool_rounds: usize,

    /// Replay channel history alongside an image-bearing turn.
    pub history_with_image: bool,

    /// Minimum character growth between streaming message edits.
    pub edit_threshold: usize,

    /// Path of the JSON file backing the channel/settings store.
    pub data_path: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_depth: 5,
            max_tool_rounds: 50,
            history_with_image: false,
            edit_threshold: 200,
            data_path: "data.json".to_string(),
        }
    }
}

fn default_max_tokens() -> u32 {
    8000
}

fn default_temperature() -> f64 {
    0.7
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_parses_with_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [discord]
            bot_token = "token"

            [llm]
            provider = "anthropic"
            model = "claude-sonnet-4-20250514"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.llm.provider, ProviderKind::Anthropic);
        assert_eq!(cfg.llm.max_tokens, 8000);
        assert_eq!(cfg.chat.history_depth, 5);
        assert_eq!(cfg.chat.max_tool_rounds, 50);
        assert!(!cfg.chat.history_with_image);
        assert_eq!(cfg.chat.edit_threshold, 200);
    }

    #[test]
    fn chat_section_overrides_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [discord]
            bot_token = "token"
            owner_ids = [1234]

            [llm]
            provider = "openai"
            model = "gpt-4o"

            [chat]
            history_depth = 10
            max_tool_rounds = 8
            history_with_image = true
            "#,
        )
        .unwrap();

        assert_eq!(cfg.chat.history_depth, 10);
        assert_eq!(cfg.chat.max_tool_rounds, 8);
        assert!(cfg.chat.history_with_image);
        assert_eq!(cfg.discord.owner_ids, vec![1234]);
    }
}
