/// Ambient context of one conversation turn: the triggering message and
/// where it came from. Threaded explicitly through the builder, executor and
/// tool handlers so concurrent turns never share hidden state.
#[derive(Debug, Clone)]
pub struct TurnContext {
    pub guild_id: Option<u64>,
    pub guild_name: Option<String>,
    pub channel_id: u64,
    pub channel_name: Option<String>,
    pub user_id: u64,
    pub user_name: String,
    pub message_id: u64,

    /// Whether the triggering user passed the admin check. Resolved once by
    /// the platform layer; permission-gated tools branch on it.
    pub user_is_admin: bool,
}

impl TurnContext {
    /// Value for a given ambient id parameter, as the string form the tool
    /// schemas use. `server_id` is absent in DMs.
    pub fn ambient_value(&self, key: &str) -> Option<String> {
        match key {
            "message_id" => Some(self.message_id.to_string()),
            "channel_id" => Some(self.channel_id.to_string()),
            "server_id" => self.guild_id.map(|id| id.to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
pub(crate) fn test_context() -> TurnContext {
    TurnContext {
        guild_id: Some(9001),
        guild_name: Some("Test Guild".into()),
        channel_id: 555,
        channel_name: Some("general".into()),
        user_id: 77,
        user_name: "alice".into(),
        message_id: 123456,
        user_is_admin: false,
    }
}
