use async_trait::async_trait;
use guildmind_common::Result;
use tracing::warn;

use crate::context::TurnContext;
use crate::prompts;
use crate::providers::{ChatMessage, ChatRole, ContentBlock, MessagePart};

/// One prior channel message, already stripped to what the conversation
/// needs. The platform layer excludes the trigger message and non-default
/// (system) messages before handing turns over.
#[derive(Debug, Clone)]
pub struct HistoryTurn {
    pub author_display: String,
    pub content: String,
    /// Authored by the bot account itself.
    pub from_self: bool,
    pub has_attachment: bool,
}

/// Capability interface for fetching recent channel history,
/// most-recent-first.
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn recent_turns(&self, limit: usize) -> Result<Vec<HistoryTurn>>;
}

/// An image attached to the triggering message.
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    pub url: String,
}

/// Assembles the ordered message list for one turn: system prompt with live
/// substitutions, replayed channel history, and the new user turn.
pub struct ConversationBuilder {
    history_depth: usize,
    history_with_image: bool,
}

impl ConversationBuilder {
    pub fn new(history_depth: usize, history_with_image: bool) -> Self {
        Self {
            history_depth,
            history_with_image,
        }
    }

    /// Returns `(system, messages)`. A failed history fetch degrades to an
    /// empty history rather than aborting the turn.
    pub async fn build(
        &self,
        ctx: &TurnContext,
        history: &dyn HistorySource,
        prompt: &str,
        image: Option<&ImageAttachment>,
    ) -> Result<(String, Vec<ChatMessage>)> {
        let system = prompts::system_prompt(ctx);
        let mut messages = Vec::new();

        let replay_history = image.is_none() || self.history_with_image;
        if replay_history && self.history_depth > 0 {
            match history.recent_turns(self.history_depth).await {
                Ok(turns) => {
                    // newest-first from the source; replay chronologically
                    for turn in turns.into_iter().rev() {
                        messages.push(convert_turn(&turn));
                    }
                }
                Err(e) => warn!("history fetch failed, continuing without it: {e}"),
            }
        }

        let user_text = format!("{}: {}", ctx.user_name, prompt);
        let new_turn = match image {
            Some(image) => ChatMessage {
                role: ChatRole::User,
                content: MessagePart::Parts(vec![
                    ContentBlock::Text { text: user_text },
                    ContentBlock::Image {
                        url: image.url.clone(),
                    },
                ]),
            },
            None => ChatMessage::user(user_text),
        };
        messages.push(new_turn);

        Ok((system, messages))
    }
}

fn convert_turn(turn: &HistoryTurn) -> ChatMessage {
    if turn.from_self {
        ChatMessage::assistant(turn.content.clone())
    } else {
        let marker = if turn.has_attachment { "[attachment] " } else { "" };
        ChatMessage::user(format!("{}: {}{}", turn.author_display, marker, turn.content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_context;

    struct FixedHistory(Vec<HistoryTurn>);

    #[async_trait]
    impl HistorySource for FixedHistory {
        async fn recent_turns(&self, limit: usize) -> Result<Vec<HistoryTurn>> {
            Ok(self.0.iter().take(limit).cloned().collect())
        }
    }

    fn turn(author: &str, content: &str, from_self: bool, has_attachment: bool) -> HistoryTurn {
        HistoryTurn {
            author_display: author.into(),
            content: content.into(),
            from_self,
            has_attachment,
        }
    }

    #[tokio::test]
    async fn history_is_replayed_chronologically_with_roles() {
        let history = FixedHistory(vec![
            turn("bob", "second", false, true),
            turn("Guildmind", "first reply", true, false),
        ]);
        let builder = ConversationBuilder::new(5, false);

        let (system, messages) = builder
            .build(&test_context(), &history, "hello", None)
            .await
            .unwrap();

        assert!(system.contains("current_channel_id: 555"));
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, ChatRole::Assistant);
        assert_eq!(messages[1].role, ChatRole::User);
        match &messages[1].content {
            MessagePart::Text(t) => assert_eq!(t, "bob: [attachment] second"),
            other => panic!("unexpected content: {other:?}"),
        }
        match &messages[2].content {
            MessagePart::Text(t) => assert_eq!(t, "alice: hello"),
            other => panic!("unexpected content: {other:?}"),
        }
    }

    #[tokio::test]
    async fn image_turn_skips_history_by_default() {
        let history = FixedHistory(vec![turn("bob", "old", false, false)]);
        let builder = ConversationBuilder::new(5, false);
        let image = ImageAttachment {
            url: "https://cdn.example/cat.png".into(),
        };

        let (_, messages) = builder
            .build(&test_context(), &history, "what is this", Some(&image))
            .await
            .unwrap();

        assert_eq!(messages.len(), 1);
        match &messages[0].content {
            MessagePart::Parts(parts) => {
                assert!(matches!(&parts[0], ContentBlock::Text { text } if text == "alice: what is this"));
                assert!(matches!(&parts[1], ContentBlock::Image { url } if url.contains("cat.png")));
            }
            other => panic!("unexpected content: {other:?}"),
        }
    }

    #[tokio::test]
    async fn image_turn_keeps_history_when_configured() {
        let history = FixedHistory(vec![turn("bob", "old", false, false)]);
        let builder = ConversationBuilder::new(5, true);
        let image = ImageAttachment {
            url: "https://cdn.example/cat.png".into(),
        };

        let (_, messages) = builder
            .build(&test_context(), &history, "what is this", Some(&image))
            .await
            .unwrap();

        assert_eq!(messages.len(), 2);
    }
}
