use std::sync::Arc;

use async_trait::async_trait;
use guildmind_common::Result;
use tracing::warn;

/// Discord's per-message character ceiling.
pub const MESSAGE_CHAR_LIMIT: usize = 2000;

/// Shown while the model has produced no text yet.
const EMPTY_PLACEHOLDER: &str = ". . .";

/// Capability interface over the in-progress reply: edit it in place, or
/// append an overflow message after it in the same channel.
#[async_trait]
pub trait ReplySurface: Send + Sync {
    async fn edit(&self, text: &str) -> Result<()>;
    async fn send_followup(&self, text: &str) -> Result<()>;
}

/// Throttles and paginates edits of the growing response.
///
/// Transient edit failures are logged and swallowed; a failed render never
/// corrupts conversation state.
pub struct IncrementalRenderer {
    surface: Arc<dyn ReplySurface>,
    threshold: usize,
    last_flushed: usize,
}

impl IncrementalRenderer {
    pub fn new(surface: Arc<dyn ReplySurface>, threshold: usize) -> Self {
        Self {
            surface,
            threshold,
            last_flushed: 0,
        }
    }

    /// Edit the reply in place when the text grew by at least the threshold
    /// since the last flush, or unconditionally with `force`. Text beyond
    /// the message ceiling is clamped here; `finish` paginates it out.
    pub async fn update(&mut self, text: &str, force: bool) {
        let length = text.chars().count();
        if !force && length.saturating_sub(self.last_flushed) < self.threshold {
            return;
        }
        self.last_flushed = length;

        let shown = if text.trim().is_empty() {
            EMPTY_PLACEHOLDER
        } else {
            clamp_chars(text, MESSAGE_CHAR_LIMIT)
        };
        if let Err(e) = self.surface.edit(shown).await {
            warn!("message edit failed: {e}");
        }
    }

    /// Final flush: the first page edits the reply, overflow goes out as
    /// follow-up messages so no content is lost.
    pub async fn finish(&mut self, text: &str) {
        self.last_flushed = text.chars().count();

        if text.trim().is_empty() {
            if let Err(e) = self.surface.edit(EMPTY_PLACEHOLDER).await {
                warn!("message edit failed: {e}");
            }
            return;
        }

        let mut pages = paginate(text, MESSAGE_CHAR_LIMIT).into_iter();
        if let Some(first) = pages.next() {
            if let Err(e) = self.surface.edit(&first).await {
                warn!("message edit failed: {e}");
            }
        }
        for page in pages {
            if let Err(e) = self.surface.send_followup(&page).await {
                warn!("overflow send failed: {e}");
                break;
            }
        }
    }
}

/// Longest prefix of at most `max` characters (not bytes).
fn clamp_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

/// Split into ceiling-size chunks by character count.
fn paginate(s: &str, max: usize) -> Vec<String> {
    let mut pages = Vec::new();
    let mut page = String::new();
    let mut count = 0;

    for c in s.chars() {
        if count == max {
            pages.push(std::mem::take(&mut page));
            count = 0;
        }
        page.push(c);
        count += 1;
    }
    if !page.is_empty() {
        pages.push(page);
    }
    pages
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSurface {
        edits: Mutex<Vec<String>>,
        followups: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ReplySurface for RecordingSurface {
        async fn edit(&self, text: &str) -> Result<()> {
            self.edits.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn send_followup(&self, text: &str) -> Result<()> {
            self.followups.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn no_edit_until_threshold_crossed() {
        let surface = Arc::new(RecordingSurface::default());
        let mut renderer = IncrementalRenderer::new(surface.clone(), 40);

        let mut text = String::new();
        for _ in 0..3 {
            text.push_str("0123456789");
            renderer.update(&text, false).await;
        }
        assert!(surface.edits.lock().unwrap().is_empty());

        text.push_str("0123456789");
        renderer.update(&text, false).await;
        assert_eq!(surface.edits.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn force_always_edits() {
        let surface = Arc::new(RecordingSurface::default());
        let mut renderer = IncrementalRenderer::new(surface.clone(), 40);

        renderer.update("hi", true).await;
        assert_eq!(surface.edits.lock().unwrap().as_slice(), ["hi"]);
    }

    #[tokio::test]
    async fn empty_text_renders_placeholder() {
        let surface = Arc::new(RecordingSurface::default());
        let mut renderer = IncrementalRenderer::new(surface.clone(), 40);

        renderer.update("", true).await;
        assert_eq!(surface.edits.lock().unwrap().as_slice(), [". . ."]);
    }

    #[tokio::test]
    async fn finish_paginates_overflow() {
        let surface = Arc::new(RecordingSurface::default());
        let mut renderer = IncrementalRenderer::new(surface.clone(), 40);

        let text = "x".repeat(4500);
        renderer.finish(&text).await;

        let edits = surface.edits.lock().unwrap();
        let followups = surface.followups.lock().unwrap();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].chars().count(), 2000);
        assert_eq!(followups.len(), 2);
        assert_eq!(followups[0].chars().count(), 2000);
        assert_eq!(followups[1].chars().count(), 500);
    }

    #[tokio::test]
    async fn in_stream_update_clamps_to_ceiling() {
        let surface = Arc::new(RecordingSurface::default());
        let mut renderer = IncrementalRenderer::new(surface.clone(), 40);

        let text = "y".repeat(2500);
        renderer.update(&text, true).await;

        let edits = surface.edits.lock().unwrap();
        assert_eq!(edits[0].chars().count(), 2000);
    }
}
