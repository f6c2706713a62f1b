//! Outbound announcement seam.
//!
//! The chat platform itself is an external collaborator: the schedule core
//! only ever talks to it through the [`Notifier`] and [`ChannelDirectory`]
//! traits defined here. [`send_chunked`] implements the platform message
//! limit: oversized bodies are split at a paragraph break, then a line
//! break, then a space, then hard-cut, in that order of preference.

use async_trait::async_trait;
use log::debug;
use mockall::automock;

/// Maximum length of a single outbound message.
pub const MAX_MESSAGE_LEN: usize = 2000;

/// Delivers a message body to a channel. Returns whether the send succeeded
/// so the caller can fall back to another destination.
#[automock]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, channel: &str, body: &str) -> bool;
}

/// Read-only view of a group's channels and the bot's send permission in
/// each, in the group's display order.
#[automock]
pub trait ChannelDirectory: Send + Sync {
    fn channels(&self) -> Vec<String>;
    fn can_send(&self, channel: &str) -> bool;
}

/// The first channel the bot may send messages in, if any.
pub fn first_sendable(directory: &dyn ChannelDirectory) -> Option<String> {
    directory
        .channels()
        .into_iter()
        .find(|channel| directory.can_send(channel))
}

/// Sends `body` to `channel`, splitting it into chunks of at most
/// [`MAX_MESSAGE_LEN`].
///
/// # Arguments
///
/// * `notifier` - Destination the chunks are sent through, in order
/// * `channel` - Channel identifier passed through to the notifier
/// * `body` - Message body; split at a paragraph break, then a line break,
///   then a space, then hard-cut, whichever comes first below the limit
///
/// # Returns
///
/// `true` if every chunk was sent. Stops and returns `false` as soon as one
/// chunk fails, leaving the remainder unsent.
pub async fn send_chunked(notifier: &dyn Notifier, channel: &str, body: &str) -> bool {
    let mut rest = body;
    while rest.len() > MAX_MESSAGE_LEN {
        let split = split_index(rest);
        debug!("splitting oversized announcement at byte {split}");
        if !notifier.send(channel, &rest[..split]).await {
            return false;
        }
        rest = &rest[split..];
    }

    notifier.send(channel, rest).await
}

/// Byte index to split an oversized body at: just after the last paragraph
/// break before the limit, else the last line break, else the last space,
/// else a hard cut at the limit (moved back to a char boundary).
fn split_index(body: &str) -> usize {
    let limit = floor_char_boundary(body, MAX_MESSAGE_LEN);
    let window = &body[..limit];
    for separator in ["\n\n", "\n", " "] {
        if let Some(found) = window.rfind(separator) {
            return found + 1;
        }
    }

    limit
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::Mutex;

    /// Notifier that records every chunk it is asked to send.
    struct RecordingNotifier {
        sent: Arc<Mutex<Vec<String>>>,
        succeed: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, _channel: &str, body: &str) -> bool {
            self.sent.lock().unwrap().push(body.to_string());
            self.succeed
        }
    }

    fn recording(succeed: bool) -> (RecordingNotifier, Arc<Mutex<Vec<String>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        (
            RecordingNotifier {
                sent: Arc::clone(&sent),
                succeed,
            },
            sent,
        )
    }

    #[tokio::test]
    async fn test_short_body_sent_whole() {
        let (notifier, sent) = recording(true);

        assert!(send_chunked(&notifier, "general", "short").await);
        assert_eq!(sent.lock().unwrap().as_slice(), &["short".to_string()]);
    }

    #[tokio::test]
    async fn test_splits_at_paragraph_break() {
        let (notifier, sent) = recording(true);
        let body = format!("{}\n\n{}", "a".repeat(1500), "b".repeat(1500));

        assert!(send_chunked(&notifier, "general", &body).await);
        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].ends_with("a\n"));
        assert!(sent[1].starts_with("\nb"));
        assert!(sent.iter().all(|chunk| chunk.len() <= MAX_MESSAGE_LEN));
    }

    #[tokio::test]
    async fn test_prefers_line_break_over_space() {
        let (notifier, sent) = recording(true);
        let body = format!("{} word\n{}", "a".repeat(1200), "b".repeat(1500));

        assert!(send_chunked(&notifier, "general", &body).await);
        let sent = sent.lock().unwrap();
        assert!(sent[0].ends_with("word\n"));
    }

    #[tokio::test]
    async fn test_hard_cut_without_separators() {
        let (notifier, sent) = recording(true);
        let body = "x".repeat(MAX_MESSAGE_LEN + 10);

        assert!(send_chunked(&notifier, "general", &body).await);
        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].len(), MAX_MESSAGE_LEN);
        assert_eq!(sent[1].len(), 10);
    }

    #[tokio::test]
    async fn test_hard_cut_respects_char_boundaries() {
        let (notifier, sent) = recording(true);
        // Multi-byte characters straddling the limit must not split a char.
        let body = "é".repeat(MAX_MESSAGE_LEN);

        assert!(send_chunked(&notifier, "general", &body).await);
        for chunk in sent.lock().unwrap().iter() {
            assert!(chunk.len() <= MAX_MESSAGE_LEN);
            assert!(chunk.is_char_boundary(chunk.len()));
        }
    }

    #[tokio::test]
    async fn test_stops_on_failed_chunk() {
        let (notifier, sent) = recording(false);
        let body = "x".repeat(MAX_MESSAGE_LEN * 2);

        assert!(!send_chunked(&notifier, "general", &body).await);
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_first_sendable_skips_denied_channels() {
        let mut directory = MockChannelDirectory::new();
        directory
            .expect_channels()
            .returning(|| vec!["rules".to_string(), "general".to_string()]);
        directory
            .expect_can_send()
            .returning(|channel| channel == "general");

        assert_eq!(first_sendable(&directory), Some("general".to_string()));
    }

    #[test]
    fn test_first_sendable_may_be_none() {
        let mut directory = MockChannelDirectory::new();
        directory.expect_channels().returning(Vec::new);

        assert_eq!(first_sendable(&directory), None);
    }
}
