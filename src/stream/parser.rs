//! SSE parsing for OpenAI-compatible chat-completions streams.

use bytes::Bytes;
use futures::Stream;
use pin_project_lite::pin_project;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::{Error, Result};

/// One incremental chunk of a streamed chat completion.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    /// Present on the final chunk only.
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// Usage statistics reported by the provider on the final event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens_details: Option<CompletionTokensDetails>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionTokensDetails {
    #[serde(default)]
    pub reasoning_tokens: Option<u32>,
}

impl TokenUsage {
    /// Reasoning tokens consumed, if the provider reports them at all.
    /// `None` means the provider gave no reasoning accounting.
    pub fn reasoning_tokens(&self) -> Option<u32> {
        self.completion_tokens_details
            .and_then(|d| d.reasoning_tokens)
    }
}

pin_project! {
    /// Incremental SSE frame parser over raw response bytes.
    ///
    /// Buffers until a complete `\n\n`-delimited event is parseable and never
    /// forwards malformed fragments; unparseable frames are logged and
    /// skipped.
    pub struct SseParser<S> {
        #[pin]
        inner: S,
        buffer: Vec<u8>,
        pos: usize,
    }
}

impl<S> SseParser<S>
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>>,
{
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: Vec::with_capacity(4096),
            pos: 0,
        }
    }

    /// Position and length of the earliest event delimiter. SSE permits
    /// both bare-LF and CRLF line endings, so `\n\n` and `\r\n\r\n` are
    /// event boundaries.
    fn find_delimiter(buf: &[u8]) -> Option<(usize, usize)> {
        let lf = buf.windows(2).position(|w| w == b"\n\n");
        let crlf = buf.windows(4).position(|w| w == b"\r\n\r\n");
        match (lf, crlf) {
            (Some(l), Some(c)) if c < l => Some((c, 4)),
            (Some(l), _) => Some((l, 2)),
            (None, Some(c)) => Some((c, 4)),
            (None, None) => None,
        }
    }

    fn extract_json_data(event_block: &str) -> Option<&str> {
        for line in event_block.lines() {
            let line = line.trim();
            if let Some(json_str) = line.strip_prefix("data:") {
                let json_str = json_str.trim();
                if json_str == "[DONE]" || json_str.is_empty() {
                    return None;
                }
                return Some(json_str);
            }
        }
        None
    }

    fn parse_event(event_block: &str) -> Option<ChatChunk> {
        let trimmed = event_block.trim();
        if trimmed.is_empty() || trimmed.starts_with(':') {
            return None;
        }
        let json_str = Self::extract_json_data(event_block)?;
        serde_json::from_str::<ChatChunk>(json_str)
            .inspect_err(|e| {
                tracing::warn!("skipping unparseable stream event: {} - data: {}", e, json_str)
            })
            .ok()
    }
}

impl<S> Stream for SseParser<S>
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>>,
{
    type Item = Result<ChatChunk>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            let search_slice = &this.buffer[*this.pos..];
            if let Some((rel_pos, delim_len)) = Self::find_delimiter(search_slice) {
                let start_pos = *this.pos;
                let end_pos = start_pos + rel_pos;
                let event_block = match std::str::from_utf8(&this.buffer[start_pos..end_pos]) {
                    Ok(s) => s,
                    Err(e) => {
                        return Poll::Ready(Some(Err(Error::MalformedUpstreamResponse(
                            format!("invalid UTF-8 in event: {e}"),
                        ))));
                    }
                };

                let event = Self::parse_event(event_block);
                *this.pos = end_pos + delim_len;

                if this.buffer.len() > 8192 && *this.pos > this.buffer.len() / 2 {
                    this.buffer.drain(..*this.pos);
                    *this.pos = 0;
                }

                if let Some(event) = event {
                    return Poll::Ready(Some(Ok(event)));
                }
                continue;
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    if *this.pos > 0 && this.buffer.len() + bytes.len() > 16384 {
                        this.buffer.drain(..*this.pos);
                        *this.pos = 0;
                    }
                    this.buffer.extend_from_slice(&bytes);
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(Error::Network(e))));
                }
                Poll::Ready(None) => {
                    // Trailing frame without a final delimiter.
                    if *this.pos < this.buffer.len() {
                        let remaining = match std::str::from_utf8(&this.buffer[*this.pos..]) {
                            Ok(s) => s,
                            Err(_) => return Poll::Ready(None),
                        };
                        let event = Self::parse_event(remaining);
                        *this.pos = this.buffer.len();
                        if let Some(event) = event {
                            return Poll::Ready(Some(Ok(event)));
                        }
                    }
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    type EmptyStream = futures::stream::Empty<std::result::Result<Bytes, reqwest::Error>>;

    #[test]
    fn test_parse_content_delta() {
        let data = r#"data: {"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        let chunk = SseParser::<EmptyStream>::parse_event(data).unwrap();
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("Hello"));
    }

    #[test]
    fn test_parse_reasoning_delta() {
        let data = r#"data: {"choices":[{"delta":{"reasoning":"hmm"},"finish_reason":null}]}"#;
        let chunk = SseParser::<EmptyStream>::parse_event(data).unwrap();
        assert_eq!(chunk.choices[0].delta.reasoning.as_deref(), Some("hmm"));
        assert!(chunk.choices[0].delta.content.is_none());
    }

    #[test]
    fn test_parse_final_chunk_with_usage() {
        let data = r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}],"usage":{"prompt_tokens":100,"completion_tokens":50,"completion_tokens_details":{"reasoning_tokens":20}}}"#;
        let chunk = SseParser::<EmptyStream>::parse_event(data).unwrap();
        let usage = chunk.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 100);
        assert_eq!(usage.reasoning_tokens(), Some(20));
        assert_eq!(chunk.choices[0].finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_skip_done_marker() {
        assert!(SseParser::<EmptyStream>::parse_event("data: [DONE]").is_none());
    }

    #[test]
    fn test_skip_comment_and_empty() {
        assert!(SseParser::<EmptyStream>::parse_event(": keep-alive").is_none());
        assert!(SseParser::<EmptyStream>::parse_event("").is_none());
        assert!(SseParser::<EmptyStream>::parse_event("   \n  ").is_none());
    }

    #[test]
    fn test_malformed_frame_is_skipped_not_forwarded() {
        assert!(SseParser::<EmptyStream>::parse_event("data: {not json").is_none());
    }

    #[tokio::test]
    async fn test_fragmented_frames_are_buffered() {
        // One event split across three byte chunks.
        let frames: Vec<std::result::Result<Bytes, reqwest::Error>> = vec![
            Ok(Bytes::from_static(b"data: {\"choices\":[{\"delta\":")),
            Ok(Bytes::from_static(b"{\"content\":\"split\"},")),
            Ok(Bytes::from_static(b"\"finish_reason\":null}]}\n\n")),
        ];
        let mut parser = std::pin::pin!(SseParser::new(futures::stream::iter(frames)));

        let chunk = parser.next().await.unwrap().unwrap();
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("split"));
        assert!(parser.next().await.is_none());
    }

    #[tokio::test]
    async fn test_crlf_delimited_events_all_arrive() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"},\"finish_reason\":null}]}\r\n\r\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"b\"},\"finish_reason\":null}]}\r\n\r\n",
            "data: [DONE]\r\n\r\n",
        );
        let frames: Vec<std::result::Result<Bytes, reqwest::Error>> =
            vec![Ok(Bytes::from_static(body.as_bytes()))];
        let mut parser = std::pin::pin!(SseParser::new(futures::stream::iter(frames)));

        let mut text = String::new();
        while let Some(chunk) = parser.next().await {
            for choice in chunk.unwrap().choices {
                if let Some(delta) = choice.delta.content {
                    text.push_str(&delta);
                }
            }
        }
        assert_eq!(text, "ab");
    }

    #[test]
    fn test_incomplete_frame_stays_pending() {
        let (tx, rx) =
            futures::channel::mpsc::unbounded::<std::result::Result<Bytes, reqwest::Error>>();
        let mut parser = tokio_test::task::spawn(SseParser::new(rx));

        tx.unbounded_send(Ok(Bytes::from_static(
            b"data: {\"choices\":[{\"delta\":{\"content\":\"x\"},\"finish_reason\":null}]}",
        )))
        .unwrap();
        // No delimiter yet; nothing may be emitted.
        tokio_test::assert_pending!(parser.poll_next());

        tx.unbounded_send(Ok(Bytes::from_static(b"\n\n"))).unwrap();
        match tokio_test::assert_ready!(parser.poll_next()) {
            Some(Ok(chunk)) => {
                assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("x"));
            }
            other => panic!("expected a parsed chunk, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_repeated_runs_accumulate_identical_text() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"},\"finish_reason\":null}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"b\"},\"finish_reason\":null}]}\n\n",
            "data: [DONE]\n\n",
        );

        let mut runs = Vec::new();
        for _ in 0..2 {
            let frames: Vec<std::result::Result<Bytes, reqwest::Error>> =
                vec![Ok(Bytes::from_static(body.as_bytes()))];
            let mut parser = std::pin::pin!(SseParser::new(futures::stream::iter(frames)));
            let mut text = String::new();
            while let Some(chunk) = parser.next().await {
                for choice in chunk.unwrap().choices {
                    if let Some(delta) = choice.delta.content {
                        text.push_str(&delta);
                    }
                }
            }
            runs.push(text);
        }
        assert_eq!(runs[0], "ab");
        assert_eq!(runs[0], runs[1]);
    }
}
