//! Request dispatch with bounded-duration streaming.
//!
//! The connection is held open with incremental event consumption so that
//! intermediary proxies do not drop it during long reasoning pauses; a
//! single-shot request would hit idle-connection limits on reasoning-heavy
//! responses even when total wall-clock time is within the deadline.

use std::pin::pin;
use std::time::Duration;

use futures::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::time::{Instant, timeout_at};

use super::parser::{SseParser, TokenUsage};
use crate::Error;
use crate::request::ChatRequest;

/// Terminal result of one dispatched request.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamOutcome {
    Complete {
        text: String,
        reasoning_text: String,
        usage: Option<TokenUsage>,
    },
    /// Deadline expired after data had accumulated; partial results kept.
    Truncated {
        partial_text: String,
        elapsed: Duration,
        reason: String,
    },
    /// Deadline expired before any data accumulated.
    TimedOut { elapsed: Duration },
    Failed { kind: FailureKind, detail: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    AuthFailure,
    RateLimited,
    NetworkFailure,
    UpstreamServerError,
    MalformedUpstreamResponse,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::AuthFailure => "authentication failure",
            FailureKind::RateLimited => "rate limited",
            FailureKind::NetworkFailure => "network failure",
            FailureKind::UpstreamServerError => "upstream server error",
            FailureKind::MalformedUpstreamResponse => "malformed upstream response",
        };
        f.write_str(s)
    }
}

/// Connection lifecycle; all four `StreamOutcome` variants are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispatchState {
    Connecting,
    Streaming,
}

pub(crate) fn classify_status(status: u16) -> FailureKind {
    match status {
        401 | 403 => FailureKind::AuthFailure,
        429 => FailureKind::RateLimited,
        500..=599 => FailureKind::UpstreamServerError,
        _ => FailureKind::MalformedUpstreamResponse,
    }
}

fn classify_error(error: &Error) -> FailureKind {
    match error {
        Error::Network(_) => FailureKind::NetworkFailure,
        _ => FailureKind::MalformedUpstreamResponse,
    }
}

/// Non-streaming response body, for descriptors without streaming support.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ResponseChoice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct ResponseChoice {
    #[serde(default)]
    message: ResponseMessage,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Execute one request under a total deadline covering connect and stream.
///
/// Never returns an error: every failure path is folded into the outcome.
/// Dropping the in-flight future on deadline expiry releases the underlying
/// connection.
pub async fn dispatch(
    client: &reqwest::Client,
    endpoint: &str,
    api_key: &SecretString,
    request: &ChatRequest,
    deadline: Duration,
) -> StreamOutcome {
    let started = Instant::now();
    let deadline_at = started + deadline;
    let mut state = DispatchState::Connecting;
    tracing::debug!(model = %request.model, ?deadline, "dispatching consultation request");

    let send = client
        .post(endpoint)
        .bearer_auth(api_key.expose_secret())
        .json(request)
        .send();

    let response = match timeout_at(deadline_at, send).await {
        Err(_) => {
            return StreamOutcome::TimedOut {
                elapsed: started.elapsed(),
            };
        }
        Ok(Err(e)) => {
            return StreamOutcome::Failed {
                kind: FailureKind::NetworkFailure,
                detail: e.to_string(),
            };
        }
        Ok(Ok(response)) => response,
    };

    let status = response.status();
    if !status.is_success() {
        // Attach the body as diagnostic detail; it names the upstream cause.
        let body = match timeout_at(deadline_at, response.text()).await {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => format!("<unreadable body: {e}>"),
            Err(_) => "<body read timed out>".to_string(),
        };
        return StreamOutcome::Failed {
            kind: classify_status(status.as_u16()),
            detail: format!("HTTP {}: {}", status.as_u16(), body),
        };
    }

    if request.stream != Some(true) {
        return dispatch_single_shot(response, deadline_at, started).await;
    }

    let mut parser = pin!(SseParser::new(response.bytes_stream()));
    let mut text = String::new();
    let mut reasoning_text = String::new();
    let mut usage: Option<TokenUsage> = None;
    let mut finish_reason: Option<String> = None;
    let mut events: u64 = 0;

    loop {
        match timeout_at(deadline_at, parser.next()).await {
            Err(_) => {
                let elapsed = started.elapsed();
                // Reasoning deltas alone give the caller nothing to read;
                // only visible text makes a partial answer.
                if text.is_empty() {
                    return StreamOutcome::TimedOut { elapsed };
                }
                tracing::warn!(
                    events,
                    accumulated = text.len(),
                    "deadline expired mid-stream, returning partial text"
                );
                return StreamOutcome::Truncated {
                    partial_text: text,
                    elapsed,
                    reason: "deadline expired while streaming".into(),
                };
            }
            Ok(None) => break,
            Ok(Some(Ok(chunk))) => {
                if state == DispatchState::Connecting {
                    state = DispatchState::Streaming;
                    tracing::debug!("first event received, streaming");
                }
                events += 1;
                for choice in chunk.choices {
                    if let Some(delta) = choice.delta.content {
                        text.push_str(&delta);
                    }
                    if let Some(delta) = choice.delta.reasoning {
                        reasoning_text.push_str(&delta);
                    }
                    if choice.finish_reason.is_some() {
                        finish_reason = choice.finish_reason;
                    }
                }
                if chunk.usage.is_some() {
                    usage = chunk.usage;
                }
            }
            Ok(Some(Err(e))) => {
                if events == 0 {
                    return StreamOutcome::Failed {
                        kind: classify_error(&e),
                        detail: e.to_string(),
                    };
                }
                // Events already landed; what accumulated has value.
                return StreamOutcome::Truncated {
                    partial_text: text,
                    elapsed: started.elapsed(),
                    reason: format!("connection lost mid-stream: {e}"),
                };
            }
        }
    }

    if text.is_empty() {
        return StreamOutcome::Failed {
            kind: FailureKind::MalformedUpstreamResponse,
            detail: "no content received from endpoint (empty response)".into(),
        };
    }

    if let Some(reason) = finish_reason.as_deref()
        && reason != "stop"
    {
        tracing::warn!(finish_reason = reason, "non-stop finish reason, output may be cut");
    }

    StreamOutcome::Complete {
        text,
        reasoning_text,
        usage,
    }
}

async fn dispatch_single_shot(
    response: reqwest::Response,
    deadline_at: Instant,
    started: Instant,
) -> StreamOutcome {
    let parsed = match timeout_at(deadline_at, response.json::<ChatResponse>()).await {
        Err(_) => {
            return StreamOutcome::TimedOut {
                elapsed: started.elapsed(),
            };
        }
        Ok(Err(e)) => {
            return StreamOutcome::Failed {
                kind: FailureKind::MalformedUpstreamResponse,
                detail: e.to_string(),
            };
        }
        Ok(Ok(parsed)) => parsed,
    };

    let Some(choice) = parsed.choices.into_iter().next() else {
        return StreamOutcome::Failed {
            kind: FailureKind::MalformedUpstreamResponse,
            detail: "response contained no choices".into(),
        };
    };
    match choice.message.content {
        Some(text) if !text.is_empty() => StreamOutcome::Complete {
            text,
            reasoning_text: choice.message.reasoning.unwrap_or_default(),
            usage: parsed.usage,
        },
        _ => StreamOutcome::Failed {
            kind: FailureKind::MalformedUpstreamResponse,
            detail: "no content received from endpoint (empty response)".into(),
        },
    }
}
