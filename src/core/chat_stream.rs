use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;
use std::time::Duration;

use futures_util::stream::{self, Stream, StreamExt};
use memchr::memchr;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::api::ChatResponse;
use crate::core::app::{AppAction, AppActionDispatcher};
use crate::core::client::{describe_transport_failure, OllamaClient, TransportError};
use crate::core::message::{Message, ToolCallRequest};
use crate::tools::ToolDefinition;

/// One unit of a streamed chat response.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamFragment {
    ContentDelta(String),
    ToolCalls(Vec<ToolCallRequest>),
    Done,
    Error(String),
}

impl StreamFragment {
    /// `Done` and `Error` end a stream; nothing follows them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamFragment::Done | StreamFragment::Error(_))
    }
}

/// Splits a byte stream into newline-delimited lines, tolerating lines that
/// straddle network chunks.
#[derive(Debug, Default)]
pub struct NdjsonLines {
    buffer: Vec<u8>,
}

impl NdjsonLines {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(newline_pos) = memchr(b'\n', &self.buffer) {
            let raw: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            if let Some(line) = decode_utf8_line(&raw[..newline_pos]) {
                lines.push(line);
            }
        }
        lines
    }

    /// Returns whatever is left once the body ends without a final newline.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.buffer);
        decode_utf8_line(&raw)
    }
}

fn decode_utf8_line(raw: &[u8]) -> Option<String> {
    match std::str::from_utf8(raw) {
        Ok(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Err(e) => {
            debug!(error = %e, "Skipping stream line with invalid UTF-8");
            None
        }
    }
}

/// Decode one NDJSON line into the fragments it carries, in order:
/// content, tool calls, then the completion marker.
pub fn decode_line(line: &str) -> Result<Vec<StreamFragment>, serde_json::Error> {
    let response: ChatResponse = serde_json::from_str(line)?;
    Ok(fragments_from_response(response))
}

pub(crate) fn fragments_from_response(response: ChatResponse) -> Vec<StreamFragment> {
    if let Some(error) = response.error {
        return vec![StreamFragment::Error(format!("Ollama error: {}", error.trim()))];
    }

    let mut fragments = Vec::new();
    if let Some(message) = response.message {
        if let Some(content) = message.content.filter(|content| !content.is_empty()) {
            fragments.push(StreamFragment::ContentDelta(content));
        }
        if let Some(calls) = message.tool_calls.filter(|calls| !calls.is_empty()) {
            fragments.push(StreamFragment::ToolCalls(
                calls.into_iter().map(ToolCallRequest::from).collect(),
            ));
        }
    }
    if response.done {
        fragments.push(StreamFragment::Done);
    }
    fragments
}

struct FragmentState<S> {
    bytes: Pin<Box<S>>,
    lines: NdjsonLines,
    queued: VecDeque<StreamFragment>,
    finished: bool,
    idle_timeout: Duration,
}

impl<S> FragmentState<S> {
    fn enqueue_line(&mut self, line: &str) {
        match decode_line(line) {
            Ok(fragments) => self.queued.extend(fragments),
            Err(e) => debug!(error = %e, line, "Skipping undecodable stream line"),
        }
    }
}

/// Turn a raw response body into a lazy sequence of fragments.
///
/// Malformed lines are skipped; a read failure, or no data for
/// `idle_timeout`, becomes a terminal error fragment. The sequence ends
/// after the first terminal fragment.
pub fn fragment_stream<S, B, E>(
    bytes: S,
    idle_timeout: Duration,
) -> impl Stream<Item = StreamFragment> + Send + 'static
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = FragmentState {
        bytes: Box::pin(bytes),
        lines: NdjsonLines::default(),
        queued: VecDeque::new(),
        finished: false,
        idle_timeout,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(fragment) = state.queued.pop_front() {
                if fragment.is_terminal() {
                    state.queued.clear();
                    state.finished = true;
                }
                return Some((fragment, state));
            }

            if state.finished {
                return None;
            }

            let next = tokio::time::timeout(state.idle_timeout, state.bytes.next()).await;
            let Ok(next) = next else {
                let error = TransportError::Timeout(state.idle_timeout);
                state
                    .queued
                    .push_back(StreamFragment::Error(describe_transport_failure(&error)));
                continue;
            };
            match next {
                Some(Ok(chunk)) => {
                    for line in state.lines.push(chunk.as_ref()) {
                        state.enqueue_line(&line);
                    }
                }
                Some(Err(e)) => {
                    state
                        .queued
                        .push_back(StreamFragment::Error(describe_transport_failure(&e)));
                }
                None => {
                    if let Some(line) = state.lines.finish() {
                        state.enqueue_line(&line);
                    }
                    state.finished = true;
                }
            }
        }
    })
}

#[derive(Debug, Clone)]
pub struct StreamParams {
    pub model: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub stream_id: u64,
}

/// Runs one background task per stream and forwards its fragments to the
/// orchestrator as actions.
#[derive(Clone)]
pub struct ChatStreamService {
    client: OllamaClient,
    dispatcher: AppActionDispatcher,
}

impl ChatStreamService {
    pub fn new(client: OllamaClient, dispatcher: AppActionDispatcher) -> Self {
        Self { client, dispatcher }
    }

    pub fn spawn_stream(&self, params: StreamParams) -> JoinHandle<()> {
        let StreamParams {
            model,
            messages,
            tools,
            stream_id,
        } = params;
        let fragments = self.client.stream_chat(&model, &messages, &tools);
        let dispatcher = self.dispatcher.clone();
        tokio::spawn(forward_fragments(fragments, dispatcher, stream_id))
    }
}

pub(crate) async fn forward_fragments<S>(
    fragments: S,
    dispatcher: AppActionDispatcher,
    stream_id: u64,
) where
    S: Stream<Item = StreamFragment>,
{
    let mut fragments = Box::pin(fragments);
    while let Some(fragment) = fragments.next().await {
        let terminal = fragment.is_terminal();
        dispatcher.dispatch(AppAction::StreamFragment {
            fragment,
            stream_id,
        });
        if terminal {
            return;
        }
    }

    // Body closed cleanly without `done`; close the turn anyway.
    debug!(stream_id, "Stream ended without a completion marker");
    dispatcher.dispatch(AppAction::StreamFragment {
        fragment: StreamFragment::Done,
        stream_id,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc;

    const TEST_IDLE_TIMEOUT: Duration = Duration::from_secs(5);

    fn body(chunks: &[&[u8]]) -> impl Stream<Item = Result<Vec<u8>, std::io::Error>> {
        stream::iter(
            chunks
                .iter()
                .map(|chunk| Ok(chunk.to_vec()))
                .collect::<Vec<_>>(),
        )
    }

    async fn collect(chunks: &[&[u8]]) -> Vec<StreamFragment> {
        fragment_stream(body(chunks), TEST_IDLE_TIMEOUT).collect().await
    }

    #[test]
    fn decode_line_orders_content_tool_calls_and_done() {
        let line = r#"{"message":{"role":"assistant","content":"ok","tool_calls":[{"function":{"name":"lookup","arguments":{"q":"btc"}}}]},"done":true}"#;
        let fragments = decode_line(line).expect("decode");
        assert_eq!(fragments.len(), 3);
        assert_eq!(fragments[0], StreamFragment::ContentDelta("ok".into()));
        match &fragments[1] {
            StreamFragment::ToolCalls(calls) => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].name, "lookup");
                assert_eq!(calls[0].arguments.get("q"), Some(&json!("btc")));
            }
            other => panic!("expected tool calls, got {:?}", other),
        }
        assert_eq!(fragments[2], StreamFragment::Done);
    }

    #[test]
    fn decode_line_drops_empty_content_and_maps_server_errors() {
        let fragments = decode_line(r#"{"message":{"content":""},"done":false}"#).expect("decode");
        assert!(fragments.is_empty());

        let fragments =
            decode_line(r#"{"error":"model 'nope' not found"}"#).expect("decode");
        assert_eq!(
            fragments,
            vec![StreamFragment::Error("Ollama error: model 'nope' not found".into())]
        );
    }

    #[test]
    fn ndjson_lines_reassemble_split_chunks() {
        let mut lines = NdjsonLines::default();
        assert!(lines.push(br#"{"done":"#).is_empty());
        assert_eq!(lines.push(b"false}\n\n{\"a\""), vec![r#"{"done":false}"#]);
        assert_eq!(lines.finish().as_deref(), Some(r#"{"a""#));
        assert_eq!(lines.finish(), None);
    }

    #[tokio::test]
    async fn malformed_line_does_not_end_the_stream() {
        let fragments = collect(&[
            b"{\"message\":{\"content\":\"2+2\"},\"done\":false}\n",
            b"this is not json\n",
            b"{\"message\":{\"content\":\" is 4\"},\"done\":false}\n",
            b"{\"message\":{\"content\":\"\"},\"done\":true}\n",
        ])
        .await;

        assert_eq!(
            fragments,
            vec![
                StreamFragment::ContentDelta("2+2".into()),
                StreamFragment::ContentDelta(" is 4".into()),
                StreamFragment::Done,
            ]
        );
    }

    #[tokio::test]
    async fn lines_split_across_chunks_and_trailing_line_are_decoded() {
        let fragments = collect(&[
            b"{\"message\":{\"con",
            b"tent\":\"Hel\"},\"done\":false}\n{\"message\":",
            b"{\"content\":\"lo\"},\"done\":false}\n",
            b"\xff\xfe\n",
            b"{\"done\":true}",
        ])
        .await;

        assert_eq!(
            fragments,
            vec![
                StreamFragment::ContentDelta("Hel".into()),
                StreamFragment::ContentDelta("lo".into()),
                StreamFragment::Done,
            ]
        );
    }

    #[tokio::test]
    async fn nothing_is_yielded_after_a_terminal_fragment() {
        let fragments = collect(&[
            b"{\"message\":{\"content\":\"a\"},\"done\":true}\n",
            b"{\"message\":{\"content\":\"late\"},\"done\":false}\n",
        ])
        .await;
        assert_eq!(
            fragments,
            vec![StreamFragment::ContentDelta("a".into()), StreamFragment::Done]
        );

        let fragments = collect(&[
            b"{\"error\":\"out of memory\"}\n",
            b"{\"done\":true}\n",
        ])
        .await;
        assert_eq!(
            fragments,
            vec![StreamFragment::Error("Ollama error: out of memory".into())]
        );
    }

    #[tokio::test]
    async fn read_failures_become_terminal_error_fragments() {
        let chunks: Vec<Result<Vec<u8>, std::io::Error>> = vec![
            Ok(b"{\"message\":{\"content\":\"partial\"},\"done\":false}\n".to_vec()),
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            )),
            Ok(b"{\"done\":true}\n".to_vec()),
        ];
        let fragments: Vec<_> = fragment_stream(stream::iter(chunks), TEST_IDLE_TIMEOUT)
            .collect()
            .await;

        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0], StreamFragment::ContentDelta("partial".into()));
        match &fragments[1] {
            StreamFragment::Error(text) => {
                assert!(text.starts_with("Error communicating with Ollama"));
                assert!(text.contains("connection reset"));
            }
            other => panic!("expected error fragment, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn silence_past_the_idle_timeout_ends_the_stream() {
        let first: Result<Vec<u8>, std::io::Error> =
            Ok(b"{\"message\":{\"content\":\"Hel\"},\"done\":false}\n".to_vec());
        let stalled = stream::iter(vec![first]).chain(stream::pending());

        let fragments: Vec<_> = fragment_stream(stalled, Duration::from_millis(200))
            .collect()
            .await;

        assert_eq!(
            fragments,
            vec![
                StreamFragment::ContentDelta("Hel".into()),
                StreamFragment::Error(
                    "Error communicating with Ollama: no response from server for 200ms".into()
                ),
            ]
        );
    }

    #[tokio::test]
    async fn forwarding_tags_fragments_and_closes_unfinished_streams() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = AppActionDispatcher::new(tx);
        let fragments = stream::iter(vec![StreamFragment::ContentDelta("hi".into())]);

        forward_fragments(fragments, dispatcher, 7).await;

        let mut received = Vec::new();
        while let Ok(action) = rx.try_recv() {
            match action {
                AppAction::StreamFragment {
                    fragment,
                    stream_id,
                } => {
                    assert_eq!(stream_id, 7);
                    received.push(fragment);
                }
                _ => panic!("unexpected action"),
            }
        }
        assert_eq!(
            received,
            vec![StreamFragment::ContentDelta("hi".into()), StreamFragment::Done]
        );
    }
}
