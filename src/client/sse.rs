//! Server-Sent Events (SSE) stream handling.
//!
//! An [`EventStream`] wraps one open HTTP response and yields parsed
//! [`SseEvent`]s lazily. It is finite and cannot be restarted; dropping it
//! stops the background reader.

use futures::stream::{Stream, StreamExt};
use reqwest::header::CONTENT_TYPE;
use tokio::sync::mpsc;

use crate::error::TransportFailure;

use super::http::{content_type_is, header_text};

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseEvent {
    /// Value of the `event:` field, if sent.
    pub event: Option<String>,
    /// Concatenated `data:` lines, joined with `\n`.
    pub data: String,
    /// Value of the `id:` field, if sent.
    pub id: Option<String>,
}

impl SseEvent {
    /// Parse the data payload as JSON.
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.data).ok()
    }
}

/// A lazy sequence of server-sent events from one HTTP response.
///
/// # Example
///
/// ```no_run
/// # async fn example(mut stream: a2a_check::client::EventStream) {
/// while let Some(event) = stream.next().await {
///     match event {
///         Ok(event) => println!("got event: {}", event.data),
///         Err(e) => eprintln!("stream error: {}", e),
///     }
/// }
/// # }
/// ```
pub struct EventStream {
    status: u16,
    content_type: Option<String>,
    receiver: mpsc::Receiver<Result<SseEvent, TransportFailure>>,
    task: tokio::task::JoinHandle<()>,
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

impl EventStream {
    /// Wrap a `reqwest::Response` whose body is (supposedly) SSE.
    pub(crate) fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let content_type = header_text(response.headers(), CONTENT_TYPE);
        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).map_err(TransportFailure::from));
        Self::from_chunks(status, content_type, chunks)
    }

    /// Build a stream from raw body chunks.
    ///
    /// Spawns a background task that splits the chunks into SSE lines and
    /// sends dispatched events through a channel. Must be called inside a
    /// tokio runtime.
    pub fn from_chunks<S>(status: u16, content_type: Option<String>, chunks: S) -> Self
    where
        S: Stream<Item = Result<Vec<u8>, TransportFailure>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(64);

        let task = tokio::spawn(async move {
            if let Err(e) = pump(chunks, &tx).await {
                // Receiver may already be gone.
                let _ = tx.send(Err(e)).await;
            }
        });

        Self {
            status,
            content_type: content_type.map(|ct| ct.to_ascii_lowercase()),
            receiver: rx,
            task,
        }
    }

    /// HTTP status of the response that opened the stream.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Lower-cased `Content-Type` of the response, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Returns `true` if the response declared `text/event-stream`.
    pub fn is_event_stream(&self) -> bool {
        content_type_is(self.content_type.as_deref(), "text/event-stream")
    }

    /// Next event, or `None` once the server closed the stream.
    pub async fn next(&mut self) -> Option<Result<SseEvent, TransportFailure>> {
        self.receiver.recv().await
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn pump<S>(
    chunks: S,
    tx: &mpsc::Sender<Result<SseEvent, TransportFailure>>,
) -> Result<(), TransportFailure>
where
    S: Stream<Item = Result<Vec<u8>, TransportFailure>>,
{
    futures::pin_mut!(chunks);
    let mut parser = SseParser::default();

    while let Some(chunk) = chunks.next().await {
        for event in parser.feed(&chunk?) {
            if tx.send(Ok(event)).await.is_err() {
                return Ok(());
            }
        }
    }

    if let Some(event) = parser.finish() {
        let _ = tx.send(Ok(event)).await;
    }
    Ok(())
}

/// Incremental SSE line parser.
///
/// Bytes are buffered until a full line is available so multi-byte UTF-8
/// sequences split across chunks decode correctly.
#[derive(Debug, Default)]
pub(crate) struct SseParser {
    buffer: Vec<u8>,
    data: Vec<String>,
    event: Option<String>,
    id: Option<String>,
}

impl SseParser {
    /// Feed a chunk; returns every event completed by it.
    pub(crate) fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]).into_owned();
            let line = line.strip_suffix('\r').unwrap_or(line.as_str()).to_string();
            if let Some(event) = self.line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing event that was not terminated by a blank line.
    pub(crate) fn finish(mut self) -> Option<SseEvent> {
        if !self.buffer.is_empty() {
            let rest = String::from_utf8_lossy(&self.buffer).trim_end().to_string();
            self.buffer.clear();
            if !rest.is_empty() {
                self.line(&rest);
            }
        }
        self.dispatch()
    }

    fn line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        // Comments are keep-alives.
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            // `retry:` and unknown fields are ignored.
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if self.data.is_empty() {
            self.event = None;
            return None;
        }
        let event = SseEvent {
            event: self.event.take(),
            data: self.data.join("\n"),
            id: self.id.clone(),
        };
        self.data.clear();
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(input: &str) -> Vec<SseEvent> {
        let mut parser = SseParser::default();
        let mut events = parser.feed(input.as_bytes());
        events.extend(parser.finish());
        events
    }

    #[test]
    fn single_data_event() {
        let events = parse_all("data: {\"a\":1}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "{\"a\":1}");
        assert!(events[0].event.is_none());
    }

    #[test]
    fn event_name_and_id() {
        let events = parse_all("event: status\nid: 7\ndata: x\n\n");
        assert_eq!(events[0].event.as_deref(), Some("status"));
        assert_eq!(events[0].id.as_deref(), Some("7"));
    }

    #[test]
    fn multi_line_data_is_joined() {
        let events = parse_all("data: one\ndata: two\n\n");
        assert_eq!(events[0].data, "one\ntwo");
    }

    #[test]
    fn comments_and_retry_are_ignored() {
        let events = parse_all(": keepalive\nretry: 5000\n\ndata: x\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "x");
    }

    #[test]
    fn crlf_line_endings() {
        let events = parse_all("data: x\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "x");
    }

    #[test]
    fn trailing_event_without_blank_line() {
        let events = parse_all("data: tail");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "tail");
    }

    #[test]
    fn chunk_boundaries_do_not_matter() {
        let mut parser = SseParser::default();
        assert!(parser.feed(b"da").is_empty());
        assert!(parser.feed(b"ta: h\xc3").is_empty());
        let events = parser.feed(b"\xa9\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "h\u{e9}");
    }

    #[test]
    fn event_without_data_is_dropped() {
        let events = parse_all("event: ping\n\n");
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn stream_from_chunks_yields_events_then_ends() {
        let chunks = futures::stream::iter(vec![
            Ok::<_, TransportFailure>(b"data: 1\n\n".to_vec()),
            Ok(b"data: 2\n\n".to_vec()),
        ]);
        let mut stream =
            EventStream::from_chunks(200, Some("Text/Event-Stream".into()), chunks);
        assert!(stream.is_event_stream());
        assert_eq!(stream.next().await.unwrap().unwrap().data, "1");
        assert_eq!(stream.next().await.unwrap().unwrap().data, "2");
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn chunk_error_is_surfaced() {
        let chunks = futures::stream::iter(vec![
            Ok(b"data: 1\n\n".to_vec()),
            Err(TransportFailure::new(
                crate::error::FailureKind::Body,
                "reset",
            )),
        ]);
        let mut stream = EventStream::from_chunks(200, None, chunks);
        assert!(stream.next().await.unwrap().is_ok());
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
    }
}
