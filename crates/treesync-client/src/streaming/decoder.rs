//! Event frame decoder
//!
//! Parses the line-oriented event-stream wire format into [`EventFrame`]s:
//!
//! ```text
//! event: put
//! data: {"path":"/","data":{"a":1}}
//!
//! ```
//!
//! Lines following a `data:` line without their own prefix are continuation
//! lines and are appended to the payload, newline-joined.

use futures::stream::{Stream, StreamExt};
use tracing::trace;

use super::types::{EventFrame, FrameKind, StreamError, StreamResult};

/// Longest incomplete line held between chunks
pub const MAX_LINE_BYTES: usize = 16 * 1024 * 1024;

/// Decoder state: only the in-progress frame
#[derive(Debug)]
pub struct FrameDecoder {
    /// Bytes of an incomplete line
    buffer: Vec<u8>,
    /// Leading bytes of `buffer` already known to hold no line break
    scanned: usize,
    max_line: usize,
    /// Kind from the pending `event:` header
    kind: Option<FrameKind>,
    /// Payload accumulated so far, `None` until the first `data:` line
    data: Option<String>,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }
}

/// Returns the value of `line` if it is the field `name`, with the single
/// optional space after the colon removed.
fn field_value<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let value = line.strip_prefix(name)?.strip_prefix(':')?;
    Some(value.strip_prefix(' ').unwrap_or(value))
}

impl FrameDecoder {
    /// Create a new decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a decoder that rejects lines longer than `max_line` bytes
    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            max_line,
            kind: None,
            data: None,
        }
    }

    /// Feed bytes into the decoder and extract any complete frames
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<StreamResult<EventFrame>> {
        let mut frames = Vec::new();
        let mut buffer = std::mem::take(&mut self.buffer);
        buffer.extend_from_slice(bytes);

        let mut start = 0;
        let mut scan = self.scanned;
        while let Some(offset) = buffer[scan..].iter().position(|&b| b == b'\n') {
            let end = scan + offset;
            let mut line = &buffer[start..end];
            if let Some(stripped) = line.strip_suffix(b"\r") {
                line = stripped;
            }

            let result = match std::str::from_utf8(line) {
                Ok(line) => self.push_line(line),
                Err(_) => {
                    self.reset();
                    Err(StreamError::Protocol("Invalid UTF-8 in event stream".into()))
                }
            };

            match result {
                Ok(Some(frame)) => frames.push(Ok(frame)),
                Ok(None) => {}
                Err(e) => frames.push(Err(e)),
            }

            start = end + 1;
            scan = start;
        }

        buffer.drain(..start);
        if buffer.len() > self.max_line {
            buffer.clear();
            self.reset();
            frames.push(Err(StreamError::Protocol(format!(
                "event stream line exceeds {} bytes",
                self.max_line
            ))));
        }
        self.scanned = buffer.len();
        self.buffer = buffer;

        frames
    }

    /// Process one line (without its line terminator)
    pub fn push_line(&mut self, line: &str) -> StreamResult<Option<EventFrame>> {
        // Blank line terminates the frame
        if line.is_empty() {
            return Ok(self.flush());
        }

        if line.starts_with(':') {
            trace!("Event stream comment");
            return Ok(None);
        }

        if let Some(tag) = field_value(line, "event") {
            let pending = self.flush();
            if pending.is_some() {
                trace!("Event header without blank line, flushed open frame");
            }
            self.kind = Some(FrameKind::from_tag(tag));
            return Ok(pending);
        }

        if let Some(value) = field_value(line, "data") {
            if self.kind.is_none() {
                self.reset();
                return Err(StreamError::Protocol(
                    "data line without a pending event header".into(),
                ));
            }
            self.append(value);
            return Ok(None);
        }

        if field_value(line, "id").is_some() || field_value(line, "retry").is_some() {
            trace!("Ignoring event stream field: {}", line);
            return Ok(None);
        }

        if self.kind.is_some() && self.data.is_some() {
            self.append(line);
            return Ok(None);
        }

        self.reset();
        let preview: String = line.chars().take(100).collect();
        Err(StreamError::Protocol(format!(
            "unexpected line in event stream: {preview}"
        )))
    }

    /// End of input. A partially accumulated frame is dropped.
    pub fn finish(&mut self) {
        if self.kind.is_some() || !self.buffer.is_empty() {
            trace!("Event stream ended inside a frame, discarding it");
        }
        self.reset();
        self.buffer.clear();
        self.scanned = 0;
    }

    fn append(&mut self, value: &str) {
        match &mut self.data {
            Some(data) => {
                data.push('\n');
                data.push_str(value);
            }
            None => self.data = Some(value.to_string()),
        }
    }

    fn flush(&mut self) -> Option<EventFrame> {
        let kind = self.kind.take()?;
        let data = self.data.take().unwrap_or_default();
        trace!(kind = %kind, len = data.len(), "Decoded frame");
        Some(EventFrame::new(kind, data))
    }

    fn reset(&mut self) {
        self.kind = None;
        self.data = None;
    }
}

/// Decode a byte stream into a stream of frames.
///
/// The frame stream ends when the byte stream ends; a byte stream error is
/// yielded once and then ends the frame stream.
pub fn decode_frames<S, B, E>(bytes: S) -> impl Stream<Item = StreamResult<EventFrame>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Into<StreamError> + Send,
{
    async_stream::stream! {
        let mut decoder = FrameDecoder::new();
        let mut bytes = Box::pin(bytes);

        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(chunk) => {
                    for frame in decoder.feed(chunk.as_ref()) {
                        yield frame;
                    }
                }
                Err(e) => {
                    yield Err(e.into());
                    return;
                }
            }
        }

        decoder.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::stream;

    fn frames(decoder: &mut FrameDecoder, input: &str) -> Vec<EventFrame> {
        decoder
            .feed(input.as_bytes())
            .into_iter()
            .map(|r| r.unwrap())
            .collect()
    }

    #[test]
    fn test_decode_put_frame() {
        let mut decoder = FrameDecoder::new();
        let out = frames(
            &mut decoder,
            "event: put\ndata: {\"path\":\"/\",\"data\":{\"a\":1}}\n\n",
        );

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, FrameKind::Put);
        assert_eq!(out[0].data, r#"{"path":"/","data":{"a":1}}"#);
    }

    #[test]
    fn test_decode_multiple_frames() {
        let mut decoder = FrameDecoder::new();
        let input = "event: keep-alive\ndata: null\n\nevent: patch\ndata: {}\n\n";
        let out = frames(&mut decoder, input);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0], EventFrame::new(FrameKind::KeepAlive, "null"));
        assert_eq!(out[1], EventFrame::new(FrameKind::Patch, "{}"));
    }

    #[test]
    fn test_decode_chunked_data() {
        let mut decoder = FrameDecoder::new();

        assert!(frames(&mut decoder, "event: put\r\ndata: {\"pa").is_empty());
        assert!(frames(&mut decoder, "th\":\"/x\",\"data\":1}\r").is_empty());
        let out = frames(&mut decoder, "\n\r\n");

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].data, r#"{"path":"/x","data":1}"#);
    }

    #[test]
    fn test_decode_split_utf8() {
        let mut decoder = FrameDecoder::new();
        let input = "event: put\ndata: \"héllo\"\n\n".as_bytes();
        // Split inside the two-byte 'é'
        let split = input.iter().position(|&b| b == 0xC3).unwrap() + 1;

        assert!(decoder.feed(&input[..split]).is_empty());
        let out = decoder.feed(&input[split..]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].as_ref().unwrap().data, "\"héllo\"");
    }

    #[test]
    fn test_continuation_lines_are_joined() {
        let mut decoder = FrameDecoder::new();
        let input = "event: put\ndata: {\"path\": \"/\",\n  \"data\": 1\n}\n\n";
        let out = frames(&mut decoder, input);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].data, "{\"path\": \"/\",\n  \"data\": 1\n}");
    }

    #[test]
    fn test_multiple_data_lines_are_joined() {
        let mut decoder = FrameDecoder::new();
        let out = frames(&mut decoder, "event: put\ndata: a\ndata: b\n\n");
        assert_eq!(out[0].data, "a\nb");
    }

    #[test]
    fn test_ignore_comments_and_blank_lines() {
        let mut decoder = FrameDecoder::new();
        let out = frames(&mut decoder, ":\n\n: ping\n\nevent: keep-alive\ndata: null\n\n");
        assert_eq!(out, vec![EventFrame::new(FrameKind::KeepAlive, "null")]);
    }

    #[test]
    fn test_unknown_kind_is_other() {
        let mut decoder = FrameDecoder::new();
        let out = frames(&mut decoder, "event: rules_debug\ndata: x\n\n");
        assert_eq!(out[0].kind, FrameKind::Other("rules_debug".into()));
    }

    #[test]
    fn test_header_flushes_open_frame() {
        let mut decoder = FrameDecoder::new();
        let out = frames(&mut decoder, "event: put\ndata: 1\nevent: patch\ndata: 2\n\n");
        assert_eq!(
            out,
            vec![
                EventFrame::new(FrameKind::Put, "1"),
                EventFrame::new(FrameKind::Patch, "2"),
            ]
        );
    }

    #[test]
    fn test_overlong_line_is_dropped() {
        let mut decoder = FrameDecoder::with_max_line(16);
        assert!(decoder.feed(b"event: put\ndata: 0123").is_empty());

        let out = decoder.feed(b"456789abcdef");
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], Err(StreamError::Protocol(_))));

        // The decoder starts over with the next frame
        let out = frames(&mut decoder, "\nevent: keep-alive\ndata: null\n\n");
        assert_eq!(out, vec![EventFrame::new(FrameKind::KeepAlive, "null")]);
    }

    #[test]
    fn test_many_lines_in_one_chunk() {
        let mut decoder = FrameDecoder::new();
        let input = "event: keep-alive\ndata: null\n\n".repeat(1000);
        assert_eq!(frames(&mut decoder, &input).len(), 1000);
    }

    #[test]
    fn test_data_without_header_is_protocol_error() {
        let mut decoder = FrameDecoder::new();
        let out = decoder.feed(b"data: {\"ts\":1}\n\n");
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], Err(StreamError::Protocol(_))));
    }

    #[test]
    fn test_stray_line_is_protocol_error() {
        let mut decoder = FrameDecoder::new();
        assert!(matches!(
            decoder.push_line("garbage"),
            Err(StreamError::Protocol(_))
        ));
        // A header with no data yet does not accept continuation lines either
        decoder.push_line("event: put").unwrap();
        assert!(decoder.push_line("garbage").is_err());
    }

    #[test]
    fn test_invalid_utf8_is_protocol_error() {
        let mut decoder = FrameDecoder::new();
        let out = decoder.feed(b"event: put\ndata: \xff\xfe\n\n");
        assert!(out.iter().any(|r| matches!(r, Err(StreamError::Protocol(_)))));
    }

    #[tokio::test]
    async fn test_decode_frames_from_stream() {
        let chunks: Vec<Result<Bytes, StreamError>> = vec![
            Ok(Bytes::from_static(b"event: put\ndata: {\"path\":\"/\",")),
            Ok(Bytes::from_static(b"\"data\":1}\n\nevent: keep-alive\n")),
            Ok(Bytes::from_static(b"data: null\n\nevent: patch\ndata: {")),
        ];

        let out: Vec<_> = decode_frames(stream::iter(chunks)).collect().await;

        // The trailing partial frame is dropped without an error
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].as_ref().unwrap().kind, FrameKind::Put);
        assert_eq!(out[1].as_ref().unwrap().kind, FrameKind::KeepAlive);
    }

    #[tokio::test]
    async fn test_decode_frames_stops_on_error() {
        let chunks: Vec<Result<Bytes, StreamError>> = vec![
            Ok(Bytes::from_static(b"event: keep-alive\ndata: null\n\n")),
            Err(StreamError::Transport("connection reset".into())),
            Ok(Bytes::from_static(b"event: keep-alive\ndata: null\n\n")),
        ];

        let out: Vec<_> = decode_frames(stream::iter(chunks)).collect().await;

        assert_eq!(out.len(), 2);
        assert!(out[0].is_ok());
        assert_eq!(
            out[1],
            Err(StreamError::Transport("connection reset".into()))
        );
    }
}
