use tracing::warn;

/// Payload that marks the normal end of a completion stream
pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// A `data:` line carrying a JSON payload
    Data(String),
    /// `data: [DONE]`
    Done,
}

/// Line-framing decoder for `data: `-prefixed event streams.
///
/// Network chunks can end anywhere, including in the middle of a UTF-8
/// sequence, so bytes are buffered until a full line is available. Only
/// complete lines are ever parsed.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every frame completed by it
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line = self.buffer.drain(..=newline_pos).collect::<Vec<_>>();
            if let Some(frame) = parse_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush a trailing line that was never newline-terminated
    pub fn finish(&mut self) -> Option<SseFrame> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        parse_line(&line)
    }
}

fn parse_line(bytes: &[u8]) -> Option<SseFrame> {
    let line = match std::str::from_utf8(bytes) {
        Ok(s) => s.trim(),
        Err(e) => {
            warn!(error = %e, "Skipping stream line with invalid UTF-8");
            return None;
        }
    };

    // Blank separators, `:` comments and `event:`/`id:` fields carry no text
    let data = line.strip_prefix("data:")?.trim_start();
    if data.is_empty() {
        return None;
    }

    if data == DONE_SENTINEL {
        Some(SseFrame::Done)
    } else {
        Some(SseFrame::Data(data.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_complete_lines() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"data: {\"a\":1}\n\ndata: [DONE]\n\n");
        assert_eq!(
            frames,
            vec![SseFrame::Data("{\"a\":1}".to_string()), SseFrame::Done]
        );
    }

    #[test]
    fn buffers_frames_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"choi").is_empty());
        assert!(decoder.push(b"ces\":[]}").is_empty());
        assert_eq!(
            decoder.push(b"\ndata: [DO"),
            vec![SseFrame::Data("{\"choices\":[]}".to_string())]
        );
        assert_eq!(decoder.push(b"NE]\n"), vec![SseFrame::Done]);
    }

    #[test]
    fn keeps_multibyte_characters_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        let line = "data: {\"t\":\"caf\u{e9}\"}\n".as_bytes();
        let split = line.len() - 4; // inside the two-byte é
        assert!(decoder.push(&line[..split]).is_empty());
        assert_eq!(
            decoder.push(&line[split..]),
            vec![SseFrame::Data("{\"t\":\"caf\u{e9}\"}".to_string())]
        );
    }

    #[test]
    fn tolerates_crlf_and_missing_space() {
        let mut decoder = SseDecoder::new();
        assert_eq!(
            decoder.push(b"data:{\"x\":1}\r\n\r\n"),
            vec![SseFrame::Data("{\"x\":1}".to_string())]
        );
    }

    #[test]
    fn ignores_comments_and_other_fields() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b": keep-alive\nevent: message\nid: 7\ndata:\n\n");
        assert!(frames.is_empty());
    }

    #[test]
    fn finish_flushes_unterminated_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: [DONE]").is_empty());
        assert_eq!(decoder.finish(), Some(SseFrame::Done));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn invalid_utf8_line_is_skipped() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"data: \xff\xfe\ndata: ok\n");
        assert_eq!(frames, vec![SseFrame::Data("ok".to_string())]);
    }
}
