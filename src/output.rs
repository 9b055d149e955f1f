//! Shared console output and line assembly.
//!
//! Every reader task writes through one `LineSink`, so tagged lines from
//! different services interleave at line granularity but never mid-line.
//! `LineAssembler` turns the raw byte stream coming out of a pty into
//! display lines, buffering partial lines across reads.

use std::io::Write;

use crate::color;

/// Width the plain `[name]` tag is padded to before it is colorized.
pub const TAG_WIDTH: usize = 16;

/// A serialized, line-oriented text sink shared by all reader tasks.
pub trait LineSink: Send + Sync {
    /// Writes one line as an atomic unit, flushing immediately.
    fn line(&self, text: &str);
}

/// `LineSink` backed by the process's stdout.
pub struct Console;

impl Console {
    pub fn new() -> Self {
        Console
    }
}

impl LineSink for Console {
    fn line(&self, text: &str) {
        // The stdout lock serializes concurrent writers.
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{}", text);
        let _ = out.flush();
    }
}

/// Formats one tagged output line: fixed-width colorized tag, one space,
/// trimmed content.
pub fn tagged_line(tag: &str, color_code: &str, text: &str) -> String {
    format!("{} {}", color::paint(color_code, &pad_tag(tag)), text.trim())
}

/// The tag for regular output lines of a service.
pub fn service_tag(name: &str) -> String {
    format!("[{}]", name)
}

/// The tag for a trailing partial fragment, labeled with its length.
pub fn fragment_tag(name: &str, len: usize) -> String {
    format!("[{}] [{}]", name, len)
}

fn pad_tag(tag: &str) -> String {
    format!("{:<width$}", tag, width = TAG_WIDTH)
}

/// Accumulates pty bytes and yields complete display lines.
///
/// Bytes, not text, are buffered: a UTF-8 sequence split across two reads
/// decodes intact once its line completes. Whatever is left unterminated
/// when the stream ends is surfaced through `finish`.
#[derive(Debug, Default)]
pub struct LineAssembler {
    buf: Vec<u8>,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk, returning the complete lines it finished.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();
            lines.push(decode_visible(&line));
        }
        lines
    }

    /// Consumes the assembler, returning any unterminated trailing text.
    pub fn finish(self) -> Option<String> {
        if self.buf.is_empty() {
            None
        } else {
            Some(decode_visible(&self.buf))
        }
    }
}

/// Decodes bytes as UTF-8, rendering undecodable sequences as `\xNN`
/// escapes instead of dropping them.
pub fn decode_visible(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    let mut rest = bytes;
    loop {
        match std::str::from_utf8(rest) {
            Ok(tail) => {
                out.push_str(tail);
                break;
            }
            Err(err) => {
                let valid = err.valid_up_to();
                out.push_str(&String::from_utf8_lossy(&rest[..valid]));
                let invalid_len = err.error_len().unwrap_or(rest.len() - valid);
                for byte in &rest[valid..valid + invalid_len] {
                    out.push_str(&format!("\\x{:02x}", byte));
                }
                rest = &rest[valid + invalid_len..];
            }
        }
    }
    out
}

/// In-memory sink for exercising the output pipeline in tests.
#[cfg(test)]
pub(crate) struct MemorySink(std::sync::Mutex<Vec<String>>);

#[cfg(test)]
impl MemorySink {
    pub fn new() -> Self {
        MemorySink(std::sync::Mutex::new(Vec::new()))
    }

    pub fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl LineSink for MemorySink {
    fn line(&self, text: &str) {
        self.0.lock().unwrap().push(text.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_complete_lines_and_keeps_the_partial() {
        let mut assembler = LineAssembler::new();
        let lines = assembler.feed(b"one\ntwo\npar");
        assert_eq!(lines, vec!["one", "two"]);
        assert_eq!(assembler.feed(b""), Vec::<String>::new());
        assert_eq!(assembler.finish(), Some("par".to_string()));
    }

    #[test]
    fn joins_partial_lines_across_reads() {
        let mut assembler = LineAssembler::new();
        assert!(assembler.feed(b"hel").is_empty());
        assert_eq!(assembler.feed(b"lo\n"), vec!["hello"]);
        assert_eq!(assembler.finish(), None);
    }

    #[test]
    fn utf8_split_across_reads_decodes_intact() {
        let mut assembler = LineAssembler::new();
        let bytes = "caf\u{e9}\n".as_bytes();
        assert!(assembler.feed(&bytes[..4]).is_empty());
        assert_eq!(assembler.feed(&bytes[4..]), vec!["caf\u{e9}"]);
    }

    #[test]
    fn invalid_bytes_render_visibly_and_do_not_stop_the_stream() {
        let mut assembler = LineAssembler::new();
        let lines = assembler.feed(b"ok\xffgo\nnext\n");
        assert_eq!(lines, vec!["ok\\xffgo", "next"]);
    }

    #[test]
    fn decode_visible_escapes_every_invalid_byte() {
        assert_eq!(decode_visible(b"a\xf0\x28b"), "a\\xf0(b");
        assert_eq!(decode_visible(b"\xc3"), "\\xc3");
    }

    #[test]
    fn tags_are_padded_then_colorized() {
        let line = tagged_line(&service_tag("web"), "31", "ready\r");
        assert_eq!(line, format!("\u{1b}[31m{:<16}\u{1b}[0m ready", "[web]"));
    }

    #[test]
    fn fragment_tag_carries_the_length() {
        assert_eq!(fragment_tag("web", 7), "[web] [7]");
    }
}
