use std::io::{self, Write};

use crate::models::{Message, Sender};
use crate::services::chat_service::{ChatEvent, EventSink, ExchangeState};

/// Prints the streamed reply as it grows.
///
/// Snapshots are cumulative, so only the part past what is already on
/// screen gets printed. A snapshot that doesn't extend the printed text
/// (an appended error message) starts a fresh line.
pub struct TerminalView<W: Write = io::Stdout> {
    out: W,
    streaming: bool,
    shown: String,
}

impl TerminalView {
    pub fn new() -> Self {
        Self::with_writer(io::stdout())
    }
}

impl Default for TerminalView {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> TerminalView<W> {
    pub fn with_writer(out: W) -> Self {
        Self {
            out,
            streaming: false,
            shown: String::new(),
        }
    }

    fn on_messages(&mut self, messages: &[Message]) {
        if !self.streaming {
            return;
        }
        let Some(last) = messages.last() else { return };
        if last.sender != Sender::Assistant {
            return;
        }

        // Terminal write failures are not worth interrupting the exchange
        if let Some(suffix) = last.text.strip_prefix(self.shown.as_str()) {
            let _ = write!(self.out, "{}", suffix);
        } else {
            let _ = write!(self.out, "\nassistant> {}", last.text);
        }
        let _ = self.out.flush();
        self.shown = last.text.clone();
    }
}

impl<W: Write> EventSink for TerminalView<W> {
    fn emit(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::StateChanged(ExchangeState::Streaming) => {
                self.streaming = true;
                self.shown.clear();
                let _ = write!(self.out, "assistant> ");
                let _ = self.out.flush();
            }
            ChatEvent::StateChanged(ExchangeState::Idle) if self.streaming => {
                self.streaming = false;
                let _ = writeln!(self.out);
            }
            ChatEvent::MessagesChanged(messages) => self.on_messages(&messages),
            _ => {}
        }
    }
}
