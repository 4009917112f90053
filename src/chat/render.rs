//! Output rendering for the chat application.
//!
//! [`TranscriptRenderer`] remembers how much of the transcript it has already
//! written, so it can be driven directly from a transcript listener and only
//! print what is new.

use std::io::{self, Stdout, Write};

use crate::types::{Message, Sender};

/// ANSI escape code for blue text (used for the user label).
const ANSI_BLUE: &str = "\x1b[34m";

/// ANSI escape code for green text (used for the assistant label).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// ANSI escape code for dim text (used for informational output).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// Writes transcript entries with a sender label and optional ANSI styling.
pub struct TranscriptRenderer<W: Write = Stdout> {
    out: W,
    use_color: bool,
    echo_user: bool,
    printed: usize,
}

impl TranscriptRenderer<Stdout> {
    /// Creates a renderer on stdout with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_writer(io::stdout(), true)
    }

    /// Creates a renderer on stdout with the specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(io::stdout(), use_color)
    }
}

impl Default for TranscriptRenderer<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> TranscriptRenderer<W> {
    /// Creates a renderer on an arbitrary writer.
    pub fn with_writer(out: W, use_color: bool) -> Self {
        Self {
            out,
            use_color,
            echo_user: true,
            printed: 0,
        }
    }

    /// Whether user entries are printed.  A terminal that already shows
    /// what was typed can turn this off.
    pub fn with_user_echo(mut self, echo_user: bool) -> Self {
        self.echo_user = echo_user;
        self
    }

    /// Number of transcript entries this renderer has consumed.
    pub fn printed(&self) -> usize {
        self.printed
    }

    /// Prints every entry past the ones already printed.
    pub fn render_new(&mut self, transcript: &[Message]) -> io::Result<()> {
        let start = self.printed.min(transcript.len());
        for message in &transcript[start..] {
            if message.is_user() && !self.echo_user {
                continue;
            }
            self.write_message(message)?;
        }
        self.printed = transcript.len();
        self.out.flush()
    }

    /// Prints the whole transcript, user entries included.
    ///
    /// An older snapshot never rewinds what [`render_new`](Self::render_new)
    /// considers already printed.
    pub fn render_all(&mut self, transcript: &[Message]) -> io::Result<()> {
        for message in transcript {
            self.write_message(message)?;
        }
        self.printed = self.printed.max(transcript.len());
        self.out.flush()
    }

    /// Print an informational message.
    pub fn print_info(&mut self, info: &str) -> io::Result<()> {
        if self.use_color {
            writeln!(self.out, "{ANSI_DIM}{info}{ANSI_RESET}")?;
        } else {
            writeln!(self.out, "{info}")?;
        }
        self.out.flush()
    }

    /// Print an error message.
    pub fn print_error(&mut self, error: &str) -> io::Result<()> {
        if self.use_color {
            writeln!(self.out, "{ANSI_RED}Error: {error}{ANSI_RESET}")?;
        } else {
            writeln!(self.out, "Error: {error}")?;
        }
        self.out.flush()
    }

    /// Consumes the renderer and returns its writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_message(&mut self, message: &Message) -> io::Result<()> {
        let (label, color) = match message.sender() {
            Sender::User => ("You", ANSI_BLUE),
            Sender::Assistant => ("GPT", ANSI_GREEN),
        };
        if self.use_color {
            writeln!(self.out, "{color}{label}:{ANSI_RESET} {}", message.content())
        } else {
            writeln!(self.out, "{label}: {}", message.content())
        }
    }
}
