//! Text sinks the renderers write into.
//!
//! Renderers never build strings directly. They call [`Sink::append_text`]
//! for structural text and [`Sink::append_styled`] for tokens that carry a
//! semantic [`Style`]. Two builders are provided:
//!
//! - [`PlainBuilder`] ignores styles and produces plain text.
//! - [`StyledBuilder`] wraps styled tokens in markup tags (`[blue]Program[/]`)
//!   and escapes literal brackets; with color disabled it produces exactly
//!   what [`PlainBuilder`] would.
//!
//! See [`crate::markup`] for converting styled output to ANSI escapes.

use crate::markup;

/// Semantic category of a rendered token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Style {
    /// `async`, `new`, `static`, `ref`, `dynamic`, `at`, `in`
    Keyword,
    TypeName,
    MethodName,
    /// Brackets, commas, `+`, `=>`
    Punctuation,
    ParameterName,
    /// Source file path.
    Path,
    LineNumber,
    /// Exception type in a header line.
    ExceptionType,
    /// Separator and omission lines.
    Marker,
}

impl Style {
    /// Markup tag for this style.
    pub fn tag(self) -> &'static str {
        match self {
            Style::Keyword => "bold",
            Style::TypeName => "blue",
            Style::MethodName => "yellow",
            Style::Punctuation => "grey",
            Style::ParameterName => "white",
            Style::Path => "underline",
            Style::LineNumber => "green",
            Style::ExceptionType => "red bold",
            Style::Marker => "dim",
        }
    }
}

/// Destination for rendered text.
pub trait Sink {
    /// Append structural text with no style.
    fn append_text(&mut self, text: &str);

    /// Append a token with a semantic style.
    fn append_styled(&mut self, text: &str, style: Style);
}

// ============================================================================
// Plain
// ============================================================================

/// Builder producing plain text.
#[derive(Debug, Clone, Default)]
pub struct PlainBuilder {
    buf: String,
}

impl PlainBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn finish(self) -> String {
        self.buf
    }
}

impl Sink for PlainBuilder {
    fn append_text(&mut self, text: &str) {
        self.buf.push_str(text);
    }

    fn append_styled(&mut self, text: &str, _style: Style) {
        self.buf.push_str(text);
    }
}

// ============================================================================
// Styled
// ============================================================================

/// Builder producing markup-styled text.
#[derive(Debug, Clone)]
pub struct StyledBuilder {
    buf: String,
    color_enabled: bool,
}

impl StyledBuilder {
    pub fn new(color_enabled: bool) -> Self {
        StyledBuilder {
            buf: String::new(),
            color_enabled,
        }
    }

    pub fn color_enabled(&self) -> bool {
        self.color_enabled
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn finish(self) -> String {
        self.buf
    }
}

impl Sink for StyledBuilder {
    fn append_text(&mut self, text: &str) {
        if self.color_enabled {
            self.buf.push_str(&markup::escape(text));
        } else {
            self.buf.push_str(text);
        }
    }

    fn append_styled(&mut self, text: &str, style: Style) {
        if !self.color_enabled {
            self.buf.push_str(text);
            return;
        }
        if text.is_empty() {
            return;
        }
        self.buf.push('[');
        self.buf.push_str(style.tag());
        self.buf.push(']');
        self.buf.push_str(&markup::escape(text));
        self.buf.push_str("[/]");
    }
}

// ============================================================================
// Lines
// ============================================================================

/// Writes newline-separated lines into a sink, with no trailing newline.
pub struct LineWriter<'s> {
    sink: &'s mut dyn Sink,
    started: bool,
}

impl<'s> LineWriter<'s> {
    pub fn new(sink: &'s mut dyn Sink) -> Self {
        LineWriter {
            sink,
            started: false,
        }
    }

    /// Begin a new line and return the sink to write it into.
    pub fn start_line(&mut self) -> &mut (dyn Sink + 's) {
        if self.started {
            self.sink.append_text("\n");
        }
        self.started = true;
        &mut *self.sink
    }

    /// Continue the current line.
    pub fn sink(&mut self) -> &mut (dyn Sink + 's) {
        &mut *self.sink
    }

    pub fn has_output(&self) -> bool {
        self.started
    }
}

// ============================================================================
// Tests
// ============================================================================
