//! Stack frame rendering.
//!
//! One frame renders as one line:
//!
//! ```text
//! at async Program.Outer(int value)+Local(int n)+MoveNext() in /src/Program.cs:line 42
//! ```
//!
//! - `async ` precedes the declaring type for async methods
//! - constructors render as `new Type(...)`, static constructors as
//!   `static Type(...)`
//! - each sub-method layer appends `+Name(params)`; lambdas append
//!   `+(params) => { }`
//! - parameters that are not known render as `(?)`
//!
//! A frame whose method cannot be resolved still produces a line, built from
//! whatever the raw tokens give.

use tracing::debug;

use crate::convention::MethodKind;
use crate::demystifier::Demystifier;
use crate::error::DemystifyResult;
use crate::exception::{RawFrame, StackTrace};
use crate::parameter::render_parameter_list;
use crate::sink::{LineWriter, Sink, Style};
use crate::type_name::{render_generic_args, render_type, FormatOptions, GenericEnv};
use crate::types::ResolvedMethod;

/// Boundary line after the last frame before an async rethrow.
pub const ASYNC_BOUNDARY: &str = "--- End of stack trace from previous location ---";

// ============================================================================
// Methods
// ============================================================================

/// Render a resolved method with its sub-method chain.
pub fn render_method(method: &ResolvedMethod, options: FormatOptions, sink: &mut dyn Sink) {
    if method.is_async {
        sink.append_styled("async", Style::Keyword);
        sink.append_text(" ");
    }

    match (method.kind, method.declaring_type.as_ref()) {
        (MethodKind::Constructor, Some(ty)) => {
            if method.sub_method.is_none() {
                sink.append_styled("new", Style::Keyword);
                sink.append_text(" ");
            }
            render_type(ty, options, sink);
        }
        (MethodKind::StaticConstructor, Some(ty)) => {
            sink.append_styled("static", Style::Keyword);
            sink.append_text(" ");
            render_type(ty, options, sink);
        }
        (_, Some(ty)) => {
            render_type(ty, options, sink);
            sink.append_styled(".", Style::Punctuation);
            sink.append_styled(&method.name, Style::MethodName);
        }
        (_, None) => sink.append_styled(&method.name, Style::MethodName),
    }
    render_generic_args(&method.generic_arguments, options, sink);
    render_parameter_list(&method.parameters, method.parameters_known, options, sink);

    for sub in method.sub_methods() {
        sink.append_styled("+", Style::Punctuation);
        if sub.is_lambda {
            render_parameter_list(&sub.parameters, sub.parameters_known, options, sink);
            sink.append_styled(" => { }", Style::Punctuation);
        } else {
            sink.append_styled(&sub.name, Style::MethodName);
            render_generic_args(&sub.generic_arguments, options, sink);
            render_parameter_list(&sub.parameters, sub.parameters_known, options, sink);
        }
    }
}

// ============================================================================
// Frames
// ============================================================================

/// Renders frames and frame lists through one [`Demystifier`].
#[derive(Clone, Copy)]
pub struct FrameRenderer<'a> {
    demystifier: Demystifier<'a>,
    options: FormatOptions,
}

impl<'a> FrameRenderer<'a> {
    pub fn new(demystifier: Demystifier<'a>, options: FormatOptions) -> Self {
        FrameRenderer {
            demystifier,
            options,
        }
    }

    /// Resolve every frame of a trace, in order.
    pub fn resolve_trace(&self, trace: &StackTrace) -> Vec<DemystifyResult<ResolvedMethod>> {
        trace
            .frames
            .iter()
            .map(|frame| self.demystifier.resolve(frame))
            .collect()
    }

    /// Render `at <method>[ in <file>[:line <n>]]`.
    pub fn render_frame(&self, frame: &RawFrame, sink: &mut dyn Sink) {
        let resolved = self.demystifier.resolve(frame);
        self.render_resolved_frame(frame, &resolved, sink);
    }

    /// Render a frame whose method was already resolved.
    pub fn render_resolved_frame(
        &self,
        frame: &RawFrame,
        resolved: &DemystifyResult<ResolvedMethod>,
        sink: &mut dyn Sink,
    ) {
        sink.append_styled("at", Style::Keyword);
        sink.append_text(" ");

        match resolved {
            Ok(method) => render_method(method, self.options, sink),
            Err(err) => {
                debug!(error = %err, "frame fallback");
                self.render_fallback(frame, sink);
            }
        }

        if let Some(file) = frame.file.as_deref().filter(|f| !f.is_empty()) {
            sink.append_text(" ");
            sink.append_styled("in", Style::Keyword);
            sink.append_text(" ");
            sink.append_styled(file, Style::Path);
            if let Some(line) = frame.line.filter(|line| *line > 0) {
                sink.append_text(":");
                sink.append_styled("line", Style::Keyword);
                sink.append_text(" ");
                sink.append_styled(&line.to_string(), Style::LineNumber);
            }
        }
    }

    /// Best-effort `Type.?(?)` from the raw declaring type token.
    fn render_fallback(&self, frame: &RawFrame, sink: &mut dyn Sink) {
        let ctx = self.demystifier.context();
        let ty = ctx.resolve_type(frame.declaring_type, &GenericEnv::default());
        render_type(&ty, self.options, sink);
        sink.append_styled(".", Style::Punctuation);
        sink.append_styled("?", Style::Marker);
        sink.append_styled("(", Style::Punctuation);
        sink.append_styled("?", Style::Marker);
        sink.append_styled(")", Style::Punctuation);
    }

    /// Render every frame of a trace, one line each, prefixed by `indent`.
    pub fn render_trace(&self, trace: &StackTrace, indent: &str, lines: &mut LineWriter<'_>) {
        let resolved = self.resolve_trace(trace);
        self.render_resolved_trace(trace, &resolved, indent, lines);
    }

    /// [`render_trace`](Self::render_trace) over frames resolved by
    /// [`resolve_trace`](Self::resolve_trace).
    pub fn render_resolved_trace(
        &self,
        trace: &StackTrace,
        resolved: &[DemystifyResult<ResolvedMethod>],
        indent: &str,
        lines: &mut LineWriter<'_>,
    ) {
        let count = trace.frames.len();
        for (index, (frame, method)) in trace.frames.iter().zip(resolved).enumerate() {
            let sink = lines.start_line();
            sink.append_text(indent);
            sink.append_text("   ");
            self.render_resolved_frame(frame, method, sink);

            if frame.is_last_frame_in_chain && index + 1 < count {
                let sink = lines.start_line();
                sink.append_text(indent);
                sink.append_styled(ASYNC_BOUNDARY, Style::Marker);
            }
        }
        if trace.omitted_frames > 0 {
            let sink = lines.start_line();
            sink.append_text(indent);
            sink.append_text("   ");
            sink.append_styled(
                &format!("... {} frames omitted", trace.omitted_frames),
                Style::Marker,
            );
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
