//! Public entry points.
//!
//! [`Engine`] bundles the metadata, the naming convention and the render
//! options for one caller. Every entry point is infallible: any internal
//! fault is caught at the boundary, logged, and the best output obtained so
//! far is returned. This makes the engine safe to call from inside error
//! handling paths.
//!
//! ## Entry Points
//!
//! | Method                                      | Output       | Mutates graph |
//! |---------------------------------------------|--------------|---------------|
//! | [`Engine::to_string_demystified`]           | plain text   | no            |
//! | [`Engine::to_styled_string_demystified`]    | markup       | no            |
//! | [`Engine::demystify`]                       | plain text   | yes           |
//! | [`Engine::styled_demystify`]                | markup       | yes           |
//! | [`Engine::write_styled_demystified`]        | ANSI to a writer | no        |
//! | [`Engine::demystify_frame`]                 | one frame line | no          |
//!
//! The mutating variants replace each rendered node's cached trace string
//! (see [`ExceptionGraph::set_rendered_trace`]) with its frames-only
//! rendering. That string comes from the same resolution pass as the
//! returned text. The write-back happens only after every node rendered
//! successfully; on an internal fault the cached strings are left as they
//! were.

use std::any::Any;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, warn};

use crate::config::RenderOptions;
use crate::convention::{NamingConvention, RoslynConvention};
use crate::demystifier::Demystifier;
use crate::error::{DemystifyError, DemystifyResult};
use crate::exception::{ExceptionGraph, ExceptionId, RawFrame, StackTrace};
use crate::frame::FrameRenderer;
use crate::markup;
use crate::metadata::Metadata;
use crate::sink::{LineWriter, PlainBuilder, Sink, StyledBuilder};
use crate::tree::{render_tree, render_tree_observed};
use crate::type_name::ResolveContext;
use crate::types::ResolvedMethod;

static ROSLYN: RoslynConvention = RoslynConvention;

/// Run `f`, converting a panic into a logged internal error.
fn guarded<T>(operation: &'static str, f: impl FnOnce() -> T) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(payload) => {
            let err = DemystifyError::internal(panic_message(payload.as_ref()));
            warn!("{} aborted, returning partial output: {}", operation, err);
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

/// Renders exception graphs against one metadata source.
#[derive(Clone)]
pub struct Engine<'a> {
    metadata: &'a dyn Metadata,
    convention: &'a dyn NamingConvention,
    options: RenderOptions,
}

impl<'a> Engine<'a> {
    /// Engine with the C# naming convention and the process-wide options.
    pub fn new(metadata: &'a dyn Metadata) -> Self {
        Engine {
            metadata,
            convention: &ROSLYN,
            options: RenderOptions::global(),
        }
    }

    pub fn with_convention(mut self, convention: &'a dyn NamingConvention) -> Self {
        self.convention = convention;
        self
    }

    /// Override the process-wide options for this engine.
    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    fn frame_renderer(&self) -> FrameRenderer<'a> {
        let ctx = ResolveContext::new(self.metadata, self.convention);
        FrameRenderer::new(Demystifier::new(ctx), self.options.format_options())
    }

    fn render_into(&self, graph: &ExceptionGraph, root: ExceptionId, sink: &mut dyn Sink) {
        let frames = self.frame_renderer();
        let max_depth = self.options.max_depth;
        guarded("render", || render_tree(graph, root, &frames, max_depth, sink));
    }

    /// Render the tree into `sink` and collect the frames-only trace of every
    /// entered node from the same resolution pass. `None` if rendering
    /// aborted.
    fn render_collecting(
        &self,
        graph: &ExceptionGraph,
        root: ExceptionId,
        sink: &mut dyn Sink,
        styled: bool,
    ) -> Option<Vec<(ExceptionId, String)>> {
        let frames = self.frame_renderer();
        let max_depth = self.options.max_depth;
        let color_enabled = self.options.color_enabled;
        guarded("render", || {
            let mut traces = Vec::new();
            let mut collect = |id: ExceptionId,
                               trace: &StackTrace,
                               resolved: &[DemystifyResult<ResolvedMethod>]| {
                if trace.is_empty() {
                    return;
                }
                let text = if styled {
                    let mut builder = StyledBuilder::new(color_enabled);
                    let mut lines = LineWriter::new(&mut builder);
                    frames.render_resolved_trace(trace, resolved, "", &mut lines);
                    builder.finish()
                } else {
                    let mut builder = PlainBuilder::new();
                    let mut lines = LineWriter::new(&mut builder);
                    frames.render_resolved_trace(trace, resolved, "", &mut lines);
                    builder.finish()
                };
                traces.push((id, text));
            };
            render_tree_observed(graph, root, &frames, max_depth, sink, &mut collect);
            traces
        })
    }

    fn write_back(&self, graph: &mut ExceptionGraph, traces: Vec<(ExceptionId, String)>) {
        debug!("writing back {} rendered traces", traces.len());
        for (id, text) in traces {
            if let Err(err) = graph.set_rendered_trace(id, text) {
                warn!("failed to write back rendered trace: {}", err);
            }
        }
    }

    // ========================================================================
    // Entry Points
    // ========================================================================

    /// Plain rendering; the graph is not touched.
    pub fn to_string_demystified(&self, graph: &ExceptionGraph, root: ExceptionId) -> String {
        let mut builder = PlainBuilder::new();
        self.render_into(graph, root, &mut builder);
        builder.finish()
    }

    /// Styled (markup) rendering; the graph is not touched.
    pub fn to_styled_string_demystified(
        &self,
        graph: &ExceptionGraph,
        root: ExceptionId,
    ) -> String {
        let mut builder = StyledBuilder::new(self.options.color_enabled);
        self.render_into(graph, root, &mut builder);
        builder.finish()
    }

    /// Plain rendering that also replaces each node's cached trace string.
    pub fn demystify(&self, graph: &mut ExceptionGraph, root: ExceptionId) -> String {
        let mut builder = PlainBuilder::new();
        if let Some(traces) = self.render_collecting(graph, root, &mut builder, false) {
            self.write_back(graph, traces);
        }
        builder.finish()
    }

    /// Styled rendering that also replaces each node's cached trace string.
    pub fn styled_demystify(&self, graph: &mut ExceptionGraph, root: ExceptionId) -> String {
        let mut builder = StyledBuilder::new(self.options.color_enabled);
        if let Some(traces) = self.render_collecting(graph, root, &mut builder, true) {
            self.write_back(graph, traces);
        }
        builder.finish()
    }

    /// Write the styled rendering to `writer`, as ANSI escapes when color is
    /// enabled and as plain text otherwise.
    pub fn write_styled_demystified(
        &self,
        graph: &ExceptionGraph,
        root: ExceptionId,
        writer: &mut dyn Write,
    ) -> DemystifyResult<()> {
        let text = if self.options.color_enabled {
            markup::to_ansi(&self.to_styled_string_demystified(graph, root))
        } else {
            self.to_string_demystified(graph, root)
        };
        writer.write_all(text.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// Render one frame as a single `at ...` line.
    pub fn demystify_frame(&self, frame: &RawFrame) -> String {
        let frames = self.frame_renderer();
        let mut builder = PlainBuilder::new();
        guarded("frame render", || frames.render_frame(frame, &mut builder));
        builder.finish()
    }

    /// Styled variant of [`demystify_frame`](Self::demystify_frame).
    pub fn styled_demystify_frame(&self, frame: &RawFrame) -> String {
        let frames = self.frame_renderer();
        let mut builder = StyledBuilder::new(self.options.color_enabled);
        guarded("frame render", || frames.render_frame(frame, &mut builder));
        builder.finish()
    }

    /// Resolve one frame without rendering it.
    pub fn resolve_frame(&self, frame: &RawFrame) -> DemystifyResult<ResolvedMethod> {
        let ctx = ResolveContext::new(self.metadata, self.convention);
        guarded("resolve", || Demystifier::new(ctx).resolve(frame))
            .unwrap_or_else(|| Err(DemystifyError::internal("resolution aborted")))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::convention::{GeneratedName, MethodKind};
    use crate::exception::ExceptionRecord;
    use crate::metadata::{
        MetadataTable, MethodDef, MethodToken, NamedType, StateMachineKind, TypeDef, TypeToken,
    };

    fn options() -> RenderOptions {
        RenderOptions {
            color_enabled: true,
            ..RenderOptions::DEFAULT
        }
    }

    fn table() -> MetadataTable {
        MetadataTable::new()
            .with_type(1, TypeDef::Named(NamedType::new("Program").in_namespace("App")))
            .with_method(10, MethodDef::new("Run", TypeToken(1)))
    }

    fn graph() -> (ExceptionGraph, ExceptionId) {
        let mut graph = ExceptionGraph::new();
        let root = graph.add(
            ExceptionRecord::new("System.Exception", "boom")
                .with_frames(vec![RawFrame::new(TypeToken(1), MethodToken(10))])
                .with_rendered_trace("   at Program.Run() (raw)"),
        );
        (graph, root)
    }

    /// Convention whose every query panics.
    struct Exploding;

    impl NamingConvention for Exploding {
        fn parse_generated_name<'a>(&self, _name: &'a str) -> Option<GeneratedName<'a>> {
            panic!("exploding convention")
        }
        fn local_function_name<'a>(&self, _g: &GeneratedName<'a>) -> Option<&'a str> {
            panic!("exploding convention")
        }
        fn ordinal_hint(&self, _g: &GeneratedName<'_>) -> Option<u32> {
            panic!("exploding convention")
        }
        fn lambda_ordinal(&self, _g: &GeneratedName<'_>) -> Option<u32> {
            panic!("exploding convention")
        }
        fn is_well_formed_fragment(&self, _fragment: &str) -> bool {
            panic!("exploding convention")
        }
        fn state_machine_kind(&self, _ty: &NamedType) -> Option<StateMachineKind> {
            panic!("exploding convention")
        }
        fn is_state_machine(&self, _ty: &NamedType) -> bool {
            panic!("exploding convention")
        }
        fn is_foreign_unit(&self, _ty: &NamedType) -> bool {
            panic!("exploding convention")
        }
        fn is_nullable(&self, _ty: &NamedType) -> bool {
            panic!("exploding convention")
        }
        fn is_value_tuple(&self, _ty: &NamedType) -> bool {
            panic!("exploding convention")
        }
        fn primitive_alias(&self, _ns: Option<&str>, _name: &str) -> Option<&'static str> {
            panic!("exploding convention")
        }
        fn method_kind(&self, _name: &str) -> MethodKind {
            panic!("exploding convention")
        }
    }

    /// Metadata that counts method lookups.
    struct Counting {
        inner: MetadataTable,
        method_lookups: Cell<usize>,
    }

    impl Metadata for Counting {
        fn type_def(&self, token: TypeToken) -> Option<&TypeDef> {
            self.inner.type_def(token)
        }

        fn method_def(&self, token: MethodToken) -> Option<&MethodDef> {
            self.method_lookups.set(self.method_lookups.get() + 1);
            self.inner.method_def(token)
        }

        fn methods_of(&self, ty: TypeToken) -> Vec<MethodToken> {
            self.inner.methods_of(ty)
        }
    }

    #[test]
    fn mutating_entry_points_resolve_each_frame_once() {
        let counting = Counting {
            inner: table(),
            method_lookups: Cell::new(0),
        };
        let engine = Engine::new(&counting).with_options(options());
        let (mut graph, root) = graph();

        engine.to_string_demystified(&graph, root);
        assert_eq!(counting.method_lookups.replace(0), 1);

        engine.demystify(&mut graph, root);
        assert_eq!(counting.method_lookups.replace(0), 1);
        assert_eq!(graph.rendered_trace(root), Some("   at Program.Run()"));

        engine.styled_demystify(&mut graph, root);
        assert_eq!(counting.method_lookups.get(), 1);
    }

    #[test]
    fn pure_rendering_leaves_cached_trace() {
        let table = table();
        let (graph, root) = graph();
        let engine = Engine::new(&table).with_options(options());
        let text = engine.to_string_demystified(&graph, root);
        assert_eq!(text, "System.Exception: boom\n   at Program.Run()");
        assert_eq!(graph.rendered_trace(root), Some("   at Program.Run() (raw)"));
    }

    #[test]
    fn demystify_writes_back_frames_only_trace() {
        let table = table();
        let (mut graph, root) = graph();
        let engine = Engine::new(&table).with_options(options());
        let text = engine.demystify(&mut graph, root);
        assert!(text.starts_with("System.Exception: boom"));
        assert_eq!(graph.rendered_trace(root), Some("   at Program.Run()"));
    }

    #[test]
    fn styled_demystify_writes_back_markup() {
        let table = table();
        let (mut graph, root) = graph();
        let engine = Engine::new(&table).with_options(options());
        let text = engine.styled_demystify(&mut graph, root);
        assert!(text.starts_with("[red bold]System.Exception[/]: boom"));
        assert_eq!(
            graph.rendered_trace(root),
            Some("   [bold]at[/] [blue]Program[/][grey].[/][yellow]Run[/][grey]([/][grey])[/]")
        );
    }

    #[test]
    fn internal_fault_returns_partial_output_and_keeps_cache() {
        let table = table();
        let (mut graph, root) = graph();
        let engine = Engine::new(&table)
            .with_options(options())
            .with_convention(&Exploding);
        let text = engine.demystify(&mut graph, root);
        assert!(text.starts_with("System.Exception: boom"));
        assert_eq!(graph.rendered_trace(root), Some("   at Program.Run() (raw)"));
        assert!(engine.resolve_frame(&RawFrame::new(TypeToken(1), MethodToken(10))).is_err());
    }

    #[test]
    fn write_styled_emits_ansi() {
        let table = table();
        let (graph, root) = graph();
        let engine = Engine::new(&table).with_options(options());
        let mut out = Vec::new();
        engine.write_styled_demystified(&graph, root, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("\x1b[31;1mSystem.Exception\x1b[0m: boom\n"));
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn write_styled_without_color_is_plain() {
        let table = table();
        let (graph, root) = graph();
        let engine = Engine::new(&table).with_options(RenderOptions {
            color_enabled: false,
            ..RenderOptions::DEFAULT
        });
        let mut out = Vec::new();
        engine.write_styled_demystified(&graph, root, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "System.Exception: boom\n   at Program.Run()\n"
        );
    }

    #[test]
    fn demystify_frame_renders_one_line() {
        let table = table();
        let engine = Engine::new(&table).with_options(options());
        let frame = RawFrame::new(TypeToken(1), MethodToken(10)).at("Program.cs", 7);
        assert_eq!(
            engine.demystify_frame(&frame),
            "at Program.Run() in Program.cs:line 7"
        );
    }
}
