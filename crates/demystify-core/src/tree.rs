//! Exception tree traversal and rendering.
//!
//! [`TreeWalk`] enumerates an exception graph depth first with an explicit
//! stack, so deep causal chains never grow the call stack. Each node is
//! visited once: a node reached again (an aggregate holding the same failure
//! twice, or a corrupted chain pointing back at an ancestor) produces a
//! [`TreeEvent::Duplicate`] back-reference instead. Nodes deeper than the
//! configured maximum produce a single [`TreeEvent::Truncated`] marker.
//!
//! Output layout for a chain `Outer -> Inner`:
//!
//! ```text
//! System.Exception: outer
//!    at Program.Run()
//!  ---> System.IO.IOException: inner
//!     at Program.Read()
//!    --- End of inner exception stack trace ---
//! ```

use std::collections::HashMap;

use crate::error::DemystifyResult;
use crate::exception::{ExceptionGraph, ExceptionId, ExceptionRecord, StackTrace};
use crate::frame::FrameRenderer;
use crate::sink::{LineWriter, Sink, Style};
use crate::types::ResolvedMethod;

/// Line closing a nested exception.
pub const END_OF_INNER: &str = "--- End of inner exception stack trace ---";

/// Arrow introducing a nested exception.
pub const NESTED_ARROW: &str = " ---> ";

/// Receives each entered node's trace along with its resolved frames.
pub type TraceObserver<'o> =
    dyn FnMut(ExceptionId, &StackTrace, &[DemystifyResult<ResolvedMethod>]) + 'o;

// ============================================================================
// Traversal
// ============================================================================

/// One step of a tree walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeEvent {
    /// First visit of a node; `ordinal` is its 1-based render order.
    Enter {
        id: ExceptionId,
        depth: usize,
        ordinal: usize,
    },
    /// A node already rendered as `ordinal`.
    Duplicate { ordinal: usize, depth: usize },
    /// Depth limit reached; nothing deeper is visited on this branch.
    Truncated { depth: usize },
    /// A link to an id outside the graph.
    Missing { id: ExceptionId, depth: usize },
    /// All nested nodes of an entered node at `depth` have been visited.
    Exit { depth: usize },
}

enum Pending {
    Visit { id: ExceptionId, depth: usize },
    Exit { depth: usize },
}

/// Depth-first walk over an exception graph.
pub struct TreeWalk<'g> {
    graph: &'g ExceptionGraph,
    stack: Vec<Pending>,
    seen: HashMap<ExceptionId, usize>,
    max_depth: usize,
}

impl<'g> TreeWalk<'g> {
    /// Walk from `root`; nodes at depth `max_depth` and beyond are truncated.
    /// The root itself is always visited.
    pub fn new(graph: &'g ExceptionGraph, root: ExceptionId, max_depth: usize) -> Self {
        TreeWalk {
            graph,
            stack: vec![Pending::Visit { id: root, depth: 0 }],
            seen: HashMap::new(),
            max_depth: max_depth.max(1),
        }
    }
}

impl Iterator for TreeWalk<'_> {
    type Item = TreeEvent;

    fn next(&mut self) -> Option<TreeEvent> {
        let (id, depth) = match self.stack.pop()? {
            Pending::Exit { depth } => return Some(TreeEvent::Exit { depth }),
            Pending::Visit { id, depth } => (id, depth),
        };

        if let Some(&ordinal) = self.seen.get(&id) {
            return Some(TreeEvent::Duplicate { ordinal, depth });
        }
        if depth >= self.max_depth {
            return Some(TreeEvent::Truncated { depth });
        }
        let Some(record) = self.graph.get(id) else {
            return Some(TreeEvent::Missing { id, depth });
        };

        let ordinal = self.seen.len() + 1;
        self.seen.insert(id, ordinal);

        if depth > 0 {
            self.stack.push(Pending::Exit { depth });
        }
        for nested in record.nested().into_iter().rev() {
            self.stack.push(Pending::Visit {
                id: nested,
                depth: depth + 1,
            });
        }
        Some(TreeEvent::Enter { id, depth, ordinal })
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// Two spaces per nesting level.
fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}

/// Write `Type: message`.
pub fn render_header(record: &ExceptionRecord, sink: &mut dyn Sink) {
    sink.append_styled(&record.type_name, Style::ExceptionType);
    if !record.message.is_empty() {
        sink.append_text(": ");
        sink.append_text(&record.message);
    }
}

/// Render the tree rooted at `root` into `sink`.
pub fn render_tree(
    graph: &ExceptionGraph,
    root: ExceptionId,
    frames: &FrameRenderer<'_>,
    max_depth: usize,
    sink: &mut dyn Sink,
) {
    render_tree_observed(graph, root, frames, max_depth, sink, &mut |_, _, _| {});
}

/// [`render_tree`], calling `observer` once per entered node with the frames
/// resolved for that node's trace.
pub fn render_tree_observed(
    graph: &ExceptionGraph,
    root: ExceptionId,
    frames: &FrameRenderer<'_>,
    max_depth: usize,
    sink: &mut dyn Sink,
    observer: &mut TraceObserver<'_>,
) {
    let mut lines = LineWriter::new(sink);

    for event in TreeWalk::new(graph, root, max_depth) {
        match event {
            TreeEvent::Enter { id, depth, .. } => {
                let Some(record) = graph.get(id) else {
                    continue;
                };
                let out = lines.start_line();
                if depth > 0 {
                    out.append_text(&indent(depth - 1));
                    out.append_styled(NESTED_ARROW, Style::Marker);
                }
                render_header(record, out);
                let resolved = frames.resolve_trace(&record.trace);
                frames.render_resolved_trace(&record.trace, &resolved, &indent(depth), &mut lines);
                observer(id, &record.trace, resolved.as_slice());
            }
            TreeEvent::Exit { depth } => {
                let out = lines.start_line();
                out.append_text(&indent(depth - 1));
                out.append_text("   ");
                out.append_styled(END_OF_INNER, Style::Marker);
            }
            TreeEvent::Duplicate { ordinal, depth } => {
                let out = lines.start_line();
                out.append_text(&indent(depth.saturating_sub(1)));
                out.append_styled(NESTED_ARROW, Style::Marker);
                out.append_styled(
                    &format!("(duplicate of exception #{}, see above)", ordinal),
                    Style::Marker,
                );
            }
            TreeEvent::Truncated { depth } => {
                let out = lines.start_line();
                out.append_text(&indent(depth.saturating_sub(1)));
                out.append_styled(NESTED_ARROW, Style::Marker);
                out.append_styled(
                    &format!("(exception chain truncated at depth {})", depth),
                    Style::Marker,
                );
            }
            TreeEvent::Missing { id, depth } => {
                if depth == 0 {
                    continue;
                }
                let out = lines.start_line();
                out.append_text(&indent(depth - 1));
                out.append_styled(NESTED_ARROW, Style::Marker);
                out.append_styled(&format!("(missing exception #{})", id.0), Style::Marker);
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
