//! Raw trace input: frames, stack traces and the exception graph.
//!
//! The exception graph is an arena. Nodes refer to each other through
//! [`ExceptionId`] indices, so a corrupted graph (an inner exception that
//! points back at an ancestor, or at itself) is representable and the
//! renderer can detect it without following owning pointers.
//!
//! The only mutation the engine performs is the cached-trace write-back,
//! exposed as [`ExceptionGraph::set_rendered_trace`].

use serde::{Deserialize, Serialize};

use crate::error::{DemystifyError, DemystifyResult};
use crate::metadata::{MethodToken, TypeToken};

// ============================================================================
// Frames
// ============================================================================

/// One captured stack frame, as the runtime reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFrame {
    /// Runtime declaring type; a generic instance supplies the type arguments.
    pub declaring_type: TypeToken,
    pub method: MethodToken,
    /// Actual parameter types; when present they override the declared ones.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameter_types: Vec<TypeToken>,
    /// Concrete method instantiation of this frame.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub method_generic_args: Vec<TypeToken>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    /// Last frame before an async rethrow seam.
    #[serde(default)]
    pub is_last_frame_in_chain: bool,
}

impl RawFrame {
    pub fn new(declaring_type: TypeToken, method: MethodToken) -> Self {
        RawFrame {
            declaring_type,
            method,
            parameter_types: Vec::new(),
            method_generic_args: Vec::new(),
            file: None,
            line: None,
            column: None,
            is_last_frame_in_chain: false,
        }
    }

    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }

    pub fn with_parameter_types(mut self, types: Vec<TypeToken>) -> Self {
        self.parameter_types = types;
        self
    }

    pub fn with_method_generic_args(mut self, args: Vec<TypeToken>) -> Self {
        self.method_generic_args = args;
        self
    }

    pub fn last_in_chain(mut self) -> Self {
        self.is_last_frame_in_chain = true;
        self
    }
}

/// Frames of one exception, outermost call last.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackTrace {
    #[serde(default)]
    pub frames: Vec<RawFrame>,
    /// Frames the capture facility dropped.
    #[serde(default)]
    pub omitted_frames: usize,
}

impl StackTrace {
    pub fn new(frames: Vec<RawFrame>) -> Self {
        StackTrace {
            frames,
            omitted_frames: 0,
        }
    }

    pub fn with_omitted(mut self, count: usize) -> Self {
        self.omitted_frames = count;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty() && self.omitted_frames == 0
    }
}

// ============================================================================
// Exception Graph
// ============================================================================

/// Index of an exception in an [`ExceptionGraph`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ExceptionId(pub usize);

/// One exception: header fields, its frames and its links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionRecord {
    pub type_name: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub trace: StackTrace,
    /// Causal inner exception.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner: Option<ExceptionId>,
    /// Aggregate children, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ExceptionId>,
    /// Cached trace string, replaced by the mutating entry points.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rendered_trace: Option<String>,
}

impl ExceptionRecord {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        ExceptionRecord {
            type_name: type_name.into(),
            message: message.into(),
            trace: StackTrace::default(),
            inner: None,
            children: Vec::new(),
            rendered_trace: None,
        }
    }

    pub fn with_trace(mut self, trace: StackTrace) -> Self {
        self.trace = trace;
        self
    }

    pub fn with_frames(mut self, frames: Vec<RawFrame>) -> Self {
        self.trace.frames = frames;
        self
    }

    pub fn with_rendered_trace(mut self, text: impl Into<String>) -> Self {
        self.rendered_trace = Some(text.into());
        self
    }

    /// Nested exceptions in render order: aggregate children, then the
    /// causal inner exception unless it is already one of the children.
    pub fn nested(&self) -> Vec<ExceptionId> {
        let mut nested = self.children.clone();
        if let Some(inner) = self.inner {
            if !nested.contains(&inner) {
                nested.push(inner);
            }
        }
        nested
    }
}

/// Arena of exceptions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExceptionGraph {
    nodes: Vec<ExceptionRecord>,
}

impl ExceptionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, record: ExceptionRecord) -> ExceptionId {
        self.nodes.push(record);
        ExceptionId(self.nodes.len() - 1)
    }

    pub fn get(&self, id: ExceptionId) -> Option<&ExceptionRecord> {
        self.nodes.get(id.0)
    }

    pub fn contains(&self, id: ExceptionId) -> bool {
        id.0 < self.nodes.len()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = ExceptionId> + '_ {
        (0..self.nodes.len()).map(ExceptionId)
    }

    fn get_mut(&mut self, id: ExceptionId) -> DemystifyResult<&mut ExceptionRecord> {
        self.nodes
            .get_mut(id.0)
            .ok_or(DemystifyError::UnknownException { id: id.0 })
    }

    /// Link `inner` as the causal inner exception of `id`.
    pub fn set_inner(&mut self, id: ExceptionId, inner: ExceptionId) -> DemystifyResult<()> {
        if !self.contains(inner) {
            return Err(DemystifyError::UnknownException { id: inner.0 });
        }
        self.get_mut(id)?.inner = Some(inner);
        Ok(())
    }

    /// Append `child` to the aggregate children of `id`.
    pub fn add_child(&mut self, id: ExceptionId, child: ExceptionId) -> DemystifyResult<()> {
        if !self.contains(child) {
            return Err(DemystifyError::UnknownException { id: child.0 });
        }
        self.get_mut(id)?.children.push(child);
        Ok(())
    }

    /// Cached trace string of `id`, if one has been set.
    pub fn rendered_trace(&self, id: ExceptionId) -> Option<&str> {
        self.get(id).and_then(|r| r.rendered_trace.as_deref())
    }

    /// Replace the cached trace string of `id`.
    pub fn set_rendered_trace(&mut self, id: ExceptionId, text: String) -> DemystifyResult<()> {
        self.get_mut(id)?.rendered_trace = Some(text);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
