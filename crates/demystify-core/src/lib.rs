//! Core engine for demystify.
//!
//! This crate turns raw, compiler-emitted stack traces into the names the
//! programmer wrote:
//! - Metadata model and the `Metadata` lookup trait
//! - Naming-convention table for compiler-generated names
//! - Type name resolution and formatting
//! - Method demystification (lambdas, local functions, state machines)
//! - Frame and exception tree rendering
//! - Plain and styled output sinks, console markup
//! - Render configuration, error types, trace documents
//!
//! The usual entry point is [`Engine`]:
//!
//! ```
//! use demystify_core::{Engine, ExceptionGraph, ExceptionRecord, MetadataTable, RenderOptions};
//!
//! let metadata = MetadataTable::new();
//! let mut graph = ExceptionGraph::new();
//! let root = graph.add(ExceptionRecord::new("System.Exception", "boom"));
//!
//! let engine = Engine::new(&metadata).with_options(RenderOptions::default());
//! assert_eq!(engine.to_string_demystified(&graph, root), "System.Exception: boom");
//! ```

pub mod config;
pub mod convention;
pub mod demystifier;
pub mod document;
pub mod engine;
pub mod error;
pub mod exception;
pub mod frame;
pub mod markup;
pub mod metadata;
pub mod parameter;
pub mod sink;
pub mod tree;
pub mod type_name;
pub mod types;

pub use config::RenderOptions;
pub use convention::{NamingConvention, RoslynConvention};
pub use document::TraceDocument;
pub use engine::Engine;
pub use error::{DemystifyError, DemystifyResult, ErrorCode};
pub use exception::{ExceptionGraph, ExceptionId, ExceptionRecord, RawFrame, StackTrace};
pub use metadata::{Metadata, MetadataTable, MethodToken, TypeToken};
pub use sink::{PlainBuilder, Sink, Style, StyledBuilder};
pub use types::{ResolvedMethod, ResolvedParameter, ResolvedType};
