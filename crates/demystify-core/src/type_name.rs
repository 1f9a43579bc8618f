//! Type resolution and display formatting.
//!
//! Resolution turns a [`TypeToken`] into a [`ResolvedType`] under a generic
//! binding environment; formatting turns a [`ResolvedType`] into text. The
//! two are separate so that one resolution pass can feed both the plain and
//! the styled renderer.
//!
//! ## Display Rules
//!
//! - Nested types render as `Outer.Inner`
//! - Generic types render as `Name<Arg1, Arg2>`; arity suffixes are dropped
//! - Open parameters inside argument lists render by name, or as an empty
//!   placeholder (`Dictionary<,>`) when names are excluded
//! - Arrays render as `T[]`, `T[,]`; pointers as `T*`; by-refs as `T&`.
//!   A rank above [`MAX_ARRAY_RANK`] does not resolve.
//! - Primitives render with their source keyword unless fully qualified
//! - Anything that fails to resolve renders as `?`
//!
//! ## Termination
//!
//! Metadata is external input and may be cyclic (a type instantiated with
//! itself). Resolution tracks the tokens on the current path, caps the
//! depth at [`MAX_TYPE_DEPTH`] and the total node count at
//! [`MAX_TYPE_NODES`]; hitting any guard yields [`ResolvedType::Truncated`].

use tracing::debug;

use crate::convention::NamingConvention;
use crate::error::{DemystifyError, DemystifyResult};
use crate::metadata::{
    GenericOwner, Metadata, MethodDef, MethodToken, NamedType, TypeDef, TypeToken,
};
use crate::sink::{PlainBuilder, Sink, Style};
use crate::types::{ResolvedType, TypeSegment};

/// Maximum nesting depth of a resolved type.
pub const MAX_TYPE_DEPTH: usize = 32;

/// Maximum number of type nodes produced by one top-level resolution.
pub const MAX_TYPE_NODES: usize = 4096;

/// Highest array rank the runtime allows.
pub const MAX_ARRAY_RANK: u32 = 32;

// ============================================================================
// Options and Environment
// ============================================================================

/// Options for [`format_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOptions {
    /// Prefix named types with their namespace.
    pub fully_qualified: bool,
    /// Render open generic parameters inside argument lists by name.
    pub include_generic_param_names: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        FormatOptions {
            fully_qualified: false,
            include_generic_param_names: true,
        }
    }
}

/// Concrete arguments bound to open generic parameters for one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenericEnv {
    pub type_args: Vec<TypeToken>,
    pub method_args: Vec<TypeToken>,
}

impl GenericEnv {
    pub fn new(type_args: Vec<TypeToken>, method_args: Vec<TypeToken>) -> Self {
        GenericEnv {
            type_args,
            method_args,
        }
    }

    fn lookup(&self, owner: GenericOwner, position: usize) -> Option<TypeToken> {
        match owner {
            GenericOwner::Type => self.type_args.get(position).copied(),
            GenericOwner::Method => self.method_args.get(position).copied(),
        }
    }
}

/// Per-call guard state for one top-level resolution.
#[derive(Default)]
struct Budget {
    path: Vec<TypeToken>,
    nodes: usize,
}

// ============================================================================
// Resolution
// ============================================================================

/// Metadata plus the naming convention used to interpret it.
#[derive(Clone, Copy)]
pub struct ResolveContext<'a> {
    pub metadata: &'a dyn Metadata,
    pub convention: &'a dyn NamingConvention,
}

impl<'a> ResolveContext<'a> {
    pub fn new(metadata: &'a dyn Metadata, convention: &'a dyn NamingConvention) -> Self {
        ResolveContext {
            metadata,
            convention,
        }
    }

    pub fn lookup_type(&self, token: TypeToken) -> DemystifyResult<&'a TypeDef> {
        self.metadata
            .type_def(token)
            .ok_or(DemystifyError::UnknownType { token })
    }

    pub fn lookup_method(&self, token: MethodToken) -> DemystifyResult<&'a MethodDef> {
        self.metadata
            .method_def(token)
            .ok_or(DemystifyError::UnknownMethod { token })
    }

    /// Split a type token into its named definition and instance arguments.
    ///
    /// Plain definitions yield no arguments; composite shapes are an error.
    pub fn definition_of(
        &self,
        token: TypeToken,
    ) -> DemystifyResult<(TypeToken, &'a NamedType, Vec<TypeToken>)> {
        match self.lookup_type(token)? {
            TypeDef::Named(named) => Ok((token, named, Vec::new())),
            TypeDef::GenericInstance { definition, args } => match self.lookup_type(*definition)? {
                TypeDef::Named(named) => Ok((*definition, named, args.clone())),
                _ => Err(DemystifyError::UnknownType { token: *definition }),
            },
            _ => Err(DemystifyError::UnknownType { token }),
        }
    }

    /// The named definition behind a token, if it is one.
    pub fn named(&self, token: TypeToken) -> Option<&'a NamedType> {
        self.definition_of(token).ok().map(|(_, named, _)| named)
    }

    /// Resolve a type token under `env`. Never fails: unresolved metadata
    /// yields [`ResolvedType::Unresolved`].
    pub fn resolve_type(&self, token: TypeToken, env: &GenericEnv) -> ResolvedType {
        let mut budget = Budget::default();
        self.resolve_at(token, env, &mut budget)
    }

    /// Resolve a named definition with already-resolved instance arguments.
    ///
    /// Empty `args` on a generic definition render its open parameters.
    pub fn resolve_definition(&self, named: &NamedType, args: Vec<ResolvedType>) -> ResolvedType {
        self.resolve_named(named, args)
    }

    fn resolve_at(&self, token: TypeToken, env: &GenericEnv, budget: &mut Budget) -> ResolvedType {
        if budget.path.len() >= MAX_TYPE_DEPTH || budget.nodes >= MAX_TYPE_NODES {
            debug!(%token, depth = budget.path.len(), "type resolution truncated");
            return ResolvedType::Truncated;
        }
        if budget.path.contains(&token) {
            debug!(%token, "cyclic type instantiation");
            return ResolvedType::Truncated;
        }

        let def = match self.lookup_type(token) {
            Ok(def) => def,
            Err(err) => {
                debug!(error = %err, "type fallback");
                return ResolvedType::Unresolved;
            }
        };

        budget.nodes += 1;
        budget.path.push(token);
        let resolved = match def {
            TypeDef::Named(named) => self.resolve_named(named, Vec::new()),
            TypeDef::GenericInstance { definition, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.resolve_at(*arg, env, budget))
                    .collect();
                match self.lookup_type(*definition) {
                    Ok(TypeDef::Named(named)) => self.resolve_named(named, args),
                    Ok(_) => ResolvedType::Unresolved,
                    Err(err) => {
                        debug!(error = %err, "generic definition fallback");
                        ResolvedType::Unresolved
                    }
                }
            }
            TypeDef::GenericParam {
                name,
                owner,
                position,
            } => match env.lookup(*owner, *position) {
                Some(bound) => self.resolve_at(bound, &GenericEnv::default(), budget),
                None => ResolvedType::GenericParam(name.clone()),
            },
            TypeDef::Array { rank, .. } if *rank > MAX_ARRAY_RANK => {
                debug!(rank, "array rank out of range");
                ResolvedType::Unresolved
            }
            TypeDef::Array { element, rank } => ResolvedType::Array {
                element: Box::new(self.resolve_at(*element, env, budget)),
                rank: (*rank).max(1),
            },
            TypeDef::Pointer { element } => {
                ResolvedType::Pointer(Box::new(self.resolve_at(*element, env, budget)))
            }
            TypeDef::ByRef { element } => {
                ResolvedType::ByRef(Box::new(self.resolve_at(*element, env, budget)))
            }
        };
        budget.path.pop();
        resolved
    }

    fn resolve_named(&self, named: &NamedType, mut args: Vec<ResolvedType>) -> ResolvedType {
        let convention = self.convention;

        if convention.is_foreign_unit(named) {
            return ResolvedType::ForeignUnit;
        }
        if args.is_empty() {
            if let Some(alias) = convention.primitive_alias(named.namespace.as_deref(), &named.name)
            {
                return ResolvedType::Primitive {
                    alias: alias.to_string(),
                    full_name: qualified_name(named),
                };
            }
        }
        if convention.is_nullable(named) && args.len() == 1 {
            if let Some(inner) = args.pop() {
                return ResolvedType::Nullable(Box::new(inner));
            }
        }
        if convention.is_value_tuple(named) && !args.is_empty() {
            return ResolvedType::Tuple(args);
        }

        // Declaring chain, innermost first.
        let mut chain = vec![named];
        let mut current = named;
        while let Some(parent) = current.declaring_type {
            if chain.len() >= MAX_TYPE_DEPTH {
                break;
            }
            match self.lookup_type(parent) {
                Ok(TypeDef::Named(parent_def)) => {
                    chain.push(parent_def);
                    current = parent_def;
                }
                _ => break,
            }
        }
        chain.reverse();

        if args.is_empty() {
            args = named
                .generic_params
                .iter()
                .map(|p| ResolvedType::GenericParam(p.clone()))
                .collect();
        }

        // Nested types carry the flattened argument list of their whole
        // declaring chain; hand each segment its own arity.
        let last = chain.len() - 1;
        let mut remaining = args.into_iter();
        let mut segments = Vec::with_capacity(chain.len());
        for (index, def) in chain.iter().enumerate() {
            let (display, arity) = split_arity(&def.name);
            let take = if index == last {
                usize::MAX
            } else {
                arity.unwrap_or(0)
            };
            let seg_args: Vec<ResolvedType> = remaining.by_ref().take(take).collect();
            segments.push(TypeSegment::with_args(display, seg_args));
        }

        ResolvedType::Named {
            namespace: chain[0].namespace.clone(),
            segments,
        }
    }
}

fn qualified_name(named: &NamedType) -> String {
    match named.namespace.as_deref() {
        Some(ns) if !ns.is_empty() => format!("{}.{}", ns, named.name),
        _ => named.name.clone(),
    }
}

/// Split ``Name`2`` into `("Name", Some(2))`.
pub fn split_arity(name: &str) -> (&str, Option<usize>) {
    match name.rsplit_once('`') {
        Some((base, count)) => match count.parse() {
            Ok(n) => (base, Some(n)),
            Err(_) => (name, None),
        },
        None => (name, None),
    }
}

// ============================================================================
// Formatting
// ============================================================================

/// Format a resolved type for display.
pub fn format_type(ty: &ResolvedType, options: FormatOptions) -> String {
    let mut builder = PlainBuilder::new();
    render_type(ty, options, &mut builder);
    builder.finish()
}

/// Write a resolved type's display form into a sink.
pub fn render_type(ty: &ResolvedType, options: FormatOptions, sink: &mut dyn Sink) {
    match ty {
        ResolvedType::Named {
            namespace,
            segments,
        } => {
            if options.fully_qualified {
                if let Some(ns) = namespace.as_deref().filter(|ns| !ns.is_empty()) {
                    sink.append_styled(ns, Style::TypeName);
                    sink.append_styled(".", Style::Punctuation);
                }
            }
            for (index, segment) in segments.iter().enumerate() {
                if index > 0 {
                    sink.append_styled(".", Style::Punctuation);
                }
                sink.append_styled(&segment.name, Style::TypeName);
                render_generic_args(&segment.args, options, sink);
            }
        }
        ResolvedType::Primitive { alias, full_name } => {
            if options.fully_qualified {
                sink.append_styled(full_name, Style::TypeName);
            } else {
                sink.append_styled(alias, Style::Keyword);
            }
        }
        ResolvedType::GenericParam(name) => sink.append_styled(name, Style::TypeName),
        ResolvedType::Array { element, rank } => {
            render_type(element, options, sink);
            let mut brackets = String::from("[");
            for _ in 1..(*rank).min(MAX_ARRAY_RANK) {
                brackets.push(',');
            }
            brackets.push(']');
            sink.append_styled(&brackets, Style::Punctuation);
        }
        ResolvedType::Pointer(element) => {
            render_type(element, options, sink);
            sink.append_styled("*", Style::Punctuation);
        }
        ResolvedType::ByRef(element) => {
            render_type(element, options, sink);
            sink.append_styled("&", Style::Punctuation);
        }
        ResolvedType::Nullable(inner) => {
            render_type(inner, options, sink);
            sink.append_styled("?", Style::Punctuation);
        }
        ResolvedType::Tuple(elements) => {
            sink.append_styled("(", Style::Punctuation);
            for (index, element) in elements.iter().enumerate() {
                if index > 0 {
                    sink.append_styled(", ", Style::Punctuation);
                }
                render_type(element, options, sink);
            }
            sink.append_styled(")", Style::Punctuation);
        }
        ResolvedType::Dynamic => sink.append_styled("dynamic", Style::Keyword),
        ResolvedType::ForeignUnit => sink.append_styled("Unit", Style::TypeName),
        ResolvedType::Unresolved => sink.append_styled("?", Style::Marker),
        ResolvedType::Truncated => sink.append_styled("...", Style::Marker),
    }
}

/// Write `<A, B>` for a generic argument list; nothing when empty.
pub fn render_generic_args(args: &[ResolvedType], options: FormatOptions, sink: &mut dyn Sink) {
    if args.is_empty() {
        return;
    }
    let hide_open = !options.include_generic_param_names;
    let all_placeholders = hide_open && args.iter().all(ResolvedType::is_generic_param);
    let separator = if all_placeholders { "," } else { ", " };

    sink.append_styled("<", Style::Punctuation);
    for (index, arg) in args.iter().enumerate() {
        if index > 0 {
            sink.append_styled(separator, Style::Punctuation);
        }
        if hide_open && arg.is_generic_param() {
            continue;
        }
        render_type(arg, options, sink);
    }
    sink.append_styled(">", Style::Punctuation);
}

// ============================================================================
// Tests
// ============================================================================
