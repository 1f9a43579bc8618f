//! Resolved (display-ready) model produced by one resolution pass.
//!
//! These types carry no tokens: everything needed for rendering has been
//! looked up and every compiler-specific check has already been made. The
//! renderers only ever match on variants.

use crate::convention::MethodKind;
use crate::metadata::ParamModifier;

// ============================================================================
// ResolvedType
// ============================================================================

/// One segment of a possibly nested type name (`Outer<T>` in `Outer<T>.Inner`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSegment {
    /// Display name with any arity suffix removed.
    pub name: String,
    /// Generic arguments that belong to this segment.
    pub args: Vec<ResolvedType>,
}

impl TypeSegment {
    pub fn new(name: impl Into<String>) -> Self {
        TypeSegment {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(name: impl Into<String>, args: Vec<ResolvedType>) -> Self {
        TypeSegment {
            name: name.into(),
            args,
        }
    }
}

/// A type ready for display.
///
/// `Dynamic` and `ForeignUnit` are markers rather than types: the first
/// renders as the `dynamic` keyword, the second is elided from parameter
/// lists entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedType {
    /// A named type, outermost segment first.
    Named {
        namespace: Option<String>,
        segments: Vec<TypeSegment>,
    },
    /// A primitive with a source keyword (`int` for `System.Int32`).
    Primitive { alias: String, full_name: String },
    /// An unbound generic parameter.
    GenericParam(String),
    /// `T[]`, `T[,]`, ...
    Array { element: Box<ResolvedType>, rank: u32 },
    /// `T*`
    Pointer(Box<ResolvedType>),
    /// `T&`
    ByRef(Box<ResolvedType>),
    /// `T?`
    Nullable(Box<ResolvedType>),
    /// `(A, B)`
    Tuple(Vec<ResolvedType>),
    /// Source-level `dynamic`.
    Dynamic,
    /// A foreign ecosystem's "no value" marker.
    ForeignUnit,
    /// Metadata could not be resolved.
    Unresolved,
    /// Resolution stopped at the depth guard.
    Truncated,
}

impl ResolvedType {
    /// A single-segment named type.
    pub fn named(namespace: Option<&str>, name: impl Into<String>) -> Self {
        ResolvedType::Named {
            namespace: namespace.map(str::to_string),
            segments: vec![TypeSegment::new(name)],
        }
    }

    pub fn is_foreign_unit(&self) -> bool {
        matches!(self, ResolvedType::ForeignUnit)
    }

    pub fn is_generic_param(&self) -> bool {
        matches!(self, ResolvedType::GenericParam(_))
    }
}

// ============================================================================
// ResolvedParameter
// ============================================================================

/// A parameter ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedParameter {
    pub name: Option<String>,
    pub ty: ResolvedType,
    pub prefix: Option<ParamModifier>,
    /// When set, `ty` is ignored and the dynamic marker is rendered.
    pub is_dynamic: bool,
}

impl ResolvedParameter {
    pub fn new(ty: ResolvedType) -> Self {
        ResolvedParameter {
            name: None,
            ty,
            prefix: None,
            is_dynamic: false,
        }
    }

    pub fn named(name: impl Into<String>, ty: ResolvedType) -> Self {
        ResolvedParameter {
            name: Some(name.into()),
            ..ResolvedParameter::new(ty)
        }
    }

    /// Parameters of the foreign unit type produce no output at all.
    pub fn is_elided(&self) -> bool {
        !self.is_dynamic && self.ty.is_foreign_unit()
    }
}

// ============================================================================
// ResolvedMethod
// ============================================================================

/// A method as the programmer wrote it.
///
/// `sub_method` links the chain of hoisted bodies (lambda, local function,
/// iterator `MoveNext`) from the outermost logical method inward.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedMethod {
    /// `None` for sub-method layers, which render without a declaring type.
    pub declaring_type: Option<ResolvedType>,
    pub name: String,
    pub kind: MethodKind,
    pub generic_arguments: Vec<ResolvedType>,
    pub parameters: Vec<ResolvedParameter>,
    /// `false` renders the parameter list as `(?)`.
    pub parameters_known: bool,
    pub is_async: bool,
    pub is_lambda: bool,
    /// Lambda ordinal within the enclosing method, when encoded.
    pub ordinal: Option<u32>,
    pub sub_method: Option<Box<ResolvedMethod>>,
}

impl ResolvedMethod {
    /// Iterate the sub-method chain, outermost first (excluding `self`).
    pub fn sub_methods(&self) -> SubMethods<'_> {
        SubMethods {
            next: self.sub_method.as_deref(),
        }
    }
}

/// Iterator over a [`ResolvedMethod`]'s sub-method chain.
pub struct SubMethods<'a> {
    next: Option<&'a ResolvedMethod>,
}

impl<'a> Iterator for SubMethods<'a> {
    type Item = &'a ResolvedMethod;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.sub_method.as_deref();
        Some(current)
    }
}

// ============================================================================
// Tests
// ============================================================================
