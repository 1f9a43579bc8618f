//! Metadata model consumed by the demystifier.
//!
//! Raw stack frames refer to types and methods through opaque tokens. This
//! module defines what those tokens resolve to and the [`Metadata`] trait the
//! engine resolves them through.
//!
//! ## Shapes
//!
//! - [`TypeDef::Named`]: a type definition (class, struct, interface, nested type)
//! - [`TypeDef::GenericInstance`]: a definition bound to concrete arguments
//! - [`TypeDef::GenericParam`]: an open generic parameter of a type or method
//! - [`TypeDef::Array`], [`TypeDef::Pointer`], [`TypeDef::ByRef`]: composite shapes
//!
//! ## Token Ownership
//!
//! Tokens are only meaningful against the [`Metadata`] implementation that
//! issued them. A token that does not resolve is not an error at this layer:
//! the resolver renders a fallback token instead.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Tokens
// ============================================================================

/// Opaque handle to a type definition or type shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeToken(pub u32);

impl fmt::Display for TypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type#{}", self.0)
    }
}

/// Opaque handle to a method definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MethodToken(pub u32);

impl fmt::Display for MethodToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "method#{}", self.0)
    }
}

// ============================================================================
// Type Definitions
// ============================================================================

/// Who declares an open generic parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenericOwner {
    Type,
    Method,
}

/// A type definition as the runtime describes it, before any display decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeDef {
    /// A named type definition.
    Named(NamedType),
    /// A generic definition bound to arguments (`Box<int>`).
    GenericInstance {
        definition: TypeToken,
        args: Vec<TypeToken>,
    },
    /// An open generic parameter (`T`).
    GenericParam {
        name: String,
        owner: GenericOwner,
        position: usize,
    },
    /// An array of `element` with the given rank (1 for `T[]`).
    Array {
        element: TypeToken,
        #[serde(default = "default_rank")]
        rank: u32,
    },
    /// An unmanaged pointer (`T*`).
    Pointer { element: TypeToken },
    /// A managed reference (`T&`).
    ByRef { element: TypeToken },
}

fn default_rank() -> u32 {
    1
}

/// A named type definition.
///
/// `name` is the metadata name, which may carry a generic arity suffix
/// (``Box`1``) or a compiler-generated shape (`<Run>d__4`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NamedType {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Enclosing type for nested types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declaring_type: Option<TypeToken>,
    /// Declared generic parameter names, including those re-declared from
    /// enclosing types.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub generic_params: Vec<String>,
    /// Module (assembly file) the type lives in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    /// Full names of implemented interfaces.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub compiler_generated: bool,
}

impl NamedType {
    pub fn new(name: impl Into<String>) -> Self {
        NamedType {
            name: name.into(),
            ..NamedType::default()
        }
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn nested_in(mut self, declaring_type: TypeToken) -> Self {
        self.declaring_type = Some(declaring_type);
        self
    }

    pub fn with_generic_params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.generic_params = params.into_iter().map(Into::into).collect();
        self
    }

    pub fn in_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn implementing(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn compiler_generated(mut self) -> Self {
        self.compiler_generated = true;
        self
    }

    /// Check whether the type declares the given interface (by full name).
    pub fn implements(&self, interface: &str) -> bool {
        self.interfaces.iter().any(|i| i == interface)
    }
}

// ============================================================================
// Method Definitions
// ============================================================================

/// Parameter passing modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamModifier {
    Ref,
    Out,
    In,
    Params,
}

impl ParamModifier {
    /// Source-level keyword for the modifier.
    pub fn keyword(self) -> &'static str {
        match self {
            ParamModifier::Ref => "ref",
            ParamModifier::Out => "out",
            ParamModifier::In => "in",
            ParamModifier::Params => "params",
        }
    }
}

/// A declared method parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub ty: TypeToken,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier: Option<ParamModifier>,
    /// Declared as `dynamic` at the source level.
    #[serde(default)]
    pub dynamic: bool,
}

impl ParamDef {
    pub fn new(name: impl Into<String>, ty: TypeToken) -> Self {
        ParamDef {
            name: Some(name.into()),
            ty,
            modifier: None,
            dynamic: false,
        }
    }

    pub fn with_modifier(mut self, modifier: ParamModifier) -> Self {
        self.modifier = Some(modifier);
        self
    }

    pub fn dynamic(mut self) -> Self {
        self.dynamic = true;
        self
    }
}

/// Kind of compiler-synthesized state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateMachineKind {
    Async,
    Iterator,
    AsyncIterator,
}

impl StateMachineKind {
    pub fn is_async(self) -> bool {
        matches!(self, StateMachineKind::Async | StateMachineKind::AsyncIterator)
    }

    pub fn is_iterator(self) -> bool {
        matches!(
            self,
            StateMachineKind::Iterator | StateMachineKind::AsyncIterator
        )
    }
}

/// Association from an original method to the state machine type the
/// compiler generated for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateMachineAttr {
    pub kind: StateMachineKind,
    pub state_machine_type: TypeToken,
}

/// A method definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDef {
    pub name: String,
    pub declaring_type: TypeToken,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub generic_params: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParamDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_machine: Option<StateMachineAttr>,
    /// Method ordinal the compiler embeds in names generated for this method.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordinal: Option<u32>,
}

impl MethodDef {
    pub fn new(name: impl Into<String>, declaring_type: TypeToken) -> Self {
        MethodDef {
            name: name.into(),
            declaring_type,
            generic_params: Vec::new(),
            parameters: Vec::new(),
            state_machine: None,
            ordinal: None,
        }
    }

    pub fn with_generic_params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.generic_params = params.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_param(mut self, param: ParamDef) -> Self {
        self.parameters.push(param);
        self
    }

    pub fn with_state_machine(mut self, kind: StateMachineKind, state_machine_type: TypeToken) -> Self {
        self.state_machine = Some(StateMachineAttr {
            kind,
            state_machine_type,
        });
        self
    }

    pub fn with_ordinal(mut self, ordinal: u32) -> Self {
        self.ordinal = Some(ordinal);
        self
    }
}

// ============================================================================
// Metadata Trait
// ============================================================================

/// Read-only access to type and method metadata.
///
/// Implementations must be deterministic: the same token always resolves to
/// the same definition for the lifetime of a render call.
pub trait Metadata {
    /// Look up a type by token.
    fn type_def(&self, token: TypeToken) -> Option<&TypeDef>;

    /// Look up a method by token.
    fn method_def(&self, token: MethodToken) -> Option<&MethodDef>;

    /// Methods declared on a type, in declaration order.
    fn methods_of(&self, ty: TypeToken) -> Vec<MethodToken>;
}

// ============================================================================
// In-memory Table
// ============================================================================

/// In-memory metadata keyed by raw token value.
///
/// Declaration order is token order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataTable {
    #[serde(default)]
    types: BTreeMap<u32, TypeDef>,
    #[serde(default)]
    methods: BTreeMap<u32, MethodDef>,
}

impl MetadataTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a type, replacing any previous definition for the token.
    pub fn insert_type(&mut self, token: TypeToken, def: TypeDef) {
        self.types.insert(token.0, def);
    }

    /// Insert a method, replacing any previous definition for the token.
    pub fn insert_method(&mut self, token: MethodToken, def: MethodDef) {
        self.methods.insert(token.0, def);
    }

    /// Builder-style variant of [`insert_type`](Self::insert_type).
    pub fn with_type(mut self, token: u32, def: TypeDef) -> Self {
        self.insert_type(TypeToken(token), def);
        self
    }

    /// Builder-style variant of [`insert_method`](Self::insert_method).
    pub fn with_method(mut self, token: u32, def: MethodDef) -> Self {
        self.insert_method(MethodToken(token), def);
        self
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn method_count(&self) -> usize {
        self.methods.len()
    }
}

impl Metadata for MetadataTable {
    fn type_def(&self, token: TypeToken) -> Option<&TypeDef> {
        self.types.get(&token.0)
    }

    fn method_def(&self, token: MethodToken) -> Option<&MethodDef> {
        self.methods.get(&token.0)
    }

    fn methods_of(&self, ty: TypeToken) -> Vec<MethodToken> {
        self.methods
            .iter()
            .filter(|(_, m)| m.declaring_type == ty)
            .map(|(token, _)| MethodToken(*token))
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
