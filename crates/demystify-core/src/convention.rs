//! Compiler naming conventions.
//!
//! Compilers hide lambdas, local functions, closures and state machines behind
//! synthesized names. The [`NamingConvention`] trait isolates every
//! compiler-specific pattern the demystifier relies on, so that supporting a
//! different compiler means supplying a different table, not changing the
//! resolution algorithm.
//!
//! # Roslyn (C#) patterns
//!
//! [`RoslynConvention`] implements the C# compiler's scheme:
//!
//! | Construct            | Example                     | Kind char |
//! |----------------------|-----------------------------|-----------|
//! | lambda method        | `<Outer>b__2_0`             | `b`       |
//! | local function       | `<Outer>g__Local\|2_0`      | `g`       |
//! | state machine type   | `<Outer>d__4`               | `d`       |
//! | display class        | `<>c__DisplayClass2_0`      | `c`       |
//! | legacy prefix        | `CS$<Outer>...`             |           |
//!
//! A generated name opens with `<` (or `CS$<`). The enclosing name is the
//! bracket-balanced fragment and may itself be generated
//! (`<<Outer>b__0_0>d`). The kind is the single character in `[1-9a-z]`
//! right after the closing bracket; an optional `__` separates the suffix.
//!
//! State machines are recognized by interface: async state machines implement
//! `System.Runtime.CompilerServices.IAsyncStateMachine`, iterators implement
//! `System.Collections.IEnumerator`. Types named with the `d` kind are also
//! treated as state machines.
//!
//! # Alias table
//!
//! Primitive types in the `System` namespace render with their C# keyword:
//!
//! | Runtime name | Alias     | Runtime name | Alias    |
//! |--------------|-----------|--------------|----------|
//! | `Void`       | `void`    | `Int16`      | `short`  |
//! | `Boolean`    | `bool`    | `UInt16`     | `ushort` |
//! | `Byte`       | `byte`    | `Int32`      | `int`    |
//! | `SByte`      | `sbyte`   | `UInt32`     | `uint`   |
//! | `Char`       | `char`    | `Int64`      | `long`   |
//! | `Decimal`    | `decimal` | `UInt64`     | `ulong`  |
//! | `Double`     | `double`  | `Object`     | `object` |
//! | `Single`     | `float`   | `String`     | `string` |

use std::sync::LazyLock;

use regex::Regex;

use crate::metadata::{NamedType, StateMachineKind};

// ============================================================================
// Generated Names
// ============================================================================

/// Kind of compiler-generated name, keyed by the kind character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneratedNameKind {
    /// `b`: lambda body hoisted into a method.
    LambdaMethod,
    /// `g`: local function hoisted into a method.
    LocalFunction,
    /// `d`: async or iterator state machine type.
    StateMachineType,
    /// `c`: closure container holding captured variables.
    DisplayClass,
    /// Any other kind character the compiler emits.
    Other(char),
}

impl GeneratedNameKind {
    fn from_char(c: char) -> Self {
        match c {
            'b' => GeneratedNameKind::LambdaMethod,
            'g' => GeneratedNameKind::LocalFunction,
            'd' => GeneratedNameKind::StateMachineType,
            'c' => GeneratedNameKind::DisplayClass,
            other => GeneratedNameKind::Other(other),
        }
    }

    /// Lambdas and local functions are hoisted out of an enclosing method.
    pub fn is_hoisted_body(self) -> bool {
        matches!(
            self,
            GeneratedNameKind::LambdaMethod | GeneratedNameKind::LocalFunction
        )
    }
}

/// A parsed compiler-generated name, borrowing from the mangled identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratedName<'a> {
    pub kind: GeneratedNameKind,
    /// Name of the enclosing method (may itself be generated).
    pub enclosing: &'a str,
    /// Everything after the kind character and optional `__` separator.
    pub suffix: &'a str,
}

/// How a method name maps onto source-level method kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MethodKind {
    #[default]
    Method,
    Constructor,
    StaticConstructor,
}

// ============================================================================
// Convention Trait
// ============================================================================

/// The pattern table for one compiler's generated names and type aliases.
///
/// Every query is a pure function of its arguments; implementations are
/// shared read-only across render calls.
pub trait NamingConvention {
    /// Parse a compiler-generated name; `None` if `name` is not generated.
    fn parse_generated_name<'a>(&self, name: &'a str) -> Option<GeneratedName<'a>>;

    /// Name of a local function embedded in a generated name.
    fn local_function_name<'a>(&self, generated: &GeneratedName<'a>) -> Option<&'a str>;

    /// Method ordinal hint embedded in a generated name.
    fn ordinal_hint(&self, generated: &GeneratedName<'_>) -> Option<u32>;

    /// Lambda ordinal within the enclosing method, if the name encodes one.
    fn lambda_ordinal(&self, generated: &GeneratedName<'_>) -> Option<u32>;

    /// Whether an enclosing-name fragment is well formed enough to trust.
    fn is_well_formed_fragment(&self, fragment: &str) -> bool;

    /// State machine kind declared by a type's interfaces, if any.
    fn state_machine_kind(&self, ty: &NamedType) -> Option<StateMachineKind>;

    /// Whether a type is a synthesized state machine (by interface or name).
    fn is_state_machine(&self, ty: &NamedType) -> bool;

    /// Whether a type is the foreign ecosystem's "no value" marker.
    fn is_foreign_unit(&self, ty: &NamedType) -> bool;

    /// Whether a type is the nullable-value wrapper rendered as `T?`.
    fn is_nullable(&self, ty: &NamedType) -> bool;

    /// Whether a type is a value tuple rendered as `(A, B)`.
    fn is_value_tuple(&self, ty: &NamedType) -> bool;

    /// Source keyword for a primitive type, if it has one.
    fn primitive_alias(&self, namespace: Option<&str>, name: &str) -> Option<&'static str>;

    /// Classify a method name.
    fn method_kind(&self, name: &str) -> MethodKind;
}

// ============================================================================
// Roslyn
// ============================================================================

const ASYNC_STATE_MACHINE: &str = "System.Runtime.CompilerServices.IAsyncStateMachine";
const ENUMERATOR: &str = "System.Collections.IEnumerator";
const FOREIGN_UNIT_MODULE: &str = "FSharp.Core.dll";

/// Generated names nested deeper than this are not trusted as fragments.
pub const MAX_FRAGMENT_NESTING: usize = 8;

const PRIMITIVE_ALIASES: &[(&str, &str)] = &[
    ("Void", "void"),
    ("Boolean", "bool"),
    ("Byte", "byte"),
    ("SByte", "sbyte"),
    ("Char", "char"),
    ("Decimal", "decimal"),
    ("Double", "double"),
    ("Single", "float"),
    ("Int16", "short"),
    ("UInt16", "ushort"),
    ("Int32", "int"),
    ("UInt32", "uint"),
    ("Int64", "long"),
    ("UInt64", "ulong"),
    ("Object", "object"),
    ("String", "string"),
];

/// `<digits>[_<digits>]` at the start of a suffix: method ordinal, lambda ordinal.
static ORDINAL_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)(?:_(\d+))?").unwrap());

/// `Local|2_0`: local function name, then ordinals.
static LOCAL_FUNCTION_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^|]+)\|(\d+)?(?:_(\d+))?").unwrap());

/// Identifier-ish fragment: letters, digits, `_`, `.`, backtick arity.
static PLAIN_FRAGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\.?[A-Za-z_][A-Za-z0-9_.`]*$").unwrap());

/// The C# compiler's naming scheme.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoslynConvention;

impl RoslynConvention {
    /// Byte index of the `>` balancing the `<` at `open`.
    fn balanced_close(name: &str, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        for (idx, c) in name[open..].char_indices() {
            match c {
                '<' => depth += 1,
                '>' => {
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        return Some(open + idx);
                    }
                }
                _ => {}
            }
        }
        None
    }
}

impl NamingConvention for RoslynConvention {
    fn parse_generated_name<'a>(&self, name: &'a str) -> Option<GeneratedName<'a>> {
        let open = if name.starts_with("CS$<") {
            3
        } else if name.starts_with('<') {
            0
        } else {
            return None;
        };

        let close = Self::balanced_close(name, open)?;
        let kind_char = name[close + 1..].chars().next()?;
        if !(('1'..='9').contains(&kind_char) || kind_char.is_ascii_lowercase()) {
            return None;
        }

        let rest = &name[close + 1 + kind_char.len_utf8()..];
        Some(GeneratedName {
            kind: GeneratedNameKind::from_char(kind_char),
            enclosing: &name[open + 1..close],
            suffix: rest.strip_prefix("__").unwrap_or(rest),
        })
    }

    fn local_function_name<'a>(&self, generated: &GeneratedName<'a>) -> Option<&'a str> {
        if generated.kind != GeneratedNameKind::LocalFunction {
            return None;
        }
        let suffix: &'a str = generated.suffix;
        LOCAL_FUNCTION_SUFFIX
            .captures(suffix)
            .and_then(|caps| caps.get(1))
            .map(|m| &suffix[m.start()..m.end()])
    }

    fn ordinal_hint(&self, generated: &GeneratedName<'_>) -> Option<u32> {
        match generated.kind {
            GeneratedNameKind::LocalFunction => LOCAL_FUNCTION_SUFFIX
                .captures(generated.suffix)
                .and_then(|caps| caps.get(2))
                .and_then(|m| m.as_str().parse().ok()),
            _ => ORDINAL_SUFFIX
                .captures(generated.suffix)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse().ok()),
        }
    }

    fn lambda_ordinal(&self, generated: &GeneratedName<'_>) -> Option<u32> {
        if generated.kind != GeneratedNameKind::LambdaMethod {
            return None;
        }
        ORDINAL_SUFFIX
            .captures(generated.suffix)
            .and_then(|caps| caps.get(2))
            .and_then(|m| m.as_str().parse().ok())
    }

    fn is_well_formed_fragment(&self, fragment: &str) -> bool {
        let mut current = fragment;
        for _ in 0..MAX_FRAGMENT_NESTING {
            if current.is_empty() {
                return false;
            }
            match self.parse_generated_name(current) {
                Some(nested) => current = nested.enclosing,
                None => return PLAIN_FRAGMENT.is_match(current),
            }
        }
        false
    }

    fn state_machine_kind(&self, ty: &NamedType) -> Option<StateMachineKind> {
        let is_async = ty.implements(ASYNC_STATE_MACHINE);
        let is_iterator = ty.implements(ENUMERATOR);
        match (is_async, is_iterator) {
            (true, true) => Some(StateMachineKind::AsyncIterator),
            (true, false) => Some(StateMachineKind::Async),
            (false, true) => Some(StateMachineKind::Iterator),
            (false, false) => None,
        }
    }

    fn is_state_machine(&self, ty: &NamedType) -> bool {
        if self.state_machine_kind(ty).is_some() {
            return true;
        }
        matches!(
            self.parse_generated_name(&ty.name),
            Some(GeneratedName {
                kind: GeneratedNameKind::StateMachineType,
                ..
            })
        )
    }

    fn is_foreign_unit(&self, ty: &NamedType) -> bool {
        ty.name == "Unit" && ty.module.as_deref() == Some(FOREIGN_UNIT_MODULE)
    }

    fn is_nullable(&self, ty: &NamedType) -> bool {
        ty.namespace.as_deref() == Some("System") && ty.name == "Nullable`1"
    }

    fn is_value_tuple(&self, ty: &NamedType) -> bool {
        ty.namespace.as_deref() == Some("System") && ty.name.starts_with("ValueTuple`")
    }

    fn primitive_alias(&self, namespace: Option<&str>, name: &str) -> Option<&'static str> {
        if namespace != Some("System") {
            return None;
        }
        PRIMITIVE_ALIASES
            .iter()
            .find(|(runtime, _)| *runtime == name)
            .map(|(_, alias)| *alias)
    }

    fn method_kind(&self, name: &str) -> MethodKind {
        match name {
            ".ctor" => MethodKind::Constructor,
            ".cctor" => MethodKind::StaticConstructor,
            _ => MethodKind::Method,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(name: &str) -> Option<GeneratedName<'_>> {
        RoslynConvention.parse_generated_name(name)
    }

    mod generated_names {
        use super::*;

        #[test]
        fn lambda_method() {
            let g = parse("<Outer>b__3").unwrap();
            assert_eq!(g.kind, GeneratedNameKind::LambdaMethod);
            assert_eq!(g.enclosing, "Outer");
            assert_eq!(g.suffix, "3");
        }

        #[test]
        fn local_function() {
            let g = parse("<Outer>g__Local|2_0").unwrap();
            assert_eq!(g.kind, GeneratedNameKind::LocalFunction);
            assert_eq!(g.enclosing, "Outer");
            assert_eq!(RoslynConvention.local_function_name(&g), Some("Local"));
            assert_eq!(RoslynConvention.ordinal_hint(&g), Some(2));
        }

        #[test]
        fn state_machine_type() {
            let g = parse("<RunAsync>d__4").unwrap();
            assert_eq!(g.kind, GeneratedNameKind::StateMachineType);
            assert_eq!(g.enclosing, "RunAsync");
            assert_eq!(RoslynConvention.ordinal_hint(&g), Some(4));
        }

        #[test]
        fn nested_generated_enclosing_name() {
            let g = parse("<<Main>b__0_0>d").unwrap();
            assert_eq!(g.kind, GeneratedNameKind::StateMachineType);
            assert_eq!(g.enclosing, "<Main>b__0_0");
            assert_eq!(g.suffix, "");
        }

        #[test]
        fn display_class_has_empty_enclosing_name() {
            let g = parse("<>c__DisplayClass2_0").unwrap();
            assert_eq!(g.kind, GeneratedNameKind::DisplayClass);
            assert_eq!(g.enclosing, "");
            assert!(!RoslynConvention.is_well_formed_fragment(g.enclosing));
        }

        #[test]
        fn legacy_prefix() {
            let g = parse("CS$<Outer>b__1").unwrap();
            assert_eq!(g.kind, GeneratedNameKind::LambdaMethod);
            assert_eq!(g.enclosing, "Outer");
        }

        #[test]
        fn lambda_ordinals() {
            let g = parse("<Outer>b__2_5").unwrap();
            assert_eq!(RoslynConvention.ordinal_hint(&g), Some(2));
            assert_eq!(RoslynConvention.lambda_ordinal(&g), Some(5));
        }

        #[test]
        fn rejects_plain_and_unbalanced_names() {
            assert!(parse("Main").is_none());
            assert!(parse("<Outer").is_none());
            assert!(parse("<Outer>").is_none());
            assert!(parse("<Outer>B__1").is_none());
            assert!(parse("op_LessThan").is_none());
        }

        #[test]
        fn foreign_mangling_is_not_generated() {
            assert!(parse("_ZN4core3ptr13drop_in_place17h0123456789abcdefE").is_none());
            assert!(parse("Outer@12-1").is_none());
        }
    }

    mod fragments {
        use super::*;

        #[test]
        fn plain_identifiers_are_well_formed() {
            assert!(RoslynConvention.is_well_formed_fragment("Outer"));
            assert!(RoslynConvention.is_well_formed_fragment(".ctor"));
            assert!(RoslynConvention.is_well_formed_fragment("System.IDisposable.Dispose"));
        }

        #[test]
        fn garbage_is_not_well_formed() {
            assert!(!RoslynConvention.is_well_formed_fragment(""));
            assert!(!RoslynConvention.is_well_formed_fragment("1abc"));
            assert!(!RoslynConvention.is_well_formed_fragment("a b"));
        }

        #[test]
        fn nested_generated_fragment_is_checked_recursively() {
            assert!(RoslynConvention.is_well_formed_fragment("<Main>b__0_0"));
            assert!(!RoslynConvention.is_well_formed_fragment("<>b__0_0"));
        }

        #[test]
        fn nesting_beyond_limit_is_rejected() {
            let nested = |levels: usize| {
                format!("{}Outer{}", "<".repeat(levels), ">b__0".repeat(levels))
            };
            assert!(RoslynConvention.is_well_formed_fragment(&nested(MAX_FRAGMENT_NESTING - 1)));
            assert!(!RoslynConvention.is_well_formed_fragment(&nested(MAX_FRAGMENT_NESTING)));
            assert!(!RoslynConvention.is_well_formed_fragment(&nested(20_000)));
        }
    }

    mod types {
        use super::*;

        #[test]
        fn state_machine_by_interface() {
            let ty = NamedType::new("Worker").implementing(ASYNC_STATE_MACHINE);
            assert_eq!(
                RoslynConvention.state_machine_kind(&ty),
                Some(StateMachineKind::Async)
            );
            assert!(RoslynConvention.is_state_machine(&ty));
        }

        #[test]
        fn state_machine_by_name() {
            let ty = NamedType::new("<Numbers>d__2");
            assert_eq!(RoslynConvention.state_machine_kind(&ty), None);
            assert!(RoslynConvention.is_state_machine(&ty));
            assert!(!RoslynConvention.is_state_machine(&NamedType::new("<>c")));
        }

        #[test]
        fn foreign_unit_requires_module() {
            let unit = NamedType::new("Unit")
                .in_namespace("Microsoft.FSharp.Core")
                .in_module("FSharp.Core.dll");
            assert!(RoslynConvention.is_foreign_unit(&unit));
            assert!(!RoslynConvention.is_foreign_unit(&NamedType::new("Unit")));
        }

        #[test]
        fn primitive_aliases_only_in_system() {
            assert_eq!(
                RoslynConvention.primitive_alias(Some("System"), "Int32"),
                Some("int")
            );
            assert_eq!(
                RoslynConvention.primitive_alias(Some("System"), "Single"),
                Some("float")
            );
            assert_eq!(RoslynConvention.primitive_alias(Some("App"), "Int32"), None);
            assert_eq!(RoslynConvention.primitive_alias(Some("System"), "IntPtr"), None);
        }

        #[test]
        fn method_kinds() {
            assert_eq!(RoslynConvention.method_kind(".ctor"), MethodKind::Constructor);
            assert_eq!(
                RoslynConvention.method_kind(".cctor"),
                MethodKind::StaticConstructor
            );
            assert_eq!(RoslynConvention.method_kind("Run"), MethodKind::Method);
        }
    }
}
