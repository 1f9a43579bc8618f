//! Method demystification: from a raw frame to the method the programmer wrote.
//!
//! Compilers move lambda bodies, local functions and the bodies of async and
//! iterator methods into synthesized methods on synthesized types. A raw frame
//! therefore often names something like `<>c__DisplayClass0_0.<Outer>b__0_0`
//! or `<RunAsync>d__1.MoveNext`. [`Demystifier::resolve`] walks the metadata
//! back to the original method and records each hoisted body it passed
//! through as a sub-method layer.
//!
//! ## Unwrap Loop
//!
//! Each iteration inspects the current method and its declaring type:
//!
//! 1. **Closure unwrap**: the method name is a generated lambda or local
//!    function name. The enclosing method name is parsed out of it and looked
//!    up in the declaring type and its enclosing types.
//! 2. **State-machine unwrap**: the declaring type is an async or iterator
//!    state machine. The original method is the one whose state-machine
//!    attribute points at this type; the type name is the fallback.
//! 3. Otherwise the current method is the logical method and the loop ends.
//!
//! When both 1 and 2 could apply, the closure interpretation wins only if the
//! embedded enclosing name is well formed.
//!
//! The loop runs at most [`MAX_UNWRAP_DEPTH`] times and each enclosing-method
//! search visits at most [`MAX_ENCLOSING_SEARCH`] types, so malformed or
//! adversarial metadata cannot make it spin.
//!
//! ## Generic Binding
//!
//! A synthesized nested type carries the enclosing type's generic arguments
//! first, then the enclosing method's. Moving outward splits the wrapper's
//! instantiation by the enclosing type's arity.

use tracing::debug;

use crate::convention::{GeneratedName, GeneratedNameKind, MethodKind};
use crate::error::{DemystifyError, DemystifyResult};
use crate::exception::RawFrame;
use crate::metadata::{MethodDef, MethodToken, NamedType, ParamModifier, TypeToken};
use crate::type_name::{GenericEnv, ResolveContext};
use crate::types::{ResolvedMethod, ResolvedParameter, ResolvedType};

/// Maximum number of wrapper layers unwrapped for one frame.
pub const MAX_UNWRAP_DEPTH: usize = 8;

/// Maximum number of declaring types searched for an enclosing method.
pub const MAX_ENCLOSING_SEARCH: usize = 10;

/// The method currently being examined, with its generic bindings.
struct Cursor<'a> {
    def: &'a MethodDef,
    type_token: TypeToken,
    type_args: Vec<TypeToken>,
    method_args: Vec<TypeToken>,
    /// Actual parameter types reported by the frame; only for the frame's
    /// own method.
    actual_params: Vec<TypeToken>,
}

impl Cursor<'_> {
    fn env(&self) -> GenericEnv {
        GenericEnv::new(self.type_args.clone(), self.method_args.clone())
    }
}

/// A hoisted body passed through while unwrapping.
struct Layer {
    name: String,
    generic_arguments: Vec<ResolvedType>,
    parameters: Vec<ResolvedParameter>,
    is_lambda: bool,
    ordinal: Option<u32>,
}

enum Unwrap<'a> {
    /// Continue with the enclosing method.
    Next(Cursor<'a>),
    /// The current method is the logical method.
    Done,
    /// The enclosing method's name is known but it is not in the metadata.
    Orphan(&'a str),
}

/// Resolves raw frames into [`ResolvedMethod`]s.
#[derive(Clone, Copy)]
pub struct Demystifier<'a> {
    ctx: ResolveContext<'a>,
}

impl<'a> Demystifier<'a> {
    pub fn new(ctx: ResolveContext<'a>) -> Self {
        Demystifier { ctx }
    }

    pub fn context(&self) -> ResolveContext<'a> {
        self.ctx
    }

    /// Resolve a frame to its logical method.
    ///
    /// Fails only when the frame's own method token does not resolve; every
    /// later lookup failure degrades to a partially resolved method.
    pub fn resolve(&self, frame: &RawFrame) -> DemystifyResult<ResolvedMethod> {
        let def = self.ctx.lookup_method(frame.method)?;
        let (type_token, type_args) = match self.ctx.definition_of(frame.declaring_type) {
            Ok((token, _, args)) => (token, args),
            Err(err) => {
                debug!(error = %err, "frame declaring type fallback");
                (def.declaring_type, Vec::new())
            }
        };

        let mut cursor = Cursor {
            def,
            type_token,
            type_args,
            method_args: frame.method_generic_args.clone(),
            actual_params: frame.parameter_types.clone(),
        };
        let mut layers = Vec::new();
        let mut is_async = false;

        for _ in 0..MAX_UNWRAP_DEPTH {
            match self.unwrap_step(&cursor, &mut layers, &mut is_async) {
                Unwrap::Next(next) => cursor = next,
                Unwrap::Done => return Ok(self.finish(&cursor, layers, is_async)),
                Unwrap::Orphan(name) => {
                    return Ok(self.finish_orphan(&cursor, name, layers, is_async))
                }
            }
        }

        let err = DemystifyError::DepthExceeded {
            limit: MAX_UNWRAP_DEPTH,
            context: "unwrapping generated methods",
        };
        debug!(error = %err, method = %cursor.def.name, "stopping unwrap");
        Ok(self.finish(&cursor, layers, is_async))
    }

    // ========================================================================
    // Unwrap Steps
    // ========================================================================

    fn unwrap_step(
        &self,
        cursor: &Cursor<'a>,
        layers: &mut Vec<Layer>,
        is_async: &mut bool,
    ) -> Unwrap<'a> {
        let convention = self.ctx.convention;
        let def: &'a MethodDef = cursor.def;

        let hoisted = convention
            .parse_generated_name(def.name.as_str())
            .filter(|g| g.kind.is_hoisted_body());
        let state_machine = self
            .ctx
            .named(cursor.type_token)
            .filter(|ty| convention.is_state_machine(ty));

        let prefer_closure = match (&hoisted, state_machine) {
            (Some(g), Some(_)) => convention.is_well_formed_fragment(g.enclosing),
            (Some(_), None) => true,
            (None, _) => false,
        };

        if prefer_closure {
            if let Some(generated) = hoisted {
                return self.unwrap_closure(cursor, generated, layers);
            }
        }
        if let Some(sm) = state_machine {
            return self.unwrap_state_machine(cursor, sm, layers, is_async);
        }
        Unwrap::Done
    }

    fn unwrap_closure(
        &self,
        cursor: &Cursor<'a>,
        generated: GeneratedName<'a>,
        layers: &mut Vec<Layer>,
    ) -> Unwrap<'a> {
        let convention = self.ctx.convention;

        if !convention.is_well_formed_fragment(generated.enclosing) {
            let err = DemystifyError::UnrecognizedGeneratedName {
                name: cursor.def.name.clone(),
            };
            debug!(error = %err, "keeping raw name");
            return Unwrap::Done;
        }

        let layer = match generated.kind {
            GeneratedNameKind::LocalFunction => match convention.local_function_name(&generated) {
                Some(name) => Layer {
                    name: name.to_string(),
                    generic_arguments: self
                        .method_generic_arguments(cursor.def, &cursor.method_args),
                    parameters: self.resolve_parameters(
                        cursor.def,
                        &cursor.env(),
                        &cursor.actual_params,
                    ),
                    is_lambda: false,
                    ordinal: None,
                },
                None => {
                    let err = DemystifyError::UnrecognizedGeneratedName {
                        name: cursor.def.name.clone(),
                    };
                    debug!(error = %err, "keeping raw name");
                    return Unwrap::Done;
                }
            },
            _ => Layer {
                name: String::new(),
                generic_arguments: Vec::new(),
                parameters: self.resolve_parameters(
                    cursor.def,
                    &cursor.env(),
                    &cursor.actual_params,
                ),
                is_lambda: true,
                ordinal: convention.lambda_ordinal(&generated),
            },
        };
        layers.push(layer);

        let hint = convention.ordinal_hint(&generated);
        match self.find_by_name(cursor.type_token, generated.enclosing, hint) {
            Some((_, def)) => Unwrap::Next(self.step_into(cursor, def)),
            None => {
                debug!(enclosing = generated.enclosing, "enclosing method not in metadata");
                Unwrap::Orphan(generated.enclosing)
            }
        }
    }

    fn unwrap_state_machine(
        &self,
        cursor: &Cursor<'a>,
        sm: &'a NamedType,
        layers: &mut Vec<Layer>,
        is_async: &mut bool,
    ) -> Unwrap<'a> {
        let convention = self.ctx.convention;
        let sm_token = cursor.type_token;
        let parsed = convention
            .parse_generated_name(sm.name.as_str())
            .filter(|g| g.kind == GeneratedNameKind::StateMachineType);

        let owner = sm.declaring_type.and_then(|parent| {
            self.find_state_machine_owner(parent, sm_token).or_else(|| {
                let generated = parsed?;
                self.find_by_name(
                    parent,
                    generated.enclosing,
                    convention.ordinal_hint(&generated),
                )
            })
        });

        let orphan_name = parsed
            .map(|g| g.enclosing)
            .filter(|name| convention.is_well_formed_fragment(name));
        if owner.is_none() && orphan_name.is_none() {
            debug!(state_machine = %sm.name, "state machine owner not found");
            return Unwrap::Done;
        }

        let kind = convention
            .state_machine_kind(sm)
            .or_else(|| owner.and_then(|(_, def)| def.state_machine.map(|attr| attr.kind)));
        if let Some(kind) = kind {
            if kind.is_async() {
                *is_async = true;
            }
            if kind.is_iterator() {
                layers.push(Layer {
                    name: cursor.def.name.clone(),
                    generic_arguments: Vec::new(),
                    parameters: self.resolve_parameters(
                        cursor.def,
                        &cursor.env(),
                        &cursor.actual_params,
                    ),
                    is_lambda: false,
                    ordinal: None,
                });
            }
        }

        match (owner, orphan_name) {
            (Some((_, def)), _) => Unwrap::Next(self.step_into(cursor, def)),
            (None, Some(name)) => Unwrap::Orphan(name),
            (None, None) => Unwrap::Done,
        }
    }

    /// Move from a wrapper to its enclosing method, rebinding generics.
    fn step_into(&self, cursor: &Cursor<'a>, def: &'a MethodDef) -> Cursor<'a> {
        let (type_args, method_args) = if def.declaring_type == cursor.type_token {
            (cursor.type_args.clone(), cursor.method_args.clone())
        } else {
            let arity = self
                .ctx
                .named(def.declaring_type)
                .map_or(0, |ty| ty.generic_params.len());
            let split = arity.min(cursor.type_args.len());
            (
                cursor.type_args[..split].to_vec(),
                cursor.type_args[split..].to_vec(),
            )
        };
        Cursor {
            def,
            type_token: def.declaring_type,
            type_args,
            method_args,
            actual_params: Vec::new(),
        }
    }

    // ========================================================================
    // Metadata Search
    // ========================================================================

    /// `start` and its declaring types, innermost first.
    fn enclosing_types(&self, start: TypeToken) -> Vec<TypeToken> {
        let mut types = Vec::new();
        let mut next = Some(start);
        while let Some(token) = next {
            if types.len() >= MAX_ENCLOSING_SEARCH || types.contains(&token) {
                break;
            }
            types.push(token);
            next = self.ctx.named(token).and_then(|ty| ty.declaring_type);
        }
        types
    }

    fn methods_in(&self, ty: TypeToken) -> Vec<(MethodToken, &'a MethodDef)> {
        self.ctx
            .metadata
            .methods_of(ty)
            .into_iter()
            .filter_map(|token| self.ctx.lookup_method(token).ok().map(|def| (token, def)))
            .collect()
    }

    /// First type outward declaring a method named `name`; among several,
    /// the one whose ordinal matches `hint`.
    fn find_by_name(
        &self,
        start: TypeToken,
        name: &str,
        hint: Option<u32>,
    ) -> Option<(MethodToken, &'a MethodDef)> {
        for ty in self.enclosing_types(start) {
            let candidates: Vec<_> = self
                .methods_in(ty)
                .into_iter()
                .filter(|(_, def)| def.name == name)
                .collect();
            let Some(first) = candidates.first().copied() else {
                continue;
            };
            let by_ordinal = hint.and_then(|hint| {
                candidates
                    .iter()
                    .find(|(_, def)| def.ordinal == Some(hint))
                    .copied()
            });
            return Some(by_ordinal.unwrap_or(first));
        }
        None
    }

    /// The method whose state-machine attribute points at `sm_token`.
    fn find_state_machine_owner(
        &self,
        start: TypeToken,
        sm_token: TypeToken,
    ) -> Option<(MethodToken, &'a MethodDef)> {
        self.enclosing_types(start).into_iter().find_map(|ty| {
            self.methods_in(ty).into_iter().find(|(_, def)| {
                def.state_machine
                    .is_some_and(|attr| attr.state_machine_type == sm_token)
            })
        })
    }

    /// Innermost declaring type that is neither flagged nor named as
    /// compiler generated.
    fn nearest_user_type(&self, start: TypeToken) -> TypeToken {
        self.enclosing_types(start)
            .into_iter()
            .find(|token| {
                self.ctx.named(*token).is_some_and(|ty| {
                    !ty.compiler_generated
                        && self
                            .ctx
                            .convention
                            .parse_generated_name(ty.name.as_str())
                            .is_none()
                })
            })
            .unwrap_or(start)
    }

    // ========================================================================
    // Building the Result
    // ========================================================================

    fn finish(&self, cursor: &Cursor<'a>, layers: Vec<Layer>, is_async: bool) -> ResolvedMethod {
        let name = cursor.def.name.clone();
        ResolvedMethod {
            declaring_type: Some(self.declaring_type(cursor.type_token, &cursor.type_args)),
            kind: self.ctx.convention.method_kind(&name),
            name,
            generic_arguments: self.method_generic_arguments(cursor.def, &cursor.method_args),
            parameters: self.resolve_parameters(cursor.def, &cursor.env(), &cursor.actual_params),
            parameters_known: true,
            is_async,
            is_lambda: false,
            ordinal: None,
            sub_method: nest(layers),
        }
    }

    fn finish_orphan(
        &self,
        cursor: &Cursor<'a>,
        name: &str,
        layers: Vec<Layer>,
        is_async: bool,
    ) -> ResolvedMethod {
        let user_type = self.nearest_user_type(cursor.type_token);
        ResolvedMethod {
            declaring_type: Some(self.declaring_type(user_type, &cursor.type_args)),
            name: name.to_string(),
            kind: self.ctx.convention.method_kind(name),
            generic_arguments: Vec::new(),
            parameters: Vec::new(),
            parameters_known: false,
            is_async,
            is_lambda: false,
            ordinal: None,
            sub_method: nest(layers),
        }
    }

    fn declaring_type(&self, token: TypeToken, args: &[TypeToken]) -> ResolvedType {
        let Some(named) = self.ctx.named(token) else {
            debug!(%token, "declaring type fallback");
            return ResolvedType::Unresolved;
        };
        let arity = named.generic_params.len();
        let args = if arity > 0 && args.len() >= arity {
            args[..arity]
                .iter()
                .map(|arg| self.ctx.resolve_type(*arg, &GenericEnv::default()))
                .collect()
        } else {
            Vec::new()
        };
        self.ctx.resolve_definition(named, args)
    }

    fn method_generic_arguments(&self, def: &MethodDef, args: &[TypeToken]) -> Vec<ResolvedType> {
        def.generic_params
            .iter()
            .enumerate()
            .map(|(position, name)| match args.get(position) {
                Some(arg) => self.ctx.resolve_type(*arg, &GenericEnv::default()),
                None => ResolvedType::GenericParam(name.clone()),
            })
            .collect()
    }

    /// Resolve declared parameters; `actual` overrides declared types by position.
    fn resolve_parameters(
        &self,
        def: &MethodDef,
        env: &GenericEnv,
        actual: &[TypeToken],
    ) -> Vec<ResolvedParameter> {
        def.parameters
            .iter()
            .enumerate()
            .map(|(position, param)| {
                let token = actual.get(position).copied().unwrap_or(param.ty);
                let (ty, prefix) = match self.ctx.resolve_type(token, env) {
                    ResolvedType::ByRef(element) => {
                        (*element, Some(param.modifier.unwrap_or(ParamModifier::Ref)))
                    }
                    other => (other, param.modifier),
                };
                let ty = if param.dynamic {
                    ResolvedType::Dynamic
                } else {
                    ty
                };
                ResolvedParameter {
                    name: param.name.clone(),
                    ty,
                    prefix,
                    is_dynamic: param.dynamic,
                }
            })
            .collect()
    }
}

/// Link layers (innermost first) into a sub-method chain, outermost on top.
fn nest(layers: Vec<Layer>) -> Option<Box<ResolvedMethod>> {
    let mut sub: Option<Box<ResolvedMethod>> = None;
    for layer in layers {
        sub = Some(Box::new(ResolvedMethod {
            declaring_type: None,
            name: layer.name,
            kind: MethodKind::Method,
            generic_arguments: layer.generic_arguments,
            parameters: layer.parameters,
            parameters_known: true,
            is_async: false,
            is_lambda: layer.is_lambda,
            ordinal: layer.ordinal,
            sub_method: sub,
        }));
    }
    sub
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convention::RoslynConvention;
    use crate::metadata::{
        GenericOwner, MetadataTable, NamedType, ParamDef, StateMachineKind, TypeDef,
    };
    use crate::type_name::{format_type, FormatOptions};

    const INT: u32 = 1;
    const STRING: u32 = 2;
    const STRING_ARRAY: u32 = 3;
    const INT_REF: u32 = 4;
    const PROGRAM: u32 = 10;
    const DISPLAY_CLASS: u32 = 11;
    const RUN_ASYNC_SM: u32 = 12;
    const NUMBERS_SM: u32 = 13;
    const LOCAL_SM: u32 = 14;
    const BOX: u32 = 15;
    const BOX_INT: u32 = 16;
    const U_PARAM: u32 = 18;
    const ORPHAN_SM: u32 = 19;

    const MAIN: u32 = 100;
    const OUTER: u32 = 101;
    const OUTER_LAMBDA: u32 = 102;
    const RUN_ASYNC: u32 = 103;
    const RUN_ASYNC_MOVE_NEXT: u32 = 104;
    const NUMBERS: u32 = 105;
    const NUMBERS_MOVE_NEXT: u32 = 106;
    const LOCAL: u32 = 107;
    const OUTER_WITH_VALUE: u32 = 108;
    const LOCAL_MOVE_NEXT: u32 = 109;
    const BOX_GET: u32 = 110;
    const ORPHAN_MOVE_NEXT: u32 = 111;
    const SWAP: u32 = 112;

    fn named(name: &str) -> TypeDef {
        TypeDef::Named(NamedType::new(name))
    }

    fn fixture() -> MetadataTable {
        MetadataTable::new()
            .with_type(INT, TypeDef::Named(NamedType::new("Int32").in_namespace("System")))
            .with_type(STRING, TypeDef::Named(NamedType::new("String").in_namespace("System")))
            .with_type(
                STRING_ARRAY,
                TypeDef::Array {
                    element: TypeToken(STRING),
                    rank: 1,
                },
            )
            .with_type(INT_REF, TypeDef::ByRef { element: TypeToken(INT) })
            .with_type(PROGRAM, TypeDef::Named(NamedType::new("Program").in_namespace("App")))
            .with_type(
                DISPLAY_CLASS,
                TypeDef::Named(
                    NamedType::new("<>c__DisplayClass0_0")
                        .nested_in(TypeToken(PROGRAM))
                        .compiler_generated(),
                ),
            )
            .with_type(
                RUN_ASYNC_SM,
                TypeDef::Named(
                    NamedType::new("<RunAsync>d__1")
                        .nested_in(TypeToken(PROGRAM))
                        .implementing("System.Runtime.CompilerServices.IAsyncStateMachine"),
                ),
            )
            .with_type(
                NUMBERS_SM,
                TypeDef::Named(
                    NamedType::new("<Numbers>d__2")
                        .nested_in(TypeToken(PROGRAM))
                        .implementing("System.Collections.IEnumerator"),
                ),
            )
            .with_type(
                LOCAL_SM,
                TypeDef::Named(
                    NamedType::new("<<Outer>g__Local|3_0>d")
                        .nested_in(TypeToken(PROGRAM))
                        .implementing("System.Collections.IEnumerator"),
                ),
            )
            .with_type(
                BOX,
                TypeDef::Named(NamedType::new("Box`1").in_namespace("App").with_generic_params(["T"])),
            )
            .with_type(
                BOX_INT,
                TypeDef::GenericInstance {
                    definition: TypeToken(BOX),
                    args: vec![TypeToken(INT)],
                },
            )
            .with_type(
                U_PARAM,
                TypeDef::GenericParam {
                    name: "U".to_string(),
                    owner: GenericOwner::Method,
                    position: 0,
                },
            )
            .with_type(
                ORPHAN_SM,
                TypeDef::Named(
                    NamedType::new("<Vanished>d__9")
                        .nested_in(TypeToken(PROGRAM))
                        .implementing("System.Runtime.CompilerServices.IAsyncStateMachine"),
                ),
            )
            .with_method(
                MAIN,
                MethodDef::new("Main", TypeToken(PROGRAM))
                    .with_param(ParamDef::new("args", TypeToken(STRING_ARRAY))),
            )
            .with_method(OUTER, MethodDef::new("Outer", TypeToken(PROGRAM)).with_ordinal(0))
            .with_method(
                OUTER_LAMBDA,
                MethodDef::new("<Outer>b__0_0", TypeToken(DISPLAY_CLASS))
                    .with_param(ParamDef::new("s", TypeToken(STRING))),
            )
            .with_method(
                RUN_ASYNC,
                MethodDef::new("RunAsync", TypeToken(PROGRAM))
                    .with_param(ParamDef::new("x", TypeToken(INT)))
                    .with_state_machine(StateMachineKind::Async, TypeToken(RUN_ASYNC_SM))
                    .with_ordinal(1),
            )
            .with_method(RUN_ASYNC_MOVE_NEXT, MethodDef::new("MoveNext", TypeToken(RUN_ASYNC_SM)))
            .with_method(
                NUMBERS,
                MethodDef::new("Numbers", TypeToken(PROGRAM))
                    .with_param(ParamDef::new("count", TypeToken(INT)))
                    .with_state_machine(StateMachineKind::Iterator, TypeToken(NUMBERS_SM))
                    .with_ordinal(2),
            )
            .with_method(NUMBERS_MOVE_NEXT, MethodDef::new("MoveNext", TypeToken(NUMBERS_SM)))
            .with_method(
                LOCAL,
                MethodDef::new("<Outer>g__Local|3_0", TypeToken(PROGRAM))
                    .with_param(ParamDef::new("n", TypeToken(INT)))
                    .with_state_machine(StateMachineKind::Iterator, TypeToken(LOCAL_SM)),
            )
            .with_method(
                OUTER_WITH_VALUE,
                MethodDef::new("Outer", TypeToken(PROGRAM))
                    .with_param(ParamDef::new("value", TypeToken(INT)))
                    .with_ordinal(3),
            )
            .with_method(LOCAL_MOVE_NEXT, MethodDef::new("MoveNext", TypeToken(LOCAL_SM)))
            .with_method(
                BOX_GET,
                MethodDef::new("Get", TypeToken(BOX))
                    .with_generic_params(["U"])
                    .with_param(ParamDef::new("item", TypeToken(U_PARAM))),
            )
            .with_method(ORPHAN_MOVE_NEXT, MethodDef::new("MoveNext", TypeToken(ORPHAN_SM)))
            .with_method(
                SWAP,
                MethodDef::new("Swap", TypeToken(PROGRAM))
                    .with_param(ParamDef::new("a", TypeToken(INT_REF)))
                    .with_param(
                        ParamDef::new("b", TypeToken(INT_REF)).with_modifier(ParamModifier::Out),
                    ),
            )
    }

    fn resolve(table: &MetadataTable, frame: RawFrame) -> ResolvedMethod {
        let ctx = ResolveContext::new(table, &RoslynConvention);
        Demystifier::new(ctx).resolve(&frame).unwrap()
    }

    fn frame(ty: u32, method: u32) -> RawFrame {
        RawFrame::new(TypeToken(ty), MethodToken(method))
    }

    fn type_text(method: &ResolvedMethod) -> String {
        method
            .declaring_type
            .as_ref()
            .map(|ty| format_type(ty, FormatOptions::default()))
            .unwrap_or_default()
    }

    mod plain_methods {
        use super::*;

        #[test]
        fn ordinary_method_resolves_as_is() {
            let table = fixture();
            let method = resolve(&table, frame(PROGRAM, MAIN));
            assert_eq!(type_text(&method), "Program");
            assert_eq!(method.name, "Main");
            assert_eq!(method.parameters.len(), 1);
            assert!(method.sub_method.is_none());
            assert!(!method.is_async);
        }

        #[test]
        fn generic_method_on_generic_type_binds_arguments() {
            let table = fixture();
            let method = resolve(
                &table,
                frame(BOX_INT, BOX_GET).with_method_generic_args(vec![TypeToken(STRING)]),
            );
            assert_eq!(type_text(&method), "Box<int>");
            assert_eq!(
                format_type(&method.generic_arguments[0], FormatOptions::default()),
                "string"
            );
            assert_eq!(
                format_type(&method.parameters[0].ty, FormatOptions::default()),
                "string"
            );
        }

        #[test]
        fn open_generic_method_keeps_parameter_names() {
            let table = fixture();
            let method = resolve(&table, frame(BOX, BOX_GET));
            assert_eq!(type_text(&method), "Box<T>");
            assert_eq!(method.generic_arguments, vec![ResolvedType::GenericParam("U".into())]);
        }

        #[test]
        fn by_ref_parameters_become_prefixes() {
            let table = fixture();
            let method = resolve(&table, frame(PROGRAM, SWAP));
            assert_eq!(method.parameters[0].prefix, Some(ParamModifier::Ref));
            assert_eq!(method.parameters[1].prefix, Some(ParamModifier::Out));
            assert!(!matches!(method.parameters[0].ty, ResolvedType::ByRef(_)));
        }

        #[test]
        fn dynamic_parameters_resolve_to_dynamic() {
            let table = fixture().with_method(
                900,
                MethodDef::new("Invoke", TypeToken(PROGRAM))
                    .with_param(ParamDef::new("target", TypeToken(STRING)).dynamic()),
            );
            let method = resolve(&table, frame(PROGRAM, 900));
            assert_eq!(method.parameters[0].ty, ResolvedType::Dynamic);
            assert!(method.parameters[0].is_dynamic);
        }

        #[test]
        fn frame_parameter_types_override_declared_types() {
            let table = fixture();
            let method = resolve(
                &table,
                frame(BOX, BOX_GET).with_parameter_types(vec![TypeToken(INT)]),
            );
            assert_eq!(
                format_type(&method.parameters[0].ty, FormatOptions::default()),
                "int"
            );
        }
    }

    mod closures {
        use super::*;

        #[test]
        fn lambda_unwraps_to_enclosing_method() {
            let table = fixture();
            let method = resolve(&table, frame(DISPLAY_CLASS, OUTER_LAMBDA));
            assert_eq!(type_text(&method), "Program");
            assert_eq!(method.name, "Outer");
            let lambda = method.sub_method.as_deref().unwrap();
            assert!(lambda.is_lambda);
            assert_eq!(lambda.name, "");
            assert_eq!(lambda.ordinal, Some(0));
            assert_eq!(lambda.parameters[0].name.as_deref(), Some("s"));
        }

        #[test]
        fn orphaned_lambda_keeps_recovered_name() {
            let table = MetadataTable::new()
                .with_type(1, named("Program"))
                .with_type(
                    2,
                    TypeDef::Named(NamedType::new("<>c").nested_in(TypeToken(1))),
                )
                .with_method(3, MethodDef::new("<Gone>b__4_0", TypeToken(2)));
            let method = resolve(&table, frame(2, 3));
            assert_eq!(type_text(&method), "Program");
            assert_eq!(method.name, "Gone");
            assert!(!method.parameters_known);
            assert!(method.sub_method.as_deref().unwrap().is_lambda);
        }

        #[test]
        fn orphan_skips_types_flagged_as_generated() {
            let table = MetadataTable::new()
                .with_type(1, named("Program"))
                .with_type(
                    2,
                    TypeDef::Named(
                        NamedType::new("Closure")
                            .nested_in(TypeToken(1))
                            .compiler_generated(),
                    ),
                )
                .with_method(3, MethodDef::new("<Gone>b__4_0", TypeToken(2)));
            let method = resolve(&table, frame(2, 3));
            assert_eq!(type_text(&method), "Program");
            assert_eq!(method.name, "Gone");
        }

        #[test]
        fn deeply_nested_generated_name_stays_raw() {
            let levels = 20_000;
            let name = format!("{}Outer{}", "<".repeat(levels), ">b__0".repeat(levels));
            let table = MetadataTable::new()
                .with_type(1, named("Program"))
                .with_method(2, MethodDef::new(name.clone(), TypeToken(1)));
            let method = resolve(&table, frame(1, 2));
            assert_eq!(method.name, name);
            assert!(method.sub_method.is_none());
        }

        #[test]
        fn malformed_enclosing_name_falls_back_to_raw_name() {
            let table = MetadataTable::new()
                .with_type(1, named("<>c"))
                .with_method(2, MethodDef::new("<>b__0_0", TypeToken(1)));
            let method = resolve(&table, frame(1, 2));
            assert_eq!(method.name, "<>b__0_0");
            assert!(method.sub_method.is_none());
        }
    }

    mod state_machines {
        use super::*;

        #[test]
        fn async_resolves_to_original_method() {
            let table = fixture();
            let method = resolve(&table, frame(RUN_ASYNC_SM, RUN_ASYNC_MOVE_NEXT));
            assert!(method.is_async);
            assert_eq!(method.name, "RunAsync");
            assert_eq!(method.parameters[0].name.as_deref(), Some("x"));
            assert!(method.sub_method.is_none());
        }

        #[test]
        fn iterator_keeps_move_next_layer() {
            let table = fixture();
            let method = resolve(&table, frame(NUMBERS_SM, NUMBERS_MOVE_NEXT));
            assert!(!method.is_async);
            assert_eq!(method.name, "Numbers");
            let names: Vec<_> = method.sub_methods().map(|m| m.name.as_str()).collect();
            assert_eq!(names, vec!["MoveNext"]);
        }

        #[test]
        fn iterator_local_function_chains_layers() {
            let table = fixture();
            let method = resolve(&table, frame(LOCAL_SM, LOCAL_MOVE_NEXT));
            assert_eq!(method.name, "Outer");
            assert_eq!(method.parameters[0].name.as_deref(), Some("value"));
            let names: Vec<_> = method.sub_methods().map(|m| m.name.as_str()).collect();
            assert_eq!(names, vec!["Local", "MoveNext"]);
        }

        #[test]
        fn self_owned_state_machine_stops_at_depth_limit() {
            let table = MetadataTable::new()
                .with_type(
                    1,
                    TypeDef::Named(
                        NamedType::new("Spin").implementing("System.Collections.IEnumerator"),
                    ),
                )
                .with_method(
                    2,
                    MethodDef::new("MoveNext", TypeToken(1))
                        .with_state_machine(StateMachineKind::Iterator, TypeToken(1)),
                );
            let mut table = table;
            table.insert_type(
                TypeToken(1),
                TypeDef::Named(
                    NamedType::new("Spin")
                        .nested_in(TypeToken(1))
                        .implementing("System.Collections.IEnumerator"),
                ),
            );
            let method = resolve(&table, frame(1, 2));
            assert_eq!(method.name, "MoveNext");
            assert_eq!(method.sub_methods().count(), MAX_UNWRAP_DEPTH);
        }

        #[test]
        fn missing_owner_falls_back_to_type_name() {
            let table = fixture();
            let method = resolve(&table, frame(ORPHAN_SM, ORPHAN_MOVE_NEXT));
            assert!(method.is_async);
            assert_eq!(type_text(&method), "Program");
            assert_eq!(method.name, "Vanished");
            assert!(!method.parameters_known);
        }
    }

    mod failures {
        use super::*;

        #[test]
        fn unknown_method_token_is_an_error() {
            let table = fixture();
            let ctx = ResolveContext::new(&table, &RoslynConvention);
            let result = Demystifier::new(ctx).resolve(&frame(PROGRAM, 9999));
            assert!(matches!(result, Err(DemystifyError::UnknownMethod { .. })));
        }

        #[test]
        fn unknown_declaring_type_uses_method_definition() {
            let table = fixture();
            let method = resolve(&table, frame(9999, MAIN));
            assert_eq!(type_text(&method), "Program");
        }

        #[test]
        fn resolution_is_deterministic() {
            let table = fixture();
            let a = resolve(&table, frame(LOCAL_SM, LOCAL_MOVE_NEXT));
            let b = resolve(&table, frame(LOCAL_SM, LOCAL_MOVE_NEXT));
            assert_eq!(a, b);
        }
    }
}
