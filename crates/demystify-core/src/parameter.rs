//! Parameter rendering.
//!
//! A parameter renders as `[prefix ]type[ name]`. Parameters of the foreign
//! unit type render as nothing at all; [`render_parameter_list`] skips them
//! so that no stray separator is left behind.

use crate::sink::{Sink, Style};
use crate::type_name::{render_type, FormatOptions};
use crate::types::ResolvedParameter;

/// Render one parameter. Elided parameters emit nothing.
pub fn render_parameter(param: &ResolvedParameter, options: FormatOptions, sink: &mut dyn Sink) {
    if param.is_elided() {
        return;
    }
    if let Some(prefix) = param.prefix {
        sink.append_styled(prefix.keyword(), Style::Keyword);
        sink.append_text(" ");
    }
    if param.is_dynamic {
        sink.append_styled("dynamic", Style::Keyword);
    } else {
        render_type(&param.ty, options, sink);
    }
    if let Some(name) = param.name.as_deref().filter(|n| !n.is_empty()) {
        sink.append_text(" ");
        sink.append_styled(name, Style::ParameterName);
    }
}

/// Render `(a, b)`, or `(?)` when the parameters are not known.
pub fn render_parameter_list(
    params: &[ResolvedParameter],
    known: bool,
    options: FormatOptions,
    sink: &mut dyn Sink,
) {
    sink.append_styled("(", Style::Punctuation);
    if !known {
        sink.append_styled("?", Style::Marker);
    } else {
        let mut first = true;
        for param in params.iter().filter(|p| !p.is_elided()) {
            if !first {
                sink.append_styled(", ", Style::Punctuation);
            }
            first = false;
            render_parameter(param, options, sink);
        }
    }
    sink.append_styled(")", Style::Punctuation);
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ParamModifier;
    use crate::sink::PlainBuilder;
    use crate::types::ResolvedType;

    fn int() -> ResolvedType {
        ResolvedType::Primitive {
            alias: "int".to_string(),
            full_name: "System.Int32".to_string(),
        }
    }

    fn render(param: &ResolvedParameter) -> String {
        let mut builder = PlainBuilder::new();
        render_parameter(param, FormatOptions::default(), &mut builder);
        builder.finish()
    }

    fn render_list(params: &[ResolvedParameter]) -> String {
        let mut builder = PlainBuilder::new();
        render_parameter_list(params, true, FormatOptions::default(), &mut builder);
        builder.finish()
    }

    #[test]
    fn prefix_type_and_name() {
        let mut param = ResolvedParameter::named("count", int());
        assert_eq!(render(&param), "int count");
        param.prefix = Some(ParamModifier::Out);
        assert_eq!(render(&param), "out int count");
    }

    #[test]
    fn unnamed_parameter_renders_type_only() {
        assert_eq!(render(&ResolvedParameter::new(int())), "int");
    }

    #[test]
    fn dynamic_ignores_resolved_type() {
        let mut param = ResolvedParameter::named("value", ResolvedType::named(Some("System"), "Object"));
        param.is_dynamic = true;
        assert_eq!(render(&param), "dynamic value");
    }

    #[test]
    fn foreign_unit_renders_nothing() {
        let param = ResolvedParameter::named("unitVar0", ResolvedType::ForeignUnit);
        assert_eq!(render(&param), "");
    }

    #[test]
    fn list_skips_elided_parameters_without_stray_separators() {
        let params = vec![
            ResolvedParameter::named("unitVar0", ResolvedType::ForeignUnit),
            ResolvedParameter::named("a", int()),
            ResolvedParameter::named("unitVar1", ResolvedType::ForeignUnit),
            ResolvedParameter::named("b", int()),
        ];
        assert_eq!(render_list(&params), "(int a, int b)");
        assert_eq!(
            render_list(&[ResolvedParameter::new(ResolvedType::ForeignUnit)]),
            "()"
        );
    }

    #[test]
    fn unknown_parameters_render_question_mark() {
        let mut builder = PlainBuilder::new();
        render_parameter_list(&[], false, FormatOptions::default(), &mut builder);
        assert_eq!(builder.finish(), "(?)");
    }
}
