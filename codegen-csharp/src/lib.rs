use std::collections::{BTreeMap, BTreeSet};

use convert_case::{Case, Casing};
use typewright::{
    graph::{EnumData, IrGraph, IrType},
    naming::Namer,
    render::{BlankPolicy, Language, RenderContext, RenderError, SerializedRenderResult, render},
    union::UnionRep,
};
use unicode_general_category::{GeneralCategory, get_general_category};

/// Renders a canonical graph as C# classes with Newtonsoft.Json attributes.
///
/// Recognized renderer options: `namespace` (default `Generated`).
pub fn codegen(
    graph: &IrGraph,
    options: &BTreeMap<String, String>,
) -> Result<SerializedRenderResult, RenderError> {
    let namespace = options
        .get("namespace")
        .cloned()
        .unwrap_or_else(|| "Generated".to_string());
    render(graph, &CSharp { namespace })
}

struct CSharp {
    namespace: String,
}

impl Language for CSharp {
    fn name(&self) -> &'static str {
        "csharp"
    }

    fn keywords(&self) -> &'static [&'static str] {
        CSHARP_KEYWORDS
    }

    fn named_type_namer(&self) -> Namer {
        Namer::new(pascal).with_prefixes(["the"])
    }

    fn property_namer(&self) -> Namer {
        Namer::new(pascal).with_prefixes(["the"])
    }

    fn top_level_namer(&self) -> Namer {
        Namer::new(pascal)
    }

    fn emit(&self, ctx: &mut RenderContext<'_>) -> Result<(), RenderError> {
        ctx.emit_line("using System;");
        ctx.emit_line("using System.Collections.Generic;");
        ctx.emit_line("using Newtonsoft.Json;");
        ctx.blank_line();
        ctx.emit_line(format!("namespace {}", self.namespace));
        ctx.emit_line("{");
        ctx.indented(|ctx| {
            let body_start = ctx.line_count();
            ctx.for_each_top_level(BlankPolicy::None, |ctx, name, ty| {
                // classes carry the top-level name themselves; everything
                // else gets a note, since C# cannot alias arbitrary types
                if !matches!(ty, IrType::Class(_)) {
                    let spelled = type_for(ctx, ty)?;
                    ctx.hover(format!("deserialize {name} as {spelled}"));
                    ctx.emit_line(format!("// {name} is a {spelled}"));
                }
                Ok(())
            })?;

            if ctx.class_count() > 0 && ctx.line_count() > body_start {
                ctx.blank_line();
            }
            ctx.for_each_class(BlankPolicy::Interposing, |ctx, class, name| {
                ctx.emit_line(format!("public partial class {name}"));
                ctx.emit_line("{");
                ctx.indented(|ctx| {
                    ctx.for_each_property(
                        class,
                        BlankPolicy::Interposing,
                        |ctx, property, json_name, ty| {
                            let spelled = type_for(ctx, ty)?;
                            ctx.emit_line(format!(
                                "[JsonProperty({})]",
                                quoted(json_name)
                            ));
                            ctx.emit_line(format!(
                                "public {spelled} {property} {{ get; set; }}"
                            ));
                            Ok(())
                        },
                    )
                })?;
                ctx.emit_line("}");
                Ok(())
            })?;

            if ctx.union_count() > 0 && ctx.line_count() > body_start {
                ctx.blank_line();
            }
            ctx.for_each_union(BlankPolicy::Interposing, |ctx, union, name| {
                emit_union(ctx, union, name)
            })?;

            if ctx.enum_count() > 0 && ctx.line_count() > body_start {
                ctx.blank_line();
            }
            ctx.for_each_enum(BlankPolicy::Interposing, |ctx, data, name| {
                emit_enum(ctx, data, name)
            })
        })?;
        ctx.emit_line("}");
        Ok(())
    }
}

/// One field per kind; exactly one of them is set after deserialization.
fn emit_union(
    ctx: &mut RenderContext<'_>,
    union: &UnionRep,
    name: &str,
) -> Result<(), RenderError> {
    ctx.emit_line(format!("public partial struct {name}"));
    ctx.emit_line("{");
    ctx.indented(|ctx| {
        for member in union.members() {
            if matches!(member, IrType::Null) {
                continue;
            }
            let field = field_for_member(ctx, &member)?;
            let mut spelled = type_for(ctx, &member)?;
            if is_value_type(&member) {
                spelled.push('?');
            }
            ctx.emit_line(format!("public {spelled} {field};"));
        }
        Ok(())
    })?;
    ctx.emit_line("}");
    Ok(())
}

fn emit_enum(ctx: &mut RenderContext<'_>, data: &EnumData, name: &str) -> Result<(), RenderError> {
    let namer = Namer::new(pascal);
    let mut forbidden: BTreeSet<String> = BTreeSet::new();
    forbidden.insert(name.to_string());

    ctx.emit_line(format!("public enum {name}"));
    ctx.emit_line("{");
    ctx.indented(|ctx| {
        for value in &data.values {
            let member = namer.assign(value, &forbidden);
            forbidden.insert(member.clone());
            if member != *value {
                ctx.hover(format!("serialized as {}", quoted(value)));
            }
            ctx.emit_line(format!("{member},"));
        }
        Ok(())
    })?;
    ctx.emit_line("}");
    Ok(())
}

fn field_for_member(ctx: &RenderContext<'_>, member: &IrType) -> Result<String, RenderError> {
    Ok(match member {
        IrType::Integer => "Integer".to_string(),
        IrType::Double => "Double".to_string(),
        IrType::Bool => "Bool".to_string(),
        IrType::String => "String".to_string(),
        IrType::Array(_) => "AnythingArray".to_string(),
        IrType::Map(_) => "AnythingMap".to_string(),
        IrType::Class(_) | IrType::Enum(_) => ctx.name_for_named_type(member)?.to_string(),
        _ => "Anything".to_string(),
    })
}

fn type_for(ctx: &RenderContext<'_>, ty: &IrType) -> Result<String, RenderError> {
    Ok(match ty {
        IrType::NoInformation | IrType::Any | IrType::Null => "object".to_string(),
        IrType::Integer => "long".to_string(),
        IrType::Double => "double".to_string(),
        IrType::Bool => "bool".to_string(),
        IrType::String => "string".to_string(),
        IrType::Array(inner) => format!("{}[]", type_for(ctx, inner)?),
        IrType::Map(inner) => format!("Dictionary<string, {}>", type_for(ctx, inner)?),
        IrType::Class(_) | IrType::Enum(_) => ctx.name_for_named_type(ty)?.to_string(),
        IrType::Union(union) => {
            if let Some(inner) = union.nullable() {
                let base = type_for(ctx, &inner)?;
                match is_value_type(&inner) {
                    true => format!("{base}?"),
                    false => base,
                }
            } else {
                let members = union.members();
                match members.as_slice() {
                    [single] => type_for(ctx, single)?,
                    _ => ctx.name_for_named_type(ty)?.to_string(),
                }
            }
        }
    })
}

fn is_value_type(ty: &IrType) -> bool {
    matches!(
        ty,
        IrType::Integer | IrType::Double | IrType::Bool | IrType::Enum(_)
    )
}

fn quoted(text: &str) -> String {
    let mut out = String::from('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

/// Styles a raw name as a PascalCase C# identifier. Characters that cannot
/// appear in an identifier become word breaks; leading digits are dropped.
fn pascal(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|ch| match is_identifier_part(ch) {
            true => ch,
            false => ' ',
        })
        .collect();
    let words: Vec<&str> = cleaned
        .split_ascii_whitespace()
        .map(|word| word.trim_start_matches(|c: char| c.is_ascii_digit()))
        .filter(|word| !word.is_empty())
        .collect();
    match words.is_empty() {
        true => "Json".to_string(),
        false => words.join(" ").to_case(Case::Pascal),
    }
}

fn is_identifier_part(ch: char) -> bool {
    ch == '_'
        || matches!(
            get_general_category(ch),
            GeneralCategory::UppercaseLetter
                | GeneralCategory::LowercaseLetter
                | GeneralCategory::TitlecaseLetter
                | GeneralCategory::ModifierLetter
                | GeneralCategory::OtherLetter
                | GeneralCategory::LetterNumber
                | GeneralCategory::DecimalNumber
        )
}

// https://learn.microsoft.com/en-us/dotnet/csharp/language-reference/keywords/
const CSHARP_KEYWORDS: &[&str] = &[
    "abstract", "as", "base", "bool", "break", "byte", "case", "catch", "char", "checked",
    "class", "const", "continue", "decimal", "default", "delegate", "do", "double", "else",
    "enum", "event", "explicit", "extern", "false", "finally", "fixed", "float", "for",
    "foreach", "goto", "if", "implicit", "in", "int", "interface", "internal", "is", "lock",
    "long", "namespace", "new", "null", "object", "operator", "out", "override", "params",
    "private", "protected", "public", "readonly", "ref", "return", "sbyte", "sealed", "short",
    "sizeof", "stackalloc", "static", "string", "struct", "switch", "this", "throw", "true",
    "try", "typeof", "uint", "ulong", "unchecked", "unsafe", "ushort", "using", "virtual",
    "void", "volatile", "while",
];
