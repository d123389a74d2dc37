use convert_case::{Case, Casing};
use typewright::{
    graph::{IrGraph, IrType},
    naming::Namer,
    render::{BlankPolicy, Language, RenderContext, RenderError, SerializedRenderResult, render},
};

/// Renders a canonical graph as TypeScript interfaces and type aliases.
///
/// Properties keep their original JSON spelling (quoted when necessary), so
/// the emitted shapes round-trip without rename metadata. Enums are not
/// supported by this renderer: each one is emitted as `string` with an issue
/// annotation.
pub fn codegen(graph: &IrGraph) -> Result<SerializedRenderResult, RenderError> {
    render(graph, &TypeScript)
}

struct TypeScript;

impl Language for TypeScript {
    fn name(&self) -> &'static str {
        "typescript"
    }

    fn keywords(&self) -> &'static [&'static str] {
        TYPESCRIPT_KEYWORDS
    }

    fn named_type_namer(&self) -> Namer {
        Namer::new(pascal)
    }

    fn property_namer(&self) -> Namer {
        // original spellings survive; invalid identifiers are quoted on
        // emission instead of renamed
        Namer::new(str::to_string)
    }

    fn top_level_namer(&self) -> Namer {
        Namer::new(pascal)
    }

    fn emit(&self, ctx: &mut RenderContext<'_>) -> Result<(), RenderError> {
        ctx.for_each_top_level(BlankPolicy::Interposing, |ctx, name, ty| {
            // named types already carry the top-level name
            match ty {
                IrType::Class(_) | IrType::Enum(_) => {}
                IrType::Union(_) if ctx.name_for_named_type(ty).is_ok_and(|n| n == name) => {}
                other => {
                    let spelled = type_for(ctx, other)?;
                    ctx.emit_line(format!("export type {name} = {spelled};"));
                }
            }
            Ok(())
        })?;

        if ctx.class_count() > 0 && ctx.line_count() > 0 {
            ctx.blank_line();
        }
        ctx.for_each_class(BlankPolicy::Interposing, |ctx, class, name| {
            ctx.emit_line(format!("export interface {name} {{"));
            ctx.indented(|ctx| {
                ctx.for_each_property(class, BlankPolicy::None, |ctx, _, json_name, ty| {
                    let spelled = type_for(ctx, ty)?;
                    ctx.emit_line(format!("{}: {spelled};", property_key(json_name)));
                    Ok(())
                })
            })?;
            ctx.emit_line("}");
            Ok(())
        })?;

        if ctx.union_count() > 0 && ctx.line_count() > 0 {
            ctx.blank_line();
        }
        ctx.for_each_union(BlankPolicy::Interposing, |ctx, union, name| {
            let members: Result<Vec<String>, RenderError> = union
                .members()
                .iter()
                .map(|member| type_for(ctx, member))
                .collect();
            ctx.emit_line(format!("export type {name} = {};", members?.join(" | ")));
            Ok(())
        })?;

        if ctx.enum_count() > 0 && ctx.line_count() > 0 {
            ctx.blank_line();
        }
        ctx.for_each_enum(BlankPolicy::Interposing, |ctx, data, name| {
            let values: Vec<String> = data.values.iter().map(|value| quoted(value)).collect();
            ctx.issue(format!(
                "enums are not supported by the TypeScript renderer; {name} accepts {}",
                values.join(", ")
            ));
            ctx.emit_line(format!("export type {name} = string;"));
            Ok(())
        })
    }
}

fn type_for(ctx: &RenderContext<'_>, ty: &IrType) -> Result<String, RenderError> {
    Ok(match ty {
        IrType::NoInformation | IrType::Any => "any".to_string(),
        IrType::Null => "null".to_string(),
        IrType::Integer | IrType::Double => "number".to_string(),
        IrType::Bool => "boolean".to_string(),
        IrType::String => "string".to_string(),
        IrType::Array(inner) => {
            let spelled = type_for(ctx, inner)?;
            match spelled.contains(' ') {
                true => format!("({spelled})[]"),
                false => format!("{spelled}[]"),
            }
        }
        IrType::Map(inner) => format!("{{ [key: string]: {} }}", type_for(ctx, inner)?),
        IrType::Class(_) | IrType::Enum(_) => ctx.name_for_named_type(ty)?.to_string(),
        IrType::Union(union) => {
            if let Some(inner) = union.nullable() {
                format!("{} | null", type_for(ctx, &inner)?)
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

fn property_key(json_name: &str) -> String {
    match is_identifier(json_name) {
        true => json_name.to_string(),
        false => quoted(json_name),
    }
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_alphabetic() || first == '_' || first == '$')
        && chars.all(|ch| ch.is_alphanumeric() || ch == '_' || ch == '$')
}

fn quoted(text: &str) -> String {
    let mut out = String::from('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

fn pascal(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|ch| match ch.is_alphanumeric() || ch == '_' {
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

// reserved words that cannot name a type alias or interface
const TYPESCRIPT_KEYWORDS: &[&str] = &[
    "any", "as", "boolean", "break", "case", "catch", "class", "const", "continue", "debugger",
    "declare", "default", "delete", "do", "else", "enum", "export", "extends", "false",
    "finally", "for", "function", "if", "implements", "import", "in", "instanceof", "interface",
    "let", "module", "new", "null", "number", "package", "private", "protected", "public",
    "return", "static", "string", "super", "switch", "symbol", "this", "throw", "true", "try",
    "type", "typeof", "undefined", "var", "void", "while", "with", "yield",
];
