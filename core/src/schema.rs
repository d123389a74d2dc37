//! # JSON Schema Translation
//!
//! Maps a Draft-6 subset into the IR. Object schemas become classes,
//! `enum`s of strings become enums, `oneOf`/`anyOf` unify their variants,
//! and `additionalProperties` without named properties becomes a map.
//!
//! `$ref` targets that are object schemas go through the arena: the class id
//! is reserved before the target is translated, so `$ref` cycles come out as
//! class-reference cycles, the only kind the IR can carry.
//!
//! Unsupported constructs never fail the translation. They are reported as
//! [`Diagnostic`]s and the schema degrades to the least specific compatible
//! type.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::{
    graph::{ClassData, ClassId, EnumData, GraphError, IrGraph, IrType, NameSet},
    infer::Unifier,
    union::nullable_of,
};

/// A structured note about schema input the translation could not fully
/// honor. Reported alongside the result; never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub path: String,
    pub message: String,
}

/// Constraint keywords the IR has no representation for. Their presence is
/// reported and the base type is kept.
const IGNORED_CONSTRAINTS: [&str; 9] = [
    "pattern",
    "format",
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "minLength",
    "maxLength",
    "multipleOf",
];

pub fn translate(
    graph: &mut IrGraph,
    document: &Value,
) -> Result<(IrType, Vec<Diagnostic>), GraphError> {
    let mut translator = Translator {
        graph,
        root: document,
        refs: BTreeMap::new(),
        in_progress: BTreeSet::new(),
        diagnostics: vec![],
    };
    let ty = match document.as_object() {
        Some(object)
            if is_object_schema(object)
                && ["$ref", "allOf", "enum", "oneOf", "anyOf"]
                    .iter()
                    .all(|key| !object.contains_key(*key)) =>
        {
            // register the root before translating it, so `"$ref": "#"`
            // resolves into the same class
            let id = translator.graph.reserve_class();
            translator.refs.insert("#".to_string(), id);
            translator.object(object, "#", Some(id))?
        }
        _ => translator.schema(document, "#")?,
    };
    Ok((ty, translator.diagnostics))
}

struct Translator<'g, 'v> {
    graph: &'g mut IrGraph,
    root: &'v Value,
    refs: BTreeMap<String, ClassId>,
    in_progress: BTreeSet<String>,
    diagnostics: Vec<Diagnostic>,
}

impl<'g, 'v> Translator<'g, 'v> {
    fn schema(&mut self, node: &'v Value, path: &str) -> Result<IrType, GraphError> {
        let Some(object) = node.as_object() else {
            // boolean schemas accept (or reject) anything
            if !matches!(node, Value::Bool(_)) {
                self.issue(path, "schema must be an object or a boolean");
            }
            return Ok(IrType::Any);
        };

        if let Some(Value::String(target)) = object.get("$ref") {
            return self.reference(target, path);
        }

        for key in IGNORED_CONSTRAINTS {
            if object.contains_key(key) {
                self.issue(
                    path,
                    format!("constraint `{key}` is not supported and was ignored"),
                );
            }
        }

        if object.contains_key("allOf") {
            self.issue(path, "`allOf` is not supported; widening to any");
            return Ok(IrType::Any);
        }

        if let Some(members) = object.get("enum") {
            return self.enumeration(members, object, path);
        }

        if let Some(variants) = object.get("oneOf").or_else(|| object.get("anyOf")) {
            return self.variants(variants, path);
        }

        match object.get("type") {
            Some(Value::String(name)) => self.typed(name, object, path),
            Some(Value::Array(names)) => {
                let mut types = vec![];
                for name in names {
                    match name.as_str() {
                        Some(name) => types.push(self.typed(name, object, path)?),
                        None => self.issue(path, "`type` entries must be strings"),
                    }
                }
                self.unified(types)
            }
            Some(_) => {
                self.issue(path, "`type` must be a string or an array of strings");
                Ok(IrType::Any)
            }
            None => match object.contains_key("properties")
                || object.contains_key("additionalProperties")
                || object.contains_key("required")
            {
                true => self.object(object, path, None),
                false => Ok(IrType::Any),
            },
        }
    }

    fn typed(
        &mut self,
        name: &str,
        object: &'v Map<String, Value>,
        path: &str,
    ) -> Result<IrType, GraphError> {
        Ok(match name {
            "string" => IrType::String,
            "integer" => IrType::Integer,
            "number" => IrType::Double,
            "boolean" => IrType::Bool,
            "null" => IrType::Null,
            "array" => {
                let elem = match object.get("items") {
                    Some(items) => self.schema(items, &format!("{path}/items"))?,
                    None => IrType::Any,
                };
                IrType::Array(Box::new(elem))
            }
            "object" => self.object(object, path, None)?,
            other => {
                self.issue(path, format!("unknown type `{other}`"));
                IrType::Any
            }
        })
    }

    /// `reserved` carries the pre-allocated id when the object was reached
    /// through a `$ref`, so cycles resolve to it.
    fn object(
        &mut self,
        object: &'v Map<String, Value>,
        path: &str,
        reserved: Option<ClassId>,
    ) -> Result<IrType, GraphError> {
        let properties = object.get("properties").and_then(Value::as_object);
        let has_named = properties.is_some_and(|p| !p.is_empty());

        if !has_named
            && let Some(additional) = object.get("additionalProperties")
            && !matches!(additional, Value::Bool(false))
        {
            let elem = match additional {
                Value::Bool(true) => IrType::Any,
                other => self.schema(other, &format!("{path}/additionalProperties"))?,
            };
            let map = IrType::Map(Box::new(elem));
            // a reserved id must still resolve somewhere live
            if let Some(id) = reserved {
                let mut data = ClassData::new(NameSet::default());
                data.properties.insert(String::new(), map.clone());
                self.graph.fill_class(id, data);
            }
            return Ok(map);
        }

        let names = match object.get("title").and_then(Value::as_str) {
            Some(title) => NameSet::given(title),
            None => NameSet::default(),
        };
        let id = match reserved {
            Some(id) => id,
            None => self.graph.reserve_class(),
        };

        let required: BTreeSet<&str> = object
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let mut data = ClassData::new(names);
        if let Some(properties) = properties {
            for (key, node) in properties {
                let mut ty = self.schema(node, &format!("{path}/properties/{key}"))?;
                if !required.contains(key.as_str()) {
                    ty = nullable_of(ty);
                }
                data.properties.insert(key.clone(), ty);
            }
        }
        self.graph.fill_class(id, data);
        Ok(IrType::Class(id))
    }

    fn reference(&mut self, target: &str, path: &str) -> Result<IrType, GraphError> {
        if let Some(&id) = self.refs.get(target) {
            return Ok(IrType::Class(id));
        }

        let Some(node) = self.lookup(target) else {
            self.issue(path, format!("unresolvable $ref `{target}`"));
            return Ok(IrType::Any);
        };

        if let Some(object) = node.as_object()
            && is_object_schema(object)
        {
            let id = self.graph.reserve_class();
            self.refs.insert(target.to_string(), id);
            return self.object(object, target, Some(id));
        }

        // non-object targets translate inline; a cycle through one cannot
        // be carried by the IR
        if !self.in_progress.insert(target.to_string()) {
            self.issue(
                path,
                format!("cyclic $ref `{target}` through a non-object schema"),
            );
            return Ok(IrType::Any);
        }
        let ty = self.schema(node, target)?;
        self.in_progress.remove(target);
        Ok(ty)
    }

    /// Resolves a same-document JSON pointer.
    fn lookup(&self, target: &str) -> Option<&'v Value> {
        let pointer = target.strip_prefix('#')?;
        let mut node = self.root;
        for segment in pointer.split('/').filter(|s| !s.is_empty()) {
            let segment = segment.replace("~1", "/").replace("~0", "~");
            node = match node {
                Value::Object(object) => object.get(&segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(node)
    }

    fn enumeration(
        &mut self,
        members: &'v Value,
        object: &'v Map<String, Value>,
        path: &str,
    ) -> Result<IrType, GraphError> {
        let Some(members) = members.as_array() else {
            self.issue(path, "`enum` must be an array");
            return Ok(IrType::Any);
        };

        if !members.is_empty() && members.iter().all(Value::is_string) {
            let names = match object.get("title").and_then(Value::as_str) {
                Some(title) => NameSet::given(title),
                None => NameSet::default(),
            };
            let values = members
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
            return Ok(IrType::Enum(EnumData { names, values }));
        }

        self.issue(
            path,
            "only string `enum` members are supported; using their base types",
        );
        let types = members
            .iter()
            .map(|member| match member {
                Value::Null => IrType::Null,
                Value::Bool(_) => IrType::Bool,
                Value::Number(n) => match n.is_i64() || n.is_u64() {
                    true => IrType::Integer,
                    false => IrType::Double,
                },
                Value::String(_) => IrType::String,
                _ => IrType::Any,
            })
            .collect();
        self.unified(types)
    }

    fn variants(&mut self, variants: &'v Value, path: &str) -> Result<IrType, GraphError> {
        let Some(variants) = variants.as_array() else {
            self.issue(path, "`oneOf`/`anyOf` must be an array");
            return Ok(IrType::Any);
        };
        let mut types = vec![];
        for (index, node) in variants.iter().enumerate() {
            types.push(self.schema(node, &format!("{path}/{index}"))?);
        }
        self.unified(types)
    }

    fn unified(&mut self, types: Vec<IrType>) -> Result<IrType, GraphError> {
        let mut unifier = Unifier::new(self.graph, false);
        let mut out = IrType::NoInformation;
        for ty in types {
            out = unifier.unify(out, ty)?;
        }
        Ok(out)
    }

    fn issue(&mut self, path: &str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            path: path.to_string(),
            message: message.into(),
        });
    }
}

fn is_object_schema(object: &Map<String, Value>) -> bool {
    matches!(object.get("type"), Some(Value::String(t)) if t == "object")
        || object.contains_key("properties")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[track_caller]
    fn check(schema: &str, expected: &str) {
        let document = serde_json::from_str::<Value>(schema).expect("invalid json");
        let mut graph = IrGraph::new();
        let (ty, _) = translate(&mut graph, &document).expect("translate failed");
        assert_eq!(format!("{}", graph.view(&ty)), expected);
    }

    #[test]
    fn primitives() {
        check(r#"{"type": "string"}"#, "str");
        check(r#"{"type": "integer"}"#, "int");
        check(r#"{"type": "number"}"#, "double");
        check(r#"{"type": "boolean"}"#, "bool");
        check(r#"{"type": "null"}"#, "null");
        check(r#"{"type": ["integer", "null"]}"#, "|int|null|");
        check("{}", "any");
        check("true", "any");
    }

    #[test]
    fn arrays_and_objects() {
        check(
            r#"{"type": "array", "items": {"type": "number"}}"#,
            "[double]",
        );
        check(
            r#"{
                "type": "object",
                "properties": {"n": {"type": "integer"}},
                "required": ["n"]
            }"#,
            "{n:int}",
        );
    }

    #[test]
    fn missing_required_makes_properties_nullable() {
        check(
            r#"{
                "type": "object",
                "properties": {"n": {"type": "integer"}},
                "required": []
            }"#,
            "{n:int?}",
        );
        check(
            r#"{
                "type": "object",
                "properties": {"n": {"type": "integer"}}
            }"#,
            "{n:int?}",
        );
    }

    #[test]
    fn additional_properties_become_maps() {
        check(
            r#"{"type": "object", "additionalProperties": {"type": "string"}}"#,
            "{*:str}",
        );
        check(
            r#"{"type": "object", "additionalProperties": true}"#,
            "{*:any}",
        );
        check(r#"{"type": "object", "additionalProperties": false}"#, "{}");
    }

    #[test]
    fn string_enums() {
        check(
            r#"{"enum": ["small", "medium", "large"]}"#,
            "enum(large|medium|small)",
        );
    }

    #[test]
    fn non_string_enums_degrade() {
        let document =
            serde_json::from_str::<Value>(r#"{"enum": [1, 2, 3]}"#).expect("invalid json");
        let mut graph = IrGraph::new();
        let (ty, diagnostics) = translate(&mut graph, &document).expect("translate failed");
        assert_eq!(ty, IrType::Integer);
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn one_of_unifies() {
        check(
            r#"{"oneOf": [{"type": "integer"}, {"type": "string"}]}"#,
            "|int|str|",
        );
        check(
            r#"{"anyOf": [{"type": "integer"}, {"type": "null"}]}"#,
            "int?",
        );
    }

    #[test]
    fn refs_resolve_through_definitions() {
        check(
            r##"{
                "definitions": {
                    "point": {
                        "type": "object",
                        "title": "Point",
                        "properties": {"x": {"type": "number"}, "y": {"type": "number"}},
                        "required": ["x", "y"]
                    }
                },
                "type": "object",
                "properties": {
                    "from": {"$ref": "#/definitions/point"},
                    "to": {"$ref": "#/definitions/point"}
                },
                "required": ["from", "to"]
            }"##,
            "{from:{x:double,y:double},to:{x:double,y:double}}",
        );
    }

    #[test]
    fn recursive_refs_become_class_cycles() {
        let document = serde_json::from_str::<Value>(
            r##"{
                "type": "object",
                "properties": {
                    "value": {"type": "integer"},
                    "next": {"$ref": "#"}
                },
                "required": ["value"]
            }"##,
        )
        .expect("invalid json");
        let mut graph = IrGraph::new();
        let (ty, diagnostics) = translate(&mut graph, &document).expect("translate failed");
        assert_eq!(diagnostics, vec![]);

        let IrType::Class(root) = ty else {
            panic!("expected a class, got {ty:?}");
        };
        let next = graph.live(root).expect("live").properties["next"].clone();
        match next {
            IrType::Union(union) => {
                assert_eq!(union.class_slot().map(|id| graph.follow(id)), Some(Ok(root)))
            }
            other => panic!("expected a nullable class reference, got {other:?}"),
        }
    }

    #[test]
    fn unsupported_constructs_are_reported() {
        let document =
            serde_json::from_str::<Value>(r#"{"type": "string", "pattern": "^[a-z]+$"}"#)
                .expect("invalid json");
        let mut graph = IrGraph::new();
        let (ty, diagnostics) = translate(&mut graph, &document).expect("translate failed");
        assert_eq!(ty, IrType::String);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("pattern"));

        let document =
            serde_json::from_str::<Value>(r##"{"$ref": "#/nowhere"}"##).expect("invalid json");
        let (ty, diagnostics) = translate(&mut graph, &document).expect("translate failed");
        assert_eq!(ty, IrType::Any);
        assert!(diagnostics[0].message.contains("unresolvable"));
    }
}
