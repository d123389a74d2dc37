//! # GraphQL Introspection Translation
//!
//! Turns an `__schema` introspection result into the same IR dialect the
//! JSON inferencer produces. Object types become classes (allocated before
//! their fields translate, so recursive types resolve), enums become IR
//! enums, and unions/interfaces unify their possible object types.
//!
//! GraphQL fields are nullable unless wrapped in `NON_NULL`, so field types
//! gain a null member by default. Custom scalars and input objects have no
//! data-shape counterpart; they degrade to `Any` with a diagnostic.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::{
    graph::{ClassData, ClassId, EnumData, GraphError, IrGraph, IrType, NameSet},
    infer::Unifier,
    schema::Diagnostic,
    union::nullable_of,
};

#[derive(Debug, Deserialize)]
struct IntrospectionDocument {
    #[serde(rename = "__schema")]
    schema: SchemaDocument,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SchemaDocument {
    query_type: TypeName,
    types: Vec<FullType>,
}

#[derive(Debug, Deserialize)]
struct TypeName {
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FullType {
    kind: TypeKind,
    name: Option<String>,
    #[serde(default)]
    fields: Option<Vec<FieldDef>>,
    #[serde(default)]
    enum_values: Option<Vec<EnumValue>>,
    #[serde(default)]
    possible_types: Option<Vec<TypeRef>>,
}

#[derive(Debug, Clone, Deserialize)]
struct FieldDef {
    name: String,
    #[serde(rename = "type")]
    ty: TypeRef,
}

#[derive(Debug, Clone, Deserialize)]
struct EnumValue {
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypeRef {
    kind: TypeKind,
    name: Option<String>,
    of_type: Option<Box<TypeRef>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum TypeKind {
    Scalar,
    Object,
    Interface,
    Union,
    Enum,
    InputObject,
    List,
    NonNull,
}

pub fn translate(
    graph: &mut IrGraph,
    document: &Value,
) -> Result<(IrType, Vec<Diagnostic>), GraphError> {
    // introspection results commonly arrive in a `data` envelope
    let document = document.get("data").unwrap_or(document);
    let parsed: IntrospectionDocument = match serde_json::from_value(document.clone()) {
        Ok(parsed) => parsed,
        Err(error) => {
            let diagnostic = Diagnostic {
                path: "__schema".to_string(),
                message: format!("malformed introspection result: {error}"),
            };
            return Ok((IrType::Any, vec![diagnostic]));
        }
    };

    let types = parsed
        .schema
        .types
        .into_iter()
        .filter_map(|ty| match &ty.name {
            Some(name) if !name.starts_with("__") => Some((name.clone(), ty)),
            _ => None,
        })
        .collect();

    let mut translator = GraphqlTranslator {
        graph,
        types,
        classes: BTreeMap::new(),
        diagnostics: vec![],
    };
    let root = translator.named_type(&parsed.schema.query_type.name, "__schema/queryType")?;
    Ok((root, translator.diagnostics))
}

struct GraphqlTranslator<'g> {
    graph: &'g mut IrGraph,
    types: BTreeMap<String, FullType>,
    classes: BTreeMap<String, ClassId>,
    diagnostics: Vec<Diagnostic>,
}

impl GraphqlTranslator<'_> {
    fn named_type(&mut self, name: &str, path: &str) -> Result<IrType, GraphError> {
        if let Some(&id) = self.classes.get(name) {
            return Ok(IrType::Class(id));
        }
        let Some(full) = self.types.get(name).cloned() else {
            self.issue(path, format!("unknown type `{name}`"));
            return Ok(IrType::Any);
        };

        match full.kind {
            TypeKind::Object => {
                let id = self.graph.reserve_class();
                self.classes.insert(name.to_string(), id);
                let mut data = ClassData::new(NameSet::given(name));
                for field in full.fields.unwrap_or_default() {
                    let path = format!("{name}.{}", field.name);
                    let ty = self.field_type(&field.ty, &path)?;
                    data.properties.insert(field.name, ty);
                }
                self.graph.fill_class(id, data);
                Ok(IrType::Class(id))
            }
            TypeKind::Enum => {
                let values = full
                    .enum_values
                    .unwrap_or_default()
                    .into_iter()
                    .map(|value| value.name)
                    .collect();
                Ok(IrType::Enum(EnumData {
                    names: NameSet::given(name),
                    values,
                }))
            }
            TypeKind::Union | TypeKind::Interface => {
                let possible = full.possible_types.unwrap_or_default();
                if possible.is_empty() {
                    self.issue(path, format!("`{name}` has no possible types"));
                    return Ok(IrType::Any);
                }
                let mut types = vec![];
                for type_ref in &possible {
                    types.push(self.bare_type(type_ref, path)?);
                }
                let mut unifier = Unifier::new(self.graph, false);
                let mut out = IrType::NoInformation;
                for ty in types {
                    out = unifier.unify(out, ty)?;
                }
                Ok(out)
            }
            TypeKind::Scalar => Ok(self.scalar(name, path)),
            TypeKind::InputObject => {
                self.issue(path, format!("input object `{name}` describes no output data"));
                Ok(IrType::Any)
            }
            TypeKind::List | TypeKind::NonNull => {
                self.issue(path, format!("`{name}` is a wrapper kind without a definition"));
                Ok(IrType::Any)
            }
        }
    }

    /// Field positions are nullable unless wrapped in `NON_NULL`.
    fn field_type(&mut self, type_ref: &TypeRef, path: &str) -> Result<IrType, GraphError> {
        match type_ref.kind {
            TypeKind::NonNull => match &type_ref.of_type {
                Some(inner) => self.bare_type(inner, path),
                None => {
                    self.issue(path, "NON_NULL wrapper without an inner type");
                    Ok(IrType::Any)
                }
            },
            _ => {
                let ty = self.bare_type(type_ref, path)?;
                Ok(nullable_of(ty))
            }
        }
    }

    fn bare_type(&mut self, type_ref: &TypeRef, path: &str) -> Result<IrType, GraphError> {
        match type_ref.kind {
            TypeKind::NonNull => match &type_ref.of_type {
                Some(inner) => self.bare_type(inner, path),
                None => {
                    self.issue(path, "NON_NULL wrapper without an inner type");
                    Ok(IrType::Any)
                }
            },
            TypeKind::List => match &type_ref.of_type {
                Some(inner) => {
                    let elem = self.field_type(inner, path)?;
                    Ok(IrType::Array(Box::new(elem)))
                }
                None => {
                    self.issue(path, "LIST wrapper without an element type");
                    Ok(IrType::Any)
                }
            },
            TypeKind::Scalar => match &type_ref.name {
                Some(name) => Ok(self.scalar(name, path)),
                None => {
                    self.issue(path, "scalar without a name");
                    Ok(IrType::Any)
                }
            },
            _ => match &type_ref.name {
                Some(name) => {
                    let name = name.clone();
                    self.named_type(&name, path)
                }
                None => {
                    self.issue(path, "type reference without a name");
                    Ok(IrType::Any)
                }
            },
        }
    }

    fn scalar(&mut self, name: &str, path: &str) -> IrType {
        match name {
            "Int" => IrType::Integer,
            "Float" => IrType::Double,
            "Boolean" => IrType::Bool,
            "String" | "ID" => IrType::String,
            other => {
                self.issue(path, format!("custom scalar `{other}` widened to any"));
                IrType::Any
            }
        }
    }

    fn issue(&mut self, path: &str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            path: path.to_string(),
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn introspection(types: &str, query_type: &str) -> Value {
        serde_json::from_str(&format!(
            r#"{{"__schema": {{"queryType": {{"name": "{query_type}"}}, "types": {types}}}}}"#
        ))
        .expect("invalid json")
    }

    #[test]
    fn objects_with_scalars_and_lists() {
        let document = introspection(
            r#"[
                {
                    "kind": "OBJECT",
                    "name": "Query",
                    "fields": [
                        {"name": "id", "type": {"kind": "NON_NULL", "name": null,
                            "ofType": {"kind": "SCALAR", "name": "ID", "ofType": null}}},
                        {"name": "score", "type": {"kind": "SCALAR", "name": "Float", "ofType": null}},
                        {"name": "tags", "type": {"kind": "NON_NULL", "name": null,
                            "ofType": {"kind": "LIST", "name": null,
                                "ofType": {"kind": "NON_NULL", "name": null,
                                    "ofType": {"kind": "SCALAR", "name": "String", "ofType": null}}}}}
                    ]
                }
            ]"#,
            "Query",
        );
        let mut graph = IrGraph::new();
        let (ty, diagnostics) = translate(&mut graph, &document).expect("translate failed");
        assert_eq!(diagnostics, vec![]);
        assert_eq!(
            format!("{}", graph.view(&ty)),
            "{id:str,score:double?,tags:[str]}"
        );
    }

    #[test]
    fn recursive_object_types() {
        let document = introspection(
            r#"[
                {
                    "kind": "OBJECT",
                    "name": "Node",
                    "fields": [
                        {"name": "value", "type": {"kind": "NON_NULL", "name": null,
                            "ofType": {"kind": "SCALAR", "name": "Int", "ofType": null}}},
                        {"name": "next", "type": {"kind": "OBJECT", "name": "Node", "ofType": null}}
                    ]
                }
            ]"#,
            "Node",
        );
        let mut graph = IrGraph::new();
        let (ty, diagnostics) = translate(&mut graph, &document).expect("translate failed");
        assert_eq!(diagnostics, vec![]);

        let IrType::Class(root) = ty else {
            panic!("expected a class");
        };
        assert_eq!(
            format!("{}", graph.view(&IrType::Class(root))),
            format!("{{value:int,next:#{root}?}}")
        );
    }

    #[test]
    fn enums_and_custom_scalars() {
        let document = introspection(
            r#"[
                {
                    "kind": "OBJECT",
                    "name": "Query",
                    "fields": [
                        {"name": "size", "type": {"kind": "NON_NULL", "name": null,
                            "ofType": {"kind": "ENUM", "name": "Size", "ofType": null}}},
                        {"name": "stamp", "type": {"kind": "SCALAR", "name": "DateTime", "ofType": null}}
                    ]
                },
                {
                    "kind": "ENUM",
                    "name": "Size",
                    "enumValues": [{"name": "SMALL"}, {"name": "LARGE"}]
                }
            ]"#,
            "Query",
        );
        let mut graph = IrGraph::new();
        let (ty, diagnostics) = translate(&mut graph, &document).expect("translate failed");
        assert_eq!(
            format!("{}", graph.view(&ty)),
            "{size:enum(LARGE|SMALL),stamp:any}"
        );
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("DateTime"));
    }

    #[test]
    fn malformed_documents_degrade() {
        let document = serde_json::from_str::<Value>(r#"{"not_a_schema": 1}"#).expect("json");
        let mut graph = IrGraph::new();
        let (ty, diagnostics) = translate(&mut graph, &document).expect("translate failed");
        assert_eq!(ty, IrType::Any);
        assert_eq!(diagnostics.len(), 1);
    }
}
