//! # Rendering Scaffolding
//!
//! The renderer-independent layer every language back-end builds on. It
//! owns the deterministic traversal of a canonical [`IrGraph`] (top levels
//! in declaration order, classes in first-visit order, properties sorted by
//! their final resolved spelling) plus the line emitter and its annotation
//! stream.
//!
//! A back-end is a [`Language`]: reserved keywords, the namers for type,
//! property, and top-level spellings, and an `emit` hook that drives the
//! `for_each_*` iterators. The scaffolding resolves every name before
//! `emit` runs; [`RenderContext::name_for_named_type`] is a lookup, never a
//! creation, and an unknown type is a fatal error.
//!
//! Rendering the same graph twice produces byte-identical output: all
//! iteration orders are derived from insertion-ordered or sorted
//! containers.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use thiserror::Error;

use crate::{
    graph::{ClassId, EnumData, GraphError, IrGraph, IrType},
    naming::{Namer, NamingError, Namespaces},
    union::UnionRep,
};

/// Blank-line policy for the `for_each_*` iterators: no blanks, blanks
/// around and between items, or blanks only between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlankPolicy {
    None,
    BetweenAll,
    Interposing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Annotation {
    /// A user-visible problem with the rendered span.
    Issue(String),
    /// Advisory text for the rendered span.
    Hover(String),
}

/// Inclusive line range in the emitted artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start_line: usize,
    pub end_line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanAnnotation {
    pub span: Span,
    pub annotation: Annotation,
}

/// The rendered artifact: lines plus the annotations attached to them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SerializedRenderResult {
    pub lines: Vec<String>,
    pub annotations: Vec<SpanAnnotation>,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Naming(#[from] NamingError),
    #[error("no name was assigned for type `{0}`")]
    UnknownNamedType(String),
}

/// The capability set a target language implements. The scaffolding is
/// parameterized over this trait object; back-ends contain no inference or
/// naming logic of their own.
pub trait Language {
    fn name(&self) -> &'static str;
    fn keywords(&self) -> &'static [&'static str];
    fn named_type_namer(&self) -> Namer;
    fn property_namer(&self) -> Namer;
    fn top_level_namer(&self) -> Namer;
    /// Whether a top level that is itself a named type adopts the top-level
    /// spelling as the type's name.
    fn top_level_names_named_type(&self) -> bool {
        true
    }
    fn emit(&self, ctx: &mut RenderContext<'_>) -> Result<(), RenderError>;
}

pub fn render(
    graph: &IrGraph,
    language: &dyn Language,
) -> Result<SerializedRenderResult, RenderError> {
    let mut ctx = RenderContext::new(graph, language)?;
    language.emit(&mut ctx)?;
    Ok(ctx.finish())
}

/// A named type handed out by [`RenderContext::for_each_named_type`].
#[derive(Debug, Clone)]
pub enum NamedType {
    Class(ClassId),
    Union(UnionRep),
    Enum(EnumData),
}

pub struct RenderContext<'g> {
    graph: &'g IrGraph,
    classes: Vec<ClassId>,
    unions: Vec<UnionRep>,
    enums: Vec<EnumData>,
    toplevel_names: IndexMap<String, String>,
    class_names: BTreeMap<ClassId, String>,
    union_names: BTreeMap<String, String>,
    enum_names: BTreeMap<String, String>,
    property_names: BTreeMap<(ClassId, String), String>,
    lines: Vec<String>,
    indent: usize,
    pending: Vec<Annotation>,
    annotations: Vec<SpanAnnotation>,
}

impl<'g> RenderContext<'g> {
    fn new(graph: &'g IrGraph, language: &dyn Language) -> Result<Self, RenderError> {
        let classes = graph.reachable_classes()?;
        let (unions, enums) = collect_named(graph, &classes)?;

        let mut namespaces = Namespaces::new();
        let root = namespaces.add_namespace(None, language.keywords().iter().copied());
        let type_namer = namespaces.add_namer(language.named_type_namer());
        let property_namer = namespaces.add_namer(language.property_namer());
        let top_namer = namespaces.add_namer(language.top_level_namer());

        // top levels first; a top level that is directly a named type gives
        // that type its spelling
        let mut toplevel_ids = IndexMap::new();
        let mut class_ids: BTreeMap<ClassId, usize> = BTreeMap::new();
        let mut adopted: BTreeMap<String, usize> = BTreeMap::new();
        for (name, ty) in &graph.toplevels {
            let id = namespaces.add_simple(root, name, top_namer);
            toplevel_ids.insert(name.clone(), id);
            if !language.top_level_names_named_type() {
                continue;
            }
            match ty {
                IrType::Class(class) => {
                    class_ids.entry(graph.follow(*class)?).or_insert(id);
                }
                IrType::Union(union) if is_named_union(union) => {
                    adopted
                        .entry(type_key(graph, &IrType::Union(union.clone())))
                        .or_insert(id);
                }
                IrType::Enum(data) => {
                    adopted
                        .entry(type_key(graph, &IrType::Enum(data.clone())))
                        .or_insert(id);
                }
                _ => {}
            }
        }

        for &class in &classes {
            if class_ids.contains_key(&class) {
                continue;
            }
            let raw = graph
                .live(class)?
                .names
                .preferred()
                .unwrap_or("other")
                .to_string();
            class_ids.insert(class, namespaces.add_simple(root, &raw, type_namer));
        }

        let mut union_ids: BTreeMap<String, usize> = BTreeMap::new();
        for union in &unions {
            let key = type_key(graph, &IrType::Union(Box::new(union.clone())));
            let id = match adopted.get(&key) {
                Some(&id) => id,
                None => {
                    let raw = union.names.preferred().unwrap_or("union").to_string();
                    namespaces.add_simple(root, &raw, type_namer)
                }
            };
            union_ids.insert(key, id);
        }

        let mut enum_ids: BTreeMap<String, usize> = BTreeMap::new();
        for data in &enums {
            let key = type_key(graph, &IrType::Enum(data.clone()));
            let id = match adopted.get(&key) {
                Some(&id) => id,
                None => {
                    let raw = data.names.preferred().unwrap_or("enumeration").to_string();
                    namespaces.add_simple(root, &raw, type_namer)
                }
            };
            enum_ids.insert(key, id);
        }

        // each class scopes its properties in a child namespace
        let mut property_ids: BTreeMap<(ClassId, String), usize> = BTreeMap::new();
        for &class in &classes {
            let scope = namespaces.add_namespace(Some(root), Vec::<String>::new());
            let json_names: Vec<String> = graph.live(class)?.properties.keys().cloned().collect();
            for json_name in json_names {
                let id = namespaces.add_simple(scope, &json_name, property_namer);
                property_ids.insert((class, json_name), id);
            }
        }

        namespaces.resolve()?;

        let mut toplevel_names = IndexMap::new();
        for (name, id) in toplevel_ids {
            toplevel_names.insert(name, namespaces.spelling(id)?.to_string());
        }
        let mut class_names = BTreeMap::new();
        for (class, id) in class_ids {
            class_names.insert(class, namespaces.spelling(id)?.to_string());
        }
        let mut union_names = BTreeMap::new();
        for (key, id) in union_ids {
            union_names.insert(key, namespaces.spelling(id)?.to_string());
        }
        let mut enum_names = BTreeMap::new();
        for (key, id) in enum_ids {
            enum_names.insert(key, namespaces.spelling(id)?.to_string());
        }
        let mut property_names = BTreeMap::new();
        for (key, id) in property_ids {
            property_names.insert(key, namespaces.spelling(id)?.to_string());
        }

        Ok(Self {
            graph,
            classes,
            unions,
            enums,
            toplevel_names,
            class_names,
            union_names,
            enum_names,
            property_names,
            lines: vec![],
            indent: 0,
            pending: vec![],
            annotations: vec![],
        })
    }

    pub fn graph(&self) -> &'g IrGraph {
        self.graph
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn union_count(&self) -> usize {
        self.unions.len()
    }

    pub fn enum_count(&self) -> usize {
        self.enums.len()
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn for_each_top_level(
        &mut self,
        blank: BlankPolicy,
        mut f: impl FnMut(&mut Self, &str, &IrType) -> Result<(), RenderError>,
    ) -> Result<(), RenderError> {
        let items: Vec<(String, IrType)> = self
            .graph
            .toplevels
            .iter()
            .map(|(name, ty)| {
                let resolved = self
                    .toplevel_names
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| name.clone());
                (resolved, ty.clone())
            })
            .collect();
        self.separated(blank, items, |ctx, (name, ty)| f(ctx, &name, &ty))
    }

    pub fn for_each_class(
        &mut self,
        blank: BlankPolicy,
        mut f: impl FnMut(&mut Self, ClassId, &str) -> Result<(), RenderError>,
    ) -> Result<(), RenderError> {
        let items: Vec<(ClassId, String)> = self
            .classes
            .iter()
            .map(|&class| {
                let name = self.class_names.get(&class).cloned().unwrap_or_default();
                (class, name)
            })
            .collect();
        self.separated(blank, items, |ctx, (class, name)| f(ctx, class, &name))
    }

    pub fn for_each_union(
        &mut self,
        blank: BlankPolicy,
        mut f: impl FnMut(&mut Self, &UnionRep, &str) -> Result<(), RenderError>,
    ) -> Result<(), RenderError> {
        let items: Vec<(UnionRep, String)> = self
            .unions
            .iter()
            .map(|union| {
                let key = type_key(self.graph, &IrType::Union(Box::new(union.clone())));
                let name = self.union_names.get(&key).cloned().unwrap_or_default();
                (union.clone(), name)
            })
            .collect();
        self.separated(blank, items, |ctx, (union, name)| f(ctx, &union, &name))
    }

    pub fn for_each_enum(
        &mut self,
        blank: BlankPolicy,
        mut f: impl FnMut(&mut Self, &EnumData, &str) -> Result<(), RenderError>,
    ) -> Result<(), RenderError> {
        let items: Vec<(EnumData, String)> = self
            .enums
            .iter()
            .map(|data| {
                let key = type_key(self.graph, &IrType::Enum(data.clone()));
                let name = self.enum_names.get(&key).cloned().unwrap_or_default();
                (data.clone(), name)
            })
            .collect();
        self.separated(blank, items, |ctx, (data, name)| f(ctx, &data, &name))
    }

    pub fn for_each_named_type(
        &mut self,
        blank: BlankPolicy,
        mut f: impl FnMut(&mut Self, NamedType, &str) -> Result<(), RenderError>,
    ) -> Result<(), RenderError> {
        let mut items: Vec<(NamedType, String)> = vec![];
        for &class in &self.classes {
            let name = self.class_names.get(&class).cloned().unwrap_or_default();
            items.push((NamedType::Class(class), name));
        }
        for union in &self.unions {
            let key = type_key(self.graph, &IrType::Union(Box::new(union.clone())));
            let name = self.union_names.get(&key).cloned().unwrap_or_default();
            items.push((NamedType::Union(union.clone()), name));
        }
        for data in &self.enums {
            let key = type_key(self.graph, &IrType::Enum(data.clone()));
            let name = self.enum_names.get(&key).cloned().unwrap_or_default();
            items.push((NamedType::Enum(data.clone()), name));
        }
        self.separated(blank, items, |ctx, (named, name)| f(ctx, named, &name))
    }

    /// Properties in a stable order: sorted by their final resolved
    /// spelling.
    pub fn for_each_property(
        &mut self,
        class: ClassId,
        blank: BlankPolicy,
        mut f: impl FnMut(&mut Self, &str, &str, &IrType) -> Result<(), RenderError>,
    ) -> Result<(), RenderError> {
        let class = self.graph.follow(class)?;
        let mut items: Vec<(String, String, IrType)> = self
            .graph
            .live(class)?
            .properties
            .iter()
            .map(|(json_name, ty)| {
                let resolved = self
                    .property_names
                    .get(&(class, json_name.clone()))
                    .cloned()
                    .unwrap_or_else(|| json_name.clone());
                (resolved, json_name.clone(), ty.clone())
            })
            .collect();
        items.sort_by(|a, b| a.0.cmp(&b.0));
        self.separated(blank, items, |ctx, (name, json_name, ty)| {
            f(ctx, &name, &json_name, &ty)
        })
    }

    /// The resolved spelling of a class, named union, or enum. A lookup,
    /// not a creation.
    pub fn name_for_named_type(&self, ty: &IrType) -> Result<&str, RenderError> {
        let found = match ty {
            IrType::Class(class) => self.class_names.get(&self.graph.follow(*class)?),
            IrType::Union(_) => self.union_names.get(&type_key(self.graph, ty)),
            IrType::Enum(_) => self.enum_names.get(&type_key(self.graph, ty)),
            _ => None,
        };
        found
            .map(String::as_str)
            .ok_or_else(|| RenderError::UnknownNamedType(type_key(self.graph, ty)))
    }

    pub fn top_level_name(&self, given: &str) -> Option<&str> {
        self.toplevel_names.get(given).map(String::as_str)
    }

    fn separated<T>(
        &mut self,
        blank: BlankPolicy,
        items: Vec<T>,
        mut f: impl FnMut(&mut Self, T) -> Result<(), RenderError>,
    ) -> Result<(), RenderError> {
        let count = items.len();
        for (index, item) in items.into_iter().enumerate() {
            match blank {
                BlankPolicy::BetweenAll => self.blank_line(),
                BlankPolicy::Interposing if index > 0 => self.blank_line(),
                _ => {}
            }
            f(self, item)?;
        }
        if blank == BlankPolicy::BetweenAll && count > 0 {
            self.blank_line();
        }
        Ok(())
    }

    pub fn emit_line(&mut self, line: impl AsRef<str>) {
        let mut out = String::new();
        for _ in 0..self.indent {
            out.push_str("    ");
        }
        out.push_str(line.as_ref());
        self.lines.push(out);

        let line = self.lines.len() - 1;
        for annotation in self.pending.drain(..) {
            self.annotations.push(SpanAnnotation {
                span: Span {
                    start_line: line,
                    end_line: line,
                },
                annotation,
            });
        }
    }

    pub fn blank_line(&mut self) {
        self.lines.push(String::new());
    }

    pub fn indented(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<(), RenderError>,
    ) -> Result<(), RenderError> {
        self.indent += 1;
        let result = f(self);
        self.indent -= 1;
        result
    }

    /// Attaches an issue annotation to the next emitted line.
    pub fn issue(&mut self, message: impl Into<String>) {
        self.pending.push(Annotation::Issue(message.into()));
    }

    /// Attaches a hover annotation to the next emitted line.
    pub fn hover(&mut self, text: impl Into<String>) {
        self.pending.push(Annotation::Hover(text.into()));
    }

    fn finish(mut self) -> SerializedRenderResult {
        // anything still pending lands on the last line
        if !self.pending.is_empty() {
            let line = self.lines.len().saturating_sub(1);
            for annotation in self.pending.drain(..) {
                self.annotations.push(SpanAnnotation {
                    span: Span {
                        start_line: line,
                        end_line: line,
                    },
                    annotation,
                });
            }
        }
        SerializedRenderResult {
            lines: self.lines,
            annotations: self.annotations,
        }
    }
}

/// A union is materialized as a named type when more than one kind remains
/// after setting null aside.
pub fn is_named_union(union: &UnionRep) -> bool {
    union.clone().remove_null().1.members().len() >= 2
}

fn type_key(graph: &IrGraph, ty: &IrType) -> String {
    format!("{}", graph.view(ty))
}

/// Walks the reachable graph and collects named unions and enums in
/// discovery order, merging the name sets of structurally identical
/// occurrences.
fn collect_named(
    graph: &IrGraph,
    classes: &[ClassId],
) -> Result<(Vec<UnionRep>, Vec<EnumData>), GraphError> {
    let mut unions: Vec<UnionRep> = vec![];
    let mut enums: Vec<EnumData> = vec![];
    let mut union_keys: BTreeMap<String, usize> = BTreeMap::new();
    let mut enum_keys: BTreeMap<String, usize> = BTreeMap::new();

    let mut roots: Vec<IrType> = graph.toplevels.values().cloned().collect();
    for &class in classes {
        roots.extend(graph.live(class)?.properties.values().cloned());
    }
    for ty in &roots {
        collect_from(
            graph,
            ty,
            &mut unions,
            &mut enums,
            &mut union_keys,
            &mut enum_keys,
        );
    }
    Ok((unions, enums))
}

fn collect_from(
    graph: &IrGraph,
    ty: &IrType,
    unions: &mut Vec<UnionRep>,
    enums: &mut Vec<EnumData>,
    union_keys: &mut BTreeMap<String, usize>,
    enum_keys: &mut BTreeMap<String, usize>,
) {
    match ty {
        IrType::Union(union) => {
            if is_named_union(union) {
                let key = type_key(graph, ty);
                match union_keys.get(&key) {
                    Some(&index) => {
                        let stored = &mut unions[index];
                        stored.names = std::mem::take(&mut stored.names).merge(union.names.clone());
                    }
                    None => {
                        union_keys.insert(key, unions.len());
                        unions.push((**union).clone());
                    }
                }
            }
            if let Some(inner) = union.array_slot() {
                collect_from(graph, inner, unions, enums, union_keys, enum_keys);
            }
            if let Some(inner) = union.map_slot() {
                collect_from(graph, inner, unions, enums, union_keys, enum_keys);
            }
            if let Some(data) = union.enum_slot() {
                collect_enum(graph, data, enums, enum_keys);
            }
        }
        IrType::Enum(data) => collect_enum(graph, data, enums, enum_keys),
        IrType::Array(inner) | IrType::Map(inner) => {
            collect_from(graph, inner, unions, enums, union_keys, enum_keys)
        }
        _ => {}
    }
}

fn collect_enum(
    graph: &IrGraph,
    data: &EnumData,
    enums: &mut Vec<EnumData>,
    enum_keys: &mut BTreeMap<String, usize>,
) {
    let key = type_key(graph, &IrType::Enum(data.clone()));
    match enum_keys.get(&key) {
        Some(&index) => {
            let stored = &mut enums[index];
            stored.names = std::mem::take(&mut stored.names).merge(data.names.clone());
        }
        None => {
            enum_keys.insert(key, enums.len());
            enums.push(data.clone());
        }
    }
}
