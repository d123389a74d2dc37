//! # IR Graph
//!
//! The data model every other layer consumes: a closed family of IR types, a
//! class arena, and the set of named top-level entry points.
//!
//! ## Core Data Structures
//!
//! ### [`IrType`]
//!
//! - Primitives: `Null`, `Integer`, `Double`, `Bool`, `String`
//! - Placeholders: `NoInformation` (an empty slot, e.g. the element type of
//!   `[]`), `Any` (the top type, produced by conservative degradation)
//! - Containers: `Array`, `Map` (string-keyed, homogeneous values)
//! - Named shapes: `Class` (an arena index), `Enum`, `Union`
//!
//! ### [`IrGraph`]
//!
//! Classes live in a contiguous arena of [`Entry`] slots and reference each
//! other by [`ClassId`], which is the only cycle carrier in the whole IR.
//! When two classes are unified, one entry becomes a [`Entry::Redirect`]
//! pointing at the survivor; indices held by callers stay valid and are
//! resolved through [`IrGraph::follow`]. Entries are never deleted.
//!
//! Top levels are an insertion-ordered map from user-supplied names to the
//! type inferred (or translated) for that entry point.
//!
//! ### [`Named`]
//!
//! Name sets remember their origin: `Given` names come from the user, a
//! schema `title`, or a top-level label; `Inferred` names come from the
//! property path under which a type was discovered. `Given` dominates
//! `Inferred` when sets merge.
//!
//! ## Canonical display
//!
//! [`IrGraph::view`] renders a type as a compact canonical string
//! (`{a:int,b:[str]}`, `int?`, `|int|str|`, `{*:double}`, `enum(a|b)`), with
//! `#id` marking a class revisited on the current path. Tests across the
//! workspace compare these strings.

use std::{
    collections::{BTreeSet, VecDeque},
    fmt::{self, Display},
};

use indexmap::IndexMap;
use thiserror::Error;

use crate::union::UnionRep;

/// Class identifier: an index into the graph's arena.
pub type ClassId = usize;

/// The closed family of IR types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrType {
    NoInformation,
    Any,
    Null,
    Integer,
    Double,
    Bool,
    String,
    Array(Box<IrType>),
    Class(ClassId),
    Map(Box<IrType>),
    Enum(EnumData),
    Union(Box<UnionRep>),
}

/// Name origin marker. `Given` dominates `Inferred` on merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Named<T> {
    Given(T),
    Inferred(T),
}

impl<T: Default> Default for Named<T> {
    fn default() -> Self {
        Named::Inferred(T::default())
    }
}

impl<T> Named<T> {
    pub fn get(&self) -> &T {
        match self {
            Named::Given(t) | Named::Inferred(t) => t,
        }
    }

    pub fn is_given(&self) -> bool {
        matches!(self, Named::Given(_))
    }
}

/// The name set carried by classes, enums, and unions.
pub type NameSet = Named<BTreeSet<String>>;

impl Named<BTreeSet<String>> {
    pub fn given(name: impl Into<String>) -> Self {
        Named::Given(BTreeSet::from([name.into()]))
    }

    pub fn inferred(name: impl Into<String>) -> Self {
        Named::Inferred(BTreeSet::from([name.into()]))
    }

    /// A given name upgrades an inferred set, discarding it.
    pub fn add_given(&mut self, name: impl Into<String>) {
        match self {
            Named::Given(set) => {
                set.insert(name.into());
            }
            Named::Inferred(_) => *self = Named::Given(BTreeSet::from([name.into()])),
        }
    }

    /// Inferred names never land on a set that is already given.
    pub fn add_inferred(&mut self, name: impl Into<String>) {
        if let Named::Inferred(set) = self {
            set.insert(name.into());
        }
    }

    pub fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Named::Given(mut a), Named::Given(b)) => {
                a.extend(b);
                Named::Given(a)
            }
            (Named::Given(a), Named::Inferred(_)) | (Named::Inferred(_), Named::Given(a)) => {
                Named::Given(a)
            }
            (Named::Inferred(mut a), Named::Inferred(b)) => {
                a.extend(b);
                Named::Inferred(a)
            }
        }
    }

    /// Deterministic representative: the first name in set order.
    pub fn preferred(&self) -> Option<&str> {
        self.get().iter().next().map(String::as_str)
    }
}

/// A class: its accumulated names and an insertion-ordered property map.
///
/// Property order is the order of the first sample (or schema) that
/// contributed each property; unification preserves it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClassData {
    pub names: NameSet,
    pub properties: IndexMap<String, IrType>,
}

impl ClassData {
    pub fn new(names: NameSet) -> Self {
        Self {
            names,
            properties: IndexMap::new(),
        }
    }

    pub fn property_names(&self) -> BTreeSet<&str> {
        self.properties.keys().map(String::as_str).collect()
    }
}

/// A closed set of string values.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnumData {
    pub names: NameSet,
    pub values: BTreeSet<String>,
}

/// One arena slot. `Empty` entries are reserved ids a translator has not
/// filled yet; `Redirect` forwards to the class this one was unified into.
#[derive(Debug, Clone)]
pub enum Entry {
    Empty,
    Live(ClassData),
    Redirect(ClassId),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("class {0} is out of bounds for an arena of {1} entries")]
    OutOfBounds(ClassId, usize),
    #[error("class {0} resolves to an empty arena entry")]
    EmptyEntry(ClassId),
    #[error("redirect chain starting at class {0} does not terminate")]
    BrokenRedirect(ClassId),
}

/// Class arena + ordered top levels.
#[derive(Debug, Clone, Default)]
pub struct IrGraph {
    classes: Vec<Entry>,
    pub toplevels: IndexMap<String, IrType>,
}

impl IrGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn entry(&self, id: ClassId) -> Option<&Entry> {
        self.classes.get(id)
    }

    pub(crate) fn entry_mut(&mut self, id: ClassId) -> Option<&mut Entry> {
        self.classes.get_mut(id)
    }

    pub fn add_class(&mut self, data: ClassData) -> ClassId {
        self.classes.push(Entry::Live(data));
        self.classes.len() - 1
    }

    /// Reserves an id before its data exists, so self-references written
    /// during translation already point at the right slot.
    pub fn reserve_class(&mut self) -> ClassId {
        self.classes.push(Entry::Empty);
        self.classes.len() - 1
    }

    pub fn fill_class(&mut self, id: ClassId, data: ClassData) {
        debug_assert!(matches!(self.classes.get(id), Some(Entry::Empty)));
        self.classes[id] = Entry::Live(data);
    }

    /// Walks redirects to the entry they terminate at. The walk is bounded
    /// by the arena size; exceeding it means a redirect cycle.
    pub fn follow(&self, id: ClassId) -> Result<ClassId, GraphError> {
        let mut at = id;
        for _ in 0..=self.classes.len() {
            match self.classes.get(at) {
                None => return Err(GraphError::OutOfBounds(at, self.classes.len())),
                Some(Entry::Redirect(next)) => at = *next,
                Some(_) => return Ok(at),
            }
        }
        Err(GraphError::BrokenRedirect(id))
    }

    pub fn live(&self, id: ClassId) -> Result<&ClassData, GraphError> {
        let at = self.follow(id)?;
        match &self.classes[at] {
            Entry::Live(data) => Ok(data),
            _ => Err(GraphError::EmptyEntry(at)),
        }
    }

    pub fn live_mut(&mut self, id: ClassId) -> Result<&mut ClassData, GraphError> {
        let at = self.follow(id)?;
        match &mut self.classes[at] {
            Entry::Live(data) => Ok(data),
            _ => Err(GraphError::EmptyEntry(at)),
        }
    }

    /// Replaces `from` with a redirect to `to` and hands back its data.
    pub fn redirect_into(&mut self, from: ClassId, to: ClassId) -> Result<ClassData, GraphError> {
        let from = self.follow(from)?;
        match std::mem::replace(&mut self.classes[from], Entry::Redirect(to)) {
            Entry::Live(data) => Ok(data),
            other => {
                self.classes[from] = other;
                Err(GraphError::EmptyEntry(from))
            }
        }
    }

    pub fn add_toplevel(&mut self, name: impl Into<String>, ty: IrType) {
        self.toplevels.insert(name.into(), ty);
    }

    /// Classes reachable from the top levels, in first-visit order. The
    /// order is deterministic: top levels in insertion order, properties in
    /// insertion order.
    pub fn reachable_classes(&self) -> Result<Vec<ClassId>, GraphError> {
        let mut order = vec![];
        let mut seen = BTreeSet::new();
        let mut frontier = VecDeque::new();

        for ty in self.toplevels.values() {
            collect_class_refs(ty, &mut frontier);
        }

        while let Some(id) = frontier.pop_front() {
            let id = self.follow(id)?;
            if seen.insert(id) {
                order.push(id);
                for ty in self.live(id)?.properties.values() {
                    collect_class_refs(ty, &mut frontier);
                }
            }
        }

        Ok(order)
    }

    pub fn view<'g>(&'g self, ty: &'g IrType) -> TypeView<'g> {
        TypeView { graph: self, ty }
    }
}

fn collect_class_refs(ty: &IrType, out: &mut VecDeque<ClassId>) {
    match ty {
        IrType::Class(id) => out.push_back(*id),
        IrType::Array(inner) | IrType::Map(inner) => collect_class_refs(inner, out),
        IrType::Union(union) => {
            if let Some(id) = union.class_slot() {
                out.push_back(id);
            }
            if let Some(inner) = union.array_slot() {
                collect_class_refs(inner, out);
            }
            if let Some(inner) = union.map_slot() {
                collect_class_refs(inner, out);
            }
        }
        _ => { /* no class refs */ }
    }
}

/// Canonical display of a type within its graph.
pub struct TypeView<'g> {
    graph: &'g IrGraph,
    ty: &'g IrType,
}

impl Display for TypeView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut on_path = BTreeSet::new();
        fmt_type(self.graph, f, self.ty, &mut on_path)
    }
}

fn fmt_type(
    graph: &IrGraph,
    f: &mut fmt::Formatter<'_>,
    ty: &IrType,
    on_path: &mut BTreeSet<ClassId>,
) -> fmt::Result {
    match ty {
        IrType::NoInformation => write!(f, "unknown"),
        IrType::Any => write!(f, "any"),
        IrType::Null => write!(f, "null"),
        IrType::Integer => write!(f, "int"),
        IrType::Double => write!(f, "double"),
        IrType::Bool => write!(f, "bool"),
        IrType::String => write!(f, "str"),
        IrType::Array(inner) => {
            write!(f, "[")?;
            fmt_type(graph, f, inner, on_path)?;
            write!(f, "]")
        }
        IrType::Map(inner) => {
            write!(f, "{{*:")?;
            fmt_type(graph, f, inner, on_path)?;
            write!(f, "}}")
        }
        IrType::Enum(data) => {
            write!(f, "enum(")?;
            let mut first = true;
            for value in &data.values {
                if !first {
                    write!(f, "|")?;
                }
                first = false;
                write!(f, "{value}")?;
            }
            write!(f, ")")
        }
        IrType::Class(id) => {
            let id = match graph.follow(*id) {
                Ok(id) => id,
                Err(_) => return write!(f, "#{id}"),
            };
            if on_path.contains(&id) {
                return write!(f, "#{id}");
            }
            let Ok(data) = graph.live(id) else {
                return write!(f, "#{id}");
            };
            on_path.insert(id);
            write!(f, "{{")?;
            let mut first = true;
            for (name, ty) in &data.properties {
                if !first {
                    write!(f, ",")?;
                }
                first = false;
                write!(f, "{name}:")?;
                fmt_type(graph, f, ty, on_path)?;
            }
            write!(f, "}}")?;
            // only cycles on the current path count; siblings may revisit
            on_path.remove(&id);
            Ok(())
        }
        IrType::Union(union) => {
            if let Some(inner) = union.nullable() {
                fmt_type(graph, f, &inner, on_path)?;
                return write!(f, "?");
            }
            for member in union.members() {
                write!(f, "|")?;
                fmt_type(graph, f, &member, on_path)?;
            }
            write!(f, "|")
        }
    }
}

impl Display for IrGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, ty) in &self.toplevels {
            if !first {
                write!(f, ";")?;
            }
            first = false;
            write!(f, "{name}:{}", self.view(ty))?;
        }
        Ok(())
    }
}
