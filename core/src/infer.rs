//! # Inference and Unification
//!
//! Turns JSON samples into IR types and merges types observed in different
//! places into one.
//!
//! ## Type Merging Semantics
//!
//! - **T ⊔ T → T**: identical types return themselves
//! - **NoInformation ⊔ T → T**: no information adopts any concrete type
//! - **Any ⊔ T → Any**: the top type absorbs everything
//! - **Integer ⊔ Double**: a union with both numeric bits, emitted as double
//! - **Array ⊔ Array / Map ⊔ Map**: element types unify recursively
//! - **Class ⊔ Class**: class data merges in the arena; the losing id
//!   becomes a redirect to the survivor
//! - **Class ⊔ Map**: the class is demoted into the map when the map
//!   heuristic permits; otherwise both kinds occupy one union
//! - anything else: both sides land in a [`UnionRep`]
//!
//! Class merging takes the union of the property names. A property present
//! on one side only becomes optional (unified with `Null`); shared
//! properties unify pointwise; property order stays the order of the first
//! contributor. Merging can recurse through properties into further class
//! merges, so an in-progress table keyed by unordered id pairs short-circuits
//! re-entry on mutually recursive shapes.
//!
//! [`Inference`] is the session: it owns the arena, accepts named samples
//! and schema documents, and finalizes into a canonical [`IrGraph`].

use serde_json::Value;
use std::collections::BTreeMap;

use crate::{
    canonical::{self, singular},
    graph::{ClassData, ClassId, Entry, EnumData, GraphError, IrGraph, IrType, NameSet},
    graphql,
    schema::{self, Diagnostic},
    union::{Primitive, UnionRep},
};

/// A class with at least this many properties may be demoted to a map.
pub(crate) const MAP_THRESHOLD: usize = 2;

/// Merges IR types, mutating the arena when classes are involved.
pub struct Unifier<'g> {
    graph: &'g mut IrGraph,
    infer_maps: bool,
    active: BTreeMap<(ClassId, ClassId), ClassId>,
}

impl<'g> Unifier<'g> {
    pub fn new(graph: &'g mut IrGraph, infer_maps: bool) -> Self {
        Self {
            graph,
            infer_maps,
            active: BTreeMap::new(),
        }
    }

    pub fn unify(&mut self, a: IrType, b: IrType) -> Result<IrType, GraphError> {
        Ok(match (a, b) {
            (IrType::NoInformation, t) | (t, IrType::NoInformation) => t,
            (IrType::Any, _) | (_, IrType::Any) => IrType::Any,

            (IrType::Null, IrType::Null) => IrType::Null,
            (IrType::Integer, IrType::Integer) => IrType::Integer,
            (IrType::Double, IrType::Double) => IrType::Double,
            (IrType::Bool, IrType::Bool) => IrType::Bool,
            (IrType::String, IrType::String) => IrType::String,

            (IrType::Array(x), IrType::Array(y)) => {
                IrType::Array(Box::new(self.unify(*x, *y)?))
            }
            (IrType::Map(x), IrType::Map(y)) => IrType::Map(Box::new(self.unify(*x, *y)?)),
            (IrType::Class(i), IrType::Class(j)) => IrType::Class(self.unify_classes(i, j)?),
            (IrType::Class(i), IrType::Map(t)) | (IrType::Map(t), IrType::Class(i)) => {
                self.unify_class_with_map(i, *t)?
            }
            (IrType::Enum(x), IrType::Enum(y)) => IrType::Enum(merge_enums(x, y)),

            (IrType::Union(x), IrType::Union(y)) => self.unify_unions(*x, *y)?.into_type(),
            (IrType::Union(u), t) | (t, IrType::Union(u)) => {
                self.unify_unions(*u, UnionRep::of(t))?.into_type()
            }

            // two different non-union kinds
            (a, b) => self.unify_unions(UnionRep::of(a), UnionRep::of(b))?.into_type(),
        })
    }

    /// Pointwise union of two packed unions: bits OR'd, each compound slot
    /// merged by the rules of its element type.
    fn unify_unions(&mut self, a: UnionRep, b: UnionRep) -> Result<UnionRep, GraphError> {
        let mut out = UnionRep::empty();
        out.names = a.names.merge(b.names);
        out.primitives = a.primitives | b.primitives;
        out.array = match (a.array, b.array) {
            (Some(x), Some(y)) => Some(Box::new(self.unify(*x, *y)?)),
            (x, y) => x.or(y),
        };
        out.class = match (a.class, b.class) {
            (Some(i), Some(j)) => Some(self.unify_classes(i, j)?),
            (x, y) => x.or(y),
        };
        out.map = match (a.map, b.map) {
            (Some(x), Some(y)) => Some(Box::new(self.unify(*x, *y)?)),
            (x, y) => x.or(y),
        };
        out.enum_ = match (a.enum_, b.enum_) {
            (Some(x), Some(y)) => Some(merge_enums(x, y)),
            (x, y) => x.or(y),
        };
        Ok(out)
    }

    /// Merges class `j` into class `i` and redirects `j`. Recursive shapes
    /// re-enter through property merges; the active table hands back the
    /// already-chosen survivor instead of recursing forever.
    pub fn unify_classes(&mut self, i: ClassId, j: ClassId) -> Result<ClassId, GraphError> {
        let i = self.graph.follow(i)?;
        let j = self.graph.follow(j)?;
        if i == j {
            return Ok(i);
        }

        let key = (i.min(j), i.max(j));
        if let Some(&target) = self.active.get(&key) {
            return Ok(target);
        }
        self.active.insert(key, i);

        // redirect first, so self-references inside the donor already land
        // on the survivor while properties merge
        let donor = self.graph.redirect_into(j, i)?;
        let donor_keys: Vec<String> = donor.properties.keys().cloned().collect();

        {
            let live = self.graph.live_mut(i)?;
            live.names = std::mem::take(&mut live.names).merge(donor.names);
        }

        for (name, donor_ty) in donor.properties {
            let existing = self.graph.live(i)?.properties.get(&name).cloned();
            let merged = match existing {
                Some(survivor_ty) => self.unify(survivor_ty, donor_ty)?,
                // present only on the donor side: optional
                None => self.unify(donor_ty, IrType::Null)?,
            };
            self.graph.live_mut(i)?.properties.insert(name, merged);
        }

        // properties only the survivor had become optional too
        let survivor_only: Vec<String> = self
            .graph
            .live(i)?
            .properties
            .keys()
            .filter(|key| !donor_keys.contains(*key))
            .cloned()
            .collect();
        for name in survivor_only {
            if let Some(ty) = self.graph.live(i)?.properties.get(&name).cloned() {
                let merged = self.unify(ty, IrType::Null)?;
                self.graph.live_mut(i)?.properties.insert(name, merged);
            }
        }

        self.active.remove(&key);
        Ok(i)
    }

    fn unify_class_with_map(&mut self, id: ClassId, elem: IrType) -> Result<IrType, GraphError> {
        let id = self.graph.follow(id)?;
        if self.map_candidate(id)? {
            let common = self.common_property_type(id)?;
            if map_value_worthy(&common) {
                let elem = self.unify(common, elem)?;
                return Ok(IrType::Map(Box::new(elem)));
            }
        }
        let mut union = UnionRep::empty();
        union.class = Some(id);
        union.map = Some(Box::new(elem));
        Ok(union.into_type())
    }

    /// Map heuristic: map inference on, no given names, enough properties,
    /// and no property already widened to `Any`.
    pub(crate) fn map_candidate(&self, id: ClassId) -> Result<bool, GraphError> {
        if !self.infer_maps {
            return Ok(false);
        }
        let data = self.graph.live(id)?;
        Ok(!data.names.is_given()
            && data.properties.len() >= MAP_THRESHOLD
            && !data.properties.values().any(|ty| matches!(ty, IrType::Any)))
    }

    /// Folds all property types of a class into one. Only called on map
    /// candidates, where the fold's class merges are the map's value type.
    /// Nulls introduced by property absence do not make the value type
    /// nullable.
    pub(crate) fn common_property_type(&mut self, id: ClassId) -> Result<IrType, GraphError> {
        let types: Vec<IrType> = self.graph.live(id)?.properties.values().cloned().collect();
        let mut common = IrType::NoInformation;
        for ty in types {
            let ty = match ty {
                IrType::Union(union) => union.remove_null().1.into_type(),
                other => other,
            };
            common = self.unify(common, ty)?;
        }
        Ok(common)
    }

    pub(crate) fn graph(&mut self) -> &mut IrGraph {
        self.graph
    }

    /// Adds a class to the arena, unifying it into an existing live class
    /// with the same property-name set. Given-named classes keep their
    /// identity.
    pub fn intern_class(&mut self, data: ClassData) -> Result<ClassId, GraphError> {
        let mut target = None;
        if !data.names.is_given() {
            for id in 0..self.graph.class_count() {
                if let Some(Entry::Live(existing)) = self.graph.entry(id)
                    && !existing.names.is_given()
                    && existing.property_names() == data.property_names()
                {
                    target = Some(id);
                    break;
                }
            }
        }
        let fresh = self.graph.add_class(data);
        match target {
            Some(existing) => self.unify_classes(existing, fresh),
            None => Ok(fresh),
        }
    }
}

/// A folded property type makes a usable map value only when it is a single
/// kind. A union of incompatible kinds means the properties never agreed on
/// one type, so the class keeps its shape.
pub(crate) fn map_value_worthy(ty: &IrType) -> bool {
    match ty {
        IrType::Any => false,
        IrType::Union(union) => union.members().len() < 2,
        _ => true,
    }
}

fn merge_enums(a: EnumData, b: EnumData) -> EnumData {
    let mut values = a.values;
    values.extend(b.values);
    EnumData {
        names: a.names.merge(b.names),
        values,
    }
}

/// Infers the IR type of one JSON value. `name` is the property (or top
/// level) under which the value was found; array elements use its singular
/// form.
fn infer_value(unifier: &mut Unifier<'_>, value: &Value, name: &str) -> Result<IrType, GraphError> {
    Ok(match value {
        Value::Null => {
            let mut union = UnionRep::empty();
            union.insert_primitive(Primitive::Null);
            union.into_type()
        }
        Value::Bool(_) => IrType::Bool,
        Value::Number(n) => match n.is_i64() || n.is_u64() {
            true => IrType::Integer,
            false => IrType::Double,
        },
        Value::String(_) => IrType::String,
        Value::Array(items) => {
            let elem_name = singular(name);
            let mut elem = IrType::NoInformation;
            for item in items {
                let ty = infer_value(unifier, item, &elem_name)?;
                elem = unifier.unify(elem, ty)?;
            }
            IrType::Array(Box::new(elem))
        }
        Value::Object(object) => {
            let mut data = ClassData::new(NameSet::inferred(name));
            for (key, value) in object {
                let ty = infer_value(unifier, value, key)?;
                data.properties.insert(key.clone(), ty);
            }
            IrType::Class(unifier.intern_class(data)?)
        }
    })
}

/// One inference session: build the arena from any number of named sources,
/// then finalize into a canonical graph.
pub struct Inference {
    graph: IrGraph,
    infer_maps: bool,
    diagnostics: Vec<Diagnostic>,
}

impl Inference {
    pub fn new(infer_maps: bool) -> Self {
        Self {
            graph: IrGraph::new(),
            infer_maps,
            diagnostics: vec![],
        }
    }

    pub fn graph(&self) -> &IrGraph {
        &self.graph
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Adds a JSON sample. A sample for an already-known top level unifies
    /// with what was inferred so far.
    pub fn add_sample(&mut self, name: &str, sample: &Value) -> Result<(), GraphError> {
        let previous = self.graph.toplevels.get(name).cloned();
        let mut unifier = Unifier::new(&mut self.graph, self.infer_maps);
        let ty = infer_value(&mut unifier, sample, name)?;
        let ty = match previous {
            Some(prev) => unifier.unify(prev, ty)?,
            None => ty,
        };
        self.graph.toplevels.insert(name.to_string(), ty);
        Ok(())
    }

    /// Adds a JSON Schema document for a top level.
    pub fn add_schema(&mut self, name: &str, document: &Value) -> Result<(), GraphError> {
        let (ty, diagnostics) = schema::translate(&mut self.graph, document)?;
        self.diagnostics.extend(diagnostics);
        self.insert_toplevel(name, ty)
    }

    /// Adds a GraphQL introspection result for a top level.
    pub fn add_graphql(&mut self, name: &str, document: &Value) -> Result<(), GraphError> {
        let (ty, diagnostics) = graphql::translate(&mut self.graph, document)?;
        self.diagnostics.extend(diagnostics);
        self.insert_toplevel(name, ty)
    }

    fn insert_toplevel(&mut self, name: &str, ty: IrType) -> Result<(), GraphError> {
        let previous = self.graph.toplevels.get(name).cloned();
        let ty = match previous {
            Some(prev) => {
                let mut unifier = Unifier::new(&mut self.graph, self.infer_maps);
                unifier.unify(prev, ty)?
            }
            None => ty,
        };
        self.graph.toplevels.insert(name.to_string(), ty);
        Ok(())
    }

    /// Canonicalizes and hands the graph over, frozen for naming and
    /// rendering.
    pub fn finish(mut self) -> Result<(IrGraph, Vec<Diagnostic>), GraphError> {
        canonical::canonicalize(&mut self.graph, self.infer_maps)?;
        Ok((self.graph, self.diagnostics))
    }
}
