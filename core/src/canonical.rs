//! # Graph Canonicalization
//!
//! Runs once, after the last source was consumed, and freezes the graph for
//! naming and rendering:
//!
//! 1. collapse redirects so every class reference points at a live entry
//! 2. gather names: top-level labels become given names on their classes,
//!    property paths become inferred names on the classes, unions, and
//!    enums they reach (array and map element positions use the singular
//!    form of the property name)
//! 3. demote map-like classes (no given names, enough properties, value
//!    types that unify) into `Map`
//! 4. erase `NoInformation`: slots never unified away widen to `Any`
//!
//! The whole pass is idempotent: canonicalizing a canonical graph changes
//! nothing.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    graph::{ClassId, Entry, GraphError, IrGraph, IrType},
    infer::Unifier,
};

pub(crate) fn canonicalize(graph: &mut IrGraph, infer_maps: bool) -> Result<(), GraphError> {
    collapse_redirects(graph)?;
    gather_class_names(graph)?;
    demote_maps(graph, infer_maps)?;
    collapse_redirects(graph)?;
    gather_class_names(graph)?;
    gather_union_names(graph)?;
    erase_no_information(graph)?;
    Ok(())
}

/// Conservative ASCII depluralizer for array/map element names. Anything it
/// does not recognize passes through unchanged.
pub fn singular(name: &str) -> String {
    if !name.is_ascii() {
        return name.to_string();
    }
    if let Some(stem) = name.strip_suffix("ies")
        && !stem.is_empty()
    {
        return format!("{stem}y");
    }
    if let Some(stem) = name.strip_suffix("es")
        && (stem.ends_with(['s', 'x', 'z']) || stem.ends_with("ch") || stem.ends_with("sh"))
    {
        return stem.to_string();
    }
    if let Some(stem) = name.strip_suffix('s')
        && !stem.is_empty()
        && !stem.ends_with('s')
    {
        return stem.to_string();
    }
    name.to_string()
}

/// Rewrites every class reference to the live entry its redirect chain ends
/// at. Redirect entries themselves stay, so held ids remain valid.
fn collapse_redirects(graph: &mut IrGraph) -> Result<(), GraphError> {
    let resolve: Vec<ClassId> = (0..graph.class_count())
        .map(|id| graph.follow(id))
        .collect::<Result<_, _>>()?;

    let toplevels: Vec<(String, IrType)> = graph
        .toplevels
        .iter()
        .map(|(name, ty)| (name.clone(), ty.clone()))
        .collect();
    for (name, mut ty) in toplevels {
        rewrite_refs(&mut ty, &resolve);
        graph.toplevels.insert(name, ty);
    }

    for id in 0..graph.class_count() {
        if let Some(Entry::Live(data)) = graph.entry_mut(id) {
            for ty in data.properties.values_mut() {
                rewrite_refs(ty, &resolve);
            }
        }
    }
    Ok(())
}

fn rewrite_refs(ty: &mut IrType, resolve: &[ClassId]) {
    match ty {
        IrType::Class(id) => {
            if let Some(&live) = resolve.get(*id) {
                *id = live;
            }
        }
        IrType::Array(inner) | IrType::Map(inner) => rewrite_refs(inner, resolve),
        IrType::Union(union) => {
            if let Some(id) = &mut union.class
                && let Some(&live) = resolve.get(*id)
            {
                *id = live;
            }
            if let Some(inner) = &mut union.array {
                rewrite_refs(inner, resolve);
            }
            if let Some(inner) = &mut union.map {
                rewrite_refs(inner, resolve);
            }
        }
        _ => {}
    }
}

fn gather_class_names(graph: &mut IrGraph) -> Result<(), GraphError> {
    let toplevels: Vec<(String, IrType)> = graph
        .toplevels
        .iter()
        .map(|(name, ty)| (name.clone(), ty.clone()))
        .collect();
    for (name, ty) in &toplevels {
        match ty {
            // the top-level label is user-supplied
            IrType::Class(id) => graph.live_mut(*id)?.names.add_given(name.as_str()),
            other => class_names_from_slot(graph, name, other)?,
        }
    }

    for id in graph.reachable_classes()? {
        let properties: Vec<(String, IrType)> = graph
            .live(id)?
            .properties
            .iter()
            .map(|(name, ty)| (name.clone(), ty.clone()))
            .collect();
        for (property, ty) in properties {
            class_names_from_slot(graph, &property, &ty)?;
        }
    }
    Ok(())
}

fn class_names_from_slot(graph: &mut IrGraph, name: &str, ty: &IrType) -> Result<(), GraphError> {
    match ty {
        IrType::Class(id) => graph.live_mut(*id)?.names.add_inferred(name),
        IrType::Array(inner) | IrType::Map(inner) => {
            class_names_from_slot(graph, &singular(name), inner)?
        }
        IrType::Union(union) => {
            if let Some(id) = union.class {
                graph.live_mut(id)?.names.add_inferred(name);
            }
            if let Some(inner) = &union.array {
                class_names_from_slot(graph, &singular(name), inner)?;
            }
            if let Some(inner) = &union.map {
                class_names_from_slot(graph, &singular(name), inner)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn gather_union_names(graph: &mut IrGraph) -> Result<(), GraphError> {
    let toplevels: Vec<(String, IrType)> = graph
        .toplevels
        .iter()
        .map(|(name, ty)| (name.clone(), ty.clone()))
        .collect();
    for (name, mut ty) in toplevels {
        union_names_from_slot(&mut ty, &name, true);
        graph.toplevels.insert(name, ty);
    }

    for id in graph.reachable_classes()? {
        let properties: Vec<(String, IrType)> = graph
            .live(id)?
            .properties
            .iter()
            .map(|(name, ty)| (name.clone(), ty.clone()))
            .collect();
        for (property, mut ty) in properties {
            union_names_from_slot(&mut ty, &property, false);
            graph.live_mut(id)?.properties.insert(property, ty);
        }
    }
    Ok(())
}

fn union_names_from_slot(ty: &mut IrType, name: &str, given: bool) {
    let add = |names: &mut crate::graph::NameSet| match given {
        true => names.add_given(name),
        false => names.add_inferred(name),
    };
    match ty {
        IrType::Union(union) => {
            add(&mut union.names);
            if let Some(data) = &mut union.enum_ {
                add(&mut data.names);
            }
            if let Some(inner) = &mut union.array {
                union_names_from_slot(inner, &singular(name), false);
            }
            if let Some(inner) = &mut union.map {
                union_names_from_slot(inner, &singular(name), false);
            }
        }
        IrType::Enum(data) => add(&mut data.names),
        IrType::Array(inner) | IrType::Map(inner) => {
            union_names_from_slot(inner, &singular(name), false)
        }
        _ => {}
    }
}

/// Applies the map heuristic once: every reachable class with only inferred
/// names, at least the threshold of properties, and a common non-`Any`
/// property type becomes a `Map` of that type at every reference.
fn demote_maps(graph: &mut IrGraph, infer_maps: bool) -> Result<(), GraphError> {
    if !infer_maps {
        return Ok(());
    }

    let reachable = graph.reachable_classes()?;
    let mut demoted: BTreeMap<ClassId, IrType> = BTreeMap::new();
    {
        let mut unifier = Unifier::new(graph, infer_maps);
        for id in reachable {
            if unifier.map_candidate(id)? {
                let elem = unifier.common_property_type(id)?;
                if crate::infer::map_value_worthy(&elem) {
                    demoted.insert(id, elem);
                }
            }
        }
    }
    if demoted.is_empty() {
        return Ok(());
    }

    let mut unifier = Unifier::new(graph, infer_maps);

    let toplevels: Vec<(String, IrType)> = unifier
        .graph()
        .toplevels
        .iter()
        .map(|(name, ty)| (name.clone(), ty.clone()))
        .collect();
    for (name, mut ty) in toplevels {
        subst_demoted(&mut unifier, &mut ty, &demoted, &mut BTreeSet::new())?;
        unifier.graph().toplevels.insert(name, ty);
    }

    for id in 0..unifier.graph().class_count() {
        if demoted.contains_key(&id) {
            // the demoted entry stays in the arena, unreferenced
            continue;
        }
        let properties: Vec<(String, IrType)> = match unifier.graph().entry(id) {
            Some(Entry::Live(data)) => data
                .properties
                .iter()
                .map(|(name, ty)| (name.clone(), ty.clone()))
                .collect(),
            _ => continue,
        };
        for (property, mut ty) in properties {
            subst_demoted(&mut unifier, &mut ty, &demoted, &mut BTreeSet::new())?;
            if let Some(Entry::Live(data)) = unifier.graph().entry_mut(id) {
                data.properties.insert(property, ty);
            }
        }
    }
    Ok(())
}

fn subst_demoted(
    unifier: &mut Unifier<'_>,
    ty: &mut IrType,
    demoted: &BTreeMap<ClassId, IrType>,
    expanding: &mut BTreeSet<ClassId>,
) -> Result<(), GraphError> {
    match ty {
        IrType::Class(id) => {
            let id = *id;
            if let Some(elem) = demoted.get(&id) {
                if !expanding.insert(id) {
                    // self-referential map value; nothing finite to expand to
                    *ty = IrType::Any;
                    return Ok(());
                }
                let mut elem = elem.clone();
                subst_demoted(unifier, &mut elem, demoted, expanding)?;
                expanding.remove(&id);
                *ty = IrType::Map(Box::new(elem));
            }
        }
        IrType::Array(inner) | IrType::Map(inner) => {
            subst_demoted(unifier, inner, demoted, expanding)?
        }
        IrType::Union(union) => {
            if let Some(inner) = &mut union.array {
                subst_demoted(unifier, inner, demoted, expanding)?;
            }
            if let Some(inner) = &mut union.map {
                subst_demoted(unifier, inner, demoted, expanding)?;
            }
            if let Some(id) = union.class
                && let Some(elem) = demoted.get(&id)
            {
                union.class = None;
                let mut elem = elem.clone();
                subst_demoted(unifier, &mut elem, demoted, expanding)?;
                let merged = match union.map.take() {
                    Some(existing) => unifier.unify(*existing, elem)?,
                    None => elem,
                };
                union.map = Some(Box::new(merged));
            }
        }
        _ => {}
    }
    Ok(())
}

/// Slots that never saw data widen to the top type.
fn erase_no_information(graph: &mut IrGraph) -> Result<(), GraphError> {
    let toplevels: Vec<(String, IrType)> = graph
        .toplevels
        .iter()
        .map(|(name, ty)| (name.clone(), ty.clone()))
        .collect();
    for (name, mut ty) in toplevels {
        erase(&mut ty);
        graph.toplevels.insert(name, ty);
    }

    for id in graph.reachable_classes()? {
        let properties: Vec<(String, IrType)> = graph
            .live(id)?
            .properties
            .iter()
            .map(|(name, ty)| (name.clone(), ty.clone()))
            .collect();
        for (property, mut ty) in properties {
            erase(&mut ty);
            graph.live_mut(id)?.properties.insert(property, ty);
        }
    }
    Ok(())
}

fn erase(ty: &mut IrType) {
    match ty {
        IrType::NoInformation => *ty = IrType::Any,
        IrType::Array(inner) | IrType::Map(inner) => erase(inner),
        IrType::Union(union) => {
            if let Some(inner) = &mut union.array {
                erase(inner);
            }
            if let Some(inner) = &mut union.map {
                erase(inner);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn singular_forms() {
        assert_eq!(singular("entries"), "entry");
        assert_eq!(singular("boxes"), "box");
        assert_eq!(singular("classes"), "class");
        assert_eq!(singular("branches"), "branch");
        assert_eq!(singular("xs"), "x");
        assert_eq!(singular("items"), "item");
        assert_eq!(singular("address"), "address");
        assert_eq!(singular("s"), "s");
        assert_eq!(singular("données"), "données");
    }
}
