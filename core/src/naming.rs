//! # Naming Framework
//!
//! Turns raw (given or inferred) names into unique, style-conformant
//! identifiers.
//!
//! A [`Namespaces`] value is a forest of namespaces. Each namespace is
//! seeded with forbidden spellings (the target language's keywords) and
//! inherits everything forbidden in its ancestors, including the spellings
//! already assigned there. Names come in three forms:
//!
//! - [`Name::Fixed`]: a literal final spelling
//! - [`Name::Simple`]: a raw name to be styled by a [`Namer`], avoiding
//!   collisions
//! - [`Name::Dependent`]: assembled from other resolved names
//!
//! A [`Namer`] styles a raw name and, on collision, retries with each of its
//! prefixes and finally with a numeric suffix starting at 2.
//!
//! Resolution is one fixed-point pass: fixed names first, then any name
//! whose dependencies are resolved, until nothing is left. Failure to
//! converge is a bug in the declarations and comes back as a typed error.

use std::collections::BTreeSet;

use thiserror::Error;
use typewright_iota::Iota;

pub type NamespaceId = usize;
pub type NameId = usize;
pub type NamerId = usize;

/// Styles raw names and resolves collisions.
pub struct Namer {
    style: Box<dyn Fn(&str) -> String>,
    prefixes: Vec<String>,
}

impl Namer {
    pub fn new(style: impl Fn(&str) -> String + 'static) -> Self {
        Self {
            style: Box::new(style),
            prefixes: vec![],
        }
    }

    pub fn with_prefixes<S: Into<String>>(
        mut self,
        prefixes: impl IntoIterator<Item = S>,
    ) -> Self {
        self.prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn style(&self, raw: &str) -> String {
        (self.style)(raw)
    }

    /// A unique spelling: the styled raw name, then each prefix, then a
    /// numeric suffix.
    pub fn assign(&self, raw: &str, forbidden: &BTreeSet<String>) -> String {
        let styled = (self.style)(raw);
        if !forbidden.contains(&styled) {
            return styled;
        }
        for prefix in &self.prefixes {
            let candidate = (self.style)(&format!("{prefix} {raw}"));
            if !forbidden.contains(&candidate) {
                return candidate;
            }
        }
        suffixed(&styled, forbidden)
    }
}

fn suffixed(base: &str, forbidden: &BTreeSet<String>) -> String {
    let mut iota = Iota::starting_at(2);
    loop {
        let candidate = format!("{base}{}", iota.next());
        if !forbidden.contains(&candidate) {
            return candidate;
        }
    }
}

pub enum Name {
    Fixed(String),
    Simple {
        raw: String,
        namer: NamerId,
    },
    Dependent {
        parts: Vec<NameId>,
        assemble: Box<dyn Fn(&[&str]) -> String>,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NamingError {
    #[error("fixed name `{0}` collides within its namespace")]
    FixedCollision(String),
    #[error("name resolution did not converge; {0} names left unassigned")]
    Unresolved(usize),
    #[error("name {0} was read before resolution")]
    NotResolved(NameId),
    #[error("unknown namer {0}")]
    UnknownNamer(NamerId),
}

struct NamespaceNode {
    parent: Option<NamespaceId>,
    keywords: BTreeSet<String>,
}

struct NameSlot {
    namespace: NamespaceId,
    name: Name,
    resolved: Option<String>,
}

/// The namespace forest and every name declared in it.
#[derive(Default)]
pub struct Namespaces {
    namespaces: Vec<NamespaceNode>,
    names: Vec<NameSlot>,
    namers: Vec<Namer>,
}

impl Namespaces {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_namespace<S: Into<String>>(
        &mut self,
        parent: Option<NamespaceId>,
        keywords: impl IntoIterator<Item = S>,
    ) -> NamespaceId {
        self.namespaces.push(NamespaceNode {
            parent,
            keywords: keywords.into_iter().map(Into::into).collect(),
        });
        self.namespaces.len() - 1
    }

    pub fn add_namer(&mut self, namer: Namer) -> NamerId {
        self.namers.push(namer);
        self.namers.len() - 1
    }

    pub fn add_fixed(&mut self, namespace: NamespaceId, spelling: impl Into<String>) -> NameId {
        self.add(namespace, Name::Fixed(spelling.into()))
    }

    pub fn add_simple(&mut self, namespace: NamespaceId, raw: &str, namer: NamerId) -> NameId {
        self.add(
            namespace,
            Name::Simple {
                raw: raw.to_string(),
                namer,
            },
        )
    }

    pub fn add_dependent(
        &mut self,
        namespace: NamespaceId,
        parts: Vec<NameId>,
        assemble: impl Fn(&[&str]) -> String + 'static,
    ) -> NameId {
        self.add(
            namespace,
            Name::Dependent {
                parts,
                assemble: Box::new(assemble),
            },
        )
    }

    fn add(&mut self, namespace: NamespaceId, name: Name) -> NameId {
        self.names.push(NameSlot {
            namespace,
            name,
            resolved: None,
        });
        self.names.len() - 1
    }

    /// Fixed-point assignment of every declared name.
    pub fn resolve(&mut self) -> Result<(), NamingError> {
        // literal spellings are fixed points; they only need checking
        for index in 0..self.names.len() {
            if let Name::Fixed(spelling) = &self.names[index].name {
                let forbidden = self.forbidden_for(self.names[index].namespace);
                if forbidden.contains(spelling) {
                    return Err(NamingError::FixedCollision(spelling.clone()));
                }
                let spelling = spelling.clone();
                self.names[index].resolved = Some(spelling);
            }
        }

        loop {
            let unresolved = self.names.iter().filter(|n| n.resolved.is_none()).count();
            if unresolved == 0 {
                return Ok(());
            }

            let mut progress = false;
            for index in 0..self.names.len() {
                if self.names[index].resolved.is_some() {
                    continue;
                }
                let spelling = {
                    let slot = &self.names[index];
                    match &slot.name {
                        Name::Fixed(_) => continue,
                        Name::Simple { raw, namer } => {
                            let namer = self
                                .namers
                                .get(*namer)
                                .ok_or(NamingError::UnknownNamer(*namer))?;
                            let forbidden = self.forbidden_for(slot.namespace);
                            namer.assign(raw, &forbidden)
                        }
                        Name::Dependent { parts, assemble } => {
                            let resolved: Option<Vec<&str>> = parts
                                .iter()
                                .map(|part| {
                                    self.names.get(*part).and_then(|p| p.resolved.as_deref())
                                })
                                .collect();
                            // not ready yet; try again next round
                            let Some(resolved) = resolved else { continue };
                            let assembled = assemble(&resolved);
                            let forbidden = self.forbidden_for(slot.namespace);
                            match forbidden.contains(&assembled) {
                                true => suffixed(&assembled, &forbidden),
                                false => assembled,
                            }
                        }
                    }
                };
                self.names[index].resolved = Some(spelling);
                progress = true;
            }

            if !progress {
                return Err(NamingError::Unresolved(unresolved));
            }
        }
    }

    pub fn spelling(&self, name: NameId) -> Result<&str, NamingError> {
        self.names
            .get(name)
            .and_then(|slot| slot.resolved.as_deref())
            .ok_or(NamingError::NotResolved(name))
    }

    /// Keywords and assigned spellings of a namespace and all ancestors.
    fn forbidden_for(&self, namespace: NamespaceId) -> BTreeSet<String> {
        let mut chain = BTreeSet::new();
        let mut at = Some(namespace);
        while let Some(id) = at {
            chain.insert(id);
            at = self.namespaces.get(id).and_then(|node| node.parent);
        }

        let mut forbidden = BTreeSet::new();
        for &id in &chain {
            if let Some(node) = self.namespaces.get(id) {
                forbidden.extend(node.keywords.iter().cloned());
            }
        }
        for slot in &self.names {
            if chain.contains(&slot.namespace)
                && let Some(spelling) = &slot.resolved
            {
                forbidden.insert(spelling.clone());
            }
        }
        forbidden
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pascal_ish(raw: &str) -> String {
        raw.split([' ', '_', '-'])
            .filter(|word| !word.is_empty())
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect()
    }

    #[test]
    fn collisions_try_prefixes_then_suffixes() {
        let namer = Namer::new(pascal_ish).with_prefixes(["the"]);
        let mut forbidden = BTreeSet::new();

        assert_eq!(namer.assign("item", &forbidden), "Item");
        forbidden.insert("Item".into());
        assert_eq!(namer.assign("item", &forbidden), "TheItem");
        forbidden.insert("TheItem".into());
        assert_eq!(namer.assign("item", &forbidden), "Item2");
        forbidden.insert("Item2".into());
        assert_eq!(namer.assign("item", &forbidden), "Item3");
    }

    #[test]
    fn namespace_keywords_are_forbidden() {
        let mut namespaces = Namespaces::new();
        let root = namespaces.add_namespace(None, ["Class"]);
        let namer = namespaces.add_namer(Namer::new(pascal_ish));

        let class = namespaces.add_simple(root, "class", namer);
        let other = namespaces.add_simple(root, "class", namer);
        namespaces.resolve().expect("resolution converges");

        assert_eq!(namespaces.spelling(class), Ok("Class2"));
        assert_eq!(namespaces.spelling(other), Ok("Class3"));
    }

    #[test]
    fn children_inherit_assigned_names() {
        let mut namespaces = Namespaces::new();
        let root = namespaces.add_namespace(None, Vec::<String>::new());
        let child = namespaces.add_namespace(Some(root), Vec::<String>::new());
        let namer = namespaces.add_namer(Namer::new(pascal_ish));

        let outer = namespaces.add_simple(root, "point", namer);
        let inner = namespaces.add_simple(child, "point", namer);
        // sibling namespaces don't constrain each other
        let sibling_ns = namespaces.add_namespace(Some(root), Vec::<String>::new());
        let sibling = namespaces.add_simple(sibling_ns, "point", namer);
        namespaces.resolve().expect("resolution converges");

        assert_eq!(namespaces.spelling(outer), Ok("Point"));
        assert_eq!(namespaces.spelling(inner), Ok("Point2"));
        assert_eq!(namespaces.spelling(sibling), Ok("Point2"));
    }

    #[test]
    fn dependent_names_wait_for_their_parts() {
        let mut namespaces = Namespaces::new();
        let root = namespaces.add_namespace(None, Vec::<String>::new());
        let namer = namespaces.add_namer(Namer::new(pascal_ish));

        let base = namespaces.add_simple(root, "payload", namer);
        let derived = namespaces.add_dependent(root, vec![base], |parts| {
            format!("{}Converter", parts[0])
        });
        namespaces.resolve().expect("resolution converges");

        assert_eq!(namespaces.spelling(base), Ok("Payload"));
        assert_eq!(namespaces.spelling(derived), Ok("PayloadConverter"));
    }

    #[test]
    fn fixed_collision_is_fatal() {
        let mut namespaces = Namespaces::new();
        let root = namespaces.add_namespace(None, ["while"]);
        namespaces.add_fixed(root, "while");
        assert_eq!(
            namespaces.resolve(),
            Err(NamingError::FixedCollision("while".into()))
        );
    }

    #[test]
    fn unread_names_error() {
        let namespaces = Namespaces::new();
        assert_eq!(namespaces.spelling(0), Err(NamingError::NotResolved(0)));
    }
}
