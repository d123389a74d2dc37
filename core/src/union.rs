//! # Union Representation
//!
//! A packed "at most one of each kind" structure: a bitset for the five
//! primitive kinds plus one slot per compound kind (array, class, map,
//! enum). Primitive merges are a single OR; compound slots merge by the
//! rules of their element type, so unifying two unions never needs pairwise
//! member comparisons.
//!
//! Members are visited in a fixed canonical order (`Null, Integer, Double,
//! Bool, String, Array, Class, Map, Enum`), which keeps rendered output
//! stable.
//!
//! Two invariants matter to renderers:
//! - a union holding both `Integer` and `Double` keeps both bits (so mixed
//!   numeric origin stays detectable) but emits only `Double`;
//! - a union holding `Null` plus exactly one other kind is *nullable* and
//!   can be rendered as an optional of that kind.

use crate::graph::{ClassId, EnumData, IrType, NameSet};

/// The five primitive kinds a union tracks in its bitset, in canonical
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Primitive {
    Null,
    Integer,
    Double,
    Bool,
    String,
}

impl Primitive {
    pub const ALL: [Primitive; 5] = [
        Primitive::Null,
        Primitive::Integer,
        Primitive::Double,
        Primitive::Bool,
        Primitive::String,
    ];

    const fn bit(self) -> u8 {
        1 << (self as u8)
    }

    pub fn of(ty: &IrType) -> Option<Primitive> {
        match ty {
            IrType::Null => Some(Primitive::Null),
            IrType::Integer => Some(Primitive::Integer),
            IrType::Double => Some(Primitive::Double),
            IrType::Bool => Some(Primitive::Bool),
            IrType::String => Some(Primitive::String),
            _ => None,
        }
    }

    pub fn into_type(self) -> IrType {
        match self {
            Primitive::Null => IrType::Null,
            Primitive::Integer => IrType::Integer,
            Primitive::Double => IrType::Double,
            Primitive::Bool => IrType::Bool,
            Primitive::String => IrType::String,
        }
    }
}

/// Disjunction of kinds: primitive bitset + one slot per compound kind.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UnionRep {
    pub names: NameSet,
    pub(crate) primitives: u8,
    pub(crate) array: Option<Box<IrType>>,
    pub(crate) class: Option<ClassId>,
    pub(crate) map: Option<Box<IrType>>,
    pub(crate) enum_: Option<EnumData>,
}

impl UnionRep {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Singleton union around a non-union type. `NoInformation` contributes
    /// nothing; `Any` never reaches a union (unification collapses it
    /// earlier).
    pub fn of(ty: IrType) -> Self {
        let mut union = UnionRep::empty();
        union.insert(ty);
        union
    }

    pub(crate) fn insert(&mut self, ty: IrType) {
        match ty {
            IrType::NoInformation => {}
            IrType::Any => debug_assert!(false, "Any must not enter a union"),
            IrType::Array(inner) => self.array = Some(inner),
            IrType::Class(id) => self.class = Some(id),
            IrType::Map(inner) => self.map = Some(inner),
            IrType::Enum(data) => self.enum_ = Some(data),
            IrType::Union(_) => debug_assert!(false, "unions are merged, not nested"),
            primitive => {
                if let Some(p) = Primitive::of(&primitive) {
                    self.insert_primitive(p);
                }
            }
        }
    }

    pub fn insert_primitive(&mut self, primitive: Primitive) {
        self.primitives |= primitive.bit();
    }

    pub fn has(&self, primitive: Primitive) -> bool {
        self.primitives & primitive.bit() != 0
    }

    /// Both numeric bits set: the union saw integers and doubles and is
    /// renderable only as `Double`.
    pub fn mixed_number(&self) -> bool {
        self.has(Primitive::Integer) && self.has(Primitive::Double)
    }

    pub fn array_slot(&self) -> Option<&IrType> {
        self.array.as_deref()
    }

    pub fn class_slot(&self) -> Option<ClassId> {
        self.class
    }

    pub fn map_slot(&self) -> Option<&IrType> {
        self.map.as_deref()
    }

    pub fn enum_slot(&self) -> Option<&EnumData> {
        self.enum_.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives == 0
            && self.array.is_none()
            && self.class.is_none()
            && self.map.is_none()
            && self.enum_.is_none()
    }

    /// Emitted members in canonical order. `Integer` is suppressed when
    /// `Double` is present; the bits stay as they were.
    pub fn members(&self) -> Vec<IrType> {
        let mut members = vec![];
        for primitive in Primitive::ALL {
            if primitive == Primitive::Integer && self.mixed_number() {
                continue;
            }
            if self.has(primitive) {
                members.push(primitive.into_type());
            }
        }
        if let Some(inner) = &self.array {
            members.push(IrType::Array(inner.clone()));
        }
        if let Some(id) = self.class {
            members.push(IrType::Class(id));
        }
        if let Some(inner) = &self.map {
            members.push(IrType::Map(inner.clone()));
        }
        if let Some(data) = &self.enum_ {
            members.push(IrType::Enum(data.clone()));
        }
        members
    }

    pub fn for_each(&self, mut f: impl FnMut(&IrType)) {
        for member in self.members() {
            f(&member);
        }
    }

    /// Kind-level membership test against the emitted view.
    pub fn is_member(&self, ty: &IrType) -> bool {
        match ty {
            IrType::Array(_) => self.array.is_some(),
            IrType::Class(_) => self.class.is_some(),
            IrType::Map(_) => self.map.is_some(),
            IrType::Enum(_) => self.enum_.is_some(),
            other => match Primitive::of(other) {
                Some(Primitive::Integer) => self.has(Primitive::Integer) && !self.mixed_number(),
                Some(p) => self.has(p),
                None => false,
            },
        }
    }

    pub fn remove_null(mut self) -> (bool, Self) {
        let had_null = self.has(Primitive::Null);
        self.primitives &= !Primitive::Null.bit();
        (had_null, self)
    }

    /// The sole non-null kind, when this union is exactly `Null` plus one
    /// other emitted kind.
    pub fn nullable(&self) -> Option<IrType> {
        if !self.has(Primitive::Null) {
            return None;
        }
        let (_, rest) = self.clone().remove_null();
        let mut members = rest.members();
        match members.len() {
            1 => members.pop(),
            _ => None,
        }
    }

    /// The empty union is not representable; it degrades to
    /// `NoInformation`.
    pub fn into_type(self) -> IrType {
        match self.is_empty() {
            true => IrType::NoInformation,
            false => IrType::Union(Box::new(self)),
        }
    }
}

/// `ty` or null. `Any` absorbs the null; an existing union gains the bit.
pub fn nullable_of(ty: IrType) -> IrType {
    match ty {
        IrType::Any => IrType::Any,
        IrType::Union(mut union) => {
            union.insert_primitive(Primitive::Null);
            IrType::Union(union)
        }
        other => {
            let mut union = UnionRep::of(other);
            union.insert_primitive(Primitive::Null);
            union.into_type()
        }
    }
}
