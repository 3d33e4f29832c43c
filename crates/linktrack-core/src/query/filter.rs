use crate::model::{LinkId, TypeId};

/// Declarative predicate over links, mirroring the store's relational
/// filter grammar. All set fields must hold (logical AND).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkFilter {
    pub id: Option<LinkId>,
    pub type_id: Option<TypeId>,
    pub from_id: Option<LinkId>,
    pub to_id: Option<LinkId>,
    /// Exact match on the link's string value.
    pub value: Option<String>,
    /// The link's `from` endpoint must match.
    pub from: Option<Box<LinkFilter>>,
    /// The link's `to` endpoint must match.
    pub to: Option<Box<LinkFilter>>,
    /// Some link pointing at this one (`to_id == self.id`) must match.
    pub incoming: Option<Box<LinkFilter>>,
    /// Some ancestor-or-self in a tree must match.
    pub up: Option<Box<TreeFilter>>,
}

/// Ancestor condition evaluated over a store-maintained tree index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeFilter {
    pub tree_id: TypeId,
    pub parent: LinkFilter,
}

impl LinkFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of_type(type_id: TypeId) -> Self {
        Self {
            type_id: Some(type_id),
            ..Self::default()
        }
    }

    pub fn id(mut self, id: LinkId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn from_id(mut self, id: LinkId) -> Self {
        self.from_id = Some(id);
        self
    }

    pub fn to_id(mut self, id: LinkId) -> Self {
        self.to_id = Some(id);
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn to_matching(mut self, filter: LinkFilter) -> Self {
        self.to = Some(Box::new(filter));
        self
    }

    pub fn incoming(mut self, filter: LinkFilter) -> Self {
        self.incoming = Some(Box::new(filter));
        self
    }

    pub fn up(mut self, tree_id: TypeId, parent: LinkFilter) -> Self {
        self.up = Some(Box::new(TreeFilter { tree_id, parent }));
        self
    }

    /// True when no condition is set, i.e. the filter matches every link.
    pub fn is_unrestricted(&self) -> bool {
        *self == Self::default()
    }
}
