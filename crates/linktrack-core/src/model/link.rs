use serde::{Deserialize, Serialize};

/// Store-assigned identifier of a link. Treated as opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(pub i64);

/// Types are links too; a type id is just the id of the type's link.
pub type TypeId = LinkId;

impl std::fmt::Display for LinkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored link: a node, and a directed edge when it carries endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    pub type_id: TypeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_id: Option<LinkId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_id: Option<LinkId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Insert request for a single link, optionally wrapped by a containing edge.
///
/// `contained_by` is inserted in the same call with its `to_id` pointing at
/// the new link, which is how a node and its containment are created together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLink {
    pub type_id: TypeId,
    pub from_id: Option<LinkId>,
    pub to_id: Option<LinkId>,
    pub value: Option<String>,
    pub contained_by: Option<Box<NewLink>>,
}

impl NewLink {
    /// A plain node of the given type.
    pub fn node(type_id: TypeId) -> Self {
        Self {
            type_id,
            from_id: None,
            to_id: None,
            value: None,
            contained_by: None,
        }
    }

    /// A directed edge `from -> to`.
    pub fn edge(type_id: TypeId, from: LinkId, to: LinkId) -> Self {
        Self {
            from_id: Some(from),
            to_id: Some(to),
            ..Self::node(type_id)
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Nest the link under a new `contain_type` edge coming from `parent`.
    pub fn contained_in(mut self, contain_type: TypeId, parent: LinkId) -> Self {
        let mut container = Self::node(contain_type);
        container.from_id = Some(parent);
        self.contained_by = Some(Box::new(container));
        self
    }
}
