use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::{IdentityService, LinkStore};
use crate::error::CoreError;
use crate::model::names::{
    ADMIN_NAME, ADMIN_NAMESPACE, CLOSED, CONTAIN, CONTAIN_TREE, CORE_PACKAGE, OPENED, PATH_FILE,
    PROJECT_NAME, USER,
};
use crate::model::{Link, LinkId, NewLink, Session, TypeId};
use crate::query::LinkFilter;

/// A store operation, used for call accounting and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Id,
    Select,
    Insert,
    Delete,
    Guest,
    Login,
}

/// Number of calls received per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub id: usize,
    pub select: usize,
    pub insert: usize,
    pub delete: usize,
    pub guest: usize,
    pub login: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.id + self.select + self.insert + self.delete + self.guest + self.login
    }

    fn bump(&mut self, op: StoreOp) {
        match op {
            StoreOp::Id => self.id += 1,
            StoreOp::Select => self.select += 1,
            StoreOp::Insert => self.insert += 1,
            StoreOp::Delete => self.delete += 1,
            StoreOp::Guest => self.guest += 1,
            StoreOp::Login => self.login += 1,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    links: BTreeMap<LinkId, Link>,
    names: HashMap<(String, String), LinkId>,
    /// tree id -> edge type that builds the tree
    trees: HashMap<TypeId, TypeId>,
    calls: CallCounts,
    faults: HashMap<StoreOp, usize>,
}

impl State {
    fn allocate(&mut self) -> LinkId {
        self.next_id += 1;
        LinkId(self.next_id)
    }

    fn create(
        &mut self,
        type_id: TypeId,
        from_id: Option<LinkId>,
        to_id: Option<LinkId>,
        value: Option<String>,
    ) -> Link {
        let link = Link {
            id: self.allocate(),
            type_id,
            from_id,
            to_id,
            value,
        };
        self.links.insert(link.id, link.clone());
        link
    }

    fn define(&mut self, namespace: &str, name: &str) -> LinkId {
        if let Some(id) = self.names.get(&(namespace.to_string(), name.to_string())) {
            return *id;
        }
        // Type links are self-typed here.
        let id = self.allocate();
        self.links.insert(
            id,
            Link {
                id,
                type_id: id,
                from_id: None,
                to_id: None,
                value: Some(name.to_string()),
            },
        );
        self.names
            .insert((namespace.to_string(), name.to_string()), id);
        id
    }

    fn name(&self, namespace: &str, name: &str) -> Option<LinkId> {
        self.names
            .get(&(namespace.to_string(), name.to_string()))
            .copied()
    }

    fn insert_nested(&mut self, new: &NewLink) -> Result<Link, CoreError> {
        for endpoint in [Some(new.type_id), new.from_id, new.to_id].into_iter().flatten() {
            if !self.links.contains_key(&endpoint) {
                return Err(CoreError::Rejected(format!(
                    "insert references missing link {endpoint}"
                )));
            }
        }
        let link = self.create(new.type_id, new.from_id, new.to_id, new.value.clone());
        if let Some(container) = &new.contained_by {
            let mut edge = (**container).clone();
            edge.to_id = Some(link.id);
            self.insert_nested(&edge)?;
        }
        Ok(link)
    }

    /// The link itself followed by every ancestor in the tree built by
    /// `edge_type` edges. An edge's parent is its `from`; a node's parents are
    /// the edges pointing at it.
    fn ancestors_or_self(&self, start: LinkId, edge_type: TypeId) -> Vec<LinkId> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([start]);
        let mut out = Vec::new();

        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            let Some(link) = self.links.get(&id) else {
                continue;
            };
            out.push(id);
            if link.type_id == edge_type {
                if let Some(from) = link.from_id {
                    queue.push_back(from);
                }
            } else {
                queue.extend(
                    self.links
                        .values()
                        .filter(|e| e.type_id == edge_type && e.to_id == Some(id))
                        .map(|e| e.id),
                );
            }
        }
        out
    }

    fn endpoint_matches(&self, endpoint: Option<LinkId>, filter: &LinkFilter) -> bool {
        endpoint
            .and_then(|id| self.links.get(&id))
            .is_some_and(|link| self.matches(link, filter))
    }

    fn matches(&self, link: &Link, filter: &LinkFilter) -> bool {
        if filter.id.is_some_and(|id| id != link.id)
            || filter.type_id.is_some_and(|t| t != link.type_id)
            || filter.from_id.is_some_and(|id| Some(id) != link.from_id)
            || filter.to_id.is_some_and(|id| Some(id) != link.to_id)
        {
            return false;
        }
        if let Some(value) = &filter.value {
            if link.value.as_deref() != Some(value.as_str()) {
                return false;
            }
        }
        if let Some(from) = &filter.from {
            if !self.endpoint_matches(link.from_id, from) {
                return false;
            }
        }
        if let Some(to) = &filter.to {
            if !self.endpoint_matches(link.to_id, to) {
                return false;
            }
        }
        if let Some(incoming) = &filter.incoming {
            let found = self
                .links
                .values()
                .any(|l| l.to_id == Some(link.id) && self.matches(l, incoming));
            if !found {
                return false;
            }
        }
        if let Some(up) = &filter.up {
            let Some(edge_type) = self.trees.get(&up.tree_id) else {
                return false;
            };
            let found = self
                .ancestors_or_self(link.id, *edge_type)
                .into_iter()
                .filter_map(|id| self.links.get(&id))
                .any(|ancestor| self.matches(ancestor, &up.parent));
            if !found {
                return false;
            }
        }
        true
    }

    fn matching(&self, filter: &LinkFilter) -> Vec<Link> {
        self.links
            .values()
            .filter(|link| self.matches(link, filter))
            .cloned()
            .collect()
    }
}

/// In-process link store implementing the same filter grammar as the remote
/// one, including tree-scoped (`up`) conditions.
///
/// Clones share state, so a handle returned by [`IdentityService::with_session`]
/// sees every write made through the original.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    session: Option<Session>,
}

impl MemoryStore {
    /// An empty store with no names registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store provisioned with the core types, the containment tree, the
    /// tracker's types under `package` and the `deep/admin` principal.
    pub fn with_schema(package: &str) -> Self {
        let store = Self::new();
        {
            let mut state = store.lock();
            let contain = state.define(CORE_PACKAGE, CONTAIN);
            let tree = state.define(CORE_PACKAGE, CONTAIN_TREE);
            state.trees.insert(tree, contain);
            let user = state.define(CORE_PACKAGE, USER);
            for name in [PATH_FILE, PROJECT_NAME, OPENED, CLOSED] {
                state.define(package, name);
            }
            let admin = state.create(user, None, None, Some(ADMIN_NAME.to_string()));
            state
                .names
                .insert((ADMIN_NAMESPACE.to_string(), ADMIN_NAME.to_string()), admin.id);
        }
        store
    }

    /// Create another principal and return an authorized session for it.
    pub fn add_user(&self) -> Session {
        let mut state = self.lock();
        let user = state.define(CORE_PACKAGE, USER);
        let link = state.create(user, None, None, None);
        Session::new(link.id, Some(format!("token:{}", link.id)))
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Snapshot of every stored link, in id order.
    pub fn links(&self) -> Vec<Link> {
        self.lock().links.values().cloned().collect()
    }

    /// Links matching `filter`, without counting as a store call.
    pub fn matching(&self, filter: &LinkFilter) -> Vec<Link> {
        self.lock().matching(filter)
    }

    pub fn calls(&self) -> CallCounts {
        self.lock().calls
    }

    /// Make the next call of `op` fail with a transport error.
    pub fn fail_next(&self, op: StoreOp) {
        *self.lock().faults.entry(op).or_insert(0) += 1;
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn begin(&self, op: StoreOp) -> Result<MutexGuard<'_, State>, CoreError> {
        let mut state = self.lock();
        state.calls.bump(op);
        if let Some(pending) = state.faults.get_mut(&op) {
            if *pending > 0 {
                *pending -= 1;
                return Err(CoreError::Transport(format!("injected {op:?} failure")));
            }
        }
        Ok(state)
    }
}

#[async_trait]
impl LinkStore for MemoryStore {
    async fn id(&self, namespace: &str, name: &str) -> Result<LinkId, CoreError> {
        let state = self.begin(StoreOp::Id)?;
        state
            .name(namespace, name)
            .ok_or_else(|| CoreError::UnknownName {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    async fn select(&self, filter: &LinkFilter) -> Result<Vec<Link>, CoreError> {
        let state = self.begin(StoreOp::Select)?;
        Ok(state.matching(filter))
    }

    async fn insert(&self, link: &NewLink) -> Result<Vec<Link>, CoreError> {
        let mut state = self.begin(StoreOp::Insert)?;
        let created = state.insert_nested(link)?;
        Ok(vec![created])
    }

    async fn delete(&self, filter: &LinkFilter) -> Result<u64, CoreError> {
        let mut state = self.begin(StoreOp::Delete)?;
        if filter.is_unrestricted() {
            return Err(CoreError::Rejected(
                "refusing to delete without a filter".to_string(),
            ));
        }
        let doomed: Vec<LinkId> = state.matching(filter).iter().map(|l| l.id).collect();
        for id in &doomed {
            state.links.remove(id);
        }
        Ok(doomed.len() as u64)
    }
}

#[async_trait]
impl IdentityService for MemoryStore {
    async fn guest(&self) -> Result<Session, CoreError> {
        let mut state = self.begin(StoreOp::Guest)?;
        let user = state.define(CORE_PACKAGE, USER);
        let link = state.create(user, None, None, None);
        Ok(Session::new(link.id, Some(format!("guest:{}", link.id))))
    }

    async fn login(&self, link_id: LinkId) -> Result<Session, CoreError> {
        let state = self.begin(StoreOp::Login)?;
        if self.session.is_none() {
            return Err(CoreError::Rejected("login requires a session".to_string()));
        }
        if !state.links.contains_key(&link_id) {
            return Err(CoreError::NotFound(link_id));
        }
        Ok(Session::new(link_id, Some(format!("token:{link_id}"))))
    }

    fn with_session(&self, session: &Session) -> Self {
        Self {
            state: Arc::clone(&self.state),
            session: Some(session.clone()),
        }
    }
}
