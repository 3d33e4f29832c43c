use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use linktrack_core::model::{LinkId, NewLink, Session, TypeId};
use linktrack_core::storage::LinkStore;

use crate::error::SyncError;
use crate::locks::KeyedLocks;
use crate::nodes::NodeResolver;
use crate::scope::MarkerScope;
use crate::types::{TypeRegistry, TypeResolver};

/// Suffix of version-control metadata paths, which are never tracked.
pub const IGNORED_SUFFIX: &str = ".git";

pub fn is_ignored(path: &str) -> bool {
    path.ends_with(IGNORED_SUFFIX)
}

/// Editing state of a file for one agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileState {
    Opened,
    Closed,
}

impl FileState {
    pub fn opposite(self) -> Self {
        match self {
            FileState::Opened => FileState::Closed,
            FileState::Closed => FileState::Opened,
        }
    }

    pub fn marker_type(self, types: &TypeRegistry) -> TypeId {
        match self {
            FileState::Opened => types.opened,
            FileState::Closed => types.closed,
        }
    }
}

impl std::fmt::Display for FileState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileState::Opened => write!(f, "opened"),
            FileState::Closed => write!(f, "closed"),
        }
    }
}

/// A file lifecycle notification from the editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FileEvent {
    Opened { path: String },
    Closed { path: String },
}

impl FileEvent {
    pub fn path(&self) -> &str {
        match self {
            FileEvent::Opened { path } | FileEvent::Closed { path } => path,
        }
    }

    pub fn target(&self) -> FileState {
        match self {
            FileEvent::Opened { .. } => FileState::Opened,
            FileEvent::Closed { .. } => FileState::Closed,
        }
    }
}

/// What one applied event changed in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub path: String,
    pub state: FileState,
    pub file: LinkId,
    /// Links deleted with the opposite marker (edge and marker count apart).
    pub removed: u64,
    /// The new marker, or `None` when the agent already had one in this state.
    pub marker: Option<LinkId>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Ignored { path: String },
    Applied(Transition),
}

/// The agent's markers on one file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MarkerCount {
    pub opened: usize,
    pub closed: usize,
}

impl MarkerCount {
    /// The file's state, if exactly one kind of marker is present.
    pub fn state(&self) -> Option<FileState> {
        match (self.opened > 0, self.closed > 0) {
            (true, false) => Some(FileState::Opened),
            (false, true) => Some(FileState::Closed),
            _ => None,
        }
    }

    pub fn total(&self) -> usize {
        self.opened + self.closed
    }
}

/// Everything resolved once per session and shared by every event.
#[derive(Debug, Clone)]
pub struct SyncContext {
    pub session: Session,
    pub types: TypeRegistry,
    pub package: String,
    pub project_name: String,
    pub project: LinkId,
}

impl SyncContext {
    pub fn agent_root(&self) -> LinkId {
        self.session.link_id
    }
}

/// Keeps one Opened or Closed marker per file for this agent, driven by
/// editor open/close events.
///
/// Events for the same path are applied one at a time; different paths
/// proceed concurrently. A transition is a delete followed by an insert with
/// no transaction around them: if the insert fails the file is left without a
/// marker until its next event.
#[derive(Debug)]
pub struct FileTracker<S> {
    store: S,
    ctx: SyncContext,
    scope: MarkerScope,
    nodes: NodeResolver,
    files: Arc<KeyedLocks<String>>,
}

impl<S: LinkStore> FileTracker<S> {
    /// Resolve the types from `package` and find or create the project node
    /// under the session's root.
    pub async fn start(
        store: S,
        session: Session,
        project_name: &str,
        package: &str,
    ) -> Result<Self, SyncError> {
        let types = TypeRegistry::resolve(&TypeResolver::new(), &store, package).await?;
        let nodes = NodeResolver::new(types.contain);
        let files = Arc::new(KeyedLocks::new());
        Self::open_project(store, session, types, nodes, files, project_name, package).await
    }

    /// Start over with a new session for the same project.
    ///
    /// The new tracker shares this one's path and node locks, so events still
    /// running here stay serialized with events applied through it.
    pub async fn renew(&self, store: S, session: Session) -> Result<Self, SyncError> {
        let package = self.ctx.package.clone();
        let types = TypeRegistry::resolve(&TypeResolver::new(), &store, &package).await?;
        let nodes = self.nodes.sharing_locks(types.contain);
        let files = Arc::clone(&self.files);
        let project_name = self.ctx.project_name.clone();
        Self::open_project(store, session, types, nodes, files, &project_name, &package).await
    }

    /// Like [`FileTracker::start`] but never writes: `None` when the project
    /// node does not exist yet.
    pub async fn attach(
        store: S,
        session: Session,
        project_name: &str,
        package: &str,
    ) -> Result<Option<Self>, SyncError> {
        let types = TypeRegistry::resolve(&TypeResolver::new(), &store, package).await?;
        let nodes = NodeResolver::new(types.contain);
        let Some(project) = nodes
            .find(&store, types.project, project_name, session.link_id)
            .await?
        else {
            return Ok(None);
        };
        let scope = MarkerScope::new(session.link_id, types.contain_tree, types.contain);
        Ok(Some(Self {
            store,
            ctx: SyncContext {
                session,
                types,
                package: package.to_string(),
                project_name: project_name.to_string(),
                project,
            },
            scope,
            nodes,
            files: Arc::new(KeyedLocks::new()),
        }))
    }

    async fn open_project(
        store: S,
        session: Session,
        types: TypeRegistry,
        nodes: NodeResolver,
        files: Arc<KeyedLocks<String>>,
        project_name: &str,
        package: &str,
    ) -> Result<Self, SyncError> {
        let project = nodes
            .resolve_or_create(&store, types.project, project_name, session.link_id)
            .await?;
        tracing::info!(
            project = project_name,
            node = %project,
            agent = %session.link_id,
            "tracking started"
        );
        let scope = MarkerScope::new(session.link_id, types.contain_tree, types.contain);
        Ok(Self {
            store,
            ctx: SyncContext {
                session,
                types,
                package: package.to_string(),
                project_name: project_name.to_string(),
                project,
            },
            scope,
            nodes,
            files,
        })
    }

    pub fn context(&self) -> &SyncContext {
        &self.ctx
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn on_open(&self, path: &str) -> Result<Outcome, SyncError> {
        self.transition(path, FileState::Opened).await
    }

    pub async fn on_close(&self, path: &str) -> Result<Outcome, SyncError> {
        self.transition(path, FileState::Closed).await
    }

    pub async fn apply(&self, event: &FileEvent) -> Result<Outcome, SyncError> {
        self.transition(event.path(), event.target()).await
    }

    /// The agent's markers on `path`, without creating anything.
    pub async fn markers(&self, path: &str) -> Result<MarkerCount, SyncError> {
        let types = &self.ctx.types;
        let Some(file) = self
            .nodes
            .find(&self.store, types.path_file, path, self.ctx.project)
            .await?
        else {
            return Ok(MarkerCount::default());
        };
        let opened = self
            .store
            .select(&self.scope.markers_filter(types.opened, file))
            .await?;
        let closed = self
            .store
            .select(&self.scope.markers_filter(types.closed, file))
            .await?;
        Ok(MarkerCount {
            opened: opened.len(),
            closed: closed.len(),
        })
    }

    async fn transition(&self, path: &str, target: FileState) -> Result<Outcome, SyncError> {
        if is_ignored(path) {
            tracing::debug!(path, "ignored");
            return Ok(Outcome::Ignored {
                path: path.to_string(),
            });
        }

        let _guard = self.files.lock(path.to_string()).await;
        let types = &self.ctx.types;
        let root = self.ctx.agent_root();

        let file = self
            .nodes
            .resolve_or_create(&self.store, types.path_file, path, self.ctx.project)
            .await?;

        let removed = self
            .scope
            .delete_prior_marker(&self.store, target.opposite().marker_type(types), file)
            .await?;

        let marker_type = target.marker_type(types);
        let existing = self
            .store
            .select(&self.scope.markers_filter(marker_type, file))
            .await?;

        let marker = if existing.is_empty() {
            let created = self
                .store
                .insert(&NewLink::edge(marker_type, root, file).contained_in(types.contain, root))
                .await?;
            Some(created.first().map(|l| l.id).ok_or(SyncError::EmptyInsert)?)
        } else {
            None
        };

        tracing::info!(path, state = %target, removed, "transition");
        Ok(Outcome::Applied(Transition {
            path: path.to_string(),
            state: target,
            file,
            removed,
            marker,
            at: Utc::now(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linktrack_core::query::LinkFilter;
    use linktrack_core::storage::{MemoryStore, StoreOp};

    use crate::identity::bootstrap;

    const PACKAGE: &str = "@test/tracker";
    const FILE: &str = "/ws/demo/a.ts";

    async fn tracker() -> FileTracker<MemoryStore> {
        tracker_on(&MemoryStore::with_schema(PACKAGE)).await
    }

    async fn tracker_on(store: &MemoryStore) -> FileTracker<MemoryStore> {
        let authorized = bootstrap(store).await.unwrap();
        FileTracker::start(authorized.store, authorized.session, "demo", PACKAGE)
            .await
            .unwrap()
    }

    fn count(tracker: &FileTracker<MemoryStore>, type_id: TypeId) -> usize {
        tracker.store().matching(&LinkFilter::of_type(type_id)).len()
    }

    #[tokio::test]
    async fn test_first_open_builds_project_file_and_marker() {
        let tracker = tracker().await;
        let types = tracker.context().types;

        let outcome = tracker.on_open(FILE).await.unwrap();
        let Outcome::Applied(transition) = outcome else {
            panic!("open was ignored");
        };
        assert_eq!(transition.state, FileState::Opened);
        assert_eq!(transition.removed, 0);
        assert!(transition.marker.is_some());

        let projects = tracker
            .store()
            .matching(&LinkFilter::of_type(types.project).value("demo"));
        assert_eq!(projects.len(), 1);
        let files = tracker.store().matching(
            &LinkFilter::of_type(types.path_file)
                .value(FILE)
                .incoming(LinkFilter::of_type(types.contain).from_id(projects[0].id)),
        );
        assert_eq!(files.len(), 1);

        let opened = tracker.store().matching(&LinkFilter::of_type(types.opened));
        assert_eq!(opened.len(), 1);
        assert_eq!(opened[0].from_id, Some(tracker.context().agent_root()));
        assert_eq!(opened[0].to_id, Some(files[0].id));
        assert_eq!(count(&tracker, types.closed), 0);
    }

    #[tokio::test]
    async fn test_close_replaces_open_and_repeats_do_not_accumulate() {
        let tracker = tracker().await;
        let types = tracker.context().types;
        tracker.on_open(FILE).await.unwrap();

        tracker.on_close(FILE).await.unwrap();
        assert_eq!(count(&tracker, types.opened), 0);
        assert_eq!(count(&tracker, types.closed), 1);

        let Outcome::Applied(again) = tracker.on_close(FILE).await.unwrap() else {
            panic!("close was ignored");
        };
        assert_eq!(again.marker, None);
        assert_eq!(count(&tracker, types.closed), 1);

        tracker.on_open(FILE).await.unwrap();
        tracker.on_open(FILE).await.unwrap();
        assert_eq!(count(&tracker, types.opened), 1);
        assert_eq!(count(&tracker, types.closed), 0);
    }

    #[tokio::test]
    async fn test_marker_matches_most_recent_event() {
        let tracker = tracker().await;
        let sequence = [
            FileState::Opened,
            FileState::Opened,
            FileState::Closed,
            FileState::Opened,
            FileState::Closed,
            FileState::Closed,
            FileState::Opened,
        ];
        for state in sequence {
            match state {
                FileState::Opened => tracker.on_open(FILE).await.unwrap(),
                FileState::Closed => tracker.on_close(FILE).await.unwrap(),
            };
            let markers = tracker.markers(FILE).await.unwrap();
            assert_eq!(markers.total(), 1);
            assert_eq!(markers.state(), Some(state));
        }
    }

    #[tokio::test]
    async fn test_containing_edges_are_removed_with_markers() {
        let tracker = tracker().await;
        let types = tracker.context().types;
        let root = tracker.context().agent_root();
        let owned = LinkFilter::of_type(types.contain).from_id(root);
        let baseline = tracker.store().matching(&owned).len();

        tracker.on_open(FILE).await.unwrap();
        tracker.on_close(FILE).await.unwrap();
        tracker.on_open(FILE).await.unwrap();

        // Only the live marker's edge remains from the root.
        assert_eq!(tracker.store().matching(&owned).len(), baseline + 1);
    }

    #[tokio::test]
    async fn test_other_agents_markers_survive() {
        let tracker = tracker().await;
        let types = tracker.context().types;
        let Outcome::Applied(opened) = tracker.on_open(FILE).await.unwrap() else {
            panic!("open was ignored");
        };

        let other = tracker.store().add_user().link_id;
        tracker
            .store()
            .insert(
                &NewLink::edge(types.opened, other, opened.file)
                    .contained_in(types.contain, other),
            )
            .await
            .unwrap();

        tracker.on_close(FILE).await.unwrap();

        let remaining = tracker.store().matching(&LinkFilter::of_type(types.opened));
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].from_id, Some(other));
        assert_eq!(tracker.markers(FILE).await.unwrap().state(), Some(FileState::Closed));
    }

    #[tokio::test]
    async fn test_git_paths_make_no_store_calls() {
        let tracker = tracker().await;
        let before = tracker.store().calls();

        for path in ["/ws/demo/.git", "/ws/demo/a.ts.git"] {
            let opened = tracker.on_open(path).await.unwrap();
            assert!(matches!(opened, Outcome::Ignored { .. }));
            let closed = tracker.on_close(path).await.unwrap();
            assert!(matches!(closed, Outcome::Ignored { .. }));
        }
        assert_eq!(tracker.store().calls(), before);
    }

    #[tokio::test]
    async fn test_failed_insert_heals_on_next_event() {
        let tracker = tracker().await;
        tracker.on_open(FILE).await.unwrap();

        tracker.store().fail_next(StoreOp::Insert);
        assert!(tracker.on_close(FILE).await.is_err());
        assert_eq!(tracker.markers(FILE).await.unwrap(), MarkerCount::default());

        tracker.on_open(FILE).await.unwrap();
        let markers = tracker.markers(FILE).await.unwrap();
        assert_eq!(markers.total(), 1);
        assert_eq!(markers.state(), Some(FileState::Opened));
    }

    #[tokio::test]
    async fn test_failed_delete_leaves_previous_state() {
        let tracker = tracker().await;
        tracker.on_open(FILE).await.unwrap();

        tracker.store().fail_next(StoreOp::Delete);
        assert!(tracker.on_close(FILE).await.is_err());
        assert_eq!(tracker.markers(FILE).await.unwrap().state(), Some(FileState::Opened));
    }

    #[tokio::test]
    async fn test_markers_for_unknown_file() {
        let tracker = tracker().await;
        let inserts = tracker.store().calls().insert;
        assert_eq!(tracker.markers("/ws/demo/none.ts").await.unwrap(), MarkerCount::default());
        assert_eq!(tracker.store().calls().insert, inserts);
    }

    #[tokio::test]
    async fn test_restart_reuses_project_node() {
        let store = MemoryStore::with_schema(PACKAGE);
        let authorized = bootstrap(&store).await.unwrap();
        let first = FileTracker::start(
            authorized.store.clone(),
            authorized.session.clone(),
            "demo",
            PACKAGE,
        )
        .await
        .unwrap();
        let second = FileTracker::start(authorized.store, authorized.session, "demo", PACKAGE)
            .await
            .unwrap();
        assert_eq!(first.context().project, second.context().project);
    }

    #[tokio::test]
    async fn test_attach_does_not_create_project() {
        let store = MemoryStore::with_schema(PACKAGE);
        let authorized = bootstrap(&store).await.unwrap();

        let missing = FileTracker::attach(
            authorized.store.clone(),
            authorized.session.clone(),
            "demo",
            PACKAGE,
        )
        .await
        .unwrap();
        assert!(missing.is_none());
        assert_eq!(store.calls().insert, 0);

        let started = FileTracker::start(
            authorized.store.clone(),
            authorized.session.clone(),
            "demo",
            PACKAGE,
        )
        .await
        .unwrap();
        started.on_open(FILE).await.unwrap();

        let attached = FileTracker::attach(authorized.store, authorized.session, "demo", PACKAGE)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(attached.context().project, started.context().project);
        assert_eq!(attached.markers(FILE).await.unwrap().state(), Some(FileState::Opened));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_renewed_tracker_serializes_with_previous() {
        let store = MemoryStore::with_schema(PACKAGE);
        let previous = Arc::new(tracker_on(&store).await);
        let again = bootstrap(&store).await.unwrap();
        let renewed = Arc::new(previous.renew(again.store, again.session).await.unwrap());
        assert_eq!(renewed.context().project, previous.context().project);
        assert_eq!(renewed.context().package, PACKAGE);

        let paths: Vec<String> = (0..50).map(|i| format!("/ws/demo/{i}.ts")).collect();
        let mut tasks = Vec::new();
        for path in &paths {
            for tracker in [&previous, &renewed] {
                let (tracker, path) = (Arc::clone(tracker), path.clone());
                tasks.push(tokio::spawn(async move { tracker.on_open(&path).await.unwrap() }));
            }
        }
        for task in tasks {
            task.await.unwrap();
        }

        let types = renewed.context().types;
        for path in &paths {
            let files =
                store.matching(&LinkFilter::of_type(types.path_file).value(path.as_str()));
            assert_eq!(files.len(), 1, "{path}");
            let markers = renewed.markers(path).await.unwrap();
            assert_eq!(markers, MarkerCount { opened: 1, closed: 0 }, "{path}");
        }
    }

    #[tokio::test]
    async fn test_apply_event() {
        let tracker = tracker().await;
        let event: FileEvent =
            serde_json::from_str(r#"{"event":"opened","path":"/ws/demo/b.ts"}"#).unwrap();
        assert_eq!(event.target(), FileState::Opened);
        tracker.apply(&event).await.unwrap();
        assert_eq!(
            tracker.markers("/ws/demo/b.ts").await.unwrap().state(),
            Some(FileState::Opened)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_interleaved_events_converge() {
        let tracker = Arc::new(tracker().await);
        let types = tracker.context().types;

        let mut tasks = Vec::new();
        for i in 0..24 {
            let tracker = tracker.clone();
            tasks.push(tokio::spawn(async move {
                let path = format!("/ws/demo/{}.ts", i % 3);
                if i % 2 == 0 {
                    tracker.on_open(&path).await.unwrap();
                } else {
                    tracker.on_close(&path).await.unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(count(&tracker, types.path_file), 3);
        for i in 0..3 {
            let markers = tracker.markers(&format!("/ws/demo/{i}.ts")).await.unwrap();
            assert_eq!(markers.total(), 1);
        }
    }
}
