use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use skein_runtime::{CoroutineRecord, Stale, StoreError, SuspendPoint};
use skein_types::{CoroutineId, StackFrameItem};
use tokio::runtime::Handle;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::{
    DEFAULT_GROUP, Presentation, ViewConfig, render_coroutine, render_creation_group,
    render_error, render_frame, render_group,
};

// ── Identity ────────────────────────────────────────────────

/// Identity of a node among its siblings, stable across pauses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKey {
    Group(String),
    Coroutine(CoroutineId),
    /// A frame, told apart from identical siblings by how many came before.
    Frame { unique_id: String, occurrence: u32 },
    CreationGroup,
    Error,
}

/// Keys from the root down to a node. The root itself has the empty path.
pub type NodePath = Vec<NodeKey>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Unexpanded,
    Fetching,
    Populated,
    Errored,
}

pub enum NodeKind {
    Root,
    Group,
    Coroutine(Arc<CoroutineRecord>),
    CreationGroup(Arc<[StackFrameItem]>),
    Frame(StackFrameItem),
    Error,
    /// Stand-in root while no suspend point is shown.
    Empty,
}

// ── Nodes ───────────────────────────────────────────────────

#[derive(Default)]
struct Expansion {
    children: Vec<Arc<Node>>,
    errored: bool,
}

/// One node of the presentation tree.
///
/// Children are computed at most once, on first expansion, and belong to the
/// suspend point the node was built for.
pub struct Node {
    key: Option<NodeKey>,
    path: NodePath,
    presentation: Presentation,
    kind: NodeKind,
    point: Option<Arc<SuspendPoint>>,
    config: Arc<ViewConfig>,
    fetch_started: AtomicBool,
    expanded: AtomicBool,
    children: OnceCell<Expansion>,
}

impl Node {
    fn new(
        key: Option<NodeKey>,
        path: NodePath,
        presentation: Presentation,
        kind: NodeKind,
        point: Option<Arc<SuspendPoint>>,
        config: Arc<ViewConfig>,
    ) -> Self {
        Self {
            key,
            path,
            presentation,
            kind,
            point,
            config,
            fetch_started: AtomicBool::new(false),
            expanded: AtomicBool::new(false),
            children: OnceCell::new(),
        }
    }

    pub fn root(point: Arc<SuspendPoint>, config: Arc<ViewConfig>) -> Arc<Self> {
        Arc::new(Self::new(
            None,
            NodePath::new(),
            Presentation::blank(),
            NodeKind::Root,
            Some(point),
            config,
        ))
    }

    pub fn empty(config: Arc<ViewConfig>) -> Arc<Self> {
        Arc::new(Self::new(
            None,
            NodePath::new(),
            Presentation::blank(),
            NodeKind::Empty,
            None,
            config,
        ))
    }

    pub fn key(&self) -> Option<&NodeKey> {
        self.key.as_ref()
    }

    pub fn path(&self) -> &NodePath {
        &self.path
    }

    pub fn presentation(&self) -> &Presentation {
        &self.presentation
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn has_children(&self) -> bool {
        match &self.kind {
            NodeKind::Root | NodeKind::Group | NodeKind::Coroutine(_) => true,
            NodeKind::CreationGroup(items) => !items.is_empty(),
            NodeKind::Frame(_) | NodeKind::Error | NodeKind::Empty => false,
        }
    }

    pub fn state(&self) -> NodeState {
        match self.children.get() {
            Some(expansion) if expansion.errored => NodeState::Errored,
            Some(_) => NodeState::Populated,
            None if self.fetch_started.load(Ordering::Acquire) => NodeState::Fetching,
            None => NodeState::Unexpanded,
        }
    }

    /// Whether the node is currently shown open.
    pub fn is_expanded(&self) -> bool {
        self.expanded.load(Ordering::Relaxed) && self.children.initialized()
    }

    pub fn collapse(&self) {
        self.expanded.store(false, Ordering::Relaxed);
    }

    /// Children computed so far, without fetching.
    pub fn children(&self) -> Option<&[Arc<Node>]> {
        self.children
            .get()
            .map(|expansion| expansion.children.as_slice())
    }

    pub fn child(&self, key: &NodeKey) -> Option<&Arc<Node>> {
        self.children()?
            .iter()
            .find(|child| child.key.as_ref() == Some(key))
    }

    /// Computes the children on first call; later and concurrent calls share
    /// that result. Fails with [`Stale`] if the suspend point ended before
    /// the children could be published, in which case nothing is cached.
    pub async fn expand(&self) -> Result<&[Arc<Node>], Stale> {
        let expansion = self
            .children
            .get_or_try_init(|| async {
                self.fetch_started.store(true, Ordering::Release);
                let computed = self.compute().await;
                if computed.is_err() {
                    self.fetch_started.store(false, Ordering::Release);
                }
                computed
            })
            .await?;
        self.expanded.store(true, Ordering::Relaxed);
        Ok(&expansion.children)
    }

    async fn compute(&self) -> Result<Expansion, Stale> {
        let Some(point) = &self.point else {
            return Ok(Expansion::default());
        };
        let expansion = match &self.kind {
            NodeKind::Root => Expansion {
                children: vec![self.make_child(
                    NodeKey::Group(DEFAULT_GROUP.to_string()),
                    render_group(DEFAULT_GROUP),
                    NodeKind::Group,
                )],
                errored: false,
            },
            NodeKind::Group => match point.list_coroutines().await {
                Ok(records) => {
                    if self.config.prefetch_frames {
                        // Detached; it stops by itself once the point ends.
                        drop(point.prefetch_frames(Arc::clone(&records)));
                    }
                    Expansion {
                        children: records
                            .iter()
                            .map(|record| {
                                self.make_child(
                                    NodeKey::Coroutine(record.id()),
                                    render_coroutine(record.summary()),
                                    NodeKind::Coroutine(Arc::clone(record)),
                                )
                            })
                            .collect(),
                        errored: false,
                    }
                }
                Err(StoreError::Fetch(error)) => Expansion {
                    children: vec![self.make_child(
                        NodeKey::Error,
                        render_error(&error),
                        NodeKind::Error,
                    )],
                    errored: true,
                },
                Err(StoreError::Stale) => return Err(Stale),
            },
            NodeKind::Coroutine(record) => {
                let items = point.frames(record).await?;
                let split = items
                    .iter()
                    .position(StackFrameItem::is_creation)
                    .unwrap_or(items.len());
                let mut children = self.frame_children(&items[..split]);
                children.push(self.make_child(
                    NodeKey::CreationGroup,
                    render_creation_group(record.name()),
                    NodeKind::CreationGroup(Arc::from(&items[split..])),
                ));
                Expansion {
                    children,
                    errored: false,
                }
            }
            NodeKind::CreationGroup(items) => Expansion {
                children: self.frame_children(items),
                errored: false,
            },
            NodeKind::Frame(_) | NodeKind::Error | NodeKind::Empty => Expansion::default(),
        };
        if !point.is_alive() {
            trace!(generation = point.generation(), "dropping children of ended suspend point");
            return Err(Stale);
        }
        Ok(expansion)
    }

    fn make_child(&self, key: NodeKey, presentation: Presentation, kind: NodeKind) -> Arc<Node> {
        let mut path = self.path.clone();
        path.push(key.clone());
        Arc::new(Node::new(
            Some(key),
            path,
            presentation,
            kind,
            self.point.clone(),
            Arc::clone(&self.config),
        ))
    }

    fn frame_children(&self, items: &[StackFrameItem]) -> Vec<Arc<Node>> {
        let mut seen: HashMap<String, u32> = HashMap::new();
        items
            .iter()
            .map(|item| {
                let unique_id = item.unique_id();
                let count = seen.entry(unique_id.clone()).or_default();
                let key = NodeKey::Frame {
                    unique_id,
                    occurrence: *count,
                };
                *count += 1;
                self.make_child(
                    key,
                    render_frame(item.location(), &self.config.render),
                    NodeKind::Frame(item.clone()),
                )
            })
            .collect()
    }
}

// ── View state ──────────────────────────────────────────────

/// What the user had open and selected, by node identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewStateSnapshot {
    /// Expanded nodes, parents before children.
    pub expanded: Vec<NodePath>,
    pub selected: Option<NodePath>,
    /// Topmost visible node.
    pub scroll_anchor: Option<NodePath>,
}

#[derive(Default)]
struct Cursor {
    selected: Option<NodePath>,
    scroll_anchor: Option<NodePath>,
}

// ── Tree ────────────────────────────────────────────────────

/// The coroutine tree shown for the current suspend point.
pub struct PresentationTree {
    config: Arc<ViewConfig>,
    root: RwLock<Arc<Node>>,
    generation: AtomicU64,
    cursor: Mutex<Cursor>,
    /// View state captured when the tree was blanked, replayed on the next
    /// install.
    saved: Mutex<Option<ViewStateSnapshot>>,
    clear_task: Mutex<Option<JoinHandle<()>>>,
    /// Runs the delayed clear, so it can be scheduled from threads outside
    /// any runtime.
    runtime: Option<Handle>,
}

impl PresentationTree {
    /// Uses the runtime this is called from, if any, for delayed clears.
    pub fn new(config: ViewConfig) -> Arc<Self> {
        Self::build(config, Handle::try_current().ok())
    }

    pub fn with_runtime(config: ViewConfig, runtime: Handle) -> Arc<Self> {
        Self::build(config, Some(runtime))
    }

    fn build(config: ViewConfig, runtime: Option<Handle>) -> Arc<Self> {
        let config = Arc::new(config);
        Arc::new(Self {
            root: RwLock::new(Node::empty(Arc::clone(&config))),
            config,
            generation: AtomicU64::new(0),
            cursor: Mutex::new(Cursor::default()),
            saved: Mutex::new(None),
            clear_task: Mutex::new(None),
            runtime,
        })
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn root(&self) -> Arc<Node> {
        self.root.read().clone()
    }

    /// Bumped on every root swap.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn is_cleared(&self) -> bool {
        matches!(self.root.read().kind, NodeKind::Empty)
    }

    /// Shows `point`: swaps in a fresh root, opens the default group and
    /// re-expands whatever was open before, matched by identity.
    pub async fn install(&self, point: Arc<SuspendPoint>) {
        self.cancel_clear();
        let saved = self.saved.lock().take();
        let snapshot = saved.unwrap_or_else(|| self.capture_view_state());
        let root = Node::root(Arc::clone(&point), Arc::clone(&self.config));
        let generation = {
            let mut slot = self.root.write();
            *slot = Arc::clone(&root);
            self.generation.fetch_add(1, Ordering::AcqRel) + 1
        };
        *self.cursor.lock() = Cursor::default();
        debug!(
            generation,
            point = point.generation(),
            expanded = snapshot.expanded.len(),
            "presentation root installed"
        );
        self.restore(&root, generation, snapshot).await;
    }

    async fn restore(&self, root: &Arc<Node>, generation: u64, snapshot: ViewStateSnapshot) {
        let Ok(groups) = root.expand().await else {
            return;
        };
        for group in groups {
            if group.expand().await.is_err() {
                return;
            }
        }

        let mut expanded = snapshot.expanded;
        expanded.sort_by_key(Vec::len);
        for path in &expanded {
            if self.generation() != generation {
                return;
            }
            if self.expand_path(path).await.is_none() {
                trace!(?path, "expanded node has no counterpart after pause");
            }
        }
        if self.generation() != generation {
            return;
        }

        let mut cursor = self.cursor.lock();
        cursor.selected = snapshot.selected.filter(|path| find_in(root, path).is_some());
        cursor.scroll_anchor = snapshot
            .scroll_anchor
            .filter(|path| find_in(root, path).is_some());
    }

    /// Expands every node along `path` and returns the node it names, or
    /// `None` if some key has no match or the point ended.
    pub async fn expand_path(&self, path: &[NodeKey]) -> Option<Arc<Node>> {
        let mut node = self.root();
        for key in path {
            node.expand().await.ok()?;
            let next = Arc::clone(node.child(key)?);
            node = next;
        }
        node.expand().await.ok()?;
        Some(node)
    }

    /// Expands every node of the current tree, creation groups included.
    pub async fn expand_all(&self) -> Result<(), Stale> {
        let mut pending = vec![self.root()];
        while let Some(node) = pending.pop() {
            if !node.has_children() {
                continue;
            }
            let children = node.expand().await?;
            pending.extend(children.iter().rev().cloned());
        }
        Ok(())
    }

    /// Looks `path` up among already computed children.
    pub fn find(&self, path: &[NodeKey]) -> Option<Arc<Node>> {
        find_in(&self.root(), path)
    }

    pub fn collapse(&self, path: &[NodeKey]) -> bool {
        match self.find(path) {
            Some(node) => {
                node.collapse();
                true
            }
            None => false,
        }
    }

    pub fn select(&self, path: &[NodeKey]) -> bool {
        let found = self.find(path).is_some();
        if found {
            self.cursor.lock().selected = Some(path.to_vec());
        }
        found
    }

    pub fn selection(&self) -> Option<NodePath> {
        self.cursor.lock().selected.clone()
    }

    pub fn set_scroll_anchor(&self, path: Option<NodePath>) {
        self.cursor.lock().scroll_anchor = path;
    }

    pub fn scroll_anchor(&self) -> Option<NodePath> {
        self.cursor.lock().scroll_anchor.clone()
    }

    pub fn capture_view_state(&self) -> ViewStateSnapshot {
        let mut expanded = Vec::new();
        let mut pending = vec![self.root()];
        while let Some(node) = pending.pop() {
            if !node.is_expanded() {
                continue;
            }
            if node.key.is_some() && node.has_children() {
                expanded.push(node.path.clone());
            }
            if let Some(children) = node.children() {
                pending.extend(children.iter().rev().cloned());
            }
        }
        let cursor = self.cursor.lock();
        ViewStateSnapshot {
            expanded,
            selected: cursor.selected.clone(),
            scroll_anchor: cursor.scroll_anchor.clone(),
        }
    }

    /// Blanks the tree after the configured delay unless another install
    /// happens first. A later call replaces a pending one.
    ///
    /// May be called from any thread. The delay runs on the runtime the tree
    /// was built with, else on the caller's; with neither the tree is
    /// blanked at once.
    pub fn schedule_clear(self: &Arc<Self>) {
        let Some(runtime) = self.runtime.clone().or_else(|| Handle::try_current().ok()) else {
            warn!("no tokio runtime to delay the clear on; clearing now");
            self.force_clear();
            return;
        };
        let generation = self.generation();
        let delay = self.config.clear_delay;
        let tree: Weak<Self> = Arc::downgrade(self);
        let task = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(tree) = tree.upgrade() {
                tree.clear_if(generation);
            }
        });
        if let Some(previous) = self.clear_task.lock().replace(task) {
            previous.abort();
        }
    }

    pub fn cancel_clear(&self) {
        if let Some(task) = self.clear_task.lock().take() {
            task.abort();
        }
    }

    pub fn force_clear(&self) {
        self.cancel_clear();
        self.clear();
    }

    fn clear_if(&self, generation: u64) {
        if self.generation() == generation {
            self.clear();
        } else {
            trace!(generation, "skipping clear of replaced tree");
        }
    }

    fn clear(&self) {
        if self.is_cleared() {
            return;
        }
        let snapshot = self.capture_view_state();
        *self.saved.lock() = Some(snapshot);
        {
            let mut slot = self.root.write();
            *slot = Node::empty(Arc::clone(&self.config));
            self.generation.fetch_add(1, Ordering::AcqRel);
        }
        *self.cursor.lock() = Cursor::default();
        debug!("presentation tree cleared");
    }

    /// Indented labels of every expanded node, for text output.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        if let Some(children) = self.root().children() {
            for child in children {
                write_outline(&mut out, child, 0);
            }
        }
        out
    }
}

fn find_in(root: &Arc<Node>, path: &[NodeKey]) -> Option<Arc<Node>> {
    let mut node = root;
    for key in path {
        node = node.child(key)?;
    }
    Some(Arc::clone(node))
}

fn write_outline(out: &mut String, node: &Node, depth: usize) {
    let _ = writeln!(out, "{:indent$}{}", "", node.presentation.text, indent = depth * 2);
    if !node.is_expanded() {
        return;
    }
    if let Some(children) = node.children() {
        for child in children {
            write_outline(out, child, depth + 1);
        }
    }
}
