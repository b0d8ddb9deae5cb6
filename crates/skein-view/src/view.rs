use std::sync::Arc;

use skein_runtime::{DebugSession, SuspendPoint};
use skein_types::ThreadRef;
use tokio::runtime::Handle;
use tracing::debug;

use crate::{PresentationTree, ViewConfig};

/// Keeps a [`PresentationTree`] in step with the pauses of a [`DebugSession`].
pub struct CoroutineView {
    session: DebugSession,
    tree: Arc<PresentationTree>,
}

impl CoroutineView {
    pub fn new(session: DebugSession, config: ViewConfig) -> Self {
        Self {
            session,
            tree: PresentationTree::new(config),
        }
    }

    /// Like [`CoroutineView::new`], for views driven from threads outside
    /// `runtime`.
    pub fn with_runtime(session: DebugSession, config: ViewConfig, runtime: Handle) -> Self {
        Self {
            session,
            tree: PresentationTree::with_runtime(config, runtime),
        }
    }

    pub fn session(&self) -> &DebugSession {
        &self.session
    }

    pub fn tree(&self) -> &Arc<PresentationTree> {
        &self.tree
    }

    /// The target stopped. Ends the previous suspend point and shows the
    /// new one, keeping what the user had open.
    pub async fn on_paused(&self, paused_thread: Option<ThreadRef>) -> Arc<SuspendPoint> {
        let point = self.session.paused(paused_thread);
        self.tree.install(Arc::clone(&point)).await;
        point
    }

    /// The target is running again. The tree stays visible for the clear
    /// delay in case it stops again right away. Safe to call outside a Tokio
    /// runtime; see [`PresentationTree::schedule_clear`].
    pub fn on_resumed(&self) {
        self.session.resumed();
        self.tree.schedule_clear();
    }

    /// The session went away; blank the tree now.
    pub fn force_clear(&self) {
        debug!("clearing coroutine view");
        self.session.resumed();
        self.tree.force_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DEFAULT_GROUP, NodeKey, NodeKind};
    use parking_lot::Mutex;
    use skein_runtime::replay::{PauseRecording, ReplayHost};
    use skein_runtime::{CoroutineProbe, FetchError, ManagerContext, ReconcileConfig};
    use skein_types::{CoroutineId, CoroutineState, CoroutineSummary, Location, RawTraceEntry, ThreadId};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    const MAIN: ThreadId = ThreadId::new(1);

    fn main_thread() -> ThreadRef {
        ThreadRef::new(MAIN, "main")
    }

    fn summary(id: u64, line: i32) -> CoroutineSummary {
        CoroutineSummary {
            id: CoroutineId::new(id),
            name: format!("job#{id}"),
            state: CoroutineState::Suspended,
            owner_thread: None,
            raw_trace: vec![
                RawTraceEntry::new("Foo", "bar", line),
                RawTraceEntry::new("\u{8}\u{8}\u{8}", "", -1),
                RawTraceEntry::new("Baz", "create", 5),
            ],
        }
    }

    fn host() -> Arc<ReplayHost> {
        Arc::new(ReplayHost::new(
            PauseRecording::default()
                .paused_on(MAIN)
                .with_thread(
                    main_thread(),
                    vec![Location::new("Main.kt", "MainKt", "main", 3)],
                )
                .with_type("Foo", "Foo.kt", &[("bar", &[10, 11])])
                .with_type("Baz", "Baz.kt", &[("create", &[5])]),
        ))
    }

    /// Hands out one scripted dump per call; the first call can be held
    /// until the test releases it.
    struct ScriptedProbe {
        dumps: Mutex<VecDeque<Vec<CoroutineSummary>>>,
        gate: Mutex<Option<mpsc::Receiver<()>>>,
        calls: AtomicUsize,
    }

    impl ScriptedProbe {
        fn new(dumps: Vec<Vec<CoroutineSummary>>) -> Self {
            Self {
                dumps: Mutex::new(dumps.into()),
                gate: Mutex::new(None),
                calls: AtomicUsize::new(0),
            }
        }

        fn gated(dumps: Vec<Vec<CoroutineSummary>>) -> (Self, mpsc::Sender<()>) {
            let (release, gate) = mpsc::channel();
            let probe = Self::new(dumps);
            *probe.gate.lock() = Some(gate);
            (probe, release)
        }
    }

    impl CoroutineProbe for ScriptedProbe {
        fn dump_coroutines(
            &self,
            _cx: &ManagerContext<'_>,
        ) -> Result<Vec<CoroutineSummary>, FetchError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            let gate = self.gate.lock().take();
            if let Some(gate) = gate {
                let _ = gate.recv();
            }
            self.dumps
                .lock()
                .pop_front()
                .ok_or_else(|| FetchError::Protocol("no dump scripted".to_string()))
        }
    }

    fn view_with(probe: Arc<ScriptedProbe>, config: ViewConfig) -> CoroutineView {
        let session = DebugSession::new(host(), probe, ReconcileConfig::default());
        CoroutineView::new(session, config)
    }

    fn quiet() -> ViewConfig {
        ViewConfig {
            prefetch_frames: false,
            ..ViewConfig::default()
        }
    }

    fn coroutine_path(id: u64) -> Vec<NodeKey> {
        vec![
            NodeKey::Group(DEFAULT_GROUP.to_string()),
            NodeKey::Coroutine(CoroutineId::new(id)),
        ]
    }

    fn child_ids(view: &CoroutineView) -> Vec<CoroutineId> {
        let group = view
            .tree()
            .find(&[NodeKey::Group(DEFAULT_GROUP.to_string())])
            .expect("default group");
        group
            .children()
            .unwrap_or_default()
            .iter()
            .filter_map(|child| match child.kind() {
                NodeKind::Coroutine(record) => Some(record.id()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn pause_shows_coroutines_under_default_group() {
        let probe = Arc::new(ScriptedProbe::new(vec![vec![summary(1, 10), summary(2, 10)]]));
        let view = view_with(Arc::clone(&probe), quiet());
        view.on_paused(Some(main_thread())).await;

        assert_eq!(child_ids(&view), vec![CoroutineId::new(1), CoroutineId::new(2)]);
        assert_eq!(probe.calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn view_state_follows_identity_across_pauses() {
        let probe = Arc::new(ScriptedProbe::new(vec![
            vec![summary(1, 10), summary(2, 10)],
            vec![summary(3, 10), summary(2, 11), summary(1, 10)],
        ]));
        let view = view_with(Arc::clone(&probe), quiet());
        view.on_paused(Some(main_thread())).await;

        let tree = view.tree();
        let frame_path = {
            let mut path = coroutine_path(2);
            path.push(NodeKey::Frame {
                unique_id: "Foo.kt:bar:10".to_string(),
                occurrence: 0,
            });
            path
        };
        assert!(tree.expand_path(&coroutine_path(2)).await.is_some());
        assert!(tree.select(&coroutine_path(2)));
        tree.set_scroll_anchor(Some(frame_path.clone()));

        view.on_paused(Some(main_thread())).await;

        assert_eq!(
            child_ids(&view),
            vec![CoroutineId::new(3), CoroutineId::new(2), CoroutineId::new(1)]
        );
        let reopened = tree.find(&coroutine_path(2)).expect("coroutine 2 survives");
        assert!(reopened.is_expanded());
        assert!(!tree.find(&coroutine_path(1)).is_some_and(|node| node.is_expanded()));
        assert!(!tree.find(&coroutine_path(3)).is_some_and(|node| node.is_expanded()));
        assert_eq!(tree.selection(), Some(coroutine_path(2)));
        // The frame moved to line 11, so its identity is gone.
        assert_eq!(tree.scroll_anchor(), None);
    }

    #[tokio::test]
    async fn result_of_ended_pause_never_reaches_new_tree() {
        let (probe, release) = ScriptedProbe::gated(vec![
            vec![summary(1, 10)],
            vec![summary(2, 10)],
        ]);
        let probe = Arc::new(probe);
        let view = Arc::new(view_with(Arc::clone(&probe), quiet()));

        let first = tokio::spawn({
            let view = Arc::clone(&view);
            async move {
                view.on_paused(Some(main_thread())).await;
            }
        });
        while probe.calls.load(Ordering::Relaxed) == 0 {
            tokio::task::yield_now().await;
        }
        let stale_root = view.tree().root();

        let second_point = view.session().paused(Some(main_thread()));
        release.send(()).expect("gate open");
        first.await.expect("first install finishes");

        let stale_group = stale_root
            .children()
            .and_then(|groups| groups.first().cloned())
            .expect("stale root had its group");
        assert!(stale_group.children().is_none());

        view.tree().install(second_point).await;
        assert_eq!(child_ids(&view), vec![CoroutineId::new(2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn resume_clears_after_delay() {
        let probe = Arc::new(ScriptedProbe::new(vec![vec![summary(1, 10)]]));
        let view = view_with(probe, quiet());
        view.on_paused(Some(main_thread())).await;

        view.on_resumed();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!view.tree().is_cleared());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(view.tree().is_cleared());
    }

    #[tokio::test(start_paused = true)]
    async fn quick_repause_cancels_clear() {
        let probe = Arc::new(ScriptedProbe::new(vec![vec![summary(1, 10)], vec![summary(1, 10)]]));
        let view = view_with(probe, quiet());
        view.on_paused(Some(main_thread())).await;

        view.on_resumed();
        tokio::time::sleep(Duration::from_millis(30)).await;
        view.on_paused(Some(main_thread())).await;

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!view.tree().is_cleared());
        assert_eq!(child_ids(&view), vec![CoroutineId::new(1)]);
    }

    #[test]
    fn resume_from_host_thread_uses_view_runtime() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("test runtime");
        let probe = Arc::new(ScriptedProbe::new(vec![vec![summary(1, 10)]]));
        let session = DebugSession::new(host(), probe, ReconcileConfig::default());
        let config = ViewConfig {
            clear_delay: Duration::from_millis(10),
            ..quiet()
        };
        let view = CoroutineView::with_runtime(session, config, runtime.handle().clone());
        runtime.block_on(view.on_paused(Some(main_thread())));

        view.on_resumed();
        assert!(view.session().current().is_none());
        runtime.block_on(async { tokio::time::sleep(Duration::from_millis(200)).await });
        assert!(view.tree().is_cleared());
    }

    #[tokio::test]
    async fn force_clear_ends_session_point() {
        let probe = Arc::new(ScriptedProbe::new(vec![vec![summary(1, 10)]]));
        let view = view_with(probe, quiet());
        let point = view.on_paused(Some(main_thread())).await;

        view.force_clear();
        assert!(view.tree().is_cleared());
        assert!(!point.is_alive());
        assert!(view.session().current().is_none());
    }
}
