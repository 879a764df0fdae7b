//! Debounced position persistence.
//!
//! Dragging a note produces a stream of position reports. Each report is
//! applied to the store at once, but persisting every one of them would
//! flood the backend, so writes are coalesced per note.
//!
//! ## Design
//!
//! One background task owns all timing state:
//! 1. `report()` applies the position locally and sends a non-blocking
//!    message to the task
//! 2. an unsettled report (re)arms the note's deadline; a settled report
//!    drops the deadline and writes immediately
//! 3. when a deadline passes, the latest reported coordinates are written
//! 4. writes run one at a time on the task, so two writes for the same
//!    note are never in flight and the latest report always wins
//!
//! A settled report whose coordinates the store already knows the backend
//! holds is skipped. That knowledge lives in the store, so direct writes
//! through `save_position` and reloads keep it current.
//!
//! The viewport has a single slot with the same rules. Shutting down (or
//! dropping the handle) cancels every pending deadline without writing.
//!
//! ## Usage
//!
//! ```ignore
//! let sync = PositionSync::new(store.clone(), Duration::from_millis(300));
//! sync.report("note-1", 12.0, 40.0, false).await?; // while dragging
//! sync.report("note-1", 15.0, 42.0, true).await?;  // on drop
//! ```

use crate::coordinator::KnowledgeStore;
use crate::error::StoreError;
use crate::layout::{circle_positions, LayoutConfig};
use crate::models::{EntityKind, Position, Viewport};
use crate::store::Action;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

enum SyncCommand {
    Position {
        note_id: String,
        x: f64,
        y: f64,
        settled: bool,
    },
    Viewport {
        viewport: Viewport,
        settled: bool,
    },
    /// Drop pending writes for these notes
    Forget(Vec<String>),
    /// Write everything pending now
    Flush(oneshot::Sender<()>),
}

/// Summary of an [`PositionSync::auto_layout`] run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AutoLayoutReport {
    pub placed: Vec<(String, Position)>,
    /// Notes whose position could not be persisted
    pub failed: Vec<String>,
    /// True when a failure triggered a reload from the backend
    pub reconciled: bool,
}

/// Debounced writer of note positions and the viewport.
///
/// Spawns a background tokio task that lives until the handle is dropped or
/// [`shutdown`](Self::shutdown) is called.
pub struct PositionSync {
    store: KnowledgeStore,
    tx: mpsc::UnboundedSender<SyncCommand>,
    cancel: CancellationToken,
    layout: LayoutConfig,
}

impl PositionSync {
    /// Create a sync that waits `debounce` after the last unsettled report
    /// before writing
    pub fn new(store: KnowledgeStore, debounce: Duration) -> Self {
        Self::with_layout(store, debounce, LayoutConfig::default())
    }

    pub fn with_layout(store: KnowledgeStore, debounce: Duration, layout: LayoutConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        tokio::spawn(Self::run_loop(store.clone(), rx, debounce, cancel.clone()));
        Self {
            store,
            tx,
            cancel,
            layout,
        }
    }

    /// Report a note's position.
    ///
    /// The position is visible in the store immediately. `settled` marks the
    /// end of an interaction and forces an immediate write.
    pub async fn report(
        &self,
        note_id: &str,
        x: f64,
        y: f64,
        settled: bool,
    ) -> Result<(), StoreError> {
        if !(x.is_finite() && y.is_finite()) {
            return Err(StoreError::validation("Position coordinates must be finite"));
        }
        let Some(previous) = self
            .store
            .read(|s| s.note(note_id).map(|_| s.position_of(note_id)))
            .await
        else {
            return Err(StoreError::not_found(EntityKind::Notes, note_id));
        };

        let position = Position {
            x,
            y,
            z_index: previous.and_then(|p| p.z_index),
        };
        self.store.apply_position(note_id, position).await;
        self.send(SyncCommand::Position {
            note_id: note_id.to_string(),
            x,
            y,
            settled,
        });
        Ok(())
    }

    /// Report the viewport; same debounce rules as [`report`](Self::report)
    pub async fn report_viewport(&self, viewport: Viewport, settled: bool) -> Result<(), StoreError> {
        if !(viewport.x.is_finite() && viewport.y.is_finite() && viewport.zoom > 0.0) {
            return Err(StoreError::validation("Invalid viewport"));
        }
        self.store
            .dispatch([Action::SetViewport(viewport)])
            .await;
        self.send(SyncCommand::Viewport { viewport, settled });
        Ok(())
    }

    /// Write every pending report now and wait for the writes to finish
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        self.send(SyncCommand::Flush(done_tx));
        let _ = done_rx.await;
    }

    /// Cancel every pending write. Reports made afterwards are applied
    /// locally but never persisted.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Place `note_ids` on a circle and persist each position.
    ///
    /// Positions are applied locally first, then written one by one. A
    /// failed write is logged and the remaining ones still run; if any
    /// failed, the store is reconciled once at the end.
    pub async fn auto_layout(&self, note_ids: &[String]) -> AutoLayoutReport {
        let known: Vec<String> = self
            .store
            .read(|s| {
                note_ids
                    .iter()
                    .filter(|id| s.note(id).is_some())
                    .cloned()
                    .collect()
            })
            .await;
        self.send(SyncCommand::Forget(known.clone()));

        let placed = circle_positions(&known, &self.layout);
        for (note_id, position) in &placed {
            self.store.apply_position(note_id, *position).await;
        }

        let mut failed = Vec::new();
        let mut first_error = None;
        for (note_id, position) in &placed {
            if let Err(error) = self
                .store
                .try_persist_position(note_id, position.x, position.y)
                .await
            {
                warn!(note_id = %note_id, error = %error, "Auto-layout position save failed");
                failed.push(note_id.clone());
                first_error.get_or_insert(error);
            }
        }

        let reconciled = match first_error {
            Some(error) => {
                self.store.reconcile_positions(error).await;
                true
            }
            None => false,
        };
        info!(
            placed = placed.len(),
            failed = failed.len(),
            "Auto-layout finished"
        );
        AutoLayoutReport {
            placed,
            failed,
            reconciled,
        }
    }

    fn send(&self, command: SyncCommand) {
        if self.tx.send(command).is_err() {
            debug!("Position sync loop is gone, report not persisted");
        }
    }

    /// Background loop: hold deadlines and write when they pass.
    async fn run_loop(
        store: KnowledgeStore,
        mut rx: mpsc::UnboundedReceiver<SyncCommand>,
        debounce: Duration,
        cancel: CancellationToken,
    ) {
        let mut pending: HashMap<String, (f64, f64, Instant)> = HashMap::new();
        let mut pending_viewport: Option<(Viewport, Instant)> = None;

        loop {
            let next_deadline = pending
                .values()
                .map(|(_, _, deadline)| *deadline)
                .chain(pending_viewport.map(|(_, deadline)| deadline))
                .min();

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    if !pending.is_empty() || pending_viewport.is_some() {
                        debug!(
                            dropped = pending.len(),
                            viewport = pending_viewport.is_some(),
                            "Position sync cancelled with pending writes"
                        );
                    }
                    break;
                }

                command = rx.recv() => {
                    let Some(command) = command else { break };
                    match command {
                        SyncCommand::Position { note_id, x, y, settled: false } => {
                            pending.insert(note_id, (x, y, Instant::now() + debounce));
                        }
                        SyncCommand::Position { note_id, x, y, settled: true } => {
                            let superseded = pending.remove(&note_id).is_some();
                            if !superseded && store.position_saved(&note_id, x, y).await {
                                debug!(note_id = %note_id, "Position unchanged, skipping write");
                                continue;
                            }
                            Self::write_position(&store, note_id, x, y).await;
                        }
                        SyncCommand::Viewport { viewport, settled: false } => {
                            pending_viewport = Some((viewport, Instant::now() + debounce));
                        }
                        SyncCommand::Viewport { viewport, settled: true } => {
                            let superseded = pending_viewport.take().is_some();
                            if !superseded && store.viewport_saved(viewport).await {
                                continue;
                            }
                            Self::write_viewport(&store, viewport).await;
                        }
                        SyncCommand::Forget(note_ids) => {
                            for note_id in &note_ids {
                                pending.remove(note_id);
                            }
                        }
                        SyncCommand::Flush(done) => {
                            let mut due: Vec<(String, (f64, f64, Instant))> = pending.drain().collect();
                            due.sort_by_key(|(_, (_, _, deadline))| *deadline);
                            for (note_id, (x, y, _)) in due {
                                Self::write_position(&store, note_id, x, y).await;
                            }
                            if let Some((viewport, _)) = pending_viewport.take() {
                                Self::write_viewport(&store, viewport).await;
                            }
                            let _ = done.send(());
                        }
                    }
                }

                _ = sleep_until(next_deadline.unwrap_or_else(Instant::now)), if next_deadline.is_some() => {
                    let now = Instant::now();
                    let mut due: Vec<(String, f64, f64, Instant)> = pending
                        .iter()
                        .filter(|(_, (_, _, deadline))| *deadline <= now)
                        .map(|(id, (x, y, deadline))| (id.clone(), *x, *y, *deadline))
                        .collect();
                    due.sort_by_key(|(_, _, _, deadline)| *deadline);
                    for (note_id, x, y, _) in due {
                        pending.remove(&note_id);
                        Self::write_position(&store, note_id, x, y).await;
                    }
                    if let Some((viewport, deadline)) = pending_viewport {
                        if deadline <= now {
                            pending_viewport = None;
                            Self::write_viewport(&store, viewport).await;
                        }
                    }
                }
            }
        }
    }

    async fn write_position(store: &KnowledgeStore, note_id: String, x: f64, y: f64) {
        if store.read(|s| s.note(&note_id).is_none()).await {
            debug!(note_id = %note_id, "Note is gone, dropping position write");
            return;
        }
        store.persist_position(&note_id, x, y).await;
    }

    async fn write_viewport(store: &KnowledgeStore, viewport: Viewport) {
        store.persist_viewport(viewport).await;
    }
}

impl Drop for PositionSync {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCall, BackendOp, NoteBackend};
    use crate::test_helpers::{loaded_store, seeded_backend};

    const DEBOUNCE: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn test_unsettled_burst_coalesces_into_one_write() {
        let backend = seeded_backend();
        let store = loaded_store(backend.clone()).await;
        let sync = PositionSync::new(store.clone(), DEBOUNCE);

        for i in 0..5 {
            sync.report("n-c", i as f64, i as f64 * 2.0, false)
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        // Applied locally right away
        assert_eq!(
            store.read(|s| s.position_of("n-c")).await,
            Some(Position::new(4.0, 8.0))
        );
        assert!(backend.position_writes("n-c").await.is_empty());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(backend.position_writes("n-c").await, vec![(4.0, 8.0)]);
    }

    #[tokio::test]
    async fn test_settled_report_flushes_immediately() {
        let backend = seeded_backend();
        let store = loaded_store(backend.clone()).await;
        let sync = PositionSync::new(store, Duration::from_secs(60));

        sync.report("n-a", 1.0, 1.0, false).await.unwrap();
        sync.report("n-a", 2.0, 3.0, true).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        // The pending unsettled write was superseded, not written
        assert_eq!(backend.position_writes("n-a").await, vec![(2.0, 3.0)]);
    }

    #[tokio::test]
    async fn test_repeated_settle_writes_once() {
        let backend = seeded_backend();
        let store = loaded_store(backend.clone()).await;
        let sync = PositionSync::new(store, DEBOUNCE);

        sync.report("n-b", 7.0, 7.0, true).await.unwrap();
        sync.report("n-b", 7.0, 7.0, true).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(backend.position_writes("n-b").await, vec![(7.0, 7.0)]);
    }

    #[tokio::test]
    async fn test_settle_after_direct_save_is_written() {
        let backend = seeded_backend();
        let store = loaded_store(backend.clone()).await;
        let sync = PositionSync::new(store.clone(), DEBOUNCE);

        sync.report("n-b", 7.0, 7.0, true).await.unwrap();
        sync.flush().await;
        store
            .save_position("n-b", 9.0, 9.0)
            .await
            .unwrap()
            .into_result()
            .unwrap();
        sync.report("n-b", 7.0, 7.0, true).await.unwrap();
        sync.flush().await;

        assert_eq!(
            backend.position_writes("n-b").await,
            vec![(7.0, 7.0), (9.0, 9.0), (7.0, 7.0)]
        );
        let stored = backend
            .list_positions()
            .await
            .unwrap()
            .into_iter()
            .find(|(id, _)| id == "n-b")
            .map(|(_, p)| (p.x, p.y));
        assert_eq!(stored, Some((7.0, 7.0)));
        assert_eq!(
            store.read(|s| s.position_of("n-b")).await,
            Some(Position::new(7.0, 7.0))
        );
    }

    #[tokio::test]
    async fn test_settle_at_loaded_position_is_skipped() {
        let backend = seeded_backend();
        let store = loaded_store(backend.clone()).await;
        let sync = PositionSync::new(store, DEBOUNCE);

        sync.report("n-a", 10.0, 10.0, true).await.unwrap();
        sync.flush().await;

        assert!(backend.position_writes("n-a").await.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_cancels_pending_writes() {
        let backend = seeded_backend();
        let store = loaded_store(backend.clone()).await;
        let sync = PositionSync::new(store, DEBOUNCE);

        sync.report("n-a", 99.0, 99.0, false).await.unwrap();
        sync.shutdown();
        assert!(sync.is_shut_down());
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(backend.position_writes("n-a").await.is_empty());
    }

    #[tokio::test]
    async fn test_drop_cancels_pending_writes() {
        let backend = seeded_backend();
        let store = loaded_store(backend.clone()).await;
        {
            let sync = PositionSync::new(store, DEBOUNCE);
            sync.report("n-a", 5.0, 5.0, false).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(backend.position_writes("n-a").await.is_empty());
    }

    #[tokio::test]
    async fn test_flush_writes_pending_now() {
        let backend = seeded_backend();
        let store = loaded_store(backend.clone()).await;
        let sync = PositionSync::new(store, Duration::from_secs(60));

        sync.report("n-a", 1.0, 2.0, false).await.unwrap();
        sync.report_viewport(
            Viewport {
                x: 3.0,
                y: 4.0,
                zoom: 1.2,
            },
            false,
        )
        .await
        .unwrap();
        sync.flush().await;

        assert_eq!(backend.position_writes("n-a").await, vec![(1.0, 2.0)]);
        assert!(backend.writes().await.contains(&BackendCall::SaveViewport(Viewport {
            x: 3.0,
            y: 4.0,
            zoom: 1.2
        })));
    }

    #[tokio::test]
    async fn test_viewport_debounce() {
        let backend = seeded_backend();
        let store = loaded_store(backend.clone()).await;
        let sync = PositionSync::new(store.clone(), DEBOUNCE);

        for zoom in [0.9, 1.0, 1.1] {
            sync.report_viewport(Viewport { x: 0.0, y: 0.0, zoom }, false)
                .await
                .unwrap();
        }
        assert_eq!(store.read(|s| s.view().viewport.zoom).await, 1.1);
        tokio::time::sleep(Duration::from_millis(300)).await;

        let viewport_writes: Vec<BackendCall> = backend
            .writes()
            .await
            .into_iter()
            .filter(|c| matches!(c, BackendCall::SaveViewport(_)))
            .collect();
        assert_eq!(
            viewport_writes,
            vec![BackendCall::SaveViewport(Viewport {
                x: 0.0,
                y: 0.0,
                zoom: 1.1
            })]
        );
    }

    #[tokio::test]
    async fn test_report_unknown_note_is_rejected() {
        let store = loaded_store(seeded_backend()).await;
        let sync = PositionSync::new(store, DEBOUNCE);
        assert!(matches!(
            sync.report("ghost", 1.0, 1.0, true).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_auto_layout_places_on_circle() {
        let backend = seeded_backend();
        let store = loaded_store(backend.clone()).await;
        let sync = PositionSync::new(store.clone(), DEBOUNCE);

        let ids: Vec<String> = vec!["n-a".into(), "n-b".into(), "n-c".into()];
        let report = sync.auto_layout(&ids).await;

        assert!(report.failed.is_empty());
        assert!(!report.reconciled);
        assert_eq!(report.placed.len(), 3);
        let (first_id, first) = &report.placed[0];
        assert_eq!(first_id, "n-a");
        // radius = 200 + 20 * 3, angle 0
        assert!((first.x - 660.0).abs() < 1e-9);
        assert!((first.y - 300.0).abs() < 1e-9);
        for (note_id, position) in &report.placed {
            assert_eq!(store.read(|s| s.position_of(note_id)).await, Some(*position));
            assert_eq!(backend.position_writes(note_id).await.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_auto_layout_continues_after_a_failed_save() {
        let backend = seeded_backend();
        let store = loaded_store(backend.clone()).await;
        let sync = PositionSync::new(store.clone(), DEBOUNCE);
        backend.fail_times(BackendOp::SavePosition, 1).await;

        let ids: Vec<String> = vec!["n-a".into(), "n-b".into(), "n-c".into()];
        let report = sync.auto_layout(&ids).await;

        assert_eq!(report.failed, vec!["n-a".to_string()]);
        assert!(report.reconciled);
        assert!(backend.position_writes("n-a").await.is_empty());
        assert_eq!(backend.position_writes("n-b").await.len(), 1);
        assert_eq!(backend.position_writes("n-c").await.len(), 1);

        // Reconciled against the backend: n-a is back at its stored spot
        store
            .read(|s| {
                assert_eq!(s.position_of("n-a"), Some(Position::new(10.0, 10.0)));
                assert_eq!(s.position_of("n-b"), Some(report.placed[1].1));
                assert!(s.status(EntityKind::Positions).error.is_some());
            })
            .await;
    }
}
