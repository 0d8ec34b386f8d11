use crate::application::conversation::{Command, ConversationEngine, SessionEvent};
use crate::application::ledger::LedgerWriter;
use crate::application::reports::{totals_reply, vendor_detail_reply, ReportAggregator};
use crate::config::Config;
use crate::domain::action::Action;
use crate::domain::session::{Session, SessionId};
use crate::infrastructure::catalog_cache::CatalogCache;
use crate::interfaces::render::{Outbound, Reply};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

const SESSION_QUEUE_DEPTH: usize = 64;

struct SessionHandle {
    sender: mpsc::Sender<SessionEvent>,
    generation: u64,
    join: JoinHandle<()>,
}

struct Inner {
    engine: ConversationEngine,
    catalog: Arc<CatalogCache>,
    writer: Arc<LedgerWriter>,
    reports: Arc<ReportAggregator>,
    outbound: mpsc::Sender<Outbound>,
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
    idle_timeout: Duration,
    generations: AtomicU64,
}

/// Routes inbound events onto per-session queues.
///
/// The first event for a session id spawns a worker task that owns the
/// `Session` struct and consumes that session's events one at a time —
/// cross-session concurrency with strict per-session ordering, and no
/// shared mutable session state anywhere. Workers evict themselves after
/// the idle timeout; the map entry is recreated on the next event.
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    pub fn new(
        catalog: Arc<CatalogCache>,
        writer: Arc<LedgerWriter>,
        reports: Arc<ReportAggregator>,
        outbound: mpsc::Sender<Outbound>,
        config: &Config,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                engine: ConversationEngine::new(config.max_quantity_per_item),
                catalog,
                writer,
                reports,
                outbound,
                sessions: RwLock::new(HashMap::new()),
                idle_timeout: config.session_idle_timeout,
                generations: AtomicU64::new(0),
            }),
        }
    }

    /// Parse and enqueue one inbound payload. Unparseable payloads are
    /// answered directly as expired input and never reach a worker.
    pub async fn dispatch(&self, session: SessionId, payload: &str) {
        let Some(action) = Action::parse(payload) else {
            warn!(%session, payload, "unparseable payload treated as expired input");
            self.inner
                .send_reply(session, Reply::text("That action is no longer available."))
                .await;
            return;
        };
        self.send_event(session, SessionEvent::Action(action)).await;
    }

    async fn send_event(&self, session: SessionId, mut event: SessionEvent) {
        loop {
            let sender = self.inner.ensure_worker(session).await;
            match sender.send(event).await {
                Ok(()) => return,
                // Worker evicted between lookup and send; retry on a fresh one.
                Err(mpsc::error::SendError(returned)) => event = returned,
            }
        }
    }

    /// Stop accepting work and wait for every session worker to finish its
    /// queue, including in-flight commits, so nothing durable is lost.
    pub async fn shutdown(self) {
        let handles: Vec<(SessionId, SessionHandle)> = {
            let mut sessions = self.inner.sessions.write().await;
            sessions.drain().collect()
        };
        for (_, handle) in &handles {
            let _ = handle.sender.send(SessionEvent::Shutdown).await;
        }
        for (id, handle) in handles {
            if let Err(err) = handle.join.await {
                error!(session = %id, error = %err, "session worker panicked");
            }
        }
    }
}

impl Inner {
    async fn ensure_worker(self: &Arc<Self>, id: SessionId) -> mpsc::Sender<SessionEvent> {
        {
            let sessions = self.sessions.read().await;
            if let Some(handle) = sessions.get(&id)
                && !handle.sender.is_closed()
            {
                return handle.sender.clone();
            }
        }

        let mut sessions = self.sessions.write().await;
        if let Some(handle) = sessions.get(&id)
            && !handle.sender.is_closed()
        {
            return handle.sender.clone();
        }

        let (sender, receiver) = mpsc::channel(SESSION_QUEUE_DEPTH);
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let join = tokio::spawn(run_session(
            Arc::clone(self),
            id,
            generation,
            sender.clone(),
            receiver,
        ));
        sessions.insert(
            id,
            SessionHandle {
                sender: sender.clone(),
                generation,
                join,
            },
        );
        sender
    }

    async fn send_reply(&self, session: SessionId, reply: Reply) {
        if self.outbound.send(Outbound { session, reply }).await.is_err() {
            warn!(%session, "outbound channel closed, dropping reply");
        }
    }

    /// Administrative actions run here so ledger scans and source fetches
    /// never pass through the pure engine. Executed on the session's worker,
    /// so a slow report blocks only the session that asked for it.
    async fn handle_admin(&self, action: Action) -> Reply {
        match action {
            Action::Refresh => match self.catalog.refresh_now().await {
                Ok(()) => Reply::text("Catalog refreshed."),
                Err(err) => {
                    warn!(error = %err, "manual catalog refresh failed");
                    Reply::text("Catalog refresh failed; the previous data is still in use.")
                }
            },
            Action::Totals => {
                let today = Utc::now().date_naive();
                let mut reply = Reply::text("Totals for which day?")
                    .with_button("Today", Action::TotalsFor(today));
                if let Some(yesterday) = today.pred_opt() {
                    reply = reply.with_button("Yesterday", Action::TotalsFor(yesterday));
                }
                reply
            }
            Action::TotalsFor(day) => {
                let catalog = self.catalog.snapshot().await;
                match self.reports.daily_totals(day).await {
                    Ok(totals) => totals_reply(day, &totals, catalog.as_deref()),
                    Err(err) => {
                        warn!(error = %err, %day, "daily totals query failed");
                        Reply::text("Could not read the ledger; try again shortly.")
                    }
                }
            }
            Action::VendorTotals(vendor_id, day) => {
                let catalog = self.catalog.snapshot().await;
                match self.reports.vendor_day_detail(vendor_id, day).await {
                    Ok(detail) => vendor_detail_reply(vendor_id, day, &detail, catalog.as_deref()),
                    Err(err) => {
                        warn!(error = %err, %vendor_id, %day, "vendor detail query failed");
                        Reply::text("Could not read the ledger; try again shortly.")
                    }
                }
            }
            _ => Reply::text("That action is no longer available."),
        }
    }
}

fn is_admin(action: Action) -> bool {
    matches!(
        action,
        Action::Refresh | Action::Totals | Action::TotalsFor(_) | Action::VendorTotals(..)
    )
}

async fn run_session(
    inner: Arc<Inner>,
    id: SessionId,
    generation: u64,
    self_sender: mpsc::Sender<SessionEvent>,
    mut receiver: mpsc::Receiver<SessionEvent>,
) {
    info!(session = %id, "session worker started");
    let mut session = Session::new(id);
    let mut draining = false;

    loop {
        let event = match tokio::time::timeout(inner.idle_timeout, receiver.recv()).await {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(_) => {
                info!(session = %id, "session idle, evicting");
                break;
            }
        };

        match event {
            SessionEvent::Shutdown => {
                if session.pending_commit.is_none() {
                    break;
                }
                // A checkout is still in flight; keep consuming events until
                // its completion lands so the cashier's sale is settled.
                draining = true;
            }
            SessionEvent::Action(action) if is_admin(action) => {
                let reply = inner.handle_admin(action).await;
                inner.send_reply(id, reply).await;
            }
            event => {
                let snapshot = inner.catalog.snapshot().await;
                let outcome = inner.engine.handle(&mut session, event, snapshot.as_deref());

                if let Some(Command::Commit {
                    nonce,
                    cancel,
                    cart,
                    vendor_id,
                    mode,
                }) = outcome.command
                {
                    match &snapshot {
                        Some(snapshot) => {
                            let writer = Arc::clone(&inner.writer);
                            let back = self_sender.clone();
                            let snapshot = Arc::clone(snapshot);
                            tokio::spawn(async move {
                                let result = writer
                                    .commit(id, nonce, &cart, vendor_id, mode, &snapshot, &cancel)
                                    .await;
                                if back
                                    .send(SessionEvent::CommitCompleted { nonce, result })
                                    .await
                                    .is_err()
                                {
                                    warn!(
                                        session = %id,
                                        %nonce,
                                        "session gone before commit completion was delivered"
                                    );
                                }
                            });
                        }
                        None => {
                            // The engine only dispatches commits against a
                            // live snapshot; reaching here means a bug.
                            error!(session = %id, %nonce, "commit command without a snapshot");
                        }
                    }
                }

                if let Some(reply) = outcome.reply {
                    inner.send_reply(id, reply).await;
                }

                if draining && session.pending_commit.is_none() {
                    break;
                }
            }
        }
    }

    // Deregister, but only our own generation; a replacement worker may
    // already own the map slot.
    let mut sessions = inner.sessions.write().await;
    if sessions.get(&id).is_some_and(|h| h.generation == generation) {
        sessions.remove(&id);
    }
    drop(sessions);
    info!(session = %id, "session worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::reports::ReportAggregator;
    use crate::domain::catalog::test_fixtures::{product, vendor};
    use crate::infrastructure::in_memory::{InMemoryCatalogSource, InMemoryLedgerStore};
    use std::time::Duration;

    async fn harness(
        idle_timeout: Duration,
    ) -> (Dispatcher, mpsc::Receiver<Outbound>, Arc<InMemoryLedgerStore>) {
        let source = Arc::new(InMemoryCatalogSource::new(
            vec![vendor(1, "Aster Press")],
            vec![product(101, 1, "Field Notes", 300)],
        ));
        let catalog = Arc::new(CatalogCache::new(source));
        catalog.refresh_now().await.unwrap();

        let store = Arc::new(InMemoryLedgerStore::new());
        let config = Config {
            session_idle_timeout: idle_timeout,
            ..Config::default()
        };
        let writer = Arc::new(LedgerWriter::new(
            store.clone(),
            config.commit_retry.clone(),
        ));
        let reports = Arc::new(ReportAggregator::new(store.clone(), 64));
        let (out_tx, out_rx) = mpsc::channel(256);
        let dispatcher = Dispatcher::new(catalog, writer, reports, out_tx, &config);
        (dispatcher, out_rx, store)
    }

    #[tokio::test]
    async fn test_unparseable_payload_is_answered_not_crashed() {
        let (dispatcher, mut out_rx, _) = harness(Duration::from_secs(30)).await;
        dispatcher.dispatch(SessionId(1), "definitely_not_an_action").await;

        let out = out_rx.recv().await.unwrap();
        assert_eq!(out.session, SessionId(1));
        assert!(out.reply.text.contains("no longer available"));
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_replies_preserve_per_session_order() {
        let (dispatcher, mut out_rx, _) = harness(Duration::from_secs(30)).await;
        dispatcher.dispatch(SessionId(1), "start").await;
        dispatcher.dispatch(SessionId(1), "vendor:1").await;
        dispatcher.dispatch(SessionId(1), "product:101").await;
        dispatcher.shutdown().await;

        let first = out_rx.recv().await.unwrap().reply;
        let second = out_rx.recv().await.unwrap().reply;
        let third = out_rx.recv().await.unwrap().reply;
        assert!(first.text.contains("Choose a vendor"));
        assert!(second.text.contains("Products from Aster Press"));
        assert!(third.text.contains("Field Notes"));
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_inflight_commit() {
        let (dispatcher, mut out_rx, store) = harness(Duration::from_secs(30)).await;
        for payload in ["start", "vendor:1", "product:101", "add", "checkout", "pay:cash"] {
            dispatcher.dispatch(SessionId(1), payload).await;
        }
        dispatcher.shutdown().await;

        assert_eq!(store.len().await, 1);
        let mut saw_confirmation = false;
        while let Ok(out) = out_rx.try_recv() {
            if out.reply.text.contains("Sale recorded") {
                saw_confirmation = true;
            }
        }
        assert!(saw_confirmation);
    }

    #[tokio::test]
    async fn test_idle_eviction_recreates_worker_on_next_event() {
        let (dispatcher, mut out_rx, _) = harness(Duration::from_millis(50)).await;
        dispatcher.dispatch(SessionId(1), "start").await;
        let _ = out_rx.recv().await;

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(dispatcher.inner.sessions.read().await.is_empty());

        // A fresh worker starts from Idle again.
        dispatcher.dispatch(SessionId(1), "start").await;
        let out = out_rx.recv().await.unwrap();
        assert!(out.reply.text.contains("Choose a vendor"));
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_admin_totals_reply() {
        let (dispatcher, mut out_rx, _) = harness(Duration::from_secs(30)).await;
        let today = Utc::now().date_naive();
        dispatcher
            .dispatch(SessionId(9), &format!("totals:{today}"))
            .await;
        dispatcher.shutdown().await;

        let out = out_rx.recv().await.unwrap();
        assert!(out.reply.text.contains("No sales recorded"));
    }
}
