//! Daemon: Main runtime orchestrator.
//!
//! The Daemon ties together all components:
//! - Risk Gate (admission of proposed opens)
//! - Position workers (one per open position)
//! - Event Bus (internal communication)
//! - Collaborator ports (market data, execution, exposure, rules)
//!
//! # Lifecycle
//!
//! 1. Load configuration
//! 2. Initialize components
//! 3. Restore open positions from store, spawn a worker for each
//! 4. Main loop (shutdown event or SIGINT)
//! 5. Graceful shutdown: cancel workers and wait for them

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use precog_domain::{
    Event, EventId, MarketSnapshot, OpenPosition, OpenProposal, Position, PositionId, Sport, TrailingStopState,
    UserId,
};
use precog_engine::{PositionMonitor, RiskDecision, RiskGate, RiskRejection};
use precog_exec::{
    ExecutionPort, ExposurePort, MarketDataPort, RulesPort, StubExecution, StubExposure, StubMarketData, StubRules,
};
use precog_store::{MemoryStore, Store};

use crate::config::Config;
use crate::error::{DaemonError, DaemonResult};
use crate::event_bus::{DaemonEvent, EventBus, OpenDecision};
use crate::metrics::Metrics;
use crate::worker::{PositionWorker, WorkerContext, WorkerHandle, WorkerMailbox, WorkerReport};

// =============================================================================
// Collaborators
// =============================================================================

/// External collaborators the daemon talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub market_data: Arc<dyn MarketDataPort>,
    pub execution: Arc<dyn ExecutionPort>,
    pub exposure: Arc<dyn ExposurePort>,
    pub rules: Arc<dyn RulesPort>,
}

impl Collaborators {
    /// Stub collaborators with default limits and rules.
    pub fn stub() -> Self {
        Self {
            market_data: Arc::new(StubMarketData::new()),
            execution: Arc::new(StubExecution::new()),
            exposure: Arc::new(StubExposure::new()),
            rules: Arc::new(StubRules::default()),
        }
    }
}

/// Result of asking the daemon to open a position.
#[derive(Debug, Clone)]
pub enum OpenOutcome {
    /// Admitted, persisted and monitored
    Admitted(Position),
    /// Rejected by the Risk Gate
    Rejected(RiskRejection),
}

// =============================================================================
// Daemon
// =============================================================================

/// The main Precog daemon.
pub struct Daemon<S: Store + 'static> {
    /// Configuration
    config: Config,
    /// Store
    store: Arc<S>,
    /// Ports
    collaborators: Collaborators,
    /// Event bus
    event_bus: Arc<EventBus>,
    /// Metrics
    metrics: Arc<Metrics>,
    gate: RiskGate,
    monitor: PositionMonitor,
    /// Running workers by position
    workers: RwLock<HashMap<PositionId, WorkerHandle>>,
    /// Parent token of every worker
    shutdown_token: CancellationToken,
}

impl Daemon<MemoryStore> {
    /// Create a new daemon with stub components (for testing/development).
    pub fn new_stub(config: Config) -> DaemonResult<Self> {
        Self::new(config, Arc::new(MemoryStore::new()), Collaborators::stub())
    }
}

impl<S: Store + 'static> Daemon<S> {
    /// Create a new daemon with provided components.
    pub fn new(config: Config, store: Arc<S>, collaborators: Collaborators) -> DaemonResult<Self> {
        let event_bus = Arc::new(EventBus::new(config.runtime.event_bus_capacity));
        let metrics = Arc::new(Metrics::new()?);
        let monitor = PositionMonitor::new(config.cadence);

        Ok(Self {
            config,
            store,
            collaborators,
            event_bus,
            metrics,
            gate: RiskGate::new(),
            monitor,
            workers: RwLock::new(HashMap::new()),
            shutdown_token: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Number of registered workers (running or finished but not yet reaped).
    pub async fn worker_count(&self) -> usize {
        self.workers.read().await.len()
    }

    /// Run the daemon.
    ///
    /// This method blocks until shutdown is requested (SIGINT or
    /// `request_shutdown`).
    pub async fn run(&self) -> DaemonResult<()> {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            environment = %self.config.environment,
            "Starting Precog daemon"
        );

        // 1. Restore open positions
        self.restore_positions().await?;

        // 2. Subscribe to event bus
        let mut event_receiver = self.event_bus.subscribe();

        // 3. Main loop
        info!("Entering main event loop");
        loop {
            tokio::select! {
                event = event_receiver.recv() => {
                    match event {
                        Some(Ok(DaemonEvent::Shutdown)) | None => {
                            info!("Shutdown event received");
                            break;
                        },
                        Some(Ok(DaemonEvent::WorkerStopped { position_id, exit })) => {
                            info!(position_id = %position_id, exit = ?exit, "Worker finished");
                        },
                        Some(Ok(_)) => {},
                        Some(Err(lag_msg)) => {
                            warn!(%lag_msg, "Event receiver lagged");
                        },
                    }
                }

                _ = self.shutdown_token.cancelled() => {
                    info!("Shutdown token cancelled");
                    break;
                }

                // Handle shutdown signals
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        // 4. Graceful shutdown
        self.shutdown().await?;

        Ok(())
    }

    /// Ask a running daemon to shut down.
    pub fn request_shutdown(&self) {
        self.event_bus.send(DaemonEvent::Shutdown);
        self.shutdown_token.cancel();
    }

    /// Spawn a worker for every open position in the store.
    pub async fn restore_positions(&self) -> DaemonResult<usize> {
        let positions = self.store.positions().find_open().await?;
        let mut restored = 0;

        for position in positions {
            match self.spawn_worker(position).await {
                Ok(()) => restored += 1,
                Err(DaemonError::PositionAlreadyMonitored(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        if restored > 0 {
            info!(count = restored, "Restored open positions from store");
        } else {
            info!("No open positions to restore");
        }

        Ok(restored)
    }

    /// Run the Risk Gate on a proposed open.
    ///
    /// Exposure and limits are fetched from the collaborators; the decision
    /// is audited, counted and published.
    pub async fn propose_open(&self, user: UserId, proposal: &OpenProposal) -> DaemonResult<RiskDecision> {
        let exposure = self.collaborators.exposure.exposure(user, proposal).await?;
        let limits = self.collaborators.rules.limits(user).await?;

        let decision = self.gate.evaluate_open(proposal, &exposure, &limits);
        self.metrics.record_gate_decision(&decision);

        let now = Utc::now();
        let event = match decision.rejection() {
            None => {
                info!(user_id = %user, ticker = %proposal.ticker, size = %proposal.size, "Open admitted");
                Event::OpenAdmitted {
                    user_id: user,
                    ticker: proposal.ticker.clone(),
                    size: proposal.size,
                    timestamp: now,
                }
            },
            Some(rejection) => {
                info!(
                    user_id = %user,
                    ticker = %proposal.ticker,
                    size = %proposal.size,
                    check = %rejection.check,
                    reason = %rejection.reason,
                    "Open rejected"
                );
                Event::OpenRejected {
                    user_id: user,
                    ticker: proposal.ticker.clone(),
                    size: proposal.size,
                    check: rejection.check.number(),
                    reason: rejection.reason.clone(),
                    timestamp: now,
                }
            },
        };
        self.store.events().append(&event).await?;

        self.event_bus.send(DaemonEvent::OpenDecided(OpenDecision {
            user_id: user,
            ticker: proposal.ticker.clone(),
            admitted: decision.is_admitted(),
            check: decision.rejection().map(|r| r.check.number()),
            reason: decision.rejection().map(|r| r.reason.clone()),
            timestamp: now,
        }));

        Ok(decision)
    }

    /// Gate, persist and start monitoring a new position.
    ///
    /// The proposal size is the position's entry notional. A trailing stop is
    /// attached when the position's exit rules configure one.
    pub async fn open_position(
        &self,
        params: OpenPosition,
        sport: Option<Sport>,
        event_id: EventId,
    ) -> DaemonResult<OpenOutcome> {
        let user = params.user_id;
        let mut position = Position::open(params, None);

        let proposal = OpenProposal {
            size: position.notional(),
            sport,
            event_id,
            ticker: position.ticker.clone(),
        };

        if let RiskDecision::Reject(rejection) = self.propose_open(user, &proposal).await? {
            return Ok(OpenOutcome::Rejected(rejection));
        }

        let rules = self.collaborators.rules.exit_rules(&position).await?;
        if let Some(trailing) = &rules.trailing_stop {
            position.trailing_stop = Some(TrailingStopState::inactive(
                trailing.activation_threshold,
                position.entry_time,
            ));
        }

        self.store.positions().save(&position).await?;
        self.spawn_worker(position.clone()).await?;

        Ok(OpenOutcome::Admitted(position))
    }

    /// Start monitoring an already-persisted open position.
    ///
    /// # Errors
    /// `PositionAlreadyMonitored` if a live worker already owns the position.
    pub async fn monitor_position(&self, position_id: PositionId) -> DaemonResult<()> {
        if self.workers.read().await.contains_key(&position_id) {
            return Err(DaemonError::PositionAlreadyMonitored(position_id));
        }

        let position = self
            .store
            .positions()
            .find_by_id(position_id)
            .await?
            .ok_or(DaemonError::PositionNotFound(position_id))?;

        self.spawn_worker(position).await
    }

    /// Push a market snapshot to every worker monitoring its ticker.
    ///
    /// Returns the number of workers that accepted it.
    pub async fn dispatch(&self, snapshot: MarketSnapshot) -> usize {
        self.reap_finished().await;

        // Sends may wait on a full inbox, so never hold the map guard across them
        let mailboxes: Vec<WorkerMailbox> = self
            .workers
            .read()
            .await
            .values()
            .filter(|h| h.ticker() == &snapshot.ticker)
            .map(WorkerHandle::mailbox)
            .collect();

        let mut delivered = 0;
        for mailbox in mailboxes {
            match mailbox.tick(snapshot.clone()).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(position_id = %mailbox.position_id(), error = %e, "Tick not delivered"),
            }
        }
        delivered
    }

    /// Stop one position's worker and wait for it.
    pub async fn stop_position(&self, position_id: PositionId) -> DaemonResult<WorkerReport> {
        let handle = self
            .workers
            .write()
            .await
            .remove(&position_id)
            .ok_or(DaemonError::PositionNotFound(position_id))?;

        // A worker that already finished has closed its inbox
        if let Err(e) = handle.stop().await {
            warn!(position_id = %position_id, error = %e, "Worker already finished");
        }
        handle.join().await
    }

    /// Remove handles of workers that have finished.
    pub async fn reap_finished(&self) -> usize {
        let mut workers = self.workers.write().await;
        let before = workers.len();
        workers.retain(|_, handle| !handle.is_finished());
        before - workers.len()
    }

    /// Spawn a worker unless a live one already owns the position.
    ///
    /// The check and the insert share one write guard.
    async fn spawn_worker(&self, position: Position) -> DaemonResult<()> {
        let mut workers = self.workers.write().await;
        match workers.entry(position.id) {
            Entry::Occupied(slot) if !slot.get().is_finished() => {
                Err(DaemonError::PositionAlreadyMonitored(position.id))
            },
            // Finished but not yet reaped
            Entry::Occupied(mut slot) => {
                slot.insert(self.start_worker(position));
                Ok(())
            },
            Entry::Vacant(slot) => {
                slot.insert(self.start_worker(position));
                Ok(())
            },
        }
    }

    fn start_worker(&self, position: Position) -> WorkerHandle {
        let ctx = WorkerContext {
            store: self.store.clone(),
            market_data: self.collaborators.market_data.clone(),
            execution: self.collaborators.execution.clone(),
            rules: self.collaborators.rules.clone(),
            event_bus: self.event_bus.clone(),
            metrics: self.metrics.clone(),
            monitor: self.monitor.clone(),
            min_trailing_distance: self.config.min_trailing_distance,
        };

        PositionWorker::spawn(
            position,
            ctx,
            self.config.runtime.worker_inbox_capacity,
            self.shutdown_token.child_token(),
        )
    }

    /// Graceful shutdown.
    async fn shutdown(&self) -> DaemonResult<()> {
        info!("Initiating graceful shutdown");

        self.shutdown_token.cancel();

        let handles: Vec<WorkerHandle> = self.workers.write().await.drain().map(|(_, h)| h).collect();
        let count = handles.len();
        for handle in handles {
            if let Err(e) = handle.join().await {
                warn!(error = %e, "Worker did not stop cleanly");
            }
        }

        info!(workers = count, "Shutdown complete");
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
