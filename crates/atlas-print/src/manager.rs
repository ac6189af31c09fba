//! # Print Job Manager
//!
//! Owns the print job state machine: dispatch, bounded automatic retry, and
//! the operator escalation path.
//!
//! ## Escalation Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Print Job Manager                                   │
//! │                                                                         │
//! │  submit(order, role, copies)                                            │
//! │       │                                                                 │
//! │       ├── no device for role ──► NoPrinterAssigned (fail fast,          │
//! │       │                          no job created)                        │
//! │       ▼                                                                 │
//! │  render artifact ─► PENDING ─► PRINTING ─► copies dispatched            │
//! │                                            sequentially                 │
//! │       │                                                                 │
//! │       ├── all copies ok ──► SUCCESS (kept in bounded history)           │
//! │       └── any copy fails ─► FAILED, transport error captured            │
//! │                                                                         │
//! │  retry(job_id)            valid while retry_count < max_retries;        │
//! │                           the count is incremented BEFORE dispatch      │
//! │                                                                         │
//! │  retry_count == max_retries: the manager NEVER goes further on its      │
//! │  own. The operator chooses exactly one of:                              │
//! │    • RetryNow       fresh retry budget, immediate re-dispatch           │
//! │    • QueueForLater  parked in the persisted queue, drained on demand    │
//! │    • Skip           ABANDONED, history only                             │
//! │                                                                         │
//! │  SINGLE-FLIGHT: one worker consumes all commands; two submissions can   │
//! │  never interleave on the same device state.                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use atlas_core::{
    AutoPrintConfig, PrintFormat, PrintJob, PrintJobStatus, PrintJobType, PrinterAssignments,
    ReceiptOrder,
};
use atlas_db::Database;

use crate::error::{PrintError, PrintResult};
use crate::render;
use crate::transport::{PrintPayload, PrintTransport};

// =============================================================================
// Configuration
// =============================================================================

/// Print manager behavior settings.
#[derive(Debug, Clone)]
pub struct PrintManagerConfig {
    /// Automatic retries allowed per job before escalation.
    pub max_retries: u32,

    /// Artifact format this terminal prints.
    pub format: PrintFormat,

    /// Jobs kept in the in-memory history ring.
    pub history_limit: usize,

    /// Per-copy dispatch timeout (seconds); an elapsed timeout fails the
    /// job like any other transport error.
    pub dispatch_timeout_secs: u64,
}

impl Default for PrintManagerConfig {
    fn default() -> Self {
        PrintManagerConfig {
            max_retries: 2,
            format: PrintFormat::Thermal,
            history_limit: 50,
            dispatch_timeout_secs: 20,
        }
    }
}

// =============================================================================
// Escalation
// =============================================================================

/// The three choices offered to the operator once retries are exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationChoice {
    /// Re-dispatch immediately with a fresh retry budget.
    RetryNow,
    /// Park in the persisted retry queue, to be drained on demand.
    QueueForLater,
    /// Abandon; the job stays in history for audit.
    Skip,
}

// =============================================================================
// Commands / Handle
// =============================================================================

enum PrintCommand {
    Submit {
        order: Box<ReceiptOrder>,
        job_type: PrintJobType,
        copies: u32,
        reply: oneshot::Sender<PrintResult<PrintJob>>,
    },
    Retry {
        job_id: String,
        reply: oneshot::Sender<PrintResult<PrintJob>>,
    },
    Escalate {
        job_id: String,
        choice: EscalationChoice,
        reply: oneshot::Sender<PrintResult<PrintJob>>,
    },
    DrainParked {
        reply: oneshot::Sender<PrintResult<Vec<PrintJob>>>,
    },
    History {
        limit: usize,
        reply: oneshot::Sender<Vec<PrintJob>>,
    },
}

/// Handle for talking to the print job manager worker.
#[derive(Clone)]
pub struct PrintManagerHandle {
    command_tx: mpsc::Sender<PrintCommand>,
    shutdown_tx: mpsc::Sender<()>,
}

impl PrintManagerHandle {
    /// Prints `copies` copies of the order's document on the device
    /// assigned to `job_type`.
    ///
    /// A transport failure is not an `Err`: the returned job carries
    /// `Failed` status and the captured error, which is what the
    /// operator-facing dialog renders. `Err` is reserved for configuration
    /// and validation problems (no device assigned, bad copy count, no
    /// artifact).
    pub async fn submit(
        &self,
        order: ReceiptOrder,
        job_type: PrintJobType,
        copies: u32,
    ) -> PrintResult<PrintJob> {
        self.send(|reply| PrintCommand::Submit {
            order: Box::new(order),
            job_type,
            copies,
            reply,
        })
        .await
    }

    /// Automatic retry; rejected once the retry budget is spent.
    pub async fn retry(&self, job_id: &str) -> PrintResult<PrintJob> {
        let job_id = job_id.to_string();
        self.send(|reply| PrintCommand::Retry { job_id, reply }).await
    }

    /// Runs the configured auto-print behavior for a committed order: a
    /// no-op when disabled, otherwise the customer receipt (configured copy
    /// count) plus an optional kitchen ticket.
    ///
    /// With `auto_retry` on, failed jobs burn their automatic retry budget
    /// here; whatever is still `Failed` afterwards is exactly what the
    /// operator-facing escalation dialog shows.
    pub async fn auto_print(
        &self,
        order: ReceiptOrder,
        config: &AutoPrintConfig,
    ) -> PrintResult<Vec<PrintJob>> {
        if !config.enabled {
            return Ok(vec![]);
        }

        let mut jobs = Vec::new();

        let receipt = self
            .submit_with_auto_retry(order.clone(), PrintJobType::Receipt, config.effective_copies(), config)
            .await?;
        jobs.push(receipt);

        if config.print_kitchen_ticket {
            let ticket = self
                .submit_with_auto_retry(order, PrintJobType::Kitchen, 1, config)
                .await?;
            jobs.push(ticket);
        }

        Ok(jobs)
    }

    async fn submit_with_auto_retry(
        &self,
        order: ReceiptOrder,
        job_type: PrintJobType,
        copies: u32,
        config: &AutoPrintConfig,
    ) -> PrintResult<PrintJob> {
        let mut job = self.submit(order, job_type, copies).await?;

        if config.auto_retry {
            // Bounded by whichever budget is tighter, the job's or the
            // auto-print configuration's.
            while job.can_retry() && job.retry_count < config.max_retries {
                job = self.retry(&job.id).await?;
            }
        }

        Ok(job)
    }

    /// Applies the operator's escalation decision to an exhausted job.
    pub async fn escalate(
        &self,
        job_id: &str,
        choice: EscalationChoice,
    ) -> PrintResult<PrintJob> {
        let job_id = job_id.to_string();
        self.send(|reply| PrintCommand::Escalate {
            job_id,
            choice,
            reply,
        })
        .await
    }

    /// Re-dispatches every parked job; returns them with their outcomes.
    pub async fn drain_parked(&self) -> PrintResult<Vec<PrintJob>> {
        self.send(|reply| PrintCommand::DrainParked { reply }).await
    }

    /// Most recent jobs, newest first.
    pub async fn history(&self, limit: usize) -> PrintResult<Vec<PrintJob>> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(PrintCommand::History { limit, reply: tx })
            .await
            .map_err(|_| PrintError::ChannelClosed("Print command channel closed".into()))?;
        rx.await
            .map_err(|_| PrintError::ChannelClosed("Print manager dropped reply".into()))
    }

    /// Triggers graceful shutdown.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }

    async fn send<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<PrintResult<T>>) -> PrintCommand,
    ) -> PrintResult<T> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(make(tx))
            .await
            .map_err(|_| PrintError::ChannelClosed("Print command channel closed".into()))?;
        rx.await
            .map_err(|_| PrintError::ChannelClosed("Print manager dropped reply".into()))?
    }
}

// =============================================================================
// Print Job Manager
// =============================================================================

/// History slot: the job plus its artifact, kept for retries/reprints.
struct HistoryEntry {
    job: PrintJob,
    payload: PrintPayload,
}

/// The print worker. Spawn [`PrintJobManager::run`] as a tokio task.
pub struct PrintJobManager {
    db: Arc<Database>,
    transport: Arc<dyn PrintTransport>,
    assignments: PrinterAssignments,
    config: PrintManagerConfig,
    /// Bounded ring, newest at the back. Ephemeral: only parked jobs are
    /// persisted.
    history: VecDeque<HistoryEntry>,
    command_rx: mpsc::Receiver<PrintCommand>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl PrintJobManager {
    /// Creates the manager and its handle.
    pub fn new(
        db: Arc<Database>,
        transport: Arc<dyn PrintTransport>,
        assignments: PrinterAssignments,
        config: PrintManagerConfig,
    ) -> (Self, PrintManagerHandle) {
        let (command_tx, command_rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let manager = PrintJobManager {
            db,
            transport,
            assignments,
            config,
            history: VecDeque::new(),
            command_rx,
            shutdown_rx,
        };

        let handle = PrintManagerHandle {
            command_tx,
            shutdown_tx,
        };

        (manager, handle)
    }

    /// Runs the command loop until shutdown.
    pub async fn run(mut self) {
        info!("Print job manager starting");

        loop {
            tokio::select! {
                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        PrintCommand::Submit { order, job_type, copies, reply } => {
                            let result = self.handle_submit(*order, job_type, copies).await;
                            let _ = reply.send(result);
                        }
                        PrintCommand::Retry { job_id, reply } => {
                            let result = self.handle_retry(&job_id).await;
                            let _ = reply.send(result);
                        }
                        PrintCommand::Escalate { job_id, choice, reply } => {
                            let result = self.handle_escalate(&job_id, choice).await;
                            let _ = reply.send(result);
                        }
                        PrintCommand::DrainParked { reply } => {
                            let result = self.handle_drain_parked().await;
                            let _ = reply.send(result);
                        }
                        PrintCommand::History { limit, reply } => {
                            let _ = reply.send(self.recent_jobs(limit));
                        }
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Print job manager shutting down");
                    break;
                }
            }
        }

        info!("Print job manager stopped");
    }

    // =========================================================================
    // Command Handlers
    // =========================================================================

    async fn handle_submit(
        &mut self,
        order: ReceiptOrder,
        job_type: PrintJobType,
        copies: u32,
    ) -> PrintResult<PrintJob> {
        if copies == 0 || copies > AutoPrintConfig::MAX_COPIES {
            return Err(PrintError::InvalidCopies {
                requested: copies,
                max: AutoPrintConfig::MAX_COPIES,
            });
        }

        // Configuration errors fail fast, before a job exists.
        let device = self
            .assignments
            .device_for(job_type)
            .ok_or(PrintError::NoPrinterAssigned { job_type })?
            .to_string();

        let payload = render::render(&order, job_type, self.config.format)?;

        let mut job = PrintJob::new(
            &order.order_id,
            &order.order_number,
            job_type,
            self.config.format,
            self.config.max_retries,
        );

        info!(
            job_id = %job.id,
            order = %job.order_number,
            role = %job_type,
            device = %device,
            copies,
            "Dispatching print job"
        );

        self.dispatch(&mut job, &device, &payload, copies).await;
        self.push_history(job.clone(), payload);

        Ok(job)
    }

    async fn handle_retry(&mut self, job_id: &str) -> PrintResult<PrintJob> {
        let index = self
            .history_index(job_id)
            .ok_or_else(|| PrintError::JobNotFound(job_id.to_string()))?;

        {
            let job = &self.history[index].job;
            if job.needs_escalation() {
                return Err(PrintError::RetriesExhausted {
                    job_id: job_id.to_string(),
                    max_retries: job.max_retries,
                });
            }
            if !job.can_retry() {
                return Err(PrintError::NotEscalatable(job_id.to_string()));
            }
        }

        let payload = self.history[index].payload.clone();
        let mut job = self.history[index].job.clone();
        let device = self
            .assignments
            .device_for(job.job_type)
            .map(str::to_string)
            .ok_or(PrintError::NoPrinterAssigned {
                job_type: job.job_type,
            })?;

        // Count first: a crash between here and the dispatch must read as
        // an attempt made, never as one in hand.
        job.retry_count += 1;
        self.history[index].job.retry_count = job.retry_count;

        debug!(job_id = %job.id, attempt = job.retry_count, "Retrying print job");

        self.dispatch(&mut job, &device, &payload, 1).await;
        self.history[index].job = job.clone();

        Ok(job)
    }

    async fn handle_escalate(
        &mut self,
        job_id: &str,
        choice: EscalationChoice,
    ) -> PrintResult<PrintJob> {
        let index = self
            .history_index(job_id)
            .ok_or_else(|| PrintError::JobNotFound(job_id.to_string()))?;

        if !self.history[index].job.needs_escalation() {
            return Err(PrintError::NotEscalatable(job_id.to_string()));
        }

        let payload = self.history[index].payload.clone();
        let mut job = self.history[index].job.clone();

        match choice {
            EscalationChoice::RetryNow => {
                let device = self
                    .assignments
                    .device_for(job.job_type)
                    .map(str::to_string)
                    .ok_or(PrintError::NoPrinterAssigned {
                        job_type: job.job_type,
                    })?;

                // Explicit operator decision: the automatic budget restarts.
                job.retry_count = 0;
                info!(job_id = %job.id, "Operator chose retry-now");
                self.dispatch(&mut job, &device, &payload, 1).await;
            }

            EscalationChoice::QueueForLater => {
                job.status = PrintJobStatus::Queued;
                job.updated_at = chrono::Utc::now();
                let artifact = serde_json::to_string(&payload)?;
                self.db.print_queue().park(&job, &artifact).await?;
                info!(job_id = %job.id, "Operator parked job for later");
            }

            EscalationChoice::Skip => {
                job.status = PrintJobStatus::Abandoned;
                job.updated_at = chrono::Utc::now();
                info!(job_id = %job.id, "Operator abandoned job");
            }
        }

        self.history[index].job = job.clone();
        Ok(job)
    }

    async fn handle_drain_parked(&mut self) -> PrintResult<Vec<PrintJob>> {
        let parked = self.db.print_queue().list_parked().await?;

        if parked.is_empty() {
            return Ok(vec![]);
        }

        info!(count = parked.len(), "Draining parked print jobs");

        let mut drained = Vec::new();

        for (mut job, artifact) in parked {
            let payload: PrintPayload = match serde_json::from_str(&artifact) {
                Ok(p) => p,
                Err(e) => {
                    warn!(job_id = %job.id, ?e, "Parked artifact unreadable, skipping");
                    continue;
                }
            };

            let Some(device) = self.assignments.device_for(job.job_type).map(str::to_string)
            else {
                warn!(job_id = %job.id, role = %job.job_type, "No device for parked job");
                continue;
            };

            self.dispatch(&mut job, &device, &payload, 1).await;

            if job.status == PrintJobStatus::Success {
                self.db.print_queue().remove(&job.id).await?;
                self.push_history(job.clone(), payload);
            } else {
                // Stays parked; refresh the stored error for the operator.
                job.status = PrintJobStatus::Queued;
                self.db.print_queue().park(&job, &artifact).await?;
            }

            drained.push(job);
        }

        Ok(drained)
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Sends `copies` sequential print calls. Success only if every copy
    /// succeeds; the first failure stops the sequence and is captured on
    /// the job.
    async fn dispatch(
        &self,
        job: &mut PrintJob,
        device: &str,
        payload: &PrintPayload,
        copies: u32,
    ) {
        job.status = PrintJobStatus::Printing;
        job.updated_at = chrono::Utc::now();

        let bound = Duration::from_secs(self.config.dispatch_timeout_secs);

        for copy in 1..=copies {
            let outcome = tokio::time::timeout(bound, self.transport.print(device, payload)).await;

            let error = match outcome {
                Ok(Ok(())) => {
                    debug!(job_id = %job.id, copy, "Copy printed");
                    continue;
                }
                Ok(Err(e)) => e,
                Err(_) => PrintError::Timeout {
                    device: device.to_string(),
                    seconds: self.config.dispatch_timeout_secs,
                },
            };

            warn!(job_id = %job.id, copy, error = %error, "Print dispatch failed");
            job.status = PrintJobStatus::Failed;
            job.error = Some(error.to_string());
            job.updated_at = chrono::Utc::now();
            return;
        }

        job.status = PrintJobStatus::Success;
        job.error = None;
        job.updated_at = chrono::Utc::now();
    }

    // =========================================================================
    // History
    // =========================================================================

    fn history_index(&self, job_id: &str) -> Option<usize> {
        self.history.iter().position(|e| e.job.id == job_id)
    }

    fn push_history(&mut self, job: PrintJob, payload: PrintPayload) {
        if let Some(index) = self.history_index(&job.id) {
            self.history[index].job = job;
            return;
        }

        self.history.push_back(HistoryEntry { job, payload });
        while self.history.len() > self.config.history_limit {
            self.history.pop_front();
        }
    }

    fn recent_jobs(&self, limit: usize) -> Vec<PrintJob> {
        self.history
            .iter()
            .rev()
            .take(limit)
            .map(|e| e.job.clone())
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use atlas_core::{PrinterDevice, ReceiptLine};
    use atlas_db::DbConfig;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Transport fake with a per-call failure script; `None` = success.
    struct ScriptedTransport {
        script: Mutex<VecDeque<Option<String>>>,
        calls: AtomicUsize,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Option<&str>>) -> Arc<Self> {
            Arc::new(ScriptedTransport {
                script: Mutex::new(script.into_iter().map(|s| s.map(String::from)).collect()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PrintTransport for ScriptedTransport {
        async fn print(&self, device_id: &str, _payload: &PrintPayload) -> PrintResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.script.lock().unwrap().pop_front() {
                Some(Some(message)) => Err(PrintError::TransportFailed {
                    device: device_id.to_string(),
                    message,
                }),
                _ => Ok(()),
            }
        }

        async fn list_devices(&self) -> PrintResult<Vec<PrinterDevice>> {
            Ok(vec![])
        }
    }

    fn order() -> ReceiptOrder {
        ReceiptOrder {
            order_id: "ord-1".to_string(),
            order_number: "A-1001".to_string(),
            lines: vec![ReceiptLine {
                name: "Americano".to_string(),
                quantity: 1,
                unit_price_cents: 350,
                line_total_cents: 350,
            }],
            subtotal_cents: 350,
            tax_cents: 29,
            total_cents: 379,
            payment_method: "cash".to_string(),
            created_at: Utc::now(),
            document_path: None,
        }
    }

    fn assignments() -> PrinterAssignments {
        let mut a = PrinterAssignments::new();
        a.assign(PrintJobType::Receipt, "EPSON-TM20");
        a.assign(PrintJobType::Kitchen, "STAR-SP700");
        a
    }

    async fn setup(
        transport: Arc<ScriptedTransport>,
        config: PrintManagerConfig,
    ) -> (Arc<Database>, PrintManagerHandle) {
        let db = Arc::new(Database::new(DbConfig::in_memory()).await.unwrap());
        let (manager, handle) = PrintJobManager::new(db.clone(), transport, assignments(), config);
        tokio::spawn(manager.run());
        (db, handle)
    }

    #[tokio::test]
    async fn test_submit_success() {
        let transport = ScriptedTransport::new(vec![]);
        let (_db, handle) = setup(transport.clone(), PrintManagerConfig::default()).await;

        let job = handle
            .submit(order(), PrintJobType::Receipt, 1)
            .await
            .unwrap();

        assert_eq!(job.status, PrintJobStatus::Success);
        assert_eq!(job.retry_count, 0);
        assert!(job.error.is_none());
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_submit_without_assignment_fails_fast() {
        let transport = ScriptedTransport::new(vec![]);
        let db = Arc::new(Database::new(DbConfig::in_memory()).await.unwrap());
        let (manager, handle) = PrintJobManager::new(
            db,
            transport.clone(),
            PrinterAssignments::new(),
            PrintManagerConfig::default(),
        );
        tokio::spawn(manager.run());

        let result = handle.submit(order(), PrintJobType::Receipt, 1).await;
        assert!(matches!(
            result,
            Err(PrintError::NoPrinterAssigned {
                job_type: PrintJobType::Receipt
            })
        ));

        // Never reached the device, and no job was recorded.
        assert_eq!(transport.calls(), 0);
        assert!(handle.history(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_copies_dispatch_sequentially_and_stop_on_failure() {
        let transport = ScriptedTransport::new(vec![None, Some("paper jam")]);
        let (_db, handle) = setup(transport.clone(), PrintManagerConfig::default()).await;

        let job = handle
            .submit(order(), PrintJobType::Receipt, 3)
            .await
            .unwrap();

        assert_eq!(job.status, PrintJobStatus::Failed);
        assert!(job.error.as_deref().unwrap().contains("paper jam"));
        // Copy 1 ok, copy 2 failed, copy 3 never attempted.
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_invalid_copy_count() {
        let transport = ScriptedTransport::new(vec![]);
        let (_db, handle) = setup(transport, PrintManagerConfig::default()).await;

        assert!(matches!(
            handle.submit(order(), PrintJobType::Receipt, 0).await,
            Err(PrintError::InvalidCopies { .. })
        ));
        assert!(matches!(
            handle.submit(order(), PrintJobType::Receipt, 6).await,
            Err(PrintError::InvalidCopies { .. })
        ));
    }

    #[tokio::test]
    async fn test_retry_bound_then_queue_for_later() {
        // Scenario: fail on submit and both retries (max_retries = 2), then
        // the third automatic retry is refused and the operator parks it.
        let transport =
            ScriptedTransport::new(vec![Some("offline"), Some("offline"), Some("offline")]);
        let (db, handle) = setup(transport.clone(), PrintManagerConfig::default()).await;

        let job = handle
            .submit(order(), PrintJobType::Receipt, 1)
            .await
            .unwrap();
        assert_eq!(job.status, PrintJobStatus::Failed);

        let job = handle.retry(&job.id).await.unwrap();
        assert_eq!(job.retry_count, 1);
        assert_eq!(job.status, PrintJobStatus::Failed);

        let job = handle.retry(&job.id).await.unwrap();
        assert_eq!(job.retry_count, 2);
        assert_eq!(job.status, PrintJobStatus::Failed);

        // Budget spent: automatic retry refused, job still failed/visible.
        assert!(matches!(
            handle.retry(&job.id).await,
            Err(PrintError::RetriesExhausted { .. })
        ));
        let history = handle.history(10).await.unwrap();
        assert_eq!(history[0].status, PrintJobStatus::Failed);

        // Operator parks it: persisted, and out of the failed view.
        let parked = handle
            .escalate(&job.id, EscalationChoice::QueueForLater)
            .await
            .unwrap();
        assert_eq!(parked.status, PrintJobStatus::Queued);
        assert_eq!(db.print_queue().count().await.unwrap(), 1);

        let history = handle.history(10).await.unwrap();
        assert_eq!(history[0].status, PrintJobStatus::Queued);
    }

    #[tokio::test]
    async fn test_escalate_requires_exhausted_budget() {
        let transport = ScriptedTransport::new(vec![Some("offline")]);
        let (_db, handle) = setup(transport, PrintManagerConfig::default()).await;

        let job = handle
            .submit(order(), PrintJobType::Receipt, 1)
            .await
            .unwrap();
        assert_eq!(job.status, PrintJobStatus::Failed);

        // One retry still available: escalation is premature.
        assert!(matches!(
            handle.escalate(&job.id, EscalationChoice::Skip).await,
            Err(PrintError::NotEscalatable(_))
        ));
    }

    #[tokio::test]
    async fn test_escalate_retry_now_resets_budget() {
        let transport = ScriptedTransport::new(vec![
            Some("offline"),
            Some("offline"),
            Some("offline"),
            None,
        ]);
        let (_db, handle) = setup(transport.clone(), PrintManagerConfig::default()).await;

        let job = handle
            .submit(order(), PrintJobType::Receipt, 1)
            .await
            .unwrap();
        handle.retry(&job.id).await.unwrap();
        let job = handle.retry(&job.id).await.unwrap();
        assert!(job.needs_escalation());

        let job = handle
            .escalate(&job.id, EscalationChoice::RetryNow)
            .await
            .unwrap();
        assert_eq!(job.status, PrintJobStatus::Success);
        assert_eq!(job.retry_count, 0);
    }

    #[tokio::test]
    async fn test_escalate_skip_abandons() {
        let transport =
            ScriptedTransport::new(vec![Some("offline"), Some("offline"), Some("offline")]);
        let (db, handle) = setup(transport, PrintManagerConfig::default()).await;

        let job = handle
            .submit(order(), PrintJobType::Receipt, 1)
            .await
            .unwrap();
        handle.retry(&job.id).await.unwrap();
        handle.retry(&job.id).await.unwrap();

        let job = handle
            .escalate(&job.id, EscalationChoice::Skip)
            .await
            .unwrap();
        assert_eq!(job.status, PrintJobStatus::Abandoned);

        // Audit trail only: nothing persisted, job visible in history.
        assert_eq!(db.print_queue().count().await.unwrap(), 0);
        let history = handle.history(10).await.unwrap();
        assert_eq!(history[0].status, PrintJobStatus::Abandoned);
    }

    #[tokio::test]
    async fn test_drain_parked_prints_and_unparks() {
        let transport =
            ScriptedTransport::new(vec![Some("offline"), Some("offline"), Some("offline")]);
        let (db, handle) = setup(transport, PrintManagerConfig::default()).await;

        let job = handle
            .submit(order(), PrintJobType::Receipt, 1)
            .await
            .unwrap();
        handle.retry(&job.id).await.unwrap();
        handle.retry(&job.id).await.unwrap();
        handle
            .escalate(&job.id, EscalationChoice::QueueForLater)
            .await
            .unwrap();
        assert_eq!(db.print_queue().count().await.unwrap(), 1);

        // Simulate a restart: a fresh manager over the same database, with
        // a printer that works again.
        handle.shutdown().await;
        let working = ScriptedTransport::new(vec![]);
        let (manager, handle) = PrintJobManager::new(
            db.clone(),
            working.clone(),
            assignments(),
            PrintManagerConfig::default(),
        );
        tokio::spawn(manager.run());

        let drained = handle.drain_parked().await.unwrap();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].status, PrintJobStatus::Success);
        assert_eq!(db.print_queue().count().await.unwrap(), 0);
        assert_eq!(working.calls(), 1);
    }

    #[tokio::test]
    async fn test_drain_parked_keeps_job_on_repeat_failure() {
        let transport =
            ScriptedTransport::new(vec![Some("offline"), Some("offline"), Some("offline"), Some("still offline")]);
        let (db, handle) = setup(transport, PrintManagerConfig::default()).await;

        let job = handle
            .submit(order(), PrintJobType::Receipt, 1)
            .await
            .unwrap();
        handle.retry(&job.id).await.unwrap();
        handle.retry(&job.id).await.unwrap();
        handle
            .escalate(&job.id, EscalationChoice::QueueForLater)
            .await
            .unwrap();

        let drained = handle.drain_parked().await.unwrap();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].status, PrintJobStatus::Queued);

        // Still parked, with the fresh error recorded.
        let parked = db.print_queue().list_parked().await.unwrap();
        assert_eq!(parked.len(), 1);
        assert!(parked[0].0.error.as_deref().unwrap().contains("still offline"));
    }

    #[tokio::test]
    async fn test_auto_print_disabled_is_noop() {
        let transport = ScriptedTransport::new(vec![]);
        let (_db, handle) = setup(transport.clone(), PrintManagerConfig::default()).await;

        let jobs = handle
            .auto_print(order(), &AutoPrintConfig::default())
            .await
            .unwrap();

        assert!(jobs.is_empty());
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_auto_print_receipt_and_kitchen_ticket() {
        let transport = ScriptedTransport::new(vec![]);
        let (_db, handle) = setup(transport.clone(), PrintManagerConfig::default()).await;

        let config = AutoPrintConfig {
            enabled: true,
            copies: 2,
            print_kitchen_ticket: true,
            ..Default::default()
        };
        let jobs = handle.auto_print(order(), &config).await.unwrap();

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].job_type, PrintJobType::Receipt);
        assert_eq!(jobs[1].job_type, PrintJobType::Kitchen);
        assert!(jobs.iter().all(|j| j.status == PrintJobStatus::Success));
        // Two receipt copies + one kitchen ticket.
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_auto_print_burns_retry_budget_automatically() {
        let transport = ScriptedTransport::new(vec![Some("warming up"), Some("warming up")]);
        let (_db, handle) = setup(transport.clone(), PrintManagerConfig::default()).await;

        let config = AutoPrintConfig {
            enabled: true,
            ..Default::default()
        };
        let jobs = handle.auto_print(order(), &config).await.unwrap();

        // Submit failed, two automatic retries followed, the second worked.
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].status, PrintJobStatus::Success);
        assert_eq!(jobs[0].retry_count, 2);
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_history_is_bounded_and_newest_first() {
        let transport = ScriptedTransport::new(vec![]);
        let config = PrintManagerConfig {
            history_limit: 3,
            ..Default::default()
        };
        let (_db, handle) = setup(transport, config).await;

        let mut ids = Vec::new();
        for i in 0..5 {
            let mut o = order();
            o.order_number = format!("A-100{i}");
            let job = handle.submit(o, PrintJobType::Receipt, 1).await.unwrap();
            ids.push(job.id);
        }

        let history = handle.history(10).await.unwrap();
        assert_eq!(history.len(), 3);
        // Newest first; the two oldest fell off the ring.
        assert_eq!(history[0].order_number, "A-1004");
        assert_eq!(history[2].order_number, "A-1002");
    }
}
