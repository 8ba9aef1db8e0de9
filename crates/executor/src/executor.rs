//! The query executor - an active object owning one query cursor.
//!
//! Every operation on the cursor runs on a single dedicated worker thread.
//! Callers on any thread queue a [`Command`] and block until the worker has
//! run it; the bounded FIFO queue is the only serialization there is.
//!
//! Two timeouts are in play. The fetch timeout travels inside
//! [`Command::Next`] to the log source, which answers with a
//! [`BatchStatus::Timeout`](evtlog_core::BatchStatus) status. The fail-safe
//! timeout bounds how long a caller waits for the worker at all and turns
//! into [`Error::ExecutorTimeout`] when it expires.

use crate::batch::QueryBatch;
use crate::command::{Command, Output};
use crate::completion::{completion, Pending, Responder};
use crate::queue::{BoundedQueue, PushError};
use evtlog_core::{
    codes, Direction, Error, LogSource, QueryCursor, QueryLocator, Result, SeekOrigin,
};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Default number of queued commands before callers block
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Default time a caller waits for the worker before giving up
pub const DEFAULT_FAILSAFE_TIMEOUT: Duration = Duration::from_secs(60);

/// Executor settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Capacity of the command queue
    pub queue_capacity: usize,
    /// How long a caller waits for its command before `ExecutorTimeout`
    pub failsafe_timeout: Duration,
    /// Name of the worker thread
    pub thread_name: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            failsafe_timeout: DEFAULT_FAILSAFE_TIMEOUT,
            thread_name: "evtlog-query".to_string(),
        }
    }
}

struct Envelope {
    command: Command,
    reply: Responder<Output>,
}

/// A command that has been queued and not yet waited on.
pub struct PendingCommand {
    pending: Pending<Output>,
    failsafe: Duration,
}

impl PendingCommand {
    /// Block until the worker has run the command.
    pub fn wait(self) -> Result<Output> {
        self.pending.wait(self.failsafe)
    }

    pub fn is_complete(&self) -> bool {
        self.pending.is_complete()
    }
}

/// Active object serializing every operation on one query cursor.
///
/// `QueryExecutor` is `Send + Sync`; share it behind an `Arc` to issue
/// commands from several threads. Dropping it stops the worker.
pub struct QueryExecutor {
    queue: Arc<BoundedQueue<Envelope>>,
    worker: Option<JoinHandle<()>>,
    failsafe_timeout: Duration,
}

impl QueryExecutor {
    /// Start an executor with default settings.
    pub fn new(source: Arc<dyn LogSource>) -> Result<Self> {
        Self::with_config(source, ExecutorConfig::default())
    }

    /// Start an executor and its worker thread.
    pub fn with_config(source: Arc<dyn LogSource>, config: ExecutorConfig) -> Result<Self> {
        let queue = Arc::new(BoundedQueue::new(config.queue_capacity));
        let worker_queue = Arc::clone(&queue);
        let worker = std::thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || Worker::new(source).run(&worker_queue))
            .map_err(|e| Error::internal(format!("failed to spawn query worker: {}", e)))?;

        debug!(
            target: "evtlog::executor",
            thread = %config.thread_name,
            capacity = queue.capacity(),
            "query executor started"
        );
        Ok(Self {
            queue,
            worker: Some(worker),
            failsafe_timeout: config.failsafe_timeout,
        })
    }

    /// Queue a command without waiting for it.
    ///
    /// Blocks while the queue is full.
    pub fn submit(&self, command: Command) -> Result<PendingCommand> {
        let (reply, pending) = completion();
        self.queue
            .push(Envelope { command, reply })
            .map_err(|_| Error::ExecutorClosed)?;
        Ok(PendingCommand {
            pending,
            failsafe: self.failsafe_timeout,
        })
    }

    /// Queue a command and wait for its output.
    pub fn execute(&self, command: Command) -> Result<Output> {
        self.submit(command)?.wait()
    }

    /// Open a query, replacing any open cursor.
    pub fn query(&self, locator: QueryLocator, query: &str, direction: Direction) -> Result<()> {
        self.execute(Command::Query {
            locator,
            query: query.to_string(),
            direction,
        })?
        .into_unit()
    }

    /// Fetch the next batch of records.
    pub fn next(&self, max: usize, timeout_ms: u32) -> Result<QueryBatch> {
        self.execute(Command::Next { max, timeout_ms })?.into_batch()
    }

    /// Reposition the open cursor.
    pub fn seek(&self, position: i64, origin: SeekOrigin) -> Result<()> {
        self.execute(Command::Seek { position, origin })?.into_unit()
    }

    /// Close the open cursor, if any.
    pub fn close(&self) -> Result<()> {
        self.execute(Command::Close)?.into_unit()
    }

    pub fn failsafe_timeout(&self) -> Duration {
        self.failsafe_timeout
    }

    /// Commands queued and not yet picked up by the worker
    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

impl Drop for QueryExecutor {
    fn drop(&mut self) {
        let worker = match self.worker.take() {
            Some(worker) => worker,
            None => return,
        };
        // Enqueueing the sentinel and waiting for it share one fail-safe deadline.
        let deadline = Instant::now() + self.failsafe_timeout;
        let (reply, pending) = completion();
        let envelope = Envelope {
            command: Command::Shutdown,
            reply,
        };
        let acknowledged = match self.queue.push_until(envelope, deadline) {
            Ok(()) => pending.wait(deadline.saturating_duration_since(Instant::now())),
            Err(PushError::Closed(_)) => Err(Error::ExecutorClosed),
            Err(PushError::Full(_)) => {
                for rest in self.queue.close() {
                    rest.reply.send(Err(Error::ExecutorClosed));
                }
                Err(Error::ExecutorTimeout {
                    waited_ms: self.failsafe_timeout.as_millis() as u64,
                })
            }
        };
        match acknowledged {
            Ok(_) | Err(Error::ExecutorClosed) => {
                if worker.join().is_err() {
                    error!(target: "evtlog::executor", "query worker exited by panic");
                }
            }
            Err(e) => {
                // The worker is stuck in a command; leave the thread detached.
                warn!(target: "evtlog::executor", error = %e, "query worker did not shut down");
            }
        }
    }
}

impl std::fmt::Debug for QueryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExecutor")
            .field("queued", &self.queue.len())
            .field("failsafe_timeout", &self.failsafe_timeout)
            .finish()
    }
}

// ============================================================================
// Worker
// ============================================================================

struct Worker {
    source: Arc<dyn LogSource>,
    cursor: Option<Box<dyn QueryCursor>>,
}

impl Worker {
    fn new(source: Arc<dyn LogSource>) -> Self {
        Self {
            source,
            cursor: None,
        }
    }

    fn run(mut self, queue: &BoundedQueue<Envelope>) {
        while let Some(Envelope { command, reply }) = queue.pop() {
            if command == Command::Shutdown {
                for rest in queue.close() {
                    rest.reply.send(Err(Error::ExecutorClosed));
                }
                self.close_on_exit();
                reply.send(Ok(Output::Unit));
                debug!(target: "evtlog::executor", "query worker stopped");
                return;
            }

            let name = command.name();
            // A panicking command must not take the worker down with it.
            let result = match catch_unwind(AssertUnwindSafe(|| self.execute(command))) {
                Ok(result) => result,
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "(non-string panic)".to_string());
                    error!(
                        target: "evtlog::executor",
                        command = name,
                        "query command panicked: {}",
                        message
                    );
                    Err(Error::internal(format!("{} command panicked: {}", name, message)))
                }
            };
            reply.send(result);
        }
        self.close_on_exit();
    }

    fn execute(&mut self, command: Command) -> Result<Output> {
        match command {
            Command::Query {
                locator,
                query,
                direction,
            } => {
                self.close_cursor()?;
                self.cursor = Some(self.source.open_query(&locator, &query, direction)?);
                Ok(Output::Unit)
            }
            Command::Next { max, timeout_ms } => {
                let outcome = self.cursor()?.next_batch(max, timeout_ms)?;
                Ok(Output::Batch(QueryBatch::from(outcome)))
            }
            Command::Seek { position, origin } => {
                self.cursor()?.seek(position, origin)?;
                Ok(Output::Unit)
            }
            Command::Close => {
                self.close_cursor()?;
                Ok(Output::Unit)
            }
            Command::Shutdown => Ok(Output::Unit),
        }
    }

    fn cursor(&mut self) -> Result<&mut Box<dyn QueryCursor>> {
        self.cursor
            .as_mut()
            .ok_or_else(|| Error::system(codes::ERROR_INVALID_HANDLE))
    }

    fn close_cursor(&mut self) -> Result<()> {
        match self.cursor.take() {
            Some(mut cursor) => cursor.close(),
            None => Ok(()),
        }
    }

    fn close_on_exit(&mut self) {
        if let Err(e) = self.close_cursor() {
            warn!(target: "evtlog::executor", error = %e, "closing cursor on shutdown failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evtlog_core::testing::{CursorOp, MemoryRecord, MemorySource};
    use evtlog_core::BatchStatus;

    fn executor_with(records: usize) -> (MemorySource, QueryExecutor) {
        let memory = MemorySource::new();
        memory.add_channel("App");
        for i in 0..records {
            memory.append("App", MemoryRecord::new("Demo", i as u16));
        }
        let source: Arc<dyn LogSource> = Arc::new(memory.clone());
        (memory, QueryExecutor::new(source).unwrap())
    }

    #[test]
    fn test_query_next_close() {
        let (memory, executor) = executor_with(3);
        executor
            .query(QueryLocator::Channel("App".into()), "*", Direction::Forward)
            .unwrap();
        let batch = executor.next(2, 0).unwrap();
        assert_eq!(batch.status(), BatchStatus::Success);
        assert_eq!(batch.count(), 2);
        drop(batch);
        executor.close().unwrap();

        let ops = memory.operations();
        assert!(matches!(ops[0], CursorOp::Open { .. }));
        assert_eq!(ops[1], CursorOp::Fetch { max: 2, timeout_ms: 0 });
        assert_eq!(ops[2], CursorOp::Close);
    }

    #[test]
    fn test_requery_closes_previous_cursor() {
        let (memory, executor) = executor_with(1);
        let locator = QueryLocator::Channel("App".into());
        executor.query(locator.clone(), "*", Direction::Forward).unwrap();
        executor.query(locator, "*", Direction::Reverse).unwrap();

        let ops = memory.operations();
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[1], CursorOp::Close);
    }

    #[test]
    fn test_fetch_without_cursor_is_invalid_handle() {
        let (_, executor) = executor_with(0);
        let err = executor.next(1, 0).unwrap_err();
        assert_eq!(err.system_code(), Some(codes::ERROR_INVALID_HANDLE));
        let err = executor.seek(0, SeekOrigin::FromFirst).unwrap_err();
        assert_eq!(err.system_code(), Some(codes::ERROR_INVALID_HANDLE));
    }

    #[test]
    fn test_close_without_cursor_succeeds() {
        let (memory, executor) = executor_with(0);
        executor.close().unwrap();
        assert!(memory.operations().is_empty());
    }

    #[test]
    fn test_drop_closes_open_cursor() {
        let (memory, executor) = executor_with(1);
        executor
            .query(QueryLocator::Channel("App".into()), "*", Direction::Forward)
            .unwrap();
        drop(executor);
        assert_eq!(memory.operations().last(), Some(&CursorOp::Close));
    }

    #[test]
    fn test_commands_after_shutdown_are_refused() {
        let (_, executor) = executor_with(0);
        executor.execute(Command::Shutdown).unwrap();
        assert_eq!(executor.close().unwrap_err(), Error::ExecutorClosed);
    }

    #[test]
    fn test_worker_thread_is_named() {
        let memory = MemorySource::new();
        memory.add_channel("App");
        let source: Arc<dyn LogSource> = Arc::new(memory.clone());
        let config = ExecutorConfig {
            thread_name: "evtlog-test-worker".into(),
            ..ExecutorConfig::default()
        };
        let executor = QueryExecutor::with_config(source, config).unwrap();
        executor
            .query(QueryLocator::Channel("App".into()), "*", Direction::Forward)
            .unwrap();
        assert_ne!(memory.operation_threads()[0], std::thread::current().id());
    }
}
