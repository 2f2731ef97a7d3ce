// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixed-size worker pool with tiered dispatch
//!
//! Workers are long-lived tokio tasks started with the scheduler. A
//! submission goes straight to an idle worker over its channel; otherwise it
//! waits in its tier. A worker that finishes pulls the oldest request of the
//! highest non-empty tier before going idle, so it never sits idle while
//! work is queued.
//!
//! Each unit of work runs on its own spawned task, so an error or a panic
//! resolves that task's handle and nothing else.

use super::priority::{Priority, TierQueues};
use crate::error::{CoordError, Result};
use crate::id::{Sequence, TaskId};
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A unit of work waiting for, or running on, a worker
pub struct TaskRequest {
    id: TaskId,
    priority: Priority,
    submitted_at: Instant,
    job: Job,
}

impl std::fmt::Debug for TaskRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRequest")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("submitted_at", &self.submitted_at)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct WorkerSlot {
    current: Option<TaskId>,
    /// `None` once the scheduler is shut down
    inbox: Option<mpsc::UnboundedSender<TaskRequest>>,
}

impl WorkerSlot {
    fn is_busy(&self) -> bool {
        self.current.is_some()
    }
}

#[derive(Debug, Default)]
struct PoolState {
    workers: Vec<WorkerSlot>,
    queued: TierQueues<TaskRequest>,
    shutdown: bool,
}

/// Priority-tiered scheduler over a fixed pool of workers
#[derive(Debug)]
pub struct TaskScheduler {
    state: Arc<Mutex<PoolState>>,
    ids: Sequence,
    max_workers: usize,
    joins: Mutex<Vec<JoinHandle<()>>>,
}

fn lock_state(state: &Mutex<PoolState>) -> MutexGuard<'_, PoolState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

impl TaskScheduler {
    /// Start `max_workers` workers on the current tokio runtime
    pub fn start(max_workers: usize) -> Self {
        let state = Arc::new(Mutex::new(PoolState::default()));
        let mut joins = Vec::with_capacity(max_workers);
        {
            let mut guard = lock_state(&state);
            for worker_id in 0..max_workers {
                let (tx, rx) = mpsc::unbounded_channel();
                guard.workers.push(WorkerSlot {
                    current: None,
                    inbox: Some(tx),
                });
                joins.push(tokio::spawn(run_worker(worker_id, state.clone(), rx)));
            }
        }
        debug!(max_workers, "task scheduler started");

        Self {
            state,
            ids: Sequence::new(),
            max_workers,
            joins: Mutex::new(joins),
        }
    }

    /// Submit a unit of work.
    ///
    /// The returned handle resolves with the work's value, or `TaskError` if
    /// it failed or panicked. Awaiting the handle is optional; the work runs
    /// either way.
    pub fn submit<F, T, E>(&self, priority: Priority, work: F) -> TaskHandle<T>
    where
        F: Future<Output = std::result::Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display + Send + 'static,
    {
        let id = self.ids.next_task();
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            let outcome = match tokio::spawn(work).await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(CoordError::TaskError {
                    task_id: id,
                    message: e.to_string(),
                }),
                Err(join) => Err(CoordError::TaskError {
                    task_id: id,
                    message: if join.is_panic() {
                        "task panicked".to_string()
                    } else {
                        "task was cancelled".to_string()
                    },
                }),
            };
            if let Err(outcome) = &outcome {
                warn!(task = %id, error = %outcome, "task failed");
            }
            // Nobody may be waiting on the handle
            let _ = tx.send(outcome);
        });
        let request = TaskRequest {
            id,
            priority,
            submitted_at: Instant::now(),
            job,
        };

        let mut state = lock_state(&self.state);
        if state.shutdown {
            // Dropping the request closes the handle's channel
            debug!(task = %id, "submit after shutdown");
            return TaskHandle { id, rx };
        }

        let mut request = request;
        for (worker_id, worker) in state.workers.iter_mut().enumerate() {
            if worker.is_busy() {
                continue;
            }
            let Some(inbox) = &worker.inbox else {
                continue;
            };
            match inbox.send(request) {
                Ok(()) => {
                    worker.current = Some(id);
                    debug!(task = %id, %priority, worker = worker_id, "dispatched to idle worker");
                    return TaskHandle { id, rx };
                }
                Err(mpsc::error::SendError(returned)) => {
                    // Worker task is gone; retire its slot and try the next one
                    warn!(worker = worker_id, "worker exited, retiring slot");
                    worker.inbox = None;
                    request = returned;
                }
            }
        }

        state.queued.push(priority, request);
        debug!(
            task = %id,
            %priority,
            queued = state.queued.len(),
            "all workers busy, task queued"
        );
        TaskHandle { id, rx }
    }

    /// Workers currently running a task
    pub fn busy_workers(&self) -> usize {
        lock_state(&self.state)
            .workers
            .iter()
            .filter(|w| w.is_busy())
            .count()
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Requests waiting for a worker, all tiers
    pub fn queued(&self) -> usize {
        lock_state(&self.state).queued.len()
    }

    pub fn queued_in(&self, priority: Priority) -> usize {
        lock_state(&self.state).queued.len_of(priority)
    }

    /// Tasks currently running, by worker
    pub fn running(&self) -> Vec<TaskId> {
        lock_state(&self.state)
            .workers
            .iter()
            .filter_map(|w| w.current)
            .collect()
    }

    /// Stop accepting work and wait for the workers to exit.
    ///
    /// Tasks already running finish; queued requests resolve with
    /// `SchedulerShutdown`. Calling this twice is harmless.
    pub async fn shutdown(&self) {
        self.close();

        let joins = std::mem::take(&mut *self.joins.lock().unwrap_or_else(|e| e.into_inner()));
        for join in joins {
            if let Err(e) = join.await {
                warn!(error = %e, "worker exited abnormally");
            }
        }
    }

    /// Mark the pool closed and release the workers' inboxes.
    ///
    /// Queued requests are dropped after the pool lock is released, so work
    /// futures that touch the scheduler from their destructors cannot
    /// deadlock it.
    fn close(&self) {
        let dropped = {
            let mut state = lock_state(&self.state);
            state.shutdown = true;
            for worker in state.workers.iter_mut() {
                worker.inbox = None;
            }
            state.queued.drain()
        };
        if !dropped.is_empty() {
            info!(count = dropped.len(), "dropping queued tasks on shutdown");
        }
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_worker(
    worker_id: usize,
    state: Arc<Mutex<PoolState>>,
    mut inbox: mpsc::UnboundedReceiver<TaskRequest>,
) {
    while let Some(request) = inbox.recv().await {
        let mut next = Some(request);
        while let Some(request) = next.take() {
            debug!(
                task = %request.id,
                priority = %request.priority,
                worker = worker_id,
                waited = ?request.submitted_at.elapsed(),
                "task started"
            );
            request.job.await;
            next = take_next(&state, worker_id);
        }
    }
    debug!(worker = worker_id, "worker stopped");
}

/// Pick this worker's next request, or mark it idle
fn take_next(state: &Mutex<PoolState>, worker_id: usize) -> Option<TaskRequest> {
    let mut state = lock_state(state);
    let next = state.queued.pop_next();
    if let Some(worker) = state.workers.get_mut(worker_id) {
        worker.current = next.as_ref().map(|r| r.id);
    }
    next
}

/// Resolves with the outcome of a submitted task
#[derive(Debug)]
pub struct TaskHandle<T> {
    id: TaskId,
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> TaskHandle<T> {
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Wait at most `timeout` for the result. The task keeps running if the
    /// wait expires.
    pub async fn wait_for(self, timeout: Duration) -> Result<T> {
        let id = self.id;
        match tokio::time::timeout(timeout, self).await {
            Ok(result) => result,
            Err(_) => Err(CoordError::TaskWaitTimeout {
                task_id: id,
                waited: timeout,
            }),
        }
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(CoordError::SchedulerShutdown)),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
