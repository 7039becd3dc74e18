// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use pulse_server_db::{QueueCounts, QueueJob, QueueRepository};

use crate::error::{JobError, Result};

const MAX_ATTEMPTS: u32 = 3;
const BASE_RETRY_DELAY_SECS: u64 = 2;
const RETRY_FACTOR: f64 = 2.0;
const KEEP_COMPLETED: i64 = 100;
const KEEP_FAILED: i64 = 50;

/// How long an idle worker sleeps before re-polling when no enqueue
/// notification arrives.
const IDLE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Handler for jobs of one topic.
#[async_trait]
pub trait JobHandler: Send + Sync {
	async fn handle(&self, payload: serde_json::Value) -> Result<()>;
}

/// Durable job queue with topic consumers.
pub struct JobQueue {
	repository: Arc<QueueRepository>,
	notify: Arc<Notify>,
	shutdown_tx: broadcast::Sender<()>,
	handles: Mutex<Vec<JoinHandle<()>>>,
}

impl JobQueue {
	pub fn new(repository: Arc<QueueRepository>) -> Self {
		let (shutdown_tx, _) = broadcast::channel(1);
		Self {
			repository,
			notify: Arc::new(Notify::new()),
			shutdown_tx,
			handles: Mutex::new(Vec::new()),
		}
	}

	/// Requeue jobs a previous process instance left mid-flight. Call
	/// once at startup, before consumers start.
	#[instrument(skip(self))]
	pub async fn recover(&self) -> Result<u64> {
		Ok(self.repository.requeue_stale_running().await?)
	}

	/// Persist a job and wake the topic's workers.
	#[instrument(skip(self, payload), fields(topic))]
	pub async fn enqueue(&self, topic: &str, payload: serde_json::Value) -> Result<QueueJob> {
		let job = self.repository.enqueue(topic, payload, MAX_ATTEMPTS).await?;
		self.notify.notify_waiters();
		Ok(job)
	}

	/// Spawn `concurrency` workers consuming `topic` with `handler`.
	#[instrument(skip(self, handler), fields(topic, concurrency))]
	pub async fn consume(&self, topic: &str, handler: Arc<dyn JobHandler>, concurrency: usize) {
		let mut handles = self.handles.lock().await;
		for worker in 0..concurrency.max(1) {
			let repository = Arc::clone(&self.repository);
			let handler = Arc::clone(&handler);
			let notify = Arc::clone(&self.notify);
			let mut shutdown_rx = self.shutdown_tx.subscribe();
			let topic = topic.to_string();

			let handle = tokio::spawn(async move {
				loop {
					match repository.claim_next(&topic).await {
						Ok(Some(job)) => {
							run_job(&repository, handler.as_ref(), job).await;
							continue;
						}
						Ok(None) => {}
						Err(e) => {
							warn!(topic = %topic, error = %e, "failed to claim job");
						}
					}

					tokio::select! {
						_ = notify.notified() => {}
						_ = tokio::time::sleep(IDLE_POLL_INTERVAL) => {}
						_ = shutdown_rx.recv() => {
							info!(topic = %topic, worker, "queue worker shutting down");
							break;
						}
					}
				}
			});
			handles.push(handle);
		}

		info!(topic, concurrency, "queue consumers started");
	}

	/// Current queue depth and terminal-state counts.
	pub async fn counts(&self) -> Result<QueueCounts> {
		Ok(self.repository.counts().await?)
	}

	/// Stop claiming new jobs, let in-flight jobs finish, and wait up to
	/// `deadline`. Jobs still running past the deadline are aborted and
	/// remain in durable storage for the next instance.
	#[instrument(skip(self))]
	pub async fn shutdown(&self, deadline: Duration) {
		let _ = self.shutdown_tx.send(());

		let mut pending: Vec<JoinHandle<()>> = {
			let mut handles = self.handles.lock().await;
			handles.drain(..).collect()
		};

		let drain = async {
			for handle in pending.iter_mut() {
				let _ = handle.await;
			}
		};

		if tokio::time::timeout(deadline, drain).await.is_err() {
			warn!("queue drain deadline exceeded, aborting remaining workers");
			for handle in &pending {
				handle.abort();
			}
		}

		info!("job queue shut down");
	}
}

async fn run_job(repository: &Arc<QueueRepository>, handler: &dyn JobHandler, job: QueueJob) {
	let job_id = job.id;
	let attempts = job.attempts;
	let max_attempts = job.max_attempts;

	match handler.handle(job.payload).await {
		Ok(()) => {
			if let Err(e) = repository.complete(job_id).await {
				warn!(job_id = %job_id, error = %e, "failed to mark job completed");
			}
			prune(repository).await;
		}
		Err(e) => {
			let (message, retryable) = match &e {
				JobError::Failed { message, retryable } => (message.clone(), *retryable),
				other => (other.to_string(), true),
			};

			if retryable && attempts < max_attempts {
				let delay_secs = calculate_backoff_delay(attempts);
				let retry_at = Utc::now() + ChronoDuration::seconds(delay_secs as i64);
				warn!(
					job_id = %job_id,
					attempts,
					delay_secs,
					error = %message,
					"job failed, scheduling retry"
				);
				if let Err(e) = repository.fail(job_id, &message, Some(retry_at)).await {
					warn!(job_id = %job_id, error = %e, "failed to reschedule job");
				}
			} else {
				warn!(job_id = %job_id, attempts, error = %message, "job failed terminally");
				if let Err(e) = repository.fail(job_id, &message, None).await {
					warn!(job_id = %job_id, error = %e, "failed to mark job failed");
				}
				prune(repository).await;
			}
		}
	}
}

async fn prune(repository: &Arc<QueueRepository>) {
	if let Err(e) = repository.prune(KEEP_COMPLETED, KEEP_FAILED).await {
		warn!(error = %e, "failed to prune terminal queue jobs");
	}
}

/// Delay before retry N (1-based): 2s, 4s, 8s.
pub(crate) fn calculate_backoff_delay(retry_count: u32) -> u64 {
	let exponent = retry_count.saturating_sub(1) as i32;
	(BASE_RETRY_DELAY_SECS as f64 * RETRY_FACTOR.powi(exponent)) as u64
}

#[cfg(test)]
mod tests {
	use super::*;
	use pulse_server_db::testing::test_pool;
	use serde_json::json;
	use std::sync::atomic::{AtomicUsize, Ordering};

	struct RecordingHandler {
		calls: AtomicUsize,
		fail_mode: Option<bool>, // Some(retryable)
	}

	impl RecordingHandler {
		fn ok() -> Arc<Self> {
			Arc::new(Self {
				calls: AtomicUsize::new(0),
				fail_mode: None,
			})
		}

		fn failing(retryable: bool) -> Arc<Self> {
			Arc::new(Self {
				calls: AtomicUsize::new(0),
				fail_mode: Some(retryable),
			})
		}
	}

	#[async_trait]
	impl JobHandler for RecordingHandler {
		async fn handle(&self, _payload: serde_json::Value) -> Result<()> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			match self.fail_mode {
				None => Ok(()),
				Some(true) => Err(JobError::retryable("transient")),
				Some(false) => Err(JobError::permanent("bad payload")),
			}
		}
	}

	async fn queue() -> JobQueue {
		JobQueue::new(Arc::new(QueueRepository::new(test_pool().await)))
	}

	async fn wait_until<F, Fut>(mut check: F)
	where
		F: FnMut() -> Fut,
		Fut: std::future::Future<Output = bool>,
	{
		for _ in 0..200 {
			if check().await {
				return;
			}
			tokio::time::sleep(Duration::from_millis(10)).await;
		}
		panic!("condition not reached in time");
	}

	#[test]
	fn backoff_starts_at_two_seconds_and_doubles() {
		assert_eq!(calculate_backoff_delay(1), 2);
		assert_eq!(calculate_backoff_delay(2), 4);
		assert_eq!(calculate_backoff_delay(3), 8);
	}

	#[tokio::test]
	async fn worker_processes_enqueued_job() {
		let queue = queue().await;
		let handler = RecordingHandler::ok();
		queue.consume("t", handler.clone(), 1).await;

		queue.enqueue("t", json!({"n": 1})).await.unwrap();

		wait_until(|| async { queue.counts().await.unwrap().completed == 1 }).await;
		assert_eq!(handler.calls.load(Ordering::SeqCst), 1);

		queue.shutdown(Duration::from_secs(5)).await;
	}

	#[tokio::test]
	async fn retryable_failure_is_rescheduled_with_backoff() {
		let queue = queue().await;
		let handler = RecordingHandler::failing(true);
		queue.consume("t", handler.clone(), 1).await;

		queue.enqueue("t", json!({})).await.unwrap();

		// First attempt fails; the job goes back to queued with a future
		// run_at, so it is not immediately reclaimed.
		wait_until(|| async { handler.calls.load(Ordering::SeqCst) == 1 }).await;
		tokio::time::sleep(Duration::from_millis(50)).await;
		let counts = queue.counts().await.unwrap();
		assert_eq!(counts.queued, 1);
		assert_eq!(handler.calls.load(Ordering::SeqCst), 1);

		queue.shutdown(Duration::from_secs(5)).await;
	}

	#[tokio::test]
	async fn permanent_failure_is_terminal() {
		let queue = queue().await;
		let handler = RecordingHandler::failing(false);
		queue.consume("t", handler.clone(), 1).await;

		queue.enqueue("t", json!({})).await.unwrap();

		wait_until(|| async { queue.counts().await.unwrap().failed == 1 }).await;
		assert_eq!(handler.calls.load(Ordering::SeqCst), 1);

		queue.shutdown(Duration::from_secs(5)).await;
	}

	#[tokio::test]
	async fn recover_requeues_stale_running_jobs() {
		let pool = test_pool().await;
		let repository = Arc::new(QueueRepository::new(pool));

		repository.enqueue("t", json!({}), 3).await.unwrap();
		repository.claim_next("t").await.unwrap().unwrap();

		let queue = JobQueue::new(repository);
		assert_eq!(queue.recover().await.unwrap(), 1);
		assert_eq!(queue.counts().await.unwrap().queued, 1);
	}
}
