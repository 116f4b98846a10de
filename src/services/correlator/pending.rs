//! Pending Request Map
//!
//! Correlation side-table: one oneshot waiter per correlation id. Every
//! completion path (response, rejection, timeout, send failure) goes through
//! `DashMap::remove`, so whichever path removes the entry first owns it and
//! the others become no-ops. A correlation id therefore resolves exactly once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::oneshot;
use tokio::time::{timeout, Instant};
use tracing::{debug, warn};

use crate::utils::error::{AppError, AppResult};

/// What a waiter receives: the response value plus the metadata registered
/// with the request.
pub type Completion<T, M> = AppResult<(T, M)>;

struct PendingEntry<T, M> {
    sender: oneshot::Sender<Completion<T, M>>,
    /// File path, route or rule id the request concerns
    subject: String,
    metadata: M,
    seq: u64,
    created_at: Instant,
}

/// Handle returned by [`PendingRequests::register`].
pub struct Waiter<T, M> {
    pub request_id: String,
    receiver: oneshot::Receiver<Completion<T, M>>,
}

/// Pending requests of one request family.
pub struct PendingRequests<T, M = ()> {
    family: &'static str,
    entries: DashMap<String, PendingEntry<T, M>>,
    next_seq: AtomicU64,
}

impl<T, M> PendingRequests<T, M> {
    pub fn new(family: &'static str) -> Self {
        Self {
            family,
            entries: DashMap::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Allocate a fresh correlation id and park a waiter on it.
    pub fn register(&self, subject: impl Into<String>, metadata: M) -> Waiter<T, M> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let (sender, receiver) = oneshot::channel();
        self.entries.insert(
            request_id.clone(),
            PendingEntry {
                sender,
                subject: subject.into(),
                metadata,
                seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
                created_at: Instant::now(),
            },
        );
        Waiter {
            request_id,
            receiver,
        }
    }

    /// Complete a request with a value. Returns `false` for stale ids.
    pub fn resolve(&self, request_id: &str, value: T) -> bool {
        self.complete(request_id, |metadata| Ok((value, metadata)))
    }

    /// Fail a request. Returns `false` for stale ids.
    pub fn reject(&self, request_id: &str, error: AppError) -> bool {
        self.complete(request_id, |_| Err(error))
    }

    fn complete(&self, request_id: &str, outcome: impl FnOnce(M) -> Completion<T, M>) -> bool {
        match self.entries.remove(request_id) {
            Some((_, entry)) => {
                debug!(
                    family = self.family,
                    request_id,
                    subject = %entry.subject,
                    elapsed_ms = entry.created_at.elapsed().as_millis() as u64,
                    "request completed"
                );
                // The waiter may have given up already.
                let _ = entry.sender.send(outcome(entry.metadata));
                true
            }
            None => {
                debug!(family = self.family, request_id, "ignoring stale response");
                false
            }
        }
    }

    /// Drop a request without notifying its waiter.
    pub fn remove(&self, request_id: &str) -> bool {
        self.entries.remove(request_id).is_some()
    }

    /// Oldest pending request for a subject, used for responses that carry
    /// no correlation id.
    pub fn oldest_for(&self, subject: &str) -> Option<String> {
        self.oldest_where(subject, |_| true)
    }

    /// Like [`oldest_for`](Self::oldest_for), restricted to requests whose
    /// metadata passes `accept`.
    pub fn oldest_where(&self, subject: &str, accept: impl Fn(&M) -> bool) -> Option<String> {
        self.entries
            .iter()
            .filter(|entry| entry.value().subject == subject && accept(&entry.value().metadata))
            .min_by_key(|entry| entry.value().seq)
            .map(|entry| entry.key().clone())
    }

    pub fn contains(&self, request_id: &str) -> bool {
        self.entries.contains_key(request_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Wait for a registered request, failing with `RequestTimeout` after
    /// `limit`.
    pub async fn wait(&self, waiter: Waiter<T, M>, limit: Duration) -> Completion<T, M> {
        let Waiter {
            request_id,
            mut receiver,
        } = waiter;

        match timeout(limit, &mut receiver).await {
            Ok(Ok(completion)) => completion,
            Ok(Err(_)) => Err(AppError::ChannelClosed(request_id)),
            Err(_) => {
                if self.remove(&request_id) {
                    warn!(
                        family = self.family,
                        request_id = %request_id,
                        timeout_secs = limit.as_secs(),
                        "request timed out"
                    );
                    Err(AppError::timeout(
                        format!("{} {}", self.family, request_id),
                        limit.as_secs(),
                    ))
                } else {
                    // A response removed the entry first; its value is in flight.
                    receiver
                        .await
                        .unwrap_or_else(|_| Err(AppError::ChannelClosed(request_id)))
                }
            }
        }
    }
}
