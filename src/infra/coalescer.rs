//! De-duplication of concurrent batch ingredient fetches.
//!
//! Requests are keyed by their normalized recipe-id set. While a call for a
//! key is in flight every other request for that key joins it, so there is at
//! most one network call per key at any time. Requests for new keys that
//! arrive while other calls are in flight go through a FIFO queue drained by
//! a single background task, which merges queued requests sharing a key. The
//! drain task only starts or joins calls; each group's replies are sent from
//! its own task, so a newly queued key never waits on unrelated calls.
//!
//! Pending entries live only until their call settles; this is a
//! de-duplication window, not a result cache.

use std::{collections::HashMap, sync::Arc};

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::api::{BatchLines, FailureKind};
use super::retry::{FetchOutcome, RetryingFetcher};
use crate::domain::RecipeId;

const KEY_DELIMITER: &str = ",";

type SharedFetch = Shared<BoxFuture<'static, FetchOutcome<BatchLines>>>;

/// Sorted, de-duplicated copy of `recipe_ids`.
pub fn normalized_ids(recipe_ids: &[RecipeId]) -> Vec<RecipeId> {
    let mut ids = recipe_ids.to_vec();
    ids.sort();
    ids.dedup();
    ids
}

/// Order-independent key for a set of recipe ids.
pub fn cache_key(recipe_ids: &[RecipeId]) -> String {
    normalized_ids(recipe_ids).join(KEY_DELIMITER)
}

struct PendingCall {
    serial: u64,
    future: SharedFetch,
}

struct QueuedRequest {
    key: String,
    recipe_ids: Vec<RecipeId>,
    reply: oneshot::Sender<FetchOutcome<BatchLines>>,
}

struct QueuedGroup {
    key: String,
    recipe_ids: Vec<RecipeId>,
    replies: Vec<oneshot::Sender<FetchOutcome<BatchLines>>>,
}

#[derive(Default)]
struct CoalescerState {
    pending: HashMap<String, PendingCall>,
    queue: Vec<QueuedRequest>,
    draining: bool,
    next_serial: u64,
}

struct Inner {
    fetcher: RetryingFetcher,
    state: Mutex<CoalescerState>,
}

impl Inner {
    fn settle(&self, key: &str, serial: u64) {
        let mut state = self.state.lock();
        if state
            .pending
            .get(key)
            .is_some_and(|call| call.serial == serial)
        {
            state.pending.remove(key);
            debug!(key, "ingredient fetch settled");
        }
    }
}

/// Removes the pending entry once the call's task ends, including when it
/// panics.
struct SettleGuard {
    inner: Arc<Inner>,
    key: String,
    serial: u64,
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        self.inner.settle(&self.key, self.serial);
    }
}

enum Waiter {
    Joined(SharedFetch),
    Queued(oneshot::Receiver<FetchOutcome<BatchLines>>),
}

#[derive(Clone)]
pub struct RequestCoalescer {
    inner: Arc<Inner>,
}

impl RequestCoalescer {
    pub fn new(fetcher: RetryingFetcher) -> Self {
        Self {
            inner: Arc::new(Inner {
                fetcher,
                state: Mutex::new(CoalescerState::default()),
            }),
        }
    }

    /// Number of keys with a network call in flight.
    pub fn in_flight(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    /// Number of requests waiting for the drain task.
    pub fn queued(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    pub async fn fetch_batch(&self, recipe_ids: &[RecipeId]) -> FetchOutcome<BatchLines> {
        let recipe_ids = normalized_ids(recipe_ids);
        if recipe_ids.is_empty() {
            return FetchOutcome::fresh(BatchLines::new());
        }
        let key = recipe_ids.join(KEY_DELIMITER);

        let waiter = {
            let mut state = self.inner.state.lock();
            let existing = state.pending.get(&key).map(|call| call.future.clone());
            if let Some(future) = existing {
                debug!(%key, "joining in-flight ingredient fetch");
                Waiter::Joined(future)
            } else if state.draining || !state.queue.is_empty() || !state.pending.is_empty() {
                let (reply, receiver) = oneshot::channel();
                debug!(%key, queued = state.queue.len() + 1, "queueing ingredient fetch");
                state.queue.push(QueuedRequest {
                    key,
                    recipe_ids,
                    reply,
                });
                if !state.draining {
                    state.draining = true;
                    tokio::spawn(self.clone().drain());
                }
                Waiter::Queued(receiver)
            } else {
                Waiter::Joined(self.start_call(&mut state, key, recipe_ids))
            }
        };

        match waiter {
            Waiter::Joined(future) => future.await,
            Waiter::Queued(receiver) => receiver.await.unwrap_or_else(|_| {
                warn!("ingredient fetch queue dropped a request");
                FetchOutcome::degraded(FailureKind::Aborted)
            }),
        }
    }

    /// Spawns the network call for `key` and registers it as pending. The
    /// caller must hold the state lock, which keeps the call's own settlement
    /// from running before the entry exists.
    fn start_call(
        &self,
        state: &mut CoalescerState,
        key: String,
        recipe_ids: Vec<RecipeId>,
    ) -> SharedFetch {
        let serial = state.next_serial;
        state.next_serial += 1;

        let inner = Arc::clone(&self.inner);
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            // Built inside the task so that it only ever settles from there,
            // never while `start_call` still holds the lock.
            let guard = SettleGuard {
                inner,
                key: task_key,
                serial,
            };
            let outcome = guard.inner.fetcher.fetch_batch(&recipe_ids).await;
            drop(guard);
            outcome
        });

        let future = handle
            .map(|joined| {
                joined.unwrap_or_else(|err| {
                    warn!(error = %err, "ingredient fetch task failed");
                    FetchOutcome::degraded(FailureKind::Aborted)
                })
            })
            .boxed()
            .shared();

        debug!(%key, serial, "starting ingredient fetch");
        state.pending.insert(
            key,
            PendingCall {
                serial,
                future: future.clone(),
            },
        );
        future
    }

    async fn drain(self) {
        loop {
            let mut state = self.inner.state.lock();
            if state.queue.is_empty() {
                state.draining = false;
                break;
            }

            for group in group_by_key(std::mem::take(&mut state.queue)) {
                let existing = state.pending.get(&group.key).map(|call| call.future.clone());
                let future = match existing {
                    Some(future) => {
                        debug!(key = %group.key, "queued requests joining in-flight fetch");
                        future
                    }
                    None => self.start_call(&mut state, group.key, group.recipe_ids),
                };
                tokio::spawn(fan_out(future, group.replies));
            }
        }
    }
}

async fn fan_out(future: SharedFetch, replies: Vec<oneshot::Sender<FetchOutcome<BatchLines>>>) {
    let outcome = future.await;
    for reply in replies {
        // The requester may have stopped waiting.
        let _ = reply.send(outcome.clone());
    }
}

/// Groups requests by key, keeping the order in which keys were first seen.
fn group_by_key(requests: Vec<QueuedRequest>) -> Vec<QueuedGroup> {
    let mut groups: Vec<QueuedGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for request in requests {
        match index.get(&request.key) {
            Some(&position) => groups[position].replies.push(request.reply),
            None => {
                index.insert(request.key.clone(), groups.len());
                groups.push(QueuedGroup {
                    key: request.key,
                    recipe_ids: request.recipe_ids,
                    replies: vec![request.reply],
                });
            }
        }
    }

    groups
}
