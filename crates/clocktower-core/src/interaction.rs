//! Serialized processing of user interactions.
//!
//! Each key (usually a guild) gets its own FIFO of queued work. The first
//! item queued for an idle key starts a drain loop for that key; later items
//! join the existing queue. The queue entry lives exactly as long as its
//! drain loop, so "entry present" and "loop running" are the same fact, and
//! both are decided under the map lock.

#[path = "interaction_tests.rs"]
mod interaction_tests;

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::fmt::Display;
use std::hash::Hash;
use std::sync::{Arc, Mutex, Weak};

use clocktower_types::{GuildId, QueuedInteractionResult, ResponseContent};
use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{debug, info, warn};

use crate::config::InteractionConfig;
use crate::error::Result;
use crate::shutdown::{Shutdown, ShutdownPreventer};
use crate::traits::InteractionContext;

type Work = Box<dyn FnOnce() -> BoxFuture<'static, Result<QueuedInteractionResult>> + Send>;

struct QueueItem<C> {
    context: C,
    work: Work,
}

/// Per-key interaction queue. Clones share the same queues.
pub struct InteractionQueue<K, C> {
    inner: Arc<QueueInner<K, C>>,
}

impl<K, C> Clone for InteractionQueue<K, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct QueueInner<K, C> {
    queues: Mutex<HashMap<K, VecDeque<QueueItem<C>>>>,
    shutdown: Shutdown,
    preventer: ShutdownPreventer,
    restart_message: String,
}

impl<K, C> InteractionQueue<K, C>
where
    K: Eq + Hash + Clone + Display + Send + Sync + 'static,
    C: InteractionContext,
{
    pub fn new(shutdown: &Shutdown, config: &InteractionConfig) -> Self {
        let inner = Arc::new(QueueInner {
            queues: Mutex::new(HashMap::new()),
            shutdown: shutdown.clone(),
            preventer: shutdown.register_preventer(),
            restart_message: config.restart_message.clone(),
        });
        let weak = Arc::downgrade(&inner);
        shutdown.on_request(move || on_shutdown(weak));
        Self { inner }
    }

    /// Acknowledge `context` with `initial_message` and queue `work` behind
    /// any work already queued for `key`.
    ///
    /// If the acknowledgement fails the interaction is dropped. Once shutdown
    /// has been requested the interaction is answered with the restart
    /// message and `work` is never run.
    pub async fn enqueue<F, Fut>(&self, key: K, initial_message: &str, context: C, work: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<QueuedInteractionResult>> + Send + 'static,
    {
        let restarting = self.inner.shutdown.is_requested();
        let message = if restarting {
            self.inner.restart_message.as_str()
        } else {
            initial_message
        };

        if let Err(e) = acknowledge(&context, message).await {
            warn!(key = %key, error = %e, "Failed to acknowledge interaction");
            return;
        }
        if restarting {
            debug!(key = %key, "Shutdown requested, interaction not queued");
            return;
        }

        let item = QueueItem {
            context,
            work: Box::new(move || work().boxed()),
        };

        let rejected = {
            let mut queues = self.inner.queues.lock().unwrap();
            if self.inner.shutdown.is_requested() {
                Some(item)
            } else {
                match queues.entry(key.clone()) {
                    Entry::Occupied(mut queue) => {
                        // A drain loop owns this entry and will reach the item.
                        queue.get_mut().push_back(item);
                        debug!(key = %key, queued = queue.get().len(), "Interaction queued");
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(VecDeque::from([item]));
                        tokio::spawn(drain(Arc::clone(&self.inner), key.clone()));
                    }
                }
                None
            }
        };

        if let Some(item) = rejected {
            debug!(key = %key, "Shutdown requested while acknowledging, interaction not queued");
            let restart = ResponseContent::text(self.inner.restart_message.clone());
            if let Err(e) = item.context.edit_response(restart).await {
                warn!(key = %key, error = %e, "Failed to send restart message");
            }
        }
    }

    /// Keys with a running drain loop.
    pub fn active_keys(&self) -> Vec<K> {
        self.inner.queues.lock().unwrap().keys().cloned().collect()
    }

    /// Items waiting behind the one currently being processed for `key`.
    pub fn queued_len(&self, key: &K) -> usize {
        self.inner
            .queues
            .lock()
            .unwrap()
            .get(key)
            .map_or(0, VecDeque::len)
    }

    pub fn is_idle(&self) -> bool {
        self.inner.queues.lock().unwrap().is_empty()
    }
}

async fn acknowledge<C: InteractionContext>(context: &C, message: &str) -> Result<()> {
    context.defer_response().await?;
    context.edit_response(ResponseContent::text(message)).await
}

async fn drain<K, C>(inner: Arc<QueueInner<K, C>>, key: K)
where
    K: Eq + Hash + Clone + Display + Send + Sync + 'static,
    C: InteractionContext,
{
    debug!(key = %key, "Interaction drain loop started");
    loop {
        let item = {
            let mut queues = inner.queues.lock().unwrap();
            match queues.get_mut(&key).and_then(|q| q.pop_front()) {
                Some(item) => item,
                None => {
                    queues.remove(&key);
                    if inner.shutdown.is_requested() && queues.is_empty() {
                        inner.preventer.resolve();
                    }
                    debug!(key = %key, "Interaction drain loop finished");
                    return;
                }
            }
        };
        process(&key, item).await;
    }
}

/// Run one item. Failures stop at this boundary so the loop moves on.
async fn process<K: Display, C: InteractionContext>(key: &K, item: QueueItem<C>) {
    let QueueItem { context, work } = item;

    let result = match work().await {
        Ok(result) => result,
        Err(e) => {
            warn!(key = %key, error = %e, "Queued interaction failed");
            return;
        }
    };

    if let Err(e) = context.edit_response(result.to_response()).await {
        warn!(key = %key, error = %e, "Failed to edit interaction response");
    }
}

/// Runs inside `Shutdown::request`: an idle queue resolves its preventer
/// before the request returns, otherwise the last drain loop resolves it.
fn on_shutdown<K, C>(weak: Weak<QueueInner<K, C>>) {
    let Some(inner) = weak.upgrade() else {
        return;
    };
    let queues = inner.queues.lock().unwrap();
    if queues.is_empty() {
        inner.preventer.resolve();
    } else {
        info!(active_queues = queues.len(), "Shutdown requested, draining interaction queues");
    }
}

impl<K, C> Drop for QueueInner<K, C> {
    fn drop(&mut self) {
        // Every drain loop holds the inner; nothing can be outstanding here.
        self.preventer.resolve();
    }
}

/// Interaction queue keyed by the guild an interaction came from.
pub struct GuildInteractionQueue<C> {
    queue: InteractionQueue<GuildId, C>,
}

impl<C> Clone for GuildInteractionQueue<C> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
        }
    }
}

impl<C: InteractionContext> GuildInteractionQueue<C> {
    pub fn new(shutdown: &Shutdown, config: &InteractionConfig) -> Self {
        Self {
            queue: InteractionQueue::new(shutdown, config),
        }
    }

    pub async fn queue_interaction<F, Fut>(&self, initial_message: &str, context: C, work: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<QueuedInteractionResult>> + Send + 'static,
    {
        let guild_id = context.guild_id();
        self.queue
            .enqueue(guild_id, initial_message, context, work)
            .await;
    }

    pub fn active_guilds(&self) -> Vec<GuildId> {
        self.queue.active_keys()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_idle()
    }
}
