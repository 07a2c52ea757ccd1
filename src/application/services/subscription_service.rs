use std::sync::Arc;

use crate::application::ports::KvStore;
use crate::application::services::kv_mutator::KvMutator;
use crate::error::Result;
use crate::infrastructure::logging::{BoundaryLogger, Timer};
use crate::models::{Subscription, Subscriptions};

pub const SUBSCRIPTIONS_KEY: &str = "subscriptions";

/// SubscriptionService - the channel subscription registry
///
/// The whole registry lives in one blob under [`SUBSCRIPTIONS_KEY`]; every
/// add/remove is a compare-and-set retry loop over that blob.
pub struct SubscriptionService<S>
where
    S: KvStore + ?Sized,
{
    kv: Arc<KvMutator<S>>,
    logger: Arc<BoundaryLogger>,
}

impl<S> SubscriptionService<S>
where
    S: KvStore + ?Sized,
{
    pub fn new(kv: Arc<KvMutator<S>>, logger: Arc<BoundaryLogger>) -> Self {
        Self { kv, logger }
    }

    /// Subscribe a channel. Returns false if it was already subscribed.
    pub async fn add(&self, trace_id: &str, subscription: Subscription) -> Result<bool> {
        let timer = Timer::start();
        self.logger.service_entry(trace_id, "Command", "SubscriptionService", "add", &subscription);

        if let Err(e) = subscription.validate() {
            self.logger.service_error(trace_id, "Command", "SubscriptionService", "add", &e);
            return Err(e);
        }

        let mut inserted = false;
        let result = self
            .kv
            .atomic_modify(trace_id, "SubscriptionService", SUBSCRIPTIONS_KEY, |current| {
                let mut subscriptions = Subscriptions::from_bytes(SUBSCRIPTIONS_KEY, current)?;
                inserted = subscriptions.add(subscription.clone());
                encode(&subscriptions)
            })
            .await;

        match result {
            Ok(()) => {
                self.logger.service_exit(trace_id, "Command", "SubscriptionService", "add", timer.elapsed_ms());
                Ok(inserted)
            }
            Err(e) => {
                self.logger.service_error(trace_id, "Command", "SubscriptionService", "add", &e);
                Err(e)
            }
        }
    }

    /// Unsubscribe a channel. Removing something that is not there succeeds
    /// and returns false.
    pub async fn remove(&self, trace_id: &str, subscription: &Subscription) -> Result<bool> {
        let timer = Timer::start();
        self.logger.service_entry(trace_id, "Command", "SubscriptionService", "remove", subscription);

        let mut removed = false;
        let result = self
            .kv
            .atomic_modify(trace_id, "SubscriptionService", SUBSCRIPTIONS_KEY, |current| {
                let mut subscriptions = Subscriptions::from_bytes(SUBSCRIPTIONS_KEY, current)?;
                removed = subscriptions.remove(subscription);
                encode(&subscriptions)
            })
            .await;

        match result {
            Ok(()) => {
                self.logger.service_exit(trace_id, "Command", "SubscriptionService", "remove", timer.elapsed_ms());
                Ok(removed)
            }
            Err(e) => {
                self.logger.service_error(trace_id, "Command", "SubscriptionService", "remove", &e);
                Err(e)
            }
        }
    }

    /// Subscriptions of a channel, sorted by org/repo for display
    pub async fn list(&self, trace_id: &str, channel_id: &str) -> Result<Vec<Subscription>> {
        let timer = Timer::start();
        self.logger.service_entry(trace_id, "Command", "SubscriptionService", "list", &channel_id);

        let mut subscriptions = self.load(trace_id, "list").await?.list(channel_id);
        subscriptions.sort_by(|a, b| {
            (&a.org_name, &a.repo_name, &a.vcs_kind).cmp(&(&b.org_name, &b.repo_name, &b.vcs_kind))
        });

        self.logger.service_exit(trace_id, "Command", "SubscriptionService", "list", timer.elapsed_ms());
        Ok(subscriptions)
    }

    /// Channels subscribed to the repository identity of `subscription`
    pub async fn channels_for(&self, trace_id: &str, subscription: &Subscription) -> Result<Vec<String>> {
        let timer = Timer::start();
        self.logger.service_entry(trace_id, "Dispatcher", "SubscriptionService", "channels_for", &subscription.full_name());

        let channels = self.load(trace_id, "channels_for").await?.channel_ids(subscription);

        self.logger.service_exit(trace_id, "Dispatcher", "SubscriptionService", "channels_for", timer.elapsed_ms());
        Ok(channels)
    }

    /// Read path: corrupt bytes are an error here, never an empty registry
    async fn load(&self, trace_id: &str, method: &str) -> Result<Subscriptions> {
        let bytes = self.kv.get(trace_id, "SubscriptionService", SUBSCRIPTIONS_KEY).await?;
        Subscriptions::from_bytes(SUBSCRIPTIONS_KEY, bytes.as_deref()).map_err(|e| {
            self.logger.service_error(trace_id, "Command", "SubscriptionService", method, &e);
            e
        })
    }
}

fn encode(subscriptions: &Subscriptions) -> Result<Vec<u8>> {
    subscriptions
        .to_bytes()
        .map_err(|e| crate::error::BridgeError::corrupt(SUBSCRIPTIONS_KEY, e))
}
