//! Push notification collaborator contract.
//!
//! Delivery mechanics (tokens, APNs/FCM, localization) live outside this
//! core; the selection server only supplies the target account and a place
//! label for the notification text. Delivery is fire-and-forget: a failed
//! push never fails the request that triggered it.

use spindrop_shared::types::AccountId;

/// Fire-and-forget notification sink.
pub trait PushSender: Send + Sync {
    /// Someone liked one of `owner`'s photos. `place` is the photo's
    /// human-readable location label, when it has one.
    fn notify_like(&self, owner: AccountId, place: Option<String>);
}

/// Default sink: structured log only. Deployments plug in a real sender.
pub struct LogPushSender;

impl PushSender for LogPushSender {
    fn notify_like(&self, owner: AccountId, place: Option<String>) {
        tracing::info!(owner = %owner, place = place.as_deref().unwrap_or("-"), "like notification");
    }
}
