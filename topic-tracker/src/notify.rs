//! Outbound count pushes.

use resolved_core::{UnresolvedCountUpdate, UserId};
use tokio::sync::mpsc;
use tracing::debug;

pub const EVENT_UNRESOLVED_UPDATE_COUNT: &str = "event:unresolved.updateCount";

/// Delivery port for per-user count updates. Implementations must not block.
pub trait CountNotifier: Send + Sync {
    fn push(&self, uid: UserId, event: &str, update: UnresolvedCountUpdate);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl CountNotifier for NoopNotifier {
    fn push(&self, _uid: UserId, _event: &str, _update: UnresolvedCountUpdate) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountPush {
    /// Per-user room, `uid_{uid}`.
    pub room: String,
    pub event: String,
    pub update: UnresolvedCountUpdate,
}

/// Forwards pushes to an unbounded channel drained by the real-time layer.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<CountPush>,
}

impl ChannelNotifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<CountPush>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl CountNotifier for ChannelNotifier {
    fn push(&self, uid: UserId, event: &str, update: UnresolvedCountUpdate) {
        let push = CountPush {
            room: format!("uid_{}", uid),
            event: event.to_string(),
            update,
        };
        if self.sender.send(push).is_err() {
            debug!("Count push for uid {} dropped, no receiver", uid);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_notifier_targets_user_room() {
        let (notifier, mut receiver) = ChannelNotifier::channel();
        let update = UnresolvedCountUpdate {
            unresolved_topic_count: 2,
            unresolved_new_topic_count: 1,
            unresolved_watched_topic_count: 1,
            unresolved_unreplied_topic_count: 0,
        };
        notifier.push(9, EVENT_UNRESOLVED_UPDATE_COUNT, update);

        let push = receiver.recv().await.unwrap();
        assert_eq!(push.room, "uid_9");
        assert_eq!(push.event, EVENT_UNRESOLVED_UPDATE_COUNT);
        assert_eq!(push.update, update);
    }

    #[test]
    fn test_dropped_receiver_is_not_an_error() {
        let (notifier, receiver) = ChannelNotifier::channel();
        drop(receiver);
        notifier.push(
            1,
            EVENT_UNRESOLVED_UPDATE_COUNT,
            UnresolvedCountUpdate {
                unresolved_topic_count: 0,
                unresolved_new_topic_count: 0,
                unresolved_watched_topic_count: 0,
                unresolved_unreplied_topic_count: 0,
            },
        );
    }
}
