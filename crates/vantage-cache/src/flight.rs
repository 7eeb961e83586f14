//! In-flight call tracking for single-flight fetches.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::error::Result;

type Slot<V> = Option<Result<V>>;

/// Tracks which keys currently have an upstream call running.
pub(crate) struct FlightGroup<V> {
    in_flight: Mutex<HashMap<String, watch::Receiver<Slot<V>>>>,
}

/// Outcome of joining a flight for a key.
pub(crate) enum Flight<'a, V> {
    /// No call was running; the caller must perform it and publish the result.
    Leader(FlightGuard<'a, V>),
    /// Another caller is already fetching; wait on its result.
    Follower(watch::Receiver<Slot<V>>),
}

/// Held by the leader. Dropping it without completing (e.g. the leader's
/// future was cancelled) wakes followers with no result.
pub(crate) struct FlightGuard<'a, V> {
    group: &'a FlightGroup<V>,
    key: String,
    tx: watch::Sender<Slot<V>>,
}

impl<V: Clone> FlightGroup<V> {
    pub(crate) fn new() -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Become the leader for `key`, or follow the call already running.
    pub(crate) fn join(&self, key: &str) -> Flight<'_, V> {
        let mut in_flight = self.in_flight.lock();
        if let Some(rx) = in_flight.get(key) {
            return Flight::Follower(rx.clone());
        }

        let (tx, rx) = watch::channel(None);
        in_flight.insert(key.to_string(), rx);
        Flight::Leader(FlightGuard {
            group: self,
            key: key.to_string(),
            tx,
        })
    }

    /// Number of keys with a call in progress.
    pub(crate) fn len(&self) -> usize {
        self.in_flight.lock().len()
    }
}

impl<V> FlightGuard<'_, V> {
    /// Publish the leader's result to all followers.
    pub(crate) fn complete(self, result: Result<V>) {
        let _ = self.tx.send(Some(result));
    }
}

impl<V> Drop for FlightGuard<'_, V> {
    fn drop(&mut self) {
        self.group.in_flight.lock().remove(&self.key);
    }
}

/// Wait for the leader's result. Returns `None` if the leader went away
/// without publishing one.
pub(crate) async fn wait<V: Clone>(mut rx: watch::Receiver<Slot<V>>) -> Option<Result<V>> {
    match rx.wait_for(|slot| slot.is_some()).await {
        Ok(slot) => (*slot).clone(),
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;

    #[test]
    fn test_first_join_leads_second_follows() {
        let group: FlightGroup<u32> = FlightGroup::new();

        let leader = group.join("k");
        assert!(matches!(leader, Flight::Leader(_)));
        assert!(matches!(group.join("k"), Flight::Follower(_)));
        assert!(matches!(group.join("other"), Flight::Leader(_)));
        assert_eq!(group.len(), 1);

        drop(leader);
        assert_eq!(group.len(), 0);
    }

    #[tokio::test]
    async fn test_follower_receives_result() {
        let group: FlightGroup<u32> = FlightGroup::new();
        let Flight::Leader(guard) = group.join("k") else {
            panic!("expected leader");
        };
        let Flight::Follower(rx) = group.join("k") else {
            panic!("expected follower");
        };

        guard.complete(Ok(7));
        assert_eq!(wait(rx).await, Some(Ok(7)));
        assert_eq!(group.len(), 0);
    }

    #[tokio::test]
    async fn test_follower_receives_error() {
        let group: FlightGroup<u32> = FlightGroup::new();
        let Flight::Leader(guard) = group.join("k") else {
            panic!("expected leader");
        };
        let Flight::Follower(rx) = group.join("k") else {
            panic!("expected follower");
        };

        guard.complete(Err(CacheError::Upstream("boom".into())));
        assert_eq!(
            wait(rx).await,
            Some(Err(CacheError::Upstream("boom".into())))
        );
    }

    #[tokio::test]
    async fn test_abandoned_leader_wakes_follower_empty() {
        let group: FlightGroup<u32> = FlightGroup::new();
        let leader = group.join("k");
        let Flight::Follower(rx) = group.join("k") else {
            panic!("expected follower");
        };

        drop(leader);
        assert_eq!(wait(rx).await, None);
    }
}
