use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use crate::RoomEvent;
use crate::config::OrchestratorConfig;
use crate::session::CallSession;

/// One viewer connection to a call. The transport side holds the matching
/// receiver and forwards frames to the wire.
pub struct Subscriber {
    pub id: String,
    tx: mpsc::UnboundedSender<RoomEvent>,
}

impl Subscriber {
    pub fn new(id: String) -> (Self, mpsc::UnboundedReceiver<RoomEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { id, tx }, rx)
    }

    fn send(&self, event: RoomEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Owns every active [`CallSession`], keyed by call id.
///
/// Each session sits behind its own mutex so cross-call operations run in
/// parallel; the registry map itself is a `DashMap`. Sessions are created on
/// first join or first transcript, and destroyed a grace period after the
/// last subscriber leaves (a quick reconnect cancels the teardown).
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<Mutex<CallSession>>>,
    config: OrchestratorConfig,
}

impl SessionRegistry {
    pub fn new(config: OrchestratorConfig) -> Arc<Self> {
        Arc::new(Self {
            sessions: DashMap::new(),
            config,
        })
    }

    pub fn get(&self, call_id: &str) -> Option<Arc<Mutex<CallSession>>> {
        self.sessions.get(call_id).map(|s| s.clone())
    }

    pub fn get_or_create(self: &Arc<Self>, call_id: &str) -> Arc<Mutex<CallSession>> {
        let mut created = false;
        let session = self
            .sessions
            .entry(call_id.to_string())
            .or_insert_with(|| {
                created = true;
                Arc::new(Mutex::new(CallSession::new(
                    call_id.to_string(),
                    &self.config,
                )))
            })
            .clone();
        if created {
            info!(%call_id, "call session created");
            self.spawn_idle_reaper(call_id.to_string(), session.clone());
        }
        session
    }

    /// Reclaims a session that never attracts a viewer: a provider can
    /// stream transcripts for calls nobody watches, and those sessions must
    /// not accumulate forever. The task reschedules against the latest
    /// transcript and exits as soon as a subscriber is present; from then on
    /// teardown belongs to the drain path in [`Self::leave`].
    fn spawn_idle_reaper(self: &Arc<Self>, call_id: String, session: Arc<Mutex<CallSession>>) {
        let registry = self.clone();
        tokio::spawn(async move {
            let timeout = registry.config.idle_timeout();
            loop {
                let s = session.lock().await;
                if !s.subscribers.is_empty() {
                    return;
                }
                let idle_since = s.last_transcript_at.unwrap_or(s.started_at);
                if idle_since.elapsed() >= timeout {
                    // Removal under the session lock; ptr_eq guards against
                    // a same-id session created after an earlier teardown.
                    let removed = registry
                        .sessions
                        .remove_if(&call_id, |_, v| Arc::ptr_eq(v, &session));
                    if removed.is_some() {
                        info!(%call_id, "idle call session destroyed");
                    }
                    return;
                }
                let deadline = idle_since + timeout;
                drop(s);
                tokio::time::sleep_until(deadline).await;
            }
        });
    }

    /// Adds a subscriber, creating the session if absent. A join during the
    /// drain grace period revives the session.
    pub async fn join(self: &Arc<Self>, call_id: &str, subscriber: Subscriber) {
        let session = self.get_or_create(call_id);
        let mut s = session.lock().await;
        s.drain_epoch += 1;
        info!(%call_id, subscriber = %subscriber.id, viewers = s.subscribers.len() + 1, "subscriber joined");
        s.subscribers.push(subscriber);
    }

    /// Removes a subscriber. When the last one leaves, the session drains:
    /// a grace timer destroys it unless someone rejoins first.
    pub async fn leave(self: &Arc<Self>, call_id: &str, subscriber_id: &str) {
        let Some(session) = self.get(call_id) else {
            return;
        };
        let mut s = session.lock().await;
        let before = s.subscribers.len();
        s.subscribers.retain(|sub| sub.id != subscriber_id);
        if s.subscribers.len() == before {
            return;
        }
        info!(%call_id, subscriber = %subscriber_id, viewers = s.subscribers.len(), "subscriber left");

        if s.subscribers.is_empty() {
            s.drain_epoch += 1;
            let epoch = s.drain_epoch;
            drop(s);
            debug!(%call_id, "call session draining");
            let registry = self.clone();
            let call_id = call_id.to_string();
            tokio::spawn(async move {
                tokio::time::sleep(registry.config.drain_grace()).await;
                registry.finish_drain(&call_id, epoch).await;
            });
        }
    }

    async fn finish_drain(&self, call_id: &str, epoch: u64) {
        let Some(session) = self.get(call_id) else {
            return;
        };
        let s = session.lock().await;
        if s.subscribers.is_empty() && s.drain_epoch == epoch {
            drop(s);
            self.sessions.remove(call_id);
            info!(%call_id, "call session destroyed");
        }
    }

    /// Delivers an event to every current subscriber of the call. A dead
    /// subscriber (closed channel) is pruned and never affects delivery to
    /// the others. Unknown calls are a no-op.
    pub async fn publish(&self, call_id: &str, event: RoomEvent) {
        let Some(session) = self.get(call_id) else {
            return;
        };
        let mut s = session.lock().await;
        s.subscribers.retain(|sub| {
            if sub.send(event.clone()) {
                true
            } else {
                warn!(%call_id, subscriber = %sub.id, "pruning dead subscriber");
                false
            }
        });
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub async fn subscriber_count(&self, call_id: &str) -> usize {
        match self.get(call_id) {
            Some(session) => session.lock().await.subscribers.len(),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TranscriptEvent, TriggerReason};
    use chrono::Utc;
    use std::time::Duration;
    use tokio::time::Instant;

    fn transcript_event(call_id: &str, text: &str) -> TranscriptEvent {
        let timestamp = Utc::now();
        TranscriptEvent {
            id: TranscriptEvent::derive_id(call_id, text, timestamp),
            call_id: call_id.to_string(),
            speaker: "alice".to_string(),
            text: text.to_string(),
            confidence: 0.9,
            timestamp,
            is_final: true,
        }
    }

    fn transcript(call_id: &str, text: &str) -> RoomEvent {
        RoomEvent::Transcript(transcript_event(call_id, text))
    }

    fn text_of(event: &RoomEvent) -> &str {
        match event {
            RoomEvent::Transcript(t) => &t.text,
            RoomEvent::Suggestion(s) => &s.text,
        }
    }

    #[tokio::test]
    async fn publish_reaches_all_current_subscribers() {
        let registry = SessionRegistry::new(OrchestratorConfig::default());
        let (sub_a, mut rx_a) = Subscriber::new("a".into());
        let (sub_b, mut rx_b) = Subscriber::new("b".into());
        registry.join("call-1", sub_a).await;
        registry.join("call-1", sub_b).await;

        registry.publish("call-1", transcript("call-1", "hello")).await;

        assert_eq!(text_of(&rx_a.recv().await.unwrap()), "hello");
        assert_eq!(text_of(&rx_b.recv().await.unwrap()), "hello");
    }

    #[tokio::test]
    async fn late_subscriber_does_not_receive_past_events() {
        let registry = SessionRegistry::new(OrchestratorConfig::default());
        let (sub_a, mut rx_a) = Subscriber::new("a".into());
        registry.join("call-1", sub_a).await;

        registry.publish("call-1", transcript("call-1", "before")).await;

        let (sub_b, mut rx_b) = Subscriber::new("b".into());
        registry.join("call-1", sub_b).await;
        registry.publish("call-1", transcript("call-1", "after")).await;

        assert_eq!(text_of(&rx_a.recv().await.unwrap()), "before");
        assert_eq!(text_of(&rx_a.recv().await.unwrap()), "after");
        // The late joiner sees only what was published after it joined.
        assert_eq!(text_of(&rx_b.recv().await.unwrap()), "after");
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn dead_subscriber_does_not_block_the_rest() {
        let registry = SessionRegistry::new(OrchestratorConfig::default());
        let (sub_a, rx_a) = Subscriber::new("a".into());
        let (sub_b, mut rx_b) = Subscriber::new("b".into());
        registry.join("call-1", sub_a).await;
        registry.join("call-1", sub_b).await;
        drop(rx_a);

        registry.publish("call-1", transcript("call-1", "still delivered")).await;

        assert_eq!(text_of(&rx_b.recv().await.unwrap()), "still delivered");
        assert_eq!(registry.subscriber_count("call-1").await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn session_is_destroyed_after_grace_period() {
        let registry = SessionRegistry::new(OrchestratorConfig {
            drain_grace_secs: 30,
            ..Default::default()
        });
        let (sub, _rx) = Subscriber::new("a".into());
        registry.join("call-1", sub).await;
        registry.leave("call-1", "a").await;

        assert_eq!(registry.session_count(), 1);
        // Paused clock auto-advances: the 30s drain timer fires during this sleep.
        tokio::time::sleep(Duration::from_secs(31)).await;
        tokio::task::yield_now().await;
        assert_eq!(registry.session_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rejoin_during_grace_cancels_teardown() {
        let registry = SessionRegistry::new(OrchestratorConfig {
            drain_grace_secs: 30,
            ..Default::default()
        });
        let (sub, _rx) = Subscriber::new("a".into());
        registry.join("call-1", sub).await;
        registry.leave("call-1", "a").await;

        tokio::time::sleep(Duration::from_secs(10)).await;
        let (sub2, mut rx2) = Subscriber::new("a2".into());
        registry.join("call-1", sub2).await;

        tokio::time::sleep(Duration::from_secs(60)).await;
        tokio::task::yield_now().await;
        assert_eq!(registry.session_count(), 1);

        registry.publish("call-1", transcript("call-1", "survived")).await;
        assert_eq!(text_of(&rx2.recv().await.unwrap()), "survived");
    }

    #[tokio::test(start_paused = true)]
    async fn viewerless_ingest_session_is_reclaimed_after_idle_timeout() {
        let registry = SessionRegistry::new(OrchestratorConfig {
            idle_timeout_secs: 300,
            ..Default::default()
        });
        let session = registry.get_or_create("call-1");
        session
            .lock()
            .await
            .append(transcript_event("call-1", "anyone there"), Instant::now());
        assert_eq!(registry.session_count(), 1);

        tokio::time::sleep(Duration::from_secs(301)).await;
        tokio::task::yield_now().await;
        assert_eq!(registry.session_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn transcript_activity_defers_idle_reclaim() {
        let registry = SessionRegistry::new(OrchestratorConfig {
            idle_timeout_secs: 300,
            ..Default::default()
        });
        let session = registry.get_or_create("call-1");

        tokio::time::sleep(Duration::from_secs(200)).await;
        session
            .lock()
            .await
            .append(transcript_event("call-1", "still talking"), Instant::now());

        // The original deadline passes without teardown.
        tokio::time::sleep(Duration::from_secs(150)).await;
        tokio::task::yield_now().await;
        assert_eq!(registry.session_count(), 1);

        // 300s after the last transcript the session goes.
        tokio::time::sleep(Duration::from_secs(200)).await;
        tokio::task::yield_now().await;
        assert_eq!(registry.session_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_reclaim_skips_sessions_with_viewers() {
        let registry = SessionRegistry::new(OrchestratorConfig {
            idle_timeout_secs: 300,
            ..Default::default()
        });
        let (sub, _rx) = Subscriber::new("a".into());
        registry.join("call-1", sub).await;

        tokio::time::sleep(Duration::from_secs(301)).await;
        tokio::task::yield_now().await;
        assert_eq!(registry.session_count(), 1);
    }

    #[test]
    fn trigger_reason_labels_are_stable() {
        assert_eq!(TriggerReason::MaxWaitFallback.as_str(), "max_wait_fallback");
        assert_eq!(TriggerReason::ManualRequest.as_str(), "manual_request");
    }
}
