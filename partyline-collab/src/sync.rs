use dashmap::DashMap;
use futures_util::future::join_all;
use log::debug;
use std::{sync::Arc, time::Duration};

use crate::{
    events::SessionEvent, ListenerRegistry, PlaybackClient, PlaybackProvider, PlayingStatus,
    SessionStore,
};

/// Polls the provider for every session that has listeners and broadcasts
/// playback updates when something actually changed
pub struct PlaybackSynchronizer<S, P> {
    playback: Arc<PlaybackClient<S, P>>,
    listeners: Arc<ListenerRegistry>,
    /// The last status observed per session, by slug
    statuses: DashMap<String, PlayingStatus>,
}

impl<S, P> PlaybackSynchronizer<S, P>
where
    S: SessionStore,
    P: PlaybackProvider,
{
    pub fn new(playback: &Arc<PlaybackClient<S, P>>, listeners: &Arc<ListenerRegistry>) -> Self {
        Self {
            playback: playback.clone(),
            listeners: listeners.clone(),
            statuses: Default::default(),
        }
    }

    /// Spawns the poll loop
    pub fn run(self: &Arc<Self>, interval: Duration) {
        let sync = self.clone();

        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                timer.tick().await;
                sync.poll_all().await;
            }
        });
    }

    /// Polls every session with at least one listener. Sessions are
    /// independent, so one failing poll never blocks the others.
    async fn poll_all(&self) {
        let slugs = self.listeners.active_slugs();

        join_all(slugs.iter().map(|slug| self.poll_session(slug))).await;
    }

    async fn poll_session(&self, slug: &str) {
        // On a failed poll the last known status stays in place
        let Some(snapshot) = self.playback.snapshot(slug).await else {
            return;
        };

        self.update(slug, snapshot);
    }

    /// Re-polls a single session immediately, outside the regular cycle
    pub async fn refresh_session(&self, slug: &str) {
        self.poll_session(slug).await
    }

    /// The last status observed for a session, if it has been polled yet
    pub fn status(&self, slug: &str) -> Option<PlayingStatus> {
        self.statuses.get(slug).map(|s| s.clone())
    }

    /// Stores a newly observed status and broadcasts it if it differs from
    /// the previous one. Returns whether a broadcast happened.
    fn update(&self, slug: &str, new_status: PlayingStatus) -> bool {
        let changed = self
            .statuses
            .get(slug)
            .map(|previous| has_changed(&previous, &new_status))
            .unwrap_or(true);

        if !changed {
            return false;
        }

        debug!("Playback changed for session {}", slug);

        self.listeners.broadcast(
            slug,
            SessionEvent::Playback {
                current: new_status.current.clone(),
                queue: new_status.queue.clone(),
            },
        );

        self.statuses.insert(slug.to_string(), new_status);
        true
    }
}

/// A status counts as changed when the current track changed or the queue
/// differs in length or in the order of its tracks
fn has_changed(previous: &PlayingStatus, new: &PlayingStatus) -> bool {
    let current_changed = match (&previous.current, &new.current) {
        (Some(a), Some(b)) => a.id != b.id,
        (None, None) => false,
        _ => true,
    };

    if current_changed {
        return true;
    }

    if previous.queue.len() != new.queue.len() {
        return true;
    }

    previous
        .queue
        .iter()
        .zip(new.queue.iter())
        .any(|(a, b)| a.id != b.id)
}
