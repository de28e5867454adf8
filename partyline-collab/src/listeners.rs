use futures_util::Stream;
use parking_lot::Mutex;
use std::{
    collections::VecDeque,
    pin::Pin,
    sync::{Arc, Weak},
    task::{Context, Poll, Waker},
};

use crate::{events::SessionEvent, Id};

pub type ListenerId = Id<Listener>;

/// Tracks every connected listener and which session each one is tuned to
pub struct ListenerRegistry {
    me: Weak<Self>,
    listeners: Mutex<Vec<Listener>>,
}

pub struct Listener {
    id: ListenerId,
    /// The session this listener is tuned to, if any
    slug: Option<String>,
    /// Whether the listener proved it holds the session password
    admin: bool,
    pending_events: Arc<Mutex<VecDeque<SessionEvent>>>,
    waker: Arc<Mutex<Option<Waker>>>,
}

/// Held by the transport for the lifetime of a connection.
/// Dropping it removes the listener from the registry.
pub struct ListenerHandle {
    id: ListenerId,
    /// A reference to [Listener]'s pending events
    pending_events: Arc<Mutex<VecDeque<SessionEvent>>>,
    /// A reference to [Listener]'s stored [Waker]
    waker: Arc<Mutex<Option<Waker>>>,
    registry: Weak<ListenerRegistry>,
}

impl ListenerRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            listeners: Default::default(),
        })
    }

    /// Registers a new listener and greets it with its id
    pub fn connect(&self) -> ListenerHandle {
        let listener = Listener::new();
        let handle = listener.handle(self.me.clone());

        listener.send(SessionEvent::Welcome { listener_id: listener.id });
        self.listeners.lock().push(listener);

        handle
    }

    /// Tunes a listener to a session, leaving any session it was in before.
    /// Admin status does not carry over between sessions.
    pub fn join(&self, id: ListenerId, slug: &str) {
        let mut listeners = self.listeners.lock();

        if let Some(listener) = listeners.iter_mut().find(|l| l.id == id) {
            listener.slug = Some(slug.to_string());
            listener.admin = false;
        }
    }

    pub fn leave(&self, id: ListenerId) {
        let mut listeners = self.listeners.lock();

        if let Some(listener) = listeners.iter_mut().find(|l| l.id == id) {
            listener.slug = None;
            listener.admin = false;
        }
    }

    /// Marks a listener as admin of the given session. Has no effect unless
    /// the listener is currently tuned to that exact session.
    pub fn authenticate_as_admin(&self, id: ListenerId, slug: &str) -> bool {
        let mut listeners = self.listeners.lock();

        if let Some(listener) = listeners.iter_mut().find(|l| l.id == id) {
            if listener.slug.as_deref() == Some(slug) {
                listener.admin = true;
                return true;
            }
        }

        false
    }

    /// Sends an event to every listener tuned to the given session
    pub fn broadcast(&self, slug: &str, event: SessionEvent) {
        let listeners = self.listeners.lock();

        for listener in listeners.iter().filter(|l| l.slug.as_deref() == Some(slug)) {
            listener.send(event.clone())
        }
    }

    /// Sends an event only to admins of the given session
    pub fn broadcast_to_admins(&self, slug: &str, event: SessionEvent) {
        let listeners = self.listeners.lock();

        for listener in listeners
            .iter()
            .filter(|l| l.admin && l.slug.as_deref() == Some(slug))
        {
            listener.send(event.clone())
        }
    }

    pub fn send_to(&self, id: ListenerId, event: SessionEvent) {
        let listeners = self.listeners.lock();

        if let Some(listener) = listeners.iter().find(|l| l.id == id) {
            listener.send(event)
        }
    }

    /// Every session that has at least one listener tuned to it
    pub fn active_slugs(&self) -> Vec<String> {
        let listeners = self.listeners.lock();

        let mut slugs: Vec<_> = listeners.iter().filter_map(|l| l.slug.clone()).collect();

        slugs.sort();
        slugs.dedup();
        slugs
    }

    fn disconnect(&self, id: ListenerId) {
        self.listeners.lock().retain(|l| l.id != id)
    }
}

impl Listener {
    fn new() -> Self {
        Self {
            id: ListenerId::new(),
            slug: None,
            admin: false,
            pending_events: Default::default(),
            waker: Default::default(),
        }
    }

    fn send(&self, event: SessionEvent) {
        self.pending_events.lock().push_back(event);

        if let Some(waker) = self.waker.lock().take() {
            waker.wake()
        }
    }

    fn handle(&self, registry: Weak<ListenerRegistry>) -> ListenerHandle {
        ListenerHandle {
            id: self.id,
            pending_events: self.pending_events.clone(),
            waker: self.waker.clone(),
            registry,
        }
    }
}

impl ListenerHandle {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    #[cfg(test)]
    pub(crate) fn pending_len(&self) -> usize {
        self.pending_events.lock().len()
    }
}

impl Stream for ListenerHandle {
    type Item = SessionEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut pending_events = self.pending_events.lock();

        if let Some(event) = pending_events.pop_front() {
            return Poll::Ready(Some(event));
        }

        *self.waker.lock() = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.disconnect(self.id)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use futures_util::StreamExt;

    async fn next_event(handle: &mut ListenerHandle) -> SessionEvent {
        handle.next().await.expect("stream yields an event")
    }

    #[tokio::test]
    async fn test_welcome_carries_listener_id() {
        let registry = ListenerRegistry::new();
        let mut handle = registry.connect();

        match next_event(&mut handle).await {
            SessionEvent::Welcome { listener_id } => assert_eq!(listener_id, handle.id()),
            other => panic!("expected welcome, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_listener_is_in_at_most_one_session() {
        let registry = ListenerRegistry::new();
        let mut handle = registry.connect();

        registry.join(handle.id(), "first-party");
        registry.join(handle.id(), "second-party");

        registry.broadcast("first-party", SessionEvent::PlaylistRemoved);
        registry.broadcast("second-party", SessionEvent::PlaylistRemoved);

        // Welcome, then exactly one broadcast from the current session
        next_event(&mut handle).await;
        next_event(&mut handle).await;
        assert!(handle.pending_events.lock().is_empty());

        assert_eq!(registry.active_slugs(), vec!["second-party".to_string()]);
    }

    #[tokio::test]
    async fn test_broadcast_only_reaches_the_session() {
        let registry = ListenerRegistry::new();
        let mut inside = registry.connect();
        let mut outside = registry.connect();

        registry.join(inside.id(), "bobs-party");

        registry.broadcast("bobs-party", SessionEvent::PlaylistRemoved);

        next_event(&mut inside).await;
        assert_eq!(inside.pending_events.lock().len(), 1);

        next_event(&mut outside).await;
        assert!(outside.pending_events.lock().is_empty());
    }

    #[tokio::test]
    async fn test_admin_events_skip_guests() {
        let registry = ListenerRegistry::new();
        let admin = registry.connect();
        let guest = registry.connect();

        registry.join(admin.id(), "bobs-party");
        registry.join(guest.id(), "bobs-party");
        assert!(registry.authenticate_as_admin(admin.id(), "bobs-party"));

        registry.broadcast_to_admins("bobs-party", SessionEvent::PlaylistRemoved);

        // Welcome plus the admin broadcast
        assert_eq!(admin.pending_events.lock().len(), 2);
        assert_eq!(guest.pending_events.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_admin_status_requires_matching_session() {
        let registry = ListenerRegistry::new();
        let handle = registry.connect();

        registry.join(handle.id(), "someone-elses-party");
        assert!(!registry.authenticate_as_admin(handle.id(), "bobs-party"));
    }

    #[tokio::test]
    async fn test_joining_resets_admin_status() {
        let registry = ListenerRegistry::new();
        let handle = registry.connect();

        registry.join(handle.id(), "bobs-party");
        registry.authenticate_as_admin(handle.id(), "bobs-party");

        registry.join(handle.id(), "bobs-party");
        let before = handle.pending_events.lock().len();

        registry.broadcast_to_admins("bobs-party", SessionEvent::PlaylistRemoved);
        assert_eq!(handle.pending_events.lock().len(), before);
    }

    #[tokio::test]
    async fn test_dropping_the_handle_disconnects() {
        let registry = ListenerRegistry::new();
        let handle = registry.connect();

        registry.join(handle.id(), "bobs-party");
        drop(handle);

        assert!(registry.active_slugs().is_empty());
    }
}
