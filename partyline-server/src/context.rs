use std::sync::Arc;

use axum::extract::FromRef;
use partyline_collab::{Partyline, PgSessionStore, Spotify};

pub type App = Partyline<PgSessionStore, Spotify>;

#[derive(Clone, FromRef)]
pub struct ServerContext {
    pub partyline: Arc<App>,
}
