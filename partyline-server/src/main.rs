use std::{env, sync::Arc};

use partyline_collab::{Config, Partyline, PgSessionStore, Spotify};
use partyline_server::{init_logger, run_server, ServerContext};

#[tokio::main]
async fn main() {
    init_logger();

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL is set");

    let config = Config {
        provider_client_id: env::var("SPOTIFY_CLIENT_ID").expect("SPOTIFY_CLIENT_ID is set"),
        provider_client_secret: env::var("SPOTIFY_CLIENT_SECRET")
            .expect("SPOTIFY_CLIENT_SECRET is set"),
        provider_redirect_uri: env::var("SPOTIFY_REDIRECT_URI")
            .expect("SPOTIFY_REDIRECT_URI is set"),
        secret_key: env::var("PARTYLINE_SECRET_KEY")
            .unwrap_or_else(|_| Config::default().secret_key),
        ..Default::default()
    };

    let store = PgSessionStore::new(&database_url)
        .await
        .expect("connects to database");

    let provider = Spotify::new(&config);

    let partyline = Arc::new(Partyline::new(store, provider, config));
    partyline.start();

    run_server(ServerContext { partyline }).await
}
