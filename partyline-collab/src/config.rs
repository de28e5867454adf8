use std::time::Duration;

use chrono::Duration as ChronoDuration;

/// The configuration of a partyline instance
#[derive(Debug, Clone)]
pub struct Config {
    /// The client id of the provider application
    pub provider_client_id: String,
    /// The client secret of the provider application
    pub provider_client_secret: String,
    /// Where the provider redirects after the user authorizes access
    pub provider_redirect_uri: String,
    /// The key used to sign admin tokens
    pub secret_key: String,
    /// How many seconds of remaining access token lifetime trigger a refresh
    pub refresh_threshold_in_seconds: i64,
    /// How often the playback of active sessions is polled, in seconds
    pub poll_interval_in_seconds: u64,
    /// How long an outbound provider call may take before it is abandoned
    pub request_timeout_in_seconds: u64,
    /// How many pages of a paginated provider resource are followed at most
    pub max_pages: usize,
    /// How long an issued admin token is valid
    pub admin_token_expiry_in_minutes: i64,
}

impl Config {
    /// The remaining lifetime below which an access token is refreshed
    pub fn refresh_threshold(&self) -> ChronoDuration {
        ChronoDuration::seconds(self.refresh_threshold_in_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_in_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_in_seconds)
    }

    pub fn admin_token_expiry(&self) -> ChronoDuration {
        ChronoDuration::minutes(self.admin_token_expiry_in_minutes)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider_client_id: String::new(),
            provider_client_secret: String::new(),
            provider_redirect_uri: String::new(),
            secret_key: crate::util::random_string(64),
            // Refreshing a minute early avoids requests with a token that
            // expires mid-flight
            refresh_threshold_in_seconds: 60,
            poll_interval_in_seconds: 10,
            request_timeout_in_seconds: 10,
            // More than enough for any realistic playlist
            max_pages: 50,
            admin_token_expiry_in_minutes: 30,
        }
    }
}
