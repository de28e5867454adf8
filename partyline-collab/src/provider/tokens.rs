use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use log::{error, info};
use tokio::sync::Mutex;

use crate::{Config, ProviderError, SessionStore, TokenData};

use super::PlaybackProvider;

/// Owns the OAuth token pair of every session. Refreshes tokens proactively
/// before they expire, and coalesces concurrent refreshes for the same
/// session into one provider call, since a second refresh with the same
/// refresh token would invalidate the first.
pub struct TokenCache<S, P> {
    store: Arc<S>,
    provider: Arc<P>,
    config: Config,

    entries: DashMap<String, TokenData>,
    refresh_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl<S, P> TokenCache<S, P>
where
    S: SessionStore,
    P: PlaybackProvider,
{
    pub fn new(store: &Arc<S>, provider: &Arc<P>, config: &Config) -> Self {
        Self {
            store: store.clone(),
            provider: provider.clone(),
            config: config.clone(),
            entries: Default::default(),
            refresh_locks: Default::default(),
        }
    }

    /// Returns a token that is guaranteed to outlive the refresh threshold,
    /// refreshing it first if necessary
    pub async fn get_valid(&self, slug: &str) -> Result<TokenData, ProviderError> {
        let current = match self.cached(slug) {
            Some(tokens) => tokens,
            None => {
                let persisted = self
                    .store
                    .tokens(slug)
                    .await
                    .map_err(|e| ProviderError::Unavailable(e.to_string()))?
                    .ok_or(ProviderError::NotLinked)?;

                self.entries.insert(slug.to_string(), persisted.clone());
                persisted
            }
        };

        if self.is_fresh(&current) {
            return Ok(current);
        }

        let lock = self.refresh_lock(slug);
        let _guard = lock.lock().await;

        // Someone else may have refreshed while this caller waited
        if let Some(tokens) = self.cached(slug) {
            if self.is_fresh(&tokens) {
                return Ok(tokens);
            }
        }

        self.refresh(slug, current).await
    }

    /// Stores a freshly exchanged token pair, making it the cached truth
    pub async fn store_tokens(&self, slug: &str, tokens: TokenData) -> Result<(), ProviderError> {
        self.store
            .update_tokens(slug, &tokens)
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        self.entries.insert(slug.to_string(), tokens);
        Ok(())
    }

    /// Clears the cached and persisted tokens for a session, used on unlink
    pub async fn discard(&self, slug: &str) -> Result<(), ProviderError> {
        self.entries.remove(slug);
        self.refresh_locks.remove(slug);

        self.store
            .discard_tokens(slug)
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))
    }

    async fn refresh(&self, slug: &str, current: TokenData) -> Result<TokenData, ProviderError> {
        match self.provider.refresh_tokens(&current.refresh).await {
            Ok(new_tokens) => {
                info!("Refreshed tokens for session {}", slug);
                self.entries.insert(slug.to_string(), new_tokens.clone());

                // A failed persist is not fatal, the cache stays authoritative
                if let Err(e) = self.store.update_tokens(slug, &new_tokens).await {
                    error!("Failed to persist refreshed tokens for {}: {}", slug, e);
                }

                Ok(new_tokens)
            }
            // A 400/401 on refresh is terminal for this token pair
            Err(ProviderError::AuthExpired) => Err(ProviderError::AuthExpired),
            Err(e) => {
                // Fall back to the stale token if the clock says it still works
                if current.expires_at > Utc::now() {
                    error!("Refresh failed for session {}, using stale token: {}", slug, e);
                    Ok(current)
                } else {
                    Err(ProviderError::AuthExpired)
                }
            }
        }
    }

    fn cached(&self, slug: &str) -> Option<TokenData> {
        self.entries.get(slug).map(|t| t.clone())
    }

    fn is_fresh(&self, tokens: &TokenData) -> bool {
        Utc::now() + self.config.refresh_threshold() < tokens.expires_at
    }

    fn refresh_lock(&self, slug: &str) -> Arc<Mutex<()>> {
        self.refresh_locks
            .entry(slug.to_string())
            .or_default()
            .clone()
    }
}
