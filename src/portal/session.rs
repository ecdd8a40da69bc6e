//! Session credential caching for the legacy portals.
//!
//! Each portal sub-system has its own login flow and session lifetime.
//! Login is a multi-redirect handshake worth amortizing, so acquired
//! cookies are cached with a TTL kept shorter than the portal's own
//! session timeout. Credentials are immutable values: clients borrow
//! them, attach them as a header, and never mutate them. A cache race
//! producing a duplicate login is wasteful but harmless.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

/// Which portal sub-system a credential authenticates against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortalSystem {
    /// The WebLink order repository.
    Weblink,
    /// The well-files imaging system.
    WellFiles,
}

impl PortalSystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weblink => "weblink",
            Self::WellFiles => "well_files",
        }
    }
}

/// An opaque, immutable credential bundle for one portal system.
#[derive(Debug, Clone)]
pub struct SessionCookies {
    pub system: PortalSystem,
    /// Ready-to-send `Cookie` header value.
    pub cookie_header: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionCookies {
    /// Build a credential from collected cookie pairs and a TTL.
    pub fn new(system: PortalSystem, pairs: &[(String, String)], ttl: Duration) -> Self {
        let now = Utc::now();
        let cookie_header = pairs
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        Self {
            system,
            cookie_header,
            acquired_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// TTL cache of session credentials, keyed by portal system.
#[derive(Debug, Default, Clone)]
pub struct SessionCache {
    inner: Arc<RwLock<HashMap<PortalSystem, SessionCookies>>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an unexpired credential for a system, if cached.
    pub async fn get(&self, system: PortalSystem) -> Option<SessionCookies> {
        let now = Utc::now();
        let cache = self.inner.read().await;
        cache
            .get(&system)
            .filter(|cookies| !cookies.is_expired(now))
            .cloned()
    }

    /// Store a freshly acquired credential.
    pub async fn store(&self, cookies: SessionCookies) {
        let mut cache = self.inner.write().await;
        cache.insert(cookies.system, cookies);
    }

    /// Drop a credential (after the portal rejects it mid-flow).
    pub async fn invalidate(&self, system: PortalSystem) {
        let mut cache = self.inner.write().await;
        cache.remove(&system);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookies(system: PortalSystem, ttl: Duration) -> SessionCookies {
        SessionCookies::new(
            system,
            &[
                ("ASP.NET_SessionId".to_string(), "abc123".to_string()),
                ("LFAuth".to_string(), "tok".to_string()),
            ],
            ttl,
        )
    }

    #[test]
    fn cookie_header_joins_pairs() {
        let c = cookies(PortalSystem::Weblink, Duration::minutes(20));
        assert_eq!(c.cookie_header, "ASP.NET_SessionId=abc123; LFAuth=tok");
    }

    #[tokio::test]
    async fn cache_returns_unexpired_per_system() {
        let cache = SessionCache::new();
        cache.store(cookies(PortalSystem::Weblink, Duration::minutes(20))).await;

        assert!(cache.get(PortalSystem::Weblink).await.is_some());
        assert!(cache.get(PortalSystem::WellFiles).await.is_none());
    }

    #[tokio::test]
    async fn cache_drops_expired_credentials() {
        let cache = SessionCache::new();
        cache.store(cookies(PortalSystem::Weblink, Duration::minutes(-1))).await;
        assert!(cache.get(PortalSystem::Weblink).await.is_none());
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let cache = SessionCache::new();
        cache.store(cookies(PortalSystem::WellFiles, Duration::minutes(10))).await;
        cache.invalidate(PortalSystem::WellFiles).await;
        assert!(cache.get(PortalSystem::WellFiles).await.is_none());
    }
}
