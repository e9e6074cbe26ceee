//! Browser identity generation for fingerprint rotation.
//!
//! Every fetch attempt presents itself as a different browser: a fresh
//! user-agent drawn from a pool of realistic signatures, a randomized
//! viewport, a standard header set, and (when a proxy list is configured) a
//! proxy endpoint chosen independently per attempt. Identities are never
//! reused across attempts, so successive requests for the same URL do not
//! correlate.
//!
//! Randomness is owned by the [`IdentityPool`] rather than pulled from a
//! thread-local, so tests can seed it and replay the same identity sequence.

use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Realistic desktop browser signatures rotated across fetch attempts.
static USER_AGENTS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:127.0) Gecko/20100101 Firefox/127.0",
        "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:126.0) Gecko/20100101 Firefox/126.0",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Safari/605.1.15",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36 Edg/126.0.0.0",
    ]
});

/// Viewport sampling bounds.
const VIEWPORT_WIDTH_RANGE: (u32, u32) = (1024, 1920);
const VIEWPORT_HEIGHT_RANGE: (u32, u32) = (768, 1080);
const SCALE_FACTORS: [u32; 3] = [1, 2, 3];

/// Window geometry presented to the rendering backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    /// Device scale factor: 1, 2, or 3.
    pub scale: u32,
}

/// The full set of client-presented signals for one fetch attempt.
#[derive(Debug, Clone)]
pub struct Identity {
    /// User-agent string presented by the browser session.
    pub user_agent: String,
    /// Randomized window geometry.
    pub viewport: Viewport,
    /// Request headers; generated defaults merged with caller-supplied ones.
    pub headers: HashMap<String, String>,
    /// `host:port` proxy endpoint, or `None` for a direct connection.
    pub proxy: Option<String>,
}

/// Factory for per-attempt identities.
///
/// Holds the proxy list fetched at startup and a seedable RNG. Construct
/// with [`IdentityPool::new`] in production or [`IdentityPool::seeded`] in
/// tests.
pub struct IdentityPool {
    proxies: Vec<String>,
    rng: Mutex<StdRng>,
}

impl IdentityPool {
    /// Pool with OS-seeded randomness.
    pub fn new(proxies: Vec<String>) -> Self {
        Self {
            proxies,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Pool with deterministic randomness for reproducible sampling.
    pub fn seeded(proxies: Vec<String>, seed: u64) -> Self {
        Self {
            proxies,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Whether any proxies are available for rotation.
    pub fn has_proxies(&self) -> bool {
        !self.proxies.is_empty()
    }

    /// Generate a fresh identity.
    ///
    /// Samples a user-agent uniformly from the signature pool, a viewport
    /// width from 1024..=1920, a height from 768..=1080, and a scale factor
    /// from {1, 2, 3}. `base_headers` entries override the generated
    /// defaults (`Accept-Language`, `Referer`) on key collision. When the
    /// pool holds proxies, one is chosen uniformly, independent of every
    /// other attempt's choice.
    pub async fn next_identity(&self, base_headers: &HashMap<String, String>) -> Identity {
        let mut rng = self.rng.lock().await;

        let user_agent = USER_AGENTS[rng.random_range(0..USER_AGENTS.len())].to_string();
        let viewport = Viewport {
            width: rng.random_range(VIEWPORT_WIDTH_RANGE.0..=VIEWPORT_WIDTH_RANGE.1),
            height: rng.random_range(VIEWPORT_HEIGHT_RANGE.0..=VIEWPORT_HEIGHT_RANGE.1),
            scale: SCALE_FACTORS[rng.random_range(0..SCALE_FACTORS.len())],
        };
        let proxy = if self.proxies.is_empty() {
            None
        } else {
            Some(self.proxies[rng.random_range(0..self.proxies.len())].clone())
        };

        let mut headers = default_headers();
        for (k, v) in base_headers {
            headers.insert(k.clone(), v.clone());
        }

        Identity {
            user_agent,
            viewport,
            headers,
            proxy,
        }
    }
}

/// Headers every identity starts from.
pub fn default_headers() -> HashMap<String, String> {
    HashMap::from([
        (
            "Accept-Language".to_string(),
            "en-US,en;q=0.9".to_string(),
        ),
        ("Referer".to_string(), "https://www.google.com/".to_string()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_viewport_within_sampling_bounds() {
        let pool = IdentityPool::seeded(vec![], 42);
        for _ in 0..200 {
            let id = pool.next_identity(&HashMap::new()).await;
            assert!((1024..=1920).contains(&id.viewport.width));
            assert!((768..=1080).contains(&id.viewport.height));
            assert!([1, 2, 3].contains(&id.viewport.scale));
        }
    }

    #[tokio::test]
    async fn test_user_agent_comes_from_pool() {
        let pool = IdentityPool::seeded(vec![], 7);
        let id = pool.next_identity(&HashMap::new()).await;
        assert!(USER_AGENTS.contains(&id.user_agent.as_str()));
    }

    #[tokio::test]
    async fn test_seeded_pools_replay_identically() {
        let a = IdentityPool::seeded(vec!["10.0.0.1:8080".to_string()], 99);
        let b = IdentityPool::seeded(vec!["10.0.0.1:8080".to_string()], 99);
        for _ in 0..20 {
            let ia = a.next_identity(&HashMap::new()).await;
            let ib = b.next_identity(&HashMap::new()).await;
            assert_eq!(ia.user_agent, ib.user_agent);
            assert_eq!(ia.viewport, ib.viewport);
            assert_eq!(ia.proxy, ib.proxy);
        }
    }

    #[tokio::test]
    async fn test_no_proxy_without_proxy_list() {
        let pool = IdentityPool::seeded(vec![], 1);
        let id = pool.next_identity(&HashMap::new()).await;
        assert_eq!(id.proxy, None);
    }

    #[tokio::test]
    async fn test_proxy_chosen_from_list() {
        let proxies = vec!["10.0.0.1:8080".to_string(), "10.0.0.2:3128".to_string()];
        let pool = IdentityPool::seeded(proxies.clone(), 5);
        for _ in 0..20 {
            let id = pool.next_identity(&HashMap::new()).await;
            assert!(proxies.contains(&id.proxy.unwrap()));
        }
    }

    #[tokio::test]
    async fn test_caller_headers_override_defaults() {
        let pool = IdentityPool::seeded(vec![], 3);
        let base = HashMap::from([
            ("Referer".to_string(), "https://news.google.com/".to_string()),
            ("X-Custom".to_string(), "1".to_string()),
        ]);
        let id = pool.next_identity(&base).await;
        assert_eq!(
            id.headers.get("Referer"),
            Some(&"https://news.google.com/".to_string())
        );
        assert_eq!(
            id.headers.get("Accept-Language"),
            Some(&"en-US,en;q=0.9".to_string())
        );
        assert_eq!(id.headers.get("X-Custom"), Some(&"1".to_string()));
    }
}
