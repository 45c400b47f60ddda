//! Fixed-window request limits per client address.
//!
//! Clients are tracked in an LRU of bounded capacity, so a flood of distinct
//! addresses evicts the least recently seen ones instead of growing memory.

use std::net::IpAddr;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

pub struct RateLimiter {
    limit: u32,
    window: Duration,
    clients: Mutex<LruCache<IpAddr, Window>>,
}

impl RateLimiter {
    /// Allows `limit` requests per `window` for each of at most `capacity` clients.
    pub fn new(limit: u32, window: Duration, capacity: NonZeroUsize) -> Self {
        Self {
            limit,
            window,
            clients: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Records a request from `client`, returning false when over the limit.
    pub async fn check(&self, client: IpAddr) -> bool {
        self.check_at(client, Instant::now()).await
    }

    async fn check_at(&self, client: IpAddr, now: Instant) -> bool {
        let mut clients = self.clients.lock().await;
        if let Some(window) = clients.get_mut(&client) {
            if now.duration_since(window.started) < self.window {
                if window.count >= self.limit {
                    return false;
                }
                window.count += 1;
                return true;
            }
        }

        // unseen or expired; put evicts the least recently seen when full
        clients.put(
            client,
            Window {
                started: now,
                count: 1,
            },
        );
        self.limit > 0
    }

    pub async fn tracked_clients(&self) -> usize {
        self.clients.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    fn limiter(limit: u32, capacity: usize) -> RateLimiter {
        RateLimiter::new(
            limit,
            Duration::from_secs(60),
            NonZeroUsize::new(capacity).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_limit_per_window() {
        let limiter = limiter(3, 16);
        let now = Instant::now();

        for _ in 0..3 {
            assert!(limiter.check_at(ip(1), now).await);
        }
        assert!(!limiter.check_at(ip(1), now).await);
        // other clients are independent
        assert!(limiter.check_at(ip(2), now).await);
    }

    #[tokio::test]
    async fn test_window_resets() {
        let limiter = limiter(1, 16);
        let now = Instant::now();

        assert!(limiter.check_at(ip(1), now).await);
        assert!(!limiter.check_at(ip(1), now + Duration::from_secs(59)).await);
        assert!(limiter.check_at(ip(1), now + Duration::from_secs(60)).await);
    }

    #[tokio::test]
    async fn test_capacity_is_bounded() {
        let limiter = limiter(1, 4);
        let now = Instant::now();

        for last in 0..100 {
            assert!(limiter.check_at(ip(last), now).await);
        }
        assert_eq!(limiter.tracked_clients().await, 4);
        // the evicted client starts a fresh window
        assert!(limiter.check_at(ip(0), now).await);
    }
}
