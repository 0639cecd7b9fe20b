//! Login throttling
//!
//! Two sliding windows: failed attempts per account (5 per 15 minutes) and
//! login requests per client IP (10 per minute).

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::net::IpAddr;
use tokio::sync::RwLock;

const MAX_ACCOUNT_FAILURES: usize = 5;
const MAX_IP_REQUESTS: usize = 10;

pub struct LoginRateLimiter {
    failures: RwLock<HashMap<String, Vec<DateTime<Utc>>>>,
    requests: RwLock<HashMap<IpAddr, Vec<DateTime<Utc>>>>,
    account_window: Duration,
    ip_window: Duration,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self {
            failures: RwLock::new(HashMap::new()),
            requests: RwLock::new(HashMap::new()),
            account_window: Duration::minutes(15),
            ip_window: Duration::minutes(1),
        }
    }

    /// Account names are compared case-insensitively
    pub async fn is_account_limited(&self, account: &str) -> bool {
        let cutoff = Utc::now() - self.account_window;
        let mut failures = self.failures.write().await;
        match failures.get_mut(&account.to_lowercase()) {
            Some(times) => {
                times.retain(|t| *t > cutoff);
                times.len() >= MAX_ACCOUNT_FAILURES
            }
            None => false,
        }
    }

    pub async fn record_failure(&self, account: &str) {
        self.failures
            .write()
            .await
            .entry(account.to_lowercase())
            .or_default()
            .push(Utc::now());
    }

    /// Forget failures after a successful login
    pub async fn clear_account(&self, account: &str) {
        self.failures.write().await.remove(&account.to_lowercase());
    }

    /// Count this request and report whether the IP is over its budget
    pub async fn check_ip(&self, ip: IpAddr) -> bool {
        let now = Utc::now();
        let cutoff = now - self.ip_window;
        let mut requests = self.requests.write().await;
        let times = requests.entry(ip).or_default();
        times.retain(|t| *t > cutoff);
        if times.len() >= MAX_IP_REQUESTS {
            return true;
        }
        times.push(now);
        false
    }

    /// Drop expired entries; run periodically
    pub async fn cleanup(&self) {
        let now = Utc::now();
        let account_cutoff = now - self.account_window;
        let ip_cutoff = now - self.ip_window;

        self.failures.write().await.retain(|_, times| {
            times.retain(|t| *t > account_cutoff);
            !times.is_empty()
        });
        self.requests.write().await.retain(|_, times| {
            times.retain(|t| *t > ip_cutoff);
            !times.is_empty()
        });
    }

    #[cfg(test)]
    async fn tracked(&self) -> (usize, usize) {
        (self.failures.read().await.len(), self.requests.read().await.len())
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
