//! Sliding-window rate limiter
//!
//! Three coupled windows per hour: per user id, per ip, and global. A call
//! is admitted only when every applicable window has room, and admission
//! records a timestamp in all of them. Waiters queue FIFO; a timed-out or
//! dropped waiter never records.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::Notify;

use localfind_core::Error;
use localfind_config::RateLimitSettings;

/// Limiter configuration. The window is one hour in production; tests
/// shrink it.
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    pub per_user: u32,
    pub per_ip: u32,
    pub global: u32,
    pub window: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            per_user: 100,
            per_ip: 200,
            global: 1000,
            window: Duration::from_secs(3600),
        }
    }
}

impl From<&RateLimitSettings> for RateLimiterConfig {
    fn from(settings: &RateLimitSettings) -> Self {
        Self {
            per_user: settings.per_user_per_hour,
            per_ip: settings.per_ip_per_hour,
            global: settings.global_per_hour,
            window: Duration::from_secs(3600),
        }
    }
}

/// Outcome of a non-blocking admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    /// Denied; a slot frees up after `wait`
    Limited { wait: Duration },
}

/// Remaining capacity per scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeStatus {
    pub user_remaining: Option<u32>,
    pub ip_remaining: Option<u32>,
    pub global_remaining: u32,
}

struct Buckets {
    per_user: HashMap<String, VecDeque<Instant>>,
    per_ip: HashMap<String, VecDeque<Instant>>,
    global: VecDeque<Instant>,
    /// FIFO admission queue of waiter tokens
    queue: VecDeque<u64>,
}

/// The process-wide rate limiter. Constructed explicitly and passed by
/// reference so each test gets fresh state.
pub struct RateLimiter {
    config: RateLimiterConfig,
    buckets: Mutex<Buckets>,
    notify: Notify,
    next_token: AtomicU64,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            buckets: Mutex::new(Buckets {
                per_user: HashMap::new(),
                per_ip: HashMap::new(),
                global: VecDeque::new(),
                queue: VecDeque::new(),
            }),
            notify: Notify::new(),
            next_token: AtomicU64::new(1),
        }
    }

    pub fn shared(config: RateLimiterConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    fn prune(window: Duration, now: Instant, bucket: &mut VecDeque<Instant>) {
        while let Some(oldest) = bucket.front() {
            if now.duration_since(*oldest) >= window {
                bucket.pop_front();
            } else {
                break;
            }
        }
    }

    /// Check all applicable windows; on admission record a timestamp in
    /// every one of them. Never blocks.
    pub fn try_acquire(&self, user_id: Option<&str>, ip: Option<&str>) -> Admission {
        let now = Instant::now();
        let mut buckets = self.buckets.lock();
        self.admit_locked(&mut buckets, now, user_id, ip)
    }

    fn admit_locked(
        &self,
        buckets: &mut Buckets,
        now: Instant,
        user_id: Option<&str>,
        ip: Option<&str>,
    ) -> Admission {
        let window = self.config.window;

        Self::prune(window, now, &mut buckets.global);
        if let Some(user) = user_id {
            if let Some(bucket) = buckets.per_user.get_mut(user) {
                Self::prune(window, now, bucket);
                if bucket.is_empty() {
                    buckets.per_user.remove(user);
                }
            }
        }
        if let Some(ip) = ip {
            if let Some(bucket) = buckets.per_ip.get_mut(ip) {
                Self::prune(window, now, bucket);
                if bucket.is_empty() {
                    buckets.per_ip.remove(ip);
                }
            }
        }

        // A scope at its limit yields the wait until its oldest entry ages
        // out; with several limiting scopes the waiter needs all of them.
        let mut wait: Option<Duration> = None;
        let mut note_limit = |bucket: &VecDeque<Instant>, limit: u32| {
            if bucket.len() >= limit as usize {
                if let Some(oldest) = bucket.front() {
                    let scope_wait = window.saturating_sub(now.duration_since(*oldest));
                    wait = Some(wait.map_or(scope_wait, |w| w.max(scope_wait)));
                }
            }
        };

        note_limit(&buckets.global, self.config.global);
        if let Some(user) = user_id {
            if let Some(bucket) = buckets.per_user.get(user) {
                note_limit(bucket, self.config.per_user);
            }
        }
        if let Some(ip) = ip {
            if let Some(bucket) = buckets.per_ip.get(ip) {
                note_limit(bucket, self.config.per_ip);
            }
        }

        if let Some(wait) = wait {
            return Admission::Limited { wait };
        }

        buckets.global.push_back(now);
        if let Some(user) = user_id {
            buckets
                .per_user
                .entry(user.to_string())
                .or_default()
                .push_back(now);
        }
        if let Some(ip) = ip {
            buckets
                .per_ip
                .entry(ip.to_string())
                .or_default()
                .push_back(now);
        }
        Admission::Admitted
    }

    /// Queue for admission, FIFO. Resolves when admitted or fails with
    /// `RateLimitTimeout` once the budget expires. A waiter that times out
    /// (or is dropped by cancellation) records nothing.
    pub async fn wait_for_slot(
        &self,
        user_id: Option<&str>,
        ip: Option<&str>,
        timeout: Duration,
    ) -> Result<(), Error> {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let deadline = Instant::now() + timeout;

        self.buckets.lock().queue.push_back(token);
        let mut guard = QueueGuard {
            limiter: self,
            token,
            active: true,
        };

        loop {
            {
                let now = Instant::now();
                let mut buckets = self.buckets.lock();
                if buckets.queue.front() == Some(&token) {
                    if let Admission::Admitted = self.admit_locked(&mut buckets, now, user_id, ip) {
                        buckets.queue.pop_front();
                        guard.active = false;
                        drop(buckets);
                        // Let the next waiter in line re-check
                        self.notify.notify_waiters();
                        return Ok(());
                    }
                }
            }

            let now = Instant::now();
            if now >= deadline {
                // guard removes the queue entry
                let scope = self.limiting_scope(user_id, ip);
                return Err(Error::RateLimitTimeout {
                    scope,
                    waited_ms: timeout.as_millis() as u64,
                });
            }

            let remaining = deadline.duration_since(now);
            // Wake on queue movement, or re-check periodically in case the
            // head slot freed by the window sliding forward
            let _ = tokio::time::timeout(
                remaining.min(Duration::from_millis(50)),
                self.notify.notified(),
            )
            .await;
        }
    }

    fn limiting_scope(&self, user_id: Option<&str>, ip: Option<&str>) -> String {
        let now = Instant::now();
        let buckets = self.buckets.lock();
        if buckets.global.len() >= self.config.global as usize {
            return "global".to_string();
        }
        if let Some(user) = user_id {
            if let Some(bucket) = buckets.per_user.get(user) {
                let live = bucket
                    .iter()
                    .filter(|t| now.duration_since(**t) < self.config.window)
                    .count();
                if live >= self.config.per_user as usize {
                    return format!("user:{user}");
                }
            }
        }
        if let Some(ip) = ip {
            if let Some(bucket) = buckets.per_ip.get(ip) {
                let live = bucket
                    .iter()
                    .filter(|t| now.duration_since(**t) < self.config.window)
                    .count();
                if live >= self.config.per_ip as usize {
                    return format!("ip:{ip}");
                }
            }
        }
        "queue".to_string()
    }

    /// Remaining slots per scope.
    pub fn status(&self, user_id: Option<&str>, ip: Option<&str>) -> ScopeStatus {
        let now = Instant::now();
        let mut buckets = self.buckets.lock();
        let window = self.config.window;

        Self::prune(window, now, &mut buckets.global);
        let global_remaining = self
            .config
            .global
            .saturating_sub(buckets.global.len() as u32);

        let user_remaining = user_id.map(|user| {
            let used = buckets
                .per_user
                .get_mut(user)
                .map(|bucket| {
                    Self::prune(window, now, bucket);
                    bucket.len() as u32
                })
                .unwrap_or(0);
            self.config.per_user.saturating_sub(used)
        });

        let ip_remaining = ip.map(|ip| {
            let used = buckets
                .per_ip
                .get_mut(ip)
                .map(|bucket| {
                    Self::prune(window, now, bucket);
                    bucket.len() as u32
                })
                .unwrap_or(0);
            self.config.per_ip.saturating_sub(used)
        });

        ScopeStatus {
            user_remaining,
            ip_remaining,
            global_remaining,
        }
    }
}

/// Removes the waiter's queue entry on timeout or cancellation.
struct QueueGuard<'a> {
    limiter: &'a RateLimiter,
    token: u64,
    active: bool,
}

impl Drop for QueueGuard<'_> {
    fn drop(&mut self) {
        if self.active {
            let mut buckets = self.limiter.buckets.lock();
            buckets.queue.retain(|t| *t != self.token);
            drop(buckets);
            self.limiter.notify.notify_waiters();
        }
    }
}
