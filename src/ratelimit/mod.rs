//! Fixed-window rate limiting for command invocations.
//!
//! A [`RateLimit`] is a single counter+expiry cell; [`manager::RateLimitManager`]
//! keys cells by descriptor tuples and sweeps expired ones periodically.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

pub mod manager;

pub use manager::{ManagerStats, RateLimitManager};

/// Parses a `quantity/duration[unit]` limit spec, e.g. `"5/10s"`, `"1/10m"`.
///
/// `unit` is one of `s`, `m`, `h`, `d` and defaults to seconds.
pub fn parse_spec(spec: &str) -> Result<(u32, Duration)> {
    let bad = || Error::InvalidRateLimit(spec.to_string());

    let (quantity, duration) = spec.split_once('/').ok_or_else(bad)?;
    let quantity: u32 = quantity.trim().parse().map_err(|_| bad())?;
    if quantity == 0 {
        return Err(bad());
    }

    let duration = duration.trim();
    let (digits, unit) = match duration.find(|c: char| !c.is_ascii_digit()) {
        Some(pos) => duration.split_at(pos),
        None => (duration, ""),
    };
    let amount: u64 = digits.parse().map_err(|_| bad())?;
    let seconds = match unit {
        "" | "s" => amount,
        "m" => amount * 60,
        "h" => amount * 3600,
        "d" => amount * 86_400,
        _ => return Err(bad()),
    };
    if seconds == 0 {
        return Err(bad());
    }

    Ok((quantity, Duration::from_secs(seconds)))
}

#[derive(Debug)]
struct Window {
    count: u32,
    expires_at: Option<Instant>,
    notified: bool,
}

/// A single "at most N calls per window" cell.
///
/// Purely arithmetic: windows expire by clock comparison, no timers.
#[derive(Debug)]
pub struct RateLimit {
    limit: u32,
    duration: Duration,
    created_at: Instant,
    window: Mutex<Window>,
}

impl RateLimit {
    pub fn new(limit: u32, duration: Duration) -> Self {
        Self {
            limit,
            duration,
            created_at: Instant::now(),
            window: Mutex::new(Window {
                count: 0,
                expires_at: None,
                notified: false,
            }),
        }
    }

    pub fn from_spec(spec: &str) -> Result<Self> {
        let (limit, duration) = parse_spec(spec)?;
        Ok(Self::new(limit, duration))
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    fn fresh_window(&self) -> std::sync::MutexGuard<'_, Window> {
        let mut window = self.window.lock().unwrap();
        if let Some(expires_at) = window.expires_at {
            if Instant::now() >= expires_at {
                window.count = 0;
                window.expires_at = None;
                window.notified = false;
            }
        }
        window
    }

    /// Consumes one call from the current window.
    ///
    /// Returns `false` without mutating when the window is saturated. The
    /// first call in a window starts its expiry clock.
    pub fn call(&self) -> bool {
        let mut window = self.fresh_window();
        if window.count >= self.limit {
            return false;
        }
        window.count += 1;
        if window.count == 1 {
            window.expires_at = Some(Instant::now() + self.duration);
        }
        true
    }

    pub fn is_limited(&self) -> bool {
        let window = self.fresh_window();
        window.count >= self.limit
    }

    /// One-shot flag so a rejected caller sees the rate-limit notice once
    /// per window, not once per rejected attempt.
    pub fn set_notified(&self) {
        self.fresh_window().notified = true;
    }

    pub fn was_notified(&self) -> bool {
        self.fresh_window().notified
    }

    /// Seconds until the current window expires, rounded up. Zero when the
    /// window is inactive.
    pub fn remaining_secs(&self) -> u64 {
        let window = self.window.lock().unwrap();
        match window.expires_at {
            Some(expires_at) => {
                let now = Instant::now();
                if expires_at > now {
                    let left = expires_at - now;
                    left.as_secs() + u64::from(left.subsec_nanos() > 0)
                } else {
                    0
                }
            }
            None => 0,
        }
    }

    /// Whether the cell has been expired (or idle since creation) for longer
    /// than `grace`. Used by the manager's sweep.
    pub(crate) fn expired_for(&self, grace: Duration) -> bool {
        let window = self.window.lock().unwrap();
        let deadline = match window.expires_at {
            Some(expires_at) => expires_at + grace,
            None => self.created_at + self.duration + grace,
        };
        Instant::now() >= deadline
    }
}
