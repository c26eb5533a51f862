//! Passive accrual calculator
//!
//! Computes LP owed for elapsed offline time since the last claim, capped
//! at the accrual window. The cap bounds the backlog a stale or manipulated
//! timestamp can mint. A player who has never claimed is treated as away
//! the full window (a welcome-back grant); see DESIGN.md.
//!
//! A zero-LP quote must not advance the claim timestamp: a player who
//! checks in seconds after claiming keeps their fractional remainder, and
//! the timestamp only moves on a non-zero claim.

use chrono::{DateTime, Utc};

/// Result of quoting passive accrual at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccrualQuote {
    /// Whole-LP amount owed.
    pub claimed: u64,
    /// Uncapped whole minutes since the last claim.
    pub minutes_offline: u64,
    /// Minutes that actually earn, after the cap.
    pub capped_minutes: u64,
}

/// Quote the accrual owed at `now` for a player whose last successful claim
/// was `last_claim` (absent on first use).
pub fn quote(
    last_claim: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    lp_per_hour: u64,
    window_minutes: u64,
) -> AccrualQuote {
    let minutes_offline = match last_claim {
        Some(at) => {
            let elapsed_ms = (now - at).num_milliseconds().max(0) as u64;
            elapsed_ms / 60_000
        }
        None => window_minutes,
    };
    let capped_minutes = minutes_offline.min(window_minutes);
    AccrualQuote {
        claimed: capped_minutes * lp_per_hour / 60,
        minutes_offline,
        capped_minutes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    const WINDOW: u64 = 480;

    #[test]
    fn caps_long_absences_at_the_window() {
        let now = Utc::now();
        let q = quote(Some(now - ChronoDuration::hours(800)), now, 250, WINDOW);
        assert_eq!(q.capped_minutes, 480);
        assert_eq!(q.claimed, 2000); // exactly 8 hours at 250/h
        assert_eq!(q.minutes_offline, 800 * 60);
    }

    #[test]
    fn short_absences_floor_to_whole_minutes() {
        let now = Utc::now();
        let q = quote(
            Some(now - ChronoDuration::seconds(150)),
            now,
            600,
            WINDOW,
        );
        assert_eq!(q.minutes_offline, 2);
        assert_eq!(q.claimed, 20); // 2 min at 600/h
    }

    #[test]
    fn immediate_recheck_owes_nothing() {
        let now = Utc::now();
        let q = quote(Some(now - ChronoDuration::seconds(5)), now, 1000, WINDOW);
        assert_eq!(q.claimed, 0);
        assert_eq!(q.minutes_offline, 0);
    }

    #[test]
    fn never_claimed_earns_the_full_window() {
        let q = quote(None, Utc::now(), 60, WINDOW);
        assert_eq!(q.minutes_offline, WINDOW);
        assert_eq!(q.claimed, 480);
    }

    #[test]
    fn clock_skew_never_goes_negative() {
        let now = Utc::now();
        let q = quote(Some(now + ChronoDuration::minutes(10)), now, 600, WINDOW);
        assert_eq!(q.claimed, 0);
        assert_eq!(q.minutes_offline, 0);
    }

    #[test]
    fn sub_hour_rates_floor_the_payout() {
        let now = Utc::now();
        // 7 minutes at 50/h = 5.83... -> 5
        let q = quote(Some(now - ChronoDuration::minutes(7)), now, 50, WINDOW);
        assert_eq!(q.claimed, 5);
    }
}
