//! Server salt bookkeeping.

use std::time::Duration;

use tgcore_tl::types;

/// Placeholder salt sent before the server has told us the real one.
pub const INITIAL_SALT: i64 = 0x616e67656c696361;

/// How long before `valid_until` a replacement salt is fetched.
pub const REFRESH_MARGIN: Duration = Duration::from_secs(15 * 60);

/// Shortest delay between two refreshes, so an already-expiring salt cannot
/// spin the refresh loop.
pub const MIN_REFRESH_DELAY: Duration = Duration::from_secs(30);

/// A salt with its validity window (unix seconds, server clock).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServerSalt {
    pub salt: i64,
    pub valid_since: i32,
    pub valid_until: i32,
}

impl ServerSalt {
    /// The bootstrap salt; already expired, so the first refresh happens as
    /// soon as allowed.
    pub fn initial() -> Self {
        Self { salt: INITIAL_SALT, valid_since: 0, valid_until: 0 }
    }

    /// A salt learnt from `bad_server_salt` or `new_session_created`, whose
    /// window is unknown.
    pub fn untimed(salt: i64) -> Self {
        Self { salt, valid_since: 0, valid_until: 0 }
    }

    /// Pick the salt from a `future_salts` answer that is valid at the
    /// answer's `now`, falling back to the first one listed.
    pub fn pick(salts: &types::FutureSalts) -> Option<Self> {
        let list = &salts.salts.0;
        list.iter()
            .find(|s| s.valid_since <= salts.now && salts.now < s.valid_until)
            .or_else(|| list.first())
            .map(|s| Self { salt: s.salt, valid_since: s.valid_since, valid_until: s.valid_until })
    }

    /// Time to wait from `server_now` until the salt should be replaced.
    pub fn refresh_in(&self, server_now: i64) -> Duration {
        let left = i64::from(self.valid_until) - server_now - REFRESH_MARGIN.as_secs() as i64;
        Duration::from_secs(left.max(0) as u64).max(MIN_REFRESH_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tgcore_tl::RawVec;

    fn salts(now: i32) -> types::FutureSalts {
        types::FutureSalts {
            req_msg_id: 4,
            now,
            salts: RawVec(vec![
                types::FutureSalt { valid_since: 1000, valid_until: 4600, salt: 11 },
                types::FutureSalt { valid_since: 4600, valid_until: 8200, salt: 22 },
            ]),
        }
    }

    #[test]
    fn picks_the_current_window() {
        assert_eq!(ServerSalt::pick(&salts(5000)).unwrap().salt, 22);
        assert_eq!(ServerSalt::pick(&salts(1200)).unwrap().salt, 11);
        assert_eq!(ServerSalt::pick(&salts(99_999)).unwrap().salt, 11);
        let empty = types::FutureSalts { req_msg_id: 0, now: 0, salts: RawVec(vec![]) };
        assert!(ServerSalt::pick(&empty).is_none());
    }

    #[test]
    fn refresh_leaves_fifteen_minutes() {
        let s = ServerSalt { salt: 1, valid_since: 0, valid_until: 10_000 };
        assert_eq!(s.refresh_in(5_000), Duration::from_secs(5_000 - 900));
        assert_eq!(s.refresh_in(9_500), MIN_REFRESH_DELAY);
        assert_eq!(ServerSalt::initial().refresh_in(1_700_000_000), MIN_REFRESH_DELAY);
    }
}
