/// First retry waits this long; each further attempt doubles it.
pub const BASE_BACKOFF_SECS: i64 = 15;
pub const MAX_BACKOFF_SECS: i64 = 3600;

/// Seconds to wait before retrying after failed attempt number `attempt`
/// (1-based): 15, 30, 60, ... capped at one hour.
pub fn backoff_seconds(attempt: u32) -> i64 {
    let exp = attempt.saturating_sub(1).min(16);
    (BASE_BACKOFF_SECS << exp).min(MAX_BACKOFF_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_then_caps() {
        assert_eq!(backoff_seconds(0), 15);
        assert_eq!(backoff_seconds(1), 15);
        assert_eq!(backoff_seconds(2), 30);
        assert_eq!(backoff_seconds(3), 60);
        assert_eq!(backoff_seconds(8), 1920);
        assert_eq!(backoff_seconds(9), 3600);
        assert_eq!(backoff_seconds(u32::MAX), 3600);
    }
}
