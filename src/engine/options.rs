use std::time::Duration;

const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);
const DEFAULT_PENDING_LIMIT: usize = 8192;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchOptions {
    /// Report paths as `./relative/to/root` instead of absolute.
    pub relative: bool,
    /// Track dot-prefixed entries.
    pub include_hidden: bool,
    /// Initial keep-alive state, see [`LocalWatch::retain`](super::LocalWatch::retain).
    pub keep_alive: bool,
    pub settle: bool,
    /// Quiet period required before a batch is computed.
    pub settle_delay: Duration,
    /// Open the watch while building it instead of on the first pull.
    pub eager: bool,
    /// Pending paths beyond this collapse into one rescan of the root.
    pub pending_limit: Option<usize>,
    pub watch_retry: RetryPolicy,
}

impl WatchOptions {
    /// The settle delay in effect, zero when settling is disabled.
    pub fn effective_settle_delay(&self) -> Duration {
        if self.settle {
            self.settle_delay
        } else {
            Duration::ZERO
        }
    }
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            relative: false,
            include_hidden: true,
            keep_alive: true,
            settle: true,
            settle_delay: DEFAULT_SETTLE_DELAY,
            eager: false,
            pending_limit: Some(DEFAULT_PENDING_LIMIT),
            watch_retry: RetryPolicy::default(),
        }
    }
}

/// Backoff between attempts to attach the root watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl RetryPolicy {
    pub fn delays(&self) -> impl Iterator<Item = Duration> + use<> {
        let max = self.max;
        std::iter::successors(Some(self.initial.min(max)), move |delay| {
            Some(delay.saturating_mul(2).min(max))
        })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(50),
            max: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;

    #[test]
    fn retry_delays_double_up_to_the_cap() {
        let delays = RetryPolicy::default().delays().take(7).collect::<Vec<_>>();

        assert_eq!(
            delays,
            [50, 100, 200, 400, 800, 1000, 1000].map(Duration::from_millis)
        );
    }

    #[rstest]
    #[case(true, Duration::from_millis(100))]
    #[case(false, Duration::ZERO)]
    fn settle_flag_gates_the_delay(#[case] settle: bool, #[case] expected: Duration) {
        let options = WatchOptions {
            settle,
            ..Default::default()
        };

        assert_eq!(options.effective_settle_delay(), expected);
    }
}
