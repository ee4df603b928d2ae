use core::ops::RangeInclusive;
use std::time::Duration;

use rand::Rng;

/// A backoff timer that lives alongside some operation to retry.
///
/// It does not _perform_ the waiting; it only tells the caller how
/// long to wait after each failed attempt, and when to give up.
///
/// ```
/// use std::time::Duration;
///
/// use ribbit_coap::retry;
///
/// let strategy = retry::Strategy::Exponential { init_min: Duration::from_millis(100),
///                                               init_max: Duration::from_millis(100) };
/// let mut rng = rand::thread_rng();
/// let mut retry = retry::RetryTimer::new(&mut rng, strategy, retry::Attempts(3));
///
/// // attempt 1 happens before asking what_should_i_do
/// assert_eq!(retry.first_delay(), Duration::from_millis(100));
/// assert_eq!(retry.what_should_i_do(),
///            retry::YouShould::Retry(Duration::from_millis(200)));
/// assert_eq!(retry.what_should_i_do(),
///            retry::YouShould::Retry(Duration::from_millis(400)));
/// assert_eq!(retry.what_should_i_do(), retry::YouShould::Cry);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RetryTimer {
  init: Duration,
  strategy: Strategy,
  attempts: Attempts,
  max_attempts: Attempts,
}

/// A number of attempts
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Attempts(pub u16);

/// Result of [`RetryTimer::what_should_i_do`].
///
/// This tells you if a retry should be attempted or not.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum YouShould {
  /// Attempts have been exhausted and the work that is
  /// being retried should be considered poisoned.
  Cry,
  /// A retry should be performed now, then waited on
  /// for this long before asking again
  Retry(Duration),
}

impl RetryTimer {
  /// Create a new retrier, drawing the initial delay from `rng`
  /// when the strategy has jitter
  pub fn new<R: Rng + ?Sized>(rng: &mut R, strategy: Strategy, max_attempts: Attempts) -> Self {
    let init = if strategy.has_jitter() {
      let range = strategy.range();
      let ms = rng.gen_range(range.start().as_millis() as u64..=range.end().as_millis() as u64);
      Duration::from_millis(ms)
    } else {
      *strategy.range().start()
    };

    Self { init,
           strategy,
           max_attempts,
           attempts: Attempts(1) }
  }

  /// How long to wait after the first attempt
  pub fn first_delay(&self) -> Duration {
    self.init
  }

  /// Number of attempts made so far
  pub fn attempts(&self) -> Attempts {
    self.attempts
  }

  /// When the thing we keep trying fails, invoke this to
  /// tell the retrytimer "it failed again! what do I do??"
  pub fn what_should_i_do(&mut self) -> YouShould {
    if self.attempts >= self.max_attempts {
      YouShould::Cry
    } else {
      self.attempts.0 += 1;
      YouShould::Retry(self.strategy.delay(self.init, self.attempts))
    }
  }
}

/// Strategy to employ when retrying
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Strategy {
  /// Generate a random delay between `min` and `max`,
  /// and wait until this delay has passed between attempts.
  ///
  /// After each failed attempt, double the delay before retrying again.
  Exponential {
    /// Minimum (inclusive) delay for second attempt
    init_min: Duration,
    /// Maximum (inclusive) delay for second attempt
    init_max: Duration,
  },
  /// Generate a random delay between `min` and `max`,
  /// and wait until this delay has passed between attempts.
  Delay {
    /// Minimum (inclusive) delay for attempts
    min: Duration,
    /// Maximum (inclusive) delay for attempts
    max: Duration,
  },
}

impl Strategy {
  /// Are min & max delays the same? if so, we should probably skip the random number generation.
  pub fn has_jitter(&self) -> bool {
    let rng = self.range();
    rng.start() != rng.end()
  }

  /// Get the min & max durations as an inclusive range
  pub fn range(&self) -> RangeInclusive<Duration> {
    match self {
      | &Self::Delay { min, max } => (min..=max),
      | &Self::Exponential { init_min, init_max } => (init_min..=init_max),
    }
  }

  /// Get the amount of time this strategy will take if all attempts fail
  pub fn max_time(&self, max_attempts: Attempts) -> Duration {
    match self {
      | Self::Exponential { init_max, .. } => Self::total_delay_exp(*init_max, max_attempts.0),
      | Self::Delay { max, .. } => *max * u32::from(max_attempts.0),
    }
  }

  /// How long to wait after attempt number `attempt`
  fn delay(&self, init: Duration, attempt: Attempts) -> Duration {
    match self {
      | Self::Exponential { .. } => Self::delay_exp(init, attempt.0),
      | Self::Delay { .. } => init,
    }
  }

  // | attempt | delay            |
  // | 1       | init             |
  // | 2       | init * 2         |
  // | 3       | init * 4         |
  // | ...     | ...              |
  // | n       | init * 2^(n-1)   |
  fn delay_exp(init: Duration, attempt: u16) -> Duration {
    init * 2u32.saturating_pow(u32::from(attempt.max(1)) - 1)
  }

  /// Sum of the delays after every one of `attempts` attempts
  fn total_delay_exp(init: Duration, attempts: u16) -> Duration {
    init * 2u32.saturating_pow(u32::from(attempts)).saturating_sub(1)
  }
}
