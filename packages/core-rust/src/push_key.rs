//! Chronologically sortable entry keys.
//!
//! A push key is 20 characters: 8 characters of creation time (millis since
//! epoch, most significant first) followed by 12 characters of randomness,
//! all drawn from a 64-symbol alphabet whose ASCII order matches its digit
//! order. Keys minted later therefore sort after keys minted earlier. Within
//! the same millisecond the random suffix of the previous key is incremented
//! instead of redrawn, so a single generator never emits a key that sorts
//! before one it already emitted.

use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use rand::Rng;

/// Alphabet in ascending ASCII order.
const PUSH_CHARS: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

const TIME_LEN: usize = 8;
const RANDOM_LEN: usize = 12;

/// Total length of a push key.
pub const PUSH_KEY_LEN: usize = TIME_LEN + RANDOM_LEN;

/// Abstraction over the system clock for dependency injection.
///
/// The default implementation ([`SystemClock`]) delegates to
/// `std::time::SystemTime`; tests substitute a fixed clock.
pub trait ClockSource: Send + Sync {
    /// Returns the current time as milliseconds since Unix epoch.
    fn now(&self) -> u64;
}

/// Default clock source that reads the real system time.
#[derive(Debug, Clone)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now(&self) -> u64 {
        // Millisecond timestamps fit in u64 for the foreseeable future.
        #[allow(clippy::cast_possible_truncation)]
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        millis
    }
}

struct PushState {
    last_millis: u64,
    last_random: [u8; RANDOM_LEN],
}

/// Mints push keys. One generator per store keeps its keys strictly increasing.
pub struct PushKeyGenerator {
    clock: Box<dyn ClockSource>,
    state: Mutex<PushState>,
}

impl PushKeyGenerator {
    /// Creates a generator reading the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Box::new(SystemClock))
    }

    /// Creates a generator reading the given clock.
    #[must_use]
    pub fn with_clock(clock: Box<dyn ClockSource>) -> Self {
        Self {
            clock,
            state: Mutex::new(PushState {
                last_millis: 0,
                last_random: [0; RANDOM_LEN],
            }),
        }
    }

    /// Mints the next key.
    #[must_use]
    pub fn next_key(&self) -> String {
        let now = self.clock.now();
        let mut state = self.state.lock();

        // A clock that steps backwards is treated as "same millisecond".
        let millis = now.max(state.last_millis);
        if millis == state.last_millis {
            increment(&mut state.last_random);
        } else {
            let mut rng = rand::rng();
            for digit in &mut state.last_random {
                *digit = rng.random_range(0..64);
            }
            state.last_millis = millis;
        }

        let mut key = [0u8; PUSH_KEY_LEN];
        let mut remaining = millis;
        for slot in key[..TIME_LEN].iter_mut().rev() {
            // remaining % 64 always fits in usize.
            #[allow(clippy::cast_possible_truncation)]
            let digit = (remaining % 64) as usize;
            *slot = PUSH_CHARS[digit];
            remaining /= 64;
        }
        for (slot, digit) in key[TIME_LEN..].iter_mut().zip(state.last_random) {
            *slot = PUSH_CHARS[usize::from(digit)];
        }

        key.iter().map(|&b| char::from(b)).collect()
    }
}

impl Default for PushKeyGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Adds one to a base-64 digit string, carrying leftwards.
fn increment(digits: &mut [u8; RANDOM_LEN]) {
    for digit in digits.iter_mut().rev() {
        if *digit == 63 {
            *digit = 0;
        } else {
            *digit += 1;
            return;
        }
    }
}

/// Locally generated identifier used when a store cannot mint a key.
#[must_use]
pub fn fallback_key() -> String {
    uuid::Uuid::new_v4().to_string()
}
