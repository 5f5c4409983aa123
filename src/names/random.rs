//! Pseudo-random index selection for drawing names.

/// Seed used when a zero seed is given, since xorshift can't leave the zero state.
const DEFAULT_SEED: u64 = 0x853c_49e6_748f_ea9b;

/// An xorshift64 generator. Seeding it with a fixed value makes draws reproducible.
#[derive(Clone, Debug)]
pub struct Xorshift {
    state: u64,
}

impl Xorshift {
    pub fn new(seed: u64) -> Xorshift {
        Xorshift {
            state: if seed == 0 { DEFAULT_SEED } else { seed },
        }
    }

    /// Seeds the generator from the current time.
    pub fn from_clock() -> Xorshift {
        let now = chrono::Utc::now();
        let nanos = now.timestamp_nanos_opt().unwrap_or_else(|| now.timestamp());

        Xorshift::new(nanos as u64 ^ DEFAULT_SEED)
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Returns an index in `0..len`. `len` must not be zero.
    pub fn below(&mut self, len: usize) -> usize {
        debug_assert!(len != 0);

        // Multiply-shift onto `0..len`.
        ((self.next_u64() as u128 * len as u128) >> 64) as usize
    }
}
