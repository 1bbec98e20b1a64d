use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of oracle indexes.
///
/// Used both when an oracle registers (three distinct indexes) and when a
/// status request picks the index that routes it. Production deployments use
/// an entropy-seeded generator; tests plug in a fixed seed or round-robin.
pub trait IndexSelector: Send {
    /// One index in `[0, range)`.
    fn next_index(&mut self, range: u8) -> u8;

    /// `count` distinct indexes in `[0, range)`, in draw order.
    fn distinct_indexes(&mut self, count: usize, range: u8) -> Vec<u8> {
        let count = count.min(range as usize);
        let mut picked: Vec<u8> = Vec::with_capacity(count);
        let mut attempts = 0usize;
        let max_attempts = 64 * (range as usize).max(1);

        while picked.len() < count && attempts < max_attempts {
            let index = self.next_index(range);
            if !picked.contains(&index) {
                picked.push(index);
            }
            attempts += 1;
        }

        // A degenerate selector must not stall registration.
        for index in 0..range {
            if picked.len() == count {
                break;
            }
            if !picked.contains(&index) {
                picked.push(index);
            }
        }
        picked
    }
}

/// Pseudo-random selector backed by `StdRng`.
#[derive(Debug, Clone)]
pub struct SeededIndexSelector {
    rng: StdRng,
}

impl SeededIndexSelector {
    /// Deterministic sequence for a given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl IndexSelector for SeededIndexSelector {
    fn next_index(&mut self, range: u8) -> u8 {
        if range == 0 {
            return 0;
        }
        self.rng.gen_range(0..range)
    }
}

/// Cycles through `[0, range)`. Predictable; for tests and local demos only.
#[derive(Debug, Clone, Default)]
pub struct RoundRobinSelector {
    next: u8,
}

impl RoundRobinSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(next: u8) -> Self {
        Self { next }
    }
}

impl IndexSelector for RoundRobinSelector {
    fn next_index(&mut self, range: u8) -> u8 {
        if range == 0 {
            return 0;
        }
        let index = self.next % range;
        self.next = (index + 1) % range;
        index
    }
}
