use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use rand::seq::SliceRandom;

/// A shuffle source seeded from kernel entropy, falling back to a fixed seed
/// if the OS entropy pool cannot be reached (observed on some sandboxed hosts).
pub struct Random {
    rng: StdRng,
}

impl Random {
    pub fn from_entropy() -> Self {
        let mut seed = [0u8; 32];
        if let Err(err) = getrandom::getrandom(&mut seed) {
            log::warn!("kernel entropy unavailable ({err}), falling back to a fixed shuffle seed");
            seed = [0x5A; 32];
        }
        Self {
            rng: StdRng::from_seed(seed),
        }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    /// Fisher-Yates / Durstenfeld shuffle in place. No-op for `len <= 1`.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.rng);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shuffle_preserves_multiset() {
        let mut rng = Random::from_entropy();
        let mut items = vec![1, 2, 3, 4, 5];
        let original: Vec<i32> = items.clone();
        rng.shuffle(&mut items);
        let mut sorted = items.clone();
        sorted.sort();
        let mut sorted_original = original.clone();
        sorted_original.sort();
        assert_eq!(sorted, sorted_original);
    }

    #[test]
    fn shuffle_of_empty_is_noop() {
        let mut rng = Random::from_entropy();
        let mut items: Vec<i32> = vec![];
        rng.shuffle(&mut items);
        assert!(items.is_empty());
    }
}
