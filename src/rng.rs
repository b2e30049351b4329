use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng as _, SeedableRng};

use crate::types::Color;

/// Seedable random source shared by initial fill, spawn fill and shuffle.
#[derive(Clone, Debug)]
pub struct Rng {
    inner: StdRng,
}

impl Rng {
    pub fn new(seed: u64) -> Self {
        Self {
            inner: StdRng::seed_from_u64(seed),
        }
    }

    /// Uniform color in `[0, color_count)`. `color_count` must be non-zero.
    pub fn color(&mut self, color_count: u8) -> Color {
        self.inner.random_range(0..color_count)
    }

    pub fn pick_index(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        self.inner.random_range(0..len)
    }

    /// Fisher-Yates permutation in place.
    pub fn shuffle<T>(&mut self, values: &mut [T]) {
        values.shuffle(&mut self.inner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_yields_same_colors() {
        let mut a = Rng::new(77);
        let mut b = Rng::new(77);
        for _ in 0..200 {
            assert_eq!(a.color(6), b.color(6));
        }
    }

    #[test]
    fn colors_stay_below_count() {
        let mut rng = Rng::new(3);
        let mut seen = [false; 4];
        for _ in 0..2_000 {
            let color = rng.color(4);
            assert!(color < 4);
            seen[color as usize] = true;
        }
        assert!(seen.iter().all(|hit| *hit));
    }

    #[test]
    fn single_color_is_always_zero() {
        let mut rng = Rng::new(9);
        for _ in 0..50 {
            assert_eq!(rng.color(1), 0);
        }
    }

    #[test]
    fn pick_index_handles_tiny_lengths() {
        let mut rng = Rng::new(1);
        assert_eq!(rng.pick_index(0), 0);
        assert_eq!(rng.pick_index(1), 0);
        for _ in 0..100 {
            assert!(rng.pick_index(5) < 5);
        }
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut rng = Rng::new(12);
        let mut values: Vec<u8> = (0..32).collect();
        rng.shuffle(&mut values);
        let mut sorted = values.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..32).collect::<Vec<u8>>());
    }
}
