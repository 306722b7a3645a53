use log::debug;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// RandMode controls random generator behaviour. May be predictable for testing or truly random for gameplay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RandMode {
    /// Seeded generator; the same seed replays the same numbers
    Predictable,
    /// Small seeds count 1, 2, ..., n and wrap
    Sequential { limit: u16, next: u16 },
    RandomUniform,
}

/// Random source behind the `random` opcode
#[derive(Debug, Clone)]
pub struct ZRand {
    rng: StdRng,
    rand_mode: RandMode,
}

impl ZRand {
    /// Uniform generator, or a predictable one when a seed is configured
    pub fn new(seed: Option<u64>) -> ZRand {
        match seed {
            Some(seed) => ZRand::new_predictable(seed),
            None => ZRand::new_uniform(),
        }
    }

    pub fn new_uniform() -> ZRand {
        ZRand {
            rng: StdRng::from_entropy(),
            rand_mode: RandMode::RandomUniform,
        }
    }

    pub fn new_predictable(seed: u64) -> ZRand {
        ZRand {
            rng: StdRng::seed_from_u64(seed),
            rand_mode: RandMode::Predictable,
        }
    }

    pub fn mode(&self) -> &RandMode {
        &self.rand_mode
    }

    /// The `random` opcode: a positive range yields 1..=range, anything else
    /// reseeds and yields 0
    pub fn random(&mut self, range: i16) -> u16 {
        if range > 0 {
            let range = range as u16;
            return match &mut self.rand_mode {
                RandMode::Sequential { limit, next } => {
                    let value = (*next - 1) % range.min(*limit) + 1;
                    *next = if *next >= *limit { 1 } else { *next + 1 };
                    value
                }
                _ => self.rng.gen_range(1..=range),
            };
        }

        if range == 0 {
            debug!("random: reseeding from entropy");
            *self = ZRand::new_uniform();
        } else {
            let seed = range.unsigned_abs();
            debug!("random: seeding with {}", seed);
            if seed < 1000 {
                self.rand_mode = RandMode::Sequential {
                    limit: seed,
                    next: 1,
                };
            } else {
                *self = ZRand::new_predictable(seed as u64);
            }
        }
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_bounds() {
        let mut rand = ZRand::new_uniform();
        for _ in 0..500 {
            let value = rand.random(6);
            assert!((1..=6).contains(&value));
        }
        assert_eq!(rand.random(1), 1);
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = ZRand::new_uniform();
        let mut b = ZRand::new_uniform();
        assert_eq!(a.random(-5000), 0);
        assert_eq!(b.random(-5000), 0);
        let first: Vec<u16> = (0..20).map(|_| a.random(100)).collect();
        let second: Vec<u16> = (0..20).map(|_| b.random(100)).collect();
        assert_eq!(first, second);
        assert_eq!(a.mode(), &RandMode::Predictable);
    }

    #[test]
    fn test_small_seed_counts_up() {
        let mut rand = ZRand::new_uniform();
        rand.random(-3);
        let values: Vec<u16> = (0..7).map(|_| rand.random(10)).collect();
        assert_eq!(values, vec![1, 2, 3, 1, 2, 3, 1]);
    }

    #[test]
    fn test_zero_returns_to_uniform() {
        let mut rand = ZRand::new_predictable(7);
        assert_eq!(rand.random(0), 0);
        assert_eq!(rand.mode(), &RandMode::RandomUniform);
    }
}
