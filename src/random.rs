use crate::fast_rng::FastRng;
use rand::RngCore;
use rand_mt::Mt;
use serde::{Deserialize, Serialize};

/// Random number generator families selectable from the simulation input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RandomNumberGeneratorType {
    /// 32-bit Mersenne Twister (MT19937)
    #[default]
    MersenneTwister,
    /// PCG-LCG, see [`FastRng`]
    Pcg,
}

/// The random source owned by one worker.
///
/// Each worker gets its own instance; instances are never shared across
/// threads, so no two workers draw from the same stream.
pub enum SimulationRng {
    MersenneTwister(Box<Mt>),
    Pcg(FastRng),
}

impl SimulationRng {
    /// Build the generator for worker `stream` of a run seeded with `seed`.
    ///
    /// Stream 0 of a Mersenne Twister run with a seed that fits in 32 bits
    /// is the plain MT19937 sequence for that seed. Wider seeds and the other
    /// streams initialise MT19937 from all 64 bits of their key.
    pub fn for_stream(rng_type: RandomNumberGeneratorType, seed: u64, stream: u64) -> Self {
        match rng_type {
            RandomNumberGeneratorType::MersenneTwister => {
                let mt = match u32::try_from(seed) {
                    Ok(narrow) if stream == 0 => Mt::new(narrow),
                    _ => {
                        let key = if stream == 0 {
                            seed
                        } else {
                            splitmix64(seed ^ splitmix64(stream))
                        };
                        Mt::new_with_key([key as u32, (key >> 32) as u32])
                    }
                };
                SimulationRng::MersenneTwister(Box::new(mt))
            }
            RandomNumberGeneratorType::Pcg => {
                SimulationRng::Pcg(FastRng::with_stream(seed, stream))
            }
        }
    }

    /// Uniform draw in the open interval (0, 1), safe to pass to `ln`.
    #[inline]
    pub fn uniform_open(&mut self) -> f64 {
        loop {
            let xi = self.uniform();
            if xi > 0.0 {
                return xi;
            }
        }
    }

    /// Uniform draw in [0, 1)
    #[inline]
    pub fn uniform(&mut self) -> f64 {
        match self {
            // 53-bit resolution from two 32-bit words
            SimulationRng::MersenneTwister(mt) => {
                let a = (mt.next_u32() >> 5) as f64;
                let b = (mt.next_u32() >> 6) as f64;
                (a * 67108864.0 + b) * (1.0 / 9007199254740992.0)
            }
            SimulationRng::Pcg(rng) => rng.random(),
        }
    }
}

impl RngCore for SimulationRng {
    fn next_u32(&mut self) -> u32 {
        match self {
            SimulationRng::MersenneTwister(mt) => mt.next_u32(),
            SimulationRng::Pcg(rng) => rng.next_u32(),
        }
    }

    fn next_u64(&mut self) -> u64 {
        match self {
            SimulationRng::MersenneTwister(mt) => mt.next_u64(),
            SimulationRng::Pcg(rng) => rng.next_u64(),
        }
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        match self {
            SimulationRng::MersenneTwister(mt) => mt.fill_bytes(dest),
            SimulationRng::Pcg(rng) => rng.fill_bytes(dest),
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E3779B97F4A7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_stream_same_sequence() {
        for rng_type in [RandomNumberGeneratorType::MersenneTwister, RandomNumberGeneratorType::Pcg] {
            let mut a = SimulationRng::for_stream(rng_type, 0, 3);
            let mut b = SimulationRng::for_stream(rng_type, 0, 3);
            for _ in 0..50 {
                assert_eq!(a.uniform(), b.uniform());
            }
        }
    }

    #[test]
    fn test_distinct_streams() {
        for rng_type in [RandomNumberGeneratorType::MersenneTwister, RandomNumberGeneratorType::Pcg] {
            let mut a = SimulationRng::for_stream(rng_type, 0, 0);
            let mut b = SimulationRng::for_stream(rng_type, 0, 1);
            let xs: Vec<f64> = (0..8).map(|_| a.uniform()).collect();
            let ys: Vec<f64> = (0..8).map(|_| b.uniform()).collect();
            assert_ne!(xs, ys);
        }
    }

    #[test]
    fn test_high_seed_bits_change_the_sequence() {
        for rng_type in [RandomNumberGeneratorType::MersenneTwister, RandomNumberGeneratorType::Pcg] {
            for stream in [0, 2] {
                let mut a = SimulationRng::for_stream(rng_type, 1, stream);
                let mut b = SimulationRng::for_stream(rng_type, (1 << 32) | 1, stream);
                let xs: Vec<f64> = (0..8).map(|_| a.uniform()).collect();
                let ys: Vec<f64> = (0..8).map(|_| b.uniform()).collect();
                assert_ne!(xs, ys, "{:?} stream {}", rng_type, stream);
            }
        }
    }

    #[test]
    fn test_narrow_seed_is_plain_mt19937() {
        let mut rng = SimulationRng::for_stream(RandomNumberGeneratorType::MersenneTwister, 5489, 0);
        let mut mt = Mt::new(5489);
        for _ in 0..16 {
            let a = (mt.next_u32() >> 5) as f64;
            let b = (mt.next_u32() >> 6) as f64;
            assert_eq!(rng.uniform(), (a * 67108864.0 + b) * (1.0 / 9007199254740992.0));
        }
    }

    #[test]
    fn test_uniform_open_excludes_zero() {
        let mut rng = SimulationRng::for_stream(RandomNumberGeneratorType::MersenneTwister, 5, 0);
        for _ in 0..10000 {
            let xi = rng.uniform_open();
            assert!(xi > 0.0 && xi < 1.0);
        }
    }
}
