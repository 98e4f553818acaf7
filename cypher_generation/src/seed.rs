//! Deterministic byte source driving every randomized generation decision.
//!
//! A [Seed] either draws fresh bytes from a PRNG and records them, or replays a
//! previously recorded byte string. Replaying the recorded bytes through the
//! same clauses reproduces the same statements, which is what bug reports,
//! regeneration and reduction rely on.

use base64::{engine::general_purpose, Engine as _};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("invalid base64 byte string: {0}")]
    Decode(#[from] base64::DecodeError),
}

#[derive(Debug, Clone)]
enum Source {
    /// Draws bytes from the rng and records them.
    Random(ChaCha8Rng),
    /// Replays a fixed buffer, yielding zero once it is exhausted.
    Replay,
}

#[derive(Debug, Clone)]
pub struct Seed {
    source: Source,
    bytes: Vec<u8>,
    cursor: usize,
}

impl Seed {
    /// A recording seed backed by a freshly seeded rng.
    pub fn random() -> Self {
        Self::from_rng_seed(rand::rng().random())
    }

    /// A recording seed whose byte stream is fully determined by `seed`.
    pub fn from_rng_seed(seed: u64) -> Self {
        Self {
            source: Source::Random(ChaCha8Rng::seed_from_u64(seed)),
            bytes: Vec::new(),
            cursor: 0,
        }
    }

    /// A seed replaying `bytes`.
    pub fn replay(bytes: Vec<u8>) -> Self {
        Self {
            source: Source::Replay,
            bytes,
            cursor: 0,
        }
    }

    /// A seed replaying a base64 encoded byte string.
    pub fn from_base64(encoded: &str) -> Result<Self, SeedError> {
        let bytes = general_purpose::STANDARD.decode(encoded.trim())?;
        Ok(Self::replay(bytes))
    }

    pub fn is_replay(&self) -> bool {
        matches!(self.source, Source::Replay)
    }

    /// All bytes recorded or replayed so far, in consumption order for recording seeds.
    pub fn byte_string(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.bytes)
    }

    /// Number of bytes consumed so far.
    pub fn consumed(&self) -> usize {
        self.cursor
    }

    pub fn get_byte(&mut self) -> u8 {
        let byte = match &mut self.source {
            Source::Random(rng) => {
                let byte = rng.random::<u8>();
                self.bytes.push(byte);
                byte
            }
            Source::Replay => self.bytes.get(self.cursor).copied().unwrap_or(0),
        };
        self.cursor += 1;
        byte
    }

    /// True with probability 0.5.
    pub fn random_boolean(&mut self) -> bool {
        self.get_byte() % 2 == 0
    }

    /// True with the passed probability, which must lie in `[0, 1]`.
    pub fn boolean_with_probability(&mut self, probability: f64) -> bool {
        let generated = self.random_positive_i64();
        i64::MAX as f64 * probability > generated as f64
    }

    /// Eight little-endian bytes.
    pub fn random_i64(&mut self) -> i64 {
        let mut num = 0i64;
        for i in 0..8 {
            num |= (self.get_byte() as i64) << (i * 8);
        }
        num
    }

    pub fn random_positive_i64(&mut self) -> i64 {
        self.random_i64() & i64::MAX
    }

    /// A number in `[0, n)`.
    pub fn random_intn(&mut self, n: usize) -> usize {
        assert!(n > 0, "random_intn called with an empty range");
        (self.random_positive_i64() % n as i64) as usize
    }

    pub fn random_choice<'a, T>(&mut self, choices: &'a [T]) -> &'a T {
        &choices[self.random_intn(choices.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn exhausted_replay_yields_zero() {
        let mut seed = Seed::replay(vec![3]);
        assert_eq!(seed.get_byte(), 3);
        assert_eq!(seed.get_byte(), 0);
        assert_eq!(seed.random_i64(), 0);
        assert!(seed.random_boolean());
        assert!(seed.boolean_with_probability(0.01));
        assert_eq!(seed.random_intn(7), 0);
    }

    #[test]
    fn zero_probability_is_never_true() {
        let mut seed = Seed::from_rng_seed(7);
        for _ in 0..100 {
            assert!(!seed.boolean_with_probability(0.0));
        }
    }

    #[test]
    fn little_endian_i64() {
        let mut seed = Seed::replay(vec![1, 2, 0, 0, 0, 0, 0, 0x80]);
        assert_eq!(seed.random_i64(), i64::from_le_bytes([1, 2, 0, 0, 0, 0, 0, 0x80]));
    }

    #[test]
    fn invalid_base64_is_an_error() {
        assert!(Seed::from_base64("not base64!").is_err());
    }

    proptest! {
        #[test]
        fn recorded_bytes_replay_identically(rng_seed in any::<u64>(), draws in 1usize..200) {
            let mut recording = Seed::from_rng_seed(rng_seed);
            let drawn: Vec<usize> = (0..draws).map(|_| recording.random_intn(10)).collect();

            let mut replay = Seed::from_base64(&recording.to_base64()).unwrap();
            let replayed: Vec<usize> = (0..draws).map(|_| replay.random_intn(10)).collect();

            prop_assert_eq!(drawn, replayed);
            prop_assert_eq!(recording.consumed(), replay.consumed());
        }

        #[test]
        fn intn_stays_in_range(bytes in proptest::collection::vec(any::<u8>(), 0..64), n in 1usize..1000) {
            let mut seed = Seed::replay(bytes);
            for _ in 0..8 {
                prop_assert!(seed.random_intn(n) < n);
            }
        }
    }
}
