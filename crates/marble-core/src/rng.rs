use std::fmt;

use rand::Rng;

// ---------------------------------------------------------------------------
// Seed
// ---------------------------------------------------------------------------

/// The value every randomized parameter is derived from.
///
/// Seeds are text. Integer seeds are stored as their decimal representation,
/// so `Seed::from(42)` and `Seed::from("42")` reproduce the same output.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Seed(String);

impl Seed {
    /// An 8-digit decimal seed drawn from the OS-seeded thread RNG.
    pub fn fresh() -> Self {
        let n: u32 = rand::thread_rng().gen_range(0..100_000_000);
        Self(format!("{n:08}"))
    }

    /// Use the operator-supplied seed if there is one, otherwise fall back to
    /// a fresh seed. Blank input counts as absent.
    pub fn from_input(input: Option<&str>) -> Self {
        match input.map(str::trim) {
            Some(text) if !text.is_empty() => Self(text.to_owned()),
            _ => {
                let seed = Self::fresh();
                log::info!("No seed supplied, using fresh seed {seed}");
                seed
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Seed {
    fn from(text: &str) -> Self {
        Self(text.to_owned())
    }
}

impl From<String> for Seed {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl From<u64> for Seed {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

// ---------------------------------------------------------------------------
// SeededRandom — SplitMix64 over an FNV-1a hash of the seed text
// ---------------------------------------------------------------------------

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
const GOLDEN_GAMMA: u64 = 0x9e37_79b9_7f4a_7c15;

/// Deterministic generator: the same seed and the same sequence of calls
/// always yield the same numbers, on every platform.
///
/// The stream only moves forward. Re-seed to start over.
#[derive(Debug, Clone)]
pub struct SeededRandom {
    seed: Seed,
    state: u64,
}

impl SeededRandom {
    pub fn new(seed: impl Into<Seed>) -> Self {
        let seed = seed.into();
        let state = fnv1a(seed.as_str().as_bytes());
        Self { seed, state }
    }

    pub fn seed(&self) -> &Seed {
        &self.seed
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(GOLDEN_GAMMA);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }

    /// Uniform float in `[0, 1)` built from the top 53 bits of one draw.
    pub fn uniform01(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Uniform float in `[lo, hi)`. Consumes exactly one draw, even when
    /// `lo == hi`.
    pub fn uniform_range(&mut self, lo: f64, hi: f64) -> f64 {
        let u = self.uniform01();
        if lo >= hi {
            return lo;
        }
        let v = lo + (hi - lo) * u;
        // Rounding can land exactly on `hi` for u close to 1.
        if v < hi {
            v
        } else {
            largest_below(hi)
        }
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &b| {
        (hash ^ u64::from(b)).wrapping_mul(FNV_PRIME)
    })
}

/// The largest finite `f64` strictly less than `x`.
fn largest_below(x: f64) -> f64 {
    if x > 0.0 {
        f64::from_bits(x.to_bits() - 1)
    } else if x == 0.0 {
        -f64::from_bits(1)
    } else {
        f64::from_bits(x.to_bits() + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = SeededRandom::new("MARBLE1");
        let mut b = SeededRandom::new("MARBLE1");
        for _ in 0..256 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = SeededRandom::new("MARBLE1");
        let mut b = SeededRandom::new("MARBLE2");
        let xs: Vec<_> = (0..8).map(|_| a.next_u64()).collect();
        let ys: Vec<_> = (0..8).map(|_| b.next_u64()).collect();
        assert_ne!(xs, ys);
    }

    #[test]
    fn integer_seed_matches_its_decimal_text() {
        let mut a = SeededRandom::new(42u64);
        let mut b = SeededRandom::new("42");
        assert_eq!(a.uniform01(), b.uniform01());
        assert_eq!(a.seed(), b.seed());
    }

    #[test]
    fn known_stream_for_seed_42() {
        let mut rng = SeededRandom::new("42");
        assert_eq!(rng.uniform01(), 0.18065559456841696);
        assert_eq!(rng.uniform01(), 0.7535073685064374);
        assert_eq!(rng.uniform01(), 0.549855099791562);
    }

    #[test]
    fn uniform01_stays_in_unit_interval() {
        let mut rng = SeededRandom::new("unit");
        for _ in 0..10_000 {
            let v = rng.uniform01();
            assert!((0.0..1.0).contains(&v), "out of range: {v}");
        }
    }

    #[test]
    fn uniform_range_stays_half_open() {
        let mut rng = SeededRandom::new("range");
        for _ in 0..10_000 {
            let v = rng.uniform_range(0.4, 1.6);
            assert!((0.4..1.6).contains(&v), "out of range: {v}");
        }
    }

    #[test]
    fn degenerate_range_returns_lo_and_still_advances() {
        let mut a = SeededRandom::new("flat");
        let mut b = SeededRandom::new("flat");
        assert_eq!(a.uniform_range(3.0, 3.0), 3.0);
        b.uniform01();
        assert_eq!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn largest_below_is_strictly_below() {
        for x in [1.6, 20.0, 0.0, -2.5] {
            let y = largest_below(x);
            assert!(y < x, "{y} !< {x}");
        }
        assert_eq!(largest_below(1.0), 1.0 - f64::EPSILON / 2.0);
    }

    #[test]
    fn blank_input_falls_back_to_fresh_seed() {
        let seed = Seed::from_input(Some("   "));
        assert_eq!(seed.as_str().len(), 8);
        assert!(seed.as_str().bytes().all(|b| b.is_ascii_digit()));
    }

    #[test]
    fn supplied_input_is_trimmed_and_kept() {
        assert_eq!(Seed::from_input(Some(" MARBLE1\n")).as_str(), "MARBLE1");
    }

    #[test]
    fn fresh_seed_is_eight_digits() {
        for _ in 0..32 {
            let seed = Seed::fresh();
            assert_eq!(seed.as_str().len(), 8, "{seed}");
        }
    }
}
