//! Fibonacci-form maximal-length LFSR used for random block offsets.
//!
//! For a width `w` in `2..=16` the register visits every nonzero `w`-bit
//! value exactly once before returning to its seed. The random access
//! pattern issues block 0 first and then one generator value per request,
//! so a run over `2^w` blocks touches every block exactly once.
//!
//! Tap positions are stored as right-shift amounts, i.e. `w - degree` for
//! each term of the feedback polynomial. Widths whose best two-term
//! polynomial is not primitive (8, 12, 13, 14, 16) use four taps.

use crate::error::{ConfigError, Result};

/// Narrowest supported register.
pub const MIN_WIDTH: u32 = 2;

/// Widest supported register.
pub const MAX_WIDTH: u32 = 16;

const SEED: u32 = 0xBEEF;

/// One row of the polynomial table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TapDescriptor {
    pub width: u8,
    /// Right shifts selecting the tapped bits. Only the first two are used
    /// unless `four_taps` is set.
    pub shifts: [u8; 4],
    pub four_taps: bool,
}

impl TapDescriptor {
    /// Polynomial degrees for the taps in use, highest first.
    pub fn degrees(&self) -> Vec<u8> {
        let taps = if self.four_taps { 4 } else { 2 };
        self.shifts[..taps].iter().map(|s| self.width - s).collect()
    }
}

const fn two(width: u8, second: u8) -> TapDescriptor {
    TapDescriptor {
        width,
        shifts: [0, second, width, width],
        four_taps: false,
    }
}

const fn four(width: u8, shifts: [u8; 4]) -> TapDescriptor {
    TapDescriptor {
        width,
        shifts,
        four_taps: true,
    }
}

/// Indexed by `width - 2`.
pub static TAPS: [TapDescriptor; 15] = [
    two(2, 1),               // x^2 + x + 1
    two(3, 1),               // x^3 + x^2 + 1
    two(4, 1),               // x^4 + x^3 + 1
    two(5, 2),               // x^5 + x^3 + 1
    two(6, 1),               // x^6 + x^5 + 1
    two(7, 1),               // x^7 + x^6 + 1
    four(8, [0, 2, 3, 4]),   // x^8 + x^6 + x^5 + x^4 + 1
    two(9, 4),               // x^9 + x^5 + 1
    two(10, 3),              // x^10 + x^7 + 1
    two(11, 2),              // x^11 + x^9 + 1
    four(12, [0, 1, 2, 8]),  // x^12 + x^11 + x^10 + x^4 + 1
    four(13, [0, 1, 2, 5]),  // x^13 + x^12 + x^11 + x^8 + 1
    four(14, [0, 1, 2, 12]), // x^14 + x^13 + x^12 + x^2 + 1
    two(15, 1),              // x^15 + x^14 + 1
    four(16, [0, 2, 3, 5]),  // x^16 + x^14 + x^13 + x^11 + 1
];

/// Full-period pseudorandom sequence over `w`-bit values.
///
/// Once the register returns to its seed the generator is exhausted and
/// yields `0` forever. [`FiboLfsr::exhausted`] builds a generator that is
/// exhausted from the start, for workloads that never need one.
#[derive(Debug, Clone)]
pub struct FiboLfsr {
    taps: Option<&'static TapDescriptor>,
    value: u32,
    seed: u32,
    exhausted: bool,
}

impl FiboLfsr {
    pub fn new(width: u32) -> Result<Self> {
        if !(MIN_WIDTH..=MAX_WIDTH).contains(&width) {
            return Err(ConfigError::InvalidWidth(width).into());
        }

        let taps = &TAPS[(width - MIN_WIDTH) as usize];
        let seed = SEED & (u32::MAX >> (32 - width));

        Ok(Self {
            taps: Some(taps),
            value: seed,
            seed,
            exhausted: false,
        })
    }

    /// Generator sized for a random walk over `block_count` blocks.
    ///
    /// The width is `floor(log2(block_count))`, so only `2^width` blocks are
    /// reachable (block 0 plus the generator's period). Callers that want
    /// full coverage must use a power-of-two block count.
    pub fn for_block_count(block_count: u64) -> Result<Self> {
        if block_count < 4 {
            return Err(ConfigError::TooFewBlocksForRandom(block_count).into());
        }
        let width = block_count.ilog2().min(MAX_WIDTH + 1);
        Self::new(width)
    }

    /// A generator with no register, already exhausted.
    pub fn exhausted() -> Self {
        Self {
            taps: None,
            value: 0,
            seed: 0,
            exhausted: true,
        }
    }

    pub fn width(&self) -> Option<u32> {
        self.taps.map(|t| u32::from(t.width))
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Number of values emitted before exhaustion, `2^width - 1`.
    pub fn period(&self) -> u32 {
        self.taps.map_or(0, |t| (1u32 << t.width) - 1)
    }

    /// Advances the register and returns the new value, or `0` once exhausted.
    pub fn next_value(&mut self) -> u32 {
        let Some(taps) = self.taps.filter(|_| !self.exhausted) else {
            return 0;
        };

        let s = taps.shifts;
        let v = self.value;
        let bit = if taps.four_taps {
            ((v >> s[0]) ^ (v >> s[1]) ^ (v >> s[2]) ^ (v >> s[3])) & 1
        } else {
            ((v >> s[0]) ^ (v >> s[1])) & 1
        };

        self.value = (v >> 1) | (bit << (taps.width - 1));
        if self.value == self.seed {
            self.exhausted = true;
        }
        self.value
    }
}

impl Default for FiboLfsr {
    fn default() -> Self {
        Self::exhausted()
    }
}

impl Iterator for FiboLfsr {
    type Item = u32;

    /// Yields each value of the period once, ending with the seed.
    fn next(&mut self) -> Option<u32> {
        if self.exhausted {
            None
        } else {
            Some(self.next_value())
        }
    }
}
