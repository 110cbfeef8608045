use std::fmt;
use std::ops::Add;

/// PES clock rate.
pub const PTS_HZ: u64 = 90_000;

/// PTS/DTS values wrap at 33 bits.
pub const PTS_MASK: u64 = 0x1_FFFF_FFFF;

/// A presentation or decode timestamp in 90kHz ticks.
///
/// The PES header carries 33-bit values, so ticks are held in a `u64`.
/// `as_millis` gives the millisecond view (ticks / 90).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub const fn from_ticks(ticks: u64) -> Self {
        Timestamp(ticks)
    }

    pub const fn from_millis(millis: u64) -> Self {
        Timestamp(millis * (PTS_HZ / 1000))
    }

    pub const fn ticks(&self) -> u64 {
        self.0
    }

    pub fn as_millis(&self) -> f64 {
        self.0 as f64 / (PTS_HZ / 1000) as f64
    }

    /// Ticks elapsed since `earlier`, or zero if `earlier` is later.
    pub fn ticks_since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl Add<u64> for Timestamp {
    type Output = Timestamp;

    fn add(self, ticks: u64) -> Timestamp {
        Timestamp(self.0 + ticks)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}ms", self.as_millis())
    }
}
