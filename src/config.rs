//! Tunables for encoding and decoding.
//!
//! None of these change the wire format. They only bound how much memory
//! and recursion a decoder will commit to on behalf of untrusted input and
//! how much space an owning buffer starts out with.

use core::cmp;

//------------ DefMinMax -----------------------------------------------------

/// The default, minimum, and maximum values for a config variable.
#[derive(Clone, Copy, Debug)]
pub struct DefMinMax<T> {
    /// The default value,
    def: T,

    /// The minimum value,
    min: T,

    /// The maximum value,
    max: T,
}

impl<T> DefMinMax<T> {
    /// Creates a new value.
    pub const fn new(def: T, min: T, max: T) -> Self {
        Self { def, min, max }
    }

    /// Returns the default value.
    pub fn default(self) -> T {
        self.def
    }

    /// Trims the given value to fit into the minimum/maximum range.
    pub fn limit(self, value: T) -> T
    where
        T: Ord,
    {
        cmp::max(self.min, cmp::min(self.max, value))
    }
}

//------------ Limits --------------------------------------------------------

/// Initial capacity of an owning buffer in octets.
const INITIAL_CAPACITY: DefMinMax<usize> = DefMinMax::new(256, 0, 1 << 24);

/// Array elements reserved up front when decoding an element count.
///
/// The count comes off the wire, so reserving it in full would let a few
/// octets of input allocate gigabytes.
const MAX_PREALLOC: DefMinMax<usize> = DefMinMax::new(1024, 0, 1 << 20);

/// Maximum nesting depth of records during decoding.
const MAX_DEPTH: DefMinMax<usize> = DefMinMax::new(64, 1, 4096);

//------------ Config --------------------------------------------------------

/// Configuration for buffers and decoding.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Capacity of newly created owning buffers.
    initial_capacity: usize,

    /// Cap on array elements reserved from a decoded count.
    max_prealloc: usize,

    /// Cap on the nesting depth of decoded records.
    max_depth: usize,
}

impl Config {
    /// Creates a new, default config.
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns the initial capacity of owning buffers.
    pub fn initial_capacity(&self) -> usize {
        self.initial_capacity
    }

    /// Sets the initial capacity of owning buffers.
    ///
    /// Excessive values are quietly trimmed.
    pub fn set_initial_capacity(&mut self, value: usize) {
        self.initial_capacity = INITIAL_CAPACITY.limit(value)
    }

    /// Returns the maximum number of array elements reserved up front.
    pub fn max_prealloc(&self) -> usize {
        self.max_prealloc
    }

    /// Sets the maximum number of array elements reserved up front.
    ///
    /// Arrays with more elements still decode, their storage just grows
    /// as elements arrive. Excessive values are quietly trimmed.
    pub fn set_max_prealloc(&mut self, value: usize) {
        self.max_prealloc = MAX_PREALLOC.limit(value)
    }

    /// Returns the maximum nesting depth of decoded records.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Sets the maximum nesting depth of decoded records.
    ///
    /// Values are quietly trimmed into the range 1 to 4096.
    pub fn set_max_depth(&mut self, value: usize) {
        self.max_depth = MAX_DEPTH.limit(value)
    }

    /// Returns the capacity to reserve for an array of `count` elements.
    pub(crate) fn prealloc(&self, count: u32) -> usize {
        let count = usize::try_from(count).unwrap_or(usize::MAX);
        cmp::min(count, self.max_prealloc)
    }
}

//--- Default

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_capacity: INITIAL_CAPACITY.default(),
            max_prealloc: MAX_PREALLOC.default(),
            max_depth: MAX_DEPTH.default(),
        }
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::new();
        assert_eq!(config.initial_capacity(), 256);
        assert_eq!(config.max_prealloc(), 1024);
        assert_eq!(config.max_depth(), 64);
    }

    #[test]
    fn setters_trim() {
        let mut config = Config::new();
        config.set_max_depth(0);
        assert_eq!(config.max_depth(), 1);
        config.set_max_prealloc(usize::MAX);
        assert_eq!(config.max_prealloc(), 1 << 20);
        config.set_initial_capacity(16);
        assert_eq!(config.initial_capacity(), 16);
    }

    #[test]
    fn prealloc_is_capped() {
        let config = Config::new();
        assert_eq!(config.prealloc(3), 3);
        assert_eq!(config.prealloc(u32::MAX), 1024);
    }
}
