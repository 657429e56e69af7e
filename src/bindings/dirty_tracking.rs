// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Dirty tracking for CPU-shadowed buffers.

A single inclusive `[min, max]` range per buffer.  Writes widen it; an upload consumes it.
Tracking one range rather than a set means two distant writes re-upload everything between
them, which is fine for buffers that are written in a few contiguous bursts per frame.
*/

/// Inclusive range of element indices written since the last upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModifiedRange {
    pub min: u32,
    pub max: u32,
}

impl Default for ModifiedRange {
    fn default() -> Self {
        Self::invalid()
    }
}

impl ModifiedRange {
    pub const fn invalid() -> Self {
        ModifiedRange { min: u32::MAX, max: 0 }
    }

    pub fn is_valid(&self) -> bool {
        self.min <= self.max
    }

    pub fn reset(&mut self) {
        *self = Self::invalid();
    }

    /// Widens the range so it includes `[min, max]`.
    pub fn set_to_include_range(&mut self, min: u32, max: u32) {
        debug_assert!(min <= max);
        self.min = self.min.min(min);
        self.max = self.max.max(max);
    }

    pub fn count(&self) -> u32 {
        if self.is_valid() { self.max - self.min + 1 } else { 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::ModifiedRange;

    #[test]
    fn starts_invalid_and_merges() {
        let mut r = ModifiedRange::default();
        assert!(!r.is_valid());
        assert_eq!(r.count(), 0);

        r.set_to_include_range(10, 12);
        assert!(r.is_valid());
        assert_eq!((r.min, r.max), (10, 12));

        r.set_to_include_range(3, 4);
        assert_eq!((r.min, r.max), (3, 12));
        assert_eq!(r.count(), 10);

        r.reset();
        assert!(!r.is_valid());
    }
}
