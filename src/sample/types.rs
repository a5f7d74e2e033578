// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::ops::{BitOr, BitOrAssign};

/// Bitmask over the categories of data a [`crate::Sample`] records. The
/// manager accumulates requested categories with bitwise OR and always masks
/// the result to [`SampleType::ALL`], so bits outside the vocabulary never
/// survive.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct SampleType(u32);

impl SampleType {
    pub const NONE: SampleType = SampleType(0);
    pub const CPU: SampleType = SampleType(1 << 0);
    pub const WALL: SampleType = SampleType(1 << 1);
    pub const EXCEPTION: SampleType = SampleType(1 << 2);
    pub const LOCK_ACQUIRE: SampleType = SampleType(1 << 3);
    pub const LOCK_RELEASE: SampleType = SampleType(1 << 4);
    pub const ALLOCATION: SampleType = SampleType(1 << 5);
    pub const HEAP: SampleType = SampleType(1 << 6);
    pub const GPU_TIME: SampleType = SampleType(1 << 7);
    pub const GPU_MEMORY: SampleType = SampleType(1 << 8);
    pub const GPU_FLOPS: SampleType = SampleType(1 << 9);
    pub const ALL: SampleType = SampleType((1 << 10) - 1);

    pub const fn from_bits(bits: u32) -> SampleType {
        SampleType(bits & Self::ALL.0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: SampleType) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of enabled categories; each gets one value slot in a sample.
    pub const fn count(self) -> usize {
        self.0.count_ones() as usize
    }
}

impl BitOr for SampleType {
    type Output = SampleType;

    fn bitor(self, rhs: SampleType) -> SampleType {
        SampleType::from_bits(self.0 | rhs.0)
    }
}

impl BitOrAssign for SampleType {
    fn bitor_assign(&mut self, rhs: SampleType) {
        *self = *self | rhs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_or_accumulates() {
        let mask = SampleType::CPU | SampleType::WALL | SampleType::EXCEPTION;
        assert!(mask.contains(SampleType::CPU));
        assert!(mask.contains(SampleType::WALL));
        assert!(mask.contains(SampleType::EXCEPTION));
        assert!(!mask.contains(SampleType::HEAP));
        assert_eq!(mask.count(), 3);
    }

    #[test]
    fn test_out_of_vocabulary_bits_are_masked() {
        let mask = SampleType::from_bits(u32::MAX);
        assert_eq!(mask, SampleType::ALL);
        assert_eq!(SampleType::from_bits(1 << 31), SampleType::NONE);
    }
}
