//! # Component Bit-Flag Set
//!
//! Fixed-size bitset over component IDs. Archetypes are keyed by an exact
//! flag pattern; processes select archetypes whose flags contain theirs.
//!
//! ## Performance
//!
//! Every comparison is O(word count): [`FLAG_WORDS`] `u64` words.

use std::fmt;

use super::component::{ComponentId, MAX_COMPONENT_TYPES};

/// Number of `u64` words backing a flag set.
pub const FLAG_WORDS: usize = (MAX_COMPONENT_TYPES + 63) / 64;

/// Set of component types.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ComponentFlags {
    bits: [u64; FLAG_WORDS],
}

impl ComponentFlags {
    /// The empty set.
    pub const EMPTY: Self = Self { bits: [0; FLAG_WORDS] };

    /// Creates an empty set.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self::EMPTY
    }

    /// Builds a set from a list of component IDs.
    #[must_use]
    pub fn from_ids(ids: &[ComponentId]) -> Self {
        let mut flags = Self::new();
        for &id in ids {
            flags.set_on(id);
        }
        flags
    }

    /// Turns a component bit on.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if the ID is outside the fixed type range.
    #[inline]
    pub fn set_on(&mut self, id: ComponentId) {
        let index = id.index();
        debug_assert!(index < MAX_COMPONENT_TYPES, "component id out of range");
        if let Some(word) = self.bits.get_mut(index / 64) {
            *word |= 1u64 << (index % 64);
        }
    }

    /// Turns a component bit off.
    #[inline]
    pub fn set_off(&mut self, id: ComponentId) {
        let index = id.index();
        debug_assert!(index < MAX_COMPONENT_TYPES, "component id out of range");
        if let Some(word) = self.bits.get_mut(index / 64) {
            *word &= !(1u64 << (index % 64));
        }
    }

    /// Checks whether a component bit is on.
    #[inline]
    #[must_use]
    pub fn is_on(&self, id: ComponentId) -> bool {
        let index = id.index();
        self.bits
            .get(index / 64)
            .is_some_and(|word| (word >> (index % 64)) & 1 == 1)
    }

    /// Checks for an identical bit pattern.
    #[inline]
    #[must_use]
    pub fn compare_exact(&self, other: &Self) -> bool {
        self.bits == other.bits
    }

    /// Checks that every bit on in `self` is also on in `other`.
    ///
    /// This is the "archetype satisfies process filter" test with `self`
    /// as the filter.
    #[inline]
    #[must_use]
    pub fn compare_contains(&self, other: &Self) -> bool {
        self.bits
            .iter()
            .zip(other.bits.iter())
            .all(|(mine, theirs)| mine & theirs == *mine)
    }

    /// Returns the union of two sets.
    #[inline]
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut bits = self.bits;
        for (word, theirs) in bits.iter_mut().zip(other.bits.iter()) {
            *word |= theirs;
        }
        Self { bits }
    }

    /// Number of bits on.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.bits.iter().map(|word| word.count_ones() as usize).sum()
    }

    /// Checks if no bit is on.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|word| *word == 0)
    }

    /// Iterates the component IDs that are on, in ID order.
    pub fn iter(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.bits.iter().enumerate().flat_map(|(word_idx, &word)| {
            let mut remaining = word;
            std::iter::from_fn(move || {
                if remaining == 0 {
                    return None;
                }
                let bit = remaining.trailing_zeros() as usize;
                remaining &= remaining - 1;
                Some(ComponentId::from_index(word_idx * 64 + bit))
            })
        })
    }
}

impl fmt::Debug for ComponentFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(ComponentId::raw)).finish()
    }
}

impl FromIterator<ComponentId> for ComponentFlags {
    fn from_iter<I: IntoIterator<Item = ComponentId>>(iter: I) -> Self {
        let mut flags = Self::new();
        for id in iter {
            flags.set_on(id);
        }
        flags
    }
}
