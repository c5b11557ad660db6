//! Logical-to-physical track remapping

/// Number of entries in the remap table (tracks 0-99)
pub const REMAP_ENTRIES: usize = 100;

/// User-editable indirection from logical to physical track number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemapTable {
    map: [u8; REMAP_ENTRIES],
}

impl RemapTable {
    /// Identity mapping for every entry
    pub fn identity() -> Self {
        let mut map = [0u8; REMAP_ENTRIES];
        for (n, slot) in map.iter_mut().enumerate() {
            *slot = n as u8;
        }
        RemapTable { map }
    }

    /// Restore the identity mapping
    pub fn reset(&mut self) {
        *self = Self::identity();
    }

    /// Physical track for `track`, or `None` when `track` is outside the table
    pub fn lookup(&self, track: i32) -> Option<u8> {
        usize::try_from(track)
            .ok()
            .and_then(|idx| self.map.get(idx).copied())
    }

    /// Map logical `track` to `physical`. Returns false for an out-of-range slot.
    pub fn set(&mut self, track: usize, physical: u8) -> bool {
        match self.map.get_mut(track) {
            Some(slot) => {
                *slot = physical;
                true
            }
            None => false,
        }
    }

    /// Entries 1-99 that differ from identity, as `(logical, physical)`
    pub fn overrides(&self) -> impl Iterator<Item = (u8, u8)> + '_ {
        self.map
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(n, &mapped)| *n != mapped as usize)
            .map(|(n, &mapped)| (n as u8, mapped))
    }

    /// True when every entry maps to itself
    pub fn is_identity(&self) -> bool {
        self.map.iter().enumerate().all(|(n, &m)| n == m as usize)
    }
}

impl Default for RemapTable {
    fn default() -> Self {
        Self::identity()
    }
}
