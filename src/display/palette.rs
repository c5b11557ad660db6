//! 8-bit palette in the display's 32-bit byte order

/// Bytes in an engine palette and in a [`FakePalette`]
pub const PALETTE_BYTES: usize = 1024;

/// 256 entries of `[B, G, R, 255]`, ready to copy into a 32-bit surface
#[derive(Clone, PartialEq, Eq)]
pub struct FakePalette {
    entries: [[u8; 4]; 256],
}

impl FakePalette {
    /// Convert an engine palette of `[R, G, B, x]` entries
    pub fn from_rgb0(palette: &[u8; PALETTE_BYTES]) -> Self {
        let mut fake = FakePalette::default();
        fake.load_rgb0(palette);
        fake
    }

    /// Overwrite every entry from an engine palette
    pub fn load_rgb0(&mut self, palette: &[u8; PALETTE_BYTES]) {
        for (entry, rgb0) in self.entries.iter_mut().zip(palette.chunks_exact(4)) {
            *entry = [rgb0[2], rgb0[1], rgb0[0], 255];
        }
    }

    /// Entry for palette index `index`
    #[inline]
    pub fn entry(&self, index: u8) -> [u8; 4] {
        self.entries[usize::from(index)]
    }

    /// Flat byte view
    pub fn as_bytes(&self) -> &[u8] {
        self.entries.as_flattened()
    }
}

impl Default for FakePalette {
    fn default() -> Self {
        FakePalette {
            entries: [[0, 0, 0, 255]; 256],
        }
    }
}

impl std::fmt::Debug for FakePalette {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakePalette")
            .field("first", &self.entries[0])
            .field("last", &self.entries[255])
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> [u8; PALETTE_BYTES] {
        let mut pal = [0u8; PALETTE_BYTES];
        for (i, entry) in pal.chunks_exact_mut(4).enumerate() {
            let i = i as u8;
            entry.copy_from_slice(&[i, i.wrapping_add(1), i.wrapping_add(2), 0]);
        }
        pal
    }

    #[test]
    fn test_swaps_red_and_blue() {
        let pal = ramp();
        let fake = FakePalette::from_rgb0(&pal);
        for i in 0..=255u8 {
            let src = &pal[usize::from(i) * 4..usize::from(i) * 4 + 4];
            assert_eq!(fake.entry(i), [src[2], src[1], src[0], 255]);
        }
    }

    #[test]
    fn test_alpha_ignores_source() {
        let fake = FakePalette::from_rgb0(&[0xAB; PALETTE_BYTES]);
        assert!(fake.as_bytes().chunks_exact(4).all(|e| e[3] == 255));
        assert_eq!(fake.as_bytes().len(), PALETTE_BYTES);
    }
}
