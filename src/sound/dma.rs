//! Mixer-facing description of the ring buffer

/// What the mixer needs to know about the ring buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DmaInfo {
    /// Interleaved channels
    pub channels: u16,
    /// Bits per mono sample
    pub sample_bits: u16,
    /// Frames per second
    pub speed: u32,
    /// Mono samples in the whole buffer (power of two)
    pub samples: usize,
    /// Last sample position reported by `get_position`
    pub sample_pos: usize,
    /// Granularity of mixer submissions, in samples
    pub submission_chunk: usize,
}

impl DmaInfo {
    /// Bytes per mono sample
    pub fn bytes_per_sample(&self) -> usize {
        usize::from(self.sample_bits / 8)
    }

    /// Ring buffer size in bytes
    pub fn buffer_bytes(&self) -> usize {
        self.samples * self.bytes_per_sample()
    }
}

/// Sample offset of the play cursor relative to `start`, wrapped into
/// `[0, samples)`.
///
/// `shift` converts bytes to samples (`bytes_per_sample - 1`, i.e. 1 for
/// 16-bit). `samples` must be a power of two.
pub fn ring_position(start: u32, play: u32, shift: u32, samples: usize) -> usize {
    debug_assert!(samples.is_power_of_two(), "ring size must be a power of two");
    let bytes = play.wrapping_sub(start);
    (bytes >> shift) as usize & (samples - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_position_basic() {
        assert_eq!(ring_position(0, 0, 1, 32768), 0);
        assert_eq!(ring_position(100, 300, 1, 32768), 100);
        assert_eq!(ring_position(0, 65534, 1, 32768), 32767);
    }

    #[test]
    fn test_ring_position_wraps_behind_start() {
        // Cursor wrapped past the end of the buffer and is now before `start`
        assert_eq!(ring_position(100, 50, 1, 32768), 32768 - 25);
    }

    #[test]
    fn test_ring_position_in_range() {
        let samples = 32768;
        for start in [0u32, 1, 999, 65535, u32::MAX] {
            for play in (0u32..70000).step_by(337) {
                assert!(ring_position(start, play, 1, samples) < samples);
            }
        }
    }

    #[test]
    fn test_dma_info_sizes() {
        let dma = DmaInfo {
            channels: 2,
            sample_bits: 16,
            speed: 22050,
            samples: 32768,
            sample_pos: 0,
            submission_chunk: 1,
        };
        assert_eq!(dma.bytes_per_sample(), 2);
        assert_eq!(dma.buffer_bytes(), 0x10000);
    }
}
