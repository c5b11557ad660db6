//! Scoped lock of the ring buffer for one mixer paint cycle

use super::device::{LockedRegion, SoundBuffer};
use super::{DmaInfo, DsError};

/// The whole ring buffer, locked for writing.
///
/// Produced by [`SoundDriver::begin_painting`](super::SoundDriver::begin_painting).
/// [`submit`](Self::submit) unlocks it; dropping an unsubmitted window unlocks
/// it too, so the lock is released exactly once on every path.
pub struct PaintWindow<'a, S: SoundBuffer> {
    buffer: &'a mut S,
    region: Option<LockedRegion>,
    dma: DmaInfo,
}

impl<'a, S: SoundBuffer> PaintWindow<'a, S> {
    pub(crate) fn new(buffer: &'a mut S, region: LockedRegion, dma: DmaInfo) -> Self {
        PaintWindow {
            buffer,
            region: Some(region),
            dma,
        }
    }

    /// Ring buffer layout at the time of the lock
    pub fn dma(&self) -> &DmaInfo {
        &self.dma
    }

    /// Writable bytes of the ring buffer
    pub fn buffer_mut(&mut self) -> &mut [u8] {
        match self.region.as_mut() {
            Some(region) => region.as_mut_slice(),
            None => &mut [],
        }
    }

    /// Locked size in bytes
    pub fn len(&self) -> usize {
        self.region.as_ref().map_or(0, LockedRegion::len)
    }

    /// Nothing locked
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write interleaved 16-bit samples starting at mono sample `offset`,
    /// wrapping at the end of the ring. Returns the number of samples written.
    pub fn write_samples(&mut self, offset: usize, samples: &[i16]) -> usize {
        let ring = self.len() / 2;
        if ring == 0 {
            return 0;
        }
        let bytes = self.buffer_mut();
        let count = samples.len().min(ring);
        for (i, sample) in samples[..count].iter().enumerate() {
            let at = ((offset + i) % ring) * 2;
            bytes[at..at + 2].copy_from_slice(&sample.to_le_bytes());
        }
        count
    }

    /// Unlock the buffer, ending the paint cycle
    pub fn submit(mut self) -> Result<(), DsError> {
        self.release()
    }

    fn release(&mut self) -> Result<(), DsError> {
        match self.region.take() {
            Some(region) => self.buffer.unlock(region),
            None => Ok(()),
        }
    }
}

impl<S: SoundBuffer> Drop for PaintWindow<'_, S> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::warn!("Sound buffer unlock failed: {e}");
        }
    }
}

impl<S: SoundBuffer> std::fmt::Debug for PaintWindow<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaintWindow")
            .field("len", &self.len())
            .field("dma", &self.dma)
            .finish()
    }
}
