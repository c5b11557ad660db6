//! Audio device capability
//!
//! Mirrors the small slice of the DirectSound object model the driver uses:
//! a backend creates a device, the device creates one secondary buffer, and
//! the buffer is locked, unlocked, played and polled for its cursor.
//! Releasing a native object is dropping its handle.

use super::DsError;
use bitflags::bitflags;
use std::ptr::NonNull;

/// Result of a native audio call
pub type DsResult<T> = std::result::Result<T, DsError>;

/// PCM format of the ring buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveFormat {
    /// Interleaved channels
    pub channels: u16,
    /// Bits per mono sample
    pub bits_per_sample: u16,
    /// Frames per second
    pub samples_per_sec: u32,
}

impl WaveFormat {
    /// Bytes per frame (all channels)
    pub fn block_align(&self) -> u16 {
        self.channels * self.bits_per_sample / 8
    }

    /// Bytes consumed per second of playback
    pub fn avg_bytes_per_sec(&self) -> u32 {
        self.samples_per_sec * u32::from(self.block_align())
    }
}

/// Secondary buffer request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDesc {
    /// Requested size in bytes
    pub bytes: u32,
    /// Sample format
    pub format: WaveFormat,
}

bitflags! {
    /// Device capability flags (`DSCAPS_*`)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DeviceCapsFlags: u32 {
        /// Primary buffer supports mono
        const PRIMARY_MONO = 0x0000_0001;
        /// Primary buffer supports stereo
        const PRIMARY_STEREO = 0x0000_0002;
        /// Primary buffer supports 8-bit samples
        const PRIMARY_8BIT = 0x0000_0004;
        /// Primary buffer supports 16-bit samples
        const PRIMARY_16BIT = 0x0000_0008;
        /// Any rate in the min/max range
        const CONTINUOUS_RATE = 0x0000_0010;
        /// No real driver; software emulation only
        const EMULATED_DRIVER = 0x0000_0020;
        /// Certified driver
        const CERTIFIED = 0x0000_0040;
    }
}

bitflags! {
    /// Buffer status flags (`DSBSTATUS_*`)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BufferStatus: u32 {
        /// Playing
        const PLAYING = 0x0000_0001;
        /// Memory lost; needs `restore`
        const BUFFER_LOST = 0x0000_0002;
        /// Playing in a loop
        const LOOPING = 0x0000_0004;
    }
}

/// Device capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceCaps {
    /// Capability flags
    pub flags: DeviceCapsFlags,
}

/// Buffer capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferCaps {
    /// Actual buffer size in bytes
    pub buffer_bytes: u32,
}

/// Device sharing mode (`DSSCL_*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooperativeLevel {
    /// Shared, no format control
    Normal = 1,
    /// May set the primary buffer format
    Priority = 2,
    /// Exclusive while focused
    Exclusive = 3,
    /// Direct primary buffer access
    WritePrimary = 4,
}

/// Play and write cursors in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CursorPosition {
    /// Where the hardware is reading
    pub play: u32,
    /// First byte safe to write
    pub write: u32,
}

/// Memory handed out by [`SoundBuffer::lock`]
#[derive(Debug)]
pub struct LockedRegion {
    ptr: NonNull<u8>,
    len: usize,
}

impl LockedRegion {
    /// Wrap a locked window.
    ///
    /// # Safety
    /// `ptr` must be valid for reads and writes of `len` bytes and not
    /// accessed through any other path until the region is passed back to
    /// `unlock` on the buffer that produced it.
    pub unsafe fn from_raw(ptr: NonNull<u8>, len: usize) -> Self {
        LockedRegion { ptr, len }
    }

    /// Start of the window
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Window size in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Zero-sized window
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: guaranteed by the contract of `from_raw`; the region is
        // exclusively ours until it is handed back to `unlock`.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

/// Factory for audio devices (`DirectSoundCreate`)
pub trait AudioBackend {
    /// Device type produced by this backend
    type Device: AudioDevice;

    /// Open the default output device
    fn create_device(&mut self) -> DsResult<Self::Device>;
}

/// An opened audio device
pub trait AudioDevice {
    /// Buffer type produced by this device
    type Buffer: SoundBuffer;

    /// Query device capabilities
    fn caps(&self) -> DsResult<DeviceCaps>;

    /// Set how the device is shared with other processes
    fn set_cooperative_level(&mut self, level: CooperativeLevel) -> DsResult<()>;

    /// Allocate a secondary (mixing) buffer
    fn create_buffer(&mut self, desc: &BufferDesc) -> DsResult<Self::Buffer>;
}

/// A circular hardware buffer read continuously by the device
pub trait SoundBuffer {
    /// Query buffer capabilities
    fn caps(&self) -> DsResult<BufferCaps>;

    /// Current status flags
    fn status(&self) -> DsResult<BufferStatus>;

    /// Start (or keep) looping playback
    fn play_looping(&mut self) -> DsResult<()>;

    /// Stop playback; the cursor stays where it is
    fn stop(&mut self) -> DsResult<()>;

    /// Reallocate lost buffer memory
    fn restore(&mut self) -> DsResult<()>;

    /// Play and write cursors
    fn current_position(&self) -> DsResult<CursorPosition>;

    /// Lock `bytes` bytes starting at `offset` for writing
    fn lock(&mut self, offset: u32, bytes: u32) -> DsResult<LockedRegion>;

    /// Hand a locked region back
    fn unlock(&mut self, region: LockedRegion) -> DsResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wave_format_math() {
        let fmt = WaveFormat {
            channels: 2,
            bits_per_sample: 16,
            samples_per_sec: 22050,
        };
        assert_eq!(fmt.block_align(), 4);
        assert_eq!(fmt.avg_bytes_per_sec(), 88200);
    }

    #[test]
    fn test_locked_region_slice() {
        let mut backing = vec![0u8; 8];
        let ptr = NonNull::from(&mut backing[..]).cast::<u8>();
        let mut region = unsafe { LockedRegion::from_raw(ptr, backing.len()) };
        region.as_mut_slice()[3] = 9;
        assert_eq!(region.len(), 8);
        drop(region);
        assert_eq!(backing[3], 9);
    }
}
