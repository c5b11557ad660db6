//! Software audio backend
//!
//! A memory ring buffer with a simulated play cursor. Nothing is audible; the
//! backend exists so the driver runs without a sound card, and so failures the
//! real device produces (busy device, lost buffer, hard lock errors) can be
//! reproduced on demand through [`HeadlessAudioProbe`].

use super::device::{
    AudioBackend, AudioDevice, BufferCaps, BufferDesc, BufferStatus, CooperativeLevel,
    CursorPosition, DeviceCaps, DeviceCapsFlags, DsResult, LockedRegion, SoundBuffer,
};
use super::DsError;
use parking_lot::{Mutex, MutexGuard};
use std::ptr::NonNull;
use std::sync::Arc;

/// Everything the headless backend simulates or records
#[derive(Debug, Clone, Default)]
pub struct HeadlessAudioState {
    // Fault injection
    /// Create attempts left to fail with `DSERR_ALLOCATED`
    pub busy_creates: u32,
    /// Next create fails with this code
    pub create_error: Option<DsError>,
    /// Report `DSCAPS_EMULDRIVER`
    pub emulated_driver: bool,
    /// Device caps query fails with this code
    pub caps_error: Option<DsError>,
    /// Cooperative level changes fail with this code
    pub cooperative_error: Option<DsError>,
    /// Buffer creation fails with this code
    pub buffer_error: Option<DsError>,
    /// Report this size from buffer caps instead of the requested one
    pub buffer_bytes_override: Option<u32>,
    /// Lock attempts left to fail with `DSERR_BUFFERLOST`
    pub lost_locks: u32,
    /// Next lock fails with this code
    pub lock_error: Option<DsError>,
    /// Bytes the play cursor moves per position query while playing
    pub cursor_step: u32,

    // Observations
    /// Device creation attempts
    pub create_attempts: u32,
    /// Devices currently alive
    pub live_devices: u32,
    /// Buffers currently alive
    pub live_buffers: u32,
    /// Last cooperative level set
    pub cooperative_level: Option<CooperativeLevel>,
    /// Format of the last created buffer
    pub buffer_desc: Option<BufferDesc>,
    /// Size of the live buffer in bytes
    pub buffer_bytes: u32,
    /// Hardware play cursor in bytes
    pub play_cursor: u32,
    /// Buffer is playing
    pub playing: bool,
    /// Buffer memory is lost
    pub lost: bool,
    /// A lock is outstanding
    pub locked: bool,
    /// Successful locks
    pub locks: u32,
    /// Successful unlocks
    pub unlocks: u32,
    /// Restore calls
    pub restores: u32,
}

/// Shared view of a headless backend, kept by the caller after the backend
/// moves into a driver
#[derive(Debug, Clone)]
pub struct HeadlessAudioProbe {
    state: Arc<Mutex<HeadlessAudioState>>,
}

impl HeadlessAudioProbe {
    /// Lock the state for inspection or fault setup
    pub fn state(&self) -> MutexGuard<'_, HeadlessAudioState> {
        self.state.lock()
    }

    /// Move the play cursor forward by `bytes`, wrapping at the buffer end
    pub fn advance(&self, bytes: u32) {
        let mut state = self.state.lock();
        if state.buffer_bytes > 0 {
            state.play_cursor = ((u64::from(state.play_cursor) + u64::from(bytes))
                % u64::from(state.buffer_bytes)) as u32;
        }
    }

    /// Fail the next `count` device creations with `DSERR_ALLOCATED`
    pub fn set_busy(&self, count: u32) {
        self.state.lock().busy_creates = count;
    }

    /// Report the buffer lost for the next `count` lock attempts
    pub fn lose_next_locks(&self, count: u32) {
        let mut state = self.state.lock();
        state.lost_locks = count;
        state.lost = count > 0;
    }

    /// Fail the next lock with `err`
    pub fn fail_next_lock(&self, err: DsError) {
        self.state.lock().lock_error = Some(err);
    }
}

/// Software audio backend
#[derive(Debug, Clone)]
pub struct HeadlessAudio {
    state: Arc<Mutex<HeadlessAudioState>>,
}

impl HeadlessAudio {
    /// Backend with a stationary cursor (move it with [`HeadlessAudioProbe::advance`])
    pub fn new() -> Self {
        Self::with_cursor_step(0)
    }

    /// Backend whose cursor advances `step` bytes per position query
    pub fn with_cursor_step(step: u32) -> Self {
        HeadlessAudio {
            state: Arc::new(Mutex::new(HeadlessAudioState {
                cursor_step: step,
                ..HeadlessAudioState::default()
            })),
        }
    }

    /// Handle for fault injection and inspection
    pub fn probe(&self) -> HeadlessAudioProbe {
        HeadlessAudioProbe {
            state: Arc::clone(&self.state),
        }
    }
}

impl Default for HeadlessAudio {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for HeadlessAudio {
    type Device = HeadlessAudioDevice;

    fn create_device(&mut self) -> DsResult<HeadlessAudioDevice> {
        let mut state = self.state.lock();
        state.create_attempts += 1;
        if state.busy_creates > 0 {
            state.busy_creates -= 1;
            return Err(DsError::ALLOCATED);
        }
        if let Some(err) = state.create_error.take() {
            return Err(err);
        }
        state.live_devices += 1;
        Ok(HeadlessAudioDevice {
            state: Arc::clone(&self.state),
        })
    }
}

/// Device of a [`HeadlessAudio`] backend
#[derive(Debug)]
pub struct HeadlessAudioDevice {
    state: Arc<Mutex<HeadlessAudioState>>,
}

impl AudioDevice for HeadlessAudioDevice {
    type Buffer = HeadlessSoundBuffer;

    fn caps(&self) -> DsResult<DeviceCaps> {
        let state = self.state.lock();
        if let Some(err) = state.caps_error {
            return Err(err);
        }
        let mut flags = DeviceCapsFlags::PRIMARY_STEREO | DeviceCapsFlags::PRIMARY_16BIT;
        if state.emulated_driver {
            flags |= DeviceCapsFlags::EMULATED_DRIVER;
        }
        Ok(DeviceCaps { flags })
    }

    fn set_cooperative_level(&mut self, level: CooperativeLevel) -> DsResult<()> {
        let mut state = self.state.lock();
        if let Some(err) = state.cooperative_error {
            return Err(err);
        }
        state.cooperative_level = Some(level);
        Ok(())
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> DsResult<HeadlessSoundBuffer> {
        let mut state = self.state.lock();
        if state.cooperative_level.is_none() {
            return Err(DsError::PRIO_LEVEL_NEEDED);
        }
        if let Some(err) = state.buffer_error {
            return Err(err);
        }
        if desc.bytes == 0 || desc.format.block_align() == 0 {
            return Err(DsError::INVALID_PARAM);
        }
        let bytes = state.buffer_bytes_override.unwrap_or(desc.bytes);
        state.buffer_desc = Some(*desc);
        state.buffer_bytes = bytes;
        state.play_cursor = 0;
        state.playing = false;
        state.lost = false;
        state.live_buffers += 1;
        Ok(HeadlessSoundBuffer {
            state: Arc::clone(&self.state),
            memory: vec![0u8; bytes as usize].into_boxed_slice(),
        })
    }
}

impl Drop for HeadlessAudioDevice {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.live_devices = state.live_devices.saturating_sub(1);
    }
}

/// Ring buffer of a [`HeadlessAudioDevice`]
#[derive(Debug)]
pub struct HeadlessSoundBuffer {
    state: Arc<Mutex<HeadlessAudioState>>,
    memory: Box<[u8]>,
}

impl HeadlessSoundBuffer {
    /// Copy of the buffer contents
    pub fn contents(&self) -> Vec<u8> {
        self.memory.to_vec()
    }
}

impl SoundBuffer for HeadlessSoundBuffer {
    fn caps(&self) -> DsResult<BufferCaps> {
        Ok(BufferCaps {
            buffer_bytes: self.memory.len() as u32,
        })
    }

    fn status(&self) -> DsResult<BufferStatus> {
        let state = self.state.lock();
        let mut status = BufferStatus::empty();
        if state.playing {
            status |= BufferStatus::PLAYING | BufferStatus::LOOPING;
        }
        if state.lost {
            status |= BufferStatus::BUFFER_LOST;
        }
        Ok(status)
    }

    fn play_looping(&mut self) -> DsResult<()> {
        let mut state = self.state.lock();
        if state.lost {
            return Err(DsError::BUFFER_LOST);
        }
        state.playing = true;
        Ok(())
    }

    fn stop(&mut self) -> DsResult<()> {
        self.state.lock().playing = false;
        Ok(())
    }

    fn restore(&mut self) -> DsResult<()> {
        let mut state = self.state.lock();
        state.restores += 1;
        state.lost = false;
        Ok(())
    }

    fn current_position(&self) -> DsResult<CursorPosition> {
        let mut state = self.state.lock();
        let len = self.memory.len() as u64;
        if state.playing && state.cursor_step > 0 {
            state.play_cursor =
                ((u64::from(state.play_cursor) + u64::from(state.cursor_step)) % len) as u32;
        }
        let block = state
            .buffer_desc
            .map_or(4, |d| u64::from(d.format.block_align()));
        Ok(CursorPosition {
            play: state.play_cursor,
            write: ((u64::from(state.play_cursor) + block * 64) % len) as u32,
        })
    }

    fn lock(&mut self, offset: u32, bytes: u32) -> DsResult<LockedRegion> {
        let mut state = self.state.lock();
        if state.lost_locks > 0 {
            state.lost_locks -= 1;
            state.lost = true;
            return Err(DsError::BUFFER_LOST);
        }
        if let Some(err) = state.lock_error.take() {
            return Err(err);
        }
        if state.lost {
            return Err(DsError::BUFFER_LOST);
        }
        if state.locked {
            return Err(DsError::INVALID_CALL);
        }

        let start = offset as usize;
        let end = start
            .checked_add(bytes as usize)
            .filter(|&end| end <= self.memory.len())
            .ok_or(DsError::INVALID_PARAM)?;

        state.locked = true;
        state.locks += 1;
        let window = &mut self.memory[start..end];
        let ptr = NonNull::from(window).cast::<u8>();
        // SAFETY: `memory` is a fixed allocation owned by this buffer, and
        // `locked` rejects a second lock until the region comes back.
        Ok(unsafe { LockedRegion::from_raw(ptr, end - start) })
    }

    fn unlock(&mut self, region: LockedRegion) -> DsResult<()> {
        let mut state = self.state.lock();
        if !state.locked {
            return Err(DsError::INVALID_CALL);
        }
        drop(region);
        state.locked = false;
        state.unlocks += 1;
        Ok(())
    }
}

impl Drop for HeadlessSoundBuffer {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.live_buffers = state.live_buffers.saturating_sub(1);
        state.playing = false;
        state.locked = false;
        state.buffer_bytes = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sound::device::WaveFormat;

    fn desc(bytes: u32) -> BufferDesc {
        BufferDesc {
            bytes,
            format: WaveFormat {
                channels: 2,
                bits_per_sample: 16,
                samples_per_sec: 22050,
            },
        }
    }

    #[test]
    fn test_buffer_requires_cooperative_level() {
        let mut backend = HeadlessAudio::new();
        let mut device = backend.create_device().unwrap();
        assert_eq!(
            device.create_buffer(&desc(1024)).err(),
            Some(DsError::PRIO_LEVEL_NEEDED)
        );
        device
            .set_cooperative_level(CooperativeLevel::Priority)
            .unwrap();
        assert!(device.create_buffer(&desc(1024)).is_ok());
    }

    #[test]
    fn test_double_lock_rejected() {
        let mut backend = HeadlessAudio::new();
        let mut device = backend.create_device().unwrap();
        device
            .set_cooperative_level(CooperativeLevel::Priority)
            .unwrap();
        let mut buffer = device.create_buffer(&desc(64)).unwrap();

        let region = buffer.lock(0, 64).unwrap();
        assert_eq!(buffer.lock(0, 64).err(), Some(DsError::INVALID_CALL));
        buffer.unlock(region).unwrap();
        assert!(buffer.lock(0, 64).is_ok());
    }

    #[test]
    fn test_cursor_auto_advance_wraps() {
        let mut backend = HeadlessAudio::with_cursor_step(48);
        let probe = backend.probe();
        let mut device = backend.create_device().unwrap();
        device
            .set_cooperative_level(CooperativeLevel::Priority)
            .unwrap();
        let mut buffer = device.create_buffer(&desc(100)).unwrap();

        assert_eq!(buffer.current_position().unwrap().play, 0, "stopped buffer");
        buffer.play_looping().unwrap();
        assert_eq!(buffer.current_position().unwrap().play, 48);
        assert_eq!(buffer.current_position().unwrap().play, 96);
        assert_eq!(buffer.current_position().unwrap().play, 44);

        probe.advance(60);
        assert_eq!(probe.state().play_cursor, 4);
    }

    #[test]
    fn test_live_counts_follow_drops() {
        let mut backend = HeadlessAudio::new();
        let probe = backend.probe();
        let mut device = backend.create_device().unwrap();
        device
            .set_cooperative_level(CooperativeLevel::Priority)
            .unwrap();
        let buffer = device.create_buffer(&desc(64)).unwrap();
        assert_eq!(probe.state().live_buffers, 1);
        drop(buffer);
        drop(device);
        assert_eq!(probe.state().live_buffers, 0);
        assert_eq!(probe.state().live_devices, 0);
    }
}
