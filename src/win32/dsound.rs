//! DirectSound backend

use crate::sound::device::{
    AudioBackend, AudioDevice, BufferCaps, BufferDesc, BufferStatus, CooperativeLevel,
    CursorPosition, DeviceCaps, DeviceCapsFlags, DsResult, LockedRegion, SoundBuffer,
};
use crate::sound::DsError;
use std::ffi::c_void;
use std::mem::size_of;
use std::ptr::{null_mut, NonNull};
use windows::Win32::Foundation::HWND;
use windows::Win32::Media::Audio::DirectSound::{
    DirectSoundCreate, IDirectSound, IDirectSoundBuffer, DSBCAPS, DSBUFFERDESC, DSCAPS,
};
use windows::Win32::Media::Audio::WAVEFORMATEX;

const WAVE_FORMAT_PCM: u16 = 1;
const DSBPLAY_LOOPING: u32 = 0x0000_0001;
// Plain secondary buffer: no extra controls, the driver picks the mixer
const SECONDARY_BUFFER_FLAGS: u32 = 0;

fn ds_error(e: windows::core::Error) -> DsError {
    DsError(e.code().0)
}

/// Opens the default DirectSound device
#[derive(Debug, Clone, Copy)]
pub struct DirectSoundBackend {
    hwnd: HWND,
}

impl DirectSoundBackend {
    /// Backend whose cooperative level is bound to `hwnd`
    pub fn new(hwnd: HWND) -> Self {
        DirectSoundBackend { hwnd }
    }
}

impl AudioBackend for DirectSoundBackend {
    type Device = DirectSoundDevice;

    fn create_device(&mut self) -> DsResult<DirectSoundDevice> {
        let mut ds: Option<IDirectSound> = None;
        // SAFETY: out pointer is a live local; no aggregation.
        unsafe { DirectSoundCreate(None, &mut ds, None) }.map_err(ds_error)?;
        let ds = ds.ok_or(DsError::NO_DRIVER)?;
        Ok(DirectSoundDevice {
            ds,
            hwnd: self.hwnd,
        })
    }
}

/// An `IDirectSound` object; released on drop
#[derive(Debug)]
pub struct DirectSoundDevice {
    ds: IDirectSound,
    hwnd: HWND,
}

impl AudioDevice for DirectSoundDevice {
    type Buffer = DirectSoundBuffer;

    fn caps(&self) -> DsResult<DeviceCaps> {
        let mut caps = DSCAPS {
            dwSize: size_of::<DSCAPS>() as u32,
            ..Default::default()
        };
        // SAFETY: `caps` is sized and writable.
        unsafe { self.ds.GetCaps(&mut caps) }.map_err(ds_error)?;
        Ok(DeviceCaps {
            flags: DeviceCapsFlags::from_bits_retain(caps.dwFlags),
        })
    }

    fn set_cooperative_level(&mut self, level: CooperativeLevel) -> DsResult<()> {
        // SAFETY: `hwnd` outlives the device.
        unsafe { self.ds.SetCooperativeLevel(self.hwnd, level as u32) }.map_err(ds_error)
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> DsResult<DirectSoundBuffer> {
        let mut format = WAVEFORMATEX {
            wFormatTag: WAVE_FORMAT_PCM,
            nChannels: desc.format.channels,
            nSamplesPerSec: desc.format.samples_per_sec,
            nAvgBytesPerSec: desc.format.avg_bytes_per_sec(),
            nBlockAlign: desc.format.block_align(),
            wBitsPerSample: desc.format.bits_per_sample,
            cbSize: 0,
        };
        let buffer_desc = DSBUFFERDESC {
            dwSize: size_of::<DSBUFFERDESC>() as u32,
            dwFlags: SECONDARY_BUFFER_FLAGS,
            dwBufferBytes: desc.bytes,
            dwReserved: 0,
            lpwfxFormat: &mut format,
            ..Default::default()
        };

        let mut buffer: Option<IDirectSoundBuffer> = None;
        // SAFETY: `buffer_desc` and `format` live across the call.
        unsafe { self.ds.CreateSoundBuffer(&buffer_desc, &mut buffer, None) }
            .map_err(ds_error)?;
        let buffer = buffer.ok_or(DsError::INVALID_CALL)?;
        Ok(DirectSoundBuffer {
            buffer,
            locked: None,
        })
    }
}

/// A secondary `IDirectSoundBuffer`; released on drop
#[derive(Debug)]
pub struct DirectSoundBuffer {
    buffer: IDirectSoundBuffer,
    locked: Option<(NonNull<u8>, u32)>,
}

impl SoundBuffer for DirectSoundBuffer {
    fn caps(&self) -> DsResult<BufferCaps> {
        let mut caps = DSBCAPS {
            dwSize: size_of::<DSBCAPS>() as u32,
            ..Default::default()
        };
        // SAFETY: `caps` is sized and writable.
        unsafe { self.buffer.GetCaps(&mut caps) }.map_err(ds_error)?;
        Ok(BufferCaps {
            buffer_bytes: caps.dwBufferBytes,
        })
    }

    fn status(&self) -> DsResult<BufferStatus> {
        // SAFETY: no arguments.
        let status = unsafe { self.buffer.GetStatus() }.map_err(ds_error)?;
        Ok(BufferStatus::from_bits_retain(status))
    }

    fn play_looping(&mut self) -> DsResult<()> {
        // SAFETY: no pointers.
        unsafe { self.buffer.Play(0, 0, DSBPLAY_LOOPING) }.map_err(ds_error)
    }

    fn stop(&mut self) -> DsResult<()> {
        // SAFETY: no arguments.
        unsafe { self.buffer.Stop() }.map_err(ds_error)
    }

    fn restore(&mut self) -> DsResult<()> {
        // SAFETY: no arguments.
        unsafe { self.buffer.Restore() }.map_err(ds_error)
    }

    fn current_position(&self) -> DsResult<CursorPosition> {
        let mut play = 0u32;
        let mut write = 0u32;
        // SAFETY: both out pointers are live locals.
        unsafe {
            self.buffer
                .GetCurrentPosition(Some(&mut play), Some(&mut write))
        }
        .map_err(ds_error)?;
        Ok(CursorPosition { play, write })
    }

    fn lock(&mut self, offset: u32, bytes: u32) -> DsResult<LockedRegion> {
        if self.locked.is_some() {
            return Err(DsError::INVALID_CALL);
        }
        let mut ptr1: *mut c_void = null_mut();
        let mut len1 = 0u32;
        let mut ptr2: *mut c_void = null_mut();
        let mut len2 = 0u32;
        // SAFETY: out pointers are live locals; the second region is
        // requested so a wrapping lock never fails.
        unsafe {
            self.buffer.Lock(
                offset,
                bytes,
                &mut ptr1,
                &mut len1,
                Some(&mut ptr2),
                Some(&mut len2),
                0,
            )
        }
        .map_err(ds_error)?;

        let ptr = NonNull::new(ptr1.cast::<u8>()).ok_or(DsError::INVALID_CALL)?;
        self.locked = Some((ptr, len1));
        // SAFETY: DirectSound owns `len1` writable bytes at `ptr` until Unlock.
        Ok(unsafe { LockedRegion::from_raw(ptr, len1 as usize) })
    }

    fn unlock(&mut self, region: LockedRegion) -> DsResult<()> {
        let (ptr, len) = self.locked.take().ok_or(DsError::INVALID_CALL)?;
        drop(region);
        // SAFETY: hands back exactly what `lock` produced.
        unsafe {
            self.buffer
                .Unlock(ptr.as_ptr().cast::<c_void>(), len, None, 0)
        }
        .map_err(ds_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secondary_buffer_requests_no_controls() {
        assert_eq!(SECONDARY_BUFFER_FLAGS, 0);
    }
}
