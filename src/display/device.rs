//! Display device capability
//!
//! The DirectDraw object model reduced to what a fullscreen software renderer
//! needs: a loadable library, a device owning the display mode, and a flip
//! chain of surfaces that can be locked, flipped and restored.

use super::DdError;
use bitflags::bitflags;
use std::ptr::NonNull;

/// Result of a native display call
pub type DdResult<T> = std::result::Result<T, DdError>;

bitflags! {
    /// Cooperative level flags (`DDSCL_*`)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CooperativeFlags: u32 {
        /// Own the whole display
        const FULLSCREEN = 0x0000_0001;
        /// Allow Ctrl+Alt+Del while exclusive
        const ALLOW_REBOOT = 0x0000_0002;
        /// Leave the window alone
        const NO_WINDOW_CHANGES = 0x0000_0004;
        /// Windowed, shared display
        const NORMAL = 0x0000_0008;
        /// Exclusive access
        const EXCLUSIVE = 0x0000_0010;
    }
}

/// Fullscreen mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisplayMode {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Bits per pixel
    pub bits_per_pixel: u32,
}

/// Surface memory handed out by [`DisplaySurface::lock`]
#[derive(Debug)]
pub struct SurfaceLock {
    ptr: NonNull<u8>,
    len: usize,
    pitch: usize,
}

impl SurfaceLock {
    /// Wrap locked surface memory.
    ///
    /// # Safety
    /// `ptr` must be valid for reads and writes of `len` bytes and not
    /// accessed elsewhere until the lock is passed back to `unlock` on the
    /// surface that produced it.
    pub unsafe fn from_raw(ptr: NonNull<u8>, len: usize, pitch: usize) -> Self {
        SurfaceLock { ptr, len, pitch }
    }

    /// Bytes from one row to the next
    pub fn pitch(&self) -> usize {
        self.pitch
    }

    /// Locked size in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Zero-sized lock
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Writable surface bytes
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: exclusive until unlock, per `from_raw`.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

/// The display library (`ddraw.dll`)
pub trait DisplayLibrary {
    /// Device type produced by this library
    type Device: DisplayDevice;

    /// Load the library. Loading an already loaded library is a no-op.
    fn load(&mut self) -> crate::Result<()>;

    /// Resolve the device entry point and create the device object
    fn create_device(&mut self) -> crate::Result<Self::Device>;

    /// Unload the library
    fn unload(&mut self);

    /// Library is loaded
    fn is_loaded(&self) -> bool;
}

/// The display device object
pub trait DisplayDevice {
    /// Surface type produced by this device
    type Surface: DisplaySurface;

    /// Set how the display is shared
    fn set_cooperative_level(&mut self, flags: CooperativeFlags) -> DdResult<()>;

    /// Switch the display mode (requires exclusive fullscreen)
    fn set_display_mode(&mut self, mode: DisplayMode) -> DdResult<()>;

    /// Return to the desktop mode
    fn restore_display_mode(&mut self) -> DdResult<()>;

    /// Create the visible surface with `back_buffers` attached back buffers
    fn create_primary_surface(&mut self, back_buffers: u32) -> DdResult<Self::Surface>;
}

/// A display surface
pub trait DisplaySurface: Sized {
    /// Back buffer attached to this primary surface
    fn attached_back_buffer(&mut self) -> DdResult<Self>;

    /// Lock the whole surface for writing
    fn lock(&mut self) -> DdResult<SurfaceLock>;

    /// Hand the surface memory back
    fn unlock(&mut self, lock: SurfaceLock) -> DdResult<()>;

    /// Swap the front and back buffers of the flip chain
    fn flip(&mut self) -> DdResult<()>;

    /// Surface memory was lost (mode switch, task switch)
    fn is_lost(&self) -> bool;

    /// Reallocate lost surface memory
    fn restore(&mut self) -> DdResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusive_fullscreen_bits() {
        let flags = CooperativeFlags::EXCLUSIVE | CooperativeFlags::FULLSCREEN;
        assert_eq!(flags.bits(), 0x11);
        assert!(!flags.contains(CooperativeFlags::NORMAL));
    }

    #[test]
    fn test_surface_lock_slice() {
        let mut backing = vec![0u8; 16];
        let ptr = NonNull::from(&mut backing[..]).cast::<u8>();
        let mut lock = unsafe { SurfaceLock::from_raw(ptr, 16, 8) };
        lock.as_mut_slice()[9] = 7;
        assert_eq!(lock.pitch(), 8);
        drop(lock);
        assert_eq!(backing[9], 7);
    }
}
