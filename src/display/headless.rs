//! Software display backend
//!
//! Memory-backed surfaces with no window behind them. Every state change the
//! manager causes is appended to an event log so callers can check ordering,
//! and faults (missing library, refused mode, lost surfaces) can be injected
//! through [`HeadlessDisplayProbe`].

use super::device::{
    CooperativeFlags, DdResult, DisplayDevice, DisplayLibrary, DisplayMode, DisplaySurface,
    SurfaceLock,
};
use super::DdError;
use crate::{Error, Result};
use parking_lot::{Mutex, MutexGuard};
use std::ptr::NonNull;
use std::sync::Arc;

/// Which surface of the flip chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceRole {
    /// Visible surface
    Front,
    /// Attached back buffer
    Back,
}

/// Something the headless display was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayEvent {
    /// Library loaded
    LibraryLoaded,
    /// Device object created
    DeviceCreated,
    /// Cooperative level changed
    CooperativeLevel(CooperativeFlags),
    /// Display mode switched
    ModeSet(DisplayMode),
    /// Surface created
    SurfaceCreated(SurfaceRole),
    /// Surface released
    SurfaceReleased(SurfaceRole),
    /// Desktop mode restored
    ModeRestored,
    /// Device object released
    DeviceReleased,
    /// Library unloaded
    LibraryUnloaded,
}

/// Everything the headless display simulates or records
#[derive(Debug, Clone, Default)]
pub struct HeadlessDisplayState {
    // Fault injection
    /// Library cannot be found
    pub library_missing: bool,
    /// Device entry point cannot be resolved
    pub entry_point_missing: bool,
    /// Device creation fails with this code
    pub create_error: Option<DdError>,
    /// Cooperative level change fails with this code
    pub cooperative_error: Option<DdError>,
    /// Modes the display accepts; `None` accepts all
    pub supported_modes: Option<Vec<(u32, u32)>>,
    /// Primary surface creation fails with this code
    pub primary_error: Option<DdError>,
    /// Back buffer lookup fails with this code
    pub back_buffer_error: Option<DdError>,
    /// Surface locks or flips left to lose the flip chain
    pub lost_operations: u32,
    /// Flip chain memory is lost until the front surface is restored
    pub chain_lost: bool,

    // Observations
    /// Ordered record of calls
    pub events: Vec<DisplayEvent>,
    /// Library is loaded
    pub library_loaded: bool,
    /// Current cooperative level
    pub cooperative_level: CooperativeFlags,
    /// Current display mode
    pub mode: Option<DisplayMode>,
    /// Completed flips
    pub flips: u32,
    /// Successful front surface restores
    pub restores: u32,
    /// Back buffer contents at the last unlock
    pub last_frame: Vec<u8>,
}

impl HeadlessDisplayState {
    // Consume one injected loss; reports whether the chain is lost now
    fn check_lost(&mut self) -> bool {
        if self.lost_operations > 0 {
            self.lost_operations -= 1;
            self.chain_lost = true;
        }
        self.chain_lost
    }
}

/// Shared view of a headless display
#[derive(Debug, Clone)]
pub struct HeadlessDisplayProbe {
    state: Arc<Mutex<HeadlessDisplayState>>,
}

impl HeadlessDisplayProbe {
    /// Lock the state for inspection or fault setup
    pub fn state(&self) -> MutexGuard<'_, HeadlessDisplayState> {
        self.state.lock()
    }

    /// Recorded events
    pub fn events(&self) -> Vec<DisplayEvent> {
        self.state.lock().events.clone()
    }

    /// Lose the flip chain on each of the next `count` surface locks or flips
    pub fn lose_surfaces(&self, count: u32) {
        self.state.lock().lost_operations = count;
    }
}

/// Software display library
#[derive(Debug, Clone, Default)]
pub struct HeadlessDisplay {
    state: Arc<Mutex<HeadlessDisplayState>>,
}

impl HeadlessDisplay {
    /// Display accepting any mode
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for fault injection and inspection
    pub fn probe(&self) -> HeadlessDisplayProbe {
        HeadlessDisplayProbe {
            state: Arc::clone(&self.state),
        }
    }
}

impl DisplayLibrary for HeadlessDisplay {
    type Device = HeadlessDisplayDevice;

    fn load(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        if state.library_loaded {
            return Ok(());
        }
        if state.library_missing {
            return Err(Error::LibraryMissing("display library not found".into()));
        }
        state.library_loaded = true;
        state.events.push(DisplayEvent::LibraryLoaded);
        Ok(())
    }

    fn create_device(&mut self) -> Result<HeadlessDisplayDevice> {
        let mut state = self.state.lock();
        if !state.library_loaded {
            return Err(Error::NotInitialized("display library"));
        }
        if state.entry_point_missing {
            return Err(Error::LibraryMissing(
                "display device entry point missing".into(),
            ));
        }
        if let Some(err) = state.create_error {
            return Err(err.into());
        }
        state.events.push(DisplayEvent::DeviceCreated);
        Ok(HeadlessDisplayDevice {
            state: Arc::clone(&self.state),
        })
    }

    fn unload(&mut self) {
        let mut state = self.state.lock();
        if state.library_loaded {
            state.library_loaded = false;
            state.events.push(DisplayEvent::LibraryUnloaded);
        }
    }

    fn is_loaded(&self) -> bool {
        self.state.lock().library_loaded
    }
}

/// Device of a [`HeadlessDisplay`]
#[derive(Debug)]
pub struct HeadlessDisplayDevice {
    state: Arc<Mutex<HeadlessDisplayState>>,
}

impl DisplayDevice for HeadlessDisplayDevice {
    type Surface = HeadlessSurface;

    fn set_cooperative_level(&mut self, flags: CooperativeFlags) -> DdResult<()> {
        let mut state = self.state.lock();
        if let Some(err) = state.cooperative_error {
            return Err(err);
        }
        if flags.contains(CooperativeFlags::FULLSCREEN)
            && !flags.contains(CooperativeFlags::EXCLUSIVE)
        {
            return Err(DdError::INVALID_PARAMS);
        }
        state.cooperative_level = flags;
        state.events.push(DisplayEvent::CooperativeLevel(flags));
        Ok(())
    }

    fn set_display_mode(&mut self, mode: DisplayMode) -> DdResult<()> {
        let mut state = self.state.lock();
        if !state.cooperative_level.contains(CooperativeFlags::EXCLUSIVE) {
            return Err(DdError::NO_EXCLUSIVE_MODE);
        }
        if mode.width == 0 || mode.height == 0 || mode.bits_per_pixel != 32 {
            return Err(DdError::INVALID_MODE);
        }
        if let Some(modes) = &state.supported_modes {
            if !modes.contains(&(mode.width, mode.height)) {
                return Err(DdError::UNSUPPORTED_MODE);
            }
        }
        state.mode = Some(mode);
        state.events.push(DisplayEvent::ModeSet(mode));
        Ok(())
    }

    fn restore_display_mode(&mut self) -> DdResult<()> {
        let mut state = self.state.lock();
        state.mode = None;
        state.events.push(DisplayEvent::ModeRestored);
        Ok(())
    }

    fn create_primary_surface(&mut self, back_buffers: u32) -> DdResult<HeadlessSurface> {
        let mut state = self.state.lock();
        if let Some(err) = state.primary_error {
            return Err(err);
        }
        let mode = state.mode.ok_or(DdError::WRONG_MODE)?;
        state.events.push(DisplayEvent::SurfaceCreated(SurfaceRole::Front));
        Ok(HeadlessSurface::new(
            Arc::clone(&self.state),
            SurfaceRole::Front,
            mode,
            back_buffers,
        ))
    }
}

impl Drop for HeadlessDisplayDevice {
    fn drop(&mut self) {
        self.state.lock().events.push(DisplayEvent::DeviceReleased);
    }
}

/// Surface of a [`HeadlessDisplayDevice`]
#[derive(Debug)]
pub struct HeadlessSurface {
    state: Arc<Mutex<HeadlessDisplayState>>,
    role: SurfaceRole,
    mode: DisplayMode,
    back_buffers: u32,
    memory: Box<[u8]>,
    pitch: usize,
    locked: bool,
}

impl HeadlessSurface {
    fn new(
        state: Arc<Mutex<HeadlessDisplayState>>,
        role: SurfaceRole,
        mode: DisplayMode,
        back_buffers: u32,
    ) -> Self {
        let pitch = mode.width as usize * (mode.bits_per_pixel as usize / 8);
        HeadlessSurface {
            state,
            role,
            mode,
            back_buffers,
            memory: vec![0u8; pitch * mode.height as usize].into_boxed_slice(),
            pitch,
            locked: false,
        }
    }

    /// Position in the flip chain
    pub fn role(&self) -> SurfaceRole {
        self.role
    }
}

impl DisplaySurface for HeadlessSurface {
    fn attached_back_buffer(&mut self) -> DdResult<HeadlessSurface> {
        if self.role != SurfaceRole::Front || self.back_buffers == 0 {
            return Err(DdError::NOT_FOUND);
        }
        let mut state = self.state.lock();
        if let Some(err) = state.back_buffer_error {
            return Err(err);
        }
        state.events.push(DisplayEvent::SurfaceCreated(SurfaceRole::Back));
        drop(state);
        Ok(HeadlessSurface::new(
            Arc::clone(&self.state),
            SurfaceRole::Back,
            self.mode,
            0,
        ))
    }

    fn lock(&mut self) -> DdResult<SurfaceLock> {
        if self.state.lock().check_lost() {
            return Err(DdError::SURFACE_LOST);
        }
        if self.locked {
            return Err(DdError::SURFACE_BUSY);
        }
        self.locked = true;
        let ptr = NonNull::from(&mut self.memory[..]).cast::<u8>();
        // SAFETY: `memory` is owned by this surface and never reallocated;
        // `locked` prevents a second lock until this one is returned.
        Ok(unsafe { SurfaceLock::from_raw(ptr, self.memory.len(), self.pitch) })
    }

    fn unlock(&mut self, lock: SurfaceLock) -> DdResult<()> {
        if !self.locked {
            return Err(DdError::NOT_LOCKED);
        }
        drop(lock);
        self.locked = false;
        if self.role == SurfaceRole::Back {
            self.state.lock().last_frame = self.memory.to_vec();
        }
        Ok(())
    }

    fn flip(&mut self) -> DdResult<()> {
        if self.role != SurfaceRole::Front || self.back_buffers == 0 {
            return Err(DdError::NOT_FLIPPABLE);
        }
        let mut state = self.state.lock();
        if state.check_lost() {
            return Err(DdError::SURFACE_LOST);
        }
        state.flips += 1;
        Ok(())
    }

    fn is_lost(&self) -> bool {
        self.state.lock().chain_lost
    }

    fn restore(&mut self) -> DdResult<()> {
        if self.role == SurfaceRole::Back {
            return Err(DdError::IMPLICITLY_CREATED);
        }
        let mut state = self.state.lock();
        state.chain_lost = false;
        state.restores += 1;
        Ok(())
    }
}

impl Drop for HeadlessSurface {
    fn drop(&mut self) {
        self.state
            .lock()
            .events
            .push(DisplayEvent::SurfaceReleased(self.role));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exclusive() -> CooperativeFlags {
        CooperativeFlags::EXCLUSIVE | CooperativeFlags::FULLSCREEN
    }

    fn mode() -> DisplayMode {
        DisplayMode {
            width: 4,
            height: 2,
            bits_per_pixel: 32,
        }
    }

    #[test]
    fn test_mode_requires_exclusive() {
        let mut lib = HeadlessDisplay::new();
        lib.load().unwrap();
        let mut device = lib.create_device().unwrap();
        assert_eq!(
            device.set_display_mode(mode()),
            Err(DdError::NO_EXCLUSIVE_MODE)
        );
        device.set_cooperative_level(exclusive()).unwrap();
        assert!(device.set_display_mode(mode()).is_ok());
    }

    #[test]
    fn test_device_needs_loaded_library() {
        let mut lib = HeadlessDisplay::new();
        assert!(matches!(
            lib.create_device(),
            Err(Error::NotInitialized(_))
        ));
    }

    #[test]
    fn test_back_buffer_only_from_chain() {
        let mut lib = HeadlessDisplay::new();
        lib.load().unwrap();
        let mut device = lib.create_device().unwrap();
        device.set_cooperative_level(exclusive()).unwrap();
        device.set_display_mode(mode()).unwrap();

        let mut single = device.create_primary_surface(0).unwrap();
        assert_eq!(single.attached_back_buffer().err(), Some(DdError::NOT_FOUND));
        assert_eq!(single.flip(), Err(DdError::NOT_FLIPPABLE));

        let mut front = device.create_primary_surface(1).unwrap();
        let mut back = front.attached_back_buffer().unwrap();
        let lock = back.lock().unwrap();
        assert_eq!(lock.pitch(), 16);
        assert_eq!(lock.len(), 32);
        back.unlock(lock).unwrap();
        front.flip().unwrap();
    }

    #[test]
    fn test_lost_surface_until_restore() {
        let mut lib = HeadlessDisplay::new();
        let probe = lib.probe();
        lib.load().unwrap();
        let mut device = lib.create_device().unwrap();
        device.set_cooperative_level(exclusive()).unwrap();
        device.set_display_mode(mode()).unwrap();
        let mut front = device.create_primary_surface(1).unwrap();

        probe.lose_surfaces(1);
        assert_eq!(front.lock().err(), Some(DdError::SURFACE_LOST));
        assert!(front.is_lost());
        assert_eq!(front.lock().err(), Some(DdError::SURFACE_LOST));
        front.restore().unwrap();
        assert!(front.lock().is_ok());
    }

    #[test]
    fn test_back_buffer_restores_through_front() {
        let mut lib = HeadlessDisplay::new();
        let probe = lib.probe();
        lib.load().unwrap();
        let mut device = lib.create_device().unwrap();
        device.set_cooperative_level(exclusive()).unwrap();
        device.set_display_mode(mode()).unwrap();
        let mut front = device.create_primary_surface(1).unwrap();
        let mut back = front.attached_back_buffer().unwrap();

        probe.lose_surfaces(1);
        assert_eq!(back.lock().err(), Some(DdError::SURFACE_LOST));
        assert!(front.is_lost());
        assert_eq!(back.restore(), Err(DdError::IMPLICITLY_CREATED));
        assert_eq!(back.lock().err(), Some(DdError::SURFACE_LOST));

        front.restore().unwrap();
        assert!(!back.is_lost());
        let lock = back.lock().unwrap();
        back.unlock(lock).unwrap();
    }
}
