//! DirectDraw backend
//!
//! `ddraw.dll` is loaded at run time and `DirectDrawCreateEx` resolved from
//! it, so the crate links on systems without DirectDraw installed.

use crate::display::device::{
    CooperativeFlags, DdResult, DisplayDevice, DisplayLibrary, DisplayMode, DisplaySurface,
    SurfaceLock,
};
use crate::display::DdError;
use crate::{Error, Result};
use std::ffi::c_void;
use std::mem::size_of;
use std::ptr::{null, null_mut, NonNull};
use windows::core::{s, Interface, GUID, HRESULT};
use windows::Win32::Foundation::{HANDLE, HMODULE, HWND};
use windows::Win32::Graphics::DirectDraw::{
    IDirectDraw7, IDirectDrawSurface7, DDSCAPS2, DDSURFACEDESC2,
};
use windows::Win32::System::LibraryLoader::{FreeLibrary, GetProcAddress, LoadLibraryA};

const DDSD_CAPS: u32 = 0x0000_0001;
const DDSD_BACKBUFFERCOUNT: u32 = 0x0000_0020;
const DDSCAPS_BACKBUFFER: u32 = 0x0000_0004;
const DDSCAPS_COMPLEX: u32 = 0x0000_0008;
const DDSCAPS_FLIP: u32 = 0x0000_0010;
const DDSCAPS_PRIMARYSURFACE: u32 = 0x0000_0200;
const DDLOCK_WAIT: u32 = 0x0000_0001;
const DDFLIP_WAIT: u32 = 0x0000_0001;

type DirectDrawCreateEx =
    unsafe extern "system" fn(*const GUID, *mut *mut c_void, *const GUID, *mut c_void) -> HRESULT;

fn dd_error(e: windows::core::Error) -> DdError {
    DdError(e.code().0)
}

/// `ddraw.dll`, loaded on demand
#[derive(Debug)]
pub struct DirectDrawLibrary {
    hwnd: HWND,
    module: Option<HMODULE>,
}

impl DirectDrawLibrary {
    /// Library whose device takes over `hwnd` in fullscreen
    pub fn new(hwnd: HWND) -> Self {
        DirectDrawLibrary { hwnd, module: None }
    }
}

impl DisplayLibrary for DirectDrawLibrary {
    type Device = DirectDrawDevice;

    fn load(&mut self) -> Result<()> {
        if self.module.is_some() {
            return Ok(());
        }
        // SAFETY: static NUL-terminated name.
        let module = unsafe { LoadLibraryA(s!("ddraw.dll")) }.map_err(|e| {
            log::info!("failed");
            Error::LibraryMissing(format!("ddraw.dll: {e}"))
        })?;
        log::info!("ok");
        self.module = Some(module);
        Ok(())
    }

    fn create_device(&mut self) -> Result<DirectDrawDevice> {
        let module = self.module.ok_or(Error::NotInitialized("ddraw.dll"))?;
        // SAFETY: `module` is a loaded library handle.
        let proc = unsafe { GetProcAddress(module, s!("DirectDrawCreateEx")) }.ok_or_else(|| {
            log::info!("*** DirectDrawCreateEx == NULL ***");
            Error::LibraryMissing("DirectDrawCreateEx not exported".into())
        })?;
        // SAFETY: documented signature of DirectDrawCreateEx.
        let create: DirectDrawCreateEx = unsafe { std::mem::transmute(proc) };

        let mut raw: *mut c_void = null_mut();
        // SAFETY: out pointer is a live local; IID names the interface we wrap.
        let hr = unsafe { create(null(), &mut raw, &IDirectDraw7::IID, null_mut()) };
        if hr.is_err() || raw.is_null() {
            let err = DdError(hr.0);
            log::info!("failed - {}", err.name());
            return Err(err.into());
        }
        // SAFETY: DirectDrawCreateEx returned an owned IDirectDraw7 reference.
        let dd = unsafe { IDirectDraw7::from_raw(raw) };
        Ok(DirectDrawDevice {
            dd,
            hwnd: self.hwnd,
        })
    }

    fn unload(&mut self) {
        if let Some(module) = self.module.take() {
            // SAFETY: every object from the library is released by now.
            if let Err(e) = unsafe { FreeLibrary(module) } {
                log::warn!("FreeLibrary(ddraw.dll) failed: {e}");
            }
        }
    }

    fn is_loaded(&self) -> bool {
        self.module.is_some()
    }
}

/// An `IDirectDraw7` object; released on drop
#[derive(Debug)]
pub struct DirectDrawDevice {
    dd: IDirectDraw7,
    hwnd: HWND,
}

impl DisplayDevice for DirectDrawDevice {
    type Surface = DirectDrawSurface;

    fn set_cooperative_level(&mut self, flags: CooperativeFlags) -> DdResult<()> {
        // SAFETY: `hwnd` outlives the device.
        unsafe { self.dd.SetCooperativeLevel(self.hwnd, flags.bits()) }.map_err(dd_error)
    }

    fn set_display_mode(&mut self, mode: DisplayMode) -> DdResult<()> {
        // SAFETY: no pointers.
        unsafe {
            self.dd
                .SetDisplayMode(mode.width, mode.height, mode.bits_per_pixel, 0, 0)
        }
        .map_err(dd_error)
    }

    fn restore_display_mode(&mut self) -> DdResult<()> {
        // SAFETY: no arguments.
        unsafe { self.dd.RestoreDisplayMode() }.map_err(dd_error)
    }

    fn create_primary_surface(&mut self, back_buffers: u32) -> DdResult<DirectDrawSurface> {
        let mut desc = DDSURFACEDESC2 {
            dwSize: size_of::<DDSURFACEDESC2>() as u32,
            dwFlags: DDSD_CAPS | DDSD_BACKBUFFERCOUNT,
            ..Default::default()
        };
        desc.ddsCaps.dwCaps = DDSCAPS_PRIMARYSURFACE | DDSCAPS_FLIP | DDSCAPS_COMPLEX;
        desc.Anonymous5.dwBackBufferCount = back_buffers;

        let mut surface: Option<IDirectDrawSurface7> = None;
        // SAFETY: `desc` is sized and initialised; out pointer is a live local.
        unsafe { self.dd.CreateSurface(&mut desc, &mut surface, None) }.map_err(dd_error)?;
        let surface = surface.ok_or(DdError::GENERIC)?;
        Ok(DirectDrawSurface {
            surface,
            locked: false,
        })
    }
}

/// An `IDirectDrawSurface7`; released on drop
#[derive(Debug)]
pub struct DirectDrawSurface {
    surface: IDirectDrawSurface7,
    locked: bool,
}

impl DisplaySurface for DirectDrawSurface {
    fn attached_back_buffer(&mut self) -> DdResult<DirectDrawSurface> {
        let mut caps = DDSCAPS2 {
            dwCaps: DDSCAPS_BACKBUFFER,
            ..Default::default()
        };
        let mut back: Option<IDirectDrawSurface7> = None;
        // SAFETY: both pointers are live locals.
        unsafe { self.surface.GetAttachedSurface(&mut caps, &mut back) }.map_err(dd_error)?;
        let surface = back.ok_or(DdError::NOT_FOUND)?;
        Ok(DirectDrawSurface {
            surface,
            locked: false,
        })
    }

    fn lock(&mut self) -> DdResult<SurfaceLock> {
        if self.locked {
            return Err(DdError::SURFACE_BUSY);
        }
        let mut desc = DDSURFACEDESC2 {
            dwSize: size_of::<DDSURFACEDESC2>() as u32,
            ..Default::default()
        };
        // SAFETY: whole-surface lock into a sized descriptor.
        unsafe {
            self.surface
                .Lock(null_mut(), &mut desc, DDLOCK_WAIT, HANDLE::default())
        }
        .map_err(dd_error)?;

        // SAFETY: a successful lock fills the pitch member of the union.
        let pitch = unsafe { desc.Anonymous1.lPitch };
        let ptr = NonNull::new(desc.lpSurface.cast::<u8>()).ok_or(DdError::GENERIC)?;
        let pitch = usize::try_from(pitch).map_err(|_| DdError::INVALID_PIXEL_FORMAT)?;
        self.locked = true;
        // SAFETY: DirectDraw owns `pitch * height` writable bytes until Unlock.
        Ok(unsafe { SurfaceLock::from_raw(ptr, pitch * desc.dwHeight as usize, pitch) })
    }

    fn unlock(&mut self, lock: SurfaceLock) -> DdResult<()> {
        if !self.locked {
            return Err(DdError::NOT_LOCKED);
        }
        drop(lock);
        self.locked = false;
        // SAFETY: whole-surface unlock matching `lock`.
        unsafe { self.surface.Unlock(null_mut()) }.map_err(dd_error)
    }

    fn flip(&mut self) -> DdResult<()> {
        // SAFETY: flips to the next surface in the chain.
        unsafe { self.surface.Flip(None, DDFLIP_WAIT) }.map_err(dd_error)
    }

    fn is_lost(&self) -> bool {
        // SAFETY: no arguments.
        unsafe { self.surface.IsLost() }.is_err()
    }

    fn restore(&mut self) -> DdResult<()> {
        // SAFETY: no arguments.
        unsafe { self.surface.Restore() }.map_err(dd_error)
    }
}
