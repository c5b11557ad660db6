//! Fullscreen surface manager
//!
//! The engine renders 8-bit indexed pixels into an offscreen buffer owned by
//! [`SurfaceManager`]. [`SurfaceManager::present`] expands those pixels
//! through the [`FakePalette`] into the 32-bit back buffer of a two-surface
//! flip chain and flips it to the screen.
//!
//! Bring-up order is library, device, exclusive fullscreen, display mode,
//! front surface, back surface, offscreen buffer and palette. Teardown runs
//! the same list in reverse and is safe from any partial state.

pub mod device;
pub mod error;
pub mod headless;
pub mod palette;

pub use device::{
    CooperativeFlags, DdResult, DisplayDevice, DisplayLibrary, DisplayMode, DisplaySurface,
    SurfaceLock,
};
pub use error::DdError;
pub use headless::{
    DisplayEvent, HeadlessDisplay, HeadlessDisplayProbe, HeadlessDisplayState, HeadlessSurface,
    SurfaceRole,
};
pub use palette::{FakePalette, PALETTE_BYTES};

use crate::{Error, Result};

/// Bits per pixel of the fullscreen mode
pub const DISPLAY_BPP: u32 = 32;

/// Back buffers in the flip chain
pub const BACK_BUFFER_COUNT: u32 = 1;

/// Restore-and-retry attempts for a lost surface during `present`
pub const MAX_RESTORE_ATTEMPTS: u32 = 3;

/// Fill value of a fresh offscreen buffer
pub const OFFSCREEN_FILL: u8 = 255;

/// Renderer's view of the offscreen buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffscreenInfo {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Bytes from one row to the next
    pub pitch: usize,
}

/// The 8-bit render target and the palette that expands it
#[derive(Debug)]
struct Offscreen {
    pixels: Vec<u8>,
    palette: FakePalette,
    info: OffscreenInfo,
}

type SurfaceOf<L> = <<L as DisplayLibrary>::Device as DisplayDevice>::Surface;

/// Fullscreen surface manager over a [`DisplayLibrary`]
pub struct SurfaceManager<L: DisplayLibrary> {
    library: L,
    device: Option<L::Device>,
    front: Option<SurfaceOf<L>>,
    back: Option<SurfaceOf<L>>,
    offscreen: Option<Offscreen>,
}

impl<L: DisplayLibrary> SurfaceManager<L> {
    /// Create a manager; nothing is acquired until [`init`](Self::init)
    pub fn new(library: L) -> Self {
        SurfaceManager {
            library,
            device: None,
            front: None,
            back: None,
            offscreen: None,
        }
    }

    /// Switch to a `width` x `height` fullscreen mode and allocate the
    /// offscreen buffer.
    ///
    /// On failure everything acquired so far is released before the error
    /// is returned. A running manager is shut down first.
    pub fn init(&mut self, width: u32, height: u32) -> Result<OffscreenInfo> {
        if self.is_initialized() {
            self.shutdown();
        }

        match self.try_init(width, height) {
            Ok(info) => Ok(info),
            Err(e) => {
                log::error!("*** DDraw init failure ***");
                log::debug!("display init error: {e}");
                self.shutdown();
                Err(e)
            }
        }
    }

    /// Replace the palette from an engine palette of `[R, G, B, x]` entries
    pub fn set_palette(&mut self, palette: &[u8; PALETTE_BYTES]) -> Result<()> {
        let offscreen = self
            .offscreen
            .as_mut()
            .ok_or(Error::NotInitialized("display"))?;
        offscreen.palette.load_rgb0(palette);
        Ok(())
    }

    /// Current palette in display byte order
    pub fn palette(&self) -> Option<&FakePalette> {
        self.offscreen.as_ref().map(|o| &o.palette)
    }

    /// The 8-bit render target, `pitch() * height` bytes
    pub fn offscreen_mut(&mut self) -> Option<&mut [u8]> {
        self.offscreen.as_mut().map(|o| o.pixels.as_mut_slice())
    }

    /// The 8-bit render target, read-only
    pub fn offscreen(&self) -> Option<&[u8]> {
        self.offscreen.as_ref().map(|o| o.pixels.as_slice())
    }

    /// Row stride of the offscreen buffer in bytes; 0 before `init`
    pub fn pitch(&self) -> usize {
        self.offscreen.as_ref().map_or(0, |o| o.info.pitch)
    }

    /// Offscreen geometry while initialised
    pub fn info(&self) -> Option<OffscreenInfo> {
        self.offscreen.as_ref().map(|o| o.info)
    }

    /// Surfaces are up
    pub fn is_initialized(&self) -> bool {
        self.offscreen.is_some()
    }

    /// Expand the offscreen buffer into the back surface and flip.
    ///
    /// Losing either surface loses the whole flip chain. The chain is
    /// restored through the front surface and the operation retried up to
    /// [`MAX_RESTORE_ATTEMPTS`] times before [`Error::BufferLost`].
    pub fn present(&mut self) -> Result<()> {
        let offscreen = self
            .offscreen
            .as_ref()
            .ok_or(Error::NotInitialized("display"))?;
        let back = self
            .back
            .as_mut()
            .ok_or(Error::NotInitialized("display back buffer"))?;
        let front = self
            .front
            .as_mut()
            .ok_or(Error::NotInitialized("display front buffer"))?;

        if front.is_lost() {
            restore_chain(front);
        }

        let mut lock = retry_lost(front, back, |_, back| back.lock())?;
        let copied = blit_indexed(offscreen, &mut lock);
        back.unlock(lock)?;
        copied?;

        retry_lost(front, back, |front, _| front.flip())
    }

    /// Release everything in reverse order of acquisition. Safe to repeat
    /// and before `init`.
    pub fn shutdown(&mut self) {
        if self.offscreen.take().is_some() {
            log::info!("...releasing offscreen buffer");
        }
        if self.back.take().is_some() {
            log::info!("...releasing back buffer");
        }
        if self.front.take().is_some() {
            log::info!("...releasing front buffer");
        }

        if let Some(mut device) = self.device.take() {
            log::info!("...restoring display mode");
            if let Err(e) = device.restore_display_mode() {
                log::warn!("display mode restore failed: {e}");
            }
            log::info!("...restoring normal coop mode");
            if let Err(e) = device.set_cooperative_level(CooperativeFlags::NORMAL) {
                log::warn!("cooperative level reset failed: {e}");
            }
            log::info!("...releasing lpDirectDraw");
            drop(device);
        }

        if self.library.is_loaded() {
            log::info!("...freeing library");
            self.library.unload();
        }
    }

    fn try_init(&mut self, width: u32, height: u32) -> Result<OffscreenInfo> {
        if width == 0 || height == 0 {
            return Err(Error::Negotiation(format!(
                "invalid display size {width}x{height}"
            )));
        }

        log::info!("Initializing DirectDraw");
        if !self.library.is_loaded() {
            log::info!("...loading DDRAW.DLL");
            self.library.load()?;
        }

        log::info!("...creating DirectDraw object");
        let device = self.device.insert(self.library.create_device()?);

        log::info!("...setting exclusive mode");
        device
            .set_cooperative_level(CooperativeFlags::EXCLUSIVE | CooperativeFlags::FULLSCREEN)
            .inspect_err(|e| log::info!("failed - {}", e.name()))?;

        log::info!("...setting linear mode {width}x{height}x{DISPLAY_BPP}");
        device
            .set_display_mode(DisplayMode {
                width,
                height,
                bits_per_pixel: DISPLAY_BPP,
            })
            .map_err(|e| match e {
                DdError::INVALID_MODE | DdError::UNSUPPORTED_MODE => Error::Negotiation(format!(
                    "display mode {width}x{height}x{DISPLAY_BPP}: {}",
                    e.name()
                )),
                other => other.into(),
            })?;

        log::info!("...creating front buffer");
        let front = self.front.insert(
            device
                .create_primary_surface(BACK_BUFFER_COUNT)
                .inspect_err(|e| log::info!("failed - {}", e.name()))?,
        );

        log::info!("...creating back buffer");
        let back = front
            .attached_back_buffer()
            .inspect_err(|e| log::info!("failed - {}", e.name()))?;
        self.back = Some(back);

        log::info!("...creating offscreen buffer");
        let info = OffscreenInfo {
            width,
            height,
            pitch: width as usize,
        };
        self.offscreen = Some(Offscreen {
            pixels: vec![OFFSCREEN_FILL; width as usize * height as usize],
            palette: FakePalette::default(),
            info,
        });
        Ok(info)
    }
}

impl<L: DisplayLibrary> Drop for SurfaceManager<L> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<L: DisplayLibrary> std::fmt::Debug for SurfaceManager<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceManager")
            .field("library_loaded", &self.library.is_loaded())
            .field("device", &self.device.is_some())
            .field("front", &self.front.is_some())
            .field("back", &self.back.is_some())
            .field("offscreen", &self.info())
            .finish()
    }
}

// Run a flip chain operation, restoring the chain while it reports itself
// lost. The back buffer is implicitly created, so only the front surface
// can be restored.
fn retry_lost<S, T>(
    front: &mut S,
    back: &mut S,
    mut op: impl FnMut(&mut S, &mut S) -> DdResult<T>,
) -> Result<T>
where
    S: DisplaySurface,
{
    let mut attempts = 0;
    loop {
        match op(front, back) {
            Ok(value) => return Ok(value),
            Err(DdError::SURFACE_LOST) => {
                attempts += 1;
                if attempts >= MAX_RESTORE_ATTEMPTS {
                    return Err(Error::BufferLost { attempts });
                }
                restore_chain(front);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn restore_chain<S: DisplaySurface>(front: &mut S) {
    if let Err(e) = front.restore() {
        log::debug!("surface restore failed: {e}");
    }
}

fn blit_indexed(offscreen: &Offscreen, lock: &mut SurfaceLock) -> Result<()> {
    let width = offscreen.info.width as usize;
    let height = offscreen.info.height as usize;
    let row_bytes = width * 4;
    let pitch = lock.pitch();
    if pitch < row_bytes || lock.len() < pitch * (height - 1) + row_bytes {
        return Err(Error::Negotiation(format!(
            "back surface too small for {width}x{height} (pitch {pitch}, {} bytes)",
            lock.len()
        )));
    }

    let dst = lock.as_mut_slice();
    for (y, row) in offscreen.pixels.chunks_exact(offscreen.info.pitch).enumerate() {
        let out = &mut dst[y * pitch..y * pitch + row_bytes];
        for (px, &index) in out.chunks_exact_mut(4).zip(&row[..width]) {
            px.copy_from_slice(&offscreen.palette.entry(index));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> (SurfaceManager<HeadlessDisplay>, HeadlessDisplayProbe) {
        let display = HeadlessDisplay::new();
        let probe = display.probe();
        (SurfaceManager::new(display), probe)
    }

    #[test]
    fn test_init_offscreen() {
        let (mut vid, probe) = manager();
        let info = vid.init(320, 240).unwrap();
        assert_eq!(
            info,
            OffscreenInfo {
                width: 320,
                height: 240,
                pitch: 320
            }
        );
        assert_eq!(vid.pitch(), 320);
        let pixels = vid.offscreen_mut().unwrap();
        assert_eq!(pixels.len(), 320 * 240);
        assert!(pixels.iter().all(|&p| p == OFFSCREEN_FILL));

        let state = probe.state();
        assert_eq!(
            state.cooperative_level,
            CooperativeFlags::EXCLUSIVE | CooperativeFlags::FULLSCREEN
        );
        assert_eq!(
            state.mode,
            Some(DisplayMode {
                width: 320,
                height: 240,
                bits_per_pixel: 32
            })
        );
    }

    #[test]
    fn test_palette_before_init() {
        let (mut vid, _) = manager();
        assert!(matches!(
            vid.set_palette(&[0; PALETTE_BYTES]),
            Err(Error::NotInitialized(_))
        ));
        assert_eq!(vid.pitch(), 0);
        assert!(vid.offscreen_mut().is_none());
    }

    #[test]
    fn test_present_expands_palette() {
        let (mut vid, probe) = manager();
        vid.init(2, 2).unwrap();

        let mut pal = [0u8; PALETTE_BYTES];
        pal[4..8].copy_from_slice(&[10, 20, 30, 0]);
        pal[8..12].copy_from_slice(&[40, 50, 60, 0]);
        vid.set_palette(&pal).unwrap();
        vid.offscreen_mut()
            .unwrap()
            .copy_from_slice(&[1, 2, 2, 0]);

        vid.present().unwrap();
        let state = probe.state();
        assert_eq!(state.flips, 1);
        assert_eq!(
            state.last_frame,
            vec![
                30, 20, 10, 255, 60, 50, 40, 255, //
                60, 50, 40, 255, 0, 0, 0, 255,
            ]
        );
    }

    #[test]
    fn test_present_restores_lost_surface() {
        let (mut vid, probe) = manager();
        vid.init(8, 8).unwrap();

        probe.lose_surfaces(2);
        vid.present().unwrap();
        {
            let state = probe.state();
            assert_eq!(state.restores, 2);
            assert_eq!(state.flips, 1);
            assert!(!state.chain_lost);
        }

        probe.lose_surfaces(MAX_RESTORE_ATTEMPTS);
        assert!(matches!(
            vid.present(),
            Err(Error::BufferLost { attempts: 3 })
        ));
        assert!(vid.is_initialized());
    }

    #[test]
    fn test_present_restores_chain_already_lost() {
        let (mut vid, probe) = manager();
        vid.init(8, 8).unwrap();

        probe.state().chain_lost = true;
        vid.present().unwrap();
        let state = probe.state();
        assert_eq!(state.restores, 1);
        assert_eq!(state.flips, 1);
    }

    #[test]
    fn test_present_recovers_after_exhausted_retries() {
        let (mut vid, probe) = manager();
        vid.init(8, 8).unwrap();

        probe.lose_surfaces(MAX_RESTORE_ATTEMPTS);
        assert!(vid.present().is_err());
        vid.present().unwrap();
        assert_eq!(probe.state().flips, 1);
    }

    #[test]
    fn test_refused_mode_is_negotiation() {
        let (mut vid, probe) = manager();
        probe.state().supported_modes = Some(vec![(640, 480)]);
        assert!(matches!(vid.init(320, 240), Err(Error::Negotiation(_))));
        assert!(!vid.is_initialized());
        assert!(vid.init(640, 480).is_ok());
    }

    #[test]
    fn test_zero_size_rejected() {
        let (mut vid, probe) = manager();
        assert!(matches!(vid.init(0, 240), Err(Error::Negotiation(_))));
        assert!(probe.events().is_empty());
    }

    #[test]
    fn test_reinit_releases_previous_chain() {
        let (mut vid, probe) = manager();
        vid.init(4, 4).unwrap();
        vid.init(8, 8).unwrap();
        let released = probe
            .events()
            .iter()
            .filter(|e| matches!(e, DisplayEvent::SurfaceReleased(_)))
            .count();
        assert_eq!(released, 2);
        assert_eq!(vid.pitch(), 8);
    }
}
