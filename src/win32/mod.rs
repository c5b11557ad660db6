//! Native Win32 backends
//!
//! DirectSound for [`crate::sound`], DirectDraw for [`crate::display`] and a
//! `MessageBox` prompt for a busy sound device. Each takes the engine's main
//! window handle; both APIs need one for their cooperative levels.

#[cfg(feature = "display")]
pub mod ddraw;
#[cfg(feature = "sound")]
pub mod dsound;
#[cfg(feature = "sound")]
pub mod prompt;

#[cfg(feature = "display")]
pub use ddraw::DirectDrawLibrary;
#[cfg(feature = "sound")]
pub use dsound::DirectSoundBackend;
#[cfg(feature = "sound")]
pub use prompt::MessageBoxPrompt;

use windows::Win32::Foundation::HWND;
use windows::Win32::UI::WindowsAndMessaging::{GetDesktopWindow, GetForegroundWindow};

/// Foreground window, or the desktop when nothing has focus
pub fn default_window() -> HWND {
    // SAFETY: plain handle queries with no arguments.
    let hwnd = unsafe { GetForegroundWindow() };
    if hwnd.is_invalid() {
        unsafe { GetDesktopWindow() }
    } else {
        hwnd
    }
}
