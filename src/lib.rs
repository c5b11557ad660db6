//! Win32 media backend for a software-rendered game engine
//!
//! Three independent components, each owning one piece of multimedia
//! hardware on behalf of the engine's driver loop:
//!
//! - [`cdaudio`]: CD transport state (enabled flag, track remap table, loop
//!   counter) and the `cd` console command. The drive itself is a capability;
//!   the default [`NullCdDrive`] reports no disc.
//! - [`sound`]: DirectSound-style PCM driver. Opens a device, allocates one
//!   looping 64 KiB ring buffer and exposes position/lock/unlock primitives
//!   to an external mixer.
//! - [`display`]: DirectDraw-style fullscreen surface manager. Creates a
//!   flip chain plus an 8-bit offscreen render target and converts the
//!   engine's palette into the display's 32-bit byte order.
//!
//! Every native object is reached through a capability trait so a platform
//! backend can be swapped without touching call sites. Headless software
//! backends ship with the crate; the native Win32 ones live in [`win32`]
//! behind the `native` feature.
//!
//! # Crate feature flags
//! - `cdaudio` (default): CD transport stub
//! - `sound` (default, implies `cdaudio`): ring buffer sound driver
//! - `display` (default): fullscreen surface manager
//! - `native` (opt-in, Windows only): DirectSound/DirectDraw backends
//!
//! # Quick start
//! ```no_run
//! # #[cfg(all(feature = "sound", feature = "display"))]
//! # {
//! use winmedia::cdaudio::{CdAudio, NullCdDrive};
//! use winmedia::display::{HeadlessDisplay, SurfaceManager};
//! use winmedia::sound::{HeadlessAudio, InitStatus, NoRetry, SoundDriver};
//! use winmedia::MediaConfig;
//!
//! let config = MediaConfig::default();
//! let cd = CdAudio::new(Box::new(NullCdDrive));
//! let mut snd = SoundDriver::new(HeadlessAudio::new(), Box::new(NoRetry), &config, cd);
//! if snd.init() == InitStatus::Success {
//!     let pos = snd.get_position();
//!     let mut window = snd.begin_painting().unwrap();
//!     window.buffer_mut().fill(0);
//!     window.submit().unwrap();
//!     # let _ = pos;
//! }
//!
//! let mut vid = SurfaceManager::new(HeadlessDisplay::new());
//! let info = vid.init(320, 240).unwrap();
//! vid.set_palette(&[0u8; 1024]).unwrap();
//! # let _ = info;
//! vid.shutdown();
//! snd.shutdown();
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;

#[cfg(feature = "cdaudio")]
pub mod cdaudio; // CD transport stub
#[cfg(feature = "display")]
pub mod display; // Fullscreen surfaces
#[cfg(feature = "sound")]
pub mod sound; // Ring buffer sound driver
#[cfg(all(windows, feature = "native"))]
pub mod win32; // Native DirectSound / DirectDraw

#[cfg(feature = "display")]
use display::DdError;
#[cfg(feature = "sound")]
use sound::DsError;

/// Error types for media backend operations
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Native subsystem absent or held by another process
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Native library or one of its entry points could not be resolved
    #[error("Library missing: {0}")]
    LibraryMissing(String),

    /// Requested format, mode or capability not supported
    #[error("Negotiation failed: {0}")]
    Negotiation(String),

    /// Hardware buffer or surface stayed lost for every attempt
    #[error("Buffer lost after {attempts} restore attempts")]
    BufferLost {
        /// Number of attempts made before giving up
        attempts: u32,
    },

    /// DirectSound error code
    #[cfg(feature = "sound")]
    #[error("DirectSound error: {0}")]
    Sound(#[from] DsError),

    /// DirectDraw error code
    #[cfg(feature = "display")]
    #[error("DirectDraw error: {0}")]
    Display(#[from] DdError),

    /// Component disabled by configuration
    #[error("Disabled by configuration: {0}")]
    Disabled(&'static str),

    /// Operation requires an initialised component
    #[error("Not initialized: {0}")]
    NotInitialized(&'static str),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// IO error from filesystem
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON configuration
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for failures the engine may recover from by asking again later
    /// (device busy, transient buffer loss).
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::DeviceUnavailable(_) | Error::BufferLost { .. })
    }
}

impl From<String> for Error {
    /// Converts a String into `Error::Other`.
    ///
    /// Prefer the specific variants where the failure class is known.
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

/// Result type for media backend operations
pub type Result<T> = std::result::Result<T, Error>;

// Public API exports
pub use config::{ConfigSource, MediaConfig, RatePolicy};

#[cfg(feature = "cdaudio")]
pub use cdaudio::{CdAudio, CdDrive, NullCdDrive, RemapTable};
#[cfg(feature = "display")]
pub use display::{FakePalette, HeadlessDisplay, OffscreenInfo, SurfaceManager};
#[cfg(feature = "sound")]
pub use sound::{DmaInfo, HeadlessAudio, InitStatus, PaintWindow, SoundDriver};
