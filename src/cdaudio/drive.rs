//! CD drive capability
//!
//! [`CdAudio`](super::CdAudio) keeps all transport bookkeeping itself and only
//! calls into a drive for the hardware side. No transport protocol is
//! implemented here: [`NullCdDrive`] never finds a disc, and
//! [`HeadlessCdDrive`] is an in-memory stand-in with a fixed track count.

use crate::Result;
use parking_lot::Mutex;
use std::sync::Arc;

/// Table of contents of an audio disc
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscInfo {
    /// Highest playable track number
    pub max_track: u8,
}

/// Hardware side of CD audio playback
pub trait CdDrive: Send {
    /// Read the disc's table of contents. `None` means no disc or no music tracks.
    fn disc_info(&mut self) -> Option<DiscInfo>;

    /// Start playing physical `track` at `volume` (0.0 to 1.0)
    fn play(&mut self, track: u8, volume: f32) -> Result<()>;

    /// Stop playback
    fn stop(&mut self) -> Result<()>;

    /// Pause playback, keeping position
    fn pause(&mut self) -> Result<()>;

    /// Resume paused playback
    fn resume(&mut self) -> Result<()>;

    /// Open the tray
    fn eject(&mut self);

    /// Close the tray
    fn close_door(&mut self);

    /// Report (once) that the current track reached its end
    fn poll_track_finished(&mut self) -> bool {
        false
    }

    /// Release the device on shutdown
    fn release(&mut self) {}
}

/// Drive that never has a disc; every command is accepted and ignored
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCdDrive;

impl CdDrive for NullCdDrive {
    fn disc_info(&mut self) -> Option<DiscInfo> {
        log::debug!("CDAudio: no music tracks");
        None
    }

    fn play(&mut self, _track: u8, _volume: f32) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        Ok(())
    }

    fn eject(&mut self) {}

    fn close_door(&mut self) {}
}

/// Observable state of a [`HeadlessCdDrive`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeadlessCdState {
    /// Track count reported by `disc_info` (0 = no disc)
    pub tracks: u8,
    /// Tray open
    pub tray_open: bool,
    /// Physical track currently spinning
    pub current: Option<u8>,
    /// Paused
    pub paused: bool,
    /// Volume passed to the last `play`
    pub volume: f32,
    /// Every physical track passed to `play`, in order
    pub played: Vec<u8>,
    /// Pending end-of-track notification
    pub finished: bool,
    /// `release` was called
    pub released: bool,
}

/// In-memory drive with a fixed number of audio tracks
#[derive(Debug, Clone)]
pub struct HeadlessCdDrive {
    state: Arc<Mutex<HeadlessCdState>>,
}

impl HeadlessCdDrive {
    /// Drive holding a disc with `tracks` audio tracks
    pub fn with_tracks(tracks: u8) -> Self {
        HeadlessCdDrive {
            state: Arc::new(Mutex::new(HeadlessCdState {
                tracks,
                ..HeadlessCdState::default()
            })),
        }
    }

    /// Shared handle for observing the drive after it is moved into `CdAudio`
    pub fn probe(&self) -> Arc<Mutex<HeadlessCdState>> {
        Arc::clone(&self.state)
    }

    /// Make the current track end; picked up by the next `CdAudio::update`
    pub fn finish_track(&self) {
        self.state.lock().finished = true;
    }
}

impl CdDrive for HeadlessCdDrive {
    fn disc_info(&mut self) -> Option<DiscInfo> {
        let state = self.state.lock();
        if state.tray_open || state.tracks == 0 {
            return None;
        }
        Some(DiscInfo {
            max_track: state.tracks,
        })
    }

    fn play(&mut self, track: u8, volume: f32) -> Result<()> {
        let mut state = self.state.lock();
        if track == 0 || track > state.tracks {
            return Err(format!("track {track} not on disc").into());
        }
        state.current = Some(track);
        state.paused = false;
        state.volume = volume;
        state.played.push(track);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.current = None;
        state.paused = false;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.state.lock().paused = true;
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        self.state.lock().paused = false;
        Ok(())
    }

    fn eject(&mut self) {
        let mut state = self.state.lock();
        state.tray_open = true;
        state.current = None;
    }

    fn close_door(&mut self) {
        self.state.lock().tray_open = false;
    }

    fn poll_track_finished(&mut self) -> bool {
        std::mem::take(&mut self.state.lock().finished)
    }

    fn release(&mut self) {
        self.state.lock().released = true;
    }
}
