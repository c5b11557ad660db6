//! CD audio transport
//!
//! Tracks what the engine believes the CD player is doing: enabled, disc
//! present, current track, looping and the user's remap table. Hardware calls
//! go through a [`CdDrive`]; with the default [`NullCdDrive`] no disc is ever
//! found, so every play request fails closed.

pub mod command;
pub mod drive;
pub mod remap;

pub use command::{atoi, CdCommand};
pub use drive::{CdDrive, DiscInfo, HeadlessCdDrive, HeadlessCdState, NullCdDrive};
pub use remap::{RemapTable, REMAP_ENTRIES};

use crate::config::MediaConfig;
use crate::{Error, Result};

/// Settings consumed by [`CdAudio`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CdConfig {
    /// `cd_nocd`
    pub disabled: bool,
    /// `cd_loopcount`
    pub loop_count: u32,
    /// `cd_looptrack`
    pub loop_track: i32,
    /// `cd_volume`
    pub volume: f32,
}

impl Default for CdConfig {
    fn default() -> Self {
        CdConfig::from(&MediaConfig::default())
    }
}

impl From<&MediaConfig> for CdConfig {
    fn from(cfg: &MediaConfig) -> Self {
        CdConfig {
            disabled: cfg.cd_disabled,
            loop_count: cfg.cd_loop_count,
            loop_track: cfg.cd_loop_track,
            volume: cfg.cd_volume.clamp(0.0, 1.0),
        }
    }
}

/// CD transport state plus the drive it controls
pub struct CdAudio {
    drive: Box<dyn CdDrive>,
    config: CdConfig,
    remap: RemapTable,
    initialized: bool,
    enabled: bool,
    cd_valid: bool,
    playing: bool,
    was_playing: bool,
    play_looping: bool,
    play_track: u8,
    max_track: u8,
    loop_counter: u32,
}

impl std::fmt::Debug for CdAudio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CdAudio")
            .field("initialized", &self.initialized)
            .field("enabled", &self.enabled)
            .field("cd_valid", &self.cd_valid)
            .field("playing", &self.playing)
            .field("was_playing", &self.was_playing)
            .field("play_looping", &self.play_looping)
            .field("play_track", &self.play_track)
            .field("max_track", &self.max_track)
            .field("loop_counter", &self.loop_counter)
            .finish_non_exhaustive()
    }
}

impl CdAudio {
    /// Wrap `drive`; nothing happens until [`init`](Self::init)
    pub fn new(drive: Box<dyn CdDrive>) -> Self {
        CdAudio {
            drive,
            config: CdConfig::default(),
            remap: RemapTable::identity(),
            initialized: false,
            enabled: false,
            cd_valid: false,
            playing: false,
            was_playing: false,
            play_looping: false,
            play_track: 0,
            max_track: 0,
            loop_counter: 0,
        }
    }

    /// Bring up the CD subsystem.
    ///
    /// Fails with [`Error::Disabled`] when `cd_nocd` is set. Without a disc
    /// the subsystem still initialises, but stays disabled until `cd on`.
    pub fn init(&mut self, config: CdConfig) -> Result<()> {
        self.config = config;
        if config.disabled {
            return Err(Error::Disabled("cd_nocd"));
        }

        self.remap.reset();
        self.initialized = true;
        self.enabled = true;

        if !self.probe_disc() {
            self.cd_valid = false;
            self.enabled = false;
        }

        log::info!("CD Audio Initialized");
        Ok(())
    }

    /// Stop playback and release the drive. No-op when never initialised.
    pub fn shutdown(&mut self) {
        if !self.initialized {
            return;
        }
        self.stop();
        self.drive.release();
        self.initialized = false;
    }

    /// Play `track` from the start of a fresh loop count
    pub fn play(&mut self, track: i32, looping: bool) {
        if self.play_track(track, looping) {
            self.loop_counter = 0;
        }
    }

    /// Play `track` without touching the loop counter.
    ///
    /// Returns `false` when the request is rejected; playback state is then
    /// left as it was.
    pub fn play_track(&mut self, track: i32, looping: bool) -> bool {
        if !self.enabled {
            return false;
        }
        if !self.ensure_disc() {
            return false;
        }

        let physical = match self.remap.lookup(track) {
            Some(t) if t >= 1 && t <= self.max_track => t,
            _ => {
                log::debug!(
                    "CDAudio: track {track} out of range (1..={})",
                    self.max_track
                );
                return false;
            }
        };

        if self.playing {
            if self.play_track == physical {
                return true;
            }
            self.stop();
        }

        if let Err(e) = self.drive.play(physical, self.config.volume) {
            log::warn!("CDAudio: play track {physical} failed: {e}");
            return false;
        }

        self.play_looping = looping;
        self.play_track = physical;
        self.playing = true;
        true
    }

    /// Stop playback
    pub fn stop(&mut self) {
        if !self.enabled || !self.playing {
            return;
        }
        if let Err(e) = self.drive.stop() {
            log::warn!("CDAudio: stop failed: {e}");
        }
        self.was_playing = false;
        self.playing = false;
    }

    /// Pause playback; `resume` picks it up again
    pub fn pause(&mut self) {
        if !self.enabled || !self.playing {
            return;
        }
        if let Err(e) = self.drive.pause() {
            log::warn!("CDAudio: pause failed: {e}");
        }
        self.was_playing = self.playing;
        self.playing = false;
    }

    /// Resume paused playback
    pub fn resume(&mut self) {
        if !self.enabled || !self.cd_valid || !self.was_playing {
            return;
        }
        if let Err(e) = self.drive.resume() {
            log::warn!("CDAudio: resume failed: {e}");
            return;
        }
        self.playing = true;
    }

    /// Main window gained (`true`) or lost focus
    pub fn activate(&mut self, active: bool) {
        if active {
            self.resume();
        } else {
            self.pause();
        }
    }

    /// Per-frame poll; handles end-of-track reported by the drive
    pub fn update(&mut self) {
        if !self.initialized {
            return;
        }
        if self.drive.poll_track_finished() {
            self.on_track_finished();
        }
    }

    /// End-of-track handling: replay a looping track until the loop count is
    /// reached, then switch to the configured loop track.
    pub fn on_track_finished(&mut self) {
        if !self.playing {
            return;
        }
        self.playing = false;
        if !self.play_looping {
            return;
        }

        self.loop_counter += 1;
        if self.loop_counter >= self.config.loop_count {
            self.play_track(self.config.loop_track, true);
        } else {
            self.play_track(i32::from(self.play_track), true);
        }
    }

    /// Run a `cd` console command (`args` excludes the leading `cd`).
    /// Returns the lines to print on the console.
    pub fn execute<S: AsRef<str>>(&mut self, args: &[S]) -> Vec<String> {
        let mut out = Vec::new();
        let Some(cmd) = CdCommand::parse(args) else {
            return out;
        };

        if !cmd.works_without_disc() && !self.ensure_disc() {
            out.push("No CD in player.".to_string());
            return out;
        }

        match cmd {
            CdCommand::On => self.enabled = true,
            CdCommand::Off => {
                self.stop();
                self.enabled = false;
            }
            CdCommand::Reset => {
                self.enabled = true;
                self.stop();
                self.remap.reset();
                self.probe_disc();
            }
            CdCommand::Remap(values) => {
                if values.is_empty() {
                    for (n, mapped) in self.remap.overrides() {
                        out.push(format!("  {n} -> {mapped}"));
                    }
                }
                for (i, value) in values.into_iter().enumerate() {
                    // C truncation into the byte table
                    if !self.remap.set(i + 1, value as u8) {
                        log::warn!("CDAudio: remap list longer than {} entries", REMAP_ENTRIES - 1);
                        break;
                    }
                }
            }
            CdCommand::Close => self.drive.close_door(),
            CdCommand::Play(track) => self.play(track, false),
            CdCommand::Loop(track) => self.play(track, true),
            CdCommand::Stop => self.stop(),
            CdCommand::Pause => self.pause(),
            CdCommand::Resume => self.resume(),
            CdCommand::Eject => {
                self.stop();
                self.drive.eject();
                self.cd_valid = false;
            }
            CdCommand::Info => {
                out.push(format!("{} tracks", self.max_track));
                let mode = if self.play_looping { "looping" } else { "playing" };
                if self.playing {
                    out.push(format!("Currently {mode} track {}", self.play_track));
                } else if self.was_playing {
                    out.push(format!("Paused {mode} track {}", self.play_track));
                }
                out.push(format!("Volume is {:.6}", self.config.volume));
            }
            CdCommand::Unknown(name) => log::debug!("cd: unknown command '{name}'"),
        }
        out
    }

    /// Re-read the disc; returns whether a disc with music is present
    fn probe_disc(&mut self) -> bool {
        self.cd_valid = false;
        match self.drive.disc_info() {
            Some(info) if info.max_track > 0 => {
                self.max_track = info.max_track;
                self.cd_valid = true;
            }
            _ => self.max_track = 0,
        }
        self.cd_valid
    }

    fn ensure_disc(&mut self) -> bool {
        self.cd_valid || self.probe_disc()
    }

    /// Subsystem initialised and not shut down
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Commands are honoured
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// A disc with music tracks is known to be present
    pub fn is_disc_valid(&self) -> bool {
        self.cd_valid
    }

    /// Currently playing (not paused)
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Paused mid-track
    pub fn was_playing(&self) -> bool {
        self.was_playing
    }

    /// Current track is looping
    pub fn is_looping(&self) -> bool {
        self.play_looping
    }

    /// Physical track last started
    pub fn current_track(&self) -> u8 {
        self.play_track
    }

    /// Highest track on the disc (0 without a disc)
    pub fn max_track(&self) -> u8 {
        self.max_track
    }

    /// Loops completed since the last explicit `play`
    pub fn loop_counter(&self) -> u32 {
        self.loop_counter
    }

    /// The remap table
    pub fn remap(&self) -> &RemapTable {
        &self.remap
    }
}
