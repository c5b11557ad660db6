//! Ring buffer sound driver
//!
//! Owns one audio device and one looping secondary buffer. An external mixer
//! polls [`SoundDriver::get_position`] for the hardware read position and
//! writes ahead of it through the window returned by
//! [`SoundDriver::begin_painting`].
//!
//! The buffer is always stereo 16-bit, [`SECONDARY_BUFFER_SIZE`] bytes long,
//! at the rate picked by [`select_sample_rate`].

pub mod device;
pub mod dma;
pub mod error;
pub mod headless;
pub mod paint;
pub mod prompt;
pub mod rate;

pub use device::{
    AudioBackend, AudioDevice, BufferCaps, BufferDesc, BufferStatus, CooperativeLevel,
    CursorPosition, DeviceCaps, DeviceCapsFlags, LockedRegion, SoundBuffer, WaveFormat,
};
pub use dma::{ring_position, DmaInfo};
pub use error::DsError;
pub use headless::{HeadlessAudio, HeadlessAudioProbe, HeadlessAudioState, HeadlessSoundBuffer};
pub use paint::PaintWindow;
pub use prompt::{NoRetry, RetryPrompt};
pub use rate::{select_sample_rate, SUPPORTED_RATES};

use crate::cdaudio::{CdAudio, CdConfig};
use crate::config::MediaConfig;
use crate::{Error, Result};

/// Secondary buffer size in bytes
pub const SECONDARY_BUFFER_SIZE: u32 = 0x10000;

/// Lock attempts made while the buffer keeps reporting itself lost
pub const MAX_LOCK_ATTEMPTS: u32 = 3;

/// Buffer type produced by a backend's device
pub type BackendBuffer<B> = <<B as AudioBackend>::Device as AudioDevice>::Buffer;

/// Outcome of [`SoundDriver::init`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStatus {
    /// Device and ring buffer are ready
    Success,
    /// Initialisation failed; the engine runs without sound
    Failure,
    /// The device is held by another process and the user declined to retry
    NotAvailable,
}

/// Sound driver over an [`AudioBackend`]
///
/// Also owns the CD transport, which is started on a successful
/// [`init`](Self::init) and stopped by [`shutdown`](Self::shutdown).
pub struct SoundDriver<B: AudioBackend> {
    backend: B,
    prompt: Box<dyn RetryPrompt>,
    config: MediaConfig,
    cd: CdAudio,
    device: Option<B::Device>,
    buffer: Option<BackendBuffer<B>>,
    dma: DmaInfo,
    start_cursor: u32,
    sample_shift: u32,
    first_time: bool,
    is_direct: bool,
    initialized: bool,
}

impl<B: AudioBackend> SoundDriver<B> {
    /// Create an uninitialised driver
    pub fn new(
        backend: B,
        prompt: Box<dyn RetryPrompt>,
        config: &MediaConfig,
        cd: CdAudio,
    ) -> Self {
        SoundDriver {
            backend,
            prompt,
            config: config.clone(),
            cd,
            device: None,
            buffer: None,
            dma: DmaInfo::default(),
            start_cursor: 0,
            sample_shift: 0,
            first_time: true,
            is_direct: false,
            initialized: false,
        }
    }

    /// Open the device and start the looping ring buffer.
    ///
    /// A driver that failed its first attempt does not touch the device on
    /// later calls. Re-initialising a running driver shuts it down first.
    pub fn init(&mut self) -> InitStatus {
        if self.initialized {
            self.shutdown();
        }

        let mut status = InitStatus::Failure;
        if self.first_time || self.is_direct {
            status = match self.init_direct() {
                Ok(()) => InitStatus::Success,
                Err(Error::DeviceUnavailable(_)) => InitStatus::NotAvailable,
                Err(e) => {
                    log::debug!("DirectSound init error: {e}");
                    InitStatus::Failure
                }
            };

            if status == InitStatus::Success {
                self.is_direct = true;
                if self.first_time {
                    log::info!("dsound init succeeded");
                }
            } else {
                self.is_direct = false;
                log::info!("*** dsound init failed ***");
            }
        }
        self.first_time = false;

        if status != InitStatus::Success {
            log::info!("*** No sound device initialized ***");
            return status;
        }

        self.initialized = true;
        if let Err(e) = self.cd.init(CdConfig::from(&self.config)) {
            log::info!("CD audio not started: {e}");
        }
        status
    }

    /// Current mixer read position in mono samples, in `[0, samples)`.
    ///
    /// 0 before `init`; the last known position if the cursor query fails.
    pub fn get_position(&mut self) -> usize {
        let Some(buffer) = self.buffer.as_ref() else {
            return 0;
        };
        match buffer.current_position() {
            Ok(cursor) => {
                self.dma.sample_pos = ring_position(
                    self.start_cursor,
                    cursor.play,
                    self.sample_shift,
                    self.dma.samples,
                );
            }
            Err(e) => log::warn!("Couldn't read sound cursor: {e}"),
        }
        self.dma.sample_pos
    }

    /// Lock the whole ring buffer for one paint cycle.
    ///
    /// A lost buffer is restored and the lock retried, up to
    /// [`MAX_LOCK_ATTEMPTS`] times; running out yields [`Error::BufferLost`]
    /// with the driver still up. Any other lock failure shuts the whole sound
    /// subsystem down.
    pub fn begin_painting(&mut self) -> Result<PaintWindow<'_, BackendBuffer<B>>> {
        let bytes = self.dma.buffer_bytes() as u32;
        let locked = {
            let buffer = self
                .buffer
                .as_mut()
                .ok_or(Error::NotInitialized("sound"))?;
            Self::check_status(buffer);
            Self::lock_whole(buffer, bytes)
        };

        match locked {
            Ok(region) => {
                let dma = self.dma;
                let buffer = self
                    .buffer
                    .as_mut()
                    .ok_or(Error::NotInitialized("sound"))?;
                Ok(PaintWindow::new(buffer, region, dma))
            }
            Err(DsError::BUFFER_LOST) => Err(Error::BufferLost {
                attempts: MAX_LOCK_ATTEMPTS,
            }),
            Err(e) => {
                log::error!("S_TransferStereo16: Lock failed with error '{}'", e.name());
                self.shutdown();
                Err(e.into())
            }
        }
    }

    /// Stop the CD and release the buffer and device. Safe to repeat.
    pub fn shutdown(&mut self) {
        self.cd.shutdown();
        self.free_sound();
        self.initialized = false;
    }

    /// Ring buffer layout for the mixer
    pub fn dma(&self) -> &DmaInfo {
        &self.dma
    }

    /// CD transport
    pub fn cd(&self) -> &CdAudio {
        &self.cd
    }

    /// CD transport, mutable (console commands)
    pub fn cd_mut(&mut self) -> &mut CdAudio {
        &mut self.cd
    }

    /// Ring buffer is up
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// The last device attempt succeeded, so `init` will try the device again
    pub fn is_direct(&self) -> bool {
        self.is_direct
    }

    fn init_direct(&mut self) -> Result<()> {
        let speed = select_sample_rate(self.config.sound_khz, self.config.rate_policy);
        self.dma = DmaInfo {
            channels: 2,
            sample_bits: 16,
            speed,
            ..DmaInfo::default()
        };

        log::info!("Initializing DirectSound");
        let device = loop {
            match self.backend.create_device() {
                Ok(device) => break device,
                Err(DsError::ALLOCATED) => {
                    if !self.prompt.retry_busy_device() {
                        log::info!("failed, hardware already in use");
                        self.dma = DmaInfo::default();
                        return Err(Error::DeviceUnavailable(
                            "sound hardware already in use".to_string(),
                        ));
                    }
                }
                Err(e) => {
                    log::info!("failed");
                    self.dma = DmaInfo::default();
                    return Err(e.into());
                }
            }
        };

        match device.caps() {
            Ok(caps) if caps.flags.contains(DeviceCapsFlags::EMULATED_DRIVER) => {
                log::info!("...no DSound driver found");
                self.dma = DmaInfo::default();
                return Err(Error::Negotiation("emulated sound driver".to_string()));
            }
            Ok(_) => {}
            Err(e) => log::warn!("*** couldn't get DS caps: {e} ***"),
        }

        self.device = Some(device);
        if let Err(e) = self.create_buffers() {
            self.free_sound();
            return Err(e);
        }
        Ok(())
    }

    fn create_buffers(&mut self) -> Result<()> {
        let device = self
            .device
            .as_mut()
            .ok_or(Error::NotInitialized("sound device"))?;

        let format = WaveFormat {
            channels: self.dma.channels,
            bits_per_sample: self.dma.sample_bits,
            samples_per_sec: self.dma.speed,
        };
        log::debug!(
            "Creating DS buffers: {} channels, {} bits, {} Hz",
            format.channels,
            format.bits_per_sample,
            format.samples_per_sec
        );

        log::debug!("...setting PRIORITY coop level");
        device.set_cooperative_level(CooperativeLevel::Priority)?;

        log::debug!("...creating secondary buffer");
        let mut buffer = device.create_buffer(&BufferDesc {
            bytes: SECONDARY_BUFFER_SIZE,
            format,
        })?;

        let caps = buffer.caps()?;
        let bytes_per_sample = u32::from(format.bits_per_sample / 8);
        let samples = (caps.buffer_bytes / bytes_per_sample) as usize;
        if !samples.is_power_of_two() {
            return Err(Error::Negotiation(format!(
                "sound buffer of {} bytes is not a power of two",
                caps.buffer_bytes
            )));
        }
        log::debug!("...using secondary sound buffer");

        buffer.play_looping()?;
        log::debug!("   {} channel(s)", format.channels);
        log::debug!("   {} bits/sample", format.bits_per_sample);
        log::debug!("   {} bytes/sec", format.avg_bytes_per_sec());

        buffer.stop()?;
        let start = buffer.current_position()?;
        buffer.play_looping()?;

        self.start_cursor = start.play;
        self.sample_shift = bytes_per_sample - 1;
        self.dma.samples = samples;
        self.dma.sample_pos = 0;
        self.dma.submission_chunk = 1;
        self.buffer = Some(buffer);
        Ok(())
    }

    fn free_sound(&mut self) {
        if let Some(device) = self.device.as_mut() {
            log::debug!("Destroying DS buffers");
            log::debug!("...setting NORMAL coop level");
            if let Err(e) = device.set_cooperative_level(CooperativeLevel::Normal) {
                log::debug!("cooperative level reset failed: {e}");
            }
        }

        if let Some(mut buffer) = self.buffer.take() {
            log::debug!("...stopping and releasing sound buffer");
            if let Err(e) = buffer.stop() {
                log::debug!("sound buffer stop failed: {e}");
            }
        }

        if self.device.take().is_some() {
            log::debug!("...releasing DS object");
        }

        self.dma = DmaInfo::default();
        self.start_cursor = 0;
        self.sample_shift = 0;
    }

    // Restore a lost buffer and restart a stopped one
    fn check_status(buffer: &mut BackendBuffer<B>) {
        let status = match buffer.status() {
            Ok(status) => status,
            Err(e) => {
                log::info!("Couldn't get sound buffer status: {e}");
                BufferStatus::empty()
            }
        };

        if status.contains(BufferStatus::BUFFER_LOST) {
            if let Err(e) = buffer.restore() {
                log::debug!("sound buffer restore failed: {e}");
            }
        }
        if !status.contains(BufferStatus::PLAYING) {
            if let Err(e) = buffer.play_looping() {
                log::debug!("sound buffer restart failed: {e}");
            }
        }
    }

    fn lock_whole(
        buffer: &mut BackendBuffer<B>,
        bytes: u32,
    ) -> std::result::Result<LockedRegion, DsError> {
        let mut attempts = 0;
        loop {
            match buffer.lock(0, bytes) {
                Ok(region) => return Ok(region),
                Err(DsError::BUFFER_LOST) => {
                    if let Err(e) = buffer.restore() {
                        log::debug!("sound buffer restore failed: {e}");
                    }
                    attempts += 1;
                    if attempts >= MAX_LOCK_ATTEMPTS {
                        log::warn!("Sound buffer still lost after {attempts} lock attempts");
                        return Err(DsError::BUFFER_LOST);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl<B: AudioBackend> Drop for SoundDriver<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<B: AudioBackend> std::fmt::Debug for SoundDriver<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundDriver")
            .field("initialized", &self.initialized)
            .field("is_direct", &self.is_direct)
            .field("dma", &self.dma)
            .field("start_cursor", &self.start_cursor)
            .field("cd", &self.cd)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdaudio::{HeadlessCdDrive, NullCdDrive};
    use crate::config::RatePolicy;

    fn driver(backend: HeadlessAudio) -> SoundDriver<HeadlessAudio> {
        SoundDriver::new(
            backend,
            Box::new(NoRetry),
            &MediaConfig::default(),
            CdAudio::new(Box::new(NullCdDrive)),
        )
    }

    #[test]
    fn test_init_layout() {
        let mut snd = driver(HeadlessAudio::new());
        assert_eq!(snd.init(), InitStatus::Success);
        let dma = *snd.dma();
        assert_eq!(dma.channels, 2);
        assert_eq!(dma.sample_bits, 16);
        assert_eq!(dma.speed, 11_025);
        assert_eq!(dma.samples, 32768);
        assert_eq!(dma.submission_chunk, 1);
        assert_eq!(dma.buffer_bytes(), SECONDARY_BUFFER_SIZE as usize);
    }

    #[test]
    fn test_rate_policy_reaches_buffer() {
        let backend = HeadlessAudio::new();
        let probe = backend.probe();
        let config = MediaConfig::default()
            .sound_khz(44)
            .rate_policy(RatePolicy::Intended);
        let mut snd = SoundDriver::new(
            backend,
            Box::new(NoRetry),
            &config,
            CdAudio::new(Box::new(NullCdDrive)),
        );
        assert_eq!(snd.init(), InitStatus::Success);
        assert_eq!(snd.dma().speed, 44_100);
        let desc = probe.state().buffer_desc.unwrap();
        assert_eq!(desc.format.samples_per_sec, 44_100);
        assert_eq!(probe.state().cooperative_level, Some(CooperativeLevel::Priority));
    }

    #[test]
    fn test_busy_device_retried_on_request() {
        let backend = HeadlessAudio::new();
        let probe = backend.probe();
        probe.set_busy(2);
        let mut snd = SoundDriver::new(
            backend,
            Box::new(|| true),
            &MediaConfig::default(),
            CdAudio::new(Box::new(NullCdDrive)),
        );
        assert_eq!(snd.init(), InitStatus::Success);
        assert_eq!(probe.state().create_attempts, 3);
    }

    #[test]
    fn test_first_failure_disables_later_attempts() {
        let backend = HeadlessAudio::new();
        let probe = backend.probe();
        probe.state().create_error = Some(DsError::NO_DRIVER);

        let mut snd = driver(backend);
        assert_eq!(snd.init(), InitStatus::Failure);
        assert!(!snd.is_direct());
        assert_eq!(snd.init(), InitStatus::Failure);
        assert_eq!(probe.state().create_attempts, 1);
    }

    #[test]
    fn test_reinit_after_success() {
        let backend = HeadlessAudio::new();
        let probe = backend.probe();
        let mut snd = driver(backend);
        assert_eq!(snd.init(), InitStatus::Success);
        assert_eq!(snd.init(), InitStatus::Success);
        assert_eq!(probe.state().create_attempts, 2);
        assert_eq!(probe.state().live_devices, 1);
        assert_eq!(probe.state().live_buffers, 1);
    }

    #[test]
    fn test_emulated_driver_fails_clean() {
        let backend = HeadlessAudio::new();
        let probe = backend.probe();
        probe.state().emulated_driver = true;
        let mut snd = driver(backend);
        assert_eq!(snd.init(), InitStatus::Failure);
        assert_eq!(probe.state().live_devices, 0);
        assert_eq!(snd.get_position(), 0);
    }

    #[test]
    fn test_caps_failure_tolerated() {
        let backend = HeadlessAudio::new();
        backend.probe().state().caps_error = Some(DsError::UNSUPPORTED);
        let mut snd = driver(backend);
        assert_eq!(snd.init(), InitStatus::Success);
    }

    #[test]
    fn test_buffer_failure_releases_device() {
        let backend = HeadlessAudio::new();
        let probe = backend.probe();
        probe.state().buffer_error = Some(DsError::OUT_OF_MEMORY);
        let mut snd = driver(backend);
        assert_eq!(snd.init(), InitStatus::Failure);
        assert_eq!(probe.state().live_devices, 0);
        assert_eq!(probe.state().live_buffers, 0);
    }

    #[test]
    fn test_odd_buffer_size_rejected() {
        let backend = HeadlessAudio::new();
        let probe = backend.probe();
        probe.state().buffer_bytes_override = Some(48_000);
        let mut snd = driver(backend);
        assert_eq!(snd.init(), InitStatus::Failure);
        assert_eq!(probe.state().live_buffers, 0);
    }

    #[test]
    fn test_start_cursor_offsets_position() {
        let backend = HeadlessAudio::new();
        let probe = backend.probe();
        let mut snd = driver(backend);
        assert_eq!(snd.init(), InitStatus::Success);
        assert_eq!(snd.get_position(), 0);
        probe.advance(400);
        assert_eq!(snd.get_position(), 200);
        assert_eq!(snd.dma().sample_pos, 200);
    }

    #[test]
    fn test_lost_buffer_exhausts_attempts() {
        let backend = HeadlessAudio::new();
        let probe = backend.probe();
        let mut snd = driver(backend);
        assert_eq!(snd.init(), InitStatus::Success);

        probe.lose_next_locks(MAX_LOCK_ATTEMPTS);
        let err = snd.begin_painting().unwrap_err();
        assert!(matches!(err, Error::BufferLost { attempts: 3 }));
        assert!(err.is_transient());
        assert!(snd.is_initialized(), "buffer loss is not terminal");
        assert!(probe.state().restores >= MAX_LOCK_ATTEMPTS);

        let window = snd.begin_painting().unwrap();
        window.submit().unwrap();
    }

    #[test]
    fn test_stopped_buffer_restarted() {
        let backend = HeadlessAudio::new();
        let probe = backend.probe();
        let mut snd = driver(backend);
        assert_eq!(snd.init(), InitStatus::Success);

        probe.state().playing = false;
        let window = snd.begin_painting().unwrap();
        drop(window);
        assert!(probe.state().playing);
    }

    #[test]
    fn test_fatal_lock_error_shuts_down() {
        let backend = HeadlessAudio::new();
        let probe = backend.probe();
        let drive = HeadlessCdDrive::with_tracks(12);
        let cd_probe = drive.clone();
        let mut snd = SoundDriver::new(
            backend,
            Box::new(NoRetry),
            &MediaConfig::default(),
            CdAudio::new(Box::new(drive)),
        );
        assert_eq!(snd.init(), InitStatus::Success);
        assert!(snd.cd().is_initialized());

        probe.fail_next_lock(DsError::INVALID_CALL);
        let err = snd.begin_painting().unwrap_err();
        assert!(matches!(err, Error::Sound(DsError::INVALID_CALL)));
        assert!(!snd.is_initialized());
        assert!(!snd.cd().is_initialized());
        assert!(cd_probe.probe().lock().released);
        assert_eq!(probe.state().live_buffers, 0);
        assert_eq!(probe.state().live_devices, 0);
        assert!(matches!(
            snd.begin_painting().unwrap_err(),
            Error::NotInitialized(_)
        ));
    }

    #[test]
    fn test_dropped_window_unlocks() {
        let backend = HeadlessAudio::new();
        let probe = backend.probe();
        let mut snd = driver(backend);
        assert_eq!(snd.init(), InitStatus::Success);

        {
            let mut window = snd.begin_painting().unwrap();
            assert_eq!(window.len(), SECONDARY_BUFFER_SIZE as usize);
            assert_eq!(window.write_samples(0, &[1, -1]), 2);
        }
        let state = probe.state();
        assert_eq!(state.locks, 1);
        assert_eq!(state.unlocks, 1);
        assert!(!state.locked);
    }

    #[test]
    fn test_shutdown_resets_normal_level() {
        let backend = HeadlessAudio::new();
        let probe = backend.probe();
        let mut snd = driver(backend);
        snd.shutdown();
        assert_eq!(snd.init(), InitStatus::Success);
        snd.shutdown();
        snd.shutdown();
        assert_eq!(probe.state().live_devices, 0);
        assert_eq!(probe.state().cooperative_level, Some(CooperativeLevel::Normal));
        assert_eq!(snd.get_position(), 0);
        assert_eq!(*snd.dma(), DmaInfo::default());
    }
}
