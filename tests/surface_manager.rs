#![cfg(feature = "display")]

use winmedia::display::{
    CooperativeFlags, DdError, DisplayEvent, DisplayMode, HeadlessDisplay, SurfaceManager,
    SurfaceRole, OFFSCREEN_FILL, PALETTE_BYTES,
};
use winmedia::Error;

fn exclusive() -> CooperativeFlags {
    CooperativeFlags::EXCLUSIVE | CooperativeFlags::FULLSCREEN
}

#[test]
fn palette_is_bgr_with_opaque_alpha() {
    let mut vid = SurfaceManager::new(HeadlessDisplay::new());
    vid.init(64, 48).unwrap();

    let mut pal = [0u8; PALETTE_BYTES];
    for (i, byte) in pal.iter_mut().enumerate() {
        *byte = (i * 7 % 251) as u8;
    }
    vid.set_palette(&pal).unwrap();

    let fake = vid.palette().unwrap();
    for i in 0..256 {
        let src = &pal[i * 4..i * 4 + 4];
        assert_eq!(fake.entry(i as u8), [src[2], src[1], src[0], 255], "entry {i}");
    }
}

#[test]
fn init_then_shutdown_runs_in_strict_order() {
    let display = HeadlessDisplay::new();
    let probe = display.probe();
    let mut vid = SurfaceManager::new(display);

    let info = vid.init(320, 240).unwrap();
    assert_eq!((info.width, info.height, info.pitch), (320, 240, 320));
    assert!(vid.offscreen().unwrap().iter().all(|&p| p == OFFSCREEN_FILL));

    vid.shutdown();
    vid.shutdown();

    let mode = DisplayMode {
        width: 320,
        height: 240,
        bits_per_pixel: 32,
    };
    assert_eq!(
        probe.events(),
        vec![
            DisplayEvent::LibraryLoaded,
            DisplayEvent::DeviceCreated,
            DisplayEvent::CooperativeLevel(exclusive()),
            DisplayEvent::ModeSet(mode),
            DisplayEvent::SurfaceCreated(SurfaceRole::Front),
            DisplayEvent::SurfaceCreated(SurfaceRole::Back),
            DisplayEvent::SurfaceReleased(SurfaceRole::Back),
            DisplayEvent::SurfaceReleased(SurfaceRole::Front),
            DisplayEvent::ModeRestored,
            DisplayEvent::CooperativeLevel(CooperativeFlags::NORMAL),
            DisplayEvent::DeviceReleased,
            DisplayEvent::LibraryUnloaded,
        ]
    );
    assert!(!vid.is_initialized());
    assert_eq!(vid.pitch(), 0);
}

#[test]
fn shutdown_before_init_is_harmless() {
    let display = HeadlessDisplay::new();
    let probe = display.probe();
    let mut vid = SurfaceManager::new(display);
    vid.shutdown();
    vid.shutdown();
    assert!(probe.events().is_empty());
}

#[test]
fn failed_primary_surface_tears_down_partial_state() {
    let display = HeadlessDisplay::new();
    let probe = display.probe();
    probe.state().primary_error = Some(DdError::OUT_OF_VIDEO_MEMORY);
    let mut vid = SurfaceManager::new(display);

    let err = vid.init(640, 480).unwrap_err();
    assert!(matches!(err, Error::Display(e) if e == DdError::OUT_OF_VIDEO_MEMORY));
    assert!(vid.offscreen_mut().is_none());

    let events = probe.events();
    assert!(!events
        .iter()
        .any(|e| matches!(e, DisplayEvent::SurfaceCreated(_))));
    assert_eq!(
        &events[events.len() - 4..],
        &[
            DisplayEvent::ModeRestored,
            DisplayEvent::CooperativeLevel(CooperativeFlags::NORMAL),
            DisplayEvent::DeviceReleased,
            DisplayEvent::LibraryUnloaded,
        ]
    );
    assert!(!probe.state().library_loaded);
    assert_eq!(probe.state().mode, None);
}

#[test]
fn missing_library_is_not_transient() {
    let display = HeadlessDisplay::new();
    let probe = display.probe();
    probe.state().library_missing = true;
    let mut vid = SurfaceManager::new(display);

    let err = vid.init(320, 240).unwrap_err();
    assert!(matches!(err, Error::LibraryMissing(_)));
    assert!(!err.is_transient());
    assert!(probe.events().is_empty());
}

#[test]
fn missing_entry_point_unloads_library() {
    let display = HeadlessDisplay::new();
    let probe = display.probe();
    probe.state().entry_point_missing = true;
    let mut vid = SurfaceManager::new(display);

    assert!(vid.init(320, 240).is_err());
    assert_eq!(
        probe.events(),
        vec![DisplayEvent::LibraryLoaded, DisplayEvent::LibraryUnloaded]
    );
}

#[test]
fn present_after_shutdown_is_rejected() {
    let mut vid = SurfaceManager::new(HeadlessDisplay::new());
    vid.init(16, 16).unwrap();
    vid.present().unwrap();
    vid.shutdown();
    assert!(matches!(vid.present(), Err(Error::NotInitialized(_))));
}

#[test]
fn lost_flip_chain_recovers_through_front_surface() {
    let display = HeadlessDisplay::new();
    let probe = display.probe();
    let mut vid = SurfaceManager::new(display);
    vid.init(32, 24).unwrap();

    probe.lose_surfaces(1);
    vid.present().unwrap();
    vid.present().unwrap();

    let state = probe.state();
    assert_eq!(state.restores, 1);
    assert_eq!(state.flips, 2);
    assert!(!state.chain_lost);
}
