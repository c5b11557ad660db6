#[cfg(not(all(feature = "sound", feature = "display")))]
fn main() {
    eprintln!(
        "The winmedia console requires the \"sound\" and \"display\" features. \
         Rebuild with default features to enable it."
    );
}

#[cfg(all(feature = "sound", feature = "display"))]
mod cli {
    use std::env;
    use std::io::{self, BufRead, Write};

    use anyhow::{bail, Context};
    use winmedia::cdaudio::{CdAudio, CdDrive, HeadlessCdDrive, NullCdDrive};
    use winmedia::display::{DisplayLibrary, HeadlessDisplay, SurfaceManager, PALETTE_BYTES};
    use winmedia::sound::{
        AudioBackend, HeadlessAudio, HeadlessAudioProbe, InitStatus, NoRetry, SoundDriver,
    };
    use winmedia::MediaConfig;

    /// Bytes the headless play cursor moves per position poll
    const HEADLESS_CURSOR_STEP: u32 = 1024;

    struct Options {
        config_path: Option<String>,
        tracks: u8,
        native: bool,
    }

    fn parse_args() -> anyhow::Result<Options> {
        let mut options = Options {
            config_path: None,
            tracks: 0,
            native: false,
        };
        let mut args = env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--tracks" => {
                    let value = args.next().context("--tracks needs a count")?;
                    options.tracks = value
                        .parse()
                        .with_context(|| format!("invalid track count '{value}'"))?;
                }
                "--native" => options.native = true,
                "-h" | "--help" => {
                    print_usage();
                    std::process::exit(0);
                }
                other if other.starts_with('-') => bail!("unknown option '{other}'"),
                path => options.config_path = Some(path.to_string()),
            }
        }
        Ok(options)
    }

    fn print_usage() {
        println!("Usage: winmedia [config.json] [--tracks N] [--native]");
        println!();
        println!("  config.json   media settings (cd_nocd, cd_loopcount, cd_looptrack,");
        println!("                cd_volume, s_khz, s_rate_policy)");
        println!("  --tracks N    simulate a CD with N audio tracks");
        println!("  --native      use DirectSound/DirectDraw (Windows, native feature)");
    }

    fn print_help() {
        println!("Commands:");
        println!("  cd on|off|reset|remap [n...]|close|play <n>|loop <n>|stop|pause|resume|eject|info");
        println!("  cd update              poll the drive for a finished track");
        println!("  snd init|shutdown|pos|paint|info");
        println!("  snd advance <bytes>    move the headless play cursor");
        println!("  vid init <w> <h>|shutdown|palette|fill <index>|present|info");
        println!("  quit");
    }

    pub fn run() -> anyhow::Result<()> {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .format_timestamp_millis()
            .init();

        let options = parse_args()?;
        let config = match &options.config_path {
            Some(path) => MediaConfig::load(path)
                .with_context(|| format!("failed to load config from {path}"))?,
            None => MediaConfig::default(),
        };
        log::info!("winmedia console starting");

        let drive: Box<dyn CdDrive> = if options.tracks > 0 {
            Box::new(HeadlessCdDrive::with_tracks(options.tracks))
        } else {
            Box::new(NullCdDrive)
        };
        let cd = CdAudio::new(drive);

        if options.native {
            return run_native(&config, cd);
        }

        let audio = HeadlessAudio::with_cursor_step(HEADLESS_CURSOR_STEP);
        let probe = audio.probe();
        let snd = SoundDriver::new(audio, Box::new(NoRetry), &config, cd);
        let vid = SurfaceManager::new(HeadlessDisplay::new());
        console(snd, vid, Some(probe))
    }

    #[cfg(all(windows, feature = "native"))]
    fn run_native(config: &MediaConfig, cd: CdAudio) -> anyhow::Result<()> {
        use winmedia::sound::RetryPrompt;
        use winmedia::win32::{
            default_window, DirectDrawLibrary, DirectSoundBackend, MessageBoxPrompt,
        };

        let hwnd = default_window();
        let prompt: Box<dyn RetryPrompt> = Box::new(MessageBoxPrompt::new(Some(hwnd)));
        let snd = SoundDriver::new(DirectSoundBackend::new(hwnd), prompt, config, cd);
        let vid = SurfaceManager::new(DirectDrawLibrary::new(hwnd));
        console(snd, vid, None)
    }

    #[cfg(not(all(windows, feature = "native")))]
    fn run_native(_config: &MediaConfig, _cd: CdAudio) -> anyhow::Result<()> {
        bail!("--native needs a Windows build with the \"native\" feature")
    }

    fn console<A, L>(
        mut snd: SoundDriver<A>,
        mut vid: SurfaceManager<L>,
        probe: Option<HeadlessAudioProbe>,
    ) -> anyhow::Result<()>
    where
        A: AudioBackend,
        L: DisplayLibrary,
    {
        match snd.init() {
            InitStatus::Success => log::info!("Sound initialized"),
            status => log::warn!("Sound not started: {status:?}"),
        }
        print_help();

        let stdin = io::stdin();
        let mut stdout = io::stdout();
        loop {
            print!("] ");
            stdout.flush().ok();

            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                break;
            }
            let words: Vec<&str> = line.split_whitespace().collect();
            let Some((&command, args)) = words.split_first() else {
                continue;
            };

            match command.to_ascii_lowercase().as_str() {
                "cd" => {
                    if args.first().is_some_and(|a| a.eq_ignore_ascii_case("update")) {
                        snd.cd_mut().update();
                        continue;
                    }
                    for out in snd.cd_mut().execute(args) {
                        println!("{out}");
                    }
                }
                "snd" => sound_command(&mut snd, probe.as_ref(), args),
                "vid" => video_command(&mut vid, args),
                "help" => print_help(),
                "quit" | "exit" => break,
                other => println!("Unknown command \"{other}\""),
            }
        }

        vid.shutdown();
        snd.shutdown();
        log::info!("winmedia console finished");
        Ok(())
    }

    fn sound_command<A: AudioBackend>(
        snd: &mut SoundDriver<A>,
        probe: Option<&HeadlessAudioProbe>,
        args: &[&str],
    ) {
        match args.first().copied().unwrap_or("info") {
            "init" => println!("{:?}", snd.init()),
            "shutdown" => snd.shutdown(),
            "pos" => println!("{}", snd.get_position()),
            "paint" => {
                let pos = snd.get_position();
                match snd.begin_painting() {
                    Ok(mut window) => {
                        // A short square wave just ahead of the read position
                        let tone: Vec<i16> = (0..2048)
                            .map(|i| if (i / 64) % 2 == 0 { 4000 } else { -4000 })
                            .collect();
                        let written = window.write_samples(pos, &tone);
                        match window.submit() {
                            Ok(()) => println!("painted {written} samples at {pos}"),
                            Err(e) => println!("unlock failed: {e}"),
                        }
                    }
                    Err(e) => println!("paint failed: {e}"),
                }
            }
            "advance" => match (probe, args.get(1).and_then(|s| s.parse::<u32>().ok())) {
                (Some(probe), Some(bytes)) => probe.advance(bytes),
                (None, _) => println!("cursor control needs the headless backend"),
                (_, None) => println!("usage: snd advance <bytes>"),
            },
            "info" => {
                let dma = snd.dma();
                println!(
                    "initialized: {}, {} Hz, {} ch, {} bits, {} samples, pos {}",
                    snd.is_initialized(),
                    dma.speed,
                    dma.channels,
                    dma.sample_bits,
                    dma.samples,
                    dma.sample_pos
                );
            }
            other => println!("Unknown snd command \"{other}\""),
        }
    }

    fn video_command<L: DisplayLibrary>(vid: &mut SurfaceManager<L>, args: &[&str]) {
        match args.first().copied().unwrap_or("info") {
            "init" => {
                let size = (
                    args.get(1).and_then(|s| s.parse::<u32>().ok()),
                    args.get(2).and_then(|s| s.parse::<u32>().ok()),
                );
                let (Some(width), Some(height)) = size else {
                    println!("usage: vid init <width> <height>");
                    return;
                };
                match vid.init(width, height) {
                    Ok(info) => println!("{}x{}, pitch {}", info.width, info.height, info.pitch),
                    Err(e) => println!("init failed: {e}"),
                }
            }
            "shutdown" => vid.shutdown(),
            "palette" => {
                let mut pal = [0u8; PALETTE_BYTES];
                for (i, entry) in pal.chunks_exact_mut(4).enumerate() {
                    let level = i as u8;
                    entry.copy_from_slice(&[level, level, level, 0]);
                }
                if let Err(e) = vid.set_palette(&pal) {
                    println!("palette failed: {e}");
                }
            }
            "fill" => {
                let index = args.get(1).and_then(|s| s.parse::<u8>().ok()).unwrap_or(0);
                match vid.offscreen_mut() {
                    Some(pixels) => pixels.fill(index),
                    None => println!("display not initialized"),
                }
            }
            "present" => {
                if let Err(e) = vid.present() {
                    println!("present failed: {e}");
                }
            }
            "info" => match vid.info() {
                Some(info) => println!("{}x{}, pitch {}", info.width, info.height, info.pitch),
                None => println!("display not initialized"),
            },
            other => println!("Unknown vid command \"{other}\""),
        }
    }
}

#[cfg(all(feature = "sound", feature = "display"))]
fn main() -> anyhow::Result<()> {
    cli::run()
}
