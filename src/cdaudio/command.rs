//! `cd` console command parsing

/// Parsed `cd` sub-command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CdCommand {
    /// `cd on`
    On,
    /// `cd off`
    Off,
    /// `cd reset`
    Reset,
    /// `cd remap [n...]`: empty lists the current overrides
    Remap(Vec<i32>),
    /// `cd close`
    Close,
    /// `cd play <track>`
    Play(i32),
    /// `cd loop <track>`
    Loop(i32),
    /// `cd stop`
    Stop,
    /// `cd pause`
    Pause,
    /// `cd resume`
    Resume,
    /// `cd eject`
    Eject,
    /// `cd info`
    Info,
    /// Anything else; ignored
    Unknown(String),
}

impl CdCommand {
    /// Parse the arguments following `cd`. Returns `None` when there is no sub-command.
    ///
    /// Sub-command names are case-insensitive; numeric arguments follow
    /// [`atoi`].
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Option<Self> {
        let (name, rest) = args.split_first()?;
        let name = name.as_ref();
        let track = || rest.first().map(|s| atoi(s.as_ref())).unwrap_or(0);

        let cmd = match name.to_ascii_lowercase().as_str() {
            "on" => CdCommand::On,
            "off" => CdCommand::Off,
            "reset" => CdCommand::Reset,
            "remap" => CdCommand::Remap(rest.iter().map(|s| atoi(s.as_ref())).collect()),
            "close" => CdCommand::Close,
            "play" => CdCommand::Play(track()),
            "loop" => CdCommand::Loop(track()),
            "stop" => CdCommand::Stop,
            "pause" => CdCommand::Pause,
            "resume" => CdCommand::Resume,
            "eject" => CdCommand::Eject,
            "info" => CdCommand::Info,
            _ => CdCommand::Unknown(name.to_string()),
        };
        Some(cmd)
    }

    /// Commands that work without a disc in the drive
    pub fn works_without_disc(&self) -> bool {
        matches!(
            self,
            CdCommand::On | CdCommand::Off | CdCommand::Reset | CdCommand::Remap(_) | CdCommand::Close
        )
    }
}

/// C `atoi`: optional whitespace, optional sign, leading digits; 0 when none.
/// Saturates instead of overflowing.
pub fn atoi(s: &str) -> i32 {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let mut value: i64 = 0;
    for b in digits.bytes().take_while(u8::is_ascii_digit) {
        value = (value * 10 + i64::from(b - b'0')).min(i64::from(i32::MAX) + 1);
    }
    if negative {
        value = -value;
    }
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atoi() {
        assert_eq!(atoi("12"), 12);
        assert_eq!(atoi("  7abc"), 7);
        assert_eq!(atoi("-3"), -3);
        assert_eq!(atoi("+4"), 4);
        assert_eq!(atoi("x"), 0);
        assert_eq!(atoi(""), 0);
        assert_eq!(atoi("99999999999"), i32::MAX);
        assert_eq!(atoi("-99999999999"), i32::MIN);
    }

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!(CdCommand::parse(&["PLAY", "3"]), Some(CdCommand::Play(3)));
        assert_eq!(CdCommand::parse(&["Loop", "x"]), Some(CdCommand::Loop(0)));
        assert_eq!(CdCommand::parse(&["play"]), Some(CdCommand::Play(0)));
        assert_eq!(CdCommand::parse::<&str>(&[]), None);
    }

    #[test]
    fn test_parse_remap_arguments() {
        assert_eq!(
            CdCommand::parse(&["remap", "4", "5", "junk"]),
            Some(CdCommand::Remap(vec![4, 5, 0]))
        );
        assert_eq!(
            CdCommand::parse(&["remap"]),
            Some(CdCommand::Remap(Vec::new()))
        );
    }

    #[test]
    fn test_disc_requirement() {
        assert!(CdCommand::On.works_without_disc());
        assert!(CdCommand::Remap(vec![]).works_without_disc());
        assert!(!CdCommand::Info.works_without_disc());
        assert!(!CdCommand::Unknown("foo".into()).works_without_disc());
    }
}
