//! Playback rate selection from `s_khz`

use crate::config::RatePolicy;

/// Rates the driver can request
pub const SUPPORTED_RATES: [u32; 3] = [11_025, 22_050, 44_100];

/// Pick the ring buffer's sample rate for an `s_khz` value.
///
/// Under [`RatePolicy::Legacy`] only `22` escapes the 11025 Hz fallback; a
/// warning is logged whenever that differs from what the value asks for.
pub fn select_sample_rate(khz: u32, policy: RatePolicy) -> u32 {
    let requested = match khz {
        44 => 44_100,
        22 => 22_050,
        _ => 11_025,
    };

    match policy {
        RatePolicy::Intended => requested,
        RatePolicy::Legacy => {
            let legacy = if khz == 22 { 22_050 } else { 11_025 };
            if legacy != requested {
                log::warn!(
                    "s_khz {khz} selects {legacy} Hz under the legacy rate policy \
                     (set s_rate_policy to \"intended\" for {requested} Hz)"
                );
            }
            legacy
        }
    }
}
