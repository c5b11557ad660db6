//! Retry prompt shown when the sound hardware is busy

use crate::sound::RetryPrompt;
use windows::core::s;
use windows::Win32::Foundation::HWND;
use windows::Win32::UI::WindowsAndMessaging::{
    MessageBoxA, IDRETRY, MB_ICONEXCLAMATION, MB_RETRYCANCEL, MB_SETFOREGROUND,
};

/// Asks the user through a Retry/Cancel message box
#[derive(Debug, Clone, Copy)]
pub struct MessageBoxPrompt {
    owner: Option<HWND>,
}

impl MessageBoxPrompt {
    /// Prompt owned by `owner`, or by nothing
    pub fn new(owner: Option<HWND>) -> Self {
        MessageBoxPrompt { owner }
    }
}

impl RetryPrompt for MessageBoxPrompt {
    fn retry_busy_device(&mut self) -> bool {
        // SAFETY: both strings are static and NUL-terminated by `s!`.
        let answer = unsafe {
            MessageBoxA(
                self.owner,
                s!("The sound hardware is in use by another app.\n\n\
                    Select Retry to try to start sound again or Cancel to run with no sound."),
                s!("Sound not available"),
                MB_RETRYCANCEL | MB_SETFOREGROUND | MB_ICONEXCLAMATION,
            )
        };
        answer == IDRETRY
    }
}
