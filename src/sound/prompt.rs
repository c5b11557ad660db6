//! User prompt for a busy audio device

/// Asked when the audio device is held by another process
pub trait RetryPrompt {
    /// `true` to try opening the device again, `false` to run without sound
    fn retry_busy_device(&mut self) -> bool;
}

/// Never retries; the driver reports the device as not available
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryPrompt for NoRetry {
    fn retry_busy_device(&mut self) -> bool {
        false
    }
}

impl<F> RetryPrompt for F
where
    F: FnMut() -> bool,
{
    fn retry_busy_device(&mut self) -> bool {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_prompt() {
        let mut answers = vec![false, true];
        let mut prompt = move || answers.pop().unwrap_or(false);
        assert!(prompt.retry_busy_device());
        assert!(!prompt.retry_busy_device());
        assert!(!prompt.retry_busy_device());
        assert!(!NoRetry.retry_busy_device());
    }
}
