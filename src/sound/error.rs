//! DirectSound result codes

use std::fmt;

/// A failing DirectSound `HRESULT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DsError(pub i32);

const fn ds(code: u32) -> DsError {
    DsError(code as i32)
}

impl DsError {
    /// The buffer memory was lost and must be restored
    pub const BUFFER_LOST: DsError = ds(0x8878_0096);
    /// Call not valid for the object's current state
    pub const INVALID_CALL: DsError = ds(0x8878_0032);
    /// Invalid parameter
    pub const INVALID_PARAM: DsError = ds(0x8007_0057);
    /// Priority cooperative level required
    pub const PRIO_LEVEL_NEEDED: DsError = ds(0x8878_0046);
    /// Device already in use by another caller
    pub const ALLOCATED: DsError = ds(0x8878_000A);
    /// No driver for the device
    pub const NO_DRIVER: DsError = ds(0x8878_0078);
    /// Wave format not supported
    pub const BAD_FORMAT: DsError = ds(0x8878_0064);
    /// Buffer control not available
    pub const CONTROL_UNAVAIL: DsError = ds(0x8878_001E);
    /// Object not initialised
    pub const UNINITIALIZED: DsError = ds(0x8878_00AA);
    /// Out of memory
    pub const OUT_OF_MEMORY: DsError = ds(0x8007_000E);
    /// Not supported
    pub const UNSUPPORTED: DsError = ds(0x8000_4001);

    /// Raw `HRESULT`
    pub fn code(self) -> i32 {
        self.0
    }

    /// Symbolic name for log messages
    pub fn name(self) -> &'static str {
        match self {
            DsError::BUFFER_LOST => "DSERR_BUFFERLOST",
            DsError::INVALID_CALL => "DSERR_INVALIDCALL",
            DsError::INVALID_PARAM => "DSERR_INVALIDPARAM",
            DsError::PRIO_LEVEL_NEEDED => "DSERR_PRIOLEVELNEEDED",
            DsError::ALLOCATED => "DSERR_ALLOCATED",
            DsError::NO_DRIVER => "DSERR_NODRIVER",
            DsError::BAD_FORMAT => "DSERR_BADFORMAT",
            DsError::CONTROL_UNAVAIL => "DSERR_CONTROLUNAVAIL",
            DsError::UNINITIALIZED => "DSERR_UNINITIALIZED",
            DsError::OUT_OF_MEMORY => "DSERR_OUTOFMEMORY",
            DsError::UNSUPPORTED => "DSERR_UNSUPPORTED",
            _ => "unknown",
        }
    }
}

impl fmt::Display for DsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#010x})", self.name(), self.0)
    }
}

impl std::error::Error for DsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(DsError::BUFFER_LOST.name(), "DSERR_BUFFERLOST");
        assert_eq!(DsError::PRIO_LEVEL_NEEDED.name(), "DSERR_PRIOLEVELNEEDED");
        assert_eq!(DsError(0x1234).name(), "unknown");
    }

    #[test]
    fn test_display_includes_code() {
        let text = DsError::ALLOCATED.to_string();
        assert_eq!(text, "DSERR_ALLOCATED (0x8878000a)");
    }
}
