//! DirectDraw result codes

use std::fmt;

/// A failing DirectDraw `HRESULT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DdError(pub i32);

const fn dd(code: u32) -> DdError {
    DdError((FACILITY | code) as i32)
}

const fn com(code: u32) -> DdError {
    DdError(code as i32)
}

impl DdError {
    /// Object already initialised
    pub const ALREADY_INITIALIZED: DdError = dd(5);
    /// Surface cannot be attached
    pub const CANNOT_ATTACH_SURFACE: DdError = dd(10);
    /// Surface cannot be detached
    pub const CANNOT_DETACH_SURFACE: DdError = dd(20);
    /// No support currently available
    pub const CURRENTLY_NOT_AVAIL: DdError = dd(40);
    /// Exception raised inside the driver
    pub const EXCEPTION: DdError = dd(55);
    /// Height not aligned as required
    pub const HEIGHT_ALIGN: DdError = dd(90);
    /// Primary surface format mismatch
    pub const INCOMPATIBLE_PRIMARY: DdError = dd(95);
    /// Invalid surface capabilities
    pub const INVALID_CAPS: DdError = dd(100);
    /// Invalid clip list
    pub const INVALID_CLIP_LIST: DdError = dd(110);
    /// Display mode not supported
    pub const INVALID_MODE: DdError = dd(120);
    /// Invalid object
    pub const INVALID_OBJECT: DdError = dd(130);
    /// Invalid pixel format
    pub const INVALID_PIXEL_FORMAT: DdError = dd(145);
    /// Invalid rectangle
    pub const INVALID_RECT: DdError = dd(150);
    /// Surfaces still locked
    pub const LOCKED_SURFACES: DdError = dd(160);
    /// No cooperative level set
    pub const NO_COOPERATIVE_LEVEL_SET: DdError = dd(212);
    /// Exclusive mode required
    pub const NO_EXCLUSIVE_MODE: DdError = dd(225);
    /// No flipping hardware
    pub const NO_FLIP_HW: DdError = dd(230);
    /// Requested item not found
    pub const NOT_FOUND: DdError = dd(255);
    /// Out of video memory
    pub const OUT_OF_VIDEO_MEMORY: DdError = dd(380);
    /// Palette in use
    pub const PALETTE_BUSY: DdError = dd(387);
    /// Surface in use
    pub const SURFACE_BUSY: DdError = dd(430);
    /// Surface memory was lost and must be restored
    pub const SURFACE_LOST: DdError = dd(450);
    /// Previous blit still running
    pub const WAS_STILL_DRAWING: DdError = dd(540);
    /// Device object already exists
    pub const DIRECTDRAW_ALREADY_CREATED: DdError = dd(562);
    /// No DirectDraw hardware
    pub const NO_DIRECTDRAW_HW: DdError = dd(563);
    /// Primary surface already exists
    pub const PRIMARY_SURFACE_ALREADY_EXISTS: DdError = dd(564);
    /// Another process holds exclusive mode
    pub const EXCLUSIVE_MODE_ALREADY_SET: DdError = dd(581);
    /// Surface is not part of a flip chain
    pub const NOT_FLIPPABLE: DdError = dd(582);
    /// Surface is not locked
    pub const NOT_LOCKED: DdError = dd(584);
    /// Surface created in another display mode
    pub const WRONG_MODE: DdError = dd(587);
    /// Operation not allowed on an implicitly created surface
    pub const IMPLICITLY_CREATED: DdError = dd(588);
    /// Surface has no palette
    pub const NOT_PALETTIZED: DdError = dd(589);
    /// Display mode not supported by the hardware
    pub const UNSUPPORTED_MODE: DdError = dd(590);
    /// Unspecified failure
    pub const GENERIC: DdError = com(0x8000_4005);
    /// Invalid parameters
    pub const INVALID_PARAMS: DdError = com(0x8007_0057);
    /// Out of memory
    pub const OUT_OF_MEMORY: DdError = com(0x8007_000E);
    /// Not supported
    pub const UNSUPPORTED: DdError = com(0x8000_4001);

    /// Raw `HRESULT`
    pub fn code(self) -> i32 {
        self.0
    }

    /// Symbolic name for log messages
    pub fn name(self) -> &'static str {
        match self {
            DdError::GENERIC => return "DDERR_GENERIC",
            DdError::INVALID_PARAMS => return "DDERR_INVALIDPARAMS",
            DdError::OUT_OF_MEMORY => return "DDERR_OUTOFMEMORY",
            DdError::UNSUPPORTED => return "DDERR_UNSUPPORTED",
            _ => {}
        }
        let raw = self.0 as u32;
        if raw & 0xFFFF_0000 != FACILITY {
            return "UNKNOWN";
        }
        let code = raw & 0xFFFF;
        DDERR_NAMES
            .binary_search_by_key(&code, |&(c, _)| c)
            .map_or("UNKNOWN", |i| DDERR_NAMES[i].1)
    }
}

const FACILITY: u32 = 0x8876_0000;

// Facility-local codes from ddraw.h, sorted by code
const DDERR_NAMES: &[(u32, &str)] = &[
    (5, "DDERR_ALREADYINITIALIZED"),
    (10, "DDERR_CANNOTATTACHSURFACE"),
    (20, "DDERR_CANNOTDETACHSURFACE"),
    (40, "DDERR_CURRENTLYNOTAVAIL"),
    (55, "DDERR_EXCEPTION"),
    (90, "DDERR_HEIGHTALIGN"),
    (95, "DDERR_INCOMPATIBLEPRIMARY"),
    (100, "DDERR_INVALIDCAPS"),
    (110, "DDERR_INVALIDCLIPLIST"),
    (120, "DDERR_INVALIDMODE"),
    (130, "DDERR_INVALIDOBJECT"),
    (145, "DDERR_INVALIDPIXELFORMAT"),
    (150, "DDERR_INVALIDRECT"),
    (160, "DDERR_LOCKEDSURFACES"),
    (170, "DDERR_NO3D"),
    (180, "DDERR_NOALPHAHW"),
    (205, "DDERR_NOCLIPLIST"),
    (210, "DDERR_NOCOLORCONVHW"),
    (212, "DDERR_NOCOOPERATIVELEVELSET"),
    (215, "DDERR_NOCOLORKEY"),
    (220, "DDERR_NOCOLORKEYHW"),
    (225, "DDERR_NOEXCLUSIVEMODE"),
    (230, "DDERR_NOFLIPHW"),
    (240, "DDERR_NOGDI"),
    (250, "DDERR_NOMIRRORHW"),
    (255, "DDERR_NOTFOUND"),
    (260, "DDERR_NOOVERLAYHW"),
    (280, "DDERR_NORASTEROPHW"),
    (290, "DDERR_NOROTATIONHW"),
    (310, "DDERR_NOSTRETCHHW"),
    (316, "DDERR_NOT4BITCOLOR"),
    (317, "DDERR_NOT4BITCOLORINDEX"),
    (320, "DDERR_NOT8BITCOLOR"),
    (330, "DDERR_NOTEXTUREHW"),
    (335, "DDERR_NOVSYNCHW"),
    (340, "DDERR_NOZBUFFERHW"),
    (350, "DDERR_NOZOVERLAYHW"),
    (360, "DDERR_OUTOFCAPS"),
    (380, "DDERR_OUTOFVIDEOMEMORY"),
    (382, "DDERR_OVERLAYCANTCLIP"),
    (384, "DDERR_OVERLAYCOLORKEYONLYONEACTIVE"),
    (387, "DDERR_PALETTEBUSY"),
    (400, "DDERR_COLORKEYNOTSET"),
    (410, "DDERR_SURFACEALREADYATTACHED"),
    (420, "DDERR_SURFACEALREADYDEPENDENT"),
    (430, "DDERR_SURFACEBUSY"),
    (440, "DDERR_SURFACEISOBSCURED"),
    (450, "DDERR_SURFACELOST"),
    (460, "DDERR_SURFACENOTATTACHED"),
    (470, "DDERR_TOOBIGHEIGHT"),
    (480, "DDERR_TOOBIGSIZE"),
    (490, "DDERR_TOOBIGWIDTH"),
    (510, "DDERR_UNSUPPORTEDFORMAT"),
    (520, "DDERR_UNSUPPORTEDMASK"),
    (537, "DDERR_VERTICALBLANKINPROGRESS"),
    (540, "DDERR_WASSTILLDRAWING"),
    (560, "DDERR_XALIGN"),
    (561, "DDERR_INVALIDDIRECTDRAWGUID"),
    (562, "DDERR_DIRECTDRAWALREADYCREATED"),
    (563, "DDERR_NODIRECTDRAWHW"),
    (564, "DDERR_PRIMARYSURFACEALREADYEXISTS"),
    (565, "DDERR_NOEMULATION"),
    (566, "DDERR_REGIONTOOSMALL"),
    (567, "DDERR_CLIPPERISUSINGHWND"),
    (568, "DDERR_NOCLIPPERATTACHED"),
    (569, "DDERR_NOHWND"),
    (570, "DDERR_HWNDSUBCLASSED"),
    (571, "DDERR_HWNDALREADYSET"),
    (572, "DDERR_NOPALETTEATTACHED"),
    (573, "DDERR_NOPALETTEHW"),
    (574, "DDERR_BLTFASTCANTCLIP"),
    (575, "DDERR_NOBLTHW"),
    (576, "DDERR_NODDROPSHW"),
    (577, "DDERR_OVERLAYNOTVISIBLE"),
    (578, "DDERR_NOOVERLAYDEST"),
    (579, "DDERR_INVALIDPOSITION"),
    (580, "DDERR_NOTAOVERLAYSURFACE"),
    (581, "DDERR_EXCLUSIVEMODEALREADYSET"),
    (582, "DDERR_NOTFLIPPABLE"),
    (583, "DDERR_CANTDUPLICATE"),
    (584, "DDERR_NOTLOCKED"),
    (585, "DDERR_CANTCREATEDC"),
    (586, "DDERR_NODC"),
    (587, "DDERR_WRONGMODE"),
    (588, "DDERR_IMPLICITLYCREATED"),
    (589, "DDERR_NOTPALETTIZED"),
    (590, "DDERR_UNSUPPORTEDMODE"),
];

impl fmt::Display for DdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#010x})", self.name(), self.0)
    }
}

impl std::error::Error for DdError {}
