//! Mp4 `PSSH` box builders and parser.
//!
//! Widevine and PlayReady signaling is carried in `pssh` boxes. Both builders
//! produce their DRM specific payload and hand it to [`PsshBox`] for framing.

mod boxes;
mod parser;
pub mod playready;
pub mod widevine;

pub use boxes::{Pssh, PsshBox, build_box};
pub use parser::{ParsedPssh, SystemId, parse_boxes};
pub use playready::PlayReadyPssh;
pub use widevine::{WidevinePssh, WidevinePsshData, widevine_pssh_data};

/// `1077efec-c0b2-4d02-ace3-3c1e52e2fb4b`
pub const COMMON_SYSTEM_ID: [u8; 16] = [
    0x10, 0x77, 0xef, 0xec, 0xc0, 0xb2, 0x4d, 0x02, 0xac, 0xe3, 0x3c, 0x1e, 0x52, 0xe2, 0xfb, 0x4b,
];

/// `9a04f079-9840-4286-ab92-e65be0885f95`
pub const PLAYREADY_SYSTEM_ID: [u8; 16] = [
    0x9a, 0x04, 0xf0, 0x79, 0x98, 0x40, 0x42, 0x86, 0xab, 0x92, 0xe6, 0x5b, 0xe0, 0x88, 0x5f, 0x95,
];

/// `edef8ba9-79d6-4ace-a3c8-27dcd51d21ed`
pub const WIDEVINE_SYSTEM_ID: [u8; 16] = [
    0xed, 0xef, 0x8b, 0xa9, 0x79, 0xd6, 0x4a, 0xce, 0xa3, 0xc8, 0x27, 0xdc, 0xd5, 0x1d, 0x21, 0xed,
];
