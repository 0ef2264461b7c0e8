use crate::{Error, fairplay, pssh};
use serde::Serialize;
use std::{fmt, str::FromStr};

/// DRM systems that signaling can be produced for.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DrmType {
    Widevine,
    PlayReady,
    FairPlay,
}

impl DrmType {
    pub const ALL: [DrmType; 3] = [Self::Widevine, Self::PlayReady, Self::FairPlay];

    /// Protection system id registered for this DRM system.
    pub fn system_id(&self) -> [u8; 16] {
        match self {
            Self::Widevine => pssh::WIDEVINE_SYSTEM_ID,
            Self::PlayReady => pssh::PLAYREADY_SYSTEM_ID,
            Self::FairPlay => fairplay::FAIRPLAY_SYSTEM_ID,
        }
    }
}

impl fmt::Display for DrmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Widevine => "widevine",
                Self::PlayReady => "playready",
                Self::FairPlay => "fairplay",
            }
        )
    }
}

impl FromStr for DrmType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "widevine" | "wv" => Ok(Self::Widevine),
            "playready" | "pr" => Ok(Self::PlayReady),
            "fairplay" | "fp" => Ok(Self::FairPlay),
            x => Err(Error::Validation(format!("unknown drm type '{x}'"))),
        }
    }
}

/// Track categories a content key can be issued for.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum TrackType {
    #[serde(rename = "ALL_TRACKS")]
    All,
    #[serde(rename = "AUDIO")]
    Audio,
    #[serde(rename = "SD")]
    Sd,
    #[serde(rename = "HD")]
    Hd,
    #[serde(rename = "UHD1")]
    Uhd1,
    #[serde(rename = "UHD2")]
    Uhd2,
}

impl TrackType {
    /// Name used by key servers for the intended track type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "ALL_TRACKS",
            Self::Audio => "AUDIO",
            Self::Sd => "SD",
            Self::Hd => "HD",
            Self::Uhd1 => "UHD1",
            Self::Uhd2 => "UHD2",
        }
    }
}

impl fmt::Display for TrackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ALL" | "ALL_TRACKS" => Ok(Self::All),
            "AUDIO" => Ok(Self::Audio),
            "SD" => Ok(Self::Sd),
            "HD" => Ok(Self::Hd),
            "UHD1" => Ok(Self::Uhd1),
            "UHD2" => Ok(Self::Uhd2),
            x => Err(Error::Validation(format!("unknown track type '{x}'"))),
        }
    }
}

/// Common encryption protection schemes.
///
/// | Scheme | Cipher Mode | Pattern |
/// |--------|-------------|---------|
/// | `cenc` | AES-128-CTR | full sample |
/// | `cens` | AES-128-CTR | subsample pattern |
/// | `cbc1` | AES-128-CBC | full sample |
/// | `cbcs` | AES-128-CBC | 1:9 pattern |
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionScheme {
    #[default]
    Cenc,
    Cens,
    Cbc1,
    Cbcs,
}

impl EncryptionScheme {
    pub fn fourcc(&self) -> [u8; 4] {
        match self {
            Self::Cenc => *b"cenc",
            Self::Cens => *b"cens",
            Self::Cbc1 => *b"cbc1",
            Self::Cbcs => *b"cbcs",
        }
    }

    pub fn uses_ctr(&self) -> bool {
        matches!(self, Self::Cenc | Self::Cens)
    }
}

impl fmt::Display for EncryptionScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fourcc = self.fourcc();
        f.write_str(std::str::from_utf8(&fourcc).unwrap_or("????"))
    }
}

impl FromStr for EncryptionScheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cenc" => Ok(Self::Cenc),
            "cens" => Ok(Self::Cens),
            "cbc1" => Ok(Self::Cbc1),
            "cbcs" => Ok(Self::Cbcs),
            x => Err(Error::Validation(format!(
                "unsupported protection scheme '{x}' (supported: cenc, cens, cbc1, cbcs)"
            ))),
        }
    }
}
