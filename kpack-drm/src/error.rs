//! Error types for key packaging.

use crate::{
    provider::KeyProviderError,
    types::{DrmType, TrackType},
};
use thiserror::Error;

/// Errors that can occur while turning issued key material into DRM signaling.
#[derive(Debug, Error)]
pub enum Error {
    /// Input could not be decoded (bad hex, bad base64, wrong length).
    #[error("invalid {what}: {reason}")]
    Format { what: &'static str, reason: String },

    /// Caller supplied empty or malformed input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A builder produced data that cannot be framed.
    #[error("encoding failed: {0}")]
    Encoding(String),

    /// The key provider could not supply keys for the content.
    #[error("key provider failed for content '{content_id}': {source}")]
    KeyProvider {
        content_id: String,
        #[source]
        source: KeyProviderError,
    },

    /// A builder failed while packaging one track.
    #[error(
        "packaging track {track_type} of content '{content_id}' failed{}: {source}",
        .drm_type.map(|x| format!(" for {x}")).unwrap_or_default()
    )]
    Packaging {
        content_id: String,
        track_type: TrackType,
        drm_type: Option<DrmType>,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub(crate) fn format<T: Into<String>>(what: &'static str, reason: T) -> Self {
        Self::Format {
            what,
            reason: reason.into(),
        }
    }

    /// The innermost error, with packaging context stripped.
    pub fn root(&self) -> &Error {
        match self {
            Self::Packaging { source, .. } => source.root(),
            x => x,
        }
    }

    /// Returns true if the error is a decoding error.
    pub fn is_format(&self) -> bool {
        matches!(self.root(), Self::Format { .. })
    }

    /// Returns true if the error is caused by caller input.
    pub fn is_validation(&self) -> bool {
        matches!(self.root(), Self::Validation(_))
    }

    /// Returns true if the error is a framing error.
    pub fn is_encoding(&self) -> bool {
        matches!(self.root(), Self::Encoding(_))
    }

    /// Returns true if the error came from the key provider.
    pub fn is_key_provider(&self) -> bool {
        matches!(self.root(), Self::KeyProvider { .. })
    }
}

/// A `Result` alias where the `Err` case is `kpack_drm::Error`.
pub type Result<T> = std::result::Result<T, Error>;

