//! Key provider interface.
//!
//! Content keys are issued by an external key management service. The
//! packager only sees it through [`KeyProvider`].

use crate::{DrmType, EncryptionScheme, KeyId, Result, TrackType, kid};
use std::{
    collections::HashMap,
    fmt, ptr,
    sync::atomic::{Ordering, compiler_fence},
};
use thiserror::Error;

/// Raw key material issued for one track.
///
/// Key and iv bytes are zeroed when dropped and never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct TrackKey {
    pub key_id: KeyId,
    pub key: [u8; 16],
    pub iv: [u8; 16],
}

impl TrackKey {
    pub fn new(key_id: KeyId, key: [u8; 16], iv: [u8; 16]) -> Self {
        Self { key_id, key, iv }
    }

    /// Key material from hex (key id may be dashed).
    pub fn from_hex(key_id: &str, key: &str, iv: &str) -> Result<Self> {
        Ok(Self {
            key_id: KeyId::from_hex(key_id)?,
            key: kid::decode_hex_16(key)?,
            iv: kid::decode_hex_16(iv)?,
        })
    }

    /// Key material from base64.
    pub fn from_base64(key_id: &str, key: &str, iv: &str) -> Result<Self> {
        Ok(Self {
            key_id: KeyId::from_base64(key_id)?,
            key: kid::decode_base64_16(key)?,
            iv: kid::decode_base64_16(iv)?,
        })
    }
}

impl fmt::Debug for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackKey")
            .field("key_id", &self.key_id)
            .field("key", &"<redacted>")
            .field("iv", &"<redacted>")
            .finish()
    }
}

impl Drop for TrackKey {
    fn drop(&mut self) {
        wipe(&mut self.key);
        wipe(&mut self.iv);
        compiler_fence(Ordering::SeqCst);
    }
}

/// Zeroes `bytes` with stores the optimizer may not remove.
fn wipe(bytes: &mut [u8; 16]) {
    for byte in bytes.iter_mut() {
        // SAFETY: `byte` is a valid, aligned and exclusive reference.
        unsafe { ptr::write_volatile(byte, 0) };
    }
}

/// Category of a key provider failure.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyProviderErrorKind {
    /// Credentials were rejected.
    Auth,
    /// The service has no keys for the content.
    NotFound,
    /// The service could not be reached or timed out.
    Transport,
    /// The service answered with something unusable.
    Malformed,
}

impl fmt::Display for KeyProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Auth => "authentication failed",
                Self::NotFound => "not found",
                Self::Transport => "transport error",
                Self::Malformed => "malformed response",
            }
        )
    }
}

/// Error reported by a [`KeyProvider`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("{kind}: {message}")]
pub struct KeyProviderError {
    pub kind: KeyProviderErrorKind,
    pub message: String,
}

impl KeyProviderError {
    pub fn new<T: Into<String>>(kind: KeyProviderErrorKind, message: T) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn auth<T: Into<String>>(message: T) -> Self {
        Self::new(KeyProviderErrorKind::Auth, message)
    }

    pub fn not_found<T: Into<String>>(message: T) -> Self {
        Self::new(KeyProviderErrorKind::NotFound, message)
    }

    pub fn transport<T: Into<String>>(message: T) -> Self {
        Self::new(KeyProviderErrorKind::Transport, message)
    }

    pub fn malformed<T: Into<String>>(message: T) -> Self {
        Self::new(KeyProviderErrorKind::Malformed, message)
    }
}

/// Source of content keys.
pub trait KeyProvider {
    /// Fetch key material for every track type of `content_id`.
    ///
    /// Implementations may return more tracks than requested; missing ones
    /// fail the packaging request.
    fn fetch_keys(
        &self,
        content_id: &str,
        drm_types: &[DrmType],
        scheme: EncryptionScheme,
        track_types: &[TrackType],
    ) -> std::result::Result<HashMap<TrackType, TrackKey>, KeyProviderError>;
}

impl<T: KeyProvider + ?Sized> KeyProvider for &T {
    fn fetch_keys(
        &self,
        content_id: &str,
        drm_types: &[DrmType],
        scheme: EncryptionScheme,
        track_types: &[TrackType],
    ) -> std::result::Result<HashMap<TrackType, TrackKey>, KeyProviderError> {
        (**self).fetch_keys(content_id, drm_types, scheme, track_types)
    }
}

/// Provider serving pre-issued key material from memory.
///
/// ```
/// use kpack_drm::{StaticKeyProvider, TrackKey, TrackType};
///
/// let provider = StaticKeyProvider::new("content-1").key(
///     TrackType::Hd,
///     TrackKey::from_hex(
///         "eb676abbcb345e96bbcf616630f1a3da",
///         "100b6c20940f779a4589152b57d2dacb",
///         "00000000000000000000000000000001",
///     )?,
/// );
/// # Ok::<(), kpack_drm::Error>(())
/// ```
#[derive(Clone, Debug, Default)]
pub struct StaticKeyProvider {
    content_id: Option<String>,
    keys: HashMap<TrackType, TrackKey>,
}

impl StaticKeyProvider {
    /// Provider answering only for `content_id`.
    pub fn new<T: Into<String>>(content_id: T) -> Self {
        Self {
            content_id: Some(content_id.into()),
            keys: HashMap::new(),
        }
    }

    /// Provider answering for any content id.
    pub fn any_content() -> Self {
        Self::default()
    }

    pub fn key(mut self, track_type: TrackType, key: TrackKey) -> Self {
        self.keys.insert(track_type, key);
        self
    }

    pub fn insert(&mut self, track_type: TrackType, key: TrackKey) {
        self.keys.insert(track_type, key);
    }
}

impl KeyProvider for StaticKeyProvider {
    fn fetch_keys(
        &self,
        content_id: &str,
        _drm_types: &[DrmType],
        _scheme: EncryptionScheme,
        track_types: &[TrackType],
    ) -> std::result::Result<HashMap<TrackType, TrackKey>, KeyProviderError> {
        if let Some(x) = &self.content_id {
            if x != content_id {
                return Err(KeyProviderError::not_found(format!(
                    "no keys issued for content '{content_id}'"
                )));
            }
        }

        let mut keys = HashMap::new();

        for track_type in track_types {
            // A key issued for all tracks serves any track without its own key.
            let key = self
                .keys
                .get(track_type)
                .or_else(|| self.keys.get(&TrackType::All))
                .ok_or_else(|| {
                    KeyProviderError::not_found(format!("no key issued for track {track_type}"))
                })?;
            keys.insert(*track_type, key.clone());
        }

        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::ManuallyDrop;

    #[test]
    fn test_drop_wipes_key_material() {
        let mut key = ManuallyDrop::new(
            TrackKey::from_hex(
                "eb676abbcb345e96bbcf616630f1a3da",
                "100b6c20940f779a4589152b57d2dacb",
                "00000000000000000000000000000001",
            )
            .unwrap(),
        );

        // SAFETY: `key` is not used as a `TrackKey` again, only its bytes are read.
        unsafe { ManuallyDrop::drop(&mut key) };

        assert_eq!(key.key, [0; 16]);
        assert_eq!(key.iv, [0; 16]);
        assert_eq!(key.key_id.hex(), "eb676abbcb345e96bbcf616630f1a3da");
    }
}
