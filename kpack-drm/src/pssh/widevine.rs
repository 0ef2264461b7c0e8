/*
    REFERENCES
    ----------

    1. https://github.com/shaka-project/shaka-packager/blob/56e227267c9091a0f65b4d92d9064dda4557f3a7/packager/media/base/widevine_pssh_data.proto
    2. https://github.com/rlaphoenix/pywidevine/blob/master/pywidevine/pssh.py

*/

use super::{Pssh, WIDEVINE_SYSTEM_ID};
use crate::{EncryptionScheme, Error, KeyId, Result};
use prost::Message;

// Mirrors `WidevinePsshData` from widevine_pssh_data.proto. Fields 5 (track
// type) and 8 (grouped license) are deprecated and left out.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WidevinePsshData {
    #[prost(enumeration = "widevine_pssh_data::Algorithm", optional, tag = "1")]
    pub algorithm: ::core::option::Option<i32>,
    #[prost(bytes = "vec", repeated, tag = "2")]
    pub key_ids: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
    #[prost(string, optional, tag = "3")]
    pub provider: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(bytes = "vec", optional, tag = "4")]
    pub content_id: ::core::option::Option<::prost::alloc::vec::Vec<u8>>,
    #[prost(string, optional, tag = "6")]
    pub policy: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(uint32, optional, tag = "7")]
    pub crypto_period_index: ::core::option::Option<u32>,
    #[prost(uint32, optional, tag = "9")]
    pub protection_scheme: ::core::option::Option<u32>,
}

pub mod widevine_pssh_data {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Algorithm {
        Unencrypted = 0,
        Aesctr = 1,
    }
}

/// Builder for Widevine `pssh` boxes.
///
/// ```
/// use kpack_drm::{EncryptionScheme, KeyId, pssh::WidevinePssh};
///
/// let pssh = WidevinePssh::new(EncryptionScheme::Cenc)
///     .key_id(KeyId::from_hex("00112233445566778899aabbccddeeff")?)
///     .content_id("my-content")
///     .build()?;
///
/// assert_eq!(&pssh.data[4..8], b"pssh");
/// # Ok::<(), kpack_drm::Error>(())
/// ```
#[derive(Clone, Debug, Default)]
pub struct WidevinePssh {
    key_ids: Vec<KeyId>,
    content_id: Option<Vec<u8>>,
    provider: Option<String>,
    scheme: EncryptionScheme,
}

impl WidevinePssh {
    pub fn new(scheme: EncryptionScheme) -> Self {
        Self {
            scheme,
            ..Default::default()
        }
    }

    pub fn key_id(mut self, key_id: KeyId) -> Self {
        self.key_ids.push(key_id);
        self
    }

    pub fn key_ids<I: IntoIterator<Item = KeyId>>(mut self, key_ids: I) -> Self {
        self.key_ids.extend(key_ids);
        self
    }

    pub fn content_id<T: Into<Vec<u8>>>(mut self, content_id: T) -> Self {
        self.content_id = Some(content_id.into());
        self
    }

    pub fn provider<T: Into<String>>(mut self, provider: T) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn data(&self) -> Result<WidevinePsshData> {
        if self.key_ids.is_empty() {
            return Err(Error::Validation(
                "widevine pssh requires at least one key id".to_owned(),
            ));
        }

        let mut data = WidevinePsshData {
            key_ids: self.key_ids.iter().map(|x| x.as_bytes().to_vec()).collect(),
            provider: self.provider.clone(),
            content_id: self.content_id.clone(),
            protection_scheme: Some(u32::from_be_bytes(self.scheme.fourcc())),
            ..Default::default()
        };

        if self.scheme.uses_ctr() {
            data.set_algorithm(widevine_pssh_data::Algorithm::Aesctr);
        }

        Ok(data)
    }

    pub fn build(&self) -> Result<Pssh> {
        Pssh::new(WIDEVINE_SYSTEM_ID, self.data()?.encode_to_vec())
    }
}

/// Build a Widevine `pssh` box for `key_ids`.
pub fn build(
    key_ids: &[KeyId],
    content_id: Option<&[u8]>,
    scheme: EncryptionScheme,
) -> Result<Pssh> {
    let mut builder = WidevinePssh::new(scheme).key_ids(key_ids.iter().copied());

    if let Some(content_id) = content_id {
        builder = builder.content_id(content_id);
    }

    builder.build()
}

pub(super) fn parse(data: &[u8]) -> Result<Vec<KeyId>> {
    let wv = WidevinePsshData::decode(data)
        .map_err(|x| Error::format("widevine pssh data", x.to_string()))?;

    wv.key_ids.iter().map(|x| KeyId::from_bytes(x)).collect()
}
