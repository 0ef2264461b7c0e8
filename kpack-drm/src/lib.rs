#![cfg_attr(docsrs, feature(doc_cfg))]

//! This crate turns content keys issued by a key management service into the
//! signaling needed to package media for Widevine, PlayReady and FairPlay at
//! the same time.
//!
//! - [`kid`]: key id conversions between hex, dashed uuid and base64.
//! - [`pssh`]: `pssh` box framing plus the Widevine and PlayReady payloads.
//! - [`fairplay`]: HLS key uris for FairPlay Streaming.
//! - [`Packager`]: fetches keys through a [`KeyProvider`] and assembles a
//!   [`ContentPackagingInfo`] for every requested track type.
//!
//! # Optional Features
//!
//! - **parallel** (default): build tracks on the rayon thread pool.

pub mod fairplay;
pub mod kid;
pub mod pssh;

mod error;
mod packaging;
mod provider;
mod reader;
mod types;

pub use error::{Error, Result};
pub use kid::KeyId;
pub use packaging::{ContentPackagingInfo, MultiDrmInfo, Packager, PackagingOptions};
pub use provider::{
    KeyProvider, KeyProviderError, KeyProviderErrorKind, StaticKeyProvider, TrackKey,
};
pub use types::{DrmType, EncryptionScheme, TrackType};
