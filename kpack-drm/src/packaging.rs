//! Multi-DRM packaging.
//!
//! [`Packager::assemble`] fetches key material once per content id and builds
//! the signaling of every requested DRM system for every requested track.
//!
//! ```
//! use kpack_drm::{DrmType, EncryptionScheme, Packager, StaticKeyProvider, TrackKey, TrackType};
//!
//! let provider = StaticKeyProvider::new("content-1").key(
//!     TrackType::Hd,
//!     TrackKey::from_hex(
//!         "eb676abbcb345e96bbcf616630f1a3da",
//!         "100b6c20940f779a4589152b57d2dacb",
//!         "00000000000000000000000000000001",
//!     )?,
//! );
//!
//! let info = Packager::new(provider).assemble(
//!     "content-1",
//!     &[DrmType::Widevine, DrmType::FairPlay],
//!     EncryptionScheme::Cenc,
//!     &[TrackType::Hd],
//! )?;
//!
//! assert_eq!(info.multi_drm_infos[0].key_id, "eb676abb-cb34-5e96-bbcf-616630f1a3da");
//! assert!(info.multi_drm_infos[0].playready_pssh.is_none());
//! # Ok::<(), kpack_drm::Error>(())
//! ```

use crate::{
    DrmType, EncryptionScheme, Error, KeyProvider, KeyProviderError, Result, TrackKey, TrackType,
    fairplay::FairPlayUri,
    kid,
    pssh::{PlayReadyPssh, WidevinePssh},
};
use log::{debug, trace};
use serde::Serialize;
use std::{collections::BTreeMap, fmt};

/// Packaging result for one content id.
#[derive(Clone, Debug, Serialize)]
pub struct ContentPackagingInfo {
    pub content_id: String,
    /// One entry per requested track type, in request order.
    pub multi_drm_infos: Vec<MultiDrmInfo>,
}

/// Key material and DRM signaling for one track type.
///
/// DRM fields are `None` unless that DRM system was requested.
#[derive(Clone, Serialize)]
pub struct MultiDrmInfo {
    pub track_type: TrackType,
    /// Dashed uuid.
    pub key_id: String,
    /// Base64 of the 16 byte content key.
    pub key: String,
    /// Base64 of the 16 byte iv.
    pub iv: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub widevine_pssh: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub widevine_pssh_payload: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playready_pssh: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playready_pssh_payload: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fairplay_hls_key_uri: Option<String>,
}

impl fmt::Debug for MultiDrmInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiDrmInfo")
            .field("track_type", &self.track_type)
            .field("key_id", &self.key_id)
            .field("key", &"<redacted>")
            .field("iv", &"<redacted>")
            .field("widevine_pssh", &self.widevine_pssh)
            .field("playready_pssh", &self.playready_pssh)
            .field("fairplay_hls_key_uri", &self.fairplay_hls_key_uri)
            .finish()
    }
}

/// Settings applied to every DRM builder.
#[derive(Clone, Debug)]
pub struct PackagingOptions {
    widevine_provider: Option<String>,
    widevine_content_id: bool,
    playready_la_url: Option<String>,
    playready_lui_url: Option<String>,
    playready_custom_attributes: BTreeMap<String, String>,
    fairplay_uri: FairPlayUri,
    parallel: bool,
}

impl Default for PackagingOptions {
    fn default() -> Self {
        Self {
            widevine_provider: None,
            widevine_content_id: true,
            playready_la_url: None,
            playready_lui_url: None,
            playready_custom_attributes: BTreeMap::new(),
            fairplay_uri: FairPlayUri::default(),
            parallel: true,
        }
    }
}

impl PackagingOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider name written into Widevine pssh data.
    pub fn widevine_provider<T: Into<String>>(mut self, provider: T) -> Self {
        self.widevine_provider = Some(provider.into());
        self
    }

    /// Whether the content id is written into Widevine pssh data (default on).
    pub fn widevine_content_id(mut self, enabled: bool) -> Self {
        self.widevine_content_id = enabled;
        self
    }

    pub fn playready_la_url<T: Into<String>>(mut self, url: T) -> Self {
        self.playready_la_url = Some(url.into());
        self
    }

    pub fn playready_lui_url<T: Into<String>>(mut self, url: T) -> Self {
        self.playready_lui_url = Some(url.into());
        self
    }

    pub fn playready_custom_attribute<K: Into<String>, V: Into<String>>(
        mut self,
        name: K,
        value: V,
    ) -> Self {
        self.playready_custom_attributes
            .insert(name.into(), value.into());
        self
    }

    pub fn fairplay_uri(mut self, uri: FairPlayUri) -> Self {
        self.fairplay_uri = uri;
        self
    }

    /// Build tracks on the rayon pool (default on, needs the `parallel` feature).
    pub fn parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    Requested,
    KeyFetched,
    PerTrackBuilding,
    Assembled,
    Failed,
}

/// Assembles [`ContentPackagingInfo`] from a [`KeyProvider`].
pub struct Packager<P> {
    provider: P,
    options: PackagingOptions,
}

impl<P: KeyProvider> Packager<P> {
    pub fn new(provider: P) -> Self {
        Self::with_options(provider, PackagingOptions::default())
    }

    pub fn with_options(provider: P, options: PackagingOptions) -> Self {
        Self { provider, options }
    }

    pub fn options(&self) -> &PackagingOptions {
        &self.options
    }

    /// Fetch keys for `content_id` and build signaling for every track.
    ///
    /// Duplicate DRM or track types are collapsed, keeping the first one.
    /// Either every track is packaged or an error is returned.
    pub fn assemble(
        &self,
        content_id: &str,
        drm_types: &[DrmType],
        scheme: EncryptionScheme,
        track_types: &[TrackType],
    ) -> Result<ContentPackagingInfo> {
        let result = self.assemble_inner(content_id, drm_types, scheme, track_types);

        if let Err(e) = &result {
            transition(content_id, State::Failed);
            debug!("packaging content '{content_id}' failed: {e}");
        }

        result
    }

    fn assemble_inner(
        &self,
        content_id: &str,
        drm_types: &[DrmType],
        scheme: EncryptionScheme,
        track_types: &[TrackType],
    ) -> Result<ContentPackagingInfo> {
        transition(content_id, State::Requested);

        if content_id.trim().is_empty() {
            return Err(Error::Validation("content id is empty".to_owned()));
        }

        let drm_types = dedup(drm_types);
        let track_types = dedup(track_types);

        if drm_types.is_empty() {
            return Err(Error::Validation(format!(
                "no drm types requested for content '{content_id}'"
            )));
        }

        if track_types.is_empty() {
            return Err(Error::Validation(format!(
                "no track types requested for content '{content_id}'"
            )));
        }

        let mut keys = self
            .provider
            .fetch_keys(content_id, &drm_types, scheme, &track_types)
            .map_err(|x| Error::KeyProvider {
                content_id: content_id.to_owned(),
                source: x,
            })?;
        transition(content_id, State::KeyFetched);

        let mut track_keys = Vec::with_capacity(track_types.len());

        for track_type in &track_types {
            let key = keys.remove(track_type).ok_or_else(|| Error::KeyProvider {
                content_id: content_id.to_owned(),
                source: KeyProviderError::malformed(format!(
                    "response has no key for track {track_type}"
                )),
            })?;
            track_keys.push((*track_type, key));
        }

        // Keys for tracks nobody asked for are dropped (and wiped) here.
        drop(keys);

        transition(content_id, State::PerTrackBuilding);
        let multi_drm_infos = self.build_tracks(content_id, &drm_types, scheme, track_keys)?;
        transition(content_id, State::Assembled);

        Ok(ContentPackagingInfo {
            content_id: content_id.to_owned(),
            multi_drm_infos,
        })
    }

    #[cfg(feature = "parallel")]
    fn build_tracks(
        &self,
        content_id: &str,
        drm_types: &[DrmType],
        scheme: EncryptionScheme,
        track_keys: Vec<(TrackType, TrackKey)>,
    ) -> Result<Vec<MultiDrmInfo>> {
        use rayon::prelude::*;

        let options = &self.options;

        if options.parallel && track_keys.len() > 1 {
            return track_keys
                .into_par_iter()
                .map(|(track_type, key)| {
                    options.build_track(content_id, drm_types, scheme, track_type, &key)
                })
                .collect();
        }

        track_keys
            .into_iter()
            .map(|(track_type, key)| {
                options.build_track(content_id, drm_types, scheme, track_type, &key)
            })
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn build_tracks(
        &self,
        content_id: &str,
        drm_types: &[DrmType],
        scheme: EncryptionScheme,
        track_keys: Vec<(TrackType, TrackKey)>,
    ) -> Result<Vec<MultiDrmInfo>> {
        if self.options.parallel && track_keys.len() > 1 {
            trace!("built without the parallel feature, building tracks one by one");
        }

        track_keys
            .into_iter()
            .map(|(track_type, key)| {
                self.options
                    .build_track(content_id, drm_types, scheme, track_type, &key)
            })
            .collect()
    }
}

impl PackagingOptions {
    fn build_track(
        &self,
        content_id: &str,
        drm_types: &[DrmType],
        scheme: EncryptionScheme,
        track_type: TrackType,
        key: &TrackKey,
    ) -> Result<MultiDrmInfo> {
        trace!(
            "building {} signaling for track {track_type} (kid {})",
            drm_types.len(),
            key.key_id
        );

        let mut info = MultiDrmInfo {
            track_type,
            key_id: key.key_id.uuid(),
            key: kid::encode_base64(key.key),
            iv: kid::encode_base64(key.iv),
            widevine_pssh: None,
            widevine_pssh_payload: None,
            playready_pssh: None,
            playready_pssh_payload: None,
            fairplay_hls_key_uri: None,
        };

        for drm_type in drm_types {
            self.build_drm(&mut info, content_id, *drm_type, scheme, key)
                .map_err(|x| Error::Packaging {
                    content_id: content_id.to_owned(),
                    track_type,
                    drm_type: Some(*drm_type),
                    source: Box::new(x),
                })?;
        }

        Ok(info)
    }

    fn build_drm(
        &self,
        info: &mut MultiDrmInfo,
        content_id: &str,
        drm_type: DrmType,
        scheme: EncryptionScheme,
        key: &TrackKey,
    ) -> Result<()> {
        match drm_type {
            DrmType::Widevine => {
                let mut builder = WidevinePssh::new(scheme).key_id(key.key_id);

                if self.widevine_content_id {
                    builder = builder.content_id(content_id);
                }

                if let Some(provider) = &self.widevine_provider {
                    builder = builder.provider(provider.as_str());
                }

                let pssh = builder.build()?;
                info.widevine_pssh = Some(pssh.as_base64());
                info.widevine_pssh_payload = Some(pssh.payload_base64());
            }
            DrmType::PlayReady => {
                let mut builder = PlayReadyPssh::new(key.key_id).scheme(scheme);

                if let Some(url) = &self.playready_la_url {
                    builder = builder.la_url(url.as_str());
                }

                if let Some(url) = &self.playready_lui_url {
                    builder = builder.lui_url(url.as_str());
                }

                for (name, value) in &self.playready_custom_attributes {
                    builder = builder.custom_attribute(name.as_str(), value.as_str());
                }

                let pssh = builder.build()?;
                info.playready_pssh = Some(pssh.as_base64());
                info.playready_pssh_payload = Some(pssh.payload_base64());
            }
            DrmType::FairPlay => {
                info.fairplay_hls_key_uri = Some(self.fairplay_uri.build_for(&key.key_id));
            }
        }

        Ok(())
    }
}

fn transition(content_id: &str, state: State) {
    debug!("content '{content_id}': {state:?}");
}

fn dedup<T: Copy + PartialEq>(values: &[T]) -> Vec<T> {
    let mut unique = Vec::with_capacity(values.len());

    for value in values {
        if !unique.contains(value) {
            unique.push(*value);
        }
    }

    unique
}
