use crate::{kms::CpixKeyProvider, output};
use anyhow::{Result, bail};
use clap::Args;
use kpack_drm::{
    ContentPackagingInfo, DrmType, EncryptionScheme, KeyId, KeyProvider, Packager,
    PackagingOptions, StaticKeyProvider, TrackKey, TrackType,
    fairplay::{DEFAULT_URI_TEMPLATE, FairPlayUri},
    kid,
};
use log::info;
use std::{fs, path::PathBuf, time::Duration};

#[derive(Args, Clone, Debug)]
/// Fetch content keys and print multi-DRM packaging info as json.
pub struct Package {
    /// Content id the keys are issued for.
    #[arg(short, long, value_name = "ID")]
    content_id: String,

    /// DRM systems to build signaling for.
    #[arg(
        short,
        long = "drm",
        value_name = "DRM",
        value_delimiter = ',',
        default_values_t = DrmType::ALL
    )]
    drm_types: Vec<DrmType>,

    /// Track types to request keys for, in output order.
    #[arg(short, long = "track", value_name = "TRACK", value_delimiter = ',', default_value = "HD")]
    track_types: Vec<TrackType>,

    /// Protection scheme (cenc, cens, cbc1, cbcs).
    #[arg(short, long, default_value_t = EncryptionScheme::Cenc)]
    scheme: EncryptionScheme,

    /// CPIX key server url. The token is appended to it.
    #[arg(long, env = "KPACK_KMS_URL", value_name = "URL")]
    kms_url: Option<String>,

    /// Key server access token.
    #[arg(long, env = "KPACK_KMS_TOKEN", value_name = "TOKEN", hide_env_values = true)]
    kms_token: Option<String>,

    /// Key server request timeout.
    #[arg(long, default_value_t = 30, value_name = "SECONDS")]
    timeout: u64,

    /// Use already issued key material instead of a key server.
    /// Key and iv may be hex or base64.
    ///
    /// This option can be used multiple times.
    #[arg(short, long = "key", value_name = "TRACK=KID:KEY:IV", value_parser = parse_key)]
    keys: Vec<(TrackType, TrackKey)>,

    /// Provider name written into Widevine pssh data.
    #[arg(long, value_name = "NAME")]
    widevine_provider: Option<String>,

    /// Do not write the content id into Widevine pssh data.
    #[arg(long)]
    no_widevine_content_id: bool,

    /// PlayReady license acquisition url.
    #[arg(long, value_name = "URL")]
    playready_la_url: Option<String>,

    /// PlayReady license user interface url.
    #[arg(long, value_name = "URL")]
    playready_lui_url: Option<String>,

    /// FairPlay key uri template, {key_id} and {key_id_hex} are substituted.
    #[arg(long, value_name = "TEMPLATE", default_value = DEFAULT_URI_TEMPLATE)]
    fairplay_uri: String,

    /// Write json to this file.
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Write json to <CONTENT_ID>.json in the current directory.
    #[arg(long, conflicts_with = "output")]
    save: bool,

    /// Build tracks one after another.
    #[arg(long)]
    single_thread: bool,
}

impl Package {
    fn options(&self) -> Result<PackagingOptions> {
        let mut options = PackagingOptions::new()
            .widevine_content_id(!self.no_widevine_content_id)
            .fairplay_uri(FairPlayUri::new(self.fairplay_uri.as_str())?)
            .parallel(!self.single_thread);

        if let Some(provider) = &self.widevine_provider {
            options = options.widevine_provider(provider.as_str());
        }

        if let Some(url) = &self.playready_la_url {
            options = options.playready_la_url(url.as_str());
        }

        if let Some(url) = &self.playready_lui_url {
            options = options.playready_lui_url(url.as_str());
        }

        Ok(options)
    }

    fn assemble<P: KeyProvider>(&self, provider: P) -> Result<ContentPackagingInfo> {
        Ok(Packager::with_options(provider, self.options()?).assemble(
            &self.content_id,
            &self.drm_types,
            self.scheme,
            &self.track_types,
        )?)
    }

    pub fn execute(self) -> Result<()> {
        let info = if self.keys.is_empty() {
            let (Some(url), Some(token)) = (&self.kms_url, &self.kms_token) else {
                bail!("Key server url and token are required unless key material is given with --key.");
            };
            let provider = CpixKeyProvider::new(url, token, Duration::from_secs(self.timeout))?;
            self.assemble(provider)?
        } else {
            let mut provider = StaticKeyProvider::new(self.content_id.as_str());

            for (track_type, key) in &self.keys {
                provider.insert(*track_type, key.clone());
            }

            self.assemble(provider)?
        };

        let json = output::to_json(&info)?;
        let path = if self.save {
            Some(PathBuf::from(format!("{}.json", self.content_id)))
        } else {
            self.output.clone()
        };

        println!("{}", json);

        if let Some(path) = path {
            fs::write(&path, &json)?;
            info!("Saved packaging info to {}", path.display());
        }

        info!(
            "Packaged {} track(s) of content '{}'.",
            info.multi_drm_infos.len(),
            info.content_id
        );
        Ok(())
    }
}

fn parse_key(value: &str) -> Result<(TrackType, TrackKey)> {
    let Some((track_type, material)) = value.split_once('=') else {
        bail!("Expected 'TRACK=KID:KEY:IV' but found '{}'.", value);
    };

    let parts = material.split(':').collect::<Vec<_>>();
    let [key_id, key, iv] = parts.as_slice() else {
        bail!("Expected 'KID:KEY:IV' after '{}=' but found '{}'.", track_type, material);
    };

    Ok((
        track_type.parse()?,
        TrackKey::new(KeyId::parse(key_id)?, parse_16(key)?, parse_16(iv)?),
    ))
}

fn parse_16(value: &str) -> Result<[u8; 16]> {
    Ok(kid::decode_hex_16(value).or_else(|_| kid::decode_base64_16(value))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_hex() {
        let (track_type, key) = parse_key(
            "hd=12345678-1234-1234-1234-123456789abc:100b6c20940f779a4589152b57d2dacb:00000000000000000000000000000001",
        )
        .unwrap();

        assert_eq!(track_type, TrackType::Hd);
        assert_eq!(key.key_id.uuid(), "12345678-1234-1234-1234-123456789abc");
        assert_eq!(key.iv[15], 1);
    }

    #[test]
    fn test_parse_key_base64() {
        let (track_type, key) = parse_key(
            "AUDIO=ABEiM0RVZneImaq7zN3u/w==:ABEiM0RVZneImaq7zN3u/w==:ABEiM0RVZneImaq7zN3u/w==",
        )
        .unwrap();

        assert_eq!(track_type, TrackType::Audio);
        assert_eq!(key.key_id.hex(), "00112233445566778899aabbccddeeff");
        assert_eq!(key.key[0], 0x00);
        assert_eq!(key.key[15], 0xff);
    }

    #[test]
    fn test_parse_key_invalid() {
        assert!(parse_key("hd").is_err());
        assert!(parse_key("hd=00112233445566778899aabbccddeeff").is_err());
        assert!(parse_key("xl=00112233445566778899aabbccddeeff:00:00").is_err());
    }
}
