//! Json view of packaging info handed to packagers and players.

use anyhow::Result;
use kpack_drm::{ContentPackagingInfo, KeyId, MultiDrmInfo, TrackType, kid};
use serde::Serialize;

#[derive(Serialize)]
struct Output<'a> {
    content_id: &'a str,
    content_key_list: Vec<ContentKey<'a>>,
}

#[derive(Serialize)]
struct ContentKey<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    track_type: Option<TrackType>,
    key_id_hex: String,
    key_id_b64: String,
    key_hex: String,
    key_b64: &'a str,
    iv_hex: String,
    iv_b64: &'a str,
    widevine: PsshPair<'a>,
    playready: PsshPair<'a>,
    fairplay: FairPlay<'a>,
}

#[derive(Serialize)]
struct PsshPair<'a> {
    pssh: Option<&'a str>,
    pssh_payload_only: Option<&'a str>,
}

#[derive(Serialize)]
struct FairPlay<'a> {
    key_uri: Option<&'a str>,
}

/// Pretty printed json of `info`.
///
/// The track type of each key is only written when more than one track was
/// packaged. Every DRM object is always present, with null members for DRM
/// systems that were not requested.
pub fn to_json(info: &ContentPackagingInfo) -> Result<String> {
    let multi_track = info.multi_drm_infos.len() > 1;
    let content_key_list = info
        .multi_drm_infos
        .iter()
        .map(|x| content_key(x, multi_track))
        .collect::<Result<Vec<_>>>()?;

    Ok(serde_json::to_string_pretty(&Output {
        content_id: &info.content_id,
        content_key_list,
    })?)
}

fn content_key(info: &MultiDrmInfo, multi_track: bool) -> Result<ContentKey<'_>> {
    let key_id = KeyId::from_hex(&info.key_id)?;
    Ok(ContentKey {
        track_type: multi_track.then_some(info.track_type),
        key_id_hex: key_id.hex(),
        key_id_b64: key_id.base64(),
        key_hex: hex::encode(kid::decode_base64_16(&info.key)?),
        key_b64: &info.key,
        iv_hex: hex::encode(kid::decode_base64_16(&info.iv)?),
        iv_b64: &info.iv,
        widevine: pair(&info.widevine_pssh, &info.widevine_pssh_payload),
        playready: pair(&info.playready_pssh, &info.playready_pssh_payload),
        fairplay: FairPlay {
            key_uri: info.fairplay_hls_key_uri.as_deref(),
        },
    })
}

fn pair<'a>(pssh: &'a Option<String>, payload: &'a Option<String>) -> PsshPair<'a> {
    PsshPair {
        pssh: pssh.as_deref(),
        pssh_payload_only: payload.as_deref(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kpack_drm::{DrmType, EncryptionScheme, Packager, StaticKeyProvider, TrackKey};
    use serde_json::Value;

    fn info(track_types: &[TrackType]) -> ContentPackagingInfo {
        let key = TrackKey::from_hex(
            "00112233445566778899aabbccddeeff",
            "100b6c20940f779a4589152b57d2dacb",
            "00000000000000000000000000000001",
        )
        .unwrap();

        Packager::new(StaticKeyProvider::new("cid").key(TrackType::All, key))
            .assemble(
                "cid",
                &[DrmType::Widevine, DrmType::FairPlay],
                EncryptionScheme::Cenc,
                track_types,
            )
            .unwrap()
    }

    #[test]
    fn test_single_track_layout() {
        let value: Value = serde_json::from_str(&to_json(&info(&[TrackType::Hd])).unwrap()).unwrap();
        let key = &value["content_key_list"][0];

        assert_eq!(value["content_id"], "cid");
        assert!(key.get("track_type").is_none());
        assert_eq!(key["key_id_hex"], "00112233445566778899aabbccddeeff");
        assert_eq!(key["key_id_b64"], "ABEiM0RVZneImaq7zN3u/w==");
        assert_eq!(key["key_hex"], "100b6c20940f779a4589152b57d2dacb");
        assert_eq!(key["iv_hex"], "00000000000000000000000000000001");
        assert!(key["widevine"]["pssh"].is_string());
        assert!(key["widevine"]["pssh_payload_only"].is_string());
        assert!(key["playready"].is_object());
        assert!(key["playready"]["pssh"].is_null());
        assert!(key["playready"]["pssh_payload_only"].is_null());
        assert_eq!(
            key["fairplay"]["key_uri"],
            "skd://00112233-4455-6677-8899-aabbccddeeff"
        );
    }

    #[test]
    fn test_multi_track_layout() {
        let value: Value =
            serde_json::from_str(&to_json(&info(&[TrackType::Sd, TrackType::Hd])).unwrap())
                .unwrap();
        let keys = value["content_key_list"].as_array().unwrap();

        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0]["track_type"], "SD");
        assert_eq!(keys[1]["track_type"], "HD");
    }
}
