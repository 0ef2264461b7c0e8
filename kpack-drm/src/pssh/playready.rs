/*
    REFERENCES
    ----------

    1. https://learn.microsoft.com/en-us/playready/specifications/playready-header-specification
    2. https://learn.microsoft.com/en-us/playready/specifications/mpeg-dash-playready

*/

use super::{PLAYREADY_SYSTEM_ID, Pssh};
use crate::{
    EncryptionScheme, Error, KeyId, Result,
    kid::encode_base64,
    reader::{Reader, Writer},
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const WRM_HEADER_XMLNS: &str = "http://schemas.microsoft.com/DRM/2007/03/PlayReadyHeader";
const RIGHTS_MANAGEMENT_HEADER: u16 = 1;

/// Builder for PlayReady `pssh` boxes.
///
/// Key ids are written in the little-endian GUID layout PlayReady expects,
/// so `00112233-4455-6677-8899-aabbccddeeff` becomes `MyIRAFVEd2aImaq7zN3u/w==`
/// and not the plain base64 of the key id bytes.
///
/// Ctr schemes produce a v4.0.0.0 header. Cbc schemes need v4.3.0.0, the
/// first version able to declare `AESCBC`.
#[derive(Clone, Debug)]
pub struct PlayReadyPssh {
    key_id: KeyId,
    scheme: EncryptionScheme,
    la_url: Option<String>,
    lui_url: Option<String>,
    custom_attributes: BTreeMap<String, String>,
}

impl PlayReadyPssh {
    pub fn new(key_id: KeyId) -> Self {
        Self {
            key_id,
            scheme: EncryptionScheme::Cenc,
            la_url: None,
            lui_url: None,
            custom_attributes: BTreeMap::new(),
        }
    }

    pub fn scheme(mut self, scheme: EncryptionScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// License acquisition url.
    pub fn la_url<T: Into<String>>(mut self, url: T) -> Self {
        self.la_url = Some(url.into());
        self
    }

    /// License user interface url.
    pub fn lui_url<T: Into<String>>(mut self, url: T) -> Self {
        self.lui_url = Some(url.into());
        self
    }

    pub fn custom_attribute<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.custom_attributes.insert(name.into(), value.into());
        self
    }

    /// Base64 key id as it appears inside the header.
    pub fn kid_value(&self) -> String {
        encode_base64(self.key_id.guid_le_bytes())
    }

    fn header(&self) -> WrmHeader {
        let kid = self.kid_value();
        let mut data = Data {
            la_url: self.la_url.clone(),
            lui_url: self.lui_url.clone(),
            custom_attributes: (!self.custom_attributes.is_empty())
                .then(|| self.custom_attributes.clone()),
            ..Default::default()
        };

        let version = if self.scheme.uses_ctr() {
            data.protect_info = Some(ProtectInfo {
                key_len: Some("16".to_owned()),
                alg_id: Some("AESCTR".to_owned()),
                ..Default::default()
            });
            data.kid = Some(kid);
            "4.0.0.0"
        } else {
            data.protect_info = Some(ProtectInfo {
                kids: Some(KeyIDs {
                    kids: vec![KeyID {
                        alg_id: Some("AESCBC".to_owned()),
                        value: kid,
                    }],
                }),
                ..Default::default()
            });
            "4.3.0.0"
        };

        WrmHeader {
            xmlns: Some(WRM_HEADER_XMLNS.to_owned()),
            version: version.to_owned(),
            data: Some(data),
        }
    }

    /// `WRMHEADER` xml document.
    pub fn wrm_header(&self) -> Result<String> {
        quick_xml::se::to_string(&self.header()).map_err(|x| Error::Encoding(x.to_string()))
    }

    /// PlayReady object holding a single rights management header record.
    pub fn payload(&self) -> Result<Vec<u8>> {
        let record = self.wrm_header()?.encode_utf16().collect::<Vec<u16>>();
        let record_len = u16::try_from(record.len() * 2).map_err(|_| {
            Error::Encoding(format!(
                "playready header record of {} bytes exceeds 65535 bytes",
                record.len() * 2
            ))
        })?;
        // length (4) + record count (2) + record type (2) + record length (2)
        let size = 10 + record_len as u32;
        let mut writer = Writer::new_little_endian(size as usize);

        let write = |writer: &mut Writer| -> std::io::Result<()> {
            writer.write_u32(size)?;
            writer.write_u16(1)?;
            writer.write_u16(RIGHTS_MANAGEMENT_HEADER)?;
            writer.write_u16(record_len)?;
            writer.write_bytes_u16(&record)
        };

        write(&mut writer).map_err(|x| Error::Encoding(x.to_string()))?;
        Ok(writer.into_inner())
    }

    pub fn build(&self) -> Result<Pssh> {
        Pssh::new(PLAYREADY_SYSTEM_ID, self.payload()?)
    }
}

/// Build a PlayReady `pssh` box for `key_id` using the `cenc` scheme.
pub fn build(key_id: KeyId) -> Result<Pssh> {
    PlayReadyPssh::new(key_id).build()
}

/// Key ids declared by the rights management headers of a PlayReady object.
pub(super) fn parse(data: &[u8]) -> Result<Vec<KeyId>> {
    let err = |x: std::io::Error| Error::format("playready object", x.to_string());
    let mut reader = Reader::new_little_endian(data.to_vec());
    let size = reader.read_u32().map_err(err)?;

    if size as usize != data.len() {
        return Err(Error::format(
            "playready object",
            format!("declared length {size} but found {} bytes", data.len()),
        ));
    }

    let count = reader.read_u16().map_err(err)?;
    let mut kids = vec![];

    for _ in 0..count {
        let record_type = reader.read_u16().map_err(err)?;
        let record_len = reader.read_u16().map_err(err)?;
        let record_data = reader.read_bytes_u16(record_len as usize).map_err(err)?;

        match record_type {
            RIGHTS_MANAGEMENT_HEADER => {
                let xml = String::from_utf16(&record_data)
                    .map_err(|x| Error::format("playready header", x.to_string()))?;
                let wrm_header = quick_xml::de::from_str::<WrmHeader>(&xml)
                    .map_err(|x| Error::format("playready header", x.to_string()))?;
                kids.append(&mut wrm_header.kids()?);
            }
            2 | 3 => (),
            x => {
                return Err(Error::format(
                    "playready object",
                    format!("invalid record type {x}"),
                ));
            }
        }
    }

    if reader.has_more_data() {
        return Err(Error::format(
            "playready object",
            "extra data after records",
        ));
    }

    Ok(kids)
}

#[derive(Deserialize, Serialize)]
#[serde(rename = "WRMHEADER")]
struct WrmHeader {
    #[serde(rename = "@xmlns", default, skip_serializing_if = "Option::is_none")]
    xmlns: Option<String>,
    #[serde(rename = "@version")]
    version: String,
    #[serde(rename = "DATA", skip_serializing_if = "Option::is_none")]
    data: Option<Data>,
}

#[derive(Default, Deserialize, Serialize)]
struct Data {
    #[serde(rename = "PROTECTINFO", skip_serializing_if = "Option::is_none")]
    protect_info: Option<ProtectInfo>,
    #[serde(rename = "KID", skip_serializing_if = "Option::is_none")]
    kid: Option<String>,
    #[serde(rename = "LA_URL", skip_serializing_if = "Option::is_none")]
    la_url: Option<String>,
    #[serde(rename = "LUI_URL", skip_serializing_if = "Option::is_none")]
    lui_url: Option<String>,
    #[serde(
        rename = "CUSTOMATTRIBUTES",
        skip_deserializing,
        skip_serializing_if = "Option::is_none"
    )]
    custom_attributes: Option<BTreeMap<String, String>>,
}

#[derive(Default, Deserialize, Serialize)]
struct ProtectInfo {
    #[serde(rename = "KEYLEN", skip_serializing_if = "Option::is_none")]
    key_len: Option<String>,
    #[serde(rename = "ALGID", skip_serializing_if = "Option::is_none")]
    alg_id: Option<String>,
    #[serde(rename = "KID", skip_serializing_if = "Option::is_none")]
    kid: Option<KeyID>,
    #[serde(rename = "KIDS", default, skip_serializing_if = "Option::is_none")]
    kids: Option<KeyIDs>,
}

#[derive(Deserialize, Serialize)]
struct KeyID {
    #[serde(rename = "@ALGID", default, skip_serializing_if = "Option::is_none")]
    alg_id: Option<String>,
    #[serde(rename = "@VALUE")]
    value: String,
}

#[derive(Deserialize, Serialize)]
struct KeyIDs {
    #[serde(rename = "KID", default)]
    kids: Vec<KeyID>,
}

impl WrmHeader {
    fn kids(&self) -> Result<Vec<KeyId>> {
        let mut kids = vec![];

        match self.version.as_str() {
            "4.0.0.0" => {
                if let Some(Data { kid: Some(x), .. }) = &self.data {
                    kids.push(x.clone());
                }
            }
            "4.1.0.0" | "4.2.0.0" | "4.3.0.0" => {
                if let Some(Data {
                    protect_info: Some(ProtectInfo { kid: Some(x), .. }),
                    ..
                }) = &self.data
                {
                    kids.push(x.value.clone());
                }

                if let Some(Data {
                    protect_info: Some(ProtectInfo { kids: Some(x), .. }),
                    ..
                }) = &self.data
                {
                    kids.extend(x.kids.iter().map(|x| x.value.clone()));
                }
            }
            x => {
                return Err(Error::format(
                    "playready header",
                    format!("unsupported header version v{x}"),
                ));
            }
        }

        kids.iter()
            .map(|x| {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(x.trim())
                    .map_err(|e| Error::format("playready kid", e.to_string()))?;
                // The GUID byte swap is its own inverse.
                Ok(KeyId(KeyId::from_bytes(&bytes)?.guid_le_bytes()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_length_prefix() {
        let kid = KeyId::from_hex("00112233445566778899aabbccddeeff").unwrap();
        let payload = PlayReadyPssh::new(kid).payload().unwrap();
        let size = u32::from_le_bytes(payload[..4].try_into().unwrap());

        assert_eq!(size as usize, payload.len());
        assert_eq!(&payload[4..8], &[1, 0, 1, 0]);
        assert_eq!(
            u16::from_le_bytes([payload[8], payload[9]]) as usize,
            payload.len() - 10
        );
    }

    #[test]
    fn test_cbcs_header_version() {
        let kid = KeyId::from_hex("00112233445566778899aabbccddeeff").unwrap();
        let xml = PlayReadyPssh::new(kid)
            .scheme(EncryptionScheme::Cbcs)
            .wrm_header()
            .unwrap();

        assert!(xml.contains(r#"version="4.3.0.0""#));
        assert!(xml.contains(r#"ALGID="AESCBC""#));
        assert!(xml.contains(r#"VALUE="MyIRAFVEd2aImaq7zN3u/w==""#));
    }

    #[test]
    fn test_parse_round_trip() {
        let kid = KeyId::from_hex("12345678123412341234123456789abc").unwrap();
        let payload = PlayReadyPssh::new(kid)
            .la_url("https://license.example.com/pr?a=1&b=2")
            .payload()
            .unwrap();

        assert_eq!(parse(&payload).unwrap(), vec![kid]);
    }
}
