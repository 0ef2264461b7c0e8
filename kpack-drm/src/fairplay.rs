//! FairPlay Streaming key delivery uris.
//!
//! FairPlay is signaled through the HLS `#EXT-X-KEY` tag instead of a `pssh`
//! box. The player hands the key uri to the application, which resolves it
//! against the license server.

use crate::{Error, KeyId, Result};

/// `94ce86fb-07ff-4f43-adb8-93d2fa968ca2`
pub const FAIRPLAY_SYSTEM_ID: [u8; 16] = [
    0x94, 0xce, 0x86, 0xfb, 0x07, 0xff, 0x4f, 0x43, 0xad, 0xb8, 0x93, 0xd2, 0xfa, 0x96, 0x8c, 0xa2,
];

pub const DEFAULT_URI_TEMPLATE: &str = "skd://{key_id}";
pub const KEY_FORMAT: &str = "com.apple.streamingkeydelivery";

/// Key uri template.
///
/// `{key_id}` is replaced with the dashed key id and `{key_id_hex}` with the
/// dash-stripped one.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FairPlayUri {
    template: String,
}

impl Default for FairPlayUri {
    fn default() -> Self {
        Self {
            template: DEFAULT_URI_TEMPLATE.to_owned(),
        }
    }
}

impl FairPlayUri {
    pub fn new<T: Into<String>>(template: T) -> Result<Self> {
        let template = template.into();

        if !template.contains("{key_id}") && !template.contains("{key_id_hex}") {
            return Err(Error::Validation(format!(
                "fairplay uri template '{template}' has no {{key_id}} or {{key_id_hex}} placeholder"
            )));
        }

        Ok(Self { template })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Key uri for `key_id`, given as hex, dashed uuid or base64.
    pub fn build(&self, key_id: &str) -> Result<String> {
        let key_id = KeyId::parse(key_id).map_err(|x| {
            Error::Validation(format!("malformed fairplay key id '{key_id}': {x}"))
        })?;
        Ok(self.build_for(&key_id))
    }

    pub fn build_for(&self, key_id: &KeyId) -> String {
        self.template
            .replace("{key_id_hex}", &key_id.hex())
            .replace("{key_id}", &key_id.uuid())
    }

    /// Complete `#EXT-X-KEY` tag for a `SAMPLE-AES` media playlist.
    pub fn hls_key_tag(&self, key_id: &KeyId, iv: &[u8; 16]) -> String {
        format!(
            "#EXT-X-KEY:METHOD=SAMPLE-AES,URI=\"{}\",KEYFORMAT=\"{}\",KEYFORMATVERSIONS=\"1\",IV=0x{}",
            self.build_for(key_id),
            KEY_FORMAT,
            hex::encode(iv)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_without_placeholder() {
        assert!(matches!(
            FairPlayUri::new("skd://static"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_hex_placeholder() {
        let uri = FairPlayUri::new("https://fps.example.com/{key_id_hex}")
            .unwrap()
            .build("12345678-1234-1234-1234-123456789abc")
            .unwrap();
        assert_eq!(uri, "https://fps.example.com/12345678123412341234123456789abc");
    }
}
