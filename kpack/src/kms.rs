//! CPIX key server client.
//!
//! Requests one content key per track type and reads the issued keys back
//! from the `ContentKey` and `ContentKeyUsageRule` elements of the answer.

use anyhow::Result;
use kpack_drm::{
    DrmType, EncryptionScheme, KeyId, KeyProvider, KeyProviderError, TrackKey, TrackType, kid,
};
use log::{debug, trace};
use quick_xml::{
    Reader, Writer,
    events::{BytesDecl, BytesEnd, BytesStart, Event},
};
use reqwest::{
    StatusCode,
    blocking::Client,
    header::{CONTENT_TYPE, HeaderValue},
};
use std::{collections::HashMap, io, time::Duration};
use uuid::Uuid;

const CPIX_NS: &str = "urn:dashif:org:cpix";
const PSKC_NS: &str = "urn:ietf:params:xml:ns:keyprov:pskc";

pub struct CpixKeyProvider {
    client: Client,
    kms_url: String,
    token: String,
}

impl CpixKeyProvider {
    pub fn new(kms_url: &str, token: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            kms_url: kms_url.to_owned(),
            token: token.to_owned(),
        })
    }
}

impl KeyProvider for CpixKeyProvider {
    fn fetch_keys(
        &self,
        content_id: &str,
        drm_types: &[DrmType],
        scheme: EncryptionScheme,
        track_types: &[TrackType],
    ) -> Result<HashMap<TrackType, TrackKey>, KeyProviderError> {
        let body = request_body(content_id, drm_types, scheme, track_types)
            .map_err(|x| KeyProviderError::transport(format!("cannot write cpix request: {x}")))?;

        debug!("Requesting keys for '{}' from {}", content_id, self.kms_url);
        trace!("CPIX request: {}", body);

        let response = self
            .client
            .post(format!("{}{}", self.kms_url, self.token))
            .header(CONTENT_TYPE, HeaderValue::from_static("application/xml"))
            .body(body)
            .send()
            .map_err(|x| KeyProviderError::transport(x.without_url().to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .map_err(|x| KeyProviderError::transport(x.without_url().to_string()))?;

        match status {
            x if x.is_success() => (),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(KeyProviderError::auth(format!(
                    "key server rejected the token ({status})"
                )));
            }
            StatusCode::NOT_FOUND => {
                return Err(KeyProviderError::not_found(format!(
                    "key server has no keys for '{content_id}' ({status})"
                )));
            }
            _ => {
                return Err(KeyProviderError::transport(format!(
                    "key request failed ({status}): '{}'",
                    text.trim()
                )));
            }
        }

        trace!("CPIX response: {} bytes", text.len());
        parse_response(&text, track_types)
    }
}

fn request_body(
    content_id: &str,
    drm_types: &[DrmType],
    scheme: EncryptionScheme,
    track_types: &[TrackType],
) -> io::Result<String> {
    let kids = track_types
        .iter()
        .map(|_| Uuid::new_v4().to_string())
        .collect::<Vec<_>>();
    let scheme = scheme.to_string();
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("cpix:CPIX").with_attributes([
        ("id", content_id),
        ("xmlns:cpix", CPIX_NS),
        ("xmlns:pskc", PSKC_NS),
    ])))?;

    start(&mut writer, "cpix:ContentKeyList")?;
    for kid in &kids {
        empty(
            &mut writer,
            "cpix:ContentKey",
            &[("kid", kid), ("commonEncryptionScheme", &scheme)],
        )?;
    }
    end(&mut writer, "cpix:ContentKeyList")?;

    start(&mut writer, "cpix:DRMSystemList")?;
    for kid in &kids {
        for drm_type in drm_types {
            let system_id = KeyId(drm_type.system_id()).uuid();
            empty(
                &mut writer,
                "cpix:DRMSystem",
                &[("kid", kid), ("systemId", &system_id)],
            )?;
        }
    }
    end(&mut writer, "cpix:DRMSystemList")?;

    start(&mut writer, "cpix:ContentKeyUsageRuleList")?;
    for (kid, track_type) in kids.iter().zip(track_types) {
        empty(
            &mut writer,
            "cpix:ContentKeyUsageRule",
            &[("kid", kid), ("intendedTrackType", track_type.as_str())],
        )?;
    }
    end(&mut writer, "cpix:ContentKeyUsageRuleList")?;

    end(&mut writer, "cpix:CPIX")?;
    String::from_utf8(writer.into_inner()).map_err(io::Error::other)
}

fn start(writer: &mut Writer<Vec<u8>>, name: &str) -> io::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))
}

fn end(writer: &mut Writer<Vec<u8>>, name: &str) -> io::Result<()> {
    writer.write_event(Event::End(BytesEnd::new(name)))
}

fn empty(writer: &mut Writer<Vec<u8>>, name: &str, attributes: &[(&str, &str)]) -> io::Result<()> {
    writer.write_event(Event::Empty(
        BytesStart::new(name).with_attributes(attributes.iter().copied()),
    ))
}

struct PendingKey {
    key_id: KeyId,
    iv: Option<[u8; 16]>,
    key: Option<[u8; 16]>,
}

impl PendingKey {
    fn finish(self) -> Result<TrackKey, KeyProviderError> {
        let Some(key) = self.key else {
            return Err(KeyProviderError::malformed(format!(
                "content key {} has no value",
                self.key_id
            )));
        };
        let Some(iv) = self.iv else {
            return Err(KeyProviderError::malformed(format!(
                "content key {} has no explicit iv",
                self.key_id
            )));
        };
        Ok(TrackKey::new(self.key_id, key, iv))
    }
}

fn parse_response(
    xml: &str,
    track_types: &[TrackType],
) -> Result<HashMap<TrackType, TrackKey>, KeyProviderError> {
    let malformed = |x: String| KeyProviderError::malformed(x);
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut keys = vec![];
    let mut rules = vec![];
    let mut current = None;
    let mut in_plain_value = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"ContentKey" => current = Some(content_key(&e)?),
                b"PlainValue" => in_plain_value = current.is_some(),
                b"ContentKeyUsageRule" => rules.push(usage_rule(&e)?),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"ContentKey" => keys.push(content_key(&e)?.finish()?),
                b"ContentKeyUsageRule" => rules.push(usage_rule(&e)?),
                _ => {}
            },
            Ok(Event::Text(e)) if in_plain_value => {
                let text = e.unescape().map_err(|x| malformed(x.to_string()))?;
                if let Some(pending) = current.as_mut() {
                    pending.key = Some(
                        kid::decode_base64_16(&text)
                            .map_err(|x| malformed(format!("content key value: {x}")))?,
                    );
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"PlainValue" => in_plain_value = false,
                b"ContentKey" => {
                    if let Some(pending) = current.take() {
                        keys.push(pending.finish()?);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(malformed(e.to_string())),
            _ => {}
        }
    }

    if keys.is_empty() {
        return Err(malformed("response has no content keys".to_owned()));
    }

    let mut issued = HashMap::new();

    if rules.is_empty() {
        // One key without usage rules protects every track.
        let [key] = keys.as_slice() else {
            return Err(malformed(format!(
                "{} content keys without usage rules",
                keys.len()
            )));
        };

        for track_type in track_types {
            issued.insert(*track_type, key.clone());
        }

        return Ok(issued);
    }

    for (key_id, track_type) in &rules {
        let key = keys
            .iter()
            .find(|x| x.key_id == *key_id)
            .ok_or_else(|| malformed(format!("usage rule references unknown key {key_id}")))?;

        if *track_type == TrackType::All {
            for x in track_types {
                issued.entry(*x).or_insert_with(|| key.clone());
            }
        } else {
            issued.insert(*track_type, key.clone());
        }
    }

    Ok(issued)
}

fn content_key(e: &BytesStart) -> Result<PendingKey, KeyProviderError> {
    let key_id = attribute(e, b"kid")?
        .ok_or_else(|| KeyProviderError::malformed("content key without kid"))?;
    let iv = attribute(e, b"explicitIV")?
        .map(|x| kid::decode_base64_16(&x))
        .transpose()
        .map_err(|x| KeyProviderError::malformed(format!("explicit iv: {x}")))?;

    Ok(PendingKey {
        key_id: KeyId::parse(&key_id)
            .map_err(|x| KeyProviderError::malformed(format!("content key kid: {x}")))?,
        iv,
        key: None,
    })
}

fn usage_rule(e: &BytesStart) -> Result<(KeyId, TrackType), KeyProviderError> {
    let key_id = attribute(e, b"kid")?
        .ok_or_else(|| KeyProviderError::malformed("usage rule without kid"))?;
    let track_type = attribute(e, b"intendedTrackType")?
        .ok_or_else(|| KeyProviderError::malformed("usage rule without intended track type"))?;

    Ok((
        KeyId::parse(&key_id)
            .map_err(|x| KeyProviderError::malformed(format!("usage rule kid: {x}")))?,
        track_type
            .parse()
            .map_err(|x| KeyProviderError::malformed(format!("usage rule: {x}")))?,
    ))
}

fn attribute(e: &BytesStart, name: &[u8]) -> Result<Option<String>, KeyProviderError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|x| KeyProviderError::malformed(x.to_string()))?;

        if attr.key.local_name().as_ref() == name {
            let value = attr
                .unescape_value()
                .map_err(|x| KeyProviderError::malformed(x.to_string()))?;
            return Ok(Some(value.into_owned()));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kpack_drm::KeyProviderErrorKind;

    const RESPONSE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<cpix:CPIX xmlns:cpix="urn:dashif:org:cpix" xmlns:pskc="urn:ietf:params:xml:ns:keyprov:pskc" id="cid">
  <cpix:ContentKeyList>
    <cpix:ContentKey kid="00112233-4455-6677-8899-aabbccddeeff" explicitIV="AAAAAAAAAAAAAAAAAAAAAQ==">
      <cpix:Data>
        <pskc:Secret>
          <pskc:PlainValue>EAtsIJQPd5pFiRUrV9Layw==</pskc:PlainValue>
        </pskc:Secret>
      </cpix:Data>
    </cpix:ContentKey>
    <cpix:ContentKey kid="12345678-1234-1234-1234-123456789abc" explicitIV="AAAAAAAAAAAAAAAAAAAAAg==">
      <cpix:Data>
        <pskc:Secret>
          <pskc:PlainValue>ABEiM0RVZneImaq7zN3u/w==</pskc:PlainValue>
        </pskc:Secret>
      </cpix:Data>
    </cpix:ContentKey>
  </cpix:ContentKeyList>
  <cpix:ContentKeyUsageRuleList>
    <cpix:ContentKeyUsageRule kid="00112233-4455-6677-8899-aabbccddeeff" intendedTrackType="SD"/>
    <cpix:ContentKeyUsageRule kid="12345678-1234-1234-1234-123456789abc" intendedTrackType="HD"/>
  </cpix:ContentKeyUsageRuleList>
</cpix:CPIX>"#;

    #[test]
    fn test_parse_response() {
        let keys = parse_response(RESPONSE, &[TrackType::Sd, TrackType::Hd]).unwrap();

        assert_eq!(keys.len(), 2);
        assert_eq!(
            keys[&TrackType::Sd].key_id.uuid(),
            "00112233-4455-6677-8899-aabbccddeeff"
        );
        assert_eq!(
            hex::encode(keys[&TrackType::Sd].key),
            "100b6c20940f779a4589152b57d2dacb"
        );
        assert_eq!(keys[&TrackType::Sd].iv[15], 1);
        assert_eq!(
            keys[&TrackType::Hd].key_id.uuid(),
            "12345678-1234-1234-1234-123456789abc"
        );
        assert_eq!(keys[&TrackType::Hd].iv[15], 2);
    }

    #[test]
    fn test_parse_response_single_key_without_rules() {
        let xml = r#"<cpix:CPIX xmlns:cpix="urn:dashif:org:cpix" xmlns:pskc="urn:ietf:params:xml:ns:keyprov:pskc">
  <cpix:ContentKeyList>
    <cpix:ContentKey kid="00112233445566778899aabbccddeeff" explicitIV="AAAAAAAAAAAAAAAAAAAAAQ==">
      <cpix:Data><pskc:Secret><pskc:PlainValue>EAtsIJQPd5pFiRUrV9Layw==</pskc:PlainValue></pskc:Secret></cpix:Data>
    </cpix:ContentKey>
  </cpix:ContentKeyList>
</cpix:CPIX>"#;
        let keys = parse_response(xml, &[TrackType::Audio, TrackType::Hd]).unwrap();

        assert_eq!(keys.len(), 2);
        assert_eq!(keys[&TrackType::Audio], keys[&TrackType::Hd]);
    }

    #[test]
    fn test_parse_response_missing_iv() {
        let xml = r#"<cpix:CPIX xmlns:cpix="urn:dashif:org:cpix" xmlns:pskc="urn:ietf:params:xml:ns:keyprov:pskc">
  <cpix:ContentKeyList>
    <cpix:ContentKey kid="00112233445566778899aabbccddeeff">
      <cpix:Data><pskc:Secret><pskc:PlainValue>EAtsIJQPd5pFiRUrV9Layw==</pskc:PlainValue></pskc:Secret></cpix:Data>
    </cpix:ContentKey>
  </cpix:ContentKeyList>
</cpix:CPIX>"#;
        let error = parse_response(xml, &[TrackType::Hd]).unwrap_err();
        assert_eq!(error.kind, KeyProviderErrorKind::Malformed);
    }

    #[test]
    fn test_parse_response_not_cpix() {
        let error = parse_response("<html><body>maintenance</body></html>", &[TrackType::Hd])
            .unwrap_err();
        assert_eq!(error.kind, KeyProviderErrorKind::Malformed);
    }

    #[test]
    fn test_request_body() {
        let body = request_body(
            "cid&1",
            &[DrmType::Widevine, DrmType::FairPlay],
            EncryptionScheme::Cbcs,
            &[TrackType::Sd, TrackType::Hd],
        )
        .unwrap();

        assert!(body.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(body.contains(r#"id="cid&amp;1""#));
        assert_eq!(body.matches("<cpix:ContentKey ").count(), 2);
        assert_eq!(body.matches(r#"commonEncryptionScheme="cbcs""#).count(), 2);
        assert_eq!(
            body.matches(r#"systemId="edef8ba9-79d6-4ace-a3c8-27dcd51d21ed""#).count(),
            2
        );
        assert_eq!(
            body.matches(r#"systemId="94ce86fb-07ff-4f43-adb8-93d2fa968ca2""#).count(),
            2
        );
        assert!(body.contains(r#"intendedTrackType="SD""#));
        assert!(body.contains(r#"intendedTrackType="HD""#));
    }
}
