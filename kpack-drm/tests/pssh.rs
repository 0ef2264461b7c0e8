use base64::Engine;
use kpack_drm::{
    EncryptionScheme, Error, KeyId,
    pssh::{
        self, PLAYREADY_SYSTEM_ID, PlayReadyPssh, PsshBox, SystemId, WIDEVINE_SYSTEM_ID,
        WidevinePssh, WidevinePsshData, build_box, parse_boxes, playready, widevine,
    },
};
use prost::Message;

const KID: &str = "00112233445566778899aabbccddeeff";
const PLAYREADY_KID_B64: &str = "MyIRAFVEd2aImaq7zN3u/w==";

fn kid() -> KeyId {
    KeyId::from_hex(KID).unwrap()
}

fn decode_utf16le(data: &[u8]) -> String {
    let units = data
        .chunks_exact(2)
        .map(|x| u16::from_le_bytes([x[0], x[1]]))
        .collect::<Vec<_>>();
    String::from_utf16(&units).unwrap()
}

#[test]
fn test_box_layout() -> Result<(), Error> {
    for payload in [&b""[..], &b"x"[..], &[7u8; 300][..]] {
        let data = build_box(WIDEVINE_SYSTEM_ID, payload)?;

        assert_eq!(data.len(), 32 + payload.len());
        assert_eq!(
            u32::from_be_bytes(data[..4].try_into().unwrap()) as usize,
            data.len()
        );
        assert_eq!(&data[4..8], b"pssh");
        assert_eq!(&data[8..12], &[0, 0, 0, 0]);
        assert_eq!(&data[12..28], &WIDEVINE_SYSTEM_ID);
        assert_eq!(
            u32::from_be_bytes(data[28..32].try_into().unwrap()) as usize,
            payload.len()
        );
        assert_eq!(&data[32..], payload);
    }

    Ok(())
}

#[test]
fn test_version_1_box_lists_key_ids() -> Result<(), Error> {
    let second = KeyId::from_hex("12345678123412341234123456789abc")?;
    let data = PsshBox::new(pssh::COMMON_SYSTEM_ID, &[])
        .with_key_ids(&[kid(), second])
        .to_bytes()?;

    assert_eq!(data[8], 1);
    assert_eq!(data.len(), 32 + 4 + 32);

    let parsed = parse_boxes(&data)?;
    assert_eq!(parsed.len(), 1);
    assert_eq!(parsed[0].system_id, SystemId::Common);
    assert_eq!(parsed[0].version, 1);
    assert_eq!(parsed[0].key_ids, vec![kid(), second]);
    Ok(())
}

#[test]
fn test_widevine_known_box() -> Result<(), Error> {
    let pssh = WidevinePssh::new(EncryptionScheme::Cenc)
        .key_id(kid())
        .content_id("cpix-client-test-cid")
        .build()?;

    assert_eq!(
        pssh.as_base64(),
        "AAAAUHBzc2gAAAAA7e+LqXnWSs6jyCfc1R0h7QAAADAIARIQABEiM0RVZneImaq7zN3u/yIUY3BpeC1jbGllbnQtdGVzdC1jaWRI49yVmwY="
    );
    assert_eq!(
        pssh.payload_base64(),
        "CAESEAARIjNEVWZ3iJmqu8zd7v8iFGNwaXgtY2xpZW50LXRlc3QtY2lkSOPclZsG"
    );
    Ok(())
}

#[test]
fn test_widevine_payload_decodes() -> Result<(), Error> {
    let pssh = widevine::build(&[kid()], None, EncryptionScheme::Cbcs)?;
    let data = WidevinePsshData::decode(pssh.payload.as_slice()).unwrap();

    assert_eq!(data.key_ids, vec![kid().as_bytes().to_vec()]);
    assert_eq!(data.content_id, None);
    assert_eq!(data.algorithm, None);
    assert_eq!(data.protection_scheme, Some(u32::from_be_bytes(*b"cbcs")));

    let parsed = parse_boxes(&pssh.data)?;
    assert_eq!(parsed[0].system_id, SystemId::WideVine);
    assert_eq!(parsed[0].key_ids, vec![kid()]);
    Ok(())
}

#[test]
fn test_widevine_multiple_key_ids_and_provider() -> Result<(), Error> {
    let second = KeyId::from_hex("12345678123412341234123456789abc")?;
    let pssh = WidevinePssh::new(EncryptionScheme::Cenc)
        .key_ids([kid(), second])
        .provider("kpack")
        .build()?;
    let data = WidevinePsshData::decode(pssh.payload.as_slice()).unwrap();

    assert_eq!(data.key_ids.len(), 2);
    assert_eq!(data.provider.as_deref(), Some("kpack"));
    assert_eq!(
        data.algorithm(),
        pssh::widevine_pssh_data::Algorithm::Aesctr
    );
    Ok(())
}

#[test]
fn test_widevine_requires_key_id() {
    let result = widevine::build(&[], Some(&b"cid"[..]), EncryptionScheme::Cenc);
    assert!(matches!(result, Err(Error::Validation(_))));
}

#[test]
fn test_playready_known_kid() -> Result<(), Error> {
    let pssh = playready::build(kid())?;

    assert_eq!(&pssh.data[12..28], &PLAYREADY_SYSTEM_ID);

    let xml = decode_utf16le(&pssh.payload[10..]);
    assert!(xml.starts_with("<WRMHEADER"));
    assert!(xml.contains(r#"version="4.0.0.0""#));
    assert!(xml.contains(&format!("<KID>{PLAYREADY_KID_B64}</KID>")));
    assert!(xml.contains("<ALGID>AESCTR</ALGID>"));
    // Plain base64 of the key id bytes would be wrong.
    assert!(!xml.contains(&kid().base64()));
    Ok(())
}

#[test]
fn test_playready_second_vector() -> Result<(), Error> {
    let kid = KeyId::from_hex("12345678-1234-1234-1234-123456789abc")?;
    let pr = PlayReadyPssh::new(kid);

    assert_eq!(pr.kid_value(), "eFY0EjQSNBISNBI0VniavA==");
    assert_eq!(
        base64::engine::general_purpose::STANDARD
            .decode(pr.kid_value())
            .unwrap(),
        hex::decode("78563412341234121234123456789abc").unwrap()
    );
    Ok(())
}

#[test]
fn test_playready_urls_and_custom_attributes() -> Result<(), Error> {
    let xml = PlayReadyPssh::new(kid())
        .la_url("https://license.example.com/pr?a=1&b=2")
        .lui_url("https://example.com/ui")
        .custom_attribute("CONTENT_ID", "cid-1")
        .wrm_header()?;

    assert!(xml.contains("<LA_URL>https://license.example.com/pr?a=1&amp;b=2</LA_URL>"));
    assert!(xml.contains("<LUI_URL>https://example.com/ui</LUI_URL>"));
    assert!(xml.contains("<CUSTOMATTRIBUTES><CONTENT_ID>cid-1</CONTENT_ID></CUSTOMATTRIBUTES>"));
    Ok(())
}

#[test]
fn test_playready_box_parses_back() -> Result<(), Error> {
    for scheme in [EncryptionScheme::Cenc, EncryptionScheme::Cbcs] {
        let pssh = PlayReadyPssh::new(kid()).scheme(scheme).build()?;
        let parsed = parse_boxes(&pssh.data)?;

        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].system_id, SystemId::PlayReady);
        assert_eq!(parsed[0].version, 0);
        assert_eq!(parsed[0].key_ids, vec![kid()]);
        assert_eq!(parsed[0].as_base64(), pssh.as_base64());
    }

    Ok(())
}

#[test]
fn test_parse_concatenated_boxes() -> Result<(), Error> {
    let wv = widevine::build(&[kid()], Some(&b"cid"[..]), EncryptionScheme::Cenc)?;
    let pr = playready::build(kid())?;
    let data = [wv.data.clone(), pr.data.clone()].concat();
    let parsed = parse_boxes(&data)?;

    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed[0].data, wv.data);
    assert_eq!(parsed[1].data, pr.data);
    Ok(())
}

#[test]
fn test_parse_truncated_box() {
    let pssh = playready::build(kid()).unwrap();
    let result = parse_boxes(&pssh.data[..pssh.data.len() - 1]);
    assert!(result.unwrap_err().is_format());
}

#[test]
fn test_parse_largesize_smaller_than_header() {
    for box_type in [b"free", b"pssh"] {
        for largesize in [8u64, 12] {
            let mut data = vec![0, 0, 0, 1];
            data.extend_from_slice(box_type);
            data.extend_from_slice(&largesize.to_be_bytes());

            let result = parse_boxes(&data);
            assert!(result.unwrap_err().is_format());
        }
    }
}

#[test]
fn test_parse_largesize_box() -> Result<(), Error> {
    let pssh = playready::build(kid())?;
    let mut data = vec![0, 0, 0, 1];
    data.extend_from_slice(b"pssh");
    data.extend_from_slice(&(pssh.data.len() as u64 + 8).to_be_bytes());
    data.extend_from_slice(&pssh.data[8..]);

    let parsed = parse_boxes(&data)?;
    assert_eq!(parsed.len(), 1);
    assert_eq!(parsed[0].key_ids, vec![kid()]);
    Ok(())
}
