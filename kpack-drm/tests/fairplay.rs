use kpack_drm::{Error, KeyId, fairplay::FairPlayUri};

#[test]
fn test_default_uri_uses_dashed_key_id() -> Result<(), Error> {
    let uri = FairPlayUri::default().build("12345678123412341234123456789abc")?;
    assert_eq!(uri, "skd://12345678-1234-1234-1234-123456789abc");
    Ok(())
}

#[test]
fn test_malformed_key_id() {
    for key_id in ["xyz", "", "0011", "12345678-1234-1234-1234-123456789abcde"] {
        assert!(matches!(
            FairPlayUri::default().build(key_id),
            Err(Error::Validation(_))
        ));
    }
}

#[test]
fn test_hls_key_tag() -> Result<(), Error> {
    let key_id = KeyId::from_hex("00112233-4455-6677-8899-aabbccddeeff")?;
    let iv = [
        0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef, 0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd,
        0xef,
    ];
    let tag = FairPlayUri::new("skd://fps.example.com/{key_id_hex}")?.hls_key_tag(&key_id, &iv);

    assert!(tag.starts_with("#EXT-X-KEY:METHOD=SAMPLE-AES,"));
    assert!(tag.contains(r#"URI="skd://fps.example.com/00112233445566778899aabbccddeeff""#));
    assert!(tag.contains(r#"KEYFORMAT="com.apple.streamingkeydelivery""#));
    assert!(tag.contains(r#"KEYFORMATVERSIONS="1""#));
    assert!(tag.ends_with(",IV=0x0123456789abcdef0123456789abcdef"));
    Ok(())
}
