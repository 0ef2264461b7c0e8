/*
    REFERENCES
    ----------

    1. https://github.com/shaka-project/shaka-player/blob/4e933116984beb630d31ce7a0b8c9bc6f8b48c06/lib/util/pssh.js
    2. https://github.com/shaka-project/shaka-packager/blob/56e227267c9091a0f65b4d92d9064dda4557f3a7/packager/tools/pssh/pssh-box.py

*/

use super::{COMMON_SYSTEM_ID, PLAYREADY_SYSTEM_ID, WIDEVINE_SYSTEM_ID, playready, widevine};
use crate::{Error, KeyId, Result, kid, reader::Reader};

/// System id type parsed from `pssh` box.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SystemId {
    Common,
    Other(String),
    PlayReady,
    WideVine,
}

impl From<[u8; 16]> for SystemId {
    fn from(value: [u8; 16]) -> Self {
        match value {
            COMMON_SYSTEM_ID => Self::Common,
            PLAYREADY_SYSTEM_ID => Self::PlayReady,
            WIDEVINE_SYSTEM_ID => Self::WideVine,
            x => Self::Other(KeyId(x).uuid()),
        }
    }
}

impl std::fmt::Display for SystemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                SystemId::Common => "common",
                SystemId::Other(x) => x,
                SystemId::PlayReady => "playready",
                SystemId::WideVine => "widevine",
            }
        )
    }
}

/// A `pssh` box read back from bytes.
#[derive(Clone, Debug)]
pub struct ParsedPssh {
    pub system_id: SystemId,
    pub version: u8,
    /// Key ids from the version 1 header followed by the ones declared in
    /// the DRM specific data, without duplicates.
    pub key_ids: Vec<KeyId>,
    /// Complete box, header included.
    pub data: Vec<u8>,
    pub payload: Vec<u8>,
}

impl ParsedPssh {
    pub fn as_base64(&self) -> String {
        kid::encode_base64(&self.data)
    }
}

/// Parse every `pssh` box in `data`.
///
/// `data` may be a single box, several concatenated boxes or an init segment.
/// `moov` and `moof` boxes are descended into; any other box is skipped.
pub fn parse_boxes(data: &[u8]) -> Result<Vec<ParsedPssh>> {
    let err = |x: std::io::Error| Error::format("pssh box", x.to_string());
    let mut reader = Reader::new_big_endian(data.to_vec());
    let mut boxes = vec![];

    while reader.has_more_data() {
        let start = reader.get_position();
        let mut size = reader.read_u32().map_err(err)? as u64;
        let box_type = reader.read_bytes_u8(4).map_err(err)?;

        if size == 1 {
            size = ((reader.read_u32().map_err(err)? as u64) << 32)
                | reader.read_u32().map_err(err)? as u64;
        } else if size == 0 {
            size = reader.get_length() - start;
        }

        let end = start.saturating_add(size);

        if end < reader.get_position() || end > reader.get_length() {
            return Err(Error::format(
                "pssh box",
                format!(
                    "'{}' box of size {size} at offset {start} does not fit the data",
                    String::from_utf8_lossy(&box_type)
                ),
            ));
        }

        match box_type.as_slice() {
            b"moov" | b"moof" => continue,
            b"pssh" => {
                let body_len = end - reader.get_position();
                let body = reader.read_bytes_u8(body_len as usize).map_err(err)?;
                let mut parsed = parse_pssh(&body)?;
                parsed.data = data[start as usize..end as usize].to_vec();
                boxes.push(parsed);
            }
            _ => reader.skip(end - reader.get_position()).map_err(err)?,
        }
    }

    Ok(boxes)
}

fn parse_pssh(body: &[u8]) -> Result<ParsedPssh> {
    let err = |x: std::io::Error| Error::format("pssh box", x.to_string());
    let mut reader = Reader::new_big_endian(body.to_vec());
    let version = reader.read_u8().map_err(err)?;
    reader.skip(3).map_err(err)?; // flags

    if version > 1 {
        return Err(Error::format(
            "pssh box",
            format!("unrecognized version {version}"),
        ));
    }

    let system_id = KeyId::from_bytes(&reader.read_bytes_u8(16).map_err(err)?)?.0;
    let mut key_ids = vec![];

    if version > 0 {
        let num_key_ids = reader.read_u32().map_err(err)?;

        for _ in 0..num_key_ids {
            key_ids.push(KeyId::from_bytes(&reader.read_bytes_u8(16).map_err(err)?)?);
        }
    }

    let payload_size = reader.read_u32().map_err(err)?;
    let payload = reader.read_bytes_u8(payload_size as usize).map_err(err)?;

    let declared = match system_id {
        PLAYREADY_SYSTEM_ID => playready::parse(&payload)?,
        WIDEVINE_SYSTEM_ID => widevine::parse(&payload)?,
        _ => vec![],
    };

    for key_id in declared {
        if !key_ids.contains(&key_id) {
            key_ids.push(key_id);
        }
    }

    Ok(ParsedPssh {
        system_id: system_id.into(),
        version,
        key_ids,
        data: vec![],
        payload,
    })
}
