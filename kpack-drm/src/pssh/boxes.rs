/*
    REFERENCES
    ----------

    1. ISO/IEC 23001-7 (Common encryption in ISO base media file format files), section 8.1
    2. https://github.com/shaka-project/shaka-packager/blob/56e227267c9091a0f65b4d92d9064dda4557f3a7/packager/tools/pssh/pssh-box.py

*/

use crate::{Error, KeyId, Result, kid, reader::Writer};

/// size (4) + type (4) + version (1) + flags (3) + system id (16) + data size (4)
const HEADER_SIZE: usize = 32;

/// A `pssh` box ready to be written.
///
/// Version 0 boxes only carry the system id and the DRM specific data.
/// Adding key ids switches the box to version 1, which lists them in clear
/// ahead of the data.
pub struct PsshBox<'a> {
    system_id: [u8; 16],
    key_ids: Vec<KeyId>,
    payload: &'a [u8],
}

impl<'a> PsshBox<'a> {
    pub fn new(system_id: [u8; 16], payload: &'a [u8]) -> Self {
        Self {
            system_id,
            key_ids: Vec::new(),
            payload,
        }
    }

    pub fn with_key_ids(mut self, key_ids: &[KeyId]) -> Self {
        self.key_ids.extend_from_slice(key_ids);
        self
    }

    pub fn version(&self) -> u8 {
        if self.key_ids.is_empty() { 0 } else { 1 }
    }

    /// Total box size, as written in the first four bytes.
    pub fn size(&self) -> Result<u32> {
        let key_ids_size = if self.key_ids.is_empty() {
            0
        } else {
            4 + 16 * self.key_ids.len()
        };

        HEADER_SIZE
            .checked_add(key_ids_size)
            .and_then(|x| x.checked_add(self.payload.len()))
            .and_then(|x| u32::try_from(x).ok())
            .ok_or_else(|| {
                Error::Encoding(format!(
                    "pssh box with {} bytes of data does not fit a 32-bit size field",
                    self.payload.len()
                ))
            })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let size = self.size()?;
        let mut writer = Writer::new_big_endian(size as usize);

        let write = |writer: &mut Writer| -> std::io::Result<()> {
            writer.write_u32(size)?;
            writer.write_bytes_u8(b"pssh")?;
            writer.write_u8(self.version())?;
            writer.write_bytes_u8(&[0, 0, 0])?;
            writer.write_bytes_u8(&self.system_id)?;

            if !self.key_ids.is_empty() {
                writer.write_u32(self.key_ids.len() as u32)?;

                for key_id in &self.key_ids {
                    writer.write_bytes_u8(key_id.as_bytes())?;
                }
            }

            writer.write_u32(self.payload.len() as u32)?;
            writer.write_bytes_u8(self.payload)
        };

        write(&mut writer).map_err(|x| Error::Encoding(x.to_string()))?;
        Ok(writer.into_inner())
    }
}

/// Frame `payload` into a version 0 `pssh` box for `system_id`.
pub fn build_box(system_id: [u8; 16], payload: &[u8]) -> Result<Vec<u8>> {
    PsshBox::new(system_id, payload).to_bytes()
}

/// A built `pssh` box together with the DRM specific data it carries.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Pssh {
    pub system_id: [u8; 16],
    /// Complete box, header included.
    pub data: Vec<u8>,
    /// DRM specific data only.
    pub payload: Vec<u8>,
}

impl Pssh {
    pub(crate) fn new(system_id: [u8; 16], payload: Vec<u8>) -> Result<Self> {
        Ok(Self {
            system_id,
            data: build_box(system_id, &payload)?,
            payload,
        })
    }

    pub fn as_base64(&self) -> String {
        kid::encode_base64(&self.data)
    }

    pub fn payload_base64(&self) -> String {
        kid::encode_base64(&self.payload)
    }
}
