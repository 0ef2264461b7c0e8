/*
    REFERENCES
    ----------

    1. https://github.com/shaka-project/shaka-player/blob/f539147d480fff9cc8d685f3aac0e6f5dc28a182/lib/util/data_view_reader.js

*/

use std::io::{Cursor, Error, ErrorKind, Read, Result, Write};

#[derive(Clone, Copy, Default)]
enum Endianness {
    #[default]
    Big,
    Little,
}

/// Reader for parsing box and record data.
#[derive(Clone, Default)]
pub struct Reader {
    endian: Endianness,
    inner: Cursor<Vec<u8>>,
}

impl Reader {
    pub fn new_big_endian(data: Vec<u8>) -> Self {
        Self {
            endian: Endianness::Big,
            inner: Cursor::new(data),
        }
    }

    pub fn new_little_endian(data: Vec<u8>) -> Self {
        Self {
            endian: Endianness::Little,
            inner: Cursor::new(data),
        }
    }

    pub fn has_more_data(&self) -> bool {
        self.inner.position() < (self.inner.get_ref().len() as u64)
    }

    pub fn get_length(&self) -> u64 {
        self.inner.get_ref().len() as u64
    }

    pub fn get_position(&self) -> u64 {
        self.inner.position()
    }

    pub fn skip(&mut self, bytes: u64) -> Result<()> {
        let position = self.get_position() + bytes;

        if position > self.get_length() {
            return Err(Error::new(
                ErrorKind::UnexpectedEof,
                "Reader skips out of memory bounds.",
            ));
        }

        self.inner.set_position(position);
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0; 1];
        self.inner.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let mut buf = [0; 2];
        self.inner.read_exact(&mut buf)?;

        match self.endian {
            Endianness::Big => Ok(u16::from_be_bytes(buf)),
            Endianness::Little => Ok(u16::from_le_bytes(buf)),
        }
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0; 4];
        self.inner.read_exact(&mut buf)?;

        match self.endian {
            Endianness::Big => Ok(u32::from_be_bytes(buf)),
            Endianness::Little => Ok(u32::from_le_bytes(buf)),
        }
    }

    pub fn read_bytes_u8(&mut self, bytes: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0; bytes];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn read_bytes_u16(&mut self, bytes: usize) -> Result<Vec<u16>> {
        let endian = self.endian;

        Ok(self
            .read_bytes_u8(bytes)?
            .chunks_exact(2)
            .map(|x| match endian {
                Endianness::Big => u16::from_be_bytes([x[0], x[1]]),
                Endianness::Little => u16::from_le_bytes([x[0], x[1]]),
            })
            .collect())
    }
}

/// Writer for building box and record data.
#[derive(Clone, Default)]
pub struct Writer {
    endian: Endianness,
    inner: Cursor<Vec<u8>>,
}

impl Writer {
    pub fn new_big_endian(capacity: usize) -> Self {
        Self {
            endian: Endianness::Big,
            inner: Cursor::new(Vec::with_capacity(capacity)),
        }
    }

    pub fn new_little_endian(capacity: usize) -> Self {
        Self {
            endian: Endianness::Little,
            inner: Cursor::new(Vec::with_capacity(capacity)),
        }
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.inner.write_all(&[value])
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        match self.endian {
            Endianness::Big => self.inner.write_all(&value.to_be_bytes()),
            Endianness::Little => self.inner.write_all(&value.to_le_bytes()),
        }
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        match self.endian {
            Endianness::Big => self.inner.write_all(&value.to_be_bytes()),
            Endianness::Little => self.inner.write_all(&value.to_le_bytes()),
        }
    }

    pub fn write_bytes_u8(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)
    }

    pub fn write_bytes_u16(&mut self, values: &[u16]) -> Result<()> {
        for value in values {
            self.write_u16(*value)?;
        }
        Ok(())
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.inner.into_inner()
    }
}
