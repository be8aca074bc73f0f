use bytes::Bytes;

use crate::{Endian, Error};

/// Append-only output buffer for encoding NBT, the write side mirror of
/// [`NbtReader`](crate::reader::NbtReader). Primitive writes cannot fail;
/// length guards live on the tag level where wire limits apply.
#[derive(Debug, Default)]
pub struct NbtWriter {
    buf: Vec<u8>,
    endian: Endian,
}

macro_rules! impl_write {
    ($name:ident, $ty:ty) => {
        pub fn $name(&mut self, value: $ty) {
            let buf = match self.endian {
                Endian::Big => value.to_be_bytes(),
                Endian::Little => value.to_le_bytes(),
            };
            self.buf.extend_from_slice(&buf);
        }
    };
}

impl NbtWriter {
    pub fn new() -> Self {
        Self::with_endian(Endian::Big)
    }

    pub fn with_endian(endian: Endian) -> Self {
        Self {
            buf: Vec::new(),
            endian,
        }
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.into()
    }

    impl_write!(write_u8, u8);
    impl_write!(write_i8, i8);
    impl_write!(write_u16, u16);
    impl_write!(write_i16, i16);
    impl_write!(write_i32, i32);
    impl_write!(write_i64, i64);
    impl_write!(write_f32, f32);
    impl_write!(write_f64, f64);

    pub fn write_slice(&mut self, value: &[u8]) {
        self.buf.extend_from_slice(value);
    }

    /// CESU-8 encodes `value` behind its u16 length prefix. The wire format
    /// caps an encoded string at `u16::MAX` bytes.
    pub fn write_string(&mut self, value: &str) -> Result<(), Error> {
        let java_string = cesu8::to_java_cesu8(value);
        let len = java_string.len();
        if len > u16::MAX as usize {
            return Err(Error::LargeLength(len));
        }

        self.write_u16(len as u16);
        self.write_slice(&java_string);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::reader::NbtReader;

    #[test]
    fn writes_mirror_reads() {
        for endian in [Endian::Big, Endian::Little] {
            let mut writer = NbtWriter::with_endian(endian);
            writer.write_i16(-2);
            writer.write_i64(1 << 60);
            writer.write_f64(0.5);
            writer.write_slice(&[9, 9]);

            let mut reader = NbtReader::with_endian(writer.as_slice(), endian);
            assert_eq!(reader.get_i16().unwrap(), -2);
            assert_eq!(reader.get_i64().unwrap(), 1 << 60);
            assert_eq!(reader.get_f64().unwrap(), 0.5);
            assert_eq!(reader.read_slice(2).unwrap(), &[9, 9]);
            assert_eq!(reader.remaining(), 0);
        }
    }

    #[test]
    fn endianness_changes_layout() {
        let mut big = NbtWriter::new();
        big.write_i32(0x0102_0304);
        assert_eq!(big.as_slice(), &[1, 2, 3, 4]);

        let mut little = NbtWriter::with_endian(Endian::Little);
        little.write_i32(0x0102_0304);
        assert_eq!(little.as_slice(), &[4, 3, 2, 1]);
    }

    #[test]
    fn strings_round_trip_through_cesu8() {
        // U+10400 crosses into CESU-8's surrogate-pair encoding
        for value in ["", "plain ascii", "héllo \u{10400}"] {
            let mut writer = NbtWriter::new();
            writer.write_string(value).unwrap();

            let mut reader = NbtReader::new(writer.as_slice());
            assert_eq!(crate::get_nbt_string(&mut reader).unwrap(), value);
            assert_eq!(reader.remaining(), 0);
        }
    }

    #[test]
    fn oversized_strings_are_rejected() {
        let mut writer = NbtWriter::new();
        let err = writer.write_string(&"a".repeat(70_000)).unwrap_err();
        assert!(matches!(err, Error::LargeLength(70_000)));
        // Nothing was written before the guard fired
        assert!(writer.is_empty());
    }
}
