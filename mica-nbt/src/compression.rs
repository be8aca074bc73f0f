use std::io::Read;

use flate2::read::{GzDecoder, GzEncoder, ZlibDecoder, ZlibEncoder};

use crate::Error;

/// Compression envelope around a serialized document.
///
/// Both schemes are recognisable from their first bytes (gzip starts with
/// `1F 8B`, zlib with `78` followed by one of its level bytes), so a
/// document can be decoded without knowing up front how it was written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NbtCompression {
    #[default]
    None,
    Gzip,
    Zlib,
}

impl NbtCompression {
    /// Classifies a raw buffer by its magic bytes. Anything that matches
    /// neither scheme is treated as uncompressed.
    pub fn detect(data: &[u8]) -> Self {
        match data {
            [0x1F, 0x8B, ..] => Self::Gzip,
            [0x78, 0x01 | 0x5E | 0x9C | 0xDA, ..] => Self::Zlib,
            _ => Self::None,
        }
    }

    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>, Error> {
        match self {
            Self::None => Ok(data.to_vec()),
            Self::Gzip => {
                let mut encoder = GzEncoder::new(data, flate2::Compression::default());
                let mut out = Vec::new();
                encoder.read_to_end(&mut out).map_err(Error::Compression)?;
                Ok(out)
            }
            Self::Zlib => {
                let mut encoder = ZlibEncoder::new(data, flate2::Compression::default());
                let mut out = Vec::new();
                encoder.read_to_end(&mut out).map_err(Error::Compression)?;
                Ok(out)
            }
        }
    }

    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, Error> {
        match self {
            Self::None => Ok(data.to_vec()),
            Self::Gzip => {
                let mut decoder = GzDecoder::new(data);
                let mut out = Vec::new();
                decoder.read_to_end(&mut out).map_err(Error::Compression)?;
                Ok(out)
            }
            Self::Zlib => {
                let mut decoder = ZlibDecoder::new(data);
                let mut out = Vec::new();
                decoder.read_to_end(&mut out).map_err(Error::Compression)?;
                Ok(out)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const PAYLOAD: &[u8] = b"matching payloads in, matching payloads out, every single time";

    #[test]
    fn compressed_outputs_carry_their_magic_bytes() {
        let gzip = NbtCompression::Gzip.compress(PAYLOAD).unwrap();
        assert_eq!(&gzip[..2], [0x1F, 0x8B]);
        assert_eq!(NbtCompression::detect(&gzip), NbtCompression::Gzip);

        let zlib = NbtCompression::Zlib.compress(PAYLOAD).unwrap();
        assert_eq!(zlib[0], 0x78);
        assert_eq!(NbtCompression::detect(&zlib), NbtCompression::Zlib);

        assert_eq!(NbtCompression::detect(PAYLOAD), NbtCompression::None);
    }

    #[test]
    fn decompress_inverts_compress() {
        for compression in [
            NbtCompression::None,
            NbtCompression::Gzip,
            NbtCompression::Zlib,
        ] {
            let compressed = compression.compress(PAYLOAD).unwrap();
            let restored = compression.decompress(&compressed).unwrap();
            assert_eq!(restored, PAYLOAD);
        }
    }

    #[test]
    fn detect_handles_tiny_inputs() {
        assert_eq!(NbtCompression::detect(&[]), NbtCompression::None);
        assert_eq!(NbtCompression::detect(&[0x78]), NbtCompression::None);
        assert_eq!(NbtCompression::detect(&[0x1F]), NbtCompression::None);
    }

    #[test]
    fn corrupt_stream_fails_to_decompress() {
        let mut gzip = NbtCompression::Gzip.compress(PAYLOAD).unwrap();
        gzip.truncate(gzip.len() / 2);
        assert!(matches!(
            NbtCompression::Gzip.decompress(&gzip),
            Err(Error::Compression(_))
        ));
    }
}
