use crate::{Endian, Error};

pub type Result<T> = std::result::Result<T, Error>;

/// Cursor over a raw NBT byte sequence.
///
/// Every read is bounds checked up front and fails with
/// [`Error::UnexpectedEof`] instead of touching memory past the input.
/// Reads advance the cursor; [`NbtReader::seek`] repositions it.
#[derive(Debug)]
pub struct NbtReader<'a> {
    data: &'a [u8],
    pos: usize,
    endian: Endian,
}

macro_rules! impl_get {
    ($name:ident, $ty:ty) => {
        pub fn $name(&mut self) -> Result<$ty> {
            let buf = self.read_array::<{ std::mem::size_of::<$ty>() }>()?;
            Ok(match self.endian {
                Endian::Big => <$ty>::from_be_bytes(buf),
                Endian::Little => <$ty>::from_le_bytes(buf),
            })
        }
    };
}

impl<'a> NbtReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_endian(data, Endian::Big)
    }

    pub fn with_endian(data: &'a [u8], endian: Endian) -> Self {
        Self {
            data,
            pos: 0,
            endian,
        }
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Offset of the next unread byte.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        if self.remaining() < N {
            return Err(Error::UnexpectedEof {
                offset: self.pos,
                needed: N - self.remaining(),
            });
        }
        let mut buf = [0u8; N];
        buf.copy_from_slice(&self.data[self.pos..self.pos + N]);
        self.pos += N;
        Ok(buf)
    }

    impl_get!(get_u8, u8);
    impl_get!(get_i8, i8);
    impl_get!(get_u16, u16);
    impl_get!(get_i16, i16);
    impl_get!(get_i32, i32);
    impl_get!(get_i64, i64);
    impl_get!(get_f32, f32);
    impl_get!(get_f64, f64);

    /// Borrows the next `count` bytes out of the backing buffer.
    pub fn read_slice(&mut self, count: usize) -> Result<&'a [u8]> {
        if self.remaining() < count {
            return Err(Error::UnexpectedEof {
                offset: self.pos,
                needed: count - self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }

    pub fn skip_bytes(&mut self, count: u64) -> Result<()> {
        if (self.remaining() as u64) < count {
            return Err(Error::UnexpectedEof {
                offset: self.pos,
                needed: (count - self.remaining() as u64) as usize,
            });
        }
        self.pos += count as usize;
        Ok(())
    }

    /// Repositions the cursor. Seeking to the end of the input is allowed,
    /// past it is not.
    pub fn seek(&mut self, position: usize) -> Result<()> {
        if position > self.data.len() {
            return Err(Error::UnexpectedEof {
                offset: self.pos,
                needed: position - self.data.len(),
            });
        }
        self.pos = position;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cursor_advances_exactly() {
        let data = [0x01, 0x00, 0x02, 0xFF, 0xFF, 0xFF, 0xFF];
        let mut reader = NbtReader::new(&data);

        assert_eq!(reader.get_u8().unwrap(), 1);
        assert_eq!(reader.position(), 1);
        assert_eq!(reader.get_i16().unwrap(), 2);
        assert_eq!(reader.position(), 3);
        assert_eq!(reader.get_i32().unwrap(), -1);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn endianness_flips_numeric_reads() {
        let data = [0x00, 0x00, 0x00, 0x2A];
        assert_eq!(NbtReader::new(&data).get_i32().unwrap(), 42);
        assert_eq!(
            NbtReader::with_endian(&data, Endian::Little)
                .get_i32()
                .unwrap(),
            42 << 24
        );
    }

    #[test]
    fn out_of_bounds_read_fails() {
        let data = [0x00, 0x01];
        let mut reader = NbtReader::new(&data);

        let err = reader.get_i64().unwrap_err();
        match err {
            Error::UnexpectedEof { offset, needed } => {
                assert_eq!(offset, 0);
                assert_eq!(needed, 6);
            }
            other => panic!("unexpected error: {other}"),
        }
        // A failed read must not move the cursor
        assert_eq!(reader.position(), 0);
        assert_eq!(reader.get_u16().unwrap(), 1);
    }

    #[test]
    fn skip_then_slice() {
        let data = [1, 2, 3, 4, 5];
        let mut reader = NbtReader::new(&data);

        reader.skip_bytes(2).unwrap();
        assert_eq!(reader.read_slice(2).unwrap(), &[3, 4]);
        assert!(reader.skip_bytes(2).is_err());
    }

    #[test]
    fn seek_repositions_the_cursor() {
        let data = [1, 2, 3, 4, 5];
        let mut reader = NbtReader::new(&data);

        reader.seek(3).unwrap();
        assert_eq!(reader.get_u8().unwrap(), 4);

        // Seeking backwards is fine
        reader.seek(0).unwrap();
        assert_eq!(reader.get_u8().unwrap(), 1);

        reader.seek(5).unwrap();
        assert_eq!(reader.remaining(), 0);
        assert!(reader.seek(6).is_err());
    }
}
