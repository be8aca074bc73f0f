use std::borrow::Cow;
use std::ops::Deref;

use bytes::Bytes;

use crate::compound::NbtCompound;
use crate::compression::NbtCompression;
use crate::reader::NbtReader;
use crate::tag::NbtTag;
use crate::writer::NbtWriter;
use crate::{COMPOUND_ID, Endian, Error, get_nbt_string};

/// How raw bytes should be interpreted when decoding a document. The
/// defaults cover the common Java edition case: big endian, no file header,
/// compression detected from the first bytes of the input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Skips magic byte detection and forces one scheme.
    pub compression: Option<NbtCompression>,
    /// Overrides the byte order for headerless input.
    pub endian: Option<Endian>,
    /// The input starts with the 8 byte Bedrock file header (version and
    /// body length, both little endian). Implies little endian data.
    pub bedrock_header: bool,
}

/// A named root compound together with the envelope it was read from (or
/// will be written with): compression scheme, byte order and the optional
/// Bedrock file header.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Nbt {
    pub name: String,
    pub root_tag: NbtCompound,
    pub compression: NbtCompression,
    pub endian: Endian,
    /// Version number carried by the Bedrock file header, when present.
    pub bedrock_header: Option<i32>,
}

struct Envelope<'a> {
    payload: Cow<'a, [u8]>,
    compression: NbtCompression,
    endian: Endian,
    bedrock_header: Option<i32>,
}

impl Envelope<'_> {
    fn into_nbt(self, name: String, root_tag: NbtCompound) -> Nbt {
        Nbt {
            name,
            root_tag,
            compression: self.compression,
            endian: self.endian,
            bedrock_header: self.bedrock_header,
        }
    }
}

fn open_envelope<'a>(bytes: &'a [u8], options: ReadOptions) -> Result<Envelope<'a>, Error> {
    let mut data = bytes;
    let mut bedrock_header = None;
    if options.bedrock_header {
        let mut header = NbtReader::with_endian(data, Endian::Little);
        bedrock_header = Some(header.get_i32()?);
        let _body_length = header.get_i32()?;
        data = &data[8..];
    }

    let compression = options
        .compression
        .unwrap_or_else(|| NbtCompression::detect(data));
    let endian = if options.bedrock_header {
        Endian::Little
    } else {
        options.endian.unwrap_or_default()
    };

    let payload = match compression {
        NbtCompression::None => Cow::Borrowed(data),
        _ => Cow::Owned(compression.decompress(data)?),
    };

    Ok(Envelope {
        payload,
        compression,
        endian,
        bedrock_header,
    })
}

pub(crate) fn expect_compound_id(reader: &mut NbtReader<'_>) -> Result<(), Error> {
    let tag_type_id = reader.get_u8()?;
    if tag_type_id != COMPOUND_ID {
        return Err(Error::NoRootCompound(tag_type_id));
    }
    Ok(())
}

static EMPTY_COMPOUND: NbtCompound = NbtCompound::new();

impl Nbt {
    pub fn new(name: String, tag: NbtCompound) -> Self {
        Nbt {
            name,
            root_tag: tag,
            ..Default::default()
        }
    }

    pub fn read(bytes: &[u8], options: ReadOptions) -> Result<Nbt, Error> {
        let envelope = open_envelope(bytes, options)?;

        let mut reader = NbtReader::with_endian(&envelope.payload, envelope.endian);
        expect_compound_id(&mut reader)?;
        let name = get_nbt_string(&mut reader)?;
        let root_tag = NbtCompound::deserialize_content(&mut reader)?;

        Ok(envelope.into_nbt(name, root_tag))
    }

    /// Reads NBT whose root compound carries no name (the network form).
    pub fn read_unnamed(bytes: &[u8], options: ReadOptions) -> Result<Nbt, Error> {
        let envelope = open_envelope(bytes, options)?;

        let mut reader = NbtReader::with_endian(&envelope.payload, envelope.endian);
        expect_compound_id(&mut reader)?;
        let root_tag = NbtCompound::deserialize_content(&mut reader)?;

        Ok(envelope.into_nbt(String::new(), root_tag))
    }

    /// Reads a document but only decodes the root entries named in `fields`.
    /// Everything else is skipped over, so the returned root contains at
    /// most `fields.len()` entries.
    pub fn read_selective(
        bytes: &[u8],
        fields: &[&str],
        options: ReadOptions,
    ) -> Result<Nbt, Error> {
        let envelope = open_envelope(bytes, options)?;

        let mut reader = NbtReader::with_endian(&envelope.payload, envelope.endian);
        expect_compound_id(&mut reader)?;
        let name = get_nbt_string(&mut reader)?;
        let root_tag = NbtCompound::deserialize_content_selective(&mut reader, fields)?;

        Ok(envelope.into_nbt(name, root_tag))
    }

    pub fn write(&self) -> Result<Bytes, Error> {
        let mut writer = NbtWriter::with_endian(self.endian);
        writer.write_u8(COMPOUND_ID);
        NbtTag::String(self.name.clone()).serialize_data(&mut writer)?;
        self.root_tag.serialize_content(&mut writer)?;

        self.seal(writer)
    }

    /// Writes NBT without the name of the root compound.
    pub fn write_unnamed(&self) -> Result<Bytes, Error> {
        let mut writer = NbtWriter::with_endian(self.endian);
        writer.write_u8(COMPOUND_ID);
        self.root_tag.serialize_content(&mut writer)?;

        self.seal(writer)
    }

    fn seal(&self, writer: NbtWriter) -> Result<Bytes, Error> {
        let body = match self.compression {
            NbtCompression::None => writer.into_inner(),
            compression => compression.compress(writer.as_slice())?,
        };

        match self.bedrock_header {
            None => Ok(body.into()),
            Some(version) => {
                if body.len() > i32::MAX as usize {
                    return Err(Error::LargeLength(body.len()));
                }
                let mut out = NbtWriter::with_endian(Endian::Little);
                out.write_i32(version);
                out.write_i32(body.len() as i32);
                out.write_slice(&body);
                Ok(out.into_bytes())
            }
        }
    }

    /// Never fails: a missing or mismatched entry reads as the empty string.
    pub fn string(&self, name: &str) -> &str {
        self.root_tag.get_string(name).map_or("", |s| s.as_str())
    }

    /// Never fails: numeric entries of any width are widened to f64, and a
    /// missing or non-numeric entry reads as 0.0.
    pub fn number(&self, name: &str) -> f64 {
        self.root_tag
            .get(name)
            .and_then(|tag| tag.extract_number())
            .unwrap_or(0.0)
    }

    pub fn compound(&self, name: &str) -> &NbtCompound {
        self.root_tag.get_compound(name).unwrap_or(&EMPTY_COMPOUND)
    }

    pub fn list(&self, name: &str) -> &[NbtTag] {
        self.root_tag.get_list(name).unwrap_or(&[])
    }
}

impl Deref for Nbt {
    type Target = NbtCompound;

    fn deref(&self) -> &Self::Target {
        &self.root_tag
    }
}

impl From<NbtCompound> for Nbt {
    fn from(value: NbtCompound) -> Self {
        Nbt::new(String::new(), value)
    }
}

impl<T> AsRef<T> for Nbt
where
    T: ?Sized,
    <Nbt as Deref>::Target: AsRef<T>,
{
    fn as_ref(&self) -> &T {
        self.deref().as_ref()
    }
}

impl AsMut<NbtCompound> for Nbt {
    fn as_mut(&mut self) -> &mut NbtCompound {
        &mut self.root_tag
    }
}
