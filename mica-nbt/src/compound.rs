use crate::document::Nbt;
use crate::reader::NbtReader;
use crate::tag::NbtTag;
use crate::writer::NbtWriter;
use crate::{END_ID, Error, get_nbt_string};
use std::vec::IntoIter;

#[derive(Clone, Debug, Default, PartialEq, PartialOrd)]
pub struct NbtCompound {
    pub child_tags: Vec<(String, NbtTag)>,
}

impl NbtCompound {
    pub const fn new() -> NbtCompound {
        NbtCompound {
            child_tags: Vec::new(),
        }
    }

    pub fn skip_content(reader: &mut NbtReader<'_>) -> Result<(), Error> {
        loop {
            let tag_id = match reader.get_u8() {
                Ok(id) => id,
                Err(Error::UnexpectedEof { .. }) => break,
                Err(err) => return Err(err),
            };
            if tag_id == END_ID {
                break;
            }

            let len = reader.get_u16()?;
            reader.skip_bytes(len as u64)?;

            NbtTag::skip_data(reader, tag_id)?;
        }

        Ok(())
    }

    pub fn deserialize_content(reader: &mut NbtReader<'_>) -> Result<NbtCompound, Error> {
        let mut compound = NbtCompound::new();

        loop {
            let tag_id = match reader.get_u8() {
                Ok(id) => id,
                Err(Error::UnexpectedEof { .. }) => break,
                Err(err) => return Err(err),
            };
            if tag_id == END_ID {
                break;
            }

            let name = get_nbt_string(reader)?;
            let tag = NbtTag::deserialize_data(reader, tag_id)?;
            compound.put(&name, tag);
        }

        Ok(compound)
    }

    /// Decodes only the entries whose names appear in `fields`, skipping over
    /// everything else. Stops as soon as all requested names were found, so
    /// the work done scales with the selected values and not with the size of
    /// the full compound.
    pub fn deserialize_content_selective(
        reader: &mut NbtReader<'_>,
        fields: &[&str],
    ) -> Result<NbtCompound, Error> {
        let mut compound = NbtCompound::new();

        loop {
            let tag_id = match reader.get_u8() {
                Ok(id) => id,
                Err(Error::UnexpectedEof { .. }) => break,
                Err(err) => return Err(err),
            };
            if tag_id == END_ID {
                break;
            }

            let name = get_nbt_string(reader)?;
            if fields.iter().any(|field| *field == name) {
                let tag = NbtTag::deserialize_data(reader, tag_id)?;
                compound.put(&name, tag);
                // Nothing left to look for
                if compound.child_tags.len() == fields.len() {
                    break;
                }
            } else {
                NbtTag::skip_data(reader, tag_id)?;
            }
        }

        Ok(compound)
    }

    pub fn serialize_content(&self, w: &mut NbtWriter) -> Result<(), Error> {
        for (name, tag) in &self.child_tags {
            w.write_u8(tag.get_type_id());
            NbtTag::String(name.clone()).serialize_data(w)?;
            tag.serialize_data(w)?;
        }
        w.write_u8(END_ID);
        Ok(())
    }

    pub fn put(&mut self, name: &str, value: impl Into<NbtTag>) {
        let name = name.to_string();
        if !self.child_tags.iter().any(|(key, _)| key == &name) {
            self.child_tags.push((name, value.into()));
        }
    }

    pub fn put_byte(&mut self, name: &str, value: i8) {
        self.put(name, NbtTag::Byte(value));
    }

    pub fn put_bool(&mut self, name: &str, value: bool) {
        self.put(name, NbtTag::Byte(if value { 1 } else { 0 }));
    }

    pub fn put_short(&mut self, name: &str, value: i16) {
        self.put(name, NbtTag::Short(value));
    }

    pub fn put_int(&mut self, name: &str, value: i32) {
        self.put(name, NbtTag::Int(value));
    }

    pub fn put_long(&mut self, name: &str, value: i64) {
        self.put(name, NbtTag::Long(value));
    }

    pub fn put_float(&mut self, name: &str, value: f32) {
        self.put(name, NbtTag::Float(value));
    }

    pub fn put_double(&mut self, name: &str, value: f64) {
        self.put(name, NbtTag::Double(value));
    }

    pub fn put_list(&mut self, name: &str, value: Vec<NbtTag>) {
        self.put(name, NbtTag::List(value.into_boxed_slice()));
    }

    pub fn put_compound(&mut self, name: &str, value: NbtCompound) {
        self.put(name, NbtTag::Compound(value));
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&NbtTag> {
        for (key, value) in &self.child_tags {
            if key.as_str() == name {
                return Some(value);
            }
        }
        None
    }

    pub fn get_byte(&self, name: &str) -> Option<i8> {
        self.get(name).and_then(|tag| tag.extract_byte())
    }

    pub fn get_short(&self, name: &str) -> Option<i16> {
        self.get(name).and_then(|tag| tag.extract_short())
    }

    pub fn get_int(&self, name: &str) -> Option<i32> {
        self.get(name).and_then(|tag| tag.extract_int())
    }

    pub fn get_long(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(|tag| tag.extract_long())
    }

    pub fn get_float(&self, name: &str) -> Option<f32> {
        self.get(name).and_then(|tag| tag.extract_float())
    }

    pub fn get_double(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|tag| tag.extract_double())
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(|tag| tag.extract_bool())
    }

    pub fn get_string(&self, name: &str) -> Option<&String> {
        self.get(name).and_then(|tag| tag.extract_string())
    }

    pub fn get_list(&self, name: &str) -> Option<&[NbtTag]> {
        self.get(name).and_then(|tag| tag.extract_list())
    }

    pub fn get_compound(&self, name: &str) -> Option<&NbtCompound> {
        self.get(name).and_then(|tag| tag.extract_compound())
    }

    pub fn get_byte_array(&self, name: &str) -> Option<&[u8]> {
        self.get(name).and_then(|tag| tag.extract_byte_array())
    }

    pub fn get_int_array(&self, name: &str) -> Option<&[i32]> {
        self.get(name).and_then(|tag| tag.extract_int_array())
    }

    pub fn get_long_array(&self, name: &str) -> Option<&[i64]> {
        self.get(name).and_then(|tag| tag.extract_long_array())
    }
}

impl From<Nbt> for NbtCompound {
    fn from(value: Nbt) -> Self {
        value.root_tag
    }
}

impl FromIterator<(String, NbtTag)> for NbtCompound {
    fn from_iter<T: IntoIterator<Item = (String, NbtTag)>>(iter: T) -> Self {
        let mut compound = NbtCompound::new();
        for (key, value) in iter {
            compound.put(&key, value);
        }
        compound
    }
}

impl IntoIterator for NbtCompound {
    type Item = (String, NbtTag);
    type IntoIter = IntoIter<(String, NbtTag)>;

    fn into_iter(self) -> Self::IntoIter {
        self.child_tags.into_iter()
    }
}

impl Extend<(String, NbtTag)> for NbtCompound {
    fn extend<T: IntoIterator<Item = (String, NbtTag)>>(&mut self, iter: T) {
        self.child_tags.extend(iter)
    }
}

// Rust's AsRef is currently not reflexive so we need to implement it manually
impl AsRef<NbtCompound> for NbtCompound {
    fn as_ref(&self) -> &NbtCompound {
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_compound() -> NbtCompound {
        let mut nested = NbtCompound::new();
        nested.put_int("DataVersion", 1);

        let mut compound = NbtCompound::new();
        compound.put_int("DataVersion", 3700);
        compound.put("status", "full");
        compound.put_long("LastUpdate", 123_456_789_000);
        compound.put_compound("Heightmaps", nested);
        compound.put_list(
            "size",
            vec![NbtTag::Int(16), NbtTag::Int(16), NbtTag::Int(16)],
        );
        compound
    }

    fn to_wire(compound: &NbtCompound) -> Vec<u8> {
        let mut writer = NbtWriter::new();
        compound.serialize_content(&mut writer).unwrap();
        writer.into_inner()
    }

    #[test]
    fn content_round_trip_preserves_order() {
        let compound = sample_compound();
        let bytes = to_wire(&compound);

        let mut reader = NbtReader::new(&bytes);
        let read = NbtCompound::deserialize_content(&mut reader).unwrap();

        assert_eq!(read, compound);
        let keys: Vec<_> = read.child_tags.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(
            keys,
            ["DataVersion", "status", "LastUpdate", "Heightmaps", "size"]
        );
    }

    #[test]
    fn selective_decode_returns_only_requested_entries() {
        let bytes = to_wire(&sample_compound());

        let mut reader = NbtReader::new(&bytes);
        let read =
            NbtCompound::deserialize_content_selective(&mut reader, &["LastUpdate", "DataVersion"])
                .unwrap();

        assert_eq!(read.child_tags.len(), 2);
        assert_eq!(read.get_int("DataVersion"), Some(3700));
        assert_eq!(read.get_long("LastUpdate"), Some(123_456_789_000));
        assert!(read.get("status").is_none());
        assert!(read.get("Heightmaps").is_none());
        assert!(read.get("size").is_none());
    }

    #[test]
    fn selective_decode_matches_top_level_names_only() {
        // "Heightmaps" nests its own "DataVersion"; only the root entry counts
        let bytes = to_wire(&sample_compound());

        let mut reader = NbtReader::new(&bytes);
        let read =
            NbtCompound::deserialize_content_selective(&mut reader, &["DataVersion"]).unwrap();

        assert_eq!(read.child_tags.len(), 1);
        assert_eq!(read.get_int("DataVersion"), Some(3700));
    }

    #[test]
    fn selective_decode_with_absent_name_yields_empty() {
        let bytes = to_wire(&sample_compound());

        let mut reader = NbtReader::new(&bytes);
        let read =
            NbtCompound::deserialize_content_selective(&mut reader, &["NoSuchField"]).unwrap();

        assert!(read.child_tags.is_empty());
    }

    #[test]
    fn duplicate_put_keeps_first_value() {
        let mut compound = NbtCompound::new();
        compound.put_int("x", 1);
        compound.put_int("x", 2);

        assert_eq!(compound.child_tags.len(), 1);
        assert_eq!(compound.get_int("x"), Some(1));
    }

    #[test]
    fn empty_compound_is_a_single_end_byte() {
        let bytes = to_wire(&NbtCompound::new());
        assert_eq!(bytes, [END_ID]);

        let mut reader = NbtReader::new(&bytes);
        let read = NbtCompound::deserialize_content(&mut reader).unwrap();
        assert!(read.child_tags.is_empty());
    }
}
