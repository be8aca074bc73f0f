use bytes::Bytes;

use crate::compound::NbtCompound;
use crate::compression::NbtCompression;
use crate::document::expect_compound_id;
use crate::reader::NbtReader;
use crate::tag::NbtTag;
use crate::{END_ID, Endian, Error, ReadOptions, get_nbt_string};

/// Location of one root entry inside the backing buffer.
#[derive(Clone, Copy, Debug)]
struct LazyField {
    tag_id: u8,
    offset: usize,
}

/// A document that keeps its (decompressed) bytes and decodes root entries
/// on demand.
///
/// The first field access walks the root once, recording the type and
/// payload offset of every entry without building any values. After that,
/// each requested entry is decoded at most once and kept in a cache that
/// only grows until [`LazyNbt::clear_cache`]. The backing buffer is never
/// modified, so cached values can always be rebuilt from it.
pub struct LazyNbt {
    name: String,
    data: Bytes,
    endian: Endian,
    compression: NbtCompression,
    entries_at: usize,
    index: Option<Vec<(String, LazyField)>>,
    cache: NbtCompound,
}

impl LazyNbt {
    pub fn read(bytes: impl Into<Bytes>, options: ReadOptions) -> Result<LazyNbt, Error> {
        let mut body: Bytes = bytes.into();
        let mut bedrock_header = false;
        if options.bedrock_header {
            let mut header = NbtReader::with_endian(&body, Endian::Little);
            let _version = header.get_i32()?;
            let _body_length = header.get_i32()?;
            body = body.slice(8..);
            bedrock_header = true;
        }

        let compression = options
            .compression
            .unwrap_or_else(|| NbtCompression::detect(&body));
        let endian = if bedrock_header {
            Endian::Little
        } else {
            options.endian.unwrap_or_default()
        };

        let data: Bytes = match compression {
            NbtCompression::None => body,
            _ => compression.decompress(&body)?.into(),
        };

        let mut reader = NbtReader::with_endian(&data, endian);
        expect_compound_id(&mut reader)?;
        let name = get_nbt_string(&mut reader)?;
        let entries_at = reader.position();

        Ok(LazyNbt {
            name,
            data,
            endian,
            compression,
            entries_at,
            index: None,
            cache: NbtCompound::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn compression(&self) -> NbtCompression {
        self.compression
    }

    /// Walks the root entries once, recording names, types and payload
    /// offsets. Values are not decoded.
    fn ensure_index(&mut self) -> Result<&[(String, LazyField)], Error> {
        if self.index.is_none() {
            let mut reader = NbtReader::with_endian(&self.data, self.endian);
            reader.seek(self.entries_at)?;
            let mut index = Vec::new();

            loop {
                let tag_id = match reader.get_u8() {
                    Ok(id) => id,
                    Err(Error::UnexpectedEof { .. }) => break,
                    Err(err) => return Err(err),
                };
                if tag_id == END_ID {
                    break;
                }

                let name = get_nbt_string(&mut reader)?;
                let offset = reader.position();
                index.push((name, LazyField { tag_id, offset }));

                NbtTag::skip_data(&mut reader, tag_id)?;
            }

            self.index = Some(index);
        }

        Ok(self.index.as_deref().unwrap_or_default())
    }

    /// Decodes the entry called `name`, or returns it straight from the
    /// cache if an earlier call already did.
    pub fn get(&mut self, name: &str) -> Result<Option<&NbtTag>, Error> {
        if self.cache.get(name).is_none() {
            let field = self
                .ensure_index()?
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, field)| *field);
            let Some(field) = field else {
                return Ok(None);
            };

            let mut reader = NbtReader::with_endian(&self.data, self.endian);
            reader.seek(field.offset)?;
            let tag = NbtTag::deserialize_data(&mut reader, field.tag_id)?;
            self.cache.put(name, tag);
        }

        Ok(self.cache.get(name))
    }

    /// Resolves several entries in one call. The result lines up with
    /// `names`; absent entries come back as `None`.
    pub fn get_many(&mut self, names: &[&str]) -> Result<Vec<Option<&NbtTag>>, Error> {
        for name in names {
            self.get(name)?;
        }
        Ok(names.iter().map(|name| self.cache.get(name)).collect())
    }

    /// Entry names in the order they appear on the wire.
    pub fn keys(&mut self) -> Result<Vec<&str>, Error> {
        Ok(self
            .ensure_index()?
            .iter()
            .map(|(name, _)| name.as_str())
            .collect())
    }

    /// Forces every entry to be decoded and returns a full snapshot of the
    /// root in wire order.
    pub fn to_compound(&mut self) -> Result<NbtCompound, Error> {
        let names: Vec<String> = self
            .ensure_index()?
            .iter()
            .map(|(name, _)| name.clone())
            .collect();

        let mut compound = NbtCompound::new();
        for name in names {
            if let Some(tag) = self.get(&name)? {
                let tag = tag.clone();
                compound.put(&name, tag);
            }
        }
        Ok(compound)
    }

    /// Drops every decoded value. The index is kept, so later reads only
    /// pay for decoding again, not for re-walking the root.
    pub fn clear_cache(&mut self) {
        self.cache = NbtCompound::new();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::document::Nbt;

    fn sample_bytes(compression: NbtCompression) -> Bytes {
        let mut nested = NbtCompound::new();
        nested.put_long("WORLD_SURFACE", 99);

        let mut root = NbtCompound::new();
        root.put_int("DataVersion", 3700);
        root.put("Status", "minecraft:full");
        root.put_compound("Heightmaps", nested);
        root.put_list(
            "size",
            vec![NbtTag::Int(16), NbtTag::Int(16), NbtTag::Int(16)],
        );

        let mut document = Nbt::new("Level".to_string(), root);
        document.compression = compression;
        document.write().unwrap()
    }

    #[test]
    fn lazy_snapshot_matches_eager_decode() {
        for compression in [
            NbtCompression::None,
            NbtCompression::Gzip,
            NbtCompression::Zlib,
        ] {
            let bytes = sample_bytes(compression);
            let eager = Nbt::read(&bytes, ReadOptions::default()).unwrap();

            let mut lazy = LazyNbt::read(bytes, ReadOptions::default()).unwrap();
            assert_eq!(lazy.name(), eager.name);
            assert_eq!(lazy.compression(), compression);
            assert_eq!(lazy.to_compound().unwrap(), eager.root_tag);
        }
    }

    #[test]
    fn keys_come_back_in_wire_order() {
        let mut lazy = LazyNbt::read(sample_bytes(NbtCompression::None), ReadOptions::default())
            .unwrap();
        assert_eq!(
            lazy.keys().unwrap(),
            ["DataVersion", "Status", "Heightmaps", "size"]
        );
    }

    #[test]
    fn repeated_get_hits_the_cache() {
        let mut lazy = LazyNbt::read(sample_bytes(NbtCompression::Gzip), ReadOptions::default())
            .unwrap();

        let first = lazy.get("DataVersion").unwrap().unwrap() as *const NbtTag;
        let second = lazy.get("DataVersion").unwrap().unwrap() as *const NbtTag;
        assert_eq!(first, second);

        assert_eq!(
            lazy.get("DataVersion").unwrap().unwrap().extract_int(),
            Some(3700)
        );
    }

    #[test]
    fn absent_names_resolve_to_none() {
        let mut lazy = LazyNbt::read(sample_bytes(NbtCompression::None), ReadOptions::default())
            .unwrap();
        assert!(lazy.get("NoSuchField").unwrap().is_none());
    }

    #[test]
    fn get_many_lines_up_with_requested_names() {
        let mut lazy = LazyNbt::read(sample_bytes(NbtCompression::None), ReadOptions::default())
            .unwrap();

        let values = lazy.get_many(&["size", "missing", "DataVersion"]).unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(values[0].unwrap().extract_list().unwrap().len(), 3);
        assert!(values[1].is_none());
        assert_eq!(values[2].unwrap().extract_int(), Some(3700));
    }

    #[test]
    fn clear_cache_keeps_the_index_usable() {
        let mut lazy = LazyNbt::read(sample_bytes(NbtCompression::Zlib), ReadOptions::default())
            .unwrap();

        let before = lazy.get("Status").unwrap().unwrap().clone();
        lazy.clear_cache();
        let after = lazy.get("Status").unwrap().unwrap().clone();
        assert_eq!(before, after);
    }

    #[test]
    fn snapshot_order_is_stable_after_out_of_order_access() {
        let mut lazy = LazyNbt::read(sample_bytes(NbtCompression::None), ReadOptions::default())
            .unwrap();

        // Warm the cache back to front
        lazy.get("size").unwrap();
        lazy.get("DataVersion").unwrap();

        let snapshot = lazy.to_compound().unwrap();
        let keys: Vec<_> = snapshot
            .child_tags
            .iter()
            .map(|(key, _)| key.as_str())
            .collect();
        assert_eq!(keys, ["DataVersion", "Status", "Heightmaps", "size"]);
    }

    #[test]
    fn little_endian_documents_decode_lazily_too() {
        let mut root = NbtCompound::new();
        root.put_int("x", 0x0102_0304);
        let mut document = Nbt::new(String::new(), root);
        document.endian = Endian::Little;

        let bytes = document.write().unwrap();
        let options = ReadOptions {
            endian: Some(Endian::Little),
            ..Default::default()
        };
        let mut lazy = LazyNbt::read(bytes, options).unwrap();
        assert_eq!(lazy.get("x").unwrap().unwrap().extract_int(), Some(0x0102_0304));
    }
}
