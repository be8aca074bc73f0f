use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use mica_nbt::compound::NbtCompound;
use mica_nbt::{Nbt, NbtCompression, ReadOptions};
use tokio::sync::OnceCell;

use crate::{ChunkError, RegionReadError};

/// On-disk compression tag of one region entry.
///
/// The numbering is the historical McRegion convention and deliberately
/// differs from [`NbtCompression`]; the translation between the two lives
/// here and nowhere else.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ChunkCompression {
    Gzip = 1,
    Zlib = 2,
    /// Uncompressed (since a version before 1.15.1)
    None = 3,
}

impl ChunkCompression {
    /// Rejects any id outside the three known schemes. A bad tag can never
    /// be interpreted later, so it must not get into a chunk at all.
    pub fn from_id(id: u8) -> Result<Self, ChunkError> {
        match id {
            1 => Ok(Self::Gzip),
            2 => Ok(Self::Zlib),
            3 => Ok(Self::None),
            other => Err(ChunkError::UnknownCompression(other)),
        }
    }

    pub const fn id(&self) -> u8 {
        *self as u8
    }

    pub const fn to_nbt(&self) -> NbtCompression {
        match self {
            Self::Gzip => NbtCompression::Gzip,
            Self::Zlib => NbtCompression::Zlib,
            Self::None => NbtCompression::None,
        }
    }
}

/// Payload of a chunk. Either the serialized bytes are authoritative
/// (`Clean`) or the decoded document is (`Dirty`); a stale buffer paired
/// with a modified tree cannot be expressed.
#[derive(Clone, Debug)]
enum ChunkState {
    Clean {
        raw: Bytes,
        /// Decoded lazily by [`Chunk::file`]; always derived from `raw`.
        document: Option<Nbt>,
    },
    Dirty {
        document: Nbt,
    },
}

/// One entry of a region file: local coordinates, the entry's compression
/// tag, its timestamp and the payload in [`ChunkState`] form.
#[derive(Clone, Debug)]
pub struct Chunk {
    x: u8,
    z: u8,
    compression: ChunkCompression,
    timestamp: u32,
    state: ChunkState,
}

impl Chunk {
    /// Builds a chunk from the wire form of one region entry. `raw` is the
    /// compressed payload without the length/compression prelude.
    pub fn from_raw(
        x: u8,
        z: u8,
        compression_id: u8,
        timestamp: u32,
        raw: impl Into<Bytes>,
    ) -> Result<Self, ChunkError> {
        Ok(Chunk {
            x: x & 31,
            z: z & 31,
            compression: ChunkCompression::from_id(compression_id)?,
            timestamp,
            state: ChunkState::Clean {
                raw: raw.into(),
                document: None,
            },
        })
    }

    /// Builds a fresh, dirty chunk around the given root, stamped with the
    /// current time and the default (zlib) region compression.
    pub fn new(x: u8, z: u8, root: NbtCompound) -> Self {
        Chunk {
            x: x & 31,
            z: z & 31,
            compression: ChunkCompression::Zlib,
            timestamp: unix_timestamp(),
            state: ChunkState::Dirty {
                document: Nbt::new(String::new(), root),
            },
        }
    }

    pub fn x(&self) -> u8 {
        self.x
    }

    pub fn z(&self) -> u8 {
        self.z
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    pub fn compression(&self) -> ChunkCompression {
        self.compression
    }

    pub fn is_dirty(&self) -> bool {
        matches!(self.state, ChunkState::Dirty { .. })
    }

    /// Decompresses and decodes the payload on the first call; afterwards
    /// the cached document is returned.
    pub fn file(&mut self) -> Result<&Nbt, ChunkError> {
        match &mut self.state {
            ChunkState::Clean { raw, document } => {
                let decoded = match document.take() {
                    Some(document) => document,
                    None => decode(raw, self.compression)?,
                };
                Ok(document.insert(decoded))
            }
            ChunkState::Dirty { document } => Ok(document),
        }
    }

    /// Replaces the root compound and marks the chunk dirty. Raw bytes that
    /// were never decoded are discarded.
    pub fn set_root(&mut self, root: NbtCompound) {
        match &mut self.state {
            ChunkState::Clean { document, .. } => {
                let mut document = document.take().unwrap_or_default();
                document.root_tag = root;
                self.state = ChunkState::Dirty { document };
            }
            ChunkState::Dirty { document } => document.root_tag = root,
        }
    }

    /// Forces the next [`Chunk::raw`] call to re-serialize, decoding the
    /// document first when it was never materialized.
    pub fn mark_dirty(&mut self) -> Result<(), ChunkError> {
        self.file()?;
        if let ChunkState::Clean { document, .. } = &mut self.state {
            if let Some(document) = document.take() {
                self.state = ChunkState::Dirty { document };
            }
        }
        Ok(())
    }

    /// Returns the serialized payload. A clean chunk hands back the stored
    /// bytes without recompressing anything; a dirty chunk is serialized
    /// with the chunk's compression scheme and becomes clean.
    pub fn raw(&mut self) -> Result<Bytes, ChunkError> {
        match &mut self.state {
            ChunkState::Clean { raw, .. } => Ok(raw.clone()),
            ChunkState::Dirty { document } => {
                document.compression = self.compression.to_nbt();
                let raw = document.write()?;
                let document = std::mem::take(document);
                self.state = ChunkState::Clean {
                    raw: raw.clone(),
                    document: Some(document),
                };
                Ok(raw)
            }
        }
    }

    /// Changes the scheme used for the on-disk payload. The stored bytes no
    /// longer match it, so the chunk becomes dirty. The old scheme must stay
    /// in place until [`Chunk::mark_dirty`] has decoded the stored bytes; on
    /// error the chunk is left unchanged.
    pub fn set_compression(&mut self, compression: ChunkCompression) -> Result<(), ChunkError> {
        if compression != self.compression {
            self.mark_dirty()?;
            self.compression = compression;
        }
        Ok(())
    }
}

fn decode(raw: &Bytes, compression: ChunkCompression) -> Result<Nbt, ChunkError> {
    let options = ReadOptions {
        compression: Some(compression.to_nbt()),
        ..Default::default()
    };
    Ok(Nbt::read(raw, options)?)
}

fn unix_timestamp() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs().min(u32::MAX as u64) as u32)
}

/// Loads the document of a chunk that is known only by its slot. Region
/// indexes hand an implementation of this to their [`ChunkRef`] entries so
/// the payload can live anywhere (another file, a server, a cache).
#[async_trait]
pub trait ChunkResolver: Send + Sync {
    async fn resolve(&self, x: u8, z: u8) -> Result<Nbt, RegionReadError>;
}

/// Slot metadata plus a way to load the payload later.
///
/// All fields are immutable; the only state is the memoized resolution.
/// [`ChunkRef::file`] calls the resolver at most once for a successful
/// resolution and concurrent callers share the in-flight call. A failed
/// resolution is not kept, so the next caller retries.
pub struct ChunkRef {
    x: u8,
    z: u8,
    compression: ChunkCompression,
    timestamp: u32,
    size: usize,
    resolver: Arc<dyn ChunkResolver>,
    document: OnceCell<Nbt>,
}

impl ChunkRef {
    pub fn new(
        x: u8,
        z: u8,
        compression: ChunkCompression,
        timestamp: u32,
        size: usize,
        resolver: Arc<dyn ChunkResolver>,
    ) -> Self {
        ChunkRef {
            x: x & 31,
            z: z & 31,
            compression,
            timestamp,
            size,
            resolver,
            document: OnceCell::new(),
        }
    }

    pub fn x(&self) -> u8 {
        self.x
    }

    pub fn z(&self) -> u8 {
        self.z
    }

    pub fn compression(&self) -> ChunkCompression {
        self.compression
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// Compressed payload size in bytes, without the 5 byte prelude.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Resolves the document through the injected resolver, memoizing it.
    pub async fn file(&self) -> Result<&Nbt, RegionReadError> {
        self.document
            .get_or_try_init(|| self.resolver.resolve(self.x, self.z))
            .await
    }

    /// True once a resolution completed. Never triggers one.
    pub fn is_resolved(&self) -> bool {
        self.document.initialized()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use mica_nbt::tag::NbtTag;

    fn sample_root(data_version: i32) -> NbtCompound {
        let mut root = NbtCompound::new();
        root.put_int("DataVersion", data_version);
        root.put("Status", "minecraft:full");
        root.put_list(
            "size",
            vec![NbtTag::Int(16), NbtTag::Int(16), NbtTag::Int(16)],
        );
        root
    }

    fn raw_payload(compression: ChunkCompression, data_version: i32) -> Bytes {
        let mut document = Nbt::new(String::new(), sample_root(data_version));
        document.compression = compression.to_nbt();
        document.write().unwrap()
    }

    #[test]
    fn compression_ids_follow_the_mcregion_convention() {
        assert_eq!(ChunkCompression::Gzip.id(), 1);
        assert_eq!(ChunkCompression::Zlib.id(), 2);
        assert_eq!(ChunkCompression::None.id(), 3);

        for id in [1, 2, 3] {
            assert_eq!(ChunkCompression::from_id(id).unwrap().id(), id);
        }
        for id in [0, 4, 127, 255] {
            assert!(matches!(
                ChunkCompression::from_id(id),
                Err(ChunkError::UnknownCompression(bad)) if bad == id
            ));
        }
    }

    #[test]
    fn unknown_compression_fails_at_construction() {
        let err = Chunk::from_raw(0, 0, 4, 0, Bytes::new()).unwrap_err();
        assert!(matches!(err, ChunkError::UnknownCompression(4)));
    }

    #[test]
    fn file_decodes_every_scheme() {
        for compression in [
            ChunkCompression::Gzip,
            ChunkCompression::Zlib,
            ChunkCompression::None,
        ] {
            let raw = raw_payload(compression, 3700);
            let mut chunk = Chunk::from_raw(3, 7, compression.id(), 99, raw).unwrap();

            assert!(!chunk.is_dirty());
            let document = chunk.file().unwrap();
            assert_eq!(document.root_tag.get_int("DataVersion"), Some(3700));
            // Decoding must not dirty the chunk
            assert!(!chunk.is_dirty());
        }
    }

    #[test]
    fn clean_raw_is_handed_back_without_recompression() {
        let raw = raw_payload(ChunkCompression::Zlib, 3700);
        let mut chunk = Chunk::from_raw(0, 0, 2, 0, raw.clone()).unwrap();

        let first = chunk.raw().unwrap();
        let second = chunk.raw().unwrap();
        assert_eq!(first, raw);
        // Same backing buffer, not a recompressed copy
        assert_eq!(first.as_ptr(), second.as_ptr());
    }

    #[test]
    fn set_root_dirties_and_raw_reflects_the_new_root() {
        let raw = raw_payload(ChunkCompression::Zlib, 1);
        let mut chunk = Chunk::from_raw(0, 0, 2, 0, raw).unwrap();

        chunk.set_root(sample_root(3700));
        assert!(chunk.is_dirty());

        let bytes = chunk.raw().unwrap();
        assert!(!chunk.is_dirty());

        let document = Nbt::read(&bytes, ReadOptions::default()).unwrap();
        assert_eq!(document.root_tag.get_int("DataVersion"), Some(3700));

        // Serialization settled the chunk; raw is now stable
        let again = chunk.raw().unwrap();
        assert_eq!(bytes.as_ptr(), again.as_ptr());
    }

    #[test]
    fn mark_dirty_reserializes_an_undecoded_chunk() {
        let raw = raw_payload(ChunkCompression::Gzip, 3700);
        let mut chunk = Chunk::from_raw(0, 0, 1, 0, raw.clone()).unwrap();

        chunk.mark_dirty().unwrap();
        assert!(chunk.is_dirty());

        let bytes = chunk.raw().unwrap();
        // A fresh gzip stream, but the same document
        let document = Nbt::read(&bytes, ReadOptions::default()).unwrap();
        assert_eq!(document.root_tag, sample_root(3700));
        assert_eq!(chunk.compression(), ChunkCompression::Gzip);
    }

    #[test]
    fn set_compression_rewrites_the_payload() {
        let raw = raw_payload(ChunkCompression::Gzip, 3700);
        // Never decoded before the switch; the gzip bytes are all there is
        let mut chunk = Chunk::from_raw(0, 0, 1, 0, raw).unwrap();

        chunk.set_compression(ChunkCompression::Zlib).unwrap();
        assert!(chunk.is_dirty());
        assert_eq!(chunk.compression(), ChunkCompression::Zlib);

        let bytes = chunk.raw().unwrap();
        // Zlib magic, not gzip
        assert_eq!(bytes[0], 0x78);

        // The payload came through the scheme change intact
        let document = Nbt::read(&bytes, ReadOptions::default()).unwrap();
        assert_eq!(document.root_tag, sample_root(3700));

        // Setting the same scheme again changes nothing
        chunk.set_compression(ChunkCompression::Zlib).unwrap();
        assert!(!chunk.is_dirty());
    }

    #[test]
    fn coordinates_are_masked_into_the_region() {
        let chunk = Chunk::new(34, 65, NbtCompound::new());
        assert_eq!(chunk.x(), 2);
        assert_eq!(chunk.z(), 1);
    }

    #[test]
    fn new_chunk_defaults_to_zlib_and_now() {
        let chunk = Chunk::new(0, 0, sample_root(1));
        assert!(chunk.is_dirty());
        assert_eq!(chunk.compression(), ChunkCompression::Zlib);
        assert!(chunk.timestamp() > 0);
    }

    struct CountingResolver {
        calls: AtomicUsize,
        fail_first: bool,
    }

    #[async_trait]
    impl ChunkResolver for CountingResolver {
        async fn resolve(&self, _x: u8, _z: u8) -> Result<Nbt, RegionReadError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && call == 0 {
                return Err(RegionReadError::Io(std::io::ErrorKind::NotFound));
            }
            Ok(Nbt::new(String::new(), sample_root(3700)))
        }
    }

    #[tokio::test]
    async fn chunk_ref_resolves_once_across_concurrent_callers() {
        let resolver = Arc::new(CountingResolver {
            calls: AtomicUsize::new(0),
            fail_first: false,
        });
        let chunk = ChunkRef::new(5, 9, ChunkCompression::Zlib, 7, 128, resolver.clone());

        assert!(!chunk.is_resolved());

        let (a, b, c) = tokio::join!(chunk.file(), chunk.file(), chunk.file());
        for document in [a.unwrap(), b.unwrap(), c.unwrap()] {
            assert_eq!(document.root_tag.get_int("DataVersion"), Some(3700));
        }

        assert!(chunk.is_resolved());
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);

        // Later calls keep hitting the memoized value
        chunk.file().await.unwrap();
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn chunk_ref_retries_after_a_failed_resolution() {
        let resolver = Arc::new(CountingResolver {
            calls: AtomicUsize::new(0),
            fail_first: true,
        });
        let chunk = ChunkRef::new(0, 0, ChunkCompression::Gzip, 0, 64, resolver.clone());

        assert!(chunk.file().await.is_err());
        assert!(!chunk.is_resolved());

        assert!(chunk.file().await.is_ok());
        assert!(chunk.is_resolved());
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
    }
}
