use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::chunk::{Chunk, ChunkCompression, ChunkRef, ChunkResolver};
use crate::{CHUNK_COUNT, REGION_SIZE, RegionReadError, RegionWriteError, SECTOR_BYTES};

/// Slot of the chunk at the given region-local coordinates. Coordinates are
/// masked into the region, so `chunk_index(x, z) == chunk_index(x & 31, z & 31)`.
pub const fn chunk_index(x: u8, z: u8) -> usize {
    (x & 31) as usize + (z & 31) as usize * REGION_SIZE
}

const fn slot_coordinates(index: usize) -> (u8, u8) {
    ((index % REGION_SIZE) as u8, (index / REGION_SIZE) as u8)
}

/// Sectors taken by a payload of `raw_len` bytes plus its 5 byte prelude.
fn sector_count(raw_len: usize) -> usize {
    (raw_len + 5).div_ceil(SECTOR_BYTES)
}

/// One present slot of the header walk, with its payload prelude already
/// read and checked against the file bounds. `length` counts the
/// compression byte, so the payload itself is `length - 1` bytes starting
/// at `start + 5`.
struct RawEntry {
    index: usize,
    timestamp: u32,
    start: usize,
    length: usize,
    compression_id: u8,
}

/// Walks both header tables and yields every present slot in index order.
fn walk_entries(bytes: &[u8]) -> Result<Vec<RawEntry>, RegionReadError> {
    if bytes.len() < 2 * SECTOR_BYTES {
        return Err(RegionReadError::TruncatedHeader);
    }

    let mut location_table = &bytes[..SECTOR_BYTES];
    let mut timestamp_table = &bytes[SECTOR_BYTES..2 * SECTOR_BYTES];

    let mut entries = Vec::new();
    for index in 0..CHUNK_COUNT {
        let location = location_table.get_u32();
        let timestamp = timestamp_table.get_u32();

        let sector_offset = (location >> 8) as usize;
        let sectors = (location & 0xFF) as usize;
        // A zero offset or count marks an empty slot
        if sector_offset == 0 || sectors == 0 {
            continue;
        }

        // Sectors 0 and 1 hold the header tables themselves
        let start = sector_offset * SECTOR_BYTES;
        if sector_offset < 2 || start + sectors * SECTOR_BYTES > bytes.len() {
            return Err(RegionReadError::PayloadOutOfBounds(index));
        }

        let mut prelude = &bytes[start..start + 5];
        let length = prelude.get_u32() as usize;
        let compression_id = prelude.get_u8();
        if length == 0 || length + 4 > sectors * SECTOR_BYTES {
            return Err(RegionReadError::TruncatedPayload(index));
        }

        log::trace!("entry {index} at sector {sector_offset}:{sectors}, {length} bytes");
        entries.push(RawEntry {
            index,
            timestamp,
            start,
            length,
            compression_id,
        });
    }

    Ok(entries)
}

/// A region file held in memory: 1024 chunk slots plus the two header
/// tables that place them.
///
/// [`Region::read`] slices every present payload out of the input without
/// copying or decompressing it; [`Region::write`] produces the container
/// again, re-serializing only chunks that were changed.
pub struct Region {
    chunks: [Option<Chunk>; CHUNK_COUNT],
}

impl Default for Region {
    fn default() -> Self {
        Self {
            chunks: [const { None }; CHUNK_COUNT],
        }
    }
}

impl Region {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a region file. Slots whose location entry is zero stay
    /// empty; every other payload becomes a clean [`Chunk`] backed by a
    /// slice of `bytes`.
    pub fn read(bytes: impl Into<Bytes>) -> Result<Self, RegionReadError> {
        let bytes: Bytes = bytes.into();
        let mut region = Region::new();

        for entry in walk_entries(&bytes)? {
            let raw = bytes.slice(entry.start + 5..entry.start + 4 + entry.length);
            let (x, z) = slot_coordinates(entry.index);
            region.chunks[entry.index] = Some(Chunk::from_raw(
                x,
                z,
                entry.compression_id,
                entry.timestamp,
                raw,
            )?);
        }

        log::debug!("read region holding {} chunks", region.len());
        Ok(region)
    }

    /// Serializes the region: both header tables followed by every present
    /// payload, each padded to a whole number of sectors.
    ///
    /// The first pass settles dirty chunks through [`Chunk::raw`] and sums
    /// their sector counts, so the output buffer is allocated once at its
    /// final size and the second pass only appends. Timestamps are written
    /// as stored; writing does not restamp anything.
    pub fn write(&mut self) -> Result<Bytes, RegionWriteError> {
        let mut payloads: Vec<Option<Bytes>> = Vec::with_capacity(CHUNK_COUNT);
        let mut total_sectors = 2;
        for (index, slot) in self.chunks.iter_mut().enumerate() {
            let raw = match slot {
                Some(chunk) => chunk.raw()?,
                None => {
                    payloads.push(None);
                    continue;
                }
            };
            let sectors = sector_count(raw.len());
            // The location entry keeps the sector count in a single byte
            if sectors > 0xFF {
                return Err(RegionWriteError::OversizedPayload(index));
            }
            total_sectors += sectors;
            payloads.push(Some(raw));
        }

        let mut out = BytesMut::with_capacity(total_sectors * SECTOR_BYTES);

        let mut current_sector = 2u32;
        for payload in &payloads {
            match payload {
                Some(raw) => {
                    let sectors = sector_count(raw.len()) as u32;
                    out.put_u32((current_sector << 8) | sectors);
                    current_sector += sectors;
                }
                None => out.put_u32(0),
            }
        }

        for slot in &self.chunks {
            match slot {
                Some(chunk) => out.put_u32(chunk.timestamp()),
                None => out.put_u32(0),
            }
        }

        let mut written = 0;
        for (index, (slot, payload)) in self.chunks.iter().zip(&payloads).enumerate() {
            let (Some(chunk), Some(raw)) = (slot, payload) else {
                continue;
            };
            let sectors = sector_count(raw.len());
            log::trace!(
                "writing entry {index} at sector {}:{sectors}",
                out.len() / SECTOR_BYTES
            );

            out.put_u32((raw.len() + 1) as u32);
            out.put_u8(chunk.compression().id());
            out.put_slice(raw);
            out.put_bytes(0, sectors * SECTOR_BYTES - (raw.len() + 5));
            written += 1;
        }

        log::debug!("wrote {written} chunks in {total_sectors} sectors");
        Ok(out.freeze())
    }

    /// Number of chunks present.
    pub fn len(&self) -> usize {
        self.chunks.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.iter().all(Option::is_none)
    }

    /// The chunk at the given region-local coordinates.
    pub fn find_chunk(&self, x: u8, z: u8) -> Option<&Chunk> {
        self.chunks[chunk_index(x, z)].as_ref()
    }

    pub fn find_chunk_mut(&mut self, x: u8, z: u8) -> Option<&mut Chunk> {
        self.chunks[chunk_index(x, z)].as_mut()
    }

    /// The chunk in the given slot, if any.
    pub fn get_chunk(&self, index: usize) -> Option<&Chunk> {
        self.chunks.get(index).and_then(Option::as_ref)
    }

    /// The first present chunk in slot order.
    pub fn first_chunk(&self) -> Option<&Chunk> {
        self.chunks.iter().flatten().next()
    }

    /// Present chunks in slot order.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter().flatten()
    }

    /// Stores a chunk in the slot addressed by its own coordinates and
    /// returns the previous occupant.
    pub fn put_chunk(&mut self, chunk: Chunk) -> Option<Chunk> {
        self.chunks[chunk_index(chunk.x(), chunk.z())].replace(chunk)
    }

    pub fn remove_chunk(&mut self, x: u8, z: u8) -> Option<Chunk> {
        self.chunks[chunk_index(x, z)].take()
    }
}

/// Slot metadata for a whole region without any payload bytes.
///
/// Built from the header tables and each payload's 5 byte prelude alone;
/// decoding is deferred to the [`ChunkResolver`] shared by the entries.
pub struct RegionRef {
    chunks: [Option<ChunkRef>; CHUNK_COUNT],
}

impl RegionRef {
    /// Indexes a region file. Nothing is decompressed or decoded; per
    /// present slot only the two header entries and 5 payload bytes are
    /// touched.
    pub fn read(
        bytes: &[u8],
        resolver: Arc<dyn ChunkResolver>,
    ) -> Result<Self, RegionReadError> {
        let mut chunks = [const { None }; CHUNK_COUNT];
        let mut present = 0;

        for entry in walk_entries(bytes)? {
            let compression = ChunkCompression::from_id(entry.compression_id)?;
            let (x, z) = slot_coordinates(entry.index);
            chunks[entry.index] = Some(ChunkRef::new(
                x,
                z,
                compression,
                entry.timestamp,
                entry.length - 1,
                Arc::clone(&resolver),
            ));
            present += 1;
        }

        log::debug!("indexed region holding {present} chunks");
        Ok(RegionRef { chunks })
    }

    pub fn len(&self) -> usize {
        self.chunks.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.iter().all(Option::is_none)
    }

    /// The entry at the given region-local coordinates.
    pub fn find_chunk(&self, x: u8, z: u8) -> Option<&ChunkRef> {
        self.chunks[chunk_index(x, z)].as_ref()
    }

    /// The entry in the given slot, if any.
    pub fn get_chunk(&self, index: usize) -> Option<&ChunkRef> {
        self.chunks.get(index).and_then(Option::as_ref)
    }

    /// The first present entry in slot order.
    pub fn first_chunk(&self) -> Option<&ChunkRef> {
        self.chunks.iter().flatten().next()
    }

    /// Present entries in slot order.
    pub fn chunks(&self) -> impl Iterator<Item = &ChunkRef> {
        self.chunks.iter().flatten()
    }
}
