use thiserror::Error;

pub mod chunk;
pub mod region;

pub use chunk::{Chunk, ChunkCompression, ChunkRef, ChunkResolver};
pub use region::{chunk_index, Region, RegionRef};

/// The side size of a region in chunks (one region is 32x32 chunks)
pub const REGION_SIZE: usize = 32;

/// The number of chunks in a region
pub const CHUNK_COUNT: usize = REGION_SIZE * REGION_SIZE;

/// The number of bytes in a sector (4 KiB)
pub const SECTOR_BYTES: usize = 4096;

#[derive(Error, Debug)]
pub enum ChunkError {
    #[error("Compression scheme {0} not recognised")]
    UnknownCompression(u8),
    #[error("Nbt error: {0}")]
    Nbt(#[from] mica_nbt::Error),
}

#[derive(Error, Debug)]
pub enum RegionReadError {
    #[error("The input is too short to hold the region header")]
    TruncatedHeader,
    #[error("Location entry {0} points outside the file")]
    PayloadOutOfBounds(usize),
    #[error("Payload of entry {0} is cut short")]
    TruncatedPayload(usize),
    #[error("Chunk error: {0}")]
    Chunk(#[from] ChunkError),
    #[error("Io error: {0}")]
    Io(std::io::ErrorKind),
}

#[derive(Error, Debug)]
pub enum RegionWriteError {
    #[error("Chunk error: {0}")]
    Chunk(#[from] ChunkError),
    #[error("Payload of entry {0} exceeds 255 sectors")]
    OversizedPayload(usize),
}
