//! `VectorStore` — the Engine's only contract with the outside world.
//!
//! The real vector store (embedding generation, similarity search) is
//! out of scope for this workspace (§1 non-goals); only its interface
//! is specified here, plus [`FileVectorStore`], a reference
//! implementation used by the CLI's single-node mode and by tests.

use engram_core::{ChunkKey, EngramError, Result};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// One chunk as the vector store exposes it: metadata plus content, but
/// not its embedding (that is fetched separately via
/// [`VectorStore::read_embedding`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Opaque chunk identifier, stable within one store.
    pub id: u64,
    /// Source file path.
    pub file_path: String,
    /// Start line of the chunk.
    pub line_start: u64,
    /// End line of the chunk.
    pub line_end: u64,
    /// The chunk's text content.
    pub content: String,
}

impl Chunk {
    /// The canonical `ChunkKey` for this chunk.
    pub fn chunk_key(&self) -> ChunkKey {
        ChunkKey::new(&self.file_path, self.line_start.to_string())
    }
}

/// The Engine's contract with the vector store.
///
/// Chunk order returned by `list_chunks` must be stable between a read
/// and a subsequent write-back; implementations are responsible for
/// that guarantee (the reference implementation achieves it by storing
/// chunks in a single append-ordered file).
pub trait VectorStore {
    /// All chunks, in stable order.
    fn list_chunks(&self) -> Result<Vec<Chunk>>;
    /// The `D`-element embedding for `chunk_id`.
    fn read_embedding(&self, chunk_id: u64) -> Result<Vec<f32>>;
    /// Atomically replace the embedding for `chunk_id`.
    fn write_embedding(&mut self, chunk_id: u64, vector: &[f32]) -> Result<()>;
    /// Embedding dimension this store was configured with.
    fn dim(&self) -> usize;
}

const CHUNKS_FILE: &str = "chunks.meta";
const EMBEDDINGS_FILE: &str = "embeddings.bin";

/// Reference `VectorStore`: chunk metadata in a length-prefixed bincode
/// file, embeddings as `D`-element little-endian `f32` rows
/// concatenated in chunk order — the exact wire layout §6 specifies.
pub struct FileVectorStore {
    dir: PathBuf,
    dim: usize,
    chunks: Vec<Chunk>,
}

impl FileVectorStore {
    /// Open (or create) a reference vector store rooted at `dir` with
    /// embedding dimension `dim`.
    pub fn open(dir: impl AsRef<Path>, dim: usize) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        let chunks: Vec<Chunk> = engram_core::framing::replay_records(&dir.join(CHUNKS_FILE))?;
        Ok(FileVectorStore { dir, dim, chunks })
    }

    /// Append a new chunk with the given embedding. Returns its id.
    ///
    /// Test/demo helper — the real vector store owns chunk ingestion;
    /// this workspace only implements the read/write-back contract.
    pub fn insert(&mut self, file_path: &str, line_start: u64, line_end: u64, content: &str, embedding: &[f32]) -> Result<u64> {
        if embedding.len() != self.dim {
            return Err(EngramError::InputMalformed(format!(
                "embedding has {} dims, store expects {}",
                embedding.len(),
                self.dim
            )));
        }
        let id = self.chunks.len() as u64;
        let chunk = Chunk {
            id,
            file_path: file_path.to_string(),
            line_start,
            line_end,
            content: content.to_string(),
        };

        let mut chunks_file = engram_core::framing::open_append(&self.dir.join(CHUNKS_FILE))?;
        engram_core::framing::append_record(&mut chunks_file, &chunk)?;
        self.chunks.push(chunk);

        self.append_embedding_row(embedding)?;
        Ok(id)
    }

    fn append_embedding_row(&self, embedding: &[f32]) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(EMBEDDINGS_FILE))?;
        for v in embedding {
            file.write_all(&v.to_le_bytes())?;
        }
        file.flush()?;
        file.sync_data()?;
        Ok(())
    }

    fn row_offset(&self, chunk_id: u64) -> u64 {
        chunk_id * self.dim as u64 * 4
    }

    fn embeddings_path(&self) -> PathBuf {
        self.dir.join(EMBEDDINGS_FILE)
    }
}

impl VectorStore for FileVectorStore {
    fn list_chunks(&self) -> Result<Vec<Chunk>> {
        Ok(self.chunks.clone())
    }

    fn read_embedding(&self, chunk_id: u64) -> Result<Vec<f32>> {
        let mut file = File::open(self.embeddings_path())?;
        file.seek(SeekFrom::Start(self.row_offset(chunk_id)))?;
        let mut buf = vec![0u8; self.dim * 4];
        file.read_exact(&mut buf)?;
        Ok(buf
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }

    fn write_embedding(&mut self, chunk_id: u64, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dim {
            return Err(EngramError::InputMalformed(format!(
                "embedding has {} dims, store expects {}",
                vector.len(),
                self.dim
            )));
        }
        let mut file = OpenOptions::new().write(true).open(self.embeddings_path())?;
        file.seek(SeekFrom::Start(self.row_offset(chunk_id)))?;
        for v in vector {
            file.write_all(&v.to_le_bytes())?;
        }
        file.flush()?;
        file.sync_data()?;
        Ok(())
    }

    fn dim(&self) -> usize {
        self.dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn round_trips_embedding_bytes() {
        let dir = TempDir::new().unwrap();
        let mut store = FileVectorStore::open(dir.path(), 4).unwrap();
        let id = store.insert("a.md", 1, 2, "hello", &[1.0, 2.0, 3.0, 4.0]).unwrap();
        let read = store.read_embedding(id).unwrap();
        assert_eq!(read, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn write_embedding_replaces_in_place() {
        let dir = TempDir::new().unwrap();
        let mut store = FileVectorStore::open(dir.path(), 2).unwrap();
        let a = store.insert("a.md", 1, 1, "a", &[1.0, 0.0]).unwrap();
        let b = store.insert("b.md", 1, 1, "b", &[0.0, 1.0]).unwrap();

        store.write_embedding(a, &[9.0, 9.0]).unwrap();
        assert_eq!(store.read_embedding(a).unwrap(), vec![9.0, 9.0]);
        assert_eq!(store.read_embedding(b).unwrap(), vec![0.0, 1.0]);
    }

    #[test]
    fn reopen_preserves_chunks_and_embeddings() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = FileVectorStore::open(dir.path(), 2).unwrap();
            store.insert("a.md", 1, 1, "a", &[1.0, 2.0]).unwrap();
        }
        let store = FileVectorStore::open(dir.path(), 2).unwrap();
        let chunks = store.list_chunks().unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(store.read_embedding(0).unwrap(), vec![1.0, 2.0]);
    }
}
