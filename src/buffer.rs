//! The single long-lived chunk buffer and the typed views stages take over
//! it.
//!
//! The buffer is allocated once by the orchestrator and reused across
//! ingest, sort, merge and write-back. Rather than pass the raw
//! `Vec<i32>` around and rely on a documented "one owner at a time"
//! discipline, each stage borrows a typed view that the borrow checker
//! confirms is exclusive.

/// The backing allocation: exactly `B = buffer_bytes / 4` `i32` slots,
/// created once and reused by every stage in turn.
pub struct ChunkBuffer {
    data: Vec<i32>,
}

impl ChunkBuffer {
    pub fn new(capacity: usize) -> ChunkBuffer {
        ChunkBuffer {
            data: vec![0i32; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Borrows the whole buffer for ingest + in-memory sort of one chunk.
    pub fn as_chunk_slice(&mut self) -> &mut [i32] {
        &mut self.data
    }

    /// Partitions the buffer into `k + 1` equal sub-buffers: `k` read
    /// windows (one per input stream of a merge group) and one write
    /// window (the output). Each sub-buffer holds `capacity() / (k + 1)`
    /// integers.
    pub fn as_merge_buffers(&mut self, k: usize) -> MergeBuffers<'_> {
        let sub_len = self.data.len() / (k + 1);
        assert!(sub_len > 0, "buffer too small to partition into k+1 sub-buffers");
        MergeBuffers {
            data: &mut self.data,
            sub_len,
        }
    }
}

/// A partition of the backing buffer into `k` read sub-buffers and one
/// write sub-buffer, each of `sub_len` integers.
pub struct MergeBuffers<'a> {
    data: &'a mut [i32],
    sub_len: usize,
}

impl<'a> MergeBuffers<'a> {
    pub fn sub_len(&self) -> usize {
        self.sub_len
    }

    /// Borrows the `index`-th sub-buffer. Disjoint indices never alias:
    /// each call takes `&mut self` so only one sub-buffer view is live at a
    /// time, which is all the pump loop (§4.4) needs -- it touches one
    /// input window or the output window per step.
    pub fn sub_buffer(&mut self, index: usize) -> &mut [i32] {
        let start = index * self.sub_len;
        &mut self.data[start..start + self.sub_len]
    }
}
