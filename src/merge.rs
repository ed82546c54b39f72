//! Multi-pass K-way file merge.
//!
//! Consumes the stage-0 run files emitted by ingest and repeatedly merges
//! groups of up to `K` files into the next stage, until one file remains.

use std::fs::File;
use std::path::{Path, PathBuf};

use log::debug;

use crate::buffer::ChunkBuffer;
use crate::error::Result;
use crate::heap::{HeapElem, MinHeap};
use crate::io;

/// Fan-in of the K-way merger.
pub const K: usize = 16;

/// Runs every merge stage until a single file remains, returning its path.
/// `f0` is the number of stage-0 run files, named
/// `{tmpdir}/0_0 .. 0_{f0-1}`.
pub fn kmerge(tmpdir: &Path, f0: usize, chunk_buffer: &mut ChunkBuffer) -> Result<PathBuf> {
    assert!(f0 >= 1, "kmerge requires at least one stage-0 run file");

    let mut stage = 0usize;
    let mut count = f0;

    while count > 1 {
        let next_count = count.div_ceil(K);
        debug!("merge stage {stage}: {count} files -> {next_count} files");

        for group_idx in 0..next_count {
            let start = group_idx * K;
            let end = (start + K).min(count);
            let group_files: Vec<PathBuf> = (start..end)
                .map(|i| io::run_file_path(tmpdir, stage, i))
                .collect();
            let out_path = io::run_file_path(tmpdir, stage + 1, group_idx);

            if group_files.len() == 1 {
                copy_run_file(&group_files[0], &out_path, chunk_buffer)?;
            } else {
                merge_group(&group_files, &out_path, chunk_buffer)?;
            }

            for f in &group_files {
                let _ = std::fs::remove_file(f);
            }
        }

        stage += 1;
        count = next_count;
    }

    Ok(io::run_file_path(tmpdir, stage, 0))
}

/// Copies `src` to `dst` using the shared buffer as a plain I/O block,
/// without going through the heap -- the fast path for a lone leftover
/// file in a merge stage.
fn copy_run_file(src: &Path, dst: &Path, chunk_buffer: &mut ChunkBuffer) -> Result<()> {
    let mut in_file = io::open_read(src)?;
    let mut out_file = io::create_write(dst)?;
    loop {
        let block = chunk_buffer.as_chunk_slice();
        let n = io::read_block(&mut in_file, block)?;
        if n == 0 {
            break;
        }
        io::write_block(&mut out_file, &block[..n])?;
    }
    Ok(())
}

struct StreamState {
    count: usize,
    pos: usize,
    exhausted: bool,
}

/// Merges `files` (`1 < files.len() <= K`) into `out_path`, partitioning
/// the shared buffer into `K + 1` sub-buffers: one read window per input
/// plus one write window for the output.
fn merge_group(files: &[PathBuf], out_path: &Path, chunk_buffer: &mut ChunkBuffer) -> Result<()> {
    let m = files.len();
    debug_assert!(m > 1 && m <= K);

    let mut readers: Vec<File> = files
        .iter()
        .map(|p| io::open_read(p))
        .collect::<Result<Vec<_>>>()?;
    let mut out_file = io::create_write(out_path)?;

    let mut merge_buffers = chunk_buffer.as_merge_buffers(K);
    let sub_len = merge_buffers.sub_len();

    let mut heap = MinHeap::create(m);
    let mut streams: Vec<StreamState> = Vec::with_capacity(m);

    for i in 0..m {
        let count = io::read_block(&mut readers[i], merge_buffers.sub_buffer(i))?;
        if count > 0 {
            let key = merge_buffers.sub_buffer(i)[0];
            heap.insert(HeapElem { key, src: i as u16 });
            streams.push(StreamState { count, pos: 1, exhausted: false });
        } else {
            streams.push(StreamState { count: 0, pos: 0, exhausted: true });
        }
    }

    let mut out_pos = 0usize;
    while !heap.empty() {
        let el = heap.pop();
        let i = el.src as usize;

        merge_buffers.sub_buffer(K)[out_pos] = el.key;
        out_pos += 1;
        if out_pos == sub_len {
            io::write_block(&mut out_file, merge_buffers.sub_buffer(K))?;
            out_pos = 0;
        }

        let stream = &mut streams[i];
        if stream.pos < stream.count {
            let key = merge_buffers.sub_buffer(i)[stream.pos];
            stream.pos += 1;
            heap.insert(HeapElem { key, src: i as u16 });
        } else if !stream.exhausted {
            let count = io::read_block(&mut readers[i], merge_buffers.sub_buffer(i))?;
            if count > 0 {
                let key = merge_buffers.sub_buffer(i)[0];
                stream.count = count;
                stream.pos = 1;
                heap.insert(HeapElem { key, src: i as u16 });
            } else {
                stream.count = 0;
                stream.pos = 0;
                stream.exhausted = true;
            }
        }
    }

    if out_pos > 0 {
        io::write_block(&mut out_file, &merge_buffers.sub_buffer(K)[..out_pos])?;
    }

    Ok(())
}
