//! Drives the full pipeline: ingest -> parallel sort -> run emission ->
//! K-way merge -> text write-back.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Instant;

use log::info;

use crate::buffer::ChunkBuffer;
use crate::error::{Result, SortError};
use crate::io::{self, TempDirGuard};
use crate::merge;
use crate::parallel_sort;

/// Sorts the text file at `path` in place.
///
/// `buffer_bytes` bounds peak memory use for the shared chunk buffer (must
/// be positive and a multiple of 4). `thread_count` bounds the worker
/// threads used to sort each in-memory chunk (must be at least 1).
///
/// An empty input file is a no-op success, handled here rather than only
/// at the CLI boundary so the library is correct when called directly.
pub fn sort(path: &Path, buffer_bytes: u32, thread_count: usize) -> Result<()> {
    if buffer_bytes == 0 || buffer_bytes % 4 != 0 {
        return Err(SortError::InvalidBufferSize(buffer_bytes));
    }
    if (buffer_bytes / 4) as usize <= merge::K {
        // the merger partitions the buffer into K + 1 sub-buffers, so it
        // needs strictly more than K integers' worth of capacity.
        return Err(SortError::InvalidBufferSize(buffer_bytes));
    }
    if thread_count == 0 {
        return Err(SortError::InvalidThreadCount);
    }

    if is_empty_file(path)? {
        info!("input file is empty, nothing to sort");
        return Ok(());
    }

    let capacity = (buffer_bytes / 4) as usize;
    let mut buffer = ChunkBuffer::new(capacity);
    let temp_dir = TempDirGuard::create()?;

    let started = Instant::now();
    let run_count = ingest(path, &mut buffer, temp_dir.path(), thread_count)?;
    info!("ingest produced {run_count} run file(s) in {:?}", started.elapsed());

    let merge_started = Instant::now();
    let terminal = merge::kmerge(temp_dir.path(), run_count, &mut buffer)?;
    info!("merge produced terminal file in {:?}", merge_started.elapsed());

    let writeback_started = Instant::now();
    write_back(&terminal, path, &mut buffer)?;
    info!("write-back finished in {:?}", writeback_started.elapsed());

    // `temp_dir` is dropped here, removing the directory on every exit
    // path including the early returns above via `?`.
    Ok(())
}

fn is_empty_file(path: &Path) -> Result<bool> {
    Ok(std::fs::metadata(path)?.len() == 0)
}

/// Streams `path` line by line, filling the shared buffer to capacity and
/// flushing each full (or final partial) chunk to a sorted stage-0 run
/// file. Returns the number of run files produced.
fn ingest(path: &Path, buffer: &mut ChunkBuffer, tmpdir: &Path, threads: usize) -> Result<usize> {
    use std::io::BufRead;

    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let capacity = buffer.capacity();

    let mut chunk_index = 0usize;
    let mut filled = 0usize;
    let mut line_no = 0u64;

    loop {
        {
            let slice = buffer.as_chunk_slice();
            while filled < capacity {
                line_no += 1;
                match io::read_int_line(&mut reader, line_no)? {
                    Some(value) => {
                        slice[filled] = value;
                        filled += 1;
                    }
                    None => break,
                }
            }
        }

        if filled == 0 {
            break;
        }

        parallel_sort::sort_chunk(&mut buffer.as_chunk_slice()[..filled], threads)?;
        flush_run(buffer, filled, tmpdir, chunk_index)?;
        chunk_index += 1;

        if filled < capacity {
            // that was the final, partial chunk (EOF reached mid-fill)
            break;
        }
        filled = 0;

        if reader.fill_buf()?.is_empty() {
            break;
        }
    }

    Ok(chunk_index)
}

fn flush_run(buffer: &mut ChunkBuffer, filled: usize, tmpdir: &Path, index: usize) -> Result<()> {
    let path = io::run_file_path(tmpdir, 0, index);
    let mut file = io::create_write(&path)?;
    io::write_block(&mut file, &buffer.as_chunk_slice()[..filled])?;
    Ok(())
}

/// Reads the terminal merged file in binary blocks and rewrites `output`
/// in text form, truncating it first.
fn write_back(terminal: &Path, output: &Path, buffer: &mut ChunkBuffer) -> Result<()> {
    let mut in_file = io::open_read(terminal)?;
    let mut out_file = std::io::BufWriter::new(io::create_write(output)?);

    loop {
        let block = buffer.as_chunk_slice();
        let n = io::read_block(&mut in_file, block)?;
        if n == 0 {
            break;
        }
        for &value in &block[..n] {
            io::write_int_line(&mut out_file, value)?;
        }
    }

    use std::io::Write;
    out_file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_lines(path: &Path, values: &[i32]) {
        let mut f = File::create(path).unwrap();
        for v in values {
            writeln!(f, "{v}").unwrap();
        }
    }

    fn read_lines(path: &Path) -> Vec<i32> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| l.parse().unwrap())
            .collect()
    }

    #[test]
    fn sorts_a_small_file_in_place() {
        let dir = tempdir::TempDir::new("orch_test").unwrap();
        let file = dir.path().join("input.txt");
        write_lines(&file, &[3, 1, 2]);
        sort(&file, 4096, 2).unwrap();
        assert_eq!(read_lines(&file), vec![1, 2, 3]);
    }

    #[test]
    fn empty_file_is_a_no_op() {
        let dir = tempdir::TempDir::new("orch_test").unwrap();
        let file = dir.path().join("input.txt");
        File::create(&file).unwrap();
        sort(&file, 4096, 2).unwrap();
        assert_eq!(std::fs::metadata(&file).unwrap().len(), 0);
    }

    #[test]
    fn single_integer_file_is_untouched() {
        let dir = tempdir::TempDir::new("orch_test").unwrap();
        let file = dir.path().join("input.txt");
        write_lines(&file, &[42]);
        sort(&file, 4096, 2).unwrap();
        assert_eq!(read_lines(&file), vec![42]);
    }

    #[test]
    fn duplicate_keys_preserve_multiplicity() {
        let dir = tempdir::TempDir::new("orch_test").unwrap();
        let file = dir.path().join("input.txt");
        write_lines(&file, &[5, 5, 5, 5]);
        sort(&file, 4096, 2).unwrap();
        assert_eq!(read_lines(&file), vec![5, 5, 5, 5]);
    }

    #[test]
    fn extreme_values_sort_correctly() {
        let dir = tempdir::TempDir::new("orch_test").unwrap();
        let file = dir.path().join("input.txt");
        write_lines(&file, &[i32::MIN, 0, i32::MAX, -1, 1]);
        sort(&file, 128, 2).unwrap();
        assert_eq!(read_lines(&file), vec![i32::MIN, -1, 0, 1, i32::MAX]);
    }

    #[test]
    fn small_buffer_forces_multiple_stage_zero_runs() {
        let dir = tempdir::TempDir::new("orch_test").unwrap();
        let file = dir.path().join("input.txt");
        let values: Vec<i32> = (0..2000).rev().collect();
        write_lines(&file, &values);
        // 80-byte buffer = 20 integers per chunk (> K = 16, the minimum the
        // merger needs to partition its sub-buffers), forcing 100 stage-0
        // runs and two merge stages (100 -> 7 -> 1).
        sort(&file, 80, 3).unwrap();
        let mut expected = values;
        expected.sort();
        assert_eq!(read_lines(&file), expected);
    }

    #[test]
    fn rejects_invalid_buffer_size() {
        let dir = tempdir::TempDir::new("orch_test").unwrap();
        let file = dir.path().join("input.txt");
        write_lines(&file, &[1]);
        assert!(matches!(
            sort(&file, 3, 1),
            Err(SortError::InvalidBufferSize(3))
        ));
    }

    #[test]
    fn rejects_zero_threads() {
        let dir = tempdir::TempDir::new("orch_test").unwrap();
        let file = dir.path().join("input.txt");
        write_lines(&file, &[1]);
        assert!(matches!(sort(&file, 128, 0), Err(SortError::InvalidThreadCount)));
    }
}
