//! Text line parsing, binary block I/O and temp-directory management.
//!
//! These are the "external collaborators" the core spec treats as opaque;
//! here they are plain in-crate helpers since no crate on the corpus
//! provides exactly this text<->binary pairing for a bare stream of
//! signed 32-bit integers.

use std::fs::{self, File};
use std::io::{BufRead, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, SortError};

/// Reads the next non-newline-terminator-bearing line from `reader` into
/// `line_buf`, trimming exactly one trailing `\n` (and a preceding `\r`, in
/// case the file came from a different platform). Returns `Ok(None)` at
/// EOF.
///
/// `line_no` is 1-based and used only for error messages.
pub fn read_int_line<R: BufRead>(reader: &mut R, line_no: u64) -> Result<Option<i32>> {
    let mut raw = String::new();
    let bytes_read = reader.read_line(&mut raw)?;
    if bytes_read == 0 {
        return Ok(None);
    }

    if raw.ends_with('\n') {
        raw.pop();
        if raw.ends_with('\r') {
            raw.pop();
        }
    }

    if raw.is_empty() {
        return Err(SortError::MalformedLine {
            line: line_no,
            reason: "empty line",
        });
    }
    if raw.starts_with(char::is_whitespace) {
        return Err(SortError::MalformedLine {
            line: line_no,
            reason: "leading whitespace",
        });
    }

    raw.parse::<i32>()
        .map(Some)
        .map_err(|source| SortError::Parse { line: line_no, source })
}

/// Writes `value` as a decimal line terminated by `\n`.
pub fn write_int_line<W: Write>(writer: &mut W, value: i32) -> Result<()> {
    let mut tmp = itoa_buf();
    let s = format_i32(value, &mut tmp);
    writer.write_all(s.as_bytes())?;
    writer.write_all(b"\n")?;
    Ok(())
}

fn itoa_buf() -> [u8; 11] {
    [0u8; 11]
}

/// Formats `value` into `buf` without going through the heap-allocating
/// `ToString`; returns the written slice as `&str`.
fn format_i32(value: i32, buf: &mut [u8; 11]) -> &str {
    use std::io::Write as _;
    let mut cursor: &mut [u8] = buf;
    write!(cursor, "{}", value).unwrap();
    let written = 11 - cursor.len();
    std::str::from_utf8(&buf[..written]).unwrap()
}

/// Reads up to `out.len()` integers from `file` in binary (host-endian,
/// 4-byte) form, filling `out` from the front. Returns the number of
/// integers actually read (fewer than `out.len()` only at EOF).
pub fn read_block(file: &mut File, out: &mut [i32]) -> Result<usize> {
    let mut byte_buf = vec![0u8; out.len() * 4];
    let mut filled = 0usize;
    loop {
        let n = file.read(&mut byte_buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    if filled % 4 != 0 {
        return Err(SortError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "run file truncated mid-integer",
        )));
    }
    let count = filled / 4;
    for i in 0..count {
        let bytes = [
            byte_buf[i * 4],
            byte_buf[i * 4 + 1],
            byte_buf[i * 4 + 2],
            byte_buf[i * 4 + 3],
        ];
        out[i] = i32::from_ne_bytes(bytes);
    }
    Ok(count)
}

/// Writes `data` to `file` as raw host-endian 4-byte integers.
pub fn write_block(file: &mut File, data: &[i32]) -> Result<()> {
    let mut byte_buf = Vec::with_capacity(data.len() * 4);
    for &value in data {
        byte_buf.extend_from_slice(&value.to_ne_bytes());
    }
    file.write_all(&byte_buf)?;
    Ok(())
}

/// A run/stage file path: `{tmpdir}/{stage}_{index}`.
pub fn run_file_path(tmpdir: &Path, stage: usize, index: usize) -> PathBuf {
    tmpdir.join(format!("{stage}_{index}"))
}

pub fn open_read(path: &Path) -> Result<File> {
    Ok(File::open(path)?)
}

pub fn create_write(path: &Path) -> Result<File> {
    Ok(File::create(path)?)
}

/// Owns a process-private temporary directory, removing it (recursively)
/// on drop regardless of how the scope holding it was left -- success,
/// propagated error, or unwinding panic.
pub struct TempDirGuard {
    path: PathBuf,
}

impl TempDirGuard {
    /// Tries `/tmp/tmpdir.XXXXXX` first (via `std::env::temp_dir()`),
    /// falling back to `./tmpdir.XXXXXX` if the system temp dir is not
    /// writable.
    pub fn create() -> Result<TempDirGuard> {
        if let Ok(dir) = tempdir::TempDir::new_in(std::env::temp_dir(), "tmpdir") {
            return Ok(TempDirGuard { path: dir.into_path() });
        }
        if let Ok(dir) = tempdir::TempDir::new_in(".", "tmpdir") {
            return Ok(TempDirGuard { path: dir.into_path() });
        }
        Err(SortError::TempDir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_signed_decimal_lines() {
        let mut reader = Cursor::new(b"3\n-7\n0\n".to_vec());
        assert_eq!(read_int_line(&mut reader, 1).unwrap(), Some(3));
        assert_eq!(read_int_line(&mut reader, 2).unwrap(), Some(-7));
        assert_eq!(read_int_line(&mut reader, 3).unwrap(), Some(0));
        assert_eq!(read_int_line(&mut reader, 4).unwrap(), None);
    }

    #[test]
    fn trailing_newline_at_eof_is_optional() {
        let mut reader = Cursor::new(b"42".to_vec());
        assert_eq!(read_int_line(&mut reader, 1).unwrap(), Some(42));
        assert_eq!(read_int_line(&mut reader, 2).unwrap(), None);
    }

    #[test]
    fn leading_whitespace_is_an_error() {
        let mut reader = Cursor::new(b" 1\n".to_vec());
        assert!(read_int_line(&mut reader, 1).is_err());
    }

    #[test]
    fn empty_line_is_an_error() {
        let mut reader = Cursor::new(b"\n".to_vec());
        assert!(read_int_line(&mut reader, 1).is_err());
    }

    #[test]
    fn extreme_values_roundtrip_through_text() {
        let mut out = Vec::new();
        write_int_line(&mut out, i32::MIN).unwrap();
        write_int_line(&mut out, i32::MAX).unwrap();
        let mut reader = Cursor::new(out);
        assert_eq!(read_int_line(&mut reader, 1).unwrap(), Some(i32::MIN));
        assert_eq!(read_int_line(&mut reader, 2).unwrap(), Some(i32::MAX));
    }

    #[test]
    fn temp_dir_guard_removes_directory_on_drop() {
        let guard = TempDirGuard::create().unwrap();
        let path = guard.path().to_path_buf();
        assert!(path.exists());
        drop(guard);
        assert!(!path.exists());
    }
}
