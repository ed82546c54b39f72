use std::num::ParseIntError;

/// Errors surfaced by the sort core and its CLI front-end.
///
/// Every variant corresponds to one row of the error taxonomy: parse
/// failures abort ingest, I/O failures abort whatever stage triggered them,
/// and the orchestrator guarantees temp-directory removal regardless of
/// which variant it sees.
#[derive(Debug, thiserror::Error)]
pub enum SortError {
    #[error("line {line}: failed to parse integer: {source}")]
    Parse {
        line: u64,
        #[source]
        source: ParseIntError,
    },

    #[error("line {line}: {reason}")]
    MalformedLine { line: u64, reason: &'static str },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to create temporary directory (tried system temp dir and ./)")]
    TempDir,

    #[error("worker thread panicked during parallel sort")]
    ThreadPanic,

    #[error(
        "buffer_bytes must be positive, a multiple of 4, and large enough to hold more than \
         16 integers (the merger's fan-in), got {0}"
    )]
    InvalidBufferSize(u32),

    #[error("thread_count must be at least 1")]
    InvalidThreadCount,
}

pub type Result<T> = std::result::Result<T, SortError>;
