#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "bitcode")]
    #[error("Codec error")]
    Codec(#[from] bitcode::Error),

    #[error("Bad magic bytes {found:?}, expected \"MSS\"")]
    BadMagic { found: [u8; 3] },

    #[error("Malformed index: {reason}")]
    Malformed { reason: String },

    #[error("Invalid range [{start}, {end}] for a sequence of length {len}")]
    InvalidRange {
        start: usize,
        end: usize,
        len: usize,
    },

    #[error("Sequence of length {len} is too large to be indexed")]
    TooLarge { len: usize },
}

impl Error {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Check that `[start, end]` is a valid inclusive range over `len` elements.
pub(crate) fn check_range(start: usize, end: usize, len: usize) -> Result<()> {
    if start <= end && end < len {
        Ok(())
    } else {
        Err(Error::InvalidRange { start, end, len })
    }
}
