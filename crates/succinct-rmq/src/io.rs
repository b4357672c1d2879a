//! Positional reads over persisted indexes.
//!
//! An index is read piecewise: the header once, then single table entries at computed offsets.
//! Anything that can serve an exact read at an arbitrary position can back an index, e.g. a byte
//! buffer or a file.

use std::{fs::File, path::Path, sync::Arc};

/// A conceptual file or buffer that supports reading from arbitrary positions.
///
/// Implementations must be safe for concurrent reads, as queries on a shared index only take
/// `&self`.
pub trait ReadAt: Send + Sync {
    /// Returns the size of the underlying object.
    fn size(&self) -> std::io::Result<u64>;

    /// Fills `buf` with the bytes starting at `pos`.
    ///
    /// Fails with [`std::io::ErrorKind::UnexpectedEof`] if the object ends before `buf` is full.
    fn read_exact_at(&self, pos: u64, buf: &mut [u8]) -> std::io::Result<()>;
}

impl ReadAt for [u8] {
    fn size(&self) -> std::io::Result<u64> {
        Ok(self.len() as u64)
    }

    fn read_exact_at(&self, pos: u64, buf: &mut [u8]) -> std::io::Result<()> {
        let start = usize::try_from(pos).map_err(|_| eof())?;
        let end = start.checked_add(buf.len()).ok_or_else(eof)?;
        let src = self.get(start..end).ok_or_else(eof)?;
        buf.copy_from_slice(src);
        Ok(())
    }
}

impl ReadAt for Vec<u8> {
    fn size(&self) -> std::io::Result<u64> {
        self.as_slice().size()
    }

    fn read_exact_at(&self, pos: u64, buf: &mut [u8]) -> std::io::Result<()> {
        self.as_slice().read_exact_at(pos, buf)
    }
}

impl<R: ReadAt + ?Sized> ReadAt for &R {
    fn size(&self) -> std::io::Result<u64> {
        (**self).size()
    }

    fn read_exact_at(&self, pos: u64, buf: &mut [u8]) -> std::io::Result<()> {
        (**self).read_exact_at(pos, buf)
    }
}

impl<R: ReadAt + ?Sized> ReadAt for Arc<R> {
    fn size(&self) -> std::io::Result<u64> {
        (**self).size()
    }

    fn read_exact_at(&self, pos: u64, buf: &mut [u8]) -> std::io::Result<()> {
        (**self).read_exact_at(pos, buf)
    }
}

fn eof() -> std::io::Error {
    std::io::ErrorKind::UnexpectedEof.into()
}

/// A file read with positional reads, without moving any shared cursor.
#[derive(Debug)]
pub struct FileReader(File);

impl FileReader {
    pub fn open<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        File::open(path).map(Self)
    }
}

impl From<File> for FileReader {
    fn from(file: File) -> Self {
        Self(file)
    }
}

impl ReadAt for FileReader {
    fn size(&self) -> std::io::Result<u64> {
        Ok(self.0.metadata()?.len())
    }

    #[cfg(unix)]
    fn read_exact_at(&self, pos: u64, buf: &mut [u8]) -> std::io::Result<()> {
        std::os::unix::fs::FileExt::read_exact_at(&self.0, buf, pos)
    }

    #[cfg(windows)]
    fn read_exact_at(&self, mut pos: u64, mut buf: &mut [u8]) -> std::io::Result<()> {
        use std::os::windows::fs::FileExt;

        while !buf.is_empty() {
            match self.0.seek_read(buf, pos)? {
                0 => return Err(eof()),
                n => {
                    buf = &mut buf[n..];
                    pos += n as u64;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_memory_reader() -> std::io::Result<()> {
        let data = b"abcdefgh".to_vec();
        assert_eq!(data.size()?, 8);

        let mut buf = [0u8; 3];
        data.read_exact_at(2, &mut buf)?;
        assert_eq!(&buf, b"cde");

        data.read_exact_at(5, &mut buf)?;
        assert_eq!(&buf, b"fgh");

        let err = data.read_exact_at(6, &mut buf).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);

        let shared: Arc<[u8]> = data.into();
        shared.read_exact_at(0, &mut buf)?;
        assert_eq!(&buf, b"abc");
        Ok(())
    }

    #[test]
    fn test_file_reader() -> std::io::Result<()> {
        let tempdir = tempfile::tempdir()?;
        let path = tempdir.path().join("test.bin");
        let mut file = File::create(&path)?;
        for _ in 0..10 {
            file.write_all(b"abcdefgh")?;
        }
        file.sync_all()?;
        drop(file);

        let reader = FileReader::open(&path)?;
        assert_eq!(reader.size()?, 80);
        let mut buf = [0u8; 4];
        for pos in (0..80).step_by(8) {
            reader.read_exact_at(pos, &mut buf)?;
            assert_eq!(&buf, b"abcd");
        }

        let err = reader.read_exact_at(78, &mut buf).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
        Ok(())
    }
}
