use std::io::{Read, Seek, SeekFrom};

use crate::error::{Error, Result};

/// Sequential reader over a seekable input that knows where the input ends.
///
/// Reads and forward skips past the end fail with
/// [`Error::TruncatedInput`] without consuming anything.
#[derive(Debug)]
pub struct InputCursor<R> {
    inner: R,
    offset: u64,
    len: u64,
}

impl<R: Read + Seek> InputCursor<R> {
    /// Wraps `inner`, starting at its current position
    pub fn new(mut inner: R) -> Result<Self> {
        let offset = inner.stream_position()?;
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(offset))?;
        Ok(Self { inner, offset, len })
    }

    /// Absolute position in the input
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Bytes left before the end of the input
    pub fn remaining(&self) -> u64 {
        self.len.saturating_sub(self.offset)
    }

    fn ensure(&self, requested: u64) -> Result<()> {
        let available = self.remaining();
        if available < requested {
            return Err(Error::truncated(self.offset, requested, available));
        }
        Ok(())
    }

    /// Fills `buf` completely
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.ensure(buf.len() as u64)?;
        self.inner.read_exact(buf)?;
        self.offset += buf.len() as u64;
        Ok(())
    }

    /// Moves forward by `n` bytes
    pub fn skip(&mut self, n: u64) -> Result<()> {
        if n == 0 {
            return Ok(());
        }
        self.ensure(n)?;
        self.offset = self.inner.seek(SeekFrom::Start(self.offset + n))?;
        Ok(())
    }

    /// Moves back by `n` bytes, undoing a prefetch
    pub fn rewind(&mut self, n: u64) -> Result<()> {
        if n == 0 {
            return Ok(());
        }
        let target = self.offset.saturating_sub(n);
        self.offset = self.inner.seek(SeekFrom::Start(target))?;
        Ok(())
    }

    /// Returns the wrapped reader
    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_reads_and_skips() {
        let mut data = Cursor::new(vec![1u8, 2, 3, 4, 5]);
        data.set_position(1);
        let mut cursor = InputCursor::new(data).unwrap();
        assert_eq!(cursor.offset(), 1);
        assert_eq!(cursor.remaining(), 4);

        let mut buf = [0u8; 2];
        cursor.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [2, 3]);
        cursor.skip(1).unwrap();
        assert_eq!(cursor.offset(), 4);
        cursor.rewind(3).unwrap();
        cursor.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [2, 3]);
    }

    #[test]
    fn test_truncation_consumes_nothing() {
        let mut cursor = InputCursor::new(Cursor::new(vec![1u8, 2])).unwrap();
        let mut buf = [0u8; 3];
        let err = cursor.read_exact(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            Error::TruncatedInput {
                offset: 0,
                requested: 3,
                available: 2
            }
        ));
        assert_eq!(cursor.offset(), 0);
        assert!(cursor.skip(3).is_err());
        cursor.skip(2).unwrap();
        assert_eq!(cursor.remaining(), 0);
    }
}
