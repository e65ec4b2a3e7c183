//! ByteSource trait - abstract seekable byte source for header decoding.

use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::Result;

/// Inclusive byte range inside a byte source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReadInterval {
    pub start: u64,
    pub end: u64,
}

impl ReadInterval {
    /// Number of bytes covered by the interval.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Readable, seekable byte source the decoder pulls header bytes from.
///
/// `total_len` may return `None` when the length is not known up front;
/// reads are then attempted and short reads reported as truncation.
/// Sources that grow between calls (a buffer the caller keeps appending
/// to) must report the current length each time.
pub trait ByteSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn seek(&mut self, pos: u64) -> io::Result<()>;
    fn tell(&mut self) -> io::Result<u64>;
    fn total_len(&mut self) -> io::Result<Option<u64>>;
}

fn seekable_len<S: Seek>(source: &mut S) -> io::Result<Option<u64>> {
    let pos = source.stream_position()?;
    let len = source.seek(SeekFrom::End(0))?;
    if len != pos {
        source.seek(SeekFrom::Start(pos))?;
    }
    Ok(Some(len))
}

impl ByteSource for File {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(self, buf)
    }

    fn seek(&mut self, pos: u64) -> io::Result<()> {
        Seek::seek(self, SeekFrom::Start(pos)).map(|_| ())
    }

    fn tell(&mut self) -> io::Result<u64> {
        self.stream_position()
    }

    fn total_len(&mut self) -> io::Result<Option<u64>> {
        Ok(Some(self.metadata()?.len()))
    }
}

impl<T: AsRef<[u8]>> ByteSource for Cursor<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(self, buf)
    }

    fn seek(&mut self, pos: u64) -> io::Result<()> {
        self.set_position(pos);
        Ok(())
    }

    fn tell(&mut self) -> io::Result<u64> {
        Ok(self.position())
    }

    fn total_len(&mut self) -> io::Result<Option<u64>> {
        Ok(Some(self.get_ref().as_ref().len() as u64))
    }
}

impl<R: Read + Seek> ByteSource for BufReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(self, buf)
    }

    fn seek(&mut self, pos: u64) -> io::Result<()> {
        Seek::seek(self, SeekFrom::Start(pos)).map(|_| ())
    }

    fn tell(&mut self) -> io::Result<u64> {
        self.stream_position()
    }

    fn total_len(&mut self) -> io::Result<Option<u64>> {
        seekable_len(self)
    }
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn seek(&mut self, pos: u64) -> io::Result<()> {
        (**self).seek(pos)
    }

    fn tell(&mut self) -> io::Result<u64> {
        (**self).tell()
    }

    fn total_len(&mut self) -> io::Result<Option<u64>> {
        (**self).total_len()
    }
}

/// Local file implementation.
#[derive(Debug)]
pub struct LocalFileMedia {
    file: File,
    name: String,
}

impl LocalFileMedia {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        Ok(Self { file, name })
    }

    pub fn length(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read an inclusive byte range, e.g. a record's payload.
    pub fn read_range_sync(&mut self, interval: ReadInterval) -> Result<Vec<u8>> {
        Seek::seek(&mut self.file, SeekFrom::Start(interval.start))?;
        let mut buffer = vec![0u8; interval.len() as usize];
        self.file.read_exact(&mut buffer)?;
        Ok(buffer)
    }
}

impl ByteSource for LocalFileMedia {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(&mut self.file, buf)
    }

    fn seek(&mut self, pos: u64) -> io::Result<()> {
        Seek::seek(&mut self.file, SeekFrom::Start(pos)).map(|_| ())
    }

    fn tell(&mut self) -> io::Result<u64> {
        self.file.stream_position()
    }

    fn total_len(&mut self) -> io::Result<Option<u64>> {
        self.length().map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_cursor_reports_growing_length() {
        let mut source = Cursor::new(vec![1u8, 2, 3]);
        assert_eq!(source.total_len().unwrap(), Some(3));
        source.get_mut().extend_from_slice(&[4, 5]);
        assert_eq!(source.total_len().unwrap(), Some(5));
    }

    #[test]
    fn test_buf_reader_len_keeps_position() {
        let mut source = BufReader::new(Cursor::new(vec![0u8; 10]));
        ByteSource::seek(&mut source, 4).unwrap();
        assert_eq!(source.total_len().unwrap(), Some(10));
        assert_eq!(ByteSource::tell(&mut source).unwrap(), 4);
    }

    #[test]
    fn test_local_file_media() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"Rar!payload").unwrap();
        tmp.flush().unwrap();

        let mut media = LocalFileMedia::open(tmp.path()).unwrap();
        assert_eq!(media.length().unwrap(), 11);
        assert_eq!(media.total_len().unwrap(), Some(11));
        let bytes = media
            .read_range_sync(ReadInterval { start: 4, end: 10 })
            .unwrap();
        assert_eq!(bytes, b"payload");
    }
}
