use std::io;
use std::io::{ErrorKind, Seek, SeekFrom, Write};

/// Output sink for benchmarks: drops the decompressed bytes but keeps a file
/// position, so the measured output length matches what a file would hold.
#[derive(Default)]
pub struct Discard {
    pos: u64,
    len: u64,
}

impl Write for Discard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pos = self.pos.saturating_add(buf.len() as u64);
        self.len = self.len.max(self.pos);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for Discard {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(offset) => self.len.checked_add_signed(offset),
            SeekFrom::Current(offset) => self.pos.checked_add_signed(offset),
        };
        self.pos = target.ok_or_else(|| {
            io::Error::new(ErrorKind::InvalidInput, "seek before start or past u64::MAX")
        })?;
        self.len = self.len.max(self.pos);
        Ok(self.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_tracks_writes() {
        let mut sink = Discard::default();
        sink.write_all(&[0; 100]).unwrap();
        assert_eq!(sink.stream_position().unwrap(), 100);
        assert_eq!(sink.seek(SeekFrom::End(-10)).unwrap(), 90);
        assert!(sink.seek(SeekFrom::Current(-91)).is_err());
    }
}
