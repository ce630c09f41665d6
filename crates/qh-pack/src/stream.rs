use std::io::{self, Read};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Sniffing,
    Replaying,
}

/// A reader that records what it hands out until told to replay it.
///
/// While sniffing, every byte returned from [`Read::read`] is also appended to an internal
/// buffer. After [`SniffReader::replay`], reads first drain that buffer and then continue from
/// the source without recording, so a consumer reading to the end sees exactly the bytes the
/// source produced, no matter how much was sniffed beforehand.
///
/// ```
/// use std::io::Read;
/// use qh_pack::SniffReader;
///
/// let mut reader = SniffReader::new(&b"\x1f\x8bpayload"[..]);
/// assert_eq!(reader.sniff(2).unwrap(), b"\x1f\x8b");
/// reader.replay();
///
/// let mut all = Vec::new();
/// reader.read_to_end(&mut all).unwrap();
/// assert_eq!(all, b"\x1f\x8bpayload");
/// ```
#[derive(Debug)]
pub struct SniffReader<R> {
    inner: R,
    recorded: Vec<u8>,
    cursor: usize,
    mode: Mode,
}

impl<R: Read> SniffReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            recorded: Vec::new(),
            cursor: 0,
            mode: Mode::Sniffing,
        }
    }

    /// Reads through the recording path until `limit` bytes are recorded or the source ends.
    ///
    /// Returns everything recorded so far. Only meaningful before [`SniffReader::replay`];
    /// afterwards the recorded prefix is returned unchanged.
    pub fn sniff(&mut self, limit: usize) -> io::Result<&[u8]> {
        let mut chunk = [0u8; 1024];

        while self.mode == Mode::Sniffing && self.recorded.len() < limit {
            let want = chunk.len().min(limit - self.recorded.len());
            match self.read(&mut chunk[..want]) {
                Ok(0) => break,
                Ok(_) => {}
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }

        Ok(&self.recorded)
    }

    /// Switches from sniffing to replaying.
    ///
    /// The switch happens once; calling this again leaves the replay position where it is.
    pub fn replay(&mut self) {
        if self.mode == Mode::Sniffing {
            self.mode = Mode::Replaying;
            self.cursor = 0;
        }
    }

    pub fn is_replaying(&self) -> bool {
        self.mode == Mode::Replaying
    }

    /// Bytes recorded while sniffing.
    pub fn recorded(&self) -> &[u8] {
        &self.recorded
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for SniffReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.mode {
            Mode::Sniffing => {
                let n = self.inner.read(buf)?;
                self.recorded.extend_from_slice(&buf[..n]);
                Ok(n)
            }
            Mode::Replaying if self.cursor < self.recorded.len() => {
                let pending = &self.recorded[self.cursor..];
                let n = pending.len().min(buf.len());
                buf[..n].copy_from_slice(&pending[..n]);
                self.cursor += n;
                Ok(n)
            }
            Mode::Replaying => self.inner.read(buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hands out at most `step` bytes per read, like a socket or a decoder would.
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    fn sample() -> Vec<u8> {
        (0..=255u8).cycle().take(3000).collect()
    }

    #[test]
    fn test_replay_is_transparent_for_every_split() {
        let data = sample();

        for k in (0..=data.len()).step_by(97).chain([data.len()]) {
            let mut reader = SniffReader::new(Trickle {
                data: &data,
                step: 13,
            });
            assert_eq!(reader.sniff(k).unwrap(), &data[..k]);
            reader.replay();

            let mut out = Vec::new();
            reader.read_to_end(&mut out).unwrap();
            assert_eq!(out, data, "split point {k}");
        }
    }

    #[test]
    fn test_sniff_past_end_records_everything() {
        let mut reader = SniffReader::new(&b"short"[..]);
        assert_eq!(reader.sniff(8192).unwrap(), b"short");

        // EOF is observed during sniffing and again after the replayed prefix.
        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
        reader.replay();

        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"short");
    }

    #[test]
    fn test_replay_without_sniffing() {
        let mut reader = SniffReader::new(&b"abc"[..]);
        reader.replay();

        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "abc");
        assert!(reader.recorded().is_empty());
    }

    #[test]
    fn test_replay_stops_recording() {
        let mut reader = SniffReader::new(&b"0123456789"[..]);
        reader.sniff(4).unwrap();
        reader.replay();

        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(reader.recorded(), b"0123");
    }

    #[test]
    fn test_second_replay_does_not_rewind() {
        let mut reader = SniffReader::new(&b"abcdef"[..]);
        reader.sniff(4).unwrap();
        reader.replay();

        let mut two = [0u8; 2];
        reader.read_exact(&mut two).unwrap();
        assert_eq!(&two, b"ab");

        reader.replay();
        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"cdef");
        assert!(reader.is_replaying());
    }

    #[test]
    fn test_small_reads_during_replay() {
        let mut reader = SniffReader::new(&b"hello world"[..]);
        reader.sniff(5).unwrap();
        reader.replay();

        let mut out = Vec::new();
        let mut byte = [0u8; 1];
        while reader.read(&mut byte).unwrap() == 1 {
            out.push(byte[0]);
        }
        assert_eq!(out, b"hello world");
    }
}
