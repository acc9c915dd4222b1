//! Fixed-size binary record encoding.
//!
//! Cache files hold exactly one record of a known size. Numbers are
//! little-endian; strings occupy a fixed-width, NUL-padded field. A file whose
//! length differs from the record size is treated as absent, so a torn or
//! foreign file never parses into garbage.

/// A record with a fixed on-disk size.
pub trait FixedRecord: Sized {
    /// Exact encoded length in bytes.
    const SIZE: usize;

    /// Encodes into exactly [`Self::SIZE`] bytes.
    fn encode(&self) -> Vec<u8>;

    /// Decodes a record, or `None` if `bytes` is not exactly [`Self::SIZE`] long.
    fn decode(bytes: &[u8]) -> Option<Self>;
}

/// Truncates `value` to at most `max_bytes`, keeping the prefix and never
/// splitting a UTF-8 character.
pub fn truncate_to_boundary(value: &str, max_bytes: usize) -> &str {
    if value.len() <= max_bytes {
        return value;
    }
    let mut end = max_bytes;
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

pub(crate) struct RecordWriter {
    buf: Vec<u8>,
}

impl RecordWriter {
    pub(crate) fn with_capacity(size: usize) -> Self {
        Self {
            buf: Vec::with_capacity(size),
        }
    }

    pub(crate) fn i64(&mut self, value: i64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub(crate) fn u32(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub(crate) fn f64(&mut self, value: f64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Writes a `width`-byte field. At most `width - 1` bytes of text are
    /// kept so the field always ends in NUL.
    pub(crate) fn text(&mut self, value: &str, width: usize) -> &mut Self {
        let kept = truncate_to_boundary(value, width.saturating_sub(1));
        self.buf.extend_from_slice(kept.as_bytes());
        self.buf.resize(self.buf.len() + (width - kept.len()), 0);
        self
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Sequential field reader over one encoded record.
///
/// Callers pass exactly [`FixedRecord::SIZE`] bytes (every `decode` checks the
/// length first). Fields past the end of a shorter slice read as zero or empty
/// rather than panicking.
pub(crate) struct RecordReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> RecordReader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        if let Some(field) = self.bytes.get(self.pos..self.pos + N) {
            out.copy_from_slice(field);
        }
        self.pos += N;
        out
    }

    pub(crate) fn i64(&mut self) -> i64 {
        i64::from_le_bytes(self.take())
    }

    pub(crate) fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }

    pub(crate) fn f64(&mut self) -> f64 {
        f64::from_le_bytes(self.take())
    }

    pub(crate) fn text(&mut self, width: usize) -> String {
        let field = self.bytes.get(self.pos..self.pos + width).unwrap_or(&[]);
        self.pos += width;
        let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        String::from_utf8_lossy(&field[..end]).into_owned()
    }
}
