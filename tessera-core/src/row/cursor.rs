//! Byte cursors for row encoding and decoding.
//!
//! [`RowWriter`] owns the output buffer: the fixed region is zero-filled up
//! front and written slot by slot, while the variable region only grows by
//! appending, so its current length is always the next payload offset.
//! [`RowReader`] exposes bounds-checked reads that return `None` instead of
//! indexing past the end of the buffer.

/// Writer over a row buffer of known final size.
pub struct RowWriter {
    buf: Vec<u8>,
}

impl RowWriter {
    /// Allocates `total` bytes of capacity with a zeroed fixed region.
    pub fn new(fixed_len: usize, total: usize) -> Self {
        let mut buf = Vec::with_capacity(total.max(fixed_len));
        buf.resize(fixed_len, 0);
        Self { buf }
    }

    /// Current end of the buffer; the offset the next appended payload gets.
    #[inline]
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    /// Writes `bytes` into a fixed-region slot.
    ///
    /// Slots come from the schema layout and always lie inside the fixed
    /// region allocated in [`RowWriter::new`].
    #[inline]
    pub fn write_slot(&mut self, offset: usize, bytes: &[u8]) {
        self.buf[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    #[inline]
    pub fn append(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    #[inline]
    pub fn append_u16(&mut self, v: u16) {
        self.append(&v.to_ne_bytes());
    }

    #[inline]
    pub fn append_u32(&mut self, v: u32) {
        self.append(&v.to_ne_bytes());
    }

    #[inline]
    pub fn append_i64(&mut self, v: i64) {
        self.append(&v.to_ne_bytes());
    }

    #[inline]
    pub fn append_f32(&mut self, v: f32) {
        self.append(&v.to_ne_bytes());
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// Bounds-checked reader over an encoded row.
#[derive(Clone, Copy)]
pub struct RowReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> RowReader<'a> {
    /// Positions a reader at `pos`.
    pub fn at(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    /// Reads `n` bytes and advances, or `None` if fewer remain.
    pub fn bytes(&mut self, n: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(n)?;
        let out = self.buf.get(self.pos..end)?;
        self.pos = end;
        Some(out)
    }

    fn array<const N: usize>(&mut self) -> Option<[u8; N]> {
        self.bytes(N)?.try_into().ok()
    }

    pub fn u8(&mut self) -> Option<u8> {
        self.array::<1>().map(|b| b[0])
    }

    pub fn u16(&mut self) -> Option<u16> {
        self.array().map(u16::from_ne_bytes)
    }

    pub fn u32(&mut self) -> Option<u32> {
        self.array().map(u32::from_ne_bytes)
    }

    pub fn i64(&mut self) -> Option<i64> {
        self.array().map(i64::from_ne_bytes)
    }

    pub fn u64(&mut self) -> Option<u64> {
        self.array().map(u64::from_ne_bytes)
    }

    pub fn f32(&mut self) -> Option<f32> {
        self.array().map(f32::from_ne_bytes)
    }

    // Little-endian reads for the portable index files.

    pub fn u32_le(&mut self) -> Option<u32> {
        self.array().map(u32::from_le_bytes)
    }

    pub fn u64_le(&mut self) -> Option<u64> {
        self.array().map(u64::from_le_bytes)
    }

    pub fn f32_le(&mut self) -> Option<f32> {
        self.array().map(f32::from_le_bytes)
    }

    /// Bytes left after the current position.
    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_slots_and_append() {
        let mut w = RowWriter::new(5, 9);
        w.write_slot(1, &7u32.to_ne_bytes());
        assert_eq!(w.position(), 5);
        w.append_u16(3);
        w.append(b"ab");
        assert_eq!(w.position(), 9);

        let buf = w.into_inner();
        let mut r = RowReader::at(&buf, 1);
        assert_eq!(r.u32(), Some(7));
        assert_eq!(r.u16(), Some(3));
        assert_eq!(r.bytes(2), Some(&b"ab"[..]));
        assert_eq!(r.u8(), None);
    }

    #[test]
    fn test_reader_never_overruns() {
        let buf = [1u8, 2, 3];
        assert_eq!(RowReader::at(&buf, 0).u32(), None);
        assert_eq!(RowReader::at(&buf, 10).u8(), None);
        assert_eq!(RowReader::at(&buf, usize::MAX).bytes(2), None);
        assert_eq!(RowReader::at(&buf, 1).u16(), Some(u16::from_ne_bytes([2, 3])));
        assert_eq!(RowReader::at(&buf, 10).remaining(), 0);
    }

    #[test]
    fn test_little_endian_reads() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&9u64.to_le_bytes());
        buf.extend_from_slice(&1.5f32.to_le_bytes());
        let mut r = RowReader::at(&buf, 0);
        assert_eq!(r.u64_le(), Some(9));
        assert_eq!(r.remaining(), 4);
        assert_eq!(r.f32_le(), Some(1.5));
        assert_eq!(r.u32_le(), None);
    }
}
