//! Positioned byte cursor and varint codec
//!
//! [`ByteReader`] walks a borrowed slice with an explicit position so the
//! frame decoder can sniff header fields and rewind without consuming the
//! frame window. [`ByteWriter`] mirrors it over a growable buffer. All
//! fixed-width integers are big-endian per the Kafka wire format; varints
//! use the protocol-buffers zig-zag scheme with 7-bit little-endian groups
//! and the high bit as continuation.

use bytes::{BufMut, BytesMut};

use crate::constants::{MAX_VARINT_BYTES, MAX_VARLONG_BYTES};
use crate::error::{RelayError, Result};

/// Reader over a byte slice with an explicit, rewindable position.
#[derive(Debug)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        ByteReader { buf, pos: 0 }
    }

    /// Current read position from the start of the slice.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left between the position and the end of the slice.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Reset the position to the start of the slice.
    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    /// Move the position to `pos`.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.buf.len() {
            return Err(RelayError::FrameTooShort {
                context: "seek target",
                needed: pos,
                available: self.buf.len(),
            });
        }
        self.pos = pos;
        Ok(())
    }

    fn take(&mut self, n: usize, context: &'static str) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(RelayError::FrameTooShort {
                context,
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1, "u8")?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.take(1, "i8")?[0] as i8)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        let b = self.take(2, "i16")?;
        Ok(i16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let b = self.take(4, "i32")?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        let b = self.take(8, "i64")?;
        Ok(i64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        let b = self.take(8, "f64")?;
        Ok(f64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    /// Read `n` raw bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n, "raw bytes")
    }

    /// Read an i32-length-delimited byte slice; a length of -1 is null.
    pub fn read_length_delimited(&mut self) -> Result<Option<&'a [u8]>> {
        let len = self.read_i32()?;
        if len < 0 {
            return Ok(None);
        }
        Ok(Some(self.take(len as usize, "length-delimited bytes")?))
    }

    /// Read an unsigned 32-bit varint.
    pub fn read_unsigned_varint(&mut self) -> Result<u32> {
        let mut value: u32 = 0;
        for i in 0..MAX_VARINT_BYTES {
            let byte = self.read_u8()?;
            value |= ((byte & 0x7f) as u32) << (i * 7);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(RelayError::MalformedVarint {
            max_bytes: MAX_VARINT_BYTES,
        })
    }

    /// Read a zig-zag encoded 32-bit varint.
    pub fn read_varint(&mut self) -> Result<i32> {
        let raw = self.read_unsigned_varint()?;
        Ok(((raw >> 1) as i32) ^ -((raw & 1) as i32))
    }

    /// Read an unsigned 64-bit varlong.
    pub fn read_unsigned_varlong(&mut self) -> Result<u64> {
        let mut value: u64 = 0;
        for i in 0..MAX_VARLONG_BYTES {
            let byte = self.read_u8()?;
            value |= ((byte & 0x7f) as u64) << (i * 7);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(RelayError::MalformedVarint {
            max_bytes: MAX_VARLONG_BYTES,
        })
    }

    /// Read a zig-zag encoded 64-bit varlong.
    pub fn read_varlong(&mut self) -> Result<i64> {
        let raw = self.read_unsigned_varlong()?;
        Ok(((raw >> 1) as i64) ^ -((raw & 1) as i64))
    }
}

/// Writer over a growable buffer.
///
/// Writing past the current capacity grows the buffer; everything already
/// written and the logical write position survive the growth.
#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: BytesMut,
}

impl ByteWriter {
    pub fn new() -> Self {
        ByteWriter {
            buf: BytesMut::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        ByteWriter {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Number of bytes written so far.
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> BytesMut {
        self.buf
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.buf.put_i8(value);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.buf.put_i16(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.put_i32(value);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buf.put_i64(value);
    }

    pub fn write_f64(&mut self, value: f64) {
        self.buf.put_f64(value);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write an i32-length-delimited byte slice; `None` writes -1.
    pub fn write_length_delimited(&mut self, bytes: Option<&[u8]>) {
        match bytes {
            Some(b) => {
                self.buf.put_i32(b.len() as i32);
                self.buf.extend_from_slice(b);
            }
            None => self.buf.put_i32(-1),
        }
    }

    /// Write an unsigned 32-bit varint.
    pub fn write_unsigned_varint(&mut self, value: u32) {
        let mut v = value;
        while v & !0x7f != 0 {
            self.buf.put_u8((v as u8 & 0x7f) | 0x80);
            v >>= 7;
        }
        self.buf.put_u8(v as u8);
    }

    /// Write a zig-zag encoded 32-bit varint.
    pub fn write_varint(&mut self, value: i32) {
        self.write_unsigned_varint(((value << 1) ^ (value >> 31)) as u32);
    }

    /// Write an unsigned 64-bit varlong.
    pub fn write_unsigned_varlong(&mut self, value: u64) {
        let mut v = value;
        while v & !0x7f != 0 {
            self.buf.put_u8((v as u8 & 0x7f) | 0x80);
            v >>= 7;
        }
        self.buf.put_u8(v as u8);
    }

    /// Write a zig-zag encoded 64-bit varlong.
    pub fn write_varlong(&mut self, value: i64) {
        self.write_unsigned_varlong(((value << 1) ^ (value >> 63)) as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_width_round_trip() {
        let mut writer = ByteWriter::new();
        writer.write_u8(0xab);
        writer.write_i8(-5);
        writer.write_i16(-2);
        writer.write_i32(1_000_000);
        writer.write_i64(i64::MIN);
        writer.write_f64(1.5);

        let buf = writer.into_inner();
        let mut reader = ByteReader::new(&buf);
        assert_eq!(reader.read_u8().unwrap(), 0xab);
        assert_eq!(reader.read_i8().unwrap(), -5);
        assert_eq!(reader.read_i16().unwrap(), -2);
        assert_eq!(reader.read_i32().unwrap(), 1_000_000);
        assert_eq!(reader.read_i64().unwrap(), i64::MIN);
        assert_eq!(reader.read_f64().unwrap(), 1.5);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_big_endian_layout() {
        let mut writer = ByteWriter::new();
        writer.write_i32(0x01020304);
        assert_eq!(writer.as_slice(), &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_rewind_and_seek() {
        let buf = [0x00, 0x12, 0x00, 0x03];
        let mut reader = ByteReader::new(&buf);
        assert_eq!(reader.read_i16().unwrap(), 18);
        assert_eq!(reader.read_i16().unwrap(), 3);
        reader.rewind();
        assert_eq!(reader.position(), 0);
        assert_eq!(reader.read_i16().unwrap(), 18);
        reader.seek(2).unwrap();
        assert_eq!(reader.read_i16().unwrap(), 3);
        assert!(reader.seek(5).is_err());
    }

    #[test]
    fn test_read_past_end_fails() {
        let buf = [0x00];
        let mut reader = ByteReader::new(&buf);
        let err = reader.read_i32().unwrap_err();
        assert!(matches!(err, RelayError::FrameTooShort { .. }));
    }

    #[test]
    fn test_length_delimited_round_trip() {
        let mut writer = ByteWriter::new();
        writer.write_length_delimited(Some(b"payload"));
        writer.write_length_delimited(None);

        let buf = writer.into_inner();
        let mut reader = ByteReader::new(&buf);
        assert_eq!(reader.read_length_delimited().unwrap(), Some(&b"payload"[..]));
        assert_eq!(reader.read_length_delimited().unwrap(), None);
    }

    #[test]
    fn test_varint_known_encodings() {
        // zig-zag maps 0,-1,1,-2,2... to 0,1,2,3,4...
        for (value, encoded) in [
            (0i32, vec![0x00]),
            (-1, vec![0x01]),
            (1, vec![0x02]),
            (-2, vec![0x03]),
            (2, vec![0x04]),
            (150, vec![0xac, 0x02]),
        ] {
            let mut writer = ByteWriter::new();
            writer.write_varint(value);
            assert_eq!(writer.as_slice(), &encoded[..], "encoding of {}", value);
        }
    }

    #[test]
    fn test_varint_round_trip_extremes() {
        for value in [i32::MIN, -1, 0, 1, 63, 64, i32::MAX] {
            let mut writer = ByteWriter::new();
            writer.write_varint(value);
            let buf = writer.into_inner();
            let mut reader = ByteReader::new(&buf);
            assert_eq!(reader.read_varint().unwrap(), value);
            assert_eq!(reader.remaining(), 0);
        }
    }

    #[test]
    fn test_varlong_round_trip_extremes() {
        for value in [i64::MIN, -1, 0, 1, i64::from(i32::MAX) + 1, i64::MAX] {
            let mut writer = ByteWriter::new();
            writer.write_varlong(value);
            let buf = writer.into_inner();
            let mut reader = ByteReader::new(&buf);
            assert_eq!(reader.read_varlong().unwrap(), value);
            assert_eq!(reader.remaining(), 0);
        }
    }

    #[test]
    fn test_varint_max_width() {
        // i32::MIN zig-zags to u32::MAX, the widest 32-bit varint
        let mut writer = ByteWriter::new();
        writer.write_varint(i32::MIN);
        assert_eq!(writer.position(), MAX_VARINT_BYTES);

        let mut writer = ByteWriter::new();
        writer.write_varlong(i64::MIN);
        assert_eq!(writer.position(), MAX_VARLONG_BYTES);
    }

    #[test]
    fn test_varint_overlong_rejected() {
        // 5 bytes, all with the continuation bit still set
        let buf = [0x80, 0x80, 0x80, 0x80, 0x80, 0x01];
        let mut reader = ByteReader::new(&buf);
        let err = reader.read_unsigned_varint().unwrap_err();
        assert!(matches!(err, RelayError::MalformedVarint { max_bytes: 5 }));
    }

    #[test]
    fn test_varlong_overlong_rejected() {
        let buf = [0x80; 11];
        let mut reader = ByteReader::new(&buf);
        let err = reader.read_unsigned_varlong().unwrap_err();
        assert!(matches!(err, RelayError::MalformedVarint { max_bytes: 10 }));
    }

    #[test]
    fn test_varint_truncated_input() {
        // continuation bit promises more bytes than exist
        let buf = [0x80, 0x80];
        let mut reader = ByteReader::new(&buf);
        let err = reader.read_unsigned_varint().unwrap_err();
        assert!(matches!(err, RelayError::FrameTooShort { .. }));
    }

    #[test]
    fn test_writer_growth_preserves_contents() {
        let mut writer = ByteWriter::with_capacity(4);
        writer.write_i32(7);
        // force growth well past the initial capacity
        let big = vec![0x5a; 1024];
        writer.write_bytes(&big);
        writer.write_i32(9);

        assert_eq!(writer.position(), 4 + 1024 + 4);
        let buf = writer.into_inner();
        let mut reader = ByteReader::new(&buf);
        assert_eq!(reader.read_i32().unwrap(), 7);
        assert_eq!(reader.read_bytes(1024).unwrap(), &big[..]);
        assert_eq!(reader.read_i32().unwrap(), 9);
    }
}
