//! Byte-level primitives for engine images: little-endian scalars,
//! length-prefixed blobs, and LZ4-compressed tagged chunks.

use std::io::{self, Read, Write};

pub const MAGIC: &[u8; 8] = b"MONAIMG1";
pub const VERSION_V1: u32 = 1;
pub const VERSION_CURRENT: u32 = VERSION_V1;

/// Upper bound on any length prefix, so a corrupt image cannot request a huge allocation.
const MAX_LEN: usize = 1 << 28;

pub fn compress_lz4(input: &[u8]) -> Vec<u8> {
    lz4_flex::compress(input)
}

pub fn decompress_lz4(input: &[u8], expected_size: usize) -> io::Result<Vec<u8>> {
    lz4_flex::decompress(input, expected_size)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "lz4 decompression failed"))
}

/// A `Write` sink that only counts bytes.
#[derive(Debug, Default)]
pub struct CountingWriter {
    written: usize,
}

impl CountingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

impl Write for CountingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written = self.written.saturating_add(buf.len());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn invalid(msg: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

pub fn write_u32_le<W: Write>(w: &mut W, v: u32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

pub fn write_u64_le<W: Write>(w: &mut W, v: u64) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

pub fn write_i32_le<W: Write>(w: &mut W, v: i32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

pub fn write_f64_le<W: Write>(w: &mut W, v: f64) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

pub fn write_bool<W: Write>(w: &mut W, v: bool) -> io::Result<()> {
    w.write_all(&[u8::from(v)])
}

/// `usize` values are stored as u64.
pub fn write_len<W: Write>(w: &mut W, n: usize) -> io::Result<()> {
    write_u64_le(w, n as u64)
}

pub fn write_f64_slice<W: Write>(w: &mut W, values: &[f64]) -> io::Result<()> {
    write_len(w, values.len())?;
    for v in values {
        write_f64_le(w, *v)?;
    }
    Ok(())
}

pub fn write_bytes<W: Write>(w: &mut W, bytes: &[u8]) -> io::Result<()> {
    let len = u32::try_from(bytes.len()).map_err(|_| invalid("blob too large"))?;
    write_u32_le(w, len)?;
    w.write_all(bytes)
}

pub fn write_string<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    write_bytes(w, s.as_bytes())
}

pub fn read_exact<const N: usize, R: Read>(r: &mut R) -> io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

pub fn read_u32_le<R: Read>(r: &mut R) -> io::Result<u32> {
    Ok(u32::from_le_bytes(read_exact::<4, _>(r)?))
}

pub fn read_u64_le<R: Read>(r: &mut R) -> io::Result<u64> {
    Ok(u64::from_le_bytes(read_exact::<8, _>(r)?))
}

pub fn read_i32_le<R: Read>(r: &mut R) -> io::Result<i32> {
    Ok(i32::from_le_bytes(read_exact::<4, _>(r)?))
}

pub fn read_f64_le<R: Read>(r: &mut R) -> io::Result<f64> {
    Ok(f64::from_le_bytes(read_exact::<8, _>(r)?))
}

pub fn read_bool<R: Read>(r: &mut R) -> io::Result<bool> {
    match read_exact::<1, _>(r)?[0] {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(invalid("invalid bool")),
    }
}

pub fn read_len<R: Read>(r: &mut R) -> io::Result<usize> {
    let n = read_u64_le(r)?;
    usize::try_from(n)
        .ok()
        .filter(|n| *n <= MAX_LEN)
        .ok_or_else(|| invalid("length out of range"))
}

pub fn read_f64_vec<R: Read>(r: &mut R) -> io::Result<Vec<f64>> {
    let n = read_len(r)?;
    let mut out = Vec::with_capacity(n.min(4096));
    for _ in 0..n {
        out.push(read_f64_le(r)?);
    }
    Ok(out)
}

pub fn read_bytes<R: Read>(r: &mut R) -> io::Result<Vec<u8>> {
    let n = read_u32_le(r)? as usize;
    if n > MAX_LEN {
        return Err(invalid("blob too large"));
    }
    let mut buf = vec![0u8; n];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

pub fn read_string<R: Read>(r: &mut R) -> io::Result<String> {
    let bytes = read_bytes(r)?;
    String::from_utf8(bytes).map_err(|_| invalid("invalid utf-8 string"))
}

/// Write an LZ4 chunk.
///
/// Layout:
/// - tag: [u8;4]
/// - len: u32 (bytes following, including the 4-byte uncompressed length)
/// - uncompressed_len: u32
/// - compressed payload bytes
pub fn write_chunk_lz4<W: Write>(w: &mut W, tag: [u8; 4], payload: &[u8]) -> io::Result<()> {
    let compressed = compress_lz4(payload);
    let uncompressed_len = u32::try_from(payload.len()).map_err(|_| invalid("chunk too large"))?;
    let total_len = 4u32.saturating_add(
        u32::try_from(compressed.len()).map_err(|_| invalid("chunk too large"))?,
    );

    w.write_all(&tag)?;
    write_u32_le(w, total_len)?;
    write_u32_le(w, uncompressed_len)?;
    w.write_all(&compressed)
}

/// Next chunk header, or `None` at a clean end of stream.
///
/// A stream that ends partway through a header is an error.
pub fn next_chunk_header<R: Read>(r: &mut R) -> io::Result<Option<([u8; 4], u32)>> {
    let mut tag = [0u8; 4];
    loop {
        match r.read(&mut tag[..1]) {
            Ok(0) => return Ok(None),
            Ok(_) => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    r.read_exact(&mut tag[1..])?;
    let len = read_u32_le(r)?;
    Ok(Some((tag, len)))
}

/// Read and decompress the body of a chunk whose header announced `len` bytes.
pub fn read_chunk_payload<R: Read>(r: &mut R, len: u32) -> io::Result<Vec<u8>> {
    let mut take = r.take(u64::from(len));
    let uncompressed_len = read_u32_le(&mut take)? as usize;
    if uncompressed_len > MAX_LEN {
        return Err(invalid("chunk too large"));
    }
    let mut compressed = Vec::with_capacity((len as usize).saturating_sub(4));
    take.read_to_end(&mut compressed)?;
    if compressed.len() + 4 != len as usize {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated chunk"));
    }
    decompress_lz4(&compressed, uncompressed_len)
}
