// Length-delimited framing over any byte stream.
//
// A frame is a 4-byte big-endian length followed by that many payload bytes.
// TCP may split or coalesce writes, so every payload is framed; one
// `write_frame` on one side is exactly one `read_frame` on the other.
//
// Functions here move raw bytes only. The relay forwards frames it never
// re-encodes, so the payload format (JSON, see `codec.rs`) stays the
// caller's business.

use std::io::{self, Read, Write};

/// Largest accepted payload (1 MiB). A `BATTLE_START` with two full
/// creatures is a couple of kilobytes; anything near this limit is a
/// corrupt or hostile length prefix.
pub const MAX_FRAME_SIZE: u32 = 1024 * 1024;

/// Write one frame and flush.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> io::Result<()> {
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len <= MAX_FRAME_SIZE)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "frame too large: {} bytes (max {MAX_FRAME_SIZE})",
                    payload.len()
                ),
            )
        })?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(payload)?;
    writer.flush()
}

/// Read one frame.
///
/// `UnexpectedEof` when the stream ends before or inside a frame,
/// `InvalidData` when the length prefix exceeds `MAX_FRAME_SIZE`.
pub fn read_frame<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame too large: {len} bytes (max {MAX_FRAME_SIZE})"),
        ));
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}
