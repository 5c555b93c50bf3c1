// src/rcon/packet.rs
//! Remote-console framing.
//!
//! Every frame is `size:i32 | id:i32 | kind:i32 | body | 0x00 | 0x00`, all
//! integers little-endian, where `size` counts everything after itself.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

pub const SERVERDATA_AUTH: i32 = 3;
pub const SERVERDATA_AUTH_RESPONSE: i32 = 2;
pub const SERVERDATA_EXECCOMMAND: i32 = 2;
pub const SERVERDATA_RESPONSE_VALUE: i32 = 0;

/// The id a server answers with when authentication is refused.
pub const AUTH_FAILED_ID: i32 = -1;

// id + kind + two terminating NULs
const MIN_FRAME_LEN: i32 = 10;
const MAX_FRAME_LEN: i32 = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: i32,
    pub kind: i32,
    pub body: String,
}

impl Packet {
    pub fn new(id: i32, kind: i32, body: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            body: body.into(),
        }
    }

    pub fn encode(&self) -> io::Result<Vec<u8>> {
        let body = self.body.as_bytes();
        let size = i32::try_from(body.len())
            .ok()
            .and_then(|len| len.checked_add(MIN_FRAME_LEN))
            .filter(|size| *size <= MAX_FRAME_LEN)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("packet body too large ({} bytes)", body.len()),
                )
            })?;

        let mut buf = Vec::with_capacity(size as usize + 4);
        buf.write_i32::<LittleEndian>(size)?;
        buf.write_i32::<LittleEndian>(self.id)?;
        buf.write_i32::<LittleEndian>(self.kind)?;
        buf.extend_from_slice(body);
        buf.extend_from_slice(&[0, 0]);
        Ok(buf)
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.encode()?)?;
        writer.flush()
    }

    /// Reads exactly one frame. Malformed lengths surface as `InvalidData`.
    pub fn read_from<R: Read>(reader: &mut R) -> io::Result<Packet> {
        let size = reader.read_i32::<LittleEndian>()?;
        if !(MIN_FRAME_LEN..=MAX_FRAME_LEN).contains(&size) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame length {} out of range", size),
            ));
        }

        let mut frame = vec![0u8; size as usize];
        reader.read_exact(&mut frame)?;

        let mut header = &frame[..8];
        let id = header.read_i32::<LittleEndian>()?;
        let kind = header.read_i32::<LittleEndian>()?;

        // Some servers pad with more NULs than required, others send only one.
        let body = &frame[8..];
        let end = body.iter().position(|b| *b == 0).unwrap_or(body.len());
        let body = String::from_utf8_lossy(&body[..end]).into_owned();

        Ok(Packet { id, kind, body })
    }
}
