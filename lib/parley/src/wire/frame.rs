use crate::wire::support::{MalformedKind, WireError, WireResult};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use murmur::obfuscate;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;

// Section boundaries within the length-prefixed payload.
const KEY_END: usize = obfuscate::KEY_SIZE;
const IV_END: usize = KEY_END + obfuscate::IV_SIZE;

/// Deadline for the remainder of a frame once its length prefix has been
/// observed. Idle connections are never timed out.
pub const BODY_DEADLINE: Duration = Duration::from_secs(5);

/// Encodes a message into a complete wire frame, length prefix included.
/// Every frame carries its own freshly generated key and IV, so no handshake
/// or per-connection key state exists.
pub fn encode<T: Serialize>(message: &T) -> WireResult<Vec<u8>> {
    let key = obfuscate::random_key();
    let iv = obfuscate::random_iv();

    let mut plain =
        serde_json::to_vec(message).map_err(|_| WireError::Malformed(MalformedKind::Document))?;
    obfuscate::apply(&mut plain, &key, &iv);

    // The base64 section repeats the IV ahead of the obfuscated bytes.
    let mut sealed = Vec::with_capacity(obfuscate::IV_SIZE + plain.len());
    sealed.extend_from_slice(&iv);
    sealed.extend_from_slice(&plain);
    let body = base64::encode(&sealed);

    let payload_size = IV_END + body.len();
    if payload_size > u16::max_value() as usize {
        return Err(WireError::Oversize);
    }

    let mut frame = Vec::with_capacity(2 + payload_size);
    frame.write_u16::<BigEndian>(payload_size as u16)?;
    frame.extend_from_slice(&key);
    frame.extend_from_slice(&iv);
    frame.extend_from_slice(body.as_bytes());

    Ok(frame)
}

/// Decodes the payload section of a frame (everything behind the length
/// prefix) back into a message document.
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> WireResult<T> {
    if payload.len() < IV_END {
        return Err(WireError::Malformed(MalformedKind::Truncated));
    }

    let mut key = [0u8; obfuscate::KEY_SIZE];
    key.copy_from_slice(&payload[..KEY_END]);
    let mut iv = [0u8; obfuscate::IV_SIZE];
    iv.copy_from_slice(&payload[KEY_END..IV_END]);

    let sealed = base64::decode(&payload[IV_END..])
        .map_err(|_| WireError::Malformed(MalformedKind::Base64))?;
    if sealed.len() < obfuscate::IV_SIZE {
        return Err(WireError::Malformed(MalformedKind::Truncated));
    }

    // Drop the duplicate IV in front of the obfuscated bytes.
    let mut plain = sealed[obfuscate::IV_SIZE..].to_vec();
    obfuscate::apply(&mut plain, &key, &iv);

    serde_json::from_slice(&plain).map_err(|_| WireError::Malformed(MalformedKind::Document))
}

/// A framed view over one TCP connection. Clones share the underlying
/// socket; any holder may send while a single owner blocks on `recv`.
/// Writes serialize on an internal lock, so frames fanned out by other
/// workers never interleave with this session's own replies.
#[derive(Clone)]
pub struct Framed {
    stream: Arc<TcpStream>,
    write_lock: Arc<Mutex<()>>,
}

impl Framed {
    #[inline]
    pub fn new(stream: TcpStream) -> Framed {
        Framed {
            stream: Arc::new(stream),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Address of the remote end.
    #[inline]
    pub fn peer_addr(&self) -> WireResult<SocketAddr> {
        self.stream.peer_addr().map_err(Into::into)
    }

    /// Encodes and writes one complete frame. Partial writes are retried
    /// until the frame is fully flushed.
    pub fn send<T: Serialize>(&self, message: &T) -> WireResult<()> {
        let frame = encode(message)?;

        let _write = self.write_lock.lock();
        (&*self.stream).write_all(&frame)?;
        Ok(())
    }

    /// Reads one frame. Blocks indefinitely waiting for the length prefix;
    /// once the prefix has been observed the rest of the frame must arrive
    /// within `BODY_DEADLINE`.
    pub fn recv<T: DeserializeOwned>(&self) -> WireResult<T> {
        let mut stream: &TcpStream = &self.stream;

        let mut prefix = [0u8; 2];
        stream.read_exact(&mut prefix)?;
        let mut reader = &prefix[..];
        let length = reader.read_u16::<BigEndian>()? as usize;

        self.stream.set_read_timeout(Some(BODY_DEADLINE))?;
        let mut payload = vec![0u8; length];
        let body = stream.read_exact(&mut payload);
        self.stream.set_read_timeout(None)?;
        body?;

        decode(&payload)
    }

    /// Shuts down both halves of the connection. Any blocked reader
    /// observes the closure on its next operation.
    pub fn shutdown(&self) {
        drop(self.stream.shutdown(Shutdown::Both));
    }
}
