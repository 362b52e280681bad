//! Direct peer-to-peer file transfer. The relay only brokers the
//! rendezvous; once a `file_response` accept hands the requester an IP, the
//! file itself flows over a dedicated connection between the two clients.

use std::fs::File;
use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;

/// Port the accepting side listens on for the direct transfer.
pub const TRANSFER_PORT: u16 = 1031;

/// Chunk size used on both ends of the stream.
const CHUNK_SIZE: usize = 1024;

/// Streams a file to the accepting peer in fixed-size chunks. Returns the
/// number of bytes sent.
pub fn send_file<P: AsRef<Path>>(ip: &str, path: P) -> io::Result<u64> {
    let mut stream = TcpStream::connect((ip, TRANSFER_PORT))?;
    let mut file = File::open(path)?;

    copy_chunks(&mut file, &mut stream)
}

/// Accepts a single inbound transfer on the transfer port and writes it to
/// `path`. Returns the number of bytes received.
pub fn receive_file<P: AsRef<Path>>(path: P) -> io::Result<u64> {
    let listener = TcpListener::bind(("0.0.0.0", TRANSFER_PORT))?;
    let (mut stream, _) = listener.accept()?;
    let mut file = File::create(path)?;

    copy_chunks(&mut stream, &mut file)
}

/// Pumps `source` into `sink` in `CHUNK_SIZE` pieces until EOF.
fn copy_chunks<R: Read, W: Write>(source: &mut R, sink: &mut W) -> io::Result<u64> {
    let mut chunk = [0u8; CHUNK_SIZE];
    let mut total = 0u64;

    loop {
        let count = source.read(&mut chunk)?;
        if count == 0 {
            return Ok(total);
        }

        sink.write_all(&chunk[..count])?;
        total += count as u64;
    }
}

/// Uppercase hex MD5 of a file, as carried in `file_request` documents.
pub fn file_md5<P: AsRef<Path>>(path: P) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut context = md5::Context::new();
    let mut chunk = [0u8; 4096];

    loop {
        let count = file.read(&mut chunk)?;
        if count == 0 {
            break;
        }
        context.consume(&chunk[..count]);
    }

    Ok(format!("{:x}", context.compute()).to_uppercase())
}

/// Human-readable size, the form clients put in the `size` field of a file
/// offer.
pub fn format_size(size: u64) -> String {
    let mut size = size as f64;

    for unit in &["", "Ki", "Mi", "Gi", "Ti", "Pi", "Ei", "Zi"] {
        if size < 1024.0 {
            return format!("{:.1}{}B", size, unit);
        }
        size /= 1024.0;
    }

    format!("{:.1}YiB", size)
}
