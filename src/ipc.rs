//! Minimal byte-oriented pipe protocol used to carry the [`crate::SupervisorReport`]
//! from the namespaced child process back to the parent, and to synchronize the
//! id-mapping handshake between them.
//!
//! Grounded in the teacher crate's `syscall.rs` pipe helpers: small
//! fixed-width read/write helpers over a `File`-wrapped pipe pair rather than
//! a general serialization framework. Unlike the teacher, `launcher.rs` opens
//! its pipes with `pipe2(O_CLOEXEC)` directly instead of going through a
//! shared constructor here, so neither end leaks into the user binary once
//! it's exec'd.

use std::io::{Read, Write};

/// Blocks until a single sentinel byte arrives; used as a one-shot barrier.
pub(crate) fn read_barrier(mut rx: impl Read) -> std::io::Result<()> {
    rx.read_exact(&mut [0; 1])
}

pub(crate) fn write_barrier(mut tx: impl Write) -> std::io::Result<()> {
    tx.write_all(&[0])
}

pub(crate) fn write_bytes(mut tx: impl Write, data: &[u8]) -> std::io::Result<()> {
    tx.write_all(&(data.len() as u32).to_le_bytes())?;
    tx.write_all(data)
}

pub(crate) fn read_bytes(mut rx: impl Read) -> std::io::Result<Vec<u8>> {
    let mut len_buf = [0; 4];
    rx.read_exact(&mut len_buf)?;
    let len = u32::from_le_bytes(len_buf) as usize;
    let mut buf = vec![0; len];
    rx.read_exact(&mut buf)?;
    Ok(buf)
}
