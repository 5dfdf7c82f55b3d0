//! Multi-pass overwrite-then-unlink of a single file.

use std::{
    fs::{File, OpenOptions},
    io::{self, Seek, SeekFrom, Write},
    path::Path,
};

const CHUNK: usize = 64 * 1024;

/// Securely erase `path`: `passes` random overwrites, a final zero
/// overwrite, truncate, unlink. Each pass is synced before the next.
///
/// Returns `Ok(false)` if the file did not exist.
pub fn shred_file(path: &Path, passes: u32) -> io::Result<bool> {
    let len = match std::fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };

    let mut file = OpenOptions::new().write(true).open(path)?;
    overwrite(&mut file, len, passes)?;
    file.set_len(0)?;
    file.sync_all()?;
    drop(file);

    std::fs::remove_file(path)?;
    log::debug!(
        "shredded {} ({len} bytes, {passes} passes + zero pass)",
        path.display()
    );
    Ok(true)
}

fn overwrite(file: &mut File, len: u64, passes: u32) -> io::Result<()> {
    let mut buf = vec![0u8; CHUNK];
    for _ in 0..passes {
        write_pass(file, len, &mut buf, true)?;
    }
    write_pass(file, len, &mut buf, false)
}

fn write_pass(file: &mut File, len: u64, buf: &mut [u8], random: bool) -> io::Result<()> {
    file.seek(SeekFrom::Start(0))?;
    let mut remaining = len;
    while remaining > 0 {
        let n = remaining.min(buf.len() as u64) as usize;
        if random {
            getrandom::getrandom(&mut buf[..n]).map_err(io::Error::other)?;
        } else {
            buf[..n].fill(0);
        }
        file.write_all(&buf[..n])?;
        remaining -= n as u64;
    }
    file.sync_data()
}
