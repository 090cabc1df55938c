//! Unbuffered reads and writes on borrowed file descriptors.
//!
//! The relay loop must never let the standard library buffer input behind
//! `poll`'s back, so terminal and PTY I/O goes straight through `read(2)` and
//! `write(2)`.

use nix::errno::Errno;
use nix::unistd::{read, write};
use std::io;
use std::os::fd::{AsRawFd, BorrowedFd};

/// Read once from `fd` into `buf`, retrying on EINTR.
pub fn read_fd(fd: BorrowedFd<'_>, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match read(fd.as_raw_fd(), buf) {
            Ok(n) => return Ok(n),
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

/// Write all of `data` to `fd`, retrying on EINTR and short writes.
pub fn write_all_fd(fd: BorrowedFd<'_>, data: &[u8]) -> io::Result<()> {
    let mut written = 0;
    while written < data.len() {
        match write(fd, &data[written..]) {
            Ok(0) => return Err(io::Error::new(io::ErrorKind::WriteZero, "write returned 0")),
            Ok(n) => written += n,
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::AsFd;

    fn pipe() -> (std::fs::File, std::fs::File) {
        let (reader, writer) = nix::unistd::pipe().unwrap();
        (reader.into(), writer.into())
    }

    #[test]
    fn test_write_then_read() {
        let (reader, writer) = pipe();
        write_all_fd(writer.as_fd(), b"hello").unwrap();

        let mut buf = [0u8; 16];
        let n = read_fd(reader.as_fd(), &mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");
    }

    #[test]
    fn test_read_eof() {
        let (reader, writer) = pipe();
        drop(writer);
        let mut buf = [0u8; 4];
        assert_eq!(read_fd(reader.as_fd(), &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_write_to_closed_pipe_fails() {
        let (reader, writer) = pipe();
        drop(reader);
        // SIGPIPE is ignored by the Rust runtime, so this surfaces as EPIPE.
        let err = write_all_fd(writer.as_fd(), b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
