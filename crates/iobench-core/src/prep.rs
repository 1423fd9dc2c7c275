//! One-shot file preparation calls made around a benchmark run.
//!
//! None of these keep state. Each is a single blocking call that either
//! succeeds or reports the operating system's error.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use tracing::debug;

use crate::buffer::{ALIGNMENT, AlignedBuffer};
use crate::config::{AccessPattern, Operation};

/// How the benchmark target is opened.
#[derive(Debug, Clone, Default)]
pub struct TargetOptions {
    /// Opening for writes truncates the target.
    pub operation: Option<Operation>,
    /// Bypass the page cache (`O_DIRECT`, `F_NOCACHE`).
    pub no_buffering: bool,
    /// Complete writes only once they reach stable storage (`O_DSYNC`).
    pub write_through: bool,
    /// Advise the kernel of the access pattern.
    pub access_hint: Option<AccessPattern>,
}

impl TargetOptions {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation: Some(operation),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_no_buffering(mut self, no_buffering: bool) -> Self {
        self.no_buffering = no_buffering;
        self
    }

    #[must_use]
    pub fn with_write_through(mut self, write_through: bool) -> Self {
        self.write_through = write_through;
        self
    }

    #[must_use]
    pub fn with_access_hint(mut self, hint: Option<AccessPattern>) -> Self {
        self.access_hint = hint;
        self
    }
}

/// Opens (creating if needed) the file at `path`.
pub fn open_target(path: &Path, options: &TargetOptions) -> io::Result<File> {
    let truncate = options.operation.is_some_and(Operation::is_write);
    let mut open = OpenOptions::new();
    open.read(true).write(true).create(true).truncate(truncate);

    platform::apply_open_flags(&mut open, options);
    let file = open.open(path)?;
    platform::after_open(&file, options)?;

    debug!(
        path = %path.display(),
        no_buffering = options.no_buffering,
        write_through = options.write_through,
        hint = ?options.access_hint,
        "target opened"
    );
    Ok(file)
}

/// Grows `file` to `target_size` and writes a zeroed block at its end so
/// the tail is physically allocated.
pub fn prepare_capacity(file: &File, target_size: u64) -> io::Result<()> {
    file.set_len(target_size)?;
    if target_size == 0 {
        return Ok(());
    }

    let tail = target_size.min(ALIGNMENT as u64);
    let offset = target_size - tail;
    let zeros = AlignedBuffer::try_new(ALIGNMENT)
        .map_err(|e| io::Error::new(io::ErrorKind::OutOfMemory, e.to_string()))?;
    write_all_at(file, &zeros[..tail as usize], offset)?;

    debug!(target_size, "capacity prepared");
    Ok(())
}

/// Sets the length of `file` without touching its contents.
pub fn set_file_size(file: &File, size: u64) -> io::Result<()> {
    file.set_len(size)
}

/// Asks the storage stack to start fetching the file's contents.
pub fn hint_prefetch(file: &File) -> io::Result<()> {
    platform::advise_prefetch(file)
}

/// Drops the file's pages from the local cache.
pub fn disable_local_buffering(file: &File) -> io::Result<()> {
    platform::advise_drop(file)
}

fn write_all_at(file: &File, mut buf: &[u8], mut offset: u64) -> io::Result<()> {
    while !buf.is_empty() {
        match platform::write_at(file, buf, offset) {
            Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero)),
            Ok(n) => {
                buf = &buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(unix)]
mod platform {
    use std::fs::{File, OpenOptions};
    use std::io;
    use std::os::fd::AsRawFd;
    use std::os::unix::fs::{FileExt, OpenOptionsExt};

    use super::TargetOptions;
    #[cfg(target_os = "linux")]
    use crate::config::AccessPattern;

    pub(super) fn apply_open_flags(open: &mut OpenOptions, options: &TargetOptions) {
        let mut flags = 0;
        #[cfg(target_os = "linux")]
        if options.no_buffering {
            flags |= libc::O_DIRECT;
        }
        if options.write_through {
            flags |= libc::O_DSYNC;
        }
        open.custom_flags(flags);
    }

    pub(super) fn after_open(file: &File, options: &TargetOptions) -> io::Result<()> {
        #[cfg(target_os = "macos")]
        if options.no_buffering {
            // SAFETY: fcntl on an owned, open descriptor.
            let rc = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_NOCACHE, 1) };
            if rc == -1 {
                return Err(io::Error::last_os_error());
            }
        }

        #[cfg(target_os = "linux")]
        match options.access_hint {
            Some(AccessPattern::Sequential) => advise(file, libc::POSIX_FADV_SEQUENTIAL)?,
            Some(AccessPattern::Random) => advise(file, libc::POSIX_FADV_RANDOM)?,
            None => {}
        }

        let _ = (file, options);
        Ok(())
    }

    #[cfg(target_os = "linux")]
    fn advise(file: &File, advice: libc::c_int) -> io::Result<()> {
        // SAFETY: posix_fadvise on an owned, open descriptor.
        let rc = unsafe { libc::posix_fadvise(file.as_raw_fd(), 0, 0, advice) };
        if rc == 0 {
            Ok(())
        } else {
            Err(nix::errno::Errno::from_raw(rc).into())
        }
    }

    #[cfg(target_os = "linux")]
    pub(super) fn advise_prefetch(file: &File) -> io::Result<()> {
        advise(file, libc::POSIX_FADV_WILLNEED)
    }

    #[cfg(target_os = "linux")]
    pub(super) fn advise_drop(file: &File) -> io::Result<()> {
        advise(file, libc::POSIX_FADV_DONTNEED)
    }

    #[cfg(not(target_os = "linux"))]
    pub(super) fn advise_prefetch(_: &File) -> io::Result<()> {
        Err(io::Error::from(io::ErrorKind::Unsupported))
    }

    #[cfg(not(target_os = "linux"))]
    pub(super) fn advise_drop(_: &File) -> io::Result<()> {
        Err(io::Error::from(io::ErrorKind::Unsupported))
    }

    pub(super) fn write_at(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
        file.write_at(buf, offset)
    }
}

#[cfg(windows)]
mod platform {
    use std::fs::{File, OpenOptions};
    use std::io;
    use std::os::windows::fs::{FileExt, OpenOptionsExt};

    use super::TargetOptions;

    const FILE_FLAG_NO_BUFFERING: u32 = 0x2000_0000;
    const FILE_FLAG_WRITE_THROUGH: u32 = 0x8000_0000;

    pub(super) fn apply_open_flags(open: &mut OpenOptions, options: &TargetOptions) {
        let mut flags = 0;
        if options.no_buffering {
            flags |= FILE_FLAG_NO_BUFFERING;
        }
        if options.write_through {
            flags |= FILE_FLAG_WRITE_THROUGH;
        }
        open.custom_flags(flags);
    }

    pub(super) fn after_open(_: &File, _: &TargetOptions) -> io::Result<()> {
        Ok(())
    }

    pub(super) fn advise_prefetch(_: &File) -> io::Result<()> {
        Err(io::Error::from(io::ErrorKind::Unsupported))
    }

    pub(super) fn advise_drop(_: &File) -> io::Result<()> {
        Err(io::Error::from(io::ErrorKind::Unsupported))
    }

    pub(super) fn write_at(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
        file.seek_write(buf, offset)
    }
}

#[cfg(not(any(unix, windows)))]
mod platform {
    use std::fs::{File, OpenOptions};
    use std::io::{self, Seek, SeekFrom, Write};

    use super::TargetOptions;

    pub(super) fn apply_open_flags(_: &mut OpenOptions, _: &TargetOptions) {}

    pub(super) fn after_open(_: &File, _: &TargetOptions) -> io::Result<()> {
        Ok(())
    }

    pub(super) fn advise_prefetch(_: &File) -> io::Result<()> {
        Err(io::Error::from(io::ErrorKind::Unsupported))
    }

    pub(super) fn advise_drop(_: &File) -> io::Result<()> {
        Err(io::Error::from(io::ErrorKind::Unsupported))
    }

    pub(super) fn write_at(mut file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
        file.seek(SeekFrom::Start(offset))?;
        file.write(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Seek, SeekFrom, Write};

    #[test]
    fn write_open_truncates_read_open_keeps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("target.dat");
        std::fs::write(&path, vec![7u8; 8192]).unwrap();

        let file = open_target(&path, &TargetOptions::new(Operation::Read)).unwrap();
        assert_eq!(file.metadata().unwrap().len(), 8192);
        drop(file);

        let file = open_target(&path, &TargetOptions::new(Operation::Write)).unwrap();
        assert_eq!(file.metadata().unwrap().len(), 0);
    }

    #[test]
    fn read_open_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.dat");
        open_target(&path, &TargetOptions::new(Operation::Read)).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn prepare_capacity_zeroes_tail() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(&[0xEE; 4096]).unwrap();

        prepare_capacity(&file, 16384).unwrap();
        assert_eq!(file.metadata().unwrap().len(), 16384);

        let mut tail = vec![0xFFu8; 4096];
        file.seek(SeekFrom::Start(12288)).unwrap();
        file.read_exact(&mut tail).unwrap();
        assert!(tail.iter().all(|&b| b == 0));

        let mut head = [0u8; 4];
        file.seek(SeekFrom::Start(0)).unwrap();
        file.read_exact(&mut head).unwrap();
        assert_eq!(head, [0xEE; 4]);
    }

    #[test]
    fn prepare_capacity_handles_small_targets() {
        let file = tempfile::tempfile().unwrap();
        prepare_capacity(&file, 100).unwrap();
        assert_eq!(file.metadata().unwrap().len(), 100);
        prepare_capacity(&file, 0).unwrap();
        assert_eq!(file.metadata().unwrap().len(), 0);
    }

    #[test]
    fn set_file_size_only_sets_length() {
        let file = tempfile::tempfile().unwrap();
        set_file_size(&file, 1 << 20).unwrap();
        assert_eq!(file.metadata().unwrap().len(), 1 << 20);
    }

    #[test]
    fn hints_match_platform_support() {
        let file = tempfile::tempfile().unwrap();
        let prefetch = hint_prefetch(&file);
        let drop_cache = disable_local_buffering(&file);
        if cfg!(target_os = "linux") {
            assert!(prefetch.is_ok());
            assert!(drop_cache.is_ok());
        } else {
            assert_eq!(prefetch.unwrap_err().kind(), io::ErrorKind::Unsupported);
            assert_eq!(drop_cache.unwrap_err().kind(), io::ErrorKind::Unsupported);
        }
    }

    #[test]
    fn access_hints_apply_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hinted.dat");
        let options = TargetOptions::new(Operation::Write)
            .with_access_hint(Some(AccessPattern::Random))
            .with_write_through(true);
        open_target(&path, &options).unwrap();
    }
}
