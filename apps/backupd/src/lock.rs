use fs2::FileExt;
use std::{fs::File, fs::OpenOptions, path::Path};

/// Exclusive advisory lock over one backup root. Held for the whole run;
/// dropping the guard releases it on every exit path.
#[derive(Debug)]
pub struct RunLock {
    _file: File,
}

pub fn acquire(path: &Path) -> std::io::Result<RunLock> {
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(path)?;

    file.try_lock_exclusive()?;
    Ok(RunLock { _file: file })
}
