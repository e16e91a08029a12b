use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
};

use crate::error::Error;

/// An exclusive advisory lock on `<repo>/lock`, held until dropped.
///
/// Every operation that mutates the repository (init, stage, commit) holds
/// one for its whole duration, so concurrent processes cannot interleave
/// their index or reference updates.
pub struct RepoLock {
    path: PathBuf,
    file: File,
}

impl RepoLock {
    /// Blocks until the lock is available.
    pub fn acquire(repo: &Path) -> Result<Self, Error> {
        let path = repo.join("lock");
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;
        lock_exclusive(&path, &file)?;
        log::debug!("acquired {:?}", path);
        Ok(RepoLock { path, file })
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        unlock(&self.file);
        log::debug!("released {:?}", self.path);
    }
}

#[cfg(unix)]
fn lock_exclusive(_path: &Path, file: &File) -> Result<(), Error> {
    use nix::fcntl::{flock, FlockArg};
    use std::os::unix::io::AsRawFd;

    flock(file.as_raw_fd(), FlockArg::LockExclusive)
        .map_err(|errno| Error::IO(std::io::Error::from(errno)))
}

#[cfg(unix)]
fn unlock(file: &File) {
    use nix::fcntl::{flock, FlockArg};
    use std::os::unix::io::AsRawFd;

    // Closing the file releases the lock anyway.
    let _ = flock(file.as_raw_fd(), FlockArg::Unlock);
}

#[cfg(not(unix))]
fn lock_exclusive(path: &Path, _file: &File) -> Result<(), Error> {
    log::warn!(
        "advisory locking is not supported on this platform; {:?} does not exclude other writers",
        path
    );
    Ok(())
}

#[cfg(not(unix))]
fn unlock(_file: &File) {}

#[cfg(unix)]
#[test]
fn test_lock_excludes_other_holders() {
    use std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        thread,
        time::Duration,
    };

    let tempdir = tempfile::tempdir().unwrap();
    let held = RepoLock::acquire(tempdir.path()).unwrap();
    let acquired = Arc::new(AtomicBool::new(false));

    let root = tempdir.path().to_path_buf();
    let flag = acquired.clone();
    let waiter = thread::spawn(move || {
        let _lock = RepoLock::acquire(&root).unwrap();
        flag.store(true, Ordering::SeqCst);
    });

    thread::sleep(Duration::from_millis(100));
    assert!(!acquired.load(Ordering::SeqCst));
    drop(held);
    waiter.join().unwrap();
    assert!(acquired.load(Ordering::SeqCst));
}
