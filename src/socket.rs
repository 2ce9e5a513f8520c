//! Control-socket path derivation and directory hygiene.
//!
//! The socket lives at `$RMUX_TMPDIR|$TMPDIR/rmux-<uid>/<label>`. The
//! directory must exist, be owned by the invoking user, and be mode
//! 0700; a pre-existing path that is not a socket is a fatal error.

use std::fs;
use std::io;
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

use nix::unistd::Uid;

/// Directory holding this user's sockets.
pub fn socket_dir() -> PathBuf {
    let base = std::env::var("RMUX_TMPDIR")
        .or_else(|_| std::env::var("TMPDIR"))
        .unwrap_or_else(|_| "/tmp".to_string());
    Path::new(&base).join(format!("rmux-{}", Uid::current().as_raw()))
}

/// Full socket path for a label (default label: `default`).
pub fn socket_path(label: &str) -> PathBuf {
    socket_dir().join(label)
}

/// Create (or validate) the socket directory: owner-only, owned by us.
pub fn prepare_dir(dir: &Path) -> io::Result<()> {
    match fs::metadata(dir) {
        Ok(meta) => {
            if !meta.is_dir() {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{} exists and is not a directory", dir.display()),
                ));
            }
            if meta.uid() != Uid::current().as_raw() {
                return Err(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    format!("{} is not owned by this user", dir.display()),
                ));
            }
            if meta.permissions().mode() & 0o077 != 0 {
                return Err(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    format!("{} has group/other permissions", dir.display()),
                ));
            }
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir)?;
            fs::set_permissions(dir, fs::Permissions::from_mode(0o700))
        }
        Err(e) => Err(e),
    }
}

/// Make a path bindable: remove a stale socket, refuse anything else
/// that already exists.
pub fn prepare_bind(path: &Path) -> io::Result<()> {
    prepare_dir(path.parent().unwrap_or(Path::new("/tmp")))?;
    match fs::symlink_metadata(path) {
        Ok(meta) => {
            if meta.file_type().is_socket() {
                // A live server would still be listening; the caller
                // only gets here after a failed connect.
                fs::remove_file(path)
            } else {
                Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{} exists and is not a socket", path.display()),
                ))
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_path_is_under_user_dir() {
        let path = socket_path("default");
        let dir = socket_dir();
        assert!(path.starts_with(&dir));
        assert!(dir
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("rmux-"));
    }

    #[test]
    fn prepare_dir_creates_private_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("sockets");
        prepare_dir(&dir).unwrap();
        let mode = fs::metadata(&dir).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
        // Idempotent.
        prepare_dir(&dir).unwrap();
    }

    #[test]
    fn prepare_dir_rejects_open_permissions() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("sockets");
        fs::create_dir(&dir).unwrap();
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o755)).unwrap();
        assert!(prepare_dir(&dir).is_err());
    }

    #[test]
    fn prepare_bind_rejects_regular_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("sockets");
        prepare_dir(&dir).unwrap();
        let path = dir.join("default");
        fs::write(&path, b"not a socket").unwrap();
        assert!(prepare_bind(&path).is_err());
    }

    #[test]
    fn prepare_bind_accepts_fresh_path() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("sockets");
        prepare_dir(&dir).unwrap();
        prepare_bind(&dir.join("default")).unwrap();
    }
}
