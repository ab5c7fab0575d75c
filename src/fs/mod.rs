use std::path::Path;

use console::Style;

/// Extension of the primary stream marker; its contents name the remote target.
pub const STREAM_EXTENSION: &str = "strm";
/// Extension of the secondary collection marker; its contents are never read.
pub const COLLECTION_EXTENSION: &str = "library";

pub fn is_stream_marker(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == STREAM_EXTENSION)
}

pub fn is_marker(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext == STREAM_EXTENSION || ext == COLLECTION_EXTENSION)
}

/// Returns true if `dir` directly contains at least one marker file. Symlinks count when they
/// resolve to a file.
pub fn contains_markers(dir: &Path) -> std::io::Result<bool> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if is_marker(&path) && path.is_file() {
            return Ok(true);
        }
    }
    Ok(false)
}

pub trait Filesystem: Send + Sync {
    fn exists(&self, path: &Path) -> bool {
        path.try_exists().unwrap_or(false)
    }

    fn create_dir_all(&self, path: &Path) -> std::io::Result<()> {
        std::fs::create_dir_all(path)
    }

    /// Moves `from` to `to`, which must not exist yet.
    fn move_path(&self, from: &Path, to: &Path) -> std::io::Result<()>;

    fn remove_dir_all(&self, path: &Path) -> std::io::Result<()> {
        std::fs::remove_dir_all(path)
    }

    fn remove_file(&self, path: &Path) -> std::io::Result<()> {
        std::fs::remove_file(path)
    }

    /// Whether changes are actually applied. Dry runs must not touch the path index either.
    fn is_dry_run(&self) -> bool {
        false
    }
}

struct PosixFilesystem;

impl Filesystem for PosixFilesystem {
    fn move_path(&self, from: &Path, to: &Path) -> std::io::Result<()> {
        move_path(from, to)
    }
}

fn get_default_instance() -> Box<dyn Filesystem> {
    Box::new(PosixFilesystem {})
}

struct DryRunFilesystem;

impl Filesystem for DryRunFilesystem {
    fn create_dir_all(&self, path: &Path) -> std::io::Result<()> {
        let cyan = Style::new().cyan();
        println!("creating directories at {}", cyan.apply_to(path.display()));
        Ok(())
    }

    fn move_path(&self, from: &Path, to: &Path) -> std::io::Result<()> {
        let cyan = Style::new().cyan();
        let magenta = Style::new().magenta();
        println!(
            "moving {} to {}",
            cyan.apply_to(from.display()),
            magenta.apply_to(to.display())
        );
        Ok(())
    }

    fn remove_dir_all(&self, path: &Path) -> std::io::Result<()> {
        let red = Style::new().red();
        println!("removing directory {}", red.apply_to(path.display()));
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> std::io::Result<()> {
        let red = Style::new().red();
        println!("removing file {}", red.apply_to(path.display()));
        Ok(())
    }

    fn is_dry_run(&self) -> bool {
        true
    }
}

fn get_dry_run_instance() -> Box<dyn Filesystem> {
    Box::new(DryRunFilesystem {})
}

pub fn new_instance(dry_run: bool) -> Box<dyn Filesystem> {
    if dry_run {
        get_dry_run_instance()
    } else {
        get_default_instance()
    }
}

/// Renames `from` to `to`. If they are on different filesystems, copies `from` to `to` and only
/// removes `from` once the copy has completed. A failed copy removes whatever part of `to` was
/// written and leaves `from` untouched.
pub fn move_path(from: &Path, to: &Path) -> std::io::Result<()> {
    move_path_with(from, to, |from, to| std::fs::rename(from, to))
}

fn move_path_with<F>(from: &Path, to: &Path, rename: F) -> std::io::Result<()>
where
    F: FnOnce(&Path, &Path) -> std::io::Result<()>,
{
    if to.try_exists()? {
        return Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{} already exists", to.display()),
        ));
    }
    match rename(from, to) {
        Err(err) if err.kind() == std::io::ErrorKind::CrossesDevices => {
            tracing::warn!(
                from = %from.display(),
                to = %to.display(),
                "rename crosses devices; falling back to copy and remove"
            );
            copy_then_remove(from, to)
        }
        result => result,
    }
}

fn copy_then_remove(from: &Path, to: &Path) -> std::io::Result<()> {
    let copied = if from.is_dir() {
        copy_dir(from, to)
    } else {
        std::fs::copy(from, to).map(|_| ())
    };
    if let Err(err) = copied {
        let cleanup = if to.is_dir() {
            std::fs::remove_dir_all(to)
        } else {
            std::fs::remove_file(to)
        };
        if let Err(cleanup_err) = cleanup {
            if cleanup_err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    to = %to.display(),
                    error = %cleanup_err,
                    "failed to remove partial copy"
                );
            }
        }
        return Err(err);
    }

    if from.is_dir() {
        std::fs::remove_dir_all(from)
    } else {
        std::fs::remove_file(from)
    }
}

/// Recursively copies the directory `from` so that its contents end up at `to`.
fn copy_dir(from: &Path, to: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(to)?;
    let options = fs_extra::dir::CopyOptions::new().content_only(true);
    fs_extra::dir::copy(from, to, &options)
        .map(|_| ())
        .map_err(|e| std::io::Error::other(e.to_string()))
}
