use std::fmt;
use std::io::{BufRead, Read};
use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};
use walkdir::{DirEntry, WalkDir};

use crate::fs::{self, COLLECTION_EXTENSION};

/// What the scanner could learn about a folder's media from its marker files.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DisplayName {
    /// Last path segment of the URL in the first `.strm` file.
    Target(String),
    /// The `.strm` file was empty.
    Empty,
    /// The `.strm` file could not be read.
    Unreadable(String),
    /// Only `.library` markers were present.
    CollectionMarker,
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayName::Target(name) => f.write_str(name),
            DisplayName::Empty => f.write_str("(empty)"),
            DisplayName::Unreadable(err) => write!(f, "(unreadable: {err})"),
            DisplayName::CollectionMarker => write!(f, "(.{COLLECTION_EXTENSION} detected)"),
        }
    }
}

impl Serialize for DisplayName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Only the first line of a `.strm` file is read, and at most this many bytes of it.
const MAX_STREAM_LINE_BYTES: u64 = 64 * 1024;

/// A folder under the library root that directly contains marker files.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct LibraryEntry {
    /// Relative to the library root. Empty for the root itself.
    #[serde(serialize_with = "serialize_lossy")]
    pub folder: PathBuf,
    pub display_name: DisplayName,
}

/// Serializes a path that may not be valid UTF-8, replacing invalid sequences.
fn serialize_lossy<S: Serializer>(path: &Path, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&path.to_string_lossy())
}

/// Lazily walks `root` and yields every folder that directly contains marker files, in
/// ascending path order. Entries that cannot be walked are logged and skipped.
pub fn scan(root: &Path) -> impl Iterator<Item = LibraryEntry> + use<> {
    let root = root.to_path_buf();
    WalkDir::new(&root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable library entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_dir())
        .filter_map(move |entry| scan_folder(&root, &entry))
}

fn scan_folder(root: &Path, dir: &DirEntry) -> Option<LibraryEntry> {
    let mut first_stream = None;
    let mut has_collection = false;

    let mut files = match std::fs::read_dir(dir.path()) {
        Ok(read_dir) => read_dir
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect::<Vec<_>>(),
        Err(e) => {
            tracing::warn!(path = %dir.path().display(), error = %e, "skipping unreadable folder");
            return None;
        }
    };
    files.sort();

    for file in files {
        if fs::is_stream_marker(&file) {
            first_stream = Some(file);
            break;
        }
        has_collection |= fs::is_marker(&file);
    }

    let display_name = match first_stream {
        Some(stream) => read_display_name(&stream),
        None if has_collection => DisplayName::CollectionMarker,
        None => return None,
    };

    let folder = dir
        .path()
        .strip_prefix(root)
        .map(Path::to_path_buf)
        .unwrap_or_default();
    Some(LibraryEntry {
        folder,
        display_name,
    })
}

/// Reads the first line of a `.strm` file and returns the last segment of the URL in it.
pub fn read_display_name(path: &Path) -> DisplayName {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(e) => return DisplayName::Unreadable(e.to_string()),
    };
    let mut line = String::new();
    let mut reader = std::io::BufReader::new(file.take(MAX_STREAM_LINE_BYTES));
    if let Err(e) = reader.read_line(&mut line) {
        return DisplayName::Unreadable(e.to_string());
    }
    match url_basename(line.trim()) {
        "" => DisplayName::Empty,
        name => DisplayName::Target(name.to_owned()),
    }
}

fn url_basename(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn scan_empty_root() {
        let tmp_dir = tempfile::tempdir().unwrap();
        assert_eq!(scan(tmp_dir.path()).count(), 0);
    }

    #[test]
    fn scan_reports_only_folders_with_markers() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let root = tmp_dir.path();
        write(root, "Movies/Foo [ABC123]/Foo.strm", "http://host/files/Foo.mkv\n");
        write(root, "Movies/readme.txt", "");
        write(root, "Shows/Bar/Season 1/e01.strm", "http://host/e01.mkv");
        std::fs::create_dir_all(root.join("Empty/Nested")).unwrap();

        let folders = scan(root).map(|e| e.folder).collect::<Vec<_>>();

        assert_eq!(
            folders,
            vec![
                PathBuf::from("Movies/Foo [ABC123]"),
                PathBuf::from("Shows/Bar/Season 1"),
            ]
        );
    }

    #[test]
    fn scan_orders_by_path_components() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let root = tmp_dir.path();
        // "a b" sorts before "a/..." bytewise on the whole string, but after "a" by component.
        write(root, "a b/x.strm", "u");
        write(root, "a/c/x.strm", "u");
        write(root, "a/x.strm", "u");
        write(root, "b/x.strm", "u");

        let folders = scan(root).map(|e| e.folder).collect::<Vec<_>>();

        assert_eq!(
            folders,
            vec![
                PathBuf::from("a"),
                PathBuf::from("a/c"),
                PathBuf::from("a b"),
                PathBuf::from("b"),
            ]
        );
        let mut sorted = folders.clone();
        sorted.sort();
        assert_eq!(folders, sorted);
    }

    #[test]
    fn scan_root_with_markers() {
        let tmp_dir = tempfile::tempdir().unwrap();
        write(tmp_dir.path(), "x.strm", "http://host/x.mkv");

        let entries = scan(tmp_dir.path()).collect::<Vec<_>>();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].folder, PathBuf::new());
    }

    #[test]
    fn display_name_from_first_strm() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let root = tmp_dir.path();
        write(root, "Foo/b.strm", "http://host/second.mkv");
        write(root, "Foo/a.strm", "  http://host/path/first.mkv  \nhttp://host/ignored.mkv\n");
        write(root, "Foo/z.library", "");

        let entries = scan(root).collect::<Vec<_>>();

        assert_eq!(
            entries,
            vec![LibraryEntry {
                folder: "Foo".into(),
                display_name: DisplayName::Target("first.mkv".into()),
            }]
        );
    }

    #[test]
    fn display_name_prefers_strm_over_library() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let root = tmp_dir.path();
        write(root, "Foo/a.library", "");
        write(root, "Foo/b.strm", "http://host/movie.mkv");

        let entry = scan(root).next().unwrap();

        assert_eq!(entry.display_name, DisplayName::Target("movie.mkv".into()));
    }

    #[test]
    fn display_name_sentinels() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let root = tmp_dir.path();
        write(root, "Collection/set.library", "http://host/not-read.mkv");
        write(root, "Empty/x.strm", "");
        write(root, "Blank/x.strm", "   \n");

        let names = scan(root)
            .map(|e| (e.folder, e.display_name))
            .collect::<Vec<_>>();

        assert_eq!(
            names,
            vec![
                (PathBuf::from("Blank"), DisplayName::Empty),
                (PathBuf::from("Collection"), DisplayName::CollectionMarker),
                (PathBuf::from("Empty"), DisplayName::Empty),
            ]
        );
    }

    #[test]
    fn unreadable_strm_degrades() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let root = tmp_dir.path();
        // A directory named like a marker is not a file, so it does not qualify.
        std::fs::create_dir_all(root.join("Foo/dir.strm")).unwrap();
        assert!(matches!(
            read_display_name(&root.join("Foo/dir.strm")),
            DisplayName::Unreadable(_)
        ));
        assert!(matches!(
            read_display_name(&root.join("missing.strm")),
            DisplayName::Unreadable(_)
        ));
    }

    #[test]
    fn non_utf8_strm_degrades() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let root = tmp_dir.path();
        std::fs::create_dir(root.join("Foo")).unwrap();
        std::fs::write(root.join("Foo/x.strm"), [0xff, 0xfe, 0xfd]).unwrap();

        let entry = scan(root).next().unwrap();

        assert!(matches!(entry.display_name, DisplayName::Unreadable(_)));
    }

    #[test]
    fn scan_follows_symlinked_markers() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let root = tmp_dir.path();
        write(root, "Sources/foo.strm", "http://host/foo.mkv");
        write(root, "Sources/set.library", "");
        std::fs::create_dir_all(root.join("Movies/Foo [ABC123]")).unwrap();
        std::fs::create_dir_all(root.join("Movies/Set")).unwrap();
        std::os::unix::fs::symlink(
            root.join("Sources/foo.strm"),
            root.join("Movies/Foo [ABC123]/foo.strm"),
        )
        .unwrap();
        std::os::unix::fs::symlink(
            root.join("Sources/set.library"),
            root.join("Movies/Set/set.library"),
        )
        .unwrap();
        // Dangling links are not files.
        std::fs::create_dir_all(root.join("Broken")).unwrap();
        std::os::unix::fs::symlink(root.join("missing.strm"), root.join("Broken/x.strm")).unwrap();

        let entries = scan(root).collect::<Vec<_>>();

        assert_eq!(
            entries,
            vec![
                LibraryEntry {
                    folder: "Movies/Foo [ABC123]".into(),
                    display_name: DisplayName::Target("foo.mkv".into()),
                },
                LibraryEntry {
                    folder: "Movies/Set".into(),
                    display_name: DisplayName::CollectionMarker,
                },
                LibraryEntry {
                    folder: "Sources".into(),
                    display_name: DisplayName::Target("foo.mkv".into()),
                },
            ]
        );
    }

    #[test]
    fn display_name_reads_a_bounded_line() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let path = tmp_dir.path().join("x.strm");
        let name = "a".repeat(2 * MAX_STREAM_LINE_BYTES as usize);
        std::fs::write(&path, format!("http://host/{name}\n")).unwrap();

        let DisplayName::Target(read) = read_display_name(&path) else {
            panic!("expected a display name");
        };

        assert_eq!(read.len(), MAX_STREAM_LINE_BYTES as usize - "http://host/".len());
    }

    #[test]
    fn folder_serializes_lossily() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let entry = LibraryEntry {
            folder: Path::new("Movies").join(OsStr::from_bytes(b"Bad\xff")),
            display_name: DisplayName::Empty,
        };

        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            serde_json::json!({"folder": "Movies/Bad\u{fffd}", "display_name": "(empty)"})
        );
    }

    #[test]
    fn scan_is_repeatable() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let root = tmp_dir.path();
        write(root, "A/B [ABC123]/x.strm", "http://host/x.mkv");
        write(root, "A/C/y.library", "");

        assert_eq!(
            scan(root).collect::<Vec<_>>(),
            scan(root).collect::<Vec<_>>()
        );
    }

    #[test]
    fn display_name_rendering() {
        assert_eq!(DisplayName::Target("x.mkv".into()).to_string(), "x.mkv");
        assert_eq!(DisplayName::Empty.to_string(), "(empty)");
        assert_eq!(
            DisplayName::CollectionMarker.to_string(),
            "(.library detected)"
        );
        assert_eq!(
            serde_json::to_value(DisplayName::Empty).unwrap(),
            serde_json::json!("(empty)")
        );
    }
}
