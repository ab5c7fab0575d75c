use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use crate::fs::{Filesystem, contains_markers};
use crate::index::{IndexError, PathIndex, PathIndexStore};
use crate::torrent::TorrentIdPattern;

/// Separates the folder from the file name in a file-level selection token.
pub const FILE_DELIMITER: &str = "||";

/// A folder, or a single file inside a folder, picked by the operator. Paths are relative to
/// the library root.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Selection {
    Folder(PathBuf),
    File { folder: PathBuf, file: String },
}

impl Selection {
    /// Parses a `folder` or `folder||file` token. The split happens at the last delimiter, and
    /// only if what follows it is a plain file name; otherwise the whole token is a folder.
    pub fn parse(token: &str) -> Self {
        match token.rsplit_once(FILE_DELIMITER) {
            Some((folder, file)) if is_file_name(file) => Selection::File {
                folder: folder.into(),
                file: file.to_owned(),
            },
            _ => Selection::Folder(token.into()),
        }
    }

    pub fn folder(&self) -> &Path {
        match self {
            Selection::Folder(folder) => folder,
            Selection::File { folder, .. } => folder,
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Folder(folder) => write!(f, "{}", folder.display()),
            Selection::File { folder, file } => {
                write!(f, "{}{FILE_DELIMITER}{file}", folder.display())
            }
        }
    }
}

fn is_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains('/')
}

#[derive(Debug, Error)]
pub enum OrganizeError {
    #[error("destination {0:?} must be a relative path inside the library")]
    InvalidDestination(PathBuf),
    #[error(transparent)]
    Index(#[from] IndexError),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SkipReason {
    /// The selected path no longer exists.
    MissingSource,
    /// The folder already lives in the destination.
    AlreadyInPlace,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    Moved { to: PathBuf },
    Deleted,
    Skipped(SkipReason),
    Failed(String),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum IndexChange {
    Updated { id: String, path: String },
    Removed { id: String },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ItemReport {
    pub selection: Selection,
    pub outcome: Outcome,
    pub index_change: Option<IndexChange>,
}

impl ItemReport {
    fn new(selection: Selection, outcome: Outcome) -> Self {
        Self {
            selection,
            outcome,
            index_change: None,
        }
    }
}

impl fmt::Display for ItemReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Outcome::Moved { to } => write!(f, "moved {} to {}", self.selection, to.display())?,
            Outcome::Deleted => write!(f, "deleted {}", self.selection)?,
            Outcome::Skipped(SkipReason::MissingSource) => {
                write!(f, "skipped {}: no longer exists", self.selection)?
            }
            Outcome::Skipped(SkipReason::AlreadyInPlace) => {
                write!(f, "skipped {}: already in destination", self.selection)?
            }
            Outcome::Failed(err) => write!(f, "failed {}: {err}", self.selection)?,
        }
        match &self.index_change {
            Some(IndexChange::Updated { id, path }) => write!(f, " (index: {id} -> {path})"),
            Some(IndexChange::Removed { id }) => write!(f, " (index: removed {id})"),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BatchReport {
    pub items: Vec<ItemReport>,
    pub dry_run: bool,
}

impl BatchReport {
    pub fn index_changed(&self) -> bool {
        self.items.iter().any(|item| item.index_change.is_some())
    }

    pub fn failures(&self) -> usize {
        self.items
            .iter()
            .filter(|item| matches!(item.outcome, Outcome::Failed(_)))
            .count()
    }
}

/// Moves and deletes library folders and keeps the path index in step with them.
pub struct Organizer<'a> {
    root: &'a Path,
    store: &'a PathIndexStore,
    id_pattern: &'a TorrentIdPattern,
    fs: &'a dyn Filesystem,
}

impl<'a> Organizer<'a> {
    pub fn new(
        root: &'a Path,
        store: &'a PathIndexStore,
        id_pattern: &'a TorrentIdPattern,
        fs: &'a dyn Filesystem,
    ) -> Self {
        Self {
            root,
            store,
            id_pattern,
            fs,
        }
    }

    /// Moves each selected folder into `destination`. File selections move their whole folder.
    ///
    /// Each folder is handled independently: one that is missing or fails to move does not stop
    /// the rest. Index entries that already exist for a moved folder's torrent ID are pointed at
    /// the new location; no new entries are ever added. The index is saved once at the end,
    /// whether or not anything changed.
    pub fn move_selected(
        &self,
        selections: &[Selection],
        destination: &Path,
    ) -> Result<BatchReport, OrganizeError> {
        if check_relative(destination).is_err() {
            return Err(OrganizeError::InvalidDestination(destination.to_path_buf()));
        }

        let mut seen = HashSet::new();
        let folders = selections
            .iter()
            .map(|selection| Selection::Folder(selection.folder().to_path_buf()))
            .filter(|selection| seen.insert(selection.clone()))
            .collect::<Vec<_>>();

        let items = self.with_index(|index| {
            folders
                .into_iter()
                .map(|selection| self.move_one(index, selection, destination))
                .collect()
        })?;
        Ok(self.finish("move", items))
    }

    /// Deletes each selection. A folder selection removes the whole folder tree and its index
    /// entry. A file selection removes only that file, and clears the folder's index entry only
    /// once no marker files are left in the folder.
    pub fn delete_selected(&self, selections: &[Selection]) -> Result<BatchReport, OrganizeError> {
        let mut seen = HashSet::new();
        let selections = selections
            .iter()
            .filter(|selection| seen.insert(*selection))
            .cloned()
            .collect::<Vec<_>>();

        let items = self.with_index(|index| {
            selections
                .into_iter()
                .map(|selection| self.delete_one(index, selection))
                .collect()
        })?;
        Ok(self.finish("delete", items))
    }

    fn with_index(
        &self,
        f: impl FnOnce(&mut PathIndex) -> Vec<ItemReport>,
    ) -> Result<Vec<ItemReport>, IndexError> {
        if self.fs.is_dry_run() {
            self.store.inspect(f)
        } else {
            self.store.update(f)
        }
    }

    fn finish(&self, operation: &str, items: Vec<ItemReport>) -> BatchReport {
        let report = BatchReport {
            items,
            dry_run: self.fs.is_dry_run(),
        };
        tracing::info!(
            operation,
            items = report.items.len(),
            failures = report.failures(),
            index_changed = report.index_changed(),
            dry_run = report.dry_run,
            "finished batch"
        );
        report
    }

    fn move_one(&self, index: &mut PathIndex, selection: Selection, destination: &Path) -> ItemReport {
        let folder = selection.folder().to_path_buf();
        if let Err(err) = check_relative(&folder) {
            return failed(selection, err);
        }
        let Some(name) = folder.file_name() else {
            return failed(selection, "selection has no folder name");
        };

        let source = self.root.join(&folder);
        if !self.fs.exists(&source) {
            tracing::warn!(source = %source.display(), "skipping move of missing folder");
            return ItemReport::new(selection, Outcome::Skipped(SkipReason::MissingSource));
        }

        // Rebuilt from components so the stored path has no doubled or trailing separators.
        let target_rel = destination.components().collect::<PathBuf>().join(name);
        if target_rel == folder {
            return ItemReport::new(selection, Outcome::Skipped(SkipReason::AlreadyInPlace));
        }
        if target_rel.starts_with(&folder) {
            return failed(selection, "cannot move a folder into itself");
        }

        let target = self.root.join(&target_rel);
        if let Err(err) = self.fs.create_dir_all(&self.root.join(destination)) {
            return failed(selection, err);
        }
        if let Err(err) = self.fs.move_path(&source, &target) {
            tracing::warn!(
                source = %source.display(),
                target = %target.display(),
                error = %err,
                "failed to move folder"
            );
            return failed(selection, err);
        }
        tracing::info!(source = %source.display(), target = %target.display(), "moved folder");

        let mut report = ItemReport::new(
            selection,
            Outcome::Moved {
                to: target_rel.clone(),
            },
        );
        if let Some(id) = self.id_pattern.extract(&name.to_string_lossy()) {
            tracing::debug!(id, tracked = index.contains_key(id), "checking index");
            if let Some(path) = index.get_mut(id) {
                *path = target_rel.to_string_lossy().into_owned();
                tracing::info!(id, path = %path, "updated index entry");
                report.index_change = Some(IndexChange::Updated {
                    id: id.to_owned(),
                    path: path.clone(),
                });
            }
        }
        report
    }

    fn delete_one(&self, index: &mut PathIndex, selection: Selection) -> ItemReport {
        if let Err(err) = check_relative(selection.folder()) {
            return failed(selection, err);
        }
        let folder = self.root.join(selection.folder());

        let removed = match &selection {
            Selection::Folder(_) => {
                if selection.folder().file_name().is_none() {
                    return failed(selection, "selection has no folder name");
                }
                if !self.fs.exists(&folder) {
                    tracing::warn!(path = %folder.display(), "skipping delete of missing folder");
                    return ItemReport::new(selection, Outcome::Skipped(SkipReason::MissingSource));
                }
                self.fs.remove_dir_all(&folder)
            }
            Selection::File { file, .. } => {
                let path = folder.join(file);
                if !self.fs.exists(&path) {
                    tracing::warn!(path = %path.display(), "skipping delete of missing file");
                    return ItemReport::new(selection, Outcome::Skipped(SkipReason::MissingSource));
                }
                self.fs.remove_file(&path)
            }
        };
        if let Err(err) = removed {
            tracing::warn!(selection = %selection, error = %err, "failed to delete");
            return failed(selection, err);
        }
        tracing::info!(selection = %selection, "deleted");

        // Only forget the folder once it no longer holds anything playable.
        let folder_emptied = match &selection {
            Selection::Folder(_) => true,
            Selection::File { .. } => !contains_markers(&folder).unwrap_or(true),
        };

        let mut report = ItemReport::new(selection, Outcome::Deleted);
        if !folder_emptied {
            return report;
        }
        let id = report
            .selection
            .folder()
            .file_name()
            .and_then(|name| self.id_pattern.extract(&name.to_string_lossy()).map(str::to_owned));
        if let Some(id) = id {
            if index.remove(&id).is_some() {
                tracing::info!(id = %id, "removed index entry");
                report.index_change = Some(IndexChange::Removed { id });
            }
        }
        report
    }
}

fn failed(selection: Selection, err: impl ToString) -> ItemReport {
    ItemReport::new(selection, Outcome::Failed(err.to_string()))
}

#[derive(Debug, Error)]
#[error("{0:?} is not a relative path inside the library")]
struct NotRelative(PathBuf);

/// Accepts only paths made of plain names, so nothing can escape the library root.
fn check_relative(path: &Path) -> Result<(), NotRelative> {
    if path
        .components()
        .all(|component| matches!(component, Component::Normal(_)))
    {
        Ok(())
    } else {
        Err(NotRelative(path.to_path_buf()))
    }
}
