//! The filesystem as a searchable graph.
//!
//! [`FsEntry`] exposes a path as a host object: every entry has `name`,
//! `path`, `kind` and `len` properties, and directories additionally expose
//! their children as `entries`. [`DirectoryDrillDown`] opens directories.
//!
//! ```rust,no_run
//! use rummage::fs::{self, DirectoryDrillDown};
//! use rummage::{MatchRule, Sensitivity};
//!
//! let root = fs::open("/var/log").unwrap();
//! let outcome = rummage::search()
//!     .rule(MatchRule::class_name("File"))
//!     .rule(MatchRule::match_pattern("name", r"\.log$").unwrap())
//!     .strategy::<DirectoryDrillDown>()
//!     .unlimited()
//!     .run(root)
//!     .unwrap();
//!
//! for found in outcome.found() {
//!     println!("{}", found.route());
//! }
//! ```

use std::fs::Metadata;
use std::path::{Path, PathBuf};

use ignore::{DirEntry, WalkBuilder};
use tracing::trace;

use crate::error::RummageError;
use crate::traits::{Params, Strategy};
use crate::value::{Array, HostObject, Key, Value};

const ENTRIES: &str = "entries";

/// The kind of a filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    /// Device files, pipes, sockets.
    Other,
}

impl EntryKind {
    fn of(file_type: std::fs::FileType) -> Self {
        if file_type.is_dir() {
            Self::Dir
        } else if file_type.is_file() {
            Self::File
        } else if file_type.is_symlink() {
            Self::Symlink
        } else {
            Self::Other
        }
    }

    /// Class name seen by rules and strategies.
    pub fn class_name(self) -> &'static str {
        match self {
            Self::File => "File",
            Self::Dir => "Directory",
            Self::Symlink => "Symlink",
            Self::Other => "Other",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Dir => "dir",
            Self::Symlink => "symlink",
            Self::Other => "other",
        }
    }
}

/// One filesystem entry, read lazily.
///
/// Directory listings are not cached: each read of `entries` lists the
/// directory again, in file-name order. Symlinks are not followed.
#[derive(Debug, Clone)]
pub struct FsEntry {
    path: PathBuf,
    name: String,
    kind: EntryKind,
    len: u64,
}

impl FsEntry {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    fn from_metadata(path: PathBuf, metadata: &Metadata) -> Self {
        let name = path
            .file_name()
            .map_or_else(|| path.to_string_lossy(), |n| n.to_string_lossy())
            .into_owned();
        Self {
            name,
            kind: EntryKind::of(metadata.file_type()),
            len: metadata.len(),
            path,
        }
    }

    fn from_dir_entry(entry: &DirEntry) -> Self {
        let kind = entry.file_type().map_or(EntryKind::Other, EntryKind::of);
        Self {
            path: entry.path().to_path_buf(),
            name: entry.file_name().to_string_lossy().into_owned(),
            kind,
            len: entry.metadata().map_or(0, |m| m.len()),
        }
    }

    /// Children of a directory, one level deep, sorted by file name.
    fn entries(&self) -> Result<Vec<Value>, RummageError> {
        let mut builder = WalkBuilder::new(&self.path);
        builder
            .standard_filters(false)
            .ignore(false)
            .parents(false)
            .hidden(false)
            .follow_links(false)
            .same_file_system(false)
            .max_depth(Some(1))
            .sort_by_file_name(|a, b| a.cmp(b));

        let mut children = Vec::new();
        for result in builder.build() {
            let entry = result.map_err(|e| map_ignore_error(&self.path, e))?;
            // The walk yields the directory itself first.
            if entry.depth() == 0 {
                continue;
            }
            children.push(Value::host(Self::from_dir_entry(&entry)));
        }
        trace!(path = %self.path.display(), children = children.len(), "directory listed");
        Ok(children)
    }
}

impl HostObject for FsEntry {
    fn class_name(&self) -> &str {
        self.kind.class_name()
    }

    fn keys(&self) -> Vec<Key> {
        let mut keys: Vec<Key> = ["name", "path", "kind", "len"].map(Key::from).into();
        if self.kind == EntryKind::Dir {
            keys.push(Key::from(ENTRIES));
        }
        keys
    }

    #[allow(clippy::cast_precision_loss)]
    fn get(&self, key: &Key) -> Result<Value, RummageError> {
        Ok(match key.as_name().as_ref() {
            "name" => Value::from(self.name.as_str()),
            "path" => Value::from(self.path.to_string_lossy().into_owned()),
            "kind" => Value::from(self.kind.label()),
            "len" => Value::Number(self.len as f64),
            ENTRIES if self.kind == EntryKind::Dir => Array::from(self.entries()?).into(),
            _ => Value::Undefined,
        })
    }

    fn describe(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

/// Open `path` as the root of a filesystem search.
///
/// # Errors
///
/// [`RummageError::InvalidArgument`] when the path can't be stat'ed.
pub fn open(path: impl AsRef<Path>) -> Result<Value, RummageError> {
    let path = path.as_ref();
    let metadata = std::fs::symlink_metadata(path)
        .map_err(|e| RummageError::invalid(format!("cannot open {}: {e}", path.display())))?;
    Ok(Value::host(FsEntry::from_metadata(path.to_path_buf(), &metadata)))
}

/// Opens directories, reporting each child under its file name.
///
/// Anything that is not a `Directory` host node is ignored, and so is a
/// directory that can't be listed.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectoryDrillDown;

impl Strategy for DirectoryDrillDown {
    fn run(&self, params: &mut Params<'_>) -> Result<(), RummageError> {
        let Value::Host(host) = params.target() else {
            return Ok(());
        };
        if host.class_name() != EntryKind::Dir.class_name() {
            return Ok(());
        }
        let children = match host.get(&Key::from(ENTRIES)) {
            Ok(Value::Array(children)) => children,
            Ok(_) => return Ok(()),
            Err(err) => {
                trace!(error = %err, "skipping unlistable directory");
                return Ok(());
            }
        };
        for child in children.to_vec() {
            let name = match &child {
                Value::Host(entry) => match entry.get(&Key::from("name")) {
                    Ok(name) => name.to_string(),
                    Err(err) => {
                        trace!(error = %err, "skipping unnamed entry");
                        continue;
                    }
                },
                _ => continue,
            };
            if params.notify(name, child).is_break() {
                break;
            }
        }
        Ok(())
    }
}

fn map_ignore_error(root: &Path, e: ignore::Error) -> RummageError {
    let (path, reason) = match e {
        ignore::Error::WithPath { path, err } => (path, err.to_string()),
        ignore::Error::Loop { child, .. } => (child, "symlink loop".to_owned()),
        other => (root.to_path_buf(), other.to_string()),
    };
    RummageError::PropertyAccess {
        key: ENTRIES.to_owned(),
        reason: format!("{}: {reason}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ops::ControlFlow;

    fn children(target: &Value) -> Vec<String> {
        let mut names = Vec::new();
        let mut sink = |key: Key, _: Value| {
            names.push(key.to_string());
            ControlFlow::Continue(())
        };
        DirectoryDrillDown
            .run(&mut Params::new(target, &mut sink))
            .unwrap();
        names
    }

    #[test]
    fn lists_directory_children_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "bb").unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let root = open(dir.path()).unwrap();
        assert_eq!(root.class_name().as_deref(), Some("Directory"));
        assert_eq!(children(&root), ["a.txt", "b.txt", "sub"]);
    }

    #[test]
    fn files_expose_their_properties() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.md");
        std::fs::write(&file, "hello").unwrap();

        let entry = open(&file).unwrap();
        assert_eq!(entry.class_name().as_deref(), Some("File"));
        assert_eq!(entry.get(&"name".into()).unwrap(), Value::from("notes.md"));
        assert_eq!(entry.get(&"kind".into()).unwrap(), Value::from("file"));
        assert_eq!(entry.get(&"len".into()).unwrap(), Value::from(5));
        assert_eq!(entry.get(&ENTRIES.into()).unwrap(), Value::Undefined);
        assert!(children(&entry).is_empty());
    }

    #[test]
    fn hidden_files_are_listed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".hidden"), "").unwrap();
        std::fs::write(dir.path().join(".gitignore"), "*\n").unwrap();

        let root = open(dir.path()).unwrap();
        assert_eq!(children(&root), [".gitignore", ".hidden"]);
    }

    #[derive(Debug)]
    struct Unlistable;

    impl HostObject for Unlistable {
        fn class_name(&self) -> &str {
            EntryKind::Dir.class_name()
        }

        fn keys(&self) -> Vec<Key> {
            vec![Key::from(ENTRIES)]
        }

        fn get(&self, key: &Key) -> Result<Value, RummageError> {
            Err(RummageError::PropertyAccess {
                key: key.to_string(),
                reason: "permission denied".into(),
            })
        }
    }

    #[test]
    fn unlistable_directory_has_no_children() {
        assert!(children(&Value::host(Unlistable)).is_empty());
    }

    #[test]
    fn missing_path_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = open(dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, RummageError::InvalidArgument(_)));
    }
}
