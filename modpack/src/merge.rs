//! Composes packages into the content of the game archives.
//!
//! A merge run loads every record of the four archives through an
//! [`ArchiveStore`], applies the edits of all packages in order and writes
//! the archives back out. Nothing is written until every package applied
//! cleanly; the first error aborts the whole run.

use crate::content::{DocumentError, LevelSetTypes, LevelTypes, LEVEL_SET_TYPES, LEVEL_TYPES};
use crate::{check_extra_path, Archive, Package};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Access to the encrypted archives of the game.
///
/// Implementations own the archive codec: reading and decrypting the
/// records of an archive, deriving the logical name of a record from its
/// content and encoding a new archive from a sequence of records.
pub trait ArchiveStore {
    type Error: StdError + Send + Sync + 'static;

    /// Returns every raw record stored in `archive`.
    fn enumerate(&self, archive: Archive, key: u32) -> Result<Vec<String>, Self::Error>;

    /// Derives the logical name of a record from its content.
    fn name_of(&self, content: &str) -> String;

    /// Encodes a complete archive holding `contents`, in the given order.
    fn write(&self, archive: Archive, key: u32, contents: &[&str]) -> Result<Vec<u8>, Self::Error>;
}

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("cannot access archive {archive}: {source}")]
    Archive {
        archive: Archive,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    #[error("cannot overwrite {name:?} in {archive}: no such record")]
    OverwriteMissing { archive: Archive, name: String },
    #[error("archive {archive} has no {name:?} record")]
    MissingDocument { archive: Archive, name: &'static str },
    #[error("cannot apply {name}: {source}")]
    Document {
        name: &'static str,
        #[source]
        source: DocumentError,
    },
    #[error("package {package:?} ships an unsafe extra file path: {source}")]
    ExtraFilePath {
        package: String,
        #[source]
        source: crate::Error,
    },
    #[error("cannot write merge output: {0}")]
    Io(#[from] io::Error),
}

/// Which write wins when two inserts into the same map use the same key.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Precedence {
    /// A later insert replaces the earlier value.
    LastWins,
    /// The first inserted value is kept, later inserts are dropped.
    FirstWins,
}

impl Precedence {
    /// Inserts `value` according to this policy. Returns `true` when the
    /// map now holds `value`.
    pub fn insert<K: Ord, V>(self, map: &mut BTreeMap<K, V>, key: K, value: V) -> bool {
        match self {
            Precedence::LastWins => {
                map.insert(key, value);
                true
            }
            Precedence::FirstWins => {
                if map.contains_key(&key) {
                    return false;
                }
                map.insert(key, value);
                true
            }
        }
    }
}

/// Level descriptors replace each other across packages.
pub const DESCRIPTOR_PRECEDENCE: Precedence = Precedence::LastWins;

/// Extra files are never replaced by a later package.
pub const EXTRA_FILE_PRECEDENCE: Precedence = Precedence::FirstWins;

/// Key of a record in an archive map. Records injected by a merge are
/// numbered instead of named so they can never collide with an existing
/// record.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum EntryKey {
    Named(String),
    Injected(u64),
}

type ArchiveMap = BTreeMap<EntryKey, String>;

/// Result of a merge run.
#[derive(Clone, Debug, Default)]
pub struct MergeOutput {
    /// Encoded archive per archive.
    pub archives: BTreeMap<Archive, Vec<u8>>,
    /// Loose files keyed by relative path including extension.
    pub extra_files: BTreeMap<String, Vec<u8>>,
}

impl MergeOutput {
    /// Flattens the output into one map of relative file names, archives
    /// under their `.swz` file names.
    pub fn into_files(self) -> BTreeMap<String, Vec<u8>> {
        let mut files = self.extra_files;
        for (archive, bytes) in self.archives {
            files.insert(archive.file_name(), bytes);
        }
        files
    }

    /// Writes every output file under `root`, creating directories as
    /// needed.
    pub fn write_to(self, root: impl AsRef<Path>) -> Result<(), MergeError> {
        let root = root.as_ref();
        for (name, bytes) in self.into_files() {
            let path = root.join(&name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, bytes)?;
            debug!("wrote {:?}", path);
        }
        Ok(())
    }
}

/// Working state of a single merge run.
struct MergeRun<'a, S: ArchiveStore> {
    store: &'a S,
    key: u32,
    archives: BTreeMap<Archive, ArchiveMap>,
    extra_files: BTreeMap<String, Vec<u8>>,
    next_injected: u64,
}

impl<'a, S: ArchiveStore> MergeRun<'a, S> {
    /// Loads all four archives. Fails before any package is looked at when
    /// an archive cannot be read.
    fn load(store: &'a S, key: u32) -> Result<Self, MergeError> {
        let mut archives = BTreeMap::new();

        for archive in Archive::ALL.iter().copied() {
            let records = store
                .enumerate(archive, key)
                .map_err(|e| MergeError::Archive {
                    archive,
                    source: Box::new(e),
                })?;

            let mut map = ArchiveMap::new();
            for content in records {
                let name = store.name_of(&content);
                if map.insert(EntryKey::Named(name.clone()), content).is_some() {
                    warn!("archive {} contains {:?} more than once", archive, name);
                }
            }

            info!("loaded {} records from {}", map.len(), archive);
            archives.insert(archive, map);
        }

        Ok(MergeRun {
            store,
            key,
            archives,
            extra_files: BTreeMap::new(),
            next_injected: 0,
        })
    }

    fn map(&mut self, archive: Archive) -> &mut ArchiveMap {
        self.archives.entry(archive).or_default()
    }

    fn apply_descriptors(&mut self, packages: &[Package]) {
        for package in packages {
            for content in package.level_descs() {
                let name = self.store.name_of(content);
                debug!("level descriptor {:?} from {:?}", name, package.header.name);
                DESCRIPTOR_PRECEDENCE.insert(
                    self.map(Archive::Dynamic),
                    EntryKey::Named(name),
                    content.to_owned(),
                );
            }
        }
    }

    fn document(&mut self, archive: Archive, name: &'static str) -> Result<&mut String, MergeError> {
        self.map(archive)
            .get_mut(&EntryKey::Named(name.to_owned()))
            .ok_or(MergeError::MissingDocument { archive, name })
    }

    fn apply_level_types(&mut self, packages: &[Package]) -> Result<(), MergeError> {
        if packages.iter().all(|p| p.level_types().next().is_none()) {
            return Ok(());
        }

        let document = self.document(Archive::Init, LEVEL_TYPES)?;
        let wrap = |source| MergeError::Document {
            name: LEVEL_TYPES,
            source,
        };

        let mut level_types = LevelTypes::parse(document).map_err(wrap)?;
        for package in packages {
            for content in package.level_types() {
                level_types.upsert(content).map_err(wrap)?;
            }
        }

        *document = level_types.to_string();
        Ok(())
    }

    fn apply_playlists(&mut self, packages: &[Package]) -> Result<(), MergeError> {
        let touched = packages
            .iter()
            .any(|p| p.level_set_types().next().is_some() || p.links().next().is_some());
        if !touched {
            return Ok(());
        }

        let document = self.document(Archive::Game, LEVEL_SET_TYPES)?;
        let wrap = |source| MergeError::Document {
            name: LEVEL_SET_TYPES,
            source,
        };

        let mut playlists = LevelSetTypes::parse(document).map_err(wrap)?;

        // new playlists first, so links can target playlists added by any package
        for package in packages {
            for content in package.level_set_types() {
                playlists.append(content).map_err(wrap)?;
            }
        }
        for package in packages {
            for (level_name, targets) in package.links() {
                playlists.link(level_name, targets).map_err(wrap)?;
            }
        }

        *document = playlists.to_string();
        Ok(())
    }

    fn apply_archive_files(&mut self, packages: &[Package]) -> Result<(), MergeError> {
        for package in packages {
            for (archive, content) in package.new_files() {
                let key = EntryKey::Injected(self.next_injected);
                self.next_injected += 1;
                debug!("injecting new record {:?} into {}", key, archive);
                self.map(archive).insert(key, content.to_owned());
            }

            for (archive, content) in package.overwrite_files() {
                let name = self.store.name_of(content);
                match self.map(archive).get_mut(&EntryKey::Named(name.clone())) {
                    Some(existing) => {
                        debug!("overwriting {:?} in {}", name, archive);
                        *existing = content.to_owned();
                    }
                    None => return Err(MergeError::OverwriteMissing { archive, name }),
                }
            }

            let skipped = package.add_to_files().count();
            if skipped > 0 {
                warn!(
                    "package {:?} has {} append-to-record entries, these are not applied",
                    package.header.name, skipped
                );
            }
        }
        Ok(())
    }

    fn apply_extra_files(&mut self, packages: &[Package]) -> Result<(), MergeError> {
        for package in packages {
            for (kind, path, content) in package.extra_files() {
                check_extra_path(path).map_err(|source| MergeError::ExtraFilePath {
                    package: package.header.name.clone(),
                    source,
                })?;
                let name = format!("{}.{}", path, kind.extension());
                if !EXTRA_FILE_PRECEDENCE.insert(&mut self.extra_files, name.clone(), content.to_vec()) {
                    debug!(
                        "extra file {:?} from {:?} ignored, already provided",
                        name, package.header.name
                    );
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<MergeOutput, MergeError> {
        let mut archives = BTreeMap::new();

        for (archive, map) in &self.archives {
            let contents: Vec<&str> = map.values().map(String::as_str).collect();
            let bytes = self
                .store
                .write(*archive, self.key, &contents)
                .map_err(|e| MergeError::Archive {
                    archive: *archive,
                    source: Box::new(e),
                })?;
            archives.insert(*archive, bytes);
        }

        Ok(MergeOutput {
            archives,
            extra_files: self.extra_files,
        })
    }
}

/// Applies `packages` in order to the archives provided by `store` and
/// returns the rewritten archives together with all extra files.
pub fn merge<S: ArchiveStore>(
    store: &S,
    key: u32,
    packages: &[Package],
) -> Result<MergeOutput, MergeError> {
    let mut run = MergeRun::load(store, key)?;

    run.apply_descriptors(packages);
    run.apply_level_types(packages)?;
    run.apply_playlists(packages)?;
    run.apply_archive_files(packages)?;
    run.apply_extra_files(packages)?;

    info!(
        "merged {} packages, {} extra files",
        packages.len(),
        run.extra_files.len()
    );

    run.finish()
}
