//! Accumulates records from editor-level inputs into a [`Package`].

use crate::record::{check_extra_path, Record};
use crate::{Archive, ExtraFileKind, Header, Package};
use log::debug;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("file {0:?} does not exist or is not a regular file")]
    FileNotFound(PathBuf),
    #[error("file {path:?} is not inside the base directory {base:?}")]
    OutsideBaseDirectory { path: PathBuf, base: PathBuf },
    #[error("file {0:?} has an unsupported extension")]
    UnsupportedExtension(PathBuf),
    #[error("file {0:?} has a name that cannot be stored in a package")]
    InvalidName(PathBuf),
    #[error("cannot read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The parts of an editor level that end up in a package.
#[derive(Clone, Debug, Default)]
pub struct Level {
    pub name: String,
    /// Serialized level descriptor document.
    pub descriptor: String,
    /// Serialized `<LevelType>` document, if the level has one.
    pub level_type: Option<String>,
    /// Names of the playlists the level currently belongs to.
    pub playlists: Vec<String>,
}

/// Mutable accumulator of package records. `build()` snapshots the current
/// state; the builder can keep being used afterwards.
#[derive(Clone, Debug)]
pub struct PackageBuilder {
    header: Header,
    records: Vec<Record>,
}

impl PackageBuilder {
    pub fn new(header: Header) -> Self {
        PackageBuilder {
            header,
            records: vec![],
        }
    }

    pub fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    /// Number of records added so far.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn add_level_descriptor(&mut self, text: impl Into<String>) -> &mut Self {
        self.records.push(Record::LevelDesc(text.into()));
        self
    }

    pub fn add_level_type(&mut self, text: impl Into<String>) -> &mut Self {
        self.records.push(Record::LevelType(text.into()));
        self
    }

    pub fn add_playlist_document(&mut self, text: impl Into<String>) -> &mut Self {
        self.records.push(Record::LevelSetType(text.into()));
        self
    }

    pub fn link_level_to_playlists<S: AsRef<str>>(
        &mut self,
        level_name: impl Into<String>,
        playlists: &[S],
    ) -> &mut Self {
        self.records.push(Record::LevelToPlaylistLink {
            level_name: level_name.into(),
            playlists: playlists.iter().map(|p| p.as_ref().to_owned()).collect(),
        });
        self
    }

    /// Adds the descriptor, the level type (when present) and a link to
    /// every playlist the level is currently a member of.
    pub fn add_level(&mut self, level: &Level) -> &mut Self {
        self.add_level_descriptor(level.descriptor.as_str());
        if let Some(ref level_type) = level.level_type {
            self.add_level_type(level_type.as_str());
        }
        self.link_level_to_playlists(level.name.as_str(), &level.playlists)
    }

    pub fn add_new_archive_file(&mut self, archive: Archive, content: impl Into<String>) -> &mut Self {
        self.records.push(Record::NewFileInSwz {
            archive,
            content: content.into(),
        });
        self
    }

    pub fn overwrite_archive_file(
        &mut self,
        archive: Archive,
        content: impl Into<String>,
    ) -> &mut Self {
        self.records.push(Record::OverwriteFileInSwz {
            archive,
            content: content.into(),
        });
        self
    }

    /// Records an append to an existing archive record. The format carries
    /// these but merging does not apply them yet.
    pub fn add_to_archive_file(&mut self, archive: Archive, content: impl Into<String>) -> &mut Self {
        self.records.push(Record::AddToFileInSwz {
            archive,
            content: content.into(),
        });
        self
    }

    /// Adds a loose file located under `base_dir`. The stored path is
    /// relative to `base_dir`, uses `/` separators and has its extension
    /// removed. The content is read eagerly.
    ///
    /// All validation happens before the file is read; on error the builder
    /// is left unchanged.
    pub fn add_file(
        &mut self,
        base_dir: impl AsRef<Path>,
        path: impl AsRef<Path>,
    ) -> Result<&mut Self, BuildError> {
        let (kind, relative, file) = validate_file(base_dir.as_ref(), path.as_ref())?;

        let content = std::fs::read(&file).map_err(|source| BuildError::Io {
            path: file.clone(),
            source,
        })?;

        debug!("adding {:?} as {:?} ({} bytes)", file, relative, content.len());

        self.records.push(Record::ExtraFile {
            kind,
            path: relative,
            content,
        });
        Ok(self)
    }

    /// Snapshots the accumulated records into a package.
    pub fn build(&self) -> Package {
        Package {
            records: self.records.clone(),
            ..Package::new(self.header.clone())
        }
    }
}

/// Checks existence, containment and extension of `path`. Returns the
/// file kind, the stored relative path and the canonical file path.
fn validate_file(base: &Path, path: &Path) -> Result<(ExtraFileKind, String, PathBuf), BuildError> {
    let file = path
        .canonicalize()
        .map_err(|_| BuildError::FileNotFound(path.to_path_buf()))?;
    if !file.is_file() {
        return Err(BuildError::FileNotFound(path.to_path_buf()));
    }

    let base = base.canonicalize().map_err(|source| BuildError::Io {
        path: base.to_path_buf(),
        source,
    })?;

    // both paths are canonical, symlinks and `..` are already resolved
    let relative = match file.strip_prefix(&base) {
        Ok(t) => t.to_path_buf(),
        Err(_) => {
            return Err(BuildError::OutsideBaseDirectory {
                path: path.to_path_buf(),
                base,
            })
        }
    };

    let kind = relative
        .extension()
        .and_then(|e| e.to_str())
        .and_then(ExtraFileKind::from_extension)
        .ok_or_else(|| BuildError::UnsupportedExtension(path.to_path_buf()))?;

    let stored = relative
        .with_extension("")
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");
    check_extra_path(&stored).map_err(|_| BuildError::InvalidName(path.to_path_buf()))?;

    Ok((kind, stored, file))
}

#[cfg(test)]
mod tests {
    use crate::builder::{BuildError, Level, PackageBuilder};
    use crate::record::Record;
    use crate::{Archive, ExtraFileKind, Header, PACKAGE_VERSION};
    use matches::assert_matches;
    use std::fs;

    fn builder() -> PackageBuilder {
        PackageBuilder::new(Header::new("Test", "1", "1", "d", "a"))
    }

    #[test]
    fn test_documents_are_stored_verbatim() {
        let mut builder = builder();
        builder
            .add_level_descriptor("LevelDesc_X <not even xml")
            .add_level_type("<LevelType LevelName=\"X\"/>")
            .add_playlist_document("<LevelSetType LevelSetName=\"Mine\"/>")
            .link_level_to_playlists("X", &["Main", "Mine"]);

        let package = builder.build();
        assert_eq!(package.version, PACKAGE_VERSION);
        assert_eq!(
            package.records,
            vec![
                Record::LevelDesc("LevelDesc_X <not even xml".into()),
                Record::LevelType("<LevelType LevelName=\"X\"/>".into()),
                Record::LevelSetType("<LevelSetType LevelSetName=\"Mine\"/>".into()),
                Record::LevelToPlaylistLink {
                    level_name: "X".into(),
                    playlists: vec!["Main".into(), "Mine".into()],
                },
            ]
        );
    }

    #[test]
    fn test_add_level() {
        let mut builder = builder();
        builder.add_level(&Level {
            name: "X".into(),
            descriptor: "desc".into(),
            level_type: None,
            playlists: vec!["Main".into()],
        });
        builder.add_level(&Level {
            name: "Y".into(),
            descriptor: "desc2".into(),
            level_type: Some("type2".into()),
            playlists: vec![],
        });

        let package = builder.build();
        assert_eq!(package.level_descs().collect::<Vec<_>>(), vec!["desc", "desc2"]);
        assert_eq!(package.level_types().collect::<Vec<_>>(), vec!["type2"]);
        let links: Vec<_> = package.links().map(|(l, p)| (l, p.len())).collect();
        assert_eq!(links, vec![("X", 1), ("Y", 0)]);
    }

    #[test]
    fn test_build_snapshots() {
        let mut builder = builder();
        builder.add_new_archive_file(Archive::Game, "a");
        let first = builder.build();

        builder
            .overwrite_archive_file(Archive::Init, "b")
            .add_to_archive_file(Archive::Engine, "c");
        builder.header_mut().name = "Changed".into();
        let second = builder.build();

        assert_eq!(first.records.len(), 1);
        assert_eq!(first.header.name, "Test");
        assert_eq!(second.records.len(), 3);
        assert_eq!(
            second.add_to_files().collect::<Vec<_>>(),
            vec![(Archive::Engine, "c")]
        );
        assert_eq!(second.header.name, "Changed");
    }

    #[test]
    fn test_add_file() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("images").join("ui");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("Thumb.PNG"), [1u8, 2, 3]).unwrap();

        let mut builder = builder();
        builder
            .add_file(dir.path(), nested.join("Thumb.PNG"))
            .unwrap();

        assert_eq!(
            builder.build().records,
            vec![Record::ExtraFile {
                kind: ExtraFileKind::Png,
                path: "images/ui/Thumb".into(),
                content: vec![1, 2, 3],
            }]
        );
    }

    #[test]
    fn test_add_file_rejects_escape() {
        let root = tempfile::tempdir().unwrap();
        let base = root.path().join("mod");
        fs::create_dir_all(&base).unwrap();
        fs::write(root.path().join("secret.bin"), [0u8]).unwrap();

        let mut builder = builder();
        assert_matches!(
            builder.add_file(&base, base.join("..").join("secret.bin")),
            Err(BuildError::OutsideBaseDirectory { .. })
        );
        assert_matches!(
            builder.add_file(&base, root.path().join("secret.bin")),
            Err(BuildError::OutsideBaseDirectory { .. })
        );
        assert!(builder.is_empty());
    }

    #[test]
    fn test_add_file_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        fs::write(dir.path().join("noext"), "hello").unwrap();

        let mut builder = builder();
        assert_matches!(
            builder.add_file(dir.path(), dir.path().join("notes.txt")),
            Err(BuildError::UnsupportedExtension(_))
        );
        assert_matches!(
            builder.add_file(dir.path(), dir.path().join("noext")),
            Err(BuildError::UnsupportedExtension(_))
        );
        assert!(builder.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_add_file_rejects_unstorable_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a\\b.png"), [0u8]).unwrap();

        let mut builder = builder();
        assert_matches!(
            builder.add_file(dir.path(), dir.path().join("a\\b.png")),
            Err(BuildError::InvalidName(_))
        );
        assert!(builder.is_empty());
    }

    #[test]
    fn test_add_file_missing() {
        let dir = tempfile::tempdir().unwrap();

        let mut builder = builder();
        assert_matches!(
            builder.add_file(dir.path(), dir.path().join("gone.png")),
            Err(BuildError::FileNotFound(_))
        );
        assert_matches!(
            builder.add_file(dir.path(), dir.path()),
            Err(BuildError::FileNotFound(_))
        );
    }
}
