use crate::manifest::{manifest_path, Manifest, MANIFEST_ENV};
use crate::Dir2MpParameters;
use log::{info, warn};
use modpack::{BuildError, ExtraFileKind, Level, PackageBuilder, PACKAGE_EXTENSION};
use mpcore::tool::Tool;
use mpcore::{impl_timings, time_scope};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

// generate `Timings` struct with a `Timer` per phase
impl_timings!(pub Timings; load, levels, files, save);

#[derive(Debug, Error)]
pub enum Dir2MpError {
    #[error("cannot read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid manifest {path:?}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("cannot walk {path:?}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error("cannot save package {path:?}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: modpack::Error,
    },
}

/// Builds a package file from a mod directory.
pub struct Dir2Mp;

impl Tool for Dir2Mp {
    type Params = Dir2MpParameters;
    type Output = Timings<'static>;
    type Error = Dir2MpError;

    fn execute(&self, params: Dir2MpParameters) -> Result<Timings<'static>, Dir2MpError> {
        let manifest = params.manifest.as_deref();
        let manifest = manifest_path(&params.input, manifest, std::env::var_os(MANIFEST_ENV));
        let output = params
            .output
            .clone()
            .unwrap_or_else(|| params.input.with_extension(PACKAGE_EXTENSION));

        let mut run = Dir2MpRun {
            input: params.input,
            timings: Timings::default(),
        };

        let manifest = run.load_manifest(&manifest)?;
        let mut builder = PackageBuilder::new(manifest.header());

        run.add_levels(&manifest, &mut builder)?;
        run.add_files(&manifest, &mut builder)?;
        run.save(&builder, &output)?;

        Ok(run.timings)
    }
}

struct Dir2MpRun {
    input: PathBuf,
    timings: Timings<'static>,
}

/// Reads a document referenced by the manifest.
fn read(input: &Path, relative: &Path) -> Result<String, Dir2MpError> {
    let path = input.join(relative);
    std::fs::read_to_string(&path).map_err(|source| Dir2MpError::Read { path, source })
}

impl Dir2MpRun {
    fn load_manifest(&mut self, path: &Path) -> Result<Manifest, Dir2MpError> {
        time_scope!(self.timings.load);

        let text = std::fs::read_to_string(path).map_err(|source| Dir2MpError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest = serde_json::from_str(&text).map_err(|source| Dir2MpError::Manifest {
            path: path.to_path_buf(),
            source,
        })?;

        info!("loaded manifest {:?}", path);
        Ok(manifest)
    }

    /// Adds levels, playlists and archive records. Documents are read as
    /// text and stored verbatim.
    fn add_levels(
        &mut self,
        manifest: &Manifest,
        builder: &mut PackageBuilder,
    ) -> Result<(), Dir2MpError> {
        time_scope!(self.timings.levels);

        for entry in &manifest.levels {
            let level_type = match entry.level_type {
                Some(ref path) => Some(read(&self.input, path)?),
                None => None,
            };
            builder.add_level(&Level {
                name: entry.name.clone(),
                descriptor: read(&self.input, &entry.descriptor)?,
                level_type,
                playlists: entry.playlists.clone(),
            });
        }

        for path in &manifest.playlists {
            builder.add_playlist_document(read(&self.input, path)?);
        }
        for entry in &manifest.new_files {
            builder.add_new_archive_file(entry.archive, read(&self.input, &entry.path)?);
        }
        for entry in &manifest.overwrite_files {
            builder.overwrite_archive_file(entry.archive, read(&self.input, &entry.path)?);
        }

        info!(
            "added {} levels, {} playlists, {} archive records",
            manifest.levels.len(),
            manifest.playlists.len(),
            manifest.new_files.len() + manifest.overwrite_files.len()
        );
        Ok(())
    }

    /// Adds every allow-listed file under `files_root` as a loose file.
    fn add_files(
        &mut self,
        manifest: &Manifest,
        builder: &mut PackageBuilder,
    ) -> Result<(), Dir2MpError> {
        time_scope!(self.timings.files);

        let root = match manifest.files_root {
            Some(ref root) => self.input.join(root),
            None => return Ok(()),
        };

        let mut added = 0;
        let walk = WalkDir::new(&root).sort_by(|a, b| a.file_name().cmp(b.file_name()));
        for entry in walk {
            let entry = entry.map_err(|source| Dir2MpError::Walk {
                path: root.clone(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let supported = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .and_then(ExtraFileKind::from_extension)
                .is_some();
            if !supported {
                warn!("skipping {:?}: unsupported extension", entry.path());
                continue;
            }

            builder.add_file(&root, entry.path())?;
            added += 1;
        }

        info!("added {} files from {:?}", added, root);
        Ok(())
    }

    fn save(&mut self, builder: &PackageBuilder, path: &Path) -> Result<(), Dir2MpError> {
        time_scope!(self.timings.save);

        builder.build().save(path).map_err(|source| Dir2MpError::Save {
            path: path.to_path_buf(),
            source,
        })?;

        info!("saved {} records to {:?}", builder.len(), path);
        Ok(())
    }
}
