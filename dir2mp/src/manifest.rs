//! The `modpack.json` file describing the content of a mod directory.
//!
//! Every path in the manifest is relative to the mod directory.

use modpack::{Archive, Header};
use serde::{Deserialize, Deserializer};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Name of the manifest looked up in the mod directory.
pub const MANIFEST_FILE: &str = "modpack.json";

/// Environment variable overriding the manifest location.
pub const MANIFEST_ENV: &str = "DIR2MP_MANIFEST";

#[derive(Deserialize, Debug)]
pub struct Manifest {
    pub name: String,
    pub game_version: String,
    pub package_version: String,
    #[serde(default)]
    pub description: String,
    pub author: String,

    /// Levels added or replaced by the mod.
    #[serde(default)]
    pub levels: Vec<LevelEntry>,

    /// Files holding `<LevelSetType>` documents of new playlists.
    #[serde(default)]
    pub playlists: Vec<PathBuf>,

    /// Records injected into the archives.
    #[serde(default)]
    pub new_files: Vec<ArchiveEntry>,

    /// Records replacing archive records with the same name.
    #[serde(default)]
    pub overwrite_files: Vec<ArchiveEntry>,

    /// Directory whose files are shipped as loose files.
    pub files_root: Option<PathBuf>,
}

impl Manifest {
    pub fn header(&self) -> Header {
        Header::new(
            self.name.as_str(),
            self.game_version.as_str(),
            self.package_version.as_str(),
            self.description.as_str(),
            self.author.as_str(),
        )
    }
}

#[derive(Deserialize, Debug)]
pub struct LevelEntry {
    pub name: String,
    /// File with the level descriptor document.
    pub descriptor: PathBuf,
    /// File with the `<LevelType>` document of the level.
    pub level_type: Option<PathBuf>,
    /// Playlists the level should be part of.
    #[serde(default)]
    pub playlists: Vec<String>,
}

#[derive(Deserialize, Debug)]
pub struct ArchiveEntry {
    #[serde(deserialize_with = "archive_by_name")]
    pub archive: Archive,
    pub path: PathBuf,
}

fn archive_by_name<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Archive, D::Error> {
    let name = String::deserialize(deserializer)?;
    Archive::from_name(&name)
        .ok_or_else(|| serde::de::Error::custom(format!("unknown archive {:?}", name)))
}

/// Resolves the manifest location. An explicit path wins over the
/// environment variable, which wins over `<input>/modpack.json`.
pub fn manifest_path(input: &Path, explicit: Option<&Path>, env: Option<OsString>) -> PathBuf {
    match (explicit, env) {
        (Some(path), _) => path.to_path_buf(),
        (None, Some(path)) => PathBuf::from(path),
        (None, None) => input.join(MANIFEST_FILE),
    }
}
