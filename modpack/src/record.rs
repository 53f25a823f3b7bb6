//! Typed records stored in the body of a package.

use crate::stream::{ReadPrimitives, WritePrimitives};
use crate::{Archive, Error, ExtraFileKind, Tag};
use std::convert::TryFrom;
use std::io::{Read, Write};

/// A single body record. The header is not a variant: a
/// package holds exactly one header and it lives outside this list.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum Record {
    /// Serialized level descriptor document.
    LevelDesc(String),
    /// Serialized level metadata (`<LevelType>`) document.
    LevelType(String),
    /// Serialized playlist (`<LevelSetType>`) document.
    LevelSetType(String),
    /// Requests that `level_name` becomes a member of every listed playlist.
    LevelToPlaylistLink {
        level_name: String,
        playlists: Vec<String>,
    },
    /// Reserved. Round-tripped by the codec but never applied by a merge.
    AddToFileInSwz { archive: Archive, content: String },
    /// A new record injected into `archive` under a generated name.
    NewFileInSwz { archive: Archive, content: String },
    /// Replaces the existing record of `archive` with the same derived name.
    OverwriteFileInSwz { archive: Archive, content: String },
    /// A loose file written outside of the archives. `path` is relative,
    /// uses `/` separators and has no extension.
    ExtraFile {
        kind: ExtraFileKind,
        path: String,
        content: Vec<u8>,
    },
}

/// One decoded unit of the tagged stream.
#[derive(Debug)]
pub(crate) enum Tagged {
    Header(crate::Header),
    Record(Record),
    End,
}

impl Record {
    pub fn tag(&self) -> Tag {
        match self {
            Record::LevelDesc(_) => Tag::LevelDesc,
            Record::LevelType(_) => Tag::LevelType,
            Record::LevelSetType(_) => Tag::LevelSetType,
            Record::LevelToPlaylistLink { .. } => Tag::LevelToPlaylistLink,
            Record::AddToFileInSwz { .. } => Tag::AddToFileInSwz,
            Record::NewFileInSwz { .. } => Tag::NewFileInSwz,
            Record::OverwriteFileInSwz { .. } => Tag::OverwriteFileInSwz,
            Record::ExtraFile { .. } => Tag::ExtraFile,
        }
    }

    /// Writes the tag followed by the fields of this record.
    pub(crate) fn write_tagged<W: Write + ?Sized>(&self, w: &mut W) -> Result<(), Error> {
        if let Record::ExtraFile { path, .. } = self {
            check_extra_path(path)?;
        }
        w.write_u8_le(self.tag() as u8)?;
        self.write_fields(w)
    }

    fn write_fields<W: Write + ?Sized>(&self, w: &mut W) -> Result<(), Error> {
        match self {
            Record::LevelDesc(content)
            | Record::LevelType(content)
            | Record::LevelSetType(content) => w.write_long_string(content),
            Record::LevelToPlaylistLink {
                level_name,
                playlists,
            } => {
                w.write_short_string(level_name)?;
                let count = u32::try_from(playlists.len()).map_err(|_| Error::TooLong {
                    len: playlists.len(),
                    max: u32::MAX as usize,
                })?;
                w.write_u32_le(count)?;
                for playlist in playlists {
                    w.write_short_string(playlist)?;
                }
                Ok(())
            }
            Record::AddToFileInSwz { archive, content }
            | Record::NewFileInSwz { archive, content }
            | Record::OverwriteFileInSwz { archive, content } => {
                w.write_u8_le(*archive as u8)?;
                w.write_long_string(content)
            }
            Record::ExtraFile {
                kind,
                path,
                content,
            } => {
                w.write_u8_le(*kind as u8)?;
                w.write_short_string(path)?;
                w.write_blob(content)
            }
        }
    }

    fn read_archive_content<R: Read + ?Sized>(r: &mut R) -> Result<(Archive, String), Error> {
        let archive = Archive::try_from(r.read_u8_le()?)?;
        Ok((archive, r.read_long_string()?))
    }
}

/// Reads one tag and the fields that belong to it.
pub(crate) fn read_tagged<R: Read + ?Sized>(r: &mut R) -> Result<Tagged, Error> {
    let tag = Tag::try_from(r.read_u8_le()?)?;

    let record = match tag {
        Tag::End => return Ok(Tagged::End),
        Tag::Header => return Ok(Tagged::Header(crate::Header::read_fields(r)?)),
        Tag::LevelDesc => Record::LevelDesc(r.read_long_string()?),
        Tag::LevelType => Record::LevelType(r.read_long_string()?),
        Tag::LevelSetType => Record::LevelSetType(r.read_long_string()?),
        Tag::LevelToPlaylistLink => {
            let level_name = r.read_short_string()?;
            let count = r.read_u32_le()?;
            // count comes from the stream, let the vec grow with real data
            let mut playlists = Vec::new();
            for _ in 0..count {
                playlists.push(r.read_short_string()?);
            }
            Record::LevelToPlaylistLink {
                level_name,
                playlists,
            }
        }
        Tag::AddToFileInSwz => {
            let (archive, content) = Record::read_archive_content(r)?;
            Record::AddToFileInSwz { archive, content }
        }
        Tag::NewFileInSwz => {
            let (archive, content) = Record::read_archive_content(r)?;
            Record::NewFileInSwz { archive, content }
        }
        Tag::OverwriteFileInSwz => {
            let (archive, content) = Record::read_archive_content(r)?;
            Record::OverwriteFileInSwz { archive, content }
        }
        Tag::ExtraFile => {
            let kind = ExtraFileKind::try_from(r.read_u8_le()?)?;
            let path = r.read_short_string()?;
            check_extra_path(&path)?;
            Record::ExtraFile {
                kind,
                path,
                content: r.read_blob()?,
            }
        }
    };

    Ok(Tagged::Record(record))
}

/// Checks that an extra file path stays below the directory it is written
/// into: `/` separated segments, none of them empty, `.` or `..`, and no
/// backslashes, drive colons or NUL bytes.
pub fn check_extra_path(path: &str) -> Result<(), Error> {
    let valid = path.split('/').all(|segment| {
        !segment.is_empty()
            && segment != "."
            && segment != ".."
            && !segment.contains(|c: char| c == '\\' || c == ':' || c == '\0')
    });

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidPath(path.to_owned()))
    }
}
