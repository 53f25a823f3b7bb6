use crate::Error;
use std::convert::TryFrom;
use std::fmt;

/// One byte tag that precedes every record inside the compressed body of
/// a package.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[repr(u8)]
pub enum Tag {
    /// Terminates the record sequence. Carries no fields.
    End = 0,
    Header = 1,
    LevelDesc = 2,
    LevelType = 3,
    LevelSetType = 4,
    LevelToPlaylistLink = 5,
    AddToFileInSwz = 6,
    NewFileInSwz = 7,
    OverwriteFileInSwz = 8,
    ExtraFile = 9,
}

impl TryFrom<u8> for Tag {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Tag::End),
            1 => Ok(Tag::Header),
            2 => Ok(Tag::LevelDesc),
            3 => Ok(Tag::LevelType),
            4 => Ok(Tag::LevelSetType),
            5 => Ok(Tag::LevelToPlaylistLink),
            6 => Ok(Tag::AddToFileInSwz),
            7 => Ok(Tag::NewFileInSwz),
            8 => Ok(Tag::OverwriteFileInSwz),
            9 => Ok(Tag::ExtraFile),
            t => Err(Error::UnknownTag(t)),
        }
    }
}

/// The encrypted resource archives of the game a package can edit.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
#[repr(u8)]
pub enum Archive {
    Dynamic = 0,
    Engine = 1,
    Game = 2,
    Init = 3,
}

impl Archive {
    pub const ALL: [Archive; 4] = [
        Archive::Dynamic,
        Archive::Engine,
        Archive::Game,
        Archive::Init,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Archive::Dynamic => "Dynamic",
            Archive::Engine => "Engine",
            Archive::Game => "Game",
            Archive::Init => "Init",
        }
    }

    /// Looks up an archive by its name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        Archive::ALL
            .iter()
            .copied()
            .find(|a| a.name().eq_ignore_ascii_case(name))
    }

    /// File name of the archive inside the game directory.
    pub fn file_name(self) -> String {
        format!("{}.swz", self.name())
    }
}

impl fmt::Display for Archive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for Archive {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Archive::Dynamic),
            1 => Ok(Archive::Engine),
            2 => Ok(Archive::Game),
            3 => Ok(Archive::Init),
            t => Err(Error::UnknownArchive(t)),
        }
    }
}

/// Kind of a loose file shipped next to the archives. Each kind maps to
/// exactly one file extension so the extension can be dropped from the
/// stored path and re-applied when the file is written out.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[repr(u8)]
pub enum ExtraFileKind {
    Png = 0,
    Jpg = 1,
    Animation = 2,
    Binary = 3,
    AudioBank = 4,
}

impl ExtraFileKind {
    /// Resolves the kind from a file extension (case-insensitive). Returns
    /// `None` for anything outside the allow-list.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(ExtraFileKind::Png),
            "jpg" => Some(ExtraFileKind::Jpg),
            "anm" => Some(ExtraFileKind::Animation),
            "bin" => Some(ExtraFileKind::Binary),
            "bnk" => Some(ExtraFileKind::AudioBank),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExtraFileKind::Png => "png",
            ExtraFileKind::Jpg => "jpg",
            ExtraFileKind::Animation => "anm",
            ExtraFileKind::Binary => "bin",
            ExtraFileKind::AudioBank => "bnk",
        }
    }
}

impl TryFrom<u8> for ExtraFileKind {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ExtraFileKind::Png),
            1 => Ok(ExtraFileKind::Jpg),
            2 => Ok(ExtraFileKind::Animation),
            3 => Ok(ExtraFileKind::Binary),
            4 => Ok(ExtraFileKind::AudioBank),
            t => Err(Error::UnknownFileKind(t)),
        }
    }
}
