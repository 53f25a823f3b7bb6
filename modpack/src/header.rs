use crate::stream::{ReadPrimitives, WritePrimitives};
use crate::Error;
use std::io::{Read, Write};

/// Latest package version this implementation writes.
pub const PACKAGE_VERSION: u32 = 1;

/// Highest package version this implementation can read. Streams with a
/// higher version are rejected before the body is touched.
pub const MAX_SUPPORTED_VERSION: u32 = 1;

/// Header of every package. It is always the first record of the
/// compressed body and appears exactly once.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct Header {
    pub name: String,
    pub game_version: String,
    pub package_version: String,
    pub description: String,
    pub author: String,
}

impl Header {
    pub fn new(
        name: impl Into<String>,
        game_version: impl Into<String>,
        package_version: impl Into<String>,
        description: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Header {
            name: name.into(),
            game_version: game_version.into(),
            package_version: package_version.into(),
            description: description.into(),
            author: author.into(),
        }
    }

    /// Writes the header fields (without the tag).
    pub(crate) fn write_fields<W: Write + ?Sized>(&self, w: &mut W) -> Result<(), Error> {
        w.write_short_string(&self.name)?;
        w.write_short_string(&self.game_version)?;
        w.write_short_string(&self.package_version)?;
        w.write_long_string(&self.description)?;
        w.write_short_string(&self.author)
    }

    /// Reads the header fields in the same order `write_fields` writes them.
    pub(crate) fn read_fields<R: Read + ?Sized>(r: &mut R) -> Result<Self, Error> {
        Ok(Header {
            name: r.read_short_string()?,
            game_version: r.read_short_string()?,
            package_version: r.read_short_string()?,
            description: r.read_long_string()?,
            author: r.read_short_string()?,
        })
    }
}
