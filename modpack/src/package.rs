use crate::header::{Header, MAX_SUPPORTED_VERSION, PACKAGE_VERSION};
use crate::record::{read_tagged, Record, Tagged};
use crate::stream::{ReadPrimitives, WritePrimitives};
use crate::{Archive, Error, ExtraFileKind, Tag};
use log::debug;
use std::io::{Read, Write};
use std::path::Path;

/// Extension of package files on disk.
pub const PACKAGE_EXTENSION: &str = "mpk";

/// lz4 level used for the compressed body.
const COMPRESSION_LEVEL: u32 = 9;

/// A decoded (or freshly built) mod package.
///
/// Records keep the order they were added in (or read in). Only the order
/// among records of the same kind carries meaning.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Package {
    pub version: u32,
    pub header: Header,
    pub records: Vec<Record>,
}

impl Package {
    pub fn new(header: Header) -> Self {
        Package {
            version: PACKAGE_VERSION,
            header,
            records: vec![],
        }
    }

    pub fn level_descs(&self) -> impl Iterator<Item = &str> {
        self.records.iter().filter_map(|r| match r {
            Record::LevelDesc(c) => Some(c.as_str()),
            _ => None,
        })
    }

    pub fn level_types(&self) -> impl Iterator<Item = &str> {
        self.records.iter().filter_map(|r| match r {
            Record::LevelType(c) => Some(c.as_str()),
            _ => None,
        })
    }

    pub fn level_set_types(&self) -> impl Iterator<Item = &str> {
        self.records.iter().filter_map(|r| match r {
            Record::LevelSetType(c) => Some(c.as_str()),
            _ => None,
        })
    }

    /// Level-to-playlist links as `(level_name, playlists)`.
    pub fn links(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.records.iter().filter_map(|r| match r {
            Record::LevelToPlaylistLink {
                level_name,
                playlists,
            } => Some((level_name.as_str(), playlists.as_slice())),
            _ => None,
        })
    }

    pub fn add_to_files(&self) -> impl Iterator<Item = (Archive, &str)> {
        self.records.iter().filter_map(|r| match r {
            Record::AddToFileInSwz { archive, content } => Some((*archive, content.as_str())),
            _ => None,
        })
    }

    pub fn new_files(&self) -> impl Iterator<Item = (Archive, &str)> {
        self.records.iter().filter_map(|r| match r {
            Record::NewFileInSwz { archive, content } => Some((*archive, content.as_str())),
            _ => None,
        })
    }

    pub fn overwrite_files(&self) -> impl Iterator<Item = (Archive, &str)> {
        self.records.iter().filter_map(|r| match r {
            Record::OverwriteFileInSwz { archive, content } => Some((*archive, content.as_str())),
            _ => None,
        })
    }

    /// Extra files as `(kind, path, content)`. The path has no extension.
    pub fn extra_files(&self) -> impl Iterator<Item = (ExtraFileKind, &str, &[u8])> {
        self.records.iter().filter_map(|r| match r {
            Record::ExtraFile {
                kind,
                path,
                content,
            } => Some((*kind, path.as_str(), content.as_slice())),
            _ => None,
        })
    }

    /// Encodes the package: the version uncompressed, then an lz4 frame
    /// holding the header, every record and the end tag.
    pub fn write_to<W: Write>(&self, mut w: W) -> Result<W, Error> {
        w.write_u32_le(self.version)?;

        let mut body = lz4::EncoderBuilder::new()
            .level(COMPRESSION_LEVEL)
            .build(w)?;

        body.write_u8_le(Tag::Header as u8)?;
        self.header.write_fields(&mut body)?;
        for record in &self.records {
            record.write_tagged(&mut body)?;
        }
        body.write_u8_le(Tag::End as u8)?;

        let (w, result) = body.finish();
        result?;
        Ok(w)
    }

    /// Decodes a package. The version is checked before the compressed body
    /// is opened, the first body record must be the header and the stream
    /// must be terminated by the end tag.
    pub fn read_from<R: Read>(mut r: R) -> Result<Self, Error> {
        let version = r.read_u32_le()?;
        if version > MAX_SUPPORTED_VERSION {
            return Err(Error::UnsupportedVersion {
                found: version,
                max: MAX_SUPPORTED_VERSION,
            });
        }

        let mut body = lz4::Decoder::new(r)?;

        let header = match read_tagged(&mut body)? {
            Tagged::Header(h) => h,
            _ => return Err(Error::MissingHeader),
        };

        let mut records = vec![];
        loop {
            match read_tagged(&mut body)? {
                Tagged::End => break,
                Tagged::Header(_) => return Err(Error::DuplicateHeader),
                Tagged::Record(r) => records.push(r),
            }
        }

        debug!(
            "decoded package {:?} (version {}) with {} records",
            header.name,
            version,
            records.len()
        );

        Ok(Package {
            version,
            header,
            records,
        })
    }

    /// Loads a package file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let file = std::fs::File::open(path.as_ref())?;
        Package::read_from(std::io::BufReader::new(file))
    }

    /// Saves this package to disk, replacing any existing file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let file = std::fs::File::create(path.as_ref())?;
        let mut w = self.write_to(std::io::BufWriter::new(file))?;
        Ok(w.flush()?)
    }
}

/// Decodes a package from an in-memory byte slice.
pub fn load_package_from_bytes(bytes: &[u8]) -> Result<Package, Error> {
    Package::read_from(bytes)
}

/// Encodes a package into a new byte vector.
pub fn save_package_to_bytes(package: &Package) -> Result<Vec<u8>, Error> {
    package.write_to(Vec::new())
}

#[cfg(test)]
mod tests {
    use crate::record::Record;
    use crate::stream::WritePrimitives;
    use crate::{
        load_package_from_bytes, save_package_to_bytes, Archive, Error, ExtraFileKind, Header,
        Package, Tag, MAX_SUPPORTED_VERSION,
    };
    use matches::assert_matches;
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;
    use std::io::Write;

    /// Builds a stream by hand: version, then an lz4 frame with `body`.
    fn raw_package(version: u32, body: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.write_u32_le(version).unwrap();
        let mut encoder = lz4::EncoderBuilder::new().build(bytes).unwrap();
        encoder.write_all(body).unwrap();
        let (bytes, result) = encoder.finish();
        result.unwrap();
        bytes
    }

    fn header_body() -> Vec<u8> {
        let mut body = vec![Tag::Header as u8];
        Header::new("Test", "1", "1", "d", "a")
            .write_fields(&mut body)
            .unwrap();
        body
    }

    #[test]
    fn test_concrete_scenario() {
        let mut package = Package::new(Header::new("Test", "1", "1", "d", "a"));
        package
            .records
            .push(Record::LevelDesc("LevelDesc_X...<xml>".into()));
        package.records.push(Record::LevelToPlaylistLink {
            level_name: "X".into(),
            playlists: vec!["Main".into()],
        });

        let bytes = save_package_to_bytes(&package).unwrap();
        let decoded = load_package_from_bytes(&bytes).unwrap();

        assert_eq!(decoded.header, Header::new("Test", "1", "1", "d", "a"));
        assert_eq!(
            decoded.level_descs().collect::<Vec<_>>(),
            vec!["LevelDesc_X...<xml>"]
        );
        let links: Vec<_> = decoded.links().collect();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].0, "X");
        assert_eq!(links[0].1, &["Main".to_string()]);
        assert_eq!(decoded.level_types().count(), 0);
    }

    #[test]
    fn test_version_is_uncompressed_prefix() {
        let package = Package::new(Header::default());
        let bytes = save_package_to_bytes(&package).unwrap();
        assert_eq!(&bytes[0..4], &[1, 0, 0, 0]);
    }

    #[test]
    fn test_version_too_high() {
        // the body is garbage: the version check must fire before it is read
        let mut bytes = Vec::new();
        bytes.write_u32_le(MAX_SUPPORTED_VERSION + 1).unwrap();
        bytes.extend_from_slice(&[0xAB; 16]);

        assert_matches!(
            load_package_from_bytes(&bytes),
            Err(Error::UnsupportedVersion { found, max }) if found == MAX_SUPPORTED_VERSION + 1 && max == MAX_SUPPORTED_VERSION
        );
    }

    #[test]
    fn test_missing_header() {
        let mut body = vec![Tag::LevelDesc as u8];
        body.write_long_string("LevelDesc_X").unwrap();
        body.extend(header_body());
        body.push(Tag::End as u8);

        assert_matches!(
            load_package_from_bytes(&raw_package(1, &body)),
            Err(Error::MissingHeader)
        );
        assert_matches!(
            load_package_from_bytes(&raw_package(1, &[Tag::End as u8])),
            Err(Error::MissingHeader)
        );
    }

    #[test]
    fn test_duplicate_header() {
        let mut body = header_body();
        body.push(Tag::LevelType as u8);
        body.write_long_string("<LevelType/>").unwrap();
        body.extend(header_body());
        body.push(Tag::End as u8);

        assert_matches!(
            load_package_from_bytes(&raw_package(1, &body)),
            Err(Error::DuplicateHeader)
        );
    }

    #[test]
    fn test_unknown_tag() {
        let mut body = header_body();
        body.push(77);
        body.push(Tag::End as u8);

        assert_matches!(
            load_package_from_bytes(&raw_package(1, &body)),
            Err(Error::UnknownTag(77))
        );
    }

    #[test]
    fn test_missing_end_tag_is_truncated() {
        let mut body = header_body();
        body.push(Tag::LevelDesc as u8);
        body.write_long_string("LevelDesc_X").unwrap();

        assert_matches!(
            load_package_from_bytes(&raw_package(1, &body)),
            Err(Error::Truncated)
        );
    }

    #[test]
    fn test_extra_file_escaping_root() {
        let mut body = header_body();
        body.write_u8_le(Tag::ExtraFile as u8).unwrap();
        body.write_u8_le(ExtraFileKind::Binary as u8).unwrap();
        body.write_short_string("../escaped").unwrap();
        body.write_blob(&[1, 2, 3]).unwrap();
        body.write_u8_le(Tag::End as u8).unwrap();

        assert_matches!(
            load_package_from_bytes(&raw_package(1, &body)),
            Err(Error::InvalidPath(ref p)) if p == "../escaped"
        );

        let mut package = Package::new(Header::default());
        package.records.push(Record::ExtraFile {
            kind: ExtraFileKind::Binary,
            path: "/abs/escaped".into(),
            content: vec![],
        });
        assert_matches!(save_package_to_bytes(&package), Err(Error::InvalidPath(_)));
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.mpk");

        let mut package = Package::new(Header::new("File", "9.01", "2", "", "me"));
        package.records.push(Record::ExtraFile {
            kind: ExtraFileKind::Png,
            path: "images/thumb".into(),
            content: vec![137, 80, 78, 71],
        });
        package.save(&path).unwrap();

        assert_eq!(Package::load(&path).unwrap(), package);
    }

    impl Arbitrary for Archive {
        fn arbitrary(g: &mut Gen) -> Self {
            *g.choose(&Archive::ALL).unwrap()
        }
    }

    impl Arbitrary for ExtraFileKind {
        fn arbitrary(g: &mut Gen) -> Self {
            *g.choose(&[
                ExtraFileKind::Png,
                ExtraFileKind::Jpg,
                ExtraFileKind::Animation,
                ExtraFileKind::Binary,
                ExtraFileKind::AudioBank,
            ])
            .unwrap()
        }
    }

    impl Arbitrary for Record {
        fn arbitrary(g: &mut Gen) -> Self {
            match u8::arbitrary(g) % 8 {
                0 => Record::LevelDesc(String::arbitrary(g)),
                1 => Record::LevelType(String::arbitrary(g)),
                2 => Record::LevelSetType(String::arbitrary(g)),
                3 => Record::LevelToPlaylistLink {
                    level_name: String::arbitrary(g),
                    playlists: Vec::arbitrary(g),
                },
                4 => Record::AddToFileInSwz {
                    archive: Archive::arbitrary(g),
                    content: String::arbitrary(g),
                },
                5 => Record::NewFileInSwz {
                    archive: Archive::arbitrary(g),
                    content: String::arbitrary(g),
                },
                6 => Record::OverwriteFileInSwz {
                    archive: Archive::arbitrary(g),
                    content: String::arbitrary(g),
                },
                _ => Record::ExtraFile {
                    kind: ExtraFileKind::arbitrary(g),
                    path: arbitrary_path(g),
                    content: Vec::arbitrary(g),
                },
            }
        }
    }

    /// Random relative path of one to three segments.
    fn arbitrary_path(g: &mut Gen) -> String {
        let count = 1 + usize::arbitrary(g) % 3;
        (0..count)
            .map(|_| *g.choose(&["images", "ui", "Thumb", "a b", "ünï", ".hidden", "x.y"]).unwrap())
            .collect::<Vec<_>>()
            .join("/")
    }

    #[quickcheck]
    fn test_random_packages(
        name: String,
        game_version: String,
        description: String,
        records: Vec<Record>,
    ) -> bool {
        let package = Package {
            version: 1,
            header: Header::new(name, game_version, "1", description, "author"),
            records,
        };

        let bytes = save_package_to_bytes(&package).unwrap();
        let decoded = load_package_from_bytes(&bytes).unwrap();

        decoded == package
    }
}
