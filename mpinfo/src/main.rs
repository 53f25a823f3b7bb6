use log::{debug, info};
use modpack::{check_extra_path, Package, Record};
use mpcore::tool::{run, Tool};
use std::io;
use std::path::{Path, PathBuf};
use structopt::StructOpt;
use thiserror::Error;

#[derive(StructOpt, Debug)]
#[structopt(name = "mpinfo")]
struct Opt {
    /// Directory to write the content of every record into.
    #[structopt(short, long, parse(from_os_str))]
    dump: Option<PathBuf>,

    #[structopt(short, long, parse(from_os_str))]
    input: PathBuf,
}

#[derive(Debug, Error)]
enum MpInfoError {
    #[error("cannot load package {path:?}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: modpack::Error,
    },
    #[error("record {index} cannot be dumped: {source}")]
    UnsafePath {
        index: usize,
        #[source]
        source: modpack::Error,
    },
    #[error("cannot dump into {path:?}: {source}")]
    Dump {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

struct MpInfo;

impl Tool for MpInfo {
    type Params = Opt;
    type Output = ();
    type Error = MpInfoError;

    fn execute(&self, opt: Opt) -> Result<(), MpInfoError> {
        let package = Package::load(&opt.input).map_err(|source| MpInfoError::Load {
            path: opt.input.clone(),
            source,
        })?;

        print_package(&package);

        if let Some(dir) = opt.dump {
            let written = dump(&package, &dir)?;
            info!("dumped {} files into {:?}", written.len(), dir);
        }
        Ok(())
    }
}

fn main() {
    env_logger::init();

    let opt = Opt::from_args();
    std::process::exit(run(&MpInfo, opt, |_| ()));
}

fn print_package(package: &Package) {
    let header = &package.header;
    println!("version={}", package.version);
    println!("name={}", header.name);
    println!("game_version={}", header.game_version);
    println!("package_version={}", header.package_version);
    println!("author={}", header.author);
    println!("description={}", header.description);
    println!("records={}", package.records.len());

    for (index, record) in package.records.iter().enumerate() {
        println!("{:>4} {}", index, describe(record));
    }
}

/// One line summary of a record.
fn describe(record: &Record) -> String {
    match record {
        Record::LevelDesc(text) => format!("level_desc len={}", text.len()),
        Record::LevelType(text) => format!("level_type len={}", text.len()),
        Record::LevelSetType(text) => format!("level_set_type len={}", text.len()),
        Record::LevelToPlaylistLink {
            level_name,
            playlists,
        } => format!("link level={} playlists={}", level_name, playlists.join(",")),
        Record::AddToFileInSwz { archive, content } => {
            format!("add_to_file archive={} len={}", archive, content.len())
        }
        Record::NewFileInSwz { archive, content } => {
            format!("new_file archive={} len={}", archive, content.len())
        }
        Record::OverwriteFileInSwz { archive, content } => {
            format!("overwrite_file archive={} len={}", archive, content.len())
        }
        Record::ExtraFile {
            kind,
            path,
            content,
        } => format!("extra_file path={}.{} len={}", path, kind.extension(), content.len()),
    }
}

/// Relative dump location and content of a record. Documents are numbered
/// by their position in the package.
fn dump_entry(index: usize, record: &Record) -> (String, Vec<u8>) {
    match record {
        Record::LevelDesc(text) => (format!("level_desc_{}.xml", index), text.clone().into_bytes()),
        Record::LevelType(text) => (format!("level_type_{}.xml", index), text.clone().into_bytes()),
        Record::LevelSetType(text) => (
            format!("level_set_type_{}.xml", index),
            text.clone().into_bytes(),
        ),
        Record::LevelToPlaylistLink {
            level_name,
            playlists,
        } => (
            format!("link_{}.txt", index),
            format!("{}\n{}\n", level_name, playlists.join("\n")).into_bytes(),
        ),
        Record::AddToFileInSwz { archive, content } => (
            format!("{}/add_to_file_{}.txt", archive, index),
            content.clone().into_bytes(),
        ),
        Record::NewFileInSwz { archive, content } => (
            format!("{}/new_file_{}.txt", archive, index),
            content.clone().into_bytes(),
        ),
        Record::OverwriteFileInSwz { archive, content } => (
            format!("{}/overwrite_file_{}.txt", archive, index),
            content.clone().into_bytes(),
        ),
        Record::ExtraFile {
            kind,
            path,
            content,
        } => (format!("files/{}.{}", path, kind.extension()), content.clone()),
    }
}

/// Writes every record of `package` under `dir`. Returns the written paths.
/// Nothing is written when an extra file path would leave `dir`.
fn dump(package: &Package, dir: &Path) -> Result<Vec<PathBuf>, MpInfoError> {
    let mut written = vec![];

    for (index, record) in package.records.iter().enumerate() {
        if let Record::ExtraFile { path, .. } = record {
            check_extra_path(path).map_err(|source| MpInfoError::UnsafePath { index, source })?;
        }
    }

    for (index, record) in package.records.iter().enumerate() {
        let (name, content) = dump_entry(index, record);
        let path = dir.join(name);
        let error = |source| MpInfoError::Dump {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(error)?;
        }
        std::fs::write(&path, content).map_err(error)?;

        debug!("dumped record {} to {:?}", index, path);
        written.push(path);
    }

    Ok(written)
}
