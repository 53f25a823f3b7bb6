use crate::tool::Dir2Mp;
use mpcore::tool::run;
use std::path::PathBuf;
use structopt::StructOpt;

mod manifest;
mod tool;

#[derive(StructOpt, Debug)]
#[structopt(name = "dir2mp")]
pub struct Dir2MpParameters {
    /// Mod directory containing the manifest and the referenced files.
    #[structopt(short, long, parse(from_os_str))]
    input: PathBuf,

    /// Package file to write, `<input>.mpk` when missing.
    #[structopt(short, long, parse(from_os_str))]
    output: Option<PathBuf>,

    /// Manifest to use instead of `<input>/modpack.json`.
    #[structopt(short, long, parse(from_os_str))]
    manifest: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    let params = Dir2MpParameters::from_args();
    let code = run(&Dir2Mp, params, |timings| timings.report());

    std::process::exit(code);
}
