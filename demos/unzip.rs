use std::fs::{self, File};
use std::io;
use std::path::PathBuf;

use anyhow::*;
use log::*;
use memmap2::Mmap;
use rayon::prelude::*;
use structopt::*;

use zipreader::archive::{Archive, StreamOptions};
use zipreader::reader::SliceReader;
use zipreader::tree::{as_tree, DirectoryContents, FileTree};

#[derive(Debug, StructOpt)]
#[structopt(name = "unzip", about = "Dumps a .zip file into the current directory")]
struct Opt {
    /// Pass multiple times for additional verbosity (info, debug, trace)
    #[structopt(short, long, parse(from_occurrences))]
    verbosity: usize,

    /// Change to the given directory before perfoming any operations.
    #[structopt(short = "C", long)]
    directory: Option<PathBuf>,

    /// Prints the tree of files in the ZIP archive instead of extracting them.
    #[structopt(short = "n", long)]
    dry_run: bool,

    #[structopt(name("ZIP file"))]
    zip_path: PathBuf,
}

fn main() -> Result<()> {
    let args = Opt::from_args();

    let mut errlog = stderrlog::new();
    errlog.verbosity(args.verbosity + 1);
    errlog.init()?;

    if let Some(chto) = args.directory {
        std::env::set_current_dir(&chto)
            .with_context(|| format!("Couldn't set working directory to {}", chto.display()))?;
    }

    info!("Memory mapping {:#?}", &args.zip_path);
    let zip_file = File::open(&args.zip_path).context("Couldn't open zip file")?;
    let mapping = unsafe { Mmap::map(&zip_file).context("Couldn't mmap zip file")? };

    let mut archive = Archive::open(SliceReader::new(&mapping)).context("Couldn't load archive")?;
    if archive.is_mac_archive().is_mac() {
        warn!(
            "{:#?} looks like it was written by macOS's Archive Utility; sizes and offsets have been reconciled accordingly",
            &args.zip_path
        );
    }
    let entries = archive.read_entries().context("Couldn't read archive's entries")?;
    let tree = as_tree(entries)?;

    if args.dry_run {
        print_tree(&tree)
    } else {
        read_zip(&tree, &archive)
    }
}

fn print_tree(tree: &DirectoryContents) -> Result<()> {
    for entry in tree.traverse() {
        println!("{}", entry.metadata().path);
    }
    Ok(())
}

fn read_zip(tree: &DirectoryContents, archive: &Archive<SliceReader>) -> Result<()> {
    tree.files().par_bridge().try_for_each(|entry| {
        if let Some(parent) = entry.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Couldn't create directory {}", parent))?;
        }
        let mut reader = archive.open_read_stream(entry, StreamOptions::full())?;
        let mut sink = File::create(&*entry.path)
            .with_context(|| format!("Couldn't create file {}", entry.path))?;
        io::copy(&mut reader, &mut sink)?;
        Ok(())
    })
}
