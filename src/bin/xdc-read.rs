/*
 * Copyright 2022 Collabora, Ltd.
 *
 * SPDX-License-Identifier: MIT
 */
use std::fs::File;
use std::path::PathBuf;

use anyhow::Result;
use structopt::StructOpt;
use xdc_gen::report::{entry_names, size_archive, size_fmt};
use zip::ZipArchive;

#[derive(Debug, StructOpt)]
#[structopt(name = "xdc-read", long_about = "List the contents of a packaged app.")]
struct Opt {
    #[structopt(parse(from_os_str), name = "ARCHIVE", help = "The app archive to read.")]
    archive: PathBuf,
    #[structopt(long, short, help = "Print packed and installed sizes instead of entries.")]
    size: bool,
}

fn main() -> Result<()> {
    env_logger::init();

    let opt = Opt::from_args();

    let file = File::open(&opt.archive)?;
    let package_size = file.metadata()?.len();
    let mut za = ZipArchive::new(file)?;

    if opt.size {
        println!("Package size:      {}", size_fmt(package_size as f64));
        println!(
            "Installation size: {}",
            size_fmt(size_archive(&mut za)? as f64)
        );
    } else {
        for name in entry_names(&mut za)? {
            println!("{}", name);
        }
    }

    Ok(())
}
