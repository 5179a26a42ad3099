/*
 * Copyright 2022 Collabora, Ltd.
 *
 * SPDX-License-Identifier: MIT
 */
use std::path::PathBuf;

use anyhow::Result;
use structopt::StructOpt;
use xdc_gen::config::PackageSpec;
use xdc_gen::generate::generate;
use xdc_gen::report::summary;

#[derive(Debug, StructOpt)]
#[structopt(name = "xdc-gen", long_about = "App Builder")]
struct Opt {
    #[structopt(
        long,
        short,
        help = "App package's base name",
        long_help = "App package's base name. Defaults to the name of the project directory."
    )]
    name: Option<String>,
    #[structopt(
        long,
        short = "C",
        default_value = ".",
        parse(from_os_str),
        help = "The project directory to package."
    )]
    directory: PathBuf,
    #[structopt(
        long,
        short,
        parse(from_os_str),
        help = "A YAML package specification replacing the built-in file list."
    )]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();

    let opt = Opt::from_args();

    let spec = match opt.config {
        Some(ref path) => PackageSpec::load(path)?,
        None => PackageSpec::default(),
    };

    let package = generate(&opt.directory, opt.name.as_deref(), &spec)?;
    println!("{}", summary(&package.name, package.size));
    Ok(())
}
