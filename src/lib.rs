/*
 * Copyright 2022 Collabora, Ltd.
 *
 * SPDX-License-Identifier: MIT
 */
use std::path::PathBuf;

pub mod config;
pub mod generate;
pub mod minify;
pub mod report;

/// The extension every packaged app carries
pub const APP_SUFFIX: &str = ".xdc";

/// An item waiting to be written to an archive
#[derive(Clone, Debug)]
pub struct FileEntry {
    /// The location on disk of the item
    pub location: PathBuf,
    /// The item's destination path in the archive
    pub name: String,
}
