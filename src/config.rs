/*
 * Copyright 2022 Collabora, Ltd.
 *
 * SPDX-License-Identifier: MIT
 */
use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PackageSpecError {
    #[error("IO error opening spec: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("a package must contain at least one script")]
    NoScripts,
    #[error("the path {0} must be relative and stay inside the project")]
    UnsafePath(String),
    #[error("the build directory must name a subdirectory of the project")]
    InvalidBuildDir,
    #[error("the package entry {0} was specified multiple times")]
    DuplicateEntry(String),
}

fn default_scripts() -> Vec<String> {
    [
        "js/animframe_polyfill.js",
        "js/application.js",
        "js/bind_polyfill.js",
        "js/classlist_polyfill.js",
        "js/game_manager.js",
        "js/grid.js",
        "js/html_actuator.js",
        "js/keyboard_input_manager.js",
        "js/tile.js",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_styles() -> Vec<String> {
    vec!["css/main.css".to_string()]
}

fn default_markup() -> String {
    "index.html".to_string()
}

fn default_metadata() -> Vec<String> {
    vec!["manifest.toml".to_string(), "icon.png".to_string()]
}

fn default_support() -> Option<String> {
    Some("webxdc.js".to_string())
}

fn default_build_dir() -> String {
    "build".to_string()
}

/// The set of project files that make up a packaged app. Every path is
/// relative to the project root.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct PackageSpec {
    /// Minified, staged at the same relative path
    #[serde(default = "default_scripts")]
    pub scripts: Vec<String>,
    /// Compiled and minified, staged at the same relative path
    #[serde(default = "default_styles")]
    pub styles: Vec<String>,
    /// Minified, staged at the scratch root
    #[serde(default = "default_markup")]
    pub markup: String,
    /// Copied verbatim to the scratch root
    #[serde(default = "default_metadata")]
    pub metadata: Vec<String>,
    /// Copied into the scratch directory once the archive has been written
    #[serde(default = "default_support")]
    pub support: Option<String>,
    #[serde(default = "default_build_dir")]
    pub build_dir: String,
}

impl Default for PackageSpec {
    fn default() -> Self {
        Self {
            scripts: default_scripts(),
            styles: default_styles(),
            markup: default_markup(),
            metadata: default_metadata(),
            support: default_support(),
            build_dir: default_build_dir(),
        }
    }
}

/// The name a metadata or markup file takes at the scratch root
pub fn root_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

fn check_path(path: &str) -> Result<(), PackageSpecError> {
    let p = Path::new(path);
    let escapes = p.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if path.is_empty() || escapes || p.file_name().is_none() {
        return Err(PackageSpecError::UnsafePath(path.to_string()));
    }
    Ok(())
}

impl PackageSpec {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<PackageSpec, PackageSpecError> {
        let file = File::open(path.as_ref())?;
        Ok(serde_yaml::from_reader(file)?)
    }

    /// Names of the entries the archive will hold, in staging order
    pub fn staged_names(&self) -> Vec<String> {
        self.scripts
            .iter()
            .chain(self.styles.iter())
            .cloned()
            .chain(std::iter::once(root_name(&self.markup)))
            .chain(self.metadata.iter().map(|m| root_name(m)))
            .collect()
    }

    pub fn check(spec: &PackageSpec) -> Result<(), PackageSpecError> {
        if spec.scripts.is_empty() {
            return Err(PackageSpecError::NoScripts);
        }

        if check_path(&spec.build_dir).is_err() {
            return Err(PackageSpecError::InvalidBuildDir);
        }

        for path in spec
            .scripts
            .iter()
            .chain(spec.styles.iter())
            .chain(std::iter::once(&spec.markup))
            .chain(spec.metadata.iter())
            .chain(spec.support.iter())
        {
            check_path(path)?;
        }

        let mut seen = BTreeSet::new();
        for name in spec.staged_names() {
            if !seen.insert(name.clone()) {
                return Err(PackageSpecError::DuplicateEntry(name));
            }
        }

        Ok(())
    }
}
