/*
 * Copyright 2022 Collabora, Ltd.
 *
 * SPDX-License-Identifier: MIT
 */
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{ErrorKind, Seek, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use log::{debug, trace};
use thiserror::Error;
use zip::write::FileOptions;
use zip::ZipWriter;

use crate::config::{root_name, PackageSpec, PackageSpecError};
use crate::minify::{Minifier, MinifyError};
use crate::{FileEntry, APP_SUFFIX};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("IO error while processing {}: {}", .0.to_string_lossy(), .1)]
    IO(PathBuf, std::io::Error),
    #[error("IO error finding project directory: {0}")]
    EnvIO(std::io::Error),
    #[error("unable to write to archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("cannot derive an app name from {}", .0.to_string_lossy())]
    NoName(PathBuf),
    #[error("unable to minify {}: {}", .0.to_string_lossy(), .1)]
    Minify(PathBuf, MinifyError),
    #[error("error reading package specification: {0}")]
    PackageSpec(#[from] PackageSpecError),
    #[error("the archive entry {0} was specified multiple times")]
    DuplicateZipFileEntry(String),
}

type BuildResult<T> = Result<T, BuildError>;

/// A finished app archive
#[derive(Clone, Debug)]
pub struct Package {
    /// The resolved archive name, as given on the command line
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
}

/// Append the app suffix unless the name already carries it.
pub fn normalize_name(name: &str) -> String {
    if name.ends_with(APP_SUFFIX) {
        name.to_string()
    } else {
        format!("{}{}", name, APP_SUFFIX)
    }
}

/// The archive name for a build: the requested one, or the name of the
/// project directory.
pub fn resolve_name(name: Option<&str>, root: &Path) -> BuildResult<String> {
    match name {
        Some(name) => Ok(normalize_name(name)),
        None => {
            let root = fs::canonicalize(root).map_err(BuildError::EnvIO)?;
            let base = root
                .file_name()
                .ok_or_else(|| BuildError::NoName(root.clone()))?;
            Ok(normalize_name(&base.to_string_lossy()))
        }
    }
}

fn remove_dir_if_present(path: &Path) -> BuildResult<()> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(BuildError::IO(path.to_path_buf(), e)),
        _ => Ok(()),
    }
}

/// Only ever removes a file; anything else at `path` fails the build.
fn remove_file_if_present(path: &Path) -> BuildResult<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(BuildError::IO(path.to_path_buf(), e)),
        _ => Ok(()),
    }
}

fn create_dir(path: &Path) -> BuildResult<()> {
    fs::create_dir_all(path).map_err(|e| BuildError::IO(path.to_path_buf(), e))
}

/// Empty the scratch directory, recreate the subdirectories staged files
/// land in, and remove any archive left from an earlier build.
pub fn reset_scratch(root: &Path, spec: &PackageSpec, archive: &Path) -> BuildResult<PathBuf> {
    let scratch = root.join(&spec.build_dir);
    debug!("resetting {}", scratch.to_string_lossy());
    remove_dir_if_present(&scratch)?;
    create_dir(&scratch)?;
    for item in spec.scripts.iter().chain(spec.styles.iter()) {
        if let Some(parent) = Path::new(item).parent() {
            create_dir(&scratch.join(parent))?;
        }
    }
    remove_file_if_present(archive)?;
    Ok(scratch)
}

fn transform<F>(source: &Path, scratch: &Path, name: &str, f: F) -> BuildResult<FileEntry>
where
    F: FnOnce(&str) -> Result<String, MinifyError>,
{
    let dest = scratch.join(name);
    trace!(
        "staging {} as {}",
        source.to_string_lossy(),
        dest.to_string_lossy()
    );
    let text =
        fs::read_to_string(source).map_err(|e| BuildError::IO(source.to_path_buf(), e))?;
    let out = f(&text).map_err(|e| BuildError::Minify(source.to_path_buf(), e))?;
    fs::write(&dest, out).map_err(|e| BuildError::IO(dest.clone(), e))?;
    Ok(FileEntry {
        location: dest,
        name: name.to_string(),
    })
}

/// Minify each script into the scratch directory. Line breaks left by the
/// minifier become semicolons so the output is a single line.
pub fn stage_scripts<S: AsRef<str>>(
    root: &Path,
    scratch: &Path,
    scripts: &[S],
) -> BuildResult<Vec<FileEntry>> {
    scripts
        .iter()
        .map(|s| {
            transform(&root.join(s.as_ref()), scratch, s.as_ref(), |text| {
                Minifier::Script
                    .apply(text)
                    .map(|min| min.replace('\n', ";"))
            })
        })
        .collect()
}

pub fn stage_styles<S: AsRef<str>>(
    root: &Path,
    scratch: &Path,
    styles: &[S],
) -> BuildResult<Vec<FileEntry>> {
    styles
        .iter()
        .map(|s| {
            transform(&root.join(s.as_ref()), scratch, s.as_ref(), |text| {
                Minifier::Style.apply(text)
            })
        })
        .collect()
}

pub fn stage_markup(root: &Path, scratch: &Path, markup: &str) -> BuildResult<FileEntry> {
    transform(&root.join(markup), scratch, &root_name(markup), |text| {
        Minifier::Markup.apply(text)
    })
}

fn copy_file(source: &Path, scratch: &Path, name: &str) -> BuildResult<FileEntry> {
    let dest = scratch.join(name);
    trace!(
        "copying {} to {}",
        source.to_string_lossy(),
        dest.to_string_lossy()
    );
    fs::copy(source, &dest).map_err(|e| BuildError::IO(source.to_path_buf(), e))?;
    Ok(FileEntry {
        location: dest,
        name: name.to_string(),
    })
}

/// Copy metadata files verbatim to the scratch root.
pub fn copy_metadata<S: AsRef<str>>(
    root: &Path,
    scratch: &Path,
    metadata: &[S],
) -> BuildResult<Vec<FileEntry>> {
    metadata
        .iter()
        .map(|m| {
            copy_file(&root.join(m.as_ref()), scratch, &root_name(m.as_ref()))
        })
        .collect()
}

/// Copy the runtime support file into the scratch directory.
///
/// This runs after the archive is written, so the file never ends up inside
/// the archive.
pub fn stage_support(root: &Path, scratch: &Path, support: &str) -> BuildResult<FileEntry> {
    copy_file(&root.join(support), scratch, &root_name(support))
}

/// Entries carry a fixed timestamp so identical inputs give identical archives
fn entry_options() -> FileOptions {
    FileOptions::default().last_modified_time(zip::DateTime::default())
}

fn insert_files<W>(zf: &mut ZipWriter<W>, files: &[FileEntry]) -> BuildResult<()>
where
    W: Write + Seek,
{
    let mut entry_map = BTreeMap::new();

    for file in files {
        if let Some(old_location) = entry_map.insert(file.name.clone(), file.location.clone()) {
            if old_location != file.location {
                return Err(BuildError::DuplicateZipFileEntry(file.name.clone()));
            }
        }
    }

    let mut last_path: Option<String> = None;
    for (name, location) in &entry_map {
        let mut old_comps = match last_path {
            Some(path) => Path::new(&path)
                .ancestors()
                .map(|p| p.to_path_buf())
                .collect::<Vec<_>>(),
            None => Vec::new(),
        };
        let mut new_comps = Path::new(name).ancestors().collect::<Vec<_>>();
        old_comps.reverse();
        new_comps.reverse();
        // discard the actual files
        old_comps.pop();
        new_comps.pop();
        // now we have the list of directories each file is contained in;
        // we start at 1 to avoid adding a blank root directory
        for i in 1..new_comps.len() {
            if i >= old_comps.len() || old_comps[i] != new_comps[i] {
                trace!("insert directory {}", new_comps[i].to_string_lossy());
                zf.add_directory(new_comps[i].to_string_lossy(), entry_options())?;
            }
        }

        trace!("insert file {}", name);

        let meta = fs::metadata(location).map_err(|e| BuildError::IO(location.clone(), e))?;
        let options = entry_options()
            .large_file(meta.len() >= (1u64 << 32))
            .unix_permissions(meta.permissions().mode());

        zf.start_file(name, options)?;
        let mut subfile = File::open(location).map_err(|e| BuildError::IO(location.clone(), e))?;
        std::io::copy(&mut subfile, zf).map_err(|e| BuildError::IO(location.clone(), e))?;

        last_path = Some(name.clone());
    }
    Ok(())
}

/// Zip the staged files, named relative to the scratch directory, and move
/// the result to `archive`.
pub fn archive(files: &[FileEntry], archive: &Path) -> BuildResult<()> {
    let mut intermediate = OsString::from(archive.as_os_str());
    intermediate.push(".zip");
    let intermediate = PathBuf::from(intermediate);
    debug!(
        "writing {} entries to {}",
        files.len(),
        intermediate.to_string_lossy()
    );

    let f = File::create(&intermediate).map_err(|e| BuildError::IO(intermediate.clone(), e))?;
    let mut zf = ZipWriter::new(f);
    insert_files(&mut zf, files)?;
    zf.finish()?;

    fs::rename(&intermediate, archive).map_err(|e| BuildError::IO(intermediate.clone(), e))
}

/// Build the app in `root` and return the archive written.
pub fn generate<P: AsRef<Path>>(
    root: P,
    name: Option<&str>,
    spec: &PackageSpec,
) -> BuildResult<Package> {
    let root = root.as_ref();

    // Check for basic errors in the spec
    PackageSpec::check(spec)?;

    let app = resolve_name(name, root)?;
    let path = root.join(&app);
    let scratch = reset_scratch(root, spec, &path)?;

    debug!("staging sources for {}", app);
    let mut staged = stage_scripts(root, &scratch, &spec.scripts)?;
    staged.extend(stage_styles(root, &scratch, &spec.styles)?);
    staged.push(stage_markup(root, &scratch, &spec.markup)?);
    staged.extend(copy_metadata(root, &scratch, &spec.metadata)?);

    archive(&staged, &path)?;

    if let Some(ref support) = spec.support {
        stage_support(root, &scratch, support)?;
    }

    let size = fs::read(&path)
        .map_err(|e| BuildError::IO(path.clone(), e))?
        .len() as u64;

    Ok(Package {
        name: app,
        path,
        size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;
    use zip::ZipArchive;

    #[test]
    fn suffix_appended_once() {
        assert_eq!(normalize_name("2048"), "2048.xdc");
        assert_eq!(normalize_name("2048.xdc"), "2048.xdc");
        assert_eq!(normalize_name(&normalize_name("game")), "game.xdc");
        assert_eq!(normalize_name("app.zip"), "app.zip.xdc");
    }

    #[test]
    fn name_defaults_to_project_directory() {
        let dir = TempDir::new("project").unwrap();
        let base = dir
            .path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .to_string();
        assert_eq!(
            resolve_name(None, dir.path()).unwrap(),
            format!("{}.xdc", base)
        );
        assert_eq!(
            resolve_name(Some("named"), dir.path()).unwrap(),
            "named.xdc"
        );
    }

    #[test]
    fn reset_clears_stale_output() {
        let dir = TempDir::new("reset").unwrap();
        let spec = PackageSpec::default();
        let archive = dir.path().join("app.xdc");
        fs::create_dir_all(dir.path().join("build/old")).unwrap();
        fs::write(dir.path().join("build/old/stale.js"), "x").unwrap();
        fs::write(&archive, "old archive").unwrap();

        let scratch = reset_scratch(dir.path(), &spec, &archive).unwrap();
        assert_eq!(scratch, dir.path().join("build"));
        assert!(!scratch.join("old").exists());
        assert!(scratch.join("js").is_dir());
        assert!(scratch.join("css").is_dir());
        assert!(!archive.exists());

        // nothing left to remove the second time round
        reset_scratch(dir.path(), &spec, &archive).unwrap();
    }

    #[test]
    fn staged_scripts_are_single_line() {
        let dir = TempDir::new("scripts").unwrap();
        fs::create_dir_all(dir.path().join("js")).unwrap();
        fs::create_dir_all(dir.path().join("build/js")).unwrap();
        fs::write(
            dir.path().join("js/a.js"),
            "// no semicolons here\nvar a = 1\nvar b = 2\nfunction f() {\n  return a\n}\n",
        )
        .unwrap();

        let staged = stage_scripts(dir.path(), &dir.path().join("build"), &["js/a.js"]).unwrap();
        assert_eq!(staged.len(), 1);
        assert_eq!(staged[0].name, "js/a.js");
        assert_eq!(staged[0].location, dir.path().join("build/js/a.js"));
        let out = fs::read_to_string(dir.path().join("build/js/a.js")).unwrap();
        assert!(!out.contains('\n'));
        assert_eq!(out, "var a=1;var b=2;function f(){return a}");
    }

    #[test]
    fn missing_source_names_the_path() {
        let dir = TempDir::new("missing").unwrap();
        let err = stage_scripts(dir.path(), dir.path(), &["js/gone.js"]).unwrap_err();
        match err {
            BuildError::IO(path, e) => {
                assert_eq!(path, dir.path().join("js/gone.js"));
                assert_eq!(e.kind(), ErrorKind::NotFound);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn reset_refuses_to_remove_a_directory_at_the_archive_path() {
        let dir = TempDir::new("reset").unwrap();
        let archive = dir.path().join("assets.xdc");
        fs::create_dir_all(archive.join("keep")).unwrap();
        fs::write(archive.join("keep/data.txt"), "data").unwrap();

        let err = reset_scratch(dir.path(), &PackageSpec::default(), &archive).unwrap_err();
        assert!(matches!(err, BuildError::IO(ref p, _) if p == &archive));
        assert_eq!(
            fs::read_to_string(archive.join("keep/data.txt")).unwrap(),
            "data"
        );
    }

    #[test]
    fn archive_entries_are_relative_to_scratch() {
        let dir = TempDir::new("archive").unwrap();
        let scratch = dir.path().join("build");
        fs::create_dir_all(scratch.join("js")).unwrap();
        fs::write(scratch.join("js/a.js"), "a()").unwrap();
        fs::write(scratch.join("index.html"), "<p>").unwrap();
        let files = [
            FileEntry {
                location: scratch.join("js/a.js"),
                name: "js/a.js".to_string(),
            },
            FileEntry {
                location: scratch.join("index.html"),
                name: "index.html".to_string(),
            },
        ];
        let path = dir.path().join("app.xdc");

        archive(&files, &path).unwrap();
        assert!(!dir.path().join("app.xdc.zip").exists());

        let mut za = ZipArchive::new(File::open(&path).unwrap()).unwrap();
        let mut names = za.file_names().map(String::from).collect::<Vec<_>>();
        names.sort();
        assert_eq!(names, vec!["index.html", "js/", "js/a.js"]);
        let mut body = String::new();
        std::io::Read::read_to_string(&mut za.by_name("js/a.js").unwrap(), &mut body).unwrap();
        assert_eq!(body, "a()");
    }

    #[test]
    fn conflicting_entries_are_rejected() {
        let mut zf = ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let files = [
            FileEntry {
                location: PathBuf::from("/a/index.html"),
                name: "index.html".to_string(),
            },
            FileEntry {
                location: PathBuf::from("/b/index.html"),
                name: "index.html".to_string(),
            },
        ];
        assert!(matches!(
            insert_files(&mut zf, &files),
            Err(BuildError::DuplicateZipFileEntry(n)) if n == "index.html"
        ));
    }
}
