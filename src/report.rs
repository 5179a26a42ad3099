/*
 * Copyright 2022 Collabora, Ltd.
 *
 * SPDX-License-Identifier: MIT
 */
use std::io::{Read, Seek};

use zip::result::ZipResult;
use zip::ZipArchive;

const UNITS: [&str; 8] = ["", "Ki", "Mi", "Gi", "Ti", "Pi", "Ei", "Zi"];

/// Format a byte count with binary (1024-based) prefixes to one decimal place.
///
/// Anything beyond zebibytes is reported in yobibytes.
pub fn size_fmt(num: f64) -> String {
    let mut num = num;
    for unit in UNITS.iter() {
        if num.abs() < 1024.0 {
            return format!("{:3.1}{}B", num, unit);
        }
        num /= 1024.0;
    }
    format!("{:.1}YiB", num)
}

/// The line printed once an app has been packaged
pub fn summary(name: &str, size: u64) -> String {
    format!("App saved as: {} ({})", name, size_fmt(size as f64))
}

/// Total uncompressed size of every entry in an archive
pub fn size_archive<R: Read + Seek>(za: &mut ZipArchive<R>) -> ZipResult<u64> {
    let mut uncompressed = 0;
    for i in 0..za.len() {
        let zf = za.by_index_raw(i)?;
        uncompressed += zf.size();
    }
    Ok(uncompressed)
}

/// Entry names in archive order
pub fn entry_names<R: Read + Seek>(za: &mut ZipArchive<R>) -> ZipResult<Vec<String>> {
    (0..za.len())
        .map(|i| za.by_index_raw(i).map(|zf| zf.name().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn sample_archive() -> ZipArchive<Cursor<Vec<u8>>> {
        let mut zw = ZipWriter::new(Cursor::new(Vec::new()));
        zw.add_directory("js", FileOptions::default()).unwrap();
        zw.start_file("js/a.js", FileOptions::default()).unwrap();
        zw.write_all(&[b'a'; 1500]).unwrap();
        zw.start_file("index.html", FileOptions::default()).unwrap();
        zw.write_all(b"<p>hi</p>").unwrap();
        let cursor = zw.finish().unwrap();
        ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap()
    }

    #[test]
    fn summary_line() {
        assert_eq!(summary("2048.xdc", 1536), "App saved as: 2048.xdc (1.5KiB)");
        assert_eq!(summary("empty.xdc", 0), "App saved as: empty.xdc (0.0B)");
    }

    #[test]
    fn sizes_uncompressed_contents() {
        let mut za = sample_archive();
        assert_eq!(size_archive(&mut za).unwrap(), 1509);
    }

    #[test]
    fn lists_entries_in_archive_order() {
        let mut za = sample_archive();
        assert_eq!(
            entry_names(&mut za).unwrap(),
            vec!["js/", "js/a.js", "index.html"]
        );
    }

    #[test]
    fn zero_bytes() {
        assert_eq!(size_fmt(0.0), "0.0B");
    }

    #[test]
    fn steps_through_binary_prefixes() {
        assert_eq!(size_fmt(1023.0), "1023.0B");
        assert_eq!(size_fmt(1024.0), "1.0KiB");
        assert_eq!(size_fmt(1536.0), "1.5KiB");
        assert_eq!(size_fmt(1048576.0), "1.0MiB");
        assert_eq!(size_fmt(3.0 * 1024.0 * 1024.0 * 1024.0), "3.0GiB");
    }

    #[test]
    fn negative_and_fractional_sizes() {
        assert_eq!(size_fmt(-1536.0), "-1.5KiB");
        assert_eq!(size_fmt(-12.0), "-12.0B");
        assert_eq!(size_fmt(0.3), "0.3B");
        assert_eq!(size_fmt(2047.5), "2.0KiB");
    }

    #[test]
    fn falls_back_to_yobibytes() {
        assert_eq!(size_fmt(1024f64.powi(8)), "1.0YiB");
        assert_eq!(size_fmt(2.0 * 1024f64.powi(9)), "2048.0YiB");
    }
}
