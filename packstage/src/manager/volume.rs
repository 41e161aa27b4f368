//! Multi-volume archives.
//!
//! A split archive is published as `name.zip.001`, `name.zip.002`, ... in the
//! downloads directory. [`VolumeSet`] finds and orders those parts and
//! [`MultiVolumeReader`] presents them as one seekable byte stream so the
//! archive backend never sees the split.
//!
//! Parts are ordered by case-insensitive file name. This only matches the
//! volume sequence because the numeric suffixes are zero padded to the same
//! width.

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::{InstallError, InstallerResult};
use super::pack::STAGING_SUFFIX;

/// Ordered archive parts discovered in a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeSet {
    volumes: Vec<PathBuf>,
}

impl VolumeSet {
    /// Find the archive in `dir`.
    ///
    /// A first volume ending in `.zip.001` is preferred, then any `.001`
    /// file; all siblings sharing its stem with a numeric suffix are the
    /// remaining volumes. Without a split archive a single `.zip` or `.7z`
    /// file is used. Staging files are never considered.
    pub fn discover(dir: &Path) -> InstallerResult<Self> {
        let not_found = || InstallError::ArchiveNotFound {
            dir: dir.to_path_buf(),
        };

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => {
                return Err(InstallError::ReadFailed {
                    path: dir.to_path_buf(),
                    source: e,
                })
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| !ends_with_ignore_case(name, STAGING_SUFFIX))
            .collect();
        sort_volume_names(&mut names);

        let first = names
            .iter()
            .find(|n| ends_with_ignore_case(n, ".zip.001"))
            .or_else(|| names.iter().find(|n| ends_with_ignore_case(n, ".001")));

        if let Some(first) = first {
            let stem = &first[..first.len() - ".001".len()];
            let volumes: Vec<PathBuf> = names
                .iter()
                .filter(|n| is_volume_of(n, stem))
                .map(|n| dir.join(n))
                .collect();
            debug!(first = %first, count = volumes.len(), "Discovered split archive");
            return Ok(Self { volumes });
        }

        names
            .iter()
            .find(|n| ends_with_ignore_case(n, ".zip") || ends_with_ignore_case(n, ".7z"))
            .map(|n| {
                debug!(archive = %n, "Discovered single-file archive");
                Self {
                    volumes: vec![dir.join(n)],
                }
            })
            .ok_or_else(not_found)
    }

    /// Volume paths in read order.
    pub fn volumes(&self) -> &[PathBuf] {
        &self.volumes
    }

    /// Path of the first volume, used to name the archive in errors and logs.
    pub fn first(&self) -> Option<&Path> {
        self.volumes.first().map(PathBuf::as_path)
    }

    /// Whether the archive spans more than one file.
    pub fn is_split(&self) -> bool {
        self.volumes.len() > 1
    }

    /// Open every volume as one logical stream.
    pub fn open(&self) -> InstallerResult<MultiVolumeReader> {
        MultiVolumeReader::open(&self.volumes)
    }
}

fn ends_with_ignore_case(name: &str, suffix: &str) -> bool {
    name.len() >= suffix.len()
        && name.is_char_boundary(name.len() - suffix.len())
        && name[name.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}

fn is_volume_of(name: &str, stem: &str) -> bool {
    if name.len() <= stem.len() + 1 || !name.is_char_boundary(stem.len()) {
        return false;
    }
    let (head, tail) = name.split_at(stem.len());
    head.eq_ignore_ascii_case(stem)
        && tail.starts_with('.')
        && tail[1..].bytes().all(|b| b.is_ascii_digit())
}

fn sort_volume_names(names: &mut [String]) {
    names.sort_by_key(|n| n.to_lowercase());
}

#[derive(Debug)]
struct Volume {
    path: PathBuf,
    file: File,
    start: u64,
    len: u64,
}

impl Volume {
    fn end(&self) -> u64 {
        self.start + self.len
    }
}

/// Read-only, seekable view of ordered part files as one byte stream.
///
/// Reads that cross a part boundary continue into the next part and only
/// come back short at the end of the last part. Seeking before the start or
/// past the end is an `InvalidInput` error; seeking exactly to the end is
/// allowed.
#[derive(Debug)]
pub struct MultiVolumeReader {
    volumes: Vec<Volume>,
    total_len: u64,
    position: u64,
}

impl MultiVolumeReader {
    /// Open `paths` in the given order.
    pub fn open(paths: &[PathBuf]) -> InstallerResult<Self> {
        let mut volumes = Vec::with_capacity(paths.len());
        let mut start = 0u64;

        for path in paths {
            let read_err = |e| InstallError::ReadFailed {
                path: path.clone(),
                source: e,
            };
            let file = File::open(path).map_err(read_err)?;
            let len = file.metadata().map_err(read_err)?.len();
            volumes.push(Volume {
                path: path.clone(),
                file,
                start,
                len,
            });
            start += len;
        }

        Ok(Self {
            volumes,
            total_len: start,
            position: 0,
        })
    }

    /// Length of the logical stream.
    pub fn len(&self) -> u64 {
        self.total_len
    }

    pub fn is_empty(&self) -> bool {
        self.total_len == 0
    }

    /// Current logical position.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Number of backing part files.
    pub fn volume_count(&self) -> usize {
        self.volumes.len()
    }

    /// Index of the volume holding logical offset `pos`.
    fn volume_at(&self, pos: u64) -> Option<usize> {
        let idx = self.volumes.partition_point(|v| v.end() <= pos);
        (idx < self.volumes.len()).then_some(idx)
    }
}

impl Read for MultiVolumeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;

        while filled < buf.len() {
            let Some(idx) = self.volume_at(self.position) else {
                break;
            };
            let volume = &mut self.volumes[idx];
            let offset = self.position - volume.start;
            let available = (volume.len - offset).min((buf.len() - filled) as u64) as usize;

            volume.file.seek(SeekFrom::Start(offset))?;
            let n = volume.file.read(&mut buf[filled..filled + available])?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("volume {} is shorter than expected", volume.path.display()),
                ));
            }

            filled += n;
            self.position += n as u64;
        }

        Ok(filled)
    }
}

impl Seek for MultiVolumeReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => n as i128,
            SeekFrom::End(delta) => self.total_len as i128 + delta as i128,
            SeekFrom::Current(delta) => self.position as i128 + delta as i128,
        };

        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of multi-volume stream",
            ));
        }
        if target > self.total_len as i128 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "seek to {} past end of multi-volume stream ({} bytes)",
                    target, self.total_len
                ),
            ));
        }

        self.position = target as u64;
        Ok(self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 256) as u8).collect()
    }

    fn write_parts(dir: &Path, data: &[u8], sizes: &[usize]) -> Vec<PathBuf> {
        let mut offset = 0;
        sizes
            .iter()
            .enumerate()
            .map(|(i, size)| {
                let path = dir.join(format!("archive.zip.{:03}", i + 1));
                fs::write(&path, &data[offset..offset + size]).unwrap();
                offset += size;
                path
            })
            .collect()
    }

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"x").unwrap();
    }

    fn names(set: &VolumeSet) -> Vec<String> {
        set.volumes()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_discover_split_archive() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "Game.zip.002");
        touch(temp.path(), "Game.zip.001");
        touch(temp.path(), "Game.zip.010");
        touch(temp.path(), "Game.zip.003.tmp");
        touch(temp.path(), "readme.txt");

        let set = VolumeSet::discover(temp.path()).unwrap();

        assert_eq!(names(&set), vec!["Game.zip.001", "Game.zip.002", "Game.zip.010"]);
        assert!(set.is_split());
    }

    #[test]
    fn test_discover_prefers_zip_split_over_bare_001() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "aaa.001");
        touch(temp.path(), "data.zip.001");

        let set = VolumeSet::discover(temp.path()).unwrap();

        assert_eq!(names(&set), vec!["data.zip.001"]);
    }

    #[test]
    fn test_discover_bare_numeric_split() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "pkg.7z.001");
        touch(temp.path(), "pkg.7z.002");

        let set = VolumeSet::discover(temp.path()).unwrap();

        assert_eq!(names(&set), vec!["pkg.7z.001", "pkg.7z.002"]);
    }

    #[test]
    fn test_discover_single_file_fallback() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "Game.ZIP");
        touch(temp.path(), "other.bin");

        let set = VolumeSet::discover(temp.path()).unwrap();

        assert_eq!(names(&set), vec!["Game.ZIP"]);
        assert!(!set.is_split());
    }

    #[test]
    fn test_discover_ignores_staging_only() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "Game.zip.001.tmp");

        let result = VolumeSet::discover(temp.path());

        assert!(matches!(result, Err(InstallError::ArchiveNotFound { .. })));
    }

    #[test]
    fn test_discover_missing_directory() {
        let result = VolumeSet::discover(Path::new("/nonexistent/packstage/dl"));
        assert!(matches!(result, Err(InstallError::ArchiveNotFound { .. })));
    }

    #[test]
    fn test_read_across_boundary() {
        let temp = TempDir::new().unwrap();
        let data = pattern(200);
        let parts = write_parts(temp.path(), &data, &[100, 100]);
        let mut reader = MultiVolumeReader::open(&parts).unwrap();

        reader.seek(SeekFrom::Start(50)).unwrap();
        let mut buf = vec![0u8; 150];
        let n = reader.read(&mut buf).unwrap();

        assert_eq!(n, 150);
        assert_eq!(buf, data[50..200]);
        assert_eq!(reader.position(), 200);
    }

    #[test]
    fn test_seek_into_second_volume() {
        let temp = TempDir::new().unwrap();
        let data = pattern(200);
        let parts = write_parts(temp.path(), &data, &[100, 100]);
        let mut reader = MultiVolumeReader::open(&parts).unwrap();

        assert_eq!(reader.seek(SeekFrom::Start(120)).unwrap(), 120);
        let mut buf = [0u8; 10];
        reader.read_exact(&mut buf).unwrap();

        assert_eq!(buf, data[120..130]);
    }

    #[test]
    fn test_read_at_end_returns_zero() {
        let temp = TempDir::new().unwrap();
        let parts = write_parts(temp.path(), &pattern(20), &[10, 10]);
        let mut reader = MultiVolumeReader::open(&parts).unwrap();

        reader.seek(SeekFrom::End(0)).unwrap();
        let mut buf = [0u8; 4];

        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_short_read_only_at_logical_end() {
        let temp = TempDir::new().unwrap();
        let data = pattern(30);
        let parts = write_parts(temp.path(), &data, &[10, 10, 10]);
        let mut reader = MultiVolumeReader::open(&parts).unwrap();

        reader.seek(SeekFrom::Start(5)).unwrap();
        let mut buf = vec![0u8; 100];
        let n = reader.read(&mut buf).unwrap();

        assert_eq!(n, 25);
        assert_eq!(buf[..n], data[5..]);
    }

    #[test]
    fn test_seek_out_of_range() {
        let temp = TempDir::new().unwrap();
        let parts = write_parts(temp.path(), &pattern(20), &[10, 10]);
        let mut reader = MultiVolumeReader::open(&parts).unwrap();

        let past_end = reader.seek(SeekFrom::Start(21)).unwrap_err();
        assert_eq!(past_end.kind(), io::ErrorKind::InvalidInput);

        let before_start = reader.seek(SeekFrom::Current(-1)).unwrap_err();
        assert_eq!(before_start.kind(), io::ErrorKind::InvalidInput);

        assert_eq!(reader.seek(SeekFrom::End(-5)).unwrap(), 15);
        assert_eq!(reader.seek(SeekFrom::Current(-15)).unwrap(), 0);
    }

    #[test]
    fn test_empty_volume_is_skipped() {
        let temp = TempDir::new().unwrap();
        let data = pattern(20);
        let parts = write_parts(temp.path(), &data, &[10, 0, 10]);
        let mut reader = MultiVolumeReader::open(&parts).unwrap();

        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();

        assert_eq!(out, data);
    }

    #[test]
    fn test_missing_volume_fails_open() {
        let result = MultiVolumeReader::open(&[PathBuf::from("/nonexistent/a.zip.001")]);
        assert!(matches!(result, Err(InstallError::ReadFailed { .. })));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_split_reads_match_concatenation(
            sizes in prop::collection::vec(0usize..300, 1..6),
            start_frac in 0.0f64..1.0,
            chunk in 1usize..97,
        ) {
            let temp = TempDir::new().unwrap();
            let total: usize = sizes.iter().sum();
            let data = pattern(total);
            let parts = write_parts(temp.path(), &data, &sizes);
            let mut reader = MultiVolumeReader::open(&parts).unwrap();
            prop_assert_eq!(reader.len(), total as u64);

            let start = (total as f64 * start_frac) as usize;
            reader.seek(SeekFrom::Start(start as u64)).unwrap();

            let mut out = Vec::new();
            let mut buf = vec![0u8; chunk];
            loop {
                let n = reader.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                out.extend_from_slice(&buf[..n]);
            }

            prop_assert_eq!(&out[..], &data[start..]);
        }
    }
}
