//! Archive builder
//!
//! Writes the requested members, in request order, into a store-only zip
//! held in a private temporary file. Members that cannot be resolved or
//! named are skipped and reported; only failures of the temporary file or
//! the zip writer itself fail the build.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tempfile::NamedTempFile;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, warn};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::names::entry_name;
use super::types::{MemberRequest, SkipReason, SkippedMember};
use crate::storage::LocalStorage;

const TEMP_PREFIX: &str = "zipbox-";
const TEMP_SUFFIX: &str = ".zip.tmp";

/// Entries at or above this size need Zip64 extensions
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// General purpose bit 11: names are UTF-8
const UTF8_NAME_FLAG: u16 = 0x0800;
const LOCAL_HEADER_SIGNATURE: u32 = 0x0403_4b50;
const CENTRAL_HEADER_SIGNATURE: u32 = 0x0201_4b50;
/// Offset of the flags field within each header
const LOCAL_FLAGS_OFFSET: u64 = 6;
const CENTRAL_FLAGS_OFFSET: u64 = 8;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("cannot create temporary archive in {}: {source}", .dir.display())]
    TempFile {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("archive write failed during {operation}: {source}")]
    Zip {
        operation: &'static str,
        #[source]
        source: ZipError,
    },
}

/// The in-progress archive file. Removed from disk when dropped.
#[derive(Debug)]
pub struct TemporaryArtifact {
    file: NamedTempFile,
}

impl TemporaryArtifact {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Rewound handle for reading the finished archive back
    pub(crate) fn reader(&mut self) -> io::Result<&mut File> {
        let file = self.file.as_file_mut();
        file.seek(SeekFrom::Start(0))?;
        Ok(file)
    }

    /// Delete the file now, logging (not returning) a failure.
    pub fn discard(self) {
        let path = self.file.path().to_path_buf();
        if let Err(err) = self.file.close() {
            warn!(path = %path.display(), error = %err, "Failed to remove temporary archive");
        }
    }
}

/// Outcome of one build: the artifact plus what went in and what was left out
#[derive(Debug)]
pub struct BuildReport {
    pub artifact: TemporaryArtifact,
    pub entries: Vec<String>,
    pub skipped: Vec<SkippedMember>,
}

enum MemberFailure {
    Skip(SkipReason),
    Fatal(BuildError),
}

impl From<SkipReason> for MemberFailure {
    fn from(reason: SkipReason) -> Self {
        MemberFailure::Skip(reason)
    }
}

#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    storage: LocalStorage,
    temp_dir: Option<PathBuf>,
}

impl ArchiveBuilder {
    pub fn new(storage: LocalStorage) -> Self {
        Self {
            storage,
            temp_dir: None,
        }
    }

    /// Place temporary archives in `dir` instead of the system temp dir
    pub fn with_temp_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.temp_dir = dir;
        self
    }

    /// Build an archive from `members`.
    ///
    /// Entries keep request order; skipped members are simply absent.
    /// An empty or fully unresolvable request still yields a valid empty zip.
    pub fn build(&self, members: &[MemberRequest]) -> Result<BuildReport, BuildError> {
        let mut temp = self.create_temp()?;
        let mut entries = Vec::with_capacity(members.len());
        let mut skipped = Vec::new();

        let mut writer = ZipWriter::new(temp.as_file_mut());
        let mut written = HashSet::new();

        for member in members {
            match self.write_member(&mut writer, member, &written) {
                Ok(name) => {
                    debug!(member = %member.name, entry = %name, "Added member");
                    written.insert(name.clone());
                    entries.push(name);
                }
                Err(MemberFailure::Skip(reason)) => {
                    warn!(member = %member.name, reason = %reason, "File skipped");
                    skipped.push(SkippedMember {
                        member: member.clone(),
                        reason,
                    });
                }
                Err(MemberFailure::Fatal(err)) => return Err(err),
            }
        }

        writer.finish().map_err(|source| BuildError::Zip {
            operation: "finish",
            source,
        })?;

        // The zip writer only flags non-ASCII names; every entry gets the bit
        mark_utf8_names(temp.as_file_mut()).map_err(|source| BuildError::Zip {
            operation: "mark_utf8_names",
            source,
        })?;

        Ok(BuildReport {
            artifact: TemporaryArtifact { file: temp },
            entries,
            skipped,
        })
    }

    fn create_temp(&self) -> Result<NamedTempFile, BuildError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_PREFIX).suffix(TEMP_SUFFIX);

        let result = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        };

        result.map_err(|source| BuildError::TempFile {
            dir: self.temp_dir.clone().unwrap_or_else(std::env::temp_dir),
            source,
        })
    }

    fn write_member(
        &self,
        writer: &mut ZipWriter<&mut File>,
        member: &MemberRequest,
        written: &HashSet<String>,
    ) -> Result<String, MemberFailure> {
        let name = entry_name(member).map_err(SkipReason::from)?;
        if written.contains(&name) {
            return Err(SkipReason::DuplicateEntry(name).into());
        }

        let mut source = self.storage.resolve(member).map_err(SkipReason::from)?;

        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .unix_permissions(0o644)
            .large_file(source.len >= ZIP64_THRESHOLD)
            .last_modified_time(zip_timestamp(source.modified));

        writer
            .start_file(name.as_str(), options)
            .map_err(|source| fatal("start_file", source))?;

        match copy_entry(&mut source.file, writer) {
            Ok(_) => Ok(name),
            Err(CopyError::Read(err)) => {
                // Drop the half-written entry so the archive stays consistent
                writer
                    .abort_file()
                    .map_err(|source| fatal("abort_file", source))?;
                Err(SkipReason::ReadFailed(err).into())
            }
            Err(CopyError::Write(err)) => Err(fatal("write", ZipError::Io(err))),
        }
    }
}

#[derive(Debug)]
enum CopyError {
    Read(io::Error),
    Write(io::Error),
}

/// `io::copy` that keeps source and sink failures apart
fn copy_entry<R: Read, W: Write>(reader: &mut R, writer: &mut W) -> Result<u64, CopyError> {
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(CopyError::Read(err)),
        };
        writer.write_all(&buf[..n]).map_err(CopyError::Write)?;
        total += n as u64;
    }
}

/// Set the UTF-8 name flag in every local and central directory header.
///
/// Only the flags fields change; sizes, offsets and CRCs stay valid.
fn mark_utf8_names(file: &mut File) -> Result<(), ZipError> {
    file.seek(SeekFrom::Start(0))?;
    let headers = {
        let mut archive = ZipArchive::new(&mut *file)?;
        (0..archive.len())
            .map(|i| {
                archive
                    .by_index_raw(i)
                    .map(|entry| (entry.header_start(), entry.central_header_start()))
            })
            .collect::<Result<Vec<_>, _>>()?
    };

    for (local, central) in headers {
        set_header_flag(file, local, LOCAL_HEADER_SIGNATURE, LOCAL_FLAGS_OFFSET)?;
        set_header_flag(file, central, CENTRAL_HEADER_SIGNATURE, CENTRAL_FLAGS_OFFSET)?;
    }
    file.flush()?;
    Ok(())
}

fn set_header_flag(file: &mut File, header: u64, signature: u32, flags_offset: u64) -> io::Result<()> {
    let mut word = [0u8; 4];
    file.seek(SeekFrom::Start(header))?;
    file.read_exact(&mut word)?;
    if u32::from_le_bytes(word) != signature {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("no zip header signature at offset {header}"),
        ));
    }

    let mut flags = [0u8; 2];
    file.seek(SeekFrom::Start(header + flags_offset))?;
    file.read_exact(&mut flags)?;
    let flags = u16::from_le_bytes(flags) | UTF8_NAME_FLAG;
    file.seek(SeekFrom::Start(header + flags_offset))?;
    file.write_all(&flags.to_le_bytes())
}

fn fatal(operation: &'static str, source: ZipError) -> MemberFailure {
    MemberFailure::Fatal(BuildError::Zip { operation, source })
}

/// Source mtime as a zip timestamp; anything before 1980 becomes the zip epoch.
fn zip_timestamp(modified: Option<SystemTime>) -> zip::DateTime {
    modified
        .map(OffsetDateTime::from)
        .and_then(|time| zip::DateTime::try_from(time).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Read;
    use tempfile::TempDir;
    use zip::ZipArchive;

    struct Fixture {
        source: TempDir,
        temp: TempDir,
        builder: ArchiveBuilder,
    }

    fn fixture() -> Fixture {
        let source = TempDir::new().unwrap();
        let temp = TempDir::new().unwrap();
        let builder = ArchiveBuilder::new(LocalStorage::new(source.path()))
            .with_temp_dir(Some(temp.path().to_path_buf()));
        Fixture {
            source,
            temp,
            builder,
        }
    }

    fn read_entries(path: &Path) -> Vec<(String, Vec<u8>, CompressionMethod)> {
        let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
        (0..archive.len())
            .map(|i| {
                let mut entry = archive.by_index(i).unwrap();
                let mut data = Vec::new();
                entry.read_to_end(&mut data).unwrap();
                (entry.name().to_string(), data, entry.compression())
            })
            .collect()
    }

    #[test]
    fn writes_members_in_request_order() {
        let fx = fixture();
        fs::write(fx.source.path().join("b"), b"second").unwrap();
        fs::write(fx.source.path().join("a"), b"first").unwrap();

        let report = fx
            .builder
            .build(&[
                MemberRequest::new("b", "txt", "zeta"),
                MemberRequest::new("a", "csv", "alpha"),
            ])
            .unwrap();

        assert_eq!(report.entries, vec!["zeta.txt", "alpha.csv"]);
        assert!(report.skipped.is_empty());

        let entries = read_entries(report.artifact.path());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, "zeta.txt");
        assert_eq!(entries[0].1, b"second");
        assert_eq!(entries[1].0, "alpha.csv");
        assert_eq!(entries[1].1, b"first");
        assert!(entries.iter().all(|(_, _, method)| *method == CompressionMethod::Stored));
    }

    #[test]
    fn skips_missing_and_invalid_members() {
        let fx = fixture();
        fs::write(fx.source.path().join("present"), b"data").unwrap();

        let report = fx
            .builder
            .build(&[
                MemberRequest::new("missing", "txt", "gone"),
                MemberRequest::new("present", "txt", "kept"),
                MemberRequest::new("../escape", "txt", "evil"),
                MemberRequest::new("present", "txt", "../evil"),
            ])
            .unwrap();

        assert_eq!(report.entries, vec!["kept.txt"]);
        assert_eq!(report.skipped.len(), 3);
        assert!(matches!(report.skipped[0].reason, SkipReason::Unresolved(_)));
        assert!(matches!(report.skipped[1].reason, SkipReason::Unresolved(_)));
        assert!(matches!(report.skipped[2].reason, SkipReason::InvalidEntryName(_)));

        let entries = read_entries(report.artifact.path());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].1, b"data");
    }

    #[test]
    fn first_duplicate_name_wins() {
        let fx = fixture();
        fs::write(fx.source.path().join("one"), b"1").unwrap();
        fs::write(fx.source.path().join("two"), b"2").unwrap();

        let report = fx
            .builder
            .build(&[
                MemberRequest::new("one", "txt", "same"),
                MemberRequest::new("two", "txt", "same"),
            ])
            .unwrap();

        assert_eq!(report.entries, vec!["same.txt"]);
        assert!(matches!(report.skipped[0].reason, SkipReason::DuplicateEntry(_)));
        assert_eq!(read_entries(report.artifact.path())[0].1, b"1");
    }

    #[test]
    fn duplicate_after_unresolved_first_is_written() {
        let fx = fixture();
        fs::write(fx.source.path().join("two"), b"2").unwrap();

        let report = fx
            .builder
            .build(&[
                MemberRequest::new("missing", "txt", "same"),
                MemberRequest::new("two", "txt", "same"),
            ])
            .unwrap();

        assert_eq!(report.entries, vec!["same.txt"]);
        assert_eq!(report.skipped.len(), 1);
    }

    #[test]
    fn empty_request_yields_valid_empty_archive() {
        let fx = fixture();
        let report = fx.builder.build(&[]).unwrap();

        assert!(report.entries.is_empty());
        assert!(read_entries(report.artifact.path()).is_empty());
    }

    #[test]
    fn artifact_is_removed_on_drop_and_discard() {
        let fx = fixture();

        let report = fx.builder.build(&[]).unwrap();
        let path = report.artifact.path().to_path_buf();
        assert!(path.starts_with(fx.temp.path()));
        assert!(path.exists());
        drop(report);
        assert!(!path.exists());

        let report = fx.builder.build(&[]).unwrap();
        let path = report.artifact.path().to_path_buf();
        report.artifact.discard();
        assert!(!path.exists());
    }

    #[test]
    fn unusable_temp_dir_is_fatal() {
        let fx = fixture();
        let builder = fx
            .builder
            .clone()
            .with_temp_dir(Some(fx.temp.path().join("does-not-exist")));

        let err = builder.build(&[]).unwrap_err();
        assert!(matches!(err, BuildError::TempFile { .. }));
    }

    /// Flags of every header starting with `signature`, in file order
    fn raw_header_flags(bytes: &[u8], signature: &[u8; 4], flags_offset: usize) -> Vec<u16> {
        bytes
            .windows(4)
            .enumerate()
            .filter(|(_, window)| *window == signature.as_slice())
            .map(|(at, _)| u16::from_le_bytes([bytes[at + flags_offset], bytes[at + flags_offset + 1]]))
            .collect()
    }

    #[test]
    fn every_entry_carries_utf8_name_flag() {
        let fx = fixture();
        fs::write(fx.source.path().join("plain"), b"ascii").unwrap();
        fs::write(fx.source.path().join("cyrillic"), b"unicode").unwrap();

        let report = fx
            .builder
            .build(&[
                MemberRequest::new("plain", "txt", "report"),
                MemberRequest::new("cyrillic", "txt", "отчёт"),
            ])
            .unwrap();

        let bytes = fs::read(report.artifact.path()).unwrap();
        let local = raw_header_flags(&bytes, b"PK\x03\x04", 6);
        let central = raw_header_flags(&bytes, b"PK\x01\x02", 8);
        assert_eq!(local.len(), 2);
        assert_eq!(central.len(), 2);
        assert!(local.iter().chain(&central).all(|flags| flags & 0x0800 != 0));

        // Still a valid archive with the same names and contents
        let entries = read_entries(report.artifact.path());
        assert_eq!(entries[0].0, "report.txt");
        assert_eq!(entries[0].1, b"ascii");
        assert_eq!(entries[1].0, "отчёт.txt");
        assert_eq!(entries[1].1, b"unicode");
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("disk gone"))
        }
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::StorageFull, "no space left"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn copy_separates_read_and_write_failures() {
        let mut sink = Vec::new();
        let copied = copy_entry(&mut &b"payload"[..], &mut sink).unwrap();
        assert_eq!(copied, 7);
        assert_eq!(sink, b"payload");

        let err = copy_entry(&mut FailingReader, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, CopyError::Read(_)));

        let err = copy_entry(&mut &b"payload"[..], &mut FullDisk).unwrap_err();
        assert!(matches!(err, CopyError::Write(ref e) if e.kind() == io::ErrorKind::StorageFull));
    }

    #[test]
    fn old_mtimes_clamp_to_zip_epoch() {
        let ts = zip_timestamp(Some(SystemTime::UNIX_EPOCH));
        assert_eq!(ts.year(), 1980);
        assert_eq!(zip_timestamp(None).year(), 1980);
    }
}
