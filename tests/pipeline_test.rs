//! End-to-end build → publish → sweep behaviour without the HTTP layer

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

use zipbox::archive::MemberRequest;
use zipbox::config::StorageConfig;
use zipbox::jobs::{ArchivePipeline, JobOrchestrator};
use zipbox::observability::Metrics;
use zipbox::retention::sweep;

const DAY: Duration = Duration::from_secs(86_400);

struct Fixture {
    source: TempDir,
    output: TempDir,
    scratch: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let fixture = Self {
            source: TempDir::new().unwrap(),
            output: TempDir::new().unwrap(),
            scratch: TempDir::new().unwrap(),
        };
        fixture.write("alpha.txt", b"alpha");
        fixture.write("nested/beta.csv", b"b,e,t,a");
        fixture.write("gamma", b"gamma bytes");
        fixture
    }

    fn write(&self, name: &str, contents: &[u8]) {
        let path = self.source.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    fn orchestrator(&self) -> (JobOrchestrator, Arc<Metrics>) {
        let metrics = Arc::new(Metrics::new());
        let pipeline = ArchivePipeline::from_config(&StorageConfig {
            source_root: self.source.path().to_path_buf(),
            output_root: self.output.path().to_path_buf(),
            temp_dir: Some(self.scratch.path().to_path_buf()),
        });
        (JobOrchestrator::new(pipeline, Arc::clone(&metrics)), metrics)
    }
}

fn read_entries(path: &Path) -> Vec<(String, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    (0..archive.len())
        .map(|i| {
            let mut entry = archive.by_index(i).unwrap();
            let mut contents = Vec::new();
            entry.read_to_end(&mut contents).unwrap();
            (entry.name().to_string(), contents)
        })
        .collect()
}

fn age(path: &Path, by: Duration) {
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(SystemTime::now() - by)
        .unwrap();
}

#[tokio::test]
async fn entries_follow_request_order_with_source_bytes() {
    let fixture = Fixture::new();
    let (orchestrator, _) = fixture.orchestrator();

    let published = orchestrator
        .dispatch(vec![
            MemberRequest::new("gamma", "bin", "third"),
            MemberRequest::new("alpha.txt", "txt", "first"),
            MemberRequest::new("nested/beta.csv", "csv", "second"),
        ])
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(published.entries, 3);
    assert_eq!(published.skipped, 0);
    assert_eq!(
        read_entries(&published.path),
        vec![
            ("third.bin".to_string(), b"gamma bytes".to_vec()),
            ("first.txt".to_string(), b"alpha".to_vec()),
            ("second.csv".to_string(), b"b,e,t,a".to_vec()),
        ]
    );
}

#[tokio::test]
async fn unresolvable_members_are_skipped_not_fatal() {
    let fixture = Fixture::new();
    let (orchestrator, metrics) = fixture.orchestrator();

    let published = orchestrator
        .dispatch(vec![
            MemberRequest::new("missing.txt", "txt", "missing"),
            MemberRequest::new("alpha.txt", "txt", "alpha"),
            MemberRequest::new("nested", "", "a-directory"),
            MemberRequest::new("gamma", "txt", "alpha"),
            MemberRequest::new("/etc/hostname", "", "host"),
        ])
        .unwrap()
        .wait()
        .await
        .unwrap();

    let entries = read_entries(&published.path);
    assert_eq!(entries, vec![("alpha.txt".to_string(), b"alpha".to_vec())]);
    assert_eq!(published.skipped, 4);
    assert_eq!(metrics.snapshot().members_skipped, 4);
}

#[tokio::test]
async fn nothing_resolvable_still_publishes_empty_archive() {
    let fixture = Fixture::new();
    let (orchestrator, _) = fixture.orchestrator();

    for members in [
        Vec::new(),
        vec![MemberRequest::new("nope", "txt", "nope")],
    ] {
        let published = orchestrator.dispatch(members).unwrap().wait().await.unwrap();

        assert!(published.path.exists());
        assert_eq!(published.entries, 0);
        assert!(read_entries(&published.path).is_empty());
    }
}

#[tokio::test]
async fn concurrent_jobs_get_distinct_ids_and_archives() {
    let fixture = Fixture::new();
    let (orchestrator, metrics) = fixture.orchestrator();
    const JOBS: usize = 16;

    let tickets: Vec<_> = (0..JOBS)
        .map(|i| {
            // Every job shares alpha.txt with every other job
            let mut members = vec![MemberRequest::new("alpha.txt", "txt", "shared")];
            if i % 2 == 0 {
                members.push(MemberRequest::new("gamma", "bin", format!("own-{i}")));
            }
            orchestrator.dispatch(members).unwrap()
        })
        .collect();

    let ids: HashSet<_> = tickets.iter().map(|ticket| ticket.id).collect();
    assert_eq!(ids.len(), JOBS);

    for (i, ticket) in tickets.into_iter().enumerate() {
        let published = ticket.wait().await.unwrap();
        let names: Vec<_> = read_entries(&published.path)
            .into_iter()
            .map(|(name, _)| name)
            .collect();

        let mut expected = vec!["shared.txt".to_string()];
        if i % 2 == 0 {
            expected.push(format!("own-{i}.bin"));
        }
        assert_eq!(names, expected);
    }

    let published: Vec<_> = fs::read_dir(fixture.output.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(published.len(), JOBS);
    assert!(published.iter().all(|name| name.ends_with(".zip") && !name.starts_with('.')));
    assert_eq!(metrics.snapshot().archives_published, JOBS as u64);
}

#[tokio::test]
async fn temporary_files_are_gone_after_jobs() {
    let fixture = Fixture::new();
    let (orchestrator, _) = fixture.orchestrator();

    for _ in 0..4 {
        orchestrator
            .dispatch(vec![MemberRequest::new("alpha.txt", "txt", "a")])
            .unwrap()
            .wait()
            .await
            .unwrap();
    }

    assert_eq!(fs::read_dir(fixture.scratch.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn failed_publish_leaves_no_temporary_file() {
    let fixture = Fixture::new();
    let metrics = Arc::new(Metrics::new());
    // A regular file where the output directory should be
    let blocked = fixture.scratch.path().join("not-a-dir");
    fs::write(&blocked, b"x").unwrap();
    let temp = TempDir::new().unwrap();
    let pipeline = ArchivePipeline::from_config(&StorageConfig {
        source_root: fixture.source.path().to_path_buf(),
        output_root: blocked,
        temp_dir: Some(temp.path().to_path_buf()),
    });
    let orchestrator = JobOrchestrator::new(pipeline, Arc::clone(&metrics));

    let result = orchestrator
        .dispatch(vec![MemberRequest::new("alpha.txt", "txt", "a")])
        .unwrap()
        .wait()
        .await;

    assert!(result.is_err());
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    assert_eq!(metrics.snapshot().archives_failed, 1);
}

#[tokio::test]
async fn sweep_removes_only_expired_archives_and_is_idempotent() {
    let fixture = Fixture::new();
    let (orchestrator, _) = fixture.orchestrator();

    let old = orchestrator
        .dispatch(vec![MemberRequest::new("alpha.txt", "txt", "a")])
        .unwrap()
        .wait()
        .await
        .unwrap();
    let recent = orchestrator
        .dispatch(vec![MemberRequest::new("gamma", "bin", "g")])
        .unwrap()
        .wait()
        .await
        .unwrap();
    age(&old.path, DAY * 8);
    age(&recent.path, DAY * 6);

    let first = sweep(fixture.output.path(), DAY * 7).unwrap();
    let second = sweep(fixture.output.path(), DAY * 7).unwrap();

    assert_eq!(first.deleted, 1);
    assert_eq!(second.deleted, 0);
    assert_eq!(second.retained, 1);
    assert!(!old.path.exists());
    assert!(recent.path.exists());

    // Source files are never touched by the sweep
    assert!(fixture.source.path().join("alpha.txt").exists());
}
