//! Tests for the `git receive-pack` subprocess adapter, using a shell script
//! standing in for git.

#![cfg(unix)]

use std::fs;
use std::io::Read;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use greview_git::{
    encode_commands, GitReceivePack, ObjectId, PackAdapter, ReceiveOutcome, ReceivePack,
    Revision, UpdateRequest,
};
use greview_store::MemoryReviewStore;

// Scripts are written and executed by the same test; running tests one at a
// time keeps another test's fork from holding a script open for writing.
static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|e| e.into_inner())
}

/// Writes an executable script to `dir` and returns its path.
fn fake_git(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("git");
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn commands() -> Vec<UpdateRequest> {
    vec![
        UpdateRequest::new(
            None,
            Some(ObjectId::from_bytes([0xab; 20])),
            "refs/heads/reviews/r/1/source",
        ),
        UpdateRequest::new(
            None,
            Some(ObjectId::from_bytes([0xcd; 20])),
            "refs/heads/reviews/r/1/destination",
        ),
    ]
}

#[test]
fn test_stdin_echoed_without_deadlock() {
    let _serial = serial();
    let dir = tempfile::tempdir().unwrap();
    // Copies stdin to stdout after the status line, so a large pack fills
    // both pipes at once.
    let git = fake_git(dir.path(), "printf '000eunpack ok\\n'\nexec cat");
    let adapter = GitReceivePack::new(git, dir.path());

    let pack: Vec<u8> = (0..4 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
    let output = adapter.accept(&commands(), &mut pack.as_slice()).unwrap();

    let mut expected = b"000eunpack ok\n".to_vec();
    expected.extend(encode_commands(&commands()).unwrap());
    expected.extend_from_slice(&pack);
    assert_eq!(output.len(), expected.len());
    assert!(output == expected);
}

#[test]
fn test_early_exit_still_reports() {
    let _serial = serial();
    let dir = tempfile::tempdir().unwrap();
    let git = fake_git(dir.path(), "printf '0013unpack corrupt\\n'\nexit 1");
    let adapter = GitReceivePack::new(git, dir.path());

    let pack = vec![0u8; 1024 * 1024];
    let output = adapter.accept(&commands(), &mut pack.as_slice()).unwrap();
    assert_eq!(output, b"0013unpack corrupt\n");
}

#[test]
fn test_runs_in_repository() {
    let _serial = serial();
    let dir = tempfile::tempdir().unwrap();
    let repo = dir.path().join("reviews.git");
    fs::create_dir(&repo).unwrap();
    let git = fake_git(dir.path(), "cat > received\nprintf '000eunpack ok\\n'");
    let adapter = GitReceivePack::new(git, &repo);

    let mut pack: &[u8] = b"PACK";
    adapter.accept(&commands(), &mut pack).unwrap();

    let mut received = Vec::new();
    fs::File::open(repo.join("received"))
        .unwrap()
        .read_to_end(&mut received)
        .unwrap();
    let mut expected = encode_commands(&commands()).unwrap();
    expected.extend_from_slice(b"PACK");
    assert_eq!(received, expected);
}

#[test]
fn test_ensure_repository_runs_init() {
    let _serial = serial();
    let dir = tempfile::tempdir().unwrap();
    // Records its arguments and creates the target directory like git would.
    let git = fake_git(
        dir.path(),
        &format!(
            "echo \"$@\" > {}\nfor last; do :; done\nmkdir -p \"$last\"",
            dir.path().join("args").display()
        ),
    );
    let repo = dir.path().join("reviews.git");
    let adapter = GitReceivePack::new(git, &repo);

    assert!(adapter.ensure_repository().unwrap());
    assert!(repo.is_dir());

    let args = fs::read_to_string(dir.path().join("args")).unwrap();
    assert!(args.starts_with("init --bare"));

    assert!(!adapter.ensure_repository().unwrap());
}

#[test]
fn test_ensure_repository_failure() {
    let _serial = serial();
    let dir = tempfile::tempdir().unwrap();
    let git = fake_git(dir.path(), "exit 128");
    let adapter = GitReceivePack::new(git, dir.path().join("reviews.git"));

    assert!(adapter.ensure_repository().is_err());
}

#[test]
fn test_review_through_subprocess() {
    let _serial = serial();
    let dir = tempfile::tempdir().unwrap();
    let git = fake_git(dir.path(), "cat > /dev/null\nprintf '000eunpack ok\\n0000'");
    let engine = ReceivePack::new(
        GitReceivePack::new(git, dir.path()),
        MemoryReviewStore::new(),
    );

    let zero = "0".repeat(40);
    let mut body = greview_git::pkt_line(&format!(
        "{zero} {} refs/heads/source\0report-status\n",
        "1".repeat(40)
    ))
    .unwrap();
    body.extend(
        greview_git::pkt_line(&format!(
            "{zero} {} refs/heads/destination\n",
            "2".repeat(40)
        ))
        .unwrap(),
    );
    body.extend_from_slice(b"0000PACK");

    let mut output = Vec::new();
    let outcome = engine
        .run(&mut body.as_slice(), &mut output, "http://localhost/")
        .unwrap();

    assert!(matches!(outcome, ReceiveOutcome::Created { ref display_id, .. } if display_id == "cr0001"));
    assert!(output.starts_with(b"000eunpack ok\n"));
}

#[test]
fn test_revisions_listed_from_review_refs() {
    let _serial = serial();
    let dir = tempfile::tempdir().unwrap();
    let repo = dir.path().join("reviews.git");
    fs::create_dir(&repo).unwrap();
    let source = "ab".repeat(20);
    let destination = "cd".repeat(20);
    // Records its arguments in the working directory and lists two complete
    // revisions out of order plus a dangling ref.
    let git = fake_git(
        dir.path(),
        &format!(
            "echo \"$@\" > args\n\
             echo '{destination} refs/heads/reviews/r/2/destination'\n\
             echo '{source} refs/heads/reviews/r/2/source'\n\
             echo '{source} refs/heads/reviews/r/1/source'\n\
             echo '{destination} refs/heads/reviews/r/1/destination'\n\
             echo '{source} refs/heads/reviews/r/3/source'"
        ),
    );
    let adapter = GitReceivePack::new(git, &repo);

    let revisions = adapter.revisions("r").unwrap();

    let source = ObjectId::from_hex(&source).unwrap();
    let destination = ObjectId::from_hex(&destination).unwrap();
    assert_eq!(
        revisions,
        vec![
            Revision {
                number: 1,
                source,
                destination,
            },
            Revision {
                number: 2,
                source,
                destination,
            },
        ]
    );

    let args = fs::read_to_string(repo.join("args")).unwrap();
    assert_eq!(
        args.trim_end(),
        "for-each-ref --format=%(objectname) %(refname) refs/heads/reviews/r/"
    );
}

#[test]
fn test_revisions_of_unknown_review_empty() {
    let _serial = serial();
    let dir = tempfile::tempdir().unwrap();
    let git = fake_git(dir.path(), "exit 0");
    let adapter = GitReceivePack::new(git, dir.path());

    assert!(adapter.revisions("missing").unwrap().is_empty());
}

#[test]
fn test_revisions_failure() {
    let _serial = serial();
    let dir = tempfile::tempdir().unwrap();
    let git = fake_git(dir.path(), "echo 'fatal: not a git repository' >&2\nexit 128");
    let adapter = GitReceivePack::new(git, dir.path());

    let err = adapter.revisions("r").unwrap_err();
    assert!(err.to_string().contains("not a git repository"));
}
