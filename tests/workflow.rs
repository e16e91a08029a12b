use std::{fs, path::Path, thread};

use lib::{
    dot_rev::{CommitOutcome, DotRev, StageOutcome},
    history::{read_commit, walk, LogEntry},
    object_store::ObjectStore,
    snapshot::read_tree,
};

fn committed(outcome: CommitOutcome) -> lib::object_id::ObjectId {
    match outcome {
        CommitOutcome::Committed { id, .. } => id,
        CommitOutcome::NothingToCommit => panic!("expected a commit"),
    }
}

fn count_files(dir: &Path) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .map(|entry| {
            let entry = entry.unwrap();
            if entry.file_type().unwrap().is_dir() {
                count_files(&entry.path())
            } else {
                1
            }
        })
        .sum()
}

#[test]
fn test_readme_then_notes() {
    let tempdir = tempfile::tempdir().unwrap();
    let work = tempdir.path();
    let (mut rev, _) = DotRev::init(work.join(".rev")).unwrap();

    fs::write(work.join("readme.md"), "Hello, World!\n").unwrap();
    let StageOutcome::Staged(readme) = rev.stage(Path::new("readme.md")).unwrap() else {
        panic!("readme.md should be staged");
    };
    assert_eq!(readme.to_string(), "8ab686eafeb1f44702738c8b0f24f2567c36da6d");
    let first = committed(rev.commit("Initial commit").unwrap());

    let entries: Vec<LogEntry> = rev.log().unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, first);
    assert_eq!(entries[0].message, "Initial commit");
    assert_eq!(entries[0].parent, None);
    assert_eq!(
        fs::read_to_string(work.join(".rev/refs/heads/master")).unwrap(),
        format!("{}\n", first)
    );

    fs::write(work.join("notes.txt"), "note\n").unwrap();
    rev.stage(Path::new("notes.txt")).unwrap();
    let second = committed(rev.commit("Add notes").unwrap());

    let entries: Vec<LogEntry> = rev.log().unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].id, second);
    assert_eq!(entries[0].message, "Add notes");
    assert_eq!(entries[0].parent, Some(first));
    assert_eq!(entries[1].id, first);

    // Each tree holds only what was staged for that commit.
    let newest = read_tree(rev.store(), entries[0].tree).unwrap();
    assert_eq!(newest.paths().collect::<Vec<_>>(), vec!["notes.txt"]);
    let oldest = read_tree(rev.store(), entries[1].tree).unwrap();
    assert_eq!(oldest.paths().collect::<Vec<_>>(), vec!["readme.md"]);
    assert_eq!(oldest.entries[0].id, readme);
}

#[test]
fn test_commit_chain_integrity() {
    let tempdir = tempfile::tempdir().unwrap();
    let work = tempdir.path();
    let (mut rev, _) = DotRev::init(work.join(".rev")).unwrap();

    let mut ids = Vec::new();
    for i in 0..5 {
        fs::write(work.join("file.txt"), format!("version {}\n", i)).unwrap();
        rev.stage(Path::new("file.txt")).unwrap();
        ids.push(committed(rev.commit_at(&format!("change {}", i), 1_700_000_000 + i).unwrap()));
    }

    let walked: Vec<LogEntry> = walk(rev.store(), ids[4]).collect::<Result<_, _>>().unwrap();
    assert_eq!(walked.len(), 5);
    for (entry, id) in walked.iter().zip(ids.iter().rev()) {
        assert_eq!(entry.id, *id);
    }
    for pair in walked.windows(2) {
        assert_eq!(pair[0].parent, Some(pair[1].id));
    }
    assert_eq!(walked.last().unwrap().parent, None);
    assert_eq!(walked[0].timestamp, 1_700_000_004);
}

#[test]
fn test_empty_commit_guard() {
    let tempdir = tempfile::tempdir().unwrap();
    let work = tempdir.path();
    let (mut rev, _) = DotRev::init(work.join(".rev")).unwrap();
    let objects = work.join(".rev/objects");

    assert_eq!(rev.commit("nothing").unwrap(), CommitOutcome::NothingToCommit);
    assert_eq!(count_files(&objects), 0);
    assert_eq!(rev.head_commit().unwrap(), None);

    fs::write(work.join("a.txt"), "a").unwrap();
    rev.stage(Path::new("a.txt")).unwrap();
    let first = committed(rev.commit("first").unwrap());
    let stored = count_files(&objects);

    assert_eq!(rev.commit("again").unwrap(), CommitOutcome::NothingToCommit);
    assert_eq!(count_files(&objects), stored);
    assert_eq!(rev.head_commit().unwrap(), Some(first));
}

#[test]
fn test_staging_overwrite() {
    let tempdir = tempfile::tempdir().unwrap();
    let work = tempdir.path();
    let (mut rev, _) = DotRev::init(work.join(".rev")).unwrap();

    fs::write(work.join("a.txt"), "old").unwrap();
    let StageOutcome::Staged(old) = rev.stage(Path::new("a.txt")).unwrap() else {
        panic!("a.txt should be staged");
    };
    fs::write(work.join("a.txt"), "new").unwrap();
    let StageOutcome::Staged(new) = rev.stage(Path::new("a.txt")).unwrap() else {
        panic!("a.txt should be staged");
    };
    assert_ne!(old, new);

    let id = committed(rev.commit("overwrite").unwrap());
    let tree = read_tree(rev.store(), read_commit(rev.store(), id).unwrap().tree).unwrap();
    assert_eq!(tree.entries.len(), 1);
    assert_eq!(tree.entries[0].id, new);
    // The superseded blob is orphaned but kept.
    assert!(rev.store().has(old).unwrap());
    assert!(rev.index().load().unwrap().is_empty());
}

#[test]
fn test_concurrent_stagers_lose_nothing() {
    let tempdir = tempfile::tempdir().unwrap();
    let work = tempdir.path().to_path_buf();
    DotRev::init(work.join(".rev")).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let work = work.clone();
            thread::spawn(move || {
                let name = format!("file{}.txt", i);
                fs::write(work.join(&name), format!("content {}\n", i)).unwrap();
                let mut rev = DotRev::existing(work.join(".rev")).unwrap();
                rev.stage(Path::new(&name)).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let rev = DotRev::existing(work.join(".rev")).unwrap();
    assert_eq!(rev.index().load().unwrap().len(), 8);
}

#[test]
fn test_corrupt_index_surfaces() {
    let tempdir = tempfile::tempdir().unwrap();
    let work = tempdir.path();
    let (mut rev, _) = DotRev::init(work.join(".rev")).unwrap();
    fs::write(work.join(".rev/index"), "garbage\n").unwrap();
    assert!(matches!(
        rev.commit("broken"),
        Err(lib::Error::IndexCorrupt { line: 1, .. })
    ));
    assert_eq!(rev.head_commit().unwrap(), None);
}
