use std::{
    fs::create_dir_all,
    io::ErrorKind,
    path::{Component, Path, PathBuf},
};

use crate::{
    commit::{Commit, Signature},
    config::Config,
    error::Error,
    history::History,
    index::{validate_path, Index},
    lock::RepoLock,
    object::ObjectKind,
    object_id::ObjectId,
    object_store::{directory::DirectoryObjectStore, ObjectStore},
    refs::{Head, Refs},
    snapshot,
};

/// A wrapper for the path of the .rev directory which has a number of utilities defined on it.
pub struct DotRev {
    root: PathBuf,
    store: DirectoryObjectStore,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum InitOutcome {
    Created,
    Reinitialized,
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub enum StageOutcome {
    /// The file's content was stored and staged under this blob id.
    Staged(ObjectId),
    /// There is no such file in the working tree; nothing was written.
    FileNotFound,
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub enum CommitOutcome {
    Committed {
        id: ObjectId,
        /// The branch that moved, or `None` when `HEAD` is detached.
        branch: Option<String>,
    },
    NothingToCommit,
}

impl DotRev {
    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    /// The directory staged paths are relative to: the parent of the .rev directory.
    pub fn work_tree(&self) -> &Path {
        self.root.parent().unwrap_or(self.root.as_path())
    }

    /// Creates the repository layout under `root`, leaving anything that
    /// already exists (including `HEAD`) untouched.
    pub fn init(root: PathBuf) -> Result<(Self, InitOutcome), Error> {
        let outcome = if root.join("objects").is_dir() {
            InitOutcome::Reinitialized
        } else {
            InitOutcome::Created
        };
        create_dir_all(&root)?;
        let _lock = RepoLock::acquire(&root)?;

        let store = DirectoryObjectStore::new(root.join("objects"))?;
        create_dir_all(root.join("refs").join("heads"))?;

        let config_path = root.join("config");
        let config = if config_path.try_exists()? {
            Config::load(&config_path)?
        } else {
            let config = Config::default();
            config.save(&config_path)?;
            config
        };

        // Re-initialising must never move an existing branch.
        if !root.join("HEAD").try_exists()? {
            Refs::new(root.clone()).set_head(&Head::branch(&config.default_branch))?;
        }
        let index = Index::new(root.join("index"));
        if !index.path().try_exists()? {
            index.clear()?;
        }

        log::info!("{:?} repository at {:?}", outcome, root);
        Ok((DotRev { root, store }, outcome))
    }

    pub fn existing(root: PathBuf) -> Result<Self, Error> {
        if !root.join("objects").is_dir() {
            return Err(Error::NotARepository(root));
        }
        let store = DirectoryObjectStore::new(root.join("objects"))?;
        Ok(DotRev { root, store })
    }

    pub fn store(&self) -> &DirectoryObjectStore {
        &self.store
    }

    pub fn index(&self) -> Index {
        Index::new(self.root.join("index"))
    }

    pub fn refs(&self) -> Refs {
        Refs::new(self.root.clone())
    }

    pub fn config(&self) -> Result<Config, Error> {
        Config::load(&self.root.join("config"))
    }

    pub fn head(&self) -> Result<Option<Head>, Error> {
        self.refs().head()
    }

    /// The commit `HEAD` resolves to, or `None` before the first commit.
    pub fn head_commit(&self) -> Result<Option<ObjectId>, Error> {
        self.refs().resolve_head()
    }

    pub fn active_branch(&self) -> Result<Option<String>, Error> {
        Ok(self
            .head()?
            .and_then(|head| head.branch_name().map(String::from)))
    }

    fn lock(&self) -> Result<RepoLock, Error> {
        RepoLock::acquire(&self.root)
    }

    /// Stores the current content of `path` as a blob and stages it.
    /// Relative paths are taken relative to the work tree; absolute paths
    /// must lie inside it.
    pub fn stage(&mut self, path: &Path) -> Result<StageOutcome, Error> {
        let key = self.index_key(path)?;
        let _lock = self.lock()?;
        let content = match std::fs::read(self.work_tree().join(path)) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                log::info!("not staging {:?}: no such file", path);
                return Ok(StageOutcome::FileNotFound);
            }
            Err(err) => return Err(err.into()),
        };
        let id = self.store.insert(ObjectKind::Blob, &content)?;
        self.index().stage(&key, id)?;
        log::info!("staged {} as {}", key, id);
        Ok(StageOutcome::Staged(id))
    }

    /// The index key for `path`: relative to the work tree, `/`-separated.
    fn index_key(&self, path: &Path) -> Result<String, Error> {
        let relative = path.strip_prefix(self.work_tree()).unwrap_or(path);
        let invalid = || Error::InvalidPath(path.to_string_lossy().into_owned());
        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::CurDir => {}
                Component::Normal(part) => parts.push(part.to_str().ok_or_else(invalid)?),
                _ => return Err(invalid()),
            }
        }
        let key = parts.join("/");
        validate_path(&key)?;
        Ok(key)
    }

    /// Commits everything staged, stamped with the current time.
    pub fn commit(&mut self, message: &str) -> Result<CommitOutcome, Error> {
        self.commit_at(message, chrono::Utc::now().timestamp())
    }

    /// Commits everything staged, using `timestamp` for both author and committer.
    pub fn commit_at(&mut self, message: &str, timestamp: i64) -> Result<CommitOutcome, Error> {
        let _lock = self.lock()?;
        let index = self.index();
        let staged = index.load()?;
        if staged.is_empty() {
            log::info!("nothing staged, not committing");
            return Ok(CommitOutcome::NothingToCommit);
        }

        let tree = snapshot::build(&mut self.store, &staged)?;
        let refs = self.refs();
        let parent = refs.resolve_head()?;
        let signature = Signature {
            identity: self.config()?.user.identity(),
            timestamp,
        };
        let commit = Commit {
            tree,
            parent,
            author: signature.clone(),
            committer: signature,
            message: message.to_string(),
        };
        let id = self.store.insert(ObjectKind::Commit, &commit.encode())?;
        refs.update_head(id)?;
        index.clear()?;

        let branch = self.active_branch()?;
        log::info!("committed {} on {:?}", id, branch);
        Ok(CommitOutcome::Committed { id, branch })
    }

    /// The history reachable from `HEAD`, newest first. Empty before the first commit.
    pub fn log(&self) -> Result<History<'_, DirectoryObjectStore>, Error> {
        Ok(History::new(&self.store, self.head_commit()?))
    }
}

#[test]
fn test_init_layout() {
    let tempdir = tempfile::tempdir().unwrap();
    let root = tempdir.path().join(".rev");
    let (rev, outcome) = DotRev::init(root.clone()).unwrap();
    assert_eq!(outcome, InitOutcome::Created);
    assert!(root.join("objects").is_dir());
    assert!(root.join("refs/heads").is_dir());
    assert_eq!(
        std::fs::read_to_string(root.join("HEAD")).unwrap(),
        "ref: refs/heads/master"
    );
    assert_eq!(std::fs::read_to_string(root.join("index")).unwrap(), "");
    assert_eq!(rev.active_branch().unwrap().as_deref(), Some("master"));
    assert_eq!(rev.head_commit().unwrap(), None);
    assert_eq!(rev.log().unwrap().count(), 0);

    let (_, outcome) = DotRev::init(root).unwrap();
    assert_eq!(outcome, InitOutcome::Reinitialized);
}

#[test]
fn test_existing_requires_repository() {
    let tempdir = tempfile::tempdir().unwrap();
    assert!(matches!(
        DotRev::existing(tempdir.path().join(".rev")),
        Err(Error::NotARepository(_))
    ));
}

#[test]
fn test_stage_missing_file_writes_nothing() {
    let tempdir = tempfile::tempdir().unwrap();
    let (mut rev, _) = DotRev::init(tempdir.path().join(".rev")).unwrap();
    assert_eq!(
        rev.stage(Path::new("nope.txt")).unwrap(),
        StageOutcome::FileNotFound
    );
    assert!(rev.index().load().unwrap().is_empty());
    assert_eq!(std::fs::read_dir(rev.store().root()).unwrap().count(), 0);
}

#[test]
fn test_index_keys_are_relative() {
    let tempdir = tempfile::tempdir().unwrap();
    let (mut rev, _) = DotRev::init(tempdir.path().join(".rev")).unwrap();
    std::fs::create_dir(tempdir.path().join("docs")).unwrap();
    std::fs::write(tempdir.path().join("docs/guide.md"), "guide\n").unwrap();

    rev.stage(&tempdir.path().join("docs/guide.md")).unwrap();
    rev.stage(Path::new("./docs/guide.md")).unwrap();
    let staged = rev.index().load().unwrap();
    assert_eq!(staged.keys().collect::<Vec<_>>(), vec!["docs/guide.md"]);

    std::fs::write(tempdir.path().join("outside.txt"), "x").unwrap();
    assert!(matches!(
        rev.stage(Path::new("docs/../outside.txt")),
        Err(Error::InvalidPath(_))
    ));
}

#[test]
fn test_paths_outside_the_work_tree_are_rejected() {
    let tempdir = tempfile::tempdir().unwrap();
    std::fs::create_dir(tempdir.path().join("project")).unwrap();
    std::fs::create_dir(tempdir.path().join("elsewhere")).unwrap();
    std::fs::write(tempdir.path().join("elsewhere/a.txt"), "a").unwrap();
    let (mut rev, _) = DotRev::init(tempdir.path().join("project/.rev")).unwrap();

    for path in [
        tempdir.path().join("elsewhere/a.txt"),
        tempdir.path().join("elsewhere/missing.txt"),
    ] {
        assert!(matches!(rev.stage(&path), Err(Error::InvalidPath(_))));
    }
    assert!(rev.index().load().unwrap().is_empty());
}

#[test]
fn test_commit_timestamps_match() {
    let tempdir = tempfile::tempdir().unwrap();
    let (mut rev, _) = DotRev::init(tempdir.path().join(".rev")).unwrap();
    std::fs::write(tempdir.path().join("a.txt"), "a").unwrap();
    rev.stage(Path::new("a.txt")).unwrap();
    let CommitOutcome::Committed { id, branch } = rev.commit("first").unwrap() else {
        panic!("expected a commit");
    };
    assert_eq!(branch.as_deref(), Some("master"));
    let commit = crate::history::read_commit(rev.store(), id).unwrap();
    assert_eq!(commit.author, commit.committer);
    assert_eq!(commit.author.identity, rev.config().unwrap().user.identity());
}

#[test]
fn test_commit_on_detached_head() {
    let tempdir = tempfile::tempdir().unwrap();
    let (mut rev, _) = DotRev::init(tempdir.path().join(".rev")).unwrap();
    std::fs::write(tempdir.path().join("a.txt"), "a").unwrap();
    rev.stage(Path::new("a.txt")).unwrap();
    let CommitOutcome::Committed { id: first, .. } = rev.commit_at("first", 1).unwrap() else {
        panic!("expected a commit");
    };
    rev.refs().set_head(&Head::Detached(first)).unwrap();

    std::fs::write(tempdir.path().join("b.txt"), "b").unwrap();
    rev.stage(Path::new("b.txt")).unwrap();
    let CommitOutcome::Committed { id: second, branch } = rev.commit_at("second", 2).unwrap()
    else {
        panic!("expected a commit");
    };
    assert_eq!(branch, None);
    assert_eq!(rev.head().unwrap(), Some(Head::Detached(second)));
    // The branch stays where it was.
    assert_eq!(rev.refs().read("refs/heads/master").unwrap(), Some(first));
}
