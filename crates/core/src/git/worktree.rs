//! Local working-tree queries via `git2`.

use std::path::{Path, PathBuf};

use git2::{Repository, Status, StatusOptions};
use tracing::{debug, info, instrument, warn};

use crate::errors::{GitError, StatusLookupError};
use crate::models::{CommitData, CommitGraph};
use crate::recovery::{FileStatus, StatusLookup};

/// High-level wrapper around the repository a git command runs in.
pub struct WorkTree {
    repo: Repository,
    workdir: PathBuf,
}

impl WorkTree {
    /// Open the repository containing `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GitError> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening git repository");
        let repo = Repository::discover(path)
            .map_err(|_| GitError::RepositoryNotFound(path.display().to_string()))?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| GitError::BareRepository(path.display().to_string()))?
            .to_path_buf();
        Ok(Self { repo, workdir })
    }

    /// Root of the working tree; repository-relative paths resolve here.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    /// Whether the directory `path` holds only files git does not track yet.
    fn is_untracked_dir(&self, path: &str) -> Result<bool, git2::Error> {
        let dir = path.trim_end_matches('/');
        let prefix = format!("{}/", dir);
        let index = self.repo.index()?;
        if index
            .iter()
            .any(|entry| entry.path.starts_with(prefix.as_bytes()))
        {
            return Ok(false);
        }

        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false)
            .pathspec(dir);
        let statuses = self.repo.statuses(Some(&mut opts))?;
        Ok(statuses
            .iter()
            .any(|entry| entry.status().intersects(Status::WT_NEW | Status::INDEX_NEW)))
    }

    /// The commit HEAD points at.
    pub fn head_commit(&self) -> Result<CommitData, GitError> {
        let commit = self.repo.head()?.peel_to_commit()?;
        Ok(CommitData::from_commit(&commit))
    }

    /// Load up to `limit` commits reachable from HEAD into a graph.
    #[instrument(skip(self))]
    pub fn load_history(&self, limit: usize) -> Result<CommitGraph, GitError> {
        let mut revwalk = self.repo.revwalk()?;
        revwalk.push_head()?;
        revwalk.set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::TIME)?;

        let mut graph = CommitGraph::new();
        for oid in revwalk.take(limit) {
            let commit = self.repo.find_commit(oid?)?;
            graph.insert(CommitData::from_commit(&commit));
        }
        graph.rebuild_children();
        debug!(count = graph.len(), "loaded history");
        Ok(graph)
    }
}

impl StatusLookup for WorkTree {
    fn status(&self, path: &str) -> Result<FileStatus, StatusLookupError> {
        let on_disk = self.workdir.join(path);

        // Directories have no single status entry. One that mixes tracked
        // and untracked content counts as tracked so it is never deleted.
        if on_disk.is_dir() {
            return match self.is_untracked_dir(path) {
                Ok(true) => Ok(FileStatus::New),
                Ok(false) => Ok(FileStatus::Tracked),
                Err(source) => Err(StatusLookupError::Git2 {
                    path: path.to_string(),
                    source,
                }),
            };
        }

        match self.repo.status_file(Path::new(path)) {
            Ok(status) if status.intersects(Status::WT_NEW | Status::INDEX_NEW) => {
                Ok(FileStatus::New)
            }
            Ok(_) => Ok(FileStatus::Tracked),
            Err(e) if e.code() == git2::ErrorCode::NotFound => {
                warn!(path, "path unknown to git");
                Err(StatusLookupError::NotFound(path.to_string()))
            }
            Err(source) => Err(StatusLookupError::Git2 {
                path: path.to_string(),
                source,
            }),
        }
    }
}
