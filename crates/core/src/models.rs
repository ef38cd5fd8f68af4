//! Commit records and the graph that relates them.
//!
//! A [`CommitData`] is a value: everything but its message is fixed at
//! construction. Parent/child relationships live in a separately owned
//! [`CommitGraph`] index instead of on the records themselves.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, Offset, TimeZone, Utc};
use git2::Oid;
use tracing::debug;

// ---------------------------------------------------------------------------
// Commit record
// ---------------------------------------------------------------------------

/// One commit as read from the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitData {
    object_id: Oid,
    tree_id: Option<Oid>,
    parent_ids: Vec<Oid>,
    author: String,
    author_date: DateTime<FixedOffset>,
    committer: String,
    commit_date: DateTime<FixedOffset>,
    body: String,
}

impl CommitData {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        object_id: Oid,
        tree_id: Option<Oid>,
        parent_ids: Vec<Oid>,
        author: impl Into<String>,
        author_date: DateTime<FixedOffset>,
        committer: impl Into<String>,
        commit_date: DateTime<FixedOffset>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            object_id,
            tree_id,
            parent_ids,
            author: author.into(),
            author_date,
            committer: committer.into(),
            commit_date,
            body: body.into(),
        }
    }

    /// Build a record from a libgit2 commit.
    pub fn from_commit(commit: &git2::Commit<'_>) -> Self {
        let author = commit.author();
        let committer = commit.committer();
        Self {
            object_id: commit.id(),
            tree_id: Some(commit.tree_id()),
            parent_ids: commit.parent_ids().collect(),
            author: format_signature(&author),
            author_date: to_datetime(author.when()),
            committer: format_signature(&committer),
            commit_date: to_datetime(committer.when()),
            body: commit.message().unwrap_or("").to_string(),
        }
    }

    pub fn object_id(&self) -> Oid {
        self.object_id
    }

    pub fn tree_id(&self) -> Option<Oid> {
        self.tree_id
    }

    pub fn parent_ids(&self) -> &[Oid] {
        &self.parent_ids
    }

    /// `Name <email>` of the author.
    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn author_date(&self) -> DateTime<FixedOffset> {
        self.author_date
    }

    pub fn committer(&self) -> &str {
        &self.committer
    }

    pub fn commit_date(&self) -> DateTime<FixedOffset> {
        self.commit_date
    }

    /// Full commit message.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Replace the message, e.g. once a lazily loaded body arrives.
    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = body.into();
    }

    /// First line of the message.
    pub fn subject(&self) -> &str {
        self.body.lines().next().unwrap_or("")
    }

    /// Abbreviated object id.
    pub fn short_id(&self) -> String {
        let full = self.object_id.to_string();
        full[..7.min(full.len())].to_string()
    }
}

fn format_signature(sig: &git2::Signature<'_>) -> String {
    format!(
        "{} <{}>",
        sig.name().unwrap_or(""),
        sig.email().unwrap_or("")
    )
}

fn to_datetime(time: git2::Time) -> DateTime<FixedOffset> {
    let offset = FixedOffset::east_opt(time.offset_minutes() * 60).unwrap_or_else(|| Utc.fix());
    offset
        .timestamp_opt(time.seconds(), 0)
        .single()
        .unwrap_or_else(|| Utc::now().with_timezone(&offset))
}

// ---------------------------------------------------------------------------
// Commit graph
// ---------------------------------------------------------------------------

/// Arena of commits with an id index and a rebuildable child index.
#[derive(Debug, Default)]
pub struct CommitGraph {
    commits: Vec<CommitData>,
    by_id: HashMap<Oid, usize>,
    children: HashMap<Oid, Vec<Oid>>,
}

impl CommitGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a commit. A commit already present is replaced in place.
    ///
    /// The child index is not updated; call [`Self::rebuild_children`].
    pub fn insert(&mut self, commit: CommitData) {
        match self.by_id.get(&commit.object_id) {
            Some(&slot) => self.commits[slot] = commit,
            None => {
                self.by_id.insert(commit.object_id, self.commits.len());
                self.commits.push(commit);
            }
        }
    }

    pub fn get(&self, id: Oid) -> Option<&CommitData> {
        self.by_id.get(&id).map(|&slot| &self.commits[slot])
    }

    pub fn get_mut(&mut self, id: Oid) -> Option<&mut CommitData> {
        self.by_id.get(&id).map(|&slot| &mut self.commits[slot])
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    /// Commits in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &CommitData> {
        self.commits.iter()
    }

    /// Recompute the parent -> children index from the arena.
    ///
    /// Children appear in insertion order. Parents outside the graph still
    /// get entries, so callers can ask about a commit they never loaded.
    pub fn rebuild_children(&mut self) {
        self.children.clear();
        for commit in &self.commits {
            for parent in &commit.parent_ids {
                self.children
                    .entry(*parent)
                    .or_default()
                    .push(commit.object_id);
            }
        }
        debug!(
            commits = self.commits.len(),
            parents = self.children.len(),
            "rebuilt child index"
        );
    }

    /// Children of `id` as of the last [`Self::rebuild_children`].
    pub fn children_of(&self, id: Oid) -> &[Oid] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }
}
