//! Git operations for gitrecover.

pub mod reset;
pub mod worktree;

pub use reset::GitResetter;
pub use worktree::WorkTree;
