//! Error types with helpful suggestions
//!
//! Provides user-friendly error messages with actionable suggestions.

use std::fmt;

/// Error indicating a persisted index could not be used.
#[derive(Debug)]
pub struct IndexInvalidError {
    pub index_path: String,
    pub reason: String,
}

impl fmt::Display for IndexInvalidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Index at '{}' is unusable ({})\n\n\
             Suggestion: the index will be rebuilt on the next search.\n\
             To force it now, delete the .mantic directory.",
            self.index_path, self.reason
        )
    }
}

impl std::error::Error for IndexInvalidError {}

/// Error indicating a requested session does not exist.
#[derive(Debug)]
pub struct SessionNotFoundError {
    pub id_or_name: String,
}

impl fmt::Display for SessionNotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Session '{}' was not found\n\n\
             Suggestions:\n\
             - List known sessions: mantic session list\n\
             - Start a new one: mantic session start {}",
            self.id_or_name, self.id_or_name
        )
    }
}

impl std::error::Error for SessionNotFoundError {}

/// Error indicating the working directory cannot hold persisted state.
#[derive(Debug)]
pub struct StateDirUnwritableError {
    pub dir: String,
}

impl fmt::Display for StateDirUnwritableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cannot write session state under '{}'\n\n\
             Session recording needs a writable .mantic directory in the scan root.\n\
             Re-run without --session, or point --path at a writable checkout.",
            self.dir
        )
    }
}

impl std::error::Error for StateDirUnwritableError {}
