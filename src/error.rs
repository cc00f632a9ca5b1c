use thiserror::Error;

/// Non-fatal conditions collected during a refresh. Each one costs a single
/// source or a single feed entry; the rest of the result stands.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A configured source could not be queried this refresh.
    #[error("source `{feed}` is unavailable: {reason}")]
    FeedUnavailable { feed: String, reason: String },

    /// A feed entry carried a version that is not valid semver.
    #[error("ignoring `{id}` {version}: {reason}")]
    VersionParse {
        id: String,
        version: String,
        reason: String,
    },
}

impl Diagnostic {
    pub fn is_feed_unavailable(&self) -> bool {
        matches!(self, Self::FeedUnavailable { .. })
    }
}
