use anyhow::Result;
use async_trait::async_trait;

use crate::models::{LocalAddIn, RemotePackage};

/// A configured remote package source. Querying may be slow (network, disk),
/// so it runs on the refresh task; a failing feed degrades to a diagnostic
/// rather than aborting the whole refresh.
#[async_trait]
pub trait PackageFeed: Send + Sync {
    /// Name of the configured source, used in diagnostics and stamped onto
    /// entries that don't carry one
    fn source(&self) -> &str;

    /// Fetch the current set of package entries from this source
    async fn query(&self) -> Result<Vec<RemotePackage>>;
}

/// The host's add-in tree. Lookups are in-memory and synchronous.
pub trait AddInRegistry: Send + Sync {
    /// Snapshot of the currently known add-ins
    fn addins(&self) -> Vec<LocalAddIn>;

    /// Resolve the add-in that was installed from the given package
    /// identity, if any. Matching by the add-in's own identity is the
    /// reconciler's fallback, not the registry's concern.
    fn find_by_package(&self, package_id: &str) -> Option<LocalAddIn>;
}

/// Packages already materialized on disk. Marks identities as installed
/// when no add-in is linked to them (yet).
pub trait PackageCache: Send + Sync {
    fn contains(&self, package_id: &str) -> bool;
}
