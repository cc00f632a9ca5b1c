use std::collections::HashMap;

use semver::Version;
use tracing::warn;

use crate::backend::{AddInRegistry, PackageCache};
use crate::error::Diagnostic;
use crate::models::{AddInPackage, LocalAddIn, OverlayFlags, RemotePackage, ADDIN_TAG};

/// Outcome of matching a remote snapshot against the local installation.
/// Diagnostics accompany partial results; they never replace them.
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    pub records: Vec<AddInPackage>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Builds one presentation record per distinct tagged remote identity.
///
/// Entries without the marker tag or outside the search terms are dropped,
/// the highest semver wins within an identity, and identities keep the order
/// of their first appearance in the feed. A local add-in is matched through
/// its package link first, then by its own identity. Pure and synchronous;
/// inputs are captured by the caller.
pub fn reconcile(
    remote: &[RemotePackage],
    search_terms: &str,
    registry: &dyn AddInRegistry,
    cache: &dyn PackageCache,
    overlays: &HashMap<String, OverlayFlags>,
) -> Reconciliation {
    let mut diagnostics = Vec::new();
    let term = search_terms.trim().to_lowercase();

    // id -> (selected version, index of the selected entry)
    let mut selected: HashMap<String, (Version, usize)> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for (idx, pkg) in remote.iter().enumerate() {
        if !pkg.has_tag(ADDIN_TAG) {
            continue;
        }
        if !term.is_empty() && !pkg.id.to_lowercase().contains(&term) {
            continue;
        }
        let version = match Version::parse(pkg.version.trim()) {
            Ok(version) => version,
            Err(err) => {
                warn!(id = %pkg.id, version = %pkg.version, "skipping entry with unparseable version");
                diagnostics.push(Diagnostic::VersionParse {
                    id: pkg.id.clone(),
                    version: pkg.version.clone(),
                    reason: err.to_string(),
                });
                continue;
            }
        };
        match selected.get_mut(&pkg.id) {
            None => {
                order.push(pkg.id.clone());
                selected.insert(pkg.id.clone(), (version, idx));
            }
            Some(entry) => {
                if version > entry.0 {
                    *entry = (version, idx);
                }
            }
        }
    }

    let addins = registry.addins();
    let mut records = Vec::with_capacity(order.len());
    for id in &order {
        let (version, idx) = &selected[id];
        let pkg = &remote[*idx];
        let matched = find_local(registry, &addins, id);

        let is_installed = matched.is_some() || cache.contains(id);
        let is_enabled = matched.as_ref().is_some_and(|a| a.enabled);
        let is_update = matched.as_ref().is_some_and(|a| {
            a.linked_package_version.as_ref().unwrap_or(&a.version) < version
        });
        let overlay = overlays.get(id).copied().unwrap_or_default();

        records.push(AddInPackage {
            id: id.clone(),
            name: pkg.display_name().to_string(),
            version: version.clone(),
            source: pkg.source.clone(),
            is_installed,
            is_enabled,
            is_update,
            is_offline: overlay.is_offline,
            is_added: overlay.is_added,
            is_removed: overlay.is_removed,
            has_external_connection: overlay.has_external_connection,
            is_externally_referenced: overlay.is_externally_referenced,
        });
    }

    Reconciliation {
        records,
        diagnostics,
    }
}

/// The package link wins; an add-in whose own identity equals the package
/// identity covers add-ins installed before the package system recorded
/// links.
fn find_local(
    registry: &dyn AddInRegistry,
    addins: &[LocalAddIn],
    package_id: &str,
) -> Option<LocalAddIn> {
    registry
        .find_by_package(package_id)
        .or_else(|| addins.iter().find(|a| a.id == package_id).cloned())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubRegistry {
        addins: Vec<LocalAddIn>,
    }

    impl AddInRegistry for StubRegistry {
        fn addins(&self) -> Vec<LocalAddIn> {
            self.addins.clone()
        }

        fn find_by_package(&self, package_id: &str) -> Option<LocalAddIn> {
            self.addins
                .iter()
                .find(|a| a.linked_package_id.as_deref() == Some(package_id))
                .cloned()
        }
    }

    struct StubCache {
        ids: Vec<String>,
    }

    impl PackageCache for StubCache {
        fn contains(&self, package_id: &str) -> bool {
            self.ids.iter().any(|id| id == package_id)
        }
    }

    fn empty_registry() -> StubRegistry {
        StubRegistry { addins: Vec::new() }
    }

    fn empty_cache() -> StubCache {
        StubCache { ids: Vec::new() }
    }

    fn tagged(id: &str, version: &str) -> RemotePackage {
        RemotePackage {
            id: id.into(),
            name: String::new(),
            version: version.into(),
            tags: format!(" {ADDIN_TAG} "),
            source: "gallery".into(),
        }
    }

    fn addin(id: &str, version: &str, enabled: bool) -> LocalAddIn {
        LocalAddIn {
            id: id.into(),
            version: Version::parse(version).unwrap(),
            enabled,
            linked_package_id: None,
            linked_package_version: None,
        }
    }

    fn linked_addin(id: &str, version: &str, package_version: &str) -> LocalAddIn {
        LocalAddIn {
            linked_package_id: Some(id.into()),
            linked_package_version: Some(Version::parse(package_version).unwrap()),
            ..addin(id, version, true)
        }
    }

    #[test]
    fn highest_version_wins_per_identity() {
        let remote = vec![
            tagged("Vendor.Alpha", "1.0.0"),
            tagged("Vendor.Alpha", "2.0.0"),
            tagged("Vendor.Beta", "1.0.0"),
        ];
        let outcome = reconcile(
            &remote,
            "",
            &empty_registry(),
            &empty_cache(),
            &HashMap::new(),
        );
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[0].id, "Vendor.Alpha");
        assert_eq!(outcome.records[0].version, Version::new(2, 0, 0));
        assert_eq!(outcome.records[1].id, "Vendor.Beta");
    }

    #[test]
    fn prerelease_sorts_below_release() {
        let remote = vec![
            tagged("Vendor.Alpha", "2.0.0-beta.1"),
            tagged("Vendor.Alpha", "2.0.0"),
        ];
        let outcome = reconcile(
            &remote,
            "",
            &empty_registry(),
            &empty_cache(),
            &HashMap::new(),
        );
        assert_eq!(outcome.records[0].version, Version::new(2, 0, 0));
    }

    #[test]
    fn untagged_packages_never_appear() {
        let mut plain = tagged("Vendor.Library", "1.0.0");
        plain.tags = "utility http".into();
        let remote = vec![plain, tagged("Vendor.Alpha", "1.0.0")];
        let outcome = reconcile(
            &remote,
            "",
            &empty_registry(),
            &empty_cache(),
            &HashMap::new(),
        );
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].id, "Vendor.Alpha");

        // A search term matching the untagged entry doesn't resurrect it
        let outcome = reconcile(
            &remote,
            "Library",
            &empty_registry(),
            &empty_cache(),
            &HashMap::new(),
        );
        assert!(outcome.records.is_empty());
    }

    #[test]
    fn search_filters_by_identity_substring() {
        let remote = vec![
            tagged("Vendor.Alpha", "1.0.0"),
            tagged("Vendor.Beta", "1.0.0"),
        ];
        let outcome = reconcile(
            &remote,
            "beta",
            &empty_registry(),
            &empty_cache(),
            &HashMap::new(),
        );
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].id, "Vendor.Beta");
    }

    #[test]
    fn feed_order_of_first_appearance_is_kept() {
        let remote = vec![
            tagged("Zed.Tool", "1.0.0"),
            tagged("Abc.Tool", "1.0.0"),
            tagged("Zed.Tool", "3.0.0"),
            tagged("Mid.Tool", "1.0.0"),
        ];
        let outcome = reconcile(
            &remote,
            "",
            &empty_registry(),
            &empty_cache(),
            &HashMap::new(),
        );
        let ids: Vec<&str> = outcome.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["Zed.Tool", "Abc.Tool", "Mid.Tool"]);
        assert_eq!(outcome.records[0].version, Version::new(3, 0, 0));
    }

    #[test]
    fn unparseable_version_skips_only_that_entry() {
        let remote = vec![
            tagged("Vendor.Alpha", "not-a-version"),
            tagged("Vendor.Alpha", "1.2.0"),
            tagged("Vendor.Beta", "oops"),
        ];
        let outcome = reconcile(
            &remote,
            "",
            &empty_registry(),
            &empty_cache(),
            &HashMap::new(),
        );
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].version, Version::new(1, 2, 0));
        assert_eq!(outcome.diagnostics.len(), 2);
        assert!(matches!(
            &outcome.diagnostics[0],
            Diagnostic::VersionParse { id, .. } if id == "Vendor.Alpha"
        ));
    }

    #[test]
    fn linked_addin_at_older_version_is_an_update() {
        let registry = StubRegistry {
            addins: vec![linked_addin("Vendor.Alpha", "1.0.0", "1.0.0")],
        };
        let remote = vec![tagged("Vendor.Alpha", "2.0.0")];
        let outcome = reconcile(&remote, "", &registry, &empty_cache(), &HashMap::new());
        let record = &outcome.records[0];
        assert!(record.is_installed);
        assert!(record.is_update);
        assert!(record.is_enabled);
    }

    #[test]
    fn linked_addin_at_current_version_is_not_an_update() {
        let registry = StubRegistry {
            addins: vec![linked_addin("Vendor.Alpha", "2.0.0", "2.0.0")],
        };
        let remote = vec![tagged("Vendor.Alpha", "2.0.0")];
        let outcome = reconcile(&remote, "", &registry, &empty_cache(), &HashMap::new());
        let record = &outcome.records[0];
        assert!(record.is_installed);
        assert!(!record.is_update);
    }

    #[test]
    fn unlinked_addin_matches_by_own_identity() {
        // Installed before package links were recorded: no link, same identity
        let registry = StubRegistry {
            addins: vec![addin("Vendor.Alpha", "1.0.0", false)],
        };
        let remote = vec![tagged("Vendor.Alpha", "1.5.0")];
        let outcome = reconcile(&remote, "", &registry, &empty_cache(), &HashMap::new());
        let record = &outcome.records[0];
        assert!(record.is_installed);
        assert!(record.is_update, "own version is compared when no link exists");
        assert!(!record.is_enabled);
    }

    #[test]
    fn cached_package_without_addin_counts_as_installed() {
        let cache = StubCache {
            ids: vec!["Vendor.Alpha".into()],
        };
        let remote = vec![tagged("Vendor.Alpha", "1.0.0")];
        let outcome = reconcile(&remote, "", &empty_registry(), &cache, &HashMap::new());
        let record = &outcome.records[0];
        assert!(record.is_installed);
        assert!(!record.is_enabled);
        assert!(!record.is_update);
    }

    #[test]
    fn uninstalled_package_is_neither_enabled_nor_update() {
        let remote = vec![tagged("Vendor.Beta", "1.0.0")];
        let outcome = reconcile(
            &remote,
            "",
            &empty_registry(),
            &empty_cache(),
            &HashMap::new(),
        );
        let record = &outcome.records[0];
        assert!(!record.is_installed);
        assert!(!record.is_enabled);
        assert!(!record.is_update);
    }

    #[test]
    fn overlays_are_copied_onto_matching_records() {
        let mut overlays = HashMap::new();
        overlays.insert(
            "Vendor.Alpha".to_string(),
            OverlayFlags {
                is_added: true,
                ..OverlayFlags::default()
            },
        );
        let remote = vec![
            tagged("Vendor.Alpha", "1.0.0"),
            tagged("Vendor.Beta", "1.0.0"),
        ];
        let outcome = reconcile(&remote, "", &empty_registry(), &empty_cache(), &overlays);
        assert!(outcome.records[0].is_added);
        assert!(!outcome.records[1].is_added);
        assert!(!outcome.records[0].is_removed);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let outcome = reconcile(
            &[],
            "anything",
            &empty_registry(),
            &empty_cache(),
            &HashMap::new(),
        );
        assert!(outcome.records.is_empty());
        assert!(outcome.diagnostics.is_empty());
    }
}
