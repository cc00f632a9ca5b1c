use std::fmt;

use semver::Version;
use serde::Deserialize;

/// Tag a feed entry must carry to count as part of the add-in ecosystem.
/// Feeds are shared with ordinary library packages; anything without this
/// marker is invisible to the gallery.
pub const ADDIN_TAG: &str = "addin";

/// Which slice of the reconciled records the gallery exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GalleryMode {
    Available,
    Installed,
    Updates,
}

impl GalleryMode {
    pub fn cycle(&self) -> Self {
        match self {
            Self::Available => Self::Installed,
            Self::Installed => Self::Updates,
            Self::Updates => Self::Available,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::Installed => "Installed",
            Self::Updates => "Updates",
        }
    }
}

impl fmt::Display for GalleryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One entry of a remote feed. The version stays a string here: feeds are
/// untrusted input, and a bad version must only cost that entry, so parsing
/// happens during reconciliation.
#[derive(Debug, Clone, Deserialize)]
pub struct RemotePackage {
    #[serde(alias = "Id", alias = "PackageId")]
    pub id: String,
    #[serde(alias = "Name", alias = "Title", default)]
    pub name: String,
    #[serde(alias = "Version", default)]
    pub version: String,
    /// Whitespace-delimited tag set, NuGet style
    #[serde(alias = "Tags", default)]
    pub tags: String,
    /// Name of the feed this entry came from (stamped by the gallery when
    /// the feed document doesn't carry it)
    #[serde(alias = "Source", default)]
    pub source: String,
}

impl RemotePackage {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags
            .split_whitespace()
            .any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Feeds frequently omit the display title; the identity doubles as one.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// An add-in the host currently knows about. The package link is present
/// when the add-in was installed through the package system; manually
/// dropped-in add-ins only have their own identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalAddIn {
    pub id: String,
    pub version: Version,
    pub enabled: bool,
    pub linked_package_id: Option<String>,
    pub linked_package_version: Option<Version>,
}

/// Per-identity flags owned by the surrounding session: staged installs and
/// removals, add-ins living outside the managed directories, external feed
/// links. The reconciler copies these onto matching records and never
/// derives them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverlayFlags {
    pub is_offline: bool,
    pub is_added: bool,
    pub is_removed: bool,
    pub has_external_connection: bool,
    pub is_externally_referenced: bool,
}

/// One row of the gallery: a distinct package identity with its selected
/// version and install/update classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddInPackage {
    pub id: String,
    pub name: String,
    pub version: Version,
    pub source: String,
    pub is_installed: bool,
    pub is_enabled: bool,
    pub is_update: bool,
    pub is_offline: bool,
    pub is_added: bool,
    pub is_removed: bool,
    pub has_external_connection: bool,
    pub is_externally_referenced: bool,
}

impl fmt::Display for AddInPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.name, self.version)
    }
}

/// A configured feed source, as hosts store it in their settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageSource {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "Url", alias = "Source", default)]
    pub url: String,
}
