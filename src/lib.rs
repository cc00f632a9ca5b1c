//! View-model layer for an IDE add-in manager's package gallery.
//!
//! Queries one or more remote package feeds, matches entries against the
//! locally installed add-ins, and classifies each distinct identity as new,
//! updatable, or installed. Feed access, the add-in tree, and the package
//! cache sit behind traits so hosts and tests can substitute any package
//! index or plugin registry.

pub mod backend;
pub mod error;
pub mod json_feed;
pub mod models;
pub mod reconcile;
pub mod view;

pub use backend::{AddInRegistry, PackageCache, PackageFeed};
pub use error::Diagnostic;
pub use json_feed::JsonFeed;
pub use models::{
    AddInPackage, GalleryMode, LocalAddIn, OverlayFlags, PackageSource, RemotePackage, ADDIN_TAG,
};
pub use reconcile::{reconcile, Reconciliation};
pub use view::AddInGallery;
