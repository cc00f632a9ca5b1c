use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::backend::PackageFeed;
use crate::models::{PackageSource, RemotePackage};

/// Feed backed by a JSON document on disk, such as a mirrored or offline
/// repository index. Network feeds are host-provided [`PackageFeed`]
/// implementations; this one covers the local case.
pub struct JsonFeed {
    name: String,
    path: PathBuf,
}

/// Feeds come in two shapes: a bare array of entries, or a service envelope
/// with a `packages` array.
#[derive(Deserialize)]
#[serde(untagged)]
enum FeedDocument {
    Entries(Vec<RemotePackage>),
    Envelope {
        #[serde(alias = "Packages")]
        packages: Vec<RemotePackage>,
    },
}

impl JsonFeed {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    pub fn from_source(source: &PackageSource) -> Self {
        Self::new(source.name.as_str(), source.url.as_str())
    }

    fn parse_document(&self, raw: &str) -> Result<Vec<RemotePackage>> {
        let document: FeedDocument = serde_json::from_str(raw)
            .with_context(|| format!("malformed feed document from `{}`", self.name))?;
        Ok(match document {
            FeedDocument::Entries(entries) => entries,
            FeedDocument::Envelope { packages } => packages,
        })
    }
}

#[async_trait]
impl PackageFeed for JsonFeed {
    fn source(&self) -> &str {
        &self.name
    }

    async fn query(&self) -> Result<Vec<RemotePackage>> {
        let raw = tokio::fs::read_to_string(&self.path).await.with_context(|| {
            format!(
                "failed to read feed `{}` at {}",
                self.name,
                self.path.display()
            )
        })?;
        self.parse_document(&raw)
    }
}
