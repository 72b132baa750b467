//! Trait seams between the cycle controller and its collaborators.
//!
//! The controller only ever talks to sources, the fetcher, the transformer
//! and publishers through these traits. Real clients live in `sources/`,
//! `fetch` and `publish/`; tests drive the controller with `mockall` mocks
//! generated here.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::error::{AdapterError, FetchError, PublishError, TransformError};

/// One discovered item eligible for download-and-publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Globally unique, namespaced by source (`discord_<msg>`, `x_<tweet>`,
    /// `igdm_<pk>`) and stable across repeated discovery of the same item.
    pub id: String,
    /// Locator the fetch step resolves: a direct media URL or a page URL.
    pub source_uri: String,
    /// Free-text caption from the source item, may be empty.
    pub caption_text: String,
    /// Display handle of the original author, e.g. `@someone`.
    pub author_label: String,
    /// Opaque acknowledgement reference, owned and interpreted only by the
    /// adapter that produced this candidate.
    pub ack: Option<AckToken>,
    /// How many further eligible items the adapter saw behind this one.
    /// Feeds the operator-facing queue estimate; best effort.
    pub queue_behind: u32,
}

/// Opaque reference an adapter uses to stop re-surfacing a handled item
/// (e.g. a chat message id to delete). Never interpreted by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckToken(pub String);

/// A source adapter: discovers at most one candidate per cycle from one
/// origin (chat channel, bookmark list, direct messages).
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Source: Send + Sync {
    /// Short stable name used in logs and candidate id prefixes.
    fn name(&self) -> &str;

    /// Fetch a bounded window of recent items and return the oldest
    /// eligible unprocessed one, or `None` if the source is drained.
    async fn discover(&self) -> Result<Option<Candidate>, AdapterError>;

    /// Best-effort: prevent this candidate from re-surfacing on future
    /// discovery calls. Failure is logged by the caller, never fatal.
    async fn acknowledge(&self, candidate: &Candidate) -> Result<(), AdapterError>;
}

/// Downloads a candidate's media to a local file.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Resolve `source_uri` and write the media to a local file named after
    /// `id`. Implementations must not leave partial files behind on failure.
    async fn download(&self, source_uri: &str, id: &str) -> Result<PathBuf, FetchError>;
}

/// Reformats a downloaded file to vertical aspect ratio.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Transformer: Send + Sync {
    /// Returns the path of the reformatted file. A failure here is cosmetic:
    /// the cycle continues with the original file.
    async fn reformat(&self, input: &Path) -> Result<PathBuf, TransformError>;
}

/// One publish destination. Destinations fail independently of each other.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Short stable name used in logs, the daily counter file and the
    /// operator report.
    fn name(&self) -> &str;

    /// Whether this destination is subject to the daily quota gate.
    fn rate_limited(&self) -> bool;

    /// Upload the file and return the destination's publication id.
    async fn publish(
        &self,
        file: &Path,
        title: &str,
        caption: &str,
    ) -> Result<String, PublishError>;
}
