//! Archive building and publishing
//!
//! - [`ArchiveBuilder`] packs resolvable members into a temporary store-only zip
//! - [`Publisher`] moves the finished artifact to `<output_root>/<id>.zip`
//! - [`entry_name`] derives the `alias.ext` entry name for a member

mod builder;
mod names;
mod publisher;
mod types;

pub use builder::{ArchiveBuilder, BuildError, BuildReport, TemporaryArtifact};
pub use names::{EntryNameError, entry_name};
pub use publisher::{PublishError, Publisher};
pub use types::{MemberRequest, PublishedArchive, SkipReason, SkippedMember};
