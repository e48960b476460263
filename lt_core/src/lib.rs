pub mod app;
pub mod archive;
pub mod errors;
pub mod feed;
pub mod update;
pub mod version;

pub use app::{InstalledApp, Source};
pub use archive::ArchiveFormat;
pub use errors::Error;
pub use feed::{FeedItem, best_feed_item, parse_feed};
pub use update::{AppSummary, CheckOutcome, ReleaseNotes, UpdateRecord};
pub use version::Version;
