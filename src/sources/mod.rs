//! Source adapters: each discovers at most one candidate per cycle from one
//! origin and owns its acknowledgement mechanism.

pub mod bookmarks;
mod cookies;
pub mod discord;
pub mod dms;

pub use bookmarks::BookmarkSource;
pub use discord::DiscordSource;
pub use dms::DmSource;
