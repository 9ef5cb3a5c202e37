//! Feed generation from a directory of audio files.
//!
//! - **Scanning**: find audio files by extension, newest first
//! - **Probing**: episode duration via an external tool, cached per file
//! - **Tags**: artist metadata via `lofty`
//! - **Rendering**: RSS 2.0 with podcast extensions
//!
//! # Architecture
//!
//! - [`episode`] - Directory scan and the `Episode` record
//! - [`probe`] - `DurationProbe` trait, ffmpeg implementation, duration cache
//! - [`tags`] - `TagReader` trait and lofty implementation
//! - [`render`] - XML rendering of channel and items
//! - [`builder`] - `FeedBuilder`, tying the above together
//!
//! # Example
//!
//! ```ignore
//! use podserve::feed::FeedBuilder;
//!
//! let builder = FeedBuilder::from_settings(&config.settings);
//! let xml = builder.build(&config.directory, &config.podcast)?;
//! ```

mod builder;
mod episode;
mod probe;
mod render;
mod tags;

pub use builder::{BuildError, FeedBuilder, RenderedFeed};
pub use episode::{scan_directory, AudioFile, AudioMatcher, Episode};
pub use probe::{
    parse_duration, DurationCache, DurationProbe, FfmpegProbe, ProbeError, DEFAULT_DURATION,
};
pub use render::{render_feed, render_item, rfc2822, GENERATOR};
pub use tags::{LoftyTagReader, TagError, TagReader};
