//! Serve a directory of audio files as a podcast.
//!
//! A background task periodically rescans the directory and renders an RSS
//! feed into a shared slot; an HTTP server answers feed requests from that
//! slot and streams the audio files themselves.

pub mod config;
pub mod feed;
pub mod server;
pub mod util;
