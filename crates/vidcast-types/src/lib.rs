//! Shared type definitions for vidcast.
//!
//! These types are the JSON contract between the server and the browser
//! client. Everything pushed over the event stream is a serialized
//! [`Notification`]; the catalog entries it carries are [`Video`]s.
//!
//! # Modules
//!
//! - [`video`] -- catalog entry for a single video
//! - [`notification`] -- tagged event messages delivered to clients

pub mod notification;
pub mod video;

pub use notification::Notification;
pub use video::Video;
