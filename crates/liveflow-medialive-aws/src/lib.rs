//! AWS SDK backend for LiveFlow
//!
//! [`AwsMediaLive`] implements [`liveflow_medialive::MediaLiveApi`] on top of
//! `aws-sdk-medialive`. Credentials and region come from the usual AWS
//! configuration chain, optionally narrowed by [`AwsSettings`].

mod client;
mod convert;

pub use client::{AwsMediaLive, AwsSettings};
