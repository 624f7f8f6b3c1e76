//! MediaLive resource reconcilers
//!
//! One reconciler per entity type, each implementing
//! [`liveflow_cloud::Resource`] against an injected [`MediaLiveApi`]:
//!
//! - [`InputSecurityGroupResource`] - IPv4 allow lists for push inputs
//! - [`InputResource`] - RTMP/RTP/UDP push inputs
//! - [`ChannelResource`] - channels ingesting from attached inputs
//!
//! The `test-utils` feature adds [`memory::InMemoryMediaLive`], a recording
//! double of the service.

pub mod api;
pub mod channel;
pub mod error;
pub mod input;
pub mod input_security_group;
pub mod reconcile;

#[cfg(feature = "test-utils")]
pub mod memory;

// Re-exports
pub use api::MediaLiveApi;
pub use channel::{ChannelConfig, ChannelResource, ChannelState};
pub use error::{ApiError, Result};
pub use input::{InputConfig, InputResource, InputState, endpoint_from_url};
pub use input_security_group::{
    InputSecurityGroupConfig, InputSecurityGroupResource, InputSecurityGroupState,
};
pub use reconcile::ReconcileOptions;
