use std::sync::Arc;

use outpost::{Fetcher, LatencyProbe};
use outpost_core::NodeIdentity;

use crate::config::PolicySet;
use crate::upstream::RegistryHttpClient;

/// Shared application state handed to every handler.
///
/// Everything inside is either immutable or internally synchronized, so the
/// whole struct is a bundle of cheap clones.
#[derive(Clone)]
pub struct AppState {
    /// Cache-aside fetch pipeline.
    pub fetcher: Arc<Fetcher>,
    /// Speedtest probe over the store and the Registry.
    pub probe: Arc<LatencyProbe<RegistryHttpClient>>,
    /// Outbound Registry client, shared with the probe and the agent.
    pub registry: Arc<RegistryHttpClient>,
    /// What this node registers as.
    pub identity: Arc<NodeIdentity>,
    /// Per-resource freshness policies.
    pub policies: Arc<PolicySet>,
    /// Name of the active cache backend, for the status endpoint.
    pub backend_name: String,
}
