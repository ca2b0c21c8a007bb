//! Cluster configuration and the registry of the committed and proposed ones.

mod configuration;
mod registry;


pub use configuration::Configuration;
pub use configuration::EffectiveConfiguration;
pub(crate) use registry::MembershipRegistry;
