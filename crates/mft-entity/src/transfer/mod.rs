//! Transfer config domain entities.

pub mod model;
pub mod provider;

pub use model::{EndpointKey, TransferConfig};
pub use provider::{CredentialRule, ProviderFamily, ProviderType};
