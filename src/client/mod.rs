pub mod address_resolver;
pub mod authenticator;
pub mod context;
pub mod negotiator;
pub mod orchestrator;
pub mod race;

pub use address_resolver::{AddressResolver, Resolution, ResolutionStrategy};
pub use context::{AuthFlags, Canceler, ConnectionContext, ConnectionState, Scheme};
pub use orchestrator::{Collaborators, ConnectionOrchestrator};
