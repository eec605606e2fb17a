//! # SMB Connect
//!
//! Client-side connection establishment for **SMB 1/2/3** and resolution of
//! [\[MS-DFSC\]](https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-dfsc/3109f4be-2dbb-42c9-9b8e-0b34f7a2135e)
//! namespace referrals.
//!
//! This crate provides:
//! - **Client layer** ([`client`]): a [`client::ConnectionContext`] per logical connection and a
//!   [`client::ConnectionOrchestrator`] that resolves the server name, races reachability probes,
//!   negotiates a dialect (or joins an existing session) and authenticates with Kerberos, NTLM,
//!   guest or anonymous credentials.
//! - **DFS layer** ([`dfs`]): the V1–V4 referral codec and a resolver that follows referrals, with
//!   target failover and a hop limit, to the server that stores a path.
//! - **Transport seam** ([`transport`]): traits for the framing/signing transport, name services,
//!   directory service and cancellation. The crate never touches a socket itself.
//! - **Utilities** ([`util`]): SPNEGO mechanism-list parsing, credential types and UTF-16 helpers.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use smb_connect::client::{Collaborators, ConnectionContext, ConnectionOrchestrator};
//! use smb_connect::config::SMBClientConfig;
//! use smb_connect::dfs::ReferralResolver;
//! use smb_connect::util::auth::{AuthOptions, Credentials};
//! # fn collaborators() -> Collaborators { unimplemented!() }
//!
//! fn main() -> smb_core::SMBResult<()> {
//!     let orchestrator = ConnectionOrchestrator::new(SMBClientConfig::default(), collaborators());
//!     let ctx = ConnectionContext::new("corp", AuthOptions::with_credentials(Credentials::new("alice", "secret")));
//!     let resolution = ReferralResolver::new(&orchestrator).resolve(&ctx, "\\\\corp\\ns\\reports")?;
//!     println!("{} is on {}", resolution.path, resolution.context(&ctx).display_name());
//!     Ok(())
//! }
//! ```

/// Connection contexts and the resolve → negotiate → authenticate pipeline.
pub mod client;
/// Client configuration, built once and shared by everything an orchestrator owns.
pub mod config;
/// DFS referral wire format, paths and the referral-following resolver.
pub mod dfs;
/// Dialects, capability and security flags, and share properties.
pub mod protocol;
/// Collaborator traits the client is driven through.
pub mod transport;
/// Authentication helpers, UTF-16 strings and flag macros.
pub mod util;
