//! DFS namespaces: the referral wire format and the resolver that follows referrals to the
//! server holding a path.

pub mod codec;
pub mod path;
pub mod referral;
pub mod resolver;

pub use path::DfsPath;
pub use referral::{Referral, ReferralBody, ReferralEntryFlags, ReferralHeaderFlags, ReferralPaths, ReferralPayload, ReferralResponse, ReferralVersion, ServerType};
pub use resolver::{ReferralResolution, ReferralResolutionState, ReferralResolver, ResolvedContext};
