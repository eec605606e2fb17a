use smb_core::error::SMBError;
use smb_core::logging::{debug, info, warn};
use smb_core::SMBResult;

use crate::client::{ConnectionContext, ConnectionOrchestrator};
use crate::dfs::path::DfsPath;
use crate::dfs::referral::ReferralResponse;
use crate::protocol::ShareInfo;

/// Recursion bookkeeping for one resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferralResolutionState {
    pub hops: usize,
    /// Every response followed, oldest first. Kept for diagnostics.
    pub chain: Vec<ReferralResponse>,
}

/// Where a path ended up.
#[derive(Debug)]
pub enum ResolvedContext {
    /// The caller's own context holds the path, possibly on a different share.
    Original,
    Referred(ConnectionContext),
}

#[derive(Debug)]
pub struct ReferralResolution {
    pub context: ResolvedContext,
    pub path: DfsPath,
    pub share: ShareInfo,
    pub state: ReferralResolutionState,
}

impl ReferralResolution {
    /// The context to use for `path`, given the one resolution started from.
    pub fn context<'a>(&'a self, original: &'a ConnectionContext) -> &'a ConnectionContext {
        match &self.context {
            ResolvedContext::Original => original,
            ResolvedContext::Referred(ctx) => ctx,
        }
    }

    pub fn was_referred(&self) -> bool {
        self.state.hops > 0
    }
}

enum Hop {
    Reused,
    Opened(ConnectionContext),
}

/// Follows DFS referrals from a namespace path to the server and share that store it.
pub struct ReferralResolver<'a> {
    orchestrator: &'a ConnectionOrchestrator,
}

impl<'a> ReferralResolver<'a> {
    pub fn new(orchestrator: &'a ConnectionOrchestrator) -> Self {
        Self { orchestrator }
    }

    /// Connects `ctx` to the share named by `path` and follows referrals until a non-DFS share
    /// is reached or the server says the rest of the path is local.
    pub fn resolve(&self, ctx: &ConnectionContext, path: &str) -> SMBResult<ReferralResolution> {
        let mut path = DfsPath::parse(path)?;
        if !path.same_server(ctx.server()) {
            return Err(SMBError::precondition_failed(format!("{} is not on {}", path, ctx.server())));
        }
        let share_name = path.share.clone()
            .ok_or_else(|| SMBError::precondition_failed(format!("{} names no share", path)))?;
        self.orchestrator.connect(ctx, false, false)?;
        let mut share = self.orchestrator.connect_share(ctx, &share_name)?;

        let max_hops = self.orchestrator.config().max_referral_hops;
        let mut state = ReferralResolutionState::default();
        let mut referred: Option<ConnectionContext> = None;
        while share.is_dfs() {
            let active = referred.as_ref().unwrap_or(ctx);
            let request = path.to_string();
            let response = match self.orchestrator.get_referral(active, &request) {
                Ok(response) => response,
                Err(SMBError::NotADfsShare(_)) => {
                    debug!(path = %request, "server holds the path itself");
                    break;
                }
                Err(e) if e.is_referral_decode_error() => {
                    warn!(path = %request, hops = state.hops, error = %e, "server sent an unusable referral response");
                    return Err(e);
                }
                Err(e) => return Err(e),
            };
            if state.hops >= max_hops {
                warn!(hops = state.hops, path = %request, "referral loop");
                return Err(SMBError::ReferralLoopExceeded(max_hops));
            }
            state.hops += 1;

            let (hop, next_path, next_share) = self.follow(active, &response, state.hops)?;
            state.chain.push(response);
            if let Hop::Opened(next) = hop {
                referred = Some(next);
            }
            path = next_path;
            share = next_share;
        }

        info!(path = %path, hops = state.hops, "path resolved");
        Ok(ReferralResolution {
            context: referred.map_or(ResolvedContext::Original, ResolvedContext::Referred),
            path,
            share,
            state,
        })
    }

    /// Tries each target of `response` in order and returns the first one that connects.
    fn follow(&self, active: &ConnectionContext, response: &ReferralResponse, hop: usize) -> SMBResult<(Hop, DfsPath, ShareInfo)> {
        debug!(hop, targets = response.referrals.len(), storage = response.is_storage(), "referral received");
        let mut last_error = None;
        for referral in &response.referrals {
            let next = match DfsPath::parse(referral.next_referral()) {
                Ok(next) if next.share.is_some() => next,
                _ => {
                    debug!(next_referral = referral.next_referral(), "referral target names no share");
                    last_error = Some(SMBError::malformed_referral(format!("target {:?} names no share", referral.next_referral())));
                    continue;
                }
            };
            debug!(hop, next = %next, root = referral.is_root(), "following referral");
            match self.connect_target(active, &next) {
                Ok((hop, share)) => return Ok((hop, next, share)),
                Err(e) if e.is_canceled() => return Err(e),
                Err(e) => {
                    warn!(hop, next = %next, error = %e, "referral target failed");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or(SMBError::NoReferralsAvailable))
    }

    fn connect_target(&self, active: &ConnectionContext, next: &DfsPath) -> SMBResult<(Hop, ShareInfo)> {
        let share = next.share.as_deref().unwrap_or_default();
        if next.same_server(active.server()) || next.same_server(&active.display_name()) {
            self.orchestrator.disconnect_share(active)?;
            let info = self.orchestrator.connect_share(active, share)?;
            return Ok((Hop::Reused, info));
        }
        let target = active.clone_for_referral(next.server.as_str());
        self.orchestrator.connect(&target, false, false)?;
        let info = self.orchestrator.connect_share(&target, share)?;
        Ok((Hop::Opened(target), info))
    }
}
