use std::net::SocketAddr;
use std::thread;

use crossbeam_channel::bounded;

use smb_core::error::SMBError;
use smb_core::logging::{debug, trace};
use smb_core::SMBResult;

use crate::transport::{CancelToken, Transport, TransportHandle};

/// Connects to every candidate at once and keeps the first connection that comes up.
///
/// Losing probes are canceled through a child of `cancel`. Their handles, if they still
/// connect, are dropped before this returns.
pub fn race_candidates(transport: &dyn Transport, candidates: &[SocketAddr], cancel: &CancelToken) -> SMBResult<(SocketAddr, Box<dyn TransportHandle>)> {
    let [address] = candidates else {
        return race_many(transport, candidates, cancel);
    };
    cancel.check()?;
    Ok((*address, transport.connect(*address, cancel)?))
}

fn race_many(transport: &dyn Transport, candidates: &[SocketAddr], cancel: &CancelToken) -> SMBResult<(SocketAddr, Box<dyn TransportHandle>)> {
    if candidates.is_empty() {
        return Err(SMBError::host_unreachable("no candidate addresses"));
    }
    cancel.check()?;
    let probes = cancel.child();
    let (sender, receiver) = bounded(candidates.len());

    thread::scope(|scope| {
        for address in candidates.iter().copied() {
            let sender = sender.clone();
            let probes = probes.clone();
            scope.spawn(move || {
                trace!(%address, "probing candidate");
                let result = transport.connect(address, &probes);
                // A failed send drops the handle here.
                let _ = sender.send((address, result));
            });
        }
        drop(sender);

        // The scope joins every attempt before returning, so the loop drains them all. Losers see
        // their token canceled once a winner is in and return promptly; any that connected anyway
        // are dropped here rather than left open on a detached thread.
        let mut winner = None;
        let mut last_error = None;
        for (address, result) in receiver.iter() {
            match result {
                Ok(handle) if winner.is_none() => {
                    debug!(%address, "candidate won the race");
                    probes.cancel();
                    winner = Some((address, handle));
                }
                Ok(handle) => {
                    trace!(%address, "dropping late connection");
                    drop(handle);
                }
                Err(e) => {
                    trace!(%address, error = %e, "candidate failed");
                    last_error = Some(e);
                }
            }
        }

        match winner {
            Some(winner) => Ok(winner),
            None if cancel.is_canceled() => Err(SMBError::Canceled),
            None => Err(last_error.unwrap_or_else(|| SMBError::host_unreachable("no candidate answered"))),
        }
    })
}
