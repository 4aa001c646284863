//! Halo exchange with the grid neighbours
use crate::comm::{Communicator, HaloMessage, Tag};
use crate::domain::{LocalDomain, Side};
use crate::error::Result;

/// Refresh the halos of `domain` from its neighbours
///
/// Packs the edges of `u` facing a neighbour, posts all sends with `tag`
/// and receives left, right, top, bottom in this order. Halos on sides
/// that touch the global boundary are left alone.
///
/// Every rank has to call this with the same `tag`.
///
/// # Errors
/// Any failed send or receive.
pub fn exchange_boundaries<C: Communicator>(
    domain: &mut LocalDomain,
    comm: &C,
    tag: Tag,
) -> Result<()> {
    let neighbors = Side::ALL.map(|side| domain.neighbor(side));
    for (side, neighbor) in Side::ALL.iter().zip(neighbors.iter()) {
        if neighbor.is_some() {
            domain.pack(*side);
        }
    }
    let rank = domain.rank;
    let messages: Vec<HaloMessage> = domain
        .buffers_mut()
        .into_iter()
        .zip(neighbors)
        .filter_map(|((side, send, recv), neighbor)| {
            neighbor.map(|peer| {
                log::trace!("[{}]: {:?} halo with {} (tag {})", rank, side, peer, tag);
                HaloMessage { peer, send, recv }
            })
        })
        .collect();
    log::debug!(
        "[{}]: exchange with {} neighbours, tag {}",
        rank,
        messages.len(),
        tag
    );
    comm.exchange(tag, messages)
}
