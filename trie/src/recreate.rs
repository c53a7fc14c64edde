//! Find the most recent ancestor of a block whose state is available in a [Store].
//!
//! State for a block may be missing (for example, because it was pruned or a sync has not yet
//! completed). Before recreating it by re-executing blocks, a caller walks back from the target
//! to the closest ancestor whose state root is stored. The walk is bounded by [Depth], and the
//! errors distinguish exhausting that bound (or the chain) from a chain that is itself
//! incomplete.

use crate::{nibbles::Nibbles, node::empty_root, path::Owner, store::Store};
use commonware_cryptography::{Digest, Hasher};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur when searching for available state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error<D: Digest> {
    #[error("gas limit of {limit} exceeded searching for state of block {target}")]
    DepthExceeded { target: u64, limit: u64 },
    #[error("moved beyond genesis {genesis} searching for state of block {target}")]
    BeyondGenesis { target: u64, genesis: u64 },
    #[error("state of block {0} is unavailable")]
    Unavailable(u64),
    #[error("missing parent of block {number} ({digest})")]
    MissingParent { number: u64, digest: D },
    #[error("missing gas used by block {0}")]
    MissingGas(u64),
}

impl<D: Digest> Error<D> {
    /// Returns true if the search stopped because it ran out of room rather than because the
    /// chain is incomplete.
    pub fn is_bound_exceeded(&self) -> bool {
        matches!(self, Self::DepthExceeded { .. } | Self::BeyondGenesis { .. })
    }
}

/// How far back to search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Depth {
    /// Only consider the target.
    Target,
    /// Search back to genesis.
    Unbounded,
    /// Search back until the cumulative gas used by the traversed blocks exceeds the limit.
    Gas(u64),
}

/// A block header.
pub trait Header<D: Digest> {
    fn number(&self) -> u64;
    fn digest(&self) -> D;
    fn parent(&self) -> D;
    /// Root of the state after executing the block.
    fn state_root(&self) -> D;
}

/// Access to the headers of a chain.
pub trait Chain<D: Digest> {
    type Header: Header<D>;

    /// Get the header with `digest` at height `number`.
    fn header(&self, digest: &D, number: u64) -> Option<Self::Header>;

    /// Gas used by a block (counted towards [Depth::Gas]).
    fn gas_used(&self, header: &Self::Header) -> Option<u64>;
}

/// Return the closest ancestor of `target` (including `target` itself) whose state root is in
/// `store`.
pub fn find_last_available<H: Hasher, C: Chain<H::Digest>, S: Store<H::Digest>>(
    chain: &C,
    store: &S,
    target: C::Header,
    genesis: u64,
    depth: Depth,
) -> Result<C::Header, Error<H::Digest>> {
    let empty = empty_root::<H>();
    let root_path = Nibbles::new();
    let target_number = target.number();
    let mut current = target;
    let mut gas: u64 = 0;
    loop {
        let root = current.state_root();
        if root == empty || store.has_node(Owner::Root, &root_path, &root) {
            return Ok(current);
        }
        let number = current.number();
        match depth {
            Depth::Target => return Err(Error::Unavailable(number)),
            Depth::Unbounded => {}
            Depth::Gas(limit) => {
                let used = chain.gas_used(&current).ok_or(Error::MissingGas(number))?;
                gas = gas.saturating_add(used);
                if gas > limit {
                    return Err(Error::DepthExceeded {
                        target: target_number,
                        limit,
                    });
                }
            }
        }
        debug!(block = number, requested = target_number, gas, "state unavailable");
        if number <= genesis {
            return Err(Error::BeyondGenesis {
                target: target_number,
                genesis,
            });
        }
        current = chain
            .header(&current.parent(), number - 1)
            .ok_or_else(|| Error::MissingParent {
                number,
                digest: current.digest(),
            })?;
    }
}
