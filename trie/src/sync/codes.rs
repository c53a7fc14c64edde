//! Outstanding code requests.
//!
//! Code is requested by digest alone. Each request remembers the path of the node that first
//! referenced it, which is only used to order emission alongside node requests, and every node
//! waiting on it.

use super::requests::Id;
use crate::path::Path;
use commonware_cryptography::Digest;
use std::{
    cmp::Reverse,
    collections::{BTreeSet, HashMap, HashSet},
};

struct Request<D: Digest> {
    path: Path<D>,
    parents: Vec<Id>,
}

pub(super) struct Codes<D: Digest> {
    /// Every live request.
    requests: HashMap<D, Request<D>>,
    /// Requests not yet handed to the caller.
    queued: BTreeSet<(Reverse<usize>, Path<D>, D)>,
    /// Requests handed to the caller and awaiting a result.
    in_flight: HashSet<D>,
}

impl<D: Digest> Default for Codes<D> {
    fn default() -> Self {
        Self {
            requests: HashMap::new(),
            queued: BTreeSet::new(),
            in_flight: HashSet::new(),
        }
    }
}

impl<D: Digest> Codes<D> {
    /// Schedule `digest`, referenced from `path` by `parent`. If it is already scheduled, only
    /// `parent` is recorded.
    pub fn insert(&mut self, digest: D, path: Path<D>, parent: Option<Id>) {
        if let Some(request) = self.requests.get_mut(&digest) {
            request.parents.extend(parent);
            return;
        }
        self.queued
            .insert((Reverse(path.depth()), path.clone(), digest));
        self.requests.insert(
            digest,
            Request {
                path,
                parents: parent.into_iter().collect(),
            },
        );
    }

    pub fn contains(&self, digest: &D) -> bool {
        self.requests.contains_key(digest)
    }

    /// Hand up to `max` queued requests (all if `max` is 0) to the caller, in priority order.
    pub fn pop(&mut self, max: usize) -> Vec<D> {
        let mut popped = Vec::new();
        while max == 0 || popped.len() < max {
            let Some((_, _, digest)) = self.queued.pop_first() else {
                break;
            };
            self.in_flight.insert(digest);
            popped.push(digest);
        }
        popped
    }

    pub fn is_in_flight(&self, digest: &D) -> bool {
        self.in_flight.contains(digest)
    }

    /// Remove a fulfilled request, returning the nodes waiting on it.
    pub fn remove(&mut self, digest: &D) -> Vec<Id> {
        self.in_flight.remove(digest);
        let Some(request) = self.requests.remove(digest) else {
            return Vec::new();
        };
        self.queued
            .remove(&(Reverse(request.path.depth()), request.path, *digest));
        request.parents
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nibbles::Nibbles;
    use commonware_cryptography::sha256;

    #[test]
    fn test_codes_are_deduplicated() {
        let mut codes = Codes::default();
        let digest = sha256::hash(b"code");
        codes.insert(digest, Path::root(), Some(1));
        codes.insert(digest, Path::sub_trie(digest), Some(2));
        assert!(codes.contains(&digest));
        assert_eq!(codes.len(), 1);

        assert_eq!(codes.pop(0), vec![digest]);
        assert!(codes.is_in_flight(&digest));

        // Still live while in flight
        codes.insert(digest, Path::root(), None);
        assert_eq!(codes.len(), 1);
        assert_eq!(codes.remove(&digest), vec![1, 2]);
        assert!(!codes.contains(&digest));
        assert!(!codes.is_in_flight(&digest));
        assert_eq!(codes.len(), 0);
        assert!(codes.remove(&digest).is_empty());
    }

    #[test]
    fn test_codes_follow_path_order() {
        let mut codes = Codes::default();
        let shallow = sha256::hash(b"shallow");
        let deep = sha256::hash(b"deep");
        codes.insert(shallow, Path::Root(Nibbles::unpack([0x10])), None);
        codes.insert(deep, Path::Root(Nibbles::unpack([0x12, 0x34])), None);
        assert_eq!(codes.pop(1), vec![deep]);
        assert_eq!(codes.pop(1), vec![shallow]);
        assert!(codes.pop(1).is_empty());
    }
}
