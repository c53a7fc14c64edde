//! Outstanding node requests, their parent/child links, and the indices that deduplicate them.
//!
//! A digest is fetched by a single request. Every other path the same digest is referenced from
//! while that request is outstanding is recorded as an alias, and is turned into a request of its
//! own (holding the fetched data) once the data arrives.

use crate::path::Path;
use bytes::Bytes;
use commonware_cryptography::Digest;
use std::{
    cmp::Reverse,
    collections::{BTreeMap, HashMap, HashSet},
};

/// Stable index of a [Request] in [Requests].
pub(super) type Id = usize;

/// Emission priority: deeper requests first, then ascending path.
type Priority<D> = (Reverse<usize>, Path<D>);

/// A reference to the node of a request, waiting for its data at another path.
pub(super) type Alias<D> = (Path<D>, Vec<Id>);

/// A node that has been scheduled but not yet staged.
pub(super) struct Request<D: Digest> {
    /// Path the node is staged at (and the only path a result is accepted for).
    pub path: Path<D>,
    /// Expected digest of the node.
    pub digest: D,
    /// Other paths waiting on the same node (only while unfetched).
    pub aliases: Vec<Alias<D>>,
    /// Requests waiting on this one (one entry per reference).
    pub parents: Vec<Id>,
    /// Number of references this request is still waiting on.
    pub pending: usize,
    /// Verified encoding, once fetched.
    pub data: Option<Bytes>,
}

/// Arena of live requests.
pub(super) struct Requests<D: Digest> {
    slots: Vec<Option<Request<D>>>,
    free: Vec<Id>,
    /// Live requests for each digest, in insertion order.
    by_digest: HashMap<D, Vec<Id>>,
    /// The live request responsible for each path (including alias paths).
    by_path: HashMap<Path<D>, Id>,
    /// Requests not yet handed to the caller.
    queued: BTreeMap<Priority<D>, Id>,
    /// Requests handed to the caller and awaiting a result.
    in_flight: HashSet<Id>,
}

impl<D: Digest> Default for Requests<D> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            by_digest: HashMap::new(),
            by_path: HashMap::new(),
            queued: BTreeMap::new(),
            in_flight: HashSet::new(),
        }
    }
}

impl<D: Digest> Requests<D> {
    fn allocate(&mut self, request: Request<D>) -> Id {
        let path = request.path.clone();
        let digest = request.digest;
        let id = match self.free.pop() {
            Some(id) => {
                self.slots[id] = Some(request);
                id
            }
            None => {
                self.slots.push(Some(request));
                self.slots.len() - 1
            }
        };
        self.by_digest.entry(digest).or_default().push(id);
        self.by_path.insert(path, id);
        id
    }

    /// Queue a fetch for `digest` at `path`, waited on by `parents`.
    pub fn insert(&mut self, path: Path<D>, digest: D, parents: Vec<Id>) -> Id {
        let id = self.allocate(Request {
            path: path.clone(),
            digest,
            aliases: Vec::new(),
            parents,
            pending: 0,
            data: None,
        });
        self.queued.insert((Reverse(path.depth()), path), id);
        id
    }

    /// Track a node at `path` whose encoding is already known, waited on by `parents`.
    ///
    /// The request is never handed to the caller.
    pub fn insert_fetched(
        &mut self,
        path: Path<D>,
        digest: D,
        data: Bytes,
        parents: Vec<Id>,
    ) -> Id {
        self.allocate(Request {
            path,
            digest,
            aliases: Vec::new(),
            parents,
            pending: 0,
            data: Some(data),
        })
    }

    /// Record another reference to the node of `id`, from `parent` at `path`.
    ///
    /// A reference at a path other than the request's own becomes an alias.
    pub fn link(&mut self, id: Id, path: Path<D>, parent: Option<Id>) {
        let request = self.get_mut(id);
        if path == request.path {
            request.parents.extend(parent);
            return;
        }
        if let Some((_, parents)) = request.aliases.iter_mut().find(|(alias, _)| *alias == path) {
            parents.extend(parent);
            return;
        }
        request
            .aliases
            .push((path.clone(), parent.into_iter().collect()));
        self.by_path.insert(path, id);
    }

    /// A live request for `digest`, preferring one that has already been fetched.
    pub fn find(&self, digest: &D) -> Option<Id> {
        let ids = self.by_digest.get(digest)?;
        ids.iter()
            .copied()
            .find(|id| self.get(*id).data.is_some())
            .or_else(|| ids.first().copied())
    }

    /// The request responsible for `path` (either at or aliased to it), if any.
    pub fn scheduled(&self, path: &Path<D>) -> Option<Id> {
        self.by_path.get(path).copied()
    }

    /// Hand up to `max` queued requests (all if `max` is 0) to the caller, in priority order.
    pub fn pop(&mut self, max: usize) -> Vec<(Path<D>, D)> {
        let mut popped = Vec::new();
        while max == 0 || popped.len() < max {
            let Some(((_, path), id)) = self.queued.pop_first() else {
                break;
            };
            popped.push((path, self.get(id).digest));
            self.in_flight.insert(id);
        }
        popped
    }

    /// The in-flight request at `path`, if any.
    pub fn in_flight(&self, path: &Path<D>) -> Option<Id> {
        let id = self.scheduled(path)?;
        (self.in_flight.contains(&id) && self.get(id).path == *path).then_some(id)
    }

    /// Record the verified encoding of an in-flight request, returning its aliases.
    pub fn fetched(&mut self, id: Id, data: Bytes) -> Vec<Alias<D>> {
        self.in_flight.remove(&id);
        let request = self.get_mut(id);
        request.data = Some(data);
        let aliases = std::mem::take(&mut request.aliases);
        for (path, _) in &aliases {
            if self.by_path.get(path) == Some(&id) {
                self.by_path.remove(path);
            }
        }
        aliases
    }

    /// Remove a request (after it has been staged).
    pub fn remove(&mut self, id: Id) -> Request<D> {
        let request = self.slots[id].take().expect("request must be live");
        if let Some(ids) = self.by_digest.get_mut(&request.digest) {
            ids.retain(|other| *other != id);
            if ids.is_empty() {
                self.by_digest.remove(&request.digest);
            }
        }
        let paths = std::iter::once(&request.path).chain(request.aliases.iter().map(|(p, _)| p));
        for path in paths {
            if self.by_path.get(path) == Some(&id) {
                self.by_path.remove(path);
            }
        }
        self.queued
            .remove(&(Reverse(request.path.depth()), request.path.clone()));
        self.in_flight.remove(&id);
        self.free.push(id);
        request
    }

    pub fn get(&self, id: Id) -> &Request<D> {
        self.slots[id].as_ref().expect("request must be live")
    }

    pub fn get_mut(&mut self, id: Id) -> &mut Request<D> {
        self.slots[id].as_mut().expect("request must be live")
    }

    /// Number of live requests.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Number of requests awaiting a result.
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nibbles::Nibbles;
    use commonware_cryptography::sha256::{self, Digest as Sha256Digest};

    fn path(nibbles: &[u8]) -> Path<Sha256Digest> {
        Path::Root(Nibbles::from_nibbles(nibbles.to_vec()).unwrap())
    }

    #[test]
    fn test_pop_order() {
        let mut requests = Requests::default();
        requests.insert(path(&[2]), sha256::hash(b"2"), vec![]);
        requests.insert(path(&[1]), sha256::hash(b"1"), vec![]);
        requests.insert(path(&[1, 5]), sha256::hash(b"15"), vec![]);
        requests.insert(path(&[0, 9]), sha256::hash(b"09"), vec![]);

        // Deeper first, then ascending
        let popped: Vec<_> = requests.pop(0).into_iter().map(|(p, _)| p).collect();
        assert_eq!(
            popped,
            vec![path(&[0, 9]), path(&[1, 5]), path(&[1]), path(&[2])]
        );
        assert_eq!(requests.in_flight_len(), 4);
        assert!(requests.pop(0).is_empty());
    }

    #[test]
    fn test_pop_bounded() {
        let mut requests = Requests::default();
        for i in 0..10u8 {
            requests.insert(path(&[i]), sha256::hash(&[i]), vec![]);
        }
        assert_eq!(requests.pop(3).len(), 3);
        assert_eq!(requests.pop(3).len(), 3);
        assert_eq!(requests.pop(0).len(), 4);
        assert_eq!(requests.len(), 10);
    }

    #[test]
    fn test_slots_are_reused() {
        let mut requests = Requests::default();
        let digest = sha256::hash(b"a");
        let a = requests.insert(path(&[1]), digest, vec![]);
        assert_eq!(requests.find(&digest), Some(a));
        requests.pop(0);
        assert_eq!(requests.in_flight(&path(&[1])), Some(a));
        assert!(requests.fetched(a, Bytes::from_static(b"a")).is_empty());
        assert_eq!(requests.in_flight(&path(&[1])), None);

        let removed = requests.remove(a);
        assert_eq!(removed.digest, digest);
        assert_eq!(requests.find(&digest), None);
        assert_eq!(requests.scheduled(&path(&[1])), None);
        assert_eq!(requests.len(), 0);

        let b = requests.insert(path(&[2]), sha256::hash(b"b"), vec![]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_link_records_aliases_and_parents() {
        let mut requests = Requests::default();
        let parent = requests.insert(path(&[0]), sha256::hash(b"parent"), vec![]);
        let child = requests.insert(path(&[0, 1]), sha256::hash(b"child"), vec![parent]);
        requests.link(child, path(&[0, 2]), Some(parent));
        requests.link(child, path(&[0, 2]), Some(parent));
        requests.link(child, path(&[0, 1]), None);

        let request = requests.get(child);
        assert_eq!(request.aliases, vec![(path(&[0, 2]), vec![parent, parent])]);
        assert_eq!(request.parents, vec![parent]);
        assert_eq!(requests.scheduled(&path(&[0, 1])), Some(child));
        assert_eq!(requests.scheduled(&path(&[0, 2])), Some(child));

        // Only the request's own path accepts a result
        requests.pop(0);
        assert_eq!(requests.in_flight(&path(&[0, 1])), Some(child));
        assert_eq!(requests.in_flight(&path(&[0, 2])), None);

        // Aliases are handed back once the data arrives
        let aliases = requests.fetched(child, Bytes::from_static(b"child"));
        assert_eq!(aliases, vec![(path(&[0, 2]), vec![parent, parent])]);
        assert!(requests.get(child).aliases.is_empty());
        assert_eq!(requests.scheduled(&path(&[0, 2])), None);
    }

    #[test]
    fn test_find_prefers_fetched() {
        let mut requests = Requests::default();
        let digest = sha256::hash(b"shared");
        let queued = requests.insert(path(&[1]), digest, vec![]);
        assert_eq!(requests.find(&digest), Some(queued));

        let fetched =
            requests.insert_fetched(path(&[2]), digest, Bytes::from_static(b"shared"), vec![]);
        assert_eq!(requests.find(&digest), Some(fetched));
        assert_eq!(requests.scheduled(&path(&[2])), Some(fetched));
        assert_eq!(requests.len(), 2);

        // Fetched requests are never handed out
        assert_eq!(requests.pop(0), vec![(path(&[1]), digest)]);

        // Removing one leaves the other findable
        requests.remove(fetched);
        assert_eq!(requests.find(&digest), Some(queued));
        assert_eq!(requests.scheduled(&path(&[2])), None);
        requests.remove(queued);
        assert_eq!(requests.find(&digest), None);
        assert_eq!(requests.in_flight_len(), 0);
    }
}
