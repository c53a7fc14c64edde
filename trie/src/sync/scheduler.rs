use super::{
    codes::Codes,
    membatch::Membatch,
    requests::{Id, Requests},
    Config, Error, Missing,
};
use crate::{
    decoder::{Decoder, References},
    node::empty_root,
    path::Path,
    store::{Batch, Store},
};
use bytes::Bytes;
use commonware_cryptography::Hasher;
use tracing::{debug, trace, warn};

/// Drives the synchronization of a trie (and everything its nodes reference) into a [Store].
///
/// The caller repeatedly asks for [Scheduler::missing] work, fetches it from elsewhere, feeds the
/// results back with [Scheduler::process_node] and [Scheduler::process_code], and flushes
/// completed subtrees with [Scheduler::commit]. A node is only staged for commit once every node
/// and code blob beneath it is either already stored or staged itself.
pub struct Scheduler<S: Store<H::Digest>, C: Decoder<H::Digest>, H: Hasher> {
    store: S,
    decoder: C,
    hasher: H,
    empty_root: H::Digest,

    requests: Requests<H::Digest>,
    codes: Codes<H::Digest>,
    membatch: Membatch<H::Digest>,
}

impl<S: Store<H::Digest>, C: Decoder<H::Digest>, H: Hasher> Scheduler<S, C, H> {
    /// Create a scheduler that synchronizes the trie rooted at `cfg.root` into `store`.
    ///
    /// If the root is the empty trie or is already stored, there is nothing to do.
    pub fn new(store: S, cfg: Config<H::Digest, C>) -> Self {
        let mut scheduler = Self {
            store,
            decoder: cfg.decoder,
            hasher: H::new(),
            empty_root: empty_root::<H>(),
            requests: Requests::default(),
            codes: Codes::default(),
            membatch: Membatch::default(),
        };
        scheduler.schedule_node(Path::root(), cfg.root, None);
        scheduler
    }

    /// Schedule an additional trie rooted at `root`, found at `path`.
    ///
    /// Returns an error if a different node is already scheduled or staged at `path`.
    pub fn add_sub_trie(
        &mut self,
        path: Path<H::Digest>,
        root: H::Digest,
    ) -> Result<(), Error<H::Digest>> {
        let scheduled = self
            .requests
            .scheduled(&path)
            .map(|id| self.requests.get(id).digest);
        let staged = self.membatch.get_at(&path);
        let conflict = [scheduled, staged]
            .into_iter()
            .flatten()
            .find(|existing| *existing != root);
        if let Some(existing) = conflict {
            warn!(%path, %existing, %root, "conflicting sub-trie");
            return Err(Error::PathConflict(path));
        }
        self.schedule_node(path, root, None);
        Ok(())
    }

    /// Schedule a code blob, referenced from `path`.
    pub fn add_code(&mut self, digest: H::Digest, path: Path<H::Digest>) {
        self.schedule_code(digest, path, None);
    }

    /// Return up to `max` node requests and up to `max` code requests (everything if `max` is 0)
    /// that have not been handed out yet.
    ///
    /// Returned requests are considered in flight until their result is processed.
    pub fn missing(&mut self, max: usize) -> Missing<H::Digest> {
        let nodes = self.requests.pop(max);
        let codes = self.codes.pop(max);
        trace!(
            nodes = nodes.len(),
            codes = codes.len(),
            in_flight = self.requests.in_flight_len(),
            "returned missing"
        );
        Missing { nodes, codes }
    }

    /// Process the encoding of the node requested at `path`.
    ///
    /// If the result is rejected, the scheduler is left unchanged (and the request remains in
    /// flight).
    pub fn process_node(
        &mut self,
        path: &Path<H::Digest>,
        data: Bytes,
    ) -> Result<(), Error<H::Digest>> {
        let Some(id) = self.requests.in_flight(path) else {
            warn!(%path, "unexpected node");
            return Err(Error::NotRequested(path.clone()));
        };
        let expected = self.requests.get(id).digest;
        self.hasher.update(&data);
        let actual = self.hasher.finalize();
        if actual != expected {
            warn!(%path, %expected, %actual, "node digest mismatch");
            return Err(Error::NodeMismatch {
                path: path.clone(),
                expected,
                actual,
            });
        }
        let refs = match self.decoder.decode(path, &data) {
            Ok(refs) => refs,
            Err(err) => {
                warn!(%path, ?err, "undecodable node");
                return Err(Error::Decode {
                    path: path.clone(),
                    source: err,
                });
            }
        };

        let aliases = self.requests.fetched(id, data.clone());
        self.resolve(id, path, refs);

        // Every other path waiting on this node gets its own copy, with its own references
        for (alias, parents) in aliases {
            self.materialize(alias, expected, data.clone(), parents);
        }
        Ok(())
    }

    /// Process a requested code blob.
    pub fn process_code(&mut self, digest: &H::Digest, code: Bytes) -> Result<(), Error<H::Digest>> {
        if !self.codes.is_in_flight(digest) {
            warn!(%digest, "unexpected code");
            return Err(Error::CodeNotRequested(*digest));
        }
        self.hasher.update(&code);
        let actual = self.hasher.finalize();
        if actual != *digest {
            warn!(expected = %digest, %actual, "code digest mismatch");
            return Err(Error::CodeMismatch {
                expected: *digest,
                actual,
            });
        }
        let parents = self.codes.remove(digest);
        self.membatch.put_code(*digest, code);
        self.release(parents);
        Ok(())
    }

    /// Write every completed node and verified code blob to `batch`, then write the batch.
    ///
    /// Returns the number of entries written. If the write fails, nothing is discarded and
    /// `commit` may be retried.
    pub fn commit<B: Batch<H::Digest>>(&mut self, batch: &mut B) -> Result<usize, B::Error> {
        if self.membatch.is_empty() {
            return Ok(0);
        }
        self.membatch.flush(batch);
        if let Err(err) = batch.write() {
            warn!(?err, entries = self.membatch.len(), "commit failed");
            return Err(err);
        }
        let entries = self.membatch.clear();
        debug!(entries, pending = self.pending(), "committed");
        Ok(entries)
    }

    /// Number of outstanding node and code requests.
    pub fn pending(&self) -> usize {
        self.requests.len() + self.codes.len()
    }

    /// Returns true once nothing is outstanding and everything completed has been committed.
    pub fn is_done(&self) -> bool {
        self.pending() == 0 && self.membatch.is_empty()
    }

    fn wait(&mut self, parent: Option<Id>) {
        if let Some(parent) = parent {
            self.requests.get_mut(parent).pending += 1;
        }
    }

    fn schedule_node(&mut self, path: Path<H::Digest>, digest: H::Digest, parent: Option<Id>) {
        if digest == self.empty_root {
            return;
        }

        // Referenced again at a path that is already scheduled
        if let Some(id) = self.requests.scheduled(&path) {
            if self.requests.get(id).digest == digest {
                self.wait(parent);
                self.requests.link(id, path, parent);
                return;
            }
        }

        // Already complete at this path
        if self.membatch.get_at(&path) == Some(digest) {
            return;
        }

        // Already complete at another path
        if let Some(data) = self.membatch.get_node(&digest) {
            let data = data.clone();
            self.wait(parent);
            self.materialize(path, digest, data, parent.into_iter().collect());
            return;
        }

        // Already requested at another path
        if let Some(id) = self.requests.find(&digest) {
            self.wait(parent);
            match self.requests.get(id).data.clone() {
                Some(data) => self.materialize(path, digest, data, parent.into_iter().collect()),
                None => {
                    trace!(%path, %digest, "linked duplicate");
                    self.requests.link(id, path, parent);
                }
            }
            return;
        }

        let (owner, inner) = path.resolve();
        if self.store.has_node(owner, inner, &digest) {
            return;
        }
        trace!(%path, %digest, "scheduled node");
        self.wait(parent);
        self.requests
            .insert(path, digest, parent.into_iter().collect());
    }

    fn schedule_code(&mut self, digest: H::Digest, path: Path<H::Digest>, parent: Option<Id>) {
        if self.membatch.has_code(&digest) || self.store.has_code(&digest) {
            return;
        }
        if !self.codes.contains(&digest) {
            trace!(%path, %digest, "scheduled code");
        }
        self.wait(parent);
        self.codes.insert(digest, path, parent);
    }

    /// Track a node whose encoding is already known at `path`, scheduling its references there.
    ///
    /// If the node cannot be decoded at `path`, it is fetched there instead so the error
    /// surfaces to the caller.
    fn materialize(
        &mut self,
        path: Path<H::Digest>,
        digest: H::Digest,
        data: Bytes,
        parents: Vec<Id>,
    ) {
        match self.decoder.decode(&path, &data) {
            Ok(refs) => {
                trace!(%path, %digest, "materialized duplicate");
                let id = self
                    .requests
                    .insert_fetched(path.clone(), digest, data, parents);
                self.resolve(id, &path, refs);
            }
            Err(err) => {
                warn!(%path, %digest, ?err, "duplicate undecodable at path");
                self.requests.insert(path, digest, parents);
            }
        }
    }

    /// Schedule everything a fetched request references, completing it if nothing is missing.
    fn resolve(&mut self, id: Id, path: &Path<H::Digest>, refs: References<H::Digest>) {
        // Held open until every reference is scheduled
        self.wait(Some(id));
        for (child, digest) in refs.children {
            self.schedule_node(child, digest, Some(id));
        }
        for code in refs.codes {
            self.schedule_code(code, path.clone(), Some(id));
        }
        self.release(vec![id]);
    }

    /// Drop one reference held on each of `ids`, staging every request (and, in turn, every
    /// ancestor) left with none.
    fn release(&mut self, ids: Vec<Id>) {
        let mut stack = ids;
        while let Some(id) = stack.pop() {
            let request = self.requests.get_mut(id);
            request.pending -= 1;
            if request.pending > 0 || request.data.is_none() {
                continue;
            }
            let request = self.requests.remove(id);
            let Some(data) = request.data else {
                continue;
            };
            trace!(path = %request.path, digest = %request.digest, "completed node");
            self.membatch.put_node(request.path, request.digest, data);
            stack.extend(request.parents);
        }
    }
}
