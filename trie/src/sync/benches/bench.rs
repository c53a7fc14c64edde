use bytes::Bytes;
use commonware_cryptography::Hasher;
use commonware_trie::{
    builder::build_into,
    hash,
    path::Owner,
    store::{Batch, Memory},
};
use criterion::criterion_main;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::BTreeMap;


criterion_main!(full_sync::benches);

/// Build a source store holding a trie of `n` random entries, returning the store and root.
fn make_source<H: Hasher>(n: usize) -> (Memory<H::Digest>, H::Digest) {
    let mut rng = StdRng::seed_from_u64(0);
    let entries: BTreeMap<H::Digest, Bytes> = (0..n)
        .map(|_| {
            (
                hash::<H>(&rng.gen::<[u8; 32]>()),
                Bytes::from(rng.gen::<[u8; 32]>().to_vec()),
            )
        })
        .collect();
    let src = Memory::new();
    let mut batch = src.batch();
    let root = build_into::<H, _>(Owner::Root, &entries, &mut batch);
    batch.write().unwrap();
    (src, root)
}
