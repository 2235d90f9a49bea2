//! BLAKE3 property memos for dirty checking.
//!
//! A memo is a deterministic hash of a node's type and persisted properties,
//! so the mapping context never keeps a second copy of every property bag.

use serde::Serialize;

use graphsync_core::PropertyMap;

/// Hashable representation of a node snapshot.
#[derive(Serialize)]
struct HashableNode<'a> {
    type_name: &'a str,
    properties: &'a PropertyMap,
}

/// Compute the hex-encoded BLAKE3 memo of a node's persisted state.
///
/// `PropertyMap` is ordered, so equal property bags always serialize to the
/// same bytes.
pub fn compute_memo(type_name: &str, properties: &PropertyMap) -> String {
    let hashable = HashableNode {
        type_name,
        properties,
    };

    let json = serde_json::to_vec(&hashable).unwrap_or_default();
    blake3::hash(&json).to_hex().to_string()
}
