//! Genesis file patching
//!
//! Chains are started from a freshly initialised `genesis.json`. Before the
//! first block, a [`GenesisModifier`] may rewrite that file, e.g. to enable the
//! interchain accounts host on the Jackal chain.

use crate::chain_config::{ChainConfig, GenesisModifier};
use eyre::{eyre, Result};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Build a modifier that merges `inserted` into the object under top-level `key`.
///
/// Entries of `inserted` replace (or add) whole values in the target object;
/// every other key of the genesis document is left untouched.
pub fn modify_genesis_at_path(inserted: Map<String, Value>, key: &str) -> GenesisModifier {
    let key = key.to_string();
    Arc::new(move |_config: &ChainConfig, genesis: &[u8]| {
        patch_genesis(genesis, &key, &inserted)
    })
}

/// Apply the merge described in [`modify_genesis_at_path`] to raw genesis bytes
pub fn patch_genesis(genesis: &[u8], key: &str, inserted: &Map<String, Value>) -> Result<Vec<u8>> {
    let mut document: Map<String, Value> = serde_json::from_slice(genesis)
        .map_err(|e| eyre!("failed to unmarshal genesis file: {}", e))?;

    let section = document
        .get_mut(key)
        .and_then(Value::as_object_mut)
        .ok_or_else(|| eyre!("genesis json does not have top level key: {}", key))?;

    for (name, value) in inserted {
        section.insert(name.clone(), value.clone());
    }

    serde_json::to_vec(&document).map_err(|e| eyre!("failed to marshal genesis bytes to json: {}", e))
}
