//! Jackal (canine-chain) messages executed by the interchain account
//!
//! Only the fields the outpost relays are modelled. Field tags follow
//! `canine_chain/storage/tx.proto` and `canine_chain/filetree/tx.proto`.

use cosmrs::Any;
use eyre::Result;
use prost::Message;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

pub const MSG_BUY_STORAGE_TYPE_URL: &str = "/canine_chain.storage.MsgBuyStorage";
pub const MSG_POST_KEY_TYPE_URL: &str = "/canine_chain.filetree.MsgPostKey";
pub const MSG_PROVISION_FILE_TREE_TYPE_URL: &str = "/canine_chain.filetree.MsgProvisionFileTree";

/// Placeholder editor key for a root folder; it has no file key to encrypt
pub const ROOT_PLACEHOLDER_KEY: &str = "Placeholder key";

/// A protobuf message understood by the host chain
pub trait HostMsg: Message + Sized {
    const TYPE_URL: &'static str;

    fn to_any(&self) -> Any {
        Any {
            type_url: Self::TYPE_URL.to_string(),
            value: self.encode_to_vec(),
        }
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct MsgBuyStorage {
    #[prost(string, tag = "1")]
    pub creator: String,
    #[prost(string, tag = "2")]
    pub for_address: String,
    #[prost(int64, tag = "3")]
    pub duration_days: i64,
    #[prost(int64, tag = "4")]
    pub bytes: i64,
    #[prost(string, tag = "5")]
    pub payment_denom: String,
    #[prost(string, tag = "6")]
    pub referral: String,
}

impl HostMsg for MsgBuyStorage {
    const TYPE_URL: &'static str = MSG_BUY_STORAGE_TYPE_URL;
}

#[derive(Clone, PartialEq, Message)]
pub struct MsgPostKey {
    #[prost(string, tag = "1")]
    pub creator: String,
    #[prost(string, tag = "2")]
    pub key: String,
}

impl HostMsg for MsgPostKey {
    const TYPE_URL: &'static str = MSG_POST_KEY_TYPE_URL;
}

#[derive(Clone, PartialEq, Message)]
pub struct MsgProvisionFileTree {
    #[prost(string, tag = "1")]
    pub creator: String,
    /// JSON map of hashed editor address to encrypted key
    #[prost(string, tag = "2")]
    pub editors: String,
    #[prost(string, tag = "3")]
    pub viewers: String,
    #[prost(string, tag = "4")]
    pub tracking_number: String,
}

impl HostMsg for MsgProvisionFileTree {
    const TYPE_URL: &'static str = MSG_PROVISION_FILE_TREE_TYPE_URL;
}

impl MsgProvisionFileTree {
    /// Master root folder owned by `creator`, who is also its only editor
    ///
    /// A new tracking number is generated on every call.
    pub fn root(creator: &str) -> Result<Self> {
        let tracking_number = uuid::Uuid::new_v4().to_string();
        Self::root_with_tracking_number(creator, tracking_number)
    }

    pub fn root_with_tracking_number(creator: &str, tracking_number: String) -> Result<Self> {
        Ok(Self {
            creator: creator.to_string(),
            editors: root_editors(&tracking_number, creator)?,
            viewers: "Viewers".to_string(),
            tracking_number,
        })
    }
}

/// Hashed editor id: `hex(sha256("e" + tracking_number + address))`
pub fn editor_id(tracking_number: &str, address: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("e{}{}", tracking_number, address).as_bytes());
    hex::encode(hasher.finalize())
}

/// JSON editors map containing only `address` with the placeholder key
pub fn root_editors(tracking_number: &str, address: &str) -> Result<String> {
    let mut editors = BTreeMap::new();
    editors.insert(
        editor_id(tracking_number, address),
        hex::encode(ROOT_PLACEHOLDER_KEY),
    );
    Ok(serde_json::to_string(&editors)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const ICA: &str = "jkl1qyvzq6yf3cxrkzg2scy0wkzlfcxm8jq9ymzyu4aq0krpj0nye0jsxsfz6n";

    #[test]
    fn test_buy_storage_encoding() {
        let msg = MsgBuyStorage {
            creator: ICA.to_string(),
            for_address: ICA.to_string(),
            duration_days: 30,
            bytes: 1_000_000_000_000,
            payment_denom: "ujkl".to_string(),
            referral: String::new(),
        };

        let any = msg.to_any();
        assert_eq!(any.type_url, "/canine_chain.storage.MsgBuyStorage");

        let decoded = MsgBuyStorage::decode(any.value.as_slice()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_post_key_wire_format() {
        let msg = MsgPostKey {
            creator: "a".to_string(),
            key: "b".to_string(),
        };
        assert_eq!(msg.encode_to_vec(), vec![0x0a, 0x01, b'a', 0x12, 0x01, b'b']);
    }

    #[test]
    fn test_editor_id_matches_sha256() {
        // sha256("e" + "" + "") == sha256("e")
        assert_eq!(
            editor_id("", ""),
            "3f79bb7b435b05321651daefd374cdc681dc06faa65e374e38337b88ca046dea"
        );
        assert_eq!(editor_id("t", ICA).len(), 64);
        assert_ne!(editor_id("t1", ICA), editor_id("t2", ICA));
    }

    #[test]
    fn test_root_editors_map() {
        let editors = root_editors("tracking", ICA).unwrap();
        let map: HashMap<String, String> = serde_json::from_str(&editors).unwrap();

        assert_eq!(map.len(), 1);
        assert_eq!(
            map.get(&editor_id("tracking", ICA)).unwrap(),
            &hex::encode("Placeholder key")
        );
    }

    #[test]
    fn test_root_file_tree() {
        let msg = MsgProvisionFileTree::root(ICA).unwrap();

        assert_eq!(msg.creator, ICA);
        assert_eq!(msg.viewers, "Viewers");
        assert!(uuid::Uuid::parse_str(&msg.tracking_number).is_ok());
        assert!(msg.editors.contains(&editor_id(&msg.tracking_number, ICA)));

        let other = MsgProvisionFileTree::root(ICA).unwrap();
        assert_ne!(msg.tracking_number, other.tracking_number);
    }
}
