//! Query responses of the outpost contract

use super::TxEncoding;
use eyre::{eyre, Result};
use serde::{Deserialize, Serialize};

/// `{"data": ...}` envelope returned by smart queries
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResponse<T> {
    pub data: Option<T>,
}

impl<T> QueryResponse<T> {
    pub fn get_resp(self) -> Result<T> {
        self.data
            .ok_or_else(|| eyre!("contract query returned an empty response"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IcaContractState {
    #[serde(default)]
    pub callback_address: Option<String>,
    /// Set once the ICA channel handshake completed
    #[serde(default)]
    pub ica_info: Option<IcaInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IcaInfo {
    pub ica_address: String,
    pub channel_id: String,
    pub encoding: TxEncoding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IcaContractChannelState {
    pub channel: IbcChannel,
    pub channel_status: ChannelStatus,
}

impl IcaContractChannelState {
    pub fn is_open(&self) -> bool {
        self.channel_status == ChannelStatus::Open
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IbcChannel {
    pub endpoint: IbcEndpoint,
    pub counterparty_endpoint: IbcEndpoint,
    pub order: IbcOrder,
    pub version: String,
    pub connection_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IbcEndpoint {
    pub port_id: String,
    pub channel_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IbcOrder {
    #[serde(rename = "ORDER_UNORDERED")]
    Unordered,
    #[serde(rename = "ORDER_ORDERED")]
    Ordered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelStatus {
    #[serde(rename = "STATE_UNINITIALIZED_UNSPECIFIED")]
    Uninitialized,
    #[serde(rename = "STATE_INIT")]
    Init,
    #[serde(rename = "STATE_TRYOPEN")]
    TryOpen,
    #[serde(rename = "STATE_OPEN")]
    Open,
    #[serde(rename = "STATE_CLOSED")]
    Closed,
}

/// Acknowledgement outcomes counted by the contract's callback handler
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IcaContractCallbackCounter {
    pub success: u64,
    pub error: u64,
    pub timeout: u64,
}

impl IcaContractCallbackCounter {
    pub fn total(&self) -> u64 {
        self.success + self.error + self.timeout
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnershipQueryResponse {
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub pending_owner: Option<String>,
    /// cw-ownable `Expiration`, kept opaque
    #[serde(default)]
    pub pending_expiry: Option<serde_json::Value>,
}
