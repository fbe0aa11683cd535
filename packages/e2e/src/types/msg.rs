//! Execute, query and instantiate messages of the outpost contract

use super::jackal::HostMsg;
use super::{Binary, TxEncoding};
use cosmrs::Any;
use eyre::{eyre, Result};
use prost::Message;
use serde::{Deserialize, Serialize};

/// Parameters the contract uses to send `MsgChannelOpenInit`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelOpenInitOptions {
    pub connection_id: String,
    pub counterparty_connection_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty_port_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_encoding: Option<TxEncoding>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstantiateMsg {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_open_init_options: Option<ChannelOpenInitOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_callbacks_to: Option<String>,
}

/// Subset of CosmWasm's `CosmosMsg` the outpost forwards to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CosmosMsg {
    Stargate { type_url: String, value: Binary },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecuteMsg {
    CreateChannel {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel_open_init_options: Option<ChannelOpenInitOptions>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        join_existing_channel: Option<bool>,
    },
    /// Argument order in the contract: connection, counterparty port, counterparty connection
    CreateTransferChannel {
        connection_id: String,
        counterparty_connection_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        counterparty_port_id: Option<String>,
    },
    SendCosmosMsgs {
        messages: Vec<CosmosMsg>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        packet_memo: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_seconds: Option<u64>,
    },
    SendCustomIcaMessages {
        messages: Binary,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        packet_memo: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_seconds: Option<u64>,
    },
    UpdateCallbackAddress {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        callback_address: Option<String>,
    },
}

/// Protobuf `CosmosTx` wrapping the messages of a custom ICA packet
#[derive(Clone, PartialEq, Message)]
pub struct CosmosTx {
    #[prost(message, repeated, tag = "1")]
    pub messages: Vec<Any>,
}

impl ExecuteMsg {
    /// `send_cosmos_msgs` carrying each message as a stargate message of `type_url`
    pub fn send_cosmos_msgs_from_proto<M: Message>(
        msgs: &[M],
        memo: Option<String>,
        timeout_seconds: Option<u64>,
        type_url: &str,
    ) -> Self {
        let messages = msgs
            .iter()
            .map(|msg| CosmosMsg::Stargate {
                type_url: type_url.to_string(),
                value: Binary(msg.encode_to_vec()),
            })
            .collect();

        Self::SendCosmosMsgs {
            messages,
            packet_memo: memo,
            timeout_seconds,
        }
    }

    /// `send_cosmos_msgs` for a host message using its registered type URL
    pub fn send_host_msg<M: HostMsg>(msg: &M) -> Self {
        Self::send_cosmos_msgs_from_proto(std::slice::from_ref(msg), None, None, M::TYPE_URL)
    }

    /// `send_custom_ica_messages` with a pre-encoded `CosmosTx`
    ///
    /// Only protobuf channels are supported; proto3json needs the host's JSON codec.
    pub fn send_custom_ica_messages(
        messages: Vec<Any>,
        encoding: TxEncoding,
        memo: Option<String>,
        timeout_seconds: Option<u64>,
    ) -> Result<Self> {
        if encoding != TxEncoding::Protobuf {
            return Err(eyre!(
                "custom ICA messages can only be built for {} channels, got {}",
                TxEncoding::Protobuf,
                encoding
            ));
        }
        let tx = CosmosTx { messages };
        Ok(Self::SendCustomIcaMessages {
            messages: Binary(tx.encode_to_vec()),
            packet_memo: memo,
            timeout_seconds,
        })
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMsg {
    GetChannel {},
    GetContractState {},
    GetCallbackCounter {},
    Ownership {},
}
