//! # Metadata
//!
//! The ICA channel version is a JSON document exchanged during the handshake
//! between controller and host. The harness builds the version it expects and
//! checks the one the contract reports once the channel is open.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// ICS-27 application version
pub const ICA_VERSION: &str = "ics27-1";

/// Only transaction type hosts accept
pub const TX_TYPE_SDK_MULTI_MSG: &str = "sdk_multi_msg";

const MAX_ICA_ADDRESS_LENGTH: usize = 128;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("invalid ICA version: expected {expected}, got {actual}")]
    InvalidVersion { expected: String, actual: String },

    #[error("invalid controller connection: expected {expected}, got {actual}")]
    InvalidConnection { expected: String, actual: String },

    #[error("invalid interchain account address: {0}")]
    InvalidAddress(String),

    #[error("unsupported tx type: {0}")]
    UnsupportedTxType(String),

    #[error("channel version is not ICA metadata: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Handshake metadata of an ICA channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IcaMetadata {
    pub version: String,
    pub controller_connection_id: String,
    pub host_connection_id: String,
    /// Empty at `OpenInit`; the host fills it in during the handshake.
    pub address: String,
    pub encoding: TxEncoding,
    pub tx_type: String,
}

/// Serialization of the transactions sent to the ICA host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxEncoding {
    #[serde(rename = "proto3")]
    Protobuf,
    #[serde(rename = "proto3json")]
    Proto3Json,
}

impl TxEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Protobuf => "proto3",
            Self::Proto3Json => "proto3json",
        }
    }
}

impl fmt::Display for TxEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TxEncoding {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "proto3" => Ok(Self::Protobuf),
            "proto3json" => Ok(Self::Proto3Json),
            other => Err(eyre::eyre!("unknown tx encoding: {}", other)),
        }
    }
}

impl IcaMetadata {
    pub fn new(
        version: String,
        controller_connection_id: String,
        host_connection_id: String,
        address: String,
        encoding: TxEncoding,
        tx_type: String,
    ) -> Self {
        Self {
            version,
            controller_connection_id,
            host_connection_id,
            address,
            encoding,
            tx_type,
        }
    }

    /// Version proposed at `OpenInit`, before the host assigns an address
    pub fn for_handshake(
        controller_connection_id: &str,
        host_connection_id: &str,
        encoding: TxEncoding,
    ) -> Self {
        Self::new(
            ICA_VERSION.to_string(),
            controller_connection_id.to_string(),
            host_connection_id.to_string(),
            String::new(),
            encoding,
            TX_TYPE_SDK_MULTI_MSG.to_string(),
        )
    }

    /// Parse a channel version string
    pub fn from_version(version: &str) -> Result<Self, MetadataError> {
        Ok(serde_json::from_str(version)?)
    }

    /// Validate against the controller-side connection of the channel
    pub fn validate(&self, controller_connection_id: &str) -> Result<(), MetadataError> {
        if self.version != ICA_VERSION {
            return Err(MetadataError::InvalidVersion {
                expected: ICA_VERSION.to_string(),
                actual: self.version.clone(),
            });
        }
        if self.controller_connection_id != controller_connection_id {
            return Err(MetadataError::InvalidConnection {
                expected: controller_connection_id.to_string(),
                actual: self.controller_connection_id.clone(),
            });
        }
        if !self.address.is_empty() {
            validate_ica_address(&self.address)?;
        }
        if self.tx_type != TX_TYPE_SDK_MULTI_MSG {
            return Err(MetadataError::UnsupportedTxType(self.tx_type.clone()));
        }
        Ok(())
    }

    /// Whether `previous_version` describes the same channel parameters
    ///
    /// The address is ignored; it is only known after the handshake.
    pub fn is_previous_version_equal(&self, previous_version: impl Into<String>) -> bool {
        match serde_json::from_str::<Self>(&previous_version.into()) {
            Ok(previous) => {
                self.version == previous.version
                    && self.controller_connection_id == previous.controller_connection_id
                    && self.host_connection_id == previous.host_connection_id
                    && self.encoding == previous.encoding
                    && self.tx_type == previous.tx_type
            }
            Err(_) => false,
        }
    }
}

impl fmt::Display for IcaMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

fn validate_ica_address(address: &str) -> Result<(), MetadataError> {
    if address.len() > MAX_ICA_ADDRESS_LENGTH || !address.chars().all(|c| c.is_alphanumeric()) {
        return Err(MetadataError::InvalidAddress(address.to_string()));
    }
    Ok(())
}
