//! Typed handles for deployed contracts

use super::{
    ExecuteMsg, IcaContractCallbackCounter, IcaContractChannelState, IcaContractState,
    InstantiateMsg, OwnershipQueryResponse, QueryMsg, QueryResponse,
};
use crate::cosmos::{CosmosClient, TxResponse};
use eyre::Result;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// A contract instance on a chain
#[derive(Clone)]
pub struct Contract {
    pub address: String,
    pub code_id: u64,
    pub chain: Arc<CosmosClient>,
}

impl Contract {
    pub fn new(address: String, code_id: u64, chain: Arc<CosmosClient>) -> Self {
        Self {
            address,
            code_id,
            chain,
        }
    }

    /// Execute a raw JSON message signed by `key_name`
    pub async fn exec_any_msg(
        &self,
        key_name: &str,
        msg: &str,
        extra_args: &[&str],
    ) -> Result<TxResponse> {
        self.chain
            .execute_contract(key_name, &self.address, msg, extra_args)
            .await
    }

    /// Smart query, returning the unwrapped `data` field
    pub async fn query<T: DeserializeOwned>(&self, msg: &QueryMsg) -> Result<T> {
        let resp: QueryResponse<T> = self.chain.query_contract(&self.address, msg).await?;
        resp.get_resp()
    }
}

impl std::fmt::Debug for Contract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Contract")
            .field("address", &self.address)
            .field("code_id", &self.code_id)
            .field("chain", &self.chain.name())
            .finish()
    }
}

/// The storage outpost and the interchain account it controls
#[derive(Debug, Clone)]
pub struct IcaContract {
    pub contract: Contract,
    /// Empty until the ICA channel handshake completed
    pub ica_address: String,
}

impl IcaContract {
    pub fn new(contract: Contract) -> Self {
        Self {
            contract,
            ica_address: String::new(),
        }
    }

    pub fn set_ica_address(&mut self, ica_address: impl Into<String>) {
        self.ica_address = ica_address.into();
    }

    /// Upload `wasm_file` from the host and instantiate it
    pub async fn store_and_instantiate(
        chain: Arc<CosmosClient>,
        caller_key: &str,
        wasm_file: &Path,
        msg: &InstantiateMsg,
        label: &str,
    ) -> Result<Self> {
        info!("Deploying {} on {}", wasm_file.display(), chain.name());

        let container_path = chain.copy_to_home(wasm_file).await?;
        let code_id = chain.store_code(caller_key, &container_path).await?;

        let init_msg = serde_json::to_string(msg)?;
        let address = chain
            .instantiate_contract(caller_key, code_id, &init_msg, label, None)
            .await?;

        Ok(Self::new(Contract::new(address, code_id, chain)))
    }

    pub fn address(&self) -> &str {
        &self.contract.address
    }

    pub async fn execute(
        &self,
        key_name: &str,
        msg: &ExecuteMsg,
        extra_args: &[&str],
    ) -> Result<TxResponse> {
        self.contract
            .exec_any_msg(key_name, &msg.to_json_string()?, extra_args)
            .await
    }

    pub async fn query_contract_state(&self) -> Result<IcaContractState> {
        self.contract.query(&QueryMsg::GetContractState {}).await
    }

    pub async fn query_channel_state(&self) -> Result<IcaContractChannelState> {
        self.contract.query(&QueryMsg::GetChannel {}).await
    }

    pub async fn query_callback_counter(&self) -> Result<IcaContractCallbackCounter> {
        self.contract.query(&QueryMsg::GetCallbackCounter {}).await
    }

    pub async fn query_ownership(&self) -> Result<OwnershipQueryResponse> {
        self.contract.query(&QueryMsg::Ownership {}).await
    }
}
