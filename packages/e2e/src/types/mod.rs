//! Typed views of the outpost contract's JSON schema and of the Jackal
//! messages it relays to the host chain.

mod binary;
pub mod contract;
pub mod jackal;
pub mod metadata;
pub mod msg;
pub mod state;

pub use binary::Binary;
pub use contract::{Contract, IcaContract};
pub use metadata::{IcaMetadata, MetadataError, TxEncoding};
pub use msg::{ChannelOpenInitOptions, CosmosMsg, ExecuteMsg, InstantiateMsg, QueryMsg};
pub use state::{
    ChannelStatus, IcaContractCallbackCounter, IcaContractChannelState, IcaContractState, IcaInfo,
    OwnershipQueryResponse, QueryResponse,
};
