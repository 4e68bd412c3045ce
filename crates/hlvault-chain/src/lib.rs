//! HyperEVM and Ethereum access for the strategy client.
//!
//! - `rpc`: the `EvmRpc` seam and its JSON-RPC implementation
//! - `abi`: strategy contract, verifier, and precompile ABI
//! - `precompile`: L1 read precompile reader
//! - `connections`: per-session connection state for both chains
//! - `dispatcher`: contract call submission and receipt waiting

pub mod abi;
pub mod connections;
pub mod dispatcher;
pub mod error;
pub mod mock;
pub mod precompile;
pub mod receipt;
pub mod rpc;

pub use connections::{ChainConnections, ContractAddresses};
pub use dispatcher::{DispatchConfig, TransactionDispatcher};
pub use error::{ChainError, ChainResult};
pub use mock::MockEvmRpc;
pub use precompile::PrecompileReader;
pub use receipt::{serialize_receipt, ReceiptLog, TransactionReceipt};
pub use rpc::{BoxFuture, CallRequest, DynEvmRpc, EvmRpc, JsonRpcChain};
