//! Storage adapters for the core's `KeyValueStore` contract.

mod json_store;

pub use json_store::JsonFileStore;
