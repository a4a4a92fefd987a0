pub mod audit;
pub mod blob_store;
pub mod builder;
pub mod dto;
pub mod errors;
pub mod ownership;
pub mod ports;
pub mod use_cases;
