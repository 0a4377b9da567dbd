// Library entrypoint for integration tests and internal reuse.
pub mod agents;
pub mod api;
pub mod config;
pub mod llm;
pub mod schemas;
pub mod shutdown;
pub mod state;
pub mod storage;
