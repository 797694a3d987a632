pub mod config_service;
pub mod coordinator;
pub mod llm_client;
pub mod prompt;
pub mod relay;
pub mod store;
