// z-agent library: markdown-backed workflow store plus its MCP surface

pub mod agent;
pub mod difficulty;
pub mod error;
pub mod fsops;
pub mod linker;
pub mod mcp;
pub mod models;
pub mod parallel;
pub mod query;
pub mod storage;
pub mod store;
