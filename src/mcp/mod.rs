// MCP surface: the tool router and its input/response types

pub mod tools;

pub use tools::ZAgentServer;
