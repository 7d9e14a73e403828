//! MCP server exposing contract indexing, analysis and Q&A over stdio.
pub mod server;
pub mod tools;
