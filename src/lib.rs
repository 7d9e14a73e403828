//! # contract-rag: Contract clause extraction and risk rating
//!
//! Indexes one contract at a time, retrieves the passages relevant to each
//! clause type, asks a completion oracle to extract them verbatim, and rates
//! their risk with keyword rules layered over the oracle's verdict. Every
//! answer carries page and section citations.
//!
//! ## Architecture
//!
//! - **[`document`]**: PDF / text loading, page cleaning, fingerprinting
//! - **[`chunker`]**: Overlapping chunks with page and section provenance
//! - **[`db`]** / **[`index`]**: SQLite + sqlite-vec namespaced vector index
//! - **[`retriever`]**: Similarity, diversity (MMR) and re-ranked retrieval
//! - **[`extractor`]**: Grounded extraction, found check, confidence
//! - **[`risk`]**: Risk rating, keyword tie-break, redline suggestions
//! - **[`pipeline`]** / **[`report`]**: Per-clause analysis and JSON report
//! - **[`session`]**: Active index and oracles shared by CLI and MCP
//! - **[`mcp`]**: MCP server (stdio transport via rmcp)

pub mod chunker;
pub mod config;
pub mod db;
pub mod document;
pub mod embedder;
pub mod error;
pub mod extractor;
pub mod index;
pub mod llm;
pub mod mcp;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod retriever;
pub mod risk;
pub mod session;
pub mod taxonomy;
