/// MCP Tool handlers for contract-rag.
///
/// 1. index_contract    – build or reuse the index for a contract
/// 2. analyze_contract  – clause extraction and risk rating report
/// 3. query_contract    – grounded answer to one question
/// 4. list_clause_types – configured clause taxonomy
/// 5. list_indexes      – stored namespaces, optionally deleting one
use crate::error::AuditError;
use crate::mcp::server::McpContext;
use crate::retriever::StrategyKind;
use crate::session::{AnalyzeOptions, Session};
use rmcp::handler::server::ServerHandler;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{ErrorData as McpError, handler::server::tool::ToolRouter, model::*, tool, tool_router};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

// ── Parameter structs ────────────────────────────────────────────────

#[derive(Deserialize, JsonSchema)]
struct IndexParams {
    /// Path to the contract (.pdf or .txt)
    path: String,
    /// Rebuild even if an index for this contract exists (default: false)
    rebuild: Option<bool>,
}

#[derive(Deserialize, JsonSchema)]
struct AnalyzeParams {
    /// Path to the contract (.pdf or .txt)
    path: String,
    /// Suggest revisions for HIGH-risk clauses (default: false)
    redline: Option<bool>,
    /// Also answer the standard contract questions (default: false)
    qa: Option<bool>,
    /// Rebuild the index first (default: false)
    rebuild: Option<bool>,
}

#[derive(Deserialize, JsonSchema)]
struct QueryParams {
    /// Path to the contract (.pdf or .txt)
    path: String,
    /// Question about the contract
    question: String,
    /// Retrieval strategy: similarity | diverse | reranked
    strategy: Option<String>,
    /// Rebuild the index first (default: false)
    rebuild: Option<bool>,
}

#[derive(Deserialize, JsonSchema)]
struct ListIndexesParams {
    /// Namespace to delete before listing
    delete: Option<String>,
}

#[derive(Serialize)]
struct ClauseTypeInfo<'a> {
    name: &'a str,
    high_risk_keywords: &'a [String],
    low_risk_keywords: &'a [String],
}

// ── Response helpers ─────────────────────────────────────────────────

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(format!("serialization failed: {e}"), None))?;
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

fn error_result(msg: &str) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::error(vec![Content::text(msg.to_string())]))
}

/// Caller mistakes come back as tool errors; everything else is internal.
fn audit_result<T: Serialize>(
    tool: &str,
    outcome: Result<T, AuditError>,
) -> Result<CallToolResult, McpError> {
    match outcome {
        Ok(value) => json_result(&value),
        Err(
            e @ (AuditError::Input(_)
            | AuditError::StaleIndex { .. }
            | AuditError::IndexMismatch { .. }
            | AuditError::IndexNotBuilt(_)),
        ) => {
            warn!("{tool}: {e}");
            error_result(&e.to_string())
        }
        Err(e) => Err(McpError::internal_error(format!("{tool} failed: {e}"), None)),
    }
}

// ── Tool implementations ─────────────────────────────────────────────

#[derive(Clone)]
pub struct AppTools {
    pub ctx: McpContext,
    pub tool_router: ToolRouter<Self>,
}

impl ServerHandler for AppTools {}

impl AppTools {
    /// Run `work` against the session on the blocking pool while holding the
    /// session lock.
    async fn with_session<T, F>(&self, work: F) -> Result<T, McpError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Session) -> T + Send + 'static,
    {
        let mut session = self.ctx.session.clone().lock_owned().await;
        tokio::task::spawn_blocking(move || work(&mut session))
            .await
            .map_err(|e| McpError::internal_error(format!("worker panicked: {e}"), None))
    }
}

#[tool_router]
impl AppTools {
    pub fn new(ctx: McpContext) -> Self {
        Self {
            ctx,
            tool_router: Self::tool_router(),
        }
    }

    // ── Tool 1: index_contract ──────────────────────────────────────

    #[tool(
        description = "Index a contract (.pdf or .txt) for analysis. Reuses an existing index for the same document unless rebuild is set; an index built from a different document must be rebuilt."
    )]
    async fn index_contract(
        &self,
        params: Parameters<IndexParams>,
    ) -> Result<CallToolResult, McpError> {
        let p = params.0;
        if p.path.is_empty() {
            return error_result("path is required");
        }

        let path = PathBuf::from(p.path);
        let rebuild = p.rebuild.unwrap_or(false);
        let outcome = self
            .with_session(move |session| session.index_contract(&path, rebuild))
            .await?;
        if let Ok(summary) = &outcome {
            info!("Indexed {} ({} chunks)", summary.source, summary.chunks);
        }
        audit_result("index_contract", outcome)
    }

    // ── Tool 2: analyze_contract ────────────────────────────────────

    #[tool(
        description = "Extract each configured clause type from a contract, summarize it, rate its risk (HIGH/MEDIUM/LOW) and cite the pages it came from. Returns the full JSON report."
    )]
    async fn analyze_contract(
        &self,
        params: Parameters<AnalyzeParams>,
    ) -> Result<CallToolResult, McpError> {
        let p = params.0;
        if p.path.is_empty() {
            return error_result("path is required");
        }

        let path = PathBuf::from(p.path);
        let options = AnalyzeOptions {
            redline: p.redline.unwrap_or(false),
            qa: p.qa.unwrap_or(false),
            rebuild: p.rebuild.unwrap_or(false),
        };
        let outcome = self
            .with_session(move |session| session.analyze(&path, options))
            .await?;
        audit_result("analyze_contract", outcome)
    }

    // ── Tool 3: query_contract ──────────────────────────────────────

    #[tool(
        description = "Answer a question about a contract using only retrieved passages. Returns the answer, cited sources and a confidence label (high/medium/none)."
    )]
    async fn query_contract(
        &self,
        params: Parameters<QueryParams>,
    ) -> Result<CallToolResult, McpError> {
        let p = params.0;
        if p.path.is_empty() {
            return error_result("path is required");
        }
        if p.question.trim().is_empty() {
            return error_result("question is required");
        }

        let strategy = match p.strategy.as_deref() {
            None | Some("") => None,
            Some(s) => match s.parse::<StrategyKind>() {
                Ok(kind) => Some(kind),
                Err(e) => return error_result(&e),
            },
        };

        let path = PathBuf::from(p.path);
        let rebuild = p.rebuild.unwrap_or(false);
        let question = p.question;
        let outcome = self
            .with_session(move |session| session.query(&path, &question, strategy, rebuild))
            .await?;
        audit_result("query_contract", outcome)
    }

    // ── Tool 4: list_clause_types ───────────────────────────────────

    #[tool(description = "List the clause types analyzed, with their risk keywords")]
    async fn list_clause_types(&self) -> Result<CallToolResult, McpError> {
        let clauses: Vec<ClauseTypeInfo<'_>> = self
            .ctx
            .config
            .clauses
            .iter()
            .map(|c| ClauseTypeInfo {
                name: &c.name,
                high_risk_keywords: &c.high_risk_keywords,
                low_risk_keywords: &c.low_risk_keywords,
            })
            .collect();
        json_result(&serde_json::json!({ "clause_types": clauses }))
    }

    // ── Tool 5: list_indexes ────────────────────────────────────────

    #[tool(
        description = "List the contract indexes in the database: namespace, source document, embedding model, chunking, chunk count and build time. Set delete to remove a namespace first."
    )]
    async fn list_indexes(
        &self,
        params: Parameters<ListIndexesParams>,
    ) -> Result<CallToolResult, McpError> {
        let delete = params.0.delete.filter(|ns| !ns.trim().is_empty());
        let outcome = self
            .with_session(move |session| {
                let deleted = match &delete {
                    Some(ns) => Some(session.delete_index(ns)?),
                    None => None,
                };
                let indexes = session.list_indexes()?;
                Ok::<_, AuditError>(serde_json::json!({
                    "deleted": deleted,
                    "indexes": indexes,
                }))
            })
            .await?;
        audit_result("list_indexes", outcome)
    }
}
