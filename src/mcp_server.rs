use anyhow::{anyhow, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::errors::{create_error_response, EngineError};
use crate::interaction::{InteractionEngine, RuleDefinition, StoreState};
use crate::metrics::StatsCollector;
use crate::overrides::{OverrideLog, OverrideRequest};
use crate::patients::{MockPatientDirectory, PatientDirectory};
use crate::security::{RequestValidator, RequestValidatorConfig};

const RECENT_OVERRIDES_IN_REPORT: usize = 10;
const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub id: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

#[derive(Debug, Deserialize)]
struct PrescriptionArgs {
    #[serde(default)]
    history: Vec<String>,
    new_medicine: String,
}

#[derive(Debug, Deserialize)]
struct PatientArgs {
    abha_id: String,
}

#[derive(Debug, Deserialize)]
struct PageArgs {
    #[serde(default = "first_page")]
    page: usize,
    #[serde(default = "default_page_size")]
    per_page: usize,
}

fn first_page() -> usize {
    1
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

/// Prescription safety service speaking line-delimited JSON-RPC 2.0
pub struct PrismCareServer {
    config: Config,
    engine: Arc<InteractionEngine>,
    stats: StatsCollector,
    overrides: OverrideLog,
    patients: Box<dyn PatientDirectory>,
    request_validator: RequestValidator,
}

impl PrismCareServer {
    /// Build the server from configuration: engine, rule catalogue and, when
    /// persistence is enabled, the statistics and override files
    pub async fn new(config: Config) -> Result<Self> {
        info!("{}", config.summary());

        let engine: InteractionEngine = InteractionEngine::new(config.embedding())?;
        let outcome = engine.load_rules(config.load_rule_file()?).await?;
        info!("Rule store ready: {:?}", outcome);

        let (stats, overrides) = if config.storage.persist {
            (
                StatsCollector::open(PathBuf::from(&config.storage.stats_path)).await?,
                OverrideLog::open(PathBuf::from(&config.storage.overrides_path)).await?,
            )
        } else {
            (StatsCollector::in_memory(), OverrideLog::in_memory())
        };

        Ok(Self::with_components(
            config,
            Arc::new(engine),
            stats,
            overrides,
            Box::new(MockPatientDirectory::with_sample_patients()),
        ))
    }

    pub fn with_components(
        config: Config,
        engine: Arc<InteractionEngine>,
        stats: StatsCollector,
        overrides: OverrideLog,
        patients: Box<dyn PatientDirectory>,
    ) -> Self {
        let request_validator = RequestValidator::new(RequestValidatorConfig::from(&config.limits));
        Self {
            config,
            engine,
            stats,
            overrides,
            patients,
            request_validator,
        }
    }

    pub fn engine(&self) -> &Arc<InteractionEngine> {
        &self.engine
    }

    /// Serve requests from stdin until it closes
    pub async fn run(&self) -> Result<()> {
        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut lines = BufReader::new(stdin).lines();

        info!("{} ready on stdio", self.config.server.name);

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let response = match serde_json::from_str::<JsonRpcRequest>(line) {
                Ok(request) => {
                    if request.id.is_none() && request.method.starts_with("notifications/") {
                        debug!("Notification received: {}", request.method);
                        continue;
                    }
                    self.handle_request(request).await
                }
                Err(e) => {
                    warn!("Unparseable request: {}", e);
                    self.error_response(-32700, &format!("Parse error: {}", e), None)
                }
            };

            let mut payload = serde_json::to_string(&response)?;
            payload.push('\n');
            stdout.write_all(payload.as_bytes()).await?;
            stdout.flush().await?;
        }

        info!("stdin closed, shutting down");
        Ok(())
    }

    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        if request.jsonrpc != "2.0" {
            return self.error_response(
                -32600,
                &format!("Invalid JSON-RPC version: expected 2.0, got {}", request.jsonrpc),
                request.id,
            );
        }

        debug!("Handling request: {}", request.method);

        match request.method.as_str() {
            "initialize" => self.success_response(
                json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": { "tools": {} },
                    "serverInfo": {
                        "name": self.config.server.name,
                        "version": self.config.server.version
                    }
                }),
                request.id,
            ),

            "ping" => self.success_response(json!({}), request.id),

            "tools/list" => {
                let mut tools: Vec<Value> = self
                    .get_tool_definitions()
                    .into_iter()
                    .map(|(name, tool)| {
                        json!({
                            "name": name,
                            "description": tool.description,
                            "inputSchema": tool.input_schema
                        })
                    })
                    .collect();
                tools.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));
                self.success_response(json!({ "tools": tools }), request.id)
            }

            "tools/call" => self.handle_tool_call(request.params, request.id).await,

            other => self.error_response(-32601, &format!("Method not found: {}", other), request.id),
        }
    }

    async fn handle_tool_call(&self, params: Option<Value>, id: Option<Value>) -> JsonRpcResponse {
        let params = params.unwrap_or_default();
        let Some(name) = params.get("name").and_then(|v| v.as_str()) else {
            return self.error_response(-32602, "Missing required parameter: name", id);
        };
        if !self.get_tool_definitions().contains_key(name) {
            return self.error_response(-32601, &format!("Unknown tool: {}", name), id);
        }

        let arguments = params
            .get("arguments")
            .cloned()
            .unwrap_or_else(|| json!({}));

        let validation = self.request_validator.validate_tool_parameters(name, &arguments);
        if !validation.valid {
            warn!("Rejected arguments for {}: {}", name, validation.error_message());
            return self.error_response(
                -32602,
                &format!("Invalid parameters: {}", validation.error_message()),
                id,
            );
        }

        match self.call_tool(name, arguments).await {
            Ok(value) => self.success_response(tool_content(&value, false), id),
            Err(e) => {
                error!("Tool {} failed: {}", name, e);
                self.success_response(tool_content(&create_error_response(&e), true), id)
            }
        }
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value> {
        match name {
            "validate_prescription" => {
                let args: PrescriptionArgs = parse_arguments(arguments)?;
                self.validate_prescription(args).await
            }

            "list_rules" => {
                let rules = self.engine.get_all_rules().await?;
                Ok(json!({ "count": rules.len(), "rules": rules }))
            }

            "add_rule" => {
                let definition: RuleDefinition = parse_arguments(arguments)?;
                let id = definition.id.clone();
                self.engine.add_rule(definition).await?;
                Ok(json!({
                    "added": id,
                    "total_rules": self.engine.rule_count().await
                }))
            }

            "patient_lookup" => {
                let args: PatientArgs = parse_arguments(arguments)?;
                let patient = self.patients.find(&args.abha_id)?;
                Ok(json!({
                    "active_medications": patient.active_medications(),
                    "patient": patient
                }))
            }

            "log_override" => {
                let mut request: OverrideRequest = parse_arguments(arguments)?;
                request.reason = self.request_validator.sanitize_string(&request.reason);
                let entry = self.overrides.append(request).await?;
                if let Err(e) = self.stats.record_override().await {
                    warn!("Failed to record override statistics: {}", e);
                }
                Ok(json!({ "success": true, "override": entry }))
            }

            "get_stats" => {
                let recent = self.overrides.recent(RECENT_OVERRIDES_IN_REPORT).await;
                Ok(serde_json::to_value(self.stats.report(recent).await)?)
            }

            "list_overrides" => {
                let args: PageArgs = parse_arguments(arguments)?;
                Ok(serde_json::to_value(self.overrides.page(args.page, args.per_page).await?)?)
            }

            "health_check" => {
                let store_state = match self.engine.store().state().await {
                    StoreState::Empty => "empty",
                    StoreState::Loaded => "loaded",
                };
                Ok(json!({
                    "status": "healthy",
                    "service": self.config.server.name,
                    "version": self.config.server.version,
                    "store_state": store_state,
                    "rules_loaded": self.engine.rule_count().await,
                    "overrides_logged": self.overrides.len().await,
                    "timestamp": Utc::now().to_rfc3339()
                }))
            }

            _ => Err(anyhow!("Unknown tool: {}", name)),
        }
    }

    async fn validate_prescription(&self, args: PrescriptionArgs) -> Result<Value> {
        let result = self.engine.analyze(&args.history, &args.new_medicine).await?;

        if let Err(e) = self.stats.record_validation(result.is_risky()).await {
            warn!("Failed to record validation statistics: {}", e);
        }

        let mut body = serde_json::to_value(&result)?;
        if let Value::Object(fields) = &mut body {
            fields.insert("timestamp".to_string(), json!(Utc::now().to_rfc3339()));
            fields.insert("medicine_checked".to_string(), json!(args.new_medicine));
            fields.insert("current_medications".to_string(), json!(args.history));
        }
        Ok(body)
    }

    fn get_tool_definitions(&self) -> HashMap<String, ToolInfo> {
        let mut tools = HashMap::new();

        tools.insert("validate_prescription".to_string(), ToolInfo {
            description: "Check a new medicine against the patient's current medications for known interactions".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "history": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Medications the patient currently takes"
                    },
                    "new_medicine": {
                        "type": "string",
                        "description": "Medicine being prescribed"
                    }
                },
                "required": ["new_medicine"]
            }),
        });

        tools.insert("list_rules".to_string(), ToolInfo {
            description: "List every interaction rule in the store".to_string(),
            input_schema: json!({ "type": "object", "properties": {} }),
        });

        tools.insert("add_rule".to_string(), ToolInfo {
            description: "Add an interaction rule; ids must be unique".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "id": { "type": "string" },
                    "interaction": {
                        "type": "string",
                        "description": "Two drug names joined by ' + '"
                    },
                    "risk_level": { "type": "string", "enum": ["Low", "Moderate", "High"] },
                    "patient_explanation": { "type": "string" },
                    "doctor_explanation": { "type": "string" },
                    "source": { "type": "string" },
                    "mechanism": { "type": "string" }
                },
                "required": ["id", "interaction", "risk_level", "patient_explanation", "doctor_explanation", "source"]
            }),
        });

        tools.insert("patient_lookup".to_string(), ToolInfo {
            description: "Fetch a patient's record and active medications by ABHA id".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "abha_id": { "type": "string", "description": "Patient ABHA id, e.g. ABHA001" }
                },
                "required": ["abha_id"]
            }),
        });

        tools.insert("log_override".to_string(), ToolInfo {
            description: "Record a doctor's decision to prescribe despite a risk alert".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "doctor_id": { "type": "string" },
                    "doctor_name": { "type": "string" },
                    "patient_id": { "type": "string" },
                    "drug": { "type": "string" },
                    "risk_level": { "type": "string" },
                    "reason": { "type": "string", "description": "Clinical justification" }
                },
                "required": ["doctor_id", "patient_id", "drug", "reason"]
            }),
        });

        tools.insert("get_stats".to_string(), ToolInfo {
            description: "Validation and override statistics with the most recent overrides".to_string(),
            input_schema: json!({ "type": "object", "properties": {} }),
        });

        tools.insert("list_overrides".to_string(), ToolInfo {
            description: "Page through the override log, oldest first".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "page": { "type": "integer", "description": "Page number, from 1 (default: 1)" },
                    "per_page": { "type": "integer", "description": "Entries per page (default: 10)" }
                }
            }),
        });

        tools.insert("health_check".to_string(), ToolInfo {
            description: "Report service health and rule store status".to_string(),
            input_schema: json!({ "type": "object", "properties": {} }),
        });

        tools
    }

    fn success_response(&self, result: Value, id: Option<Value>) -> JsonRpcResponse {
        JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    fn error_response(&self, code: i32, message: &str, id: Option<Value>) -> JsonRpcResponse {
        JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.to_string(),
                data: None,
            }),
            id,
        }
    }
}

fn parse_arguments<T: serde::de::DeserializeOwned>(arguments: Value) -> Result<T> {
    serde_json::from_value(arguments)
        .map_err(|e| anyhow::Error::new(EngineError::InvalidRequest(e.to_string())))
}

fn tool_content(value: &Value, is_error: bool) -> Value {
    let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    json!({
        "content": [{ "type": "text", "text": text }],
        "isError": is_error
    })
}
