//! 工具 JSON Schema 生成（schemars）
//!
//! 参数 schema 由各工具的参数结构体派生；tool call 格式 schema 注入 broker 的 system prompt，减少 LLM 输出格式错误。

use std::collections::HashMap;

use schemars::{schema_for, JsonSchema};
use serde_json::Value;

/// 单个工具调用
#[allow(dead_code)]
#[derive(JsonSchema)]
struct ToolCallEntry {
    /// 工具名，必须是 Available tools 中的一个
    name: String,
    /// 工具参数，符合该工具的 parameters schema
    arguments: HashMap<String, Value>,
}

/// 工具调用请求格式：与 broker 解析的 `{"tool_calls": [...]}` 一致（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct ToolCallFormat {
    tool_calls: Vec<ToolCallEntry>,
}

/// 参数结构体的 JSON Schema
pub fn args_schema<T: JsonSchema>() -> Value {
    serde_json::to_value(schema_for!(T)).unwrap_or_else(|_| serde_json::json!({ "type": "object" }))
}

/// 返回工具调用的 JSON Schema 字符串，可拼入 system prompt
pub fn tool_call_schema_json() -> String {
    let schema = schema_for!(ToolCallFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}
