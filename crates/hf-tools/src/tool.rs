//! Core Tool trait and types

use async_trait::async_trait;
use hf_core::{BrokerConfig, Result, ToolOutput};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::schema::InputSpec;

/// Pure function of the process configuration deciding whether a tool is
/// offered. Evaluated once, when the registry is built.
pub type EnabledPredicate = fn(&BrokerConfig) -> bool;

pub fn always(_: &BrokerConfig) -> bool {
    true
}

pub fn requires_credentials(config: &BrokerConfig) -> bool {
    config.credentials_present()
}

/// Core trait for all tools
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Declared input contract, checked before `execute` is called
    fn input_spec(&self) -> InputSpec;

    /// Run the tool. `input` has already passed `input_spec` validation.
    async fn execute(&self, input: Value) -> Result<ToolOutput>;

    fn enabled_when(&self) -> EnabledPredicate {
        always
    }

    fn category(&self) -> &str {
        "general"
    }
}

/// Type alias for boxed tools
pub type BoxedTool = Arc<dyn Tool>;

/// Static description of a registered tool
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    #[serde(skip)]
    pub category: String,
    #[serde(skip)]
    pub enabled: bool,
}

/// Deserialize validated arguments into a typed struct.
///
/// A failure here means the struct and the declared spec disagree, which
/// is still reported as the caller's problem.
pub fn parse_args<T: DeserializeOwned>(input: Value) -> Result<T> {
    let input = if input.is_null() {
        Value::Object(Default::default())
    } else {
        input
    };
    serde_json::from_value(input).map_err(|e| hf_core::Error::invalid_arguments(e.to_string()))
}

type Handler = Arc<dyn Fn(Value) -> Result<ToolOutput> + Send + Sync>;

/// Closure-backed tool, handy for tests and small adapters
#[derive(Clone)]
pub struct SimpleTool {
    name: String,
    description: String,
    spec: InputSpec,
    enabled_when: EnabledPredicate,
    handler: Handler,
}

impl SimpleTool {
    pub fn new<F>(name: &str, description: &str, spec: InputSpec, handler: F) -> Self
    where
        F: Fn(Value) -> Result<ToolOutput> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            spec,
            enabled_when: always,
            handler: Arc::new(handler),
        }
    }

    pub fn gated(mut self, predicate: EnabledPredicate) -> Self {
        self.enabled_when = predicate;
        self
    }
}

#[async_trait]
impl Tool for SimpleTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_spec(&self) -> InputSpec {
        self.spec.clone()
    }

    async fn execute(&self, input: Value) -> Result<ToolOutput> {
        (self.handler)(input)
    }

    fn enabled_when(&self) -> EnabledPredicate {
        self.enabled_when
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSpec, FieldType};
    use serde::Deserialize;
    use serde_json::json;

    #[tokio::test]
    async fn test_simple_tool() {
        let tool = SimpleTool::new(
            "echo",
            "Echo input back",
            InputSpec::new().field(FieldSpec::required("msg", FieldType::String, "")),
            |input| Ok(ToolOutput::text(input["msg"].as_str().unwrap_or_default())),
        );

        assert_eq!(tool.name(), "echo");
        assert_eq!(tool.description(), "Echo input back");

        let result = tool.execute(json!({"msg": "hello"})).await.unwrap();
        assert_eq!(result.joined_text(), "hello");
    }

    #[test]
    fn test_credential_predicate() {
        let config = BrokerConfig::default();
        assert!(always(&config));
        assert!(!requires_credentials(&config));
        assert!(requires_credentials(&config.with_token("hf_abc")));
    }

    #[test]
    fn test_parse_args_defaults() {
        #[derive(Deserialize)]
        struct Args {
            query: String,
            #[serde(default = "ten")]
            limit: u64,
        }
        fn ten() -> u64 {
            10
        }

        let args: Args = parse_args(json!({"query": "bert"})).unwrap();
        assert_eq!((args.query.as_str(), args.limit), ("bert", 10));
        assert!(parse_args::<Args>(Value::Null).is_err());
    }
}
