//! Tool registration and invocation

use std::{collections::HashMap, future::Future, panic::AssertUnwindSafe, sync::Arc};

use futures::{future::BoxFuture, FutureExt};
use rust_mcp_sdk::schema::{Tool, ToolInputSchema};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::session::{SessionData, SessionStore, StoreError};

pub mod schema;

pub use schema::{ParamType, PropertySchema, SchemaType, WireEnum};

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{0}")]
    Failed(String),
    #[error("missing required argument: {0}")]
    MissingArgument(String),
    #[error("invalid value for argument {name}: {message}")]
    InvalidArgument { name: String, message: String },
    #[error("no session is bound to this request")]
    NoSession,
    #[error("session no longer exists")]
    SessionExpired,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("tool panicked: {0}")]
    Panicked(String),
}

impl ToolError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("a tool named {0} is already registered")]
    DuplicateTool(String),
    #[error("tool {tool} declares parameter {param} more than once")]
    DuplicateParameter { tool: String, param: String },
}

#[derive(Debug, Clone, Default)]
pub struct ToolArguments(Map<String, Value>);

impl ToolArguments {
    pub fn new(arguments: Map<String, Value>) -> Self {
        Self(arguments)
    }

    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn value<T: DeserializeOwned>(&self, name: &str) -> Result<T, ToolError> {
        let raw = self
            .0
            .get(name)
            .ok_or_else(|| ToolError::MissingArgument(name.to_string()))?;
        serde_json::from_value(raw.clone()).map_err(|err| ToolError::InvalidArgument {
            name: name.to_string(),
            message: err.to_string(),
        })
    }

    pub fn enum_value<E: WireEnum>(&self, name: &str) -> Result<E, ToolError> {
        let wire: String = self.value(name)?;
        E::from_wire(&wire).ok_or_else(|| ToolError::InvalidArgument {
            name: name.to_string(),
            message: format!("expected one of: {}", E::wire_values().join(", ")),
        })
    }
}

#[derive(Clone)]
pub struct ToolContext {
    session_id: Option<String>,
    store: Arc<dyn SessionStore>,
}

impl ToolContext {
    pub fn new(session_id: Option<String>, store: Arc<dyn SessionStore>) -> Self {
        Self { session_id, store }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub async fn session_data(&self) -> Result<SessionData, ToolError> {
        let Some(session_id) = self.session_id.as_deref() else {
            return Ok(SessionData::new());
        };
        self.store
            .get(session_id)
            .await?
            .ok_or(ToolError::SessionExpired)
    }

    pub async fn update_session_data(&self, data: SessionData) -> Result<(), ToolError> {
        let session_id = self.session_id.as_deref().ok_or(ToolError::NoSession)?;
        if self.store.update(session_id, data).await? {
            Ok(())
        } else {
            Err(ToolError::SessionExpired)
        }
    }
}

pub type ToolResult = Result<Value, ToolError>;
pub type ToolHandler =
    Arc<dyn Fn(ToolArguments, ToolContext) -> BoxFuture<'static, ToolResult> + Send + Sync>;

#[derive(Debug)]
pub enum ToolCallOutcome {
    Completed(String),
    Failed(ToolError),
}

#[derive(Clone)]
pub struct RegisteredTool {
    tool: Tool,
    params: Vec<(String, PropertySchema)>,
    duplicate_param: Option<String>,
    handler: ToolHandler,
}

impl RegisteredTool {
    pub fn tool(&self) -> &Tool {
        &self.tool
    }

    pub fn name(&self) -> &str {
        &self.tool.name
    }

    pub fn params(&self) -> impl Iterator<Item = (&str, &PropertySchema)> {
        self.params
            .iter()
            .map(|(name, property)| (name.as_str(), property))
    }

    pub fn param(&self, name: &str) -> Option<&PropertySchema> {
        self.params()
            .find(|(param, _)| *param == name)
            .map(|(_, property)| property)
    }

    pub fn bind_arguments(&self, arguments: Map<String, Value>) -> Result<ToolArguments, ToolError> {
        for (name, property) in self.params() {
            let (Some(allowed), Some(value)) = (property.enum_values.as_ref(), arguments.get(name))
            else {
                continue;
            };
            let known = value
                .as_str()
                .is_some_and(|wire| allowed.iter().any(|variant| variant == wire));
            if !known {
                return Err(ToolError::InvalidArgument {
                    name: name.to_string(),
                    message: format!("expected one of: {}", allowed.join(", ")),
                });
            }
        }
        Ok(ToolArguments::new(arguments))
    }

    pub async fn invoke(&self, arguments: ToolArguments, context: ToolContext) -> ToolCallOutcome {
        let call = async { (self.handler)(arguments, context).await };
        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(Ok(Value::String(text))) => ToolCallOutcome::Completed(text),
            Ok(Ok(value)) => ToolCallOutcome::Completed(value.to_string()),
            Ok(Err(err)) => ToolCallOutcome::Failed(err),
            Err(panic) => ToolCallOutcome::Failed(ToolError::Panicked(panic_message(panic.as_ref()))),
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Declares one tool.
///
/// ```
/// use serde_json::json;
/// use serverless_mcp::tools::ToolBuilder;
///
/// let tool = ToolBuilder::new("add_numbers")
///     .doc("Add two numbers.\n\nArgs:\n    a: first addend\n    b: second addend\n")
///     .param::<f64>("a")
///     .param::<f64>("b")
///     .handler(|args, _ctx| async move {
///         Ok(json!(args.value::<f64>("a")? + args.value::<f64>("b")?))
///     });
/// assert_eq!(tool.name(), "addNumbers");
/// ```
pub struct ToolBuilder {
    identifier: String,
    doc: String,
    params: Vec<(String, PropertySchema)>,
    duplicate_param: Option<String>,
}

impl ToolBuilder {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            doc: String::new(),
            params: Vec::new(),
            duplicate_param: None,
        }
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    pub fn param<T: ParamType>(self, name: impl Into<String>) -> Self {
        self.declare(name.into(), PropertySchema::of(T::schema_type()))
    }

    pub fn enum_param<E: WireEnum>(self, name: impl Into<String>) -> Self {
        let schema = PropertySchema {
            enum_values: Some(E::wire_values()),
            ..PropertySchema::of(SchemaType::String)
        };
        self.declare(name.into(), schema)
    }

    fn declare(mut self, name: String, schema: PropertySchema) -> Self {
        if self.params.iter().any(|(declared, _)| *declared == name) {
            self.duplicate_param.get_or_insert(name);
        } else {
            self.params.push((name, schema));
        }
        self
    }

    pub fn handler<F, Fut>(self, handler: F) -> RegisteredTool
    where
        F: Fn(ToolArguments, ToolContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult> + Send + 'static,
    {
        let mut descriptions = schema::argument_descriptions(&self.doc);
        let mut params = self.params;
        for (name, property) in &mut params {
            property.description = descriptions.remove(name.as_str());
        }

        let required = params.iter().map(|(name, _)| name.clone()).collect();
        let properties = params
            .iter()
            .map(|(name, property)| (name.clone(), property.to_json_map()))
            .collect();
        let summary = schema::summary(&self.doc);

        RegisteredTool {
            tool: Tool {
                annotations: None,
                description: Some(summary),
                execution: None,
                icons: Vec::new(),
                input_schema: ToolInputSchema::new(required, Some(properties), None),
                meta: None,
                name: schema::tool_name(&self.identifier),
                output_schema: None,
                title: None,
            },
            params,
            duplicate_param: self.duplicate_param,
            handler: Arc::new(move |arguments: ToolArguments, context: ToolContext| {
                handler(arguments, context).boxed()
            }),
        }
    }
}

#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: RegisteredTool) -> Result<(), RegistryError> {
        if let Some(param) = &tool.duplicate_param {
            return Err(RegistryError::DuplicateParameter {
                tool: tool.name().to_string(),
                param: param.clone(),
            });
        }
        if self.by_name.contains_key(tool.name()) {
            return Err(RegistryError::DuplicateTool(tool.name().to_string()));
        }
        self.by_name.insert(tool.name().to_string(), self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.by_name.get(name).map(|index| &self.tools[*index])
    }

    pub fn list(&self) -> Vec<Tool> {
        self.tools.iter().map(|tool| tool.tool.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
