use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use toolgate_core::BackendError;
use toolgate_core::auth::AuthorizationStatus;
use toolgate_core::tool::ToolSpec;

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ToolPage {
    #[serde(default)]
    pub items: Vec<ToolDefinition>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default)]
    pub qualified_name: Option<String>,
    #[serde(default)]
    pub fully_qualified_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub toolkit: Option<Toolkit>,
    #[serde(default)]
    pub input: ToolInput,
    #[serde(default)]
    pub requirements: Option<Requirements>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Toolkit {
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ToolInput {
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: Option<String>,
    pub value_schema: ValueSchema,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ValueSchema {
    pub val_type: String,
    #[serde(default)]
    pub inner_val_type: Option<String>,
    #[serde(default)]
    pub r#enum: Option<Vec<String>>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Requirements {
    #[serde(default)]
    pub authorization: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct AuthorizationResponse {
    #[serde(default)]
    pub id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ExecuteResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub output: Option<ExecuteOutput>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ExecuteOutput {
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub error: Option<ExecuteError>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ExecuteError {
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ErrorBody {
    #[serde(alias = "msg", alias = "error")]
    pub message: String,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AuthorizeRequest<'a> {
    pub tool_name: &'a str,
    pub user_id: &'a str,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExecuteRequest<'a> {
    pub tool_name: &'a str,
    pub input: &'a Value,
    pub user_id: &'a str,
}

// -----------
// Conversions
// -----------

impl ToolDefinition {
    pub fn qualified_name(&self) -> String {
        if let Some(name) = &self.qualified_name {
            return name.clone();
        }
        if let Some(toolkit) = &self.toolkit {
            return format!("{}.{}", toolkit.name, self.name);
        }
        // `Toolkit.Tool@version`
        match &self.fully_qualified_name {
            Some(name) => name.split('@').next().unwrap_or(name).to_owned(),
            None => self.name.clone(),
        }
    }

    pub fn to_spec(&self) -> ToolSpec {
        let requires_authorization = self
            .requirements
            .as_ref()
            .and_then(|r| r.authorization.as_ref())
            .is_some_and(|auth| !auth.is_null());
        ToolSpec {
            name: self.qualified_name(),
            description: self.description.clone().unwrap_or_default(),
            parameters: parameters_schema(&self.input.parameters),
            requires_authorization,
        }
    }
}

fn parameters_schema(parameters: &[Parameter]) -> Value {
    let mut properties = Map::new();
    let mut required = vec![];
    for param in parameters {
        let mut schema = type_schema(
            &param.value_schema.val_type,
            param.value_schema.inner_val_type.as_deref(),
        );
        if let Some(description) = &param.description {
            schema["description"] = json!(description);
        }
        if let Some(variants) = &param.value_schema.r#enum {
            schema["enum"] = json!(variants);
        }
        properties.insert(param.name.clone(), schema);
        if param.required {
            required.push(param.name.clone());
        }
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn type_schema(val_type: &str, inner_val_type: Option<&str>) -> Value {
    match val_type {
        "string" | "integer" | "number" | "boolean" => json!({ "type": val_type }),
        "array" => {
            let items = inner_val_type
                .map(|inner| type_schema(inner, None))
                .unwrap_or_else(|| json!({}));
            json!({ "type": "array", "items": items })
        }
        // `json` and anything unknown.
        _ => json!({ "type": "object" }),
    }
}

impl AuthorizationResponse {
    pub fn into_status(self) -> Result<AuthorizationStatus, BackendError> {
        match self.status.as_str() {
            "completed" => Ok(AuthorizationStatus::Completed),
            "pending" => Ok(AuthorizationStatus::Pending { url: self.url }),
            status => Err(BackendError::rejected(format!(
                "authorization {} is {status}",
                self.id.as_deref().unwrap_or("<unknown>")
            ))),
        }
    }
}

impl ExecuteResponse {
    /// Returns the output of a successful execution, or the reported
    /// failure.
    pub fn into_output(self) -> Result<String, String> {
        let output = self.output.unwrap_or_default();
        if let Some(error) = output.error {
            return Err(error.message);
        }
        if self.success == Some(false) {
            return Err("the tool reported a failure".to_owned());
        }
        Ok(match output.value {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s,
            Some(value) => value.to_string(),
        })
    }
}
