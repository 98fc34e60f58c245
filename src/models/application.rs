use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

use super::validation::{self, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppType {
    Workflow,
    Chatflow,
    Chatbot,
    Agent,
    TextGenerator,
}

/// A workflow application registered in the backend. Chat turns are routed
/// to one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: i64,
    pub name: String,
    pub app_type: AppType,
    pub api_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplicationPayload {
    pub name: String,
    pub app_type: AppType,
    pub api_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_active: bool,
}

impl ApplicationPayload {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::require("name", &self.name)?;
        validation::http_url("api_url", &self.api_url)?;
        if let Some(key) = &self.api_key {
            validation::require("api_key", key)?;
        }
        Ok(())
    }

    /// Start an update from the stored values. The api key is never echoed
    /// back so it is left unset.
    pub fn from_application(app: &Application) -> Self {
        Self {
            name: app.name.clone(),
            app_type: app.app_type,
            api_url: app.api_url.clone(),
            api_key: None,
            description: app.description.clone(),
            is_active: app.is_active,
        }
    }
}

impl FromStr for AppType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "workflow" => Ok(AppType::Workflow),
            "chatflow" => Ok(AppType::Chatflow),
            "chatbot" => Ok(AppType::Chatbot),
            "agent" => Ok(AppType::Agent),
            "text_generator" => Ok(AppType::TextGenerator),
            _ => Err(ValidationError::new(
                "app_type",
                format!("unknown application type {}", s),
            )),
        }
    }
}

impl Display for AppType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppType::Workflow => write!(f, "workflow"),
            AppType::Chatflow => write!(f, "chatflow"),
            AppType::Chatbot => write!(f, "chatbot"),
            AppType::Agent => write!(f, "agent"),
            AppType::TextGenerator => write!(f, "text_generator"),
        }
    }
}

impl Display for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.app_type)
    }
}
