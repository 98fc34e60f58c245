#[cfg(test)]
#[path = "database_test.rs"]
mod tests;

use serde::Deserialize;
use std::fmt::Display;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseStatus {
    pub is_initialized: bool,
    #[serde(default)]
    pub has_connection: bool,
    #[serde(default)]
    pub has_tables: bool,
    #[serde(default)]
    pub has_admin_user: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InitializeResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub admin_username: Option<String>,
    #[serde(default)]
    pub admin_password: Option<String>,
}

/// Step of the initialization wizard the backend is currently at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStep {
    Connection,
    Tables,
    AdminUser,
    Done,
}

impl DatabaseStatus {
    pub fn current_step(&self) -> InitStep {
        if self.is_initialized {
            InitStep::Done
        } else if !self.has_connection {
            InitStep::Connection
        } else if !self.has_tables {
            InitStep::Tables
        } else {
            InitStep::AdminUser
        }
    }
}

impl Display for InitStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InitStep::Connection => write!(f, "check database connection"),
            InitStep::Tables => write!(f, "create tables"),
            InitStep::AdminUser => write!(f, "create admin user"),
            InitStep::Done => write!(f, "initialized"),
        }
    }
}
