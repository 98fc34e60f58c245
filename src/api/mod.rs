pub mod client;

pub use client::HttpClient;

#[cfg(test)]
use mockall::automock;

use crate::config::ApiConfig;
use crate::models::{
    Application, ApplicationPayload, DatabaseStatus, InitializeResponse, LoginRequest,
    RegisterRequest, Token, User, UserCreate, UserList, UserUpdate,
};
use async_trait::async_trait;
use eyre::Result;
use futures::stream::BoxStream;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Raw body of a chat response, in arrival order.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, std::io::Error>>;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChatRequest {
    pub query: String,
    /// Remote session to resume. Only sent once the conversation has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

/// Non-2xx answer from the backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("request failed ({http_code}): {detail}")]
pub struct ApiError {
    pub http_code: u16,
    pub detail: String,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Api {
    async fn login(&self, req: LoginRequest) -> Result<Token>;
    async fn register(&self, req: RegisterRequest) -> Result<User>;
    async fn me(&self) -> Result<User>;

    async fn database_status(&self) -> Result<DatabaseStatus>;
    async fn initialize_database(&self) -> Result<InitializeResponse>;

    async fn list_apps(&self) -> Result<Vec<Application>>;
    async fn create_app(&self, app: ApplicationPayload) -> Result<Application>;
    async fn update_app(&self, id: i64, app: ApplicationPayload) -> Result<Application>;
    async fn delete_app(&self, id: i64) -> Result<()>;

    async fn list_users(&self, page: u32, size: u32) -> Result<UserList>;
    async fn get_user(&self, id: i64) -> Result<User>;
    async fn create_user(&self, user: UserCreate) -> Result<User>;
    async fn update_user(&self, id: i64, user: UserUpdate) -> Result<User>;
    async fn delete_user(&self, id: i64) -> Result<()>;

    async fn chat_stream(&self, app_id: i64, req: ChatRequest) -> Result<ByteStream>;
}

pub type ArcApi = Arc<dyn Api + Send + Sync>;

pub fn new_client(config: &ApiConfig, token: Option<Token>) -> ArcApi {
    let mut client = HttpClient::new(&config.endpoint);
    if let Some(timeout) = config.timeout() {
        client = client.with_timeout(timeout);
    }
    if let Some(token) = token {
        client = client.with_token(token);
    }
    Arc::new(client)
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        self.http_code == 401
    }
}

/// Whether any error in the chain is a 401 from the backend.
pub fn is_unauthorized(err: &eyre::Report) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<ApiError>())
        .any(ApiError::is_unauthorized)
}
