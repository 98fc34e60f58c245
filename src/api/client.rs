#[cfg(test)]
#[path = "client_test.rs"]
mod tests;

use std::time;

use async_trait::async_trait;
use eyre::{Context, Result};
use futures::{StreamExt, TryStreamExt};
use reqwest::{Method, RequestBuilder, Response, header};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{Api, ApiError, ByteStream, ChatRequest};
use crate::config::{constants::API_PREFIX, user_agent};
use crate::models::{
    Application, ApplicationPayload, DatabaseStatus, InitializeResponse, LoginRequest,
    RegisterRequest, Token, User, UserCreate, UserList, UserUpdate,
};

/// Backend client over HTTP. Carries the access token, when there is one,
/// on every request.
pub struct HttpClient {
    endpoint: String,
    token: Option<Token>,
    timeout: Option<time::Duration>,
    http: reqwest::Client,
}

#[async_trait]
impl Api for HttpClient {
    async fn login(&self, req: LoginRequest) -> Result<Token> {
        let builder = self.request(Method::POST, "/auth/login").json(&req);
        self.send_json(builder, "login").await
    }

    async fn register(&self, req: RegisterRequest) -> Result<User> {
        let builder = self.request(Method::POST, "/auth/register").json(&req);
        self.send_json(builder, "register").await
    }

    async fn me(&self) -> Result<User> {
        let builder = self.request(Method::GET, "/auth/me");
        self.send_json(builder, "current user").await
    }

    async fn database_status(&self) -> Result<DatabaseStatus> {
        let builder = self.request(Method::GET, "/database/status");
        self.send_json(builder, "database status").await
    }

    async fn initialize_database(&self) -> Result<InitializeResponse> {
        let builder = self.request(Method::POST, "/database/initialize");
        self.send_json(builder, "database initialize").await
    }

    async fn list_apps(&self) -> Result<Vec<Application>> {
        let builder = self.request(Method::GET, "/dify-apps");
        self.send_json(builder, "list applications").await
    }

    async fn create_app(&self, app: ApplicationPayload) -> Result<Application> {
        let builder = self.request(Method::POST, "/dify-apps").json(&app);
        self.send_json(builder, "create application").await
    }

    async fn update_app(&self, id: i64, app: ApplicationPayload) -> Result<Application> {
        let builder = self
            .request(Method::PUT, &format!("/dify-apps/{}", id))
            .json(&app);
        self.send_json(builder, "update application").await
    }

    async fn delete_app(&self, id: i64) -> Result<()> {
        let builder = self.request(Method::DELETE, &format!("/dify-apps/{}", id));
        self.send(builder, "delete application").await?;
        Ok(())
    }

    async fn list_users(&self, page: u32, size: u32) -> Result<UserList> {
        let builder = self
            .request(Method::GET, "/users")
            .query(&[("page", page), ("size", size)]);
        self.send_json(builder, "list users").await
    }

    async fn get_user(&self, id: i64) -> Result<User> {
        let builder = self.request(Method::GET, &format!("/users/{}", id));
        self.send_json(builder, "get user").await
    }

    async fn create_user(&self, user: UserCreate) -> Result<User> {
        let builder = self.request(Method::POST, "/users").json(&user);
        self.send_json(builder, "create user").await
    }

    async fn update_user(&self, id: i64, user: UserUpdate) -> Result<User> {
        let builder = self
            .request(Method::PUT, &format!("/users/{}", id))
            .json(&user);
        self.send_json(builder, "update user").await
    }

    async fn delete_user(&self, id: i64) -> Result<()> {
        let builder = self.request(Method::DELETE, &format!("/users/{}", id));
        self.send(builder, "delete user").await?;
        Ok(())
    }

    async fn chat_stream(&self, app_id: i64, req: ChatRequest) -> Result<ByteStream> {
        // No total timeout here, it would cut long answers mid-stream
        let mut builder = self
            .http
            .post(self.url(&format!("/chat/app/{}", app_id)))
            .header(header::USER_AGENT, user_agent())
            .header(header::ACCEPT, "text/event-stream")
            .json(&req);
        if let Some(token) = &self.token {
            builder = builder.header(header::AUTHORIZATION, token.authorization());
        }

        log::trace!("Sending chat request to app {}: {:?}", app_id, req);

        let res = builder.send().await.wrap_err("sending chat request")?;
        let res = check_status(res).await?;

        let stream = res
            .bytes_stream()
            .map_ok(|chunk| chunk.to_vec())
            .map_err(|e| {
                let err_msg = e.to_string();
                std::io::Error::new(std::io::ErrorKind::Interrupted, err_msg)
            });
        Ok(stream.boxed())
    }
}

impl HttpClient {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token: None,
            timeout: None,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_token(mut self, token: Token) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_timeout(mut self, timeout: time::Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.endpoint, API_PREFIX, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut req = self
            .http
            .request(method, self.url(path))
            .header(header::USER_AGENT, user_agent());

        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }

        if let Some(token) = &self.token {
            req = req.header(header::AUTHORIZATION, token.authorization());
        }
        req
    }

    async fn send(&self, builder: RequestBuilder, what: &str) -> Result<Response> {
        let res = builder
            .send()
            .await
            .wrap_err(format!("sending {} request", what))?;
        check_status(res).await
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder, what: &str) -> Result<T> {
        let res = self.send(builder, what).await?;
        let body = res
            .text()
            .await
            .wrap_err(format!("reading {} response", what))?;
        log::trace!("{} response: {}", what, body);
        let value = serde_json::from_str::<T>(&body)
            .wrap_err(format!("parsing {} response: {}", what, body))?;
        Ok(value)
    }
}

async fn check_status(res: Response) -> Result<Response> {
    if res.status().is_success() {
        return Ok(res);
    }

    let http_code = res.status().as_u16();
    let body = res.text().await.unwrap_or_default();
    log::error!("Error response ({}): {}", http_code, body);
    Err(ApiError {
        http_code,
        detail: error_detail(&body),
    }
    .into())
}

/// Human readable reason from an error body: `detail`, then `message`,
/// then a generic fallback. Validation errors carry a list in `detail`.
pub(crate) fn error_detail(body: &str) -> String {
    let fallback = || "Request failed".to_string();
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return fallback();
    };

    match value.get("detail") {
        Some(Value::String(detail)) if !detail.is_empty() => return detail.clone(),
        Some(Value::Array(items)) if !items.is_empty() => {
            return items
                .iter()
                .map(|item| match item.get("msg").and_then(Value::as_str) {
                    Some(msg) => msg.to_string(),
                    None => item.to_string(),
                })
                .collect::<Vec<_>>()
                .join("; ");
        }
        _ => {}
    }

    value
        .get("message")
        .and_then(Value::as_str)
        .filter(|msg| !msg.is_empty())
        .map(str::to_string)
        .unwrap_or_else(fallback)
}
