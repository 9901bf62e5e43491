use std::path::Path;
use std::time::Duration;

use log::debug;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use gridstore_core::models::{Grid, Page, Record, UploadReport, User};

use crate::controller::FilterState;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {message}")]
    Api { status: StatusCode, message: String },
    #[error("not logged in")]
    NotAuthenticated,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("export failed: {0}")]
    Export(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Deserialize)]
struct AuthResponse {
    user: User,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// HTTP client for the grid API. Holds the bearer token issued at login;
/// all data and grid calls require one.
pub struct GridClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl GridClient {
    pub fn new(base_url: impl Into<String>) -> Result<GridClient> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(GridClient {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.token.as_ref().ok_or(ClientError::NotAuthenticated)?;
        Ok(builder.bearer_auth(token))
    }

    pub fn is_logged_in(&self) -> bool {
        self.token.is_some()
    }

    pub async fn register(
        &mut self,
        name: &str,
        email: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<User> {
        let response = self
            .http
            .post(self.url("/api/auth/register"))
            .json(&json!({
                "name": name,
                "email": email,
                "password": password,
                "confirmPassword": confirm_password,
            }))
            .send()
            .await?;

        let auth: AuthResponse = decode(response).await?;
        self.token = Some(auth.token);
        Ok(auth.user)
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<User> {
        let response = self
            .http
            .post(self.url("/api/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        let auth: AuthResponse = decode(response).await?;
        debug!("logged in as {}", auth.user.email);
        self.token = Some(auth.token);
        Ok(auth.user)
    }

    pub async fn logout(&mut self) -> Result<()> {
        let request = self.authorized(self.http.post(self.url("/api/auth/logout")))?;
        let response = request.send().await?;
        decode::<serde_json::Value>(response).await?;
        self.token = None;
        Ok(())
    }

    /// Fetch the page described by the current filter state.
    pub async fn fetch_page(&self, state: &FilterState) -> Result<Page<Record>> {
        let request = self
            .authorized(self.http.get(self.url("/api/data")))?
            .query(&state.query_params());
        decode(request.send().await?).await
    }

    pub async fn get_record(&self, id: &str) -> Result<Record> {
        let request = self.authorized(self.http.get(self.url(&format!("/api/data/{}", id))))?;
        decode(request.send().await?).await
    }

    pub async fn delete_record(&self, id: &str) -> Result<()> {
        let request =
            self.authorized(self.http.delete(self.url(&format!("/api/data/{}", id))))?;
        decode::<serde_json::Value>(request.send().await?).await?;
        Ok(())
    }

    /// Upload a CSV into an optional existing grid.
    pub async fn upload_csv(&self, path: &Path, grid_id: Option<&str>) -> Result<UploadReport> {
        let mut form = Form::new().part("csvFile", file_part(path).await?);
        if let Some(grid_id) = grid_id {
            form = form.text("gridId", grid_id.to_string());
        }

        let request = self
            .authorized(self.http.post(self.url("/api/data/upload")))?
            .multipart(form);
        decode(request.send().await?).await
    }

    pub async fn list_grids(&self) -> Result<Vec<Grid>> {
        let request = self.authorized(self.http.get(self.url("/api/grids")))?;
        decode(request.send().await?).await
    }

    pub async fn get_grid(&self, id: &str) -> Result<Grid> {
        let request = self.authorized(self.http.get(self.url(&format!("/api/grids/{}", id))))?;
        decode(request.send().await?).await
    }

    /// Create a named grid from a CSV, or replace an existing one's contents
    /// when `existing_grid_id` and `is_replacement` are given.
    pub async fn create_grid(
        &self,
        name: &str,
        path: &Path,
        existing_grid_id: Option<&str>,
        is_replacement: bool,
    ) -> Result<serde_json::Value> {
        let mut form = Form::new()
            .text("name", name.to_string())
            .part("csvFile", file_part(path).await?);
        if let Some(grid_id) = existing_grid_id {
            form = form.text("gridId", grid_id.to_string());
        }
        if is_replacement {
            form = form.text("isReplacement", "true");
        }

        let request = self
            .authorized(self.http.post(self.url("/api/grids/create")))?
            .multipart(form);
        decode(request.send().await?).await
    }

    pub async fn rename_grid(&self, id: &str, name: &str) -> Result<()> {
        let request = self
            .authorized(self.http.put(self.url(&format!("/api/grids/{}", id))))?
            .json(&json!({ "name": name }));
        decode::<serde_json::Value>(request.send().await?).await?;
        Ok(())
    }

    pub async fn delete_grid(&self, id: &str) -> Result<()> {
        let request =
            self.authorized(self.http.delete(self.url(&format!("/api/grids/{}", id))))?;
        decode::<serde_json::Value>(request.send().await?).await?;
        Ok(())
    }
}

async fn file_part(path: &Path) -> Result<Part> {
    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload.csv".to_string());
    Ok(Part::bytes(bytes).file_name(file_name))
}

/// Decode a success body, or surface the server's `{ error }` message with
/// its status code.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.error)
        .unwrap_or_else(|| status.to_string());

    Err(ClientError::Api { status, message })
}
