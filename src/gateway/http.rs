//! HTTP/JSON implementation of the backend gateway

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::BackendGateway;
use crate::config::BackendConfig;
use crate::model::{Agent, AgentDraft, AgentPatch, Message, MessagePair, Session, SessionDraft};
use crate::voice::AudioPayload;
use crate::{Error, Result};

/// Multipart field carrying the recording
const VOICE_FIELD: &str = "audio";

/// Gateway talking to the backend over HTTP
#[derive(Debug, Clone)]
pub struct HttpGateway {
    /// HTTP client
    client: Client,
    /// Base URL including the API prefix, without trailing slash
    api_url: String,
    /// Optional bearer token
    api_key: Option<String>,
}

/// Session as returned by the backend; create and list responses may omit
/// the owning agent
#[derive(Debug, Deserialize)]
struct SessionRecord {
    id: String,
    #[serde(default)]
    agent_id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    created_at: DateTime<Utc>,
}

impl SessionRecord {
    fn into_session(self, scope_agent_id: &str) -> Session {
        Session {
            id: self.id,
            agent_id: self.agent_id.unwrap_or_else(|| scope_agent_id.to_string()),
            title: self.title,
            created_at: self.created_at,
        }
    }
}

impl HttpGateway {
    /// Create a gateway from backend configuration
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;

        let prefix = config.api_prefix.trim_matches('/');
        let base = config.base_url.trim_end_matches('/');
        let api_url = if prefix.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{prefix}")
        };

        Ok(Self {
            client,
            api_url,
            api_key: config.api_key.clone(),
        })
    }

    /// Full URL for an API path
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_url)
    }

    /// Build a request with auth applied
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut req = self.client.request(method, self.url(path));

        if let Some(ref key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }

        req
    }

    /// Send a request and fail on non-2xx
    async fn execute(&self, req: RequestBuilder) -> Result<Response> {
        let response = req.send().await.map_err(|e| {
            tracing::error!(error = %e, "backend request failed");
            e
        })?;

        let status = response.status();
        tracing::debug!(status = %status, url = %response.url(), "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "backend error");
            return Err(Error::Backend {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    /// Decode a JSON body; 204 or an empty body is `None`
    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<Option<T>> {
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let bytes = response.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Ids are percent-encoded so each stays a single path segment
    fn agent_path(agent_id: &str) -> String {
        format!("/agents/{}", urlencoding::encode(agent_id))
    }

    fn sessions_path(agent_id: &str) -> String {
        format!("{}/sessions", Self::agent_path(agent_id))
    }

    fn session_path(agent_id: &str, session_id: &str) -> String {
        format!(
            "{}/{}",
            Self::sessions_path(agent_id),
            urlencoding::encode(session_id)
        )
    }
}

#[async_trait]
impl BackendGateway for HttpGateway {
    async fn list_agents(&self) -> Result<Vec<Agent>> {
        let response = self.execute(self.request(Method::GET, "/agents")).await?;
        Ok(Self::read_json(response).await?.unwrap_or_default())
    }

    async fn get_agent(&self, agent_id: &str) -> Result<Agent> {
        let path = Self::agent_path(agent_id);
        let response = self.execute(self.request(Method::GET, &path)).await?;
        Self::read_json(response).await?.ok_or_else(|| Error::Backend {
            status: StatusCode::NO_CONTENT.as_u16(),
            body: format!("agent {agent_id} returned no body"),
        })
    }

    async fn create_agent(&self, draft: &AgentDraft) -> Result<Option<Agent>> {
        let req = self.request(Method::POST, "/agents").json(draft);
        let response = self.execute(req).await?;
        Self::read_json(response).await
    }

    async fn update_agent(&self, agent_id: &str, patch: &AgentPatch) -> Result<Option<Agent>> {
        let path = Self::agent_path(agent_id);
        let response = self.execute(self.request(Method::PUT, &path).json(patch)).await?;
        Self::read_json(response).await
    }

    async fn delete_agent(&self, agent_id: &str) -> Result<()> {
        let path = Self::agent_path(agent_id);
        self.execute(self.request(Method::DELETE, &path)).await?;
        Ok(())
    }

    async fn list_sessions(&self, agent_id: &str) -> Result<Vec<Session>> {
        let response = self
            .execute(self.request(Method::GET, &Self::sessions_path(agent_id)))
            .await?;
        let records: Vec<SessionRecord> = Self::read_json(response).await?.unwrap_or_default();
        Ok(records
            .into_iter()
            .map(|r| r.into_session(agent_id))
            .collect())
    }

    async fn create_session(&self, agent_id: &str, draft: &SessionDraft) -> Result<Option<Session>> {
        let req = self
            .request(Method::POST, &Self::sessions_path(agent_id))
            .json(draft);
        let response = self.execute(req).await?;
        let record: Option<SessionRecord> = Self::read_json(response).await?;
        Ok(record.map(|r| r.into_session(agent_id)))
    }

    async fn delete_session(&self, agent_id: &str, session_id: &str) -> Result<()> {
        self.execute(self.request(Method::DELETE, &Self::session_path(agent_id, session_id)))
            .await?;
        Ok(())
    }

    async fn list_messages(&self, agent_id: &str, session_id: &str) -> Result<Vec<Message>> {
        let path = format!("{}/messages", Self::session_path(agent_id, session_id));
        let response = self.execute(self.request(Method::GET, &path)).await?;
        Ok(Self::read_json(response).await?.unwrap_or_default())
    }

    async fn send_message(
        &self,
        agent_id: &str,
        session_id: &str,
        content: &str,
    ) -> Result<Option<MessagePair>> {
        let path = format!("{}/messages", Self::session_path(agent_id, session_id));
        let body = serde_json::json!({ "content": content });
        let response = self.execute(self.request(Method::POST, &path).json(&body)).await?;
        Self::read_json(response).await
    }

    async fn send_voice(
        &self,
        agent_id: &str,
        session_id: &str,
        payload: AudioPayload,
    ) -> Result<Option<MessagePair>> {
        tracing::debug!(
            bytes = payload.len(),
            mime_type = payload.mime_type(),
            "uploading voice message"
        );

        let file_name = payload.file_name();
        let mime_type = payload.mime_type();
        let part = reqwest::multipart::Part::bytes(payload.data)
            .file_name(file_name)
            .mime_str(mime_type)
            .map_err(|e| Error::Audio(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part(VOICE_FIELD, part);

        let path = format!("{}/voice", Self::session_path(agent_id, session_id));
        let response = self
            .execute(self.request(Method::POST, &path).multipart(form))
            .await?;
        Self::read_json(response).await
    }
}
