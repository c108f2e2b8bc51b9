//! HTTP client for the Matrix client-server API.
//!
//! Only the handful of endpoints the ensurer needs: password login, the
//! room directory, room state, room creation and federation joins. The
//! rest of the protocol is deliberately out of scope.

use std::collections::HashSet;

use async_trait::async_trait;
use concord_federation::{RoomAlias, Server, ServerName};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::directory::{CreateRoomOptions, RoomDirectory};
use crate::error::{Error, Result};
use crate::power_levels::PowerLevelOverride;
use crate::types::RoomId;

/// Percent-encode the characters Matrix identifiers put in URL paths.
fn encode_path_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for c in segment.chars() {
        match c {
            '#' => out.push_str("%23"),
            '!' => out.push_str("%21"),
            ':' => out.push_str("%3A"),
            '/' => out.push_str("%2F"),
            _ => out.push(c),
        }
    }
    out
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    #[serde(rename = "type")]
    login_type: &'a str,
    user: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct DirectoryResponse {
    room_id: String,
}

#[derive(Debug, Serialize)]
struct SetAliasRequest<'a> {
    room_id: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateRoomRequest<'a> {
    room_alias_name: &'a str,
    visibility: &'a str,
    preset: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    power_level_content_override: Option<&'a PowerLevelOverride>,
}

#[derive(Debug, Deserialize)]
struct CreateRoomResponse {
    room_id: String,
}

#[derive(Debug, Deserialize)]
struct JoinResponse {
    room_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StateEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    content: Value,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    errcode: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Unauthenticated client for one server's API.
#[derive(Debug, Clone)]
pub struct MatrixClient {
    http: reqwest::Client,
    base_url: String,
    server_name: ServerName,
}

impl MatrixClient {
    /// Create a client for a known server.
    pub fn new(server: &Server) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: server.base_address.trim_end_matches('/').to_string(),
            server_name: server.name.clone(),
        }
    }

    /// Log in with a password and return an authenticated session.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session> {
        let url = format!("{}/_matrix/client/r0/login", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&LoginRequest {
                login_type: "m.login.password",
                user: username,
                password,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        let body: LoginResponse = response.json().await?;

        tracing::debug!("Logged in to {}", self.server_name);

        Ok(Session {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            server_name: self.server_name.clone(),
            access_token: body.access_token,
        })
    }
}

/// Convert a non-success response into an [`Error::Api`].
async fn api_error(response: reqwest::Response) -> Error {
    let status = response.status().as_u16();
    let body: ApiErrorBody = response.json().await.unwrap_or(ApiErrorBody {
        errcode: None,
        error: None,
    });
    Error::Api {
        status,
        errcode: body.errcode.unwrap_or_else(|| "M_UNKNOWN".to_string()),
        message: body.error.unwrap_or_else(|| "unknown error".to_string()),
    }
}

/// An authenticated session against one server.
///
/// Owned exclusively by the session manager for the lifetime of a
/// reconciliation run; re-established whenever the server set is
/// reconnected.
#[derive(Debug, Clone)]
pub struct Session {
    http: reqwest::Client,
    base_url: String,
    server_name: ServerName,
    access_token: String,
}

impl Session {
    fn endpoint(&self, path: &str) -> String {
        format!("{}/_matrix/client/r0/{}", self.base_url, path)
    }
}

#[async_trait]
impl RoomDirectory for Session {
    fn server_name(&self) -> &ServerName {
        &self.server_name
    }

    async fn resolve_alias(&self, alias: &RoomAlias) -> Result<Option<RoomId>> {
        let url = self.endpoint(&format!(
            "directory/room/{}",
            encode_path_segment(&alias.to_string())
        ));
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let err = api_error(response).await;
            if err.is_not_found() {
                tracing::debug!("Alias {} unknown on {}", alias, self.server_name);
                return Ok(None);
            }
            return Err(err);
        }
        let body: DirectoryResponse = response.json().await?;
        Ok(Some(RoomId::new(body.room_id)))
    }

    async fn room_aliases(&self, room_id: &RoomId) -> Result<HashSet<String>> {
        let url = self.endpoint(&format!(
            "rooms/{}/state",
            encode_path_segment(room_id.as_str())
        ));
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        let events: Vec<StateEvent> = response.json().await?;

        let aliases = events
            .iter()
            .filter(|event| event.event_type == "m.room.aliases")
            .filter_map(|event| event.content.get("aliases"))
            .filter_map(Value::as_array)
            .flatten()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
        Ok(aliases)
    }

    async fn create_room(
        &self,
        alias_localpart: &str,
        options: &CreateRoomOptions,
    ) -> Result<RoomId> {
        let url = self.endpoint("createRoom");
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&CreateRoomRequest {
                room_alias_name: alias_localpart,
                visibility: "public",
                preset: "public_chat",
                power_level_content_override: options.power_level_override.as_ref(),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        let body: CreateRoomResponse = response.json().await?;

        tracing::debug!(
            "Created room {} on {} with alias localpart {}",
            body.room_id,
            self.server_name,
            alias_localpart
        );
        Ok(RoomId::new(body.room_id))
    }

    async fn join_room(&self, alias: &RoomAlias) -> Result<RoomId> {
        let url = self.endpoint(&format!(
            "join/{}",
            encode_path_segment(&alias.to_string())
        ));
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        let body: JoinResponse = response.json().await?;

        // Some servers answer 200 with an empty body on a failed
        // federation join; treat that as a protocol violation.
        let room_id = body.room_id.ok_or(Error::MissingField("room_id"))?;
        Ok(RoomId::new(room_id))
    }

    async fn set_alias(&self, room_id: &RoomId, alias: &RoomAlias) -> Result<()> {
        let url = self.endpoint(&format!(
            "directory/room/{}",
            encode_path_segment(&alias.to_string())
        ));
        let response = self
            .http
            .put(&url)
            .bearer_auth(&self.access_token)
            .json(&SetAliasRequest {
                room_id: room_id.as_str(),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        Ok(())
    }

    async fn remove_alias(&self, alias: &RoomAlias) -> Result<()> {
        let url = self.endpoint(&format!(
            "directory/room/{}",
            encode_path_segment(&alias.to_string())
        ));
        let response = self
            .http
            .delete(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        Ok(())
    }
}
