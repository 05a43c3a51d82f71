//! REST implementation of [`ComputeBackend`] on top of a Keystone [`Session`].

use super::auth::{CloudCredentials, Session, REQUEST_TOKEN_HEADER};
use super::models::{Flavor, Image, Network, Server, ServerQuery};
use super::{CloudError, ComputeBackend};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Talks to Nova, Glance and Neutron with the token of a single [`Session`].
pub struct OpenStackClient {
    http: reqwest::Client,
    session: Session,
}

#[derive(Deserialize)]
struct ServersBody {
    servers: Vec<Server>,
}

#[derive(Deserialize)]
struct ServerBody {
    server: Server,
}

#[derive(Deserialize)]
struct ConsoleBody {
    #[serde(default)]
    output: String,
}

#[derive(Deserialize)]
struct ImagesBody {
    images: Vec<Image>,
}

#[derive(Deserialize)]
struct NetworksBody {
    networks: Vec<Network>,
}

#[derive(Deserialize)]
struct FlavorsBody {
    flavors: Vec<Flavor>,
}

impl OpenStackClient {
    /// Authenticate with `credentials` and build a client bound to the resulting session.
    pub async fn connect(credentials: &CloudCredentials) -> Result<Self, CloudError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let session = Session::authenticate(&http, credentials).await?;
        Ok(Self { http, session })
    }

    /// Wrap an already established session.
    pub fn with_session(http: reqwest::Client, session: Session) -> Self {
        Self { http, session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn compute_url(&self, path: &str) -> Result<String, CloudError> {
        Ok(format!("{}{}", self.session.endpoint("compute")?, path))
    }

    fn image_url(&self, path: &str) -> Result<String, CloudError> {
        let base = self.session.endpoint("image")?;
        let base = base.strip_suffix("/v2").unwrap_or(&base);
        Ok(format!("{}/v2{}", base, path))
    }

    fn network_url(&self, path: &str) -> Result<String, CloudError> {
        let base = self.session.endpoint("network")?;
        let base = base.strip_suffix("/v2.0").unwrap_or(&base);
        Ok(format!("{}/v2.0{}", base, path))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, CloudError> {
        log::debug!("GET {}", url);
        let response = self
            .http
            .get(url)
            .header(REQUEST_TOKEN_HEADER, self.session.token())
            .send()
            .await?;
        decode(response).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<T, CloudError> {
        log::debug!("POST {}", url);
        let response = self
            .http
            .post(url)
            .header(REQUEST_TOKEN_HEADER, self.session.token())
            .json(body)
            .send()
            .await?;
        decode(response).await
    }

    async fn find_server_by_name(&self, name: &str) -> Result<Option<Server>, CloudError> {
        let url = self.compute_url(&format!(
            "/servers/detail?name={}",
            urlencoding::encode(&format!("^{}$", regex::escape(name)))
        ))?;
        let body: ServersBody = self.get_json(&url).await?;
        Ok(body.servers.into_iter().find(|s| s.name == name))
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, CloudError> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(CloudError::Api {
            status: status.as_u16(),
            message: api_error_message(&message),
        });
    }
    Ok(response.json::<T>().await?)
}

/// Pull the human readable message out of an OpenStack error body such as
/// `{"itemNotFound": {"code": 404, "message": "..."}}`.
fn api_error_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| v.as_object())
        .and_then(|obj| {
            obj.values()
                .find_map(|inner| inner.get("message").and_then(|m| m.as_str()))
                .or_else(|| obj.get("message").and_then(|m| m.as_str()))
        })
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl ComputeBackend for OpenStackClient {
    async fn list_servers(&self, query: &ServerQuery) -> Result<Vec<Server>, CloudError> {
        let path = match &query.status {
            Some(status) => format!("/servers/detail?status={}", urlencoding::encode(status)),
            None => "/servers/detail".to_string(),
        };
        let body: ServersBody = self.get_json(&self.compute_url(&path)?).await?;
        Ok(body.servers)
    }

    async fn get_server(&self, name_or_id: &str) -> Result<Option<Server>, CloudError> {
        let url = self.compute_url(&format!("/servers/{}", urlencoding::encode(name_or_id)))?;
        match self.get_json::<ServerBody>(&url).await {
            Ok(body) => Ok(Some(body.server)),
            Err(CloudError::Api { status: 404, .. }) => self.find_server_by_name(name_or_id).await,
            Err(err) => Err(err),
        }
    }

    async fn console_output(&self, server: &Server, length: usize) -> Result<String, CloudError> {
        let url = self.compute_url(&format!("/servers/{}/action", server.id))?;
        let body = json!({"os-getConsoleOutput": {"length": length}});
        let console: ConsoleBody = self.post_json(&url, &body).await?;
        Ok(console.output)
    }

    async fn list_images(&self, public_only: bool) -> Result<Vec<Image>, CloudError> {
        let path = if public_only {
            "/images?visibility=public"
        } else {
            "/images"
        };
        let body: ImagesBody = self.get_json(&self.image_url(path)?).await?;
        Ok(body.images)
    }

    async fn list_networks(&self, external_only: bool) -> Result<Vec<Network>, CloudError> {
        let path = if external_only {
            "/networks?router%3Aexternal=true"
        } else {
            "/networks"
        };
        let body: NetworksBody = self.get_json(&self.network_url(path)?).await?;
        Ok(body.networks)
    }

    async fn list_flavors(&self, public_only: bool) -> Result<Vec<Flavor>, CloudError> {
        let path = if public_only {
            "/flavors/detail?is_public=true"
        } else {
            "/flavors/detail?is_public=None"
        };
        let body: FlavorsBody = self.get_json(&self.compute_url(path)?).await?;
        Ok(body.flavors)
    }
}
