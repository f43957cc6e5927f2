//! Firestore REST client implementing the `PolicyStore` port.
//!
//! Both reads are single-document GETs; a 404 means the document does not
//! exist, which is a normal answer rather than an error.
//!
//! Requests are authorized with a fixed bearer token when one is configured,
//! otherwise with tokens minted from a service account key and refreshed
//! before they expire.

use crate::domain::config::PolicyStoreConfig;
use crate::domain::error::PolicyStoreError;
use crate::domain::types::StoreConfig;
use crate::ports::PolicyStore;
use async_trait::async_trait;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, info};

/// OAuth scope for Firestore document reads.
const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

/// How document reads are authorized.
enum Credentials {
    /// Fixed bearer token
    Static(String),
    /// Service account; tokens are cached and refreshed on expiry
    ServiceAccount(CustomServiceAccount),
    /// No Authorization header
    Anonymous,
}

impl Credentials {
    fn from_config(config: &PolicyStoreConfig) -> Result<Self, PolicyStoreError> {
        if let Some(token) = config.access_token.as_deref().filter(|t| !t.trim().is_empty()) {
            info!("Policy store using a fixed access token");
            return Ok(Credentials::Static(token.trim().to_string()));
        }

        let account = if let Some(key) = &config.service_account_key {
            CustomServiceAccount::from_json(key)
        } else if let Some(path) = &config.service_account_file {
            CustomServiceAccount::from_file(path)
        } else {
            return Ok(Credentials::Anonymous);
        };

        let account = account
            .map_err(|e| PolicyStoreError::Auth(format!("invalid service account key: {}", e)))?;
        info!("Policy store using service account credentials");
        Ok(Credentials::ServiceAccount(account))
    }

    /// Current bearer token, minting a fresh one when the cached token expired.
    async fn bearer(&self) -> Result<Option<String>, PolicyStoreError> {
        match self {
            Credentials::Static(token) => Ok(Some(token.clone())),
            Credentials::ServiceAccount(account) => {
                let token = account
                    .token(&[DATASTORE_SCOPE])
                    .await
                    .map_err(|e| PolicyStoreError::Auth(e.to_string()))?;
                Ok(Some(token.as_str().to_string()))
            }
            Credentials::Anonymous => Ok(None),
        }
    }
}

/// Firestore document as returned by the REST API.
#[derive(Debug, Default, Deserialize)]
struct Document {
    #[serde(default)]
    fields: HashMap<String, Value>,
}

impl Document {
    /// Read a boolean field; `Ok(None)` when absent.
    fn bool_field(&self, name: &str) -> Result<Option<bool>, PolicyStoreError> {
        match self.fields.get(name) {
            None => Ok(None),
            Some(value) => {
                if let Some(Value::Bool(b)) = value.get("booleanValue") {
                    return Ok(Some(*b));
                }
                if value.get("nullValue").is_some() {
                    return Ok(None);
                }
                Err(PolicyStoreError::Decode(format!(
                    "field `{}` is not a boolean: {}",
                    name, value
                )))
            }
        }
    }
}

/// Firestore document reader.
pub struct FirestoreClient {
    client: Client,
    documents_base: Url,
    credentials: Credentials,
    ban_collection: String,
    settings_collection: String,
    settings_document: String,
}

impl FirestoreClient {
    /// Create a new client from the policy store configuration.
    pub fn new(config: &PolicyStoreConfig) -> Result<Self, PolicyStoreError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(2))
            .build()?;

        let mut documents_base = Url::parse(&config.api_base)
            .map_err(|e| PolicyStoreError::Http(format!("invalid api base: {}", e)))?;
        documents_base
            .path_segments_mut()
            .map_err(|_| PolicyStoreError::Http("api base is not a hierarchical url".into()))?
            .pop_if_empty()
            .extend(["projects", config.project_id.as_str(), "databases", "(default)", "documents"]);

        Ok(Self {
            client,
            documents_base,
            credentials: Credentials::from_config(config)?,
            ban_collection: config.ban_collection.clone(),
            settings_collection: config.settings_collection.clone(),
            settings_document: config.settings_document.clone(),
        })
    }

    fn document_url(&self, collection: &str, id: &str) -> Url {
        let mut url = self.documents_base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.extend([collection, id]);
        }
        url
    }

    /// Fetch a document; `Ok(None)` if it does not exist.
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>, PolicyStoreError> {
        let url = self.document_url(collection, id);
        let mut request = self.client.get(url);
        match self.credentials.bearer().await {
            Ok(Some(token)) => request = request.bearer_auth(token),
            Ok(None) => {}
            Err(e) => {
                error!(error = %e, "Policy store token unavailable");
                return Err(e);
            }
        }

        let response = request.send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!(collection, id, "Document not found");
                Ok(None)
            }
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => {
                let message = response.text().await.unwrap_or_default();
                if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
                    error!(
                        status = status.as_u16(),
                        collection,
                        "Policy store rejected the credentials"
                    );
                }
                Err(PolicyStoreError::Status {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

#[async_trait]
impl PolicyStore for FirestoreClient {
    async fn is_banned(&self, identity: &str) -> Result<bool, PolicyStoreError> {
        Ok(self
            .get_document(&self.ban_collection, identity)
            .await?
            .is_some())
    }

    async fn store_config(&self) -> Result<Option<StoreConfig>, PolicyStoreError> {
        let Some(document) = self
            .get_document(&self.settings_collection, &self.settings_document)
            .await?
        else {
            return Ok(None);
        };

        Ok(Some(StoreConfig {
            is_global_open: document.bool_field("isGlobalOpen")?,
        }))
    }
}
