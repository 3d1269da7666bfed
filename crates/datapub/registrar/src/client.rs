//! DataCite REST client.
//!
//! Registers (or re-registers) validated metadata under an already-reserved
//! DOI. Creation is `POST {api}/dois` with `event = "publish"`; a metadata
//! refresh is `PUT {api}/dois/{doi}` with an empty event. The XML record
//! travels base64-encoded inside the JSON:API attributes envelope.

use crate::error::{RegistrarError, RegistrarResult};
use crate::metadata::MetadataSource;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use datapub_types::{Doi, Entity, EntityKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Connection settings for the DataCite API and landing-page derivation.
#[derive(Clone, Debug, Deserialize)]
pub struct DataCiteConfig {
    /// API base, e.g. `https://api.test.datacite.org`.
    pub api_url: String,
    pub username: String,
    pub password: String,
    /// Portal base used to derive landing-page URLs.
    pub site_url: String,
    /// Wholesale landing-URL override; replaces `{site_url}/dataset`.
    #[serde(default)]
    pub url_prefix: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

/// One registration call: create when `update` is false, metadata refresh
/// when true.
#[derive(Clone, Debug)]
pub struct RegistrationRequest {
    pub doi: Doi,
    pub entity: Entity,
    pub update: bool,
}

/// Seam between the workflow and the external registration service.
#[async_trait]
pub trait RegistrationApi: Send + Sync {
    /// Register or update `req.doi`, returning the confirmed identifier.
    async fn register(&self, req: &RegistrationRequest) -> RegistrarResult<String>;
}

#[derive(Serialize)]
struct DataCitePayload {
    data: DataCiteData,
}

#[derive(Serialize)]
struct DataCiteData {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    attributes: DataCiteAttributes,
}

#[derive(Serialize)]
struct DataCiteAttributes {
    event: String,
    doi: String,
    url: String,
    xml: String,
}

#[derive(Deserialize)]
struct DataCiteResponse {
    data: DataCiteResponseData,
}

#[derive(Deserialize)]
struct DataCiteResponseData {
    id: String,
}

/// DataCite REST client. Performs no retries; the explicit request timeout
/// is the only failure bound it adds.
pub struct DataCiteClient {
    http: reqwest::Client,
    config: DataCiteConfig,
    metadata: Arc<dyn MetadataSource>,
}

impl DataCiteClient {
    pub fn new(
        config: DataCiteConfig,
        metadata: Arc<dyn MetadataSource>,
    ) -> RegistrarResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            config,
            metadata,
        })
    }

    fn api_base(&self) -> &str {
        self.config.api_url.trim_end_matches('/')
    }

    /// An update may only touch a DOI whose public record points back at
    /// this entity.
    async fn verify_ownership(&self, doi: &Doi, entity: &Entity) -> RegistrarResult<()> {
        let url = format!("{}/dois/{}", self.api_base(), doi);
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(RegistrarError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let value: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| RegistrarError::Payload(e.to_string()))?;
        let identifiers = registrant_identifiers(&value);
        let owned = identifiers
            .iter()
            .any(|id| id.contains(&entity.id) || id.contains(&entity.name));
        if owned {
            Ok(())
        } else {
            Err(RegistrarError::OwnershipMismatch(format!(
                "{} does not reference {} ({})",
                doi, entity.id, entity.name
            )))
        }
    }
}

#[async_trait]
impl RegistrationApi for DataCiteClient {
    async fn register(&self, req: &RegistrationRequest) -> RegistrarResult<String> {
        let landing = landing_url(&self.config, &req.entity)?;

        if req.update {
            self.verify_ownership(&req.doi, &req.entity).await?;
        }

        let exported = self
            .metadata
            .export(&req.entity.id, req.entity.kind)
            .await
            .map_err(|e| RegistrarError::Metadata(e.0))?;
        let record = normalize_whitespace(&exported);

        let valid = self
            .metadata
            .validate(&record)
            .await
            .map_err(|e| RegistrarError::Metadata(e.0))?;
        if !valid {
            return Err(RegistrarError::MetadataValidation(format!(
                "DataCite record for {} {} failed schema validation",
                req.entity.kind, req.entity.id
            )));
        }

        let payload = registration_payload(&req.doi, req.update, &landing, &record);
        let request = if req.update {
            self.http
                .put(format!("{}/dois/{}", self.api_base(), req.doi))
        } else {
            self.http.post(format!("{}/dois", self.api_base()))
        };
        let response = request
            .basic_auth(&self.config.username, Some(&self.config.password))
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status.as_u16() != 200 && status.as_u16() != 201 {
            return Err(RegistrarError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: DataCiteResponse = serde_json::from_str(&body)
            .map_err(|e| RegistrarError::Payload(e.to_string()))?;
        tracing::info!(doi = %req.doi, confirmed = %parsed.data.id, update = req.update, "DOI registered");
        Ok(parsed.data.id)
    }
}

/// Collapse every run of whitespace to a single space.
pub(crate) fn normalize_whitespace(record: &str) -> String {
    record.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Build the JSON:API envelope for a create or update call.
fn registration_payload(
    doi: &Doi,
    update: bool,
    landing_url: &str,
    record: &str,
) -> DataCitePayload {
    let event = if update { "" } else { "publish" };
    DataCitePayload {
        data: DataCiteData {
            id: doi.to_string(),
            kind: "dois".to_string(),
            attributes: DataCiteAttributes {
                event: event.to_string(),
                doi: doi.to_string(),
                url: landing_url.to_string(),
                xml: BASE64.encode(record.as_bytes()),
            },
        },
    }
}

/// Landing-page URL for an entity: `{site_url}/dataset/{slug}` for datasets,
/// `{site_url}/dataset/{parent}/resource/{id}` for resources, with
/// `url_prefix` replacing the `{site_url}/dataset` base when configured.
fn landing_url(config: &DataCiteConfig, entity: &Entity) -> RegistrarResult<String> {
    let base = match &config.url_prefix {
        Some(prefix) => prefix.trim_end_matches('/').to_string(),
        None => format!("{}/dataset", config.site_url.trim_end_matches('/')),
    };
    match entity.kind {
        EntityKind::Dataset => Ok(format!("{}/{}", base, entity.name)),
        EntityKind::Resource => {
            let parent = entity.parent_dataset.as_deref().ok_or_else(|| {
                RegistrarError::Payload(format!(
                    "resource {} has no parent dataset",
                    entity.id
                ))
            })?;
            Ok(format!("{}/{}/resource/{}", base, parent, entity.id))
        }
    }
}

/// Identifier strings the public DOI record carries: its landing URL plus
/// any alternate identifiers. Used to decide whether an update targets a
/// record owned by this entity.
fn registrant_identifiers(value: &serde_json::Value) -> Vec<String> {
    let attributes = &value["data"]["attributes"];
    let mut identifiers = Vec::new();

    if let Some(url) = attributes["url"].as_str() {
        identifiers.push(url.to_string());
    }
    if let Some(alternates) = attributes["alternateIdentifiers"].as_array() {
        for alt in alternates {
            if let Some(id) = alt["alternateIdentifier"].as_str() {
                identifiers.push(id.to_string());
            }
        }
    }
    identifiers
}
