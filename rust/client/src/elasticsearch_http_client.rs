use async_trait::async_trait;
use backon::ExponentialBuilder;
use backon::Retryable;
use mapsync_config::ElasticsearchConfig;
use mapsync_merge::{SchemaTransport, TransportOperation, TransportRequestFailedError};
use mapsync_types::{AnalysisSettings, TypeMapping};
use reqwest::header::HeaderValue;
use reqwest::Method;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::{json, Value};

use crate::options::{ElasticsearchClientOptions, ElasticsearchClientOptionsError};

const USER_AGENT: &str = concat!("mapsync v", env!("CARGO_PKG_VERSION"));

/// Error type the engine reports when the index exists but the type does not.
const TYPE_MISSING_EXCEPTION: &str = "type_missing_exception";

/// [`SchemaTransport`] over the Elasticsearch 2.x index admin API.
///
/// Reads (`GET`, `HEAD`) are retried when the engine answers with a server
/// error or not at all. Any request answered with `429 Too Many Requests` is
/// retried. Other failures of writes surface immediately, since replaying a
/// half-applied write is not safe in general.
///
/// Cloning is cheap and shares the connection pool.
#[derive(Clone, Debug)]
pub struct ElasticsearchHttpClient {
    base_url: reqwest::Url,
    client: reqwest::Client,
    retry_policy: ExponentialBuilder,
}

impl ElasticsearchHttpClient {
    pub fn new(options: ElasticsearchClientOptions) -> Result<Self, ElasticsearchClientOptionsError> {
        let base_url = options.base_url()?;
        let mut headers = options.headers();
        headers.insert(
            reqwest::header::USER_AGENT,
            HeaderValue::from_static(USER_AGENT),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(options.request_timeout)
            .build()?;

        Ok(ElasticsearchHttpClient {
            base_url,
            client,
            retry_policy: options.retry_options.into(),
        })
    }

    pub fn from_config(config: &ElasticsearchConfig) -> Result<Self, ElasticsearchClientOptionsError> {
        Self::new(ElasticsearchClientOptions::from_config(config)?)
    }

    pub fn base_url(&self) -> &reqwest::Url {
        &self.base_url
    }

    fn url(&self, segments: &[&str]) -> reqwest::Url {
        let mut url = self.base_url.clone();
        // The endpoint was checked to be a base URL when the client was built.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Sends one request and returns the decoded JSON body, `None` when the
    /// body is empty.
    ///
    /// Retried:
    /// - `GET` and `HEAD` requests that got a server error or no response
    /// - any request answered with `429 Too Many Requests`
    async fn send(
        &self,
        operation: TransportOperation,
        index: &str,
        method: Method,
        segments: &[&str],
        body: Option<&Value>,
    ) -> Result<Option<Value>, TransportRequestFailedError> {
        let url = self.url(segments);

        let attempt = || async {
            let mut request = self.client.request(method.clone(), url.clone());
            if let Some(body) = body {
                request = request.json(body);
            }

            tracing::trace!(url = %url, method =? method, "Sending request");

            let response = request.send().await.map_err(|err| (err, None))?;
            if let Err(err) = response.error_for_status_ref() {
                return Err((err, Some(response)));
            }

            Ok::<reqwest::Response, (reqwest::Error, Option<reqwest::Response>)>(response)
        };

        let response = attempt
            .retry(&self.retry_policy)
            .notify(|(err, _), delay| {
                tracing::warn!(
                    url = %url,
                    method =? method,
                    status =? err.status(),
                    ?delay,
                    "Request failed with retryable error. Retrying...",
                );
            })
            .when(|(err, _)| is_retryable(&method, err.status()))
            .await;

        let response = match response {
            Ok(response) => response,
            Err((_, Some(response))) => {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                tracing::trace!(
                    url = %url,
                    method =? method,
                    "Received error response: {}",
                    text
                );
                return Err(TransportRequestFailedError::new(
                    operation,
                    index,
                    Some(status.as_u16()),
                    engine_error_message(status, &text),
                ));
            }
            Err((err, None)) => {
                return Err(TransportRequestFailedError::new(
                    operation,
                    index,
                    None,
                    err.to_string(),
                ));
            }
        };

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|err| {
            TransportRequestFailedError::new(operation, index, Some(status), err.to_string())
        })?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        let json = serde_json::from_str::<Value>(&text).map_err(|err| {
            TransportRequestFailedError::new(
                operation,
                index,
                Some(status),
                format!("Invalid JSON response: {err}"),
            )
        })?;

        if tracing::enabled!(tracing::Level::TRACE) {
            tracing::trace!(
                url = %url,
                method =? method,
                "Received response: {}",
                serde_json::to_string_pretty(&json).unwrap_or_else(|_| "<failed to serialize>".to_string())
            );
        }

        Ok(Some(json))
    }
}

fn is_retryable(method: &Method, status: Option<StatusCode>) -> bool {
    status == Some(StatusCode::TOO_MANY_REQUESTS)
        || ((*method == Method::GET || *method == Method::HEAD)
            && status.map(|s| s.is_server_error()).unwrap_or(true))
}

/// Elasticsearch reports failures as `{"error": {"type": ..., "reason": ...}}`.
fn engine_error_message(status: StatusCode, text: &str) -> String {
    let Ok(json) = serde_json::from_str::<Value>(text) else {
        if text.trim().is_empty() {
            return status.to_string();
        }
        return text.to_string();
    };
    match json.get("error") {
        Some(Value::Object(error)) => {
            let error_type = error.get("type").and_then(Value::as_str);
            let reason = error.get("reason").and_then(Value::as_str);
            match (error_type, reason) {
                (Some(error_type), Some(reason)) => format!("{error_type}: {reason}"),
                (Some(error_type), None) => error_type.to_string(),
                (None, Some(reason)) => reason.to_string(),
                (None, None) => json.to_string(),
            }
        }
        Some(Value::String(message)) => message.clone(),
        _ => json.to_string(),
    }
}

fn is_type_missing(err: &TransportRequestFailedError) -> bool {
    err.status == Some(404) && err.message.starts_with(TYPE_MISSING_EXCEPTION)
}

/// The part of a per-index response that belongs to `index`. Responses are
/// keyed by the concrete index name, which differs from `index` when it is an
/// alias, so a single entry is taken whatever its key.
fn index_section<'a>(json: &'a Value, index: &str) -> Option<&'a Value> {
    json.get(index).or_else(|| {
        json.as_object()
            .filter(|sections| sections.len() == 1)
            .and_then(|sections| sections.values().next())
    })
}

fn encode<T: Serialize>(
    operation: TransportOperation,
    index: &str,
    value: &T,
) -> Result<Value, TransportRequestFailedError> {
    serde_json::to_value(value).map_err(|err| {
        TransportRequestFailedError::new(
            operation,
            index,
            None,
            format!("Failed to encode request body: {err}"),
        )
    })
}

fn decode<T: serde::de::DeserializeOwned>(
    operation: TransportOperation,
    index: &str,
    value: &Value,
) -> Result<T, TransportRequestFailedError> {
    serde_json::from_value(value.clone()).map_err(|err| {
        TransportRequestFailedError::new(
            operation,
            index,
            Some(200),
            format!("Failed to decode response: {err}"),
        )
    })
}

#[async_trait]
impl SchemaTransport for ElasticsearchHttpClient {
    async fn index_exists(&self, index: &str) -> Result<bool, TransportRequestFailedError> {
        match self
            .send(TransportOperation::IndexExists, index, Method::HEAD, &[index], None)
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if err.status == Some(404) => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn get_mapping(
        &self,
        index: &str,
        type_name: &str,
    ) -> Result<Option<TypeMapping>, TransportRequestFailedError> {
        let operation = TransportOperation::GetMapping;
        let json = match self
            .send(operation, index, Method::GET, &[index, "_mapping", type_name], None)
            .await
        {
            Ok(json) => json,
            Err(err) if is_type_missing(&err) => return Ok(None),
            Err(err) => return Err(err),
        };
        // A type without a mapping comes back as an empty object.
        let mapping = json
            .as_ref()
            .and_then(|json| index_section(json, index))
            .and_then(|section| section.get("mappings"))
            .and_then(|mappings| mappings.get(type_name));
        match mapping {
            Some(mapping) => decode(operation, index, mapping).map(Some),
            None => Ok(None),
        }
    }

    async fn get_analysis_settings(
        &self,
        index: &str,
    ) -> Result<AnalysisSettings, TransportRequestFailedError> {
        let operation = TransportOperation::GetAnalysisSettings;
        let json = self
            .send(operation, index, Method::GET, &[index, "_settings"], None)
            .await?;
        let analysis = json
            .as_ref()
            .and_then(|json| index_section(json, index))
            .and_then(|section| section.pointer("/settings/index/analysis"));
        match analysis {
            Some(analysis) => decode(operation, index, analysis),
            None => Ok(AnalysisSettings::default()),
        }
    }

    async fn put_mapping(
        &self,
        index: &str,
        type_name: &str,
        mapping: &TypeMapping,
    ) -> Result<(), TransportRequestFailedError> {
        let operation = TransportOperation::PutMapping;
        let body = encode(operation, index, mapping)?;
        self.send(
            operation,
            index,
            Method::PUT,
            &[index, "_mapping", type_name],
            Some(&body),
        )
        .await?;
        Ok(())
    }

    async fn put_analysis_settings(
        &self,
        index: &str,
        settings: &AnalysisSettings,
    ) -> Result<(), TransportRequestFailedError> {
        let operation = TransportOperation::PutAnalysisSettings;
        let body = json!({ "index": { "analysis": encode(operation, index, settings)? } });
        self.send(operation, index, Method::PUT, &[index, "_settings"], Some(&body))
            .await?;
        Ok(())
    }

    async fn create_index(
        &self,
        index: &str,
        type_name: &str,
        mapping: &TypeMapping,
        settings: &AnalysisSettings,
    ) -> Result<(), TransportRequestFailedError> {
        let operation = TransportOperation::CreateIndex;
        let mut body = json!({
            "mappings": { type_name: encode(operation, index, mapping)? }
        });
        if !settings.is_empty() {
            body["settings"] = json!({ "index": { "analysis": encode(operation, index, settings)? } });
        }
        self.send(operation, index, Method::PUT, &[index], Some(&body))
            .await?;
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<(), TransportRequestFailedError> {
        self.send(TransportOperation::DeleteIndex, index, Method::DELETE, &[index], None)
            .await?;
        Ok(())
    }

    async fn close_index(&self, index: &str) -> Result<(), TransportRequestFailedError> {
        self.send(
            TransportOperation::CloseIndex,
            index,
            Method::POST,
            &[index, "_close"],
            None,
        )
        .await?;
        Ok(())
    }

    async fn open_index(&self, index: &str) -> Result<(), TransportRequestFailedError> {
        self.send(
            TransportOperation::OpenIndex,
            index,
            Method::POST,
            &[index, "_open"],
            None,
        )
        .await?;
        Ok(())
    }
}
