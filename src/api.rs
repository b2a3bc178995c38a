use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};

use crate::domain::{Database, ManifestRecord, Run, StagedStudy, Study};
use crate::error::CuratorError;

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub studies: Vec<Study>,
    #[serde(default)]
    pub total_found: u64,
    #[serde(default)]
    pub resolved_query: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunsResponse {
    #[serde(default)]
    pub runs: Vec<Run>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestsResponse {
    #[serde(default)]
    pub manifests: Vec<ManifestRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateResponse {
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub total_runs: u64,
}

/// Manifest creation reports backend rejections as data instead of raising,
/// so the approval flow can render them inline.
#[derive(Debug, Clone)]
pub enum CreateOutcome {
    Created(CreateResponse),
    Rejected { error: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApproveResponse {
    #[serde(default)]
    pub runs_to_import: u64,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImportResponse {
    #[serde(default)]
    pub started: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct ManifestCreateBody<'a> {
    name: &'a str,
    description: &'a str,
    studies: &'a [StagedStudy],
    tags: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize)]
struct ImportBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    set_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile: Option<&'a str>,
}

pub trait CuratorApi: Send + Sync {
    fn search(
        &self,
        query: &str,
        database: Database,
        organism: &str,
        limit: u32,
        year: Option<&str>,
    ) -> Result<SearchResponse, CuratorError>;

    fn study_info(&self, accession: &str) -> Result<serde_json::Value, CuratorError>;

    fn list_runs(&self, study_accession: &str) -> Result<RunsResponse, CuratorError>;

    fn file_urls(&self, accession: &str) -> Result<serde_json::Value, CuratorError>;

    fn create_manifest(
        &self,
        name: &str,
        description: &str,
        studies: &[StagedStudy],
        tags: Option<&str>,
    ) -> Result<CreateOutcome, CuratorError>;

    fn list_manifests(&self, name: Option<&str>) -> Result<ManifestsResponse, CuratorError>;

    fn approve_manifest(&self, name: &str) -> Result<ApproveResponse, CuratorError>;

    fn import_to_hox(
        &self,
        name: &str,
        set_name: Option<&str>,
        profile: Option<&str>,
    ) -> Result<ImportResponse, CuratorError>;

    fn import_status(&self, profile: Option<&str>) -> Result<serde_json::Value, CuratorError>;
}

#[derive(Clone)]
pub struct CuratorHttpApi {
    client: Client,
    base_url: String,
}

impl CuratorHttpApi {
    pub fn new(base_url: &str) -> Result<Self, CuratorError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("sra-curator/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| CuratorError::ApiHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| CuratorError::ApiHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn send_with_retries<F>(&self, mut make_req: F) -> Result<reqwest::blocking::Response, CuratorError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            match make_req().send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        std::thread::sleep(Duration::from_millis(
                            BASE_DELAY_MS * (attempt as u64 + 1),
                        ));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        std::thread::sleep(Duration::from_millis(
                            BASE_DELAY_MS * (attempt as u64 + 1),
                        ));
                        attempt += 1;
                        continue;
                    }
                    return Err(CuratorError::ApiHttp(err.to_string()));
                }
            }
        }
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, url: String) -> Result<T, CuratorError> {
        let response = self.send_with_retries(|| self.client.get(&url))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            let snippet: String = text.chars().take(200).collect();
            return Err(CuratorError::ApiStatus {
                status: status.as_u16(),
                message: snippet,
            });
        }
        response
            .json::<T>()
            .map_err(|err| CuratorError::ApiDecode(err.to_string()))
    }
}

impl CuratorApi for CuratorHttpApi {
    fn search(
        &self,
        query: &str,
        database: Database,
        organism: &str,
        limit: u32,
        year: Option<&str>,
    ) -> Result<SearchResponse, CuratorError> {
        let url = self.url("/api/search");
        let database = database.to_string();
        let limit = limit.to_string();
        let response = self.send_with_retries(|| {
            let mut request = self.client.get(&url).query(&[
                ("query", query),
                ("database", database.as_str()),
                ("organism", organism),
                ("limit", limit.as_str()),
            ]);
            if let Some(year) = year {
                request = request.query(&[("year", year)]);
            }
            request
        })?;
        response
            .json::<SearchResponse>()
            .map_err(|err| CuratorError::ApiDecode(err.to_string()))
    }

    fn study_info(&self, accession: &str) -> Result<serde_json::Value, CuratorError> {
        self.get_json(self.url(&format!("/api/study/{}", urlencoding::encode(accession))))
    }

    fn list_runs(&self, study_accession: &str) -> Result<RunsResponse, CuratorError> {
        self.get_json(self.url(&format!(
            "/api/runs/{}",
            urlencoding::encode(study_accession)
        )))
    }

    fn file_urls(&self, accession: &str) -> Result<serde_json::Value, CuratorError> {
        self.get_json(self.url(&format!("/api/files/{}", urlencoding::encode(accession))))
    }

    fn create_manifest(
        &self,
        name: &str,
        description: &str,
        studies: &[StagedStudy],
        tags: Option<&str>,
    ) -> Result<CreateOutcome, CuratorError> {
        let url = self.url("/api/manifests");
        let body = ManifestCreateBody {
            name,
            description,
            studies,
            tags,
        };
        let response = self.send_with_retries(|| self.client.post(&url).json(&body))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            let snippet: String = text.chars().take(200).collect();
            return Ok(CreateOutcome::Rejected {
                error: format!("Server error {}: {snippet}", status.as_u16()),
            });
        }
        let created = response
            .json::<CreateResponse>()
            .map_err(|err| CuratorError::ApiDecode(err.to_string()))?;
        Ok(CreateOutcome::Created(created))
    }

    fn list_manifests(&self, name: Option<&str>) -> Result<ManifestsResponse, CuratorError> {
        let url = self.url("/api/manifests");
        let response = self.send_with_retries(|| {
            let mut request = self.client.get(&url);
            if let Some(name) = name {
                request = request.query(&[("name", name)]);
            }
            request
        })?;
        response
            .json::<ManifestsResponse>()
            .map_err(|err| CuratorError::ApiDecode(err.to_string()))
    }

    fn approve_manifest(&self, name: &str) -> Result<ApproveResponse, CuratorError> {
        let url = self.url(&format!(
            "/api/manifests/{}/approve",
            urlencoding::encode(name)
        ));
        let response = self.send_with_retries(|| self.client.post(&url))?;
        response
            .json::<ApproveResponse>()
            .map_err(|err| CuratorError::ApiDecode(err.to_string()))
    }

    fn import_to_hox(
        &self,
        name: &str,
        set_name: Option<&str>,
        profile: Option<&str>,
    ) -> Result<ImportResponse, CuratorError> {
        let url = self.url(&format!(
            "/api/manifests/{}/import",
            urlencoding::encode(name)
        ));
        let body = ImportBody { set_name, profile };
        let response = self.send_with_retries(|| self.client.post(&url).json(&body))?;
        response
            .json::<ImportResponse>()
            .map_err(|err| CuratorError::ApiDecode(err.to_string()))
    }

    fn import_status(&self, profile: Option<&str>) -> Result<serde_json::Value, CuratorError> {
        let url = self.url("/api/import-status");
        let response = self.send_with_retries(|| {
            let mut request = self.client.get(&url);
            if let Some(profile) = profile {
                request = request.query(&[("profile", profile)]);
            }
            request
        })?;
        response
            .json::<serde_json::Value>()
            .map_err(|err| CuratorError::ApiDecode(err.to_string()))
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;

    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let api = CuratorHttpApi::new("http://127.0.0.1:8000/").unwrap();
        assert_eq!(api.url("/api/search"), "http://127.0.0.1:8000/api/search");
    }

    #[test]
    fn accession_path_segments_are_encoded() {
        let encoded = urlencoding::encode("SRP 000/1");
        assert_eq!(encoded, "SRP%20000%2F1");
    }

    #[test]
    fn retryable_predicates() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(200));
    }

    #[test]
    fn non_success_get_maps_to_status_error() {
        // 404 is not retryable, so a single canned response is enough.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 2048];
            let _ = stream.read(&mut buf);
            let body = "study not found";
            let response = format!(
                "HTTP/1.1 404 Not Found\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
        });

        let api = CuratorHttpApi::new(&format!("http://{addr}")).unwrap();
        let err = api.study_info("SRP000001").unwrap_err();
        assert_matches!(
            err,
            CuratorError::ApiStatus { status: 404, ref message } if message.as_str() == "study not found"
        );
        server.join().unwrap();
    }

    #[test]
    fn responses_tolerate_missing_fields() {
        let search: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(search.studies.is_empty());
        assert_eq!(search.total_found, 0);

        let runs: RunsResponse =
            serde_json::from_str(r#"{"error":"No data found","study":"SRP1"}"#).unwrap();
        assert!(runs.runs.is_empty());
        assert_eq!(runs.error.as_deref(), Some("No data found"));

        let approve: ApproveResponse = serde_json::from_str(r#"{"runs_to_import":4}"#).unwrap();
        assert_eq!(approve.runs_to_import, 4);
        assert!(approve.error.is_none());
    }
}
