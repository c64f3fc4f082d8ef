//! Client for the reading-tracking API.

use crate::collector::MeasuredFile;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from talking to the API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("API request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API failed with status code {status}: {message}")]
    Rejected {
        status: reqwest::StatusCode,
        message: String,
    },
}

/// Whether a reading belongs to a feature branch. The API accepts either a
/// boolean or the name of the base branch the feature branch targets.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum FeatureBranch {
    Flag(bool),
    BaseBranch(String),
}

/// One submitted reading: the measured files plus their provenance.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading<'a> {
    pub files: &'a [MeasuredFile],
    pub bundleset: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_feature_branch: Option<FeatureBranch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_commits: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Authenticated API handle.
pub struct Api {
    url: String,
    project_key: String,
    client: reqwest::Client,
}

impl Api {
    pub fn new(url: impl Into<String>, project_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            project_key: project_key.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Submit a reading. The project key authenticates the request.
    pub async fn submit_reading(&self, reading: &Reading<'_>) -> Result<(), ApiError> {
        let url = format!("{}/reading", self.url);

        tracing::debug!(url = %url, files = reading.files.len(), "submitting reading");

        let response = self
            .client
            .post(&url)
            .header("Authentication", &self.project_key)
            .json(reading)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|body| body.error)
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ApiError::Rejected { status, message });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_file() -> MeasuredFile {
        MeasuredFile {
            name: "app.js".to_string(),
            root: "dist".to_string(),
            filename: "dist/app.a43ff0.js".to_string(),
            hash: "a43ff0".to_string(),
            raw_size: 1024,
            gzip_size: 300,
        }
    }

    #[test]
    fn test_reading_serializes_camel_case() {
        let files = vec![sample_file()];
        let reading = Reading {
            files: &files,
            bundleset: "web".to_string(),
            commit: Some("a43ff0a43ff0".to_string()),
            commit_message: None,
            branch: Some("main".to_string()),
            is_feature_branch: Some(FeatureBranch::Flag(false)),
            parent_commits: None,
        };

        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(json["bundleset"], "web");
        assert_eq!(json["isFeatureBranch"], false);
        assert_eq!(json["files"][0]["rawSize"], 1024);
        assert_eq!(json["files"][0]["gzipSize"], 300);
        assert_eq!(json["files"][0]["name"], "app.js");
        // Unset options stay off the wire entirely.
        assert!(json.get("commitMessage").is_none());
        assert!(json.get("parentCommits").is_none());
    }

    #[test]
    fn test_feature_branch_serializes_as_base_branch_name() {
        let value =
            serde_json::to_value(FeatureBranch::BaseBranch("main".to_string())).unwrap();
        assert_eq!(value, "main");
    }
}
