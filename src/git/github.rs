//! GitHub pull request creation over the REST API.

use std::env;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{ReleaseError, Result};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const TOKEN_ENV_VAR: &str = "GITHUB_TOKEN";
/// Overrides [DEFAULT_API_URL], e.g. for GitHub Enterprise
pub const API_URL_ENV_VAR: &str = "GITHUB_API_URL";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct PullRequest {
    html_url: String,
}

/// The API token from the environment, if one is set and non-empty
pub fn token_from_env() -> Option<String> {
    env::var(TOKEN_ENV_VAR).ok().filter(|token| !token.trim().is_empty())
}

/// POST a new pull request to `{api_url}/repos/{account_repo}/pulls`.
///
/// Returns the pull request's web URL on `201 Created`, `None` for any other
/// status. Transport failures are errors.
pub fn create_pull_request(
    api_url: &str,
    token: &str,
    account_repo: &str,
    title: &str,
    base: &str,
    head: &str,
) -> Result<Option<String>> {
    let pr_error = |e: reqwest::Error| {
        ReleaseError::source_control(format!("Could not open Github PR due to error: {}", e))
    };

    let client = Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(pr_error)?;

    let body = serde_json::json!({
        "title": title,
        "base": base,
        "head": head,
    });

    let url = format!("{}/repos/{}/pulls", api_url.trim_end_matches('/'), account_repo);
    let response = client
        .post(&url)
        .header(CONTENT_TYPE, "application/json")
        .header(ACCEPT, "application/vnd.github.v3+json")
        .header(AUTHORIZATION, format!("token {}", token))
        .body(body.to_string())
        .send()
        .map_err(pr_error)?;

    let status = response.status();
    if status != StatusCode::CREATED {
        warn!(%status, "GitHub declined to create the pull request");
        return Ok(None);
    }

    let pull_request: PullRequest = response.json().map_err(pr_error)?;
    info!(url = %pull_request.html_url, "opened pull request");
    Ok(Some(pull_request.html_url))
}
