use std::process::Stdio;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use serde::Deserialize;
use tokio::io::AsyncWriteExt as _;
use tokio::process::Command;

const USER_AGENT: &str = "User-Agent: change-submitter";
const API_VERSION: &str = "X-GitHub-Api-Version: 2022-11-28";

/// HTTP client using curl for making GitHub API requests
pub struct GithubCurlClient {
    token: String,
}

/// A response with the status code split off the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurlResponse {
    pub status: u16,
    pub body: String,
}

/// A GitHub API call that came back with an error status.
#[derive(Debug, thiserror::Error)]
#[error("GitHub API request failed with status {status}: {message}")]
pub struct GithubApiError {
    pub status: u16,
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct GitHubErrorBody {
    message: String,
    #[serde(default)]
    #[allow(dead_code)]
    documentation_url: Option<String>,
}

impl CurlResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a 4xx/5xx response into a [`GithubApiError`].
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let message = match serde_json::from_str::<GitHubErrorBody>(&self.body) {
            Ok(error) => error.message,
            Err(_) => self.body.clone(),
        };
        Err(GithubApiError {
            status: self.status,
            message,
        }
        .into())
    }
}

impl GithubCurlClient {
    pub fn new(token: String) -> Self {
        Self { token }
    }

    /// Make a GET request
    pub async fn get(&self, url: &str) -> Result<CurlResponse> {
        self.send("GET", url, None).await
    }

    /// Make a POST request
    pub async fn post(&self, url: &str, json_data: &str) -> Result<CurlResponse> {
        self.send("POST", url, Some(json_data)).await
    }

    /// Make a PUT request
    pub async fn put(&self, url: &str, json_data: &str) -> Result<CurlResponse> {
        self.send("PUT", url, Some(json_data)).await
    }

    /// Make a PATCH request
    pub async fn patch(&self, url: &str, json_data: &str) -> Result<CurlResponse> {
        self.send("PATCH", url, Some(json_data)).await
    }

    /// Run curl. Credentials and the body, if any, go through a config on stdin
    /// so they never show up in the process list.
    async fn send(&self, method: &str, url: &str, json_data: Option<&str>) -> Result<CurlResponse> {
        let mut child = Command::new("curl")
            .args(curl_args(method, url, json_data.is_some()))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .context("Failed to execute curl command")?;

        let mut stdin = child.stdin.take().context("curl stdin unavailable")?;
        stdin
            .write_all(curl_config(&self.token, json_data).as_bytes())
            .await
            .context("Failed to write config to curl")?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .context("Failed to wait for curl command")?;

        if !output.status.success() {
            bail!(
                "curl command failed: {}",
                String::from_utf8_lossy(&output.stderr)
            );
        }

        parse_response(output.stdout)
    }
}

/// Command line for one request. `-g` keeps `[]{}` in URLs literal.
fn curl_args<'a>(method: &'a str, url: &'a str, has_body: bool) -> Vec<&'a str> {
    let mut args = vec![
        "-s",
        "-g",
        "-K",
        "-",
        "-w",
        "\n%{http_code}",
        "-X",
        method,
        "-H",
        "Accept: application/vnd.github+json",
        "-H",
        API_VERSION,
        "-H",
        USER_AGENT,
    ];
    if has_body {
        args.extend(["-H", "Content-Type: application/json"]);
    }
    args.push(url);
    args
}

/// Curl config carrying the auth header and the request body.
fn curl_config(token: &str, json_data: Option<&str>) -> String {
    let mut config = format!(
        "header = {}\n",
        config_quote(&format!("Authorization: Bearer {}", token))
    );
    if let Some(data) = json_data {
        config.push_str(&format!("data-binary = {}\n", config_quote(data)));
    }
    config
}

fn config_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

/// Parse curl response with status code appended
fn parse_response(stdout: Vec<u8>) -> Result<CurlResponse> {
    let output_str = String::from_utf8(stdout)?;
    let mut lines: Vec<&str> = output_str.rsplitn(2, '\n').collect();
    lines.reverse();

    // A body-less response leaves only the status code
    let (body, status) = match lines.as_slice() {
        [body, status] => (*body, *status),
        [status] => ("", *status),
        _ => ("", ""),
    };

    let Ok(status) = status.trim().parse::<u16>() else {
        bail!("curl output did not end with an HTTP status code");
    };
    if status == 0 {
        bail!("curl did not receive an HTTP response");
    }

    Ok(CurlResponse {
        status,
        body: body.to_string(),
    })
}
