//! Jenkins HTTP client
//!
//! Fetches a job's `config.xml` over the server's REST surface. The
//! tool is fully sequential, so the client exposes a blocking call and
//! drives reqwest on a runtime created per request.

use std::time::Duration;
use url::Url;

use crate::job::JobError;

/// Default server, used when `JJR_URL` is not set.
pub const DEFAULT_SERVER_URL: &str = "https://ci.openquake.org/";

/// Request timeout for the config fetch.
const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Basic-auth credential pair read from the environment
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Username (`JJR_USER`).
    pub user: String,

    /// Password or API token (`JJR_PASS`).
    pub pass: String,
}

impl Credentials {
    /// Reads `JJR_USER` and `JJR_PASS` from the environment
    ///
    /// # Errors
    ///
    /// Returns [`JobError::MissingCredentials`] if either variable is
    /// absent.
    pub fn from_env() -> Result<Self, JobError> {
        let user = std::env::var("JJR_USER").map_err(|_| JobError::MissingCredentials)?;
        let pass = std::env::var("JJR_PASS").map_err(|_| JobError::MissingCredentials)?;
        Ok(Self { user, pass })
    }
}

/// Blocking client for the Jenkins job-configuration endpoint
#[derive(Debug, Clone)]
pub struct JenkinsClient {
    base_url: Url,
    credentials: Credentials,
}

impl JenkinsClient {
    /// Creates a client for the given server
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Fetch`] if the base URL does not parse.
    pub fn new(base_url: &str, credentials: Credentials) -> Result<Self, JobError> {
        let base_url = Url::parse(base_url).map_err(|e| JobError::Fetch {
            job: String::new(),
            reason: format!("invalid server URL '{base_url}': {e}"),
        })?;

        Ok(Self {
            base_url,
            credentials,
        })
    }

    /// Fetches the raw `config.xml` for a job
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Fetch`] on transport failures or non-2xx
    /// responses.
    pub fn fetch_job_config(&self, job_name: &str) -> Result<String, JobError> {
        let endpoint = self
            .base_url
            .join(&format!("job/{job_name}/config.xml"))
            .map_err(|e| self.fetch_error(job_name, format!("invalid job URL: {e}")))?;

        tracing::debug!(url = %endpoint, "Fetching job configuration");

        let runtime = tokio::runtime::Runtime::new()
            .map_err(|e| self.fetch_error(job_name, format!("failed to create runtime: {e}")))?;

        runtime.block_on(async {
            let client = reqwest::Client::builder()
                .timeout(FETCH_TIMEOUT)
                .build()
                .map_err(|e| self.fetch_error(job_name, e.to_string()))?;

            let response = client
                .get(endpoint)
                .basic_auth(&self.credentials.user, Some(&self.credentials.pass))
                .send()
                .await
                .map_err(|e| self.fetch_error(job_name, e.to_string()))?
                .error_for_status()
                .map_err(|e| self.fetch_error(job_name, e.to_string()))?;

            response
                .text()
                .await
                .map_err(|e| self.fetch_error(job_name, e.to_string()))
        })
    }

    fn fetch_error(&self, job_name: &str, reason: String) -> JobError {
        JobError::Fetch {
            job: job_name.to_string(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_base_url_rejected() {
        let credentials = Credentials {
            user: "u".to_string(),
            pass: "p".to_string(),
        };
        assert!(matches!(
            JenkinsClient::new("not a url", credentials),
            Err(JobError::Fetch { .. })
        ));
    }

    #[test]
    fn test_config_endpoint_join() {
        let credentials = Credentials {
            user: "u".to_string(),
            pass: "p".to_string(),
        };
        let client = JenkinsClient::new("https://ci.example.org/", credentials).unwrap();
        let endpoint = client.base_url.join("job/my-job/config.xml").unwrap();
        assert_eq!(
            endpoint.as_str(),
            "https://ci.example.org/job/my-job/config.xml"
        );
    }
}
