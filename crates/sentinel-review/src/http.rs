//! HTTP client for the supervision backend.
//!
//! `HttpBackend` implements both `ReviewBackend` and `RegistrationBackend`
//! over JSON REST. Every failure, whether the host is unreachable, answers
//! with a non-success status, or sends a body that does not decode, becomes
//! `SentinelError::Transport`.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use sentinel_contracts::{
    error::{SentinelError, SentinelResult},
    ids::{ChainId, RequestId, ResultId, RunId, SupervisorId, ToolId},
    remote::{ReviewStatus, SupervisionRequest, SupervisionResult, SupervisorSpec, ToolSpec},
};
use sentinel_core::traits::{RegistrationBackend, ReviewBackend};

use crate::config::ClientConfig;

#[derive(Debug, Deserialize)]
struct Created<T> {
    id: T,
}

#[derive(Debug, Serialize)]
struct CreateRun<'a> {
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct AssignChains<'a> {
    chains: &'a [Vec<SupervisorId>],
}

#[derive(Debug, Deserialize)]
struct AssignedChains {
    chain_ids: Vec<ChainId>,
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: ReviewStatus,
}

/// REST client for a Sentinel backend.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    config: ClientConfig,
    client: Client,
}

impl HttpBackend {
    pub fn new(config: ClientConfig) -> SentinelResult<Self> {
        config.validate()?;
        let client = Client::builder()
            .user_agent(concat!("sentinel-review/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| SentinelError::config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    pub fn from_env() -> SentinelResult<Self> {
        Self::new(ClientConfig::from_env())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn send<R: DeserializeOwned>(&self, builder: RequestBuilder, what: &str) -> SentinelResult<R> {
        let response = builder.send().await.map_err(|e| {
            warn!(operation = %what, error = %e, "backend unreachable");
            SentinelError::transport(format!("{} failed: {}", what, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(operation = %what, status = %status, "backend returned failure status");
            return Err(SentinelError::transport(format!(
                "{} returned {}: {}",
                what, status, body
            )));
        }

        debug!(operation = %what, status = %status, "backend call succeeded");
        response.json::<R>().await.map_err(|e| {
            SentinelError::transport(format!("{} returned an unreadable body: {}", what, e))
        })
    }

    async fn post<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        what: &str,
    ) -> SentinelResult<R> {
        self.send(self.request(Method::POST, path).json(body), what).await
    }

    async fn get<R: DeserializeOwned>(&self, path: &str, what: &str) -> SentinelResult<R> {
        self.send(self.request(Method::GET, path), what).await
    }
}

#[async_trait]
impl ReviewBackend for HttpBackend {
    async fn create_request(&self, request: &SupervisionRequest) -> SentinelResult<RequestId> {
        let created: Created<RequestId> = self
            .post("/supervision_requests", request, "create supervision request")
            .await?;
        Ok(created.id)
    }

    async fn get_status(&self, request_id: RequestId) -> SentinelResult<ReviewStatus> {
        let body: StatusBody = self
            .get(
                &format!("/supervision_requests/{}/status", request_id),
                "get review status",
            )
            .await?;
        Ok(body.status)
    }

    async fn get_result(&self, request_id: RequestId) -> SentinelResult<SupervisionResult> {
        self.get(
            &format!("/supervision_requests/{}/result", request_id),
            "get supervision result",
        )
        .await
    }

    async fn create_result(
        &self,
        request_id: RequestId,
        result: &SupervisionResult,
    ) -> SentinelResult<ResultId> {
        let created: Created<ResultId> = self
            .post(
                &format!("/supervision_requests/{}/result", request_id),
                result,
                "create supervision result",
            )
            .await?;
        Ok(created.id)
    }
}

#[async_trait]
impl RegistrationBackend for HttpBackend {
    async fn create_run(&self, name: &str) -> SentinelResult<RunId> {
        let created: Created<RunId> = self.post("/runs", &CreateRun { name }, "create run").await?;
        Ok(created.id)
    }

    async fn register_tool(&self, run_id: RunId, spec: &ToolSpec) -> SentinelResult<ToolId> {
        let created: Created<ToolId> = self
            .post(&format!("/runs/{}/tools", run_id), spec, "register tool")
            .await?;
        Ok(created.id)
    }

    async fn register_supervisor(&self, spec: &SupervisorSpec) -> SentinelResult<SupervisorId> {
        let created: Created<SupervisorId> =
            self.post("/supervisors", spec, "register supervisor").await?;
        Ok(created.id)
    }

    async fn assign_supervisors(
        &self,
        run_id: RunId,
        tool_id: ToolId,
        chains: &[Vec<SupervisorId>],
    ) -> SentinelResult<Vec<ChainId>> {
        let assigned: AssignedChains = self
            .post(
                &format!("/runs/{}/tools/{}/chains", run_id, tool_id),
                &AssignChains { chains },
                "assign supervisors",
            )
            .await?;
        Ok(assigned.chain_ids)
    }
}

#[cfg(test)]
mod tests {
    use sentinel_contracts::{
        error::SentinelError,
        ids::RequestId,
    };
    use sentinel_core::traits::ReviewBackend;

    use super::HttpBackend;
    use crate::config::ClientConfig;

    #[test]
    fn urls_are_rooted_under_api() {
        let backend = HttpBackend::new(ClientConfig::new("https://review.example/")).unwrap();
        assert_eq!(backend.url("/runs"), "https://review.example/api/runs");
    }

    #[test]
    fn invalid_base_url_is_a_config_error() {
        let result = HttpBackend::new(ClientConfig::new("not a url"));
        assert!(matches!(result, Err(SentinelError::Config { .. })));
    }

    /// Nothing listens on port 9 of the loopback interface.
    #[tokio::test]
    async fn unreachable_host_is_a_transport_error() {
        let backend = HttpBackend::new(ClientConfig::new("http://127.0.0.1:9")).unwrap();
        let err = backend.get_status(RequestId::new()).await.unwrap_err();
        assert!(matches!(err, SentinelError::Transport { .. }), "got {:?}", err);
    }
}
