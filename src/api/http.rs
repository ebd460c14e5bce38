//! reqwest-backed [`KnowledgeApi`] talking to the catalogue's REST endpoints.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use url::Url;

use super::types::{
    BootstrapJob, BootstrapRequest, BootstrapSubmission, Classification, ClassifyRequest, GraphQuery, JobHandle,
    SearchRequest, SearchResponse,
};
use super::KnowledgeApi;
use crate::graph_utils::graph::{GraphSnapshot, RawGraph};
use crate::persistence::settings::ExplorerSettings;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const ERROR_BODY_LIMIT: usize = 300;

pub struct HttpKnowledgeApi {
    client: Client,
    base: Url,
    token: Option<String>,
}

impl HttpKnowledgeApi {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let mut base = Url::parse(base_url.trim()).with_context(|| format!("invalid API base URL '{}'", base_url))?;
        // join() drops the last path segment unless the base ends with '/'
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build().context("build HTTP client")?;
        Ok(Self { client, base, token: token.filter(|t| !t.trim().is_empty()) })
    }

    pub fn from_settings(settings: &ExplorerSettings) -> Result<Self> {
        Self::new(&settings.api_base_url, settings.api_token.clone())
    }

    pub fn base_url(&self) -> &Url { &self.base }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base.join(path).with_context(|| format!("build endpoint URL for '{}'", path))
    }

    fn authorize(&self, rb: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(t) => rb.bearer_auth(t),
            None => rb,
        }
    }
}

fn graph_params(query: &GraphQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("scope", query.scope.as_str().to_string()),
        ("limit", query.clamped_limit().to_string()),
        ("include_format_nodes", query.include_format_nodes.to_string()),
    ];
    if let Some(q) = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        params.push(("q", q.to_string()));
    }
    params
}

async fn decode<T: DeserializeOwned>(resp: Response, what: &str) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let body: String = body.chars().take(ERROR_BODY_LIMIT).collect();
        bail!("{} failed: HTTP {}: {}", what, status, body.trim());
    }
    resp.json::<T>().await.with_context(|| format!("decode {} response", what))
}

#[async_trait]
impl KnowledgeApi for HttpKnowledgeApi {
    async fn fetch_graph(&self, query: &GraphQuery) -> Result<GraphSnapshot> {
        let url = self.endpoint(&format!("api/rag/workspaces/{}/graph", query.workspace_id))?;
        let params = graph_params(query);
        let resp = self.authorize(self.client.get(url).query(&params)).send().await.context("graph request")?;
        let raw: RawGraph = decode(resp, "graph fetch").await?;
        let (snapshot, report) = GraphSnapshot::from_raw(raw);
        if !report.is_clean() {
            log::warn!("graph for workspace {} normalized with drops: {}", query.workspace_id, report);
        }
        Ok(snapshot)
    }

    async fn classify(&self, request: &ClassifyRequest) -> Result<Classification> {
        let url = self.endpoint("api/resources/auto-classify")?;
        let mut form = Form::new()
            .text("title", request.file.stem().to_string())
            .text("stage", request.stage.clone())
            .text("subject", request.subject.clone());
        if let Some(key) = &request.group_key {
            form = form.text("selected_volume_code", key.clone());
        }
        if let Some(content) = &request.file.content {
            form = form.part("file", Part::bytes(content.to_vec()).file_name(request.file.name.clone()));
        }
        let resp = self.authorize(self.client.post(url).multipart(form)).send().await.context("classify request")?;
        decode(resp, "classification").await
    }

    async fn semantic_search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let url = self.endpoint(&format!("api/rag/workspaces/{}/semantic-search", request.workspace_id))?;
        let resp = self.authorize(self.client.post(url).json(request)).send().await.context("search request")?;
        decode(resp, "semantic search").await
    }

    async fn submit_bootstrap(&self, request: &BootstrapRequest) -> Result<BootstrapSubmission> {
        let url = self.endpoint("api/rag/quick-bootstrap")?;
        let resp = self.authorize(self.client.post(url).json(request)).send().await.context("bootstrap request")?;
        decode(resp, "bootstrap submission").await
    }

    async fn bootstrap_status(&self, job: JobHandle) -> Result<BootstrapJob> {
        let url = self.endpoint(&format!("api/rag/workspaces/{}/bootstrap-jobs/{}", job.workspace_id, job.job_id))?;
        let resp = self.authorize(self.client.get(url)).send().await.context("bootstrap status request")?;
        decode(resp, "bootstrap status").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::GraphScope;

    fn response(status: u16, body: &'static str) -> Response {
        Response::from(http::Response::builder().status(status).body(body).unwrap())
    }

    #[test]
    fn endpoints_keep_the_base_path() {
        let api = HttpKnowledgeApi::new(" http://127.0.0.1:8000/kg ", Some("  ".into())).unwrap();
        assert_eq!(api.base_url().as_str(), "http://127.0.0.1:8000/kg/");
        assert!(api.token.is_none());
        assert_eq!(
            api.endpoint("api/rag/quick-bootstrap").unwrap().as_str(),
            "http://127.0.0.1:8000/kg/api/rag/quick-bootstrap"
        );

        let api = HttpKnowledgeApi::new("http://localhost:8000/", Some("secret".into())).unwrap();
        assert_eq!(api.endpoint("api/rag/workspaces/3/graph").unwrap().as_str(), "http://localhost:8000/api/rag/workspaces/3/graph");
        assert_eq!(api.token.as_deref(), Some("secret"));
        assert!(HttpKnowledgeApi::new("not a url", None).is_err());
    }

    #[test]
    fn graph_params_clamp_the_limit_and_trim_the_query() {
        let query = GraphQuery { scope: GraphScope::Mixed, limit: 5000, q: Some("  optics ".into()), ..GraphQuery::new(3) };
        let params = graph_params(&query);
        assert_eq!(
            params,
            vec![
                ("scope", "mixed".to_string()),
                ("limit", "800".to_string()),
                ("include_format_nodes", "true".to_string()),
                ("q", "optics".to_string()),
            ]
        );

        let blank = GraphQuery { limit: 1, q: Some("   ".into()), ..GraphQuery::new(3) };
        let params = graph_params(&blank);
        assert!(params.contains(&("limit", "40".to_string())));
        assert!(params.iter().all(|(k, _)| *k != "q"));
    }

    #[tokio::test]
    async fn non_success_status_reports_status_and_body() {
        let err = decode::<BootstrapJob>(response(503, "upstream down\n"), "bootstrap status").await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("bootstrap status failed: HTTP 503"), "{msg}");
        assert!(msg.ends_with("upstream down"), "{msg}");
    }

    #[tokio::test]
    async fn success_body_decodes_and_garbage_is_an_error() {
        let job: BootstrapJob = decode(
            response(200, r#"{"job_id": 7, "workspace_id": 1, "status": "processing"}"#),
            "bootstrap status",
        )
        .await
        .unwrap();
        assert_eq!(job.job_id, 7);

        let err = decode::<BootstrapJob>(response(200, "<html>"), "bootstrap status").await.unwrap_err();
        assert!(format!("{err:#}").contains("decode bootstrap status response"));
    }
}
