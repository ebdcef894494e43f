use crate::{
    AddKeyRequest, AdminApi, AdminConfig, AdminError, AllowBucketKeyRequest, ApiResponse,
    BucketInfo, BucketSummary, CallContext, CreateBucketRequest, KeyInfo, STATUS_OK,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Read;

/// Blocking client for the Garage admin API v1.
///
/// Routes used:
/// - `GET    /v1/bucket`              — list buckets
/// - `POST   /v1/bucket`              — create bucket
/// - `DELETE /v1/bucket?id=<id>`      — delete bucket
/// - `POST   /v1/key`                 — create access key
/// - `POST   /v1/bucket/allow`        — bind key to bucket
/// - `DELETE /v1/key?id=<id>`         — delete access key
///
/// Every status is handed back to the caller; only transport problems
/// become [`AdminError`].
pub struct HttpAdminClient {
    config: AdminConfig,
    agent: ureq::Agent,
}

impl HttpAdminClient {
    pub fn new(config: AdminConfig) -> Self {
        let mut builder = ureq::Agent::config_builder().http_status_as_error(false);
        if !config.tls_verify {
            builder = builder.tls_config(
                ureq::tls::TlsConfig::builder()
                    .disable_verification(true)
                    .build(),
            );
        }
        let agent: ureq::Agent = builder.build().into();
        Self { config, agent }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.endpoint)
    }

    fn decorate<B>(
        &self,
        ctx: &CallContext,
        req: ureq::RequestBuilder<B>,
    ) -> ureq::RequestBuilder<B> {
        let mut req = req.header("Accept", "application/json");
        if let Some(ref token) = self.config.token {
            req = req.header("Authorization", &format!("Bearer {token}"));
        }
        if let Some(remaining) = ctx.remaining() {
            req = req.config().timeout_global(Some(remaining)).build();
        }
        req
    }

    fn do_get(&self, ctx: &CallContext, path: &str) -> Result<(u16, Vec<u8>), AdminError> {
        ctx.check()?;
        let url = self.url(path);
        tracing::debug!("GET {url}");
        let req = self.decorate(ctx, self.agent.get(&url));
        finish(ctx, req.call())
    }

    fn do_delete(
        &self,
        ctx: &CallContext,
        path: &str,
        id: &str,
    ) -> Result<(u16, Vec<u8>), AdminError> {
        ctx.check()?;
        let url = self.url(path);
        tracing::debug!("DELETE {url}?id={id}");
        let req = self.decorate(ctx, self.agent.delete(&url)).query("id", id);
        finish(ctx, req.call())
    }

    fn do_post(
        &self,
        ctx: &CallContext,
        path: &str,
        body: &impl Serialize,
    ) -> Result<(u16, Vec<u8>), AdminError> {
        ctx.check()?;
        let data = serde_json::to_vec(body).map_err(|e| AdminError::Decode(e.to_string()))?;
        let url = self.url(path);
        tracing::debug!("POST {url} ({} bytes)", data.len());
        let req = self
            .decorate(ctx, self.agent.post(&url))
            .header("Content-Type", "application/json");
        finish(ctx, req.send(&data[..]))
    }
}

fn finish(
    ctx: &CallContext,
    result: Result<ureq::http::Response<ureq::Body>, ureq::Error>,
) -> Result<(u16, Vec<u8>), AdminError> {
    let resp = match result {
        Ok(r) => r,
        Err(ureq::Error::Timeout(_)) => return Err(AdminError::DeadlineExceeded),
        Err(e) => return Err(AdminError::Transport(e.to_string())),
    };
    // A call cancelled while in flight must not report its outcome.
    ctx.check()?;

    let code = resp.status().as_u16();
    let mut reader = resp.into_body().into_reader();
    let mut body = Vec::new();
    reader
        .read_to_end(&mut body)
        .map_err(|e| AdminError::Transport(e.to_string()))?;
    Ok((code, body))
}

fn decode<T: DeserializeOwned>(
    (code, body): (u16, Vec<u8>),
) -> Result<ApiResponse<T>, AdminError> {
    if code != STATUS_OK {
        return Ok(ApiResponse::empty(code));
    }
    let value = serde_json::from_slice(&body).map_err(|e| AdminError::Decode(e.to_string()))?;
    Ok(ApiResponse::ok(value))
}

fn status_only((code, _): (u16, Vec<u8>)) -> ApiResponse<()> {
    ApiResponse::empty(code)
}

impl AdminApi for HttpAdminClient {
    fn list_buckets(
        &self,
        ctx: &CallContext,
    ) -> Result<ApiResponse<Vec<BucketSummary>>, AdminError> {
        decode(self.do_get(ctx, "/v1/bucket")?)
    }

    fn create_bucket(
        &self,
        ctx: &CallContext,
        req: &CreateBucketRequest,
    ) -> Result<ApiResponse<BucketInfo>, AdminError> {
        decode(self.do_post(ctx, "/v1/bucket", req)?)
    }

    fn delete_bucket(&self, ctx: &CallContext, id: &str) -> Result<ApiResponse<()>, AdminError> {
        Ok(status_only(self.do_delete(ctx, "/v1/bucket", id)?))
    }

    fn add_key(
        &self,
        ctx: &CallContext,
        req: &AddKeyRequest,
    ) -> Result<ApiResponse<KeyInfo>, AdminError> {
        decode(self.do_post(ctx, "/v1/key", req)?)
    }

    fn allow_bucket_key(
        &self,
        ctx: &CallContext,
        req: &AllowBucketKeyRequest,
    ) -> Result<ApiResponse<()>, AdminError> {
        Ok(status_only(self.do_post(ctx, "/v1/bucket/allow", req)?))
    }

    fn delete_key(&self, ctx: &CallContext, id: &str) -> Result<ApiResponse<()>, AdminError> {
        Ok(status_only(self.do_delete(ctx, "/v1/key", id)?))
    }
}
