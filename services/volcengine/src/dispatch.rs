// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use std::fmt::{Display, Formatter};
use std::time::Duration;

use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use volcsign_core::hash::hex_sha256;
use volcsign_core::{Context, Error, ProvideCredential, Result, Signer};

use crate::canonical::{Query, QueryValue};
use crate::constants::{DEFAULT_CONTENT_TYPE, QUERY_ACTION, X_CONTENT_SHA256};
use crate::{Config, Credential, Endpoint, RequestSigner};

/// One API action: its name plus the method and path it is called with.
///
/// A bare name means `POST /`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiAction {
    /// Action name, sent as the `Action` query parameter.
    pub name: String,
    /// HTTP method.
    pub method: Method,
    /// Request path.
    pub path: String,
}

impl ApiAction {
    /// Create a `POST /` action.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method: Method::POST,
            path: "/".to_string(),
        }
    }

    /// Set the method.
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Set the path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }
}

impl From<&str> for ApiAction {
    fn from(name: &str) -> Self {
        ApiAction::new(name)
    }
}

impl From<String> for ApiAction {
    fn from(name: String) -> Self {
        ApiAction::new(name)
    }
}

impl Display for ApiAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.name, self.method, self.path)
    }
}

/// Client signs calls to one service and checks their response envelope.
///
/// No retry happens here. Callers that want retries wrap these calls with their own backoff,
/// checking [`Error::is_transport`] first.
#[derive(Debug, Clone)]
pub struct Client {
    signer: Signer<Credential>,
    endpoint: Endpoint,
    timeout: Duration,
}

impl Client {
    /// Create a client for the service resolved from `config`.
    ///
    /// `ctx` must carry an [`HttpSend`](volcsign_core::HttpSend) to actually send requests.
    pub fn new(
        ctx: Context,
        config: &Config,
        provider: impl ProvideCredential<Credential = Credential>,
    ) -> Result<Self> {
        let endpoint = config.endpoint()?;
        let builder = RequestSigner::new(&endpoint.service, &endpoint.region);

        Ok(Self {
            signer: Signer::new(ctx, provider, builder),
            endpoint,
            timeout: config.timeout(),
        })
    }

    /// The endpoint this client calls.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Timeout of one call.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sign and send a request, returning the decoded response once its envelope is checked.
    ///
    /// `url` is the base url without query, a url that carries one is rejected: `query` must
    /// already contain `Action`, `Version` and every other parameter.
    /// `Accept` and `Content-Type` default to `application/json` when `headers` lacks them.
    pub async fn execute(
        &self,
        method: Method,
        url: &str,
        mut headers: HeaderMap,
        query: &Query,
        body: Bytes,
    ) -> Result<Value> {
        let action = match query.get(QUERY_ACTION) {
            Some(QueryValue::Single(name)) => name.clone(),
            _ => return Err(Error::request_invalid("query must contain exactly one Action")),
        };

        if url.contains('?') {
            return Err(Error::request_invalid(format!(
                "url must not carry a query, pass its parameters in query instead: {url}"
            ))
            .with_action(&action));
        }

        let uri = if query.is_empty() {
            url.to_string()
        } else {
            format!("{url}?{}", query.normalize())
        };

        if !headers.contains_key(ACCEPT) {
            headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
        }
        if !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
        }
        headers.insert(
            HeaderName::from_static(X_CONTENT_SHA256),
            HeaderValue::from_str(&hex_sha256(&body))?,
        );

        let mut req = Request::builder().method(method).uri(uri).body(body)?;
        *req.headers_mut() = headers;

        let (mut parts, body) = req.into_parts();
        self.signer
            .sign(&mut parts, None)
            .await
            .map_err(|err| err.with_action(&action))?;
        let req = Request::from_parts(parts, body);

        debug!("dispatching {action} to {}", self.endpoint);
        let resp = tokio::time::timeout(self.timeout, self.signer.context().http_send(req))
            .await
            .map_err(|_| {
                Error::timeout(format!("{action} timed out after {:?}", self.timeout))
                    .with_action(&action)
            })?
            .map_err(|err| err.with_action(&action))?;

        let status = resp.status();
        let body = resp.into_body();
        debug!("{action} responded with {status}, {} bytes", body.len());

        let value = decode_response(&action, status, &body)?;
        check_error(&action, status, &value)?;

        if !status.is_success() {
            return Err(Error::transport(format!(
                "{action} responded with {status} without an error envelope"
            ))
            .with_action(&action)
            .with_status(status));
        }
        Ok(value)
    }

    /// Call `action` with `params`, returning the `Result` object of the response.
    ///
    /// `params` is sent as the JSON body, except for `GET` actions where its fields become
    /// query parameters. An absent `Result` is returned as an empty object.
    pub async fn call(&self, action: impl Into<ApiAction>, params: &Value) -> Result<Value> {
        self.call_with_query(action, Query::new(), params).await
    }

    /// [`Client::call`] with extra query parameters sent next to the body.
    ///
    /// `Action` and `Version` in `query` are replaced by the action's own.
    pub async fn call_with_query(
        &self,
        action: impl Into<ApiAction>,
        query: Query,
        params: &Value,
    ) -> Result<Value> {
        let action = action.into();

        let (extra, body) = if action.method == Method::GET {
            (query.merge(Query::from_json(params)?), Bytes::new())
        } else {
            (query, Bytes::from(serde_json::to_vec(params)?))
        };
        let query = Query::for_action(&action.name, &self.endpoint.api_version, extra);
        let url = format!("{}{}", self.endpoint.base_url(), action.path);

        let mut value = self
            .execute(action.method.clone(), &url, HeaderMap::new(), &query, body)
            .await?;

        Ok(match value.get_mut("Result") {
            Some(result) => result.take(),
            None => Value::Object(Default::default()),
        })
    }

    /// Call `action` with a typed request and decode the `Result` object into `T`.
    pub async fn invoke<T: DeserializeOwned>(
        &self,
        action: impl Into<ApiAction>,
        request: &impl Serialize,
    ) -> Result<T> {
        self.invoke_with_query(action, Query::new(), request).await
    }

    /// [`Client::invoke`] with extra query parameters sent next to the body.
    pub async fn invoke_with_query<T: DeserializeOwned>(
        &self,
        action: impl Into<ApiAction>,
        query: Query,
        request: &impl Serialize,
    ) -> Result<T> {
        let action = action.into();
        let name = action.name.clone();

        let params = serde_json::to_value(request)
            .map_err(|err| Error::request_invalid(format!("{name} request is not valid json: {err}")))?;
        let result = self.call_with_query(action, query, &params).await?;

        serde_json::from_value(result).map_err(|err| {
            Error::transport(format!("{name} result can not be decoded: {err}"))
                .with_action(&name)
                .with_source(err)
        })
    }
}

fn decode_response(action: &str, status: StatusCode, body: &[u8]) -> Result<Value> {
    if body.is_empty() {
        return Err(Error::transport(format!("{action} responded with an empty body"))
            .with_action(action)
            .with_status(status));
    }

    serde_json::from_slice(body).map_err(|err| {
        Error::transport(format!("{action} responded with malformed json: {err}"))
            .with_action(action)
            .with_status(status)
            .with_source(err)
    })
}

/// Check the `ResponseMetadata.Error` object of a decoded response.
///
/// `action` is used when the envelope does not name the action itself.
pub fn check_error(action: &str, status: StatusCode, value: &Value) -> Result<()> {
    let Some(metadata) = value.get("ResponseMetadata") else {
        return Ok(());
    };
    // `"Error": null` and `"Error": {}` show up in successful responses.
    let Some(error) = metadata
        .get("Error")
        .filter(|e| e.as_object().is_some_and(|o| !o.is_empty()))
    else {
        return Ok(());
    };

    let action = metadata
        .get("Action")
        .and_then(Value::as_str)
        .unwrap_or(action);
    let code = error
        .get("Code")
        .and_then(Value::as_str)
        .unwrap_or("Unknown");
    let message = error
        .get("Message")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let status = (!status.is_success()).then_some(status);
    let mut err = Error::remote(action, code, message, status);
    if let Some(request_id) = metadata.get("RequestId").and_then(Value::as_str) {
        err = err.with_request_id(request_id);
    }

    warn!("{err}");
    Err(err)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use test_case::test_case;
    use volcsign_core::ErrorKind;

    use super::*;

    #[test]
    fn test_api_action() {
        let action = ApiAction::from("GetRole");
        assert_eq!(action.method, Method::POST);
        assert_eq!(action.path, "/");

        let action = ApiAction::new("ListUsers")
            .with_method(Method::GET)
            .with_path("/v2");
        assert_eq!(action.to_string(), "ListUsers GET /v2");
    }

    #[test]
    fn test_check_error_without_error() -> Result<()> {
        let value = json!({
            "ResponseMetadata": {"Action": "GetRole", "RequestId": "rid"},
            "Result": {"RoleName": "demo"}
        });
        check_error("GetRole", StatusCode::OK, &value)?;
        check_error("GetRole", StatusCode::OK, &json!({}))
    }

    #[test_case(json!(null); "null")]
    #[test_case(json!({}); "empty object")]
    #[test_case(json!(""); "empty string")]
    fn test_check_error_with_empty_error(error: Value) {
        let value = json!({
            "ResponseMetadata": {"Action": "GetRole", "RequestId": "rid", "Error": error},
            "Result": {"Role": {"RoleName": "demo"}}
        });
        assert!(check_error("GetRole", StatusCode::OK, &value).is_ok());
    }

    #[test]
    fn test_check_error_role_not_exist() {
        let value = json!({
            "ResponseMetadata": {
                "Error": {"Code": "RoleNotExist", "Message": "x"},
                "Action": "GetRole"
            }
        });
        let err = check_error("Unused", StatusCode::OK, &value).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.code(), Some("RoleNotExist"));
        assert_eq!(err.action(), Some("GetRole"));
        assert_eq!(err.message(), "GetRole failed: RoleNotExist: x");
        assert_eq!(err.status(), None);
        assert!(err.is_remote());
    }

    #[test_case("AlreadyExists.Registry", StatusCode::OK, ErrorKind::AlreadyExists; "already exists")]
    #[test_case("SignatureDoesNotMatch", StatusCode::UNAUTHORIZED, ErrorKind::AccessDenied; "signature")]
    #[test_case("InvalidParameter", StatusCode::BAD_REQUEST, ErrorKind::RemoteApi; "business")]
    #[test_case("Whatever", StatusCode::NOT_FOUND, ErrorKind::NotFound; "status not found")]
    fn test_check_error_kind(code: &str, status: StatusCode, kind: ErrorKind) {
        let value = json!({
            "ResponseMetadata": {
                "RequestId": "20240315083045",
                "Error": {"Code": code, "Message": "m"}
            }
        });
        let err = check_error("CreateRegistry", status, &value).unwrap_err();

        assert_eq!(err.kind(), kind);
        assert_eq!(err.action(), Some("CreateRegistry"));
        assert_eq!(err.request_id(), Some("20240315083045"));
    }

    #[test]
    fn test_decode_response() {
        let err = decode_response("GetRole", StatusCode::OK, b"").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);

        let err = decode_response("GetRole", StatusCode::BAD_GATEWAY, b"<html>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.status(), Some(StatusCode::BAD_GATEWAY));
    }
}
