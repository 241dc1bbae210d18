use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::{Method, Request, Response, StatusCode};
use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use serde_json::json;
use volcsign_core::hash::hex_sha256;
use volcsign_core::{Context, Error, ErrorKind, HttpSend, Result};
use volcsign_volcengine::{ApiAction, Client, Config, Query, StaticCredentialProvider};

/// Replies with a canned response and records every request it sees.
#[derive(Debug, Clone)]
struct MockHttpSend {
    status: StatusCode,
    body: &'static str,
    delay: Option<Duration>,
    fail: bool,
    requests: Arc<Mutex<Vec<Request<Bytes>>>>,
}

impl MockHttpSend {
    fn new(status: StatusCode, body: &'static str) -> Self {
        Self {
            status,
            body,
            delay: None,
            fail: false,
            requests: Arc::default(),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn failing() -> Self {
        let mut mock = Self::new(StatusCode::OK, "");
        mock.fail = true;
        mock
    }

    fn last_request(&self) -> Request<Bytes> {
        self.requests
            .lock()
            .expect("lock must not be poisoned")
            .pop()
            .expect("a request must have been sent")
    }
}

#[async_trait]
impl HttpSend for MockHttpSend {
    async fn http_send(&self, req: Request<Bytes>) -> Result<Response<Bytes>> {
        self.requests
            .lock()
            .expect("lock must not be poisoned")
            .push(req);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(Error::transport("connection reset by peer"));
        }

        Ok(Response::builder()
            .status(self.status)
            .body(Bytes::from_static(self.body.as_bytes()))?)
    }
}

fn client(mock: &MockHttpSend, config: Config) -> Result<Client> {
    let ctx = Context::new().with_http_send(mock.clone());
    let loader = StaticCredentialProvider::new("AKLTexample", "c2VjcmV0LWtleS1leGFtcGxl");
    Client::new(ctx, &config, loader)
}

const GET_ROLE_OK: &str = r#"{
    "ResponseMetadata": {"Action": "GetRole", "RequestId": "rid", "Version": "2018-01-01"},
    "Result": {"Role": {"RoleName": "demo", "Trn": "trn:iam::2100000000:role/demo"}}
}"#;

#[tokio::test]
async fn test_call_signs_and_decodes_result() -> Result<()> {
    let mock = MockHttpSend::new(StatusCode::OK, GET_ROLE_OK);
    let client = client(&mock, Config::new("iam"))?;

    let result = client.call("GetRole", &json!({"RoleName": "demo"})).await?;
    assert_eq!(result["Role"]["RoleName"], "demo");

    let req = mock.last_request();
    assert_eq!(req.method(), Method::POST);
    assert_eq!(
        req.uri().to_string(),
        "https://open.volcengineapi.com/?Action=GetRole&Version=2018-01-01"
    );
    assert_eq!(req.headers()[ACCEPT], "application/json");
    assert_eq!(req.headers()[CONTENT_TYPE], "application/json");
    assert_eq!(
        req.headers()["X-Content-Sha256"],
        hex_sha256(br#"{"RoleName":"demo"}"#).as_str()
    );
    assert!(req.headers().contains_key("X-Date"));
    assert!(req.headers()[AUTHORIZATION]
        .to_str()?
        .starts_with("HMAC-SHA256 Credential=AKLTexample/"));
    assert!(req.headers()[AUTHORIZATION]
        .to_str()?
        .contains("/cn-beijing/iam/request, SignedHeaders=content-type;host;x-content-sha256;x-date, Signature="));
    assert_eq!(&req.body()[..], br#"{"RoleName":"demo"}"#);
    Ok(())
}

#[tokio::test]
async fn test_get_action_sends_params_in_query() -> Result<()> {
    let mock = MockHttpSend::new(StatusCode::OK, r#"{"Result": {"Total": 0}}"#);
    let client = client(&mock, Config::new("iam"))?;

    let action = ApiAction::new("ListUsers").with_method(Method::GET);
    let result = client
        .call(action, &json!({"Query": "hello world", "Tags": ["b", "a"]}))
        .await?;
    assert_eq!(result, json!({"Total": 0}));

    let req = mock.last_request();
    assert_eq!(req.method(), Method::GET);
    assert_eq!(
        req.uri().query(),
        Some("Action=ListUsers&Query=hello%20world&Tags=b&Tags=a&Version=2018-01-01")
    );
    assert!(req.body().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_remote_error_is_structured() -> Result<()> {
    let mock = MockHttpSend::new(
        StatusCode::OK,
        r#"{"ResponseMetadata":{"Error":{"Code":"RoleNotExist","Message":"x"},"Action":"GetRole"}}"#,
    );
    let client = client(&mock, Config::new("iam"))?;

    let err = client
        .call("GetRole", &json!({"RoleName": "demo"}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.code(), Some("RoleNotExist"));
    assert_eq!(err.action(), Some("GetRole"));
    assert!(err.is_remote());
    assert!(!err.is_transport());
    Ok(())
}

#[tokio::test]
async fn test_null_error_in_envelope_is_success() -> Result<()> {
    let mock = MockHttpSend::new(
        StatusCode::OK,
        r#"{"ResponseMetadata":{"Action":"GetRole","RequestId":"rid","Error":null},"Result":{"Role":{"RoleName":"demo"}}}"#,
    );
    let client = client(&mock, Config::new("iam"))?;

    let result = client.call("GetRole", &json!({"RoleName": "demo"})).await?;
    assert_eq!(result["Role"]["RoleName"], "demo");
    Ok(())
}

#[tokio::test]
async fn test_remote_error_keeps_status_and_request_id() -> Result<()> {
    let mock = MockHttpSend::new(
        StatusCode::UNAUTHORIZED,
        r#"{"ResponseMetadata":{"RequestId":"rid-1","Action":"ListUsers","Error":{"Code":"SignatureDoesNotMatch","Message":"bad signature"}}}"#,
    );
    let client = client(&mock, Config::new("iam"))?;

    let err = client.call("ListUsers", &json!({})).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AccessDenied);
    assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    assert_eq!(err.request_id(), Some("rid-1"));
    Ok(())
}

#[tokio::test]
async fn test_timeout() -> Result<()> {
    let mock = MockHttpSend::new(StatusCode::OK, GET_ROLE_OK).with_delay(Duration::from_secs(5));
    let client = client(
        &mock,
        Config::new("iam").with_timeout(Duration::from_millis(20)),
    )?;

    let err = client
        .call("GetRole", &json!({"RoleName": "demo"}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(err.action(), Some("GetRole"));
    assert!(err.is_transport());
    Ok(())
}

#[tokio::test]
async fn test_transport_failure_is_not_retried() -> Result<()> {
    let mock = MockHttpSend::failing();
    let client = client(&mock, Config::new("iam"))?;

    let err = client.call("GetRole", &json!({})).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(err.action(), Some("GetRole"));
    assert_eq!(mock.requests.lock().expect("lock must not be poisoned").len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_malformed_response() -> Result<()> {
    for body in ["", "<html>bad gateway</html>"] {
        let mock = MockHttpSend::new(StatusCode::BAD_GATEWAY, body);
        let client = client(&mock, Config::new("iam"))?;

        let err = client.call("GetRole", &json!({})).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.status(), Some(StatusCode::BAD_GATEWAY));
    }
    Ok(())
}

#[tokio::test]
async fn test_execute_requires_action() -> Result<()> {
    let mock = MockHttpSend::new(StatusCode::OK, "{}");
    let client = client(&mock, Config::new("iam"))?;

    let err = client
        .execute(
            Method::GET,
            "https://open.volcengineapi.com/",
            Default::default(),
            &Query::new(),
            Bytes::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RequestInvalid);
    Ok(())
}

#[tokio::test]
async fn test_execute_rejects_url_with_query() -> Result<()> {
    let mock = MockHttpSend::new(StatusCode::OK, "{}");
    let client = client(&mock, Config::new("iam"))?;

    let err = client
        .execute(
            Method::GET,
            "https://open.volcengineapi.com/?x=1",
            Default::default(),
            &Query::for_action("ListUsers", "2018-01-01", Query::new()),
            Bytes::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RequestInvalid);
    assert_eq!(err.action(), Some("ListUsers"));
    assert!(mock.requests.lock().expect("lock must not be poisoned").is_empty());
    Ok(())
}

#[tokio::test]
async fn test_call_with_query_sends_query_and_body() -> Result<()> {
    let mock = MockHttpSend::new(StatusCode::OK, GET_ROLE_OK);
    let client = client(&mock, Config::new("iam"))?;

    let query = Query::new()
        .with("ProjectName", "default project")
        .with("Action", "Ignored");
    let result = client
        .call_with_query("GetRole", query, &json!({"RoleName": "demo"}))
        .await?;
    assert_eq!(result["Role"]["RoleName"], "demo");

    let req = mock.last_request();
    assert_eq!(req.method(), Method::POST);
    assert_eq!(
        req.uri().query(),
        Some("Action=GetRole&ProjectName=default%20project&Version=2018-01-01")
    );
    assert_eq!(&req.body()[..], br#"{"RoleName":"demo"}"#);
    Ok(())
}

#[tokio::test]
async fn test_get_action_merges_query_and_params() -> Result<()> {
    let mock = MockHttpSend::new(StatusCode::OK, r#"{"Result": {}}"#);
    let client = client(&mock, Config::new("iam"))?;

    client
        .call_with_query(
            ApiAction::new("ListUsers").with_method(Method::GET),
            Query::new().with("Limit", "10"),
            &json!({"Query": "demo"}),
        )
        .await?;

    let req = mock.last_request();
    assert_eq!(
        req.uri().query(),
        Some("Action=ListUsers&Limit=10&Query=demo&Version=2018-01-01")
    );
    assert!(req.body().is_empty());
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetRoleRequest {
    role_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetRoleResponse {
    role: Role,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Role {
    role_name: String,
    trn: String,
}

#[tokio::test]
async fn test_invoke_typed() -> Result<()> {
    let mock = MockHttpSend::new(StatusCode::OK, GET_ROLE_OK);
    let client = client(&mock, Config::new("iam"))?;

    let resp: GetRoleResponse = client
        .invoke(
            "GetRole",
            &GetRoleRequest {
                role_name: "demo".to_string(),
            },
        )
        .await?;
    assert_eq!(resp.role.role_name, "demo");
    assert_eq!(resp.role.trn, "trn:iam::2100000000:role/demo");
    Ok(())
}

#[tokio::test]
async fn test_invoke_with_query() -> Result<()> {
    let mock = MockHttpSend::new(StatusCode::OK, GET_ROLE_OK);
    let client = client(&mock, Config::new("iam"))?;

    let resp: GetRoleResponse = client
        .invoke_with_query(
            "GetRole",
            Query::new().with("ProjectName", "default"),
            &GetRoleRequest {
                role_name: "demo".to_string(),
            },
        )
        .await?;
    assert_eq!(resp.role.role_name, "demo");

    let req = mock.last_request();
    assert_eq!(
        req.uri().query(),
        Some("Action=GetRole&ProjectName=default&Version=2018-01-01")
    );
    assert_eq!(&req.body()[..], br#"{"RoleName":"demo"}"#);
    Ok(())
}

#[tokio::test]
async fn test_invoke_with_unexpected_result() -> Result<()> {
    let mock = MockHttpSend::new(StatusCode::OK, r#"{"Result": {"Unexpected": true}}"#);
    let client = client(&mock, Config::new("iam"))?;

    let err = client
        .invoke::<GetRoleResponse>(
            "GetRole",
            &GetRoleRequest {
                role_name: "demo".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    Ok(())
}

#[tokio::test]
async fn test_endpoint_follows_config() -> Result<()> {
    let mock = MockHttpSend::new(StatusCode::OK, "{}");
    let client = client(&mock, Config::new("cr").with_region("cn-shanghai"))?;

    client
        .call(ApiAction::new("ListRegistries"), &json!({}))
        .await?;

    let req = mock.last_request();
    assert_eq!(
        req.uri().to_string(),
        "https://cr.cn-shanghai.volcengineapi.com/?Action=ListRegistries&Version=2022-05-12"
    );
    assert!(req.headers()[AUTHORIZATION]
        .to_str()?
        .contains("/cn-shanghai/cr/request"));
    Ok(())
}
