//! Volcengine OpenAPI signing implementation for volcsign.
//!
//! This crate signs requests to Volcengine OpenAPI services (IAM, STS, CR, ...) with the
//! `HMAC-SHA256` protocol, and dispatches them through a [`Client`] that turns the response
//! envelope into structured errors.
//!
//! ## Overview
//!
//! Signing is split into small pure steps:
//!
//! - [`canonicalize`] normalizes method, path, query, the four signed headers and the body
//!   hash into a [`CanonicalRequest`].
//! - [`derive_signing_key`] runs the HMAC chain `date -> region -> service -> "request"`
//!   rooted at the secret access key.
//! - [`RequestSigner::sign`] builds the string to sign and returns a [`Signature`], whose
//!   [`Signature::authorization`] is the `Authorization` header value.
//!
//! All per-request inputs live in a [`SigningContext`]; nothing is shared between calls, so
//! one [`RequestSigner`] can be used from any number of threads.
//!
//! ## Quick Start
//!
//! ```no_run
//! use volcsign_core::{Context, Result, Signer};
//! use volcsign_http_send_reqwest::ReqwestHttpSend;
//! use volcsign_volcengine::{RequestSigner, StaticCredentialProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let ctx = Context::new().with_http_send(ReqwestHttpSend::default());
//!
//!     let loader = StaticCredentialProvider::new("your-access-key-id", "your-secret-access-key");
//!     let builder = RequestSigner::new("iam", "cn-beijing");
//!     let signer = Signer::new(ctx, loader, builder);
//!
//!     let mut req = http::Request::get(
//!         "https://open.volcengineapi.com/?Action=ListUsers&Version=2018-01-01",
//!     )
//!     .body(())?
//!     .into_parts()
//!     .0;
//!
//!     signer.sign(&mut req, None).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Calling APIs
//!
//! ```no_run
//! use serde_json::{json, Value};
//! use volcsign_core::{Context, OsEnv, Result};
//! use volcsign_http_send_reqwest::ReqwestHttpSend;
//! use volcsign_volcengine::{Client, Config, StaticCredentialProvider};
//!
//! # async fn example() -> Result<()> {
//! let ctx = Context::new()
//!     .with_http_send(ReqwestHttpSend::default())
//!     .with_env(OsEnv);
//! let config = Config::new("iam").from_env(&ctx);
//! let client = Client::new(ctx, &config, StaticCredentialProvider::new("ak", "sk"))?;
//!
//! let role: Value = client.call("GetRole", &json!({"RoleName": "demo"})).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Errors
//!
//! A `ResponseMetadata.Error` object in the response surfaces as an error carrying the
//! action, the remote code and the message. Branch on [`volcsign_core::ErrorKind`]:
//!
//! ```no_run
//! # use volcsign_core::{ErrorKind, Result};
//! # async fn example(client: volcsign_volcengine::Client) -> Result<()> {
//! match client.call("GetRole", &serde_json::json!({"RoleName": "demo"})).await {
//!     Ok(role) => println!("{role}"),
//!     Err(err) if err.kind() == ErrorKind::NotFound => println!("no such role"),
//!     Err(err) => return Err(err),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Session Tokens
//!
//! A session token is sent as `X-Security-Token`. It is not one of the signed headers.

#![warn(missing_docs)]

mod constants;

mod canonical;
pub use canonical::{canonicalize, CanonicalHeaders, CanonicalRequest, Query, QueryValue};

mod key;
pub use key::{credential_scope, derive_signing_key, SigningKey};

mod credential;
pub use credential::Credential;

mod sign_request;
pub use sign_request::{string_to_sign, RequestSigner, Signature, SigningContext};

mod config;
pub use config::{Config, Endpoint};

mod dispatch;
pub use dispatch::{check_error, ApiAction, Client};

mod provide_credential;
pub use provide_credential::*;
