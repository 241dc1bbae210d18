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

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE, HOST};
use http::request::Parts;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use log::debug;
use volcsign_core::hash::{hex_hmac_sha256, hex_sha256};
use volcsign_core::time::{format_date, format_iso8601, now, parse_iso8601, DateTime};
use volcsign_core::{Context, Error, Result, SignRequest, SigningCredential, SigningRequest};

use crate::canonical::{CanonicalHeaders, CanonicalRequest, Query};
use crate::constants::{
    ALGORITHM, DEFAULT_CONTENT_TYPE, SIGNED_HEADERS, X_CONTENT_SHA256, X_DATE, X_SECURITY_TOKEN,
};
use crate::key::{credential_scope, derive_signing_key};
use crate::Credential;

/// Everything about one request that goes into its signature.
///
/// Built once per request and read-only afterwards; signing never consults anything else.
#[derive(Debug, Clone)]
pub struct SigningContext {
    method: Method,
    host: String,
    path: String,
    query: Query,
    content_type: String,
    body: Bytes,
    body_sha256: Option<String>,
    timestamp: DateTime,
}

impl SigningContext {
    /// Create a context for `method` against `host` at `timestamp`.
    ///
    /// Defaults: path `/`, empty query, `application/json` content type, empty body.
    pub fn new(method: Method, host: impl Into<String>, timestamp: DateTime) -> Self {
        Self {
            method,
            host: host.into(),
            path: "/".to_string(),
            query: Query::new(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            body: Bytes::new(),
            body_sha256: None,
            timestamp,
        }
    }

    /// Set the request path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the query, including `Action` and `Version`.
    pub fn with_query(mut self, query: Query) -> Self {
        self.query = query;
        self
    }

    /// Set the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Set the raw body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self.body_sha256 = None;
        self
    }

    /// Use an already computed hex SHA-256 of the body instead of hashing the body.
    pub fn with_body_sha256(mut self, hash: impl Into<String>) -> Self {
        self.body_sha256 = Some(hash.into());
        self
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Host, as signed and as sent in the `Host` header.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Request path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query parameters.
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Content type.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Raw body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Signing time.
    pub fn timestamp(&self) -> DateTime {
        self.timestamp
    }

    /// Lowercase hex SHA-256 of the body.
    pub fn body_sha256(&self) -> String {
        match &self.body_sha256 {
            Some(hash) => hash.clone(),
            None => hex_sha256(&self.body),
        }
    }

    /// Canonicalize this request.
    pub fn canonical_request(&self) -> Result<CanonicalRequest> {
        let x_date = format_iso8601(self.timestamp);
        CanonicalRequest::new(
            &self.method,
            &self.path,
            &self.query,
            CanonicalHeaders {
                content_type: &self.content_type,
                host: &self.host,
                x_date: &x_date,
            },
            self.body_sha256(),
        )
    }
}

/// The signature of one request.
///
/// Fully determined by the credential, the signer's scope and the [`SigningContext`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Always `HMAC-SHA256`.
    pub algorithm: &'static str,
    /// `date8/region/service/request`.
    pub credential_scope: String,
    /// Always `content-type;host;x-content-sha256;x-date`.
    pub signed_headers: &'static str,
    /// Lowercase hex HMAC-SHA256 of the string to sign, 64 characters.
    pub signature_hex: String,
    /// Value of `X-Date`.
    pub x_date: String,
    /// Value of `X-Content-Sha256`.
    pub content_sha256: String,
}

impl Signature {
    /// The `Authorization` header value.
    ///
    /// `HMAC-SHA256 Credential=<ak>/<scope>, SignedHeaders=<headers>, Signature=<hex>`
    pub fn authorization(&self, access_key_id: &str) -> String {
        format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            self.algorithm,
            access_key_id,
            self.credential_scope,
            self.signed_headers,
            self.signature_hex
        )
    }
}

/// Build the string to sign.
///
/// ```text
/// HMAC-SHA256
/// 20240315T083045Z
/// 20240315/cn-beijing/iam/request
/// <hex sha256 of the canonical request>
/// ```
pub fn string_to_sign(x_date: &str, scope: &str, hashed_canonical_request: &str) -> String {
    let mut f = String::with_capacity(
        ALGORITHM.len() + x_date.len() + scope.len() + hashed_canonical_request.len() + 3,
    );
    f.push_str(ALGORITHM);
    f.push('\n');
    f.push_str(x_date);
    f.push('\n');
    f.push_str(scope);
    f.push('\n');
    f.push_str(hashed_canonical_request);
    f
}

/// RequestSigner that implements the Volcengine OpenAPI `HMAC-SHA256` signature.
///
/// A signer is bound to one service and region; it holds no per-request state, so one
/// instance can sign any number of requests concurrently.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    service: String,
    region: String,

    time: Option<DateTime>,
}

impl RequestSigner {
    /// Create a new signer for `service` in `region`.
    pub fn new(service: &str, region: &str) -> Self {
        Self {
            service: service.into(),
            region: region.into(),

            time: None,
        }
    }

    /// The service code the signature is scoped to.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// The region the signature is scoped to.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Specify the signing time.
    ///
    /// # Note
    ///
    /// We should always take current time to sign requests.
    /// Only use this function for testing.
    #[cfg(test)]
    pub fn with_time(mut self, time: DateTime) -> Self {
        self.time = Some(time);
        self
    }

    /// Compute the signature of `ctx` with `cred`.
    ///
    /// Pure: the result depends on nothing but the arguments and the signer's scope.
    pub fn sign(&self, cred: &Credential, ctx: &SigningContext) -> Result<Signature> {
        if !cred.is_valid() {
            return Err(Error::credential_invalid(
                "access key id and secret access key must not be empty",
            ));
        }

        let creq = ctx.canonical_request()?;
        debug!("calculated canonical request: {creq}");

        let x_date = format_iso8601(ctx.timestamp());
        let date8 = format_date(ctx.timestamp());

        let scope = credential_scope(&date8, &self.region, &self.service);
        debug!("calculated scope: {scope}");

        let string_to_sign = string_to_sign(&x_date, &scope, &creq.hashed());
        debug!("calculated string to sign: {string_to_sign}");

        let signing_key =
            derive_signing_key(&cred.secret_access_key, &date8, &self.region, &self.service);
        let signature_hex = hex_hmac_sha256(signing_key.as_bytes(), string_to_sign.as_bytes());

        Ok(Signature {
            algorithm: ALGORITHM,
            credential_scope: scope,
            signed_headers: SIGNED_HEADERS,
            signature_hex,
            x_date,
            content_sha256: creq.body_hash().to_string(),
        })
    }

    /// Sign `ctx` and return the headers to merge into the outgoing request:
    /// `Host`, `X-Content-Sha256`, `X-Date`, `Content-Type`, `Authorization`, and
    /// `X-Security-Token` when the credential carries a session token.
    pub fn signed_headers(&self, cred: &Credential, ctx: &SigningContext) -> Result<HeaderMap> {
        let signature = self.sign(cred, ctx)?;

        let mut headers = HeaderMap::with_capacity(6);
        insert_signature_headers(&mut headers, cred, ctx, &signature)?;
        Ok(headers)
    }
}

fn insert_signature_headers(
    headers: &mut HeaderMap,
    cred: &Credential,
    ctx: &SigningContext,
    signature: &Signature,
) -> Result<()> {
    headers.insert(HOST, HeaderValue::from_str(ctx.host())?);
    headers.insert(
        HeaderName::from_static(X_CONTENT_SHA256),
        HeaderValue::from_str(&signature.content_sha256)?,
    );
    headers.insert(
        HeaderName::from_static(X_DATE),
        HeaderValue::from_str(&signature.x_date)?,
    );
    headers.insert(CONTENT_TYPE, HeaderValue::from_str(ctx.content_type())?);

    let mut authorization = HeaderValue::from_str(&signature.authorization(&cred.access_key_id))?;
    authorization.set_sensitive(true);
    headers.insert(AUTHORIZATION, authorization);

    // The session token travels next to the signature but is not one of the signed headers.
    if let Some(token) = &cred.session_token {
        let mut value = HeaderValue::from_str(token)?;
        value.set_sensitive(true);
        headers.insert(HeaderName::from_static(X_SECURITY_TOKEN), value);
    }

    Ok(())
}

#[async_trait]
impl SignRequest for RequestSigner {
    type Credential = Credential;

    async fn sign_request(
        &self,
        _: &Context,
        req: &mut Parts,
        credential: Option<&Self::Credential>,
        expires_in: Option<Duration>,
    ) -> Result<()> {
        if expires_in.is_some() {
            return Err(Error::request_invalid(
                "query string signing is not supported by the HMAC-SHA256 protocol",
            ));
        }
        let cred = credential.ok_or_else(|| Error::credential_invalid("missing credential"))?;

        let mut signed_req = SigningRequest::build(req)?;

        let timestamp = match signed_req.headers.get(X_DATE) {
            Some(v) => parse_iso8601(v.to_str()?)?,
            None => self.time.unwrap_or_else(now),
        };
        let host = match signed_req.headers.get(HOST) {
            Some(v) => v.to_str()?.to_string(),
            None => signed_req.authority.as_str().to_string(),
        };
        let content_type = match signed_req.header_get_or_default(&CONTENT_TYPE)? {
            "" => DEFAULT_CONTENT_TYPE.to_string(),
            v => v.to_string(),
        };
        let body_sha256 =
            match signed_req.header_get_or_default(&HeaderName::from_static(X_CONTENT_SHA256))? {
                "" => hex_sha256(b""),
                v => v.to_string(),
            };

        let ctx = SigningContext::new(signed_req.method.clone(), host, timestamp)
            .with_path(signed_req.path.clone())
            .with_query(Query::from_pairs(signed_req.query.drain(..)))
            .with_content_type(content_type)
            .with_body_sha256(body_sha256);

        let signature = self.sign(cred, &ctx)?;
        insert_signature_headers(&mut signed_req.headers, cred, &ctx, &signature)?;

        let query = ctx.query().normalize();
        signed_req.apply(req, &query)
    }
}
