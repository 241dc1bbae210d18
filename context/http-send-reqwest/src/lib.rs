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

//! [`HttpSend`] implementation backed by [`reqwest`].

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::BodyExt;
use log::debug;
use reqwest::{Client, Request};
use volcsign_core::{Error, HttpSend, Result};

/// ReqwestHttpSend sends signed requests with a shared [`reqwest::Client`].
///
/// The client owns the connection pool and is safe to use from many tasks at once.
#[derive(Debug, Default, Clone)]
pub struct ReqwestHttpSend {
    client: Client,
}

impl ReqwestHttpSend {
    /// Create a new ReqwestHttpSend with a reqwest::Client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpSend for ReqwestHttpSend {
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        let req = Request::try_from(req).map_err(|e| {
            Error::request_invalid("failed to convert request for reqwest").with_source(e)
        })?;
        debug!("sending {} {}", req.method(), req.url());

        let resp: http::Response<_> = self
            .client
            .execute(req)
            .await
            .map_err(map_reqwest_error)?
            .into();

        let (parts, body) = resp.into_parts();
        let bs = BodyExt::collect(body)
            .await
            .map(|buf| buf.to_bytes())
            .map_err(|e| map_reqwest_error(e).with_status(parts.status))?;
        Ok(http::Response::from_parts(parts, bs))
    }
}

fn map_reqwest_error(err: reqwest::Error) -> Error {
    let mut e = if err.is_timeout() {
        Error::timeout(format!("http request timed out: {err}"))
    } else if err.is_connect() {
        Error::transport(format!("failed to connect: {err}"))
    } else if err.is_builder() {
        Error::request_invalid(format!("failed to build http request: {err}"))
    } else {
        Error::transport(format!("http request failed: {err}"))
    };
    if let Some(status) = err.status() {
        e = e.with_status(status);
    }
    e.with_source(err)
}
