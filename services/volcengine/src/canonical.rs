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

//! Canonicalization of a request into the string that gets hashed and signed.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Write};

use http::Method;
use percent_encoding::utf8_percent_encode;
use serde_json::Value;
use volcsign_core::hash::hex_sha256;
use volcsign_core::{Error, Result};

use crate::constants::{QUERY_ACTION, QUERY_ENCODE_SET, QUERY_VERSION, SIGNED_HEADERS};

/// A query value: either one string or a sequence of strings sent as repeated keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    /// `key=value`
    Single(String),
    /// `key=v1&key=v2`, in the given order.
    Multi(Vec<String>),
}

impl QueryValue {
    /// Iterate over the raw values.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let values: &[String] = match self {
            QueryValue::Single(v) => std::slice::from_ref(v),
            QueryValue::Multi(vs) => vs,
        };
        values.iter().map(String::as_str)
    }

    fn push(&mut self, value: String) {
        match self {
            QueryValue::Single(v) => *self = QueryValue::Multi(vec![std::mem::take(v), value]),
            QueryValue::Multi(vs) => vs.push(value),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(v: &str) -> Self {
        QueryValue::Single(v.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(v: String) -> Self {
        QueryValue::Single(v)
    }
}

impl From<Vec<String>> for QueryValue {
    fn from(v: Vec<String>) -> Self {
        QueryValue::Multi(v)
    }
}

impl From<Vec<&str>> for QueryValue {
    fn from(v: Vec<&str>) -> Self {
        QueryValue::Multi(v.into_iter().map(String::from).collect())
    }
}

/// Query parameters of a request, keyed by raw (unencoded) name.
///
/// Iteration order of whatever the query was built from never leaks into the normalized
/// form: see [`Query::normalize`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query(BTreeMap<String, QueryValue>);

impl Query {
    /// Create an empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the query of an API call: `Action` and `Version` are injected on top of
    /// `params`, replacing any caller-supplied value for those two keys.
    pub fn for_action(action: &str, version: &str, params: Query) -> Self {
        params
            .with(QUERY_ACTION, action)
            .with(QUERY_VERSION, version)
    }

    /// Build a query from a JSON object whose values are strings or arrays of strings.
    ///
    /// Any other value is a caller error and reported as [`volcsign_core::ErrorKind::RequestInvalid`].
    pub fn from_json(value: &Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(Error::request_invalid(format!(
                "query must be a json object, got {value}"
            )));
        };

        let mut query = Query::new();
        for (k, v) in map {
            let v = match v {
                Value::String(s) => QueryValue::Single(s.clone()),
                Value::Array(items) => QueryValue::Multi(
                    items
                        .iter()
                        .map(|item| match item {
                            Value::String(s) => Ok(s.clone()),
                            other => Err(Error::request_invalid(format!(
                                "query value of {k:?} must be a string, got {other}"
                            ))),
                        })
                        .collect::<Result<Vec<_>>>()?,
                ),
                other => {
                    return Err(Error::request_invalid(format!(
                        "query value of {k:?} must be a string or a list of strings, got {other}"
                    )))
                }
            };
            query.insert(k.clone(), v);
        }
        Ok(query)
    }

    /// Build a query from decoded `(key, value)` pairs, grouping repeated keys in order.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut query = Query::new();
        for (k, v) in pairs {
            match query.0.entry(k.into()) {
                Entry::Occupied(mut e) => e.get_mut().push(v.into()),
                Entry::Vacant(e) => {
                    e.insert(QueryValue::Single(v.into()));
                }
            }
        }
        query
    }

    /// Insert a value, returning the previous value of this key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Option<QueryValue> {
        self.0.insert(key.into(), value.into())
    }

    /// Builder style [`Query::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Merge `other` into this query, its values replacing ours for keys present in both.
    pub fn merge(mut self, other: Query) -> Self {
        self.0.extend(other.0);
        self
    }

    /// Get the value of a key.
    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.0.get(key)
    }

    /// Whether the query has no keys.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Normalize the query for signing and for the request line.
    ///
    /// Every key and value is percent-encoded with the unreserved set (`A-Z a-z 0-9 - _ . ~`),
    /// a sequence emits one `key=value` pair per element, and pairs are sorted by encoded key
    /// with a stable sort so the values of one key keep their order. The encoder never emits
    /// `+`: a space becomes `%20` and a literal plus becomes `%2B`.
    pub fn normalize(&self) -> String {
        let mut pairs: Vec<(String, String)> = Vec::with_capacity(self.0.len());
        for (k, v) in &self.0 {
            let k = encode(k);
            for value in v.iter() {
                pairs.push((k.clone(), encode(value)));
            }
        }
        pairs.sort_by(|a, b| a.0.cmp(&b.0));

        let mut s = String::with_capacity(pairs.iter().map(|(k, v)| k.len() + v.len() + 2).sum());
        for (idx, (k, v)) in pairs.iter().enumerate() {
            if idx != 0 {
                s.push('&');
            }
            s.push_str(k);
            s.push('=');
            s.push_str(v);
        }
        s
    }
}

impl<K: Into<String>, V: Into<QueryValue>> FromIterator<(K, V)> for Query {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Query(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

fn encode(s: &str) -> String {
    utf8_percent_encode(s, &QUERY_ENCODE_SET).to_string()
}

/// The values of the headers covered by the signature, other than the body hash.
#[derive(Debug, Clone, Copy)]
pub struct CanonicalHeaders<'a> {
    /// Value of `Content-Type`.
    pub content_type: &'a str,
    /// Value of `Host`.
    pub host: &'a str,
    /// Value of `X-Date`: `YYYYMMDDTHHMMSSZ`.
    pub x_date: &'a str,
}

/// The canonical form of a request.
///
/// ```text
/// METHOD
/// PATH
/// NORMALIZED_QUERY
/// content-type:<content type>
/// host:<host>
/// x-content-sha256:<body hash>
/// x-date:<x-date>
///
/// content-type;host;x-content-sha256;x-date
/// <body hash>
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRequest {
    method: String,
    path: String,
    query: String,
    content_type: String,
    host: String,
    body_hash: String,
    x_date: String,
}

/// Canonicalize a request whose body is at hand.
pub fn canonicalize(
    method: &Method,
    path: &str,
    query: &Query,
    headers: CanonicalHeaders<'_>,
    body: &[u8],
) -> Result<CanonicalRequest> {
    CanonicalRequest::new(method, path, query, headers, hex_sha256(body))
}

impl CanonicalRequest {
    /// Canonicalize a request given the lowercase hex SHA-256 of its body.
    pub fn new(
        method: &Method,
        path: &str,
        query: &Query,
        headers: CanonicalHeaders<'_>,
        body_hash: String,
    ) -> Result<Self> {
        if !path.starts_with('/') {
            return Err(Error::request_invalid(format!(
                "request path must start with '/', got {path:?}"
            )));
        }
        if headers.host.is_empty() {
            return Err(Error::request_invalid("host must not be empty"));
        }
        for (name, value) in [
            ("content-type", headers.content_type),
            ("host", headers.host),
            ("x-date", headers.x_date),
        ] {
            if value.contains(|c| c == '\r' || c == '\n') {
                return Err(Error::request_invalid(format!(
                    "header {name} must not contain line breaks"
                )));
            }
        }

        Ok(Self {
            method: method.as_str().to_ascii_uppercase(),
            path: path.to_string(),
            query: query.normalize(),
            content_type: headers.content_type.to_string(),
            host: headers.host.to_string(),
            body_hash,
            x_date: headers.x_date.to_string(),
        })
    }

    /// The normalized query string.
    pub fn normalized_query(&self) -> &str {
        &self.query
    }

    /// Lowercase hex SHA-256 of the body, also sent as `X-Content-Sha256`.
    pub fn body_hash(&self) -> &str {
        &self.body_hash
    }

    /// Semicolon separated names of the signed headers.
    pub fn signed_headers(&self) -> &'static str {
        SIGNED_HEADERS
    }

    /// The canonical headers block, one `name:value\n` line per signed header.
    pub fn canonical_headers(&self) -> String {
        let mut s = String::with_capacity(128);
        for (name, value) in [
            ("content-type", self.content_type.as_str()),
            ("host", self.host.as_str()),
            ("x-content-sha256", self.body_hash.as_str()),
            ("x-date", self.x_date.as_str()),
        ] {
            s.push_str(name);
            s.push(':');
            s.push_str(value);
            s.push('\n');
        }
        s
    }

    /// Lowercase hex SHA-256 of the canonical request string.
    pub fn hashed(&self) -> String {
        hex_sha256(self.to_string().as_bytes())
    }
}

impl Display for CanonicalRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.method)?;
        writeln!(f, "{}", self.path)?;
        writeln!(f, "{}", self.query)?;
        f.write_str(&self.canonical_headers())?;
        f.write_char('\n')?;
        writeln!(f, "{}", SIGNED_HEADERS)?;
        f.write_str(&self.body_hash)
    }
}
