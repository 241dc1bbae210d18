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

//! Derivation of the request-scoped signing key.

use std::fmt::{Debug, Formatter};

use volcsign_core::hash::hmac_sha256;

use crate::constants::SCOPE_TERMINATOR;

/// The signing key for one `(date, region, service)` scope.
///
/// Raw HMAC output, never hex encoded. `Debug` prints nothing of the key.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    /// The raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Debug for SigningKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningKey(***)")
    }
}

/// Derive the signing key from the secret access key.
///
/// ```text
/// k_date    = HMAC-SHA256(secret_access_key, date8)
/// k_region  = HMAC-SHA256(k_date, region)
/// k_service = HMAC-SHA256(k_region, service)
/// k_signing = HMAC-SHA256(k_service, "request")
/// ```
///
/// `date8` is `YYYYMMDD`. The secret is used as is, without any prefix.
pub fn derive_signing_key(
    secret_access_key: &str,
    date8: &str,
    region: &str,
    service: &str,
) -> SigningKey {
    let k_date = hmac_sha256(secret_access_key.as_bytes(), date8.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    let k_signing = hmac_sha256(&k_service, SCOPE_TERMINATOR.as_bytes());

    SigningKey(k_signing)
}

/// Credential scope: `date8/region/service/request`.
pub fn credential_scope(date8: &str, region: &str, service: &str) -> String {
    format!("{date8}/{region}/{service}/{SCOPE_TERMINATOR}")
}
