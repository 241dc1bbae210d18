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

use std::fmt::{Debug, Formatter};

use volcsign_core::utils::Redact;
use volcsign_core::SigningCredential;

/// Credential that holds the access key pair and an optional session token.
///
/// The region and service a signature is scoped to live on
/// [`RequestSigner`](crate::RequestSigner), so one credential can sign for many services.
#[derive(Default, Clone)]
pub struct Credential {
    /// Access key id, sent in clear in the `Authorization` header.
    pub access_key_id: String,
    /// Secret access key, only ever used as the root of the signing key chain.
    pub secret_access_key: String,
    /// Session token for temporary credentials, sent as `X-Security-Token`.
    pub session_token: Option<String>,
}

impl Credential {
    /// Create a new credential from an access key pair.
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    /// Set the session token.
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }
}

impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_key_id", &Redact::from(&self.access_key_id))
            .field("secret_access_key", &Redact::from(&self.secret_access_key))
            .field("session_token", &Redact::from(&self.session_token))
            .finish()
    }
}

impl SigningCredential for Credential {
    fn is_valid(&self) -> bool {
        !self.access_key_id.is_empty() && !self.secret_access_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_debug_is_redacted() {
        let cred = Credential::new("AKLTexampleaccesskey", "c2VjcmV0LWtleS1leGFtcGxl")
            .with_session_token("STStoken");
        let s = format!("{cred:?}");

        assert!(!s.contains("c2VjcmV0LWtleS1leGFtcGxl"));
        assert!(!s.contains("STStoken"));
        assert!(s.contains("***cGxl"));
    }

    #[test]
    fn test_credential_is_valid() {
        assert!(Credential::new("ak", "sk").is_valid());
        assert!(!Credential::new("", "sk").is_valid());
        assert!(!Credential::new("ak", "").is_valid());
        assert!(!Credential::default().is_valid());
    }
}
