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

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::debug;

use crate::{Context, Error, ProvideCredential, Result, SignRequest, SigningCredential};

/// Signer is the main struct used to sign the request.
///
/// The only state shared between calls is the cached credential: every signing input
/// that belongs to a request travels with that request.
#[derive(Clone, Debug)]
pub struct Signer<K: SigningCredential> {
    ctx: Context,
    loader: Arc<dyn ProvideCredential<Credential = K>>,
    builder: Arc<dyn SignRequest<Credential = K>>,
    credential: Arc<Mutex<Option<K>>>,
}

impl<K: SigningCredential> Signer<K> {
    /// Create a new signer.
    pub fn new(
        ctx: Context,
        loader: impl ProvideCredential<Credential = K>,
        builder: impl SignRequest<Credential = K>,
    ) -> Self {
        Self {
            ctx,

            loader: Arc::new(loader),
            builder: Arc::new(builder),
            credential: Arc::new(Mutex::new(None)),
        }
    }

    /// The context this signer was built with.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Return the cached credential, loading a new one if the cache is empty or stale.
    pub async fn credential(&self) -> Result<K> {
        let cached = self.lock()?.clone();
        if cached.is_valid() {
            if let Some(cred) = cached {
                return Ok(cred);
            }
        }

        debug!("credential cache empty or stale, loading from provider");
        let loaded = self.loader.provide_credential(&self.ctx).await?;
        if !loaded.is_valid() {
            return Err(Error::credential_invalid(
                "no valid credential found from provider",
            ));
        }
        *self.lock()? = loaded.clone();

        loaded.ok_or_else(|| Error::credential_invalid("no valid credential found from provider"))
    }

    /// Signing request.
    pub async fn sign(
        &self,
        req: &mut http::request::Parts,
        expires_in: Option<Duration>,
    ) -> Result<()> {
        let cred = self.credential().await?;

        self.builder
            .sign_request(&self.ctx, req, Some(&cred), expires_in)
            .await
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<K>>> {
        self.credential
            .lock()
            .map_err(|_| Error::unexpected("credential cache lock poisoned"))
    }
}
