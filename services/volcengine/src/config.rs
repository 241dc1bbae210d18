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

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::time::Duration;

use once_cell::sync::Lazy;
use volcsign_core::{Context, Error, Result};

use crate::constants::*;

/// Static metadata of a service known out of the box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ServiceMeta {
    service: &'static str,
    /// May contain `{region}`.
    host: &'static str,
    api_version: &'static str,
    scheme: &'static str,
}

impl ServiceMeta {
    const fn new(service: &'static str, host: &'static str, api_version: &'static str) -> Self {
        Self {
            service,
            host,
            api_version,
            scheme: DEFAULT_SCHEME,
        }
    }
}

static SERVICES: Lazy<HashMap<&'static str, ServiceMeta>> = Lazy::new(|| {
    HashMap::from([
        (
            "agentkit",
            ServiceMeta::new("agentkit", "open.volcengineapi.com", "2025-10-30"),
        ),
        (
            "iam",
            ServiceMeta::new("iam", "open.volcengineapi.com", "2018-01-01"),
        ),
        (
            "sts",
            ServiceMeta::new("sts", "sts.volcengineapi.com", "2018-01-01"),
        ),
        (
            "identity",
            ServiceMeta::new("cis_test", "open.volcengineapi.com", "2023-10-01"),
        ),
        (
            "cr",
            ServiceMeta::new("cr", "cr.{region}.volcengineapi.com", "2022-05-12"),
        ),
        ("tos", ServiceMeta::new("tos", "tos-{region}.volces.com", "")),
        (
            "cp",
            ServiceMeta::new("CP", "open.volcengineapi.com", "2023-05-01"),
        ),
    ])
});

/// Built-in region rules: logical region -> service key -> region.
static REGION_RULES: Lazy<HashMap<&'static str, HashMap<&'static str, &'static str>>> =
    Lazy::new(|| {
        HashMap::from([(
            "cn-shanghai",
            HashMap::from([("cp", "cn-beijing"), ("tos", "cn-beijing")]),
        )])
    });

/// Where and how to call one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Host, e.g. `open.volcengineapi.com`.
    pub host: String,
    /// Region the signature is scoped to.
    pub region: String,
    /// `https` or `http`.
    pub scheme: String,
    /// Service code the signature is scoped to, e.g. `iam`.
    pub service: String,
    /// Value of the `Version` query parameter.
    pub api_version: String,
}

impl Endpoint {
    /// The base url of this endpoint, without path.
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}://{} ({}@{}, version {})",
            self.scheme, self.host, self.service, self.region, self.api_version
        )
    }
}

/// Config for calling one volcengine service.
///
/// Every field is optional: unset fields are filled by [`Config::from_env`] and then by the
/// built-in service registry when resolving the [`Endpoint`].
#[derive(Clone, Debug)]
pub struct Config {
    /// Logical service key, e.g. `iam` or `identity`.
    pub key: String,
    /// Logical region, from `VOLCENGINE_REGION` or `VOLC_REGION`.
    pub region: Option<String>,
    /// Region of this service only, from `VOLCENGINE_{KEY}_REGION`.
    ///
    /// Wins over the logical region and its region rules.
    pub service_region: Option<String>,
    /// Host, from `VOLCENGINE_{KEY}_HOST`.
    pub host: Option<String>,
    /// Scheme, from `VOLCENGINE_{KEY}_SCHEME`.
    pub scheme: Option<String>,
    /// Service code, from `VOLCENGINE_{KEY}_SERVICE`.
    pub service: Option<String>,
    /// API version, from `VOLCENGINE_{KEY}_API_VERSION`.
    pub api_version: Option<String>,
    /// Timeout of one call, 30 seconds by default.
    pub timeout: Option<Duration>,
    /// Extra region rules, applied on top of the built-in ones.
    pub region_rules: HashMap<String, HashMap<String, String>>,
}

impl Config {
    /// Create an empty config for the service `key`.
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_ascii_lowercase(),
            region: None,
            service_region: None,
            host: None,
            scheme: None,
            service: None,
            api_version: None,
            timeout: None,
            region_rules: HashMap::new(),
        }
    }

    /// Set the logical region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set the region of this service.
    pub fn with_service_region(mut self, region: impl Into<String>) -> Self {
        self.service_region = Some(region.into());
        self
    }

    /// Set the host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the scheme.
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = Some(scheme.into());
        self
    }

    /// Set the service code.
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Set the API version.
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Set the timeout of one call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Map `service key` to `region` when the logical region is `logical_region`.
    pub fn with_region_rule(mut self, logical_region: &str, key: &str, region: &str) -> Self {
        self.region_rules
            .entry(logical_region.to_ascii_lowercase())
            .or_default()
            .insert(key.to_ascii_lowercase(), region.to_string());
        self
    }

    /// Fill unset fields from environment variables.
    ///
    /// Values set explicitly are never overridden. `VOLCENGINE_*` wins over the legacy `VOLC_*`.
    pub fn from_env(mut self, ctx: &Context) -> Self {
        let key = self.key.to_ascii_uppercase();
        let var = |name: &str| {
            let current = format!("VOLCENGINE_{key}_{name}");
            let legacy = format!("VOLC_{key}_{name}");
            ctx.env_var_any(&[current.as_str(), legacy.as_str()])
        };

        if self.region.is_none() {
            self.region = ctx.env_var_any(&[VOLCENGINE_REGION, VOLC_REGION]);
        }
        if self.service_region.is_none() {
            self.service_region = var("REGION");
        }
        if self.host.is_none() {
            self.host = var("HOST");
        }
        if self.scheme.is_none() {
            self.scheme = var("SCHEME");
        }
        if self.service.is_none() {
            self.service = var("SERVICE");
        }
        if self.api_version.is_none() {
            self.api_version = var("API_VERSION");
        }
        self
    }

    /// Timeout of one call.
    pub fn timeout(&self) -> Duration {
        self.timeout
            .unwrap_or_else(|| Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Region this service is signed for.
    ///
    /// Service region, then the region rule of the logical region, then the logical region.
    pub fn resolve_region(&self) -> String {
        if let Some(region) = &self.service_region {
            return region.clone();
        }

        let logical = self
            .region
            .as_deref()
            .unwrap_or(DEFAULT_REGION)
            .to_ascii_lowercase();
        let custom = self
            .region_rules
            .get(&logical)
            .and_then(|rules| rules.get(&self.key))
            .map(String::as_str);
        let builtin = REGION_RULES
            .get(logical.as_str())
            .and_then(|rules| rules.get(self.key.as_str()))
            .copied();

        match custom.or(builtin) {
            Some(region) => region.to_string(),
            None => logical,
        }
    }

    /// Resolve the endpoint of this service.
    ///
    /// An unknown service key is only accepted when both host and service code are set.
    pub fn endpoint(&self) -> Result<Endpoint> {
        let region = self.resolve_region();

        let meta = match SERVICES.get(self.key.as_str()) {
            Some(meta) => *meta,
            None => match (&self.host, &self.service) {
                (Some(_), Some(_)) => ServiceMeta::new("", "", ""),
                _ => {
                    return Err(Error::config_invalid(format!(
                        "unsupported service for endpoint resolution: {}",
                        self.key
                    )))
                }
            },
        };

        let host = match &self.host {
            Some(host) => host.clone(),
            None => meta.host.replace("{region}", &region),
        };
        let scheme = self.scheme.as_deref().unwrap_or(meta.scheme);
        if scheme != "https" && scheme != "http" {
            return Err(Error::config_invalid(format!(
                "scheme must be http or https, got {scheme}"
            )));
        }

        Ok(Endpoint {
            host,
            region,
            scheme: scheme.to_string(),
            service: self.service.as_deref().unwrap_or(meta.service).to_string(),
            api_version: self
                .api_version
                .as_deref()
                .unwrap_or(meta.api_version)
                .to_string(),
        })
    }
}
