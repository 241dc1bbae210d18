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

use percent_encoding::AsciiSet;
use percent_encoding::NON_ALPHANUMERIC;

// Signing protocol.
pub const ALGORITHM: &str = "HMAC-SHA256";
pub const SCOPE_TERMINATOR: &str = "request";
pub const SIGNED_HEADERS: &str = "content-type;host;x-content-sha256;x-date";

// Headers used in volcengine services.
pub const X_CONTENT_SHA256: &str = "x-content-sha256";
pub const X_DATE: &str = "x-date";
pub const X_SECURITY_TOKEN: &str = "x-security-token";

// Query parameters injected into every call.
pub const QUERY_ACTION: &str = "Action";
pub const QUERY_VERSION: &str = "Version";

pub const DEFAULT_CONTENT_TYPE: &str = "application/json";
pub const DEFAULT_REGION: &str = "cn-beijing";
pub const DEFAULT_SCHEME: &str = "https";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

// Env values used in volcengine services.
pub const VOLCENGINE_REGION: &str = "VOLCENGINE_REGION";
pub const VOLC_REGION: &str = "VOLC_REGION";

/// AsciiSet for the query encoding of the signing protocol.
///
/// Encode every byte except the unreserved characters: 'A'-'Z', 'a'-'z', '0'-'9', '-', '.', '_', and '~'.
/// Space is encoded as `%20`, never `+`.
pub static QUERY_ENCODE_SET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');
