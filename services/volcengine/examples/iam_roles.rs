//! Look up an IAM role, telling "not found" apart from other failures.
//!
//! ```shell
//! export VOLCENGINE_ACCESS_KEY=...
//! export VOLCENGINE_SECRET_KEY=...
//! cargo run --example iam_roles -- my-role
//! ```

use std::env;

use anyhow::Result;
use serde::Deserialize;
use serde_json::json;
use volcsign_core::{Context, ErrorKind, OsEnv};
use volcsign_http_send_reqwest::ReqwestHttpSend;
use volcsign_volcengine::{Client, Config, StaticCredentialProvider};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetRoleResult {
    role: Role,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Role {
    role_name: String,
    trn: String,
    #[serde(default)]
    description: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let role_name = env::args().nth(1).unwrap_or_else(|| "volcsign-demo".to_string());

    let ctx = Context::new()
        .with_http_send(ReqwestHttpSend::default())
        .with_env(OsEnv);

    // Endpoint and region come from VOLCENGINE_REGION / VOLCENGINE_IAM_* when set.
    let config = Config::new("iam").from_env(&ctx);
    let loader = StaticCredentialProvider::new(
        &env::var("VOLCENGINE_ACCESS_KEY")?,
        &env::var("VOLCENGINE_SECRET_KEY")?,
    );
    let client = Client::new(ctx, &config, loader)?;
    println!("calling {}", client.endpoint());

    match client
        .invoke::<GetRoleResult>("GetRole", &json!({ "RoleName": role_name }))
        .await
    {
        Ok(result) => {
            let role = result.role;
            println!("{} ({}): {}", role.role_name, role.trn, role.description);
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {
            println!("role {role_name} does not exist");
        }
        Err(err) => return Err(err.into()),
    }

    Ok(())
}
