use std::time::Duration;

use bytes::Bytes;
use reqwest::Client;
use volcsign_core::{Context, Result};
use volcsign_http_send_reqwest::ReqwestHttpSend;

#[tokio::main]
async fn main() -> Result<()> {
    // One client, one connection pool, shared by every request sent through the context.
    let client = Client::builder()
        .timeout(Duration::from_secs(30))
        .pool_max_idle_per_host(10)
        .user_agent("volcsign-example/0.1")
        .build()
        .map_err(|e| volcsign_core::Error::config_invalid("invalid client").with_source(e))?;

    let ctx = Context::new().with_http_send(ReqwestHttpSend::new(client));

    // An unsigned call is rejected by the service, which is enough to show the round trip.
    let req = http::Request::builder()
        .method("GET")
        .uri("https://open.volcengineapi.com/?Action=ListUsers&Version=2018-01-01")
        .body(Bytes::new())?;

    let resp = ctx.http_send_as_string(req).await?;
    println!("status: {}", resp.status());
    println!("body: {}", resp.body());

    Ok(())
}
