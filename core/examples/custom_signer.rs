use std::time::Duration;

use async_trait::async_trait;
use http::request::Parts;
use http::HeaderValue;
use volcsign_core::hash::hex_hmac_sha256;
use volcsign_core::time::{format_iso8601, now};
use volcsign_core::{
    Context, Error, OsEnv, ProvideCredential, Result, SignRequest, Signer, SigningCredential,
};

#[derive(Clone, Debug)]
struct GatewayCredential {
    app_key: String,
    app_secret: String,
}

impl SigningCredential for GatewayCredential {
    fn is_valid(&self) -> bool {
        !self.app_key.is_empty() && !self.app_secret.is_empty()
    }
}

/// Loads the app key pair from `GATEWAY_APP_KEY` and `GATEWAY_APP_SECRET`.
#[derive(Debug)]
struct EnvCredentialProvider;

#[async_trait]
impl ProvideCredential for EnvCredentialProvider {
    type Credential = GatewayCredential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        let (Some(app_key), Some(app_secret)) = (
            ctx.env_var("GATEWAY_APP_KEY"),
            ctx.env_var("GATEWAY_APP_SECRET"),
        ) else {
            return Ok(None);
        };

        Ok(Some(GatewayCredential {
            app_key,
            app_secret,
        }))
    }
}

/// Signs `METHOD\nPATH\nDATE` with the app secret.
#[derive(Debug)]
struct GatewaySigner;

#[async_trait]
impl SignRequest for GatewaySigner {
    type Credential = GatewayCredential;

    async fn sign_request(
        &self,
        _: &Context,
        req: &mut Parts,
        credential: Option<&Self::Credential>,
        expires_in: Option<Duration>,
    ) -> Result<()> {
        if expires_in.is_some() {
            return Err(Error::request_invalid("presigned requests are not supported"));
        }
        let cred = credential.ok_or_else(|| Error::credential_invalid("missing credential"))?;

        let date = format_iso8601(now());
        let string_to_sign = format!("{}\n{}\n{}", req.method, req.uri.path(), date);
        let signature = hex_hmac_sha256(cred.app_secret.as_bytes(), string_to_sign.as_bytes());

        req.headers.insert("x-date", HeaderValue::from_str(&date)?);
        req.headers
            .insert("x-app-key", HeaderValue::from_str(&cred.app_key)?);
        let mut value = HeaderValue::from_str(&signature)?;
        value.set_sensitive(true);
        req.headers.insert("x-signature", value);

        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let ctx = Context::new().with_env(OsEnv);
    let signer = Signer::new(ctx, EnvCredentialProvider, GatewaySigner);

    let mut parts = http::Request::get("https://gateway.example.com/v1/apps")
        .body(())?
        .into_parts()
        .0;

    match signer.sign(&mut parts, None).await {
        Ok(()) => println!("signed headers: {:?}", parts.headers),
        Err(err) if err.is_credential_error() => {
            eprintln!("set GATEWAY_APP_KEY and GATEWAY_APP_SECRET first: {err}")
        }
        Err(err) => return Err(err),
    }

    Ok(())
}
