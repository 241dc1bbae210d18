use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::Method;
use pretty_assertions::assert_eq;
use volcsign_core::hash::hex_sha256;
use volcsign_core::time::parse_iso8601;
use volcsign_core::{Context, Result, Signer};
use volcsign_volcengine::{
    canonicalize, credential_scope, derive_signing_key, CanonicalHeaders, Credential, Query,
    RequestSigner, SigningContext, StaticCredentialProvider,
};

const ACCESS_KEY: &str = "AKLTexample";
const SECRET_KEY: &str = "c2VjcmV0LWtleS1leGFtcGxl";
const X_DATE: &str = "20240315T083045Z";

fn list_users(params: Query) -> Result<SigningContext> {
    Ok(
        SigningContext::new(Method::GET, "open.volcengineapi.com", parse_iso8601(X_DATE)?)
            .with_query(Query::for_action("ListUsers", "2018-01-01", params)),
    )
}

#[test]
fn test_known_vector() -> Result<()> {
    let creq = canonicalize(
        &Method::GET,
        "/",
        &Query::for_action("ListUsers", "2018-01-01", Query::new()),
        CanonicalHeaders {
            content_type: "application/json",
            host: "open.volcengineapi.com",
            x_date: X_DATE,
        },
        b"",
    )?;
    assert_eq!(
        creq.hashed(),
        "f11aa21ba88770b8bd6d01b94af79009fc2142c562e9a8d19e8ac69d43950d11"
    );

    let key = derive_signing_key(SECRET_KEY, "20240315", "cn-north-1", "iam");
    assert_eq!(
        hex::encode(key.as_bytes()),
        "b799045c9eb38dc986849f6ba03a781c1d8a23de74a5f55f8e20ab1af68d9eff"
    );
    assert_eq!(
        credential_scope("20240315", "cn-north-1", "iam"),
        "20240315/cn-north-1/iam/request"
    );

    let signature = RequestSigner::new("iam", "cn-north-1")
        .sign(&Credential::new(ACCESS_KEY, SECRET_KEY), &list_users(Query::new())?)?;
    assert_eq!(
        signature.signature_hex,
        "ae99988f215891b0fd09b97b7931e1ae54aebbe4f677ea2786554c9ffc244410"
    );
    Ok(())
}

#[test]
fn test_normalize_is_independent_of_insertion_order() {
    let forward = Query::new()
        .with("b", "2")
        .with("a", "hello world")
        .with("c", vec!["x", "y"]);
    let backward: Query = vec![("c", vec!["x", "y"])]
        .into_iter()
        .collect::<Query>()
        .with("a", "hello world")
        .with("b", "2");

    assert_eq!(forward.normalize(), backward.normalize());
    assert_eq!(forward.normalize(), "a=hello%20world&b=2&c=x&c=y");
    assert!(!forward.normalize().contains('+'));
}

#[test]
fn test_timestamp_changes_signature() -> Result<()> {
    let signer = RequestSigner::new("iam", "cn-north-1");
    let cred = Credential::new(ACCESS_KEY, SECRET_KEY);

    let base = signer.sign(&cred, &list_users(Query::new())?)?;
    let later = SigningContext::new(
        Method::GET,
        "open.volcengineapi.com",
        parse_iso8601("20240315T083046Z")?,
    )
    .with_query(Query::for_action("ListUsers", "2018-01-01", Query::new()));
    let later = signer.sign(&cred, &later)?;

    assert_ne!(base.signature_hex, later.signature_hex);
    Ok(())
}

#[test]
fn test_concurrent_sign_matches_sequential() -> Result<()> {
    let signer = &RequestSigner::new("iam", "cn-north-1");
    let cred = &Credential::new(ACCESS_KEY, SECRET_KEY);

    let contexts = (0..32)
        .map(|i| list_users(Query::new().with("Limit", i.to_string())))
        .collect::<Result<Vec<_>>>()?;
    let sequential = contexts
        .iter()
        .map(|ctx| signer.sign(cred, ctx))
        .collect::<Result<Vec<_>>>()?;

    let concurrent = std::thread::scope(|s| {
        let handles: Vec<_> = contexts
            .iter()
            .map(|ctx| s.spawn(move || signer.sign(cred, ctx)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("signing thread must not panic"))
            .collect::<Result<Vec<_>>>()
    })?;

    assert_eq!(sequential, concurrent);
    Ok(())
}

#[tokio::test]
async fn test_signer_signs_http_request() -> Result<()> {
    let loader = StaticCredentialProvider::new(ACCESS_KEY, SECRET_KEY);
    let builder = RequestSigner::new("iam", "cn-beijing");
    let signer = Signer::new(Context::new(), loader, builder);

    let body = r#"{"RoleName":"demo"}"#;
    let req = http::Request::post("https://open.volcengineapi.com/?Version=2018-01-01&Action=GetRole")
        .header(CONTENT_TYPE, "application/json")
        .header("X-Date", X_DATE)
        .header("X-Content-Sha256", hex_sha256(body.as_bytes()))
        .body(body)?;
    let (mut parts, body) = req.into_parts();
    signer.sign(&mut parts, None).await?;
    let req = http::Request::from_parts(parts, body);

    assert_eq!(
        req.uri().to_string(),
        "https://open.volcengineapi.com/?Action=GetRole&Version=2018-01-01"
    );
    assert_eq!(
        req.headers()[AUTHORIZATION].to_str()?,
        "HMAC-SHA256 Credential=AKLTexample/20240315/cn-beijing/iam/request, \
         SignedHeaders=content-type;host;x-content-sha256;x-date, \
         Signature=455582022d669cd4766d54f595cda683b1c43a1c2874d81351d636e2784082fc"
    );
    Ok(())
}

#[tokio::test]
async fn test_signer_keeps_session_token_out_of_signature() -> Result<()> {
    let loader =
        StaticCredentialProvider::new(ACCESS_KEY, SECRET_KEY).with_session_token("sts-token");
    let builder = RequestSigner::new("iam", "cn-north-1");
    let signer = Signer::new(Context::new(), loader, builder);

    let (mut parts, _) =
        http::Request::get("https://open.volcengineapi.com/?Action=ListUsers&Version=2018-01-01")
            .header("X-Date", X_DATE)
            .body(())?
            .into_parts();
    signer.sign(&mut parts, None).await?;

    assert_eq!(parts.headers["X-Security-Token"], "sts-token");
    // Same signature as without a token: the token is not a signed header.
    assert!(parts.headers[AUTHORIZATION]
        .to_str()?
        .ends_with("Signature=ae99988f215891b0fd09b97b7931e1ae54aebbe4f677ea2786554c9ffc244410"));
    Ok(())
}
