//! AWS Signature Version 4 for single-object S3 requests.
//!
//! Only what the object-store connector needs: header-based signing of
//! `GET`/`PUT` requests without query parameters.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Url;
use sha2::{Digest, Sha256};

use crate::error::TransportError;
use crate::object_store::Credentials;
use crate::Result;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";

/// Hex SHA-256 of `data`, as used in `x-amz-content-sha256`.
pub(crate) fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| TransportError::Signing(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Derive the per-day signing key.
pub(crate) fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Result<Vec<u8>> {
    let k_date = hmac_sha256(format!("AWS4{secret}").as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

/// Percent-encode one path segment (RFC 3986 unreserved characters pass).
pub(crate) fn uri_encode(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

fn host_header(url: &Url) -> Result<String> {
    let host = url
        .host_str()
        .ok_or_else(|| TransportError::InvalidUrl(format!("{url}: no host")))?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Compute the headers that authenticate one request.
///
/// Returns `(name, value)` pairs to add to the request; `host` is left to
/// the HTTP client, which derives the same value from the URL.
pub(crate) fn sign(
    method: &str,
    url: &Url,
    region: &str,
    credentials: &Credentials,
    payload_sha256: &str,
    now: DateTime<Utc>,
) -> Result<Vec<(&'static str, String)>> {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();
    let scope = format!("{date}/{region}/{SERVICE}/aws4_request");

    let mut canonical_headers = vec![
        ("host", host_header(url)?),
        ("x-amz-content-sha256", payload_sha256.to_string()),
        ("x-amz-date", amz_date.clone()),
    ];
    if let Some(token) = &credentials.session_token {
        canonical_headers.push(("x-amz-security-token", token.clone()));
    }

    let signed_headers = canonical_headers
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(";");
    let header_block: String = canonical_headers
        .iter()
        .map(|(name, value)| format!("{name}:{}\n", value.trim()))
        .collect();

    let canonical_request = format!(
        "{method}\n{}\n{}\n{header_block}\n{signed_headers}\n{payload_sha256}",
        url.path(),
        url.query().unwrap_or(""),
    );
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        sha256_hex(canonical_request.as_bytes())
    );

    let key = signing_key(&credentials.secret_access_key, &date, region, SERVICE)?;
    let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes())?);

    let authorization = format!(
        "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
        credentials.access_key_id
    );

    let mut headers = vec![
        ("authorization", authorization),
        ("x-amz-content-sha256", payload_sha256.to_string()),
        ("x-amz-date", amz_date),
    ];
    if let Some(token) = &credentials.session_token {
        headers.push(("x-amz-security-token", token.clone()));
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn example_credentials() -> Credentials {
        Credentials {
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
            session_token: None,
        }
    }

    #[test]
    fn empty_payload_hash() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn signing_key_matches_published_vector() {
        let key = signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20120215",
            "us-east-1",
            "iam",
        )
        .unwrap();
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn uri_encode_keeps_unreserved() {
        assert_eq!(uri_encode("relationships.tar.gz"), "relationships.tar.gz");
        assert_eq!(uri_encode("a b+c"), "a%20b%2Bc");
    }

    #[test]
    fn authorization_header_shape() {
        let url = Url::parse("http://127.0.0.1:9000/bucket/relationships.tar.gz").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let headers = sign(
            "GET",
            &url,
            "eu-west-1",
            &example_credentials(),
            &sha256_hex(b""),
            now,
        )
        .unwrap();

        let auth = &headers.iter().find(|(n, _)| *n == "authorization").unwrap().1;
        assert!(auth.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20240501/eu-west-1/s3/aws4_request, "
        ));
        assert!(auth.contains("SignedHeaders=host;x-amz-content-sha256;x-amz-date, "));
        let signature = auth.rsplit("Signature=").next().unwrap();
        assert_eq!(signature.len(), 64);

        let date = &headers.iter().find(|(n, _)| *n == "x-amz-date").unwrap().1;
        assert_eq!(date, "20240501T120000Z");
    }

    fn signature(headers: &[(&'static str, String)]) -> String {
        let auth = &headers.iter().find(|(n, _)| *n == "authorization").unwrap().1;
        auth.rsplit("Signature=").next().unwrap().to_string()
    }

    #[test]
    fn virtual_hosted_get_matches_reference_signature() {
        let url = Url::parse(
            "https://artifacts.s3.eu-west-1.amazonaws.com/ci/main/relationships.tar.gz",
        )
        .unwrap();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let headers = sign(
            "GET",
            &url,
            "eu-west-1",
            &example_credentials(),
            &sha256_hex(b""),
            now,
        )
        .unwrap();
        assert_eq!(
            signature(&headers),
            "e9aa981571589e7be8692f164ca96b622e08581c3073b60dd935e19e893bf912"
        );
    }

    #[test]
    fn path_style_put_matches_reference_signature() {
        let url = Url::parse("http://127.0.0.1:9000/artifacts/relationships.tar.gz").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let headers = sign(
            "PUT",
            &url,
            "eu-west-1",
            &example_credentials(),
            &sha256_hex(b"hello"),
            now,
        )
        .unwrap();
        assert_eq!(
            signature(&headers),
            "bbd3a5a00ae4e6147ddfd9ec73f4b42630ef0c8f6c67b22eb72ec6772af4f9a5"
        );
    }

    #[test]
    fn session_token_is_signed() {
        let url = Url::parse("https://bucket.s3.us-east-1.amazonaws.com/k.tar.gz").unwrap();
        let mut credentials = example_credentials();
        credentials.session_token = Some("token".to_string());
        let headers = sign("PUT", &url, "us-east-1", &credentials, &sha256_hex(b"x"), Utc::now())
            .unwrap();

        let auth = &headers.iter().find(|(n, _)| *n == "authorization").unwrap().1;
        assert!(auth.contains("x-amz-date;x-amz-security-token"));
        assert!(headers.iter().any(|(n, v)| *n == "x-amz-security-token" && v == "token"));
    }

    #[test]
    fn signature_is_deterministic_for_fixed_time() {
        let url = Url::parse("http://localhost:9000/b/k.tar.gz").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let a = sign("GET", &url, "us-east-1", &example_credentials(), "UNSIGNED-PAYLOAD", now)
            .unwrap();
        let b = sign("GET", &url, "us-east-1", &example_credentials(), "UNSIGNED-PAYLOAD", now)
            .unwrap();
        assert_eq!(a, b);
    }
}
