//! AK/SK request signing (SDK-HMAC-SHA256)
//!
//! Every request to a HuaweiCloud endpoint carries an `X-Sdk-Date` header and
//! an `Authorization` header derived from a canonical form of the request.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use url::Url;

use super::error::ApiError;

pub const ALGORITHM: &str = "SDK-HMAC-SHA256";
pub const HEADER_SDK_DATE: &str = "X-Sdk-Date";
pub const SDK_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";

#[derive(Clone)]
pub struct Signer {
    access_key: String,
    secret_key: String,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("access_key", &self.access_key)
            .finish_non_exhaustive()
    }
}

impl Signer {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    /// Returns the `Authorization` header value. `headers` must already hold
    /// every header that is sent, including `host` and `X-Sdk-Date`.
    pub fn sign(
        &self,
        method: &str,
        url: &Url,
        headers: &BTreeMap<String, String>,
        body: &[u8],
    ) -> Result<String, ApiError> {
        let date = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(HEADER_SDK_DATE))
            .map(|(_, v)| v.as_str())
            .ok_or_else(|| ApiError::AuthError(format!("missing {} header", HEADER_SDK_DATE)))?;

        let (canonical_headers, signed_headers) = canonical_headers(headers);
        let canonical = canonical_request(method, url, &canonical_headers, &signed_headers, body);
        let string_to_sign = format!(
            "{}\n{}\n{}",
            ALGORITHM,
            date,
            hex::encode(Sha256::digest(canonical.as_bytes()))
        );

        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| ApiError::AuthError(e.to_string()))?;
        mac.update(string_to_sign.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        Ok(format!(
            "{} Access={}, SignedHeaders={}, Signature={}",
            ALGORITHM, self.access_key, signed_headers, signature
        ))
    }
}

fn escape(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

pub(crate) fn canonical_request(
    method: &str,
    url: &Url,
    canonical_headers: &str,
    signed_headers: &str,
    body: &[u8],
) -> String {
    format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        method.to_uppercase(),
        canonical_uri(url),
        canonical_query(url),
        canonical_headers,
        signed_headers,
        hex::encode(Sha256::digest(body))
    )
}

fn canonical_uri(url: &Url) -> String {
    let mut uri = url
        .path()
        .split('/')
        .map(|segment| {
            let decoded = urlencoding::decode(segment)
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| segment.to_string());
            escape(&decoded)
        })
        .collect::<Vec<_>>()
        .join("/");
    if !uri.ends_with('/') {
        uri.push('/');
    }
    uri
}

fn canonical_query(url: &Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (escape(&k), escape(&v)))
        .collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Lowercased, sorted `name:value` lines plus the `;` joined name list
fn canonical_headers(headers: &BTreeMap<String, String>) -> (String, String) {
    let lowered: BTreeMap<String, &str> = headers
        .iter()
        .map(|(k, v)| (k.to_lowercase(), v.trim()))
        .collect();

    let mut canonical = String::new();
    for (k, v) in &lowered {
        canonical.push_str(k);
        canonical.push(':');
        canonical.push_str(v);
        canonical.push('\n');
    }
    let signed = lowered.keys().cloned().collect::<Vec<_>>().join(";");
    (canonical, signed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("Host".to_string(), "apig.cn-north-4.myhuaweicloud.com".to_string()),
            ("Content-Type".to_string(), "application/json".to_string()),
            (HEADER_SDK_DATE.to_string(), "20240102T030405Z".to_string()),
        ])
    }

    #[test]
    fn canonical_uri_always_ends_with_slash() {
        let url = Url::parse("https://example.com/v2/abc/apigw/instances").unwrap();
        assert_eq!(canonical_uri(&url), "/v2/abc/apigw/instances/");

        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(canonical_uri(&url), "/");
    }

    #[test]
    fn canonical_query_is_sorted_and_escaped() {
        let url = Url::parse("https://example.com/v1?name=a%20b&limit=10&action_id=add").unwrap();
        assert_eq!(canonical_query(&url), "action_id=add&limit=10&name=a%20b");
    }

    #[test]
    fn canonical_headers_are_lowercased_and_sorted() {
        let (canonical, signed) = canonical_headers(&headers());
        assert_eq!(
            canonical,
            "content-type:application/json\nhost:apig.cn-north-4.myhuaweicloud.com\nx-sdk-date:20240102T030405Z\n"
        );
        assert_eq!(signed, "content-type;host;x-sdk-date");
    }

    #[test]
    fn canonical_request_layout() {
        let url = Url::parse("https://apig.cn-north-4.myhuaweicloud.com/v2/p1/apigw/instances?limit=1").unwrap();
        let (canonical_headers, signed) = canonical_headers(&headers());
        let request = canonical_request("get", &url, &canonical_headers, &signed, b"");

        let lines: Vec<&str> = request.split('\n').collect();
        assert_eq!(lines[0], "GET");
        assert_eq!(lines[1], "/v2/p1/apigw/instances/");
        assert_eq!(lines[2], "limit=1");
        assert_eq!(lines[6], "");
        assert_eq!(lines[7], "content-type;host;x-sdk-date");
        assert_eq!(
            lines[8],
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn authorization_header_format() {
        let signer = Signer::new("AK123", "SK456");
        let url = Url::parse("https://apig.cn-north-4.myhuaweicloud.com/v2/p1/apigw/instances").unwrap();
        let auth = signer.sign("GET", &url, &headers(), b"").unwrap();

        assert!(auth.starts_with(
            "SDK-HMAC-SHA256 Access=AK123, SignedHeaders=content-type;host;x-sdk-date, Signature="
        ));
        let signature = auth.rsplit("Signature=").next().unwrap();
        assert_eq!(signature.len(), 64);
        assert_eq!(signature, SIGNATURE);
    }

    #[test]
    fn sign_requires_sdk_date() {
        let signer = Signer::new("AK123", "SK456");
        let url = Url::parse("https://example.com/").unwrap();
        let mut headers = headers();
        headers.remove(HEADER_SDK_DATE);

        assert!(matches!(
            signer.sign("GET", &url, &headers, b""),
            Err(ApiError::AuthError(_))
        ));
    }

    const SIGNATURE: &str = "49ce8a43d6eb66c2fd1225f8cf50c998affdde4d094ec804b8fb8e233409f380";
}
