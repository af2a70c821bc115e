use serde::de::DeserializeOwned;
use url::Url;

use crate::error::RateSourceError;

/// Joins `segments` onto `base_url` as percent-encoded path segments and
/// appends `params` as the query string.
pub(crate) fn build_url(
    provider: &'static str,
    base_url: &str,
    segments: &[&str],
    params: &[(&str, &str)],
) -> Result<Url, RateSourceError> {
    let mut url = Url::parse(base_url).map_err(|e| RateSourceError::MalformedResponse {
        provider,
        message: format!("invalid base url {base_url}: {e}"),
    })?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| RateSourceError::MalformedResponse {
                provider,
                message: format!("base url {base_url} cannot carry a path"),
            })?;
        path.pop_if_empty();
        for segment in segments {
            path.push(segment);
        }
    }
    if !params.is_empty() {
        let mut query = url.query_pairs_mut();
        for (k, v) in params {
            query.append_pair(k, v);
        }
    }
    Ok(url)
}

/// Decodes a response body, mapping shape errors to `MalformedResponse`.
pub(crate) fn decode<T: DeserializeOwned>(
    provider: &'static str,
    body: &str,
) -> Result<T, RateSourceError> {
    serde_json::from_str(body).map_err(|e| RateSourceError::MalformedResponse {
        provider,
        message: e.to_string(),
    })
}

/// GET `url` and return the raw body.
///
/// Non-2xx statuses become `HttpStatus`; the body is still read first so
/// providers that report errors in JSON with a 4xx status are logged
/// with their payload.
pub(crate) async fn get_text(
    client: &reqwest::Client,
    provider: &'static str,
    url: Url,
) -> Result<String, RateSourceError> {
    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| RateSourceError::from_reqwest(provider, e))?;
    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| RateSourceError::from_reqwest(provider, e))?;
    if !status.is_success() {
        tracing::debug!(
            provider,
            status = status.as_u16(),
            body = %body,
            "provider error body"
        );
        return Err(RateSourceError::HttpStatus {
            provider,
            status: status.as_u16(),
        });
    }
    Ok(body)
}
