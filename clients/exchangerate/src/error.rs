use thiserror::Error;

/// Errors raised while talking to an exchange rate provider.
///
/// All of them are recoverable from the monitor's point of view: the
/// caller either falls back to the next provider or skips the base for
/// the current cycle.
#[derive(Error, Debug)]
pub enum RateSourceError {
    /// Connection failure or any other transport error.
    #[error("network error from {provider}: {source}")]
    Network {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The request exceeded the configured timeout.
    #[error("request to {provider} timed out")]
    Timeout { provider: &'static str },

    /// Non-success HTTP status.
    #[error("{provider} returned HTTP {status}")]
    HttpStatus { provider: &'static str, status: u16 },

    /// Unexpected JSON shape or an error payload.
    #[error("malformed response from {provider}: {message}")]
    MalformedResponse {
        provider: &'static str,
        message: String,
    },

    /// The provider answered but had no usable rates.
    #[error("{provider} has no data for {base}/{quote}")]
    DataUnavailable {
        provider: &'static str,
        base: String,
        quote: String,
    },
}

impl RateSourceError {
    /// Classifies a transport error. The request URL is stripped first since
    /// some providers carry their API key in the path.
    pub(crate) fn from_reqwest(provider: &'static str, err: reqwest::Error) -> Self {
        let err = err.without_url();
        if err.is_timeout() {
            Self::Timeout { provider }
        } else if err.is_decode() {
            Self::MalformedResponse {
                provider,
                message: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            Self::HttpStatus {
                provider,
                status: status.as_u16(),
            }
        } else {
            Self::Network {
                provider,
                source: err,
            }
        }
    }

    /// Name of the provider that produced this error.
    pub fn provider(&self) -> &'static str {
        match self {
            Self::Network { provider, .. }
            | Self::Timeout { provider }
            | Self::HttpStatus { provider, .. }
            | Self::MalformedResponse { provider, .. }
            | Self::DataUnavailable { provider, .. } => provider,
        }
    }

    /// HTTP status, when the failure carried one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_and_status_are_exposed() {
        let err = RateSourceError::HttpStatus {
            provider: "open-er-api",
            status: 503,
        };
        assert_eq!(err.provider(), "open-er-api");
        assert_eq!(err.status(), Some(503));
        assert_eq!(err.to_string(), "open-er-api returned HTTP 503");

        let err = RateSourceError::DataUnavailable {
            provider: "frankfurter",
            base: "AUD".to_string(),
            quote: "CNY".to_string(),
        };
        assert_eq!(err.status(), None);
        assert_eq!(err.to_string(), "frankfurter has no data for AUD/CNY");
    }

    #[tokio::test]
    async fn transport_errors_drop_the_request_url() {
        let client = reqwest::Client::new();
        let err = client
            .get("http://127.0.0.1:9/v6/SECRETKEY123/latest/AUD")
            .send()
            .await
            .unwrap_err();
        let err = RateSourceError::from_reqwest("exchangerate-api", err);
        assert!(!err.to_string().contains("SECRETKEY123"), "{err}");
        assert!(!format!("{err:?}").contains("SECRETKEY123"));
    }
}
