use crate::error::ConfigError;

use base64::{engine, read};
use gcs_common::yup_oauth2;
use rand::Rng;
use std::future::Future;
use std::io::{Cursor, Read};
use std::time::Duration;
use tracing::warn;

pub type GoogleAuthenticator = yup_oauth2::authenticator::Authenticator<
    hyper_rustls::HttpsConnector<hyper::client::HttpConnector>,
>;

/// Service-account token source shared by the TTS and storage clients.
pub struct GoogleAuth {
    source: TokenSource,
}

enum TokenSource {
    ServiceAccount(GoogleAuthenticator),
    #[cfg(test)]
    Fixed(String),
}

impl GoogleAuth {
    pub async fn from_service_account_file(credentials_path: &str) -> Result<Self, ConfigError> {
        let conn = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .https_or_http()
            .enable_http2()
            .build();
        let tls_client = hyper::Client::builder().build(conn);
        let service_account_key = yup_oauth2::read_service_account_key(credentials_path)
            .await
            .map_err(|e| ConfigError::Credentials(format!("{credentials_path}: {e}")))?;
        let authenticator = yup_oauth2::ServiceAccountAuthenticator::builder(service_account_key)
            .hyper_client(tls_client)
            .build()
            .await
            .map_err(|e| ConfigError::Credentials(e.to_string()))?;
        Ok(Self {
            source: TokenSource::ServiceAccount(authenticator),
        })
    }

    /// Always hands out `token`.
    #[cfg(test)]
    pub fn fixed(token: &str) -> Self {
        Self {
            source: TokenSource::Fixed(token.to_string()),
        }
    }

    /// Fetch (or reuse a cached) bearer token for the given scopes.
    pub async fn bearer_token(&self, scopes: &[&str]) -> Result<String, String> {
        match &self.source {
            TokenSource::ServiceAccount(authenticator) => authenticator
                .token(scopes)
                .await
                .map(|token| token.as_str().to_string())
                .map_err(|e| e.to_string()),
            #[cfg(test)]
            TokenSource::Fixed(token) => Ok(token.clone()),
        }
    }
}

pub fn b64_decode_to_buf(enc: &str, buf: &mut Vec<u8>) -> std::io::Result<usize> {
    let mut cur = Cursor::new(enc);
    let mut decoder = read::DecoderReader::new(&mut cur, &engine::general_purpose::STANDARD);
    decoder.read_to_end(buf)
}

/// Run `op`, and if it fails with an error `is_transient` accepts, run it exactly once more after a
/// jittered pause.
pub async fn retry_once<T, E, F, Fut>(
    what: &str,
    base_delay: Duration,
    is_transient: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    match op().await {
        Err(e) if is_transient(&e) => {
            let jitter = rand::thread_rng().gen_range(0..=base_delay.as_millis() as u64);
            let delay = base_delay + Duration::from_millis(jitter);
            warn!(error=%e, delay_ms = (delay.as_millis() as u64), "{what} failed; retrying once");
            tokio::time::sleep(delay).await;
            op().await
        }
        res => res,
    }
}
