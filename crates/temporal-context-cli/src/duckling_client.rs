//! HTTP extractor backed by a running Duckling server.

use std::time::Duration;

use temporal_context::duckling::parse_response;
use temporal_context::error::{ContextError, Result};
use temporal_context::{ExtractRequest, RawMatch, TemporalExtractor};
use tracing::debug;

/// Languages Duckling ships a time grammar for.
const SUPPORTED_LANGUAGES: &[&str] = &[
    "af", "ar", "bg", "bn", "ca", "cs", "da", "de", "el", "en", "es", "et", "fi", "fa", "fr",
    "ga", "he", "hi", "hr", "hu", "id", "is", "it", "ja", "ka", "km", "kn", "ko", "lo", "ml",
    "mn", "my", "nb", "ne", "nl", "pl", "pt", "ro", "ru", "sk", "sv", "sw", "ta", "te", "th",
    "tr", "uk", "vi", "zh",
];

const DIMS: &str = r#"["time","duration"]"#;

/// Calls Duckling's `POST /parse` endpoint.
///
/// Latent matches are always requested; filtering them is the engine's job.
/// Duckling has no notion of a plausible year window, so
/// [`ExtractRequest::min_year`] and [`ExtractRequest::max_year`] are ignored.
pub struct DucklingClient {
    agent: ureq::Agent,
    parse_url: String,
}

impl DucklingClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .build();
        Self {
            agent,
            parse_url: format!("{}/parse", base_url.trim_end_matches('/')),
        }
    }
}

impl TemporalExtractor for DucklingClient {
    fn extract(&self, request: &ExtractRequest<'_>) -> Result<Vec<RawMatch>> {
        if request.text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let lang = request.lang.to_ascii_uppercase();
        let reftime = request.reference.timestamp_millis().to_string();
        debug!(url = %self.parse_url, %lang, %reftime, bytes = request.text.len(), "querying duckling");

        let response = self.agent.post(&self.parse_url).send_form(&[
            ("text", request.text),
            ("lang", lang.as_str()),
            ("reftime", reftime.as_str()),
            ("tz", request.reference.timezone().name()),
            ("dims", DIMS),
            ("latent", "true"),
        ]);

        let body = match response {
            Ok(resp) => resp
                .into_string()
                .map_err(|e| ContextError::Extraction(format!("reading duckling response: {e}")))?,
            Err(ureq::Error::Status(code, resp)) => {
                let text = resp.into_string().unwrap_or_default();
                return Err(ContextError::Extraction(format!("duckling error {code}: {text}")));
            }
            Err(err) => {
                return Err(ContextError::Extraction(format!("duckling request failed: {err}")))
            }
        };

        parse_response(request.text, &body)
    }

    fn is_language_supported(&self, lang: &str) -> bool {
        let lang = lang.to_ascii_lowercase();
        let base = lang.split(['_', '-']).next().unwrap_or_default();
        SUPPORTED_LANGUAGES.contains(&base)
    }
}
