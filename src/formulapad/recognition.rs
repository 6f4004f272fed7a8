//! # Recognition Client
//!
//! Formula recognition runs on a remote endpoint:
//!
//! ```text
//! POST <base>/api/ocr   {"image": "<base64 or data URI>"}
//!   2xx → {"latex": "...", "confidence": 0.97, "formats": {...}}
//!   else → {"detail": "..."}
//! ```
//!
//! The persistence layer only relies on `latex` and `confidence`. When the
//! endpoint cannot be reached while offline, [`recognize_with_fallback`]
//! substitutes a canned result from [`MockRecognizer`]; online, the failure is
//! returned to the caller as a recoverable "could not recognize".

use crate::connectivity::ConnectivityProbe;
use crate::error::{FormulaPadError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::cell::Cell;
use std::time::Duration;
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecognitionFormats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mathml: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asciimath: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub latex: String,
    /// In `0.0..=1.0`.
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formats: Option<RecognitionFormats>,
}

#[derive(Deserialize)]
struct ErrorPayload {
    detail: String,
}

pub trait Recognizer {
    fn recognize(&self, image: &str) -> Result<RecognitionResult>;
}

/// Encode raw image bytes as a data URI accepted by the endpoint.
pub fn image_payload(bytes: &[u8], mime: &str) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Interpret an endpoint reply. Non-2xx statuses become network errors
/// carrying the server's `detail` when there is one.
pub fn parse_response(status: u16, body: &str) -> Result<RecognitionResult> {
    if !(200..300).contains(&status) {
        let detail = serde_json::from_str::<ErrorPayload>(body)
            .map(|p| p.detail)
            .unwrap_or_else(|_| format!("OCR failed with status {}", status));
        return Err(FormulaPadError::Network(detail));
    }

    let mut result: RecognitionResult = serde_json::from_str(body)
        .map_err(|e| FormulaPadError::Network(format!("malformed recognition response: {e}")))?;
    result.confidence = result.confidence.clamp(0.0, 1.0);
    Ok(result)
}

pub struct HttpRecognizer {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpRecognizer {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FormulaPadError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/api/ocr", self.base_url)
    }

    /// Whether the API answers at all.
    pub fn health(&self) -> bool {
        self.client
            .get(format!("{}/api/", self.base_url))
            .send()
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

impl Recognizer for HttpRecognizer {
    fn recognize(&self, image: &str) -> Result<RecognitionResult> {
        debug!(endpoint = %self.endpoint(), "requesting recognition");
        let response = self
            .client
            .post(self.endpoint())
            .json(&json!({ "image": image }))
            .send()
            .map_err(|e| FormulaPadError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| FormulaPadError::Network(e.to_string()))?;
        parse_response(status, &body)
    }
}

impl ConnectivityProbe for HttpRecognizer {
    fn is_online(&self) -> bool {
        self.health()
    }
}

/// Canned recognizer used offline and in demos. Cycles through its results.
pub struct MockRecognizer {
    results: Vec<RecognitionResult>,
    next: Cell<usize>,
}

impl MockRecognizer {
    pub fn new(results: Vec<RecognitionResult>) -> Self {
        Self {
            results,
            next: Cell::new(0),
        }
    }
}

fn canned(latex: &str, confidence: f64, asciimath: &str, text: &str) -> RecognitionResult {
    RecognitionResult {
        latex: latex.to_string(),
        confidence,
        formats: Some(RecognitionFormats {
            latex: Some(latex.to_string()),
            mathml: None,
            asciimath: Some(asciimath.to_string()),
            text: Some(text.to_string()),
        }),
    }
}

impl Default for MockRecognizer {
    fn default() -> Self {
        Self::new(vec![
            canned(
                "\\frac{d}{dx}[x^n] = nx^{n-1}",
                0.98,
                "d/dx[x^n] = nx^(n-1)",
                "The derivative of x to the n equals n times x to the n minus 1",
            ),
            canned(
                "\\lim_{x \\to \\infty} \\frac{1}{x} = 0",
                0.95,
                "lim_(x->oo) 1/x = 0",
                "The limit as x approaches infinity of 1 over x equals 0",
            ),
            canned(
                "\\sum_{i=1}^{n} i = \\frac{n(n+1)}{2}",
                0.97,
                "sum_(i=1)^n i = (n(n+1))/2",
                "The sum from i equals 1 to n of i equals n times n plus 1 divided by 2",
            ),
        ])
    }
}

impl Recognizer for MockRecognizer {
    fn recognize(&self, _image: &str) -> Result<RecognitionResult> {
        if self.results.is_empty() {
            return Err(FormulaPadError::Network("no canned results".to_string()));
        }
        let i = self.next.get();
        self.next.set((i + 1) % self.results.len());
        Ok(self.results[i].clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionOutcome {
    pub result: RecognitionResult,
    /// True when the result came from the fallback recognizer.
    pub simulated: bool,
}

/// Run `primary`; if it fails with a network error while offline, use `fallback`.
pub fn recognize_with_fallback(
    online: bool,
    primary: &dyn Recognizer,
    fallback: &dyn Recognizer,
    image: &str,
) -> Result<RecognitionOutcome> {
    match primary.recognize(image) {
        Ok(result) => Ok(RecognitionOutcome {
            result,
            simulated: false,
        }),
        Err(FormulaPadError::Network(detail)) if !online => {
            warn!("Recognition unavailable offline, using fallback: {detail}");
            Ok(RecognitionOutcome {
                result: fallback.recognize(image)?,
                simulated: true,
            })
        }
        Err(e) => Err(e),
    }
}
