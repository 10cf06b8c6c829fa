// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Analysis request and result value objects.
//!
//! An [`AnalysisRequest`] is the normalized input the presentation layer hands
//! to the orchestrator after validation; an [`AnalysisResult`] is what the
//! winning backend produced. Both are immutable once built.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Minimum accepted signal length (characters)
pub const MIN_SIGNAL_CHARS: usize = 15;

/// Maximum accepted signal length (characters)
pub const MAX_SIGNAL_CHARS: usize = 5000;

/// Analysis lens applied to a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Spiral,
    Fractal,
    Quantum,
    Linear,
    Mythotechnic,
}

impl Protocol {
    pub const ALL: [Protocol; 5] = [
        Protocol::Spiral,
        Protocol::Fractal,
        Protocol::Quantum,
        Protocol::Linear,
        Protocol::Mythotechnic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Spiral => "spiral",
            Protocol::Fractal => "fractal",
            Protocol::Quantum => "quantum",
            Protocol::Linear => "linear",
            Protocol::Mythotechnic => "mythotechnic",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Protocol::ALL
            .into_iter()
            .find(|p| p.as_str() == lowered)
            .ok_or_else(|| RequestError::UnknownProtocol(s.to_string()))
    }
}

/// Analysis depth, bounded to `1..=5`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Depth(u8);

impl Depth {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> Result<Self, RequestError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(RequestError::DepthOutOfRange(value))
        }
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Depth {
    type Error = RequestError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Depth::new(value)
    }
}

impl From<Depth> for u8 {
    fn from(depth: Depth) -> Self {
        depth.0
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors raised while building a request
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("Depth must be between 1 and 5, got {0}")]
    DepthOutOfRange(u8),

    #[error("Unknown protocol: {0}")]
    UnknownProtocol(String),

    #[error("Signal must be at least {MIN_SIGNAL_CHARS} characters")]
    SignalTooShort,

    #[error("Signal must be at most {MAX_SIGNAL_CHARS} characters")]
    SignalTooLong,
}

/// Normalized analysis request
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRequest {
    signal: String,
    protocol: Protocol,
    depth: Depth,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    complexity: Option<u32>,
}

impl AnalysisRequest {
    pub fn new(signal: impl Into<String>, protocol: Protocol, depth: Depth) -> Self {
        Self {
            signal: signal.into(),
            protocol,
            depth,
            context: None,
            complexity: None,
        }
    }

    /// Build a request and enforce the signal length bounds
    pub fn validated(
        signal: impl Into<String>,
        protocol: Protocol,
        depth: Depth,
    ) -> Result<Self, RequestError> {
        let signal = signal.into();
        let chars = signal.chars().count();
        if chars < MIN_SIGNAL_CHARS {
            return Err(RequestError::SignalTooShort);
        }
        if chars > MAX_SIGNAL_CHARS {
            return Err(RequestError::SignalTooLong);
        }
        Ok(Self::new(signal, protocol, depth))
    }

    /// Attach opaque caller context
    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    /// Attach a precomputed complexity score
    pub fn with_complexity(mut self, complexity: u32) -> Self {
        self.complexity = Some(complexity);
        self
    }

    /// Compute and attach the signal complexity score
    pub fn with_computed_complexity(self) -> Self {
        let score = signal_complexity(&self.signal);
        self.with_complexity(score)
    }

    pub fn signal(&self) -> &str {
        &self.signal
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn depth(&self) -> Depth {
        self.depth
    }

    pub fn context(&self) -> Option<&serde_json::Value> {
        self.context.as_ref()
    }

    pub fn complexity(&self) -> Option<u32> {
        self.complexity
    }
}

/// Result produced by the backend that served a request
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    content: String,
    backend: String,
    confidence: f64,
    processing_time_ms: u64,
    metadata: serde_json::Map<String, serde_json::Value>,
}

impl AnalysisResult {
    /// Confidence is clamped into `[0, 1]`
    pub fn new(
        content: String,
        backend: String,
        confidence: f64,
        processing_time_ms: u64,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            content,
            backend,
            confidence,
            processing_time_ms,
            metadata,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn processing_time_ms(&self) -> u64 {
        self.processing_time_ms
    }

    pub fn metadata(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.metadata
    }
}

/// Heuristic complexity score for a signal, in `0..=100`.
///
/// Blends average sentence length, lexical diversity, sentence count and raw
/// length. Sentences split on `.`, `!` and `?`.
pub fn signal_complexity(signal: &str) -> u32 {
    let sentence_count = signal
        .split(['.', '!', '?'])
        .filter(|s| !s.trim().is_empty())
        .count();
    let char_len = signal.chars().count() as f64;
    let word_count = signal.split_whitespace().count().max(1) as f64;
    let avg_sentence_len = char_len / sentence_count.max(1) as f64;

    let unique_words: HashSet<String> = signal
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect();
    let lexical_diversity = unique_words.len() as f64 / word_count;

    let score = (avg_sentence_len * 1.5)
        + (lexical_diversity * 50.0)
        + (sentence_count as f64 * 3.0)
        + (char_len * 0.05);

    score.min(100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_bounds() {
        assert!(Depth::new(0).is_err());
        assert!(Depth::new(1).is_ok());
        assert!(Depth::new(5).is_ok());
        assert_eq!(Depth::new(6), Err(RequestError::DepthOutOfRange(6)));
    }

    #[test]
    fn test_depth_rejected_during_deserialization() {
        let parsed: Result<Depth, _> = serde_json::from_str("9");
        assert!(parsed.is_err());
        let parsed: Depth = serde_json::from_str("3").unwrap();
        assert_eq!(parsed.get(), 3);
    }

    #[test]
    fn test_protocol_parse_is_case_insensitive() {
        assert_eq!("Spiral".parse::<Protocol>().unwrap(), Protocol::Spiral);
        assert_eq!(" MYTHOTECHNIC ".parse::<Protocol>().unwrap(), Protocol::Mythotechnic);
        assert!("circular".parse::<Protocol>().is_err());
    }

    #[test]
    fn test_signal_length_validation() {
        let depth = Depth::new(2).unwrap();
        assert_eq!(
            AnalysisRequest::validated("too short", Protocol::Linear, depth).unwrap_err(),
            RequestError::SignalTooShort
        );
        let long = "a".repeat(MAX_SIGNAL_CHARS + 1);
        assert_eq!(
            AnalysisRequest::validated(long, Protocol::Linear, depth).unwrap_err(),
            RequestError::SignalTooLong
        );
        assert!(AnalysisRequest::validated("a perfectly fine signal", Protocol::Linear, depth).is_ok());
    }

    #[test]
    fn test_complexity_is_bounded() {
        assert_eq!(signal_complexity(""), 0);
        let huge = "word. ".repeat(2000);
        assert_eq!(signal_complexity(&huge), 100);
    }

    #[test]
    fn test_complexity_known_value() {
        // 2 sentences, 7 words, 5 unique, 28 chars
        let signal = "I dream of water. I dream on";
        let chars = signal.chars().count() as f64;
        let expected = (chars / 2.0) * 1.5 + (5.0 / 7.0) * 50.0 + 6.0 + chars * 0.05;
        assert_eq!(signal_complexity(signal), expected.round() as u32);
        assert_eq!(signal_complexity(signal), 64);
    }

    #[test]
    fn test_result_confidence_is_clamped() {
        let high = AnalysisResult::new("x".into(), "a".into(), 1.7, 5, Default::default());
        assert_eq!(high.confidence(), 1.0);
        let low = AnalysisResult::new("x".into(), "a".into(), -0.3, 5, Default::default());
        assert_eq!(low.confidence(), 0.0);
    }
}
