// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Prompt Templates
//!
//! Renders analysis prompts with Handlebars. Each provider family has its own
//! template; both read the same [`PromptContext`], built from an
//! [`AnalysisRequest`].
//!
//! # Supported Placeholders
//!
//! - `{{signal}}` - Caller's signal text (never HTML-escaped)
//! - `{{protocol}}` / `{{protocol_upper}}` - Protocol name
//! - `{{depth}}` - Depth level 1-5
//! - `{{lens}}` - Protocol-specific instruction or focus
//! - `{{analysis_count}}`, `{{resonance_signature}}`, `{{consciousness_level}}` - Caller context
//! - `{{has_context}}` - Whether caller context was supplied

use crate::domain::analysis::{AnalysisRequest, Protocol};
use anyhow::{Context, Result};
use handlebars::Handlebars;
use serde::Serialize;

const ARCHAEOLOGY_TEMPLATE: &str = r#"**{{protocol_upper}} PROTOCOL CONSCIOUSNESS ANALYSIS - DEPTH {{depth}}/5**

CONSCIOUSNESS SIGNAL: "{{signal}}"

ANALYSIS FRAMEWORK: {{lens}}
{{#if has_context}}
CONTEXT:
- Previous explorations: {{analysis_count}}
- Resonance pattern: {{resonance_signature}}
- Consciousness level: {{consciousness_level}}
{{/if}}
INSTRUCTIONS:
Execute comprehensive consciousness archaeology using the {{protocol}} protocol at depth level {{depth}}.

Structure your analysis with:

1. **PATTERN IDENTIFICATION**: Core patterns and structures detected in the signal
2. **{{protocol_upper}} ANALYSIS**: Deep exploration using this protocol's specific lens
3. **ARCHETYPAL RESONANCE**: Universal patterns and symbolic content
4. **RECURSIVE ELEMENTS**: Self-referential patterns and feedback loops
5. **TRANSFORMATION INSIGHTS**: Guidance for consciousness evolution and integration
6. **PRACTICAL RECOMMENDATIONS**: Specific actionable steps for growth

Format with clear headings, bullet points, and practical wisdom. Provide depth, authenticity, and actionable insights. Focus on empowering the individual's consciousness journey.

Be direct, insightful, and transformative while remaining grounded and practical."#;

const STRUCTURED_TEMPLATE: &str = r#"**CONSCIOUSNESS ANALYSIS REQUEST**

Signal: "{{signal}}"
Protocol: {{protocol_upper}}
Depth: {{depth}}/5
Focus: {{lens}}
{{#if has_context}}
User Context: {{analysis_count}} previous analyses, {{resonance_signature}} resonance
{{/if}}
Perform deep consciousness analysis focusing on {{lens}}.

Provide a structured response with:

1. **CORE PATTERN ANALYSIS** - Identify the fundamental patterns in this consciousness signal
2. **{{protocol_upper}} LENS** - Analyze through the specific {{protocol}} protocol perspective
3. **ARCHETYPAL MAPPING** - Connect to universal human patterns and symbols
4. **TRANSFORMATION PATHWAYS** - Specific guidance for consciousness evolution
5. **INTEGRATION PRACTICES** - Practical steps for applying these insights

Make the analysis depth level {{depth}}/5 - where 1 is surface level and 5 is profound collective unconscious depth.

Be insightful, practical, and empowering. Focus on actionable wisdom for personal growth."#;

/// System message sent ahead of chat-style prompts
pub const STRUCTURED_SYSTEM_PROMPT: &str = "You are a consciousness analysis expert specializing in archetypal psychology, pattern recognition, and transformational insights. Provide deep, practical, and empowering analysis.";

/// Prompt family; one per provider API shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptStyle {
    /// Single user message with full instructions (Anthropic)
    Archaeology,
    /// System + user messages with a focus line (OpenAI)
    Structured,
}

impl PromptStyle {
    fn template_name(&self) -> &'static str {
        match self {
            PromptStyle::Archaeology => "archaeology",
            PromptStyle::Structured => "structured",
        }
    }

    fn lens(&self, protocol: Protocol) -> &'static str {
        match (self, protocol) {
            (PromptStyle::Archaeology, Protocol::Spiral) => "Focus on recursive patterns, feedback loops, and self-referential consciousness structures. Analyze how thoughts spiral into themselves and create infinite loops of reflection.",
            (PromptStyle::Archaeology, Protocol::Fractal) => "Examine self-similarity across different scales of experience. Identify how core patterns replicate throughout thoughts, emotions, and life experiences.",
            (PromptStyle::Archaeology, Protocol::Quantum) => "Explore superposition states of consciousness, observer effects on reality, and probability spaces of meaning. Consider how observation changes the observed.",
            (PromptStyle::Archaeology, Protocol::Linear) => "Map causal chains and sequential patterns. Trace logical progressions and cause-effect relationships in consciousness.",
            (PromptStyle::Archaeology, Protocol::Mythotechnic) => "Perform archetypal analysis using Jungian depth psychology. Identify mythological parallels, symbolic content, and collective unconscious patterns.",
            (PromptStyle::Structured, Protocol::Spiral) => "recursive patterns, self-referential loops, and infinite reflection cycles",
            (PromptStyle::Structured, Protocol::Fractal) => "self-similarity across scales, pattern replication, and dimensional analysis",
            (PromptStyle::Structured, Protocol::Quantum) => "superposition states, observer effects, and probability consciousness",
            (PromptStyle::Structured, Protocol::Linear) => "causal chains, sequential processing, and logical progression mapping",
            (PromptStyle::Structured, Protocol::Mythotechnic) => "archetypal identification, mythological parallels, and symbolic interpretation",
        }
    }
}

/// Template variables for one request
#[derive(Debug, Clone, Serialize)]
pub struct PromptContext {
    pub signal: String,
    pub protocol: String,
    pub protocol_upper: String,
    pub depth: u8,
    pub lens: String,
    pub has_context: bool,
    pub analysis_count: u64,
    pub resonance_signature: String,
    pub consciousness_level: u64,
}

impl PromptContext {
    pub fn from_request(request: &AnalysisRequest, style: PromptStyle) -> Self {
        let context = request.context();
        let field = |key: &str| context.and_then(|c| c.get(key));

        Self {
            signal: request.signal().to_string(),
            protocol: request.protocol().as_str().to_string(),
            protocol_upper: request.protocol().as_str().to_uppercase(),
            depth: request.depth().get(),
            lens: style.lens(request.protocol()).to_string(),
            has_context: context.is_some(),
            analysis_count: field("analysis_count").and_then(|v| v.as_u64()).unwrap_or(0),
            resonance_signature: field("resonance_signature")
                .and_then(|v| v.as_str())
                .unwrap_or("spiral")
                .to_string(),
            consciousness_level: field("consciousness_level").and_then(|v| v.as_u64()).unwrap_or(1),
        }
    }
}

pub struct PromptTemplateEngine {
    handlebars: Handlebars<'static>,
}

impl PromptTemplateEngine {
    pub fn new() -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        // Prompts are plain text
        handlebars.register_escape_fn(handlebars::no_escape);

        handlebars
            .register_template_string(PromptStyle::Archaeology.template_name(), ARCHAEOLOGY_TEMPLATE)
            .context("Invalid archaeology prompt template")?;
        handlebars
            .register_template_string(PromptStyle::Structured.template_name(), STRUCTURED_TEMPLATE)
            .context("Invalid structured prompt template")?;

        Ok(Self { handlebars })
    }

    pub fn render(&self, request: &AnalysisRequest, style: PromptStyle) -> Result<String> {
        let context = PromptContext::from_request(request, style);
        self.handlebars
            .render(style.template_name(), &context)
            .context("Failed to render prompt template")
    }
}

/// Fraction of satisfied quality indicators, rounded to two decimals
pub fn indicator_confidence(indicators: &[bool]) -> f64 {
    if indicators.is_empty() {
        return 0.0;
    }
    let hits = indicators.iter().filter(|hit| **hit).count() as f64;
    (hits / indicators.len() as f64 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::Depth;

    fn request() -> AnalysisRequest {
        AnalysisRequest::new(
            "I keep \"returning\" to the same <house>",
            Protocol::Mythotechnic,
            Depth::new(4).unwrap(),
        )
    }

    #[test]
    fn test_archaeology_prompt() {
        let engine = PromptTemplateEngine::new().unwrap();
        let prompt = engine.render(&request(), PromptStyle::Archaeology).unwrap();

        assert!(prompt.starts_with("**MYTHOTECHNIC PROTOCOL CONSCIOUSNESS ANALYSIS - DEPTH 4/5**"));
        assert!(prompt.contains("I keep \"returning\" to the same <house>"));
        assert!(prompt.contains("Jungian depth psychology"));
        assert!(!prompt.contains("CONTEXT:"));
    }

    #[test]
    fn test_structured_prompt_with_context() {
        let engine = PromptTemplateEngine::new().unwrap();
        let request = request().with_context(serde_json::json!({
            "analysis_count": 7,
            "resonance_signature": "fractal"
        }));
        let prompt = engine.render(&request, PromptStyle::Structured).unwrap();

        assert!(prompt.contains("Protocol: MYTHOTECHNIC"));
        assert!(prompt.contains("Focus: archetypal identification"));
        assert!(prompt.contains("User Context: 7 previous analyses, fractal resonance"));
    }

    #[test]
    fn test_context_defaults() {
        let request = request().with_context(serde_json::json!({}));
        let context = PromptContext::from_request(&request, PromptStyle::Archaeology);
        assert!(context.has_context);
        assert_eq!(context.analysis_count, 0);
        assert_eq!(context.resonance_signature, "spiral");
        assert_eq!(context.consciousness_level, 1);
    }

    #[test]
    fn test_indicator_confidence() {
        assert_eq!(indicator_confidence(&[]), 0.0);
        assert_eq!(indicator_confidence(&[true, true]), 1.0);
        assert_eq!(indicator_confidence(&[true, false, false]), 0.33);
        assert_eq!(indicator_confidence(&[true, true, true, true, true, false, false]), 0.71);
    }
}
