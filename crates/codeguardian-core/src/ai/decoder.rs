//! AI Response Decoder
//!
//! Models are asked for a single JSON object but routinely wrap it in a
//! markdown fence, surround it with prose, or both. One schema-parametric
//! decoder turns that raw text into a typed shape:
//!
//! 1. collect candidates: the fence-stripped text, the body of the first
//!    fenced block, and the span from the first `{` to the last `}`
//! 2. the first candidate that parses as a JSON object wins
//! 3. the object is deserialized into the expected shape and validated
//!
//! Failures are reported as [`DecodeError`], never as panics.

use codeguardian_shared::{
    DecodeError, DecodeFailureKind, Issue, SchemaTag, SecurityVulnerability,
};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const FENCE: &str = "```";

/// A typed shape the AI collaborator can be asked to return
pub trait ResponseShape: DeserializeOwned + Serialize + Send + 'static {
    const TAG: SchemaTag;

    /// Semantic checks serde cannot express
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// AI quality review. The score is kept apart from the heuristic score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityAssessment {
    #[serde(deserialize_with = "deserialize_score")]
    pub score: u8,
    pub issues: Vec<Issue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Explanation {
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Refactoring {
    pub refactored_code: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityAudit {
    pub vulnerabilities: Vec<SecurityVulnerability>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Documentation {
    pub documented_code: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerfectCode {
    pub perfect_code: String,
    pub explanation: String,
}

impl ResponseShape for QualityAssessment {
    const TAG: SchemaTag = SchemaTag::QualityAssessment;

    fn validate(&self) -> Result<(), String> {
        match self.issues.iter().position(|issue| issue.title.trim().is_empty()) {
            Some(index) => Err(format!("issue {index} has an empty title")),
            None => Ok(()),
        }
    }
}

impl ResponseShape for Explanation {
    const TAG: SchemaTag = SchemaTag::Explanation;
}

impl ResponseShape for Refactoring {
    const TAG: SchemaTag = SchemaTag::Refactoring;
}

impl ResponseShape for SecurityAudit {
    const TAG: SchemaTag = SchemaTag::SecurityAudit;

    fn validate(&self) -> Result<(), String> {
        match self
            .vulnerabilities
            .iter()
            .position(|vulnerability| vulnerability.title.trim().is_empty())
        {
            Some(index) => Err(format!("vulnerability {index} has an empty title")),
            None => Ok(()),
        }
    }
}

impl ResponseShape for Documentation {
    const TAG: SchemaTag = SchemaTag::Documentation;
}

impl ResponseShape for PerfectCode {
    const TAG: SchemaTag = SchemaTag::PerfectCode;
}

/// Result of decoding against a runtime [`SchemaTag`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "shape", content = "value", rename_all = "snake_case")]
pub enum DecodedResponse {
    QualityAssessment(QualityAssessment),
    Explanation(Explanation),
    Refactoring(Refactoring),
    SecurityAudit(SecurityAudit),
    Documentation(Documentation),
    PerfectCode(PerfectCode),
}

impl DecodedResponse {
    pub fn tag(&self) -> SchemaTag {
        match self {
            DecodedResponse::QualityAssessment(_) => SchemaTag::QualityAssessment,
            DecodedResponse::Explanation(_) => SchemaTag::Explanation,
            DecodedResponse::Refactoring(_) => SchemaTag::Refactoring,
            DecodedResponse::SecurityAudit(_) => SchemaTag::SecurityAudit,
            DecodedResponse::Documentation(_) => SchemaTag::Documentation,
            DecodedResponse::PerfectCode(_) => SchemaTag::PerfectCode,
        }
    }
}

/// Decode raw model text into the shape `T`
pub fn decode<T: ResponseShape>(raw: &str) -> Result<T, DecodeError> {
    let object = extract_object(raw).map_err(|kind| DecodeError::new(T::TAG, kind, raw))?;

    let shape: T = serde_json::from_value(Value::Object(object)).map_err(|e| {
        DecodeError::new(T::TAG, DecodeFailureKind::SchemaMismatch(e.to_string()), raw)
    })?;

    shape
        .validate()
        .map_err(|reason| DecodeError::new(T::TAG, DecodeFailureKind::SchemaMismatch(reason), raw))?;

    Ok(shape)
}

/// Decode raw model text into the shape named by `tag`
pub fn decode_as(raw: &str, tag: SchemaTag) -> Result<DecodedResponse, DecodeError> {
    match tag {
        SchemaTag::QualityAssessment => decode(raw).map(DecodedResponse::QualityAssessment),
        SchemaTag::Explanation => decode(raw).map(DecodedResponse::Explanation),
        SchemaTag::Refactoring => decode(raw).map(DecodedResponse::Refactoring),
        SchemaTag::SecurityAudit => decode(raw).map(DecodedResponse::SecurityAudit),
        SchemaTag::Documentation => decode(raw).map(DecodedResponse::Documentation),
        SchemaTag::PerfectCode => decode(raw).map(DecodedResponse::PerfectCode),
    }
}

/// Find the first candidate that parses as a JSON object
fn extract_object(raw: &str) -> Result<Map<String, Value>, DecodeFailureKind> {
    if !raw.contains('{') {
        return Err(DecodeFailureKind::NoJsonObject);
    }

    let mut not_object = None;
    let mut malformed = None;
    for candidate in candidates(raw) {
        match serde_json::from_str::<Value>(candidate) {
            Ok(Value::Object(object)) => return Ok(object),
            Ok(other) => {
                not_object.get_or_insert_with(|| {
                    format!("expected a JSON object, found {}", json_kind(&other))
                });
            }
            Err(e) => malformed = Some(e.to_string()),
        }
    }

    Err(match (not_object, malformed) {
        (Some(reason), _) => DecodeFailureKind::SchemaMismatch(reason),
        (None, Some(reason)) => DecodeFailureKind::Malformed(reason),
        (None, None) => DecodeFailureKind::NoJsonObject,
    })
}

fn candidates(raw: &str) -> Vec<&str> {
    let mut found = Vec::with_capacity(3);

    push_candidate(&mut found, strip_fences(raw));
    if let Some(block) = first_fenced_block(raw) {
        push_candidate(&mut found, block);
    }
    if let Some(span) = brace_span(raw) {
        push_candidate(&mut found, span);
    }

    found
}

fn push_candidate<'a>(found: &mut Vec<&'a str>, candidate: &'a str) {
    let candidate = candidate.trim();
    if !candidate.is_empty() && !found.contains(&candidate) {
        found.push(candidate);
    }
}

/// Trimmed text without a leading fence line and a trailing fence
fn strip_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix(FENCE) {
        // drop the language tag line
        text = match rest.find('\n') {
            Some(newline) => &rest[newline + 1..],
            None => rest,
        };
    }
    if let Some(rest) = text.trim_end().strip_suffix(FENCE) {
        text = rest;
    }
    text
}

/// Body of the first fenced block anywhere in the text.
/// The closing fence must start a line, so fences quoted inside JSON strings do not end it.
fn first_fenced_block(raw: &str) -> Option<&str> {
    let open = raw.find(FENCE)?;
    let after_open = &raw[open + FENCE.len()..];
    let body_start = after_open.find('\n')? + 1;
    let body = &after_open[body_start..];
    let close = if body.starts_with(FENCE) {
        0
    } else {
        body.find("\n```")? + 1
    };
    Some(&body[..close])
}

/// From the first `{` to the last `}`
fn brace_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Accept any JSON number, round it and clamp it to 0-100
fn deserialize_score<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let number = serde_json::Number::deserialize(deserializer)?;
    let value = number
        .as_f64()
        .filter(|v| v.is_finite())
        .ok_or_else(|| de::Error::custom("score is not a finite number"))?;
    Ok(value.round().clamp(0.0, 100.0) as u8)
}
