use serde::Deserialize;
use serde_json::Value;

/// A `summary`/`topics` value as the model actually returns it: a string, a
/// list, a list of lists, or something else entirely.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LooseField {
    Text(String),
    List(Vec<LooseField>),
    Other(Value),
}

impl LooseField {
    /// Every string leaf in document order, trimmed, empties dropped.
    pub fn flatten(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_into(&mut out);
        out
    }

    fn collect_into(&self, out: &mut Vec<String>) {
        match self {
            LooseField::Text(s) => {
                let s = s.trim();
                if !s.is_empty() {
                    out.push(s.to_string());
                }
            }
            LooseField::List(items) => {
                for item in items {
                    item.collect_into(out);
                }
            }
            LooseField::Other(Value::Number(n)) => out.push(n.to_string()),
            LooseField::Other(Value::Bool(b)) => out.push(b.to_string()),
            LooseField::Other(_) => {}
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    #[serde(default)]
    summary: Option<LooseField>,
    #[serde(default)]
    topics: Option<LooseField>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSummary {
    pub summary: String,
    pub topics: Vec<String>,
}

impl ParsedSummary {
    fn raw(response: &str) -> Self {
        Self {
            summary: response.trim().to_string(),
            topics: Vec::new(),
        }
    }
}

pub fn strip_code_fences(response: &str) -> &str {
    let trimmed = response.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

fn is_bulleted(line: &str) -> bool {
    line.starts_with('-') || line.starts_with('*') || line.starts_with('•')
}

fn bullet_list(points: &[String]) -> String {
    points
        .iter()
        .map(|p| if is_bulleted(p) { p.clone() } else { format!("- {}", p) })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Turns a model response into a summary and topic list. Never fails: anything
/// that is not a JSON object with a usable `summary` becomes a raw-text summary
/// with no topics.
pub fn parse_summary_response(response: &str) -> ParsedSummary {
    let cleaned = strip_code_fences(response);

    let value: Value = match serde_json::from_str(cleaned) {
        Ok(value @ Value::Object(_)) => value,
        _ => return ParsedSummary::raw(response),
    };
    let raw: RawResponse = match serde_json::from_value(value) {
        Ok(raw) => raw,
        Err(_) => return ParsedSummary::raw(response),
    };

    let summary = match &raw.summary {
        Some(LooseField::Text(s)) => s.trim().to_string(),
        Some(field @ LooseField::List(_)) => bullet_list(&field.flatten()),
        Some(field) => field.flatten().join("\n"),
        None => String::new(),
    };
    if summary.is_empty() {
        return ParsedSummary::raw(response);
    }

    let mut topics: Vec<String> = Vec::new();
    for topic in raw.topics.as_ref().map(LooseField::flatten).unwrap_or_default() {
        if !topics.contains(&topic) {
            topics.push(topic);
        }
    }

    ParsedSummary { summary, topics }
}
