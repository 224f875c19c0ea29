use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Prompting techniques whose mention in a question is recorded as an
/// interest pattern.
const TECHNIQUES: &[&str] = &[
    "zero-shot",
    "few-shot",
    "chain of thought",
    "role prompting",
    "delimitadores",
];

/// Tokens recognized as candidate topics regardless of length.
const TOPIC_KEYWORDS: &[&str] = &[
    "prompt",
    "engenharia",
    "ia",
    "modelo",
    "llm",
    "chatgpt",
    "gpt",
    "resposta",
    "instrução",
    "contexto",
    "exemplo",
    "técnica",
];

/// Tokens longer than this are kept as topics even when not in the keyword list.
const TOPIC_MIN_CHARS: usize = 7;

/// Question category, assigned by the rule-based classifier or parsed from
/// the completion service's analysis. The service answers in Portuguese, so
/// deserialization accepts both spellings; anything unrecognized becomes
/// `Unknown` instead of failing the parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Category {
    Definition,
    Procedure,
    Comparison,
    Exemplification,
    #[default]
    Unknown,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Definition => "definition",
            Category::Procedure => "procedure",
            Category::Comparison => "comparison",
            Category::Exemplification => "exemplification",
            Category::Unknown => "unknown",
        }
    }

    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "definition" | "definição" | "definicao" => Category::Definition,
            "procedure" | "procedimento" => Category::Procedure,
            "comparison" | "comparação" | "comparacao" => Category::Comparison,
            "exemplification" | "exemplificação" | "exemplificacao" => {
                Category::Exemplification
            }
            _ => Category::Unknown,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Category::from_label(&label))
    }
}

/// Structured classification of one question/answer interaction. Serialized
/// as JSON into the interaction log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Insights {
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub possible_improvements: Vec<String>,
}

impl Insights {
    /// Fallback value used whenever the external analysis cannot be obtained
    /// or parsed.
    pub fn analysis_error(detail: impl std::fmt::Display) -> Self {
        Self {
            category: Category::Unknown,
            patterns: vec!["erro_na_analise".to_string()],
            possible_improvements: vec![format!(
                "Melhorar a extração de insights: {detail}"
            )],
        }
    }

    /// Parse the completion service's analysis response. The JSON body may be
    /// wrapped in a Markdown code fence; a malformed body yields the fallback.
    pub fn from_llm_text(text: &str) -> Self {
        let body = strip_code_fence(text);
        match serde_json::from_str(body) {
            Ok(insights) => insights,
            Err(e) => Self::analysis_error(e),
        }
    }
}

/// Classify a question by its phrasing. First matching rule wins.
pub fn classify(query: &str) -> Category {
    let q = query.to_lowercase();
    if q.contains("o que é") || q.contains("definição") {
        Category::Definition
    } else if q.contains("como") || q.contains("passos") {
        Category::Procedure
    } else if q.contains("diferença") || q.contains("versus") || q.contains(" vs ") {
        Category::Comparison
    } else if q.contains("exemplo") || q.contains("demonstre") {
        Category::Exemplification
    } else {
        Category::Unknown
    }
}

/// Rule-based analysis of a question, used when no completion service is
/// involved.
pub fn rule_based(query: &str, found: bool) -> Insights {
    let q = query.to_lowercase();
    let mut insights = Insights {
        category: classify(query),
        ..Default::default()
    };

    if !found {
        insights.patterns.push("pergunta_sem_resposta".to_string());
        let topics = extract_topics(query);
        if !topics.is_empty() {
            insights.possible_improvements.push(format!(
                "Adicionar informações sobre: {}",
                topics.join(", ")
            ));
        }
    }

    for technique in TECHNIQUES {
        if q.contains(technique) {
            insights
                .patterns
                .push(format!("interesse_em_{}", technique.replace(' ', "_")));
        }
    }

    insights
}

/// Candidate topics for expanding the knowledge base: known keywords plus any
/// long token, deduplicated in first-seen order.
pub fn extract_topics(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut topics = Vec::new();
    let mut seen = HashSet::new();

    for word in lowered.split(|c: char| !c.is_alphanumeric()) {
        if word.is_empty() {
            continue;
        }
        if TOPIC_KEYWORDS.contains(&word) || word.chars().count() > TOPIC_MIN_CHARS {
            if seen.insert(word.to_string()) {
                topics.push(word.to_string());
            }
        }
    }

    topics
}

/// Strip a Markdown code fence around a JSON body: a ```json block when
/// present, otherwise the first fenced block, otherwise the text itself.
fn strip_code_fence(text: &str) -> &str {
    if let Some(idx) = text.find("```json") {
        let after = &text[idx + "```json".len()..];
        let end = after.find("```").unwrap_or(after.len());
        return after[..end].trim();
    }
    if let Some(idx) = text.find("```") {
        let after = &text[idx + 3..];
        // Skip the rest of the opening fence line (possible language tag).
        let start = after.find('\n').map(|i| i + 1).unwrap_or(0);
        let end = after[start..].find("```").map(|i| start + i).unwrap_or(after.len());
        return after[start..end].trim();
    }
    text.trim()
}
