use anyhow::Result;
use serde::Serialize;
use tracing::info;

use crate::agent::Agent;
use crate::knowledge::{self, FALLBACK_ANSWER};

/// Share of expected keywords that must appear for a completion-mode answer
/// to pass.
const KEYWORD_THRESHOLD: f64 = 0.6;

/// Prefix length (in characters) compared in exact mode.
const PREFIX_CHARS: usize = 50;

/// A test question with its expected answer and, for completion-mode scoring,
/// the keywords the answer must touch.
#[derive(Debug, Clone)]
pub struct ValidationCase {
    pub question: String,
    pub expected_answer: String,
    pub expected_keywords: Option<Vec<String>>,
}

impl ValidationCase {
    fn new(question: &str, expected_answer: &str, keywords: Option<&[&str]>) -> Self {
        Self {
            question: question.to_string(),
            expected_answer: expected_answer.to_string(),
            expected_keywords: keywords
                .map(|ks| ks.iter().map(|k| k.to_string()).collect()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseResult {
    pub question: String,
    pub expected_answer: String,
    pub actual_answer: String,
    pub is_valid: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub results: Vec<CaseResult>,
    pub accuracy_rate: f64,
    pub message: String,
}

/// Runs the fixed validation suite through an agent and scores the answers.
/// Completion-mode answers are scored by keyword coverage, knowledge-base
/// answers by prefix equality.
pub struct Validator {
    cases: Vec<ValidationCase>,
    total_tests: usize,
    correct_responses: usize,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator {
    /// Build the validator with the predefined suite.
    pub fn new() -> Self {
        Self::with_cases(seed_cases())
    }

    pub fn with_cases(cases: Vec<ValidationCase>) -> Self {
        Self {
            cases,
            total_tests: 0,
            correct_responses: 0,
        }
    }

    /// Add (or replace) an expected answer for a test question. Cases added
    /// this way are scored by prefix comparison only.
    pub fn add_case(&mut self, question: &str, expected_answer: &str) {
        match self.cases.iter_mut().find(|c| c.question == question) {
            Some(case) => case.expected_answer = expected_answer.to_string(),
            None => self
                .cases
                .push(ValidationCase::new(question, expected_answer, None)),
        }
    }

    /// Score one answer against the suite. Every call counts as a test; an
    /// unrecognized question never counts as correct.
    pub fn validate_one(&mut self, question: &str, actual: &str, llm_mode: bool) -> bool {
        self.total_tests += 1;

        let normalized = knowledge::normalize(question);
        let Some(case) = self
            .cases
            .iter()
            .find(|c| knowledge::normalize(&c.question) == normalized)
        else {
            return false;
        };

        let is_valid = match (&case.expected_keywords, llm_mode) {
            (Some(keywords), true) => {
                let answer = actual.to_lowercase();
                let matches = keywords
                    .iter()
                    .filter(|k| answer.contains(&k.to_lowercase()))
                    .count();
                matches as f64 >= KEYWORD_THRESHOLD * keywords.len() as f64
            }
            _ => {
                let actual = collapse_whitespace(actual);
                let expected = collapse_whitespace(&case.expected_answer);
                let prefix: String = expected.chars().take(PREFIX_CHARS).collect();
                actual.starts_with(&prefix)
            }
        };

        if is_valid {
            self.correct_responses += 1;
        }
        is_valid
    }

    /// Reset the running counters.
    pub fn reset(&mut self) {
        self.total_tests = 0;
        self.correct_responses = 0;
    }

    /// Drive every case through the agent and aggregate the outcome.
    pub async fn run_all(&mut self, agent: &mut Agent) -> Result<ValidationReport> {
        self.reset();
        let llm_mode = agent.llm_mode();
        info!(cases = self.cases.len(), llm_mode, "running validation suite");

        let suite: Vec<(String, String)> = self
            .cases
            .iter()
            .map(|c| (c.question.clone(), c.expected_answer.clone()))
            .collect();

        let mut results = Vec::with_capacity(suite.len());
        for (question, expected_answer) in suite {
            let (actual_answer, _) = agent.resolve(&question).await?;
            let is_valid = self.validate_one(&question, &actual_answer, llm_mode);
            results.push(CaseResult {
                question,
                expected_answer,
                actual_answer,
                is_valid,
            });
        }

        let (accuracy_rate, message) = self.accuracy();
        info!(accuracy_rate, "validation suite finished");
        Ok(ValidationReport {
            results,
            accuracy_rate,
            message,
        })
    }

    fn accuracy(&self) -> (f64, String) {
        if self.total_tests == 0 {
            return (0.0, "Nenhum teste realizado ainda.".to_string());
        }
        let rate = self.correct_responses as f64 / self.total_tests as f64 * 100.0;
        let message = format!(
            "Taxa de Respostas Precisas: {:.2}% ({}/{})",
            rate, self.correct_responses, self.total_tests
        );
        (rate, message)
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn seed_cases() -> Vec<ValidationCase> {
    vec![
        ValidationCase::new(
            "O que é um prompt?",
            "Um prompt é uma instrução dada a uma IA para obter uma resposta específica. É a entrada textual que orienta o modelo de linguagem sobre o que deve ser feito ou respondido.",
            Some(&["instrução", "modelo", "linguagem", "IA", "entrada textual"]),
        ),
        ValidationCase::new(
            "Me explique engenharia de prompt",
            "Engenharia de Prompt é a prática de criar prompts eficazes para otimizar as respostas de modelos de IA. Envolve técnicas específicas para formular instruções que levam a respostas mais precisas, relevantes e úteis.",
            Some(&["otimizar", "eficazes", "instruções", "precisas", "técnicas"]),
        ),
        ValidationCase::new(
            "Como faço para criar prompts melhores?",
            "Para criar um bom prompt, você deve: 1) Ser claro e específico; 2) Fornecer contexto suficiente; 3) Definir o tom e formato desejados; 4) Incluir exemplos quando necessário; 5) Considerar o uso de delimitadores para separar instruções de contexto.",
            Some(&["claro", "específico", "contexto", "exemplo", "delimitadores"]),
        ),
        ValidationCase::new(
            "Quais são os tipos de técnicas de prompting?",
            "Algumas técnicas de Engenharia de Prompt incluem: 1) Zero-shot prompting; 2) Few-shot prompting com exemplos; 3) Chain-of-Thought (cadeia de pensamento); 4) Role prompting (definição de papéis); 5) Uso de delimitadores e estruturação; 6) Instruções passo a passo.",
            Some(&["zero-shot", "few-shot", "chain", "pensamento", "role"]),
        ),
        ValidationCase::new(
            "O que é uma pergunta que não está na base de conhecimento?",
            FALLBACK_ANSWER,
            None,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::KnowledgeStore;
    use crate::prompts;
    use crate::store::InteractionLog;

    fn agent_with(knowledge: KnowledgeStore) -> Agent {
        Agent::new(
            knowledge,
            None,
            InteractionLog::open_in_memory().unwrap(),
            prompts::INTERNAL_PROMPT,
        )
    }

    /// An agent whose knowledge base answers every suite question with the
    /// exact expected text.
    fn perfect_agent() -> Agent {
        let mut knowledge = KnowledgeStore::new();
        for case in seed_cases() {
            knowledge.add_faq(&case.question, &case.expected_answer);
        }
        agent_with(knowledge)
    }

    #[tokio::test]
    async fn test_run_all_perfect_agent_scores_100() {
        let mut validator = Validator::new();
        let mut agent = perfect_agent();
        let report = validator.run_all(&mut agent).await.unwrap();

        assert_eq!(report.results.len(), 5);
        assert!(report.results.iter().all(|r| r.is_valid));
        assert_eq!(report.accuracy_rate, 100.0);
        assert_eq!(report.message, "Taxa de Respostas Precisas: 100.00% (5/5)");
    }

    #[tokio::test]
    async fn test_run_all_resets_between_runs() {
        let mut validator = Validator::new();
        let mut agent = perfect_agent();
        validator.run_all(&mut agent).await.unwrap();
        let report = validator.run_all(&mut agent).await.unwrap();
        // Counters restart; a second run does not accumulate.
        assert_eq!(report.message, "Taxa de Respostas Precisas: 100.00% (5/5)");
    }

    #[tokio::test]
    async fn test_run_all_without_cases() {
        let mut validator = Validator::with_cases(Vec::new());
        let mut agent = agent_with(KnowledgeStore::new());
        let report = validator.run_all(&mut agent).await.unwrap();
        assert_eq!(report.accuracy_rate, 0.0);
        assert_eq!(report.message, "Nenhum teste realizado ainda.");
    }

    #[test]
    fn test_validate_one_prefix_match() {
        let mut validator = Validator::new();
        // Same beginning, different whitespace, divergence past 50 chars.
        let actual = "Um prompt é uma  instrução dada a uma IA para obter uma resposta específica. Texto extra.";
        assert!(validator.validate_one("O que é um prompt?", actual, false));
    }

    #[test]
    fn test_validate_one_prefix_mismatch() {
        let mut validator = Validator::new();
        assert!(!validator.validate_one("O que é um prompt?", "Outra resposta qualquer.", false));
    }

    #[test]
    fn test_validate_one_keyword_at_threshold() {
        let mut validator = Validator::new();
        // 3 of 5 keywords (60%): instrução, modelo, IA.
        let actual = "Uma instrução que orienta o modelo de IA.";
        assert!(validator.validate_one("O que é um prompt?", actual, true));
    }

    #[test]
    fn test_validate_one_keyword_below_threshold() {
        let mut validator = Validator::new();
        // 2 of 5 keywords (40%): instrução, IA.
        let actual = "Uma instrução para a IA.";
        assert!(!validator.validate_one("O que é um prompt?", actual, true));
    }

    #[test]
    fn test_validate_one_keywords_ignored_outside_llm_mode() {
        let mut validator = Validator::new();
        // Keywords present but prefix wrong: fails in knowledge-base mode.
        let actual = "instrução modelo linguagem IA entrada textual";
        assert!(!validator.validate_one("O que é um prompt?", actual, false));
    }

    #[test]
    fn test_validate_one_unknown_question_counts_as_failure() {
        let mut validator = Validator::new();
        assert!(!validator.validate_one("pergunta inexistente", "resposta", false));

        // The miss still counted as a test.
        let (_, message) = validator.accuracy();
        assert_eq!(message, "Taxa de Respostas Precisas: 0.00% (0/1)");
    }

    #[test]
    fn test_validate_one_normalizes_question() {
        let mut validator = Validator::new();
        let actual = "Um prompt é uma instrução dada a uma IA para obter uma resposta específica. É a entrada textual que orienta o modelo de linguagem sobre o que deve ser feito ou respondido.";
        // Same question, different casing and punctuation.
        assert!(validator.validate_one("o que é um prompt", actual, false));
    }

    #[test]
    fn test_add_case_replaces_expected_answer() {
        let mut validator = Validator::new();
        validator.add_case("O que é um prompt?", "Nova resposta esperada para o teste.");
        assert!(validator.validate_one(
            "O que é um prompt?",
            "Nova resposta esperada para o teste.",
            false
        ));
    }
}
