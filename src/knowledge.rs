use std::collections::HashSet;

use tracing::debug;

/// Answer returned when no FAQ entry matches the question.
pub const FALLBACK_ANSWER: &str =
    "Desculpe, não sei responder isso. Posso ajudar com outra dúvida?";

/// Minimum share of a key's words that must appear in the question for the
/// keyword-overlap pass to match.
const OVERLAP_THRESHOLD: f64 = 0.7;

/// Normalize a question for matching: lowercase, punctuation stripped from
/// both ends. Shared with the validator so test questions and FAQ keys
/// compare the same way.
pub fn normalize(question: &str) -> String {
    let lowered = question.to_lowercase();
    lowered
        .trim_matches(|c| matches!(c, '?' | '!' | '.' | ',' | ';' | ':'))
        .to_string()
}

/// A stored normalized-question → answer pair.
#[derive(Debug, Clone)]
pub struct FaqEntry {
    pub question: String,
    pub answer: String,
}

/// Static FAQ knowledge base with substring and keyword-overlap lookup.
///
/// Entries keep insertion order, but matching does not depend on it: when
/// several keys match, the longest key wins (substring pass) or the highest
/// overlap ratio wins (keyword pass).
pub struct KnowledgeStore {
    faqs: Vec<FaqEntry>,
}

impl Default for KnowledgeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KnowledgeStore {
    /// Build the store with the predefined FAQ seed set.
    pub fn new() -> Self {
        let mut store = Self { faqs: Vec::new() };
        for (question, answer) in SEED_FAQS {
            store.add_faq(question, answer);
        }
        store
    }

    /// Empty store, used by tests that control the entry set.
    pub fn empty() -> Self {
        Self { faqs: Vec::new() }
    }

    /// Look up an answer. Returns `(answer, true)` on a match, or the fixed
    /// fallback string with `false` when nothing matches.
    pub fn lookup(&self, question: &str) -> (String, bool) {
        let normalized = normalize(question);

        // Substring pass: key contained in the question or vice versa.
        // Longest matching key wins.
        let mut best: Option<&FaqEntry> = None;
        for entry in &self.faqs {
            if normalized.contains(&entry.question) || entry.question.contains(&normalized) {
                if best.map_or(true, |b| entry.question.len() > b.question.len()) {
                    best = Some(entry);
                }
            }
        }
        if let Some(entry) = best {
            debug!(key = %entry.question, "faq substring match");
            return (entry.answer.clone(), true);
        }

        // Keyword-overlap pass: enough of the key's words must appear in the
        // question. Highest overlap ratio wins, ties go to the longer key.
        let question_words: HashSet<&str> = normalized.split_whitespace().collect();
        let mut best: Option<(f64, &FaqEntry)> = None;
        for entry in &self.faqs {
            let key_words: HashSet<&str> = entry.question.split_whitespace().collect();
            if key_words.is_empty() {
                continue;
            }
            let overlap = key_words.intersection(&question_words).count();
            let ratio = overlap as f64 / key_words.len() as f64;
            if ratio < OVERLAP_THRESHOLD {
                continue;
            }
            let better = match best {
                None => true,
                Some((r, b)) => {
                    ratio > r || (ratio == r && entry.question.len() > b.question.len())
                }
            };
            if better {
                best = Some((ratio, entry));
            }
        }
        if let Some((ratio, entry)) = best {
            debug!(key = %entry.question, ratio, "faq keyword match");
            return (entry.answer.clone(), true);
        }

        (FALLBACK_ANSWER.to_string(), false)
    }

    /// Insert a FAQ entry, overwriting any existing entry with the same
    /// normalized question.
    pub fn add_faq(&mut self, question: &str, answer: &str) {
        let normalized = normalize(question);
        match self.faqs.iter_mut().find(|e| e.question == normalized) {
            Some(entry) => entry.answer = answer.to_string(),
            None => self.faqs.push(FaqEntry {
                question: normalized,
                answer: answer.to_string(),
            }),
        }
    }

    /// All stored entries, in insertion order.
    pub fn entries(&self) -> &[FaqEntry] {
        &self.faqs
    }
}

const SEED_FAQS: &[(&str, &str)] = &[
    (
        "o que é um prompt",
        "Um prompt é uma instrução dada a uma IA para obter uma resposta específica. É a entrada textual que orienta o modelo de linguagem sobre o que deve ser feito ou respondido.",
    ),
    (
        "como criar um bom prompt",
        "Para criar um bom prompt, você deve: 1) Ser claro e específico; 2) Fornecer contexto suficiente; 3) Definir o tom e formato desejados; 4) Incluir exemplos quando necessário; 5) Considerar o uso de delimitadores para separar instruções de contexto.",
    ),
    (
        "o que é engenharia de prompt",
        "Engenharia de Prompt é a prática de criar prompts eficazes para otimizar as respostas de modelos de IA. Envolve técnicas específicas para formular instruções que levam a respostas mais precisas, relevantes e úteis.",
    ),
    (
        "quais são as técnicas de engenharia de prompt",
        "Algumas técnicas de Engenharia de Prompt incluem: 1) Zero-shot prompting; 2) Few-shot prompting com exemplos; 3) Chain-of-Thought (cadeia de pensamento); 4) Role prompting (definição de papéis); 5) Uso de delimitadores e estruturação; 6) Instruções passo a passo.",
    ),
    (
        "o que é zero-shot prompting",
        "Zero-shot prompting é uma técnica onde você pede ao modelo para realizar uma tarefa sem fornecer exemplos específicos. O modelo usa seu conhecimento geral para responder com base apenas na instrução dada.",
    ),
    (
        "o que é few-shot prompting",
        "Few-shot prompting é uma técnica onde você fornece alguns exemplos (geralmente de 1 a 5) do tipo de resposta que deseja antes de fazer sua pergunta principal. Isso ajuda a calibrar o modelo para o formato e estilo desejados.",
    ),
    (
        "o que é chain-of-thought",
        "Chain-of-Thought (Cadeia de Pensamento) é uma técnica que incentiva o modelo a mostrar seu raciocínio passo a passo antes de chegar à resposta final. Isso geralmente melhora a precisão em tarefas complexas de raciocínio.",
    ),
    (
        "como estruturar um prompt eficaz",
        "Um prompt eficaz geralmente segue esta estrutura: 1) Contexto claro; 2) Papel ou persona definida; 3) Tarefa específica; 4) Formato desejado para a resposta; 5) Restrições ou limitações; 6) Informações adicionais relevantes; 7) Exemplos quando necessário.",
    ),
    (
        "quais são as boas práticas em engenharia de prompt",
        "Boas práticas incluem: 1) Ser específico e direto; 2) Usar delimitadores para separar seções; 3) Especificar o formato de saída desejado; 4) Testar e iterar prompts; 5) Definir personas ou papéis; 6) Incluir verificações de raciocínio; 7) Considerar limitações do modelo.",
    ),
    (
        "o que são delimitadores em prompts",
        "Delimitadores são caracteres ou sequências específicas usadas para separar diferentes partes de um prompt, como contexto, instruções e exemplos. Exemplos comuns incluem: ```, ''', ###, <texto>, [texto], etc. Eles ajudam o modelo a distinguir claramente as diferentes seções do prompt.",
    ),
    (
        "como avaliar a qualidade de um prompt",
        "A qualidade de um prompt pode ser avaliada por: 1) Precisão das respostas geradas; 2) Consistência dos resultados; 3) Capacidade de seguir instruções específicas; 4) Relevância do conteúdo para o objetivo; 5) Taxa de rejeição ou respostas inadequadas; 6) Feedback dos usuários finais.",
    ),
    (
        "o que é role prompting",
        "Role prompting (ou prompting de papel) é uma técnica onde você atribui um papel específico ao modelo de IA, como 'Você é um especialista em marketing' ou 'Atue como um professor de matemática'. Isso ajuda a orientar o tom, estilo e tipo de conhecimento que o modelo deve utilizar na resposta.",
    ),
    (
        "como lidar com prompts ambíguos",
        "Para lidar com prompts ambíguos: 1) Peça clarificações específicas; 2) Ofereça interpretações alternativas da pergunta; 3) Estruture a resposta considerando diferentes possibilidades; 4) Mencione explicitamente as ambiguidades identificadas; 5) Revise e refine o prompt original para reduzir ambiguidades.",
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_punctuation_and_case() {
        assert_eq!(normalize("O que é um prompt?"), "o que é um prompt");
        assert_eq!(normalize("Como criar um bom prompt?!"), "como criar um bom prompt");
        assert_eq!(normalize("sem pontuação"), "sem pontuação");
    }

    #[test]
    fn test_lookup_exact_question() {
        let store = KnowledgeStore::new();
        let (answer, found) = store.lookup("O que é um prompt?");
        assert!(found);
        assert!(answer.starts_with("Um prompt é uma instrução dada a uma IA"));
    }

    #[test]
    fn test_lookup_key_inside_longer_question() {
        let store = KnowledgeStore::new();
        let (answer, found) = store.lookup("Me diga: o que é zero-shot prompting na prática?");
        assert!(found);
        assert!(answer.starts_with("Zero-shot prompting é uma técnica"));
    }

    #[test]
    fn test_lookup_question_inside_key() {
        // "o que é role" is a substring of the stored key "o que é role prompting".
        let store = KnowledgeStore::new();
        let (answer, found) = store.lookup("O que é role?");
        assert!(found);
        assert!(answer.starts_with("Role prompting"));
    }

    #[test]
    fn test_lookup_keyword_overlap() {
        // No substring relation, but 5 of the key's 6 words are present.
        let store = KnowledgeStore::new();
        let (answer, found) = store.lookup("técnicas de engenharia de prompt: quais são?");
        assert!(found);
        assert!(answer.starts_with("Algumas técnicas de Engenharia de Prompt"));
    }

    #[test]
    fn test_lookup_miss_returns_fallback() {
        let store = KnowledgeStore::new();
        let (answer, found) = store.lookup("asdkjasd");
        assert!(!found);
        assert_eq!(answer, FALLBACK_ANSWER);
    }

    #[test]
    fn test_lookup_below_overlap_threshold() {
        // Best overlap is "como criar um bom prompt" at 2 of 5 words (40%).
        let store = KnowledgeStore::new();
        let (_, found) = store.lookup("que prompt usar");
        assert!(!found);
    }

    #[test]
    fn test_short_generic_question_still_matches_smallest_key() {
        // "o que é" alone covers 3 of the 4 words of "o que é chain-of-thought",
        // so generic what-is questions resolve to that entry rather than missing.
        let store = KnowledgeStore::new();
        let (answer, found) = store.lookup("o que é isso aqui");
        assert!(found);
        assert!(answer.starts_with("Chain-of-Thought"));
    }

    #[test]
    fn test_add_faq_then_lookup() {
        let mut store = KnowledgeStore::new();
        store.add_faq("O que é temperatura?", "Temperatura controla a aleatoriedade da geração.");
        let (answer, found) = store.lookup("o que é temperatura");
        assert!(found);
        assert_eq!(answer, "Temperatura controla a aleatoriedade da geração.");
    }

    #[test]
    fn test_add_faq_overwrites_existing() {
        let mut store = KnowledgeStore::new();
        store.add_faq("O que é um prompt?", "Resposta nova.");
        let (answer, found) = store.lookup("O que é um prompt?");
        assert!(found);
        assert_eq!(answer, "Resposta nova.");
        // Still a single entry for that key.
        let count = store
            .entries()
            .iter()
            .filter(|e| e.question == "o que é um prompt")
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_longest_key_wins_on_ambiguous_match() {
        let mut store = KnowledgeStore::empty();
        store.add_faq("prompt", "curta");
        store.add_faq("prompt eficaz", "longa");
        let (answer, found) = store.lookup("como montar um prompt eficaz hoje");
        assert!(found);
        assert_eq!(answer, "longa");
    }

    #[test]
    fn test_seed_is_complete() {
        assert_eq!(KnowledgeStore::new().entries().len(), 13);
    }
}
