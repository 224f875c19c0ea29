use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::insights::{self, Insights};
use crate::knowledge::KnowledgeStore;
use crate::llm::{CompletionClient, CompletionOptions};
use crate::store::{InteractionLog, InteractionRecord};

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

/// One utterance in the in-memory conversation.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    pub timestamp: String,
}

/// The newest interaction, before it reaches the log.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentInteraction {
    pub question: String,
    pub answer: String,
    pub timestamp: String,
}

/// A logged interaction with its insights parsed back out.
#[derive(Debug, Clone, Serialize)]
pub struct LoggedInteraction {
    pub id: i64,
    pub question: String,
    pub answer: String,
    pub timestamp: String,
    pub insights: Option<Insights>,
}

/// Snapshot of the session: latest interaction plus recent logged history.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub current: Option<CurrentInteraction>,
    pub recent_interactions: Vec<LoggedInteraction>,
    pub conversation_length: usize,
}

/// How many conversation turns (question/answer pairs) are replayed as
/// context when building the completion prompt.
const CONTEXT_TURNS: usize = 10;

/// How many logged interactions a session summary includes.
const SUMMARY_RECENT: usize = 5;

/// Orchestrates question resolution: picks the knowledge base or the
/// completion service by mode, maintains the conversation, derives insights
/// and appends every interaction to the log. One agent per session; callers
/// serialize access to an instance.
pub struct Agent {
    conversation: Vec<ConversationTurn>,
    last_question: Option<String>,
    last_answer: Option<String>,
    use_llm: bool,
    knowledge: KnowledgeStore,
    llm: Option<CompletionClient>,
    log: InteractionLog,
    system_prompt: String,
}

impl Agent {
    /// Assemble an agent from its collaborators. Starts in completion mode
    /// when a client is provided.
    pub fn new(
        knowledge: KnowledgeStore,
        llm: Option<CompletionClient>,
        log: InteractionLog,
        system_prompt: impl Into<String>,
    ) -> Self {
        let use_llm = llm.is_some();
        info!(use_llm, "agent initialized");
        Self {
            conversation: Vec::new(),
            last_question: None,
            last_answer: None,
            use_llm,
            knowledge,
            llm,
            log,
            system_prompt: system_prompt.into(),
        }
    }

    /// Build an agent from configuration: seeded knowledge base, SQLite log
    /// at the configured path, and a completion client when requested.
    pub fn from_config(config: &Config, use_llm: bool) -> Result<Self> {
        let llm = if use_llm {
            Some(CompletionClient::new(config)?)
        } else {
            None
        };
        let log = InteractionLog::open(&config.database.path)?;
        Ok(Self::new(
            KnowledgeStore::new(),
            llm,
            log,
            config.system_prompt(),
        ))
    }

    /// Resolve a question: answer it, update the conversation, derive
    /// insights and log the interaction. Returns the answer and whether it
    /// was found (a completion-service success counts as found).
    pub async fn resolve(&mut self, question: &str) -> Result<(String, bool)> {
        self.last_question = Some(question.to_string());
        self.push_turn(Role::User, question);

        let (answer, found) = match (&self.llm, self.use_llm) {
            (Some(llm), true) => {
                let prompt = self.enriched_prompt(question);
                let opts = CompletionOptions {
                    system_prompt: Some(self.system_prompt.clone()),
                    ..Default::default()
                };
                let (answer, success) = llm.complete(&prompt, &opts).await;
                if success {
                    (answer, true)
                } else {
                    warn!("completion service failed, falling back to the knowledge base");
                    self.knowledge.lookup(question)
                }
            }
            _ => self.knowledge.lookup(question),
        };

        self.last_answer = Some(answer.clone());
        self.push_turn(Role::Agent, &answer);

        let insights = match (&self.llm, self.use_llm) {
            (Some(llm), true) => llm.extract_insights(question, &answer).await,
            _ => insights::rule_based(question, found),
        };
        let insights_json = serde_json::to_string(&insights)?;

        let id = self.log.append(question, &answer, Some(&insights_json))?;
        debug!(id, found, category = %insights.category, "interaction resolved");

        Ok((answer, found))
    }

    /// The full conversation so far. Callers must treat the turns as
    /// read-only.
    pub fn history(&self) -> &[ConversationTurn] {
        &self.conversation
    }

    /// Empty the conversation. The interaction log is untouched.
    pub fn clear(&mut self) {
        self.conversation.clear();
        debug!("conversation cleared");
    }

    pub fn llm_mode(&self) -> bool {
        self.use_llm
    }

    pub fn has_llm(&self) -> bool {
        self.llm.is_some()
    }

    /// Switch between completion mode and local knowledge-base mode. Turning
    /// completion mode on without a configured client leaves lookups on the
    /// knowledge base.
    pub fn set_mode(&mut self, use_llm: bool) {
        self.use_llm = use_llm;
        info!(use_llm, "agent mode changed");
    }

    /// Search the interaction log (case-sensitive substring).
    pub fn search_log(&self, pattern: &str) -> Result<Vec<InteractionRecord>> {
        self.log.search(pattern)
    }

    /// Snapshot of the latest interaction and the most recent logged history.
    pub fn structured_summary(&self) -> Result<SessionSummary> {
        let current = match (&self.last_question, &self.last_answer) {
            (Some(question), Some(answer)) => Some(CurrentInteraction {
                question: question.clone(),
                answer: answer.clone(),
                timestamp: now(),
            }),
            _ => None,
        };

        let recent_interactions = self
            .log
            .list_all()?
            .into_iter()
            .take(SUMMARY_RECENT)
            .map(|r| LoggedInteraction {
                insights: r
                    .insights_json
                    .as_deref()
                    .and_then(|json| serde_json::from_str(json).ok()),
                id: r.id,
                question: r.question,
                answer: r.answer,
                timestamp: r.timestamp,
            })
            .collect();

        Ok(SessionSummary {
            current,
            recent_interactions,
            conversation_length: self.conversation.len(),
        })
    }

    /// Release the log handle. The agent is consumed.
    pub fn close(self) {
        debug!("agent closed");
    }

    fn push_turn(&mut self, role: Role, content: &str) {
        self.conversation.push(ConversationTurn {
            role,
            content: content.to_string(),
            timestamp: now(),
        });
    }

    /// Replay recent turns as context ahead of the current question, the way
    /// the completion service expects to see a conversation.
    fn enriched_prompt(&self, question: &str) -> String {
        let start = self.conversation.len().saturating_sub(CONTEXT_TURNS);
        let rendered: Vec<String> = self.conversation[start..]
            .iter()
            .map(|turn| match turn.role {
                Role::User => format!("Usuário: {}", turn.content),
                Role::Agent => format!("Agente: {}", turn.content),
            })
            .collect();

        // Everything but the newest turn (the question itself) is context.
        if rendered.len() > 1 {
            let context = rendered[..rendered.len() - 1].join("\n");
            format!("Contexto da conversa anterior:\n{context}\n\nPergunta atual: {question}")
        } else {
            question.to_string()
        }
    }
}

fn now() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::Category;
    use crate::knowledge::FALLBACK_ANSWER;
    use crate::prompts;

    fn kb_agent() -> Agent {
        Agent::new(
            KnowledgeStore::new(),
            None,
            InteractionLog::open_in_memory().unwrap(),
            prompts::INTERNAL_PROMPT,
        )
    }

    fn failing_llm_agent() -> Agent {
        let mut config = Config::default();
        config.api_key.key = Some("sk-test".to_string());
        // Nothing listens on the discard port; completion calls fail fast.
        config.model.base_url = Some("http://127.0.0.1:9/v1".to_string());
        let llm = CompletionClient::new(&config).unwrap();
        Agent::new(
            KnowledgeStore::new(),
            Some(llm),
            InteractionLog::open_in_memory().unwrap(),
            prompts::INTERNAL_PROMPT,
        )
    }

    #[tokio::test]
    async fn test_resolve_from_knowledge_base() {
        let mut agent = kb_agent();
        let (answer, found) = agent.resolve("O que é um prompt?").await.unwrap();
        assert!(found);
        assert!(answer.starts_with("Um prompt é uma instrução dada a uma IA"));
        assert_eq!(agent.history().len(), 2);
        assert_eq!(agent.history()[0].role, Role::User);
        assert_eq!(agent.history()[1].role, Role::Agent);
    }

    #[tokio::test]
    async fn test_resolve_miss_returns_fallback() {
        let mut agent = kb_agent();
        let (answer, found) = agent.resolve("asdkjasd").await.unwrap();
        assert!(!found);
        assert_eq!(answer, FALLBACK_ANSWER);
    }

    #[tokio::test]
    async fn test_resolve_logs_interaction_with_insights() {
        let mut agent = kb_agent();
        agent.resolve("O que é um prompt?").await.unwrap();

        let summary = agent.structured_summary().unwrap();
        assert_eq!(summary.recent_interactions.len(), 1);
        let logged = &summary.recent_interactions[0];
        assert_eq!(logged.id, 1);
        assert_eq!(logged.question, "O que é um prompt?");
        let insights = logged.insights.as_ref().unwrap();
        assert_eq!(insights.category, Category::Definition);
    }

    #[tokio::test]
    async fn test_llm_failure_falls_back_to_knowledge_base() {
        let mut agent = failing_llm_agent();
        assert!(agent.llm_mode());

        let (answer, found) = agent.resolve("O que é um prompt?").await.unwrap();
        assert!(found);
        assert!(answer.starts_with("Um prompt é uma instrução dada a uma IA"));
        assert!(!answer.contains("erro ao processar"));
    }

    #[tokio::test]
    async fn test_mode_switch_uses_knowledge_base() {
        let mut agent = failing_llm_agent();
        agent.set_mode(false);
        assert!(!agent.llm_mode());

        let (answer, found) = agent.resolve("O que é role prompting?").await.unwrap();
        assert!(found);
        assert!(answer.starts_with("Role prompting"));
    }

    #[tokio::test]
    async fn test_clear_resets_conversation_but_not_log() {
        let mut agent = kb_agent();
        agent.resolve("O que é um prompt?").await.unwrap();
        agent.clear();
        assert!(agent.history().is_empty());

        let summary = agent.structured_summary().unwrap();
        assert_eq!(summary.recent_interactions.len(), 1);
        assert_eq!(summary.conversation_length, 0);
    }

    #[tokio::test]
    async fn test_search_log_finds_resolved_questions() {
        let mut agent = kb_agent();
        agent.resolve("O que é um prompt?").await.unwrap();
        let records = agent.search_log("prompt").unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_enriched_prompt_without_context() {
        let mut agent = kb_agent();
        agent.push_turn(Role::User, "primeira pergunta");
        assert_eq!(agent.enriched_prompt("primeira pergunta"), "primeira pergunta");
    }

    #[test]
    fn test_enriched_prompt_renders_prior_turns() {
        let mut agent = kb_agent();
        agent.push_turn(Role::User, "q1");
        agent.push_turn(Role::Agent, "a1");
        agent.push_turn(Role::User, "q2");

        let prompt = agent.enriched_prompt("q2");
        assert!(prompt.starts_with("Contexto da conversa anterior:\n"));
        assert!(prompt.contains("Usuário: q1\nAgente: a1"));
        assert!(prompt.ends_with("Pergunta atual: q2"));
    }

    #[test]
    fn test_enriched_prompt_window_is_bounded() {
        let mut agent = kb_agent();
        for i in 0..12 {
            agent.push_turn(Role::User, &format!("q{i}"));
            agent.push_turn(Role::Agent, &format!("a{i}"));
        }
        agent.push_turn(Role::User, "atual");

        let prompt = agent.enriched_prompt("atual");
        // Only the last 10 turns are considered; early turns fall out.
        assert!(!prompt.contains("q0"));
        assert!(!prompt.contains("q7"));
        assert!(prompt.contains("a8"));
    }
}
