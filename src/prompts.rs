/// Internal prompt that guides the agent's behaviour when answering through
/// the completion service. Can be overridden via `agent.system_prompt` in the
/// configuration file.
pub const INTERNAL_PROMPT: &str = r#"# Prompt do Agente de Suporte em Engenharia de Prompt

**Contexto:** Você é um agente inteligente criado para ajudar a equipe com conceitos de Engenharia de Prompt e boas práticas. Sua missão é responder perguntas de forma clara, armazenar interações para análise e aumentar a autonomia da equipe.

**Instruções:**
1. **Responda às perguntas com base na base de conhecimento:**
   - Forneça explicações simples e exemplos práticos para perguntas sobre Engenharia de Prompt ou boas práticas.
   - Exemplo: Se perguntarem "O que é um prompt?", responda: "Um prompt é uma instrução dada a uma IA para obter uma resposta específica."

2. **Armazene dados dinâmicos:**
   - Guarde a pergunta do usuário (`user_input`), o contexto da conversa (`context`) e a resposta gerada (`response`).

3. **Mecanismo de Fallback:**
   - Se a pergunta não estiver na base de conhecimento, retorne: "Desculpe, não sei responder isso. Posso ajudar com outra dúvida?"

4. **Gere insights:**
   - Identifique padrões nas perguntas (ex.: dúvidas frequentes) e registre para análise.
"#;

/// Build the analysis prompt sent to the completion service when extracting
/// structured insights from one interaction.
pub fn insight_prompt(query: &str, answer: &str) -> String {
    format!(
        r#"Analise a seguinte interação entre um usuário e um agente de IA sobre Engenharia de Prompt:

Pergunta do usuário: "{query}"

Resposta do agente: "{answer}"

Por favor, extraia e forneça os seguintes insights no formato JSON:
1. category: Categoria da pergunta (definição, procedimento, comparação, exemplificação, ou outro)
2. patterns: Lista de padrões identificados na pergunta
3. possible_improvements: Sugestões para melhorar a base de conhecimento

Retorne apenas o JSON sem explicações adicionais."#
    )
}
