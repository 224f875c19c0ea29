mod agent;
mod config;
mod insights;
mod knowledge;
mod llm;
mod prompts;
mod store;
mod validator;

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, Level};

use agent::{Agent, Role};
use config::Config;
use validator::Validator;

const CONFIG_PATH: &str = "config.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    // Load env
    let _ = dotenv::dotenv();

    // A missing config file means local knowledge-base mode; a file that
    // exists but cannot be parsed is fatal.
    let (config, use_llm) = if Path::new(CONFIG_PATH).exists() {
        let config = Config::load(CONFIG_PATH)?;
        let use_llm = config.has_api_key();
        (config, use_llm)
    } else {
        (Config::default(), false)
    };

    let mut agent = Agent::from_config(&config, use_llm)?;
    let mut validator = Validator::new();
    info!(use_llm, db = %config.database.path, "agent ready");

    println!("\n=== Agente de Engenharia de Prompt ===");
    println!("Digite 'sair' para encerrar, 'histórico' para ver conversas anteriores,");
    println!("'testar' para executar testes de validação, 'limpar' para reiniciar a conversa,");
    println!("'buscar <termo>' para pesquisar o registro de interações,");
    println!("ou 'modo' para alternar entre LLM e base de conhecimento local.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("\nVocê: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let command = input.to_lowercase();
        if command == "sair" {
            break;
        } else if command == "histórico" || command == "historico" {
            show_history(&agent);
        } else if command == "testar" {
            run_validation(&mut validator, &mut agent).await?;
        } else if command == "modo" {
            toggle_mode(&mut agent);
        } else if command == "limpar" {
            agent.clear();
            println!("Conversa reiniciada!");
        } else if let Some(term) = input.strip_prefix("buscar ") {
            search_log(&agent, term.trim())?;
        } else {
            answer_question(&mut agent, input).await?;
        }
    }

    agent.close();
    println!("\nAgente encerrado. Obrigado por utilizar!");
    Ok(())
}

fn show_history(agent: &Agent) {
    println!("\n=== Histórico da Conversa ===");
    for turn in agent.history() {
        let who = match turn.role {
            Role::User => "Você",
            Role::Agent => "Agente",
        };
        println!("{} ({}): {}", who, turn.timestamp, turn.content);
    }
}

async fn run_validation(validator: &mut Validator, agent: &mut Agent) -> Result<()> {
    println!("\n=== Executando Testes de Validação ===");
    let report = validator.run_all(agent).await?;
    println!("{}", report.message);
    println!("Detalhes: {} testes executados", report.results.len());

    let failed: Vec<_> = report.results.iter().filter(|r| !r.is_valid).collect();
    if !failed.is_empty() {
        println!("\nTestes falhos ({}):", failed.len());
        for (i, test) in failed.iter().enumerate() {
            println!("{}. Pergunta: {}", i + 1, test.question);
            println!("   Esperado: {}...", truncate(&test.expected_answer, 50));
            println!("   Recebido: {}...", truncate(&test.actual_answer, 50));
        }
    }
    Ok(())
}

fn toggle_mode(agent: &mut Agent) {
    if !agent.llm_mode() && !agent.has_llm() {
        println!("\nServiço LLM não configurado; usando base de conhecimento local.");
        return;
    }
    agent.set_mode(!agent.llm_mode());
    let mode = if agent.llm_mode() {
        "LLM"
    } else {
        "base de conhecimento local"
    };
    println!("\nModo alterado para: {mode}");
}

fn search_log(agent: &Agent, term: &str) -> Result<()> {
    let records = agent.search_log(term)?;
    if records.is_empty() {
        println!("\nNenhuma interação contém '{term}'.");
        return Ok(());
    }
    println!("\n=== {} interação(ões) encontradas ===", records.len());
    for record in records {
        println!("[{}] ({}) {}", record.id, record.timestamp, record.question);
        println!("    {}", truncate(&record.answer, 120));
    }
    Ok(())
}

async fn answer_question(agent: &mut Agent, question: &str) -> Result<()> {
    let (answer, found) = agent.resolve(question).await?;
    println!("\nAgente: {answer}");

    if found && !agent.llm_mode() {
        println!("\n[Informação encontrada na base de conhecimento]");
    }

    // Every three interactions, surface the latest stored insight.
    if agent.history().len() % 6 == 0 {
        let summary = agent.structured_summary()?;
        if let Some(insights) = summary
            .recent_interactions
            .first()
            .and_then(|r| r.insights.as_ref())
        {
            println!(
                "\n[Insight: Sua pergunta foi classificada como '{}']",
                insights.category
            );
        }
    }
    Ok(())
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect()
    }
}
