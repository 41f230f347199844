use clap::Args;

use crate::assistant::chat::{AssistantReply, ChatSession};
use crate::assistant::client::{AssistantClient, ChatMessage};
use crate::catalog::store::ProtocolCatalog;
use crate::cli::{CategoryArgs, OutputFormat};
use crate::utils::validation::validate_history;

#[derive(Args)]
pub struct AskArgs {
    /// Question for the assistant
    #[arg(required = true)]
    pub question: String,

    #[command(flatten)]
    pub categories: CategoryArgs,
}

pub fn run(
    args: AskArgs,
    catalog: &ProtocolCatalog,
    format: OutputFormat,
    verbose: bool,
) -> anyhow::Result<()> {
    let history = vec![ChatMessage::user(args.question)];
    validate_history(&history)?;

    let assistant = AssistantClient::from_env()?;
    if verbose {
        match &assistant {
            Some(client) => eprintln!("Using model {} at {}", client.config().model, client.config().base_url),
            None => eprintln!("No API key set (EMS_AI_API_KEY or OPENAI_API_KEY), answering locally"),
        }
    }

    let corpus = catalog.filter_by_categories(&args.categories.filter());
    let session = ChatSession::new(corpus, assistant.as_ref());

    let rt = tokio::runtime::Runtime::new()?;
    let reply = rt.block_on(session.reply(&history));

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reply)?),
        OutputFormat::Text | OutputFormat::Tsv => {
            if let AssistantReply::Fallback { reason, .. } = &reply.reply {
                eprintln!("Assistant unavailable: {reason}");
            }
            println!("{}", reply.reply.text());
            if !reply.context.is_empty() {
                println!("\nProtocols consulted:");
                for c in &reply.context {
                    println!("   - {} [{}]", c.name, c.id);
                }
            }
        }
    }

    Ok(())
}
