use clap::Args;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::assistant::client::AssistantClient;
use crate::catalog::store::ProtocolCatalog;
use crate::cli::{tsv_field, CategoryArgs, OutputFormat};
use crate::quiz::generator::{select_candidates, QuizGenerator, QuizItem, DEFAULT_QUIZ_QUESTIONS};

#[derive(Args)]
pub struct QuizArgs {
    /// Number of questions (1-20)
    #[arg(short = 'n', long, default_value_t = DEFAULT_QUIZ_QUESTIONS)]
    pub count: usize,

    #[command(flatten)]
    pub categories: CategoryArgs,

    /// Seed for a reproducible selection
    #[arg(long)]
    pub seed: Option<u64>,

    /// Build questions locally without contacting the assistant
    #[arg(long)]
    pub offline: bool,
}

pub fn run(
    args: QuizArgs,
    catalog: &ProtocolCatalog,
    format: OutputFormat,
    verbose: bool,
) -> anyhow::Result<()> {
    let assistant = if args.offline {
        None
    } else {
        AssistantClient::from_env()?
    };
    if verbose && assistant.is_none() {
        eprintln!("Assistant disabled, building questions locally");
    }

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let candidates = select_candidates(catalog, &args.categories.filter(), args.count, &mut rng);
    if candidates.is_empty() {
        anyhow::bail!("No protocols with content match the selected categories");
    }
    let pool = catalog.all();

    let rt = tokio::runtime::Runtime::new()?;
    let items = rt.block_on(async {
        QuizGenerator::new(assistant.as_ref())
            .generate(&candidates, &pool, &mut rng)
            .await
    });

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&items)?),
        OutputFormat::Tsv => {
            println!("number\tprotocol_id\tquestion\toptions\tcorrect_index\tgenerated");
            for (i, item) in items.iter().enumerate() {
                let q = item.question();
                println!(
                    "{}\t{}\t{}\t{}\t{}\t{}",
                    i + 1,
                    q.protocol_id,
                    tsv_field(&q.question),
                    tsv_field(&q.options.join(" | ")),
                    q.correct_index,
                    matches!(item, QuizItem::Generated { .. })
                );
            }
        }
        OutputFormat::Text => print_text_quiz(&items),
    }

    Ok(())
}

fn option_letter(index: usize) -> char {
    u8::try_from(index)
        .ok()
        .and_then(|i| b'A'.checked_add(i))
        .map_or('?', char::from)
}

fn print_text_quiz(items: &[QuizItem]) {
    for (i, item) in items.iter().enumerate() {
        let q = item.question();
        println!("Question {}: {}", i + 1, q.question);
        for (j, option) in q.options.iter().enumerate() {
            println!("   {}. {option}", option_letter(j));
        }
        println!();
    }

    println!("Answer key");
    println!("{}", "-".repeat(40));
    for (i, item) in items.iter().enumerate() {
        let q = item.question();
        println!(
            "{}. {} ({})",
            i + 1,
            option_letter(q.correct_index),
            q.correct_option().unwrap_or_default()
        );
        if !q.explanation.is_empty() {
            println!("   {}", q.explanation);
        }
    }
}
