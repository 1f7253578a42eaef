//! Interactive terminal client: describe a concern, pick a benefit, read the plan.

use anyhow::Result;
use benefit_flow::{
    BenefitCatalog, BenefitRecord, BenefitsSession, EmbeddedBenefitCatalog, FileBenefitCatalog,
    GeminiConfig, GeminiGateway, SessionState, Status,
    gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL},
    split_plan_steps,
};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "benefits-cli",
    about = "Find health benefits for a concern and draft an action plan"
)]
struct Args {
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: String,

    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    #[arg(long, env = "GEMINI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Request timeout for the Gemini API in seconds
    #[arg(long, env = "GEMINI_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Benefits catalog JSON file (the bundled sample is used otherwise)
    #[arg(long, env = "BENEFITS_CATALOG_PATH")]
    catalog: Option<PathBuf>,

    /// Health concern to classify right away
    concern: Option<String>,
}

impl Args {
    fn gemini_config(&self) -> GeminiConfig {
        let config = GeminiConfig::new(self.api_key.clone())
            .with_model(self.model.clone())
            .with_base_url(self.base_url.clone());
        match self.timeout_secs {
            Some(secs) => config.with_timeout(Duration::from_secs(secs)),
            None => config,
        }
    }
}

#[derive(Clone, Copy)]
enum Screen {
    Concern,
    Benefits,
    Plan,
}

type Input = Lines<BufReader<Stdin>>;

async fn ask(input: &mut Input, prompt: &str) -> Result<Option<String>> {
    print!("{} ", prompt);
    std::io::stdout().flush()?;
    Ok(input.next_line().await?.map(|line| line.trim().to_string()))
}

fn print_benefit(index: usize, benefit: &BenefitRecord) {
    let style = benefit.category.style();
    println!(
        "  {}. {} {} [{}]\n     Coverage: {}\n     {}",
        index + 1,
        style.icon,
        benefit.title,
        style.label,
        benefit.coverage,
        benefit.description
    );
}

fn print_plan(state: &SessionState) {
    let Some(benefit) = &state.selected_benefit else {
        return;
    };
    let style = benefit.category.style();
    println!("\n{} Your action plan for: {}", style.icon, benefit.title);
    let plan = state.action_plan.as_deref().unwrap_or_default();
    for (index, step) in split_plan_steps(plan).iter().enumerate() {
        println!("  {}. {}", index + 1, step);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let gateway = Arc::new(GeminiGateway::new(args.gemini_config())?);
    let catalog: Arc<dyn BenefitCatalog> = match args.catalog {
        Some(path) => Arc::new(FileBenefitCatalog::new(path)),
        None => Arc::new(EmbeddedBenefitCatalog),
    };
    let session = BenefitsSession::new("cli", gateway, catalog);

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut pending_concern = args.concern;
    let mut screen = Screen::Concern;

    loop {
        match screen {
            Screen::Concern => {
                let concern = match pending_concern.take() {
                    Some(concern) => concern,
                    None => match ask(&mut input, "\nDescribe your health concern (q to quit):").await? {
                        None => break,
                        Some(line) if line == "q" => break,
                        Some(line) => line,
                    },
                };

                println!("Analyzing...");
                let state = session.classify_and_fetch(&concern).await;
                if state.classification_status == Status::Succeeded {
                    screen = Screen::Benefits;
                    continue;
                }

                println!(
                    "⚠️  {}",
                    state
                        .last_error
                        .as_deref()
                        .unwrap_or("Could not fetch benefits. Please try again.")
                );
                if ask(&mut input, "r to retry, Enter to start over:").await?.as_deref() == Some("r") {
                    pending_concern = Some(concern);
                }
            }
            Screen::Benefits => {
                let state = session.snapshot().await;
                if state.matched_benefits.is_empty() {
                    println!("No matching benefits found.");
                    session.reset().await;
                    screen = Screen::Concern;
                    continue;
                }

                if let Some(category) = state.classified_category {
                    println!(
                        "\n{} Found {} {} benefit(s):",
                        category.style().icon,
                        state.matched_benefits.len(),
                        category
                    );
                }
                for (index, benefit) in state.matched_benefits.iter().enumerate() {
                    print_benefit(index, benefit);
                }

                let Some(choice) =
                    ask(&mut input, "Pick a benefit number (n for a new concern, q to quit):").await?
                else {
                    break;
                };
                match choice.as_str() {
                    "q" => break,
                    "n" => {
                        session.reset().await;
                        screen = Screen::Concern;
                    }
                    other => match other
                        .parse::<usize>()
                        .ok()
                        .and_then(|n| n.checked_sub(1))
                        .and_then(|i| state.matched_benefits.get(i))
                    {
                        Some(benefit) => {
                            session.select_benefit(benefit.clone()).await;
                            screen = Screen::Plan;
                        }
                        None => println!("Unknown choice: {}", other),
                    },
                }
            }
            Screen::Plan => {
                println!("Generating your action plan...");
                let state = session.generate_selected_plan().await;

                let prompt = if state.plan_status == Status::Succeeded {
                    print_plan(&state);
                    "\nb for benefits, n for a new concern, q to quit:"
                } else {
                    println!(
                        "⚠️  {}",
                        state
                            .last_error
                            .as_deref()
                            .unwrap_or("An unexpected error occurred. Please try again.")
                    );
                    "r to retry, b for benefits, q to quit:"
                };

                match ask(&mut input, prompt).await?.as_deref() {
                    None | Some("q") => break,
                    Some("r") if state.plan_status == Status::Failed => {}
                    Some("n") => {
                        session.reset().await;
                        screen = Screen::Concern;
                    }
                    _ => screen = Screen::Benefits,
                }
            }
        }
    }

    Ok(())
}
