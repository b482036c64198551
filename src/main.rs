use clap::Parser;
use tracing_subscriber::EnvFilter;

use stacksense::config::Config;
use stacksense::constraints::{ConstraintValue, Constraints};
use stacksense::models::RecommendRequest;
use stacksense::state::AppState;

/// Recommend a technology stack for a project description.
#[derive(Parser, Debug)]
#[command(name = "stacksense", version)]
struct Cli {
    /// Free-text project description
    description: String,

    /// A requirement the stack should meet (repeatable)
    #[arg(short = 'r', long = "require")]
    requirements: Vec<String>,

    /// Category constraint as `category=technology` (repeatable)
    #[arg(short = 'c', long = "constraint", value_parser = parse_constraint)]
    constraints: Vec<(String, String)>,

    /// Reference corpus file
    #[arg(long, env = "STACKSENSE_CORPUS_PATH")]
    corpus: Option<std::path::PathBuf>,

    /// Number of similar projects to consider
    #[arg(long)]
    top_n: Option<usize>,
}

fn parse_constraint(raw: &str) -> Result<(String, String), String> {
    let (category, tech) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected category=technology, got `{raw}`"))?;
    let (category, tech) = (category.trim(), tech.trim());
    if category.is_empty() || tech.is_empty() {
        return Err(format!("expected category=technology, got `{raw}`"));
    }
    Ok((category.to_string(), tech.to_string()))
}

/// Repeated categories collect into one multi-valued constraint, first value first.
fn collect_constraints(pairs: Vec<(String, String)>) -> Constraints {
    let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
    for (category, tech) in pairs {
        let key = category.to_lowercase();
        match grouped.iter_mut().find(|(c, _)| *c == key) {
            Some((_, techs)) => techs.push(tech),
            None => grouped.push((key, vec![tech])),
        }
    }
    grouped
        .into_iter()
        .fold(Constraints::new(), |acc, (category, mut techs)| {
            let value = if techs.len() == 1 {
                ConstraintValue::One(techs.remove(0))
            } else {
                ConstraintValue::Many(techs)
            };
            acc.with(&category, value)
        })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(corpus) = cli.corpus {
        config.corpus_path = corpus;
    }
    if let Some(top_n) = cli.top_n {
        config.top_n = top_n.max(1);
    }
    tracing::info!("Corpus: {}", config.corpus_path.display());
    tracing::info!("Embedding provider: {}", config.embedding.provider);
    let enabled: Vec<_> = config
        .providers
        .iter()
        .filter(|p| p.enabled)
        .map(|p| p.name())
        .collect();
    tracing::info!("LLM providers enabled: {enabled:?}");

    let state = AppState::new(&config).await?;
    tracing::info!(
        "Loaded {} reference projects",
        state.recommender.corpus_len()
    );

    let request = RecommendRequest {
        description: cli.description,
        requirements: cli.requirements,
        constraints: collect_constraints(cli.constraints),
    };
    let recommendation = state.recommender.recommend(&request).await?;

    println!("{}", serde_json::to_string_pretty(&recommendation)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_constraint() {
        assert_eq!(
            parse_constraint(" frontend = Angular ").unwrap(),
            ("frontend".to_string(), "Angular".to_string())
        );
        assert!(parse_constraint("frontend").is_err());
        assert!(parse_constraint("=vue").is_err());
    }

    #[test]
    fn test_repeated_categories_group_in_order() {
        let constraints = collect_constraints(vec![
            ("Frontend".to_string(), "angular".to_string()),
            ("database".to_string(), "mysql".to_string()),
            ("frontend".to_string(), "vue".to_string()),
        ]);
        assert_eq!(constraints.required_for("frontend").as_deref(), Some("angular"));
        assert!(constraints.excludes("frontend", "vue"));
        assert_eq!(constraints.required_for("database").as_deref(), Some("mysql"));
    }

    #[test]
    fn test_cli_parses_repeated_flags() {
        let cli = Cli::try_parse_from([
            "stacksense",
            "a chat app",
            "--require",
            "realtime",
            "-r",
            "mobile",
            "-c",
            "backend=django",
        ])
        .unwrap();
        assert_eq!(cli.requirements, vec!["realtime", "mobile"]);
        assert_eq!(cli.constraints.len(), 1);
    }
}
