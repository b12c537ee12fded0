use std::env;
use std::process::ExitCode;

use tracing_subscriber::{EnvFilter, FmtSubscriber};

use matchsmith::config::Settings;
use matchsmith::pipeline::{CompanyPipeline, InvestorPipeline, RunSummary};
use matchsmith::types::PipelineError;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    dotenvy::dotenv().ok();

    match run().await {
        Ok(summary) => {
            println!("done: {summary}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("matchsmith: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<RunSummary, PipelineError> {
    let command = env::args().nth(1).unwrap_or_default();
    let settings = Settings::from_env()?;

    match command.as_str() {
        "companies" => CompanyPipeline::from_settings(&settings)?.run().await,
        "investors" => InvestorPipeline::from_settings(&settings)?.run().await,
        "" => Err(PipelineError::Config(
            "usage: matchsmith <companies|investors>".to_string(),
        )),
        other => Err(PipelineError::Config(format!(
            "unknown command '{other}'; expected 'companies' or 'investors'"
        ))),
    }
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
