use std::time::Duration;

use clap::Args;
use serde_json::json;
use tracing::debug;

use crate::commands::{
    SLEEP_MS_ENV, first_of, read_lines, resolve_base_url, resolve_settings, resolve_timeout,
};
use crate::config::{self, Settings};
use crate::logging;
use crate::yandexgpt::embeddings::{
    DEFAULT_SLEEP_INTERVAL, EmbeddingClient, EmbeddingConfig, EmbeddingModel,
};
use crate::yandexgpt::provider::{DEFAULT_BASE_URL, Endpoint, embedding_model_uri};

#[derive(Debug, Args, Clone)]
pub struct EmbedArgs {
    /// Texts to embed; non-empty stdin lines are used when omitted
    pub texts: Vec<String>,
    /// Use the query model instead of the document model
    #[arg(long)]
    pub query: bool,
    #[arg(long)]
    pub profile: Option<String>,
    #[arg(long)]
    pub folder_id: Option<String>,
    #[arg(long)]
    pub api_key: Option<String>,
    /// IAM token; takes precedence over the API key (env: YG_IAM_TOKEN)
    #[arg(long)]
    pub iam_token: Option<String>,
    /// Pause between calls in milliseconds; 0 disables pacing
    #[arg(long)]
    pub sleep_ms: Option<u64>,
    #[arg(long)]
    pub timeout: Option<u64>,
    #[arg(long)]
    pub base_url: Option<String>,
    #[arg(long)]
    pub dry_run: bool,
    #[arg(long, short)]
    pub verbose: bool,
    #[arg(long, short)]
    pub quiet: bool,
}

pub fn run(args: EmbedArgs) -> Result<(), String> {
    logging::init(args.verbose, args.quiet);

    let profile = config::load_optional_profile(args.profile.as_deref())?;
    let settings = resolve_settings(
        Settings {
            folder_id: args.folder_id.clone(),
            api_key: args.api_key.clone(),
            iam_token: args.iam_token.clone(),
        },
        &profile,
    );
    let sleep_interval = first_of(
        args.sleep_ms,
        config::env_parsed(SLEEP_MS_ENV)?,
        profile.sleep_ms,
    )
    .map(Duration::from_millis)
    .unwrap_or(DEFAULT_SLEEP_INTERVAL);
    let timeout = resolve_timeout(args.timeout, &profile)?;
    let base_url = resolve_base_url(args.base_url.clone(), &profile);

    let texts = if args.texts.is_empty() {
        read_lines()?
    } else {
        args.texts.clone()
    };
    if texts.is_empty() {
        return Err("No texts provided. Pass them as arguments or as stdin lines.".to_string());
    }

    let model = if args.query {
        EmbeddingModel::Query
    } else {
        EmbeddingModel::Document
    };
    debug!(
        model = model.as_str(),
        count = texts.len(),
        sleep_ms = sleep_interval.as_millis() as u64,
        iam_token_present = settings.iam_token.is_some(),
        api_key_present = settings.api_key.is_some(),
        "resolved embed configuration"
    );

    if args.dry_run {
        let folder_id = settings.folder_id.as_deref().unwrap_or("<folder-id>");
        let body = json!({
            "dry_run": true,
            "endpoint": Endpoint::TextEmbedding.url(base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)),
            "model_uri": embedding_model_uri(folder_id, model.as_str()),
            "texts": texts,
            "sleep_ms": sleep_interval.as_millis() as u64,
        });
        println!("{body}");
        return Ok(());
    }

    let config = EmbeddingConfig {
        sleep_interval,
        base_url,
        timeout,
        ..EmbeddingConfig::default()
    }
    .fallback_to(&settings);
    let client = EmbeddingClient::new(config).map_err(|err| err.to_string())?;

    let vectors = match model {
        EmbeddingModel::Document => client.embed_many(texts.as_slice()),
        EmbeddingModel::Query => texts.iter().map(|text| client.embed_query(text)).collect(),
    }
    .map_err(|err| err.to_string())?;

    for vector in vectors {
        println!("{}", json!(vector));
    }
    Ok(())
}
