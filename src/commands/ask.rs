use std::time::{Duration, Instant};

use clap::Args;
use serde_json::json;
use tracing::debug;

use crate::commands::{
    MAX_TOKENS_ENV, MODEL_ENV, SYSTEM_ENV, TEMPERATURE_ENV, first_of, program_name, read_prompt,
    resolve_base_url, resolve_settings, resolve_timeout,
};
use crate::config::{self, Settings, check_temperature};
use crate::logging;
use crate::yandexgpt::completion::{
    CompletionClient, CompletionConfig, CompletionRequest, DEFAULT_MAX_TOKENS, DEFAULT_MODEL,
    DEFAULT_TEMPERATURE, DEFAULT_TIMEOUT, GenerationOptions,
};
use crate::yandexgpt::provider::{DEFAULT_BASE_URL, Endpoint};

const FOLDER_PLACEHOLDER: &str = "<folder-id>";

#[derive(Debug, Args, Clone)]
pub struct AskArgs {
    /// Prompt text; read from stdin when omitted
    pub prompt: Option<String>,
    /// Profile from the config file
    #[arg(long)]
    pub profile: Option<String>,
    /// Yandex Cloud folder id (env: YG_FOLDER_ID)
    #[arg(long)]
    pub folder_id: Option<String>,
    /// API key (env: YG_API_KEY)
    #[arg(long)]
    pub api_key: Option<String>,
    /// Model name inside the folder, e.g. yandexgpt-lite
    #[arg(long)]
    pub model: Option<String>,
    /// System instruction sent before the prompt
    #[arg(long)]
    pub system: Option<String>,
    #[arg(long)]
    pub temperature: Option<f64>,
    #[arg(long)]
    pub max_tokens: Option<u32>,
    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
    #[arg(long)]
    pub base_url: Option<String>,
    /// Print the request instead of sending it
    #[arg(long)]
    pub dry_run: bool,
    /// Print the answer as a JSON object
    #[arg(long)]
    pub json: bool,
    #[arg(long, short)]
    pub verbose: bool,
    /// Suppress diagnostics; fatal errors are still printed
    #[arg(long, short)]
    pub quiet: bool,
    /// Print version and build metadata
    #[arg(long, short = 'V')]
    pub version: bool,
}

#[derive(Debug)]
struct AskPlan {
    settings: Settings,
    instruction: Option<String>,
    options: GenerationOptions,
    timeout: Duration,
    base_url: Option<String>,
}

fn resolve(args: &AskArgs) -> Result<AskPlan, String> {
    let profile = config::load_optional_profile(args.profile.as_deref())?;
    let settings = resolve_settings(
        Settings {
            folder_id: args.folder_id.clone(),
            api_key: args.api_key.clone(),
            iam_token: None,
        },
        &profile,
    );

    let temperature = first_of(
        args.temperature,
        config::env_parsed(TEMPERATURE_ENV)?,
        profile.temperature,
    )
    .unwrap_or(DEFAULT_TEMPERATURE);
    check_temperature(temperature)?;

    let max_tokens = first_of(
        args.max_tokens,
        config::env_parsed(MAX_TOKENS_ENV)?,
        profile.max_tokens,
    )
    .unwrap_or(DEFAULT_MAX_TOKENS);
    if max_tokens == 0 {
        return Err("max_tokens must be greater than zero".to_string());
    }

    let model = first_of(
        args.model.clone(),
        config::env_value(MODEL_ENV),
        profile.model.clone(),
    )
    .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    Ok(AskPlan {
        instruction: first_of(
            args.system.clone(),
            config::env_value(SYSTEM_ENV),
            profile.system.clone(),
        ),
        options: GenerationOptions {
            model,
            max_tokens,
            temperature,
        },
        timeout: resolve_timeout(args.timeout, &profile)?.unwrap_or(DEFAULT_TIMEOUT),
        base_url: resolve_base_url(args.base_url.clone(), &profile),
        settings,
    })
}

fn print_dry_run(plan: &AskPlan, prompt: &str) -> Result<(), String> {
    let folder_id = plan.settings.folder_id.as_deref();
    let request = CompletionRequest::new(
        folder_id.unwrap_or(FOLDER_PLACEHOLDER),
        &plan.options.model,
        plan.options.temperature,
        plan.options.max_tokens,
        plan.instruction.as_deref().unwrap_or_default(),
        prompt,
    );
    let body = json!({
        "dry_run": true,
        "endpoint": Endpoint::Completion.url(plan.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)),
        "folder_id": folder_id,
        "api_key_present": plan.settings.api_key.is_some(),
        "timeout_secs": plan.timeout.as_secs(),
        "request": request,
    });
    let rendered = serde_json::to_string(&body).map_err(|err| err.to_string())?;
    println!("{rendered}");
    Ok(())
}

pub fn run(args: AskArgs) -> Result<(), String> {
    if args.version {
        println!("{} {}", program_name(), crate::LONG_VERSION);
        return Ok(());
    }
    logging::init(args.verbose, args.quiet);

    let plan = resolve(&args)?;
    let prompt = read_prompt(args.prompt.clone())?;
    debug!(
        model = %plan.options.model,
        folder_id_present = plan.settings.folder_id.is_some(),
        api_key_present = plan.settings.api_key.is_some(),
        timeout_secs = plan.timeout.as_secs(),
        prompt_chars = prompt.chars().count(),
        "resolved ask configuration"
    );

    if args.dry_run {
        return print_dry_run(&plan, &prompt);
    }

    let config = CompletionConfig {
        instruction: plan.instruction.clone(),
        base_url: plan.base_url.clone(),
        timeout: Some(plan.timeout),
        ..CompletionConfig::default()
    }
    .fallback_to(&plan.settings);
    let client = CompletionClient::new(config).map_err(|err| err.to_string())?;

    let started = Instant::now();
    let text = client
        .generate_with(&prompt, &plan.options)
        .ok_or_else(|| "YandexGPT returned no result.".to_string())?;
    debug!(
        latency_ms = started.elapsed().as_millis() as u64,
        "completion finished"
    );

    if args.json {
        let body = json!({ "model": plan.options.model, "text": text });
        println!("{body}");
    } else {
        println!("{text}");
    }
    Ok(())
}
