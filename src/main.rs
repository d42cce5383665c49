use std::io;
use std::process;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, shells};
use yagpt::commands::ask::{self, AskArgs};
use yagpt::commands::config::{self, ConfigArgs};
use yagpt::commands::embed::{self, EmbedArgs};
use yagpt::commands::report_error;

const ROOT_HELP_EXAMPLES: &str = "Examples:\n  yagpt ask --folder-id b1g... \"Hello\"\n  echo \"Summarise this\" | yagpt ask --model yandexgpt-lite --system \"Be brief.\"\n  yagpt embed --query \"vector search\"\n  yagpt config check --profile work\n  yagpt completion bash > ~/.local/share/bash-completion/completions/yagpt";

const ASK_HELP_EXAMPLES: &str = "Examples:\n  yagpt ask --folder-id b1g... --api-key AQVN... \"Hello\"\n  yagpt ask --profile work --temperature 0.3 \"Explain embeddings\"\n  yagpt ask --dry-run --system \"You are a helpful assistant.\" \"Hello\"";

const EMBED_HELP_EXAMPLES: &str = "Examples:\n  yagpt embed \"first document\" \"second document\"\n  cat chunks.txt | yagpt embed --sleep-ms 0\n  yagpt embed --query --dry-run \"what is a folder id?\"";

#[derive(Debug, Parser)]
#[command(
    name = "yagpt",
    version = yagpt::LONG_VERSION,
    about = "YandexGPT completion and embedding CLI",
    after_help = ROOT_HELP_EXAMPLES
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Send a prompt to YandexGPT", after_help = ASK_HELP_EXAMPLES)]
    Ask(AskArgs),
    #[command(about = "Embed documents or queries", after_help = EMBED_HELP_EXAMPLES)]
    Embed(EmbedArgs),
    #[command(about = "Manage local config")]
    Config(ConfigArgs),
    #[command(about = "Generate shell completion script")]
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

fn print_completion(shell: CompletionShell) {
    let mut cmd = Cli::command();
    let out = &mut io::stdout();
    match shell {
        CompletionShell::Bash => generate(shells::Bash, &mut cmd, "yagpt", out),
        CompletionShell::Zsh => generate(shells::Zsh, &mut cmd, "yagpt", out),
        CompletionShell::Fish => generate(shells::Fish, &mut cmd, "yagpt", out),
    }
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Ask(args) => ask::run(args),
        Commands::Embed(args) => embed::run(args),
        Commands::Config(args) => config::run(args),
        Commands::Completion { shell } => {
            print_completion(shell);
            Ok(())
        }
    };

    if let Err(err) = result {
        report_error(&err);
        process::exit(1);
    }
}
