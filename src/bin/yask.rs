use std::process;

use clap::Parser;
use yagpt::commands::ask::{self, AskArgs};
use yagpt::commands::report_error;

#[derive(Debug, Parser)]
#[command(
    name = "yask",
    about = "Send a prompt to YandexGPT",
    disable_version_flag = true
)]
struct Cli {
    #[command(flatten)]
    ask: AskArgs,
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = ask::run(cli.ask) {
        report_error(&err);
        process::exit(1);
    }
}
