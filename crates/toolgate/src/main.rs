//! An interactive assistant that can use Gmail, GitHub and other remote
//! tools on your behalf.

#[macro_use]
extern crate tracing;

use std::io::Write as _;
use std::pin::pin;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt, BufReader, Stdin};
use tokio::select;
use tokio::sync::watch;
use tokio::time::sleep;
use toolgate::core::Stage;
use toolgate::{Config, Reply, Session, SessionBuilder, system_prompt};
use toolgate_arcade::ArcadeClient;
use toolgate_openai_model::OpenAIProvider;

const BAR_CHAR: &str = "▎";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err.bright_red());
            return ExitCode::FAILURE;
        }
    };
    debug!("starting with {config:?}");

    let arcade = match ArcadeClient::new(config.arcade_config()) {
        Ok(arcade) => Arc::new(arcade),
        Err(err) => {
            eprintln!("{}", format!("Failed to start: {err}").bright_red());
            return ExitCode::FAILURE;
        }
    };
    let model_provider = match OpenAIProvider::new(config.openai_config()) {
        Ok(model_provider) => model_provider,
        Err(err) => {
            eprintln!("{}", format!("Failed to start: {err}").bright_red());
            return ExitCode::FAILURE;
        }
    };
    let (stage_tx, stage_rx) = watch::channel(Stage::Start);

    let session = SessionBuilder::with_model_provider(model_provider)
        .with_system_prompt(system_prompt(chrono::Local::now().date_naive()))
        .with_user_id(&config.user_id)
        .with_shared_catalog(arcade.clone())
        .with_shared_authorizer(arcade)
        .on_transition(move |_, to| {
            stage_tx.send_replace(to);
        })
        .build()
        .await;
    let mut session = match session {
        Ok(session) => session,
        Err(err) => {
            eprintln!("{}", format!("Failed to start: {err}").bright_red());
            return ExitCode::FAILURE;
        }
    };

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

    let mut stdin = BufReader::new(io::stdin());
    say("Hello! How can I help you today?");
    loop {
        prompt("You: ");
        let Some(line) = read_line(&mut stdin).await else {
            break;
        };
        if Session::is_farewell(&line) {
            say("Goodbye!");
            break;
        }

        let mut reply =
            with_spinner(session.handle_input(&line), &stage_rx, &progress_style)
                .await;
        loop {
            match reply {
                Ok(Reply::Answer(answer)) => {
                    say(&answer);
                    break;
                }
                Ok(Reply::Goodbye) => {
                    say("Goodbye!");
                    return ExitCode::SUCCESS;
                }
                Ok(Reply::AuthorizationRequired { tool_name, url }) => {
                    let bar = BAR_CHAR.bright_yellow();
                    println!("{bar}🔐 {tool_name} needs your permission.");
                    println!(
                        "{bar}Please authorize the application in your browser:"
                    );
                    println!("{bar}{}", url.bright_white().underline());
                    prompt("Press Enter once done, or type `skip` to cancel: ");

                    let Some(line) = read_line(&mut stdin).await else {
                        return ExitCode::SUCCESS;
                    };
                    if line.trim().eq_ignore_ascii_case("skip") {
                        session.abandon();
                        println!("Cancelled.\n");
                        break;
                    }
                }
                Err(err) => {
                    let bar = BAR_CHAR.bright_red();
                    println!("{bar}⚠️  {err}");
                    if !err.is_retryable() {
                        session.abandon();
                        break;
                    }
                    prompt("Retry? [Y/n]: ");
                    let Some(line) = read_line(&mut stdin).await else {
                        return ExitCode::SUCCESS;
                    };
                    let line = line.trim();
                    if !(line.is_empty() || line.eq_ignore_ascii_case("y")) {
                        session.abandon();
                        break;
                    }
                }
            }
            reply =
                with_spinner(session.resume(), &stage_rx, &progress_style).await;
        }
    }
    ExitCode::SUCCESS
}

/// Drives `fut` while showing what the workflow is doing.
async fn with_spinner<F: Future>(
    fut: F,
    stage_rx: &watch::Receiver<Stage>,
    style: &ProgressStyle,
) -> F::Output {
    let progress_bar = ProgressBar::new_spinner();
    progress_bar.set_style(style.clone());
    let mut fut = pin!(fut);
    loop {
        progress_bar.set_message(stage_message(*stage_rx.borrow()));
        progress_bar.inc(1);

        select! {
            output = &mut fut => {
                progress_bar.finish_and_clear();
                return output;
            }
            _ = sleep(Duration::from_millis(100)) => {}
        }
    }
}

fn stage_message(stage: Stage) -> &'static str {
    match stage {
        Stage::CheckAuth | Stage::Authorize => "🔐 Checking permissions...",
        Stage::Tools => "🛠️  Using tools...",
        _ => "🤔 Thinking...",
    }
}

fn say(text: &str) {
    println!("{}🤖 {}\n", BAR_CHAR.bright_cyan(), text.bright_white());
}

fn prompt(text: &str) {
    print!("{text}");
    std::io::stdout().flush().ok();
}

async fn read_line(stdin: &mut BufReader<Stdin>) -> Option<String> {
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(count) => {
            if count == 0 {
                return None;
            }
            Some(line)
        }
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
