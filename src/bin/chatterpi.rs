//! Interactive chat client for text-completion backends.
//!
//! Every line typed is sent to the backend; replies are printed as they
//! arrive, which need not be the order the lines were typed in.
//!
//! # Usage
//!
//! ```bash
//! # Basic usage with default settings (reads OPENAI_API_KEY)
//! chatterpi
//!
//! # Specify a model and a compatible local backend
//! chatterpi --model davinci-002 --base-url http://localhost:8080/v1/
//!
//! # Disable colors and turn on request logging
//! RUST_LOG=chatterpi=debug chatterpi --no-color
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use chatterpi::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatSession, TranscriptRenderer, help_text, parse_command,
};
use chatterpi::OpenAi;

/// Main entry point for the chatterpi application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let (args, _) = ChatArgs::from_command_line_relaxed("chatterpi [OPTIONS]");
    let config = ChatConfig::from(args);
    let use_color = config.use_color;

    let session = ChatSession::from_config(&config, None)?;
    let renderer = Arc::new(Mutex::new(
        TranscriptRenderer::with_color(use_color).with_user_echo(false),
    ));
    let listener_renderer = Arc::clone(&renderer);
    session.on_transcript_changed(move |transcript| {
        let mut renderer = listener_renderer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let _ = renderer.render_new(transcript);
    });

    let mut rl = DefaultEditor::new()?;

    println!("ChatterPi (model: {})", config.model);
    println!("Type /help for commands, /quit to exit\n");

    loop {
        match rl.readline("You: ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.as_str());

                if let Some(cmd) = parse_command(&line) {
                    if !handle_command(cmd, &session, &renderer) {
                        break;
                    }
                    continue;
                }

                session.submit(line);
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                break;
            }
            Err(err) => {
                print_error(&renderer, &format!("Input error: {}", err));
                break;
            }
        }
    }

    let pending = session.pending();
    if pending > 0 {
        print_info(&renderer, &format!("Waiting for {pending} outstanding replies..."));
        session.settle().await;
    }
    println!("Goodbye!");
    Ok(())
}

/// Runs one slash command.  Returns false when the REPL should exit.
fn handle_command(
    cmd: ChatCommand,
    session: &ChatSession<OpenAi>,
    renderer: &Mutex<TranscriptRenderer>,
) -> bool {
    match cmd {
        ChatCommand::Quit => return false,
        ChatCommand::Help => {
            for line in help_text().lines() {
                println!("    {}", line);
            }
        }
        ChatCommand::Transcript => {
            let transcript = session.transcript();
            if transcript.is_empty() {
                print_info(renderer, "Nothing said yet.");
            } else {
                let mut renderer = renderer.lock().unwrap_or_else(PoisonError::into_inner);
                let _ = renderer.render_all(&transcript);
            }
        }
        ChatCommand::Pending => {
            print_info(
                renderer,
                &format!("{} replies outstanding", session.pending()),
            );
        }
        ChatCommand::Cancel => {
            let pending = session.pending();
            session.cancel_pending();
            print_info(renderer, &format!("Cancelled {pending} outstanding replies."));
        }
        ChatCommand::Stats => {
            let stats = session.stats();
            println!("    Session Statistics:");
            println!("      Model: {}", session.client().model());
            println!("      Endpoint: {}", session.client().endpoint());
            println!(
                "      Messages: {} ({} yours, {} replies)",
                stats.message_count, stats.user_messages, stats.assistant_messages
            );
            println!("      Outstanding: {}", stats.pending);
            println!("      Failed replies: {}", stats.failures);
        }
        ChatCommand::Invalid(message) => print_error(renderer, &message),
    }
    true
}

fn print_info(renderer: &Mutex<TranscriptRenderer>, info: &str) {
    let mut renderer = renderer.lock().unwrap_or_else(PoisonError::into_inner);
    let _ = renderer.print_info(info);
}

fn print_error(renderer: &Mutex<TranscriptRenderer>, error: &str) {
    let mut renderer = renderer.lock().unwrap_or_else(PoisonError::into_inner);
    let _ = renderer.print_error(error);
}
