//! Interactive chat application for conversing over a ChatWait service.
//!
//! This binary provides a streaming REPL interface: each submitted line
//! becomes one streaming turn, rendered token by token as the stream
//! controller assembles it.
//!
//! # Usage
//!
//! ```bash
//! # Basic usage against a local service
//! chatwait-chat
//!
//! # Point at another deployment
//! chatwait-chat --url https://chat.example.com/api/v1/
//!
//! # Loosen the per-turn deadline
//! chatwait-chat --deadline 60
//!
//! # Disable colors (useful for piping output)
//! chatwait-chat --no-color
//! ```
//!
//! # Commands
//!
//! While chatting, you can use slash commands:
//! - `/help` - Show available commands
//! - `/clear` - Clear the visible transcript
//! - `/retry` - Retry the last failed or timed out turn
//! - `/status` - Show session and turn status
//! - `/quit` - Exit the application

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use chatwait::chat::{ChatArgs, ChatCommand, ChatConfig, help_text, parse_command};
use chatwait::{ChatWait, MessageSender, StreamController, TurnState};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

fn print_info(message: &str, use_color: bool) {
    if use_color {
        println!("\x1b[2m{message}\x1b[0m");
    } else {
        println!("{message}");
    }
}

fn print_error(message: &str, use_color: bool) {
    if use_color {
        eprintln!("\x1b[31m{message}\x1b[0m");
    } else {
        eprintln!("{message}");
    }
}

/// Renders one turn as the controller assembles it, until terminal.
async fn render_turn(
    controller: &mut StreamController,
    interrupted: &AtomicBool,
    use_color: bool,
) {
    print!("Assistant: ");
    let _ = std::io::stdout().flush();
    let mut printed = 0;

    loop {
        if interrupted.load(Ordering::Relaxed) {
            controller.cancel();
            println!();
            print_info("[interrupted]", use_color);
            return;
        }

        let snapshot = controller.snapshot();
        if let Some(reply) = snapshot
            .messages
            .iter()
            .rev()
            .find(|m| m.sender == MessageSender::Assistant)
        {
            if reply.content.len() > printed {
                print!("{}", &reply.content[printed..]);
                let _ = std::io::stdout().flush();
                printed = reply.content.len();
            }
        }

        match snapshot.turn_state {
            TurnState::Completed => {
                println!();
                return;
            }
            TurnState::Failed | TurnState::TimedOut => {
                println!();
                if let Some(error) = snapshot.error {
                    print_error(&error, use_color);
                }
                print_info("Use /retry to try again.", use_color);
                return;
            }
            _ => {}
        }

        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Main entry point for the chatwait-chat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("chatwait-chat [OPTIONS]");
    let config = ChatConfig::from(args);
    let use_color = config.use_color;

    let client = ChatWait::new(config.base_url.clone())?;
    let mut controller =
        StreamController::new(Arc::new(client.clone())).with_timing(config.timing);
    let session = controller.initialize_session()?;

    let mut rl = DefaultEditor::new()?;

    // Flag for interrupt handling during streaming
    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_clone = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_clone.store(true, Ordering::Relaxed);
    })?;

    println!("ChatWait chat (service: {})", client.base_url());
    println!("Session: {}", session.id);
    println!("Type /help for commands, /quit to exit\n");

    loop {
        interrupted.store(false, Ordering::Relaxed);

        let readline = rl.readline("You: ");

        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Clear => {
                            controller.clear_transcript();
                            print_info("Transcript cleared.", use_color);
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {line}");
                            }
                        }
                        ChatCommand::Retry => match controller.retry() {
                            Ok(()) => render_turn(&mut controller, &interrupted, use_color).await,
                            Err(e) => print_error(&e.to_string(), use_color),
                        },
                        ChatCommand::Status => {
                            let snapshot = controller.snapshot();
                            let session_id = snapshot
                                .session
                                .as_ref()
                                .map(|s| s.id.as_str())
                                .unwrap_or("none");
                            println!("    session:     {session_id}");
                            println!("    turn state:  {:?}", snapshot.turn_state);
                            println!("    connected:   {}", snapshot.is_connected);
                            println!("    messages:    {}", snapshot.messages.len());
                            println!("    retry count: {}", snapshot.retry_count);
                            if let Some(error) = snapshot.error {
                                println!("    error:       {error}");
                            }
                        }
                        ChatCommand::Health => match client.health().await {
                            Ok(health) => {
                                print_info(&format!("Service status: {}", health.status), use_color)
                            }
                            Err(e) => print_error(&e.to_string(), use_color),
                        },
                        ChatCommand::Invalid(reason) => {
                            print_error(&reason, use_color);
                            print_info("Type /help for available commands.", use_color);
                        }
                    }
                    continue;
                }

                match controller.send_message(line) {
                    Ok(_) => render_turn(&mut controller, &interrupted, use_color).await,
                    Err(e) => print_error(&e.to_string(), use_color),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                print_error(&format!("Input error: {err}"), use_color);
                break;
            }
        }
    }

    controller.shutdown();
    Ok(())
}
