mod chat;
mod config;

use std::path::PathBuf;

use crate::error::ChatResult;
use crate::services::chat_service::{ChatController, ChatInput};

pub use chat::*;
pub use config::*;

/// One line of user input, interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(String),
    Image(PathBuf),
    New,
    List,
    Open(String),
    Delete(String),
    Theme,
    Config,
    Help,
    Quit,
    Unknown(String),
}

/// Whether the input loop keeps going
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Parse a line typed at the prompt. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if !line.starts_with('/') {
        return Some(Command::Send(line.to_string()));
    }

    let (name, arg) = match line.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (line, ""),
    };

    let command = match (name, arg) {
        ("/send", text) => Command::Send(text.to_string()),
        ("/image", path) if !path.is_empty() => Command::Image(PathBuf::from(path)),
        ("/new", "") => Command::New,
        ("/list", "") => Command::List,
        ("/open", id) if !id.is_empty() => Command::Open(id.to_string()),
        ("/delete", id) if !id.is_empty() => Command::Delete(id.to_string()),
        ("/theme", "") => Command::Theme,
        ("/config", "") => Command::Config,
        ("/help", "") => Command::Help,
        ("/quit", "") | ("/exit", "") => Command::Quit,
        _ => Command::Unknown(line.to_string()),
    };
    Some(command)
}

/// Run one command against the controller
pub async fn dispatch(
    command: Command,
    controller: &mut ChatController,
    input: &mut ChatInput,
) -> ChatResult<Flow> {
    match command {
        Command::Send(text) => {
            input.text = text;
            controller.submit(input).await?;
        }
        Command::Image(path) => attach_image(input, &path)?,
        Command::New => new_conversation(controller)?,
        Command::List => list_conversations(controller),
        Command::Open(id) => open_conversation(controller, &id)?,
        Command::Delete(id) => delete_conversation(controller, &id)?,
        Command::Theme => toggle_theme(controller),
        Command::Config => show_config(controller),
        Command::Help => print_help(),
        Command::Quit => return Ok(Flow::Quit),
        Command::Unknown(line) => println!("Unknown command: {} (try /help)", line),
    }
    Ok(Flow::Continue)
}

pub fn print_help() {
    println!("Type a message and press Enter to send it.");
    println!("  /image <path>   attach an image to the next message");
    println!("  /send [text]    send now (use after /image to send the image alone)");
    println!("  /new            start a new conversation");
    println!("  /list           list conversations");
    println!("  /open <id>      switch to a conversation");
    println!("  /delete <id>    delete a conversation");
    println!("  /theme          toggle dark mode");
    println!("  /config         show the endpoint settings");
    println!("  /quit           exit");
}
