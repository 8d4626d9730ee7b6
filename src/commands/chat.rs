use std::fs;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::{ChatError, ChatResult};
use crate::models::{Message, Sender};
use crate::services::chat_service::{ChatController, ChatInput};

/// Read an image file into the pending input as a data URL
pub fn attach_image(input: &mut ChatInput, path: &Path) -> ChatResult<()> {
    let data_url = load_image_data_url(path)?;
    input.image_url = Some(data_url);
    println!("Attached {}. It will be sent with your next message.", path.display());
    Ok(())
}

pub fn load_image_data_url(path: &Path) -> ChatResult<String> {
    let mime = image_mime_type(path)
        .ok_or_else(|| ChatError::UnsupportedImage(path.display().to_string()))?;
    let bytes = fs::read(path)?;
    Ok(format!("data:{};base64,{}", mime, STANDARD.encode(bytes)))
}

fn image_mime_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

pub fn new_conversation(controller: &mut ChatController) -> ChatResult<()> {
    let id = controller.new_chat()?;
    println!("Started conversation {}", id);
    Ok(())
}

pub fn list_conversations(controller: &ChatController) {
    let items = controller.conversations().list_conversations();
    if items.is_empty() {
        println!("No conversations yet.");
        return;
    }

    let active = controller.conversations().active_id();
    for item in items {
        let marker = if active == Some(item.id.as_str()) { "*" } else { " " };
        println!(
            "{} {}  {}  ({} messages, updated {})",
            marker,
            item.id,
            item.title,
            item.message_count,
            item.updated_at.format("%Y-%m-%d %H:%M")
        );
    }
}

pub fn open_conversation(controller: &mut ChatController, id: &str) -> ChatResult<()> {
    if controller.select(id)? {
        print_transcript(controller.messages());
    } else {
        println!("No conversation with id {}", id);
    }
    Ok(())
}

pub fn delete_conversation(controller: &mut ChatController, id: &str) -> ChatResult<()> {
    if controller.delete(id)? {
        println!("Deleted conversation {}", id);
    } else {
        println!("No conversation with id {}", id);
    }
    Ok(())
}

pub fn print_transcript(messages: &[Message]) {
    for message in messages {
        let speaker = match message.sender {
            Sender::User => "you",
            Sender::Assistant => "assistant",
        };
        if message.image_url.is_some() {
            println!("{}> [image] {}", speaker, message.text);
        } else {
            println!("{}> {}", speaker, message.text);
        }
    }
}
