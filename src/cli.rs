use std::path::PathBuf;

use clap::Parser;

use crate::services::config_service::Config;

#[derive(Parser, Debug)]
#[command(name = "parlor")]
#[command(about = "Chat with an OpenAI-compatible model server from the terminal")]
pub struct Cli {
    /// Base URL of the server, e.g. http://localhost:1234/v1
    #[arg(long, env = "PARLOR_BASE_URL")]
    pub base_url: Option<String>,

    /// Model identifier sent with every request
    #[arg(long, env = "PARLOR_MODEL")]
    pub model: Option<String>,

    /// Bearer token, if the server wants one
    #[arg(long, env = "PARLOR_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, env = "PARLOR_TEMPERATURE")]
    pub temperature: Option<f32>,

    /// -1 leaves the length up to the server
    #[arg(long, env = "PARLOR_MAX_TOKENS", allow_negative_numbers = true)]
    pub max_tokens: Option<i32>,

    /// Config file to read (defaults to config.json in the data directory)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Where conversations are stored
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Keep conversations in memory only
    #[arg(long, conflicts_with = "data_dir")]
    pub ephemeral: bool,

    /// Write the endpoint settings given here back to the config file
    #[arg(long)]
    pub save_config: bool,
}

impl Cli {
    /// Endpoint settings given on the command line or through the environment
    pub fn overrides(&self) -> Config {
        Config {
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            api_key: self.api_key.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}
