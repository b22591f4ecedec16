//! Init command implementation
//!
//! Scaffolds a delve.toml and .env.example for a new deployment.

use super::output::Output;
use std::fs;
use std::path::{Path, PathBuf};

/// Result of the init operation
#[derive(Debug, PartialEq, Eq)]
pub enum InitResult {
    Success,
    /// delve.toml already exists and --force was not given
    AlreadyExists,
    Error(String),
}

/// Configuration for the init command
pub struct InitConfig {
    pub path: PathBuf,
    pub force: bool,
    /// Agent endpoint flavour: `ollama` (local, no key) or `openai`
    pub provider: String,
    pub host: String,
    pub port: u16,
}

pub fn run(config: InitConfig, output: &Output) -> InitResult {
    output.banner();
    output.header("Initializing delve");

    let base_path = &config.path;
    let config_path = base_path.join("delve.toml");
    if config_path.exists() && !config.force {
        output.warning("delve.toml already exists!");
        output.hint("Use --force to overwrite existing files");
        return InitResult::AlreadyExists;
    }

    output.subheader("Creating directories");
    for dir in ["reports", "state"] {
        let dir_path = base_path.join(dir);
        if dir_path.exists() {
            output.skipped(dir, "already exists");
            continue;
        }
        if let Err(e) = fs::create_dir_all(&dir_path) {
            output.error(&format!("Failed to create {}: {}", dir, e));
            return InitResult::Error(e.to_string());
        }
        output.created_dir(dir);
    }

    output.subheader("Creating configuration files");
    let files = [
        (config_path, generate_delve_toml(&config), "config"),
        (
            base_path.join(".env.example"),
            generate_env_example(&config),
            "env",
        ),
    ];
    for (path, content, kind) in &files {
        if let Err(e) = write_file(path, content, config.force) {
            output.error(&format!("Failed to create {}: {}", path.display(), e));
            return InitResult::Error(e.to_string());
        }
        output.created(kind, &path.display().to_string());
    }

    output.complete("delve initialized successfully!");

    output.header("Next Steps");
    output.newline();
    if config.provider == "openai" {
        output.info("1. Set your API key:");
        output.command("cp .env.example .env  # then set OPENAI_API_KEY");
    } else {
        output.info("1. Start Ollama (if not running):");
        output.command("ollama serve");
        output.command("ollama pull llama3.2");
    }
    output.newline();
    output.info("2. Run a research query:");
    output.command("delve research \"best restaurants in Melbourne\"");
    output.newline();
    output.info("3. Or start the server:");
    output.command("delve serve");

    output.hint(&format!(
        "Server will be available at http://{}:{}",
        config.host, config.port
    ));

    InitResult::Success
}

fn write_file(path: &Path, content: &str, force: bool) -> std::io::Result<()> {
    if path.exists() && !force {
        return Ok(());
    }
    fs::write(path, content)
}

fn generate_delve_toml(config: &InitConfig) -> String {
    let llm_section = if config.provider == "openai" {
        r#"[llm]
base_url = "https://api.openai.com/v1"
api_key_env = "OPENAI_API_KEY"
default_model = "gpt-4o-mini"
timeout_secs = 120
"#
    } else {
        r#"[llm]
# Ollama's OpenAI-compatible endpoint, no API key required
base_url = "http://localhost:11434/v1"
default_model = "llama3.2"
timeout_secs = 120
"#
    };

    format!(
        r##"# delve configuration

[server]
host = "{host}"
port = {port}
log_level = "info"

{llm_section}
# Per-agent overrides (triage, clarifying, planner, search, writer, artifact)
# [agents.writer]
# model = "gpt-4o"
# instructions = "..."

[research]
generate_artifact = false
# Fixed title; the artifact agent chooses one when unset
# artifact_title = "Research Report"
output_dir = "./reports"
# font_size = 12
# primary_color = "#1f4e79"

[storage]
# Persist runs so pending clarifications survive restarts
state_dir = "./state"
"##,
        host = config.host,
        port = config.port,
        llm_section = llm_section,
    )
}

fn generate_env_example(config: &InitConfig) -> String {
    let mut content = String::from("# delve environment\nRUST_LOG=info\n");
    if config.provider == "openai" {
        content.push_str("OPENAI_API_KEY=\n");
    }
    content
}
