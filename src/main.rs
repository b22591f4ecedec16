use anyhow::Context;
use delve::{
    agents::{AgentKind, AgentRegistry},
    build_app,
    cli::{
        init::{self, InitConfig, InitResult},
        output::Output,
        research::{self, ResearchOptions},
        AgentCommands, Cli, Commands,
    },
    AppState, ConfigError, DelveConfig,
};
use std::path::Path;
use std::str::FromStr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    if let Some(Commands::Init {
        path,
        force,
        provider,
        host,
        port,
    }) = &cli.command
    {
        let config = InitConfig {
            path: path.clone(),
            force: *force,
            provider: provider.clone(),
            host: host.clone(),
            port: *port,
        };
        return match init::run(config, &output) {
            InitResult::Success | InitResult::AlreadyExists => Ok(()),
            InitResult::Error(e) => Err(anyhow::anyhow!(e)),
        };
    }

    let config = load_config(&cli.config, &output)?;
    let interactive_command = matches!(cli.command, Some(Commands::Research { .. }));
    let default_level = if cli.verbose {
        "debug"
    } else if interactive_command {
        // Keep the terminal for questions and the report.
        "warn"
    } else {
        config.server.log_level.as_str()
    };
    init_tracing(default_level, cli.log_json);

    match cli.command {
        None | Some(Commands::Serve) => serve(config, &output).await,
        Some(Commands::Research {
            query,
            non_interactive,
            artifact,
            run_id,
        }) => {
            let generate_artifact = artifact || config.research.generate_artifact;
            let state = AppState::from_config_one_shot(config).await?;
            let run_id =
                run_id.unwrap_or_else(|| format!("delve-research-{}", uuid::Uuid::new_v4()));

            output.banner();
            output.kv("Run", &run_id);
            output.kv("Query", &query);
            output.newline();

            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let options = ResearchOptions {
                interactive: !non_interactive,
                generate_artifact,
            };
            match research::run(&state.host, &run_id, &query, options, stdin, &output).await {
                Ok(result) => {
                    research::print_result(&result, &output);
                    output.complete("Research complete");
                    Ok(())
                }
                Err(e) => {
                    output.error(&e.to_string());
                    Err(e.into())
                }
            }
        }
        Some(Commands::Config { full, validate }) => {
            show_config(&cli.config, &config, full, validate, &output)
        }
        Some(Commands::Agent(command)) => {
            show_agents(&AgentRegistry::from_config(&config), command, &output)
        }
        Some(Commands::Init { .. }) => Ok(()),
    }
}

/// Load the config file, falling back to defaults when it does not exist
fn load_config(path: &Path, output: &Output) -> anyhow::Result<DelveConfig> {
    match DelveConfig::load(path) {
        Ok(config) => Ok(config),
        Err(ConfigError::FileNotFound(path)) => {
            output.warning(&format!(
                "{} not found, using built-in defaults",
                path.display()
            ));
            output.hint("Run 'delve init' to create one");
            Ok(DelveConfig::default())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to load {}", path.display())),
    }
}

fn init_tracing(default_level: &str, json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn serve(config: DelveConfig, output: &Output) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::from_config(config).await?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    output.banner();
    output.success(&format!("Listening on http://{}", addr));
    output.hint("API docs at /api/openapi.json");
    tracing::info!(%addr, "Server started");

    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}

fn show_config(
    path: &Path,
    config: &DelveConfig,
    full: bool,
    validate: bool,
    output: &Output,
) -> anyhow::Result<()> {
    if validate {
        if !path.exists() {
            output.error(&format!("{} not found", path.display()));
            anyhow::bail!("configuration file {} not found", path.display());
        }
        config.validate()?;
        output.success(&format!("{} is valid", path.display()));
        return Ok(());
    }

    if full {
        println!("{}", toml::to_string_pretty(config)?);
        return Ok(());
    }

    output.header("Configuration");
    output.kv("file", &path.display().to_string());
    output.kv(
        "server",
        &format!("{}:{}", config.server.host, config.server.port),
    );
    output.kv("llm endpoint", &config.llm.base_url);
    output.kv("default model", &config.llm.default_model);
    output.kv(
        "artifacts",
        &format!(
            "{} -> {}",
            config.research.generate_artifact,
            config.research.output_dir.display()
        ),
    );
    output.kv(
        "state dir",
        &config
            .storage
            .state_dir
            .as_ref()
            .map(|dir| dir.display().to_string())
            .unwrap_or_else(|| "(in memory)".to_string()),
    );
    Ok(())
}

fn show_agents(
    registry: &AgentRegistry,
    command: AgentCommands,
    output: &Output,
) -> anyhow::Result<()> {
    match command {
        AgentCommands::List => {
            output.header("Agents");
            output.table_header(&["Agent", "Model", "Output", "Tools"]);
            for kind in AgentKind::ALL {
                let agent = registry.get(kind);
                let shape = if agent.output.is_structured() {
                    "json"
                } else {
                    "text"
                };
                output.table_row(&[&agent.name, &agent.model, shape, &agent.tools.join(",")]);
            }
        }
        AgentCommands::Show { kind } => {
            let kind = AgentKind::from_str(&kind).map_err(|e| anyhow::anyhow!(e))?;
            let agent = registry.get(kind);
            output.header(&agent.name);
            output.kv("model", &agent.model);
            output.kv("tools", &agent.tools.join(", "));
            output.subheader("System prompt");
            output.block(&agent.system_prompt());
        }
    }
    Ok(())
}
