//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use chrono::{DateTime, Local};
use insightdeck_core::AppConfig;
use insightdeck_core::gateway::ReportStore;
use std::path::{Path, PathBuf};

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    workspace: &Path,
    model: Option<&str>,
) -> anyhow::Result<()> {
    match command {
        Commands::Config { action } => handle_config(action, workspace),
        Commands::Serve { host, port } => {
            let mut config = load(workspace, model)?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            handle_serve(config).await
        }
        Commands::Run { file } => handle_run(&file, load(workspace, model)?).await,
        Commands::History => handle_history(load(workspace, model)?).await,
    }
}

/// Load configuration and anchor its relative directories at `workspace`.
fn load(workspace: &Path, model: Option<&str>) -> anyhow::Result<AppConfig> {
    let mut config = insightdeck_core::load_config(Some(workspace), None)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    if let Some(model) = model {
        config.llm.model = model.to_string();
    }
    anchor_paths(&mut config, workspace);
    Ok(config)
}

fn anchor(path: &mut PathBuf, workspace: &Path) {
    if path.is_relative() {
        *path = workspace.join(&*path);
    }
}

fn anchor_paths(config: &mut AppConfig, workspace: &Path) {
    anchor(&mut config.server.upload_dir, workspace);
    anchor(&mut config.server.report_dir, workspace);
    if let Some(dir) = config.server.static_dir.as_mut() {
        anchor(dir, workspace);
    }
}

fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_dir = workspace.join(".insightdeck");
            std::fs::create_dir_all(&config_dir)?;

            let config_path = config_dir.join("config.toml");
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let toml_str = toml::to_string_pretty(&AppConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = insightdeck_core::load_config(Some(workspace), None)
                .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn handle_serve(config: AppConfig) -> anyhow::Result<()> {
    let provider = insightdeck_core::create_provider(&config.llm)?;
    insightdeck_core::gateway::serve(config, provider).await?;
    Ok(())
}

async fn handle_run(file: &Path, config: AppConfig) -> anyhow::Result<()> {
    if !file.is_file() {
        anyhow::bail!("Input file not found: {}", file.display());
    }
    let provider = insightdeck_core::create_provider(&config.llm)?;
    let report_dir = config.server.report_dir.clone();
    let pipeline = insightdeck_core::Pipeline::new(provider, config);
    let state = pipeline.run(file).await?;

    let reports = state.report_files();
    tracing::info!(file = %file.display(), reports = reports.len(), "Run complete");
    if reports.is_empty() {
        println!("No reports generated (no datasets found in {}).", file.display());
        return Ok(());
    }
    for name in reports {
        println!("{}", report_dir.join(name).display());
    }
    Ok(())
}

async fn handle_history(config: AppConfig) -> anyhow::Result<()> {
    let store = ReportStore::from_config(&config.server);
    let reports = store.list_reports().await?;
    if reports.is_empty() {
        println!("No reports in {}", store.report_dir().display());
        return Ok(());
    }
    for name in reports {
        let modified = std::fs::metadata(store.report_dir().join(&name))
            .and_then(|m| m.modified())
            .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|_| "-".to_string());
        println!("{modified}  {name}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_config_init_creates_file() {
        let dir = TempDir::new().unwrap();
        let workspace = dir.path();

        let command = Commands::Config {
            action: ConfigAction::Init,
        };
        handle_command(command, workspace, None).await.unwrap();

        let config_path = workspace.join(".insightdeck").join("config.toml");
        let content = std::fs::read_to_string(&config_path).unwrap();
        let parsed: AppConfig = toml::from_str(&content).unwrap();
        assert_eq!(parsed.llm.model, "gpt-4o");
        assert_eq!(parsed.server.port, 8000);
    }

    #[tokio::test]
    async fn test_config_init_idempotent() {
        let dir = TempDir::new().unwrap();
        let workspace = dir.path();
        let config_path = workspace.join(".insightdeck").join("config.toml");

        let command = Commands::Config {
            action: ConfigAction::Init,
        };
        handle_command(command, workspace, None).await.unwrap();
        std::fs::write(&config_path, "[server]\nport = 9000\n").unwrap();

        let command = Commands::Config {
            action: ConfigAction::Init,
        };
        handle_command(command, workspace, None).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(&config_path).unwrap(),
            "[server]\nport = 9000\n"
        );
    }

    #[tokio::test]
    async fn test_config_show_defaults() {
        let dir = TempDir::new().unwrap();
        let command = Commands::Config {
            action: ConfigAction::Show,
        };
        assert!(handle_command(command, dir.path(), None).await.is_ok());
    }

    #[test]
    fn test_relative_dirs_anchor_at_workspace() {
        let mut config = AppConfig::default();
        config.server.static_dir = Some(PathBuf::from("web"));
        config.server.upload_dir = PathBuf::from("/abs/uploads");
        anchor_paths(&mut config, Path::new("/work"));
        assert_eq!(config.server.report_dir, PathBuf::from("/work/generated_reports"));
        assert_eq!(config.server.upload_dir, PathBuf::from("/abs/uploads"));
        assert_eq!(config.server.static_dir, Some(PathBuf::from("/work/web")));
    }

    #[test]
    fn test_load_applies_model_override() {
        let dir = TempDir::new().unwrap();
        let config = load(dir.path(), Some("gpt-4o-mini")).unwrap();
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert!(config.server.report_dir.starts_with(dir.path()));
    }

    #[tokio::test]
    async fn test_history_with_no_reports() {
        let dir = TempDir::new().unwrap();
        let command = Commands::History;
        assert!(handle_command(command, dir.path(), None).await.is_ok());
    }

    #[tokio::test]
    async fn test_run_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let command = Commands::Run {
            file: dir.path().join("absent.csv"),
        };
        let err = handle_command(command, dir.path(), None).await.unwrap_err();
        assert!(err.to_string().contains("Input file not found"));
    }
}
