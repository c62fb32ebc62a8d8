mod config;
mod editor;
mod error;
mod logging;
mod modal;
mod models;
mod store;
mod ui;

use crate::config::{ensure_initialized, load_config, normalize_provider_name};
use anyhow::Context;
use clap::{Parser, Subcommand};
use editor::metadata::builtin_metadata_sources;
use editor::{ListView, NoticeKind, ProviderListEditor};
use error::AppError;
use modal::{ConfigFormModal, FormRules, ModalBody};
use models::{Category, ConfigFieldSet, MoveDirection};
use store::http::HttpSourceStore;
use store::{order_entries, SourceStore};
use ui::run::run_tui;

#[derive(Debug, Parser)]
#[command(name = "sources-admin")]
#[command(about = "Order, toggle and configure content source providers")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Init,
    Tui,
    List {
        #[arg(long, default_value = "danmaku")]
        category: String,
    },
    /// Flip a danmaku provider between enabled and disabled, then save.
    Toggle {
        provider: String,
    },
    /// Swap a danmaku provider with its neighbour, then save.
    Move {
        provider: String,
        #[arg(long, default_value = "up")]
        direction: String,
    },
    ShowConfig {
        provider: String,
    },
    SetConfig {
        provider: String,
        #[arg(long = "set", value_name = "KEY=VALUE")]
        values: Vec<String>,
    },
    Export {
        #[arg(long, default_value = "json")]
        format: String,
    },
}

fn validate_category(input: &str) -> Result<Category, AppError> {
    Category::parse(input).ok_or_else(|| {
        AppError::Input("Unsupported category. Use danmaku or metadata.".into())
    })
}

fn validate_direction(input: &str) -> Result<MoveDirection, AppError> {
    match input.trim().to_ascii_lowercase().as_str() {
        "up" => Ok(MoveDirection::Up),
        "down" => Ok(MoveDirection::Down),
        _ => Err(AppError::Input(
            "Unsupported direction. Use up or down.".into(),
        )),
    }
}

/// Loads the danmaku list and selects `provider` in it.
async fn load_and_select(
    store: &dyn SourceStore,
    provider: &str,
) -> Result<ProviderListEditor, AppError> {
    let mut editor = ProviderListEditor::new(Category::Danmaku);
    editor.load(store).await;
    if let ListView::Failed(message) = editor.view() {
        return Err(AppError::Input(message.clone()));
    }
    let index = editor
        .items()
        .iter()
        .position(|record| record.name == provider)
        .ok_or_else(|| AppError::Input(format!("Unknown provider '{provider}'.")))?;
    editor.select(index);
    Ok(editor)
}

async fn save_and_report(
    editor: &mut ProviderListEditor,
    store: &dyn SourceStore,
) -> anyhow::Result<()> {
    let Some(notice) = editor.save(store).await else {
        anyhow::bail!("Source list is not ready to save.");
    };
    if notice.kind == NoticeKind::Error {
        anyhow::bail!(notice.message);
    }
    println!("{}", notice.message);
    Ok(())
}

fn parse_pairs(raw: &[String]) -> Result<ConfigFieldSet, AppError> {
    let mut values = ConfigFieldSet::new();
    for pair in raw {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(AppError::Input(format!(
                "Invalid --set value '{pair}'. Use KEY=VALUE."
            )));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(AppError::Input(format!(
                "Invalid --set value '{pair}'. Key must not be empty."
            )));
        }
        values.insert(key.to_string(), value.trim().to_string());
    }
    if values.is_empty() {
        return Err(AppError::Input(
            "Nothing to set. Pass at least one --set KEY=VALUE.".into(),
        ));
    }
    Ok(values)
}

fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let command = cli.command.unwrap_or(Commands::Tui);

    ensure_initialized()?;
    let cfg = load_config().context("loading configuration")?;
    let _log_guard = logging::init(&cfg.log_filter)?;
    tracing::info!(api = %cfg.api_base_url, "sources-admin starting");

    match command {
        Commands::Init => {
            println!("Initialized sources-admin config and data directories.");
        }
        Commands::Tui => {
            run_tui(&cfg).await?;
        }
        Commands::List { category } => match validate_category(&category)? {
            Category::Danmaku => {
                let store = HttpSourceStore::new(&cfg)?;
                let records = store
                    .list(Category::Danmaku)
                    .await
                    .context("fetching danmaku sources")?;
                for record in records {
                    let fields = record
                        .configurable_fields
                        .as_ref()
                        .filter(|f| !f.is_empty())
                        .map(|f| {
                            format!(
                                " (configurable: {})",
                                f.keys().cloned().collect::<Vec<_>>().join(", ")
                            )
                        })
                        .unwrap_or_default();
                    println!(
                        "{:>3}. {} [{}]{}",
                        record.order,
                        record.name,
                        record.status_glyph(),
                        fields
                    );
                }
            }
            Category::Metadata => {
                for (idx, source) in builtin_metadata_sources().iter().enumerate() {
                    println!("{:>3}. {} [{}]", idx + 1, source.name, source.status_label);
                }
            }
        },
        Commands::Toggle { provider } => {
            let provider = normalize_provider_name(&provider);
            let store = HttpSourceStore::new(&cfg)?;
            let mut editor = load_and_select(&store, &provider).await?;
            editor.toggle_enabled();
            save_and_report(&mut editor, &store).await?;
        }
        Commands::Move {
            provider,
            direction,
        } => {
            let direction = validate_direction(&direction)?;
            let provider = normalize_provider_name(&provider);
            let store = HttpSourceStore::new(&cfg)?;
            let mut editor = load_and_select(&store, &provider).await?;
            if !editor.move_selected(direction) {
                println!("'{provider}' is already at the edge of the list.");
                return Ok(());
            }
            save_and_report(&mut editor, &store).await?;
        }
        Commands::ShowConfig { provider } => {
            let provider = normalize_provider_name(&provider);
            let store = HttpSourceStore::new(&cfg)?;
            let values = store
                .get_config(&provider)
                .await
                .with_context(|| format!("fetching configuration for '{provider}'"))?;
            println!("{}", serde_json::to_string_pretty(&values)?);
        }
        Commands::SetConfig { provider, values } => {
            let provider = normalize_provider_name(&provider);
            let values = parse_pairs(&values)?;
            let store = HttpSourceStore::new(&cfg)?;
            let mut editor = ProviderListEditor::new(Category::Danmaku);
            editor.load(&store).await;
            if let ListView::Failed(message) = editor.view() {
                anyhow::bail!(message.clone());
            }
            let Some(field_defs) = editor.configure(&provider) else {
                anyhow::bail!("'{provider}' has no configurable fields.");
            };

            let mut form = ConfigFormModal::new(FormRules::from_config(&cfg));
            let ticket = form.open(&provider, field_defs);
            form.load(&store, ticket).await;
            if let ModalBody::Failed(message) = form.body() {
                anyhow::bail!(message.clone());
            }
            for (key, value) in &values {
                if !form.set_value(key, value) {
                    anyhow::bail!("'{provider}' has no field named '{key}'.");
                }
            }
            if let Some(notice) = form
                .save(&store)
                .await
                .with_context(|| format!("saving configuration for '{provider}'"))?
            {
                println!("{}", notice.message);
            }
        }
        Commands::Export { format } => {
            let csv = if format.eq_ignore_ascii_case("csv") {
                true
            } else if format.eq_ignore_ascii_case("json") {
                false
            } else {
                return Err(AppError::Input(
                    "Unsupported export format. Use json or csv".into(),
                )
                .into());
            };
            let store = HttpSourceStore::new(&cfg)?;
            let records = store
                .list(Category::Danmaku)
                .await
                .context("fetching danmaku sources")?;
            let entries = order_entries(&records);
            if csv {
                println!("provider_name,is_enabled,display_order");
                for e in entries {
                    println!(
                        "{},{},{}",
                        csv_field(&e.provider_name),
                        e.is_enabled,
                        e.display_order
                    );
                }
            } else {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            }
        }
    }

    Ok(())
}
