// addonconf - GP2040-CE add-on configuration form
use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod config;
mod form;
mod httpd;
mod options;
mod schema;
mod source;
mod types;
mod validate;

use config::{AppConfig, Args, Command};
use form::{AddonConfigForm, SubmitOutcome};
use schema::AddonGroup;
use source::{ConfigSource, HttpConfigSource};

fn init_logging(config: &AppConfig) {
    // RUST_LOG takes precedence over the config file
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Split "turboPin=14" into a known field name and its raw value.
fn parse_assignment(raw: &str) -> Result<(&'static str, Value)> {
    let Some((name, value)) = raw.split_once('=') else {
        bail!("Expected name=value, got '{}'", raw);
    };
    let spec = schema::field(name.trim())
        .with_context(|| format!("Unknown option '{}'", name.trim()))?;
    Ok((spec.name, Value::String(value.trim().to_string())))
}

fn print_form(form: &AddonConfigForm) {
    let view = form.view();
    println!("{}", view.title);
    if view.load_failed {
        println!("⚠️  Could not read options from the device, showing defaults");
    }
    if !form.used_pins().is_empty() {
        println!("Pins used elsewhere: {:?}", form.used_pins());
    }

    for section in &view.sections {
        println!(
            "\n[{}] {}",
            if section.enabled { "x" } else { " " },
            section.title
        );
        for field in &section.fields {
            let shown = match (&field.value, field.options) {
                (Value::Number(n), Some(options)) => options
                    .iter()
                    .find(|o| n.as_i64() == Some(o.value))
                    .map(|o| format!("{} ({})", o.label, o.value))
                    .unwrap_or_else(|| n.to_string()),
                (value, _) => value.to_string(),
            };
            match &field.error {
                Some(error) => println!("    {:<32} {:<16} ✗ {}", field.label, shown, error),
                None => println!("    {:<32} {}", field.label, shown),
            }
        }
    }
}

fn print_errors(form: &AddonConfigForm) {
    for (name, error) in form.errors().iter() {
        println!("✗ {}: {}", name, error);
    }
}

async fn run_set(
    form: &mut AddonConfigForm,
    source: &dyn ConfigSource,
    assignments: &[String],
    toggles: &[AddonGroup],
    dry_run: bool,
) -> Result<()> {
    for group in toggles {
        let enabled = form.toggle(*group);
        println!("{} {}", group.title(), if enabled { "enabled" } else { "disabled" });
    }
    for raw in assignments {
        let (name, value) = parse_assignment(raw)?;
        form.change(name, value);
        debug!(field = name, value = ?form.options().get(name), "applied assignment");
    }

    if dry_run {
        if form.errors().is_empty() {
            println!("✓ All options valid (dry run, nothing saved)");
            return Ok(());
        }
        print_errors(form);
        bail!("{} option(s) invalid", form.errors().len());
    }

    match form.submit(source).await {
        SubmitOutcome::Blocked(errors) => {
            print_errors(form);
            bail!("{}, nothing was saved", errors);
        }
        SubmitOutcome::Saved => {
            println!("✓ {}", form.status_message().unwrap_or_default());
            Ok(())
        }
        SubmitOutcome::Failed => bail!("{}", form.status_message().unwrap_or_default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (mut config, first_run) = AppConfig::load_or_create(args.cfg.as_deref())?;
    let args_provided = config.merge_with_args(&args);
    init_logging(&config);

    // Persist on first run and whenever the command line changed something
    if first_run || args_provided {
        config.save()?;
    }
    if let Some(path) = config.config_path.as_ref() {
        info!("Using config file: {}", path.display());
    }

    let source: Arc<dyn ConfigSource> = Arc::new(HttpConfigSource::new(&config.device_url));
    let mut form = AddonConfigForm::new();
    form.mount(source.as_ref()).await;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let state = httpd::AppState::new(form, source, &config);
            httpd::run_http_server(&config, state).await
        }
        Command::Show => {
            print_form(&form);
            Ok(())
        }
        Command::Check => {
            if form.load_failed() {
                bail!("Could not read add-on options from {}", config.device_url);
            }
            if form.errors().is_empty() {
                println!("✓ All add-on options valid");
                return Ok(());
            }
            print_errors(&form);
            bail!("{} option(s) invalid", form.errors().len())
        }
        Command::Set { assignments, toggle, dry_run } => {
            if form.load_failed() && !dry_run {
                bail!("Could not read add-on options from {}, refusing to overwrite them with defaults", config.device_url);
            }
            run_set(&mut form, source.as_ref(), &assignments, &toggle, dry_run).await
        }
    }
}
