use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use spinoff::{spinners, Spinner};
use std::{
    fs::{self, File, OpenOptions},
    io,
    process::ExitCode,
    sync::{Arc, Mutex},
};
use tracing_subscriber::EnvFilter;

mod app;
mod cli;
mod command;
mod log;
mod manifest;
mod picker;
mod settings;
mod ui;

use app::{Action, App, Selection};
use cli::Cli;
use command::ProcessRunner;
use log::{LineKind, LogSink};
use ui::InteractiveUI;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let mut app = App::new(cli.settings_store());
    let runner = Arc::new(ProcessRunner::new(&cli.composer));

    if cli.reset {
        app.remove_settings();
        print_log(app.log());
        return Ok(ExitCode::SUCCESS);
    }

    app.reload();

    if let Some(file) = cli.get_manifest_file() {
        if app.select_manifest(Some(&file)) == Selection::Cancelled && !cli.is_interactive() {
            print_log(app.log());
            return Ok(ExitCode::FAILURE);
        }
    }

    if cli.status {
        print_log(app.log());
        print_status(&app);
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(run) = cli.run {
        let action = Action::from(run);
        let spinner = Spinner::new(
            spinners::Dots,
            format!("running {}", action.label()),
            spinoff::Color::White,
        );
        let result = app.run_command(runner.as_ref(), action).await;
        spinner.clear();

        print_log(app.log());
        return Ok(match result {
            Some(result) if result.success() => ExitCode::SUCCESS,
            Some(_) => ExitCode::FAILURE,
            None => {
                eprintln!(
                    "{}",
                    format!("{} is not available for the current project", action.id()).red()
                );
                ExitCode::from(2)
            }
        });
    }

    InteractiveUI::new(app, runner).run().await?;
    Ok(ExitCode::SUCCESS)
}

fn init_tracing(cli: &Cli) {
    let default_level = match (cli.verbose, cli.is_interactive()) {
        (true, _) => "rcomposer=debug",
        (false, true) => "rcomposer=info",
        (false, false) => "rcomposer=warn",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if !cli.is_interactive() {
        builder.with_writer(io::stderr).init();
        return;
    }

    // the terminal belongs to the UI, so diagnostics go to a file
    match open_log_file() {
        Some(file) => builder.with_ansi(false).with_writer(Mutex::new(file)).init(),
        None => builder.with_writer(io::sink).init(),
    }
}

fn open_log_file() -> Option<File> {
    let dir = dirs::data_dir()?.join("rcomposer");
    fs::create_dir_all(&dir).ok()?;

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("rcomposer.log"))
        .ok()
}

fn print_log(log: &LogSink) {
    for line in log.lines() {
        let text = match line.kind {
            LineKind::Message => line.text.normal(),
            LineKind::Announce => line.text.cyan().bold(),
            LineKind::Error => line.text.red(),
        };
        println!("{} {}", line.time.format("%H:%M:%S").to_string().dimmed(), text);
    }
}

fn print_status(app: &App) {
    println!("\n{:<12} {}", "Settings".bold(), app.settings_path().display());

    match app.settings() {
        Some(settings) => {
            println!("{:<12} {}", "Manifest".bold(), settings.file_name.display());
            println!("{:<12} {}", "Directory".bold(), settings.dir.display());
        }
        None => println!("{:<12} {}", "Manifest".bold(), "none selected".yellow()),
    }

    println!("{:<12} {:?}", "State".bold(), app.state());

    let actions: Vec<_> = app.state().actions().iter().map(|a| a.id()).collect();
    println!("{:<12} {}", "Actions".bold(), actions.join(", ").green());
}
