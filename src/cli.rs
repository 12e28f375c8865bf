use std::path::PathBuf;
use clap::{Parser, ValueEnum};

use crate::{app::Action, settings::SettingsStore};

#[derive(Parser, Clone, Debug)]
#[command(
    name = "rcomposer",
    about = "Run composer install/update for a PHP project from the terminal",
    version
)]
pub struct Cli {
    /// settings file to use instead of the default location
    #[arg(long, env = "RCOMPOSER_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// composer executable
    #[arg(long, env = "COMPOSER_BIN", default_value = "composer")]
    pub composer: PathBuf,

    /// select this composer.json instead of browsing for one
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// remove the saved settings and exit
    #[arg(long)]
    pub reset: bool,

    /// print the selected project and available actions, then exit
    #[arg(short, long)]
    pub status: bool,

    /// run one composer command without the interactive UI
    #[arg(short, long, value_enum)]
    pub run: Option<RunCommand>,

    /// write debug diagnostics
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunCommand {
    Install,
    Update,
    UpdateDrupal,
}

impl From<RunCommand> for Action {
    fn from(command: RunCommand) -> Self {
        match command {
            RunCommand::Install => Action::Install,
            RunCommand::Update => Action::Update,
            RunCommand::UpdateDrupal => Action::UpdateDrupal,
        }
    }
}

impl Cli {
    pub fn settings_store(&self) -> SettingsStore {
        SettingsStore::new(
            self.settings
                .clone()
                .unwrap_or_else(SettingsStore::default_path),
        )
    }

    /// `--file` made absolute against the working directory.
    pub fn get_manifest_file(&self) -> Option<PathBuf> {
        let file = self.file.as_ref()?;
        if file.is_absolute() {
            return Some(file.clone());
        }

        Some(
            std::env::current_dir()
                .map(|cwd| cwd.join(file))
                .unwrap_or_else(|_| file.clone()),
        )
    }

    pub fn is_interactive(&self) -> bool {
        !self.reset && !self.status && self.run.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_interactive() {
        let cli = Cli::parse_from(["rcomposer"]);
        assert!(cli.is_interactive());
        assert_eq!(cli.run, None);
    }

    #[test]
    fn test_run_values() {
        let cli = Cli::parse_from(["rcomposer", "--run", "update-drupal", "--settings", "/tmp/s.json"]);
        assert_eq!(cli.run, Some(RunCommand::UpdateDrupal));
        assert_eq!(Action::from(RunCommand::UpdateDrupal), Action::UpdateDrupal);
        assert_eq!(cli.settings_store().path(), std::path::Path::new("/tmp/s.json"));
        assert!(!cli.is_interactive());
    }

    #[test]
    fn test_relative_file_is_made_absolute() {
        let cli = Cli::parse_from(["rcomposer", "-f", "site/composer.json"]);
        let file = cli.get_manifest_file().unwrap();
        assert!(file.is_absolute());
        assert!(file.ends_with("site/composer.json"));
    }
}
