use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::{
    command::{CommandResult, CommandRunner, ComposerCommand},
    log::LogSink,
    manifest::{self, Classification},
    settings::{Settings, SettingsStore},
};

/// What the presentation layer should offer right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiState {
    NeedsSelection,
    Plain,
    FrameworkConsumer,
    FrameworkCore,
    /// The saved manifest exists but could not be parsed.
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Select,
    Install,
    Update,
    UpdateDrupal,
    RemoveSettings,
}

impl Action {
    pub fn id(&self) -> &'static str {
        match self {
            Action::Select => "select",
            Action::Install => "install",
            Action::Update => "update",
            Action::UpdateDrupal => "update_drupal",
            Action::RemoveSettings => "remove_settings",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Action::Select => "select composer.json",
            Action::Install => "composer install",
            Action::Update => "composer update",
            Action::UpdateDrupal => "update drupal core",
            Action::RemoveSettings => "remove settings",
        }
    }

    pub fn command(&self) -> Option<ComposerCommand> {
        match self {
            Action::Install => Some(ComposerCommand::Install),
            Action::Update => Some(ComposerCommand::Update),
            Action::UpdateDrupal => Some(ComposerCommand::UpdateDrupal),
            Action::Select | Action::RemoveSettings => None,
        }
    }
}

impl UiState {
    pub fn actions(&self) -> &'static [Action] {
        match self {
            UiState::NeedsSelection => &[Action::Select],
            UiState::Plain => &[Action::Install, Action::Update, Action::RemoveSettings],
            UiState::FrameworkConsumer | UiState::FrameworkCore => &[
                Action::Install,
                Action::Update,
                Action::UpdateDrupal,
                Action::RemoveSettings,
            ],
            UiState::Invalid => &[Action::Select, Action::RemoveSettings],
        }
    }

    pub fn allows(&self, action: Action) -> bool {
        self.actions().contains(&action)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Cancelled,
    Selected(Settings),
}

/// Owns the selected project, its classification and the user log.
pub struct App {
    store: SettingsStore,
    settings: Option<Settings>,
    state: UiState,
    log: LogSink,
    busy: usize,
}

impl App {
    pub fn new(store: SettingsStore) -> Self {
        Self {
            store,
            settings: None,
            state: UiState::NeedsSelection,
            log: LogSink::new(),
            busy: 0,
        }
    }

    pub fn state(&self) -> UiState {
        self.state
    }

    pub fn settings(&self) -> Option<&Settings> {
        self.settings.as_ref()
    }

    pub fn log(&self) -> &LogSink {
        &self.log
    }

    pub fn is_busy(&self) -> bool {
        self.busy > 0
    }

    pub fn running(&self) -> usize {
        self.busy
    }

    pub fn settings_path(&self) -> &Path {
        self.store.path()
    }

    /// Load the persisted settings and inspect the manifest they point to.
    pub fn reload(&mut self) -> UiState {
        self.settings = self.store.load();

        match &self.settings {
            Some(_) => self.log.message("Read and parsed settings."),
            None => {
                self.log.message("No settings found, select a composer.json to continue.");
                self.state = UiState::NeedsSelection;
                return self.state;
            }
        }

        self.inspect();
        self.state
    }

    fn inspect(&mut self) {
        let Some(settings) = &self.settings else {
            self.state = UiState::NeedsSelection;
            return;
        };

        let classification = match manifest::classify(&settings.file_name) {
            Ok(classification) => classification,
            Err(err) if err.is_missing() => {
                warn!(%err, "selected manifest is gone");
                self.log.error(format!("{err}, select a composer.json to continue."));
                self.settings = None;
                self.state = UiState::NeedsSelection;
                return;
            }
            Err(err) => {
                self.log.error(err.to_string());
                self.state = UiState::Invalid;
                return;
            }
        };

        info!(?classification, "manifest inspected");

        self.state = match classification {
            Classification::Unnamed => {
                self.log.error("No name in composer.json, starting over.");
                self.remove_settings();
                return;
            }
            Classification::Plain => UiState::Plain,
            Classification::FrameworkConsumer => UiState::FrameworkConsumer,
            Classification::FrameworkCore => UiState::FrameworkCore,
        };

        self.log.message("Parsed composer.json.");
        if matches!(self.state, UiState::FrameworkConsumer | UiState::FrameworkCore) {
            self.log.message("It's a drupal project.");
        }
    }

    /// Handle the outcome of the file chooser. A valid pick is saved and the
    /// project is reloaded straight away.
    pub fn select_manifest(&mut self, picked: Option<&Path>) -> Selection {
        let Some(path) = picked else {
            self.log.message("No file selected.");
            return Selection::Cancelled;
        };

        let Some(settings) = Settings::from_manifest(path) else {
            self.log.error(format!("{} is not a composer file.", path.display()));
            return Selection::Cancelled;
        };

        if let Err(err) = self.store.save(&settings) {
            self.log.error(format!("{err:#}"));
        }

        self.reload();
        Selection::Selected(settings)
    }

    pub fn remove_settings(&mut self) {
        if let Err(err) = self.store.clear() {
            self.log.error(format!("{err:#}"));
        }

        self.settings = None;
        self.state = UiState::NeedsSelection;
        self.log.message("Settings removed, select a composer.json to start over.");
    }

    /// Announce `action` and hand back what the runner needs. `None` when the
    /// action is not a command or not offered in the current state.
    pub fn begin_command(&mut self, action: Action) -> Option<(ComposerCommand, PathBuf)> {
        let command = action.command()?;
        if !self.state.allows(action) {
            return None;
        }
        let dir = self.settings.as_ref()?.dir.clone();

        self.log.announce(format!("{} in {}", command.description(), dir.display()));
        self.busy += 1;

        Some((command, dir))
    }

    pub fn finish_command(&mut self, command: ComposerCommand, result: &CommandResult) {
        self.busy = self.busy.saturating_sub(1);

        if let Some(err) = &result.exit_error {
            warn!(%command, "command failed");
            self.log.error(err.clone());
            return;
        }

        self.log.message(format!("stdout: {}", result.stdout));
        self.log.message(format!("stderr: {}", result.stderr));
    }

    /// Run one command to completion.
    pub async fn run_command(
        &mut self,
        runner: &dyn CommandRunner,
        action: Action,
    ) -> Option<CommandResult> {
        let (command, dir) = self.begin_command(action)?;
        let result = runner.run(command, &dir).await;
        self.finish_command(command, &result);

        Some(result)
    }
}
