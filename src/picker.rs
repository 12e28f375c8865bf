use std::{
    cmp::Ordering,
    path::{Path, PathBuf},
};
use anyhow::Result;
use humansize::{format_size, DECIMAL};
use if_chain::if_chain;
use walkdir::WalkDir;

use crate::settings::MANIFEST_FILE_NAME;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
    pub size: Option<u64>,
}

impl Entry {
    pub fn display_size(&self) -> String {
        match self.size {
            Some(size) if !self.is_dir => format_size(size, DECIMAL),
            _ => String::new(),
        }
    }

    pub fn is_manifest(&self) -> bool {
        !self.is_dir && self.name == MANIFEST_FILE_NAME
    }
}

/// A one-directory-at-a-time file chooser. Directories are listed first,
/// with a `..` entry on top when there is a parent.
#[derive(Debug, Clone)]
pub struct FileBrowser {
    dir: PathBuf,
    entries: Vec<Entry>,
    selected: usize,
    error: Option<String>,
}

impl FileBrowser {
    pub fn open(start: &Path) -> Self {
        let mut browser = Self {
            dir: start.to_path_buf(),
            entries: Vec::new(),
            selected: 0,
            error: None,
        };
        browser.change_dir(start.to_path_buf());
        browser
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn down(&mut self) {
        if self.selected < self.entries.len().saturating_sub(1) {
            self.selected += 1;
        }
    }

    pub fn parent(&mut self) {
        if let Some(parent) = self.dir.parent() {
            let parent = parent.to_path_buf();
            self.change_dir(parent);
        }
    }

    /// Enter the highlighted directory, or return the highlighted file.
    pub fn activate(&mut self) -> Option<PathBuf> {
        let entry = self.entries.get(self.selected)?.clone();

        if entry.is_dir && entry.name == ".." {
            self.parent();
            return None;
        }

        if entry.is_dir {
            self.change_dir(entry.path);
            return None;
        }

        Some(entry.path)
    }

    fn change_dir(&mut self, dir: PathBuf) {
        match read_entries(&dir) {
            Ok(mut entries) => {
                if let Some(parent) = dir.parent() {
                    entries.insert(
                        0,
                        Entry {
                            name: "..".to_string(),
                            path: parent.to_path_buf(),
                            is_dir: true,
                            size: None,
                        },
                    );
                }
                // land on the manifest when the directory has one
                self.selected = entries.iter().position(Entry::is_manifest).unwrap_or(0);
                self.entries = entries;
                self.dir = dir;
                self.error = None;
            }
            Err(err) => {
                self.error = Some(format!("cannot open {}: {}", dir.display(), err));
            }
        }
    }
}

fn read_entries(dir: &Path) -> Result<Vec<Entry>> {
    let mut entries = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            // the directory itself being unreadable is an error, a broken child is not
            Err(err) if err.depth() == 0 => return Err(err.into()),
            Err(_) => continue,
        };

        let is_dir = entry.file_type().is_dir();
        let size = if_chain! {
            if !is_dir;
            if let Ok(metadata) = entry.metadata();
            if metadata.is_file();
            then { Some(metadata.len()) } else { None }
        };

        entries.push(Entry {
            name: entry.file_name().to_string_lossy().to_string(),
            path: entry.path().to_path_buf(),
            is_dir,
            size,
        });
    }

    entries.sort_by(|a, b| match (a.is_dir, b.is_dir) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
    });

    Ok(entries)
}
