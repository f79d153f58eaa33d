//! High-level command orchestration for the CLI.
//!
//! This module contains the handler functions for each CLI command (`list`,
//! `add`, `set-default`, ...). It is the coordination layer between:
//! - `crate::ui` for user interaction (output, prompts).
//! - `crate::paths` for filesystem locations.
//! - `crate::store` for the persisted profiles.
//! - `crate::environment` for exporting the default profile.
//!
//! Each handler loads the store, mutates it, saves it once, and only then
//! touches the environment.

use anstyle::AnsiColor;
use anyhow::{Context, Result, bail};
use inquire::{Confirm, Password, PasswordDisplayMode, Select};

use crate::doctor::run_doctor;
use crate::environment::{
    AUTH_TOKEN_VAR, BASE_URL_VAR, PersistOutcome, Platform, Propagator, Shell,
};
use crate::paths::Paths;
use crate::store::{Profile, Store, Upsert, validate_profile_name};
use crate::ui::Ui;

/// Token characters shown in the profile table
const LIST_TOKEN_PREVIEW: usize = 20;
/// Token characters shown for the default profile
const DEFAULT_TOKEN_PREVIEW: usize = 10;

fn load_store(paths: &Paths) -> Result<Store> {
    Store::load(&paths.config_file).context("Cannot continue without a readable config file")
}

fn save_store(store: &Store, paths: &Paths, ui: &Ui) -> Result<()> {
    store
        .save(&paths.config_file)
        .context("Failed to save configuration")?;
    ui.ok(format!("Configuration saved to {}", paths.config_file.display()));
    Ok(())
}

/// List all profiles and the default one
pub fn list(paths: &Paths, ui: &Ui) -> Result<()> {
    let store = load_store(paths)?;

    if store.is_empty() {
        ui.warn("No profiles configured.");
        ui.newline();
        ui.println("Add your first one with:");
        ui.println(format!(
            "  {} add --name <name> --url <base-url> --token <token>",
            ui.bold("chcc")
        ));
        return Ok(());
    }

    let default = store.default_profile();
    let default_name = default.map(|p| p.name.as_str());

    let mut table = ui.simple_table();
    table.set_header(vec![
        ui.header_cell(""),
        ui.header_cell("Profile"),
        ui.header_cell("Base URL"),
        ui.header_cell("Token"),
    ]);

    for profile in &store.profiles {
        let is_default = Some(profile.name.as_str()) == default_name;
        let icon = if is_default { ui.icon_ok() } else { " " };
        let name_cell = if is_default {
            ui.colored_cell(&profile.name, AnsiColor::Green)
        } else {
            ui.cell(&profile.name)
        };

        table.add_row(vec![
            ui.cell(icon),
            name_cell,
            ui.cell(&profile.base_url),
            ui.cell(profile.token_preview(LIST_TOKEN_PREVIEW)),
        ]);
    }

    ui.section("Profiles");
    ui.println(table.to_string());
    ui.newline();

    ui.section("Default Profile");
    match default {
        Some(profile) => {
            let mut details = ui.simple_table();
            details.add_row(vec![ui.cell("Name:"), ui.header_cell(&profile.name)]);
            details.add_row(vec![ui.cell("URL:"), ui.cell(&profile.base_url)]);
            details.add_row(vec![
                ui.cell("Token:"),
                ui.cell(profile.token_preview(DEFAULT_TOKEN_PREVIEW)),
            ]);
            ui.println(details.to_string());

            if let Some(note) = fallback_note(&store) {
                ui.println(ui.dim(note));
                ui.println(ui.dim("Use 'chcc set-default --name <name>' to choose one."));
            }
        }
        None => ui.println("(none)"),
    }

    Ok(())
}

/// Why `list` shows the first profile instead of the stored default, if it does
fn fallback_note(store: &Store) -> Option<String> {
    if store.is_empty() {
        return None;
    }
    if store.default_name.is_empty() {
        return Some("(no default selected; using the first profile)".to_string());
    }
    if store.get(&store.default_name).is_none() {
        return Some(format!(
            "(default profile '{}' no longer exists; using the first profile)",
            store.default_name
        ));
    }
    None
}

/// How a variable of this process compares to the profile's value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VarState {
    Matches,
    Differs,
    NotSet,
}

fn var_state(var: &str, expected: &str) -> VarState {
    match std::env::var(var) {
        Ok(value) if value == expected => VarState::Matches,
        Ok(_) => VarState::Differs,
        Err(_) => VarState::NotSet,
    }
}

/// Show the default profile and whether this process already exports it
pub fn current(paths: &Paths, ui: &Ui) -> Result<()> {
    let store = load_store(paths)?;

    ui.section("Current Profile");
    ui.newline();

    let mut table = ui.simple_table();
    table.add_row(vec![
        ui.cell("Config file:"),
        ui.cell(paths.config_file.display().to_string()),
    ]);

    let Some(profile) = store.default_profile() else {
        table.add_row(vec![ui.cell("Default profile:"), ui.cell("(none)")]);
        ui.println(table.to_string());
        return Ok(());
    };

    table.add_row(vec![ui.cell("Default profile:"), ui.header_cell(&profile.name)]);
    table.add_row(vec![ui.cell("Base URL:"), ui.cell(&profile.base_url)]);
    table.add_row(vec![
        ui.cell("Token:"),
        ui.cell(profile.token_preview(DEFAULT_TOKEN_PREVIEW)),
    ]);

    for (var, expected) in [
        (BASE_URL_VAR, &profile.base_url),
        (AUTH_TOKEN_VAR, &profile.token),
    ] {
        let status = match var_state(var, expected) {
            VarState::Matches => ui.colored_cell("matches", AnsiColor::Green),
            VarState::Differs => ui.colored_cell("differs", AnsiColor::Yellow),
            VarState::NotSet => ui.colored_cell("not set", AnsiColor::Yellow),
        };
        table.add_row(vec![ui.cell(format!("{}:", var)), status]);
    }

    ui.println(table.to_string());
    Ok(())
}

/// Add a profile, or update the URL and token of an existing one
pub fn add(
    paths: &Paths,
    name: &str,
    base_url: &str,
    token: Option<String>,
    ui: &Ui,
) -> Result<()> {
    validate_profile_name(name)?;

    let token = match token {
        Some(token) => token,
        None => Password::new(&format!("Token for '{}':", name))
            .without_confirmation()
            .with_display_mode(PasswordDisplayMode::Masked)
            .prompt()
            .context("Token entry cancelled")?,
    };

    let mut store = load_store(paths)?;
    if !paths.config_file.exists() {
        ui.info(format!(
            "Creating new config file at: {}",
            paths.config_file.display()
        ));
    }

    let became_default = match store.add_or_update(name, base_url, &token) {
        Upsert::Updated => {
            ui.ok(format!("Updated profile '{}'", name));
            false
        }
        Upsert::Added { became_default } => {
            ui.ok(format!("Added profile '{}'", name));
            became_default
        }
    };

    save_store(&store, paths, ui)?;

    if became_default {
        ui.info(format!("'{}' is the default profile (first profile added)", name));
        ui.newline();
        ui.println("To export it to your environment:");
        ui.println(format!("  chcc set-default --name {}", name));
    }

    Ok(())
}

/// Make a profile the default and export it to the environment
///
/// Without a name the user picks one interactively.
pub fn set_default(
    paths: &Paths,
    name: Option<&str>,
    ui: &Ui,
    propagator: &Propagator,
) -> Result<()> {
    let mut store = load_store(paths)?;

    let name = match name {
        Some(name) => name.to_string(),
        None => pick_profile(&store, "Which profile should be the default?")?,
    };

    if !store.set_default(&name) {
        report_unknown_profile(&store, &name, ui);
        return Ok(());
    }

    ui.ok(format!("Set '{}' as default profile", name));
    save_store(&store, paths, ui)?;

    if let Some(profile) = store.get(&name) {
        propagate(profile, propagator, ui);
    }
    Ok(())
}

/// Remove a profile, re-exporting the new default if it changed
pub fn remove(
    paths: &Paths,
    name: &str,
    force: bool,
    ui: &Ui,
    propagator: &Propagator,
) -> Result<()> {
    let mut store = load_store(paths)?;

    if store.get(name).is_none() {
        report_unknown_profile(&store, name, ui);
        return Ok(());
    }

    if !force {
        let confirm = Confirm::new(&format!("Remove profile '{}'?", name))
            .with_default(false)
            .with_help_message("The profile's URL and token will be deleted from the config file")
            .prompt()
            .context("Confirmation cancelled")?;

        if !confirm {
            ui.warn("Removal cancelled.");
            return Ok(());
        }
    }

    let previous_default = store.default_name.clone();
    store.remove(name);
    ui.ok(format!("Removed profile '{}'", name));
    save_store(&store, paths, ui)?;

    if store.is_empty() {
        ui.info("No profiles remaining. You may want to clear these environment variables manually:");
        ui.println(format!("  {}", BASE_URL_VAR));
        ui.println(format!("  {}", AUTH_TOKEN_VAR));
    } else if store.default_name != previous_default && !store.default_name.is_empty() {
        ui.info(format!("New default profile: {}", store.default_name));
        if let Some(profile) = store.get(&store.default_name) {
            propagate(profile, propagator, ui);
        }
    }

    Ok(())
}

/// Print the commands that export the default profile in `shell`
///
/// Output carries no labels so it can be evaluated directly, e.g.
/// `eval "$(chcc env)"`.
pub fn env(paths: &Paths, shell: Option<Shell>, ui: &Ui) -> Result<()> {
    let shell = shell.unwrap_or_else(|| Platform::current().default_shell());
    for line in default_exports(paths, shell)? {
        ui.println(line);
    }
    Ok(())
}

fn default_exports(paths: &Paths, shell: Shell) -> Result<Vec<String>> {
    let store = load_store(paths)?;
    let Some(profile) = store.default_profile() else {
        bail!("No profiles configured.\nHint: Use 'chcc add' to add one first.");
    };
    Ok(shell.export_commands(profile))
}

/// Run the doctor diagnostics
pub fn doctor(paths: &Paths, ui: &Ui, propagator: &Propagator) -> Result<()> {
    if run_doctor(paths, ui, propagator) {
        ui.ok("No issues found");
    } else {
        ui.warn("Some checks reported issues (see above)");
    }
    Ok(())
}

/// Interactive profile picker, starting on the current default
fn pick_profile(store: &Store, prompt: &str) -> Result<String> {
    if store.is_empty() {
        bail!("No profiles configured.\nHint: Use 'chcc add' to add one first.");
    }

    let names: Vec<String> = store.names().map(str::to_string).collect();
    let cursor = store
        .default_profile()
        .and_then(|d| names.iter().position(|n| *n == d.name))
        .unwrap_or(0);

    Select::new(prompt, names)
        .with_starting_cursor(cursor)
        .prompt()
        .context("Profile selection cancelled")
}

fn report_unknown_profile(store: &Store, name: &str, ui: &Ui) {
    ui.err(format!("Profile '{}' not found", name));
    if store.is_empty() {
        ui.println("No profiles configured. Use 'chcc add' to add one first.");
    } else {
        ui.println("Available profiles:");
        for name in store.names() {
            ui.println(format!("  - {}", name));
        }
    }
}

/// Export `profile` and tell the user what happened
///
/// Persistence problems are warnings: the user gets the manual commands
/// instead.
fn propagate(profile: &Profile, propagator: &Propagator, ui: &Ui) {
    // The process environment changes before the spinner's ticker thread exists
    if let Err(e) = propagator.export_to_process(profile) {
        ui.err(format!("Failed to set environment variables: {}", e));
        ui.println("You may need to set them manually:");
        print_manual_commands(profile, propagator.platform(), ui);
        return;
    }

    let spinner = ui.spinner("Persisting environment variables...");
    let report = match propagator.persist(profile) {
        Ok(report) => {
            ui.spinner_finish_ok(&spinner, "Environment variables set");
            report
        }
        Err(e) => {
            ui.spinner_finish_err(&spinner, format!("Failed to persist environment variables: {}", e));
            ui.println("They are set for this process only. To set them in your shell:");
            print_manual_commands(profile, propagator.platform(), ui);
            return;
        }
    };

    for outcome in &report.outcomes {
        match outcome {
            PersistOutcome::Appended(path) => ui.println(format!(
                "  {} Appended exports to {}",
                ui.icon_ok(),
                path.display()
            )),
            PersistOutcome::Stored(var) => ui.println(format!(
                "  {} Stored {} for new sessions",
                ui.icon_ok(),
                var
            )),
            PersistOutcome::AppendFailed { path, reason } => {
                ui.warn(format!("Could not update {}: {}", path.display(), reason))
            }
            PersistOutcome::StoreFailed { var, reason } => {
                ui.warn(format!("Failed to set persistent {}: {}", var, reason))
            }
        }
    }

    if report.outcomes.is_empty() {
        ui.warn("No shell startup file found (~/.bashrc, ~/.zshrc); new shells will not see the change");
    }

    if report.persisted_anywhere() && report.failures().next().is_none() {
        ui.println("To apply this change to your current terminal session, run:");
    } else {
        ui.println("You may need to set them manually:");
    }
    print_manual_commands(profile, propagator.platform(), ui);
}

fn print_manual_commands(profile: &Profile, platform: &Platform, ui: &Ui) {
    for shell in platform.manual_shells() {
        ui.newline();
        ui.println(format!("For {}:", shell.label()));
        for line in shell.export_commands(profile) {
            ui.println(line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::count_blocks_in;
    use crate::test_utils::setup_test_paths;
    use crate::ui::ColorMode;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn test_ui() -> Ui {
        Ui::new(ColorMode::Never, false)
    }

    fn unix_propagator(temp: &TempDir) -> Propagator {
        Propagator::new(Platform::Unix, Some(temp.path().to_path_buf()))
    }

    fn add_profile(paths: &Paths, name: &str, url: &str, token: &str) {
        add(paths, name, url, Some(token.to_string()), &test_ui()).unwrap();
    }

    #[test]
    fn test_add_creates_config_with_default() {
        let temp = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp);

        add_profile(&paths, "work", "https://work.example", "sk-work");
        add_profile(&paths, "home", "https://home.example", "sk-home");

        let store = Store::load(&paths.config_file).unwrap();
        assert_eq!(store.default_name, "work");
        assert_eq!(store.names().collect::<Vec<_>>(), vec!["work", "home"]);
    }

    #[test]
    fn test_add_updates_existing() {
        let temp = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp);

        add_profile(&paths, "work", "https://old.example", "sk-old");
        add_profile(&paths, "work", "https://new.example", "sk-new");

        let store = Store::load(&paths.config_file).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("work").unwrap().base_url, "https://new.example");
        assert_eq!(store.get("work").unwrap().token, "sk-new");
    }

    #[test]
    fn test_add_rejects_empty_name() {
        let temp = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp);

        let result = add(&paths, "", "https://x", Some("t".into()), &test_ui());
        assert!(result.is_err());
        assert!(!paths.config_file.exists());
    }

    #[test]
    fn test_corrupt_config_aborts_without_writing() {
        let temp = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp);
        fs::write(&paths.config_file, "api_sites: [broken").unwrap();

        let result = add(&paths, "work", "https://x", Some("t".into()), &test_ui());

        assert!(result.is_err());
        assert_eq!(
            fs::read_to_string(&paths.config_file).unwrap(),
            "api_sites: [broken"
        );
    }

    #[test]
    fn test_set_default_unknown_name_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp);
        add_profile(&paths, "work", "https://work.example", "sk-work");
        let before = fs::read(&paths.config_file).unwrap();

        set_default(&paths, Some("missing"), &test_ui(), &unix_propagator(&temp)).unwrap();

        assert_eq!(fs::read(&paths.config_file).unwrap(), before);
    }

    #[test]
    #[serial]
    fn test_set_default_saves_and_propagates() {
        let temp = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp);
        fs::write(&temp.path().join(".bashrc"), "").unwrap();
        add_profile(&paths, "work", "https://work.example", "sk-work");
        add_profile(&paths, "home", "https://home.example", "sk-home");

        set_default(&paths, Some("home"), &test_ui(), &unix_propagator(&temp)).unwrap();

        let store = Store::load(&paths.config_file).unwrap();
        assert_eq!(store.default_name, "home");
        assert_eq!(count_blocks_in(&temp.path().join(".bashrc")), 1);
        assert!(!temp.path().join(".zshrc").exists());
        assert_eq!(std::env::var(BASE_URL_VAR).unwrap(), "https://home.example");
        assert_eq!(std::env::var(AUTH_TOKEN_VAR).unwrap(), "sk-home");
    }

    #[test]
    #[serial]
    fn test_remove_default_propagates_new_default() {
        let temp = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp);
        fs::write(&temp.path().join(".zshrc"), "").unwrap();
        add_profile(&paths, "work", "https://work.example", "sk-work");
        add_profile(&paths, "home", "https://home.example", "sk-home");

        remove(&paths, "work", true, &test_ui(), &unix_propagator(&temp)).unwrap();

        let store = Store::load(&paths.config_file).unwrap();
        assert_eq!(store.default_name, "home");
        assert_eq!(count_blocks_in(&temp.path().join(".zshrc")), 1);
        assert_eq!(std::env::var(AUTH_TOKEN_VAR).unwrap(), "sk-home");
    }

    #[test]
    #[serial]
    fn test_remove_non_default_does_not_propagate() {
        let temp = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp);
        fs::write(&temp.path().join(".bashrc"), "").unwrap();
        add_profile(&paths, "work", "https://work.example", "sk-work");
        add_profile(&paths, "home", "https://home.example", "sk-home");

        remove(&paths, "home", true, &test_ui(), &unix_propagator(&temp)).unwrap();

        let store = Store::load(&paths.config_file).unwrap();
        assert_eq!(store.default_name, "work");
        assert_eq!(count_blocks_in(&temp.path().join(".bashrc")), 0);
    }

    #[test]
    fn test_remove_last_profile_clears_default() {
        let temp = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp);
        add_profile(&paths, "work", "https://work.example", "sk-work");

        remove(&paths, "work", true, &test_ui(), &unix_propagator(&temp)).unwrap();

        let store = Store::load(&paths.config_file).unwrap();
        assert!(store.is_empty());
        assert!(store.default_name.is_empty());
    }

    #[test]
    fn test_remove_unknown_name_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp);
        add_profile(&paths, "work", "https://work.example", "sk-work");
        let before = fs::read(&paths.config_file).unwrap();

        remove(&paths, "missing", true, &test_ui(), &unix_propagator(&temp)).unwrap();

        assert_eq!(fs::read(&paths.config_file).unwrap(), before);
    }

    #[test]
    fn test_list_and_env_on_empty_store() {
        let temp = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp);

        assert!(list(&paths, &test_ui()).is_ok());
        assert!(env(&paths, Some(Shell::Posix), &test_ui()).is_err());
    }

    #[test]
    fn test_env_prints_default_profile_exports() {
        let temp = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp);
        add_profile(&paths, "work", "https://work.example", "sk-work");
        add_profile(&paths, "home", "https://home.example", "sk-home");

        assert_eq!(
            default_exports(&paths, Shell::Posix).unwrap(),
            vec![
                "export ANTHROPIC_BASE_URL=\"https://work.example\"",
                "export ANTHROPIC_AUTH_TOKEN=\"sk-work\"",
            ]
        );
        assert_eq!(
            default_exports(&paths, Shell::PowerShell).unwrap(),
            vec![
                "$env:ANTHROPIC_BASE_URL='https://work.example'",
                "$env:ANTHROPIC_AUTH_TOKEN='sk-work'",
            ]
        );
        assert!(env(&paths, Some(Shell::Cmd), &test_ui()).is_ok());
    }

    #[test]
    #[serial]
    fn test_current_compares_process_environment() {
        let temp = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp);
        assert!(current(&paths, &test_ui()).is_ok());

        add_profile(&paths, "work", "https://work.example", "sk-work");
        unsafe {
            std::env::set_var(BASE_URL_VAR, "https://work.example");
            std::env::set_var(AUTH_TOKEN_VAR, "sk-other");
        }

        assert_eq!(var_state(BASE_URL_VAR, "https://work.example"), VarState::Matches);
        assert_eq!(var_state(AUTH_TOKEN_VAR, "sk-work"), VarState::Differs);
        assert!(current(&paths, &test_ui()).is_ok());

        unsafe {
            std::env::remove_var(AUTH_TOKEN_VAR);
        }
        assert_eq!(var_state(AUTH_TOKEN_VAR, "sk-work"), VarState::NotSet);
    }

    #[test]
    fn test_fallback_note_distinguishes_unset_and_dangling_default() {
        let mut store = crate::test_utils::store_with(&[("work", "https://a", "sk-a")]);
        assert_eq!(fallback_note(&store), None);

        store.default_name.clear();
        assert!(fallback_note(&store).unwrap().contains("no default selected"));

        store.default_name = "gone".to_string();
        let note = fallback_note(&store).unwrap();
        assert!(note.contains("'gone' no longer exists"));

        assert_eq!(fallback_note(&Store::default()), None);
    }

    #[test]
    fn test_set_default_without_name_on_empty_store_fails() {
        let temp = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp);

        let result = set_default(&paths, None, &test_ui(), &unix_propagator(&temp));
        assert!(result.is_err());
    }
}
