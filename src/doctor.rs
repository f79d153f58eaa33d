//! Diagnostic tool for chcc.
//!
//! This module implements the `chcc doctor` command, which checks for common
//! issues:
//! - An unreadable or malformed config file.
//! - Duplicate names or a dangling default in a hand-edited config.
//! - A process environment that doesn't match the default profile.
//! - Missing shell startup files, or ones that piled up several export blocks.
//!
//! It reports issues to the user with a pass/fail/warn status.

use anstyle::AnsiColor;
use std::env;

use crate::environment::{AUTH_TOKEN_VAR, BASE_URL_VAR, Platform, Propagator, count_blocks_in};
use crate::paths::Paths;
use crate::store::Store;
use crate::ui::Ui;

/// Run the doctor diagnostics, returning true when no check failed
pub fn run_doctor(paths: &Paths, ui: &Ui, propagator: &Propagator) -> bool {
    ui.section("chcc Doctor");
    ui.newline();

    let mut all_ok = true;
    let mut store = None;

    // 1. Config file
    all_ok &= check_step(ui, "Config File", || {
        if !paths.config_file.exists() {
            ui.println(format!(
                "  {} No config file yet: {}",
                ui.icon_warn(),
                paths.config_file.display()
            ));
            store = Some(Store::default());
            return true;
        }

        match Store::load(&paths.config_file) {
            Ok(loaded) => {
                ui.println(format!(
                    "  {} Config file readable: {}",
                    ui.icon_ok(),
                    paths.config_file.display()
                ));
                store = Some(loaded);
                true
            }
            Err(e) => {
                ui.println(format!("  {} {}", ui.icon_err(), e));
                false
            }
        }
    });

    // Nothing else is meaningful without a store
    let Some(store) = store else {
        return false;
    };

    // 2. Profiles
    all_ok &= check_step(ui, "Profiles", || {
        if store.is_empty() {
            ui.println(format!("  {} No profiles configured", ui.icon_warn()));
            return true;
        }

        ui.println(format!("  Found {} profiles:", store.len()));
        for name in store.names() {
            ui.println(format!("    {} {}", ui.icon_info(), name));
        }

        let issues = store.issues();
        for issue in &issues {
            ui.println(format!("  {} {}", ui.icon_err(), issue));
        }
        issues.is_empty()
    });

    // 3. Environment of this process
    all_ok &= check_step(ui, "Environment", || {
        let Some(profile) = store.default_profile() else {
            ui.println(format!("  {} No default profile to compare against", ui.icon_info()));
            return true;
        };

        ui.println(format!("  {} Default profile: {}", ui.icon_info(), profile.name));
        for (var, expected) in [
            (BASE_URL_VAR, &profile.base_url),
            (AUTH_TOKEN_VAR, &profile.token),
        ] {
            match env::var(var) {
                Ok(value) if &value == expected => {
                    ui.println(format!("  {} {} matches the default profile", ui.icon_ok(), var))
                }
                Ok(_) => ui.println(format!(
                    "  {} {} differs from the default profile (open a new shell?)",
                    ui.icon_warn(),
                    var
                )),
                Err(_) => ui.println(format!("  {} {} is not set", ui.icon_warn(), var)),
            }
        }
        true
    });

    // 4. Persistence targets
    all_ok &= check_step(ui, "Shell Startup Files", || match propagator.platform() {
        Platform::Windows => {
            ui.println(format!(
                "  {} Variables are persisted with setx on Windows",
                ui.icon_info()
            ));
            true
        }
        Platform::Unsupported(os) => {
            ui.println(format!(
                "  {} Platform '{}' is not supported; set variables manually",
                ui.icon_warn(),
                os
            ));
            true
        }
        Platform::Unix => {
            let files = match propagator.startup_files() {
                Ok(files) => files,
                Err(e) => {
                    ui.println(format!("  {} {}", ui.icon_err(), e));
                    return false;
                }
            };

            let mut any_exists = false;
            for path in files {
                if !path.exists() {
                    ui.println(format!(
                        "  {} {} not found (skipped)",
                        ui.icon_info(),
                        path.display()
                    ));
                    continue;
                }
                any_exists = true;

                match count_blocks_in(&path) {
                    0 => ui.println(format!(
                        "  {} {} has no chcc exports yet",
                        ui.icon_info(),
                        path.display()
                    )),
                    1 => ui.println(format!(
                        "  {} {} has a chcc export block",
                        ui.icon_ok(),
                        path.display()
                    )),
                    n => ui.println(format!(
                        "  {} {} has {} chcc export blocks; the last one wins",
                        ui.icon_warn(),
                        path.display(),
                        n
                    )),
                }
            }

            if !any_exists {
                ui.println(format!(
                    "  {} No startup file exists; new shells won't see exported profiles",
                    ui.icon_warn()
                ));
            }
            true
        }
    });

    all_ok
}

fn check_step<F>(ui: &Ui, name: &str, check_fn: F) -> bool
where
    F: FnOnce() -> bool,
{
    ui.println(ui.bold(format!("Checking {}...", name)));
    let success = check_fn();
    if !success {
        ui.println(ui.colored("  Issues detected!", AnsiColor::Red));
    }
    ui.newline();
    success
}
