use anyhow::{Context, Result, anyhow};
use pico_args::Arguments;
use std::{env, path::PathBuf};

use crate::config::SettingsState;
use crate::sim::trace::{self, Trace};
use crate::watch;

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    let compact = pargs.contains("--compact");

    // First free arg is the subcommand
    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("replay") => {
            let path: PathBuf = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: smoothswipe replay <trace.toml>"))?;
            let trace = Trace::load(&path)
                .with_context(|| format!("failed to load trace {}", path.display()))?;
            let report = trace::replay(&trace)?;
            print_json(&serde_json::to_value(&report)?, compact);
            Ok(())
        }

        Some("watch") => watch::run(),

        Some("settings") => {
            let state = SettingsState::load_or_install_default()?;
            print_json(
                &serde_json::json!({
                    "path": state.settings_path,
                    "sensitivity": state.settings.sensitivity,
                    "sensitivity_factor": state.settings.sensitivity_factor(),
                }),
                compact,
            );
            Ok(())
        }

        Some("set-sensitivity") => {
            let value: i64 = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: smoothswipe set-sensitivity <0-100>"))?;
            let mut state = SettingsState::load_or_install_default()?;
            state.set_sensitivity(value)?;
            println!(
                "ok: sensitivity {} written to {}",
                state.settings.sensitivity,
                state.settings_path.display()
            );
            Ok(())
        }

        Some("doctor") => {
            let state = SettingsState::load_or_install_default()?;
            print_json(&state.doctor_report(), compact);
            Ok(())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

fn print_help() {
    println!(
        r#"smoothswipe — three-finger swipe to reveal the overview

USAGE:
  smoothswipe help [command]              Show general or command-specific help
  smoothswipe replay <trace.toml>         Replay a gesture trace on the simulated desktop
  smoothswipe watch                       Drive the simulated desktop from the touchpad
  smoothswipe settings                    Show the current settings
  smoothswipe set-sensitivity <0-100>     Change swipe sensitivity
  smoothswipe doctor                      Diagnose permissions/devices

OPTIONS:
  --compact                               Single-line JSON output

TIPS:
  - Settings: ~/.config/smoothswipe/settings.toml (reloaded by `watch`)
  - Log level: RUST_LOG=debug smoothswipe watch
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "replay" => println!(
            "usage: smoothswipe replay [--compact] <trace.toml>\nRuns the trace's [[step]] entries (gesture, advance, settings) and prints the final scene as JSON."
        ),
        "watch" => println!(
            "usage: smoothswipe watch\nReads three-finger swipes from every touchpad until SIGINT/SIGTERM; settings changes apply live."
        ),
        "settings" => println!("usage: smoothswipe settings\nPrints the settings file path and values."),
        "set-sensitivity" => println!(
            "usage: smoothswipe set-sensitivity <0-100>\nHigher values need less finger travel for a full reveal."
        ),
        "doctor" => println!(
            "usage: smoothswipe doctor\nChecks input group membership and lists detected touchpads."
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_json(v: &serde_json::Value, compact: bool) {
    let text = if compact {
        serde_json::to_string(v)
    } else {
        serde_json::to_string_pretty(v)
    };
    println!("{}", text.unwrap_or_default());
}
