use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 17] = [
        "RUST_LOG",
        "DSYNC_HOST",
        "DSYNC_PORT",
        "DSYNC_DATABASE_URL",
        "DSYNC_CRON_ENABLED",
        "DSYNC_POLL_INTERVAL_SECS",
        "DSYNC_SWEEP_MAX_ORDERS",
        "DSYNC_SWEEP_WINDOW_HOURS",
        "DSYNC_SWEEP_CALL_DELAY_MS",
        "DSYNC_TRACK_BY",
        "DSYNC_WEBHOOK_ACK_TIMEOUT_MS",
        "DSYNC_COURIER_BASE_URL",
        "DSYNC_COURIER_TIMEOUT_SECS",
        "DSYNC_NOTIFIER_URL",
        "DSYNC_COURIER_IP_WHITELIST",
        "DSYNC_USE_X_FORWARDED_FOR",
        "DSYNC_USE_FORWARDED",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
