//! Application entry orchestration for the todo CLI.

use todo_client::api::TodoClient;
use todo_client::config::{
    initialize_default_global_config, load_config_with_diagnostics, GlobalConfigInitResult,
    LoadedConfig,
};
use todo_client::render::Renderer;
use tracing::debug;

use crate::app::commands::{self, CommandError};
use crate::cli;

/// Top-level CLI entrypoint: handles `init`, then loads config, builds the
/// client and dispatches. Returns the process exit code.
pub(crate) async fn run(args: cli::Args) -> i32 {
    let bootstrap_renderer = Renderer::new(!args.no_color);
    if let cli::Command::Init { force } = &args.command {
        if let Err(msg) = run_init_flow(&bootstrap_renderer, *force) {
            bootstrap_renderer.error(&msg);
            return 1;
        }
        return 0;
    }

    let loaded = match load_config_state(&args) {
        Ok(state) => state,
        Err(msg) => {
            bootstrap_renderer.error(&msg);
            return 1;
        }
    };
    let renderer = Renderer::new(loaded.config.display.color);
    for warning in &loaded.diagnostics.warnings {
        renderer.warn(warning);
    }

    let client = match TodoClient::from_config(&loaded.config) {
        Ok(client) => client,
        Err(e) => {
            renderer.error(&format!("failed to open token store: {e}"));
            return 1;
        }
    };
    debug!(base_url = %loaded.config.api.base_url, "client ready");

    match commands::dispatch(&renderer, &client, args.command).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&renderer, &err);
            1
        }
    }
}

/// Load config and fold in `--base-url` / `--no-color`.
fn load_config_state(args: &cli::Args) -> Result<LoadedConfig, String> {
    let mut loaded = load_config_with_diagnostics(args.config.as_deref())
        .map_err(|e| format!("failed to load config: {e}"))?;
    if let Some(url) = &args.base_url {
        loaded.config.api.base_url = url.trim_end_matches('/').to_string();
    }
    if args.no_color {
        loaded.config.display.color = false;
    }
    Ok(loaded)
}

fn run_init_flow(renderer: &Renderer, force: bool) -> Result<(), String> {
    match initialize_default_global_config(force)
        .map_err(|e| format!("failed to initialize ~/.config/todo: {e}"))?
    {
        GlobalConfigInitResult::Created { path } => {
            renderer.section("initialized todo config");
            renderer.field("path", &path.display().to_string());
            Ok(())
        }
        GlobalConfigInitResult::Overwritten { path, backup_path } => {
            renderer.section("reinitialized todo config");
            renderer.field("path", &path.display().to_string());
            renderer.field("backup", &backup_path.display().to_string());
            Ok(())
        }
        GlobalConfigInitResult::AlreadyInitialized { path } => Err(format!(
            "todo is already initialized at {}. Use `todo init --force` to overwrite.",
            path.display()
        )),
    }
}

fn report_error(renderer: &Renderer, err: &CommandError) {
    match err {
        CommandError::Api(api) => {
            debug!(error = %api, "command failed");
            renderer.error(&api.user_message());
            if api.is_authentication() {
                renderer.detail("run `todo login` to sign in");
            }
        }
        CommandError::Input(msg) => renderer.error(msg),
    }
}
