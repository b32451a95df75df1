mod cli;
mod commands;
mod output;

use authstack::Error as StackError;
use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        if let Some(stack_error) = e.downcast_ref::<StackError>() {
            eprintln!("Error: {}", stack_error.with_suggestion());
        } else {
            eprintln!("Error: {:#}", e);
        }
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    // ── Commands that need no manifest ──────────────────────────────
    match &cli.command {
        Commands::Init { output, force } => {
            return commands::run_init(output, *force, &output::CliOutput);
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            clap_complete::generate(*shell, &mut cmd, bin_name, &mut std::io::stdout());
            return Ok(());
        }
        _ => {}
    }

    let ctx = commands::ManifestContext::resolve(cli.config.clone(), &cli.env, &cli.set)?;

    match cli.command {
        Commands::Validate { extra } => {
            commands::run_validate(&ctx, &extra, &output::CliOutput)?;
        }
        Commands::Synth { output, format } => {
            commands::run_synth(&ctx, output.as_deref(), format, &output::CliOutput)?;
        }
        Commands::Routes { json } => {
            commands::run_routes(&ctx, json, &output::CliOutput)?;
        }
        Commands::Graph { json } => {
            commands::run_graph(&ctx, json, &output::CliOutput)?;
        }
        Commands::Check {
            method,
            path,
            client,
            grant,
            scopes,
            token,
        } => {
            let args = commands::CheckArgs {
                method,
                path,
                client,
                grant,
                scopes,
                token,
            };
            commands::run_check(&ctx, &args, &output::CliOutput)?;
        }
        Commands::Init { .. } | Commands::Completions { .. } => {
            unreachable!("handled before the manifest is loaded");
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
