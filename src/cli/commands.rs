//! Command implementations

use std::io;
use std::path::Path;

use clap::CommandFactory;
use clap_complete::generate;
use tracing::{debug, instrument};

use crate::application::{ApplicationError, Disposition, Scenario};
use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::cli::tree::{kind_tree, ToTermTree};
use crate::config::{global_config_path, Settings};
use crate::domain::{Exception, ExceptionGroup, KindRegistry};

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let settings = Settings::load(cli.config.as_deref())?;
    if !settings.color {
        colored::control::set_override(false);
    }
    debug!(?settings, "settings loaded");

    match &cli.command {
        Some(Commands::Kinds { root }) => cmd_kinds(&settings, root),
        Some(Commands::Show { file }) => cmd_show(&settings, file),
        Some(Commands::Split { file, types }) => cmd_split(&settings, file, types),
        Some(Commands::Catch { file }) => cmd_catch(&settings, file),
        Some(Commands::Config { command }) => cmd_config(&settings, command),
        Some(Commands::Completion { shell }) => {
            generate(*shell, &mut Cli::command(), "exceptiongroup", &mut io::stdout());
            Ok(())
        }
        None => Err(CliError::Usage("no command given, see --help".into())),
    }
}

fn registry(settings: &Settings) -> CliResult<KindRegistry> {
    Ok(settings.registry().map_err(ApplicationError::from)?)
}

fn load_scenario(settings: &Settings, file: &Path) -> CliResult<Scenario> {
    Ok(Scenario::load(file, &registry(settings)?)?)
}

#[instrument(skip(settings))]
fn cmd_kinds(settings: &Settings, root: &str) -> CliResult<()> {
    let registry = registry(settings)?;
    let root = registry.resolve(root).map_err(ApplicationError::from)?;
    output::info(&kind_tree(&registry, &root));
    Ok(())
}

#[instrument(skip(settings))]
fn cmd_show(settings: &Settings, file: &Path) -> CliResult<()> {
    let scenario = load_scenario(settings, file)?;
    output::info(&scenario.raised().to_term_tree(settings));
    Ok(())
}

#[instrument(skip(settings))]
fn cmd_split(settings: &Settings, file: &Path, types: &[String]) -> CliResult<()> {
    let scenario = load_scenario(settings, file)?;
    let (matched, rest) = scenario.split(types)?;
    print_half(settings, "matched", matched);
    print_half(settings, "rest", rest);
    Ok(())
}

fn print_half(settings: &Settings, title: &str, half: Option<ExceptionGroup>) {
    output::header(title);
    match half {
        Some(group) => output::info(&Exception::Group(group).to_term_tree(settings)),
        None => output::detail("(none)"),
    }
}

#[instrument(skip(settings))]
fn cmd_catch(settings: &Settings, file: &Path) -> CliResult<()> {
    let scenario = load_scenario(settings, file)?;
    let outcome = scenario.run()?;

    for invocation in &outcome.invocations {
        let received = invocation
            .received
            .exceptions()
            .iter()
            .map(|e| format!("{:?}", e))
            .collect::<Vec<_>>()
            .join(", ");
        output::action(&format!("handler #{}", invocation.handler), &received);
    }

    match outcome.disposition {
        Disposition::Suppress => {
            output::success("fully handled");
            Ok(())
        }
        Disposition::Passthrough(exception) => {
            output::warning("no handler matched, the original failure propagates");
            output::info(&exception.to_term_tree(settings));
            Err(CliError::Unhandled(exception.to_string()))
        }
        Disposition::Replace(exception) => {
            output::warning("unhandled remainder raised");
            output::info(&exception.to_term_tree(settings));
            Err(CliError::Unhandled(exception.to_string()))
        }
    }
}

fn cmd_config(settings: &Settings, command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => output::info(&settings.to_toml()?),
        ConfigCommands::Path => match global_config_path() {
            Some(path) => output::info(&path.display()),
            None => output::warning("no home directory, global config unavailable"),
        },
    }
    Ok(())
}
