//! Binary entry point for the `groundcrew` CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use groundcrew::{
    Ec2Gateway, FleetConfig, InstanceSpec, ProvisionError, ProvisioningOrchestrator,
};

mod cli;

use cli::{Cli, ListCommand, ProvisionCommand, TerminateCommand};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("gateway error: {0}")]
    Gateway(String),
    #[error("failed to read user data: {0}")]
    UserData(String),
    #[error("invalid tag filter '{0}', expected key=value")]
    InvalidTagFilter(String),
    #[error(transparent)]
    Provision(#[from] ProvisionError),
    #[error("failed to render output: {0}")]
    Output(String),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli {
        Cli::Provision(command) => provision(command).await,
        Cli::Terminate(command) => terminate(command).await,
        Cli::List(command) => list(command).await,
    }
}

async fn connect_orchestrator()
-> Result<(FleetConfig, ProvisioningOrchestrator<Ec2Gateway>), CliError> {
    let config =
        FleetConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;
    config
        .validate()
        .map_err(|err| CliError::Config(err.to_string()))?;
    let base_tags = config
        .base_tag_set()
        .map_err(|err| CliError::Config(err.to_string()))?;
    let gateway = Ec2Gateway::connect(&config.region)
        .await
        .map_err(|err| CliError::Gateway(err.to_string()))?;
    let orchestrator = ProvisioningOrchestrator::new(gateway, base_tags);
    Ok((config, orchestrator))
}

fn build_spec(config: &FleetConfig, command: &ProvisionCommand) -> Result<InstanceSpec, CliError> {
    let user_data = match &command.user_data_file {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|err| CliError::UserData(format!("{path}: {err}")))?,
        None => String::new(),
    };
    let min_count = command.min_count.unwrap_or(command.count);
    let mut builder = InstanceSpec::builder()
        .instance_type(&config.instance_type)
        .iam_profile(&config.iam_profile)
        .image_id(&config.image_id)
        .subnet_id(&config.subnet_id)
        .security_group_ids(config.security_group_list())
        .key_name(&config.key_name)
        .user_data(user_data)
        .count_range(min_count, command.count);
    if let Some(price) = &command.spot_price {
        builder = builder.spot_price(price);
    }
    builder.build().map_err(CliError::from)
}

async fn provision(command: ProvisionCommand) -> Result<(), CliError> {
    let (config, mut orchestrator) = connect_orchestrator().await?;
    let spec = build_spec(&config, &command)?;
    let batch_name = command
        .name
        .clone()
        .unwrap_or_else(|| format!("fleet-{}", Uuid::new_v4().simple()));

    let ids = if spec.is_spot() {
        orchestrator
            .provision_spot_and_await_ready(&batch_name, &spec)
            .await?
    } else {
        orchestrator
            .provision_on_demand_and_await_ready(&batch_name, &spec)
            .await?
    };

    let mut stdout = io::stdout();
    writeln!(stdout, "batch {batch_name} running with {} instances", ids.len())
        .map_err(|err| CliError::Output(err.to_string()))?;
    for id in &ids {
        let addresses = orchestrator
            .inventory()
            .addresses_of(id)
            .cloned()
            .unwrap_or_default();
        writeln!(
            stdout,
            "{id}\tpublic={}\tprivate={}",
            addresses.public_ip.as_deref().unwrap_or("-"),
            addresses.private_ip.as_deref().unwrap_or("-"),
        )
        .map_err(|err| CliError::Output(err.to_string()))?;
    }
    Ok(())
}

async fn terminate(command: TerminateCommand) -> Result<(), CliError> {
    let (_, mut orchestrator) = connect_orchestrator().await?;
    orchestrator
        .restore_running_instances_by_name(&command.name)
        .await?;
    let count = orchestrator.inventory().len();
    if command.wait {
        orchestrator.terminate_all_instances_and_wait().await?;
    } else {
        orchestrator.terminate_all_instances().await?;
    }
    writeln!(io::stdout(), "termination requested for {count} instances")
        .map_err(|err| CliError::Output(err.to_string()))?;
    Ok(())
}

async fn list(command: ListCommand) -> Result<(), CliError> {
    let (_, orchestrator) = connect_orchestrator().await?;
    let descriptions = match (&command.name, &command.tag) {
        (Some(name), _) => orchestrator.instances_with_tag("Name", name).await?,
        (None, Some(tag)) => {
            let (key, value) = tag
                .split_once('=')
                .ok_or_else(|| CliError::InvalidTagFilter(tag.clone()))?;
            orchestrator.instances_with_tag(key, value).await?
        }
        (None, None) => {
            let mut stdout = io::stdout();
            for id in orchestrator.running_instance_ids().await? {
                writeln!(stdout, "{id}").map_err(|err| CliError::Output(err.to_string()))?;
            }
            return Ok(());
        }
    };

    let mut stdout = io::stdout();
    for description in &descriptions {
        let rendered = serde_json::to_string(description)
            .map_err(|err| CliError::Output(err.to_string()))?;
        writeln!(stdout, "{rendered}").map_err(|err| CliError::Output(err.to_string()))?;
    }
    Ok(())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> FleetConfig {
        FleetConfig {
            region: String::from("eu-west-1"),
            instance_type: String::from("m5.large"),
            image_id: String::from("ami-0abc"),
            subnet_id: String::from("subnet-1"),
            iam_profile: String::from("worker"),
            key_name: String::from("ops"),
            security_group_ids: Some(String::from("sg-1, sg-2")),
            base_tags: Some(String::from("team=data")),
        }
    }

    fn provision_command() -> ProvisionCommand {
        ProvisionCommand {
            name: None,
            count: 2,
            min_count: None,
            spot_price: None,
            user_data_file: None,
        }
    }

    #[test]
    fn spec_defaults_min_count_to_count() {
        let spec = build_spec(&config(), &provision_command()).expect("spec should build");
        assert_eq!(spec.counts.min, 2);
        assert_eq!(spec.counts.max, 2);
        assert!(!spec.is_spot());
        assert_eq!(spec.security_group_ids, ["sg-1", "sg-2"]);
    }

    #[test]
    fn spot_price_selects_the_spot_model() {
        let mut command = provision_command();
        command.spot_price = Some(String::from("0.40"));
        let spec = build_spec(&config(), &command).expect("spec should build");
        assert!(spec.is_spot());
    }

    #[test]
    fn zero_count_is_rejected_before_any_connection() {
        let mut command = provision_command();
        command.count = 0;
        let err = build_spec(&config(), &command).expect_err("zero count should fail");
        assert!(matches!(
            err,
            CliError::Provision(ProvisionError::Validation { .. })
        ));
    }

    #[test]
    fn write_error_renders_the_message() {
        let mut buf = Vec::new();
        write_error(&mut buf, &CliError::Config(String::from("boom")));
        let rendered = String::from_utf8(buf).expect("utf8");
        assert!(rendered.contains("configuration error: boom"));
    }
}
