use anyhow::{Result, bail};
use h2harness_core::config::RunConfig;
use h2harness_runner::{ServerCommand, ServerTarget, Verdict};

pub async fn run(config: RunConfig, server_command: Vec<String>) -> Result<()> {
    let target = build_target(&config, server_command)?;

    let records = h2harness_runner::run(&config, target).await?;
    if config.skip {
        return Ok(());
    }

    let verdict = Verdict::from_records(records);
    if !verdict.evaluate(config.ignore_failures) {
        bail!(
            "{} test case(s) failed HTTP/2 conformance",
            verdict.non_ignored.len()
        );
    }

    Ok(())
}

fn build_target(config: &RunConfig, server_command: Vec<String>) -> Result<ServerTarget> {
    let mut parts = server_command.into_iter();

    match parts.next() {
        Some(program) => {
            let command = ServerCommand::new(program).args(parts);
            Ok(ServerTarget::command(command))
        }
        // A skipped run never starts the target.
        None if config.skip => Ok(ServerTarget::function(|_| Ok(()))),
        None => bail!("no server command given; pass it after `--`"),
    }
}
