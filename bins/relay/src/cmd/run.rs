use tokio_util::sync::CancellationToken;

use pipeline::config::RelayTarget;
use pipeline::{RelayParts, RelaySettings, run_relay};

use crate::config::{RelayConfig, RunArgs};
use crate::error::RunError;
use crate::input::open_input;

pub async fn run(args: RunArgs) -> Result<(), RunError> {
    tracing::info!("serial-relay starting");

    // --- Load config ---
    let mut config = RelayConfig::load(&args.config)?;
    config.apply_args(&args);
    config.validate()?;

    let target = RelayTarget::parse(&config.forward.target)?;
    let settings = RelaySettings::from_config(&config.log, &config.forward)?;
    let parts = RelayParts::new(config.input.max_line, &target);
    tracing::info!(
        device = %config.input.device,
        target = %parts.transport.target(),
        data_dir = %settings.data_dir.display(),
        every = settings.every,
        "relay configured"
    );

    // --- Open device ---
    let input = open_input(&config.input)?;

    // --- Ctrl+C → cancel ---
    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutting down...");
            signal_token.cancel();
        }
    });

    let report = run_relay(input, parts, settings, token).await?;

    if let Some(reader) = report.reader {
        tracing::info!(
            lines = reader.lines,
            malformed = reader.malformed,
            forward_dropped = reader.forward_dropped,
            "input summary"
        );
    }
    tracing::info!(
        path = %report.log_path.display(),
        rows = report.logger.rows,
        relayed = report.forwarder.relayed,
        write_failures = report.forwarder.write_failures,
        "serial-relay stopped"
    );
    Ok(())
}
