// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use clap::Parser;

use display_configurator::config::{self, Config};
use display_configurator::configurator::{FixedStatePolicy, SoftwareMirroringFlag};
use display_configurator::delegate::SimulatedDelegate;
use display_configurator::display::{DisplayPowerState, MultipleDisplayState, PowerFlags};
use display_configurator::layout::SoftwareMirroringController;
use display_configurator::{ConfigurationOutcome, DisplayConfigurator};

#[macro_use]
extern crate tracing;

/// Apply a display configuration to a simulated set of displays
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Topology file. Defaults to $XDG_CONFIG_HOME/display-configurator/topology.kdl
    #[arg(long, short)]
    config: Option<PathBuf>,
    /// Multi-display state to request (single, dual-mirror, dual-extended, ...)
    #[arg(long)]
    display_state: Option<String>,
    /// Power state to request (all-on, all-off, internal-off-external-on, ...)
    #[arg(long)]
    power_state: Option<String>,
    /// Reconfigure even if nothing changed
    #[arg(long)]
    force_configure: bool,
    /// Treat the request as a power change and force DPMS on
    #[arg(long)]
    force_probe: bool,
    /// Suspend and resume the displays after configuring
    #[arg(long)]
    suspend_cycle: bool,
}

fn setup_logs() {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let fmt_layer = fmt::layer().with_target(false);
    let filter_layer = EnvFilter::try_from_default_env().unwrap_or(EnvFilter::new(format!(
        "warn,{}=warn",
        env!("CARGO_CRATE_NAME")
    )));

    #[cfg(feature = "journald")]
    if let Ok(journal_layer) = tracing_journald::layer() {
        tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer)
            .with(journal_layer)
            .init();
        return;
    }

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}

fn apply_overrides(cli: &Cli, config: &mut Config) -> anyhow::Result<()> {
    if let Some(state) = &cli.display_state {
        config.display_state = state.parse::<MultipleDisplayState>()?;
    }
    if let Some(power) = &cli.power_state {
        config.power_state = power.parse::<DisplayPowerState>()?;
    }
    if cli.force_configure {
        config.force_configure = true;
    }
    if cli.force_probe {
        config.power_flags |= PowerFlags::FORCE_PROBE;
    }
    Ok(())
}

fn print_outcome(outcome: &ConfigurationOutcome) {
    println!(
        "{}: {} / {}, framebuffer {}",
        if outcome.success { "ok" } else { "failed" },
        outcome.display_state,
        outcome.power_state,
        outcome.framebuffer_size
    );
    for display in &outcome.displays {
        println!("  {}", display);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_logs();
    let cli = Cli::parse();

    let path = cli
        .config
        .clone()
        .or_else(config::default_path)
        .ok_or_else(|| anyhow!("no configuration directory, pass --config"))?;
    let mut config = config::load(&path).with_context(|| format!("loading {}", path.display()))?;
    apply_overrides(&cli, &mut config)?;

    let delegate = Arc::new(SimulatedDelegate::new(config.displays.clone()));
    let mut configurator = DisplayConfigurator::new(delegate.clone());
    if let Some(policy) = config.mirror_policy {
        configurator = configurator.with_state_controller(Arc::new(FixedStatePolicy(policy)));
    }
    let mirroring = Arc::new(SoftwareMirroringFlag::default());
    if config.software_mirroring {
        configurator = configurator.with_mirroring_controller(mirroring.clone());
    }
    configurator.set_background_color(config.background_color_argb);

    let outcome = configurator
        .configure(
            config.display_state,
            config.power_state,
            config.power_flags,
            config.force_configure,
        )
        .await;
    print_outcome(&outcome);
    if mirroring.software_mirroring_enabled() {
        println!("software mirroring enabled");
    }

    if cli.suspend_cycle {
        info!("Running suspend/resume cycle");
        let suspended = configurator.suspend_displays().await;
        let resumed = configurator.resume_displays().await;
        println!("suspend: {}, resume: {}", suspended, resumed);
    }

    println!("hardware actions:");
    for action in delegate.actions() {
        println!("  {}", action);
    }

    if !outcome.success {
        return Err(anyhow!("display configuration failed"));
    }
    Ok(())
}
