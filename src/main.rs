use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::RgbColor;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::effect::bouncing_balls::BouncingBalls;
use crate::effect::Action;
use crate::effect::Runner;
use crate::panel::Matrix;
use crate::panel::Panel;

mod cli;
mod color;
mod config;
mod effect;
mod error;
mod event;
mod logging;
mod mqtt;
mod panel;
mod uptime;
mod writer;

#[tokio::main(flavor = "current_thread")]
async fn main() -> color_eyre::eyre::Result<()> {
    setup_panic();
    color_eyre::install().map_err(crate::error::Error::InstallingColorEyre)?;
    let cli = <crate::cli::Cli as clap::Parser>::parse();
    crate::logging::setup(cli.verbosity)?;
    let cfg = crate::config::Config::load(&cli.config).await?;

    match cli.command {
        cli::Command::Run { seed } => {
            run(cfg, seed).await?;
        }
        cli::Command::VerifyConfig => {
            tracing::info!(
                width = cfg.display.width,
                height = cfg.display.height,
                balls = cfg.effect.count,
                "Configuration verified"
            );
        }
    }

    Ok(())
}

fn setup_panic() {
    human_panic::setup_panic!(human_panic::Metadata::new(
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    ));
}

/// Blank the display, not only the frame buffer.
fn blank<W>(matrix: &mut Matrix<W>) -> Result<(), W::Error>
where
    W: smart_leds_trait::SmartLedsWrite,
    W::Color: From<smart_leds::RGB8>,
{
    embedded_graphics::draw_target::DrawTarget::clear(&mut *matrix, Rgb888::BLACK)
        .unwrap_or_else(|never| match never {});
    matrix.show()
}

async fn run(
    config: crate::config::Config,
    seed: Option<u64>,
) -> Result<(), crate::error::Error> {
    let ddp_connection = ddp_rs::connection::DDPConnection::try_new(
        format!("{}:{}", config.display.host, config.display.port),
        ddp_rs::protocol::PixelConfig::default(), // RGB, 8 bits per channel
        ddp_rs::protocol::ID::Default,
        std::net::UdpSocket::bind(format!("0.0.0.0:{}", config.display.udp_port))
            .map_err(crate::error::Error::UDPBind)?,
    )?;

    let mut matrix = Matrix::new(
        writer::DdpWriter::new(ddp_connection),
        config.display.layout,
        config.display.width,
        config.display.height,
    );
    blank(&mut matrix)?;

    let rng = match seed.or(config.effect.seed) {
        Some(seed) => {
            tracing::debug!(seed, "Using fixed seed");
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_entropy(),
    };

    let effect = BouncingBalls::new(config.effect.clone(), rng, uptime::SystemUptime::new());
    let mut runner = Runner::new(effect, config.effect.measure_loop_time);
    runner.handle(Action::Init, &mut matrix)?;
    let mut frame_interval = new_frame_interval(&runner, &config.effect);

    let (event_sender, mut event_receiver) = tokio::sync::mpsc::channel::<event::Event>(100);
    let mut events_open = true;
    let cancellation_token = tokio_util::sync::CancellationToken::new();
    let mqtt_task = match config.mqtt.clone() {
        Some(mqtt_config) => Some(tokio::task::spawn({
            let cancellation_token = cancellation_token.clone();
            async move {
                let result = mqtt::run(mqtt_config, cancellation_token, event_sender).await;
                if let Err(error) = result {
                    tracing::error!(?error, "MQTT processing failed");
                }
            }
        })),
        None => {
            tracing::debug!("No MQTT configured, remote control disabled");
            drop(event_sender);
            None
        }
    };

    let mut enabled = true;

    loop {
        tokio::select! {
            _ = frame_interval.tick(), if enabled => {
                runner.handle(Action::Loop, &mut matrix)?;
            }

            event = event_receiver.recv(), if events_open => {
                let Some(event) = event else {
                    tracing::debug!("Event channel closed");
                    events_open = false;
                    continue;
                };

                match event.event {
                    event::EventInner::TurnOn => {
                        tracing::info!("Turning on");
                        enabled = true;
                    }

                    event::EventInner::TurnOff => {
                        tracing::info!("Turning off");
                        enabled = false;
                        blank(&mut matrix)?;
                    }

                    event::EventInner::SetBrightness(brightness) => {
                        tracing::info!(
                            previous = matrix.brightness(),
                            ?brightness,
                            "Setting brightness"
                        );
                        matrix.set_brightness(brightness);
                    }

                    event::EventInner::Restart => {
                        tracing::info!("Restarting effect");
                        runner.handle(Action::Exit, &mut matrix)?;
                        runner.handle(Action::Init, &mut matrix)?;
                        frame_interval = new_frame_interval(&runner, &config.effect);
                    }
                }
            }

            result = tokio::signal::ctrl_c() => {
                result.map_err(crate::error::Error::Signal)?;
                tracing::info!("Ctrl-C received, shutting down");
                cancellation_token.cancel();
                break
            }
        }
    }

    // lets the MQTT task send its DISCONNECT before the runtime goes away
    if let Some(mqtt_task) = mqtt_task {
        if let Err(error) = mqtt_task.await {
            tracing::error!(?error, "MQTT task did not finish cleanly");
        }
    }

    runner.handle(Action::Exit, &mut matrix)?;
    blank(&mut matrix)?;

    if config.effect.measure_loop_time {
        tracing::info!(max = ?runner.max_loop_time(), "Longest loop");
    }

    Ok(())
}

fn new_frame_interval<E>(
    runner: &Runner<E>,
    effect_config: &crate::config::BouncingBallsConfig,
) -> tokio::time::Interval
where
    E: effect::Effect,
{
    let period = runner.frame_interval().unwrap_or(effect_config.timeout);
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    interval
}
