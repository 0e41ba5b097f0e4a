use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Layer;

/// Install the global subscriber.
///
/// `RUST_LOG` wins unless verbosity flags were passed on the command line.
/// Timestamps are relative to process start, which is what matters when
/// looking at frame timing.
pub fn setup<Level>(
    verbosity: clap_verbosity_flag::Verbosity<Level>,
) -> Result<(), crate::error::Error>
where
    Level: clap_verbosity_flag::LogLevel,
{
    let level_directive =
        tracing_subscriber::filter::Directive::from(verbosity.tracing_level_filter());

    let mut env_filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(level_directive.clone())
        .from_env_lossy();

    if verbosity.is_present() {
        env_filter = env_filter.add_directive(level_directive);
    }

    let subscriber = tracing_subscriber::registry::Registry::default().with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_timer(tracing_subscriber::fmt::time::uptime())
            .with_filter(env_filter),
    );

    tracing::subscriber::set_global_default(subscriber).map_err(crate::error::Error::Logging)
}
