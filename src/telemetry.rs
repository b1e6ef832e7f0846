use tracing::subscriber::set_global_default;
use tracing::Subscriber;
use tracing_bunyan_formatter::BunyanFormattingLayer;
use tracing_bunyan_formatter::JsonStorageLayer;
use tracing_log::LogTracer;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Registry;

/// 'subscriber' is a `tracing` trait, and is not to be confused with a
/// subscriber of the newsletter!
/// Note: `sink` must be a closure (e.g. `std::io::stderr`), not a return value.
pub fn get_subscriber<Sink>(
    name: &str,
    filter_level: &str,
    sink: Sink,
) -> impl Subscriber + Send + Sync
where
    // higher-ranked trait bound; sink must implement `MakeWriter` for all
    // choices of the lifetime parameter `'a`. `Send + Sync` because the
    // subscriber is installed globally and logged to from timer tasks
    Sink: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    // requires feature `env-filter`; `RUST_LOG` beats the configured level
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_level));
    let fmt_layer = BunyanFormattingLayer::new(
        name.to_string(),
        // std::io::stderr in the binary, std::io::sink in quiet tests
        sink,
    );
    Registry::default()
        // filter first, so nothing below it sees disabled spans
        .with(env_filter)
        // stores span fields (controller_id, subscriber_email) for the formatter
        .with(JsonStorageLayer)
        .with(fmt_layer)
}

/// Start the logger and subscriber. This should be called once, before the
/// controller is built.
///
/// The trait bounds of `subscriber` are derived from the type signature of
/// `set_global_default`
pub fn init_subscriber(subscriber: impl Subscriber + Send + Sync) -> Result<(), anyhow::Error> {
    LogTracer::init()?; // required for `reqwest`/`hyper` logs to be captured by `Subscriber`
    set_global_default(subscriber)?;
    Ok(())
}
