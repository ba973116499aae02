use anyhow::Context;
use cadence_core::config::load_config;
use cadence_rfc::codec::ICalDate;
use cadence_rfc::ical::parse::parse;
use cadence_rfc::tz::{Moment, TimeZoneTranslator};
use cadence_service::recurrence::RecurrenceExpander;
use serde::Serialize;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// One occurrence as printed.
#[derive(Debug, Serialize)]
struct Row {
    recurrence_id: String,
    start: String,
    end: String,
    overridden: bool,
    future: bool,
}

fn moment_arg(
    text: Option<String>,
    name: &str,
    translator: &TimeZoneTranslator<'_>,
) -> anyhow::Result<Moment> {
    let text = text.with_context(|| format!("missing <{name}> argument"))?;
    let date = ICalDate::parse(&text, translator)?;
    date.moment()
        .cloned()
        .with_context(|| format!("<{name}> holds no date"))
}

fn run() -> anyhow::Result<String> {
    let settings = load_config()?;

    let filter = EnvFilter::try_new(settings.logging.level.as_str())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .init();

    let mut args = std::env::args().skip(1);
    let path = args
        .next()
        .context("usage: expand_ics <file.ics> <start> [<end>]")?;

    let translator = TimeZoneTranslator::default();
    let start = moment_arg(args.next(), "start", &translator)?;
    let expander = RecurrenceExpander::new(translator, settings.recurrence);
    let end = match args.next() {
        Some(text) => moment_arg(Some(text), "end", &translator)?,
        None => expander.horizon_end(&start)?,
    };

    let text = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    let calendar = parse(&text)?;

    let instances = expander.get_occurrences(&calendar, &start, &end, None)?;
    tracing::info!(path, occurrences = instances.len(), "Expanded calendar");

    let rows: Vec<Row> = instances
        .values()
        .map(|instance| Row {
            recurrence_id: instance.recurrence_id.to_string(),
            start: instance.start.to_string(),
            end: instance.end.to_string(),
            overridden: instance.overridden,
            future: instance.future,
        })
        .collect();
    Ok(serde_json::to_string_pretty(&rows)?)
}

fn main() {
    match run() {
        Ok(json) => {
            println!("{json}");
        }
        Err(err) => {
            eprintln!("Failed to expand calendar: {err:#}");
            std::process::exit(1);
        }
    }
}
