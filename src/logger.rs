use std::fs::File;
use std::path::Path;

use time::{format_description::parse, OffsetDateTime};
use tracing::{subscriber::set_global_default, Level};
use tracing_subscriber::{fmt::writer::BoxMakeWriter, FmtSubscriber};

/// Will panic on error
pub fn init_logger(dir: &Path) {
    let file_name = get_log_file_name();
    let file = File::create(dir.join(file_name)).unwrap();
    let writer = BoxMakeWriter::new(file);
    let local_offset =
        time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC);
    let timer = tracing_subscriber::fmt::time::OffsetTime::new(
        local_offset,
        parse("[year]-[month]-[day] [hour]:[minute]:[second]").unwrap(),
    );

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::TRACE)
        .with_ansi(false)
        .with_timer(timer)
        .with_writer(writer)
        .finish();

    set_global_default(subscriber).expect("Could not set global default tracing subscriber. Consider disabling logs if you are already setting a subscriber.");
}

fn get_log_file_name() -> String {
    let format = parse("[year]-[month]-[day]_[hour]:[minute]:[second]_log.txt").unwrap();
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(&format).unwrap()
}
