use tracing::{ level_filters::LevelFilter, Subscriber };
use tracing_subscriber::fmt;

pub fn verbosity_to_level_filter(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

pub fn setup_logger(level: LevelFilter, use_json: bool) -> Box<dyn Subscriber + Send + Sync> {
    if use_json {
        Box::new(fmt().json().with_max_level(level).finish())
    } else {
        Box::new(fmt().with_max_level(level).finish())
    }
}
