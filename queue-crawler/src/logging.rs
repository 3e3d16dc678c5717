//! Logging configuration. Grounded on `bin-resolved/src/main.rs`'s
//! `begin_logging`: an optional `RUST_LOG_FORMAT` environment variable
//! (comma-separated tokens) selects the formatter, layered over
//! `EnvFilter::from_default_env()` for level control via `RUST_LOG`.

pub fn begin_logging() {
    let format = std::env::var("RUST_LOG_FORMAT").unwrap_or_default();
    let tokens: Vec<&str> = format.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
    let no_time = tokens.contains(&"no-time");

    let builder = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_ansi(!tokens.contains(&"no-ansi"));

    if tokens.contains(&"json") {
        let builder = builder.json();
        if no_time {
            builder.without_time().init();
        } else {
            builder.init();
        }
    } else if tokens.contains(&"pretty") {
        let builder = builder.pretty();
        if no_time {
            builder.without_time().init();
        } else {
            builder.init();
        }
    } else if tokens.contains(&"compact") {
        let builder = builder.compact();
        if no_time {
            builder.without_time().init();
        } else {
            builder.init();
        }
    } else if no_time {
        builder.without_time().init();
    } else {
        builder.init();
    }
}
