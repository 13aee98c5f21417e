use log::LevelFilter;
use log4rs::{
    append::{console::ConsoleAppender, file::FileAppender},
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
};

use std::path::Path;

pub fn setup_default_logging() {
    // Log only to stdout.
    let stdout = ConsoleAppender::builder().build();
    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(LevelFilter::Info))
        .unwrap();

    let _handle = log4rs::init_config(config).unwrap();
}

pub fn setup_file_logging<P: AsRef<Path>>(fp: P) {
    // Log to stdout and append to file log.
    let pat = "{d(%Y-%m-%d %H:%M:%S)} {l} {t} - {m}{n}";
    let pattern = Box::new(PatternEncoder::new(pat));

    let logfile = FileAppender::builder()
        .encoder(pattern.clone())
        .build(fp.as_ref())
        .unwrap();

    let stdout = ConsoleAppender::builder().encoder(pattern).build();

    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .appender(Appender::builder().build("file", Box::new(logfile)))
        .build(
            Root::builder()
                .appender("file")
                .appender("stdout")
                .build(LevelFilter::Debug),
        )
        .unwrap();

    let _handle = log4rs::init_config(config).unwrap();
    log::debug!("Logging to {}", fp.as_ref().to_string_lossy());
}
