use colored::{ColoredString, Colorize};
use env_logger::{Builder, Env};
use std::io::Write;
use std::time::Duration;

pub fn init_logging() {
    let logging_env = Env::default().filter_or("RUST_LOG", "info");
    // Embedders and tests may install their own logger first.
    let _ = Builder::from_env(logging_env)
        .format(|buf, record| {
            let target = record.target().to_ascii_lowercase();
            let target = match record.level() {
                log::Level::Error => target.bold().red(),
                log::Level::Warn => target.bold().yellow(),
                _ => target.bold().bright_yellow(),
            };

            writeln!(
                buf,
                "{} {} {}",
                chrono::Local::now().format("%H:%M:%S").to_string().dimmed(),
                target,
                record.args()
            )
        })
        .try_init();
}

pub fn format_elapsed_time(elapsed: Duration) -> ColoredString {
    match elapsed.as_secs() {
        secs if secs >= 60 => format!("{}m{}s", secs / 60, secs % 60).red(),
        secs if secs > 2 => format!("{}s", secs).red(),
        secs if secs > 1 => format!("{}s", secs).yellow(),
        secs if secs > 0 => format!("{}s", secs).normal(),
        _ => match elapsed.as_millis() {
            millis if millis > 500 => format!("{}ms", millis).red(),
            millis if millis > 100 => format!("{}ms", millis).yellow(),
            millis if millis > 0 => format!("{}ms", millis).normal(),
            _ => format!("{}μs", elapsed.as_micros()).normal(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed_time_units() {
        colored::control::set_override(false);
        assert_eq!(
            format_elapsed_time(Duration::from_micros(40)).to_string(),
            "40μs"
        );
        assert_eq!(
            format_elapsed_time(Duration::from_millis(250)).to_string(),
            "250ms"
        );
        assert_eq!(
            format_elapsed_time(Duration::from_secs(2)).to_string(),
            "2s"
        );
        assert_eq!(
            format_elapsed_time(Duration::from_secs(3)).to_string(),
            "3s"
        );
        assert_eq!(
            format_elapsed_time(Duration::from_secs(59)).to_string(),
            "59s"
        );
        assert_eq!(
            format_elapsed_time(Duration::from_secs(125)).to_string(),
            "2m5s"
        );
    }
}
