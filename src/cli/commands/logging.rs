use clap::{builder::ValueParser, Arg, ArgMatches, Command};

pub const ARG_VERBOSITY: &str = "verbosity";
pub const ARG_LOG_FORMAT: &str = "log-format";

/// How log lines are rendered on stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    /// Read the log format from matches.
    ///
    /// # Errors
    /// Returns an error for anything other than `pretty` or `json`.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        match matches
            .get_one::<String>(ARG_LOG_FORMAT)
            .map(|value| value.trim().to_ascii_lowercase())
            .as_deref()
        {
            None | Some("" | "pretty") => Ok(Self::Pretty),
            Some("json") => Ok(Self::Json),
            Some(other) => anyhow::bail!("invalid log format: {other}"),
        }
    }
}

#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_VERBOSITY)
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("VREG_LOG_LEVEL")
                .global(true)
                .action(clap::ArgAction::Count)
                .value_parser(validator_log_level()),
        )
        .arg(
            Arg::new(ARG_LOG_FORMAT)
                .long("log-format")
                .help("Log output format: pretty or json")
                .env("VREG_LOG_FORMAT")
                .default_value("pretty")
                .value_parser(["pretty", "json"]),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_names_and_numbers() {
        let command = with_args(Command::new("test"));
        let matches = command.get_matches_from(vec!["test", "-vv"]);
        assert_eq!(matches.get_one::<u8>(ARG_VERBOSITY).copied(), Some(2));
    }

    #[test]
    fn log_format_defaults_to_pretty() -> anyhow::Result<()> {
        let command = with_args(Command::new("test"));
        let matches = command.get_matches_from(vec!["test"]);
        assert_eq!(LogFormat::parse(&matches)?, LogFormat::Pretty);

        let command = with_args(Command::new("test"));
        let matches = command.get_matches_from(vec!["test", "--log-format", "json"]);
        assert_eq!(LogFormat::parse(&matches)?, LogFormat::Json);
        Ok(())
    }
}
