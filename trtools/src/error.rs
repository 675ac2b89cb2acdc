//! Error type for the command-line tools.

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Missing or unusable command-line input.
    #[error("{0}")]
    Usage(String),

    /// Failure reading the second input of a two-input tool.
    #[error("{0}")]
    SecondInput(String),

    /// Flags clap rejected.
    #[error(transparent)]
    Args(#[from] clap::Error),

    #[error(transparent)]
    Tranger(#[from] tranger::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn usage(message: impl Into<String>) -> Self {
        CliError::Usage(message.into())
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::SecondInput(_) => -2,
            _ => -1,
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::usage("What Topic?").exit_code(), -1);
        assert_eq!(CliError::SecondInput("bad".into()).exit_code(), -2);
        let err: CliError = tranger::Error::InvalidFilter("x".into()).into();
        assert_eq!(err.exit_code(), -1);
        assert_eq!(err.to_string(), "Invalid filter: x");
    }

    #[test]
    fn test_rejected_flags_are_usage_errors() {
        use clap::Parser;

        #[derive(Parser, Debug)]
        struct TestCli {
            #[command(flatten)]
            content: crate::args::ContentSearchArgs,
            #[command(flatten)]
            matching: crate::args::MatchArgs,
        }

        for args in [
            ["test", "--search-content-filter", "gzip"],
            ["test", "--from-t", "yesterday"],
            ["test", "--user-flag-set", "0xZZ"],
        ] {
            let err = CliError::from(TestCli::try_parse_from(args).unwrap_err());
            assert_eq!(err.exit_code(), -1);
        }
    }
}
