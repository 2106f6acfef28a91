use atl::{AppError, ErrorCode};

use crate::config::ConfigError;

/// Process exit code for an error code.
pub fn exit_code(code: ErrorCode) -> i32 {
    match code {
        ErrorCode::ConfigError => 2,
        ErrorCode::ValidationError => 3,
        ErrorCode::JiraApiError | ErrorCode::ConfluenceApiError => 4,
        ErrorCode::NetworkError => 5,
        ErrorCode::CircuitBreakerOpen => 6,
        ErrorCode::UnknownError => 1,
    }
}

fn classify(err: &anyhow::Error) -> ErrorCode {
    if let Some(app) = err.downcast_ref::<AppError>() {
        app.code
    } else if err.downcast_ref::<ConfigError>().is_some() {
        ErrorCode::ConfigError
    } else {
        ErrorCode::UnknownError
    }
}

/// Prints `err` to stderr and returns the exit code. With `debug` the
/// whole cause chain and any error context are printed as well.
pub fn report(err: &anyhow::Error, debug: bool) -> i32 {
    let code = classify(err);
    eprintln!("error[{code}]: {err}");
    log::error!("{code}: {err}");
    if debug {
        if let Some(context) = err.downcast_ref::<AppError>().and_then(|app| app.context.as_ref()) {
            eprintln!("  context: {context}");
        }
        for cause in err.chain().skip(1) {
            eprintln!("  caused by: {cause}");
        }
    }
    exit_code(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_codes() {
        let network: anyhow::Error = AppError::network("connect ECONNREFUSED").into();
        let open: anyhow::Error = AppError::circuit_open("jira", 1_000).into();
        let config: anyhow::Error = ConfigError::MissingHome.into();
        let other = anyhow::anyhow!("boom");

        assert_eq!(report(&network, false), 5);
        assert_eq!(report(&open, true), 6);
        assert_eq!(report(&config, false), 2);
        assert_eq!(report(&other, false), 1);
        assert_eq!(exit_code(ErrorCode::ConfluenceApiError), 4);
        assert_eq!(exit_code(ErrorCode::ValidationError), 3);
    }
}
