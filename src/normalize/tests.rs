use rstest::rstest;
use serde_json::json;

use super::*;

fn http(status: u16, data: Value) -> ProviderError {
    ProviderError::Http {
        message: format!("Request failed with status code {status}"),
        status,
        status_text: None,
        data: Some(data),
    }
}

#[test]
fn jira_error_joins_messages_and_field_errors() {
    let err = normalize_jira_error(http(
        400,
        json!({
            "errorMessages": ["Issue type is required"],
            "errors": { "customfield_10100": "Field cannot be set" }
        }),
    ));

    assert_eq!(err.code, ErrorCode::JiraApiError);
    assert_eq!(err.status_code, Some(400));
    assert_eq!(
        err.message,
        "Issue type is required; customfield_10100: Field cannot be set"
    );
    let context = err.context.as_ref().unwrap();
    assert_eq!(
        context["errors"]["customfield_10100"],
        "Field cannot be set"
    );
    assert!(err.cause().is_some());
}

#[test]
fn jira_error_falls_back_to_raw_message() {
    let err = normalize_jira_error(http(500, json!("<html>oops</html>")));
    assert_eq!(err.message, "Request failed with status code 500");
    assert!(err.context.is_none());
}

#[test]
fn confluence_error_prefers_message_then_reason() {
    let with_message = normalize_confluence_error(http(
        404,
        json!({ "message": "No content found", "reason": "Not Found" }),
    ));
    assert_eq!(with_message.code, ErrorCode::ConfluenceApiError);
    assert_eq!(with_message.message, "No content found");

    let with_reason = normalize_confluence_error(http(403, json!({ "reason": "Forbidden" })));
    assert_eq!(with_reason.message, "Forbidden");

    let empty_message = normalize_confluence_error(http(
        404,
        json!({ "message": "", "reason": "Not Found" }),
    ));
    assert_eq!(empty_message.message, "Not Found");

    let bare = normalize_confluence_error(http(502, json!({})));
    assert_eq!(bare.message, "Request failed with status code 502");
    assert_eq!(bare.status_code, Some(502));
}

#[test]
fn normalization_passes_app_errors_through() {
    let original = AppError::validation("summary is required");
    let err = normalize_jira_error(ProviderError::from(original));
    assert_eq!(err.code, ErrorCode::ValidationError);
    assert_eq!(err.message, "summary is required");

    let again = normalize_confluence_error(ProviderError::from(err));
    assert_eq!(again.code, ErrorCode::ValidationError);
}

#[test]
fn non_http_shapes_are_classified() {
    let network = normalize_jira_error(ProviderError::Network {
        code: Some("ECONNRESET".to_string()),
        message: "read ECONNRESET".to_string(),
    });
    assert_eq!(network.code, ErrorCode::NetworkError);
    assert!(network.message.contains("ECONNRESET"));

    let unknown = normalize_confluence_error(ProviderError::Generic("weird".to_string()));
    assert_eq!(unknown.code, ErrorCode::UnknownError);
    assert_eq!(unknown.message, "weird");
}

#[test]
fn decode_prefers_response_status() {
    let raw = json!({
        "message": "Request failed",
        "status": 500,
        "response": { "status": 429, "statusText": "Too Many Requests", "data": { "x": 1 } }
    });
    match ProviderError::decode(&raw) {
        ProviderError::Http {
            status,
            status_text,
            data,
            message,
        } => {
            assert_eq!(status, 429);
            assert_eq!(status_text.as_deref(), Some("Too Many Requests"));
            assert_eq!(data, Some(json!({ "x": 1 })));
            assert_eq!(message, "Request failed");
        }
        other => panic!("expected http shape, got {other:?}"),
    }
}

#[test]
fn decode_recognises_network_and_generic_shapes() {
    let network = ProviderError::decode(&json!({ "code": "ENOTFOUND", "message": "getaddrinfo" }));
    assert!(matches!(
        network,
        ProviderError::Network { code: Some(ref c), .. } if c == "ENOTFOUND"
    ));

    let top_level = ProviderError::decode(&json!({ "status": 401, "message": "nope" }));
    assert_eq!(top_level.status(), Some(401));

    let generic = ProviderError::decode(&json!({ "unexpected": true }));
    assert!(matches!(generic, ProviderError::Generic(ref m) if m.contains("unexpected")));

    let text = ProviderError::decode(&json!("plain failure"));
    assert!(matches!(text, ProviderError::Generic(ref m) if m == "plain failure"));
}

#[rstest]
#[case::reset(Some("ECONNRESET"), "read failed", true)]
#[case::refused(Some("ECONNREFUSED"), "connect failed", true)]
#[case::timeout(Some("ETIMEDOUT"), "timed out", true)]
#[case::dns(Some("ENOTFOUND"), "lookup failed", true)]
#[case::dns_again(Some("EAI_AGAIN"), "lookup failed", true)]
#[case::hang_up(None, "socket hang up", true)]
#[case::message(None, "Network Error", true)]
#[case::other_code(Some("EPIPE"), "broken pipe", false)]
fn network_failures_are_retryable(
    #[case] code: Option<&str>,
    #[case] message: &str,
    #[case] expected: bool,
) {
    let err = ProviderError::Network {
        code: code.map(str::to_string),
        message: message.to_string(),
    };
    assert_eq!(is_retryable_error(&err), expected);
}

#[rstest]
#[case(429, true)]
#[case(502, true)]
#[case(503, true)]
#[case(504, true)]
#[case(500, false)]
#[case(400, false)]
#[case(401, false)]
#[case(404, false)]
fn http_statuses_are_retryable(#[case] status: u16, #[case] expected: bool) {
    assert_eq!(is_retryable_error(&http(status, json!({}))), expected);
}

#[test]
fn service_failures_exclude_client_errors() {
    assert!(is_service_failure(&http(500, json!({}))));
    assert!(is_service_failure(&http(429, json!({}))));
    assert!(!is_service_failure(&http(404, json!({}))));
    assert!(!is_service_failure(&ProviderError::from(AppError::jira_api(
        "login page",
        Some(401)
    ))));
    assert!(is_service_failure(&ProviderError::Network {
        code: None,
        message: "reset".to_string(),
    }));
}

#[test]
fn provider_retry_predicates_use_status_sets() {
    assert!(is_retryable_jira_error(&AppError::jira_api("busy", Some(503))));
    assert!(!is_retryable_jira_error(&AppError::jira_api("bad", Some(400))));
    assert!(is_retryable_confluence_error(&AppError::confluence_api(
        "slow down",
        Some(429)
    )));
    assert!(is_retryable_confluence_error(&AppError::network("reset")));
    assert!(!is_retryable_confluence_error(&AppError::unknown("?")));
}
