//! Tests for error construction and serialisation.

use super::*;
use rstest::rstest;
use serde_json::json;

#[rstest]
#[case(Error::invalid_request("bad"), ErrorCode::InvalidRequest)]
#[case(Error::forbidden("not yours"), ErrorCode::Forbidden)]
#[case(Error::not_found("gone"), ErrorCode::NotFound)]
#[case(Error::conflict("taken"), ErrorCode::Conflict)]
#[case(Error::service_unavailable("down"), ErrorCode::ServiceUnavailable)]
#[case(Error::internal("boom"), ErrorCode::InternalError)]
fn constructors_set_code(#[case] err: Error, #[case] code: ErrorCode) {
    assert_eq!(err.code(), code);
}

#[rstest]
fn try_new_rejects_empty_messages() {
    let result = Error::try_new(ErrorCode::InvalidRequest, "   ");
    assert!(matches!(result, Err(ErrorValidationError::EmptyMessage)));
}

#[rstest]
fn blank_message_falls_back_to_code_description() {
    let err = Error::new(ErrorCode::ServiceUnavailable, "");
    assert_eq!(err.message(), "service unavailable");
}

#[rstest]
fn serialises_code_in_snake_case_and_skips_missing_details() {
    let value = serde_json::to_value(Error::not_found("link 7 not found"))
        .expect("error serialises");
    assert_eq!(value, json!({"code": "not_found", "message": "link 7 not found"}));
}

#[rstest]
fn details_survive_a_round_trip() {
    let err = Error::conflict("duplicate").with_details(json!({"linkId": 3}));
    let raw = serde_json::to_string(&err).expect("error serialises");
    let decoded: Error = serde_json::from_str(&raw).expect("error deserialises");
    assert_eq!(decoded, err);
    assert_eq!(decoded.details(), Some(&json!({"linkId": 3})));
}

#[rstest]
fn display_shows_message() {
    assert_eq!(Error::forbidden("only owners").to_string(), "only owners");
}
