use axum::{http::StatusCode, response::IntoResponse};
use chrono::Utc;
use coursehub::{
    error::{ServiceError, ServiceResponse},
    models::{MatchPair, Notification, QuestionType, Role, UploadPurpose, UserAnswer},
};
use serde_json::{Value, json};
use uuid::Uuid;

#[test]
fn test_user_answer_is_tagged_by_kind() {
    let option_id = Uuid::new_v4();
    let choice = UserAnswer::Choice { option_ids: vec![option_id] };
    assert_eq!(
        serde_json::to_value(&choice).unwrap(),
        json!({ "kind": "choice", "option_ids": [option_id] })
    );

    let matching: UserAnswer = serde_json::from_value(json!({
        "kind": "matching",
        "pairs": [{ "option_id": option_id, "value": "dog" }]
    }))
    .unwrap();
    assert_eq!(
        matching,
        UserAnswer::Matching { pairs: vec![MatchPair { option_id, value: "dog".into() }] }
    );

    let text: UserAnswer = serde_json::from_value(json!({ "kind": "text", "text": "xin chào" })).unwrap();
    assert_eq!(text, UserAnswer::Text { text: "xin chào".into() });

    assert!(serde_json::from_value::<UserAnswer>(json!({ "kind": "essay", "text": "?" })).is_err());
}

#[test]
fn test_enums_use_wire_names() {
    assert_eq!(serde_json::to_value(QuestionType::FillInBlank).unwrap(), "fill_in_blank");
    assert_eq!(serde_json::to_value(Role::Teacher).unwrap(), "teacher");
    assert_eq!(serde_json::to_value(UploadPurpose::CourseCover).unwrap(), "course-cover");
    assert_eq!(
        serde_json::from_value::<QuestionType>(json!("multiple_answers")).unwrap(),
        QuestionType::MultipleAnswers
    );
}

#[test]
fn test_notification_kind_serializes_as_type() {
    let notification = Notification {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        kind: "payment_paid".into(),
        message: "Payment received".into(),
        is_read: false,
        created_at: Utc::now(),
    };
    let json = serde_json::to_value(&notification).unwrap();
    assert_eq!(json["type"], "payment_paid");
    assert!(json.get("kind").is_none());
}

async fn envelope(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_service_response_envelope() {
    let (status, body) = envelope(ServiceResponse::created(json!({ "id": 1 })).message("Course created").into_response()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        body,
        json!({ "success": true, "message": "Course created", "status_code": 201, "data": { "id": 1 } })
    );
}

#[tokio::test]
async fn test_service_errors_map_to_status_codes() {
    let cases = [
        (ServiceError::BadRequest("bad".into()), StatusCode::BAD_REQUEST),
        (ServiceError::Unauthorized("who".into()), StatusCode::UNAUTHORIZED),
        (ServiceError::forbidden(), StatusCode::FORBIDDEN),
        (ServiceError::not_found("Course"), StatusCode::NOT_FOUND),
        (ServiceError::Conflict("again".into()), StatusCode::CONFLICT),
        (ServiceError::PaymentRequired("pay".into()), StatusCode::PAYMENT_REQUIRED),
        (ServiceError::Gateway("down".into()), StatusCode::BAD_GATEWAY),
        (ServiceError::Internal("secret".into()), StatusCode::INTERNAL_SERVER_ERROR),
    ];

    for (error, expected) in cases {
        let (status, body) = envelope(error.into_response()).await;
        assert_eq!(status, expected);
        assert_eq!(body["status_code"], expected.as_u16());
        assert_eq!(body["success"], false);
        assert!(body["data"].is_null());
    }

    let (_, body) = envelope(ServiceError::not_found("Course").into_response()).await;
    assert_eq!(body["message"], "Course not found");
    let (_, body) = envelope(ServiceError::Internal("db password leaked".into()).into_response()).await;
    assert_eq!(body["message"], "Internal server error");
}
