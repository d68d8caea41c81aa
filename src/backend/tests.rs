use std::time::Duration;

use serde_json::json;

use super::*;

fn test_config() -> Config {
    Config {
        api_football_key: "football key".to_owned(),
        api_football_base_url: "https://v3.football.api-sports.io".to_owned(),
        supabase_url: "https://project.supabase.co/".to_owned(),
        supabase_key: "supabase key".to_owned(),
        requests_per_minute: 30,
        requests_per_day: 100,
        cache_ttl_fixtures: Duration::from_secs(300),
        cache_ttl_leagues: Duration::from_secs(86_400),
        cache_ttl_teams: Duration::from_secs(86_400),
        cache_ttl_standings: Duration::from_secs(3_600),
        cache_ttl_players: Duration::from_secs(86_400),
        cache_max_entries: 128,
        retry_max_attempts: 3,
        retry_initial_delay: Duration::from_secs(1),
        retry_backoff_multiplier: 2.0,
        request_timeout: Duration::from_secs(15),
    }
}

#[test]
fn test_urls_strip_trailing_slash() {
    let store = SupabaseStore::new(&test_config()).unwrap();

    assert_eq!(store.table_url("users"), "https://project.supabase.co/rest/v1/users");
    assert_eq!(
        store.rpc_url("deduct_point"),
        "https://project.supabase.co/rest/v1/rpc/deduct_point"
    );
}

#[test]
fn test_rows_decodes_array_and_single_object() {
    let array = json!([{ "referrer_id": 1, "referred_id": 2 }]);
    let decoded: Vec<ReferralRecord> = rows("referrals_of", array).unwrap();
    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].referrer_id, 1);

    // Stored procedures returning a single record answer with a bare object.
    let single = json!({ "referrer_id": 3, "referred_id": 4 });
    let decoded: Vec<ReferralRecord> = rows("referrals_of", single).unwrap();
    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].referred_id, 4);

    let empty: Vec<ReferralRecord> = rows("referrals_of", Value::Null).unwrap();
    assert!(empty.is_empty());
}

#[test]
fn test_rows_rejects_wrong_shape() {
    let result: Result<Vec<ReferralRecord>> = rows("referrals_of", json!([{ "referrer_id": "x" }]));
    assert!(matches!(result, Err(BackendError::Decode { target: "referrals_of", .. })));
}

#[test]
fn test_deduct_point_row_maps_to_deduction() {
    let body = json!([{
        "success": true,
        "points_type": "premium",
        "remaining_free": 2,
        "remaining_premium": 7,
        "show_warning": false
    }]);

    let decoded: Vec<DeductPointRow> = rows("deduct_point", body).unwrap();
    let deduction: PointsDeduction = decoded.into_iter().next().unwrap().into();

    assert!(deduction.allowed);
    assert_eq!(deduction.points_type, PointsType::Premium);
    assert_eq!(deduction.free_remaining, 2);
    assert_eq!(deduction.premium_remaining, 7);
    assert!(!deduction.show_warning);
}

#[test]
fn test_empty_deduction_result_means_denied() {
    let decoded: Vec<DeductPointRow> = rows("deduct_point", json!([])).unwrap();
    let deduction =
        decoded.into_iter().next().map_or_else(PointsDeduction::denied, PointsDeduction::from);

    assert!(!deduction.allowed);
    assert_eq!(deduction.points_type, PointsType::None);
}

#[test]
fn test_referral_row_maps_to_outcome() {
    let body = json!({
        "success": true,
        "referrer_id": 42,
        "new_user_points": 3,
        "referrer_points": 1
    });

    let decoded: Vec<ProcessReferralRow> = rows("process_referral", body).unwrap();
    let outcome: ReferralOutcome = decoded.into_iter().next().unwrap().into();

    assert!(outcome.success);
    assert_eq!(outcome.referrer_id, Some(42));
    assert_eq!(outcome.referrer_points, Some(1));
}

#[test]
fn test_rejected_referral_defaults_to_failed() {
    let decoded: Vec<ProcessReferralRow> = rows("process_referral", json!([])).unwrap();
    let outcome =
        decoded.into_iter().next().map_or_else(ReferralOutcome::failed, ReferralOutcome::from);

    assert!(!outcome.success);
    assert_eq!(outcome.referrer_id, None);
}

#[test]
fn test_points_type_serializes_lowercase() {
    assert_eq!(serde_json::to_value(PointsType::Free).unwrap(), json!("free"));
    assert_eq!(serde_json::to_value(PointsType::Premium).unwrap(), json!("premium"));
    assert_eq!(serde_json::to_value(PointsType::None).unwrap(), json!("none"));

    let parsed: PointsType = serde_json::from_value(json!("premium")).unwrap();
    assert_eq!(parsed, PointsType::Premium);
}

#[test]
fn test_new_user_skips_absent_fields() {
    let user = NewUser { telegram_id: 100, username: Some("someone".to_owned()), ..Default::default() };

    let serialized = serde_json::to_value(&user).unwrap();

    assert_eq!(serialized, json!({ "telegram_id": 100, "username": "someone" }));
}

#[test]
fn test_user_changes_serialize_only_present_fields() {
    let changes = UserChanges { free_points: Some(4), ..Default::default() };
    assert_eq!(serde_json::to_value(&changes).unwrap(), json!({ "free_points": 4 }));

    let empty = UserChanges::default();
    assert_eq!(serde_json::to_value(&empty).unwrap(), json!({}));
}

#[test]
fn test_retryable_classification() {
    assert!(BackendError::Server { target: "select", status: 502 }.is_retryable());
    assert!(BackendError::Timeout { target: "select" }.is_retryable());
    assert!(
        BackendError::Transport { target: "select", message: "reset".to_owned() }.is_retryable()
    );

    assert!(!BackendError::Authentication.is_retryable());
    assert!(
        !BackendError::Rejected { target: "insert", status: 409, body: "conflict".to_owned() }
            .is_retryable()
    );
    assert!(!BackendError::EmptyResult { target: "insert" }.is_retryable());
}

#[test]
fn test_user_record_parses_backend_row() {
    let row = json!({
        "id": 7,
        "telegram_id": 100,
        "username": "someone",
        "first_name": "Some",
        "language": "en",
        "free_points": 5,
        "premium_points": 2,
        "referral_code": "REF123",
        "created_at": "2024-01-20T15:00:00+00:00"
    });

    let user: UserRecord = serde_json::from_value(row).unwrap();

    assert_eq!(user.telegram_id, 100);
    assert_eq!(user.free_points, 5);
    assert_eq!(user.referral_code.as_deref(), Some("REF123"));
    assert!(user.created_at.is_some());
}
