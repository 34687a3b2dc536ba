//! Tests for the refresh endpoint: rotation on use, single-use records,
//! and the account checks re-run at rotation time.

mod common;

use axum::http::StatusCode;
use common::*;
use courtyard::db::{MemberRole, MemberStatus};
use futures::future::join_all;
use tower::ServiceExt;

const REFRESH: &str = "/api/sessions/refresh";
const PROBE: &str = "/api/sessions/verify";

fn refresh_request(cookies: &str) -> axum::http::Request<axum::body::Body> {
    axum::http::Request::builder()
        .method("POST")
        .uri(REFRESH)
        .header("cookie", cookies)
        .body(axum::body::Body::empty())
        .unwrap()
}

// ===== Happy path =====

#[tokio::test]
async fn test_refresh_rotates_both_tokens() {
    let (app, db, jwt) = create_test_app().await;
    let (uuid, session) =
        create_authenticated_member(&db, &jwt, "alice@example.com", MemberRole::Resident).await;

    let response = app
        .clone()
        .oneshot(refresh_request(&refresh_cookie_only(&session.refresh.token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let cookies = extract_set_cookies(&response);
    let new_access = cookie_value(&cookies, "accessToken").expect("no new access token");
    let new_refresh = cookie_value(&cookies, "refreshToken").expect("no new refresh token");
    assert_ne!(new_refresh, session.refresh.token, "refresh token must rotate");

    let body = body_json(response).await;
    assert_eq!(body["email"], "alice@example.com");

    // The rotated pair works.
    let response = app
        .oneshot(get_with_cookies(PROBE, &access_cookie_only(&new_access)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Old record burned, new one live: still exactly one session.
    let records = db.refresh_tokens().find_live(&uuid).await.unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn test_old_refresh_token_is_dead_after_rotation() {
    let (app, db, jwt) = create_test_app().await;
    let (_, session) =
        create_authenticated_member(&db, &jwt, "alice@example.com", MemberRole::Resident).await;

    let response = app
        .clone()
        .oneshot(refresh_request(&refresh_cookie_only(&session.refresh.token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The consumed token no longer renews at the gate...
    let response = app
        .clone()
        .oneshot(get_with_cookies(
            PROBE,
            &refresh_cookie_only(&session.refresh.token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // ...and cannot rotate a second time.
    let response = app
        .oneshot(refresh_request(&refresh_cookie_only(&session.refresh.token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_token_accepted_in_request_body() {
    let (app, db, jwt) = create_test_app().await;
    let (_, session) =
        create_authenticated_member(&db, &jwt, "alice@example.com", MemberRole::Resident).await;

    // No cookie header at all; the token rides in the JSON body.
    let response = app
        .oneshot(post_json(
            REFRESH,
            None,
            serde_json::json!({ "refreshToken": session.refresh.token }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookies = extract_set_cookies(&response);
    assert!(cookie_value(&cookies, "refreshToken").is_some());
}

// ===== Failure modes =====

#[tokio::test]
async fn test_refresh_without_token_is_bad_request() {
    let (app, _db, _jwt) = create_test_app().await;

    let response = app
        .oneshot(
            axum::http::Request::builder()
                .method("POST")
                .uri(REFRESH)
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "No refresh token provided");
}

#[tokio::test]
async fn test_access_token_cannot_rotate() {
    let (app, db, jwt) = create_test_app().await;
    let (_, session) =
        create_authenticated_member(&db, &jwt, "alice@example.com", MemberRole::Resident).await;

    let response = app
        .oneshot(refresh_request(&refresh_cookie_only(&session.access.token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_vanished_member_denied_like_bad_token() {
    let (app, db, jwt) = create_test_app().await;
    let (uuid, session) =
        create_authenticated_member(&db, &jwt, "alice@example.com", MemberRole::Resident).await;

    // Deleting the member cascades away the stored records, so the lookup
    // fails at the record scan rather than the member fetch. Either way the
    // caller learns nothing beyond "invalid".
    sqlx::query("DELETE FROM members WHERE uuid = ?")
        .bind(&uuid)
        .execute(db.pool())
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(refresh_request(&refresh_cookie_only(&session.refresh.token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let vanished_body = body_bytes(response).await;

    let response = app
        .oneshot(refresh_request("refreshToken=not-a-jwt"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let garbage_body = body_bytes(response).await;

    assert_eq!(vanished_body, garbage_body);
}

#[tokio::test]
async fn test_rejected_member_cannot_rotate_and_token_burns() {
    let (app, db, jwt) = create_test_app().await;
    let (uuid, session) =
        create_authenticated_member(&db, &jwt, "alice@example.com", MemberRole::Resident).await;

    db.members()
        .set_status(&uuid, MemberStatus::Rejected)
        .await
        .unwrap();

    let response = app
        .oneshot(refresh_request(&refresh_cookie_only(&session.refresh.token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // The record was consumed before the status check; the attempt cost
    // the caller their token.
    let records = db.refresh_tokens().find_live(&uuid).await.unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_deactivated_member_cannot_rotate() {
    let (app, db, jwt) = create_test_app().await;
    let (uuid, session) =
        create_authenticated_member(&db, &jwt, "alice@example.com", MemberRole::Resident).await;

    // Flip the status directly so the stored record stays live; the
    // rotation itself must refuse.
    sqlx::query("UPDATE members SET status = 'deactivated' WHERE uuid = ?")
        .bind(&uuid)
        .execute(db.pool())
        .await
        .unwrap();

    let response = app
        .oneshot(refresh_request(&refresh_cookie_only(&session.refresh.token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let records = db.refresh_tokens().find_live(&uuid).await.unwrap();
    assert!(records.is_empty(), "failed rotation must still burn the record");
}

// ===== Concurrency =====

#[tokio::test]
async fn test_concurrent_rotations_have_one_winner() {
    let (app, db, jwt) = create_test_app().await;
    let (uuid, session) =
        create_authenticated_member(&db, &jwt, "alice@example.com", MemberRole::Resident).await;

    let responses = join_all((0..2).map(|_| {
        let app = app.clone();
        let cookies = refresh_cookie_only(&session.refresh.token);
        async move { app.oneshot(refresh_request(&cookies)).await.unwrap() }
    }))
    .await;

    let mut statuses: Vec<u16> = responses.iter().map(|r| r.status().as_u16()).collect();
    statuses.sort_unstable();
    assert_eq!(statuses, vec![200, 401], "exactly one racer may win");

    // The loser burned nothing extra: the winner's replacement is the
    // only live record.
    let records = db.refresh_tokens().find_live(&uuid).await.unwrap();
    assert_eq!(records.len(), 1);
}

// ===== Role propagation =====

#[tokio::test]
async fn test_role_change_applies_at_rotation() {
    let (app, db, jwt) = create_test_app().await;
    let (uuid, session) =
        create_authenticated_member(&db, &jwt, "alice@example.com", MemberRole::Resident).await;

    db.members().set_role(&uuid, MemberRole::Admin).await.unwrap();

    // Rotation re-reads the member, so the promoted role lands in the
    // new access token.
    let response = app
        .clone()
        .oneshot(refresh_request(&refresh_cookie_only(&session.refresh.token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let new_access = cookie_value(&extract_set_cookies(&response), "accessToken").unwrap();

    let response = app
        .oneshot(get_with_cookies(
            "/api/members",
            &access_cookie_only(&new_access),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_role_change_does_not_apply_at_silent_renewal() {
    let (app, db, jwt) = create_test_app().await;
    let (uuid, session) =
        create_authenticated_member(&db, &jwt, "bob@example.com", MemberRole::Resident).await;

    db.members().set_role(&uuid, MemberRole::Admin).await.unwrap();

    // Silent renewal copies the role out of the refresh token's claims;
    // the promotion stays invisible until a rotation.
    let response = app
        .oneshot(get_with_cookies(
            "/api/members",
            &refresh_cookie_only(&session.refresh.token),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
