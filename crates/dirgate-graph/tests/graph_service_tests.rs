//! Graph service tests against a mocked Graph API.

mod common;

use common::*;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dirgate_core::criteria::UserCriteria;
use dirgate_core::error::DirectoryError;
use dirgate_core::service::{AuthRequest, AuthenticationOutcome, DirectoryService, OperationStatus};

#[tokio::test]
async fn test_find_user_maps_fields() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users/u-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "u-1",
            "userPrincipalName": "jdoe@contoso.com",
            "mailNickname": "jdoe",
            "displayName": "John Doe",
            "department": "Engineering",
            "accountEnabled": true
        })))
        .mount(&server)
        .await;

    let service = service_for(&server);
    let user = service
        .find_user("u-1", &CancellationToken::new())
        .await
        .unwrap()
        .expect("user should exist");

    assert_eq!(user.external_id, "u-1");
    assert_eq!(user.username, "jdoe");
    assert_eq!(user.display_name, "John Doe");
    assert_eq!(user.department.as_deref(), Some("Engineering"));
    assert_eq!(user.enabled, Some(true));
}

#[tokio::test]
async fn test_find_user_missing_is_none_not_error() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users/ghost"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {
                "code": "Request_ResourceNotFound",
                "message": "Resource 'ghost' does not exist."
            }
        })))
        .mount(&server)
        .await;

    let service = service_for(&server);
    let user = service
        .find_user("ghost", &CancellationToken::new())
        .await
        .unwrap();
    assert!(user.is_none());
}

#[tokio::test]
async fn test_search_sends_compiled_filter() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .and(query_param(
            "$filter",
            "(mailNickname eq 'jdoe' or userPrincipalName eq 'jdoe')",
        ))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(odata_page(vec![user_json("u-1", "jdoe")], None, None)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let service = service_for(&server);
    let users = service
        .search_users(
            &UserCriteria::new().with_username("jdoe"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(users.len(), 1);
    assert_eq!(users[0].username, "jdoe");
}

#[tokio::test]
async fn test_search_requests_backend_batch_cap() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .and(query_param("$top", "999"))
        .respond_with(ResponseTemplate::new(200).set_body_json(odata_page(vec![], None, None)))
        .expect(1)
        .mount(&server)
        .await;

    let service = service_for(&server);
    let users = service
        .search_users(&UserCriteria::new(), &CancellationToken::new())
        .await
        .unwrap();
    assert!(users.is_empty());
}

#[tokio::test]
async fn test_graph_fault_is_wrapped_operation_error() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": { "code": "InternalServerError", "message": "boom" }
        })))
        .mount(&server)
        .await;

    let service = service_for(&server);
    let err = service
        .search_users(&UserCriteria::new(), &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        DirectoryError::OperationFailed { source, .. } => {
            let cause = source.expect("cause should be attached").to_string();
            assert!(cause.contains("InternalServerError"));
        }
        other => panic!("expected OperationFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_throttled_request_is_retried() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("Retry-After", "0")
                .set_body_json(json!({
                    "error": { "code": "TooManyRequests", "message": "throttled" }
                })),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(odata_page(vec![user_json("u-1", "jdoe")], None, None)),
        )
        .mount(&server)
        .await;

    let service = service_for(&server);
    let users = service
        .search_users(&UserCriteria::new(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(users.len(), 1);
}

#[tokio::test]
async fn test_members_of_uses_typed_member_endpoint() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/groups/g-1/members/microsoft.graph.user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(odata_page(
            vec![user_json("u-1", "jdoe"), user_json("u-2", "asmith")],
            None,
            None,
        )))
        .mount(&server)
        .await;

    let service = service_for(&server);
    let members = service
        .members_of("g-1", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(members.len(), 2);
    assert_eq!(members[1].username, "asmith");
}

#[tokio::test]
async fn test_add_member_posts_odata_ref() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("POST"))
        .and(path("/v1.0/groups/g-1/members/$ref"))
        .and(body_partial_json(json!({
            "@odata.id": format!("{}/v1.0/directoryObjects/u-1", server.uri())
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let service = service_for(&server);
    let status = service
        .add_group_member("g-1", "u-1", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(status, OperationStatus::Completed);
}

#[tokio::test]
async fn test_remove_member_deletes_ref() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("DELETE"))
        .and(path("/v1.0/groups/g-1/members/u-1/$ref"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let service = service_for(&server);
    let status = service
        .remove_group_member("g-1", "u-1", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(status, OperationStatus::Completed);
}

#[tokio::test]
async fn test_set_password_patches_password_profile() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("PATCH"))
        .and(path("/v1.0/users/u-1"))
        .and(body_partial_json(json!({
            "passwordProfile": { "password": "N3w-Passw0rd" }
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let service = service_for(&server);
    let status = service
        .set_password("u-1", "N3w-Passw0rd", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(status, OperationStatus::Completed);
}

#[tokio::test]
async fn test_disable_account_patches_account_enabled() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("PATCH"))
        .and(path("/v1.0/users/u-1"))
        .and(body_partial_json(json!({ "accountEnabled": false })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let service = service_for(&server);
    let status = service
        .set_account_enabled("u-1", false, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(status, OperationStatus::Completed);
}

#[tokio::test]
async fn test_change_password_is_typed_not_supported() {
    let server = MockServer::start().await;
    let service = service_for(&server);

    let status = service
        .change_password("u-1", "old", "new", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(status, OperationStatus::NotSupported);
}

#[tokio::test]
async fn test_authenticate_client_secret_success() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    let service = service_for(&server);
    let outcome = service
        .authenticate(&AuthRequest::ClientSecret, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        AuthenticationOutcome::Success {
            principal: Some("test-client".to_string())
        }
    );
}

#[tokio::test]
async fn test_authenticate_bad_secret_is_invalid_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/{TENANT}/oauth2/v2.0/token")))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "AADSTS7000215: Invalid client secret provided."
        })))
        .mount(&server)
        .await;

    let service = service_for(&server);
    let outcome = service
        .authenticate(&AuthRequest::ClientSecret, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome, AuthenticationOutcome::InvalidCredentials);
}

#[tokio::test]
async fn test_interactive_modes_are_typed_not_supported() {
    let server = MockServer::start().await;
    let service = service_for(&server);
    let cancel = CancellationToken::new();

    for request in [
        AuthRequest::DeviceCode,
        AuthRequest::InteractiveBrowser,
        AuthRequest::Anonymous,
        AuthRequest::SaslGssapi,
    ] {
        let outcome = service.authenticate(&request, &cancel).await.unwrap();
        assert_eq!(
            outcome,
            AuthenticationOutcome::NotSupported {
                method: request.method_name()
            }
        );
    }
}

#[tokio::test]
async fn test_validate_credentials_is_not_supported_error() {
    let server = MockServer::start().await;
    let service = service_for(&server);

    let err = service
        .validate_credentials("jdoe", "pw", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DirectoryError::NotSupported { .. }));
}

#[tokio::test]
async fn test_cancelled_token_short_circuits_without_request() {
    let server = MockServer::start().await;
    let service = service_for(&server);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = service
        .search_users(&UserCriteria::new(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, DirectoryError::Cancelled));

    // No token or search request reached the mock.
    assert!(server.received_requests().await.unwrap().is_empty());
}
