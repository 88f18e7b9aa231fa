//! Shared helpers for Graph service tests.

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dirgate_graph::{CloudEnvironment, GraphAuth, GraphConfig, GraphDirectory};

pub const TENANT: &str = "test-tenant";

/// Mount the token endpoint answering every client-credentials request.
pub async fn mount_token_endpoint(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(format!("/{TENANT}/oauth2/v2.0/token")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "test-access-token",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .mount(server)
        .await;
}

/// Build a service whose graph and login endpoints both point at the mock.
pub fn service_for(server: &MockServer) -> GraphDirectory {
    let config = GraphConfig::new(TENANT).with_cloud(CloudEnvironment::Custom {
        graph_endpoint: server.uri(),
        login_endpoint: server.uri(),
    });
    GraphDirectory::new(config, GraphAuth::client_secret("test-client", "test-secret")).unwrap()
}

/// A minimal Graph user object.
pub fn user_json(id: &str, nickname: &str) -> Value {
    json!({
        "id": id,
        "userPrincipalName": format!("{nickname}@contoso.com"),
        "mailNickname": nickname,
        "displayName": format!("User {nickname}"),
        "accountEnabled": true
    })
}

/// An OData collection page.
pub fn odata_page(items: Vec<Value>, next_link: Option<String>, count: Option<u64>) -> Value {
    let mut page = json!({ "value": items });
    if let Some(next) = next_link {
        page["@odata.nextLink"] = json!(next);
    }
    if let Some(count) = count {
        page["@odata.count"] = json!(count);
    }
    page
}
