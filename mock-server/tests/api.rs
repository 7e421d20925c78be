use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, Host};
use tower::ServiceExt;

const ADMIN: &str = r#"MtWilson realm="Attestation", username="admin", nonce="n", signature="s""#;
const GUEST: &str = r#"MtWilson realm="Attestation", username="guest", nonce="n", signature="s""#;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn signed(method: &str, uri: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::AUTHORIZATION, ADMIN)
        .body(String::new())
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::AUTHORIZATION, ADMIN)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

// --- authorization ---

#[tokio::test]
async fn missing_authorization_returns_401() {
    let resp = app()
        .oneshot(Request::builder().uri("/hosts").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_user_returns_401() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/hosts")
                .header(http::header::AUTHORIZATION, r#"MtWilson username="mallory""#)
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn guest_user_returns_403() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/hosts")
                .header(http::header::AUTHORIZATION, GUEST)
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

// --- list ---

#[tokio::test]
async fn list_hosts_empty() {
    let resp = app().oneshot(signed("GET", "/hosts")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let hosts: Vec<Host> = body_json(resp).await;
    assert!(hosts.is_empty());
}

// --- create ---

#[tokio::test]
async fn create_host_returns_201() {
    let resp = app()
        .oneshot(json_request("POST", "/hosts", r#"{"name":"h1","address":"10.0.0.1"}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    let host: Host = body_json(resp).await;
    assert_eq!(host.name, "h1");
    assert_eq!(host.port, 9999);
}

#[tokio::test]
async fn create_host_with_empty_name_returns_400() {
    let resp = app()
        .oneshot(json_request("POST", "/hosts", r#"{"name":" ","address":"10.0.0.1"}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_bytes(resp).await, "host name must not be empty");
}

#[tokio::test]
async fn create_host_malformed_json_returns_422() {
    let resp = app()
        .oneshot(json_request("POST", "/hosts", r#"{"not_name":1}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// --- get / delete ---

#[tokio::test]
async fn get_host_not_found() {
    let resp = app().oneshot(signed("GET", "/hosts/nope")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_bytes(resp).await, "host nope not found");
}

#[tokio::test]
async fn delete_host_not_found() {
    let resp = app().oneshot(signed("DELETE", "/hosts/nope")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- fixed status ---

#[tokio::test]
async fn status_route_echoes_code() {
    let resp = app().oneshot(signed("GET", "/status/418")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::IM_A_TEAPOT);
    assert_eq!(body_bytes(resp).await, "status 418");
}

#[tokio::test]
async fn status_route_sends_empty_no_content() {
    let resp = app().oneshot(signed("GET", "/status/204")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());
}

#[tokio::test]
async fn status_route_rejects_informational_codes() {
    let resp = app().oneshot(signed("GET", "/status/100")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- full lifecycle ---

#[tokio::test]
async fn host_lifecycle() {
    use tower::Service;

    let mut app = app().into_service();

    // create
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request("POST", "/hosts", r#"{"name":"h1","address":"10.0.0.1","port":1443}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Host = body_json(resp).await;
    assert_eq!(created.port, 1443);

    // duplicate
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request("POST", "/hosts", r#"{"name":"h1","address":"10.0.0.2"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(body_bytes(resp).await, "host h1 is already registered");

    // second host
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request("POST", "/hosts", r#"{"name":"h2","address":"10.0.0.2"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    // list filtered by name
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(signed("GET", "/hosts?name=h2"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let hosts: Vec<Host> = body_json(resp).await;
    assert_eq!(hosts.len(), 1);
    assert_eq!(hosts[0].address, "10.0.0.2");

    // get
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(signed("GET", "/hosts/h1"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let fetched: Host = body_json(resp).await;
    assert_eq!(fetched, created);

    // delete
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(signed("DELETE", "/hosts/h1"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());

    // get after delete: 404
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(signed("GET", "/hosts/h1"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // list after delete: only h2
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(signed("GET", "/hosts"))
        .await
        .unwrap();
    let hosts: Vec<Host> = body_json(resp).await;
    assert_eq!(hosts.len(), 1);
    assert_eq!(hosts[0].name, "h2");
}
