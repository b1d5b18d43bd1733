use reqwest::StatusCode;
use tracing_test::traced_test;
use yamdb_e2e_tests::{base_url, prepare_env, spawn_server};

#[tokio::test]
#[traced_test]
async fn test_health_and_trailing_slash() {
    let (args, _config_guard) = prepare_env("test_health").await.unwrap();
    let base_url = base_url(&args).unwrap();
    let port = args.port;
    spawn_server(args).await.unwrap();

    let client = reqwest::Client::new();
    let response = client
        .get(format!("http://127.0.0.1:{port}/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "OK");

    for path in ["categories", "categories/", "genres/", "titles"] {
        let response = client
            .get(base_url.join(path).unwrap())
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "GET {path}");
    }

    let response = client
        .get(base_url.join("nothing-here/").unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client
        .get(base_url.join("titles/").unwrap())
        .header("Authorization", "Bearer not-a-token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
