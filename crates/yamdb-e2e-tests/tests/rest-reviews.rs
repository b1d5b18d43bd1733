use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::info;
use tracing_test::traced_test;
use yamdb_e2e_tests::{auth, base_url, logged_user, prepare_env, spawn_server};
use yamdb_types::claim::Role;

#[tokio::test]
#[traced_test]
async fn test_reviews_and_comments() {
    let (args, _config_guard) = prepare_env("test_reviews").await.unwrap();
    let base_url = base_url(&args).unwrap();
    spawn_server(args.clone()).await.unwrap();
    let (_admin, admin_token) = logged_user(&args, "admin", Role::Admin).await.unwrap();
    let (_ivan, ivan_token) = logged_user(&args, "ivan", Role::User).await.unwrap();
    let (_petr, petr_token) = logged_user(&args, "petr", Role::User).await.unwrap();
    let (_moderator, moderator_token) = logged_user(&args, "mod", Role::Moderator).await.unwrap();
    let client = Client::new();

    let response = client
        .post(base_url.join("titles").unwrap())
        .header("Authorization", auth(&admin_token))
        .json(&json!({"name": "Solaris", "year": 1972}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let title: Value = response.json().await.unwrap();
    let title_id = title["id"].as_i64().unwrap();
    let reviews_url = base_url.join(&format!("titles/{title_id}/reviews/")).unwrap();

    let response = client
        .post(reviews_url.clone())
        .json(&json!({"text": "Great", "score": 8}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = client
        .post(reviews_url.clone())
        .header("Authorization", auth(&ivan_token))
        .json(&json!({"text": "Great", "score": 11}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client
        .post(reviews_url.clone())
        .header("Authorization", auth(&ivan_token))
        .json(&json!({"text": "Great", "score": 8}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let review: Value = response.json().await.unwrap();
    info!("Review: {review:#?}");
    assert_eq!(review["author"], "ivan");
    assert_eq!(review["score"], 8);
    assert!(review["pub_date"].is_string());
    let ivan_review_id = review["id"].as_i64().unwrap();

    let response = client
        .post(reviews_url.clone())
        .header("Authorization", auth(&ivan_token))
        .json(&json!({"text": "Changed my mind", "score": 2}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client
        .post(reviews_url.clone())
        .header("Authorization", auth(&petr_token))
        .json(&json!({"text": "Fine", "score": 6}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let review: Value = response.json().await.unwrap();
    let petr_review_id = review["id"].as_i64().unwrap();

    let title: Value = client
        .get(base_url.join(&format!("titles/{title_id}")).unwrap())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(title["rating"].as_f64(), Some(7.0));

    let page: Value = client
        .get(reviews_url.clone())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["total"], 2);

    let petr_review_url = reviews_url.join(&petr_review_id.to_string()).unwrap();
    let ivan_review_url = reviews_url.join(&ivan_review_id.to_string()).unwrap();

    // other user cannot touch the review
    let response = client
        .delete(petr_review_url.clone())
        .header("Authorization", auth(&ivan_token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let response = client
        .patch(petr_review_url.clone())
        .header("Authorization", auth(&ivan_token))
        .json(&json!({"score": 1}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // moderator can
    let response = client
        .patch(petr_review_url.clone())
        .header("Authorization", auth(&moderator_token))
        .json(&json!({"text": "Moderated"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let review: Value = response.json().await.unwrap();
    assert_eq!(review["text"], "Moderated");
    assert_eq!(review["author"], "petr");
    assert_eq!(review["score"], 6);

    let comments_url = base_url
        .join(&format!("titles/{title_id}/reviews/{petr_review_id}/comments/"))
        .unwrap();
    let response = client
        .post(comments_url.clone())
        .header("Authorization", auth(&ivan_token))
        .json(&json!({"text": "I disagree"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let comment: Value = response.json().await.unwrap();
    assert_eq!(comment["author"], "ivan");
    let comment_url = comments_url
        .join(&comment["id"].as_i64().unwrap().to_string())
        .unwrap();

    let response = client
        .patch(comment_url.clone())
        .header("Authorization", auth(&petr_token))
        .json(&json!({"text": "Hijacked"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = client
        .patch(comment_url.clone())
        .header("Authorization", auth(&ivan_token))
        .json(&json!({"text": "I partly disagree"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // comment must belong to review of the title
    let response = client
        .get(
            base_url
                .join(&format!("titles/{title_id}/reviews/{ivan_review_id}/comments/"))
                .unwrap(),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let page: Value = response.json().await.unwrap();
    assert_eq!(page["total"], 0);

    let response = client
        .get(
            base_url
                .join(&format!("titles/999999/reviews/{petr_review_id}/comments/"))
                .unwrap(),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // author deletes own review
    let response = client
        .delete(ivan_review_url.clone())
        .header("Authorization", auth(&ivan_token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // title deletion removes reviews and comments
    let response = client
        .delete(base_url.join(&format!("titles/{title_id}")).unwrap())
        .header("Authorization", auth(&admin_token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = client.get(petr_review_url).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = client.get(comment_url).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
