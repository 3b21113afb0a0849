mod common;

use blogcms::{AppConfig, PageWrapper, PostResponse};
use common::{ids, TestServer};
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn seed_django_posts(server: &TestServer) -> Vec<i64> {
    let (_, alice) = server.user("alice").await;
    let (_, fan) = server.user("DjangoFan").await;

    let mut created = Vec::new();
    for (token, title, content) in [
        (&alice, "Learning Django", "Views and models"),
        (&alice, "Web frameworks", "Comparing DJANGO with others"),
        (&fan, "Rust tips", "Borrowing"),
        (&alice, "Cooking", "Pasta"),
    ] {
        let post = server
            .create_post(token, json!({ "title": title, "content": content }))
            .await;
        created.push(post["id"].as_i64().unwrap());
    }
    created
}

#[tokio::test]
async fn text_search_matches_title_content_and_author() {
    let server = TestServer::spawn().await;
    let created = seed_django_posts(&server).await;

    let page = server.get_json("/posts/search/?q=django").await;
    assert_eq!(page["count"], 3);
    assert!(page["next"].is_null());
    assert!(page["previous"].is_null());
    assert_eq!(ids(&page["results"]), created[..3]);

    let page = server.get_json("/posts/search/?q=%20%20").await;
    assert_eq!(page["count"], 4);
}

#[tokio::test]
async fn text_search_folds_ascii_case_only() {
    let server = TestServer::spawn().await;
    let (_, token) = server.user("alice").await;
    server
        .create_post(&token, json!({ "title": "Ärger mit Django", "content": "c" }))
        .await;

    assert_eq!(server.get_json("/posts/search/?q=DJANGO").await["count"], 1);
    assert_eq!(server.get_json("/posts/search/?q=%C3%84rger").await["count"], 1);
    // SQLite's LIKE leaves non-ASCII letters case-sensitive.
    assert_eq!(server.get_json("/posts/search/?q=%C3%A4rger").await["count"], 0);
}

#[tokio::test]
async fn malformed_search_query_is_a_json_error() {
    let server = TestServer::spawn().await;

    let res = server.get("/posts/search/?q=a&q=b").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["detail"], "Invalid input.");
    assert!(body["errors"]["query"].is_array());
}

#[tokio::test]
async fn search_treats_wildcards_literally() {
    let server = TestServer::spawn().await;
    let (_, token) = server.user("alice").await;
    server
        .create_post(&token, json!({ "title": "100% done", "content": "c" }))
        .await;
    server
        .create_post(&token, json!({ "title": "1000 done", "content": "c" }))
        .await;

    let page = server.get_json("/posts/search/?q=100%25").await;
    assert_eq!(page["count"], 1);
    assert_eq!(page["results"][0]["title"], "100% done");
}

#[tokio::test]
async fn tag_search_returns_each_post_once() {
    let server = TestServer::spawn().await;
    let (_, token) = server.user("alice").await;
    for tag in ["a", "b", "c"] {
        server.tag(&token, tag).await;
    }
    let both = server
        .create_post(&token, json!({ "title": "both", "content": "c", "tags": ["a", "b"] }))
        .await;
    let only_b = server
        .create_post(&token, json!({ "title": "b", "content": "c", "tags": ["b"] }))
        .await;
    server
        .create_post(&token, json!({ "title": "c", "content": "c", "tags": ["c"] }))
        .await;

    let page = server.get_json("/posts/search/?tags=a,b,,a").await;
    assert_eq!(page["count"], 2);
    assert_eq!(
        ids(&page["results"]),
        [both["id"].as_i64().unwrap(), only_b["id"].as_i64().unwrap()]
    );
}

#[tokio::test]
async fn search_filters_combine() {
    let server = TestServer::spawn().await;
    let (_, alice) = server.user("alice").await;
    let (_, bob) = server.user("bob").await;
    server.category(&alice, "Web Development").await;
    server.category(&alice, "Cooking").await;

    let wanted = server
        .create_post(
            &alice,
            json!({ "title": "Django forms", "content": "c", "category": "Web Development" }),
        )
        .await;
    server
        .create_post(
            &bob,
            json!({ "title": "Django admin", "content": "c", "category": "Web Development" }),
        )
        .await;
    server
        .create_post(
            &alice,
            json!({ "title": "Django cake", "content": "c", "category": "Cooking" }),
        )
        .await;

    let page = server
        .get_json("/posts/search/?q=django&category=web&author=alice")
        .await;
    assert_eq!(page["count"], 1);
    assert_eq!(page["results"][0]["id"], wanted["id"]);

    // Author matches the whole username exactly.
    let page = server.get_json("/posts/search/?author=ali").await;
    assert_eq!(page["count"], 0);
    assert_eq!(page["results"], json!([]));
}

#[tokio::test]
async fn search_pages_through_results() {
    let mut config = AppConfig::in_memory("test-secret");
    config.page_size = 2;
    let server = TestServer::spawn_with(config).await;
    let (_, token) = server.user("alice").await;
    for n in 0..5 {
        server
            .create_post(&token, json!({ "title": format!("post {n}"), "content": "c" }))
            .await;
    }

    let first = server.get_json("/posts/search/?q=post").await;
    assert_eq!(first["count"], 5);
    assert_eq!(first["results"].as_array().unwrap().len(), 2);
    assert!(first["previous"].is_null());
    let next = first["next"].as_str().unwrap();
    assert!(next.ends_with("/posts/search/?q=post&page=2"), "{next}");

    let last: PageWrapper<PostResponse> =
        serde_json::from_value(server.get_json("/posts/search/?q=post&page=3").await).unwrap();
    assert_eq!(last.count, 5);
    assert_eq!(last.results.len(), 1);
    assert_eq!(last.results[0].title, "post 4");
    assert!(last.next.is_none());
    assert!(last.previous.unwrap().ends_with("/posts/search/?q=post&page=2"));

    let sized = server.get_json("/posts/search/?page_size=5").await;
    assert_eq!(sized["results"].as_array().unwrap().len(), 5);
    assert!(sized["next"].is_null());

    for page in ["4", "0", "abc"] {
        let res = server
            .get(&format!("/posts/search/?page={page}"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND, "page={page}");
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["detail"], "Invalid page.");
    }
}

#[tokio::test]
async fn search_without_pagination_returns_a_plain_list() {
    let mut config = AppConfig::in_memory("test-secret");
    config.page_size = 0;
    let server = TestServer::spawn_with(config).await;
    let created = seed_django_posts(&server).await;

    let results = server.get_json("/posts/search/?q=django").await;
    assert_eq!(ids(&results), created[..3]);
}
