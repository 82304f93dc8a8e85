//! Catalog administration and the public catalog over real HTTP.

mod common;

use common::{image_part, spawn_app, tap_form, TestApp};
use reqwest::multipart::Form;
use serde_json::{json, Value};
use tap_admin::domain::LiquidType;

async fn create_tap(app: &TestApp, token: &str, liquid: &str) -> Value {
    let res = app
        .client
        .post(app.url("/api/admin/taps"))
        .bearer_auth(token)
        .multipart(tap_form(liquid, "tap.png"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Tap created successfully");
    body["tap"].clone()
}

#[tokio::test]
async fn test_create_and_read_back() {
    let app = spawn_app().await;
    let admin = app.admin_token("admin@taps.test").await;

    let tap = create_tap(&app, &admin, "Wine").await;
    let id = tap["id"].as_str().unwrap();
    assert_eq!(tap["created_by"], "admin@taps.test");
    assert_eq!(tap["status"], "active");
    assert!(app.media.contains(tap["image_url"].as_str().unwrap()));
    assert_eq!(app.store.category_ids(LiquidType::Wine), vec![id.to_string()]);

    let res = app.get(&format!("/api/admin/taps/{id}"), Some(&admin)).await;
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["tap"]["title"], "Brass Keg Tap");

    let res = app.get("/api/admin/taps", Some(&admin)).await;
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["total"], 1);

    let res = app.get(&format!("/api/public/taps/{id}"), None).await;
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["id"], id);
}

#[tokio::test]
async fn test_create_validation() {
    let app = spawn_app().await;
    let admin = app.admin_token("admin@taps.test").await;

    let no_image = Form::new().text("title", "Only a title");
    let res = app
        .client
        .post(app.url("/api/admin/taps"))
        .bearer_auth(&admin)
        .multipart(no_image)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);

    let res = app
        .client
        .post(app.url("/api/admin/taps"))
        .bearer_auth(&admin)
        .multipart(tap_form("Beer", "tap.png"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Invalid liquid type, must be: Water, Oil, or Wine");

    let res = app
        .client
        .post(app.url("/api/admin/taps"))
        .bearer_auth(&admin)
        .multipart(tap_form("Oil", "tap.gif"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);

    assert!(app.media.is_empty());
}

#[tokio::test]
async fn test_plain_user_cannot_create() {
    let app = spawn_app().await;
    app.register("u@taps.test", "secret1").await;
    let user = app.login("u@taps.test", "secret1").await;

    let res = app
        .client
        .post(app.url("/api/admin/taps"))
        .bearer_auth(&user)
        .multipart(tap_form("Water", "tap.png"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);
    assert!(app.media.is_empty());
}

#[tokio::test]
async fn test_update_replaces_image_and_category() {
    let app = spawn_app().await;
    let admin = app.admin_token("admin@taps.test").await;
    let tap = create_tap(&app, &admin, "Water").await;
    let id = tap["id"].as_str().unwrap();
    let old_image = tap["image_url"].as_str().unwrap();

    let form = Form::new()
        .text("liquid_type", "Oil")
        .text("title", "Steel Barrel Tap")
        .part("productPictureFile", image_part("new.jpg"));
    let res = app
        .client
        .put(app.url(&format!("/api/admin/taps/{id}")))
        .bearer_auth(&admin)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    let updated = &body["tap"];
    assert_eq!(updated["title"], "Steel Barrel Tap");
    assert_eq!(updated["material"], "Brass");
    assert_eq!(updated["liquid_type"], "Oil");

    let new_image = updated["image_url"].as_str().unwrap();
    assert!(app.media.contains(new_image));
    assert!(!app.media.contains(old_image));
    assert!(app.store.category_ids(LiquidType::Water).is_empty());
    assert_eq!(app.store.category_ids(LiquidType::Oil), vec![id.to_string()]);

    let res = app
        .client
        .put(app.url("/api/admin/taps/unknown-id"))
        .bearer_auth(&admin)
        .multipart(Form::new().text("title", "x"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
}

#[tokio::test]
async fn test_delete_removes_record_and_image() {
    let app = spawn_app().await;
    let admin = app.admin_token("admin@taps.test").await;
    let tap = create_tap(&app, &admin, "Wine").await;
    let id = tap["id"].as_str().unwrap();

    let res = app
        .client
        .delete(app.url(&format!("/api/admin/taps/{id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["deletedId"], id);

    assert!(app.media.is_empty());
    assert!(app.store.category_ids(LiquidType::Wine).is_empty());
    assert_eq!(app.get(&format!("/api/public/taps/{id}"), None).await.status(), 404);
}

#[tokio::test]
async fn test_public_catalog() {
    let app = spawn_app().await;
    let admin = app.admin_token("admin@taps.test").await;
    create_tap(&app, &admin, "Wine").await;
    let hidden = create_tap(&app, &admin, "Water").await;

    let res = app
        .client
        .put(app.url(&format!("/api/admin/taps/{}", hidden["id"].as_str().unwrap())))
        .bearer_auth(&admin)
        .multipart(Form::new().text("status", "inactive"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let res = app.get("/api/public/taps", None).await;
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["liquid_type"], "Wine");

    let body: Value = app
        .get("/api/public/taps?category=Water", None)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["count"], 0);

    let query = |filter: Value| {
        app.client
            .post(app.url("/api/public/taps/query"))
            .json(&filter)
            .send()
    };

    let res = query(json!({})).await.unwrap();
    assert_eq!(res.status(), 400);

    let res = query(json!({ "containerType": "Keg", "liquidType": "Wine" })).await.unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["count"], 1);

    let res = query(json!({ "material": "Steel" })).await.unwrap();
    assert_eq!(res.status(), 404);
}

#[tokio::test]
async fn test_stats() {
    let app = spawn_app().await;
    let admin = app.admin_token("admin@taps.test").await;
    create_tap(&app, &admin, "Wine").await;
    create_tap(&app, &admin, "Oil").await;

    let res = app.get("/api/admin/stats", Some(&admin)).await;
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["stats"]["totalTaps"], 2);
    assert_eq!(body["stats"]["tapsByLiquidType"]["Water"], 0);
    assert_eq!(body["stats"]["tapsByLiquidType"]["Wine"], 1);
    assert_eq!(body["stats"]["totalUsers"], 2);
}
