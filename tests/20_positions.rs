mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::TestServer;

async fn with_root(server: &TestServer) -> Result<(String, String)> {
    let admin = server.admin_token().await?;
    let root = server
        .create_ok(&admin, json!({ "name": "University", "type": "root", "isPublic": true }))
        .await?;
    Ok((admin, root))
}

#[tokio::test]
async fn create_returns_created_position() -> Result<()> {
    let server = TestServer::spawn().await?;
    let admin = server.admin_token().await?;

    let (status, body) = server
        .create_position(
            &admin,
            json!({ "name": "University", "type": "root", "description": "Top of the tree" }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Position created successfully");
    assert_eq!(body["data"]["type"], "root");
    assert_eq!(body["data"]["parentId"], Value::Null);
    assert_eq!(body["data"]["isPublic"], false);
    assert!(body["data"]["createdAt"].is_string());
    Ok(())
}

#[tokio::test]
async fn create_reports_field_errors() -> Result<()> {
    let server = TestServer::spawn().await?;
    let admin = server.admin_token().await?;

    let (status, body) = server
        .create_position(&admin, json!({ "name": "", "type": "dean", "parentId": "nope" }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    for field in ["name", "type", "parentId"] {
        assert!(body["field_errors"][field].is_string(), "missing error for {field}");
    }

    let (status, body) = server
        .create_position(&admin, json!({ "name": "Orphan", "type": "school" }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["field_errors"]["parentId"].is_string());
    Ok(())
}

#[tokio::test]
async fn invariant_violations_are_conflicts() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (admin, root) = with_root(&server).await?;

    let (status, body) = server
        .create_position(&admin, json!({ "name": "Second", "type": "root" }))
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    // A parent on the second root does not turn the conflict into a validation error
    let (status, body) = server
        .create_position(&admin, json!({ "name": "Second", "type": "root", "parentId": root }))
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "A root position already exists.");

    server
        .create_ok(&admin, json!({ "name": "Arts", "type": "school", "parentId": root }))
        .await?;
    let (status, body) = server
        .create_position(&admin, json!({ "name": "Arts", "type": "school", "parentId": root }))
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["message"].as_str().unwrap().contains("Arts"));

    let (status, _) = server
        .create_position(
            &admin,
            json!({ "name": "Lost", "type": "school", "parentId": "00000000-0000-4000-8000-000000000000" }),
        )
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn reads_by_id_name_children_and_ancestors() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (admin, root) = with_root(&server).await?;
    let school = server
        .create_ok(&admin, json!({ "name": "Engineering", "type": "school", "parentId": root }))
        .await?;
    let dept = server
        .create_ok(&admin, json!({ "name": "Civil", "type": "department", "parentId": school }))
        .await?;
    let viewer = server.viewer_token().await?;

    let body: Value = server.get(&format!("/positions/{}", dept), &viewer).send().await?.json().await?;
    assert_eq!(body["data"]["name"], "Civil");

    let body: Value = server.get("/positions/Engineering", &viewer).send().await?.json().await?;
    assert_eq!(body["data"]["id"], school.as_str());

    let res = server.get("/positions/Nobody", &viewer).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let body: Value = server
        .get(&format!("/positions/{}/children", root), &viewer)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["id"], school.as_str());

    let body: Value = server
        .get(&format!("/positions/{}/ancestors", dept), &viewer)
        .send()
        .await?
        .json()
        .await?;
    let names: Vec<_> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, ["Engineering", "University"]);

    let res = server.get("/positions/not-a-uuid/children", &viewer).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn trees_in_both_shapes() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (admin, root) = with_root(&server).await?;
    let school = server
        .create_ok(&admin, json!({ "name": "Science", "type": "school", "parentId": root }))
        .await?;
    server
        .create_ok(&admin, json!({ "name": "Physics", "type": "department", "parentId": school }))
        .await?;

    let body: Value = server.get("/positions/tree", &admin).send().await?.json().await?;
    let flat = body["data"].as_array().unwrap();
    assert_eq!(flat.len(), 3);
    assert_eq!(flat[0]["children"][0]["name"], "Science");
    // Shallow: children of children are not expanded
    assert!(flat[0]["children"][0].get("children").is_none());

    let body: Value = server.get("/positions/tree/nested", &admin).send().await?.json().await?;
    let forest = body["data"].as_array().unwrap();
    assert_eq!(forest.len(), 1);
    assert_eq!(forest[0]["children"][0]["children"][0]["name"], "Physics");
    Ok(())
}

#[tokio::test]
async fn pagination_bounds_and_totals() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (admin, root) = with_root(&server).await?;
    for i in 0..4 {
        server
            .create_ok(
                &admin,
                json!({ "name": format!("Teacher {i}"), "type": "teacher", "parentId": root }),
            )
            .await?;
    }

    let body: Value = server
        .get("/positions?page=2&limit=2", &admin)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body["data"]["total"], 5);
    assert_eq!(body["data"]["page"], 2);
    let names: Vec<_> = body["data"]["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, ["Teacher 1", "Teacher 2"]);

    for query in ["page=0", "limit=0", "limit=101", "page=abc"] {
        let res = server.get(&format!("/positions?{}", query), &admin).send().await?;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{query}");
    }
    Ok(())
}

#[tokio::test]
async fn update_and_delete() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (admin, root) = with_root(&server).await?;
    let library = server
        .create_ok(&admin, json!({ "name": "Library", "type": "institute", "parentId": root }))
        .await?;

    let (status, body) = server
        .patch_position(&admin, &library, json!({ "description": "Books", "parentId": null }))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["description"], "Books");
    assert_eq!(body["data"]["parentId"], root.as_str());

    let (status, _) = server
        .patch_position(&admin, &library, json!({ "parentId": library }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = server.delete_position(&admin, &root).await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = server.delete_position(&admin, &library).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], library.as_str());

    let (status, _) = server.delete_position(&admin, &library).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn public_list_needs_no_token() -> Result<()> {
    let server = TestServer::spawn().await?;
    let (admin, root) = with_root(&server).await?;
    server
        .create_ok(&admin, json!({ "name": "Audit", "type": "institute", "parentId": root }))
        .await?;
    server
        .create_ok(
            &admin,
            json!({ "name": "Admissions", "type": "institute", "parentId": root, "isPublic": true }),
        )
        .await?;

    let res = server.client.get(server.url("/positions/public/list")).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    let list = body["data"].as_array().unwrap();

    let names: Vec<_> = list.iter().map(|p| p["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["Admissions", "University"]);
    // Public view exposes only the public fields
    assert!(list[0].get("parentId").is_none());
    assert!(list[0].get("type").is_none());
    assert!(list[0]["createdAt"].is_string());
    Ok(())
}
