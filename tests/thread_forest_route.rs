use chrono::{DateTime, TimeZone, Utc};
use inbox_server::api_routes;
use inbox_server::models::{DataResponse, Message, Thread};
use inbox_server::test_support::{TestDatabase, TestFixtures, TestRocketBuilder};
use inbox_server::threading::{MAX_NESTED_DEPTH, NestedNode, ParentRef, SerializedNode};
use rocket::http::{ContentType, Status};
use rocket::local::asynchronous::Client;
use serde_json::json;

fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
}

async fn setup(test_name: &str) -> Option<(TestDatabase, Client)> {
    let test_db = match TestDatabase::new_from_env().await {
        Ok(db) => db,
        Err(err) if err.is_unavailable() => {
            eprintln!("skipping {test_name}: no test database available ({err})");
            return None;
        }
        Err(err) => panic!("failed to provision test database: {err:?}"),
    };

    let client = TestRocketBuilder::new()
        .mount_api_routes(api_routes())
        .manage_pg_pool(test_db.pool_clone())
        .async_client()
        .await;

    Some((test_db, client))
}

async fn get_flat(client: &Client, uri: String) -> Vec<SerializedNode> {
    let response = client.get(uri).dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    let payload: DataResponse<Vec<SerializedNode>> =
        response.into_json().await.expect("valid JSON payload");
    payload.data
}

fn shape(nodes: &[SerializedNode]) -> Vec<(i64, i32, Vec<i64>)> {
    nodes
        .iter()
        .map(|node| (node.id, node.depth, node.child_ids.clone()))
        .collect()
}

#[tokio::test]
async fn forest_orders_replies_by_time_and_normalizes_references() {
    let Some((test_db, client)) = setup("forest_orders_replies_by_time").await else {
        return;
    };
    let fixtures = TestFixtures::new(test_db.pool());
    let thread_id = fixtures.insert_thread("sms").await.expect("thread inserted");

    fixtures.insert_message(thread_id, 1, None, at(100)).await.unwrap();
    fixtures.insert_message(thread_id, 2, Some(1), at(110)).await.unwrap();
    fixtures.insert_message(thread_id, 3, Some(1), at(105)).await.unwrap();
    fixtures.insert_message(thread_id, 4, Some(0), at(90)).await.unwrap();

    let nodes = get_flat(&client, format!("/api/v1/threads/{thread_id}/forest")).await;
    assert_eq!(
        shape(&nodes),
        vec![
            (4, 0, vec![]),
            (1, 0, vec![3, 2]),
            (3, 1, vec![]),
            (2, 1, vec![]),
        ]
    );
    assert_eq!(nodes[0].message.parent_ref, ParentRef::Root);
    assert_eq!(nodes[2].message.parent_ref, ParentRef::Reply(1));

    let response = client
        .get(format!("/api/v1/threads/{thread_id}/forest/nested"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let nested: DataResponse<Vec<NestedNode>> =
        response.into_json().await.expect("valid JSON payload");
    let roots: Vec<i64> = nested.data.iter().map(|node| node.message.id).collect();
    assert_eq!(roots, vec![4, 1]);
    let replies: Vec<i64> = nested.data[1]
        .children
        .iter()
        .map(|node| node.message.id)
        .collect();
    assert_eq!(replies, vec![3, 2]);

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn forest_query_matches_in_memory_tree() {
    let Some((test_db, client)) = setup("forest_query_matches_in_memory_tree").await else {
        return;
    };
    let fixtures = TestFixtures::new(test_db.pool());
    let thread_id = fixtures.insert_thread("whatsapp").await.expect("thread inserted");
    let other_thread = fixtures.insert_thread("whatsapp").await.expect("thread inserted");

    fixtures.insert_message(thread_id, 1, None, at(100)).await.unwrap();
    fixtures.insert_message(thread_id, 2, Some(1), at(300)).await.unwrap();
    fixtures.insert_message(thread_id, 3, Some(1), at(200)).await.unwrap();
    fixtures.insert_message(thread_id, 4, Some(0), at(50)).await.unwrap();
    fixtures.insert_message(thread_id, 5, Some(999), at(400)).await.unwrap();
    fixtures.insert_message(thread_id, 6, Some(6), at(500)).await.unwrap();
    fixtures.insert_message(thread_id, 7, Some(3), at(250)).await.unwrap();
    fixtures.insert_message(thread_id, 8, Some(3), at(250)).await.unwrap();
    // A parent in another thread is dangling from this thread's point of view
    fixtures.insert_message(other_thread, 9, None, at(10)).await.unwrap();
    fixtures.insert_message(thread_id, 10, Some(9), at(600)).await.unwrap();

    let from_query = get_flat(&client, format!("/api/v1/threads/{thread_id}/forest")).await;
    let from_memory = get_flat(&client, format!("/api/v1/threads/{thread_id}/tree")).await;

    assert_eq!(from_query, from_memory);
    assert_eq!(
        shape(&from_query),
        vec![
            (4, 0, vec![]),
            (1, 0, vec![3, 2]),
            (3, 1, vec![7, 8]),
            (7, 2, vec![]),
            (8, 2, vec![]),
            (2, 1, vec![]),
            (5, 0, vec![]),
            (6, 0, vec![]),
            (10, 0, vec![]),
        ]
    );

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn forest_falls_back_when_references_form_a_cycle() {
    let Some((test_db, client)) = setup("forest_falls_back_on_cycle").await else {
        return;
    };
    let fixtures = TestFixtures::new(test_db.pool());

    // Root plus a two-message cycle hanging in the air
    let partial = fixtures.insert_thread("sms").await.expect("thread inserted");
    fixtures.insert_message(partial, 1, None, at(10)).await.unwrap();
    fixtures.insert_message(partial, 2, None, at(20)).await.unwrap();
    fixtures.insert_message(partial, 3, Some(2), at(30)).await.unwrap();
    fixtures.set_parent(2, Some(3)).await.unwrap();

    let from_query = get_flat(&client, format!("/api/v1/threads/{partial}/forest")).await;
    let from_memory = get_flat(&client, format!("/api/v1/threads/{partial}/tree")).await;
    assert_eq!(from_query.len(), 3);
    assert_eq!(from_query, from_memory);
    assert_eq!(
        shape(&from_query),
        vec![(1, 0, vec![]), (2, 0, vec![3]), (3, 1, vec![])]
    );

    // Every message is part of the cycle, so nothing anchors the query
    let closed = fixtures.insert_thread("sms").await.expect("thread inserted");
    fixtures.insert_message(closed, 11, None, at(10)).await.unwrap();
    fixtures.insert_message(closed, 12, Some(11), at(20)).await.unwrap();
    fixtures.set_parent(11, Some(12)).await.unwrap();

    let from_query = get_flat(&client, format!("/api/v1/threads/{closed}/forest")).await;
    let from_memory = get_flat(&client, format!("/api/v1/threads/{closed}/tree")).await;
    assert_eq!(from_query.len(), 2);
    assert_eq!(from_query, from_memory);
    assert_eq!(from_query[0].depth, 0);

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn nested_views_refuse_threads_too_deep_to_encode() {
    let Some((test_db, client)) = setup("nested_views_refuse_deep_threads").await else {
        return;
    };
    let fixtures = TestFixtures::new(test_db.pool());
    let thread_id = fixtures.insert_thread("sms").await.expect("thread inserted");

    let length = i64::from(MAX_NESTED_DEPTH) + 1;
    fixtures.insert_message(thread_id, 1, None, at(0)).await.unwrap();
    for id in 2..=length {
        fixtures
            .insert_message(thread_id, id, Some(id - 1), at(id))
            .await
            .unwrap();
    }

    let flat = get_flat(&client, format!("/api/v1/threads/{thread_id}/forest")).await;
    assert_eq!(flat.len() as i64, length);
    assert_eq!(flat.last().map(|node| node.depth), Some(MAX_NESTED_DEPTH));
    let flat_tree = get_flat(&client, format!("/api/v1/threads/{thread_id}/tree")).await;
    assert_eq!(flat, flat_tree);

    for uri in [
        format!("/api/v1/threads/{thread_id}/forest/nested"),
        format!("/api/v1/threads/{thread_id}/tree?layout=nested"),
    ] {
        let response = client.get(uri).dispatch().await;
        assert_eq!(response.status(), Status::BadRequest);
        let body = response.into_string().await.unwrap_or_default();
        assert!(body.contains("flat"), "unexpected body {body}");
    }

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn forest_of_empty_and_unknown_threads() {
    let Some((test_db, client)) = setup("forest_of_empty_and_unknown_threads").await else {
        return;
    };
    let fixtures = TestFixtures::new(test_db.pool());
    let thread_id = fixtures.insert_thread("email").await.expect("thread inserted");

    let nodes = get_flat(&client, format!("/api/v1/threads/{thread_id}/forest")).await;
    assert!(nodes.is_empty());

    let response = client.get("/api/v1/threads/424242/forest").dispatch().await;
    assert_eq!(response.status(), Status::NotFound);

    let response = client.get("/api/v1/threads/424242/tree").dispatch().await;
    assert_eq!(response.status(), Status::NotFound);

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn append_message_normalizes_and_validates_parent() {
    let Some((test_db, client)) = setup("append_message_validates_parent").await else {
        return;
    };

    let response = client
        .post("/api/v1/threads")
        .header(ContentType::JSON)
        .body(json!({ "platform": "sms", "title": "Dinner" }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let thread: DataResponse<Thread> = response.into_json().await.expect("valid JSON payload");
    let thread_id = thread.data.id;

    let append = |body: serde_json::Value| {
        client
            .post(format!("/api/v1/threads/{thread_id}/messages"))
            .header(ContentType::JSON)
            .body(body.to_string())
    };

    let response = append(json!({ "sender": "ana", "content": "hi", "parentRef": "0" }))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let first: DataResponse<Message> = response.into_json().await.expect("valid JSON payload");
    assert_eq!(first.data.parent_ref, ParentRef::Root);

    let response = append(json!({ "sender": "ben", "content": "yo" })).dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    let second: DataResponse<Message> = response.into_json().await.expect("valid JSON payload");
    assert_eq!(second.data.parent_ref, ParentRef::Root);

    let response = append(json!({
        "sender": "ben",
        "content": "re: hi",
        "isOutbound": true,
        "parentRef": first.data.id.to_string(),
    }))
    .dispatch()
    .await;
    assert_eq!(response.status(), Status::Ok);
    let reply: DataResponse<Message> = response.into_json().await.expect("valid JSON payload");
    assert_eq!(reply.data.parent_ref, ParentRef::Reply(first.data.id));
    assert!(reply.data.is_outbound);

    let response = append(json!({ "sender": "ben", "content": "?", "parentRef": 987654 }))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);

    let response = append(json!({ "sender": "  ", "content": "anonymous" }))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);

    let response = client
        .post("/api/v1/threads/987654/messages")
        .header(ContentType::JSON)
        .body(json!({ "sender": "ana", "content": "lost" }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::NotFound);

    let response = client
        .get(format!("/api/v1/threads/{thread_id}/tree?layout=nested"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let tree: DataResponse<Vec<NestedNode>> =
        response.into_json().await.expect("valid JSON payload");
    assert_eq!(tree.data.len(), 2);
    assert_eq!(tree.data[0].message.id, first.data.id);
    assert_eq!(tree.data[0].children.len(), 1);
    assert_eq!(tree.data[0].children[0].message.id, reply.data.id);
    assert_eq!(tree.data[0].children[0].depth, 1);

    let response = client.get(format!("/api/v1/threads/{thread_id}")).dispatch().await;
    let thread: DataResponse<Thread> = response.into_json().await.expect("valid JSON payload");
    assert_eq!(thread.data.message_count, 3);
    assert!(thread.data.last_message_at.is_some());

    test_db.close().await.expect("failed to drop test database");
}
