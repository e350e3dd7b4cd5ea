//! Thread endpoints: listing, creation and the two forest views.
//!
//! `/forest` is computed by the database in one recursive query and is what
//! the inbox uses on a full load. `/tree` runs the in-memory builder over the
//! flat message list; it backs the nested layout and is handy for checking
//! the two paths against each other.

use rocket::serde::json::Json;
use rocket::{State, get, post};
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use rocket_okapi::openapi;
use serde::{Deserialize, Serialize};

use crate::config::ServiceConfig;
use crate::error::ApiError;
use crate::models::{DataResponse, NewThread, Thread};
use crate::routes::params::{PaginationParams, TreeLayout};
use crate::store::MessageStore;
use crate::threading::{Forest, NestedNode, SerializedNode, check_nested_depth, nest, serialize};

/// Body of `/tree`, shaped by the requested layout.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ThreadTree {
    Flat(Vec<SerializedNode>),
    Nested(Vec<NestedNode>),
}

/// List threads, most recently active first.
#[openapi(tag = "Threads")]
#[get("/threads?<params..>")]
pub async fn list_threads(
    store: &State<MessageStore>,
    config: &State<ServiceConfig>,
    params: Option<PaginationParams>,
) -> Result<Json<DataResponse<Vec<Thread>>>, ApiError> {
    let params = params.unwrap_or_default();
    let threads = store
        .list_threads(params.size(config.max_page_size), params.offset(config.max_page_size))
        .await?;

    Ok(Json(DataResponse::new(threads)))
}

/// Register a conversation ingested from an external platform.
#[openapi(tag = "Threads")]
#[post("/threads", data = "<new_thread>")]
pub async fn create_thread(
    store: &State<MessageStore>,
    new_thread: Json<NewThread>,
) -> Result<Json<DataResponse<Thread>>, ApiError> {
    let thread = store.create_thread(&new_thread).await?;
    Ok(Json(DataResponse::new(thread)))
}

#[openapi(tag = "Threads")]
#[get("/threads/<thread_id>")]
pub async fn get_thread(
    store: &State<MessageStore>,
    thread_id: i64,
) -> Result<Json<DataResponse<Thread>>, ApiError> {
    let thread = store.get_thread(thread_id).await?;
    Ok(Json(DataResponse::new(thread)))
}

/// Pre-ordered, depth-annotated forest computed with a recursive query.
#[openapi(tag = "Threads")]
#[get("/threads/<thread_id>/forest")]
pub async fn get_thread_forest(
    store: &State<MessageStore>,
    thread_id: i64,
) -> Result<Json<DataResponse<Vec<SerializedNode>>>, ApiError> {
    store.get_thread(thread_id).await?;
    let nodes = store.get_thread_forest(thread_id).await?;
    Ok(Json(DataResponse::new(nodes)))
}

/// Nested forest computed with a recursive query.
///
/// Threads nested deeper than `MAX_NESTED_DEPTH` are rejected with 400; the
/// flat `/forest` form has no depth limit.
#[openapi(tag = "Threads")]
#[get("/threads/<thread_id>/forest/nested")]
pub async fn get_thread_forest_nested(
    store: &State<MessageStore>,
    thread_id: i64,
) -> Result<Json<DataResponse<Vec<NestedNode>>>, ApiError> {
    store.get_thread(thread_id).await?;
    let nodes = store.get_thread_forest(thread_id).await?;
    check_nested_depth(&nodes)?;
    Ok(Json(DataResponse::new(nest(nodes))))
}

/// Thread tree built in memory from the flat message list.
#[openapi(tag = "Threads")]
#[get("/threads/<thread_id>/tree?<layout>")]
pub async fn get_thread_tree(
    store: &State<MessageStore>,
    thread_id: i64,
    layout: Option<TreeLayout>,
) -> Result<Json<DataResponse<ThreadTree>>, ApiError> {
    store.get_thread(thread_id).await?;
    let messages = store.get_thread_messages(thread_id).await?;
    let forest = Forest::build_for_thread(thread_id, messages)?;

    let flat = serialize(&forest);
    let tree = match layout.unwrap_or_default() {
        TreeLayout::Flat => ThreadTree::Flat(flat),
        TreeLayout::Nested => {
            check_nested_depth(&flat)?;
            ThreadTree::Nested(nest(flat))
        }
    };

    Ok(Json(DataResponse::new(tree)))
}
