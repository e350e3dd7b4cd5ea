//! Message endpoints: the flat read and the append used by the compose box.

use rocket::serde::json::Json;
use rocket::{State, get, post};
use rocket_okapi::openapi;

use crate::error::ApiError;
use crate::models::{DataResponse, Message, NewMessage};
use crate::store::MessageStore;

/// All messages of a thread, unthreaded.
#[openapi(tag = "Messages")]
#[get("/threads/<thread_id>/messages")]
pub async fn list_messages(
    store: &State<MessageStore>,
    thread_id: i64,
) -> Result<Json<DataResponse<Vec<Message>>>, ApiError> {
    store.get_thread(thread_id).await?;
    let messages = store.get_thread_messages(thread_id).await?;
    Ok(Json(DataResponse::new(messages)))
}

/// Append a message, optionally as a reply.
///
/// `parentRef` may be a number, a numeric string, `0`, `null` or missing; `0`
/// and missing both start a new branch. A reply to a message that does not
/// exist in this thread is rejected with 400.
#[openapi(tag = "Messages")]
#[post("/threads/<thread_id>/messages", data = "<new_message>")]
pub async fn append_message(
    store: &State<MessageStore>,
    thread_id: i64,
    new_message: Json<NewMessage>,
) -> Result<Json<DataResponse<Message>>, ApiError> {
    let message = store.append_message(thread_id, &new_message).await?;
    Ok(Json(DataResponse::new(message)))
}
