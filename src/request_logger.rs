use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;
use rocket::{Data, Request, Response};
use std::time::Instant;

/// Fairing that logs one line per request and reports the handling time in
/// an `X-Response-Time` header, so the inbox client can spot slow threads.
pub struct RequestLogger;

struct RequestStart(Instant);

#[rocket::async_trait]
impl Fairing for RequestLogger {
    fn info(&self) -> Info {
        Info {
            name: "Request Logger",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _: &mut Data<'_>) {
        request.local_cache(|| RequestStart(Instant::now()));
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let RequestStart(start_time) = request.local_cache(|| RequestStart(Instant::now()));
        let elapsed_ms = start_time.elapsed().as_secs_f64() * 1000.0;
        let status = response.status();

        response.set_header(Header::new("X-Response-Time", format!("{:.2}ms", elapsed_ms)));

        if status.code >= 500 {
            log::warn!("{} {} -> {} ({:.2}ms)", request.method(), request.uri(), status.code, elapsed_ms);
        } else {
            log::info!("{} {} -> {} ({:.2}ms)", request.method(), request.uri(), status.code, elapsed_ms);
        }
    }
}
