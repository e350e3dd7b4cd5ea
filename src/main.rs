#[macro_use]
extern crate rocket;

#[launch]
fn rocket() -> _ {
    inbox_server::rocket()
}
