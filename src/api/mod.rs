use rocket::Route;

mod admin;
pub mod auth;
mod superadmin;
mod vote;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(auth::routes());
    routes.extend(superadmin::routes());
    routes.extend(admin::routes());
    routes.extend(vote::routes());
    routes
}
