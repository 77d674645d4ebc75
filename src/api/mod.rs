use rocket::Route;

mod sessions;
mod topics;
mod voters;
mod votes;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(topics::routes());
    routes.extend(sessions::routes());
    routes.extend(voters::routes());
    routes.extend(votes::routes());
    routes
}
