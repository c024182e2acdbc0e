// Request handlers, one module per resource.
//
// `factory` holds the generic CRUD operations; the resource modules wrap them
// with ownership checks and side effects. Locations and cuisines need nothing
// beyond the factory and are mounted directly in `server`.
pub mod auth;
pub mod factory;
pub mod restaurants;
pub mod reviews;
pub mod users;
