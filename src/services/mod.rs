//! Domain services composed over [`CrudService`](crate::core::service::CrudService)

pub mod product;
pub mod user;

pub use product::ProductService;
pub use user::UserService;
