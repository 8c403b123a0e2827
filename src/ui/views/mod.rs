pub mod auth;
pub mod entity_list;

pub use auth::LoginView;
pub use entity_list::EntityListView;
