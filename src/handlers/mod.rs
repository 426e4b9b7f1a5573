pub mod batch;
pub mod create;
pub mod delete;
pub mod get;
pub mod health;
pub mod list;
pub mod mock;
pub mod update;

pub use batch::batch_handler;
pub use create::create_handler;
pub use delete::delete_handler;
pub use get::get_handler;
pub use health::health_handler;
pub use list::list_handler;
pub use mock::mock_handler;
pub use update::update_handler;
