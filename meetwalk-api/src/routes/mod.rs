pub mod discovery;
pub mod health;
pub mod likes;
pub mod messages;
pub mod users;
