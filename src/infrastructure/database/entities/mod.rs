//! Database entities module

pub mod branch;
pub mod session;
pub mod student;
pub mod user;

pub use branch::Entity as Branch;
pub use session::Entity as Session;
pub use student::Entity as Student;
pub use user::Entity as User;
