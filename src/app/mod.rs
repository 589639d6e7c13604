// Application layer - caller-side session and wiring

pub mod container;
pub mod session;

pub use container::{AppContainer, DefaultAppContainer};
pub use session::{Collaborators, Notice, Session, Severity};
