pub mod components;
pub mod config;
pub mod discovery;
pub mod error;
pub mod logging;
pub mod parsing;
pub mod render;
pub mod routes;
pub mod site;
pub mod theme;
pub mod types;

pub use config::*;
pub use discovery::*;
pub use error::*;
pub use parsing::*;
pub use routes::*;
pub use site::*;
pub use theme::*;
pub use types::*;
