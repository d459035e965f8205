pub mod authorizer;
pub mod config;
pub mod directory;
pub mod jwt_auth;
mod responses;
pub mod storage;
mod telemetry;

pub use self::config::AppConfig;
pub use directory::DirectoryClient;
pub use responses::*;
pub use storage::LocalStorage;
pub use telemetry::*;
