pub mod collaborators;
pub mod documents;
pub mod portals;
pub mod requests;
pub mod roles;
pub mod users;
