pub mod assets;
pub mod businesses;
pub mod login_users;
pub mod project_grants;
pub mod projects;
