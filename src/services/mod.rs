pub mod auth;
pub mod authorization;
pub mod identity;
pub mod init;
pub mod pets;
pub mod share_code;
pub mod sub_users;
pub mod validation;
