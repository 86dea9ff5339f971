pub mod completions;
pub mod exec;
pub mod export;
pub mod login;
pub mod profiles;
pub mod whoami;
