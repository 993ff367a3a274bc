pub mod link;
pub mod profile;
