pub mod entity;
pub mod link;
pub mod workspace;
