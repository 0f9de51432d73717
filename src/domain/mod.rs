pub mod entity;
pub mod orm;
pub mod query;
pub mod repository;
