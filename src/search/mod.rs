pub mod github;
pub mod vector;
