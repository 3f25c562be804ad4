pub mod health;
pub mod project_json;
