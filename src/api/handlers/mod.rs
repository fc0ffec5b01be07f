pub mod health;
pub mod introspection;
