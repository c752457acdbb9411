pub mod credential;
pub mod jws;
pub mod query;
pub mod scope;
pub mod validation;
