//! Provider implementations

pub mod openai;

use crate::{Error, Result};

/// Get an API key from the provided value or an environment variable
pub fn get_api_key(provided: Option<&str>, env_var: &str) -> Result<String> {
    if let Some(key) = provided {
        return Ok(key.to_string());
    }

    std::env::var(env_var)
        .ok()
        .filter(|key| !key.trim().is_empty())
        .ok_or(Error::InvalidApiKey)
}
