//! Shared types used across the glasm host crates.

mod types;

pub use types::{ClearColor, ResourceLocation, ShaderPair};

pub fn crate_info() -> &'static str {
    "glasm-common v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("common"));
    }
}
