#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

pub use toml_config::TomlConfig;

pub use crate::core::concurrent::DEFAULT_MAX_IN_FLIGHT;

pub const DEFAULT_PAGE_SIZE: usize = 100;
/// GitLab caps `per_page` at 100.
pub const MAX_PAGE_SIZE: usize = 100;
pub const DEFAULT_PAGE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

use crate::domain::ports::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation;

/// Token for requests GitLab refuses anonymously (adding members, hooks).
pub fn require_token<P: ConfigProvider + ?Sized>(config: &P) -> Result<&str> {
    validation::validate_required_field("token", &config.token()).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::InventoryError;

    #[test]
    fn test_require_token() {
        let anonymous = TomlConfig::from_toml_str(
            r#"
[server]
url = "https://gitlab.example.com"
"#,
        )
        .unwrap();
        assert!(matches!(
            require_token(&anonymous),
            Err(InventoryError::MissingConfigError { .. })
        ));

        let authorized = TomlConfig::from_toml_str(
            r#"
[server]
url = "https://gitlab.example.com"
token = "glpat-abc"
"#,
        )
        .unwrap();
        assert_eq!(require_token(&authorized).unwrap(), "glpat-abc");
    }
}
