use crate::error::AppError;
use config::{Config as Cfg, Environment, File};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Environment prefix shared by every service (`APP_SERVER__PORT=9000`).
pub const ENV_PREFIX: &str = "APP";

/// Locate a service's `config/` directory.
///
/// Services run either from their own crate directory or from the
/// workspace root, so both layouts are accepted.
pub fn config_directory(base_path: &Path, service_dir: &str) -> PathBuf {
    if base_path.ends_with(service_dir) {
        base_path.join("config")
    } else {
        base_path.join(service_dir).join("config")
    }
}

/// Load settings from `<dir>/base.yaml`, then overlay `APP_` environment
/// variables (double underscore separates nesting levels).
pub fn load_settings<T: DeserializeOwned>(configuration_directory: &Path) -> Result<T, AppError> {
    dotenvy::dotenv().ok();

    let settings = Cfg::builder()
        .add_source(File::from(configuration_directory.join("base.yaml")).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    Ok(settings.try_deserialize::<T>()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_directory_from_workspace_root() {
        let dir = config_directory(Path::new("/srv/app"), "reconciliation-frontend");
        assert_eq!(dir, PathBuf::from("/srv/app/reconciliation-frontend/config"));
    }

    #[test]
    fn config_directory_from_crate_dir() {
        let dir = config_directory(
            Path::new("/srv/app/reconciliation-frontend"),
            "reconciliation-frontend",
        );
        assert_eq!(dir, PathBuf::from("/srv/app/reconciliation-frontend/config"));
    }
}
