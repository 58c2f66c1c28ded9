use crate::error::AppError;
use std::path::PathBuf;

const APP_DIR: &str = "strongthread";

/// Resolves a per-user data file: `env_var` wins when set and non-blank,
/// otherwise `%APPDATA%\strongthread\<file>` on Windows and
/// `$HOME/.config/strongthread/<file>` elsewhere.
pub fn app_file(env_var: &str, file_name: &str) -> Result<PathBuf, AppError> {
    if let Some(path) = std::env::var_os(env_var).filter(|path| !path.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    Ok(app_dir()?.join(file_name))
}

fn app_dir() -> Result<PathBuf, AppError> {
    let (var, base): (&str, fn(PathBuf) -> PathBuf) = if cfg!(windows) {
        ("APPDATA", |root| root)
    } else {
        ("HOME", |root| root.join(".config"))
    };
    let root = std::env::var_os(var)
        .filter(|root| !root.is_empty())
        .ok_or_else(|| AppError::invalid_data(format!("{var} is not set")))?;
    Ok(base(PathBuf::from(root)).join(APP_DIR))
}

#[cfg(test)]
mod tests {
    use super::app_file;
    use std::path::PathBuf;

    #[test]
    fn env_override_wins() {
        // SAFETY: the variable name is unique to this test.
        unsafe { std::env::set_var("STRONGTHREAD_TEST_PATH_OVERRIDE", "/tmp/custom.json") };

        let path = app_file("STRONGTHREAD_TEST_PATH_OVERRIDE", "store.json").unwrap();

        assert_eq!(path, PathBuf::from("/tmp/custom.json"));
    }

    #[test]
    fn falls_back_to_app_directory() {
        // Hosts without HOME/APPDATA report an error instead.
        if let Ok(path) = app_file("STRONGTHREAD_TEST_PATH_UNSET", "store.json") {
            assert!(path.ends_with("strongthread/store.json"));
        }
    }
}
