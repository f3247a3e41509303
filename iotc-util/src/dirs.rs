use std::path::PathBuf;

/// Resolve `base`, or `fallback` under the home directory when the platform
/// has no such directory, and append the application name
fn app_dir(base: Option<PathBuf>, fallback: &[&str]) -> PathBuf {
    base.unwrap_or_else(|| {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        fallback.iter().fold(home, |dir, part| dir.join(part))
    })
    .join(env!("IOTC_PKG_NAME"))
}

/// Return the application configuration directory
pub fn config_dir() -> PathBuf {
    app_dir(dirs::config_dir(), &[".config"])
}

/// Return the application state directory
pub fn state_dir() -> PathBuf {
    app_dir(dirs::state_dir(), &[".local", "state"])
}

/// Where downloaded firmware images are stored unless configured otherwise
pub fn image_dir() -> PathBuf {
    state_dir().join("images")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_falls_back_under_home() {
        let dir = app_dir(None, &[".local", "state"]);
        assert!(dir.ends_with(format!(".local/state/{}", env!("IOTC_PKG_NAME"))));
    }

    #[test]
    fn it_keeps_images_in_the_state_dir() {
        assert!(image_dir().starts_with(state_dir()));
    }
}
