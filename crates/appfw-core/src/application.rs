//! Application records returned by list queries.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One IoT application known to the framework.
///
/// Produced by transports as part of a list completion; callers only read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    app_id: String,
    #[serde(default)]
    description: String,
    /// Desktop entry path.
    #[serde(default)]
    desktop: PathBuf,
    user_id: u32,
    #[serde(default)]
    args: Vec<String>,
}

impl Application {
    /// Build a record the way a transport decodes one off the wire.
    ///
    /// Only transports and test daemons construct records; applications
    /// receive them from list completions.
    #[doc(hidden)]
    pub fn new(
        app_id: impl Into<String>,
        description: impl Into<String>,
        desktop: impl Into<PathBuf>,
        user_id: u32,
        args: Vec<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            description: description.into(),
            desktop: desktop.into(),
            user_id,
            args,
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn desktop(&self) -> &Path {
        &self.desktop
    }

    pub fn user_id(&self) -> u32 {
        self.user_id
    }

    /// Launch arguments, in order.
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_with_defaults() {
        let app: Application =
            serde_json::from_str(r#"{"app_id": "cam1", "user_id": 1000}"#).unwrap();
        assert_eq!(app.app_id(), "cam1");
        assert_eq!(app.user_id(), 1000);
        assert!(app.description().is_empty());
        assert!(app.args().is_empty());
    }

    #[test]
    fn test_new_matches_wire_record() {
        let decoded: Application = serde_json::from_value(serde_json::json!({
            "app_id": "cam1",
            "description": "Camera",
            "desktop": "/usr/share/cam1.desktop",
            "user_id": 1000,
            "args": ["--fast"]
        }))
        .unwrap();
        let built = Application::new(
            "cam1",
            "Camera",
            "/usr/share/cam1.desktop",
            1000,
            vec!["--fast".into()],
        );
        assert_eq!(built, decoded);
    }

    #[test]
    fn test_args_keep_order() {
        let app = Application::new(
            "cam1",
            "Camera",
            "/usr/share/applications/cam1.desktop",
            1000,
            vec!["--fps".into(), "30".into(), "--hd".into()],
        );
        assert_eq!(app.args(), ["--fps", "30", "--hd"]);
        assert_eq!(
            app.desktop(),
            Path::new("/usr/share/applications/cam1.desktop")
        );
    }
}
