//! Target application selection for event sending.
//!
//! A [`TargetSpec`] names which application(s) an event is delivered to.
//! Every selector is optional; a target is only usable when at least one of
//! them is set. Selectors combine: the framework delivers to applications
//! matching all of the set fields that the security layer permits.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppFwError, Result};

/// Selector describing which application(s) an event should be delivered to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSpec {
    /// SMACK label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Application id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    /// Executed binary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<PathBuf>,
    /// Name of the (linux) user running the target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Process id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process: Option<u32>,
}

impl TargetSpec {
    /// Create a target with every selector unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a target from all five selectors at once.
    pub fn from_parts(
        label: Option<String>,
        app_id: Option<String>,
        binary: Option<PathBuf>,
        user: Option<String>,
        process: Option<u32>,
    ) -> Self {
        Self {
            label,
            app_id,
            binary,
            user,
            process,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = Some(binary.into());
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_process(mut self, pid: u32) -> Self {
        self.process = Some(pid);
        self
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = Some(label.into());
    }

    pub fn set_app_id(&mut self, app_id: impl Into<String>) {
        self.app_id = Some(app_id.into());
    }

    pub fn set_binary(&mut self, binary: impl Into<PathBuf>) {
        self.binary = Some(binary.into());
    }

    pub fn set_user(&mut self, user: impl Into<String>) {
        self.user = Some(user.into());
    }

    pub fn set_process(&mut self, pid: u32) {
        self.process = Some(pid);
    }

    /// True iff at least one selector is set.
    pub fn is_usable(&self) -> bool {
        self.label.is_some()
            || self.app_id.is_some()
            || self.binary.is_some()
            || self.user.is_some()
            || self.process.is_some()
    }

    /// Fail with `InvalidArgument` unless [`is_usable`](Self::is_usable).
    pub fn ensure_usable(&self) -> Result<()> {
        if self.is_usable() {
            Ok(())
        } else {
            Err(AppFwError::invalid_argument(
                "target",
                "No target application was specified",
            ))
        }
    }
}

/// Look up the uid of a local user by name.
#[cfg(unix)]
pub fn resolve_user_id(name: &str) -> Result<u32> {
    user_id_from_lookup(name, nix::unistd::User::from_name(name))
}

/// A failed lookup is reported like a missing user; only the log tells them
/// apart.
#[cfg(unix)]
fn user_id_from_lookup(name: &str, lookup: nix::Result<Option<nix::unistd::User>>) -> Result<u32> {
    match lookup {
        Ok(Some(user)) => Ok(user.uid.as_raw()),
        Ok(None) => Err(AppFwError::UnknownUser {
            name: name.to_string(),
        }),
        Err(errno) => {
            tracing::debug!("User database lookup for {} failed: {}", name, errno);
            Err(AppFwError::UnknownUser {
                name: name.to_string(),
            })
        }
    }
}

#[cfg(not(unix))]
pub fn resolve_user_id(name: &str) -> Result<u32> {
    Err(AppFwError::UnknownUser {
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_failed_user_lookup_reads_as_unknown_user() {
        let err = user_id_from_lookup("someone", Err(nix::errno::Errno::EIO)).unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(matches!(err, AppFwError::UnknownUser { ref name } if name == "someone"));

        let err = user_id_from_lookup("someone", Ok(None)).unwrap_err();
        assert!(matches!(err, AppFwError::UnknownUser { .. }));
    }

    #[test]
    fn test_default_spec_is_unusable() {
        assert!(!TargetSpec::new().is_usable());
        assert!(!TargetSpec::default().is_usable());
        assert!(TargetSpec::new().ensure_usable().unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_any_single_field_makes_spec_usable() {
        let specs = [
            TargetSpec::new().with_label("User::App::cam"),
            TargetSpec::new().with_app_id("cam1"),
            TargetSpec::new().with_binary("/usr/bin/cam"),
            TargetSpec::new().with_user("iot"),
            TargetSpec::new().with_process(1234),
        ];
        for spec in specs {
            assert!(spec.is_usable(), "expected usable: {:?}", spec);
        }
    }

    #[test]
    fn test_set_process_assigns_the_given_pid() {
        let mut spec = TargetSpec::new();
        spec.set_process(4242);
        assert_eq!(spec.process, Some(4242));
        assert!(spec.is_usable());
    }

    #[test]
    fn test_process_zero_counts_as_set() {
        let spec = TargetSpec::new().with_process(0);
        assert!(spec.is_usable());
    }

    #[test]
    fn test_setters_and_from_parts_agree() {
        let mut spec = TargetSpec::new();
        spec.set_label("label");
        spec.set_app_id("app");
        spec.set_binary("/bin/app");
        spec.set_user("root");
        spec.set_process(7);

        let parts = TargetSpec::from_parts(
            Some("label".into()),
            Some("app".into()),
            Some(PathBuf::from("/bin/app")),
            Some("root".into()),
            Some(7),
        );
        assert_eq!(spec, parts);
    }

    #[test]
    fn test_serialization_skips_unset_fields() {
        let spec = TargetSpec::new().with_app_id("cam1");
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json, serde_json::json!({"app_id": "cam1"}));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_root_user() {
        assert_eq!(resolve_user_id("root").unwrap(), 0);
    }

    #[test]
    fn test_resolve_unknown_user() {
        let err = resolve_user_id("no-such-user-appfw-test").unwrap_err();
        assert!(matches!(err, AppFwError::UnknownUser { .. }));
    }
}
