//! Foreign key and trigger suspension around bulk load.
//!
//! Each toggle is a one-shot session or DDL operation. Nothing is tracked
//! per object: re-enabling always re-enables everything the vendor can
//! address. The bookkeeping SQL itself always runs with statement logging
//! suppressed.

use tracing::{debug, info, warn};

use crate::core::schema::ForeignKeyDescriptor;
use crate::core::session::SqlSession;
use crate::error::{CopyError, Result};
use crate::vendor::Vendor;

/// Which constraint family a toggle addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleKind {
    ForeignKeys,
    Triggers,
}

impl ToggleKind {
    fn label(self) -> &'static str {
        match self {
            ToggleKind::ForeignKeys => "foreign key checks",
            ToggleKind::Triggers => "triggers",
        }
    }
}

/// A paired disable/enable operation for one constraint family on the
/// target connection.
#[derive(Debug, Clone)]
pub struct ConstraintToggle {
    kind: ToggleKind,
    vendor: Vendor,
    constraints: Vec<ForeignKeyDescriptor>,
}

impl ConstraintToggle {
    /// Toggle for foreign key enforcement. Engines addressing constraints
    /// individually need the target's constraint list.
    #[must_use]
    pub fn foreign_keys(vendor: Vendor, constraints: Vec<ForeignKeyDescriptor>) -> Self {
        Self {
            kind: ToggleKind::ForeignKeys,
            vendor,
            constraints,
        }
    }

    /// Toggle for trigger execution.
    #[must_use]
    pub fn triggers(vendor: Vendor) -> Self {
        Self {
            kind: ToggleKind::Triggers,
            vendor,
            constraints: Vec::new(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ToggleKind {
        self.kind
    }

    /// Suspend this constraint family.
    pub async fn disable(&self, session: &dyn SqlSession) -> Result<()> {
        self.apply(session, false).await
    }

    /// Restore this constraint family.
    pub async fn enable(&self, session: &dyn SqlSession) -> Result<()> {
        self.apply(session, true).await
    }

    async fn apply(&self, session: &dyn SqlSession, enable: bool) -> Result<()> {
        let action = if enable { "enable" } else { "disable" };
        let statements = self.statements(enable)?;

        if statements.is_empty() {
            debug!(
                "No statements to {} {} on {}",
                action,
                self.kind.label(),
                self.vendor
            );
            return Ok(());
        }

        info!("Will {} {} in {}", action, self.kind.label(), self.vendor);

        let result = async {
            session.execute(&statements).await?;
            session.commit().await
        }
        .await;

        if let Err(e) = result {
            let _ = session.rollback().await;
            if self.kind == ToggleKind::ForeignKeys && self.vendor.foreign_keys_best_effort() {
                warn!(
                    "Could not {} {} on {} (requires superuser): {}",
                    action,
                    self.kind.label(),
                    self.vendor,
                    e
                );
                return Ok(());
            }
            return Err(CopyError::ConstraintToggle {
                toggle: self.kind.label(),
                action: if enable { "enable" } else { "disable" },
                message: e.to_string(),
            });
        }

        Ok(())
    }

    fn statements(&self, enable: bool) -> Result<Vec<String>> {
        match self.kind {
            ToggleKind::ForeignKeys => {
                if enable {
                    self.vendor.enable_foreign_keys_statements(&self.constraints)
                } else {
                    self.vendor
                        .disable_foreign_keys_statements(&self.constraints)
                }
            }
            ToggleKind::Triggers => Ok(if enable {
                self.vendor.enable_triggers_statements()
            } else {
                self.vendor.disable_triggers_statements()
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_vendor_surfaces_at_first_use() {
        // Construction succeeds; the error appears when statements are
        // first requested.
        let toggle = ConstraintToggle::foreign_keys(Vendor::Mssql, Vec::new());
        assert!(matches!(
            toggle.statements(false),
            Err(CopyError::VendorUnsupported { .. })
        ));
    }

    #[test]
    fn test_trigger_toggle_is_empty_for_most_engines() {
        let toggle = ConstraintToggle::triggers(Vendor::Postgres);
        assert!(toggle.statements(false).unwrap().is_empty());
        assert!(toggle.statements(true).unwrap().is_empty());
    }

    #[test]
    fn test_foreign_key_statements_flip_with_direction() {
        let toggle = ConstraintToggle::foreign_keys(Vendor::H2, Vec::new());
        assert_eq!(
            toggle.statements(false).unwrap(),
            vec!["SET REFERENTIAL_INTEGRITY false"]
        );
        assert_eq!(
            toggle.statements(true).unwrap(),
            vec!["SET REFERENTIAL_INTEGRITY true"]
        );
    }
}
