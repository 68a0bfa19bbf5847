// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::{DiagnosticContext, ValidationError, Violation};

/// One reported violation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub address: u32,
    pub violation: Violation,
    pub context: Option<DiagnosticContext>,
}

/// Violations reported by one validation call, in emission order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    entries: Vec<ReportEntry>,
    verdict: Option<ValidationError>,
}

impl ValidationReport {
    /// Runs `validate` with a callback that records every violation.
    ///
    /// ```
    /// use sfi_core::{ValidationReport, Violation};
    ///
    /// let report = ValidationReport::collect(|on_violation| {
    ///     on_violation(0x1000, Violation::CallPosition, None);
    ///     Ok(())
    /// });
    /// assert_eq!(report.entries().len(), 1);
    /// ```
    pub fn collect<F>(validate: F) -> Self
    where
        F: FnOnce(
            &mut dyn FnMut(u32, Violation, Option<DiagnosticContext>),
        ) -> Result<(), ValidationError>,
    {
        let mut entries = Vec::new();
        let result = validate(&mut |address, violation, context| {
            entries.push(ReportEntry {
                address,
                violation,
                context,
            });
        });
        ValidationReport {
            entries,
            verdict: result.err(),
        }
    }

    /// Returns true if the code was accepted
    pub fn is_ok(&self) -> bool {
        self.verdict.is_none() && self.entries.is_empty()
    }

    pub fn verdict(&self) -> Option<&ValidationError> {
        self.verdict.as_ref()
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    /// Consumes the report and returns the entries
    pub fn into_entries(self) -> Vec<ReportEntry> {
        self.entries
    }

    /// The reported violation kinds, in emission order
    pub fn violations(&self) -> impl Iterator<Item = Violation> + '_ {
        self.entries.iter().map(|entry| entry.violation)
    }
}

#[cfg(test)]
mod tests {
    use super::ValidationReport;
    use crate::{ValidationError, Violation};

    #[test]
    fn test_collects_in_emission_order() {
        let report = ValidationReport::collect(|on_violation| {
            on_violation(0x1010, Violation::ReadOnly, None);
            on_violation(0x1004, Violation::LoadStore, None);
            Err(ValidationError::Violations { count: 2 })
        });
        assert!(!report.is_ok());
        assert_eq!(
            report.violations().collect::<Vec<_>>(),
            vec![Violation::ReadOnly, Violation::LoadStore]
        );
        assert_eq!(report.entries()[1].address, 0x1004);
        assert!(matches!(
            report.verdict(),
            Some(ValidationError::Violations { count: 2 })
        ));
    }

    #[test]
    fn test_empty_report_is_ok() {
        let report = ValidationReport::collect(|_| Ok(()));
        assert!(report.is_ok());
        assert!(report.into_entries().is_empty());
    }
}
