//! Presentation tables applied at the API boundary.

use wastd_core::qa::QaStatus;

/// Human-readable name of a QA status.
pub fn status_label(status: QaStatus) -> &'static str {
  match status {
    QaStatus::New => "New",
    QaStatus::Imported => "Imported",
    QaStatus::ManualInput => "Manual input",
    QaStatus::Proofread => "Proofread",
    QaStatus::Curated => "Curated",
    QaStatus::Published => "Published",
    QaStatus::Flagged => "Flagged",
    QaStatus::Rejected => "Rejected",
  }
}

/// Bootstrap contextual class used to colour a status badge.
pub fn status_badge(status: QaStatus) -> &'static str {
  match status {
    QaStatus::New | QaStatus::Imported | QaStatus::ManualInput => "secondary",
    QaStatus::Proofread | QaStatus::Flagged => "warning",
    QaStatus::Curated => "success",
    QaStatus::Published => "info",
    QaStatus::Rejected => "danger",
  }
}
