//! Identity documents attached to individuals.

use serde::{Deserialize, Serialize};

use crate::types::{DocumentId, DocumentStatus, IndividualId};

/// An identity document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier
    pub id: DocumentId,
    /// Holder of the document
    pub individual_id: IndividualId,
    /// Document type key (e.g. `national_id`)
    pub document_type: String,
    /// Number printed on the document
    pub document_number: String,
    /// Issuing country
    #[serde(default)]
    pub country: Option<String>,
    /// Validation status
    #[serde(default)]
    pub status: DocumentStatus,
}

impl Document {
    /// Create a pending document.
    pub fn new(
        individual_id: impl Into<IndividualId>,
        document_type: impl Into<String>,
        document_number: impl Into<String>,
    ) -> Self {
        Self {
            id: DocumentId::generate(),
            individual_id: individual_id.into(),
            document_type: document_type.into(),
            document_number: document_number.into(),
            country: None,
            status: DocumentStatus::Pending,
        }
    }

    /// Key used to detect document-number collisions.
    pub fn dedup_key(&self) -> (&str, &str, Option<&str>) {
        (
            self.document_type.as_str(),
            self.document_number.as_str(),
            self.country.as_deref(),
        )
    }
}
