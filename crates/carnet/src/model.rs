//! Core domain types for carnet.
//!
//! Vehicles are identified by their plate. Documents reference a vehicle by
//! plate and carry the expiration date that drives every reminder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VehicleType {
    /// A passenger car.
    #[default]
    #[serde(rename = "voiture")]
    Car,
    /// A motorcycle.
    #[serde(rename = "moto")]
    Motorcycle,
}

impl VehicleType {
    /// The stored representation of this vehicle type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Car => "voiture",
            Self::Motorcycle => "moto",
        }
    }

    /// Parse a stored vehicle type, returning `None` for unknown values.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "voiture" => Some(Self::Car),
            "moto" => Some(Self::Motorcycle),
            _ => None,
        }
    }
}

impl std::fmt::Display for VehicleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    /// Row identifier (assigned by storage layer).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// Registration plate, unique across vehicles.
    pub plate: String,

    /// Manufacturer.
    pub make: String,

    /// Model name.
    pub model: String,

    /// Usual driver.
    pub driver: String,

    /// Driver's phone number.
    pub phone: String,

    /// Car or motorcycle.
    pub vehicle_type: VehicleType,

    /// When the record was created.
    pub created_at: DateTime<Utc>,

    /// When the record was last modified.
    pub updated_at: DateTime<Utc>,
}

impl Vehicle {
    /// Create a new, unsaved vehicle.
    #[must_use]
    pub fn new(plate: impl Into<String>, vehicle_type: VehicleType) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            plate: plate.into(),
            make: String::new(),
            model: String::new(),
            driver: String::new(),
            phone: String::new(),
            vehicle_type,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Common document categories.
///
/// Document types are free-form strings; these are the ones offered by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    /// Insurance certificate.
    Insurance,
    /// Registration card.
    Registration,
    /// Technical inspection.
    Inspection,
    /// Road tax sticker.
    TaxSticker,
    /// Anything else.
    Other,
}

impl DocumentKind {
    /// All known kinds, in display order.
    pub const ALL: [Self; 5] = [
        Self::Insurance,
        Self::Registration,
        Self::Inspection,
        Self::TaxSticker,
        Self::Other,
    ];

    /// The label stored in `Document::document_type`.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Insurance => "Assurance",
            Self::Registration => "Carte Grise",
            Self::Inspection => "Contrôle Technique",
            Self::TaxSticker => "Vignette",
            Self::Other => "Autre",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A regulatory document attached to a vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier (assigned by storage layer, never reused).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// Reference number printed on the document.
    pub reference: String,

    /// Category, e.g. "Assurance".
    pub document_type: String,

    /// Plate of the vehicle this document belongs to.
    pub vehicle_plate: String,

    /// Start of validity. Informational only.
    pub valid_from: DateTime<Utc>,

    /// Expiration instant.
    pub expires_at: DateTime<Utc>,

    /// Inactive documents never get reminders.
    pub active: bool,

    /// When the record was created.
    pub created_at: DateTime<Utc>,

    /// When the record was last modified.
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Create a new, unsaved, active document.
    #[must_use]
    pub fn new(
        document_type: impl Into<String>,
        vehicle_plate: impl Into<String>,
        valid_from: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            reference: String::new(),
            document_type: document_type.into(),
            vehicle_plate: vehicle_plate.into(),
            valid_from,
            expires_at,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the reference number.
    #[must_use]
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }

    /// Set the identifier, as if the document had been stored.
    #[must_use]
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    /// Mark the document active or inactive.
    #[must_use]
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_vehicle_type_round_trip() {
        for vt in [VehicleType::Car, VehicleType::Motorcycle] {
            assert_eq!(VehicleType::parse(vt.as_str()), Some(vt));
        }
        assert_eq!(VehicleType::parse("camion"), None);
    }

    #[test]
    fn test_vehicle_type_serde_uses_stored_names() {
        let json = serde_json::to_string(&VehicleType::Motorcycle).unwrap();
        assert_eq!(json, "\"moto\"");
        let parsed: VehicleType = serde_json::from_str("\"voiture\"").unwrap();
        assert_eq!(parsed, VehicleType::Car);
    }

    #[test]
    fn test_vehicle_new() {
        let vehicle = Vehicle::new("AB-123-CD", VehicleType::Car);
        assert!(vehicle.id.is_none());
        assert_eq!(vehicle.plate, "AB-123-CD");
        assert_eq!(vehicle.created_at, vehicle.updated_at);
    }

    #[test]
    fn test_document_new_is_active() {
        let start = Utc::now();
        let doc = Document::new("Assurance", "AB-123-CD", start, start + Duration::days(365));
        assert!(doc.active);
        assert!(doc.id.is_none());
        assert!(doc.reference.is_empty());
    }

    #[test]
    fn test_document_builders() {
        let start = Utc::now();
        let doc = Document::new("Vignette", "X", start, start)
            .with_id(7)
            .with_reference("REF-1")
            .with_active(false);
        assert_eq!(doc.id, Some(7));
        assert_eq!(doc.reference, "REF-1");
        assert!(!doc.active);
    }

    #[test]
    fn test_document_kind_labels() {
        assert_eq!(DocumentKind::Insurance.to_string(), "Assurance");
        assert_eq!(DocumentKind::Inspection.label(), "Contrôle Technique");
        assert_eq!(DocumentKind::ALL.len(), 5);
    }

    #[test]
    fn test_document_serialization_skips_missing_id() {
        let start = Utc::now();
        let doc = Document::new("Assurance", "X", start, start);
        let json = serde_json::to_string(&doc).unwrap();
        assert!(!json.contains("\"id\""));
        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
    }
}
