/// Inspections are identified by UUIDs assigned at creation.
pub type InspectionId = uuid::Uuid;

/// Acting users and inspectors, as supplied by the auth layer.
pub type UserId = uuid::Uuid;

/// Vehicles are only ever referenced by id from an inspection.
pub type VehicleId = uuid::Uuid;

/// Document version. Starts at 1 and grows by exactly one per accepted mutation.
pub type Version = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
