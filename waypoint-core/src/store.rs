//! Pluggable persistence seam for learned-state snapshots.

use waypoint_types::GatewayError;

/// Key/value-style sink the snapshot timer writes through.
///
/// The gateway owns the encoding; stores see opaque blobs. Implementations
/// decide durability (file, object store, Redis, ...) and must tolerate
/// being called from the snapshot timer task.
pub trait SnapshotStore: Send + Sync {
    /// Persist the latest snapshot blob, replacing any previous one.
    ///
    /// # Errors
    /// Returns a [`GatewayError`] when the blob could not be persisted; the
    /// gateway logs the failure and retries at the next interval.
    fn save(&self, blob: &[u8]) -> Result<(), GatewayError>;

    /// Load the most recent snapshot blob, if one exists.
    ///
    /// # Errors
    /// Returns a [`GatewayError`] when the store is unreadable.
    fn load(&self) -> Result<Option<Vec<u8>>, GatewayError>;
}
