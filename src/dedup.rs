//! Library lookup that lets a batch skip items it has already enriched.
use crate::model::{EnrichedRecord, IdentityRecord};

/// First library entry sharing the identity key of `identity`.
///
/// Linear scan; batches are capped at a hundred rows so this stays cheap.
pub fn find_existing<'a>(
    library: &'a [EnrichedRecord],
    identity: &IdentityRecord,
) -> Option<&'a EnrichedRecord> {
    let key = identity.key();
    library.iter().find(|record| record.identity.key() == key)
}
