//! Explicit import of unencrypted legacy vaults.
//!
//! Early companion builds wrote the record document straight to disk as
//! plaintext JSON. Those files carry no salt, nonce, or tag, so nothing
//! about them is authenticated; they are only accepted through this
//! explicit operation, never through transparent auto-detection in
//! `decode`.

use crate::error::{FormatError, FormatResult};
use emma_store::RecordStore;

/// First byte of a legacy vault: the opening brace of the JSON document.
pub const LEGACY_SENTINEL: u8 = 0x7B;

/// Returns true if the bytes look like an unencrypted legacy vault.
pub fn is_legacy(bytes: &[u8]) -> bool {
    bytes.first() == Some(&LEGACY_SENTINEL)
}

/// Parses an unencrypted legacy vault.
///
/// The stats block of legacy files was maintained by hand in the old
/// builds and is not trusted; it is recomputed from the collections.
pub fn import_legacy(bytes: &[u8]) -> FormatResult<RecordStore> {
    if !is_legacy(bytes) {
        return Err(FormatError::InvalidFormat(
            "not a legacy vault (missing leading brace)".to_string(),
        ));
    }

    let mut records: RecordStore =
        serde_json::from_slice(bytes).map_err(|e| FormatError::CorruptPayload(e.to_string()))?;
    records.recompute_stats();
    Ok(records)
}
