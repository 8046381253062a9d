//! Identifier helpers and store key layout

use bech32::Bech32m;
use uuid7::uuid7;

// construct a unique record id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// Human readable prefixes for each record family.
pub mod hrp {
    pub const VERSION: &str = "version_";
    pub const INVOICE: &str = "invoice_";
    pub const PAYMENT: &str = "payment_";
    pub const ISSUANCE: &str = "issuance_";
}

/// Key layout of the sled store. Every record family lives under its own prefix
/// in the default tree so that a single transaction can span all of them.
pub mod keys {
    pub const INVOICE_NUMBER_COUNTER: &str = "counter/invoice_number";

    pub fn version(version_id: &str) -> String {
        format!("version/{version_id}")
    }
    /// Version whose invoice action committed last.
    pub fn active(operation_id: &str, period: u16) -> String {
        format!("active/{operation_id}/{period}")
    }
    /// Most recently created, not withdrawn, version. Differs from `active` while a
    /// version is pending.
    pub fn head(operation_id: &str, period: u16) -> String {
        format!("head/{operation_id}/{period}")
    }
    /// Highest version number ever handed out, withdrawn versions included.
    pub fn last_number(operation_id: &str, period: u16) -> String {
        format!("last_number/{operation_id}/{period}")
    }
    pub fn emissions(input_hash: &str) -> String {
        format!("emissions/{input_hash}")
    }
    pub fn invoice(invoice_id: &str) -> String {
        format!("invoice/{invoice_id}")
    }
    pub fn current_invoice(operation_id: &str, period: u16) -> String {
        format!("current_invoice/{operation_id}/{period}")
    }
    pub fn invoice_action(version_id: &str) -> String {
        format!("action/{version_id}")
    }
    pub fn issuance(request_id: &str) -> String {
        format!("issuance/{request_id}")
    }
    pub fn issuance_by_version(version_id: &str) -> String {
        format!("issuance_by_version/{version_id}")
    }
}
