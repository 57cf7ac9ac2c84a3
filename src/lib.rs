/// deposit-predict library crate.
///
/// Exposes the prediction pipeline (records -> aligned matrix -> classifier)
/// as a public API so that integration tests in tests/ can import it via
/// `deposit_predict::`.
///
/// The binary entry point (src/main.rs) uses these same modules.
pub mod align;
pub mod artifact;
pub mod batch;
pub mod classifier;
pub mod context;
pub mod input;
pub mod record;
pub mod report;
