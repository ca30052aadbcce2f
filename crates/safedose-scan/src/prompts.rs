//! Prompts for AI-assisted syringe and vial scans.
//!
//! The model sees a photo of a syringe and/or a vial label and answers with a
//! single JSON object. Anything it cannot read must be reported as
//! `"unreadable"` rather than guessed.

/// System prompt for the vision model.
pub const SYSTEM_PROMPT: &str = r#"You are a careful assistant that reads syringes and medication vial labels from photos.

Report only what is printed or marked on the items. Never estimate, infer or calculate a value.
If a field is present but cannot be read with confidence, answer "unreadable".
If a field is not visible at all, answer null.

Syringe fields:
- type: "Insulin" if the barrel is marked in units, "Standard" if marked in mL
- volume: total capacity as printed (e.g. "1 ml", "3 ml", "100 units")
- markings: description of the graduation marks (e.g. "0.1 ml increments")

Vial fields:
- substance: name of the medication or compound
- totalAmount: total amount in the vial (e.g. "10 mg", "5000 mcg")
- concentration: amount per mL (e.g. "100 units/mL", "2 mg/mL")
- expiration: expiration date as printed

Output exactly one JSON object with "syringe" and "vial" keys."#;

/// Example of a well-formed response.
pub const SCAN_RESPONSE_EXAMPLE: &str = r#"{"syringe":{"type":"Insulin","volume":"100 units","markings":"2 unit increments"},"vial":{"substance":"Insulin glargine","totalAmount":null,"concentration":"100 units/mL","expiration":"unreadable"}}"#;

/// User prompt accompanying the scan image.
pub fn make_scan_prompt() -> String {
    format!(
        r#"Read the syringe and vial in this image.

Return a JSON object shaped like this example:
{}

Use "unreadable" for anything you can see but cannot read, and null for anything not in the image."#,
        SCAN_RESPONSE_EXAMPLE
    )
}
