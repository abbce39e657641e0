/// Flowcell barcode suffixes that name the chemistry version directly.
const VERSION_SUFFIXES: [&str; 2] = ["V2", "V3"];

/// Number of trailing barcode characters used when no version suffix is present.
const CHEMISTRY_CODE_LEN: usize = 4;

/// Derive the chemistry code from a flowcell barcode.
///
/// A trailing `V2` or `V3` is the code. Otherwise the code is the last four
/// characters of the barcode. The result is always upper case.
pub fn chemistry_code(flowcell_barcode: &str) -> String {
    let barcode = flowcell_barcode.trim().to_ascii_uppercase();
    if let Some(suffix) = VERSION_SUFFIXES.iter().find(|s| barcode.ends_with(*s)) {
        return (*suffix).to_string();
    }
    let start = barcode
        .char_indices()
        .rev()
        .nth(CHEMISTRY_CODE_LEN - 1)
        .map_or(0, |(i, _)| i);
    barcode[start..].to_string()
}
