use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use tracing::debug;
use usage_core::{PricingTable, PricingTableInput};

use crate::error::{AppError, Result};

/// Loads a pricing override file; a missing path means the builtin table.
pub fn load_pricing_table(path: Option<&Path>) -> Result<PricingTable> {
    let Some(path) = path else {
        return Ok(PricingTable::builtin().clone());
    };
    let input = load_pricing_input(path)?;
    debug!(
        path = %path.display(),
        models = input.models.len(),
        prefixes = input.prefixes.len(),
        "loaded pricing override"
    );
    Ok(PricingTable::from_input(input)?)
}

pub fn load_pricing_input(path: &Path) -> Result<PricingTableInput> {
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader).map_err(AppError::from)
}

/// Writes the builtin table as an editable override file.
pub fn write_pricing_defaults(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, &PricingTable::builtin_input()).map_err(AppError::from)
}
