//! `quillflow stages` - print the fixed pipeline order.

use anyhow::Result;
use quillflow_store::STAGE_ORDER;

pub fn run() -> Result<()> {
    println!("Pipeline stages (fixed order):");
    for (idx, stage) in STAGE_ORDER.iter().enumerate() {
        let terminal = if stage.is_terminal() { "  [terminal]" } else { "" };
        println!(
            "  {}. {:<14} -> {}{terminal}",
            idx + 1,
            stage.as_str(),
            stage.doc().file_name()
        );
    }
    Ok(())
}
