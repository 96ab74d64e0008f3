use super::ui;
use crate::core::CurrencyDirectory;
use crate::repository::RateRepository;
use anyhow::{Context, Result};
use comfy_table::Cell;

pub fn render_directory(directory: &CurrencyDirectory) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Code"), ui::header_cell("Name")]);
    for entry in directory.entries() {
        table.add_row(vec![Cell::new(entry.code), Cell::new(entry.name)]);
    }
    format!(
        "{}\n\n{}",
        ui::style_text(
            &format!("{} currencies", directory.len()),
            ui::StyleType::Title
        ),
        table
    )
}

pub async fn run(repository: &RateRepository, refresh: bool) -> Result<()> {
    let directory = if refresh {
        repository.refresh_currency_directory().await
    } else {
        repository.get_currency_directory().await
    }
    .context("Failed to load currency list")?;

    println!("{}", render_directory(&directory));
    Ok(())
}
