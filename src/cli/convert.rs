use super::ui;
use crate::repository::RateRepository;
use anyhow::{Context, Result};

pub fn render_conversion(from: &str, to: &str, amount: f64, converted: f64) -> String {
    format!(
        "{amount:.2} {} = {}",
        from.to_ascii_uppercase(),
        ui::style_text(
            &format!("{converted:.2} {}", to.to_ascii_uppercase()),
            ui::StyleType::TotalValue
        )
    )
}

pub async fn run(repository: &RateRepository, from: &str, to: &str, amount: f64) -> Result<()> {
    let converted = repository
        .calculate_conversion(from, to, amount)
        .await
        .with_context(|| format!("Failed to convert {amount} {from} to {to}"))?;
    println!("{}", render_conversion(from, to, amount, converted));
    Ok(())
}
