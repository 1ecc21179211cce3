use std::io::Write;

use quantofy_storefront::AppState;
use quantofy_storefront::catalog;

use super::CommandError;

/// List active products, optionally narrowed by query and category.
pub fn list(
    state: &AppState,
    search: Option<&str>,
    category: Option<&str>,
    out: &mut impl Write,
) -> Result<(), CommandError> {
    let products: Vec<_> = catalog::stored(state.storage())
        .into_iter()
        .filter(|p| p.active)
        .filter(|p| search.is_none_or(|q| p.matches(q)))
        .filter(|p| category.is_none_or(|c| p.category.eq_ignore_ascii_case(c)))
        .collect();

    for product in &products {
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t-{}%",
            product.id,
            product.title,
            product.category,
            product.price,
            product.discount_percent(),
        )?;
    }
    writeln!(out, "{} product(s)", products.len())?;
    Ok(())
}
