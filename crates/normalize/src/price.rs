//! Price range normalization

use localfind_core::PriceTier;

/// Map a price word or tier token to one of the four tier tokens.
pub fn normalize_price_range(input: &str) -> Option<PriceTier> {
    let cleaned = input.trim().to_lowercase();
    match cleaned.as_str() {
        "$" | "budget" | "cheap" | "affordable" | "inexpensive" | "sasta" => {
            Some(PriceTier::Budget)
        }
        "$$" | "moderate" | "mid-range" | "mid range" | "reasonable" => Some(PriceTier::Moderate),
        "$$$" | "expensive" | "pricey" | "upscale" | "premium" => Some(PriceTier::Premium),
        "$$$$" | "luxury" | "fine dining" | "high-end" | "high end" => Some(PriceTier::Luxury),
        _ => None,
    }
}
