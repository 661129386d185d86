//! Display names and icons for beverages and commands

use cremalink_device::{BeverageCatalog, BeverageCategory};

pub const DEFAULT_BEVERAGE_ICON: &str = "mdi:coffee";

pub fn category_icon(category: BeverageCategory) -> &'static str {
    match category {
        BeverageCategory::BlackCoffee => "mdi:coffee",
        BeverageCategory::MilkCoffee => "mdi:glass-mug-variant",
        BeverageCategory::HotOther => "mdi:cup-water",
        BeverageCategory::Iced => "mdi:snowflake",
        BeverageCategory::My => "mdi:star",
        BeverageCategory::MyIced => "mdi:star-outline",
        BeverageCategory::Carafe => "mdi:coffee-maker-outline",
        BeverageCategory::Special => "mdi:creation",
    }
}

/// `latte_macchiato` -> `Latte Macchiato`
pub fn title_case(snake: &str) -> String {
    snake
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Display name and icon of a beverage, falling back to the title-cased
/// name for beverages the catalog does not know
pub fn beverage_display(name: &str) -> (String, &'static str) {
    match BeverageCatalog::new().get_by_name(name) {
        Some(info) => (info.display_name.to_string(), category_icon(info.category)),
        None => (title_case(name), DEFAULT_BEVERAGE_ICON),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("brew_unit_cycles"), "Brew Unit Cycles");
        assert_eq!(title_case("MY_special__drink"), "My Special Drink");
    }

    #[test]
    fn test_beverage_display() {
        assert_eq!(
            beverage_display("cappuccino"),
            ("Cappuccino".to_string(), "mdi:glass-mug-variant")
        );
        assert_eq!(
            beverage_display("grande_mocha"),
            ("Grande Mocha".to_string(), DEFAULT_BEVERAGE_ICON)
        );
    }
}
