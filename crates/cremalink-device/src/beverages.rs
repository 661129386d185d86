//! Beverage catalog
//!
//! Maps the snake_case beverage names used by device maps and counters to
//! display names and menu categories.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeverageCategory {
    BlackCoffee,
    MilkCoffee,
    HotOther,
    Iced,
    My,
    MyIced,
    Carafe,
    Special,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeverageInfo {
    pub name: &'static str,
    pub display_name: &'static str,
    pub category: BeverageCategory,
}

const fn bev(
    name: &'static str,
    display_name: &'static str,
    category: BeverageCategory,
) -> BeverageInfo {
    BeverageInfo {
        name,
        display_name,
        category,
    }
}

use BeverageCategory::*;

static BEVERAGES: &[BeverageInfo] = &[
    bev("espresso", "Espresso", BlackCoffee),
    bev("doppio", "Doppio", BlackCoffee),
    bev("doppio_plus", "Doppio+", BlackCoffee),
    bev("coffee", "Coffee", BlackCoffee),
    bev("long", "Long Coffee", BlackCoffee),
    bev("americano", "Americano", BlackCoffee),
    bev("ristretto", "Ristretto", BlackCoffee),
    bev("cappuccino", "Cappuccino", MilkCoffee),
    bev("cappuccino_doppio_plus", "Cappuccino Doppio+", MilkCoffee),
    bev("cappuccino_mix", "Cappuccino Mix", MilkCoffee),
    bev("latte_macchiato", "Latte Macchiato", MilkCoffee),
    bev("caffe_latte", "Caffè Latte", MilkCoffee),
    bev("flat_white", "Flat White", MilkCoffee),
    bev("espresso_macchiato", "Espresso Macchiato", MilkCoffee),
    bev("cortado", "Cortado", MilkCoffee),
    bev("hot_milk", "Hot Milk", HotOther),
    bev("hot_water", "Hot Water", HotOther),
    bev("tea", "Tea", HotOther),
    bev("iced_americano", "Iced Americano", Iced),
    bev("iced_latte", "Iced Latte", Iced),
    bev("iced_cappuccino", "Iced Cappuccino", Iced),
    bev("my_coffee", "My Coffee", My),
    bev("my_iced_coffee", "My Iced Coffee", MyIced),
    bev("coffee_pot", "Coffee Pot", Carafe),
    bev("carafe_latte", "Latte Carafe", Carafe),
    bev("cold_brew", "Cold Brew", Special),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct BeverageCatalog;

impl BeverageCatalog {
    pub fn new() -> Self {
        Self
    }

    /// Look up a beverage by its snake_case name, ignoring case
    pub fn get_by_name(&self, name: &str) -> Option<&'static BeverageInfo> {
        BEVERAGES.iter().find(|b| b.name.eq_ignore_ascii_case(name))
    }

    pub fn all(&self) -> &'static [BeverageInfo] {
        BEVERAGES
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_ignores_case() {
        let catalog = BeverageCatalog::new();
        let info = catalog.get_by_name("Latte_Macchiato").unwrap();
        assert_eq!(info.display_name, "Latte Macchiato");
        assert_eq!(info.category, BeverageCategory::MilkCoffee);
        assert!(catalog.get_by_name("stop").is_none());
    }

    #[test]
    fn test_names_are_unique() {
        let catalog = BeverageCatalog::new();
        for (i, a) in catalog.all().iter().enumerate() {
            assert!(catalog.all()[i + 1..].iter().all(|b| b.name != a.name));
        }
    }
}
