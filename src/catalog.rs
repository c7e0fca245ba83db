use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PennyError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub id: u32,
    pub name: String,
    pub unit_price: f64,
    /// Play-money units earned per second per owned unit.
    pub income_rate: f64,
}

// (name, unit_price, income_rate per second); ids are assigned 1.. in order
const BUILTIN_GPUS: &[(&str, f64, f64)] = &[
    ("GeForce GT 710 1GB", 5.0, 0.0000010),
    ("GeForce GT 730 2GB", 9.0, 0.0000018),
    ("Radeon R7 240", 12.0, 0.0000025),
    ("GeForce GTX 750 Ti", 20.0, 0.0000040),
    ("Radeon RX 460", 30.0, 0.0000060),
    ("GeForce GTX 950", 42.0, 0.0000085),
    ("Radeon RX 560", 60.0, 0.0000120),
    ("GeForce GTX 1050", 90.0, 0.0000180),
    ("GeForce GTX 1050 Ti", 125.0, 0.0000250),
    ("Radeon RX 570 4GB", 200.0, 0.0000400),
    ("GeForce GTX 1060 3GB", 250.0, 0.0000500),
    ("GeForce GTX 1060 6GB", 300.0, 0.0000600),
    ("Radeon RX 580 8GB", 375.0, 0.0000750),
    ("GeForce GTX 1070", 500.0, 0.0001000),
    ("GeForce GTX 1070 Ti", 600.0, 0.0001200),
    ("Radeon VII", 750.0, 0.0001500),
    ("GeForce GTX 1080", 900.0, 0.0001800),
    ("GeForce GTX 1080 Ti", 1100.0, 0.0002200),
    ("Radeon RX 5600 XT", 1300.0, 0.0002600),
    ("Radeon RX 5700", 1500.0, 0.0003000),
    ("Radeon RX 5700 XT", 1750.0, 0.0003500),
    ("GeForce RTX 2060", 2000.0, 0.0004000),
    ("GeForce RTX 2060 Super", 2350.0, 0.0004700),
    ("GeForce RTX 2070", 2700.0, 0.0005400),
    ("GeForce RTX 2070 Super", 3100.0, 0.0006200),
    ("GeForce RTX 2080", 3500.0, 0.0007000),
    ("GeForce RTX 2080 Super", 3900.0, 0.0007800),
    ("GeForce RTX 2080 Ti", 4500.0, 0.0009000),
    ("Radeon RX 6600", 5000.0, 0.0010000),
    ("Radeon RX 6600 XT", 5750.0, 0.0011500),
    ("Radeon RX 6700 XT", 6750.0, 0.0013500),
    ("GeForce RTX 3060 12GB", 7500.0, 0.0015000),
    ("GeForce RTX 3060 Ti", 9000.0, 0.0018000),
    ("GeForce RTX 3070", 10500.0, 0.0021000),
    ("GeForce RTX 3070 Ti", 12000.0, 0.0024000),
    ("GeForce RTX 3080 10GB", 14000.0, 0.0028000),
    ("GeForce RTX 3080 Ti", 16000.0, 0.0032000),
    ("Radeon RX 6800", 17000.0, 0.0034000),
    ("Radeon RX 6800 XT", 19000.0, 0.0038000),
    ("Radeon RX 6900 XT", 21000.0, 0.0042000),
    ("GeForce RTX 3090", 24000.0, 0.0048000),
    ("GeForce RTX 3090 Ti", 27500.0, 0.0055000),
    ("Radeon RX 7600", 30000.0, 0.0060000),
    ("Radeon RX 7700 XT", 35000.0, 0.0070000),
    ("Radeon RX 7800 XT", 40000.0, 0.0080000),
    ("GeForce RTX 4060", 42500.0, 0.0085000),
    ("GeForce RTX 4060 Ti", 47500.0, 0.0095000),
    ("GeForce RTX 4070", 52500.0, 0.0105000),
    ("GeForce RTX 4070 Ti", 60000.0, 0.0120000),
    ("GeForce RTX 4070 Ti Super", 67500.0, 0.0135000),
    ("Radeon RX 7900 GRE", 70000.0, 0.0140000),
    ("Radeon RX 7900 XT", 77500.0, 0.0155000),
    ("Radeon RX 7900 XTX", 85000.0, 0.0170000),
    ("GeForce RTX 4080 12GB (Super)", 90000.0, 0.0180000),
    ("GeForce RTX 4080 16GB", 95000.0, 0.0190000),
    ("GeForce RTX 4080 Super", 100000.0, 0.0200000),
    ("GeForce RTX 4090", 110000.0, 0.0220000),
    ("GeForce RTX 4090 D", 115000.0, 0.0230000),
    ("GeForce RTX 4090 Ti (myth)", 125000.0, 0.0250000),
];

pub const SHOP_PAGE_SIZE: usize = 10;

/// Read-only lookup table of purchasable items.
#[derive(Debug, Clone)]
pub struct Catalog {
    items: Vec<CatalogItem>,
    by_id: HashMap<u32, usize>,
}

pub struct ShopPage<'a> {
    pub page: usize,
    pub pages: usize,
    pub items: &'a [CatalogItem],
}

impl Catalog {
    pub fn new(items: Vec<CatalogItem>) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(items.len());
        for (idx, item) in items.iter().enumerate() {
            if !(item.unit_price >= 0.0 && item.income_rate >= 0.0) {
                return Err(PennyError::Invalid(format!(
                    "catalog item {} has a negative or NaN price/rate",
                    item.id
                )));
            }
            if by_id.insert(item.id, idx).is_some() {
                return Err(PennyError::AlreadyExists(format!("catalog item {}", item.id)));
            }
        }
        Ok(Self { items, by_id })
    }

    pub fn builtin() -> Self {
        let items = BUILTIN_GPUS
            .iter()
            .enumerate()
            .map(|(i, (name, price, rate))| CatalogItem {
                id: i as u32 + 1,
                name: name.to_string(),
                unit_price: *price,
                income_rate: *rate,
            })
            .collect::<Vec<_>>();
        let by_id = items.iter().enumerate().map(|(idx, item)| (item.id, idx)).collect();
        Self { items, by_id }
    }

    /// Load a JSON array of items, e.g. a seasonal shop.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let items: Vec<CatalogItem> = serde_json::from_str(&content)?;
        Self::new(items)
    }

    pub fn get(&self, id: u32) -> Option<&CatalogItem> {
        self.by_id.get(&id).map(|&idx| &self.items[idx])
    }

    pub fn require(&self, id: u32) -> Result<&CatalogItem> {
        self.get(id)
            .ok_or_else(|| PennyError::NotFound(format!("catalog item {id}")))
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    /// One shop page (1-based); out-of-range pages are clamped.
    pub fn page(&self, page: usize, size: usize) -> ShopPage<'_> {
        let size = size.max(1);
        let pages = self.items.len().div_ceil(size).max(1);
        let page = page.clamp(1, pages);
        let start = ((page - 1) * size).min(self.items.len());
        let end = (start + size).min(self.items.len());
        ShopPage {
            page,
            pages,
            items: &self.items[start..end],
        }
    }

    /// Sum of income rates over an owned multiset. Unknown ids earn nothing.
    pub fn income_rate<'a, I>(&self, owned: I) -> f64
    where
        I: IntoIterator<Item = (&'a u32, &'a u32)>,
    {
        owned
            .into_iter()
            .filter_map(|(id, units)| self.get(*id).map(|item| item.income_rate * *units as f64))
            .sum()
    }
}
