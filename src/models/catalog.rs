use serde::{Deserialize, Serialize};

/// A catalog item as returned by the `item` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: u64,
    /// Secondary id shown to shoppers
    pub sid: Option<u64>,
    pub name: Option<String>,
    pub price: Option<f64>,
    /// Present when the request expanded `has_balance`
    pub has_balance: Option<bool>,
    pub trademark_id: Option<u64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Item {
    pub fn display_name(&self) -> String {
        match (&self.name, self.sid) {
            (Some(name), Some(sid)) => format!("{} ({})", name, sid),
            (Some(name), None) => name.clone(),
            (None, Some(sid)) => format!("Item {}", sid),
            (None, None) => format!("Item #{}", self.id),
        }
    }

    pub fn in_stock(&self) -> bool {
        self.has_balance.unwrap_or(false)
    }
}

/// A category tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: u64,
    pub name: Option<String>,
    /// Dot-separated ids from the root, e.g. `"1.23.456"`
    pub path: Option<String>,
    pub level: Option<u32>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Category {
    pub fn parent_id(&self) -> Option<u64> {
        let path = self.path.as_deref()?;
        let mut ids = path.rsplit('.');
        ids.next()?;
        ids.next()?.parse().ok()
    }

    pub fn is_root(&self) -> bool {
        self.level
            .map(|l| l <= 1)
            .unwrap_or_else(|| self.parent_id().is_none())
    }
}
