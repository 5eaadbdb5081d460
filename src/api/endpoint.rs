//! Catalog resources and the paths used to fetch them.

use std::fmt;

/// Query parameter appended to every catalog path
const EXPAND_PARAM: &str = "expand=has_balance";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Attribute,
    Category,
    Country,
    DataType,
    Item,
    ItemAttribute,
    ItemCategory,
    ItemModifier,
    Modifier,
    Option,
    PhotoSize,
    Trademark,
    Unit,
}

impl Resource {
    pub const ALL: [Resource; 13] = [
        Resource::Attribute,
        Resource::Category,
        Resource::Country,
        Resource::DataType,
        Resource::Item,
        Resource::ItemAttribute,
        Resource::ItemCategory,
        Resource::ItemModifier,
        Resource::Modifier,
        Resource::Option,
        Resource::PhotoSize,
        Resource::Trademark,
        Resource::Unit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Attribute => "attribute",
            Resource::Category => "category",
            Resource::Country => "country",
            Resource::DataType => "data-type",
            Resource::Item => "item",
            Resource::ItemAttribute => "item-attribute",
            Resource::ItemCategory => "item-category",
            Resource::ItemModifier => "item-modifier",
            Resource::Modifier => "modifier",
            Resource::Option => "option",
            Resource::PhotoSize => "photo-size",
            Resource::Trademark => "trademark",
            Resource::Unit => "unit",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single catalog lookup: resource, optional id, page and view flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub resource: Resource,
    pub id: Option<u64>,
    pub page: u32,
    /// Request the reduced `view=brief` representation
    pub brief: bool,
    /// Treat `id` as the secondary (sid) identifier
    pub by_sid: bool,
}

impl Endpoint {
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            id: None,
            page: 1,
            brief: false,
            by_sid: false,
        }
    }

    /// Relative path including the query string, e.g. `item/1?expand=has_balance`
    pub fn path(&self) -> String {
        let mut path = match self.id {
            Some(id) => format!("{}/{}", self.resource, id),
            None => self.resource.to_string(),
        };

        let mut params = Vec::with_capacity(4);
        if self.page > 1 {
            params.push(format!("p={}", self.page));
        }
        if self.brief {
            params.push("view=brief".to_string());
        }
        if self.by_sid {
            params.push("by_sid=true".to_string());
        }
        params.push(EXPAND_PARAM.to_string());

        path.push('?');
        path.push_str(&params.join("&"));
        path
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_path() {
        assert_eq!(
            Endpoint::new(Resource::Category).path(),
            "category?expand=has_balance"
        );
    }

    #[test]
    fn test_single_item_path() {
        let endpoint = Endpoint {
            id: Some(1),
            ..Endpoint::new(Resource::Item)
        };
        assert_eq!(endpoint.path(), "item/1?expand=has_balance");
    }

    #[test]
    fn test_first_page_is_omitted() {
        let first = Endpoint {
            page: 1,
            ..Endpoint::new(Resource::Trademark)
        };
        let zero = Endpoint {
            page: 0,
            ..Endpoint::new(Resource::Trademark)
        };
        assert_eq!(first.path(), "trademark?expand=has_balance");
        assert_eq!(zero.path(), "trademark?expand=has_balance");
    }

    #[test]
    fn test_all_flags_in_order() {
        let endpoint = Endpoint {
            resource: Resource::Item,
            id: Some(42),
            page: 3,
            brief: true,
            by_sid: true,
        };
        assert_eq!(
            endpoint.path(),
            "item/42?p=3&view=brief&by_sid=true&expand=has_balance"
        );
    }

    #[test]
    fn test_resource_names_are_kebab_case() {
        assert_eq!(Resource::DataType.as_str(), "data-type");
        assert_eq!(Resource::ItemModifier.as_str(), "item-modifier");
        assert_eq!(Resource::PhotoSize.as_str(), "photo-size");
        assert!(Resource::ALL
            .iter()
            .all(|r| !r.as_str().contains('_') && r.as_str() == r.as_str().to_lowercase()));
    }
}
