use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Field key -> display label, in the order the server declared them.
pub type FieldDefs = IndexMap<String, String>;

/// Field key -> current value for one provider.
pub type ConfigFieldSet = IndexMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Danmaku,
    Metadata,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Danmaku, Category::Metadata];

    pub fn as_label(self) -> &'static str {
        match self {
            Category::Danmaku => "danmaku",
            Category::Metadata => "metadata",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Category::Danmaku => "Danmaku Sources",
            Category::Metadata => "Metadata Sources",
        }
    }

    /// Path segment under the API prefix. Only danmaku sources are served.
    pub fn path_segment(self) -> Option<&'static str> {
        match self {
            Category::Danmaku => Some("scrapers"),
            Category::Metadata => None,
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "danmaku" => Some(Category::Danmaku),
            "metadata" => Some(Category::Metadata),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRecord {
    #[serde(rename = "provider_name")]
    pub name: String,
    #[serde(rename = "is_enabled")]
    pub enabled: bool,
    #[serde(rename = "display_order", default)]
    pub order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configurable_fields: Option<FieldDefs>,
}

impl ProviderRecord {
    pub fn is_configurable(&self) -> bool {
        self.configurable_fields
            .as_ref()
            .is_some_and(|fields| !fields.is_empty())
    }

    pub fn status_glyph(&self) -> &'static str {
        if self.enabled {
            "on"
        } else {
            "off"
        }
    }
}

/// Persistence-ready form of a record; `order` comes from list position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderOrder {
    pub provider_name: String,
    pub is_enabled: bool,
    pub display_order: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataSource {
    pub name: String,
    pub status_label: String,
}
