use crate::editor::{Notice, SelectableList};
use crate::models::{MetadataSource, MoveDirection};
use tracing::info;

/// The metadata list has no backing endpoint yet; its contents are fixed.
pub fn builtin_metadata_sources() -> Vec<MetadataSource> {
    vec![
        MetadataSource {
            name: "TMDB".into(),
            status_label: "configured".into(),
        },
        MetadataSource {
            name: "Bangumi".into(),
            status_label: "authorized".into(),
        },
    ]
}

#[derive(Debug, Clone)]
pub struct MetadataListEditor {
    list: SelectableList<MetadataSource>,
}

impl Default for MetadataListEditor {
    fn default() -> Self {
        Self {
            list: SelectableList::new(builtin_metadata_sources()),
        }
    }
}

impl MetadataListEditor {
    pub fn items(&self) -> &[MetadataSource] {
        self.list.items()
    }

    pub fn selected(&self) -> Option<usize> {
        self.list.selected()
    }

    pub fn load(&mut self) {
        self.list.replace(builtin_metadata_sources());
    }

    pub fn select_next(&mut self) {
        self.list.select_next();
    }

    pub fn select_previous(&mut self) {
        self.list.select_previous();
    }

    pub fn move_selected(&mut self, direction: MoveDirection) -> bool {
        self.list.move_selected(direction)
    }

    pub fn save(&self) -> Notice {
        info!("metadata source order save requested; no backend endpoint");
        Notice::info("Saving the metadata source order is not implemented yet.")
    }
}
