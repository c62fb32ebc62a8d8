use crate::editor::{Notice, SelectableList};
use crate::error::AppError;
use crate::models::{Category, FieldDefs, MoveDirection, ProviderOrder, ProviderRecord};
use crate::store::{order_entries, SourceStore};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListView {
    NotLoaded,
    Loading,
    Ready,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveState {
    Idle,
    Busy,
}

/// Identifies one load request; results carrying an older ticket are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket(u64);

#[derive(Debug)]
pub struct ProviderListEditor {
    category: Category,
    list: SelectableList<ProviderRecord>,
    view: ListView,
    save_state: SaveState,
    generation: u64,
    in_flight: Option<u64>,
}

impl ProviderListEditor {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            list: SelectableList::default(),
            view: ListView::NotLoaded,
            save_state: SaveState::Idle,
            generation: 0,
            in_flight: None,
        }
    }

    pub fn items(&self) -> &[ProviderRecord] {
        self.list.items()
    }

    pub fn selected(&self) -> Option<usize> {
        self.list.selected()
    }

    pub fn selected_record(&self) -> Option<&ProviderRecord> {
        self.list.selected_item()
    }

    pub fn view(&self) -> &ListView {
        &self.view
    }

    pub fn is_saving(&self) -> bool {
        self.save_state == SaveState::Busy
    }

    /// Starts a load; `None` while another load is still outstanding.
    pub fn begin_load(&mut self) -> Option<LoadTicket> {
        if self.in_flight.is_some() {
            return None;
        }
        self.generation += 1;
        self.in_flight = Some(self.generation);
        self.list.replace(Vec::new());
        self.view = ListView::Loading;
        Some(LoadTicket(self.generation))
    }

    /// Applies a load result. Returns `false` when the ticket is stale.
    pub fn finish_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<Vec<ProviderRecord>, AppError>,
    ) -> bool {
        if self.in_flight != Some(ticket.0) {
            warn!(category = %self.category, "discarding stale source list response");
            return false;
        }
        self.in_flight = None;
        match result {
            Ok(records) => {
                info!(category = %self.category, count = records.len(), "source list loaded");
                self.list.replace(records);
                self.view = ListView::Ready;
            }
            Err(err) => {
                warn!(category = %self.category, error = %err, "source list load failed");
                self.list.replace(Vec::new());
                self.view = ListView::Failed(format!("Load failed: {err}"));
            }
        }
        true
    }

    /// Forgets any outstanding load, e.g. when the view is left.
    pub fn detach(&mut self) {
        if self.in_flight.take().is_some() {
            self.generation += 1;
            self.view = ListView::NotLoaded;
        }
    }

    pub async fn load(&mut self, store: &dyn SourceStore) -> bool {
        let Some(ticket) = self.begin_load() else {
            return false;
        };
        let result = store.list(self.category).await;
        self.finish_load(ticket, result)
    }

    pub fn select(&mut self, index: usize) -> bool {
        self.list.select(index)
    }

    pub fn select_next(&mut self) {
        self.list.select_next();
    }

    pub fn select_previous(&mut self) {
        self.list.select_previous();
    }

    /// Flips the selected record's flag in memory only.
    pub fn toggle_enabled(&mut self) -> bool {
        match self.list.selected_item_mut() {
            Some(record) => {
                record.enabled = !record.enabled;
                true
            }
            None => false,
        }
    }

    pub fn move_selected(&mut self, direction: MoveDirection) -> bool {
        self.list.move_selected(direction)
    }

    pub fn configure(&self, provider: &str) -> Option<FieldDefs> {
        self.list
            .items()
            .iter()
            .find(|r| r.name == provider)
            .filter(|r| r.is_configurable())
            .and_then(|r| r.configurable_fields.clone())
    }

    pub fn configure_selected(&self) -> Option<(String, FieldDefs)> {
        let record = self.list.selected_item()?;
        let fields = self.configure(&record.name)?;
        Some((record.name.clone(), fields))
    }

    pub fn order_entries(&self) -> Vec<ProviderOrder> {
        order_entries(self.list.items())
    }

    /// Moves the save control to busy and returns the payload. Refused while
    /// busy, and while the list is not showing loaded data.
    pub fn begin_save(&mut self) -> Option<Vec<ProviderOrder>> {
        if self.save_state == SaveState::Busy || self.view != ListView::Ready {
            return None;
        }
        self.save_state = SaveState::Busy;
        Some(self.order_entries())
    }

    /// Returns the control to idle whatever the outcome.
    pub fn finish_save(&mut self, result: Result<(), AppError>) -> Notice {
        self.save_state = SaveState::Idle;
        match result {
            Ok(()) => {
                info!(category = %self.category, "source settings saved");
                Notice::success("Source settings saved.")
            }
            Err(err) => {
                warn!(category = %self.category, error = %err, "saving source settings failed");
                Notice::error(format!("Save failed: {err}"))
            }
        }
    }

    /// Saves, then reloads from the store on success.
    pub async fn save(&mut self, store: &dyn SourceStore) -> Option<Notice> {
        let entries = self.begin_save()?;
        let result = store.save(self.category, &entries).await;
        let succeeded = result.is_ok();
        let notice = self.finish_save(result);
        if succeeded {
            self.load(store).await;
        }
        Some(notice)
    }
}
