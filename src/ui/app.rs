use crate::editor::{MetadataListEditor, Notice, ProviderListEditor};
use crate::models::Category;
use crate::modal::{ConfigFormModal, FormRules};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Sources,
    ConfigModal,
    Confirm(ConfirmAction),
    NoticeDialog,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmAction {
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Error,
}

#[derive(Debug, Clone)]
pub struct ActivityEntry {
    pub ts: String,
    pub level: LogLevel,
    pub event: String,
    pub detail: String,
}

#[derive(Debug)]
pub struct AppState {
    pub running: bool,
    pub status: String,
    pub tab: Category,
    pub screen: Screen,
    pub previous_screen: Screen,
    pub confirm_selected: usize,
    pub danmaku: ProviderListEditor,
    pub metadata: MetadataListEditor,
    pub modal: ConfigFormModal,
    pub notice: Option<Notice>,
    pub activity: Vec<ActivityEntry>,
    pub max_activity: usize,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(FormRules::default())
    }
}

impl AppState {
    pub fn new(rules: FormRules) -> Self {
        Self {
            running: true,
            status: "ready".into(),
            tab: Category::Danmaku,
            screen: Screen::Sources,
            previous_screen: Screen::Sources,
            confirm_selected: 0,
            danmaku: ProviderListEditor::new(Category::Danmaku),
            metadata: MetadataListEditor::default(),
            modal: ConfigFormModal::new(rules),
            notice: None,
            activity: Vec::new(),
            max_activity: 100,
        }
    }
}
