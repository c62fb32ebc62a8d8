//! Per-provider configuration form.
//!
//! The form is fetched fresh every time it opens and forgotten when it
//! closes. Responses for an earlier opening are recognised by their ticket
//! and dropped.

use crate::config::AppConfig;
use crate::editor::Notice;
use crate::error::AppError;
use crate::models::{ConfigFieldSet, FieldDefs};
use crate::store::SourceStore;
use tracing::{info, warn};

const GAMER_NOTE: &str = "Only needed when searching fails. Try clearing the configuration and \
saving first; if the problem persists, copy the latest User-Agent and Cookie from \
https://ani.gamer.com.tw/.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    SingleLine,
    MultiLine { rows: u16 },
}

/// Provider notes and multi-line key markers, kept as data so new
/// exceptions are additions to the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormRules {
    notes: Vec<(String, String)>,
    multiline_markers: Vec<String>,
    multiline_rows: u16,
}

impl Default for FormRules {
    fn default() -> Self {
        Self {
            notes: vec![("gamer".into(), GAMER_NOTE.into())],
            multiline_markers: vec!["cookie".into()],
            multiline_rows: 4,
        }
    }
}

impl FormRules {
    /// Built-in rules plus whatever the configuration file adds.
    pub fn from_config(cfg: &AppConfig) -> Self {
        let mut rules = Self::default();
        for marker in &cfg.extra_multiline_markers {
            rules = rules.with_multiline_marker(marker);
        }
        for (provider, note) in &cfg.extra_notes {
            rules = rules.with_note(provider, note);
        }
        rules
    }

    pub fn with_note(mut self, provider: &str, note: &str) -> Self {
        self.notes.push((provider.to_string(), note.to_string()));
        self
    }

    pub fn with_multiline_marker(mut self, marker: &str) -> Self {
        self.multiline_markers.push(marker.to_ascii_lowercase());
        self
    }

    pub fn note_for(&self, provider: &str) -> Option<&str> {
        self.notes
            .iter()
            .find(|(name, _)| name == provider)
            .map(|(_, note)| note.as_str())
    }

    pub fn input_kind(&self, key: &str) -> InputKind {
        let key = key.to_lowercase();
        if self
            .multiline_markers
            .iter()
            .any(|marker| key.contains(marker.as_str()))
        {
            InputKind::MultiLine {
                rows: self.multiline_rows,
            }
        } else {
            InputKind::SingleLine
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigInput {
    pub key: String,
    pub label: String,
    pub value: String,
    pub kind: InputKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModalBody {
    Closed,
    Loading,
    Failed(String),
    Form {
        note: Option<String>,
        inputs: Vec<ConfigInput>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenTicket(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRequest {
    pub ticket: OpenTicket,
    pub provider: String,
    pub payload: ConfigFieldSet,
}

#[derive(Debug)]
pub struct ConfigFormModal {
    rules: FormRules,
    open_for: Option<String>,
    field_defs: FieldDefs,
    body: ModalBody,
    focused: usize,
    generation: u64,
    saving: bool,
}

impl Default for ConfigFormModal {
    fn default() -> Self {
        Self::new(FormRules::default())
    }
}

impl ConfigFormModal {
    pub fn new(rules: FormRules) -> Self {
        Self {
            rules,
            open_for: None,
            field_defs: FieldDefs::new(),
            body: ModalBody::Closed,
            focused: 0,
            generation: 0,
            saving: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open_for.is_some()
    }

    pub fn open_for(&self) -> Option<&str> {
        self.open_for.as_deref()
    }

    pub fn body(&self) -> &ModalBody {
        &self.body
    }

    pub fn focused(&self) -> usize {
        self.focused
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn open(&mut self, provider: &str, field_defs: FieldDefs) -> OpenTicket {
        self.generation += 1;
        self.open_for = Some(provider.to_string());
        self.field_defs = field_defs;
        self.body = ModalBody::Loading;
        self.focused = 0;
        self.saving = false;
        OpenTicket(self.generation)
    }

    /// Renders the fetched config. Returns `false` for a stale ticket.
    pub fn finish_open(
        &mut self,
        ticket: OpenTicket,
        result: Result<ConfigFieldSet, AppError>,
    ) -> bool {
        if ticket.0 != self.generation || self.open_for.is_none() {
            warn!("discarding stale provider config response");
            return false;
        }
        let provider = self.open_for.clone().unwrap_or_default();
        match result {
            Ok(current) => {
                let inputs = self
                    .field_defs
                    .iter()
                    .map(|(key, label)| ConfigInput {
                        key: key.clone(),
                        label: label.clone(),
                        value: current.get(key).cloned().unwrap_or_default(),
                        kind: self.rules.input_kind(key),
                    })
                    .collect();
                self.body = ModalBody::Form {
                    note: self.rules.note_for(&provider).map(ToString::to_string),
                    inputs,
                };
            }
            Err(err) => {
                warn!(%provider, error = %err, "loading provider config failed");
                self.body = ModalBody::Failed(format!("Failed to load configuration: {err}"));
            }
        }
        true
    }

    /// Hides the form and drops every in-progress edit.
    pub fn close(&mut self) {
        self.generation += 1;
        self.open_for = None;
        self.field_defs.clear();
        self.body = ModalBody::Closed;
        self.focused = 0;
        self.saving = false;
    }

    fn inputs_mut(&mut self) -> Option<&mut Vec<ConfigInput>> {
        match &mut self.body {
            ModalBody::Form { inputs, .. } => Some(inputs),
            _ => None,
        }
    }

    fn focused_input_mut(&mut self) -> Option<&mut ConfigInput> {
        let focused = self.focused;
        self.inputs_mut().and_then(|inputs| inputs.get_mut(focused))
    }

    pub fn focus_next(&mut self) {
        let count = self.inputs_mut().map_or(0, |inputs| inputs.len());
        if count > 0 {
            self.focused = (self.focused + 1) % count;
        }
    }

    pub fn focus_previous(&mut self) {
        let count = self.inputs_mut().map_or(0, |inputs| inputs.len());
        if count > 0 {
            self.focused = if self.focused == 0 {
                count - 1
            } else {
                self.focused - 1
            };
        }
    }

    pub fn insert_char(&mut self, ch: char) {
        if let Some(input) = self.focused_input_mut() {
            input.value.push(ch);
        }
    }

    pub fn backspace(&mut self) {
        if let Some(input) = self.focused_input_mut() {
            input.value.pop();
        }
    }

    /// Newlines only go into multi-line inputs.
    pub fn insert_newline(&mut self) -> bool {
        match self.focused_input_mut() {
            Some(input) if matches!(input.kind, InputKind::MultiLine { .. }) => {
                input.value.push('\n');
                true
            }
            _ => false,
        }
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> bool {
        match self
            .inputs_mut()
            .and_then(|inputs| inputs.iter_mut().find(|input| input.key == key))
        {
            Some(input) => {
                input.value = value.to_string();
                true
            }
            None => false,
        }
    }

    /// Every rendered field, trimmed. `None` while no form is shown.
    pub fn payload(&self) -> Option<ConfigFieldSet> {
        self.open_for.as_ref()?;
        let ModalBody::Form { inputs, .. } = &self.body else {
            return None;
        };
        Some(
            inputs
                .iter()
                .map(|input| (input.key.clone(), input.value.trim().to_string()))
                .collect(),
        )
    }

    pub fn begin_save(&mut self) -> Option<SaveRequest> {
        if self.saving {
            return None;
        }
        let provider = self.open_for.clone()?;
        let payload = self.payload()?;
        self.saving = true;
        Some(SaveRequest {
            ticket: OpenTicket(self.generation),
            provider,
            payload,
        })
    }

    /// Closes on success. A failure is handed back and the form stays open.
    pub fn finish_save(
        &mut self,
        request: &SaveRequest,
        result: Result<(), AppError>,
    ) -> Result<Notice, AppError> {
        if request.ticket.0 == self.generation {
            self.saving = false;
        }
        result?;
        info!(provider = %request.provider, "provider configuration saved");
        if request.ticket.0 == self.generation {
            self.close();
        }
        Ok(Notice::success("Configuration saved."))
    }

    pub async fn load(&mut self, store: &dyn SourceStore, ticket: OpenTicket) -> bool {
        let Some(provider) = self.open_for.clone() else {
            return false;
        };
        let result = store.get_config(&provider).await;
        self.finish_open(ticket, result)
    }

    pub async fn save(&mut self, store: &dyn SourceStore) -> Result<Option<Notice>, AppError> {
        let Some(request) = self.begin_save() else {
            return Ok(None);
        };
        let result = store.set_config(&request.provider, &request.payload).await;
        self.finish_save(&request, result).map(Some)
    }
}
