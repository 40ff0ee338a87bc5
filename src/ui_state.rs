use serde::Serialize;

/// Width variant of the modal dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModalSize {
    Small,
    #[default]
    Medium,
    Large,
    Full,
}

impl ModalSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModalSize::Small => "small",
            ModalSize::Medium => "medium",
            ModalSize::Large => "large",
            ModalSize::Full => "full",
        }
    }
}

/// What the modal is currently showing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModalContent {
    ConfirmDeleteUser { id: String, name: String },
    ConfirmDeleteFile { id: String, name: String, admin: bool },
    UploadHelp,
    Message { title: String, body: String },
}

impl ModalContent {
    pub fn title(&self) -> String {
        match self {
            ModalContent::ConfirmDeleteUser { .. } => "Delete user".to_string(),
            ModalContent::ConfirmDeleteFile { .. } => "Delete file".to_string(),
            ModalContent::UploadHelp => "Supported files".to_string(),
            ModalContent::Message { title, .. } => title.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ModalState {
    pub open: bool,
    pub content: Option<ModalContent>,
    pub size: ModalSize,
}

/// Transient layout state for one browser session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UiState {
    pub sidebar_open: bool,
    pub modal: ModalState,
}

impl Default for UiState {
    fn default() -> Self {
        UiState {
            sidebar_open: true,
            modal: ModalState::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiAction {
    ToggleSidebar,
    SetSidebar(bool),
    OpenModal { content: ModalContent, size: ModalSize },
    CloseModal,
}

impl UiState {
    pub fn reduce(&mut self, action: UiAction) {
        match action {
            UiAction::ToggleSidebar => self.sidebar_open = !self.sidebar_open,
            UiAction::SetSidebar(open) => self.sidebar_open = open,
            UiAction::OpenModal { content, size } => {
                self.modal = ModalState {
                    open: true,
                    content: Some(content),
                    size,
                };
            }
            UiAction::CloseModal => self.modal = ModalState::default(),
        }
    }
}
