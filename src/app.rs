use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};
use std::collections::VecDeque;
use std::time::Instant;
use tokio::sync::mpsc;

use crate::api::{Registration, Transport, User, UserForm};
use crate::client::render::render_item;
use crate::client::{Alert, Completion, Operation, RenderMode, UserClient, ViewUpdate};

/// Seconds before a status message clears itself
const STATUS_SECONDS: u64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Popup {
    None,
    UserForm,
    Register,
    Confirm,
    Help,
}

/// What submitting the user form does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormTarget {
    Create,
    Update(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub label: &'static str,
    pub value: String,
    pub masked: bool,
}

impl FormField {
    fn new(label: &'static str, value: impl Into<String>) -> Self {
        Self {
            label,
            value: value.into(),
            masked: false,
        }
    }

    fn masked(label: &'static str) -> Self {
        Self {
            label,
            value: String::new(),
            masked: true,
        }
    }
}

/// Input fields of the open form popup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    pub fields: Vec<FormField>,
    pub focus: usize,
}

impl FormState {
    fn user(form: &UserForm) -> Self {
        Self {
            fields: vec![
                FormField::new("Name", form.name.as_str()),
                FormField::new("Age", form.age.as_str()),
            ],
            focus: 0,
        }
    }

    fn register() -> Self {
        Self {
            fields: vec![
                FormField::new("Username", ""),
                FormField::masked("Password"),
                FormField::new("Name", ""),
                FormField::new("Email", ""),
            ],
            focus: 0,
        }
    }

    fn value(&self, index: usize) -> String {
        self.fields
            .get(index)
            .map(|f| f.value.clone())
            .unwrap_or_default()
    }

    fn next(&mut self) {
        if !self.fields.is_empty() {
            self.focus = (self.focus + 1) % self.fields.len();
        }
    }

    fn previous(&mut self) {
        if !self.fields.is_empty() {
            self.focus = (self.focus + self.fields.len() - 1) % self.fields.len();
        }
    }

    fn on_last_field(&self) -> bool {
        self.focus + 1 >= self.fields.len()
    }

    fn focused_mut(&mut self) -> Option<&mut String> {
        self.fields.get_mut(self.focus).map(|f| &mut f.value)
    }
}

pub struct App<T> {
    pub popup: Popup,

    // List pane: always the latest successful read, nothing else
    pub users: Vec<User>,
    pub selected_user: usize,

    // Open form
    pub form: FormState,
    pub form_target: FormTarget,

    // Delete confirmation
    pub confirm_message: String,
    pending_delete: Option<String>,

    // Blocking alerts, front is shown
    pub alerts: VecDeque<Alert>,

    // Status message (shown in info line, auto-clears after timeout)
    pub status_message: Option<String>,
    pub status_message_time: Option<Instant>,

    notifications: bool,
    client: UserClient<T>,
    completions: mpsc::UnboundedReceiver<Completion>,
}

impl<T: Transport> App<T> {
    /// Build the app and issue the startup read
    pub fn new(
        mut client: UserClient<T>,
        completions: mpsc::UnboundedReceiver<Completion>,
        notifications: bool,
    ) -> Self {
        client.refresh();

        Self {
            popup: Popup::None,
            users: Vec::new(),
            selected_user: 0,
            form: FormState::default(),
            form_target: FormTarget::Create,
            confirm_message: String::new(),
            pending_delete: None,
            alerts: VecDeque::new(),
            status_message: None,
            status_message_time: None,
            notifications,
            client,
            completions,
        }
    }

    pub fn mode(&self) -> RenderMode {
        self.client.mode()
    }

    pub fn in_flight(&self) -> usize {
        self.client.in_flight()
    }

    /// An alert or popup owns the keyboard
    pub fn is_modal(&self) -> bool {
        !self.alerts.is_empty() || self.popup != Popup::None
    }

    /// Set a status message (auto-clears after 3 seconds)
    fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
        self.status_message_time = Some(Instant::now());
    }

    fn selected(&self) -> Option<&User> {
        self.users.get(self.selected_user)
    }

    /// Id of the selected user, or a status message explaining why there is none
    fn selected_id(&mut self) -> Option<String> {
        match self.selected() {
            None => {
                self.set_status("No user selected");
                None
            }
            Some(user) => match user.id.clone() {
                Some(id) => Some(id),
                None => {
                    self.set_status("Selected user has no id");
                    None
                }
            },
        }
    }

    pub async fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        // A blocking alert swallows everything until dismissed
        if !self.alerts.is_empty() {
            if matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ')) {
                self.alerts.pop_front();
            }
            return Ok(());
        }

        if self.popup != Popup::None {
            return self.handle_popup_key(key).await;
        }

        self.handle_normal_key(key).await
    }

    async fn handle_normal_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.move_down(),
            KeyCode::Char('k') | KeyCode::Up => self.move_up(),

            // New user
            KeyCode::Char('n') => {
                self.form = FormState::user(&UserForm::default());
                self.form_target = FormTarget::Create;
                self.popup = Popup::UserForm;
            }

            // Edit selected user
            KeyCode::Char('e') | KeyCode::Enter => {
                if let Some(id) = self.selected_id() {
                    let form = self
                        .selected()
                        .map(|user| UserForm {
                            name: user.name.clone().unwrap_or_default(),
                            age: user.age.clone().unwrap_or_default(),
                        })
                        .unwrap_or_default();
                    self.form = FormState::user(&form);
                    self.form_target = FormTarget::Update(id);
                    self.popup = Popup::UserForm;
                }
            }

            // Delete selected user (asks first)
            KeyCode::Char('d') | KeyCode::Delete => {
                if let Some(id) = self.selected_id() {
                    let line = self.selected().map(render_item).unwrap_or_default();
                    self.confirm_message = format!("Delete {}?", line);
                    self.pending_delete = Some(id);
                    self.popup = Popup::Confirm;
                }
            }

            KeyCode::Char('r') => {
                self.form = FormState::register();
                self.popup = Popup::Register;
            }

            KeyCode::Char('R') => {
                self.client.refresh();
                self.set_status("Refreshing");
            }

            KeyCode::Char('?') | KeyCode::Char('h') => self.popup = Popup::Help,

            _ => {}
        }
        Ok(())
    }

    async fn handle_popup_key(&mut self, key: KeyEvent) -> Result<()> {
        match self.popup {
            Popup::UserForm | Popup::Register => self.handle_form_key(key),
            Popup::Help => {
                if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('h') | KeyCode::Enter | KeyCode::Char('q')) {
                    self.popup = Popup::None;
                }
                Ok(())
            }
            Popup::Confirm => {
                match key.code {
                    KeyCode::Char('y') | KeyCode::Enter => {
                        if let Some(id) = self.pending_delete.take() {
                            self.client.dispatch(Operation::Delete { id });
                        }
                        self.popup = Popup::None;
                    }
                    KeyCode::Char('n') | KeyCode::Esc => {
                        self.pending_delete = None;
                        self.popup = Popup::None;
                    }
                    _ => {}
                }
                Ok(())
            }
            Popup::None => Ok(()),
        }
    }

    fn handle_form_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Esc => {
                self.popup = Popup::None;
                self.form = FormState::default();
            }
            KeyCode::Tab | KeyCode::Down => self.form.next(),
            KeyCode::BackTab | KeyCode::Up => self.form.previous(),
            KeyCode::Enter => {
                if self.form.on_last_field() {
                    self.submit_form();
                } else {
                    self.form.next();
                }
            }
            KeyCode::Backspace => {
                if let Some(value) = self.form.focused_mut() {
                    value.pop();
                }
            }
            KeyCode::Char(c) => {
                if let Some(value) = self.form.focused_mut() {
                    value.push(c);
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Send the open form. The list stays as it is until the refresh lands.
    fn submit_form(&mut self) {
        let operation = match self.popup {
            Popup::UserForm => {
                let form = UserForm {
                    name: self.form.value(0),
                    age: self.form.value(1),
                };
                match &self.form_target {
                    FormTarget::Create => Operation::Create(form),
                    FormTarget::Update(id) => Operation::Update {
                        id: id.clone(),
                        form,
                    },
                }
            }
            Popup::Register => Operation::Register(Registration {
                username: self.form.value(0),
                password: self.form.value(1),
                name: self.form.value(2),
                email: self.form.value(3),
            }),
            _ => return,
        };

        self.client.dispatch(operation);
        self.popup = Popup::None;
        self.form = FormState::default();
    }

    fn move_down(&mut self) {
        if !self.users.is_empty() {
            self.selected_user = (self.selected_user + 1) % self.users.len();
        }
    }

    fn move_up(&mut self) {
        if !self.users.is_empty() {
            self.selected_user = if self.selected_user == 0 {
                self.users.len() - 1
            } else {
                self.selected_user - 1
            };
        }
    }

    /// Handle one request completion and apply what it asks of the view
    pub fn apply_completion(&mut self, completion: Completion) {
        for update in self.client.handle(completion) {
            match update {
                ViewUpdate::Render(users) => {
                    self.users = users;
                    if self.selected_user >= self.users.len() {
                        self.selected_user = self.users.len().saturating_sub(1);
                    }
                }
                ViewUpdate::Alert(alert) => {
                    if self.notifications {
                        if let Err(e) = crate::notify("userdesk", &alert.message) {
                            tracing::warn!("Desktop notification failed: {}", e);
                        }
                    }
                    self.alerts.push_back(alert);
                }
            }
        }
    }

    pub async fn tick(&mut self) -> Result<()> {
        // Completions land in arrival order; the last read to finish wins
        while let Ok(completion) = self.completions.try_recv() {
            self.apply_completion(completion);
        }

        // Clear status message after 3 seconds
        if let Some(time) = self.status_message_time {
            if time.elapsed().as_secs() >= STATUS_SECONDS {
                self.status_message = None;
                self.status_message_time = None;
            }
        }

        Ok(())
    }
}
