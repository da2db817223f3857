//! The user client
//!
//! Every operation sends exactly one request on its own tokio task and
//! returns immediately. The outcome comes back later as a [`Completion`] on
//! the channel handed out by [`UserClient::new`]; the owner feeds each one to
//! [`UserClient::handle`], which decides what the view should do and issues
//! the follow-up read when one is due.

pub mod render;

use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::api::auth::{authorize, Credentials};
use crate::api::{
    ApiRequest, ApiResponse, Endpoints, Registration, Transport, TransportError, User, UserForm,
};

pub const LOAD_USERS_FAILED: &str = "Failed to load users";
pub const LOAD_USER_FAILED: &str = "Failed to load user details";
pub const REGISTER_OK: &str = "User registered successfully!";
pub const REGISTER_FAILED: &str = "Failed to register user";

/// Shape of the read response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// A JSON array of users
    #[default]
    List,
    /// One JSON user object
    Single,
}

impl RenderMode {
    pub fn read_operation(self) -> Operation {
        match self {
            RenderMode::List => Operation::FetchList,
            RenderMode::Single => Operation::FetchOne,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    FetchList,
    FetchOne,
    Create(UserForm),
    Update { id: String, form: UserForm },
    Delete { id: String },
    Register(Registration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    FetchList,
    FetchOne,
    Create,
    Update,
    Delete,
    Register,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::FetchList => "fetch-list",
            OperationKind::FetchOne => "fetch-one",
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
            OperationKind::Register => "register",
        };
        f.write_str(name)
    }
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::FetchList => OperationKind::FetchList,
            Operation::FetchOne => OperationKind::FetchOne,
            Operation::Create(_) => OperationKind::Create,
            Operation::Update { .. } => OperationKind::Update,
            Operation::Delete { .. } => OperationKind::Delete,
            Operation::Register(_) => OperationKind::Register,
        }
    }

    /// Build the request. Only reads carry the credential.
    pub fn request(&self, endpoints: &Endpoints, credentials: Option<&Credentials>) -> ApiRequest {
        match self {
            Operation::FetchList => {
                let mut request = ApiRequest::new(Method::GET, endpoints.list.as_str());
                authorize(&mut request, credentials);
                request
            }
            Operation::FetchOne => {
                let mut request = ApiRequest::new(Method::GET, endpoints.detail.as_str());
                authorize(&mut request, credentials);
                request
            }
            Operation::Create(form) => {
                ApiRequest::new(Method::POST, endpoints.collection.as_str()).json(form)
            }
            Operation::Update { id, form } => {
                ApiRequest::new(Method::PUT, endpoints.item_path(id)).json(form)
            }
            Operation::Delete { id } => ApiRequest::new(Method::DELETE, endpoints.item_path(id)),
            Operation::Register(registration) => {
                ApiRequest::new(Method::POST, endpoints.register.as_str()).json(registration)
            }
        }
    }
}

/// The outcome of one request
#[derive(Debug)]
pub struct Completion {
    pub kind: OperationKind,
    pub outcome: Result<ApiResponse, TransportError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub message: String,
    pub failure: bool,
}

impl Alert {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            failure: false,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            failure: true,
        }
    }
}

/// What the view has to do after a completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewUpdate {
    /// Replace the whole list with these users
    Render(Vec<User>),
    Alert(Alert),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Reaction {
    View(ViewUpdate),
    Refresh,
}

fn react(kind: OperationKind, response: &ApiResponse) -> Vec<Reaction> {
    match kind {
        OperationKind::FetchList | OperationKind::FetchOne => {
            if response.status != StatusCode::OK {
                let message = if kind == OperationKind::FetchList {
                    LOAD_USERS_FAILED
                } else {
                    LOAD_USER_FAILED
                };
                return vec![Reaction::View(ViewUpdate::Alert(Alert::failure(message)))];
            }

            match parse_users(kind, &response.body) {
                Ok(users) => vec![Reaction::View(ViewUpdate::Render(users))],
                Err(e) => {
                    tracing::error!("{} returned an unreadable body: {}", kind, e);
                    Vec::new()
                }
            }
        }
        // Writes refresh whatever the status
        OperationKind::Create | OperationKind::Update | OperationKind::Delete => {
            vec![Reaction::Refresh]
        }
        OperationKind::Register => {
            if response.status == StatusCode::CREATED {
                vec![
                    Reaction::View(ViewUpdate::Alert(Alert::success(REGISTER_OK))),
                    Reaction::Refresh,
                ]
            } else {
                vec![Reaction::View(ViewUpdate::Alert(Alert::failure(REGISTER_FAILED)))]
            }
        }
    }
}

fn parse_users(kind: OperationKind, body: &str) -> serde_json::Result<Vec<User>> {
    if kind == OperationKind::FetchOne {
        serde_json::from_str::<User>(body).map(|user| vec![user])
    } else {
        serde_json::from_str::<Vec<User>>(body)
    }
}

pub struct UserClient<T> {
    transport: Arc<T>,
    endpoints: Endpoints,
    credentials: Option<Credentials>,
    mode: RenderMode,
    completions: mpsc::UnboundedSender<Completion>,
    in_flight: usize,
}

impl<T: Transport> UserClient<T> {
    pub fn new(
        transport: T,
        endpoints: Endpoints,
        credentials: Option<Credentials>,
        mode: RenderMode,
    ) -> (Self, mpsc::UnboundedReceiver<Completion>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = Self {
            transport: Arc::new(transport),
            endpoints,
            credentials,
            mode,
            completions: tx,
            in_flight: 0,
        };
        (client, rx)
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    /// Requests sent whose completion hasn't been handled yet
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight == 0
    }

    /// Send the request on its own task and return right away.
    pub fn dispatch(&mut self, operation: Operation) {
        let kind = operation.kind();
        let request = operation.request(&self.endpoints, self.credentials.as_ref());
        let transport = Arc::clone(&self.transport);
        let completions = self.completions.clone();

        tracing::debug!("dispatch {} {} {}", kind, request.method, request.path);
        self.in_flight += 1;

        tokio::spawn(async move {
            let outcome = transport.send(request).await;
            // Receiver gone means the owner is shutting down
            let _ = completions.send(Completion { kind, outcome });
        });
    }

    /// Re-run the read for the current render mode
    pub fn refresh(&mut self) {
        self.dispatch(self.mode.read_operation());
    }

    /// Handle one completion. Refreshes are dispatched here; the returned
    /// updates are for the view, in order.
    pub fn handle(&mut self, completion: Completion) -> Vec<ViewUpdate> {
        self.in_flight = self.in_flight.saturating_sub(1);
        let Completion { kind, outcome } = completion;

        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("{} request failed: {}", kind, e);
                return Vec::new();
            }
        };
        tracing::debug!("{} completed with {}", kind, response.status);

        let mut updates = Vec::new();
        for reaction in react(kind, &response) {
            match reaction {
                Reaction::View(update) => updates.push(update),
                Reaction::Refresh => self.refresh(),
            }
        }
        updates
    }

    /// Handle completions until nothing is in flight. Used by one-shot
    /// commands; the TUI drains the channel from its own loop instead.
    pub async fn run_until_idle(
        &mut self,
        completions: &mut mpsc::UnboundedReceiver<Completion>,
    ) -> Vec<ViewUpdate> {
        let mut updates = Vec::new();
        while !self.is_idle() {
            let Some(completion) = completions.recv().await else {
                break;
            };
            updates.extend(self.handle(completion));
        }
        updates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::FakeTransport;

    const USERS: &str = r#"[
        {"id": 1, "name": "Homer Simpson", "username": "homer", "email": "homer@x.com"},
        {"id": 2, "name": "Marge Simpson", "username": "marge", "email": "marge@x.com"},
        {"id": 5, "name": "Ned Flanders", "username": "ned", "email": "ned@x.com"}
    ]"#;

    fn client(
        fake: &FakeTransport,
        mode: RenderMode,
    ) -> (UserClient<FakeTransport>, mpsc::UnboundedReceiver<Completion>) {
        UserClient::new(
            fake.clone(),
            Endpoints::default(),
            Some(Credentials::default()),
            mode,
        )
    }

    fn methods_and_paths(fake: &FakeTransport) -> Vec<(Method, String)> {
        fake.requests()
            .into_iter()
            .map(|r| (r.method, r.path))
            .collect()
    }

    #[tokio::test]
    async fn test_fetch_list_renders_one_item_per_record() {
        let fake = FakeTransport::new();
        fake.respond(Method::GET, "/api/user/", 200, USERS);
        let (mut client, mut rx) = client(&fake, RenderMode::List);

        client.dispatch(Operation::FetchList);
        let updates = client.run_until_idle(&mut rx).await;

        match updates.as_slice() {
            [ViewUpdate::Render(users)] => {
                assert_eq!(users.len(), 3);
                assert_eq!(users[2].id.as_deref(), Some("5"));
            }
            other => panic!("unexpected updates: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reads_carry_basic_auth() {
        let fake = FakeTransport::new();
        fake.respond(Method::GET, "/api/user/", 200, "[]");
        let (mut client, mut rx) = client(&fake, RenderMode::List);

        client.dispatch(Operation::FetchList);
        client.run_until_idle(&mut rx).await;

        let requests = fake.requests();
        assert_eq!(
            requests[0].authorization.as_deref(),
            Some("Basic aG9tZXI6MTIzNA==")
        );
    }

    #[tokio::test]
    async fn test_fetch_list_failure_alerts_without_render() {
        let fake = FakeTransport::new();
        fake.respond(Method::GET, "/api/user/", 500, "boom");
        let (mut client, mut rx) = client(&fake, RenderMode::List);

        client.dispatch(Operation::FetchList);
        let updates = client.run_until_idle(&mut rx).await;

        assert_eq!(
            updates,
            vec![ViewUpdate::Alert(Alert::failure("Failed to load users"))]
        );
    }

    #[tokio::test]
    async fn test_fetch_one_failure_uses_detail_message() {
        let fake = FakeTransport::new();
        fake.respond(Method::GET, "/api/user/", 403, r#"{"message": "not found"}"#);
        let (mut client, mut rx) = client(&fake, RenderMode::Single);

        client.refresh();
        let updates = client.run_until_idle(&mut rx).await;

        assert_eq!(
            updates,
            vec![ViewUpdate::Alert(Alert::failure("Failed to load user details"))]
        );
    }

    #[tokio::test]
    async fn test_fetch_one_renders_single_record() {
        let fake = FakeTransport::new();
        fake.respond(
            Method::GET,
            "/api/user/",
            200,
            r#"{"id": 1, "name": "Homer Simpson", "email": "homer@x.com", "username": "homer"}"#,
        );
        let (mut client, mut rx) = client(&fake, RenderMode::Single);

        client.refresh();
        let updates = client.run_until_idle(&mut rx).await;

        match updates.as_slice() {
            [ViewUpdate::Render(users)] => {
                assert_eq!(users.len(), 1);
                assert_eq!(users[0].username.as_deref(), Some("homer"));
            }
            other => panic!("unexpected updates: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_ok_success_status_is_still_a_failed_read() {
        let fake = FakeTransport::new();
        fake.respond(Method::GET, "/api/user/", 204, "");
        let (mut client, mut rx) = client(&fake, RenderMode::List);

        client.dispatch(Operation::FetchList);
        let updates = client.run_until_idle(&mut rx).await;

        assert_eq!(
            updates,
            vec![ViewUpdate::Alert(Alert::failure(LOAD_USERS_FAILED))]
        );
    }

    #[tokio::test]
    async fn test_unreadable_body_leaves_view_alone() {
        let fake = FakeTransport::new();
        fake.respond(Method::GET, "/api/user/", 200, "<html>oops</html>");
        let (mut client, mut rx) = client(&fake, RenderMode::List);

        client.dispatch(Operation::FetchList);
        let updates = client.run_until_idle(&mut rx).await;

        assert!(updates.is_empty());
    }

    #[tokio::test]
    async fn test_delete_triggers_exactly_one_refresh_for_any_status() {
        for status in [200, 204, 404, 500] {
            let fake = FakeTransport::new();
            fake.respond(Method::DELETE, "/api/users/5/", status, "");
            fake.respond(Method::GET, "/api/user/", 200, USERS);
            let (mut client, mut rx) = client(&fake, RenderMode::List);

            client.dispatch(Operation::Delete { id: "5".to_string() });
            let updates = client.run_until_idle(&mut rx).await;

            assert_eq!(
                methods_and_paths(&fake),
                vec![
                    (Method::DELETE, "/api/users/5/".to_string()),
                    (Method::GET, "/api/user/".to_string()),
                ],
                "status {}",
                status
            );
            assert!(matches!(updates.as_slice(), [ViewUpdate::Render(_)]));
        }
    }

    #[tokio::test]
    async fn test_create_and_update_send_form_and_refresh() {
        let fake = FakeTransport::new();
        fake.respond(Method::POST, "/api/users/", 201, "");
        fake.respond(Method::PUT, "/api/users/2/", 500, "");
        fake.respond(Method::GET, "/api/user/", 200, USERS);
        let (mut client, mut rx) = client(&fake, RenderMode::List);

        let form = UserForm {
            name: "Maggie".to_string(),
            age: "1".to_string(),
        };
        client.dispatch(Operation::Create(form.clone()));
        client.run_until_idle(&mut rx).await;
        client.dispatch(Operation::Update {
            id: "2".to_string(),
            form: form.clone(),
        });
        client.run_until_idle(&mut rx).await;

        let requests = fake.requests();
        assert_eq!(requests.len(), 4);
        assert_eq!(requests[0].method, Method::POST);
        assert_eq!(
            requests[0].body,
            Some(serde_json::json!({"name": "Maggie", "age": "1"}))
        );
        assert!(requests[0].authorization.is_none());
        assert_eq!(requests[1].method, Method::GET);
        assert_eq!(requests[2].method, Method::PUT);
        assert_eq!(requests[2].path, "/api/users/2/");
        assert_eq!(requests[3].method, Method::GET);
    }

    #[tokio::test]
    async fn test_register_created_alerts_then_refreshes() {
        let fake = FakeTransport::new();
        fake.respond(Method::POST, "/api/user/register/", 201, r#"{"message": "ok"}"#);
        fake.respond(Method::GET, "/api/user/", 200, USERS);
        let (mut client, mut rx) = client(&fake, RenderMode::List);

        client.dispatch(Operation::Register(Registration {
            username: "homer".to_string(),
            password: "1234".to_string(),
            name: "Homer Simpson".to_string(),
            email: "homer@x.com".to_string(),
        }));
        let updates = client.run_until_idle(&mut rx).await;

        assert_eq!(updates[0], ViewUpdate::Alert(Alert::success(REGISTER_OK)));
        assert!(matches!(updates[1], ViewUpdate::Render(ref users) if users.len() == 3));

        let requests = fake.requests();
        assert_eq!(
            requests[0].body,
            Some(serde_json::json!({
                "username": "homer",
                "password": "1234",
                "name": "Homer Simpson",
                "email": "homer@x.com"
            }))
        );
        assert_eq!(requests[1].method, Method::GET);
        assert_eq!(requests[1].path, "/api/user/");
    }

    #[tokio::test]
    async fn test_register_other_status_fails_without_refresh() {
        for status in [200, 400, 500] {
            let fake = FakeTransport::new();
            fake.respond(Method::POST, "/api/user/register/", status, "");
            let (mut client, mut rx) = client(&fake, RenderMode::List);

            client.dispatch(Operation::Register(Registration::default()));
            let updates = client.run_until_idle(&mut rx).await;

            assert_eq!(
                updates,
                vec![ViewUpdate::Alert(Alert::failure(REGISTER_FAILED))]
            );
            assert_eq!(fake.requests().len(), 1, "status {}", status);
        }
    }

    #[tokio::test]
    async fn test_transport_error_on_write_is_silent() {
        let fake = FakeTransport::new();
        fake.fail(
            Method::DELETE,
            "/api/users/5/",
            TransportError::Connect("refused".to_string()),
        );
        let (mut client, mut rx) = client(&fake, RenderMode::List);

        client.dispatch(Operation::Delete { id: "5".to_string() });
        let updates = client.run_until_idle(&mut rx).await;

        assert!(updates.is_empty());
        assert_eq!(fake.requests().len(), 1);
        assert!(client.is_idle());
    }

    #[tokio::test]
    async fn test_single_mode_refreshes_with_fetch_one() {
        let fake = FakeTransport::new();
        fake.respond(Method::DELETE, "/api/users/1/", 200, "");
        fake.respond(Method::GET, "/api/user/", 200, r#"{"id": 1, "name": "Homer"}"#);
        let (mut client, mut rx) = client(&fake, RenderMode::Single);

        client.dispatch(Operation::Delete { id: "1".to_string() });
        let updates = client.run_until_idle(&mut rx).await;

        assert!(matches!(updates.as_slice(), [ViewUpdate::Render(users)] if users.len() == 1));
    }
}
