//! Command handlers - business logic for processing UI events and engine events

use crate::app::editor::{Committed, EditSession, EditTarget};
use crate::app::state::{AppState, InFlight, Mode, ViewState};
use crate::collection::{CollectionTree, NodeId, NodeKind};
use crate::curl;
use crate::history::lock_history;
use crate::messages::{ExecutionCommand, ExecutionEvent};
use crate::models::RequestTemplate;
use crate::storage::file_stem;
use crate::variables::{read_store, write_store, Environment};

impl AppState {
    // ========================
    // Tree navigation
    // ========================

    /// Leave `Executing` without cancelling; the call keeps running and is
    /// still recorded when it completes
    fn detach(&mut self) {
        if let Mode::Executing { ticket, .. } = self.mode {
            tracing::debug!(ticket, "Detached from execution");
            self.mode = Mode::Browsing;
        }
    }

    fn can_navigate(&self) -> bool {
        matches!(self.mode, Mode::Browsing | Mode::Executing { .. })
    }

    fn move_selection(&mut self, pick: impl FnOnce(usize, usize) -> usize) {
        if !self.can_navigate() {
            return;
        }
        self.detach();
        let rows = self.rows();
        if rows.is_empty() {
            self.selected = None;
            return;
        }
        let current = self.selected_index(&rows).unwrap_or(0);
        let next = pick(current, rows.len()).min(rows.len() - 1);
        self.selected = Some(rows[next].id);
    }

    pub fn cursor_up(&mut self) {
        self.move_selection(|current, _| current.saturating_sub(1));
    }

    pub fn cursor_down(&mut self) {
        self.move_selection(|current, _| current + 1);
    }

    pub fn cursor_home(&mut self) {
        self.move_selection(|_, _| 0);
    }

    pub fn cursor_end(&mut self) {
        self.move_selection(|_, len| len - 1);
    }

    /// Containers toggle open; requests open their latest history entry
    pub fn select(&mut self) {
        if !self.can_navigate() {
            return;
        }
        self.detach();
        let Some(id) = self.selected else {
            return;
        };
        let Some(node) = self.tree.get(id) else {
            return;
        };
        if node.is_container() {
            if !self.expanded.remove(&id) {
                self.expanded.insert(id);
            }
        } else {
            self.mode = Mode::Viewing(ViewState::latest(id));
        }
    }

    pub fn back(&mut self) {
        match &self.mode {
            Mode::Viewing(_) => self.mode = Mode::Browsing,
            Mode::Executing { .. } => self.detach(),
            Mode::Editing(_) => {}
            Mode::Browsing => {
                let Some(id) = self.selected else {
                    return;
                };
                if self.expanded.remove(&id) {
                    return;
                }
                if let Some(parent) = self.tree.parent(id) {
                    self.selected = Some(parent);
                }
            }
        }
    }

    /// Make sure the selection is a visible node
    fn settle_selection(&mut self) {
        let rows = self.rows();
        if self.selected_index(&rows).is_some() {
            return;
        }
        let visible_ancestor = self.selected.and_then(|id| {
            self.tree
                .ancestors(id)
                .into_iter()
                .find(|a| rows.iter().any(|r| r.id == *a))
        });
        self.selected = visible_ancestor.or_else(|| rows.first().map(|r| r.id));
    }

    fn reveal(&mut self, id: NodeId) {
        for ancestor in self.tree.ancestors(id) {
            self.expanded.insert(ancestor);
        }
        self.selected = Some(id);
    }

    // ========================
    // Editing
    // ========================

    /// Request being viewed, or the tree selection
    fn focused_node(&self) -> Option<NodeId> {
        match &self.mode {
            Mode::Viewing(view) => Some(view.request_id),
            _ => self.selected,
        }
    }

    pub fn edit_selected(&mut self) {
        if !matches!(self.mode, Mode::Browsing | Mode::Viewing(_)) {
            return;
        }
        let Some(id) = self.focused_node() else {
            return;
        };
        let Some(node) = self.tree.get(id) else {
            return;
        };
        if self.has_in_flight_within(id) {
            self.notice = Some(format!("\"{}\" has a request in flight; wait or cancel before editing", node.name()));
            return;
        }
        let session = match &node.kind {
            NodeKind::Request(template) => EditSession::for_request(template),
            NodeKind::Collection(container) | NodeKind::Folder(container) => {
                EditSession::for_container(id, container)
            }
        };
        self.notice = None;
        self.mode = Mode::Editing(session);
    }

    /// Edit the active environment; with no environments at all, start a new one
    pub fn edit_environment(&mut self) {
        if !matches!(self.mode, Mode::Browsing | Mode::Viewing(_)) {
            return;
        }
        let environment = {
            let store = read_store(&self.variables);
            match store.active() {
                Some(env) => Some(env.clone()),
                None if store.environments().is_empty() => Some(Environment::new("default")),
                None => None,
            }
        };
        let Some(environment) = environment else {
            self.notice = Some("No active environment; press v to select one".to_string());
            return;
        };
        if !self.in_flight.is_empty() {
            self.notice = Some(format!(
                "Environment \"{}\" is in use by {} running request(s)",
                environment.name,
                self.in_flight.len()
            ));
            return;
        }
        self.notice = None;
        self.mode = Mode::Editing(EditSession::for_environment(&environment));
    }

    fn session_mut(&mut self) -> Option<&mut EditSession> {
        match &mut self.mode {
            Mode::Editing(session) => Some(session),
            _ => None,
        }
    }

    pub fn edit(&mut self, apply: impl FnOnce(&mut EditSession)) {
        if let Some(session) = self.session_mut() {
            apply(session);
        }
    }

    /// Discard the draft; persisted state is untouched
    pub fn cancel_edit(&mut self) {
        if matches!(self.mode, Mode::Editing(_)) {
            self.mode = Mode::Browsing;
            self.notice = None;
        }
    }

    /// Persist the draft, then apply it in memory. On a storage failure the
    /// session stays open with the draft intact so saving can be retried.
    pub fn save(&mut self) {
        let Mode::Editing(session) = &self.mode else {
            return;
        };
        let target = session.target.clone();
        let committed = session.commit();

        let saved = match (target, committed) {
            (EditTarget::Request(id), Committed::Request(template)) => {
                let mut candidate = self.tree.clone();
                match candidate.replace_request(id, template) {
                    Ok(()) => self.persist(candidate, id),
                    Err(e) => self.abandon_edit(e),
                }
            }
            (EditTarget::Container(id), Committed::Container(container)) => {
                let is_root = self.tree.parent(id).is_none();
                if is_root && self.collection_name_taken(&container.name, Some(id)) {
                    self.notice = Some(format!(
                        "A collection named \"{}\" already exists",
                        container.name
                    ));
                    return;
                }
                // Same stem means the save already overwrote the old document
                let old_root_name = self
                    .tree
                    .get(id)
                    .filter(|_| is_root)
                    .map(|node| node.name().to_string())
                    .filter(|name| file_stem(name) != file_stem(&container.name));
                let mut candidate = self.tree.clone();
                match candidate.replace_container(id, container) {
                    Ok(()) => {
                        let saved = self.persist(candidate, id);
                        if let (true, Some(old)) = (saved, old_root_name) {
                            if let Err(e) = self.storage.remove_collection(&old) {
                                tracing::warn!(error = %e, collection = %old, "Failed to remove renamed collection file");
                            }
                        }
                        saved
                    }
                    Err(e) => self.abandon_edit(e),
                }
            }
            (_, Committed::Environment(environment)) => match self.storage.save_environment(&environment) {
                Ok(()) => {
                    let mut store = write_store(&self.variables);
                    let name = environment.name.clone();
                    store.upsert(environment);
                    if store.active().is_none() {
                        let _ = store.activate(&name);
                    }
                    true
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to save environment");
                    self.notice = Some(format!("Save failed: {}", e));
                    false
                }
            },
            _ => false,
        };

        if saved {
            self.mode = Mode::Browsing;
            self.notice = Some("Saved".to_string());
        }
    }

    /// The edited node disappeared; nothing left to save into
    fn abandon_edit(&mut self, error: crate::error::TreeError) -> bool {
        self.mode = Mode::Browsing;
        self.notice = Some(format!("Cannot save: {}", error));
        false
    }

    /// Save the collection containing `node` from `candidate` and adopt it on success
    fn persist(&mut self, candidate: CollectionTree, node: NodeId) -> bool {
        let Some(root) = candidate.root_of(node) else {
            return false;
        };
        match self.storage.save_collection(&candidate, root) {
            Ok(()) => {
                self.tree = candidate;
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to save collection");
                self.notice = Some(format!("Save failed: {}", e));
                false
            }
        }
    }

    // ========================
    // Tree changes
    // ========================

    fn insert_request(&mut self, template: RequestTemplate) -> Option<NodeId> {
        if !matches!(self.mode, Mode::Browsing) {
            return None;
        }
        let Some(parent) = self.selected.and_then(|id| self.tree.container_of(id)) else {
            self.notice = Some("Create a collection first (N)".to_string());
            return None;
        };
        let mut candidate = self.tree.clone();
        let id = candidate.add_request(parent, template).ok()?;
        if self.persist(candidate, id) {
            self.reveal(id);
            Some(id)
        } else {
            None
        }
    }

    /// Add a request under the selection and open it for editing
    pub fn new_request(&mut self) {
        if self.insert_request(RequestTemplate::default()).is_some() {
            self.edit_selected();
        }
    }

    pub fn new_folder(&mut self) {
        if !matches!(self.mode, Mode::Browsing) {
            return;
        }
        let Some(parent) = self.selected.and_then(|id| self.tree.container_of(id)) else {
            self.notice = Some("Create a collection first (N)".to_string());
            return;
        };
        let mut candidate = self.tree.clone();
        let Ok(id) = candidate.add_folder(parent, "New Folder") else {
            return;
        };
        if self.persist(candidate, id) {
            self.reveal(id);
            self.edit_selected();
        }
    }

    pub fn new_collection(&mut self) {
        if !matches!(self.mode, Mode::Browsing) {
            return;
        }
        let name = (1..)
            .map(|n| format!("Collection {}", n))
            .find(|name| !self.collection_name_taken(name, None))
            .unwrap_or_else(|| "Collection".to_string());

        let mut candidate = self.tree.clone();
        let id = candidate.add_collection(name);
        if self.persist(candidate, id) {
            self.expanded.insert(id);
            self.selected = Some(id);
            self.edit_selected();
        }
    }

    /// Whether another collection would be stored under the same document
    fn collection_name_taken(&self, name: &str, except: Option<NodeId>) -> bool {
        let stem = file_stem(name);
        self.tree
            .roots()
            .iter()
            .filter(|id| Some(**id) != except)
            .filter_map(|id| self.tree.get(*id))
            .any(|node| file_stem(node.name()) == stem)
    }

    /// Remove the selected node and everything under it
    pub fn delete_selected(&mut self) {
        if !matches!(self.mode, Mode::Browsing) {
            return;
        }
        let Some(id) = self.selected else {
            return;
        };
        let Some(node) = self.tree.get(id) else {
            return;
        };
        let name = node.name().to_string();
        if self.has_in_flight_within(id) {
            self.notice = Some(format!("\"{}\" has a request in flight; cancel it first", name));
            return;
        }

        let parent = node.parent;
        let mut candidate = self.tree.clone();
        let removed = match candidate.remove(id) {
            Ok(removed) => removed,
            Err(e) => {
                self.notice = Some(e.to_string());
                return;
            }
        };
        let deleted = match parent {
            Some(parent) => self.persist(candidate, parent),
            None => match self.storage.remove_collection(&name) {
                Ok(()) => {
                    self.tree = candidate;
                    true
                }
                Err(e) => {
                    self.notice = Some(format!("Delete failed: {}", e));
                    false
                }
            },
        };
        if deleted {
            for gone in &removed {
                self.expanded.remove(gone);
            }
            self.selected = parent.or_else(|| self.tree.roots().first().copied());
            self.settle_selection();
            self.notice = Some(format!("Deleted \"{}\"", name));
            tracing::info!(node = %id, removed = removed.len(), "Node deleted");
        }
    }

    // ========================
    // Environments
    // ========================

    /// Switch to the next environment (or none) in one step under the write lock
    pub fn cycle_environment(&mut self) {
        if matches!(self.mode, Mode::Editing(_)) {
            return;
        }
        let active = write_store(&self.variables).cycle_active().map(|e| e.name.clone());
        self.notice = Some(match active {
            Some(name) => format!("Environment: {}", name),
            None => "Environment: none".to_string(),
        });
    }

    // ========================
    // Execution
    // ========================

    /// Snapshot the template and scope chain and issue the call
    pub fn run(&mut self) -> Option<ExecutionCommand> {
        if !matches!(self.mode, Mode::Browsing | Mode::Viewing(_)) {
            return None;
        }
        let id = self.focused_node()?;
        let template = match self.tree.request(id) {
            Ok(template) => template.clone(),
            Err(_) => {
                self.notice = Some("Select a request to run".to_string());
                return None;
            }
        };
        let scopes = {
            let store = read_store(&self.variables);
            self.tree.scope_chain(id, store.active()).ok()?
        };

        let ticket = self.allocate_ticket();
        self.in_flight.insert(
            ticket,
            InFlight {
                request_id: id,
                bytes_received: 0,
            },
        );
        self.mode = Mode::Executing { ticket, request_id: id };
        self.notice = None;
        Some(ExecutionCommand::Execute {
            ticket,
            template,
            scopes,
            timeout: self.timeout,
        })
    }

    /// Abort the focused execution
    pub fn cancel_run(&mut self) -> Option<ExecutionCommand> {
        let Mode::Executing { ticket, .. } = self.mode else {
            return None;
        };
        self.mode = Mode::Browsing;
        Some(ExecutionCommand::Cancel(ticket))
    }

    pub fn handle_execution_event(&mut self, event: ExecutionEvent) {
        match event {
            ExecutionEvent::Progress { ticket, bytes_received } => {
                if let Some(flight) = self.in_flight.get_mut(&ticket) {
                    flight.bytes_received = bytes_received;
                }
            }
            ExecutionEvent::Finished { ticket, request_id, result } => {
                self.in_flight.remove(&ticket);
                let focused = matches!(self.mode, Mode::Executing { ticket: t, .. } if t == ticket);
                if focused {
                    self.mode = Mode::Viewing(ViewState {
                        error: result.as_ref().err().map(|e| e.to_string()),
                        ..ViewState::latest(request_id)
                    });
                    return;
                }

                // Keep an older entry on screen when a new one lands above it;
                // at capacity the oldest entry is gone, so stay within the log
                let len = lock_history(&self.history).len(request_id);
                if let (Mode::Viewing(view), Ok(_)) = (&mut self.mode, &result) {
                    if view.request_id == request_id && view.index > 0 {
                        view.index = (view.index + 1).min(len.saturating_sub(1));
                    }
                }
                let name = self
                    .tree
                    .get(request_id)
                    .map(|n| n.name().to_string())
                    .unwrap_or_else(|| request_id.to_string());
                self.notice = Some(match &result {
                    Ok(entry) => match (entry.response(), entry.failure()) {
                        (Some(record), _) => format!(
                            "\"{}\" finished: {} in {} ms",
                            name,
                            record.status,
                            record.elapsed.as_millis()
                        ),
                        (None, Some(failure)) => format!("\"{}\" failed: {}", name, failure.error),
                        (None, None) => format!("\"{}\" finished", name),
                    },
                    Err(e) => e.to_string(),
                });
            }
            ExecutionEvent::Cancelled { ticket, request_id } => {
                self.in_flight.remove(&ticket);
                let name = self
                    .tree
                    .get(request_id)
                    .map(|n| n.name().to_string())
                    .unwrap_or_else(|| request_id.to_string());
                self.notice = Some(format!("Cancelled \"{}\"", name));
            }
        }
    }

    // ========================
    // Viewing
    // ========================

    fn view_mut(&mut self) -> Option<&mut ViewState> {
        match &mut self.mode {
            Mode::Viewing(view) => Some(view),
            _ => None,
        }
    }

    pub fn scroll_up(&mut self) {
        if let Some(view) = self.view_mut() {
            view.scroll = view.scroll.saturating_sub(1);
        }
    }

    pub fn scroll_down(&mut self) {
        if let Some(view) = self.view_mut() {
            view.scroll = view.scroll.saturating_add(1);
        }
    }

    pub fn history_older(&mut self) {
        let history = std::sync::Arc::clone(&self.history);
        if let Some(view) = self.view_mut() {
            let len = lock_history(&history).len(view.request_id);
            if view.index + 1 < len {
                view.index += 1;
                view.scroll = 0;
                view.error = None;
            }
        }
    }

    pub fn history_newer(&mut self) {
        if let Some(view) = self.view_mut() {
            if view.index > 0 {
                view.index -= 1;
                view.scroll = 0;
                view.error = None;
            }
        }
    }

    pub fn toggle_curl(&mut self) {
        if let Some(view) = self.view_mut() {
            view.show_curl = !view.show_curl;
            view.scroll = 0;
        }
    }

    // ========================
    // cURL import
    // ========================

    pub fn show_curl_import(&mut self) {
        if matches!(self.mode, Mode::Browsing) {
            self.curl_import = Some(String::new());
        }
    }

    pub fn curl_import_char(&mut self, c: char) {
        if let Some(buffer) = &mut self.curl_import {
            buffer.push(c);
        }
    }

    pub fn curl_import_backspace(&mut self) {
        if let Some(buffer) = &mut self.curl_import {
            buffer.pop();
        }
    }

    pub fn import_curl(&mut self) {
        let Some(buffer) = self.curl_import.take() else {
            return;
        };
        match curl::parse_curl(&buffer) {
            Ok(template) => {
                if self.insert_request(template).is_some() {
                    self.notice = Some("Imported cURL command".to_string());
                }
            }
            Err(e) => self.notice = Some(format!("Invalid cURL command: {}", e)),
        }
    }

    pub fn cancel_curl_import(&mut self) {
        self.curl_import = None;
    }

    // ========================
    // Layout and popups
    // ========================

    pub fn toggle_sidebar(&mut self) {
        self.show_sidebar = !self.show_sidebar;
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    pub fn close_help(&mut self) {
        self.show_help = false;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::app::editor::Field;
    use crate::collection::Container;
    use crate::error::StorageError;
    use crate::history::HistoryLog;
    use crate::models::{BodyKind, HistoryEntry, HttpMethod, Outcome, ResponseRecord};
    use crate::storage::Storage;
    use crate::variables::VariableStore;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Records saves in memory and fails on demand
    #[derive(Default)]
    pub(crate) struct MemoryStorage {
        pub fail: AtomicBool,
        pub collections: Mutex<Vec<String>>,
        pub environments: Mutex<Vec<Environment>>,
        pub removed: Mutex<Vec<String>>,
    }

    impl MemoryStorage {
        fn check(&self) -> Result<(), StorageError> {
            if self.fail.load(Ordering::SeqCst) {
                Err(StorageError::Other(anyhow::anyhow!("disk full")))
            } else {
                Ok(())
            }
        }
    }

    impl Storage for MemoryStorage {
        fn load_collections(&self) -> Result<CollectionTree, StorageError> {
            Ok(CollectionTree::new())
        }

        fn load_environments(&self) -> Result<Vec<Environment>, StorageError> {
            Ok(self.environments.lock().unwrap().clone())
        }

        fn save_collection(&self, tree: &CollectionTree, collection: NodeId) -> Result<(), StorageError> {
            self.check()?;
            let name = tree.get(collection).map(|n| n.name().to_string()).unwrap_or_default();
            self.collections.lock().unwrap().push(name);
            Ok(())
        }

        fn remove_collection(&self, name: &str) -> Result<(), StorageError> {
            self.check()?;
            self.removed.lock().unwrap().push(name.to_string());
            Ok(())
        }

        fn save_environment(&self, environment: &Environment) -> Result<(), StorageError> {
            self.check()?;
            self.environments.lock().unwrap().push(environment.clone());
            Ok(())
        }
    }

    pub(crate) struct Fixture {
        pub state: AppState,
        pub storage: Arc<MemoryStorage>,
        pub api: NodeId,
        pub folder: NodeId,
        pub get_user: NodeId,
        pub list_users: NodeId,
    }

    /// api / users (folder, id=7) / "Get user"; api / "List users"; env "dev" active
    pub(crate) fn fixture() -> Fixture {
        let mut tree = CollectionTree::new();
        let api = tree.add_collection("api");
        let folder = tree.add_folder(api, "users").unwrap();
        tree.replace_container(
            folder,
            Container {
                name: "users".into(),
                variables: [("id".to_string(), "7".to_string())].into(),
            },
        )
        .unwrap();
        let get_user = tree
            .add_request(folder, RequestTemplate::new("Get user", HttpMethod::GET, "{{base}}/users/{{id}}"))
            .unwrap();
        let list_users = tree
            .add_request(api, RequestTemplate::new("List users", HttpMethod::GET, "{{base}}/users"))
            .unwrap();

        let mut store = VariableStore::new(vec![
            Environment::new("dev").with("base", "http://localhost:8080").with("id", "1"),
            Environment::new("prod").with("base", "https://api.example.com"),
        ]);
        store.activate("dev").unwrap();

        let storage = Arc::new(MemoryStorage::default());
        let state = AppState::new(
            tree,
            store.into_shared(),
            HistoryLog::new(10).into_shared(),
            storage.clone(),
            Duration::from_secs(5),
        );
        Fixture {
            state,
            storage,
            api,
            folder,
            get_user,
            list_users,
        }
    }

    fn execute_parts(cmd: Option<ExecutionCommand>) -> (u64, RequestTemplate, crate::variables::ScopeChain) {
        match cmd {
            Some(ExecutionCommand::Execute {
                ticket,
                template,
                scopes,
                ..
            }) => (ticket, template, scopes),
            other => panic!("expected execute, got {:?}", other),
        }
    }

    #[test]
    fn test_starts_browsing_at_root() {
        let f = fixture();
        assert_eq!(f.state.mode, Mode::Browsing);
        assert_eq!(f.state.selected, Some(f.api));
        let names: Vec<_> = f.state.rows().iter().map(|r| r.name.clone()).collect();
        assert_eq!(names, vec!["api", "users", "List users"]);
    }

    #[test]
    fn test_select_drills_into_folder_then_views_request() {
        let mut f = fixture();
        f.state.cursor_down();
        assert_eq!(f.state.selected, Some(f.folder));
        f.state.select();
        assert_eq!(f.state.mode, Mode::Browsing);
        f.state.cursor_down();
        assert_eq!(f.state.selected, Some(f.get_user));

        f.state.select();
        assert_eq!(f.state.mode, Mode::Viewing(ViewState::latest(f.get_user)));
        f.state.back();
        assert_eq!(f.state.mode, Mode::Browsing);
    }

    #[test]
    fn test_back_collapses_then_climbs() {
        let mut f = fixture();
        f.state.reveal(f.get_user);
        f.state.back();
        assert_eq!(f.state.selected, Some(f.folder));
        f.state.back();
        assert!(!f.state.expanded.contains(&f.folder));
        f.state.back();
        assert_eq!(f.state.selected, Some(f.api));
        f.state.cursor_end();
        assert_eq!(f.state.selected, Some(f.list_users));
        f.state.cursor_home();
        assert_eq!(f.state.selected, Some(f.api));
    }

    #[test]
    fn test_edit_and_save_request() {
        let mut f = fixture();
        f.state.selected = Some(f.list_users);
        f.state.edit_selected();
        assert!(matches!(f.state.mode, Mode::Editing(_)));
        f.state.edit(|s| {
            s.insert_char('?');
            s.cycle_method();
        });
        f.state.save();

        assert_eq!(f.state.mode, Mode::Browsing);
        let template = f.state.tree.request(f.list_users).unwrap();
        assert_eq!(template.url, "{{base}}/users?");
        assert_eq!(template.method, HttpMethod::POST);
        assert_eq!(*f.storage.collections.lock().unwrap(), vec!["api".to_string()]);
    }

    #[test]
    fn test_save_failure_keeps_draft() {
        let mut f = fixture();
        f.state.selected = Some(f.list_users);
        f.state.edit_selected();
        f.state.edit(|s| s.insert_char('!'));
        f.storage.fail.store(true, Ordering::SeqCst);
        f.state.save();

        assert!(f.state.notice.as_deref().unwrap().contains("disk full"));
        match &f.state.mode {
            Mode::Editing(session) => assert_eq!(session.text(Field::Url), Some("{{base}}/users!")),
            other => panic!("expected editing, got {:?}", other),
        }
        assert_eq!(f.state.tree.request(f.list_users).unwrap().url, "{{base}}/users");

        f.storage.fail.store(false, Ordering::SeqCst);
        f.state.save();
        assert_eq!(f.state.mode, Mode::Browsing);
        assert_eq!(f.state.tree.request(f.list_users).unwrap().url, "{{base}}/users!");
    }

    #[test]
    fn test_cancel_edit_discards() {
        let mut f = fixture();
        f.state.selected = Some(f.list_users);
        f.state.edit_selected();
        f.state.edit(|s| s.insert_char('x'));
        f.state.cancel_edit();
        assert_eq!(f.state.mode, Mode::Browsing);
        assert_eq!(f.state.tree.request(f.list_users).unwrap().url, "{{base}}/users");
        assert!(f.storage.collections.lock().unwrap().is_empty());
    }

    #[test]
    fn test_run_snapshots_scopes() {
        let mut f = fixture();
        f.state.selected = Some(f.get_user);
        let (ticket, template, scopes) = execute_parts(f.state.run());

        assert_eq!(f.state.mode, Mode::Executing { ticket, request_id: f.get_user });
        assert_eq!(template.url, "{{base}}/users/{{id}}");
        // folder beats environment
        assert_eq!(scopes.resolve("id").unwrap(), "7");
        assert_eq!(scopes.resolve("base").unwrap(), "http://localhost:8080");
        assert_eq!(f.state.in_flight.len(), 1);

        f.state.cycle_environment();
        assert_eq!(scopes.resolve("base").unwrap(), "http://localhost:8080");
    }

    #[test]
    fn test_run_on_folder_is_refused() {
        let mut f = fixture();
        f.state.selected = Some(f.folder);
        assert!(f.state.run().is_none());
        assert_eq!(f.state.mode, Mode::Browsing);
    }

    #[test]
    fn test_cancel_returns_to_browsing() {
        let mut f = fixture();
        f.state.selected = Some(f.get_user);
        let (ticket, _, _) = execute_parts(f.state.run());
        assert!(matches!(f.state.cancel_run(), Some(ExecutionCommand::Cancel(t)) if t == ticket));
        assert_eq!(f.state.mode, Mode::Browsing);

        f.state.handle_execution_event(ExecutionEvent::Cancelled {
            ticket,
            request_id: f.get_user,
        });
        assert!(f.state.in_flight.is_empty());
        assert_eq!(f.state.notice.as_deref(), Some("Cancelled \"Get user\""));
    }

    #[test]
    fn test_preflight_error_is_shown_in_view() {
        let mut f = fixture();
        f.state.selected = Some(f.get_user);
        let (ticket, template, _) = execute_parts(f.state.run());
        let error = crate::error::ExecutionError::UnresolvedVariable {
            request: crate::error::RequestLabel::new(template.id, template.name),
            name: "token".into(),
        };
        f.state.handle_execution_event(ExecutionEvent::Finished {
            ticket,
            request_id: f.get_user,
            result: Err(error),
        });
        match &f.state.mode {
            Mode::Viewing(view) => assert!(view.error.as_deref().unwrap().contains("token")),
            other => panic!("expected viewing, got {:?}", other),
        }
    }

    #[test]
    fn test_navigation_detaches_from_executing() {
        let mut f = fixture();
        f.state.selected = Some(f.get_user);
        execute_parts(f.state.run());
        f.state.cursor_up();
        assert_eq!(f.state.mode, Mode::Browsing);
        assert_eq!(f.state.in_flight.len(), 1);
    }

    #[test]
    fn test_edit_refused_while_request_in_flight() {
        let mut f = fixture();
        f.state.selected = Some(f.get_user);
        execute_parts(f.state.run());
        f.state.back();

        f.state.selected = Some(f.get_user);
        f.state.edit_selected();
        assert_eq!(f.state.mode, Mode::Browsing);
        f.state.selected = Some(f.folder);
        f.state.edit_selected();
        assert_eq!(f.state.mode, Mode::Browsing);

        // unrelated request is fine
        f.state.selected = Some(f.list_users);
        f.state.edit_selected();
        assert!(matches!(f.state.mode, Mode::Editing(_)));
    }

    #[test]
    fn test_environment_edit_refused_while_running() {
        let mut f = fixture();
        f.state.selected = Some(f.get_user);
        let (ticket, _, _) = execute_parts(f.state.run());
        f.state.back();
        f.state.edit_environment();
        assert_eq!(f.state.mode, Mode::Browsing);

        f.state.handle_execution_event(ExecutionEvent::Cancelled {
            ticket,
            request_id: f.get_user,
        });
        f.state.edit_environment();
        assert!(matches!(f.state.mode, Mode::Editing(_)));
    }

    #[test]
    fn test_environment_save_updates_store() {
        let mut f = fixture();
        f.state.edit_environment();
        f.state.edit(|s| {
            s.add_variable();
            for c in "token".chars() {
                s.insert_char(c);
            }
            s.next_field();
            s.insert_char('t');
        });
        f.state.save();
        assert_eq!(f.state.mode, Mode::Browsing);
        let store = read_store(&f.state.variables);
        assert_eq!(store.active().unwrap().get("token").map(String::as_str), Some("t"));
        assert_eq!(f.storage.environments.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_cycle_environment_includes_none() {
        let mut f = fixture();
        f.state.cycle_environment();
        assert_eq!(f.state.notice.as_deref(), Some("Environment: prod"));
        f.state.cycle_environment();
        assert_eq!(f.state.notice.as_deref(), Some("Environment: none"));
        assert!(read_store(&f.state.variables).active().is_none());
    }

    #[test]
    fn test_delete_folder_is_recursive() {
        let mut f = fixture();
        f.state.selected = Some(f.folder);
        f.state.delete_selected();
        assert!(!f.state.tree.contains(f.folder));
        assert!(!f.state.tree.contains(f.get_user));
        assert_eq!(f.state.selected, Some(f.api));
        assert_eq!(*f.storage.collections.lock().unwrap(), vec!["api".to_string()]);
    }

    #[test]
    fn test_delete_collection_removes_document() {
        let mut f = fixture();
        f.state.delete_selected();
        assert!(f.state.tree.is_empty());
        assert_eq!(f.state.selected, None);
        assert_eq!(*f.storage.removed.lock().unwrap(), vec!["api".to_string()]);
    }

    #[test]
    fn test_new_request_lands_in_selected_container() {
        let mut f = fixture();
        f.state.selected = Some(f.get_user);
        f.state.new_request();
        let Some(id) = f.state.selected else {
            panic!("nothing selected");
        };
        assert_eq!(f.state.tree.parent(id), Some(f.folder));
        assert!(matches!(f.state.mode, Mode::Editing(_)));
    }

    #[test]
    fn test_rename_collection_removes_old_document() {
        let mut f = fixture();
        f.state.edit_selected();
        f.state.edit(|s| s.insert_char('2'));
        f.state.save();
        assert_eq!(f.state.tree.get(f.api).unwrap().name(), "api2");
        assert_eq!(*f.storage.removed.lock().unwrap(), vec!["api".to_string()]);
    }

    fn rename_selected(state: &mut AppState, name: &str) {
        state.edit_selected();
        state.edit(|s| {
            while s.text(Field::Name).is_some_and(|t| !t.is_empty()) {
                s.backspace();
            }
            name.chars().for_each(|c| s.insert_char(c));
        });
        state.save();
    }

    #[test]
    fn test_rename_onto_existing_collection_is_refused() {
        let mut f = fixture();
        f.state.tree.add_collection("a_b");
        rename_selected(&mut f.state, "a/b");

        assert!(f.state.notice.as_deref().unwrap().contains("already exists"));
        match &f.state.mode {
            Mode::Editing(session) => assert_eq!(session.text(Field::Name), Some("a/b")),
            other => panic!("expected editing, got {:?}", other),
        }
        assert_eq!(f.state.tree.get(f.api).unwrap().name(), "api");
        assert!(f.storage.collections.lock().unwrap().is_empty());
        assert!(f.storage.removed.lock().unwrap().is_empty());
    }

    #[test]
    fn test_rename_to_same_document_keeps_it() {
        let mut f = fixture();
        rename_selected(&mut f.state, "api.");
        assert_eq!(f.state.mode, Mode::Browsing);
        assert_eq!(*f.storage.collections.lock().unwrap(), vec!["api.".to_string()]);
        assert!(f.storage.removed.lock().unwrap().is_empty());
    }

    #[test]
    fn test_new_collection_skips_taken_documents() {
        let mut f = fixture();
        f.state.tree.add_collection("Collection 1");
        f.state.new_collection();
        let id = f.state.selected.unwrap();
        assert_eq!(f.state.tree.get(id).unwrap().name(), "Collection 2");
    }

    #[test]
    fn test_older_entry_stays_in_bounds_at_capacity() {
        let mut f = fixture();
        let capacity = lock_history(&f.state.history).capacity();
        let record = |state: &mut AppState, ticket: u64| {
            let template = state.tree.request(f.list_users).unwrap().clone();
            let entry = HistoryEntry {
                request_id: f.list_users,
                snapshot: crate::models::ResolvedRequest {
                    request_id: f.list_users,
                    name: template.name,
                    method: template.method,
                    url: template.url,
                    headers: Vec::new(),
                    body: None,
                },
                outcome: Outcome::Response(ResponseRecord {
                    request_id: f.list_users,
                    timestamp: chrono::Utc::now(),
                    status: 200,
                    elapsed: Duration::from_millis(1),
                    headers: Vec::new(),
                    body: Vec::new(),
                    body_kind: BodyKind::Text,
                }),
            };
            let entry = lock_history(&state.history).append(entry);
            state.handle_execution_event(ExecutionEvent::Finished {
                ticket,
                request_id: f.list_users,
                result: Ok(entry),
            });
        };
        for ticket in 0..capacity as u64 {
            record(&mut f.state, 100 + ticket);
        }

        f.state.mode = Mode::Viewing(ViewState {
            index: capacity - 1,
            ..ViewState::latest(f.list_users)
        });
        record(&mut f.state, 500);
        record(&mut f.state, 501);

        match &f.state.mode {
            Mode::Viewing(view) => {
                assert_eq!(view.index, capacity - 1);
                assert!(lock_history(&f.state.history).get(f.list_users, view.index).is_some());
            }
            other => panic!("expected viewing, got {:?}", other),
        }
    }

    #[test]
    fn test_curl_import() {
        let mut f = fixture();
        f.state.show_curl_import();
        for c in "curl -X DELETE https://h/x".chars() {
            f.state.curl_import_char(c);
        }
        f.state.import_curl();
        assert!(f.state.curl_import.is_none());
        let id = f.state.selected.unwrap();
        let template = f.state.tree.request(id).unwrap();
        assert_eq!(template.method, HttpMethod::DELETE);
        assert_eq!(f.state.tree.parent(id), Some(f.api));
    }

    #[test]
    fn test_render_state_reflects_mode() {
        let mut f = fixture();
        f.state.selected = Some(f.get_user);
        execute_parts(f.state.run());
        let render = f.state.to_render_state();
        assert_eq!(render.input_mode, crate::messages::ui_events::InputMode::Executing);
        assert_eq!(render.environment.as_deref(), Some("dev"));
        assert_eq!(render.in_flight, 1);
        // the folder is collapsed, so it carries the marker for its request
        assert!(render.rows.iter().any(|r| r.row.id == f.folder && r.in_flight));
        assert!(render.rows.iter().all(|r| r.row.id != f.list_users || !r.in_flight));

        f.state.reveal(f.get_user);
        let render = f.state.to_render_state();
        assert!(render.rows.iter().any(|r| r.row.id == f.get_user && r.in_flight));
        assert!(render.rows.iter().all(|r| r.row.id != f.folder || !r.in_flight));
    }
}
