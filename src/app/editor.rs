//! Edit sessions - drafts of a request, container or environment
//!
//! A session works on a private copy. Nothing reaches the tree or the
//! variable store until the caller commits and persists it.

use crate::collection::{Container, NodeId};
use crate::messages::render::EditorRow;
use crate::models::{Auth, KeyValue, RequestTemplate};
use crate::variables::{Environment, VariableMap};

/// What is being edited
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EditTarget {
    Request(NodeId),
    Container(NodeId),
    Environment(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Draft {
    Request {
        template: RequestTemplate,
        body: String,
        variables: Vec<KeyValue>,
    },
    Container {
        name: String,
        variables: Vec<KeyValue>,
    },
    Environment {
        variables: Vec<KeyValue>,
    },
}

/// An editable text field of the draft
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Name,
    Url,
    Body,
    /// Bearer token or Basic username
    AuthPrimary,
    /// Basic password
    AuthSecondary,
    HeaderKey(usize),
    HeaderValue(usize),
    QueryKey(usize),
    QueryValue(usize),
    VarName(usize),
    VarValue(usize),
}

/// Result of committing a session
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Committed {
    Request(RequestTemplate),
    Container(Container),
    Environment(Environment),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EditSession {
    pub target: EditTarget,
    pub draft: Draft,
    pub field: Field,
    /// Byte offset into the focused field
    pub cursor: usize,
}

fn map_to_rows(variables: &VariableMap) -> Vec<KeyValue> {
    variables
        .iter()
        .map(|(name, value)| KeyValue::new(name.clone(), value.clone()))
        .collect()
}

/// Later rows win; disabled and nameless rows are dropped
fn rows_to_map(rows: &[KeyValue]) -> VariableMap {
    rows.iter()
        .filter(|row| row.enabled && !row.key.trim().is_empty())
        .map(|row| (row.key.trim().to_string(), row.value.clone()))
        .collect()
}

fn non_empty_rows(rows: &[KeyValue]) -> Vec<KeyValue> {
    rows.iter()
        .filter(|row| !row.key.trim().is_empty() || !row.value.is_empty())
        .cloned()
        .collect()
}

impl EditSession {
    pub fn for_request(template: &RequestTemplate) -> Self {
        let mut session = EditSession {
            target: EditTarget::Request(template.id),
            draft: Draft::Request {
                template: template.clone(),
                body: template.body.clone().unwrap_or_default(),
                variables: map_to_rows(&template.variables),
            },
            field: Field::Url,
            cursor: 0,
        };
        session.cursor_to_end();
        session
    }

    pub fn for_container(id: NodeId, container: &Container) -> Self {
        let mut session = EditSession {
            target: EditTarget::Container(id),
            draft: Draft::Container {
                name: container.name.clone(),
                variables: map_to_rows(&container.variables),
            },
            field: Field::Name,
            cursor: 0,
        };
        session.cursor_to_end();
        session
    }

    /// An environment without variables starts with one blank row
    pub fn for_environment(environment: &Environment) -> Self {
        let mut variables = map_to_rows(&environment.variables);
        if variables.is_empty() {
            variables.push(KeyValue::new("", ""));
        }
        let mut session = EditSession {
            target: EditTarget::Environment(environment.name.clone()),
            draft: Draft::Environment { variables },
            field: Field::VarName(0),
            cursor: 0,
        };
        session.cursor_to_end();
        session
    }

    /// Request id, or the container id for folders and collections
    pub fn node(&self) -> Option<NodeId> {
        match &self.target {
            EditTarget::Request(id) | EditTarget::Container(id) => Some(*id),
            EditTarget::Environment(_) => None,
        }
    }

    /// Focusable fields in display order
    pub fn fields(&self) -> Vec<Field> {
        let mut fields = Vec::new();
        match &self.draft {
            Draft::Request {
                template,
                variables,
                ..
            } => {
                fields.push(Field::Name);
                fields.push(Field::Url);
                for i in 0..template.headers.len() {
                    fields.push(Field::HeaderKey(i));
                    fields.push(Field::HeaderValue(i));
                }
                for i in 0..template.query.len() {
                    fields.push(Field::QueryKey(i));
                    fields.push(Field::QueryValue(i));
                }
                match template.auth {
                    Auth::None => {}
                    Auth::Bearer { .. } => fields.push(Field::AuthPrimary),
                    Auth::Basic { .. } => {
                        fields.push(Field::AuthPrimary);
                        fields.push(Field::AuthSecondary);
                    }
                }
                fields.push(Field::Body);
                push_var_fields(&mut fields, variables.len());
            }
            Draft::Container { variables, .. } => {
                fields.push(Field::Name);
                push_var_fields(&mut fields, variables.len());
            }
            Draft::Environment { variables } => push_var_fields(&mut fields, variables.len()),
        }
        fields
    }

    pub fn text(&self, field: Field) -> Option<&str> {
        let text = match (&self.draft, field) {
            (Draft::Request { template, .. }, Field::Name) => &template.name,
            (Draft::Request { template, .. }, Field::Url) => &template.url,
            (Draft::Request { body, .. }, Field::Body) => body,
            (Draft::Request { template, .. }, Field::AuthPrimary) => match &template.auth {
                Auth::Bearer { token } => token,
                Auth::Basic { username, .. } => username,
                Auth::None => return None,
            },
            (Draft::Request { template, .. }, Field::AuthSecondary) => match &template.auth {
                Auth::Basic { password, .. } => password,
                _ => return None,
            },
            (Draft::Request { template, .. }, Field::HeaderKey(i)) => &template.headers.get(i)?.key,
            (Draft::Request { template, .. }, Field::HeaderValue(i)) => &template.headers.get(i)?.value,
            (Draft::Request { template, .. }, Field::QueryKey(i)) => &template.query.get(i)?.key,
            (Draft::Request { template, .. }, Field::QueryValue(i)) => &template.query.get(i)?.value,
            (Draft::Container { name, .. }, Field::Name) => name,
            (draft, Field::VarName(i)) => &draft_variables(draft)?.get(i)?.key,
            (draft, Field::VarValue(i)) => &draft_variables(draft)?.get(i)?.value,
            _ => return None,
        };
        Some(text.as_str())
    }

    fn text_mut(&mut self, field: Field) -> Option<&mut String> {
        match (&mut self.draft, field) {
            (Draft::Request { template, .. }, Field::Name) => Some(&mut template.name),
            (Draft::Request { template, .. }, Field::Url) => Some(&mut template.url),
            (Draft::Request { body, .. }, Field::Body) => Some(body),
            (Draft::Request { template, .. }, Field::AuthPrimary) => match &mut template.auth {
                Auth::Bearer { token } => Some(token),
                Auth::Basic { username, .. } => Some(username),
                Auth::None => None,
            },
            (Draft::Request { template, .. }, Field::AuthSecondary) => match &mut template.auth {
                Auth::Basic { password, .. } => Some(password),
                _ => None,
            },
            (Draft::Request { template, .. }, Field::HeaderKey(i)) => template.headers.get_mut(i).map(|h| &mut h.key),
            (Draft::Request { template, .. }, Field::HeaderValue(i)) => {
                template.headers.get_mut(i).map(|h| &mut h.value)
            }
            (Draft::Request { template, .. }, Field::QueryKey(i)) => template.query.get_mut(i).map(|q| &mut q.key),
            (Draft::Request { template, .. }, Field::QueryValue(i)) => template.query.get_mut(i).map(|q| &mut q.value),
            (Draft::Container { name, .. }, Field::Name) => Some(name),
            (draft, Field::VarName(i)) => draft_variables_mut(draft)?.get_mut(i).map(|v| &mut v.key),
            (draft, Field::VarValue(i)) => draft_variables_mut(draft)?.get_mut(i).map(|v| &mut v.value),
            _ => None,
        }
    }

    fn cursor_to_end(&mut self) {
        self.cursor = self.text(self.field).map_or(0, str::len);
    }

    /// Focus `field` if it exists, else the first field
    fn focus(&mut self, field: Field) {
        let fields = self.fields();
        self.field = if fields.contains(&field) {
            field
        } else {
            fields.first().copied().unwrap_or(Field::Name)
        };
        self.cursor_to_end();
    }

    pub fn next_field(&mut self) {
        let fields = self.fields();
        if let Some(pos) = fields.iter().position(|f| *f == self.field) {
            self.field = fields[(pos + 1) % fields.len()];
            self.cursor_to_end();
        }
    }

    pub fn prev_field(&mut self) {
        let fields = self.fields();
        if let Some(pos) = fields.iter().position(|f| *f == self.field) {
            self.field = fields[(pos + fields.len() - 1) % fields.len()];
            self.cursor_to_end();
        }
    }

    pub fn insert_char(&mut self, c: char) {
        let cursor = self.cursor;
        if let Some(text) = self.text_mut(self.field) {
            let at = cursor.min(text.len());
            text.insert(at, c);
            self.cursor = at + c.len_utf8();
        }
    }

    pub fn backspace(&mut self) {
        let cursor = self.cursor;
        if cursor == 0 {
            return;
        }
        if let Some(text) = self.text_mut(self.field) {
            let cursor = cursor.min(text.len());
            let prev_pos = text[..cursor]
                .char_indices()
                .last()
                .map(|(i, _)| i)
                .unwrap_or(0);
            text.remove(prev_pos);
            self.cursor = prev_pos;
        }
    }

    pub fn cursor_left(&mut self) {
        if let Some(text) = self.text(self.field) {
            let cursor = self.cursor.min(text.len());
            self.cursor = text[..cursor]
                .char_indices()
                .last()
                .map(|(i, _)| i)
                .unwrap_or(0);
        }
    }

    pub fn cursor_right(&mut self) {
        if let Some(text) = self.text(self.field) {
            if self.cursor < text.len() {
                self.cursor = text[self.cursor..]
                    .char_indices()
                    .nth(1)
                    .map(|(i, _)| self.cursor + i)
                    .unwrap_or(text.len());
            }
        }
    }

    pub fn cycle_method(&mut self) {
        if let Draft::Request { template, .. } = &mut self.draft {
            template.method = template.method.next();
        }
    }

    pub fn cycle_auth(&mut self) {
        if let Draft::Request { template, .. } = &mut self.draft {
            template.auth = template.auth.next();
            let field = if template.auth == Auth::None {
                Field::Url
            } else {
                Field::AuthPrimary
            };
            self.focus(field);
        }
    }

    pub fn add_header(&mut self) {
        if let Draft::Request { template, .. } = &mut self.draft {
            template.headers.push(KeyValue::new("", ""));
            let index = template.headers.len() - 1;
            self.focus(Field::HeaderKey(index));
        }
    }

    pub fn add_query_param(&mut self) {
        if let Draft::Request { template, .. } = &mut self.draft {
            template.query.push(KeyValue::new("", ""));
            let index = template.query.len() - 1;
            self.focus(Field::QueryKey(index));
        }
    }

    pub fn add_variable(&mut self) {
        if let Some(rows) = draft_variables_mut(&mut self.draft) {
            rows.push(KeyValue::new("", ""));
            let index = rows.len() - 1;
            self.focus(Field::VarName(index));
        }
    }

    /// Add a row of the kind under focus; variables for containers and environments
    pub fn add_row(&mut self) {
        match self.field {
            Field::QueryKey(_) | Field::QueryValue(_) => self.add_query_param(),
            Field::VarName(_) | Field::VarValue(_) => self.add_variable(),
            _ if matches!(self.draft, Draft::Request { .. }) => self.add_header(),
            _ => self.add_variable(),
        }
    }

    fn focused_rows(&mut self) -> Option<(&mut Vec<KeyValue>, usize)> {
        let field = self.field;
        match (&mut self.draft, field) {
            (Draft::Request { template, .. }, Field::HeaderKey(i) | Field::HeaderValue(i)) => {
                Some((&mut template.headers, i))
            }
            (Draft::Request { template, .. }, Field::QueryKey(i) | Field::QueryValue(i)) => {
                Some((&mut template.query, i))
            }
            (draft, Field::VarName(i) | Field::VarValue(i)) => Some((draft_variables_mut(draft)?, i)),
            _ => None,
        }
    }

    /// Remove the header, query param or variable row under focus
    pub fn delete_row(&mut self) {
        let field = self.field;
        let Some((rows, index)) = self.focused_rows() else {
            return;
        };
        if index >= rows.len() {
            return;
        }
        rows.remove(index);
        let remaining = rows.len();
        let next = match field {
            _ if remaining == 0 => Field::Name,
            Field::HeaderKey(_) | Field::HeaderValue(_) => Field::HeaderKey(index.min(remaining - 1)),
            Field::QueryKey(_) | Field::QueryValue(_) => Field::QueryKey(index.min(remaining - 1)),
            _ => Field::VarName(index.min(remaining - 1)),
        };
        self.focus(next);
    }

    /// Enable or disable the row under focus
    pub fn toggle_row(&mut self) {
        if let Some((rows, index)) = self.focused_rows() {
            if let Some(row) = rows.get_mut(index) {
                row.enabled = !row.enabled;
            }
        }
    }

    /// Build the edited value. Blank rows are dropped and an empty body
    /// becomes no body.
    pub fn commit(&self) -> Committed {
        match &self.draft {
            Draft::Request {
                template,
                body,
                variables,
            } => {
                let mut template = template.clone();
                template.name = template.name.trim().to_string();
                template.headers = non_empty_rows(&template.headers);
                template.query = non_empty_rows(&template.query);
                template.body = if body.is_empty() { None } else { Some(body.clone()) };
                template.variables = rows_to_map(variables);
                Committed::Request(template)
            }
            Draft::Container { name, variables } => Committed::Container(Container {
                name: name.trim().to_string(),
                variables: rows_to_map(variables),
            }),
            Draft::Environment { variables } => {
                let name = match &self.target {
                    EditTarget::Environment(name) => name.clone(),
                    _ => String::new(),
                };
                Committed::Environment(Environment {
                    name,
                    variables: rows_to_map(variables),
                })
            }
        }
    }

    pub fn label(&self, field: Field) -> String {
        match field {
            Field::Name => "Name".to_string(),
            Field::Url => "URL".to_string(),
            Field::Body => "Body".to_string(),
            Field::AuthPrimary => match &self.draft {
                Draft::Request {
                    template: RequestTemplate {
                        auth: Auth::Basic { .. },
                        ..
                    },
                    ..
                } => "Username".to_string(),
                _ => "Token".to_string(),
            },
            Field::AuthSecondary => "Password".to_string(),
            Field::HeaderKey(i) => format!("Header {}", i + 1),
            Field::HeaderValue(_) => "  value".to_string(),
            Field::QueryKey(i) => format!("Query {}", i + 1),
            Field::QueryValue(_) => "  value".to_string(),
            Field::VarName(i) => format!("Var {}", i + 1),
            Field::VarValue(_) => "  value".to_string(),
        }
    }

    fn row_enabled(&self, field: Field) -> bool {
        let row = match (&self.draft, field) {
            (Draft::Request { template, .. }, Field::HeaderKey(i) | Field::HeaderValue(i)) => template.headers.get(i),
            (Draft::Request { template, .. }, Field::QueryKey(i) | Field::QueryValue(i)) => template.query.get(i),
            (draft, Field::VarName(i) | Field::VarValue(i)) => draft_variables(draft).and_then(|v| v.get(i)),
            _ => None,
        };
        row.map_or(true, |r| r.enabled)
    }

    /// Rows for the editor pane
    pub fn view_rows(&self) -> Vec<EditorRow> {
        self.fields()
            .into_iter()
            .map(|field| EditorRow {
                label: self.label(field),
                value: self.text(field).unwrap_or_default().to_string(),
                focused: field == self.field,
                enabled: self.row_enabled(field),
            })
            .collect()
    }
}

fn push_var_fields(fields: &mut Vec<Field>, count: usize) {
    for i in 0..count {
        fields.push(Field::VarName(i));
        fields.push(Field::VarValue(i));
    }
}

fn draft_variables(draft: &Draft) -> Option<&Vec<KeyValue>> {
    match draft {
        Draft::Request { variables, .. }
        | Draft::Container { variables, .. }
        | Draft::Environment { variables } => Some(variables),
    }
}

fn draft_variables_mut(draft: &mut Draft) -> Option<&mut Vec<KeyValue>> {
    match draft {
        Draft::Request { variables, .. }
        | Draft::Container { variables, .. }
        | Draft::Environment { variables } => Some(variables),
    }
}
