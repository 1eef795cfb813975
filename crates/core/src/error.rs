// Error types shared by the catalog, runner, and execution pipeline

use serde::{Deserialize, Serialize};

/// Setup-time misuse of the catalog or the exposure options.
///
/// These are raised once, when configuration is validated, and are fatal to
/// the call path that triggered them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Neither a domain set nor an explicit action list was supplied.
    #[error("cannot discover domains: supply a domain list or an explicit action list")]
    MissingDomains,

    /// An allow-listed action is not declared as a tool.
    #[error("action {entity}.{action} is not exposed as a tool")]
    ActionNotExposed { entity: String, action: String },

    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    #[error("duplicate entity: {0}")]
    DuplicateEntity(String),

    #[error("unknown action {entity}.{action}")]
    UnknownAction { entity: String, action: String },

    #[error("duplicate tool name: {0}")]
    DuplicateTool(String),

    #[error("duplicate resource name: {0}")]
    DuplicateResource(String),

    #[error("duplicate resource uri: {0}")]
    DuplicateResourceUri(String),

    /// The action backing an action resource must return a string.
    #[error("resource {resource} requires {entity}.{action} to return a string")]
    NonStringResource {
        resource: String,
        entity: String,
        action: String,
    },

    #[error("ui resource uri must start with ui://, got {0}")]
    InvalidUiUri(String),

    #[error("tool {tool} references unknown identity {identity}")]
    UnknownIdentity { tool: String, identity: String },

    #[error("tool {tool} references unknown ui resource {uri}")]
    UnknownUiResource { tool: String, uri: String },
}

/// Domain or validation failure raised while executing an action.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ActionError {
    #[error("unknown input keys: {}", keys.join(", "))]
    UnknownInputs { keys: Vec<String> },

    #[error("invalid value for {field}: {message}")]
    InvalidArgument { field: String, message: String },

    #[error("{field} is required")]
    Required { field: String },

    #[error("cannot filter on {field}: {message}")]
    InvalidFilter { field: String, message: String },

    #[error("cannot sort on {field}: {message}")]
    InvalidSort { field: String, message: String },

    #[error("invalid aggregate: {0}")]
    InvalidAggregate(String),

    #[error("{entity} not found")]
    NotFound { entity: String },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("action failed: {0}")]
    Failed(String),
}

impl ActionError {
    pub fn invalid_argument(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownInputs { .. } => "no_such_input",
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::Required { .. } => "required",
            Self::InvalidFilter { .. } => "invalid_filter",
            Self::InvalidSort { .. } => "invalid_sort",
            Self::InvalidAggregate(_) => "invalid_aggregate",
            Self::NotFound { .. } => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::Failed(_) => "unknown_error",
        }
    }

    /// HTTP-style status carried in the error payload
    pub fn status(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Forbidden(_) => 403,
            Self::Failed(_) => 500,
            _ => 400,
        }
    }

    fn title(&self) -> &'static str {
        match self {
            Self::UnknownInputs { .. } => "NoSuchInput",
            Self::InvalidArgument { .. } => "InvalidArgument",
            Self::Required { .. } => "Required",
            Self::InvalidFilter { .. } => "InvalidFilter",
            Self::InvalidSort { .. } => "InvalidSort",
            Self::InvalidAggregate(_) => "InvalidAggregate",
            Self::NotFound { .. } => "NotFound",
            Self::Forbidden(_) => "Forbidden",
            Self::Failed(_) => "UnknownError",
        }
    }

    /// Expand into one payload entry per offending field.
    pub fn to_entries(&self) -> Vec<ErrorEntry> {
        match self {
            Self::UnknownInputs { keys } => keys
                .iter()
                .map(|key| {
                    self.entry(
                        format!("no such input `{}`", key),
                        Some(format!("/input/{}", key)),
                    )
                })
                .collect(),
            Self::InvalidArgument { field, .. } | Self::Required { field } => {
                vec![self.entry(self.to_string(), Some(format!("/input/{}", field)))]
            }
            Self::InvalidFilter { field, .. } => {
                vec![self.entry(self.to_string(), Some(format!("/filter/{}", field)))]
            }
            Self::InvalidSort { .. } => vec![self.entry(self.to_string(), Some("/sort".into()))],
            Self::InvalidAggregate(_) => {
                vec![self.entry(self.to_string(), Some("/result_type".into()))]
            }
            _ => vec![self.entry(self.to_string(), None)],
        }
    }

    fn entry(&self, detail: String, pointer: Option<String>) -> ErrorEntry {
        ErrorEntry {
            id: uuid::Uuid::new_v4().to_string(),
            status: self.status().to_string(),
            code: self.code().to_string(),
            title: self.title().to_string(),
            detail,
            source: pointer.map(|pointer| ErrorSource { pointer }),
        }
    }
}

/// One element of a serialized error list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub id: String,
    pub status: String,
    pub code: String,
    pub title: String,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ErrorSource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSource {
    pub pointer: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_inputs_expand_per_key() {
        let error = ActionError::UnknownInputs {
            keys: vec!["foo".into(), "bar".into()],
        };
        let entries = error.to_entries();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].code, "no_such_input");
        assert_eq!(entries[0].status, "400");
        assert!(entries[0].detail.contains("foo"));
        assert_eq!(entries[1].source.as_ref().unwrap().pointer, "/input/bar");
    }

    #[test]
    fn test_not_found_entry() {
        let entries = ActionError::not_found("artist").to_entries();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, "404");
        assert_eq!(entries[0].code, "not_found");
        assert_eq!(entries[0].detail, "artist not found");
        assert!(entries[0].source.is_none());
    }

    #[test]
    fn test_config_error_messages() {
        let err = ConfigError::ActionNotExposed {
            entity: "artist".into(),
            action: "purge".into(),
        };
        assert_eq!(err.to_string(), "action artist.purge is not exposed as a tool");
    }
}
