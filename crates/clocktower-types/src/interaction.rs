//! Interaction responses produced by queued work

use serde::{Deserialize, Serialize};

/// Button style
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    #[default]
    Primary,
    Secondary,
    Success,
    Danger,
}

/// Option of a select menu
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

/// Interactive message component
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Component {
    Button {
        custom_id: String,
        label: String,
        #[serde(default)]
        style: ButtonStyle,
    },
    SelectMenu {
        custom_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        placeholder: Option<String>,
        options: Vec<SelectOption>,
    },
}

impl Component {
    pub fn button(custom_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::Button {
            custom_id: custom_id.into(),
            label: label.into(),
            style: ButtonStyle::Primary,
        }
    }
}

/// Content written into a deferred interaction response.
///
/// Each inner `Vec` of `component_rows` is rendered as one action row.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResponseContent {
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub component_rows: Vec<Vec<Component>>,
}

impl ResponseContent {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            component_rows: Vec::new(),
        }
    }

    pub fn add_components(&mut self, row: Vec<Component>) {
        self.component_rows.push(row);
    }
}

/// What a queued piece of work reports back to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedInteractionResult {
    pub message: String,
    pub include_components: bool,
    pub component_sets: Vec<Vec<Component>>,
}

impl QueuedInteractionResult {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            include_components: false,
            component_sets: Vec::new(),
        }
    }

    pub fn with_components(message: impl Into<String>, component_sets: Vec<Vec<Component>>) -> Self {
        Self {
            message: message.into(),
            include_components: true,
            component_sets,
        }
    }

    /// Build the response edit for this result. Component sets are dropped
    /// unless `include_components` is set.
    pub fn to_response(&self) -> ResponseContent {
        let mut response = ResponseContent::text(self.message.clone());
        if self.include_components {
            for set in &self.component_sets {
                response.add_components(set.clone());
            }
        }
        response
    }
}

impl From<String> for QueuedInteractionResult {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for QueuedInteractionResult {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_result_has_no_rows() {
        let response = QueuedInteractionResult::new("done").to_response();
        assert_eq!(response.content, "done");
        assert!(response.component_rows.is_empty());
    }

    #[test]
    fn test_component_sets_become_rows() {
        let result = QueuedInteractionResult::with_components(
            "pick one",
            vec![
                vec![Component::button("a", "A"), Component::button("b", "B")],
                vec![Component::button("c", "C")],
            ],
        );
        let response = result.to_response();
        assert_eq!(response.component_rows.len(), 2);
        assert_eq!(response.component_rows[0].len(), 2);
    }

    #[test]
    fn test_components_ignored_without_flag() {
        let result = QueuedInteractionResult {
            message: "hidden".to_string(),
            include_components: false,
            component_sets: vec![vec![Component::button("a", "A")]],
        };
        assert!(result.to_response().component_rows.is_empty());
    }

    #[test]
    fn test_component_tagged_serialization() {
        let json = serde_json::to_string(&Component::button("go", "Go")).unwrap();
        assert!(json.contains("\"type\":\"button\""));
        assert!(json.contains("\"style\":\"primary\""));
    }

    #[test]
    fn test_empty_rows_omitted() {
        let json = serde_json::to_string(&ResponseContent::text("hi")).unwrap();
        assert!(!json.contains("component_rows"));
    }
}
