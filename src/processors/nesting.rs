//! Removal of detections nested inside container detections.

use crate::core::constants::{NESTING_MARGIN, PARENT_LABELS};
use crate::domain::FlatComponent;
use tracing::{debug, info};

/// Returns `true` for container labels such as `div`, `navbar` or `form_login`.
pub fn is_parent_label(label: &str) -> bool {
    let label = label.to_lowercase();
    PARENT_LABELS.iter().any(|parent| {
        label == *parent
            || label
                .strip_prefix(parent)
                .is_some_and(|rest| rest.starts_with('_'))
    })
}

/// Returns `true` for labels that carry image content.
pub fn is_image_label(label: &str) -> bool {
    label.to_lowercase().contains("image")
}

/// Drops non-container components that lie inside a container box.
///
/// Containers and image components are always kept. A component whose box
/// equals the container box is not considered nested. The filter is
/// idempotent: applying it to its own output changes nothing.
pub fn filter_nested_elements(components: &[FlatComponent]) -> Vec<FlatComponent> {
    let parents: Vec<&FlatComponent> = components
        .iter()
        .filter(|c| is_parent_label(&c.label))
        .collect();

    let kept: Vec<FlatComponent> = components
        .iter()
        .filter(|component| {
            if is_image_label(&component.label) || is_parent_label(&component.label) {
                return true;
            }
            let container = parents.iter().find(|parent| {
                component.box_2d != parent.box_2d
                    && component.box_2d.is_inside(&parent.box_2d, NESTING_MARGIN)
            });
            match container {
                Some(parent) => {
                    debug!(
                        label = %component.label,
                        parent = %parent.label,
                        "filtering nested element"
                    );
                    false
                }
                None => true,
            }
        })
        .cloned()
        .collect();

    info!(
        removed = components.len() - kept.len(),
        kept = kept.len(),
        "nested elements filtered"
    );
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::geometry::Box2D;

    fn sample() -> Vec<FlatComponent> {
        vec![
            FlatComponent::new("div", Box2D::new(0, 0, 500, 1000)),
            FlatComponent::new("button", Box2D::new(100, 100, 150, 300)),
            FlatComponent::new("hero_image", Box2D::new(200, 0, 400, 500)),
            FlatComponent::new("text", Box2D::new(0, 0, 500, 1000)),
            FlatComponent::new("navbar", Box2D::new(0, 0, 80, 1000)),
            FlatComponent::new("link", Box2D::new(10, 10, 40, 90)),
            FlatComponent::new("footer_text", Box2D::new(600, 0, 700, 1000)),
            FlatComponent::new("edge", Box2D::new(497, 0, 510, 1000)),
        ]
    }

    #[test]
    fn test_parent_label_matching() {
        assert!(is_parent_label("Header"));
        assert!(is_parent_label("form_login"));
        assert!(!is_parent_label("formula"));
        assert!(!is_parent_label("button"));
        assert!(is_image_label("Hero_Image"));
    }

    #[test]
    fn test_filter_removes_nested_non_containers() {
        let filtered = filter_nested_elements(&sample());
        let labels: Vec<&str> = filtered.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["div", "hero_image", "text", "navbar", "footer_text", "edge"]
        );
    }

    #[test]
    fn test_margin_allows_slight_overflow() {
        let components = vec![
            FlatComponent::new("div", Box2D::new(100, 100, 500, 500)),
            FlatComponent::new("label", Box2D::new(96, 98, 504, 505)),
        ];
        assert_eq!(filter_nested_elements(&components).len(), 1);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let once = filter_nested_elements(&sample());
        let twice = filter_nested_elements(&once);
        assert_eq!(once, twice);
    }
}
