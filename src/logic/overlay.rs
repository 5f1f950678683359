//! Overlay text - what the display surface shows for an `OverlayState`

use serde::Serialize;

use super::publisher::OverlayState;

/// Text content of the overlay panel and its two buttons
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayView {
    pub headline: String,
    pub caption: String,
    pub toggle_button: &'static str,
    pub reset_button: &'static str,
}

pub fn render(state: &OverlayState) -> OverlayView {
    let (headline, caption) = match &state.classification_result {
        Some(result) => (
            result.label.clone(),
            format!("Confidence: {:.1}%", result.confidence * 100.0),
        ),
        None => (
            "No diagnosis".to_string(),
            "Point the camera at a plant".to_string(),
        ),
    };

    OverlayView {
        headline,
        caption,
        toggle_button: if state.is_classification_enabled { "Stop diagnosis" } else { "Start diagnosis" },
        reset_button: "Reset",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::publisher::ClassificationResult;

    #[test]
    fn test_render_result() {
        let state = OverlayState {
            classification_result: Some(ClassificationResult::new("healthy", 0.95)),
            is_classification_enabled: true,
            ..Default::default()
        };
        let view = render(&state);
        assert_eq!(view.headline, "healthy");
        assert_eq!(view.caption, "Confidence: 95.0%");
        assert_eq!(view.toggle_button, "Stop diagnosis");
    }

    #[test]
    fn test_render_empty() {
        let view = render(&OverlayState::default());
        assert_eq!(view.headline, "No diagnosis");
        assert_eq!(view.toggle_button, "Start diagnosis");
    }
}
