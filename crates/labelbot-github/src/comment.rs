//! Rendering for the explanatory comment posted alongside an auto-label.

/// Builds the comment body for a confident prediction. The probability is
/// always shown to two decimal places; a blank class name falls back to
/// `unknown` rather than producing a hole in the sentence.
pub fn render_prediction_comment(class_name: &str, probability: f64) -> String {
    let class_name = if class_name.trim().is_empty() {
        "unknown"
    } else {
        class_name.trim()
    };
    format!(
        "labelbot has determined with {probability:.2} probability that this issue \
should be labeled as a `{class_name}` and is auto-labeling this issue. Please mark \
this comment with :thumbsup: or :thumbsdown: to give our bot feedback!"
    )
}
