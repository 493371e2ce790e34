//! HTML rendering for the predictions data page.

use minijinja::{context, Environment};

use labelbot_store::PredictionRecord;

const DATA_PAGE_TEMPLATE: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Predictions for {{ owner }}/{{ repo }}</title>
  <style>
    body { font-family: sans-serif; margin: 2rem; }
    table { border-collapse: collapse; }
    th, td { border: 1px solid #999; padding: 0.4rem 0.8rem; text-align: left; }
    th { background: #eee; }
  </style>
</head>
<body>
  <h1>Predictions for {{ owner }}/{{ repo }}</h1>
  {% if predictions %}
  <table>
    <tr>
      <th>Issue</th>
      <th>Comment</th>
      <th>Label</th>
      <th>Probability</th>
      <th>👍</th>
      <th>👎</th>
    </tr>
    {% for prediction in predictions %}
    <tr>
      <td>{{ prediction.issue_id }}</td>
      <td>{{ prediction.comment_id }}</td>
      <td>{{ prediction.predicted_class }}</td>
      <td>{{ prediction.probability | round(2) }}</td>
      <td>{{ prediction.likes }}</td>
      <td>{{ prediction.dislikes }}</td>
    </tr>
    {% endfor %}
  </table>
  {% else %}
  <p>No predictions recorded yet.</p>
  {% endif %}
</body>
</html>
"#;

pub fn render_predictions_page(
    owner: &str,
    repo: &str,
    predictions: &[PredictionRecord],
) -> Result<String, minijinja::Error> {
    let mut environment = Environment::new();
    environment.add_template("data", DATA_PAGE_TEMPLATE)?;
    let template = environment.get_template("data")?;
    template.render(context! {
        owner => owner,
        repo => repo,
        predictions => predictions,
    })
}

#[cfg(test)]
mod tests {
    use super::render_predictions_page;
    use labelbot_store::PredictionRecord;

    fn sample_prediction() -> PredictionRecord {
        PredictionRecord {
            id: 1,
            issue_id: 9,
            comment_id: 4242,
            predicted_class: "feature".to_string(),
            probability: 0.6401631832122803,
            distribution_json: "{}".to_string(),
            likes: 2,
            dislikes: 0,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn functional_page_lists_predictions_with_rounded_probability() {
        let html = render_predictions_page("octo", "widgets", &[sample_prediction()]).unwrap();
        assert!(html.contains("Predictions for octo/widgets"));
        assert!(html.contains("<td>feature</td>"));
        assert!(html.contains("<td>0.64</td>"));
        assert!(html.contains("<td>4242</td>"));
    }

    #[test]
    fn unit_empty_page_shows_placeholder_row() {
        let html = render_predictions_page("octo", "widgets", &[]).unwrap();
        assert!(html.contains("No predictions recorded yet."));
    }
}
