use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub category_id: String,
    pub period_id: String,
    pub max_points: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub weight: f64,
    /// `None` puts the category in every period's weight table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_id: Option<String>,
}

impl Category {
    pub fn applies_to(&self, period_id: &str) -> bool {
        self.period_id.as_deref().map(|p| p == period_id).unwrap_or(true)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub weight: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    pub student_id: String,
    pub task_id: String,
    pub earned: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// One course snapshot: weight configuration plus every recorded score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gradebook {
    #[serde(default)]
    pub periods: Vec<Period>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub scores: Vec<Score>,
    #[serde(default)]
    pub students: Vec<Student>,
}

impl Gradebook {
    pub fn from_json_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path)?;
        let gradebook: Gradebook = serde_json::from_slice(&bytes)?;
        Ok(gradebook)
    }

    /// Weight table for one period, in configured order.
    pub fn categories_for_period(&self, period_id: &str) -> Vec<&Category> {
        self.categories
            .iter()
            .filter(|c| c.applies_to(period_id))
            .collect()
    }

    pub fn tasks_in(&self, period_id: &str, category_id: &str) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| t.period_id == period_id && t.category_id == category_id)
            .collect()
    }

    pub fn scores_for_student(&self, student_id: &str) -> Vec<&Score> {
        self.scores
            .iter()
            .filter(|s| s.student_id == student_id)
            .collect()
    }

    /// Roster order first, then ids that only appear on scores, sorted.
    pub fn student_ids(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for s in &self.students {
            if !out.contains(&s.id) {
                out.push(s.id.clone());
            }
        }
        let mut extra: Vec<String> = self
            .scores
            .iter()
            .filter(|s| !out.contains(&s.student_id))
            .map(|s| s.student_id.clone())
            .collect();
        extra.sort();
        extra.dedup();
        out.extend(extra);
        out
    }

    pub fn display_name(&self, student_id: &str) -> Option<String> {
        self.students
            .iter()
            .find(|s| s.id == student_id)
            .and_then(|s| s.display_name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn gradebook_parses_camel_case_json() {
        let raw = json!({
            "periods": [
                { "id": "q1", "name": "Quarter 1", "weight": 100.0,
                  "startDate": "2026-09-01", "endDate": "2026-11-01" }
            ],
            "categories": [
                { "id": "hw", "name": "Homework", "weight": 40.0 },
                { "id": "t", "name": "Tests", "weight": 60.0, "periodId": "q1" }
            ],
            "tasks": [
                { "id": "t1", "title": "HW 1", "categoryId": "hw", "periodId": "q1",
                  "maxPoints": 20.0, "dueDate": "2026-09-10" }
            ],
            "scores": [
                { "studentId": "s1", "taskId": "t1", "earned": 18.0,
                  "gradedAt": "2026-09-11T10:00:00Z" }
            ]
        });
        let gb: Gradebook = serde_json::from_value(raw).expect("parse gradebook");
        assert_eq!(gb.periods[0].end_date.to_string(), "2026-11-01");
        assert_eq!(gb.tasks[0].max_points, 20.0);
        assert!(gb.scores[0].graded_at.is_some());
        assert!(gb.students.is_empty());
        assert_eq!(gb.categories_for_period("q1").len(), 2);
        assert_eq!(gb.categories_for_period("q2").len(), 1);
    }

    #[test]
    fn student_ids_keep_roster_order_then_sorted_extras() {
        let gb = Gradebook {
            students: vec![
                Student {
                    id: "zed".into(),
                    display_name: None,
                },
                Student {
                    id: "amy".into(),
                    display_name: Some("Amy".into()),
                },
            ],
            scores: vec![
                Score {
                    student_id: "kim".into(),
                    task_id: "t".into(),
                    earned: 1.0,
                    graded_at: None,
                },
                Score {
                    student_id: "bob".into(),
                    task_id: "t".into(),
                    earned: 1.0,
                    graded_at: None,
                },
                Score {
                    student_id: "amy".into(),
                    task_id: "t".into(),
                    earned: 1.0,
                    graded_at: None,
                },
            ],
            ..Default::default()
        };
        assert_eq!(gb.student_ids(), vec!["zed", "amy", "bob", "kim"]);
        assert_eq!(gb.display_name("amy").as_deref(), Some("Amy"));
        assert_eq!(gb.display_name("bob"), None);
    }
}
