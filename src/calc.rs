use crate::config::CalcConfig;
use crate::error::{CalcError, ConfigIssue, WeightScope};
use crate::letter::{letter_grade, LetterGrade};
use crate::model::{Category, Gradebook, Period, Score, Task};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, HashMap, HashSet};

/// A percentage in `[0, 100]`, or nothing recorded yet. Over JSON `NoData`
/// is `null`, never `0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Average {
    Percent(f64),
    NoData,
}

impl Average {
    pub fn percent(self) -> Option<f64> {
        match self {
            Average::Percent(v) => Some(v),
            Average::NoData => None,
        }
    }

    pub fn is_no_data(self) -> bool {
        matches!(self, Average::NoData)
    }

    pub fn rounded(self) -> Average {
        match self {
            Average::Percent(v) => Average::Percent(round_off_1_decimal(v)),
            Average::NoData => Average::NoData,
        }
    }

    fn for_display(self, config: &CalcConfig) -> Average {
        if config.roff {
            self.rounded()
        } else {
            self
        }
    }
}

/// VB6-compatible 1-decimal rounding used for displayed marks:
/// `Int(10*x + 0.5) / 10`
pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAverage {
    pub average: Average,
    pub earned: f64,
    pub possible: f64,
    pub scored_count: usize,
    /// Tasks without a score, whether or not they were counted as zero.
    pub missing_count: usize,
}

/// Result of a weighted level (period or final) plus any configuration
/// problems found in its weight table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedAverage {
    pub average: Average,
    pub issues: Vec<ConfigIssue>,
}

fn validate_task(task: &Task) -> Result<(), CalcError> {
    if !task.max_points.is_finite() || task.max_points <= 0.0 {
        return Err(CalcError::invalid_input(
            format!("task {} must have maxPoints > 0", task.id),
            json!({ "taskId": task.id, "maxPoints": task.max_points.to_string() }),
        ));
    }
    Ok(())
}

fn validate_score(score: &Score, task: &Task) -> Result<(), CalcError> {
    if !score.earned.is_finite() || score.earned < 0.0 || score.earned > task.max_points {
        return Err(CalcError::invalid_input(
            format!(
                "score for task {} must be between 0 and {}",
                task.id, task.max_points
            ),
            json!({
                "studentId": score.student_id,
                "taskId": task.id,
                "earned": score.earned.to_string(),
                "maxPoints": task.max_points,
            }),
        ));
    }
    Ok(())
}

/// Average of one student's work in one category of one period.
///
/// Scores for tasks outside `tasks` are ignored. A task without a score is
/// left out of both sums unless `treat_missing_as_zero` is set, in which case
/// it counts as zero of `max_points` (tasks due after `as_of` still stay out).
pub fn category_average<'a, T, S>(
    tasks: T,
    scores: S,
    config: &CalcConfig,
) -> Result<CategoryAverage, CalcError>
where
    T: IntoIterator<Item = &'a Task>,
    S: IntoIterator<Item = &'a Score>,
{
    let tasks: Vec<&Task> = tasks.into_iter().collect();
    let mut wanted: HashSet<&str> = HashSet::new();
    for t in &tasks {
        if !wanted.insert(t.id.as_str()) {
            return Err(CalcError::invalid_input(
                format!("task {} is listed more than once", t.id),
                json!({ "taskId": t.id }),
            ));
        }
    }

    let mut by_task: HashMap<&str, &Score> = HashMap::new();
    for s in scores {
        if !wanted.contains(s.task_id.as_str()) {
            continue;
        }
        if by_task.insert(s.task_id.as_str(), s).is_some() {
            return Err(CalcError::invalid_input(
                format!("more than one score for task {}", s.task_id),
                json!({ "studentId": s.student_id, "taskId": s.task_id }),
            ));
        }
    }

    let mut numerator = 0.0_f64;
    let mut denominator = 0.0_f64;
    let mut scored_count = 0_usize;
    let mut missing_count = 0_usize;

    for task in tasks {
        validate_task(task)?;
        match by_task.get(task.id.as_str()) {
            Some(score) => {
                validate_score(score, task)?;
                scored_count += 1;
                numerator += score.earned;
                denominator += task.max_points;
            }
            None => {
                missing_count += 1;
                if counts_missing_as_zero(task, config) {
                    denominator += task.max_points;
                }
            }
        }
    }

    let average = if denominator > 0.0 {
        Average::Percent(numerator / denominator * 100.0)
    } else {
        Average::NoData
    };

    Ok(CategoryAverage {
        average,
        earned: numerator,
        possible: denominator,
        scored_count,
        missing_count,
    })
}

fn counts_missing_as_zero(task: &Task, config: &CalcConfig) -> bool {
    if !config.treat_missing_as_zero {
        return false;
    }
    match (config.as_of, task.due_date) {
        (Some(as_of), Some(due)) => due <= as_of,
        _ => true,
    }
}

fn validate_weight(kind: &str, id: &str, weight: f64) -> Result<(), CalcError> {
    if !weight.is_finite() || !(0.0..=100.0).contains(&weight) {
        return Err(CalcError::invalid_input(
            format!("{} {} weight must be in 0..=100", kind, id),
            json!({ "kind": kind, "id": id, "weight": weight.to_string() }),
        ));
    }
    Ok(())
}

fn validate_average(id: &str, avg: Average) -> Result<(), CalcError> {
    if let Average::Percent(v) = avg {
        if !v.is_finite() || !(0.0..=100.0).contains(&v) {
            return Err(CalcError::invalid_input(
                format!("average for {} must be in 0..=100", id),
                json!({ "id": id, "average": v.to_string() }),
            ));
        }
    }
    Ok(())
}

/// Weight-table total check shared by both weighted levels.
pub fn check_weight_sum(
    scope: &WeightScope,
    weights: &[f64],
    tolerance: f64,
) -> Option<ConfigIssue> {
    let total: f64 = weights.iter().sum();
    if (total - 100.0).abs() > tolerance {
        Some(ConfigIssue::WeightSum {
            scope: scope.clone(),
            total,
        })
    } else {
        None
    }
}

/// Weighted mean over items that have data. Items without data drop out of
/// the denominator too, so their weight is spread over the rest.
fn weighted_average(
    scope: WeightScope,
    table: &[(&str, f64)],
    averages: &BTreeMap<String, Average>,
    config: &CalcConfig,
) -> Result<WeightedAverage, CalcError> {
    for (id, avg) in averages {
        validate_average(id, *avg)?;
    }

    let mut issues = Vec::new();
    let weights: Vec<f64> = table.iter().map(|(_, w)| *w).collect();
    if let Some(issue) = check_weight_sum(&scope, &weights, config.weight_tolerance) {
        issues.push(issue);
    }

    let known: HashSet<&str> = table.iter().map(|(id, _)| *id).collect();
    for (id, avg) in averages {
        if !avg.is_no_data() && !known.contains(id.as_str()) {
            issues.push(ConfigIssue::UnweightedItem {
                scope: scope.clone(),
                item_id: id.clone(),
            });
        }
    }

    let mut sum = 0.0_f64;
    let mut denom = 0.0_f64;
    let mut zero_weight_with_data: Vec<String> = Vec::new();
    for (id, weight) in table {
        let Some(Average::Percent(p)) = averages.get(*id).copied() else {
            continue;
        };
        if *weight > 0.0 {
            sum += p * weight;
            denom += weight;
        } else {
            zero_weight_with_data.push(id.to_string());
        }
    }

    let average = if denom > 0.0 {
        // Only float noise can leave [0, 100] here; inputs were validated.
        Average::Percent((sum / denom).clamp(0.0, 100.0))
    } else {
        if !zero_weight_with_data.is_empty() {
            issues.push(ConfigIssue::ZeroWeightWithData {
                scope,
                item_ids: zero_weight_with_data,
            });
        }
        Average::NoData
    };

    Ok(WeightedAverage { average, issues })
}

/// Combine one student's category averages for a period using the period's
/// category weight table.
pub fn period_average<'a, C>(
    period_id: &str,
    category_averages: &BTreeMap<String, Average>,
    categories: C,
    config: &CalcConfig,
) -> Result<WeightedAverage, CalcError>
where
    C: IntoIterator<Item = &'a Category>,
{
    let mut table: Vec<(&str, f64)> = Vec::new();
    for c in categories {
        validate_weight("category", &c.id, c.weight)?;
        table.push((c.id.as_str(), c.weight));
    }
    weighted_average(
        WeightScope::Categories {
            period_id: period_id.to_string(),
        },
        &table,
        category_averages,
        config,
    )
}

fn validate_period(p: &Period) -> Result<(), CalcError> {
    validate_weight("period", &p.id, p.weight)?;
    if p.end_date < p.start_date {
        return Err(CalcError::invalid_input(
            format!("period {} ends before it starts", p.id),
            json!({
                "periodId": p.id,
                "startDate": p.start_date,
                "endDate": p.end_date,
            }),
        ));
    }
    Ok(())
}

/// Combine one student's period averages into the course average.
pub fn final_average<'a, P>(
    period_averages: &BTreeMap<String, Average>,
    periods: P,
    config: &CalcConfig,
) -> Result<WeightedAverage, CalcError>
where
    P: IntoIterator<Item = &'a Period>,
{
    let mut table: Vec<(&str, f64)> = Vec::new();
    for p in periods {
        validate_period(p)?;
        table.push((p.id.as_str(), p.weight));
    }
    weighted_average(WeightScope::Periods, &table, period_averages, config)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResult {
    pub category_id: String,
    pub name: String,
    pub weight: f64,
    pub average: Average,
    pub earned: f64,
    pub possible: f64,
    pub scored_count: usize,
    pub missing_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodResult {
    pub period_id: String,
    pub name: String,
    pub weight: f64,
    pub average: Average,
    pub categories: Vec<CategoryResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentReport {
    pub student_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub periods: Vec<PeriodResult>,
    pub final_average: Average,
    pub letter: Option<LetterGrade>,
    pub issues: Vec<ConfigIssue>,
}

fn push_unique(issues: &mut Vec<ConfigIssue>, more: Vec<ConfigIssue>) {
    for issue in more {
        if !issues.contains(&issue) {
            issues.push(issue);
        }
    }
}

/// Reference problems that keep a task out of every period's weight table.
fn task_reference_issues(gradebook: &Gradebook, task: &Task) -> Vec<ConfigIssue> {
    let mut issues = Vec::new();
    if !gradebook.periods.iter().any(|p| p.id == task.period_id) {
        issues.push(ConfigIssue::UnknownReference {
            task_id: task.id.clone(),
            field: "periodId".to_string(),
            target_id: task.period_id.clone(),
        });
    }
    let category_ok = gradebook
        .categories
        .iter()
        .any(|c| c.id == task.category_id && c.applies_to(&task.period_id));
    if !category_ok {
        issues.push(ConfigIssue::UnknownReference {
            task_id: task.id.clone(),
            field: "categoryId".to_string(),
            target_id: task.category_id.clone(),
        });
    }
    issues
}

/// Issues for scores the weight tables can never reach: scores on unknown
/// tasks and scores on tasks with a dangling period or category.
fn unreachable_score_issues(gradebook: &Gradebook, scores: &[&Score]) -> Vec<ConfigIssue> {
    let mut issues = Vec::new();
    for s in scores {
        match gradebook.tasks.iter().find(|t| t.id == s.task_id) {
            Some(task) => push_unique(&mut issues, task_reference_issues(gradebook, task)),
            None => push_unique(
                &mut issues,
                vec![ConfigIssue::UnknownReference {
                    task_id: s.task_id.clone(),
                    field: "taskId".to_string(),
                    target_id: s.task_id.clone(),
                }],
            ),
        }
    }
    issues
}

fn letter_for(average: Average) -> Result<Option<LetterGrade>, CalcError> {
    match average.percent() {
        Some(v) => Ok(Some(letter_grade(v)?)),
        None => Ok(None),
    }
}

impl StudentReport {
    /// Display copy: averages rounded to one decimal, letter taken from the
    /// rounded final average.
    pub fn rounded(&self) -> Result<StudentReport, CalcError> {
        let mut out = self.clone();
        for p in &mut out.periods {
            p.average = p.average.rounded();
            for c in &mut p.categories {
                c.average = c.average.rounded();
            }
        }
        out.final_average = out.final_average.rounded();
        out.letter = letter_for(out.final_average)?;
        Ok(out)
    }
}

/// Every aggregate for one student. Averages are rounded for display when
/// `roff` is set; the letter follows the displayed final average.
pub fn student_report(
    gradebook: &Gradebook,
    student_id: &str,
    config: &CalcConfig,
) -> Result<StudentReport, CalcError> {
    let report = exact_student_report(gradebook, student_id, config)?;
    if config.roff {
        report.rounded()
    } else {
        Ok(report)
    }
}

fn exact_student_report(
    gradebook: &Gradebook,
    student_id: &str,
    config: &CalcConfig,
) -> Result<StudentReport, CalcError> {
    if !gradebook.student_ids().iter().any(|id| id == student_id) {
        return Err(CalcError::new("not_found", "student not found"));
    }
    let scores = gradebook.scores_for_student(student_id);

    let mut issues: Vec<ConfigIssue> = Vec::new();
    let mut periods: Vec<PeriodResult> = Vec::new();
    let mut period_averages: BTreeMap<String, Average> = BTreeMap::new();

    for period in &gradebook.periods {
        let table = gradebook.categories_for_period(&period.id);
        let mut category_averages: BTreeMap<String, Average> = BTreeMap::new();
        let mut categories: Vec<CategoryResult> = Vec::new();
        for c in &table {
            let tasks = gradebook.tasks_in(&period.id, &c.id);
            let tally = category_average(tasks, scores.iter().copied(), config)?;
            category_averages.insert(c.id.clone(), tally.average);
            categories.push(CategoryResult {
                category_id: c.id.clone(),
                name: c.name.clone(),
                weight: c.weight,
                average: tally.average,
                earned: tally.earned,
                possible: tally.possible,
                scored_count: tally.scored_count,
                missing_count: tally.missing_count,
            });
        }

        let weighted = period_average(&period.id, &category_averages, table, config)?;
        push_unique(&mut issues, weighted.issues);
        period_averages.insert(period.id.clone(), weighted.average);
        periods.push(PeriodResult {
            period_id: period.id.clone(),
            name: period.name.clone(),
            weight: period.weight,
            average: weighted.average,
            categories,
        });
    }

    let overall = final_average(&period_averages, &gradebook.periods, config)?;
    push_unique(&mut issues, overall.issues);
    push_unique(&mut issues, unreachable_score_issues(gradebook, &scores));

    Ok(StudentReport {
        student_id: student_id.to_string(),
        display_name: gradebook.display_name(student_id),
        periods,
        final_average: overall.average,
        letter: letter_for(overall.average)?,
        issues,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryClassStat {
    pub period_id: String,
    pub category_id: String,
    pub name: String,
    pub weight: f64,
    pub class_avg: Average,
    pub student_count: usize,
    pub task_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassReport {
    pub students: Vec<StudentReport>,
    pub per_category: Vec<CategoryClassStat>,
    pub class_final_avg: Average,
    pub issues: Vec<ConfigIssue>,
}

fn mean(values: &[f64]) -> Average {
    if values.is_empty() {
        Average::NoData
    } else {
        Average::Percent(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Reports for every student plus class means per period/category. Means
/// only include students that have data at that level.
pub fn class_report(gradebook: &Gradebook, config: &CalcConfig) -> Result<ClassReport, CalcError> {
    let mut students: Vec<StudentReport> = Vec::new();
    let mut issues: Vec<ConfigIssue> = Vec::new();
    let mut per_cat_values: HashMap<(String, String), Vec<f64>> = HashMap::new();
    let mut finals: Vec<f64> = Vec::new();

    for student_id in gradebook.student_ids() {
        // Class means are taken over unrounded values and rounded once at the end.
        let report = exact_student_report(gradebook, &student_id, config)?;
        for p in &report.periods {
            for c in &p.categories {
                if let Some(v) = c.average.percent() {
                    per_cat_values
                        .entry((p.period_id.clone(), c.category_id.clone()))
                        .or_default()
                        .push(v);
                }
            }
        }
        if let Some(v) = report.final_average.percent() {
            finals.push(v);
        }
        push_unique(&mut issues, report.issues.clone());
        students.push(if config.roff { report.rounded()? } else { report });
    }
    tracing::debug!(students = students.len(), "class report computed");

    let mut per_category: Vec<CategoryClassStat> = Vec::new();
    for period in &gradebook.periods {
        for c in gradebook.categories_for_period(&period.id) {
            let values = per_cat_values
                .get(&(period.id.clone(), c.id.clone()))
                .map(|v| v.as_slice())
                .unwrap_or(&[]);
            per_category.push(CategoryClassStat {
                period_id: period.id.clone(),
                category_id: c.id.clone(),
                name: c.name.clone(),
                weight: c.weight,
                class_avg: mean(values).for_display(config),
                student_count: values.len(),
                task_count: gradebook.tasks_in(&period.id, &c.id).len(),
            });
        }
    }

    Ok(ClassReport {
        students,
        per_category,
        class_final_avg: mean(&finals).for_display(config),
        issues,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradebookValidation {
    pub issues: Vec<ConfigIssue>,
    pub errors: Vec<CalcError>,
}

impl GradebookValidation {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty() && self.errors.is_empty()
    }
}

fn duplicate_ids<'a, I>(kind: &str, ids: I, issues: &mut Vec<ConfigIssue>)
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen: HashSet<&str> = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            issues.push(ConfigIssue::DuplicateId {
                kind: kind.to_string(),
                id: id.to_string(),
            });
        }
    }
}

/// Check a whole snapshot's configuration and recorded scores without
/// computing anyone's grades.
pub fn validate_gradebook(gradebook: &Gradebook, config: &CalcConfig) -> GradebookValidation {
    let mut issues: Vec<ConfigIssue> = Vec::new();
    let mut errors: Vec<CalcError> = Vec::new();

    duplicate_ids("period", gradebook.periods.iter().map(|p| p.id.as_str()), &mut issues);
    duplicate_ids(
        "category",
        gradebook.categories.iter().map(|c| c.id.as_str()),
        &mut issues,
    );
    duplicate_ids("task", gradebook.tasks.iter().map(|t| t.id.as_str()), &mut issues);

    for p in &gradebook.periods {
        if let Err(e) = validate_period(p) {
            errors.push(e);
        }
    }
    for c in &gradebook.categories {
        if let Err(e) = validate_weight("category", &c.id, c.weight) {
            errors.push(e);
        }
    }

    let period_weights: Vec<f64> = gradebook.periods.iter().map(|p| p.weight).collect();
    if let Some(issue) =
        check_weight_sum(&WeightScope::Periods, &period_weights, config.weight_tolerance)
    {
        issues.push(issue);
    }
    for p in &gradebook.periods {
        let weights: Vec<f64> = gradebook
            .categories_for_period(&p.id)
            .iter()
            .map(|c| c.weight)
            .collect();
        let scope = WeightScope::Categories {
            period_id: p.id.clone(),
        };
        if let Some(issue) = check_weight_sum(&scope, &weights, config.weight_tolerance) {
            issues.push(issue);
        }
    }

    for t in &gradebook.tasks {
        if let Err(e) = validate_task(t) {
            errors.push(e);
        }
        issues.extend(task_reference_issues(gradebook, t));
    }

    let tasks_by_id: HashMap<&str, &Task> =
        gradebook.tasks.iter().map(|t| (t.id.as_str(), t)).collect();
    let mut seen_pairs: HashSet<(&str, &str)> = HashSet::new();
    for s in &gradebook.scores {
        let Some(task) = tasks_by_id.get(s.task_id.as_str()) else {
            errors.push(CalcError::invalid_input(
                format!("score references unknown task {}", s.task_id),
                json!({ "studentId": s.student_id, "taskId": s.task_id }),
            ));
            continue;
        };
        if !seen_pairs.insert((s.student_id.as_str(), s.task_id.as_str())) {
            errors.push(CalcError::invalid_input(
                format!("more than one score for task {}", s.task_id),
                json!({ "studentId": s.student_id, "taskId": s.task_id }),
            ));
        }
        if task.max_points > 0.0 {
            if let Err(e) = validate_score(s, task) {
                errors.push(e);
            }
        }
    }

    GradebookValidation { issues, errors }
}
