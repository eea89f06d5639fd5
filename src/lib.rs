pub mod calc;
pub mod config;
pub mod error;
pub mod ipc;
pub mod letter;
pub mod model;

pub use calc::{
    category_average, class_report, final_average, period_average, student_report,
    validate_gradebook, Average, CategoryAverage, WeightedAverage,
};
pub use config::{CalcConfig, CalcConfigPatch};
pub use error::{CalcError, ConfigIssue, WeightScope};
pub use letter::{letter_grade, LetterGrade};
pub use model::{Category, Gradebook, Period, Score, Student, Task};
