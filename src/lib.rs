pub mod anomaly;
pub mod compare;
pub mod config;
pub mod db;
pub mod error;
pub mod forecast;
pub mod logging;
pub mod models;
pub mod report;
pub mod score;
pub mod snapshot;
pub mod stats;
pub mod summary;
pub mod timeseries;
pub mod trend;

pub use anomaly::{detect_anomalies, detect_anomalies_with, detect_goal_anomalies};
pub use compare::{
    calculate_goal_summaries, calculate_skill_area_summaries, calculate_student_comparisons,
    calculate_student_comparisons_with, rank_students,
};
pub use config::{AnalyticsConfig, AnomalyConfig, SummaryConfig, TrendConfig};
pub use forecast::{predict_future_values, project_dates};
pub use models::{
    Anomaly, AnomalyKind, ComparisonRow, Goal, GoalStatus, ProgressLog, Student, Summary,
    TrendDirection, TrendResult, TrendStrength,
};
pub use score::parse_score;
pub use snapshot::Snapshot;
pub use stats::{distribution_by_key, mean, median};
pub use summary::generate_summary;
pub use timeseries::{calculate_moving_average, generate_time_series_data};
pub use trend::{analyze_trend, analyze_trend_with, NumericSeries};
